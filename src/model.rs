use chrono::{DateTime, Local};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

/// One rendered resource line. Cell 0 is always the resource name; the
/// remaining cells follow the owning kind's column schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<String>,
}

impl Row {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    pub fn name(&self) -> &str {
        self.cells.first().map(String::as_str).unwrap_or("")
    }

    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }
}

/// A complete fetch result: headers plus every row, freshly computed.
/// Snapshots are replaced wholesale, never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSnapshot {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Default)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub selected: usize,
    pub last_refreshed: Option<DateTime<Local>>,
}

impl TableData {
    pub fn apply_snapshot(&mut self, snapshot: TableSnapshot, refreshed_at: DateTime<Local>) {
        self.headers = snapshot.headers;
        self.rows = snapshot.rows;
        self.last_refreshed = Some(refreshed_at);
        self.selected = self.selected.min(self.rows.len().saturating_sub(1));
    }

    pub fn reset_schema(&mut self, headers: Vec<String>) {
        self.headers = headers;
        self.rows.clear();
        self.selected = 0;
        self.last_refreshed = None;
    }

    pub fn selected_row(&self) -> Option<&Row> {
        self.rows.get(self.selected)
    }
}

/// Largest-unit-first duration breakdown, matching `oc get` column output.
pub fn format_seconds(seconds: i64) -> String {
    if seconds < 60 {
        format!("{seconds}s")
    } else if seconds < 3_600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86_400 {
        format!("{}h {}m", seconds / 3_600, (seconds % 3_600) / 60)
    } else {
        format!("{}d {}h", seconds / 86_400, (seconds % 86_400) / 3_600)
    }
}

/// Age of an object timestamp, or the empty string while the field is unset
/// (pods that have not started yet report no startTime).
pub fn age(timestamp: Option<&Time>) -> String {
    let Some(timestamp) = timestamp else {
        return String::new();
    };
    let elapsed =
        (k8s_openapi::jiff::Timestamp::now().as_second() - timestamp.0.as_second()).max(0);
    format_seconds(elapsed)
}

/// `ready/total` with `0` substituted for either missing side.
pub fn replica_ratio(ready: Option<i32>, total: Option<i32>) -> String {
    format!("{}/{}", ready.unwrap_or(0), total.unwrap_or(0))
}

/// CPU quantity in millicores. `"500m"` is already millicores, a bare count
/// is whole cores; anything unparseable counts as 0 rather than failing the
/// whole row.
pub fn millicores(quantity: &Quantity) -> i64 {
    let raw = quantity.0.trim();
    if let Some(number) = raw.strip_suffix('m') {
        number.parse::<i64>().unwrap_or(0)
    } else {
        raw.parse::<i64>().map(|cores| cores * 1_000).unwrap_or(0)
    }
}

pub fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "<none>".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Row, TableData, TableSnapshot, format_seconds, list_or_none, millicores, replica_ratio,
    };
    use chrono::Local;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

    #[test]
    fn seconds_break_down_largest_unit_first() {
        assert_eq!(format_seconds(30), "30s");
        assert_eq!(format_seconds(90), "1m 30s");
        assert_eq!(format_seconds(3_700), "1h 1m");
        assert_eq!(format_seconds(90_000), "1d 1h");
    }

    #[test]
    fn missing_timestamp_renders_empty() {
        assert_eq!(super::age(None), "");
    }

    #[test]
    fn ratio_substitutes_zero_for_missing_sides() {
        assert_eq!(replica_ratio(Some(2), None), "2/0");
        assert_eq!(replica_ratio(None, Some(3)), "0/3");
        assert_eq!(replica_ratio(Some(1), Some(1)), "1/1");
    }

    #[test]
    fn millicores_parses_suffixed_and_whole_cores() {
        assert_eq!(millicores(&Quantity("500m".to_string())), 500);
        assert_eq!(millicores(&Quantity("2".to_string())), 2_000);
        assert_eq!(millicores(&Quantity("garbage".to_string())), 0);
    }

    #[test]
    fn empty_list_renders_none_marker() {
        assert_eq!(list_or_none(&[]), "<none>");
        assert_eq!(list_or_none(&["a".to_string(), "b".to_string()]), "a, b");
    }

    #[test]
    fn snapshot_apply_is_idempotent() {
        let mut table = TableData::default();
        let snapshot = TableSnapshot {
            headers: vec!["NAME".to_string()],
            rows: vec![Row::new(vec!["web".to_string()])],
        };
        let now = Local::now();
        table.apply_snapshot(snapshot.clone(), now);
        let first = (table.headers.clone(), table.rows.clone(), table.selected);
        table.apply_snapshot(snapshot, now);
        assert_eq!(
            first,
            (table.headers.clone(), table.rows.clone(), table.selected)
        );
    }

    #[test]
    fn snapshot_apply_clamps_selection() {
        let mut table = TableData::default();
        table.selected = 5;
        table.apply_snapshot(
            TableSnapshot {
                headers: vec!["NAME".to_string()],
                rows: vec![
                    Row::new(vec!["a".to_string()]),
                    Row::new(vec!["b".to_string()]),
                ],
            },
            Local::now(),
        );
        assert_eq!(table.selected, 1);
    }
}
