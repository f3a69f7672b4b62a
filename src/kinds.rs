use crate::model::Row;

/// A category of cluster object the dashboard can list. ReplicaSets and
/// ReplicationControllers are sub-views scoped to the deployment/DC that
/// owns them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Pods,
    Services,
    Deployments,
    ConfigMaps,
    Nodes,
    ReplicaSets { owner: String },
    ReplicationControllers { owner: String },
}

/// A per-row action. Resolved dynamically from the kind and, for the merged
/// Deployments view, from the sub-kind tag in the row itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Describe,
    ShowYaml,
    Edit,
    Delete,
    Logs,
    RemoteShell,
    NodeTop,
    NodeSsh,
    Rescale,
    RolloutLatest,
    ShowReplicaSets,
    ShowReplicationControllers,
}

impl ResourceKind {
    pub const TOP_LEVEL: [Self; 5] = [
        Self::Pods,
        Self::Services,
        Self::Deployments,
        Self::ConfigMaps,
        Self::Nodes,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Pods => "Pods",
            Self::Services => "Services",
            Self::Deployments => "Deployments",
            Self::ConfigMaps => "ConfigMaps",
            Self::Nodes => "Nodes",
            Self::ReplicaSets { .. } => "ReplicaSets",
            Self::ReplicationControllers { .. } => "ReplicationControllers",
        }
    }

    pub fn columns(&self) -> Vec<String> {
        let columns: &[&str] = match self {
            Self::Pods => &["NAME", "READY", "STATUS", "RESTARTS", "AGE", "IP", "NODE"],
            Self::Services => &[
                "NAME",
                "TYPE",
                "CLUSTER-IP",
                "EXTERNAL-IP",
                "PORT(S)",
                "AGE",
                "SELECTOR",
            ],
            Self::Deployments => &["NAME", "TYPE", "READY", "UP-TO-DATE", "AVAILABLE", "AGE"],
            Self::ConfigMaps => &["NAME", "DATA", "AGE"],
            Self::Nodes => &[
                "NAME",
                "STATUS",
                "ROLES",
                "AGE",
                "INTERNAL-IP",
                "PODS",
                "CPU-REQS",
            ],
            Self::ReplicaSets { .. } | Self::ReplicationControllers { .. } => {
                &["NAME", "DESIRED", "CURRENT", "READY", "AGE"]
            }
        };
        columns.iter().map(|column| column.to_string()).collect()
    }

    /// The `oc` subcommand resource string. Deployments rows resolve it from
    /// the sub-kind tag in column 1.
    pub fn resource_type(&self, row: Option<&Row>) -> String {
        match self {
            Self::Pods => "pods".to_string(),
            Self::Services => "services".to_string(),
            Self::Deployments => row
                .map(|row| row.cell(1).to_string())
                .unwrap_or_else(|| "deployments".to_string()),
            Self::ConfigMaps => "configmaps".to_string(),
            Self::Nodes => "nodes".to_string(),
            Self::ReplicaSets { .. } => "replicaset".to_string(),
            Self::ReplicationControllers { .. } => "replicationcontroller".to_string(),
        }
    }

    /// The ordered operation menu for one row.
    pub fn operations(&self, row: &Row) -> Vec<(&'static str, Operation)> {
        let mut ops = vec![
            ("describe", Operation::Describe),
            ("edit", Operation::Edit),
            ("yaml", Operation::ShowYaml),
            ("delete", Operation::Delete),
        ];
        match self {
            Self::Pods => {
                ops.push(("logs", Operation::Logs));
                ops.push(("rsh", Operation::RemoteShell));
                ops.push(("top", Operation::NodeTop));
            }
            Self::Deployments => match row.cell(1) {
                "deployment" => {
                    ops.push(("rescale", Operation::Rescale));
                    ops.push(("show replicasets", Operation::ShowReplicaSets));
                }
                "dc" => {
                    ops.push(("rescale", Operation::Rescale));
                    ops.push(("rollout latest", Operation::RolloutLatest));
                    ops.push((
                        "show repl.controllers",
                        Operation::ShowReplicationControllers,
                    ));
                }
                _ => return Vec::new(),
            },
            Self::Nodes => {
                ops.push(("ssh", Operation::NodeSsh));
            }
            Self::Services
            | Self::ConfigMaps
            | Self::ReplicaSets { .. }
            | Self::ReplicationControllers { .. } => {}
        }
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::{Operation, ResourceKind};
    use crate::model::Row;

    fn deployment_row(tag: &str) -> Row {
        Row::new(vec![
            "web".to_string(),
            tag.to_string(),
            "1/1".to_string(),
            "1".to_string(),
            "1".to_string(),
            "5m 0s".to_string(),
        ])
    }

    #[test]
    fn deployment_rows_resolve_menu_from_sub_kind_tag() {
        let kind = ResourceKind::Deployments;
        let names = |row: &Row| {
            kind.operations(row)
                .into_iter()
                .map(|(name, _)| name)
                .collect::<Vec<_>>()
        };

        let deployment = names(&deployment_row("deployment"));
        assert!(deployment.contains(&"rescale"));
        assert!(deployment.contains(&"show replicasets"));
        assert!(!deployment.contains(&"rollout latest"));

        let dc = names(&deployment_row("dc"));
        assert!(dc.contains(&"rescale"));
        assert!(dc.contains(&"rollout latest"));
        assert!(dc.contains(&"show repl.controllers"));

        assert!(names(&deployment_row("unknown")).is_empty());
    }

    #[test]
    fn deployment_resource_type_comes_from_row() {
        let kind = ResourceKind::Deployments;
        assert_eq!(kind.resource_type(Some(&deployment_row("dc"))), "dc");
        assert_eq!(
            kind.resource_type(Some(&deployment_row("deployment"))),
            "deployment"
        );
    }

    #[test]
    fn every_kind_offers_the_common_operations() {
        let row = Row::new(vec!["thing".to_string(), "deployment".to_string()]);
        for kind in [
            ResourceKind::Pods,
            ResourceKind::Services,
            ResourceKind::Deployments,
            ResourceKind::ConfigMaps,
            ResourceKind::Nodes,
            ResourceKind::ReplicaSets {
                owner: "web".to_string(),
            },
            ResourceKind::ReplicationControllers {
                owner: "web".to_string(),
            },
        ] {
            let ops = kind.operations(&row);
            for required in [
                Operation::Describe,
                Operation::Edit,
                Operation::ShowYaml,
                Operation::Delete,
            ] {
                assert!(
                    ops.iter().any(|(_, op)| *op == required),
                    "{} is missing {required:?}",
                    kind.title()
                );
            }
        }
    }

    #[test]
    fn pods_offer_logs_shell_and_top() {
        let row = Row::new(vec!["api-0".to_string()]);
        let ops = ResourceKind::Pods.operations(&row);
        for extra in [Operation::Logs, Operation::RemoteShell, Operation::NodeTop] {
            assert!(ops.iter().any(|(_, op)| *op == extra));
        }
    }
}
