use crate::kinds::ResourceKind;

/// One fetch captured at dispatch time. The generation is compared against
/// the coordinator's current value when the result comes back; a mismatch
/// means the view has moved on and the result is dropped silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub kind: ResourceKind,
    pub namespace: String,
    pub generation: u64,
}

/// Owns the poll stream bookkeeping: which view is active, the generation
/// counter, how many fetches are outstanding, and the single retry slot used
/// by the login / insecure-connection flows.
#[derive(Debug)]
pub struct PollCoordinator {
    kind: ResourceKind,
    namespace: String,
    generation: u64,
    in_flight: usize,
    pending_retry: Option<FetchRequest>,
}

impl PollCoordinator {
    pub fn new(kind: ResourceKind, namespace: String) -> Self {
        Self {
            kind,
            namespace,
            generation: 0,
            in_flight: 0,
            pending_retry: None,
        }
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn request(&mut self) -> FetchRequest {
        self.in_flight += 1;
        FetchRequest {
            kind: self.kind.clone(),
            namespace: self.namespace.clone(),
            generation: self.generation,
        }
    }

    /// Timer tick. Never fetches while the dashboard is not the foreground
    /// focus, and never stacks a second fetch on an outstanding one; the
    /// generation guard would make overlap safe, skipping just avoids the
    /// wasted call.
    pub fn on_tick(&mut self, foreground: bool) -> Option<FetchRequest> {
        if !foreground || self.in_flight > 0 {
            return None;
        }
        Some(self.request())
    }

    /// Re-fetch the current view without a generation bump, e.g. after a
    /// mutation completed.
    pub fn refetch(&mut self) -> FetchRequest {
        self.request()
    }

    /// Replace the active kind. Bumps the generation exactly once and issues
    /// the immediate fetch for the new view.
    pub fn switch_kind(&mut self, kind: ResourceKind) -> FetchRequest {
        self.kind = kind;
        self.generation += 1;
        self.pending_retry = None;
        self.request()
    }

    /// Replace the active namespace, keeping the kind.
    pub fn switch_namespace(&mut self, namespace: String) -> FetchRequest {
        self.namespace = namespace;
        self.generation += 1;
        self.pending_retry = None;
        self.request()
    }

    /// A fetch finished (either way). Returns whether its payload may be
    /// applied to the display.
    pub fn on_result(&mut self, generation: u64) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        generation == self.generation
    }

    /// Park the failed request so it can be re-issued once after the login
    /// or trust flow succeeds.
    pub fn park_for_retry(&mut self, request: FetchRequest) {
        self.pending_retry = Some(request);
    }

    /// Re-issue the parked request exactly once, and only while the view it
    /// was captured for is still current.
    pub fn take_retry(&mut self) -> Option<FetchRequest> {
        let request = self.pending_retry.take()?;
        if request.generation != self.generation {
            return None;
        }
        self.in_flight += 1;
        Some(request)
    }
}

#[cfg(test)]
mod tests {
    use super::PollCoordinator;
    use crate::kinds::ResourceKind;

    fn coordinator() -> PollCoordinator {
        PollCoordinator::new(ResourceKind::Pods, "default".to_string())
    }

    #[test]
    fn stale_generation_results_are_discarded() {
        let mut poll = coordinator();
        let stale = poll.on_tick(true).expect("fetch should be issued");
        let fresh = poll.switch_kind(ResourceKind::Services);

        assert!(!poll.on_result(stale.generation));
        assert!(poll.on_result(fresh.generation));
    }

    #[test]
    fn ticks_are_gated_on_foreground_focus() {
        let mut poll = coordinator();
        assert!(poll.on_tick(false).is_none());
        assert!(poll.on_tick(false).is_none());
        // Exactly one fetch on regaining focus.
        assert!(poll.on_tick(true).is_some());
        assert!(poll.on_tick(true).is_none());
    }

    #[test]
    fn only_one_fetch_is_in_flight_at_a_time() {
        let mut poll = coordinator();
        let first = poll.on_tick(true).expect("fetch should be issued");
        assert!(poll.on_tick(true).is_none());
        poll.on_result(first.generation);
        assert!(poll.on_tick(true).is_some());
    }

    #[test]
    fn view_switch_bumps_generation_once_and_fetches_immediately() {
        let mut poll = coordinator();
        let before = poll.generation();
        let request = poll.switch_kind(ResourceKind::ConfigMaps);
        assert_eq!(request.generation, before + 1);
        assert_eq!(poll.generation(), before + 1);
        assert_eq!(request.kind, ResourceKind::ConfigMaps);
    }

    #[test]
    fn namespace_switch_bumps_generation() {
        let mut poll = coordinator();
        let request = poll.switch_namespace("kube-system".to_string());
        assert_eq!(request.generation, 1);
        assert_eq!(request.namespace, "kube-system");
        assert_eq!(poll.namespace(), "kube-system");
    }

    #[test]
    fn login_retry_is_issued_exactly_once_under_unchanged_generation() {
        let mut poll = coordinator();
        let request = poll.on_tick(true).expect("fetch should be issued");
        let generation = request.generation;
        poll.on_result(generation);
        poll.park_for_retry(request.clone());

        let retry = poll.take_retry().expect("one retry");
        assert_eq!(retry, request);
        assert_eq!(retry.generation, poll.generation());
        assert!(poll.take_retry().is_none());
    }

    #[test]
    fn parked_retry_is_dropped_after_a_view_switch() {
        let mut poll = coordinator();
        let request = poll.on_tick(true).expect("fetch should be issued");
        poll.on_result(request.generation);
        poll.park_for_retry(request);
        let switched = poll.switch_kind(ResourceKind::Nodes);
        poll.on_result(switched.generation);
        assert!(poll.take_retry().is_none());
    }
}
