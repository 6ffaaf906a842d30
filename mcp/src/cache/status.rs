//! Lifecycle state and refresh results.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// No project data in memory yet
    Cold,
    Warm,
    /// A full refresh is in flight; reads still serve the previous maps
    Refreshing,
}

/// What one refresh cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    /// Projects whose info was fetched this cycle
    pub succeeded: Vec<String>,
    /// `(project_id, error)` for projects whose info fetch failed
    pub failed: Vec<(String, String)>,
    /// Projects whose category listing failed
    pub categories_failed: Vec<String>,
    /// Whether a new snapshot reached disk
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "report", rename_all = "lowercase")]
pub enum RefreshOutcome {
    /// Every configured project refreshed
    Success(RefreshReport),
    /// At least one project refreshed and at least one failed
    Partial(RefreshReport),
    /// No project refreshed; nothing was replaced or persisted
    Failed(RefreshReport),
    /// Another refresh was already running
    Skipped,
}

impl RefreshOutcome {
    pub(crate) fn from_report(report: RefreshReport) -> Self {
        match (report.succeeded.is_empty(), report.failed.is_empty()) {
            (false, true) => RefreshOutcome::Success(report),
            (false, false) => RefreshOutcome::Partial(report),
            // An empty credential table refreshes nothing and fails nothing
            (true, true) => RefreshOutcome::Success(report),
            (true, false) => RefreshOutcome::Failed(report),
        }
    }

    pub fn report(&self) -> Option<&RefreshReport> {
        match self {
            RefreshOutcome::Success(r) | RefreshOutcome::Partial(r) | RefreshOutcome::Failed(r) => {
                Some(r)
            }
            RefreshOutcome::Skipped => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Success(_) => "success",
            RefreshOutcome::Partial(_) => "partial",
            RefreshOutcome::Failed(_) => "failed",
            RefreshOutcome::Skipped => "skipped",
        }
    }
}

/// Published on the cache's watch channel after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub state: CacheState,
    /// Completed refresh cycles
    pub generation: u64,
    pub last_outcome: Option<RefreshOutcome>,
    /// Epoch milliseconds of the last completed refresh
    pub last_refreshed_at: Option<i64>,
}

impl RefreshStatus {
    pub(crate) fn cold() -> Self {
        Self {
            state: CacheState::Cold,
            generation: 0,
            last_outcome: None,
            last_refreshed_at: None,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.state == CacheState::Refreshing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Served from a fresh on-disk snapshot
    WarmStart,
    /// A background refresh was started; reads may miss until it lands
    RefreshScheduled,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(succeeded: &[&str], failed: &[&str]) -> RefreshReport {
        RefreshReport {
            succeeded: succeeded.iter().map(|s| s.to_string()).collect(),
            failed: failed
                .iter()
                .map(|s| (s.to_string(), "boom".to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(
            RefreshOutcome::from_report(report(&["10"], &[])).label(),
            "success"
        );
        assert_eq!(
            RefreshOutcome::from_report(report(&["10"], &["20"])).label(),
            "partial"
        );
        assert_eq!(
            RefreshOutcome::from_report(report(&[], &["20"])).label(),
            "failed"
        );
        assert!(RefreshOutcome::Skipped.report().is_none());
    }

    #[test]
    fn test_status_serialization() {
        let status = RefreshStatus {
            state: CacheState::Warm,
            generation: 3,
            last_outcome: Some(RefreshOutcome::Skipped),
            last_refreshed_at: Some(1_700_000_000_000),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["state"], "warm");
        assert_eq!(value["lastOutcome"]["result"], "skipped");
        assert_eq!(value["lastRefreshedAt"], 1_700_000_000_000i64);
    }
}
