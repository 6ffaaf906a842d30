//! Project metadata cache and its refresh machinery.

mod backoff;
mod metadata;
mod metrics;
mod status;

pub use backoff::FailureBackoff;
pub use metadata::{ProjectMetadataCache, ScopedSearch};
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use status::{CacheState, InitOutcome, RefreshOutcome, RefreshReport, RefreshStatus};
