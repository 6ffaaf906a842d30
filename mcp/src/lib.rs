//! Multi-project YApi access exposed as MCP tools.
//!
//! ## Modules
//!
//! - [`credentials`]: Per-project token table parsed from configuration
//! - [`backend`]: YApi HTTP client behind the [`Backend`] trait
//! - [`store`]: On-disk project snapshot
//! - [`cache`]: In-memory metadata cache with background refresh
//! - [`tools`]: MCP server handler and tool definitions

// Shared types (used across modules)
pub mod config;
pub mod error;

// Subsystems
pub mod backend;
pub mod cache;
pub mod credentials;
pub mod store;
pub mod tools;

pub use backend::{Backend, YapiClient};
pub use cache::{CacheState, InitOutcome, ProjectMetadataCache, RefreshOutcome, RefreshStatus};
pub use config::{BackendConfig, CacheConfig};
pub use credentials::{CredentialTable, ProjectToken};
pub use error::{BackendError, BackendResult, CredentialError, StorageError};
pub use store::{CacheSnapshot, PersistentCacheStore};
pub use tools::YapiToolServer;
