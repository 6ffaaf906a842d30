//! YApi backend access.
//!
//! [`Backend`] is the seam the metadata cache depends on; [`YapiClient`] is the
//! HTTP implementation.

mod client;
pub mod types;
mod wire;

use async_trait::async_trait;
pub use client::YapiClient;
pub use types::{
    CategoryInfo, InterfaceDetail, InterfaceParam, InterfaceSummary, ProjectInfo,
    SaveInterfaceParams, SearchCriteria, SearchResult,
};

use crate::error::BackendResult;

/// One operation per backend capability. Every call resolves the project's
/// token first and fails with `Unauthorized` before any I/O when it is missing.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get_project_info(&self, project_id: &str) -> BackendResult<ProjectInfo>;

    async fn get_category_list(&self, project_id: &str) -> BackendResult<Vec<CategoryInfo>>;

    async fn get_category_interfaces(
        &self,
        project_id: &str,
        category_id: &str,
    ) -> BackendResult<Vec<InterfaceSummary>>;

    async fn get_interface(
        &self,
        project_id: &str,
        interface_id: &str,
    ) -> BackendResult<InterfaceDetail>;

    /// Returns the id of the created or updated interface.
    async fn save_interface(&self, params: &SaveInterfaceParams) -> BackendResult<String>;

    async fn search_interfaces(&self, criteria: &SearchCriteria) -> BackendResult<SearchResult>;
}
