//! MCP server handler dispatching tool calls onto the metadata cache.

use std::{collections::HashMap, sync::Arc};

use futures::future::join_all;
use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParam, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    ErrorData, RoleServer, ServerHandler,
};
use tracing::{debug, info, warn};

use super::{
    definitions::{is_known_tool, tool_definitions},
    format,
    request::{
        GetApiDescArgs, GetCategoriesArgs, ListCategoryApisArgs, SaveApiArgs, SearchApisArgs,
        ToolRequest,
    },
};
use crate::{
    cache::ProjectMetadataCache,
    error::{BackendError, BackendResult},
};

const INSTRUCTIONS: &str = "Tools for browsing and editing YApi API documentation. \
Use yapi_list_projects to see the available projects, yapi_get_categories and \
yapi_list_category_apis to browse them, yapi_search_apis to find interfaces by \
title, path or tag, and yapi_get_api_desc for the full definition of one interface.";

#[derive(Clone)]
pub struct YapiToolServer {
    cache: Arc<ProjectMetadataCache>,
}

impl YapiToolServer {
    pub fn new(cache: Arc<ProjectMetadataCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ProjectMetadataCache> {
        &self.cache
    }

    /// Run one decoded request. Backend failures become the `Err` text shown
    /// to the caller as a tool error.
    pub async fn execute(&self, request: ToolRequest) -> BackendResult<String> {
        match request {
            ToolRequest::YapiListProjects(_) => Ok(format::format_projects(
                &self.cache.list_projects(),
                self.cache.credentials().len(),
            )),
            ToolRequest::YapiGetCategories(args) => self.get_categories(args).await,
            ToolRequest::YapiListCategoryApis(args) => self.list_category_apis(args).await,
            ToolRequest::YapiGetApiDesc(args) => self.get_api_desc(args).await,
            ToolRequest::YapiSaveApi(args) => self.save_api(args).await,
            ToolRequest::YapiSearchApis(args) => self.search_apis(args).await,
            ToolRequest::YapiRefreshCache(_) => {
                let scheduled = self.cache.trigger_refresh();
                Ok(format::format_refresh(
                    scheduled,
                    &self.cache.status(),
                    &self.cache.metrics(),
                ))
            }
            ToolRequest::YapiClearCache(_) => {
                let removed = self.cache.clear_cache();
                let scheduled = self.cache.trigger_refresh();
                Ok(format::format_cleared(removed, scheduled))
            }
        }
    }

    async fn get_categories(&self, args: GetCategoriesArgs) -> BackendResult<String> {
        let project_id = args
            .project_id
            .into_id("projectId")
            .map_err(BackendError::InvalidRequest)?;
        let categories = self
            .cache
            .get_categories(&project_id)
            .await?
            .ok_or_else(|| no_token(&project_id))?;

        let label = match self.cache.get_project_info(&project_id).await {
            Ok(Some(info)) => format!("{} ({})", info.name, project_id),
            _ => format!("project {}", project_id),
        };

        if !args.include_apis.unwrap_or(false) {
            return Ok(format::format_categories(&label, &categories, None));
        }

        let listings = join_all(categories.iter().map(|c| {
            let project_id = project_id.as_str();
            async move {
                let result = self
                    .cache
                    .get_category_interfaces(project_id, &c.id)
                    .await
                    .map(Option::unwrap_or_default)
                    .map_err(|e| e.to_string());
                (c.id.clone(), result)
            }
        }))
        .await;
        let interfaces: HashMap<_, _> = listings.into_iter().collect();

        Ok(format::format_categories(
            &label,
            &categories,
            Some(&interfaces),
        ))
    }

    async fn list_category_apis(&self, args: ListCategoryApisArgs) -> BackendResult<String> {
        let project_id = args
            .project_id
            .into_id("projectId")
            .map_err(BackendError::InvalidRequest)?;
        let category_id = args
            .cat_id
            .into_id("catId")
            .map_err(BackendError::InvalidRequest)?;

        let interfaces = self
            .cache
            .get_category_interfaces(&project_id, &category_id)
            .await?
            .ok_or_else(|| no_token(&project_id))?;
        Ok(format::format_interfaces(&category_id, &interfaces))
    }

    async fn get_api_desc(&self, args: GetApiDescArgs) -> BackendResult<String> {
        let project_id = args
            .project_id
            .into_id("projectId")
            .map_err(BackendError::InvalidRequest)?;
        let api_id = args
            .api_id
            .into_id("apiId")
            .map_err(BackendError::InvalidRequest)?;

        if !self.cache.credentials().contains(&project_id) {
            return Err(no_token(&project_id));
        }
        let detail = self.cache.get_interface(&project_id, &api_id).await?;
        Ok(format::format_interface_detail(&detail))
    }

    async fn save_api(&self, args: SaveApiArgs) -> BackendResult<String> {
        let params = args.into_params().map_err(BackendError::InvalidRequest)?;
        if !self.cache.credentials().contains(&params.project_id) {
            return Err(no_token(&params.project_id));
        }
        let id = self.cache.save_interface(&params).await?;
        Ok(format::format_saved(&id, params.is_update()))
    }

    async fn search_apis(&self, args: SearchApisArgs) -> BackendResult<String> {
        let criteria = args.criteria();
        let search = self
            .cache
            .search_interfaces(args.project_keyword.as_deref(), criteria)
            .await?;
        Ok(format::format_search(&search.result, &search.project_ids))
    }
}

fn no_token(project_id: &str) -> BackendError {
    BackendError::Unauthorized(format!("no token configured for project '{}'", project_id))
}

impl ServerHandler for YapiToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(tool_definitions()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let name = request.name.as_ref();
        if !is_known_tool(name) {
            return Err(ErrorData::invalid_params(
                format!("unknown tool: {}", name),
                None,
            ));
        }

        let tool_request = ToolRequest::parse(name, request.arguments.clone()).map_err(|e| {
            ErrorData::invalid_params(format!("invalid arguments for {}: {}", name, e), None)
        })?;

        debug!(tool = %name, "Executing tool");
        match self.execute(tool_request).await {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(e) => {
                if matches!(e, BackendError::InvalidRequest(_)) {
                    info!(tool = %name, "Rejected tool call: {}", e);
                } else {
                    warn!(tool = %name, "Tool call failed: {}", e);
                }
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}
