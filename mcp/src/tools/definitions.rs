//! Tool metadata advertised through `tools/list`.

use std::sync::Arc;

use rmcp::model::{JsonObject, Tool, ToolAnnotations};
use schemars::JsonSchema;

use super::request::{
    GetApiDescArgs, GetCategoriesArgs, ListCategoryApisArgs, NoArgs, SaveApiArgs, SearchApisArgs,
};

pub const LIST_PROJECTS: &str = "yapi_list_projects";
pub const GET_CATEGORIES: &str = "yapi_get_categories";
pub const LIST_CATEGORY_APIS: &str = "yapi_list_category_apis";
pub const GET_API_DESC: &str = "yapi_get_api_desc";
pub const SAVE_API: &str = "yapi_save_api";
pub const SEARCH_APIS: &str = "yapi_search_apis";
pub const REFRESH_CACHE: &str = "yapi_refresh_cache";
pub const CLEAR_CACHE: &str = "yapi_clear_cache";

pub const TOOL_NAMES: [&str; 8] = [
    LIST_PROJECTS,
    GET_CATEGORIES,
    LIST_CATEGORY_APIS,
    GET_API_DESC,
    SAVE_API,
    SEARCH_APIS,
    REFRESH_CACHE,
    CLEAR_CACHE,
];

pub fn is_known_tool(name: &str) -> bool {
    TOOL_NAMES.contains(&name)
}

fn schema_of<T: JsonSchema>() -> Arc<JsonObject> {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(schema) {
        Ok(serde_json::Value::Object(map)) => Arc::new(map),
        _ => Arc::new(JsonObject::new()),
    }
}

fn read_only(mut tool: Tool) -> Tool {
    tool.annotations = Some(ToolAnnotations::new().read_only(true));
    tool
}

pub fn tool_definitions() -> Vec<Tool> {
    vec![
        read_only(Tool::new(
            LIST_PROJECTS,
            "List the YApi projects this server holds tokens for",
            schema_of::<NoArgs>(),
        )),
        read_only(Tool::new(
            GET_CATEGORIES,
            "List the interface categories of a project, optionally with their interfaces",
            schema_of::<GetCategoriesArgs>(),
        )),
        read_only(Tool::new(
            LIST_CATEGORY_APIS,
            "List the interfaces in one category",
            schema_of::<ListCategoryApisArgs>(),
        )),
        read_only(Tool::new(
            GET_API_DESC,
            "Show the full definition of an interface: parameters, headers, request and response bodies",
            schema_of::<GetApiDescArgs>(),
        )),
        Tool::new(
            SAVE_API,
            "Create an interface (omit id) or update an existing one (pass id)",
            schema_of::<SaveApiArgs>(),
        ),
        read_only(Tool::new(
            SEARCH_APIS,
            "Search interfaces by title, path or tag across one or all projects",
            schema_of::<SearchApisArgs>(),
        )),
        Tool::new(
            REFRESH_CACHE,
            "Refresh cached project and category metadata in the background",
            schema_of::<NoArgs>(),
        ),
        Tool::new(
            CLEAR_CACHE,
            "Delete cached project metadata from memory and disk, then rebuild it",
            schema_of::<NoArgs>(),
        ),
    ]
}
