//! Typed tool arguments.
//!
//! `tools/call` payloads are decoded here into [`ToolRequest`]; nothing past
//! this module sees raw JSON arguments.

use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::backend::{InterfaceParam, SaveInterfaceParams, SearchCriteria};

pub const MAX_SEARCH_LIMIT: usize = 100;

/// A project, category or interface id. Clients send either form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum IdArg {
    Number(u64),
    Text(String),
}

impl IdArg {
    pub fn into_id(self, field: &str) -> Result<String, String> {
        match self {
            IdArg::Number(n) => Ok(n.to_string()),
            IdArg::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    Err(format!("{} must not be empty", field))
                } else {
                    Ok(s.to_string())
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct NoArgs {}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetCategoriesArgs {
    #[schemars(description = "YApi project id")]
    pub project_id: IdArg,
    #[schemars(description = "Also list the interfaces of every category")]
    #[serde(default)]
    pub include_apis: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListCategoryApisArgs {
    #[schemars(description = "YApi project id")]
    pub project_id: IdArg,
    #[schemars(description = "Category id")]
    pub cat_id: IdArg,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetApiDescArgs {
    #[schemars(description = "YApi project id")]
    pub project_id: IdArg,
    #[schemars(description = "Interface id")]
    pub api_id: IdArg,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct ParamArg {
    pub name: String,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
    #[schemars(description = "Fixed header value")]
    #[serde(default)]
    pub value: Option<String>,
}

impl From<ParamArg> for InterfaceParam {
    fn from(p: ParamArg) -> Self {
        InterfaceParam {
            name: p.name,
            example: p.example.unwrap_or_default(),
            description: p.desc.unwrap_or_default(),
            required: p.required.unwrap_or(false),
            value: p.value.unwrap_or_default(),
        }
    }
}

/// Create when `id` is absent, update otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveApiArgs {
    #[schemars(description = "YApi project id")]
    pub project_id: IdArg,
    #[schemars(description = "Interface id; omit to create a new interface")]
    #[serde(default)]
    pub id: Option<IdArg>,
    #[schemars(description = "Category id (required when creating)")]
    #[serde(default)]
    pub cat_id: Option<IdArg>,
    #[schemars(description = "Interface title (required when creating)")]
    #[serde(default)]
    pub title: Option<String>,
    #[schemars(description = "Request path, e.g. /api/users (required when creating)")]
    #[serde(default)]
    pub path: Option<String>,
    #[schemars(description = "HTTP method (required when creating)")]
    #[serde(default)]
    pub method: Option<String>,
    #[schemars(description = "done or undone")]
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub req_query: Option<Vec<ParamArg>>,
    #[serde(default)]
    pub req_headers: Option<Vec<ParamArg>>,
    #[schemars(description = "form, json, file or raw")]
    #[serde(default)]
    pub req_body_type: Option<String>,
    #[schemars(description = "Request body (JSON schema text when reqBodyType is json)")]
    #[serde(default)]
    pub req_body_other: Option<String>,
    #[schemars(description = "json or raw")]
    #[serde(default)]
    pub res_body_type: Option<String>,
    #[serde(default)]
    pub res_body: Option<String>,
    #[serde(default)]
    pub tag: Option<Vec<String>>,
}

impl SaveApiArgs {
    pub fn into_params(self) -> Result<SaveInterfaceParams, String> {
        let convert =
            |params: Option<Vec<ParamArg>>| params.map(|p| p.into_iter().map(Into::into).collect());

        Ok(SaveInterfaceParams {
            id: self.id.map(|id| id.into_id("id")).transpose()?,
            project_id: self.project_id.into_id("projectId")?,
            category_id: self.cat_id.map(|id| id.into_id("catId")).transpose()?,
            title: self.title,
            path: self.path,
            method: self.method.map(|m| m.trim().to_uppercase()),
            status: self.status,
            description: self.desc,
            markdown: self.markdown,
            req_query: convert(self.req_query),
            req_headers: convert(self.req_headers),
            req_body_type: self.req_body_type,
            req_body_other: self.req_body_other,
            res_body_type: self.res_body_type,
            res_body: self.res_body,
            tags: self.tag,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchApisArgs {
    #[schemars(description = "Project id or part of a project name; all projects when omitted")]
    #[serde(default)]
    pub project_keyword: Option<String>,
    #[schemars(description = "Part of the interface title")]
    #[serde(default)]
    pub name_keyword: Option<String>,
    #[schemars(description = "Part of the interface path")]
    #[serde(default)]
    pub path_keyword: Option<String>,
    #[schemars(description = "Part of an interface tag")]
    #[serde(default)]
    pub tag_keyword: Option<String>,
    #[schemars(description = "Maximum results (default 20, max 100)")]
    #[serde(default)]
    pub limit: Option<u64>,
}

impl SearchApisArgs {
    /// Project ids are filled in by the cache from `project_keyword`.
    pub fn criteria(&self) -> SearchCriteria {
        let limit = self
            .limit
            .map_or(SearchCriteria::DEFAULT_LIMIT, |l| {
                usize::try_from(l).unwrap_or(MAX_SEARCH_LIMIT)
            })
            .clamp(1, MAX_SEARCH_LIMIT);

        SearchCriteria {
            project_ids: Vec::new(),
            name_keyword: self.name_keyword.clone(),
            path_keyword: self.path_keyword.clone(),
            tag_keyword: self.tag_keyword.clone(),
            limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolRequest {
    YapiListProjects(NoArgs),
    YapiGetCategories(GetCategoriesArgs),
    YapiListCategoryApis(ListCategoryApisArgs),
    YapiGetApiDesc(GetApiDescArgs),
    YapiSaveApi(SaveApiArgs),
    YapiSearchApis(SearchApisArgs),
    YapiRefreshCache(NoArgs),
    YapiClearCache(NoArgs),
}

impl ToolRequest {
    /// Missing arguments decode as `{}`.
    pub fn parse(name: &str, arguments: Option<JsonObject>) -> Result<Self, serde_json::Error> {
        let arguments = Value::Object(arguments.unwrap_or_default());
        serde_json::from_value(json!({ "name": name, "arguments": arguments }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Option<JsonObject> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    #[test]
    fn test_parse_without_arguments() {
        let request = ToolRequest::parse("yapi_list_projects", None).unwrap();
        assert_eq!(request, ToolRequest::YapiListProjects(NoArgs {}));
    }

    #[test]
    fn test_ids_accept_numbers_and_strings() {
        let request = ToolRequest::parse(
            "yapi_get_api_desc",
            args(json!({"projectId": 11, "apiId": "99"})),
        )
        .unwrap();
        let ToolRequest::YapiGetApiDesc(a) = request else {
            panic!("wrong variant");
        };
        assert_eq!(a.project_id.into_id("projectId").unwrap(), "11");
        assert_eq!(a.api_id.into_id("apiId").unwrap(), "99");
    }

    #[test]
    fn test_missing_required_argument_fails() {
        let err = ToolRequest::parse("yapi_list_category_apis", args(json!({"projectId": 11})))
            .unwrap_err();
        assert!(err.to_string().contains("catId"));
    }

    #[test]
    fn test_unknown_tool_fails() {
        assert!(ToolRequest::parse("yapi_drop_everything", None).is_err());
    }

    #[test]
    fn test_blank_id_rejected() {
        assert!(IdArg::Text("  ".to_string()).into_id("projectId").is_err());
    }

    #[test]
    fn test_save_args_conversion() {
        let request = ToolRequest::parse(
            "yapi_save_api",
            args(json!({
                "projectId": "11",
                "catId": 5,
                "title": "List users",
                "path": "/api/users",
                "method": "get",
                "reqHeaders": [{"name": "Accept", "value": "application/json", "required": true}],
                "tag": ["users"]
            })),
        )
        .unwrap();
        let ToolRequest::YapiSaveApi(a) = request else {
            panic!("wrong variant");
        };
        let params = a.into_params().unwrap();
        assert!(!params.is_update());
        assert_eq!(params.category_id.as_deref(), Some("5"));
        assert_eq!(params.method.as_deref(), Some("GET"));
        let headers = params.req_headers.as_ref().unwrap();
        assert_eq!(headers[0].value, "application/json");
        assert!(headers[0].required);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_search_limit_is_clamped() {
        let default = SearchApisArgs::default().criteria();
        assert_eq!(default.limit, SearchCriteria::DEFAULT_LIMIT);

        let big = SearchApisArgs {
            limit: Some(5000),
            ..Default::default()
        };
        assert_eq!(big.criteria().limit, MAX_SEARCH_LIMIT);

        let zero = SearchApisArgs {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.criteria().limit, 1);
    }
}
