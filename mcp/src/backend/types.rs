//! Domain types returned by the backend client.
//!
//! These are the shapes the cache stores and the tool layer formats. The raw
//! backend wire format lives in `wire.rs` and is converted on receipt.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub owner_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInfo {
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Epoch seconds
    #[serde(default)]
    pub created_at: i64,
    /// Epoch seconds
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub sort_index: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceSummary {
    pub id: String,
    pub project_id: String,
    pub category_id: String,
    pub title: String,
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub updated_at: i64,
}

/// One row of a query/header/path/form parameter list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceParam {
    pub name: String,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    /// Fixed value for headers, field type for forms
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDetail {
    #[serde(flatten)]
    pub summary: InterfaceSummary,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub req_params: Vec<InterfaceParam>,
    #[serde(default)]
    pub req_query: Vec<InterfaceParam>,
    #[serde(default)]
    pub req_headers: Vec<InterfaceParam>,
    #[serde(default)]
    pub req_body_type: String,
    #[serde(default)]
    pub req_body_other: String,
    #[serde(default)]
    pub req_body_form: Vec<InterfaceParam>,
    #[serde(default)]
    pub res_body_type: String,
    #[serde(default)]
    pub res_body: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub username: String,
}

/// Upsert payload. `id` present selects update, absent selects create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveInterfaceParams {
    pub id: Option<String>,
    pub project_id: String,
    pub category_id: Option<String>,
    pub title: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub markdown: Option<String>,
    pub req_query: Option<Vec<InterfaceParam>>,
    pub req_headers: Option<Vec<InterfaceParam>>,
    pub req_body_type: Option<String>,
    pub req_body_other: Option<String>,
    pub res_body_type: Option<String>,
    pub res_body: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl SaveInterfaceParams {
    pub fn is_update(&self) -> bool {
        self.id.is_some()
    }

    /// Required-field check for creates; updates may be partial.
    pub fn validate(&self) -> Result<(), String> {
        if self.project_id.trim().is_empty() {
            return Err("projectId is required".to_string());
        }
        if self.is_update() {
            return Ok(());
        }

        let missing: Vec<&str> = [
            ("catId", self.category_id.as_deref()),
            ("title", self.title.as_deref()),
            ("path", self.path.as_deref()),
            ("method", self.method.as_deref()),
        ]
        .into_iter()
        .filter(|(_, v)| v.map(str::trim).map_or(true, str::is_empty))
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "creating an interface requires: {}",
                missing.join(", ")
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    pub project_ids: Vec<String>,
    pub name_keyword: Option<String>,
    pub path_keyword: Option<String>,
    pub tag_keyword: Option<String>,
    pub limit: usize,
}

impl SearchCriteria {
    pub const DEFAULT_LIMIT: usize = 20;

    /// Case-insensitive substring match on every keyword that is set.
    pub fn matches(&self, item: &InterfaceSummary) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            match needle.as_deref().map(str::trim) {
                None | Some("") => true,
                Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
            }
        }

        let tag_ok = match self.tag_keyword.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(tag) => {
                let tag = tag.to_lowercase();
                item.tags.iter().any(|t| t.to_lowercase().contains(&tag))
            }
        };

        contains(&item.title, &self.name_keyword)
            && contains(&item.path, &self.path_keyword)
            && tag_ok
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub total: usize,
    pub items: Vec<InterfaceSummary>,
}
