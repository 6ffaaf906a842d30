//! HTTP client for the YApi open API.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use url::Url;

use super::{
    types::{
        CategoryInfo, InterfaceDetail, InterfaceParam, InterfaceSummary, ProjectInfo,
        SaveInterfaceParams, SearchCriteria, SearchResult,
    },
    wire::{
        Envelope, WireCategory, WireCreated, WireInterfaceDetail, WireInterfacePage, WireProject,
        ERRCODE_NO_PERMISSION,
    },
    Backend,
};
use crate::{
    config::BackendConfig,
    credentials::{CredentialTable, ProjectToken},
    error::{BackendError, BackendResult},
};

const MAX_ERROR_BODY: usize = 256;

#[derive(Clone)]
pub struct YapiClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<CredentialTable>,
    page_size: u32,
}

impl YapiClient {
    pub fn new(config: &BackendConfig, credentials: Arc<CredentialTable>) -> BackendResult<Self> {
        config.validate().map_err(BackendError::InvalidRequest)?;

        let mut base_url = Url::parse(config.base_url.trim())
            .map_err(|e| BackendError::InvalidRequest(format!("invalid base_url: {}", e)))?;
        // `Url::join` drops the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| BackendError::Transport(format!("build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            credentials,
            page_size: config.page_size,
        })
    }

    pub fn credentials(&self) -> &Arc<CredentialTable> {
        &self.credentials
    }

    fn token(&self, project_id: &str) -> BackendResult<&ProjectToken> {
        match self.credentials.lookup(project_id) {
            Some(token) if !token.is_empty() => Ok(token),
            Some(_) => Err(BackendError::Unauthorized(format!(
                "empty token configured for project '{}'",
                project_id
            ))),
            None => Err(BackendError::Unauthorized(format!(
                "no token configured for project '{}'",
                project_id
            ))),
        }
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::InvalidRequest(format!("build URL for {}: {}", path, e)))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        project_id: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> BackendResult<T> {
        let token = self.token(project_id)?;
        let url = self.endpoint(path)?;
        debug!(project_id = %project_id, token = %token, "GET {}", path);

        let response = self
            .http
            .get(url)
            .query(query)
            .query(&[("token", token.expose())])
            .send()
            .await?;
        Self::decode(path, response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        project_id: &str,
        path: &str,
        mut body: Map<String, Value>,
    ) -> BackendResult<T> {
        let token = self.token(project_id)?;
        let url = self.endpoint(path)?;
        debug!(project_id = %project_id, token = %token, "POST {}", path);

        body.insert("token".to_string(), Value::String(token.expose().to_string()));
        let response = self.http.post(url).json(&body).send().await?;
        Self::decode(path, response).await
    }

    async fn decode<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> BackendResult<T> {
        let status = response.status();
        let body = response.text().await?;

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(BackendError::Unauthorized(format!("{}: HTTP {}", path, status)));
            }
            StatusCode::NOT_FOUND => {
                return Err(BackendError::NotFound(format!("{}: HTTP {}", path, status)));
            }
            s if !s.is_success() => {
                return Err(BackendError::Remote {
                    code: i64::from(s.as_u16()),
                    message: truncate(&body),
                });
            }
            _ => {}
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| BackendError::Decode(format!("{}: {}", path, e)))?;

        match envelope.errcode {
            0 => envelope.data.ok_or_else(|| {
                BackendError::NotFound(format!("{}: empty response data", path))
            }),
            ERRCODE_NO_PERMISSION => Err(BackendError::Unauthorized(envelope.errmsg)),
            code => Err(BackendError::Remote {
                code,
                message: envelope.errmsg,
            }),
        }
    }

    async fn list_project_interfaces(
        &self,
        project_id: &str,
    ) -> BackendResult<Vec<InterfaceSummary>> {
        let page_size = self.page_size.to_string();
        let page: WireInterfacePage = self
            .get(
                project_id,
                "api/interface/list",
                &[
                    ("project_id", project_id),
                    ("page", "1"),
                    ("limit", page_size.as_str()),
                ],
            )
            .await?;
        if page.count > page.list.len() {
            debug!(
                project_id = %project_id,
                "Interface listing truncated at {} of {}",
                page.list.len(),
                page.count
            );
        }
        Ok(page.list.into_iter().map(Into::into).collect())
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

fn params_to_value(params: &[InterfaceParam]) -> Value {
    Value::Array(
        params
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "example": p.example,
                    "desc": p.description,
                    "required": if p.required { "1" } else { "0" },
                    "value": p.value,
                })
            })
            .collect(),
    )
}

/// Backend field names for a save call; only fields that are set are sent.
fn save_body(params: &SaveInterfaceParams) -> Map<String, Value> {
    let mut body = Map::new();
    let mut put = |key: &str, value: Option<Value>| {
        if let Some(v) = value {
            body.insert(key.to_string(), v);
        }
    };

    let text = |v: &Option<String>| v.as_ref().map(|s| Value::String(s.clone()));

    put("id", params.id.as_deref().map(number_or_string));
    if params.id.is_none() {
        put("project_id", Some(number_or_string(&params.project_id)));
    }
    put("catid", params.category_id.as_deref().map(number_or_string));
    put("title", text(&params.title));
    put("path", text(&params.path));
    put(
        "method",
        params.method.as_ref().map(|m| Value::String(m.to_uppercase())),
    );
    put("status", text(&params.status));
    put("desc", text(&params.description));
    put("markdown", text(&params.markdown));
    put("req_query", params.req_query.as_deref().map(params_to_value));
    put("req_headers", params.req_headers.as_deref().map(params_to_value));
    put("req_body_type", text(&params.req_body_type));
    put("req_body_other", text(&params.req_body_other));
    if params.req_body_other.is_some() {
        put("req_body_is_json_schema", Some(Value::Bool(true)));
    }
    put("res_body_type", text(&params.res_body_type));
    put("res_body", text(&params.res_body));
    if params.res_body.is_some() {
        put("res_body_is_json_schema", Some(Value::Bool(true)));
    }
    put(
        "tag",
        params
            .tags
            .as_ref()
            .map(|tags| Value::Array(tags.iter().cloned().map(Value::String).collect())),
    );

    body
}

fn number_or_string(id: &str) -> Value {
    id.parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(id.to_string()))
}

#[async_trait]
impl Backend for YapiClient {
    async fn get_project_info(&self, project_id: &str) -> BackendResult<ProjectInfo> {
        let project: WireProject = self.get(project_id, "api/project/get", &[]).await?;
        Ok(project.into())
    }

    async fn get_category_list(&self, project_id: &str) -> BackendResult<Vec<CategoryInfo>> {
        let categories: Vec<WireCategory> = self
            .get(
                project_id,
                "api/interface/getCatMenu",
                &[("project_id", project_id)],
            )
            .await?;
        Ok(categories.into_iter().map(Into::into).collect())
    }

    async fn get_category_interfaces(
        &self,
        project_id: &str,
        category_id: &str,
    ) -> BackendResult<Vec<InterfaceSummary>> {
        let page_size = self.page_size.to_string();
        let page: WireInterfacePage = self
            .get(
                project_id,
                "api/interface/list_cat",
                &[("catid", category_id), ("page", "1"), ("limit", page_size.as_str())],
            )
            .await?;
        Ok(page.list.into_iter().map(Into::into).collect())
    }

    async fn get_interface(
        &self,
        project_id: &str,
        interface_id: &str,
    ) -> BackendResult<InterfaceDetail> {
        let detail: WireInterfaceDetail = self
            .get(project_id, "api/interface/get", &[("id", interface_id)])
            .await?;
        Ok(detail.into())
    }

    async fn save_interface(&self, params: &SaveInterfaceParams) -> BackendResult<String> {
        params.validate().map_err(BackendError::InvalidRequest)?;
        let body = save_body(params);

        match &params.id {
            Some(id) => {
                let _: Value = self
                    .post(&params.project_id, "api/interface/up", body)
                    .await?;
                Ok(id.clone())
            }
            None => {
                let created: WireCreated = self
                    .post(&params.project_id, "api/interface/add", body)
                    .await?;
                Ok(created.id)
            }
        }
    }

    async fn search_interfaces(&self, criteria: &SearchCriteria) -> BackendResult<SearchResult> {
        let listings = join_all(
            criteria
                .project_ids
                .iter()
                .map(|id| self.list_project_interfaces(id)),
        )
        .await;

        let single_project = criteria.project_ids.len() == 1;
        let mut first_error = None;
        let mut any_ok = false;
        let mut matched = Vec::new();

        for (project_id, listing) in criteria.project_ids.iter().zip(listings) {
            match listing {
                Ok(items) => {
                    any_ok = true;
                    matched.extend(items.into_iter().filter(|item| criteria.matches(item)));
                }
                Err(e) if single_project => return Err(e),
                Err(e) => {
                    warn!(project_id = %project_id, "Search skipped project: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if !any_ok {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let total = matched.len();
        matched.truncate(criteria.limit);
        Ok(SearchResult {
            total,
            items: matched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_fails_before_network() {
        // Port 9 (discard) is never contacted: the lookup fails first.
        let config = BackendConfig::new("http://127.0.0.1:9");
        let client = YapiClient::new(&config, Arc::new(CredentialTable::parse("10:abc"))).unwrap();

        let err = client.get_project_info("20").await.unwrap_err();
        assert!(matches!(err, BackendError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_empty_token_fails_before_network() {
        let config = BackendConfig::new("http://127.0.0.1:9");
        let client = YapiClient::new(&config, Arc::new(CredentialTable::parse("10:abc,30:"))).unwrap();

        match client.get_category_list("30").await.unwrap_err() {
            BackendError::Unauthorized(message) => assert!(message.contains("empty token")),
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = BackendConfig::new("https://yapi.example.com/prefix");
        let client = YapiClient::new(&config, Arc::new(CredentialTable::default())).unwrap();
        assert_eq!(
            client.endpoint("api/project/get").unwrap().as_str(),
            "https://yapi.example.com/prefix/api/project/get"
        );
    }

    #[test]
    fn test_save_body_for_create() {
        let params = SaveInterfaceParams {
            project_id: "11".to_string(),
            category_id: Some("5".to_string()),
            title: Some("Create order".to_string()),
            path: Some("/orders".to_string()),
            method: Some("post".to_string()),
            res_body: Some("{}".to_string()),
            tags: Some(vec!["orders".to_string()]),
            ..Default::default()
        };
        let body = save_body(&params);
        assert_eq!(body["project_id"], json!(11));
        assert_eq!(body["catid"], json!(5));
        assert_eq!(body["method"], json!("POST"));
        assert_eq!(body["res_body_is_json_schema"], json!(true));
        assert_eq!(body["tag"], json!(["orders"]));
        assert!(!body.contains_key("id"));
        assert!(!body.contains_key("markdown"));
    }

    #[test]
    fn test_save_body_for_update_omits_project() {
        let params = SaveInterfaceParams {
            id: Some("99".to_string()),
            project_id: "11".to_string(),
            markdown: Some("docs".to_string()),
            ..Default::default()
        };
        let body = save_body(&params);
        assert_eq!(body["id"], json!(99));
        assert!(!body.contains_key("project_id"));
        assert_eq!(body["markdown"], json!("docs"));
    }

    #[test]
    fn test_truncate_long_bodies() {
        let body = "x".repeat(1000);
        let out = truncate(&body);
        assert_eq!(out.len(), MAX_ERROR_BODY + 3);
        assert!(out.ends_with("..."));
    }
}
