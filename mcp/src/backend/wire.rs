//! Raw YApi response shapes and their conversion into domain types.

use serde::{Deserialize, Deserializer};

use super::types::{CategoryInfo, InterfaceDetail, InterfaceParam, InterfaceSummary, ProjectInfo};

/// Application error code YApi uses for a missing or rejected token.
pub(crate) const ERRCODE_NO_PERMISSION: i64 = 40011;

/// `{errcode, errmsg, data}` wrapper around every backend response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub errcode: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub errmsg: String,
    pub data: Option<T>,
}

/// YApi mixes numeric and string ids; both normalize to `String`.
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Float(f64),
        Text(String),
        Null(()),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Int(n) => n.to_string(),
        RawId::Float(f) => format!("{}", f),
        RawId::Text(s) => s,
        RawId::Null(()) => String::new(),
    })
}

/// `"1"`, `1` and `true` are all "required".
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_i64() == Some(1),
        serde_json::Value::String(s) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

/// Explicit `null` reads as the field's default.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireProject {
    #[serde(rename = "_id", deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub desc: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub basepath: String,
    #[serde(default, deserialize_with = "id_string")]
    pub group_id: String,
    #[serde(default, deserialize_with = "id_string")]
    pub uid: String,
}

impl From<WireProject> for ProjectInfo {
    fn from(p: WireProject) -> Self {
        ProjectInfo {
            id: p.id,
            name: p.name,
            description: p.desc,
            base_path: p.basepath,
            group_id: p.group_id,
            owner_id: p.uid,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireCategory {
    #[serde(rename = "_id", deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "id_string")]
    pub project_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub desc: String,
    #[serde(default, deserialize_with = "null_default")]
    pub add_time: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub up_time: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub index: i64,
}

impl From<WireCategory> for CategoryInfo {
    fn from(c: WireCategory) -> Self {
        CategoryInfo {
            id: c.id,
            project_id: c.project_id,
            name: c.name,
            description: c.desc,
            created_at: c.add_time,
            updated_at: c.up_time,
            sort_index: c.index,
        }
    }
}

/// Paged interface listing (`list_cat` and `list`).
#[derive(Debug, Deserialize)]
pub(crate) struct WireInterfacePage {
    #[serde(default, deserialize_with = "null_default")]
    pub count: usize,
    #[serde(default, deserialize_with = "null_default")]
    pub list: Vec<WireInterfaceSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireInterfaceSummary {
    #[serde(rename = "_id", deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "id_string")]
    pub project_id: String,
    #[serde(default, deserialize_with = "id_string")]
    pub catid: String,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub path: String,
    #[serde(default, deserialize_with = "null_default")]
    pub method: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(default, deserialize_with = "null_default")]
    pub tag: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub up_time: i64,
}

impl From<WireInterfaceSummary> for InterfaceSummary {
    fn from(i: WireInterfaceSummary) -> Self {
        InterfaceSummary {
            id: i.id,
            project_id: i.project_id,
            category_id: i.catid,
            title: i.title,
            path: i.path,
            method: i.method.to_uppercase(),
            status: i.status,
            tags: i.tag,
            updated_at: i.up_time,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireParam {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub example: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub desc: String,
    #[serde(default, deserialize_with = "flag")]
    pub required: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub kind: String,
}

impl From<WireParam> for InterfaceParam {
    fn from(p: WireParam) -> Self {
        InterfaceParam {
            name: p.name,
            example: p.example,
            description: p.desc,
            required: p.required,
            value: if p.value.is_empty() { p.kind } else { p.value },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireInterfaceDetail {
    #[serde(flatten)]
    pub summary: WireInterfaceSummary,
    #[serde(default, deserialize_with = "lenient_string")]
    pub desc: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub markdown: String,
    #[serde(default, deserialize_with = "null_default")]
    pub req_params: Vec<WireParam>,
    #[serde(default, deserialize_with = "null_default")]
    pub req_query: Vec<WireParam>,
    #[serde(default, deserialize_with = "null_default")]
    pub req_headers: Vec<WireParam>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub req_body_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub req_body_other: String,
    #[serde(default, deserialize_with = "null_default")]
    pub req_body_form: Vec<WireParam>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub res_body_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub res_body: String,
    #[serde(default, deserialize_with = "null_default")]
    pub add_time: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub username: String,
}

fn convert_params(params: Vec<WireParam>) -> Vec<InterfaceParam> {
    params.into_iter().map(InterfaceParam::from).collect()
}

impl From<WireInterfaceDetail> for InterfaceDetail {
    fn from(d: WireInterfaceDetail) -> Self {
        InterfaceDetail {
            summary: d.summary.into(),
            description: d.desc,
            markdown: d.markdown,
            req_params: convert_params(d.req_params),
            req_query: convert_params(d.req_query),
            req_headers: convert_params(d.req_headers),
            req_body_type: d.req_body_type,
            req_body_other: d.req_body_other,
            req_body_form: convert_params(d.req_body_form),
            res_body_type: d.res_body_type,
            res_body: d.res_body,
            created_at: d.add_time,
            username: d.username,
        }
    }
}

/// `data` of a successful `interface/add`.
#[derive(Debug, Deserialize)]
pub(crate) struct WireCreated {
    #[serde(rename = "_id", deserialize_with = "id_string")]
    pub id: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_project_conversion_normalizes_ids() {
        let wire: WireProject = serde_json::from_value(json!({
            "_id": 11,
            "name": "Payments",
            "desc": null,
            "basepath": "/pay",
            "group_id": 3,
            "uid": "42"
        }))
        .unwrap();
        let info = ProjectInfo::from(wire);
        assert_eq!(info.id, "11");
        assert_eq!(info.group_id, "3");
        assert_eq!(info.owner_id, "42");
        assert_eq!(info.description, "");
    }

    #[test]
    fn test_detail_conversion() {
        let wire: WireInterfaceDetail = serde_json::from_value(json!({
            "_id": 99,
            "project_id": 11,
            "catid": 5,
            "title": "Create order",
            "path": "/orders",
            "method": "post",
            "status": "done",
            "tag": ["orders"],
            "up_time": 1700000000,
            "req_query": [{"name": "dry_run", "required": "0", "desc": "no side effects"}],
            "req_headers": [{"name": "Content-Type", "value": "application/json", "required": "1"}],
            "req_body_form": [{"name": "file", "type": "file", "required": 1}],
            "req_body_type": "json",
            "req_body_other": "{\"type\":\"object\"}",
            "res_body_type": "json",
            "res_body": "{}",
            "add_time": 1690000000
        }))
        .unwrap();

        let detail = InterfaceDetail::from(wire);
        assert_eq!(detail.summary.id, "99");
        assert_eq!(detail.summary.category_id, "5");
        assert_eq!(detail.summary.method, "POST");
        assert!(!detail.req_query[0].required);
        assert!(detail.req_headers[0].required);
        assert_eq!(detail.req_headers[0].value, "application/json");
        assert_eq!(detail.req_body_form[0].value, "file");
        assert!(detail.req_body_form[0].required);
        assert_eq!(detail.created_at, 1690000000);
    }

    #[test]
    fn test_listing_tolerates_null_fields() {
        let page: WireInterfacePage = serde_json::from_value(json!({
            "count": 2,
            "list": [
                {"_id": 1, "catid": 5, "title": null, "path": "/a", "method": "get", "tag": null, "up_time": null},
                {"_id": 2, "catid": 5, "title": "B", "path": null, "method": null, "tag": ["x"], "up_time": 1700000000}
            ]
        }))
        .unwrap();

        let items: Vec<InterfaceSummary> = page.list.into_iter().map(Into::into).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "");
        assert!(items[0].tags.is_empty());
        assert_eq!(items[0].updated_at, 0);
        assert_eq!(items[1].path, "");
        assert_eq!(items[1].method, "");
        assert_eq!(items[1].tags, vec!["x"]);
    }

    #[test]
    fn test_envelope_with_error() {
        let env: Envelope<WireProject> =
            serde_json::from_value(json!({"errcode": 40011, "errmsg": "请登录...", "data": null}))
                .unwrap();
        assert_eq!(env.errcode, ERRCODE_NO_PERMISSION);
        assert!(env.data.is_none());
    }
}
