//! Markdown rendering of tool results.

use std::{collections::HashMap, fmt::Write};

use chrono::DateTime;

use crate::{
    backend::{
        CategoryInfo, InterfaceDetail, InterfaceParam, InterfaceSummary, ProjectInfo,
        SearchResult,
    },
    cache::{CacheMetricsSnapshot, RefreshStatus},
};

fn format_time(epoch_secs: i64) -> String {
    if epoch_secs <= 0 {
        return "-".to_string();
    }
    DateTime::from_timestamp(epoch_secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch_secs.to_string())
}

fn format_time_millis(epoch_ms: i64) -> String {
    format_time(epoch_ms / 1000)
}

/// Table cells cannot hold raw pipes or newlines.
fn cell(text: &str) -> String {
    if text.is_empty() {
        return "-".to_string();
    }
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

pub fn format_projects(projects: &[ProjectInfo], configured: usize) -> String {
    if projects.is_empty() {
        return if configured == 0 {
            "No projects are configured.".to_string()
        } else {
            format!(
                "No project metadata is cached yet ({} configured). The cache may still be refreshing; try again shortly.",
                configured
            )
        };
    }

    let mut out = format!("# Projects ({})\n\n", projects.len());
    for p in projects {
        let _ = write!(out, "- **{}** (id: {})", p.name, p.id);
        if !p.base_path.is_empty() {
            let _ = write!(out, ", base path `{}`", p.base_path);
        }
        if !p.description.is_empty() {
            let _ = write!(out, ": {}", p.description.trim());
        }
        out.push('\n');
    }
    if projects.len() < configured {
        let _ = writeln!(
            out,
            "\n{} configured project(s) have no cached metadata yet.",
            configured - projects.len()
        );
    }
    out
}

fn interface_line(out: &mut String, indent: &str, i: &InterfaceSummary) {
    let _ = write!(
        out,
        "{}- `{} {}` {} (id: {})",
        indent, i.method, i.path, i.title, i.id
    );
    if !i.tags.is_empty() {
        let _ = write!(out, " [{}]", i.tags.join(", "));
    }
    out.push('\n');
}

/// `interfaces` maps category id to its listing when interfaces were requested.
pub fn format_categories(
    project_label: &str,
    categories: &[CategoryInfo],
    interfaces: Option<&HashMap<String, Result<Vec<InterfaceSummary>, String>>>,
) -> String {
    if categories.is_empty() {
        return format!("Project {} has no categories.", project_label);
    }

    let mut out = format!(
        "# Categories of {} ({})\n\n",
        project_label,
        categories.len()
    );
    for c in categories {
        let _ = write!(out, "- **{}** (id: {})", c.name, c.id);
        if !c.description.is_empty() {
            let _ = write!(out, ": {}", c.description.trim());
        }
        out.push('\n');

        match interfaces.and_then(|m| m.get(&c.id)) {
            Some(Ok(list)) if list.is_empty() => out.push_str("  - (no interfaces)\n"),
            Some(Ok(list)) => {
                for i in list {
                    interface_line(&mut out, "  ", i);
                }
            }
            Some(Err(e)) => {
                let _ = writeln!(out, "  - (failed to load interfaces: {})", e);
            }
            None => {}
        }
    }
    out
}

pub fn format_interfaces(category_id: &str, interfaces: &[InterfaceSummary]) -> String {
    if interfaces.is_empty() {
        return format!("Category {} has no interfaces.", category_id);
    }
    let mut out = format!(
        "# Interfaces in category {} ({})\n\n",
        category_id,
        interfaces.len()
    );
    for i in interfaces {
        interface_line(&mut out, "", i);
    }
    out
}

fn param_table(out: &mut String, title: &str, params: &[InterfaceParam], value_header: &str) {
    if params.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n### {}\n", title);
    let _ = writeln!(
        out,
        "| Name | Required | {} | Example | Description |",
        value_header
    );
    out.push_str("|------|----------|------|---------|-------------|\n");
    for p in params {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            cell(&p.name),
            if p.required { "yes" } else { "no" },
            cell(&p.value),
            cell(&p.example),
            cell(&p.description)
        );
    }
}

fn body_block(out: &mut String, title: &str, kind: &str, body: &str) {
    if body.trim().is_empty() {
        return;
    }
    let lang = if kind.eq_ignore_ascii_case("json") {
        "json"
    } else {
        ""
    };
    let _ = writeln!(out, "\n### {} ({})\n", title, if kind.is_empty() { "raw" } else { kind });
    let _ = writeln!(out, "```{}\n{}\n```", lang, body.trim_end());
}

pub fn format_interface_detail(detail: &InterfaceDetail) -> String {
    let s = &detail.summary;
    let mut out = format!("# {}\n\n`{} {}`\n\n", s.title, s.method, s.path);
    let _ = writeln!(out, "- Interface id: {}", s.id);
    let _ = writeln!(out, "- Project id: {}", s.project_id);
    let _ = writeln!(out, "- Category id: {}", s.category_id);
    if !s.status.is_empty() {
        let _ = writeln!(out, "- Status: {}", s.status);
    }
    if !s.tags.is_empty() {
        let _ = writeln!(out, "- Tags: {}", s.tags.join(", "));
    }
    if !detail.username.is_empty() {
        let _ = writeln!(out, "- Author: {}", detail.username);
    }
    let _ = writeln!(out, "- Created: {}", format_time(detail.created_at));
    let _ = writeln!(out, "- Updated: {}", format_time(s.updated_at));

    let notes = if detail.markdown.trim().is_empty() {
        detail.description.trim()
    } else {
        detail.markdown.trim()
    };
    if !notes.is_empty() {
        let _ = writeln!(out, "\n## Description\n\n{}", notes);
    }

    out.push_str("\n## Request\n");
    param_table(&mut out, "Path parameters", &detail.req_params, "Value");
    param_table(&mut out, "Query parameters", &detail.req_query, "Value");
    param_table(&mut out, "Headers", &detail.req_headers, "Value");
    param_table(&mut out, "Form fields", &detail.req_body_form, "Type");
    body_block(
        &mut out,
        "Body",
        &detail.req_body_type,
        &detail.req_body_other,
    );

    out.push_str("\n## Response\n");
    if detail.res_body.trim().is_empty() {
        out.push_str("\n(no response body documented)\n");
    } else {
        body_block(&mut out, "Body", &detail.res_body_type, &detail.res_body);
    }
    out
}

pub fn format_search(result: &SearchResult, projects: &[String]) -> String {
    if result.items.is_empty() {
        return format!(
            "No interfaces matched in project(s) {}.",
            projects.join(", ")
        );
    }
    let mut out = format!(
        "# Search results ({} of {})\n\n",
        result.items.len(),
        result.total
    );
    for i in &result.items {
        let _ = write!(out, "- [project {}] ", i.project_id);
        interface_line(&mut out, "", i);
    }
    if result.total > result.items.len() {
        let _ = writeln!(
            out,
            "\n{} more match(es) not shown; narrow the keywords or raise the limit.",
            result.total - result.items.len()
        );
    }
    out
}

pub fn format_saved(interface_id: &str, updated: bool) -> String {
    if updated {
        format!("Interface {} updated.", interface_id)
    } else {
        format!("Interface {} created.", interface_id)
    }
}

pub fn format_refresh(
    scheduled: bool,
    status: &RefreshStatus,
    metrics: &CacheMetricsSnapshot,
) -> String {
    let mut out = String::new();
    out.push_str(if scheduled {
        "Cache refresh started in the background.\n\n"
    } else {
        "A cache refresh is already running.\n\n"
    });
    format_status(&mut out, status, metrics);
    out
}

pub fn format_cleared(removed: bool, scheduled: bool) -> String {
    let mut out = String::new();
    if removed {
        out.push_str("Cache cleared from memory and disk.");
    } else {
        out.push_str("Cache cleared from memory; the snapshot file could not be removed (see server logs).");
    }
    if scheduled {
        out.push_str(" A rebuild is running in the background.");
    }
    out
}

fn format_status(out: &mut String, status: &RefreshStatus, metrics: &CacheMetricsSnapshot) {
    let state = match serde_json::to_value(status.state) {
        Ok(serde_json::Value::String(s)) => s,
        _ => format!("{:?}", status.state),
    };
    let _ = writeln!(out, "- State: {}", state);
    let _ = writeln!(out, "- Completed refreshes: {}", status.generation);
    if let Some(at) = status.last_refreshed_at {
        let _ = writeln!(out, "- Last refresh: {}", format_time_millis(at));
    }
    if let Some(outcome) = &status.last_outcome {
        let _ = write!(out, "- Last outcome: {}", outcome.label());
        if let Some(report) = outcome.report() {
            let _ = write!(
                out,
                " ({} ok, {} failed)",
                report.succeeded.len(),
                report.failed.len()
            );
            out.push('\n');
            for (id, err) in &report.failed {
                let _ = writeln!(out, "  - project {}: {}", id, err);
            }
        } else {
            out.push('\n');
        }
    }
    let _ = writeln!(
        out,
        "- On-demand fetches: {} ({} failed, {} refused while backing off)",
        metrics.on_demand_fetches, metrics.on_demand_failures, metrics.backoff_rejections
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheState, RefreshOutcome, RefreshReport};

    fn summary(id: &str, title: &str) -> InterfaceSummary {
        InterfaceSummary {
            id: id.to_string(),
            project_id: "10".to_string(),
            category_id: "5".to_string(),
            title: title.to_string(),
            path: format!("/api/{}", id),
            method: "GET".to_string(),
            status: "done".to_string(),
            tags: vec!["users".to_string()],
            updated_at: 0,
        }
    }

    #[test]
    fn test_empty_project_list_mentions_refresh() {
        let text = format_projects(&[], 2);
        assert!(text.contains("2 configured"));
        assert_eq!(format_projects(&[], 0), "No projects are configured.");
    }

    #[test]
    fn test_categories_with_interfaces() {
        let categories = vec![
            CategoryInfo {
                id: "5".to_string(),
                project_id: "10".to_string(),
                name: "Users".to_string(),
                description: String::new(),
                created_at: 0,
                updated_at: 0,
                sort_index: 0,
            },
            CategoryInfo {
                id: "6".to_string(),
                project_id: "10".to_string(),
                name: "Orders".to_string(),
                description: String::new(),
                created_at: 0,
                updated_at: 0,
                sort_index: 1,
            },
        ];
        let mut apis = HashMap::new();
        apis.insert("5".to_string(), Ok(vec![summary("1", "List users")]));
        apis.insert("6".to_string(), Err("Transport error: timed out".to_string()));

        let text = format_categories("Payments (10)", &categories, Some(&apis));
        assert!(text.contains("**Users** (id: 5)"));
        assert!(text.contains("  - `GET /api/1` List users (id: 1) [users]"));
        assert!(text.contains("failed to load interfaces: Transport error"));
    }

    #[test]
    fn test_detail_renders_tables_and_bodies() {
        let detail = InterfaceDetail {
            summary: summary("99", "Create user"),
            description: String::new(),
            markdown: "Creates a user".to_string(),
            req_params: vec![],
            req_query: vec![InterfaceParam {
                name: "dry|run".to_string(),
                required: true,
                ..Default::default()
            }],
            req_headers: vec![],
            req_body_type: "json".to_string(),
            req_body_other: "{\"type\":\"object\"}".to_string(),
            req_body_form: vec![],
            res_body_type: "json".to_string(),
            res_body: String::new(),
            created_at: 0,
            username: String::new(),
        };
        let text = format_interface_detail(&detail);
        assert!(text.starts_with("# Create user\n\n`GET /api/99`"));
        assert!(text.contains("| dry\\|run | yes |"));
        assert!(text.contains("```json\n{\"type\":\"object\"}\n```"));
        assert!(text.contains("no response body documented"));
    }

    #[test]
    fn test_search_reports_truncation() {
        let result = SearchResult {
            total: 3,
            items: vec![summary("1", "a"), summary("2", "b")],
        };
        let text = format_search(&result, &["10".to_string()]);
        assert!(text.contains("(2 of 3)"));
        assert!(text.contains("1 more match(es)"));
    }

    #[test]
    fn test_refresh_status() {
        let status = RefreshStatus {
            state: CacheState::Warm,
            generation: 2,
            last_outcome: Some(RefreshOutcome::Partial(RefreshReport {
                succeeded: vec!["10".to_string()],
                failed: vec![("20".to_string(), "timed out".to_string())],
                ..Default::default()
            })),
            last_refreshed_at: None,
        };
        let text = format_refresh(true, &status, &CacheMetricsSnapshot::default());
        assert!(text.contains("- State: warm"));
        assert!(text.contains("partial (1 ok, 1 failed)"));
        assert!(text.contains("project 20: timed out"));
    }
}
