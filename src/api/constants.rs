//! ARM api-versions, headers and path builders for Logic Apps resources

/// `api-version` values per resource type
pub mod api_versions {
    pub const SUBSCRIPTIONS: &str = "2022-12-01";
    pub const RESOURCE_GROUPS: &str = "2021-04-01";
    /// Consumption Logic Apps (`Microsoft.Logic/workflows`)
    pub const LOGIC_WORKFLOWS: &str = "2019-05-01";
    /// Standard Logic Apps hosting sites (`Microsoft.Web/sites`)
    pub const WEB_SITES: &str = "2023-12-01";
    /// Standard workflow runtime management API
    pub const WORKFLOW_RUNTIME: &str = "2020-05-01-preview";
}

/// Standard headers for ARM requests
pub mod headers {
    pub const CONTENT_TYPE_JSON: &str = "application/json";

    /// Client-generated request id echoed in Azure activity logs
    pub const X_CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";

    pub const RETRY_AFTER: &str = "retry-after";
}

pub const USER_AGENT: &str = concat!("logicapps-mcp/", env!("CARGO_PKG_VERSION"));

/// Workflow management root on a Standard app's runtime host
pub const WORKFLOW_RUNTIME_ROOT: &str = "/runtime/webhooks/workflow/api/management";

/// Append `api-version` to a path that may already carry a query string
pub fn with_api_version(path: &str, version: &str) -> String {
    if path.contains("api-version=") {
        return path.to_string();
    }
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}api-version={}", path, separator, urlencoding::encode(version))
}

pub fn subscriptions_path() -> String {
    with_api_version("/subscriptions", api_versions::SUBSCRIPTIONS)
}

pub fn resource_groups_path(subscription_id: &str) -> String {
    with_api_version(
        &format!("/subscriptions/{}/resourcegroups", urlencoding::encode(subscription_id)),
        api_versions::RESOURCE_GROUPS,
    )
}

/// Consumption workflows, optionally scoped to a resource group
pub fn logic_workflows_path(subscription_id: &str, resource_group: Option<&str>) -> String {
    let scope = scope_prefix(subscription_id, resource_group);
    with_api_version(
        &format!("{}/providers/Microsoft.Logic/workflows", scope),
        api_versions::LOGIC_WORKFLOWS,
    )
}

pub fn logic_workflow_path(subscription_id: &str, resource_group: &str, workflow: &str) -> String {
    with_api_version(
        &format!(
            "{}/providers/Microsoft.Logic/workflows/{}",
            scope_prefix(subscription_id, Some(resource_group)),
            urlencoding::encode(workflow)
        ),
        api_versions::LOGIC_WORKFLOWS,
    )
}

/// Consumption workflow run history
pub fn logic_workflow_runs_path(subscription_id: &str, resource_group: &str, workflow: &str) -> String {
    with_api_version(
        &format!(
            "{}/providers/Microsoft.Logic/workflows/{}/runs",
            scope_prefix(subscription_id, Some(resource_group)),
            urlencoding::encode(workflow)
        ),
        api_versions::LOGIC_WORKFLOWS,
    )
}

/// Web sites, optionally scoped to a resource group; Standard apps are among them
pub fn sites_path(subscription_id: &str, resource_group: Option<&str>) -> String {
    let scope = scope_prefix(subscription_id, resource_group);
    with_api_version(
        &format!("{}/providers/Microsoft.Web/sites", scope),
        api_versions::WEB_SITES,
    )
}

pub fn site_path(subscription_id: &str, resource_group: &str, app: &str) -> String {
    with_api_version(
        &format!(
            "{}/providers/Microsoft.Web/sites/{}",
            scope_prefix(subscription_id, Some(resource_group)),
            urlencoding::encode(app)
        ),
        api_versions::WEB_SITES,
    )
}

/// Workflows hosted by a Standard app, relative to its runtime host
pub fn runtime_workflows_path() -> String {
    with_api_version(
        &format!("{}/workflows", WORKFLOW_RUNTIME_ROOT),
        api_versions::WORKFLOW_RUNTIME,
    )
}

pub fn runtime_workflow_path(workflow: &str) -> String {
    with_api_version(
        &format!("{}/workflows/{}", WORKFLOW_RUNTIME_ROOT, urlencoding::encode(workflow)),
        api_versions::WORKFLOW_RUNTIME,
    )
}

pub fn runtime_workflow_runs_path(workflow: &str) -> String {
    with_api_version(
        &format!(
            "{}/workflows/{}/runs",
            WORKFLOW_RUNTIME_ROOT,
            urlencoding::encode(workflow)
        ),
        api_versions::WORKFLOW_RUNTIME,
    )
}

/// Runtime host for a Standard app, e.g. `https://my-app.azurewebsites.net`
pub fn workflow_base_url(app_name: &str, websites_suffix: &str) -> String {
    let suffix = websites_suffix.trim_end_matches('/');
    if suffix.starts_with('.') {
        format!("https://{}{}", app_name, suffix)
    } else {
        format!("https://{}.{}", app_name, suffix)
    }
}

fn scope_prefix(subscription_id: &str, resource_group: Option<&str>) -> String {
    match resource_group {
        Some(group) => format!(
            "/subscriptions/{}/resourceGroups/{}",
            urlencoding::encode(subscription_id),
            urlencoding::encode(group)
        ),
        None => format!("/subscriptions/{}", urlencoding::encode(subscription_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_api_version() {
        assert_eq!(with_api_version("/subscriptions", "2022-12-01"), "/subscriptions?api-version=2022-12-01");
        assert_eq!(
            with_api_version("/x/runs?$top=5", "2019-05-01"),
            "/x/runs?$top=5&api-version=2019-05-01"
        );
        assert_eq!(
            with_api_version("/x?api-version=2016-06-01", "2019-05-01"),
            "/x?api-version=2016-06-01"
        );
    }

    #[test]
    fn test_logic_workflow_paths() {
        assert_eq!(
            logic_workflows_path("sub-1", None),
            "/subscriptions/sub-1/providers/Microsoft.Logic/workflows?api-version=2019-05-01"
        );
        assert_eq!(
            logic_workflow_path("sub-1", "rg", "order flow"),
            "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Logic/workflows/order%20flow?api-version=2019-05-01"
        );
    }

    #[test]
    fn test_runtime_paths() {
        assert_eq!(
            runtime_workflows_path(),
            "/runtime/webhooks/workflow/api/management/workflows?api-version=2020-05-01-preview"
        );
        assert!(runtime_workflow_runs_path("wf").starts_with(
            "/runtime/webhooks/workflow/api/management/workflows/wf/runs?"
        ));
    }

    #[test]
    fn test_workflow_base_url() {
        assert_eq!(
            workflow_base_url("orders", ".azurewebsites.net"),
            "https://orders.azurewebsites.net"
        );
        assert_eq!(
            workflow_base_url("orders", "azurewebsites.us/"),
            "https://orders.azurewebsites.us"
        );
    }
}
