//! Response envelopes shared by ARM and the workflow runtime

use serde::{Deserialize, Serialize};

/// One page of a list response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "nextLink", default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

impl<T> ArmPage<T> {
    /// Next page link, ignoring blank values
    pub fn next(&self) -> Option<&str> {
        self.next_link.as_deref().map(str::trim).filter(|link| !link.is_empty())
    }
}

/// Fully drained list, in the `{ value: [...] }` shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmList<T> {
    pub value: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_page_parsing() {
        let page: ArmPage<Value> = serde_json::from_value(json!({
            "value": [{"name": "a"}, {"name": "b"}],
            "nextLink": "https://management.azure.com/subscriptions?$skiptoken=x"
        }))
        .unwrap();

        assert_eq!(page.value.len(), 2);
        assert_eq!(page.next(), Some("https://management.azure.com/subscriptions?$skiptoken=x"));
    }

    #[test]
    fn test_page_without_value_or_link() {
        let page: ArmPage<Value> = serde_json::from_value(json!({})).unwrap();
        assert!(page.value.is_empty());
        assert!(page.next().is_none());

        let page: ArmPage<Value> = serde_json::from_value(json!({"value": [], "nextLink": ""})).unwrap();
        assert!(page.next().is_none());
    }
}
