//! Entity, link and task representations
//!
//! Only the accessors the client and the steps rely on are modelled. Anything
//! else a response carries is kept in [`Entity::attributes`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// vCloud media types
pub mod media_type {
    pub const ANY: &str = "application/*+json";
    pub const SESSION: &str = "application/vnd.vmware.vcloud.session+json";
    pub const ORG: &str = "application/vnd.vmware.vcloud.org+json";
    pub const VDC: &str = "application/vnd.vmware.vcloud.vdc+json";
    pub const CATALOG: &str = "application/vnd.vmware.vcloud.catalog+json";
    pub const CATALOG_ITEM: &str = "application/vnd.vmware.vcloud.catalogItem+json";
    pub const MEDIA: &str = "application/vnd.vmware.vcloud.media+json";
    pub const VAPP_TEMPLATE: &str = "application/vnd.vmware.vcloud.vAppTemplate+json";
    pub const ENTITY: &str = "application/vnd.vmware.vcloud.entity+json";
    pub const TASK: &str = "application/vnd.vmware.vcloud.task+json";
    pub const DISK: &str = "application/vnd.vmware.vcloud.disk+json";
    pub const DISK_CREATE_PARAMS: &str = "application/vnd.vmware.vcloud.diskCreateParams+json";
    pub const DISK_ATTACH_DETACH_PARAMS: &str =
        "application/vnd.vmware.vcloud.diskAttachOrDetachParams+json";

    /// Compare two media types, ignoring parameters and the `+xml`/`+json` suffix
    pub fn matches(a: &str, b: &str) -> bool {
        base(a).eq_ignore_ascii_case(base(b))
    }

    fn base(media_type: &str) -> &str {
        let media_type = media_type.split(';').next().unwrap_or_default().trim();
        media_type
            .strip_suffix("+xml")
            .or_else(|| media_type.strip_suffix("+json"))
            .unwrap_or(media_type)
    }
}

/// Link relations
pub mod rel {
    pub const DOWN: &str = "down";
    pub const ADD: &str = "add";
    pub const ALTERNATE: &str = "alternate";
    pub const REMOVE: &str = "remove";
    pub const ENTITY_RESOLVER: &str = "entityResolver";
    pub const DISK_ATTACH: &str = "disk:attach";
    pub const DISK_DETACH: &str = "disk:detach";
}

/// A reference to another resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,

    pub href: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Self::default()
        }
    }

    pub fn with_rel(mut self, rel: impl Into<String>) -> Self {
        self.rel = Some(rel.into());
        self
    }

    pub fn with_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_type(&self, media_type: &str) -> bool {
        self.media_type
            .as_deref()
            .is_some_and(|t| media_type::matches(t, media_type))
    }

    fn is_rel(&self, rel: &str) -> bool {
        self.rel.as_deref() == Some(rel)
    }
}

/// Status of a remote task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Queued,
    PreRunning,
    Running,
    Success,
    Error,
    Canceled,
    Aborted,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Accepted by the server and still on its way to a terminal status
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            TaskStatus::Queued | TaskStatus::PreRunning | TaskStatus::Running
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Error | TaskStatus::Canceled | TaskStatus::Aborted
        )
    }

    /// Terminal, but not successful
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            TaskStatus::Error | TaskStatus::Canceled | TaskStatus::Aborted
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::PreRunning => write!(f, "preRunning"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Error => write!(f, "error"),
            TaskStatus::Canceled => write!(f, "canceled"),
            TaskStatus::Aborted => write!(f, "aborted"),
            TaskStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// A remote asynchronous operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub href: String,

    /// Task URN
    #[serde(default)]
    pub id: String,

    /// Human readable description of the operation
    #[serde(default)]
    pub operation: String,

    #[serde(default)]
    pub operation_name: Option<String>,

    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Task {
    /// Operation label used in logs and errors
    pub fn label(&self) -> &str {
        self.operation_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.operation)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.id, self.label(), self.status)
    }
}

/// Advertised API version and where to log in for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    pub login_url: String,
}

/// A typed remote resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(default)]
    pub href: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "link", default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,

    /// Target of a catalog item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Link>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub catalog_items: Vec<Link>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub version_info: Vec<VersionInfo>,

    /// Remaining response attributes
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Entity {
    /// Name if present, otherwise the href
    pub fn describe(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.href)
    }

    /// Identifier used by callers to find this entity again
    pub fn cid(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.href)
    }

    /// Reference to this entity
    pub fn to_link(&self) -> Link {
        Link {
            rel: None,
            href: self.href.clone(),
            media_type: self.media_type.clone(),
            name: self.name.clone(),
        }
    }

    /// Tasks that are queued, starting or running
    pub fn pending_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.status.is_pending())
            .collect()
    }

    /// First link with the given relation and media type
    pub fn link(&self, rel: &str, media_type: &str) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.is_rel(rel) && l.is_type(media_type))
    }

    /// First link with the given relation, whatever its type
    pub fn link_by_rel(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.is_rel(rel))
    }

    fn named_link(&self, media_type: &str, name: &str) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.is_type(media_type) && l.name.as_deref() == Some(name))
    }

    pub fn org_link(&self) -> Option<&Link> {
        self.links.iter().find(|l| l.is_type(media_type::ORG))
    }

    pub fn entity_resolver_link(&self) -> Option<&Link> {
        self.link_by_rel(rel::ENTITY_RESOLVER)
            .or_else(|| self.links.iter().find(|l| l.is_type(media_type::ENTITY)))
    }

    pub fn vdc_link(&self, name: &str) -> Option<&Link> {
        self.named_link(media_type::VDC, name)
    }

    pub fn catalog_link(&self, name: &str) -> Option<&Link> {
        self.named_link(media_type::CATALOG, name)
    }

    pub fn add_item_link(&self) -> Option<&Link> {
        self.link(rel::ADD, media_type::CATALOG_ITEM)
    }

    pub fn add_disk_link(&self) -> Option<&Link> {
        self.link(rel::ADD, media_type::DISK_CREATE_PARAMS)
    }

    /// Catalog item references carrying the given name
    pub fn catalog_items(&self, name: &str) -> Vec<&Link> {
        self.catalog_items
            .iter()
            .filter(|item| item.name.as_deref() == Some(name))
            .collect()
    }

    /// Login URL of the newest advertised version
    pub fn login_url(&self) -> Option<&str> {
        self.version_info.last().map(|v| v.login_url.as_str())
    }

    /// Read an extra attribute as a specific type
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_media_type_matches_across_representations() {
        assert!(media_type::matches(
            "application/vnd.vmware.vcloud.vdc+xml",
            media_type::VDC
        ));
        assert!(media_type::matches(
            "application/vnd.vmware.vcloud.vdc+json;version=5.1",
            media_type::VDC
        ));
        assert!(!media_type::matches(media_type::ORG, media_type::VDC));
    }

    #[test]
    fn test_entity_parse_and_link_lookup() {
        let org: Entity = serde_json::from_value(json!({
            "href": "https://vcd/api/org/1",
            "type": "application/vnd.vmware.vcloud.org+xml",
            "name": "acme",
            "link": [
                {"rel": "down", "href": "https://vcd/api/vdc/1", "type": "application/vnd.vmware.vcloud.vdc+xml", "name": "acme-vdc"},
                {"rel": "down", "href": "https://vcd/api/catalog/1", "type": "application/vnd.vmware.vcloud.catalog+xml", "name": "media"}
            ],
            "fullName": "Acme Corp"
        }))
        .unwrap();

        assert_eq!(org.vdc_link("acme-vdc").unwrap().href, "https://vcd/api/vdc/1");
        assert!(org.vdc_link("other").is_none());
        assert_eq!(org.catalog_link("media").unwrap().href, "https://vcd/api/catalog/1");
        assert_eq!(org.attribute::<String>("fullName").as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn test_pending_tasks_skip_terminal_and_unknown() {
        let entity: Entity = serde_json::from_value(json!({
            "href": "https://vcd/api/disk/1",
            "tasks": [
                {"href": "https://vcd/api/task/1", "id": "urn:task:1", "operation": "create", "status": "running"},
                {"href": "https://vcd/api/task/2", "id": "urn:task:2", "operation": "update", "status": "success"},
                {"href": "https://vcd/api/task/3", "id": "urn:task:3", "operation": "update", "status": "preRunning"},
                {"href": "https://vcd/api/task/4", "id": "urn:task:4", "operation": "update", "status": "queued"},
                {"href": "https://vcd/api/task/5", "id": "urn:task:5", "operation": "update", "status": "somethingNew"}
            ]
        }))
        .unwrap();

        let pending: Vec<&str> = entity
            .pending_tasks()
            .into_iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(pending, vec!["urn:task:1", "urn:task:3", "urn:task:4"]);
        assert_eq!(entity.tasks[2].status, TaskStatus::PreRunning);
    }

    #[test]
    fn test_unknown_task_status() {
        let task: Task = serde_json::from_value(json!({
            "href": "https://vcd/api/task/9",
            "status": "somethingNew"
        }))
        .unwrap();
        assert_eq!(task.status, TaskStatus::Unknown);
        assert!(!task.status.is_terminal());
    }

    #[test]
    fn test_task_status_classification() {
        assert!(TaskStatus::Success.is_terminal());
        assert!(!TaskStatus::Success.is_failure());
        assert!(TaskStatus::Canceled.is_failure());
        assert!(!TaskStatus::Queued.is_terminal());
    }

    #[test]
    fn test_catalog_items_filtered_by_name() {
        let catalog = Entity {
            catalog_items: vec![
                Link::new("https://vcd/api/catalogItem/1").with_name("stemcell"),
                Link::new("https://vcd/api/catalogItem/2").with_name("other"),
                Link::new("https://vcd/api/catalogItem/3").with_name("stemcell"),
            ],
            ..Entity::default()
        };

        let items = catalog.catalog_items("stemcell");
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].href, "https://vcd/api/catalogItem/3");
    }

    #[test]
    fn test_login_url_uses_newest_version() {
        let versions: Entity = serde_json::from_value(json!({
            "versionInfo": [
                {"version": "1.5", "loginUrl": "https://vcd/api/sessions-old"},
                {"version": "5.1", "loginUrl": "https://vcd/api/sessions"}
            ]
        }))
        .unwrap();
        assert_eq!(versions.login_url(), Some("https://vcd/api/sessions"));
    }
}
