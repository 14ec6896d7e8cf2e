// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Node Aggregate
//!
//! A node is an addressable entry in the content tree. Every node except the
//! Root folder has exactly one parent, and that parent is always a Folder.
//!
//! | Variant | Holds content | Gates access |
//! |---------|---------------|--------------|
//! | `File` | binary payload | no (gated by its folder) |
//! | `Folder` | children | yes |
//! | `Metanode` | metadata only | no |
//! | `SmartFolder` | stored query | no |
//!
//! The Root and System folders, and System's reserved sub-folders, have fixed
//! identifiers that are never reassigned and never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::domain::permission::PermissionSet;
use crate::domain::smart_folder::SmartFolderSpec;

pub const FOLDER_MIMETYPE: &str = "application/vnd.docvault.folder";
pub const METANODE_MIMETYPE: &str = "application/vnd.docvault.metanode";
pub const SMART_FOLDER_MIMETYPE: &str = "application/vnd.docvault.smartfolder";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Root of the content tree. Its parent is itself.
    pub const ROOT: NodeId = NodeId(Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0001));
    /// Holds repository-managed configuration; never a target of general node creation.
    pub const SYSTEM: NodeId = NodeId(Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0002));
    pub const ACTIONS: NodeId = NodeId(Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0003));
    pub const ASPECTS: NodeId = NodeId(Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0004));
    pub const EXTENSIONS: NodeId = NodeId(Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0005));

    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// True for the System folder and the reserved areas beneath it.
    pub fn is_system_area(&self) -> bool {
        *self == Self::SYSTEM
            || *self == Self::ACTIONS
            || *self == Self::ASPECTS
            || *self == Self::EXTENSIONS
    }

    /// Identifiers that can never be deleted, moved or re-parented.
    pub fn is_well_known(&self) -> bool {
        *self == Self::ROOT || self.is_system_area()
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeVariant {
    File,
    Folder,
    Metanode,
    SmartFolder,
}

impl NodeVariant {
    pub fn default_mimetype(&self) -> Option<&'static str> {
        match self {
            NodeVariant::File => None,
            NodeVariant::Folder => Some(FOLDER_MIMETYPE),
            NodeVariant::Metanode => Some(METANODE_MIMETYPE),
            NodeVariant::SmartFolder => Some(SMART_FOLDER_MIMETYPE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub uuid: NodeId,
    pub title: String,
    pub parent: NodeId,
    pub owner: String,
    pub group: String,
    pub permissions: PermissionSet,
    pub mimetype: String,
    pub variant: NodeVariant,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aspects: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_folder: Option<SmartFolderSpec>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Node {
    pub fn is_folder(&self) -> bool {
        self.variant == NodeVariant::Folder
    }

    pub fn is_file(&self) -> bool {
        self.variant == NodeVariant::File
    }

    pub fn is_smart_folder(&self) -> bool {
        self.variant == NodeVariant::SmartFolder
    }

    pub fn is_root(&self) -> bool {
        self.uuid == NodeId::ROOT
    }

    /// Resolve a field by name, first against the node's own attributes and
    /// then against its free-form properties.
    pub fn field_value(&self, field: &str) -> Option<Value> {
        match field {
            "uuid" => Some(Value::String(self.uuid.to_string())),
            "title" => Some(Value::String(self.title.clone())),
            "parent" => Some(Value::String(self.parent.to_string())),
            "owner" => Some(Value::String(self.owner.clone())),
            "group" => Some(Value::String(self.group.clone())),
            "mimetype" => Some(Value::String(self.mimetype.clone())),
            "size" => Some(Value::from(self.size)),
            "aspects" => Some(Value::from(self.aspects.clone())),
            "createdAt" => Some(Value::String(self.created_at.to_rfc3339())),
            "modifiedAt" => Some(Value::String(self.modified_at.to_rfc3339())),
            other => self.properties.get(other).cloned(),
        }
    }

    pub fn is_builtin_field(field: &str) -> bool {
        matches!(
            field,
            "uuid" | "title" | "parent" | "owner" | "group" | "mimetype" | "size" | "aspects"
                | "createdAt" | "modifiedAt"
        )
    }

    /// Apply a partial update. With `merge`, properties are merged key by key
    /// into the existing map; without it the supplied map replaces it.
    pub fn apply_patch(&mut self, patch: &NodePatch, merge: bool) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(parent) = patch.parent {
            self.parent = parent;
        }
        if let Some(mimetype) = &patch.mimetype {
            self.mimetype = mimetype.clone();
        }
        if let Some(group) = &patch.group {
            self.group = group.clone();
        }
        if let Some(permissions) = &patch.permissions {
            self.permissions = permissions.clone();
        }
        if let Some(aspects) = &patch.aspects {
            self.aspects = aspects.clone();
        }
        if let Some(properties) = &patch.properties {
            if merge {
                for (key, value) in properties {
                    self.properties.insert(key.clone(), value.clone());
                }
            } else {
                self.properties = properties.clone();
            }
        }
        if let Some(smart_folder) = &patch.smart_folder {
            self.smart_folder = Some(smart_folder.clone());
        }
        self.modified_at = Utc::now();
    }
}

/// Metadata supplied when creating a node. Unset fields are derived from the
/// parent folder or the creating principal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub title: String,
    pub variant: Option<NodeVariant>,
    pub parent: Option<NodeId>,
    pub mimetype: Option<String>,
    pub group: Option<String>,
    pub permissions: Option<PermissionSet>,
    #[serde(default)]
    pub aspects: Vec<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    pub smart_folder: Option<SmartFolderSpec>,
}

impl NodeMetadata {
    pub fn folder(title: impl Into<String>, parent: NodeId) -> Self {
        Self {
            title: title.into(),
            variant: Some(NodeVariant::Folder),
            parent: Some(parent),
            ..Default::default()
        }
    }

    pub fn file(title: impl Into<String>, parent: NodeId, mimetype: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            variant: Some(NodeVariant::File),
            parent: Some(parent),
            mimetype: Some(mimetype.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    pub title: Option<String>,
    pub parent: Option<NodeId>,
    pub mimetype: Option<String>,
    pub group: Option<String>,
    pub permissions: Option<PermissionSet>,
    pub aspects: Option<Vec<String>>,
    pub properties: Option<Map<String, Value>>,
    pub smart_folder: Option<SmartFolderSpec>,
}

impl NodePatch {
    pub fn move_to(parent: NodeId) -> Self {
        Self {
            parent: Some(parent),
            ..Default::default()
        }
    }

    /// Names of the fields this patch sets, in declaration order.
    pub fn changed_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.parent.is_some() {
            fields.push("parent");
        }
        if self.mimetype.is_some() {
            fields.push("mimetype");
        }
        if self.group.is_some() {
            fields.push("group");
        }
        if self.permissions.is_some() {
            fields.push("permissions");
        }
        if self.aspects.is_some() {
            fields.push("aspects");
        }
        if self.properties.is_some() {
            fields.push("properties");
        }
        if self.smart_folder.is_some() {
            fields.push("smartFolder");
        }
        fields.into_iter().map(String::from).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Node {
        let now = Utc::now();
        Node {
            uuid: NodeId::new(),
            title: "report.pdf".to_string(),
            parent: NodeId::ROOT,
            owner: "alice@example.com".to_string(),
            group: "eng".to_string(),
            permissions: PermissionSet::default(),
            mimetype: "application/pdf".to_string(),
            variant: NodeVariant::File,
            size: 42,
            aspects: vec![],
            properties: Map::from_iter([("amount".to_string(), json!(10))]),
            smart_folder: None,
            created_at: now,
            modified_at: now,
        }
    }

    #[test]
    fn test_well_known_ids() {
        assert!(NodeId::SYSTEM.is_system_area());
        assert!(NodeId::ACTIONS.is_system_area());
        assert!(!NodeId::ROOT.is_system_area());
        assert!(NodeId::ROOT.is_well_known());
        assert!(!NodeId::new().is_well_known());
    }

    #[test]
    fn test_patch_merge_keeps_existing_properties() {
        let mut node = sample();
        let patch = NodePatch {
            properties: Some(Map::from_iter([("status".to_string(), json!("draft"))])),
            ..Default::default()
        };
        node.apply_patch(&patch, true);
        assert_eq!(node.properties.get("amount"), Some(&json!(10)));
        assert_eq!(node.properties.get("status"), Some(&json!("draft")));
    }

    #[test]
    fn test_patch_without_merge_replaces_properties() {
        let mut node = sample();
        let patch = NodePatch {
            properties: Some(Map::from_iter([("status".to_string(), json!("draft"))])),
            ..Default::default()
        };
        node.apply_patch(&patch, false);
        assert!(node.properties.get("amount").is_none());
    }

    #[test]
    fn test_changed_fields() {
        let patch = NodePatch {
            title: Some("new".to_string()),
            parent: Some(NodeId::ROOT),
            ..Default::default()
        };
        assert_eq!(patch.changed_fields(), vec!["title", "parent"]);
        assert!(NodePatch::default().is_empty());
    }

    #[test]
    fn test_field_value_falls_back_to_properties() {
        let node = sample();
        assert_eq!(node.field_value("size"), Some(json!(42)));
        assert_eq!(node.field_value("amount"), Some(json!(10)));
        assert_eq!(node.field_value("missing"), None);
    }
}
