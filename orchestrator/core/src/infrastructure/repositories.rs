// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory implementations of the node and action stores, used for
//! development and tests.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::action::{Action, ActionId};
use crate::domain::config::SecurityConfig;
use crate::domain::node::{Node, NodeId, NodePatch, NodeVariant, FOLDER_MIMETYPE};
use crate::domain::permission::{Capability, PermissionSet};
use crate::domain::repository::{ActionRepository, NodeRepository, QueryPage, RepositoryError};
use crate::domain::smart_folder::{FilterSet, NodeFilter};

#[derive(Default)]
struct NodeTable {
    nodes: HashMap<NodeId, Node>,
    contents: HashMap<NodeId, Bytes>,
}

impl NodeTable {
    fn require(&self, uuid: NodeId) -> Result<&Node, RepositoryError> {
        self.nodes.get(&uuid).ok_or_else(|| RepositoryError::node_not_found(uuid))
    }

    fn require_folder(&self, uuid: NodeId) -> Result<&Node, RepositoryError> {
        let node = self.require(uuid)?;
        if !node.is_folder() {
            return Err(RepositoryError::Conflict(format!("{} is not a folder", uuid)));
        }
        Ok(node)
    }

    fn insert(&mut self, node: Node) -> Result<Node, RepositoryError> {
        if self.nodes.contains_key(&node.uuid) {
            return Err(RepositoryError::Conflict(format!("node {} already exists", node.uuid)));
        }
        if !node.is_root() {
            self.require_folder(node.parent)?;
        }
        self.nodes.insert(node.uuid, node.clone());
        Ok(node)
    }

    fn descendants(&self, uuid: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut pending = vec![uuid];
        while let Some(current) = pending.pop() {
            for child in self.nodes.values().filter(|n| n.parent == current && n.uuid != current) {
                found.push(child.uuid);
                pending.push(child.uuid);
            }
        }
        found
    }

    fn clone_into(&mut self, uuid: NodeId, parent: NodeId, title: String) -> Result<Node, RepositoryError> {
        let source = self.require(uuid)?.clone();
        self.require_folder(parent)?;
        let now = Utc::now();
        let copy = Node {
            uuid: NodeId::new(),
            title,
            parent,
            created_at: now,
            modified_at: now,
            ..source
        };
        if let Some(content) = self.contents.get(&uuid).cloned() {
            self.contents.insert(copy.uuid, content);
        }
        self.nodes.insert(copy.uuid, copy.clone());
        Ok(copy)
    }
}

#[derive(Clone)]
pub struct InMemoryNodeRepository {
    table: Arc<RwLock<NodeTable>>,
}

impl InMemoryNodeRepository {
    /// Store seeded with the Root and System folders, owned by the configured
    /// root owner and the admin group.
    pub fn new(security: &SecurityConfig) -> Self {
        let repo = Self {
            table: Arc::new(RwLock::new(NodeTable::default())),
        };
        repo.seed_well_known_folders(&security.root_owner_email, &security.admin_group);
        repo
    }

    fn seed_well_known_folders(&self, root_owner: &str, admin_group: &str) {
        let now = Utc::now();
        let folder = |uuid: NodeId, title: &str, parent: NodeId, permissions: PermissionSet| Node {
            uuid,
            title: title.to_string(),
            parent,
            owner: root_owner.to_string(),
            group: admin_group.to_string(),
            permissions,
            mimetype: FOLDER_MIMETYPE.to_string(),
            variant: NodeVariant::Folder,
            size: 0,
            aspects: vec![],
            properties: Default::default(),
            smart_folder: None,
            created_at: now,
            modified_at: now,
        };
        let root_permissions = PermissionSet {
            group: Capability::ALL.into(),
            authenticated: [Capability::Read].into(),
            ..Default::default()
        };

        let mut table = self.table.write();
        let seeds = [
            folder(NodeId::ROOT, "", NodeId::ROOT, root_permissions),
            folder(NodeId::SYSTEM, "__System__", NodeId::ROOT, PermissionSet::default()),
            folder(NodeId::ACTIONS, "Actions", NodeId::SYSTEM, PermissionSet::default()),
            folder(NodeId::ASPECTS, "Aspects", NodeId::SYSTEM, PermissionSet::default()),
            folder(NodeId::EXTENSIONS, "Extensions", NodeId::SYSTEM, PermissionSet::default()),
        ];
        for node in seeds {
            table.nodes.insert(node.uuid, node);
        }
    }

    pub fn len(&self) -> usize {
        self.table.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().nodes.is_empty()
    }
}

#[async_trait]
impl NodeRepository for InMemoryNodeRepository {
    async fn get(&self, uuid: NodeId) -> Result<Node, RepositoryError> {
        self.table.read().require(uuid).cloned()
    }

    async fn list(&self, parent: NodeId) -> Result<Vec<Node>, RepositoryError> {
        let table = self.table.read();
        table.require(parent)?;
        let mut children: Vec<Node> = table
            .nodes
            .values()
            .filter(|n| n.parent == parent && n.uuid != parent)
            .cloned()
            .collect();
        children.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(children)
    }

    async fn create_file(&self, mut node: Node, content: Bytes) -> Result<Node, RepositoryError> {
        node.size = content.len() as u64;
        let mut table = self.table.write();
        let node = table.insert(node)?;
        table.contents.insert(node.uuid, content);
        Ok(node)
    }

    async fn create_folder(&self, node: Node) -> Result<Node, RepositoryError> {
        self.table.write().insert(node)
    }

    async fn create_metanode(&self, node: Node) -> Result<Node, RepositoryError> {
        self.table.write().insert(node)
    }

    async fn update(&self, uuid: NodeId, patch: NodePatch, merge: bool) -> Result<Node, RepositoryError> {
        let mut table = self.table.write();
        if let Some(parent) = patch.parent {
            table.require_folder(parent)?;
        }
        let node = table
            .nodes
            .get_mut(&uuid)
            .ok_or_else(|| RepositoryError::node_not_found(uuid))?;
        node.apply_patch(&patch, merge);
        Ok(node.clone())
    }

    async fn update_content(&self, uuid: NodeId, content: Bytes) -> Result<Node, RepositoryError> {
        let mut table = self.table.write();
        let node = table
            .nodes
            .get_mut(&uuid)
            .ok_or_else(|| RepositoryError::node_not_found(uuid))?;
        if !node.is_file() {
            return Err(RepositoryError::Conflict(format!("{} has no content", uuid)));
        }
        node.size = content.len() as u64;
        node.modified_at = Utc::now();
        let updated = node.clone();
        table.contents.insert(uuid, content);
        Ok(updated)
    }

    async fn delete(&self, uuid: NodeId) -> Result<(), RepositoryError> {
        let mut table = self.table.write();
        table.require(uuid)?;
        let mut doomed = table.descendants(uuid);
        doomed.push(uuid);
        for id in doomed {
            table.nodes.remove(&id);
            table.contents.remove(&id);
        }
        Ok(())
    }

    async fn copy(&self, uuid: NodeId, destination: NodeId) -> Result<Node, RepositoryError> {
        let mut table = self.table.write();
        let title = table.require(uuid)?.title.clone();
        table.clone_into(uuid, destination, title)
    }

    async fn duplicate(&self, uuid: NodeId) -> Result<Node, RepositoryError> {
        let mut table = self.table.write();
        let source = table.require(uuid)?;
        let (parent, title) = (source.parent, format!("{} (copy)", source.title));
        table.clone_into(uuid, parent, title)
    }

    async fn export(&self, uuid: NodeId) -> Result<Bytes, RepositoryError> {
        let table = self.table.read();
        table.require(uuid)?;
        table
            .contents
            .get(&uuid)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("content of node {}", uuid)))
    }

    async fn query(
        &self,
        filters: &[NodeFilter],
        page_size: u32,
        page_token: u32,
    ) -> Result<QueryPage, RepositoryError> {
        if page_size == 0 || page_token == 0 {
            return Err(RepositoryError::InvalidQuery(
                "page size and page token must be at least 1".to_string(),
            ));
        }
        let filters = FilterSet::compile(filters)?;
        let table = self.table.read();
        let mut matched: Vec<&Node> = table
            .nodes
            .values()
            .filter(|n| !n.uuid.is_well_known() && filters.matches(n))
            .collect();
        matched.sort_by(|a, b| a.title.cmp(&b.title).then(a.uuid.cmp(&b.uuid)));

        // A token past the end yields an empty page.
        let page_count = u32::try_from(matched.len().div_ceil(page_size as usize))
            .unwrap_or(u32::MAX)
            .max(1);
        let start = (page_token as usize - 1).saturating_mul(page_size as usize);
        let nodes = matched
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();

        Ok(QueryPage {
            nodes,
            page_count,
            page_size,
            page_token,
        })
    }
}

#[derive(Clone, Default)]
pub struct InMemoryActionRepository {
    actions: Arc<RwLock<HashMap<ActionId, Action>>>,
}

impl InMemoryActionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActionRepository for InMemoryActionRepository {
    async fn get(&self, uuid: ActionId) -> Result<Action, RepositoryError> {
        self.actions
            .read()
            .get(&uuid)
            .cloned()
            .ok_or_else(|| RepositoryError::action_not_found(uuid))
    }

    async fn list(&self) -> Result<Vec<Action>, RepositoryError> {
        let mut actions: Vec<Action> = self.actions.read().values().cloned().collect();
        actions.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(actions)
    }

    async fn add_or_replace(&self, action: Action) -> Result<(), RepositoryError> {
        self.actions.write().insert(action.uuid, action);
        Ok(())
    }

    async fn delete(&self, uuid: ActionId) -> Result<(), RepositoryError> {
        self.actions
            .write()
            .remove(&uuid)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::action_not_found(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::smart_folder::FilterOperator;

    fn child(title: &str, parent: NodeId, variant: NodeVariant) -> Node {
        let now = Utc::now();
        Node {
            uuid: NodeId::new(),
            title: title.to_string(),
            parent,
            owner: "alice@example.com".to_string(),
            group: "eng".to_string(),
            permissions: PermissionSet::default(),
            mimetype: if variant == NodeVariant::Folder {
                FOLDER_MIMETYPE.to_string()
            } else {
                "text/plain".to_string()
            },
            variant,
            size: 0,
            aspects: vec![],
            properties: Default::default(),
            smart_folder: None,
            created_at: now,
            modified_at: now,
        }
    }

    #[tokio::test]
    async fn test_seeded_folders() {
        let repo = InMemoryNodeRepository::new(&SecurityConfig::default());
        let root = repo.get(NodeId::ROOT).await.unwrap();
        assert!(root.is_folder());
        let system_children = repo.list(NodeId::SYSTEM).await.unwrap();
        assert_eq!(system_children.len(), 3);
        let root_children = repo.list(NodeId::ROOT).await.unwrap();
        assert_eq!(root_children.len(), 1);
    }

    #[tokio::test]
    async fn test_create_requires_folder_parent() {
        let repo = InMemoryNodeRepository::new(&SecurityConfig::default());
        let file = repo
            .create_file(child("a.txt", NodeId::ROOT, NodeVariant::File), Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(file.size, 5);

        let orphan = child("b.txt", file.uuid, NodeVariant::File);
        assert!(matches!(
            repo.create_file(orphan, Bytes::new()).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_is_recursive() {
        let repo = InMemoryNodeRepository::new(&SecurityConfig::default());
        let folder = repo.create_folder(child("F", NodeId::ROOT, NodeVariant::Folder)).await.unwrap();
        let file = repo
            .create_file(child("a.txt", folder.uuid, NodeVariant::File), Bytes::from_static(b"x"))
            .await
            .unwrap();

        repo.delete(folder.uuid).await.unwrap();
        assert!(matches!(repo.get(file.uuid).await, Err(RepositoryError::NotFound(_))));
        assert!(matches!(repo.export(file.uuid).await, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_copy_and_duplicate_carry_content() {
        let repo = InMemoryNodeRepository::new(&SecurityConfig::default());
        let dest = repo.create_folder(child("Dest", NodeId::ROOT, NodeVariant::Folder)).await.unwrap();
        let file = repo
            .create_file(child("a.txt", NodeId::ROOT, NodeVariant::File), Bytes::from_static(b"body"))
            .await
            .unwrap();

        let copy = repo.copy(file.uuid, dest.uuid).await.unwrap();
        assert_eq!(copy.parent, dest.uuid);
        assert_eq!(repo.export(copy.uuid).await.unwrap(), Bytes::from_static(b"body"));

        let dup = repo.duplicate(file.uuid).await.unwrap();
        assert_eq!(dup.parent, NodeId::ROOT);
        assert_eq!(dup.title, "a.txt (copy)");
    }

    #[tokio::test]
    async fn test_query_pages() {
        let repo = InMemoryNodeRepository::new(&SecurityConfig::default());
        for i in 0..5 {
            repo.create_file(child(&format!("doc-{i}"), NodeId::ROOT, NodeVariant::File), Bytes::new())
                .await
                .unwrap();
        }
        let filters = vec![NodeFilter::new("mimetype", FilterOperator::Eq, "text/plain")];
        let first = repo.query(&filters, 2, 1).await.unwrap();
        assert_eq!(first.page_count, 3);
        assert_eq!(first.nodes.len(), 2);
        let last = repo.query(&filters, 2, 3).await.unwrap();
        assert_eq!(last.nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_query_token_past_the_end() {
        let repo = InMemoryNodeRepository::new(&SecurityConfig::default());
        repo.create_file(child("doc", NodeId::ROOT, NodeVariant::File), Bytes::new())
            .await
            .unwrap();
        let filters = vec![NodeFilter::new("mimetype", FilterOperator::Eq, "text/plain")];

        let page = repo.query(&filters, 2, 7).await.unwrap();
        assert!(page.nodes.is_empty());
        assert_eq!(page.page_count, 1);

        let page = repo.query(&filters, u32::MAX, u32::MAX).await.unwrap();
        assert!(page.nodes.is_empty());
    }

    #[tokio::test]
    async fn test_query_rejects_bad_input() {
        let repo = InMemoryNodeRepository::new(&SecurityConfig::default());
        assert!(matches!(repo.query(&[], 0, 1).await, Err(RepositoryError::InvalidQuery(_))));

        let filters = vec![NodeFilter::new("title", FilterOperator::Match, "(")];
        assert!(matches!(repo.query(&filters, 10, 1).await, Err(RepositoryError::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_seeded_folders_use_configured_admin_group() {
        let security = SecurityConfig {
            admin_group: "ops-admins".to_string(),
            root_owner_email: "owner@example.com".to_string(),
            ..Default::default()
        };
        let repo = InMemoryNodeRepository::new(&security);
        let root = repo.get(NodeId::ROOT).await.unwrap();
        assert_eq!(root.group, "ops-admins");
        assert_eq!(root.owner, "owner@example.com");
    }

    #[tokio::test]
    async fn test_action_repository() {
        let repo = InMemoryActionRepository::new();
        let action = Action::script("Tag", "scripts/tag");
        repo.add_or_replace(action.clone()).await.unwrap();
        assert_eq!(repo.get(action.uuid).await.unwrap(), action);
        assert_eq!(repo.list().await.unwrap().len(), 1);
        repo.delete(action.uuid).await.unwrap();
        assert!(matches!(repo.delete(action.uuid).await, Err(RepositoryError::NotFound(_))));
    }
}
