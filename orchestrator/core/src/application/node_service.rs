// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Node Orchestrator Application Service
//!
//! Sequences permission checks around delegated node-store operations:
//! - Domain layer: PermissionGuard, Node, NodeRepository trait
//! - Event bus: publishes a NodeEvent after every confirmed mutation
//! - Smart folders: delegates aggregation to SmartFolderEvaluator
//!
//! Files carry no ACL of their own. They are gated through their parent
//! folder, so every non-folder check below targets the parent.
//!
//! There is no lock between a permission check and the store write that
//! follows it. A conflicting concurrent write is only caught if the store
//! rejects it (reported as `BadRequest`).

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::smart_folder_service::SmartFolderEvaluator;
use crate::domain::error::{ServiceError, ServiceResult};
use crate::domain::events::DomainEvent;
use crate::domain::node::{Node, NodeId, NodeMetadata, NodePatch, NodeVariant};
use crate::domain::permission::{Capability, PermissionGuard};
use crate::domain::principal::Principal;
use crate::domain::repository::{NodeRepository, QueryPage};
use crate::domain::smart_folder::{Evaluation, NodeFilter};
use crate::infrastructure::event_bus::EventBus;

const DEFAULT_MIMETYPE: &str = "application/octet-stream";

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait NodeService: Send + Sync {
    /// Create a folder, metanode or smart folder, or an empty file.
    async fn create(&self, principal: &Principal, metadata: NodeMetadata) -> ServiceResult<Node>;

    /// Create a file with an initial payload.
    async fn create_file(
        &self,
        principal: &Principal,
        metadata: NodeMetadata,
        content: Bytes,
    ) -> ServiceResult<Node>;

    async fn get(&self, principal: &Principal, uuid: NodeId) -> ServiceResult<Node>;

    /// Readable children of `parent`.
    async fn list(&self, principal: &Principal, parent: NodeId) -> ServiceResult<Vec<Node>>;

    /// Apply `patch`. Setting `patch.parent` moves the node.
    async fn update(
        &self,
        principal: &Principal,
        uuid: NodeId,
        patch: NodePatch,
        merge: bool,
    ) -> ServiceResult<Node>;

    /// Replace a file's payload.
    async fn update_file(&self, principal: &Principal, uuid: NodeId, content: Bytes) -> ServiceResult<Node>;

    async fn delete(&self, principal: &Principal, uuid: NodeId) -> ServiceResult<()>;

    async fn copy(&self, principal: &Principal, uuid: NodeId, destination: NodeId) -> ServiceResult<Node>;

    async fn duplicate(&self, principal: &Principal, uuid: NodeId) -> ServiceResult<Node>;

    async fn export(&self, principal: &Principal, uuid: NodeId) -> ServiceResult<Bytes>;

    /// One page of matching nodes, minus those the principal cannot read.
    async fn query(
        &self,
        principal: &Principal,
        filters: &[NodeFilter],
        page_size: u32,
        page_token: u32,
    ) -> ServiceResult<QueryPage>;

    async fn evaluate(&self, principal: &Principal, uuid: NodeId) -> ServiceResult<Evaluation>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardNodeService {
    repository: Arc<dyn NodeRepository>,
    event_bus: Arc<EventBus>,
    evaluator: SmartFolderEvaluator,
}

impl StandardNodeService {
    pub fn new(repository: Arc<dyn NodeRepository>, event_bus: Arc<EventBus>, page_size: u32) -> Self {
        let evaluator = SmartFolderEvaluator::new(repository.clone(), page_size);
        Self {
            repository,
            event_bus,
            evaluator,
        }
    }

    fn authorize(principal: &Principal, folder: &Node, capability: Capability) -> ServiceResult<()> {
        if PermissionGuard::is_granted(principal, folder, capability) {
            return Ok(());
        }
        warn!(
            principal = %principal.email,
            folder = %folder.uuid,
            capability = %capability,
            "Permission denied"
        );
        Err(ServiceError::forbidden(format!(
            "{} lacks {} on folder {}",
            principal.email, capability, folder.uuid
        )))
    }

    async fn authorize_parent(&self, principal: &Principal, node: &Node, capability: Capability) -> ServiceResult<Node> {
        let parent = self.repository.get(node.parent).await?;
        Self::authorize(principal, &parent, capability)?;
        Ok(parent)
    }

    /// Folders gate on themselves, everything else on its parent.
    async fn authorize_read(&self, principal: &Principal, node: &Node) -> ServiceResult<()> {
        if node.is_folder() {
            Self::authorize(principal, node, Capability::Read)
        } else {
            self.authorize_parent(principal, node, Capability::Read).await.map(|_| ())
        }
    }

    async fn require_folder(&self, uuid: NodeId) -> ServiceResult<Node> {
        let folder = self.repository.get(uuid).await?;
        if !folder.is_folder() {
            return Err(ServiceError::bad_request(format!("{} is not a folder", uuid)));
        }
        Ok(folder)
    }

    /// True if `candidate` is `ancestor` or lies beneath it.
    async fn is_within(&self, candidate: NodeId, ancestor: NodeId) -> ServiceResult<bool> {
        let mut current = candidate;
        loop {
            if current == ancestor {
                return Ok(true);
            }
            if current == NodeId::ROOT {
                return Ok(false);
            }
            current = self.repository.get(current).await?.parent;
        }
    }

    fn build_node(principal: &Principal, parent: &Node, metadata: NodeMetadata) -> ServiceResult<Node> {
        let variant = metadata
            .variant
            .unwrap_or_else(|| infer_variant(metadata.mimetype.as_deref()));
        let mimetype = metadata
            .mimetype
            .or_else(|| variant.default_mimetype().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_MIMETYPE.to_string());

        if metadata.smart_folder.is_some() && variant != NodeVariant::SmartFolder {
            return Err(ServiceError::bad_request("only smart folders carry a filter specification"));
        }
        let smart_folder = match variant {
            NodeVariant::SmartFolder => Some(metadata.smart_folder.unwrap_or_default()),
            _ => None,
        };

        let now = Utc::now();
        Ok(Node {
            uuid: NodeId::new(),
            title: metadata.title,
            parent: parent.uuid,
            owner: principal.email.clone(),
            group: metadata.group.unwrap_or_else(|| parent.group.clone()),
            permissions: metadata.permissions.unwrap_or_else(|| parent.permissions.clone()),
            mimetype,
            variant,
            size: 0,
            aspects: metadata.aspects,
            properties: metadata.properties,
            smart_folder,
            created_at: now,
            modified_at: now,
        })
    }

    async fn create_node(
        &self,
        principal: &Principal,
        metadata: NodeMetadata,
        content: Option<Bytes>,
    ) -> ServiceResult<Node> {
        if metadata.title.trim().is_empty() {
            return Err(ServiceError::bad_request("title is required"));
        }

        let parent_id = metadata.parent.unwrap_or(NodeId::ROOT);
        if parent_id.is_system_area() {
            return Err(ServiceError::bad_request(format!(
                "nodes cannot be created directly under system folder {}",
                parent_id
            )));
        }
        let parent = self.require_folder(parent_id).await?;
        Self::authorize(principal, &parent, Capability::Write)?;

        let node = Self::build_node(principal, &parent, metadata)?;
        if content.is_some() && !node.is_file() {
            return Err(ServiceError::bad_request("only files carry content"));
        }

        let created = match node.variant {
            NodeVariant::File => {
                self.repository
                    .create_file(node, content.unwrap_or_default())
                    .await?
            }
            NodeVariant::Folder => self.repository.create_folder(node).await?,
            NodeVariant::Metanode | NodeVariant::SmartFolder => self.repository.create_metanode(node).await?,
        };

        info!(
            node = %created.uuid,
            parent = %created.parent,
            variant = ?created.variant,
            actor = %principal.email,
            "Node created"
        );
        self.event_bus
            .publish(DomainEvent::node_created(&principal.email, created.clone()));
        Ok(created)
    }
}

/// Read check over result sets: folders gate on themselves, everything else
/// on its parent. Many results share a parent, so each folder is fetched once.
#[derive(Default)]
pub(crate) struct ReadGate {
    folders: HashMap<NodeId, Option<Node>>,
}

impl ReadGate {
    pub(crate) async fn admits(
        &mut self,
        repository: &dyn NodeRepository,
        principal: &Principal,
        node: &Node,
    ) -> bool {
        let gate = if node.is_folder() { node.uuid } else { node.parent };
        if !self.folders.contains_key(&gate) {
            let folder = if gate == node.uuid {
                Some(node.clone())
            } else {
                repository.get(gate).await.ok()
            };
            self.folders.insert(gate, folder);
        }
        self.folders
            .get(&gate)
            .and_then(Option::as_ref)
            .is_some_and(|folder| PermissionGuard::is_granted(principal, folder, Capability::Read))
    }
}

fn infer_variant(mimetype: Option<&str>) -> NodeVariant {
    [NodeVariant::Folder, NodeVariant::Metanode, NodeVariant::SmartFolder]
        .into_iter()
        .find(|v| v.default_mimetype().is_some() && v.default_mimetype() == mimetype)
        .unwrap_or(NodeVariant::File)
}

#[async_trait]
impl NodeService for StandardNodeService {
    async fn create(&self, principal: &Principal, metadata: NodeMetadata) -> ServiceResult<Node> {
        self.create_node(principal, metadata, None).await
    }

    async fn create_file(
        &self,
        principal: &Principal,
        metadata: NodeMetadata,
        content: Bytes,
    ) -> ServiceResult<Node> {
        let metadata = NodeMetadata {
            variant: Some(NodeVariant::File),
            ..metadata
        };
        self.create_node(principal, metadata, Some(content)).await
    }

    async fn get(&self, principal: &Principal, uuid: NodeId) -> ServiceResult<Node> {
        let node = self.repository.get(uuid).await?;
        self.authorize_read(principal, &node).await?;
        Ok(node)
    }

    async fn list(&self, principal: &Principal, parent: NodeId) -> ServiceResult<Vec<Node>> {
        let folder = self.require_folder(parent).await?;
        Self::authorize(principal, &folder, Capability::Read)?;

        let children = self.repository.list(parent).await?;
        Ok(children
            .into_iter()
            .filter(|child| !child.is_folder() || PermissionGuard::is_granted(principal, child, Capability::Read))
            .collect())
    }

    async fn update(
        &self,
        principal: &Principal,
        uuid: NodeId,
        patch: NodePatch,
        merge: bool,
    ) -> ServiceResult<Node> {
        if patch.is_empty() {
            return Err(ServiceError::bad_request("nothing to update"));
        }
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServiceError::bad_request("title is required"));
        }

        let node = self.repository.get(uuid).await?;
        if patch.smart_folder.is_some() && !node.is_smart_folder() {
            return Err(ServiceError::bad_request(format!("{} is not a smart folder", uuid)));
        }
        self.authorize_parent(principal, &node, Capability::Write).await?;

        if let Some(destination) = patch.parent.filter(|d| *d != node.parent) {
            if uuid.is_well_known() {
                return Err(ServiceError::bad_request(format!("system folder {} cannot be moved", uuid)));
            }
            if destination.is_system_area() {
                return Err(ServiceError::bad_request(format!(
                    "nodes cannot be moved into system folder {}",
                    destination
                )));
            }
            let target = self.require_folder(destination).await?;
            if node.is_folder() && self.is_within(destination, uuid).await? {
                return Err(ServiceError::bad_request("a folder cannot be moved into itself"));
            }
            Self::authorize(principal, &target, Capability::Write)?;
        }

        let changed_fields = patch.changed_fields();
        let updated = self.repository.update(uuid, patch, merge).await?;

        info!(node = %uuid, fields = ?changed_fields, actor = %principal.email, "Node updated");
        self.event_bus
            .publish(DomainEvent::node_updated(&principal.email, uuid, changed_fields));
        Ok(updated)
    }

    async fn update_file(&self, principal: &Principal, uuid: NodeId, content: Bytes) -> ServiceResult<Node> {
        let node = self.repository.get(uuid).await?;
        if !node.is_file() {
            return Err(ServiceError::bad_request(format!("{} is not a file", uuid)));
        }
        self.authorize_parent(principal, &node, Capability::Write).await?;

        let updated = self.repository.update_content(uuid, content).await?;

        info!(node = %uuid, size = updated.size, actor = %principal.email, "File content updated");
        self.event_bus
            .publish(DomainEvent::node_content_updated(&principal.email, uuid));
        Ok(updated)
    }

    async fn delete(&self, principal: &Principal, uuid: NodeId) -> ServiceResult<()> {
        if uuid.is_well_known() {
            return Err(ServiceError::bad_request(format!("system folder {} cannot be deleted", uuid)));
        }
        let node = self.repository.get(uuid).await?;
        if node.is_folder() {
            Self::authorize(principal, &node, Capability::Write)?;
        }
        self.authorize_parent(principal, &node, Capability::Write).await?;

        self.repository.delete(uuid).await?;

        info!(node = %uuid, actor = %principal.email, "Node deleted");
        self.event_bus
            .publish(DomainEvent::node_deleted(&principal.email, uuid));
        Ok(())
    }

    async fn copy(&self, principal: &Principal, uuid: NodeId, destination: NodeId) -> ServiceResult<Node> {
        let source = self.get(principal, uuid).await?;
        if source.is_folder() {
            return Err(ServiceError::bad_request("folders cannot be copied"));
        }
        if destination.is_system_area() {
            return Err(ServiceError::bad_request(format!(
                "nodes cannot be copied into system folder {}",
                destination
            )));
        }
        let target = self.require_folder(destination).await?;
        Self::authorize(principal, &target, Capability::Write)?;

        let copy = self.repository.copy(uuid, destination).await?;

        info!(source = %uuid, node = %copy.uuid, parent = %destination, actor = %principal.email, "Node copied");
        self.event_bus
            .publish(DomainEvent::node_created(&principal.email, copy.clone()));
        Ok(copy)
    }

    async fn duplicate(&self, principal: &Principal, uuid: NodeId) -> ServiceResult<Node> {
        let source = self.get(principal, uuid).await?;
        if source.is_folder() {
            return Err(ServiceError::bad_request("folders cannot be duplicated"));
        }
        self.authorize_parent(principal, &source, Capability::Write).await?;

        let duplicate = self.repository.duplicate(uuid).await?;

        info!(source = %uuid, node = %duplicate.uuid, actor = %principal.email, "Node duplicated");
        self.event_bus
            .publish(DomainEvent::node_created(&principal.email, duplicate.clone()));
        Ok(duplicate)
    }

    async fn export(&self, principal: &Principal, uuid: NodeId) -> ServiceResult<Bytes> {
        let node = self.repository.get(uuid).await?;
        if !node.is_file() {
            return Err(ServiceError::bad_request(format!("{} is not a file", uuid)));
        }
        self.authorize_parent(principal, &node, Capability::Export).await?;

        let content = self.repository.export(uuid).await?;
        debug!(node = %uuid, bytes = content.len(), actor = %principal.email, "Node exported");
        Ok(content)
    }

    async fn query(
        &self,
        principal: &Principal,
        filters: &[NodeFilter],
        page_size: u32,
        page_token: u32,
    ) -> ServiceResult<QueryPage> {
        if page_size == 0 || page_token == 0 {
            return Err(ServiceError::bad_request("page size and page token start at 1"));
        }
        let mut page = self.repository.query(filters, page_size, page_token).await?;

        let mut gate = ReadGate::default();
        let mut readable = Vec::with_capacity(page.nodes.len());
        for node in page.nodes {
            if gate.admits(self.repository.as_ref(), principal, &node).await {
                readable.push(node);
            }
        }
        page.nodes = readable;
        Ok(page)
    }

    async fn evaluate(&self, principal: &Principal, uuid: NodeId) -> ServiceResult<Evaluation> {
        let node = self.get(principal, uuid).await?;
        if !node.is_smart_folder() {
            return Err(ServiceError::bad_request(format!("{} is not a smart folder", uuid)));
        }
        self.evaluator.evaluate_node(principal, &node).await
    }
}
