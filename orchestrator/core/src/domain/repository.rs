// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Contracts for the collaborators the orchestration core consumes. The core
//! owns no node data: it borrows snapshots from these stores for the length
//! of a call.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `NodeRepository` | `Node` + binary payloads | `InMemoryNodeRepository` |
//! | `ActionRepository` | `Action` | `InMemoryActionRepository` |
//!
//! Stores distinguish `NotFound` from every other failure. Nothing here
//! checks permissions; that is the orchestrator's job.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::domain::action::{Action, ActionId};
use crate::domain::node::{Node, NodeId, NodePatch};
use crate::domain::smart_folder::{FilterError, NodeFilter};

/// One page of a filtered node query. Page tokens are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    pub nodes: Vec<Node>,
    pub page_count: u32,
    pub page_size: u32,
    pub page_token: u32,
}

/// Node store: metadata and binary payloads.
#[async_trait]
pub trait NodeRepository: Send + Sync {
    async fn get(&self, uuid: NodeId) -> Result<Node, RepositoryError>;

    /// Direct children of `parent`.
    async fn list(&self, parent: NodeId) -> Result<Vec<Node>, RepositoryError>;

    async fn create_file(&self, node: Node, content: Bytes) -> Result<Node, RepositoryError>;

    async fn create_folder(&self, node: Node) -> Result<Node, RepositoryError>;

    /// Metanodes and smart folders: metadata without payload or children.
    async fn create_metanode(&self, node: Node) -> Result<Node, RepositoryError>;

    async fn update(&self, uuid: NodeId, patch: NodePatch, merge: bool) -> Result<Node, RepositoryError>;

    async fn update_content(&self, uuid: NodeId, content: Bytes) -> Result<Node, RepositoryError>;

    /// Removes the node and, for folders, everything beneath it.
    async fn delete(&self, uuid: NodeId) -> Result<(), RepositoryError>;

    async fn copy(&self, uuid: NodeId, destination: NodeId) -> Result<Node, RepositoryError>;

    /// Copy placed alongside the original.
    async fn duplicate(&self, uuid: NodeId) -> Result<Node, RepositoryError>;

    async fn export(&self, uuid: NodeId) -> Result<Bytes, RepositoryError>;

    async fn query(
        &self,
        filters: &[NodeFilter],
        page_size: u32,
        page_token: u32,
    ) -> Result<QueryPage, RepositoryError>;
}

#[async_trait]
pub trait ActionRepository: Send + Sync {
    async fn get(&self, uuid: ActionId) -> Result<Action, RepositoryError>;

    async fn list(&self) -> Result<Vec<Action>, RepositoryError>;

    async fn add_or_replace(&self, action: Action) -> Result<(), RepositoryError>;

    async fn delete(&self, uuid: ActionId) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// The store refused a write that conflicts with its current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The query itself is malformed (bad paging, invalid filter).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<FilterError> for RepositoryError {
    fn from(err: FilterError) -> Self {
        Self::InvalidQuery(err.to_string())
    }
}

impl RepositoryError {
    pub fn node_not_found(uuid: NodeId) -> Self {
        Self::NotFound(format!("node {}", uuid))
    }

    pub fn action_not_found(uuid: ActionId) -> Self {
        Self::NotFound(format!("action {}", uuid))
    }
}
