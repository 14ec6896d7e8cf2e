// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::node::{Node, NodeId};

pub const NODE_CREATED: &str = "NodeCreatedEvent";
pub const NODE_UPDATED: &str = "NodeUpdatedEvent";
pub const NODE_DELETED: &str = "NodeDeletedEvent";
pub const NODE_CONTENT_UPDATED: &str = "NodeContentUpdatedEvent";

/// Node lifecycle payloads. Each one is a snapshot taken after the store
/// confirmed the mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    NodeCreated {
        actor_email: String,
        node: Node,
    },
    NodeUpdated {
        actor_email: String,
        uuid: NodeId,
        changed_fields: Vec<String>,
    },
    NodeDeleted {
        actor_email: String,
        uuid: NodeId,
    },
    NodeContentUpdated {
        actor_email: String,
        uuid: NodeId,
    },
}

impl NodeEvent {
    pub fn event_id(&self) -> &'static str {
        match self {
            NodeEvent::NodeCreated { .. } => NODE_CREATED,
            NodeEvent::NodeUpdated { .. } => NODE_UPDATED,
            NodeEvent::NodeDeleted { .. } => NODE_DELETED,
            NodeEvent::NodeContentUpdated { .. } => NODE_CONTENT_UPDATED,
        }
    }

    pub fn actor_email(&self) -> &str {
        match self {
            NodeEvent::NodeCreated { actor_email, .. }
            | NodeEvent::NodeUpdated { actor_email, .. }
            | NodeEvent::NodeDeleted { actor_email, .. }
            | NodeEvent::NodeContentUpdated { actor_email, .. } => actor_email,
        }
    }

    pub fn node_id(&self) -> NodeId {
        match self {
            NodeEvent::NodeCreated { node, .. } => node.uuid,
            NodeEvent::NodeUpdated { uuid, .. }
            | NodeEvent::NodeDeleted { uuid, .. }
            | NodeEvent::NodeContentUpdated { uuid, .. } => *uuid,
        }
    }
}

/// Immutable record of a completed state change. Handlers receive their own
/// clone, so no handler can observe another handler's changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: NodeEvent,
}

impl DomainEvent {
    pub fn new(payload: NodeEvent) -> Self {
        Self {
            event_id: payload.event_id().to_string(),
            occurred_at: Utc::now(),
            payload,
        }
    }

    pub fn node_created(actor_email: impl Into<String>, node: Node) -> Self {
        Self::new(NodeEvent::NodeCreated {
            actor_email: actor_email.into(),
            node,
        })
    }

    pub fn node_updated(actor_email: impl Into<String>, uuid: NodeId, changed_fields: Vec<String>) -> Self {
        Self::new(NodeEvent::NodeUpdated {
            actor_email: actor_email.into(),
            uuid,
            changed_fields,
        })
    }

    pub fn node_deleted(actor_email: impl Into<String>, uuid: NodeId) -> Self {
        Self::new(NodeEvent::NodeDeleted {
            actor_email: actor_email.into(),
            uuid,
        })
    }

    pub fn node_content_updated(actor_email: impl Into<String>, uuid: NodeId) -> Self {
        Self::new(NodeEvent::NodeContentUpdated {
            actor_email: actor_email.into(),
            uuid,
        })
    }
}
