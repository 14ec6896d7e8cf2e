// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Action Trigger Engine
//!
//! Subscribes to node-created and node-updated events and runs every action
//! whose constraints match the affected node. Each (event, action) pair moves
//! through `Matched -> Executing -> Succeeded | Failed`. A failed run is
//! logged and recorded, never propagated: the mutation that triggered it has
//! already been committed.
//!
//! Triggered runs act as the automatic principal. Events caused by that
//! principal do not trigger again unless `trigger_on_system_events` is set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::application::action_service::ActionService;
use crate::application::node_service::NodeService;
use crate::domain::action::{Action, ActionId};
use crate::domain::config::ActionsConfig;
use crate::domain::events::{DomainEvent, NodeEvent, NODE_CREATED, NODE_UPDATED};
use crate::domain::node::{Node, NodeId};
use crate::domain::principal::Principal;
use crate::infrastructure::event_bus::{EventBus, EventHandler};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ActionRunState {
    Matched,
    Executing,
    Succeeded,
    Failed(String),
}

impl ActionRunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionRunState::Succeeded | ActionRunState::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRunRecord {
    pub event_id: String,
    pub action: ActionId,
    pub action_title: String,
    pub targets: Vec<NodeId>,
    pub state: ActionRunState,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
struct RunHistory {
    records: Arc<Mutex<Vec<ActionRunRecord>>>,
}

impl RunHistory {
    fn open(&self, event_id: &str, action: &Action, targets: &[NodeId]) -> usize {
        let mut records = self.records.lock();
        records.push(ActionRunRecord {
            event_id: event_id.to_string(),
            action: action.uuid,
            action_title: action.title.clone(),
            targets: targets.to_vec(),
            state: ActionRunState::Matched,
            updated_at: Utc::now(),
        });
        records.len() - 1
    }

    fn transition(&self, index: usize, state: ActionRunState) {
        if let Some(record) = self.records.lock().get_mut(index) {
            record.state = state;
            record.updated_at = Utc::now();
        }
    }
}

pub struct ActionTriggerEngine {
    actions: Arc<dyn ActionService>,
    nodes: Arc<dyn NodeService>,
    system: Principal,
    config: ActionsConfig,
    history: RunHistory,
}

impl ActionTriggerEngine {
    pub fn new(
        actions: Arc<dyn ActionService>,
        nodes: Arc<dyn NodeService>,
        system: Principal,
        config: ActionsConfig,
    ) -> Self {
        Self {
            actions,
            nodes,
            system,
            config,
            history: RunHistory::default(),
        }
    }

    /// Subscribe `engine` to the lifecycle events it reacts to.
    pub fn register(engine: Arc<Self>, bus: &EventBus) {
        bus.subscribe(NODE_CREATED, engine.clone());
        bus.subscribe(NODE_UPDATED, engine);
    }

    /// Every run recorded so far, oldest first.
    pub fn run_history(&self) -> Vec<ActionRunRecord> {
        self.history.records.lock().clone()
    }

    /// The node an event is about, or `None` if this engine ignores it.
    async fn affected_node(&self, event: &DomainEvent) -> anyhow::Result<Option<Node>> {
        match &event.payload {
            NodeEvent::NodeCreated { node, .. } => Ok(Some(node.clone())),
            NodeEvent::NodeUpdated { uuid, .. } => match self.nodes.get(&self.system, *uuid).await {
                Ok(node) => Ok(Some(node)),
                // Deleted before the reaction ran.
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e.into()),
            },
            _ => Ok(None),
        }
    }

    fn wants(action: &Action, event_id: &str) -> bool {
        match event_id {
            NODE_CREATED => action.run_on_creates,
            NODE_UPDATED => action.run_on_updates,
            _ => false,
        }
    }

    async fn trigger(&self, event: DomainEvent) -> anyhow::Result<()> {
        if event.payload.actor_email() == self.system.email && !self.config.trigger_on_system_events {
            debug!(event_id = %event.event_id, "Skipping event caused by automatic principal");
            return Ok(());
        }

        let Some(node) = self.affected_node(&event).await? else {
            return Ok(());
        };

        let matched: Vec<Action> = self
            .actions
            .list_actions()
            .await?
            .into_iter()
            .filter(|a| Self::wants(a, &event.event_id) && a.matches(&node))
            .collect();

        if matched.is_empty() {
            debug!(event_id = %event.event_id, node = %node.uuid, "No actions matched");
            return Ok(());
        }

        info!(
            event_id = %event.event_id,
            node = %node.uuid,
            matched = matched.len(),
            "Triggering actions"
        );

        let limit = Arc::new(Semaphore::new(self.config.max_concurrent_runs.max(1)));
        let mut runs = JoinSet::new();
        for action in matched {
            let targets = vec![node.uuid];
            let index = self.history.open(&event.event_id, &action, &targets);
            let history = self.history.clone();
            let actions = self.actions.clone();
            let principal = self.system.clone();
            let limit = limit.clone();

            runs.spawn(async move {
                let Ok(_permit) = limit.acquire_owned().await else {
                    history.transition(index, ActionRunState::Failed("run limiter closed".to_string()));
                    return;
                };
                history.transition(index, ActionRunState::Executing);

                let action_id = action.uuid;
                let title = action.title.clone();
                let outcome = tokio::spawn(async move {
                    actions.execute(&action, &principal, &targets, HashMap::new()).await
                })
                .await;

                let state = match outcome {
                    Ok(Ok(())) => {
                        info!(action = %action_id, title = %title, "Triggered action succeeded");
                        ActionRunState::Succeeded
                    }
                    Ok(Err(e)) => {
                        error!(action = %action_id, title = %title, error = ?e, "Triggered action failed");
                        ActionRunState::Failed(e.to_string())
                    }
                    Err(join_error) => {
                        error!(action = %action_id, title = %title, error = %join_error, "Triggered action panicked");
                        ActionRunState::Failed(join_error.to_string())
                    }
                };
                history.transition(index, state);
            });
        }

        while runs.join_next().await.is_some() {}
        Ok(())
    }
}

#[async_trait]
impl EventHandler for ActionTriggerEngine {
    fn name(&self) -> &str {
        "action-trigger-engine"
    }

    async fn handle(&self, event: DomainEvent) -> anyhow::Result<()> {
        self.trigger(event).await
    }
}
