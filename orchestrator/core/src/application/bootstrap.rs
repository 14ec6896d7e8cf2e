// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Wiring for one repository process: a single event bus injected into every
//! publisher and subscriber, the services built on top of it, and the trigger
//! engine subscribed before any event is published.

use std::sync::Arc;
use tracing::info;

use crate::application::action_registry::ExecutableRegistry;
use crate::application::action_service::StandardActionService;
use crate::application::action_trigger::ActionTriggerEngine;
use crate::application::node_service::StandardNodeService;
use crate::domain::config::RepositoryConfigManifest;
use crate::domain::repository::{ActionRepository, NodeRepository};
use crate::infrastructure::builtin_actions::builtin_registry;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::repositories::{InMemoryActionRepository, InMemoryNodeRepository};

pub struct DocVault {
    pub config: RepositoryConfigManifest,
    pub event_bus: Arc<EventBus>,
    pub nodes: Arc<StandardNodeService>,
    pub actions: Arc<StandardActionService>,
    pub executables: Arc<ExecutableRegistry>,
    pub trigger: Arc<ActionTriggerEngine>,
}

impl DocVault {
    /// Wire the services over the given stores.
    pub fn new(
        config: RepositoryConfigManifest,
        node_repository: Arc<dyn NodeRepository>,
        action_repository: Arc<dyn ActionRepository>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let event_bus = Arc::new(EventBus::with_default_capacity());
        let executables = Arc::new(builtin_registry());
        let nodes = Arc::new(StandardNodeService::new(
            node_repository,
            event_bus.clone(),
            config.spec.query.page_size,
        ));
        let actions = Arc::new(StandardActionService::new(
            action_repository,
            nodes.clone(),
            executables.clone(),
        ));
        let trigger = Arc::new(ActionTriggerEngine::new(
            actions.clone(),
            nodes.clone(),
            config.spec.security.system_principal(),
            config.spec.actions.clone(),
        ));
        ActionTriggerEngine::register(trigger.clone(), &event_bus);

        info!(repository = %config.metadata.name, "Repository services started");

        Ok(Self {
            config,
            event_bus,
            nodes,
            actions,
            executables,
            trigger,
        })
    }

    /// Everything backed by the in-memory stores.
    pub fn in_memory(config: RepositoryConfigManifest) -> anyhow::Result<Self> {
        let nodes = Arc::new(InMemoryNodeRepository::new(&config.spec.security));
        Self::new(config, nodes, Arc::new(InMemoryActionRepository::new()))
    }
}
