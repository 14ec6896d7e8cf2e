// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Executable Registry
//!
//! Actions are data records. What an action actually does is looked up here
//! at run time from its `ExecutableRef`: built-in kinds map to the bundled
//! executables, script keys map to whatever the host registered.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::application::node_service::NodeService;
use crate::domain::action::{Action, BuiltInAction, ExecutableRef};
use crate::domain::node::NodeId;
use crate::domain::principal::Principal;

/// Everything an executable may use during one invocation.
#[derive(Clone)]
pub struct RunContext {
    pub action: Action,
    /// Identity every node operation is performed as.
    pub principal: Principal,
    pub nodes: Arc<dyn NodeService>,
    pub params: HashMap<String, String>,
}

impl RunContext {
    pub fn param(&self, name: &str) -> anyhow::Result<&str> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| anyhow::anyhow!("action '{}' requires parameter '{}'", self.action.title, name))
    }

    pub fn node_param(&self, name: &str) -> anyhow::Result<NodeId> {
        let raw = self.param(name)?;
        NodeId::from_string(raw)
            .map_err(|e| anyhow::anyhow!("parameter '{}' is not a node id ({}): {}", name, raw, e))
    }
}

#[async_trait]
pub trait ActionExecutable: Send + Sync {
    async fn run(&self, ctx: &RunContext, targets: &[NodeId]) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct ExecutableRegistry {
    builtins: RwLock<HashMap<BuiltInAction, Arc<dyn ActionExecutable>>>,
    scripts: RwLock<HashMap<String, Arc<dyn ActionExecutable>>>,
}

impl ExecutableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_builtin(&self, kind: BuiltInAction, executable: Arc<dyn ActionExecutable>) {
        self.builtins.write().insert(kind, executable);
    }

    /// Register (or replace) the executable behind a script key.
    pub fn register_script(&self, key: impl Into<String>, executable: Arc<dyn ActionExecutable>) {
        let key = key.into();
        tracing::debug!(key = %key, "Registering action script");
        self.scripts.write().insert(key, executable);
    }

    pub fn resolve(&self, reference: &ExecutableRef) -> Option<Arc<dyn ActionExecutable>> {
        match reference {
            ExecutableRef::BuiltIn { action } => self.builtins.read().get(action).cloned(),
            ExecutableRef::Script { key } => self.scripts.read().get(key).cloned(),
        }
    }

    pub fn is_registered(&self, reference: &ExecutableRef) -> bool {
        self.resolve(reference).is_some()
    }
}
