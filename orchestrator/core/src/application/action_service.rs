// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Action Application Service
//!
//! Catalogue of built-in and user-defined actions, plus the two ways of
//! running one:
//! - `run_action`: a manual run. Failures go back to the caller.
//! - `execute`: the bare run used by the trigger engine, which isolates
//!   failures itself.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::action_registry::{ExecutableRegistry, RunContext};
use crate::application::node_service::NodeService;
use crate::domain::action::{Action, ActionId, BuiltInAction};
use crate::domain::error::{ServiceError, ServiceResult};
use crate::domain::node::NodeId;
use crate::domain::principal::Principal;
use crate::domain::repository::ActionRepository;

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait ActionService: Send + Sync {
    async fn get_action(&self, uuid: ActionId) -> ServiceResult<Action>;

    /// Built-ins first, then stored actions by title.
    async fn list_actions(&self) -> ServiceResult<Vec<Action>>;

    /// Create or replace a user-defined action. Administrators only.
    async fn upsert_action(&self, principal: &Principal, action: Action) -> ServiceResult<Action>;

    async fn delete_action(&self, principal: &Principal, uuid: ActionId) -> ServiceResult<()>;

    /// Run an action on `targets` as `principal`. Authorization to invoke the
    /// action at all is the API boundary's concern.
    async fn run_action(
        &self,
        principal: &Principal,
        uuid: ActionId,
        targets: Vec<NodeId>,
        params: HashMap<String, String>,
    ) -> ServiceResult<()>;

    /// Resolve the executable and run every invocation for `targets`. No
    /// precondition checks.
    async fn execute(
        &self,
        action: &Action,
        principal: &Principal,
        targets: &[NodeId],
        params: HashMap<String, String>,
    ) -> anyhow::Result<()>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardActionService {
    repository: Arc<dyn ActionRepository>,
    nodes: Arc<dyn NodeService>,
    executables: Arc<ExecutableRegistry>,
}

impl StandardActionService {
    pub fn new(
        repository: Arc<dyn ActionRepository>,
        nodes: Arc<dyn NodeService>,
        executables: Arc<ExecutableRegistry>,
    ) -> Self {
        Self {
            repository,
            nodes,
            executables,
        }
    }

    fn builtin(uuid: ActionId) -> Option<Action> {
        BuiltInAction::ALL
            .into_iter()
            .find(|kind| ActionId::for_builtin(*kind) == uuid)
            .map(Action::builtin)
    }

    fn require_admin(principal: &Principal) -> ServiceResult<()> {
        if principal.is_admin {
            Ok(())
        } else {
            Err(ServiceError::forbidden(format!("{} cannot manage actions", principal.email)))
        }
    }
}

#[async_trait]
impl ActionService for StandardActionService {
    async fn get_action(&self, uuid: ActionId) -> ServiceResult<Action> {
        if let Some(action) = Self::builtin(uuid) {
            return Ok(action);
        }
        Ok(self.repository.get(uuid).await?)
    }

    async fn list_actions(&self) -> ServiceResult<Vec<Action>> {
        let mut actions: Vec<Action> = BuiltInAction::ALL.into_iter().map(Action::builtin).collect();
        actions.extend(self.repository.list().await?);
        Ok(actions)
    }

    async fn upsert_action(&self, principal: &Principal, action: Action) -> ServiceResult<Action> {
        Self::require_admin(principal)?;
        if action.built_in || Self::builtin(action.uuid).is_some() {
            return Err(ServiceError::bad_request("built-in actions are read-only"));
        }
        action.validate()?;
        if !self.executables.is_registered(&action.executable) {
            return Err(ServiceError::Validation(format!(
                "action '{}' references an unregistered executable",
                action.title
            )));
        }

        self.repository.add_or_replace(action.clone()).await?;
        info!(action = %action.uuid, title = %action.title, actor = %principal.email, "Action stored");
        Ok(action)
    }

    async fn delete_action(&self, principal: &Principal, uuid: ActionId) -> ServiceResult<()> {
        Self::require_admin(principal)?;
        if Self::builtin(uuid).is_some() {
            return Err(ServiceError::bad_request("built-in actions are read-only"));
        }
        self.repository.delete(uuid).await?;
        info!(action = %uuid, actor = %principal.email, "Action deleted");
        Ok(())
    }

    async fn run_action(
        &self,
        principal: &Principal,
        uuid: ActionId,
        targets: Vec<NodeId>,
        params: HashMap<String, String>,
    ) -> ServiceResult<()> {
        let action = self.get_action(uuid).await?;
        if !action.run_manually {
            return Err(ServiceError::bad_request(format!(
                "action '{}' cannot be run manually",
                action.title
            )));
        }
        if targets.is_empty() {
            return Err(ServiceError::bad_request("no target nodes given"));
        }
        if let Some(missing) = action.params.iter().find(|p| !params.contains_key(*p)) {
            return Err(ServiceError::bad_request(format!(
                "action '{}' requires parameter '{}'",
                action.title, missing
            )));
        }
        if !self.executables.is_registered(&action.executable) {
            return Err(ServiceError::not_found(format!(
                "executable for action '{}'",
                action.title
            )));
        }
        for target in &targets {
            let node = self.nodes.get(principal, *target).await?;
            if !action.matches(&node) {
                return Err(ServiceError::bad_request(format!(
                    "node {} does not satisfy the constraints of action '{}'",
                    target, action.title
                )));
            }
        }

        info!(action = %action.uuid, targets = targets.len(), actor = %principal.email, "Running action");
        self.execute(&action, principal, &targets, params)
            .await
            .map_err(|source| ServiceError::ActionFailed {
                action: action.title.clone(),
                source,
            })
    }

    async fn execute(
        &self,
        action: &Action,
        principal: &Principal,
        targets: &[NodeId],
        params: HashMap<String, String>,
    ) -> anyhow::Result<()> {
        let executable = self
            .executables
            .resolve(&action.executable)
            .ok_or_else(|| anyhow::anyhow!("no executable registered for action '{}'", action.title))?;

        let ctx = RunContext {
            action: action.clone(),
            principal: principal.clone(),
            nodes: self.nodes.clone(),
            params,
        };
        for batch in action.invocations(targets) {
            debug!(action = %action.uuid, batch = batch.len(), "Invoking action executable");
            executable.run(&ctx, &batch).await?;
        }
        Ok(())
    }
}
