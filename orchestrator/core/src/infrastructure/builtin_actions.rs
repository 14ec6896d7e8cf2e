// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Built-in action executables. Every node operation goes back through the
//! orchestrator as the run's principal, so built-ins get no access the
//! principal does not already have.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::application::action_registry::{ActionExecutable, ExecutableRegistry, RunContext};
use crate::application::node_service::NodeService;
use crate::domain::action::BuiltInAction;
use crate::domain::node::{NodeId, NodePatch};

/// Registry pre-loaded with every built-in executable.
pub fn builtin_registry() -> ExecutableRegistry {
    let registry = ExecutableRegistry::new();
    for kind in BuiltInAction::ALL {
        registry.register_builtin(kind, builtin_executable(kind));
    }
    registry
}

pub fn builtin_executable(kind: BuiltInAction) -> Arc<dyn ActionExecutable> {
    match kind {
        BuiltInAction::MoveToFolder => Arc::new(MoveToFolder),
        BuiltInAction::CopyToFolder => Arc::new(CopyToFolder),
        BuiltInAction::MoveUp => Arc::new(MoveUp),
        BuiltInAction::DeleteAll => Arc::new(DeleteAll),
    }
}

pub struct MoveToFolder;

#[async_trait]
impl ActionExecutable for MoveToFolder {
    async fn run(&self, ctx: &RunContext, targets: &[NodeId]) -> anyhow::Result<()> {
        let destination = ctx.node_param("to")?;
        for target in targets {
            ctx.nodes
                .update(&ctx.principal, *target, NodePatch::move_to(destination), false)
                .await?;
        }
        info!(destination = %destination, moved = targets.len(), "Moved nodes");
        Ok(())
    }
}

pub struct CopyToFolder;

#[async_trait]
impl ActionExecutable for CopyToFolder {
    async fn run(&self, ctx: &RunContext, targets: &[NodeId]) -> anyhow::Result<()> {
        let destination = ctx.node_param("to")?;
        for target in targets {
            ctx.nodes.copy(&ctx.principal, *target, destination).await?;
        }
        info!(destination = %destination, copied = targets.len(), "Copied nodes");
        Ok(())
    }
}

/// Moves each node to its grandparent.
pub struct MoveUp;

#[async_trait]
impl ActionExecutable for MoveUp {
    async fn run(&self, ctx: &RunContext, targets: &[NodeId]) -> anyhow::Result<()> {
        for target in targets {
            let node = ctx.nodes.get(&ctx.principal, *target).await?;
            if node.parent == NodeId::ROOT {
                anyhow::bail!("node {} is already at the top level", node.uuid);
            }
            let parent = ctx.nodes.get(&ctx.principal, node.parent).await?;
            ctx.nodes
                .update(&ctx.principal, node.uuid, NodePatch::move_to(parent.parent), false)
                .await?;
        }
        Ok(())
    }
}

pub struct DeleteAll;

#[async_trait]
impl ActionExecutable for DeleteAll {
    async fn run(&self, ctx: &RunContext, targets: &[NodeId]) -> anyhow::Result<()> {
        for target in targets {
            ctx.nodes.delete(&ctx.principal, *target).await?;
        }
        info!(deleted = targets.len(), "Deleted nodes");
        Ok(())
    }
}
