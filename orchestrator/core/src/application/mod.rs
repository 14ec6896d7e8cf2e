// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod action_registry;
pub mod action_service;
pub mod action_trigger;
pub mod bootstrap;
pub mod node_service;
pub mod smart_folder_service;

// Re-export services for convenience
pub use action_registry::{ActionExecutable, ExecutableRegistry, RunContext};
pub use action_service::{ActionService, StandardActionService};
pub use action_trigger::{ActionRunRecord, ActionRunState, ActionTriggerEngine};
pub use bootstrap::DocVault;
pub use node_service::{NodeService, StandardNodeService};
pub use smart_folder_service::SmartFolderEvaluator;
