// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod builtin_actions;
pub mod event_bus;
pub mod repositories;
pub mod telemetry;

pub use event_bus::{EventBus, EventBusError, EventHandler, EventReceiver};
