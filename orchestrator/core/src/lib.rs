// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! DocVault orchestration core
//!
//! Permission-gated node operations, the in-process domain event bus, the
//! action trigger engine and smart folder evaluation for a headless content
//! repository.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** `domain` holds pure types and decisions, `application`
//!   sequences them, `infrastructure` provides the bus, stores and telemetry

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
