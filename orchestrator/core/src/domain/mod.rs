// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Pure types and decision procedures: nodes, principals, the permission
//! guard, actions, smart folder specifications, domain events, and the
//! collaborator contracts the core consumes.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** No I/O; everything here is deterministic

pub mod action;
pub mod config;
pub mod error;
pub mod events;
pub mod node;
pub mod permission;
pub mod principal;
pub mod repository;
pub mod smart_folder;
pub mod user;
