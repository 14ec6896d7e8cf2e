// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Action Aggregate
//!
//! An action is a data record (constraints, flags, declared parameters) plus a
//! reference to the executable that implements it. The reference is resolved
//! through an executable registry at run time, so the record itself never
//! carries behaviour and can be stored, listed and serialised like any other
//! entity.
//!
//! ## Matching
//!
//! [`Action::matches`] is used by the trigger engine for every lifecycle
//! event:
//! 1. `mimetype_constraints` empty, or one entry matches the node's mimetype
//!    (exact, `type/*`, or the `*` wildcard)
//! 2. `aspect_constraints` empty, or it shares at least one aspect with the node

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::node::{Node, NodeId};

/// Matches every mimetype.
pub const MIMETYPE_WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId(pub Uuid);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Stable identifier for a built-in, derived from its kind so it survives restarts.
    pub fn for_builtin(kind: BuiltInAction) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, kind.key().as_bytes()))
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltInAction {
    MoveToFolder,
    CopyToFolder,
    MoveUp,
    DeleteAll,
}

impl BuiltInAction {
    pub const ALL: [BuiltInAction; 4] = [
        BuiltInAction::MoveToFolder,
        BuiltInAction::CopyToFolder,
        BuiltInAction::MoveUp,
        BuiltInAction::DeleteAll,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            BuiltInAction::MoveToFolder => "move_to_folder",
            BuiltInAction::CopyToFolder => "copy_to_folder",
            BuiltInAction::MoveUp => "move_up",
            BuiltInAction::DeleteAll => "delete_all",
        }
    }
}

/// Where the behaviour of an action lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutableRef {
    BuiltIn { action: BuiltInAction },
    Script { key: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub uuid: ActionId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub built_in: bool,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default = "default_true")]
    pub run_on_creates: bool,
    #[serde(default = "default_true")]
    pub run_on_updates: bool,
    #[serde(default = "default_true")]
    pub run_manually: bool,
    #[serde(default)]
    pub aspect_constraints: BTreeSet<String>,
    #[serde(default)]
    pub mimetype_constraints: BTreeSet<String>,
    #[serde(default)]
    pub params: Vec<String>,
    pub executable: ExecutableRef,
}

fn default_true() -> bool {
    true
}

impl Action {
    /// A user-defined action backed by a registered script.
    pub fn script(title: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            uuid: ActionId::new(),
            title: title.into(),
            description: String::new(),
            built_in: false,
            multiple: false,
            run_on_creates: true,
            run_on_updates: true,
            run_manually: true,
            aspect_constraints: BTreeSet::new(),
            mimetype_constraints: BTreeSet::new(),
            params: Vec::new(),
            executable: ExecutableRef::Script { key: key.into() },
        }
    }

    pub fn builtin(kind: BuiltInAction) -> Self {
        let (title, params, multiple) = match kind {
            BuiltInAction::MoveToFolder => ("Move to folder", vec!["to".to_string()], true),
            BuiltInAction::CopyToFolder => ("Copy to folder", vec!["to".to_string()], true),
            BuiltInAction::MoveUp => ("Move up", vec![], true),
            BuiltInAction::DeleteAll => ("Delete all", vec![], true),
        };
        Self {
            uuid: ActionId::for_builtin(kind),
            title: title.to_string(),
            description: String::new(),
            built_in: true,
            multiple,
            // Built-ins only run when asked to.
            run_on_creates: false,
            run_on_updates: false,
            run_manually: true,
            aspect_constraints: BTreeSet::new(),
            mimetype_constraints: BTreeSet::new(),
            params,
            executable: ExecutableRef::BuiltIn { action: kind },
        }
    }

    pub fn matches(&self, node: &Node) -> bool {
        self.matches_mimetype(&node.mimetype) && self.matches_aspects(&node.aspects)
    }

    pub fn matches_mimetype(&self, mimetype: &str) -> bool {
        self.mimetype_constraints.is_empty()
            || self
                .mimetype_constraints
                .iter()
                .any(|constraint| mimetype_matches(constraint, mimetype))
    }

    pub fn matches_aspects(&self, aspects: &[String]) -> bool {
        self.aspect_constraints.is_empty()
            || aspects.iter().any(|a| self.aspect_constraints.contains(a))
    }

    /// Split `targets` into invocations: one batch when the action accepts
    /// many nodes, otherwise one invocation per node.
    pub fn invocations(&self, targets: &[NodeId]) -> Vec<Vec<NodeId>> {
        if targets.is_empty() {
            return Vec::new();
        }
        if self.multiple {
            vec![targets.to_vec()]
        } else {
            targets.iter().map(|t| vec![*t]).collect()
        }
    }

    pub fn validate(&self) -> Result<(), ActionValidationError> {
        if self.title.trim().is_empty() {
            return Err(ActionValidationError::EmptyTitle);
        }
        if let ExecutableRef::Script { key } = &self.executable {
            if key.trim().is_empty() {
                return Err(ActionValidationError::MissingExecutable);
            }
        }
        if self.built_in != matches!(self.executable, ExecutableRef::BuiltIn { .. }) {
            return Err(ActionValidationError::BuiltInMismatch);
        }
        let mut seen = BTreeSet::new();
        for param in &self.params {
            if param.trim().is_empty() {
                return Err(ActionValidationError::EmptyParam);
            }
            if !seen.insert(param.as_str()) {
                return Err(ActionValidationError::DuplicateParam(param.clone()));
            }
        }
        for constraint in &self.mimetype_constraints {
            if !is_valid_mimetype_constraint(constraint) {
                return Err(ActionValidationError::InvalidMimetype(constraint.clone()));
            }
        }
        Ok(())
    }
}

fn mimetype_matches(constraint: &str, mimetype: &str) -> bool {
    if constraint == MIMETYPE_WILDCARD || constraint == mimetype {
        return true;
    }
    match constraint.strip_suffix("/*") {
        Some(top_level) => mimetype
            .split_once('/')
            .is_some_and(|(kind, _)| kind == top_level),
        None => false,
    }
}

fn is_valid_mimetype_constraint(constraint: &str) -> bool {
    if constraint == MIMETYPE_WILDCARD {
        return true;
    }
    match constraint.split_once('/') {
        Some((kind, sub)) => !kind.is_empty() && !sub.is_empty() && kind != "*" && !sub.contains('/'),
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionValidationError {
    #[error("action title cannot be empty")]
    EmptyTitle,

    #[error("action has no executable reference")]
    MissingExecutable,

    #[error("built_in flag disagrees with executable reference")]
    BuiltInMismatch,

    #[error("action parameter names cannot be empty")]
    EmptyParam,

    #[error("duplicate action parameter '{0}'")]
    DuplicateParam(String),

    #[error("invalid mimetype constraint '{0}'")]
    InvalidMimetype(String),
}
