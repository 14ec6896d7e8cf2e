// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Permission Guard
//!
//! Decides whether a [`Principal`] holds a [`Capability`] on a node. Only
//! folders gate access; files and other leaves are reached through the folder
//! that contains them, and the caller checks that folder first.
//!
//! ## Evaluation order
//!
//! [`PERMISSION_LADDER`] is walked top to bottom and the first rule that
//! returns a verdict wins:
//!
//! | # | Rule | Verdict |
//! |---|------|---------|
//! | 1 | [`PermissionRule::NonFolder`] | node is not a folder → granted |
//! | 2 | [`PermissionRule::Admin`] | principal is admin → granted |
//! | 3 | [`PermissionRule::RootRead`] | Root folder and `Read` → granted |
//! | 4 | [`PermissionRule::RootOther`] | Root folder, any other capability → denied |
//! | 5 | [`PermissionRule::Owner`] | principal owns the folder → granted |
//! | 6 | [`PermissionRule::Anonymous`] | capability in `anonymous` → granted |
//! | 7 | [`PermissionRule::Group`] | member of folder group and capability in `group` → granted |
//! | 8 | [`PermissionRule::Authenticated`] | not anonymous and capability in `authenticated` → granted |
//!
//! Nothing matched → denied. The guard performs no I/O and holds no state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::node::Node;
use crate::domain::principal::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Capability {
    Read,
    Write,
    Export,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::Read, Capability::Write, Capability::Export];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Read => "Read",
            Capability::Write => "Write",
            Capability::Export => "Export",
        };
        f.write_str(name)
    }
}

/// Grants recorded on a folder at creation time. Changing a parent's set
/// later does not touch the sets already copied into its children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    #[serde(default)]
    pub owner: BTreeSet<Capability>,
    #[serde(default)]
    pub group: BTreeSet<Capability>,
    #[serde(default)]
    pub anonymous: BTreeSet<Capability>,
    #[serde(default)]
    pub authenticated: BTreeSet<Capability>,
}

impl PermissionSet {
    /// Owner may do everything, group may read, nobody else gets anything.
    pub fn private() -> Self {
        Self {
            owner: BTreeSet::from(Capability::ALL),
            group: BTreeSet::from([Capability::Read]),
            anonymous: BTreeSet::new(),
            authenticated: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Granted,
    Denied,
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionRule {
    NonFolder,
    Admin,
    RootRead,
    RootOther,
    Owner,
    Anonymous,
    Group,
    Authenticated,
}

/// The decision order. Rearranging this array changes who gets access.
pub const PERMISSION_LADDER: [PermissionRule; 8] = [
    PermissionRule::NonFolder,
    PermissionRule::Admin,
    PermissionRule::RootRead,
    PermissionRule::RootOther,
    PermissionRule::Owner,
    PermissionRule::Anonymous,
    PermissionRule::Group,
    PermissionRule::Authenticated,
];

impl PermissionRule {
    /// `Some` when this rule settles the request, `None` to fall through.
    pub fn verdict(&self, principal: &Principal, node: &Node, capability: Capability) -> Option<Decision> {
        let perms = &node.permissions;
        let settles = match self {
            PermissionRule::NonFolder => !node.is_folder(),
            PermissionRule::Admin => principal.is_admin,
            PermissionRule::RootRead => node.is_root() && capability == Capability::Read,
            PermissionRule::RootOther => {
                return node.is_root().then_some(Decision::Denied);
            }
            PermissionRule::Owner => principal.email == node.owner,
            PermissionRule::Anonymous => perms.anonymous.contains(&capability),
            PermissionRule::Group => {
                principal.in_group(&node.group) && perms.group.contains(&capability)
            }
            PermissionRule::Authenticated => {
                !principal.is_anonymous() && perms.authenticated.contains(&capability)
            }
        };
        settles.then_some(Decision::Granted)
    }
}

pub struct PermissionGuard;

impl PermissionGuard {
    pub fn evaluate(principal: &Principal, node: &Node, capability: Capability) -> Decision {
        Self::explain(principal, node, capability)
            .map(|(_, decision)| decision)
            .unwrap_or(Decision::Denied)
    }

    /// Which ladder rule settled the request, if any. `None` means denied by
    /// default.
    pub fn explain(
        principal: &Principal,
        node: &Node,
        capability: Capability,
    ) -> Option<(PermissionRule, Decision)> {
        PERMISSION_LADDER
            .iter()
            .find_map(|rule| rule.verdict(principal, node, capability).map(|d| (*rule, d)))
    }

    pub fn is_granted(principal: &Principal, node: &Node, capability: Capability) -> bool {
        Self::evaluate(principal, node, capability).is_granted()
    }
}
