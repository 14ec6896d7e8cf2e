// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Reserved email of an unauthenticated caller.
pub const ANONYMOUS_EMAIL: &str = "anonymous@docvault.local";
/// Email of the automatic principal that runs triggered actions.
pub const SYSTEM_EMAIL: &str = "system@docvault.local";
pub const ADMINS_GROUP: &str = "--admins--";

/// The actor issuing a request. Every permission check is made against one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub email: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl Principal {
    pub fn new<I, S>(email: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            email: email.into(),
            groups: groups.into_iter().map(Into::into).collect(),
            is_admin: false,
        }
    }

    pub fn admin(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            groups: BTreeSet::from([ADMINS_GROUP.to_string()]),
            is_admin: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            email: ANONYMOUS_EMAIL.to_string(),
            groups: BTreeSet::new(),
            is_admin: false,
        }
    }

    /// Automatic principal used for event-triggered action runs.
    pub fn system() -> Self {
        Self::admin(SYSTEM_EMAIL)
    }

    pub fn is_anonymous(&self) -> bool {
        self.email == ANONYMOUS_EMAIL
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

/// Supplies the principal for the current call. The API layer implements
/// this on top of its session/token handling.
pub trait AuthenticationContext: Send + Sync {
    fn principal(&self) -> Principal;
}

impl AuthenticationContext for Principal {
    fn principal(&self) -> Principal {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert!(Principal::anonymous().is_anonymous());
        assert!(!Principal::anonymous().is_admin);
        assert!(Principal::system().is_admin);
        assert!(Principal::system().in_group(ADMINS_GROUP));
    }

    #[test]
    fn test_groups() {
        let bob = Principal::new("bob@example.com", ["eng", "ops"]);
        assert!(bob.in_group("eng"));
        assert!(!bob.in_group("sales"));
        assert_eq!(bob.principal(), bob);
    }
}
