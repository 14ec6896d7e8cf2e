// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::domain::config::SecurityConfig;
use crate::domain::error::ServiceResult;
use crate::domain::principal::{AuthenticationContext, Principal};

/// A registered user. Credentials live with the external user store; this
/// record only carries what permission checks need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub full_name: String,
    pub group: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserValidationError {
    #[error("full name must have at least 3 characters")]
    FullNameTooShort,

    #[error("malformed email address '{0}'")]
    InvalidEmail(String),

    #[error("user must belong to a primary group")]
    MissingGroup,
}

impl User {
    pub fn new(email: impl Into<String>, full_name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            full_name: full_name.into(),
            group: group.into(),
            groups: BTreeSet::new(),
        }
    }

    pub fn validate(&self) -> Result<(), UserValidationError> {
        if self.full_name.trim().chars().count() < 3 {
            return Err(UserValidationError::FullNameTooShort);
        }
        if !is_valid_email(&self.email) {
            return Err(UserValidationError::InvalidEmail(self.email.clone()));
        }
        if self.group.trim().is_empty() {
            return Err(UserValidationError::MissingGroup);
        }
        Ok(())
    }

    /// Primary group plus secondary groups. Membership of `admin_group`
    /// makes the principal an administrator.
    pub fn to_principal(&self, admin_group: &str) -> Principal {
        let mut groups = self.groups.clone();
        groups.insert(self.group.clone());
        let is_admin = groups.contains(admin_group);
        Principal {
            email: self.email.clone(),
            groups,
            is_admin,
        }
    }
}

/// Authentication context for a validated, signed-in user.
#[derive(Debug, Clone)]
pub struct UserSession {
    principal: Principal,
}

impl UserSession {
    pub fn open(user: &User, security: &SecurityConfig) -> ServiceResult<Self> {
        user.validate()?;
        Ok(Self {
            principal: user.to_principal(&security.admin_group),
        })
    }
}

impl AuthenticationContext for UserSession {
    fn principal(&self) -> Principal {
        self.principal.clone()
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::principal::ADMINS_GROUP;

    #[test]
    fn test_valid_user() {
        let user = User::new("bob@example.com", "Bob Stone", "eng");
        assert!(user.validate().is_ok());
        let principal = user.to_principal(ADMINS_GROUP);
        assert!(principal.in_group("eng"));
        assert!(!principal.is_admin);
    }

    #[test]
    fn test_short_full_name() {
        let user = User::new("bob@example.com", "Bo", "eng");
        assert_eq!(user.validate(), Err(UserValidationError::FullNameTooShort));
    }

    #[test]
    fn test_malformed_emails() {
        for email in ["bob", "bob@", "@example.com", "bob@example", "bob@@example.com", "b ob@example.com"] {
            let user = User::new(email, "Bob Stone", "eng");
            assert!(matches!(user.validate(), Err(UserValidationError::InvalidEmail(_))), "{email}");
        }
    }

    #[test]
    fn test_session_rejects_invalid_user() {
        let security = SecurityConfig::default();
        let err = UserSession::open(&User::new("bob@example.com", "Bo", "eng"), &security).unwrap_err();
        assert!(matches!(err, crate::domain::error::ServiceError::Validation(_)));

        let session = UserSession::open(&User::new("bob@example.com", "Bob Stone", "eng"), &security).unwrap();
        assert_eq!(session.principal().email, "bob@example.com");
    }

    #[test]
    fn test_admin_group_makes_admin() {
        let mut user = User::new("root@example.com", "Root User", "eng");
        user.groups.insert(ADMINS_GROUP.to_string());
        assert!(user.to_principal(ADMINS_GROUP).is_admin);
    }

    #[test]
    fn test_configured_admin_group() {
        let security = SecurityConfig {
            admin_group: "ops-admins".to_string(),
            ..Default::default()
        };
        let mut user = User::new("ops@example.com", "Ops Lead", "eng");
        user.groups.insert("ops-admins".to_string());
        let session = UserSession::open(&user, &security).unwrap();
        assert!(session.principal().is_admin);

        // The built-in group name carries no weight once another is configured.
        let mut legacy = User::new("old@example.com", "Old Admin", "eng");
        legacy.groups.insert(ADMINS_GROUP.to_string());
        assert!(!UserSession::open(&legacy, &security).unwrap().principal().is_admin);
    }
}
