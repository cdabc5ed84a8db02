// Copyright (c) 2026 Abacus Contributors
// SPDX-License-Identifier: Apache-2.0

use core::fmt;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Access role established for a call.
///
/// `Denied` is a sentinel meaning "no role could be established"; credential
/// resolution never yields it on success, and no policy entry should grant
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
    Guest,
    Denied,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
            Self::Guest => "GUEST",
            Self::Denied => "DENIED",
        }
    }

    /// Parse a role asserted by a credential. Only grantable roles are
    /// accepted; `DENIED` and unknown strings are rejected so a forged or
    /// malformed claim can never smuggle the sentinel in.
    pub fn from_claim(value: &str) -> Option<Self> {
        match value {
            "ADMIN" => Some(Self::Admin),
            "USER" => Some(Self::User),
            "GUEST" => Some(Self::Guest),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-method role allow-list.
///
/// Keys are full gRPC method paths. A method with no entry (or an empty
/// role list) is publicly accessible; this fail-open default is inherited
/// behavior, recorded in DESIGN.md. Constructed once at startup and passed
/// by reference into the interceptor; lookups are read-only and lock-free.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    rules: HashMap<String, Vec<Role>>,
}

impl AccessPolicy {
    pub fn new<I, K>(rules: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<Role>)>,
        K: Into<String>,
    {
        Self {
            rules: rules
                .into_iter()
                .map(|(method, roles)| (method.into(), roles))
                .collect(),
        }
    }

    /// Replace or add per-method entries, e.g. from a config file. Meant to
    /// run during startup, before the policy is shared.
    pub fn apply_overrides<I, K>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (K, Vec<Role>)>,
        K: Into<String>,
    {
        for (method, roles) in overrides {
            self.rules.insert(method.into(), roles);
        }
    }

    /// Whether `role` may invoke `method`. Deterministic and side-effect
    /// free.
    pub fn is_accessible(&self, method: &str, role: Role) -> bool {
        match self.rules.get(method) {
            None => true,
            Some(allowed) if allowed.is_empty() => true,
            Some(allowed) => allowed.contains(&role),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> AccessPolicy {
        AccessPolicy::new([
            ("/calc/Add", vec![Role::Admin, Role::User, Role::Guest]),
            ("/calc/Multiply", vec![Role::Admin, Role::User]),
            ("/calc/Divide", vec![Role::Admin]),
            ("/calc/Noop", vec![]),
        ])
    }

    #[test]
    fn listed_roles_are_admitted() {
        let policy = policy();
        assert!(policy.is_accessible("/calc/Add", Role::Guest));
        assert!(policy.is_accessible("/calc/Multiply", Role::User));
        assert!(policy.is_accessible("/calc/Divide", Role::Admin));
    }

    #[test]
    fn unlisted_roles_are_rejected() {
        let policy = policy();
        assert!(!policy.is_accessible("/calc/Multiply", Role::Guest));
        assert!(!policy.is_accessible("/calc/Divide", Role::User));
        assert!(!policy.is_accessible("/calc/Divide", Role::Guest));
        assert!(!policy.is_accessible("/calc/Divide", Role::Denied));
    }

    #[test]
    fn absent_method_is_public() {
        assert!(policy().is_accessible("/calc/Unknown", Role::Denied));
        assert!(policy().is_accessible("/calc/Unknown", Role::Guest));
    }

    #[test]
    fn empty_role_list_is_public() {
        assert!(policy().is_accessible("/calc/Noop", Role::Guest));
    }

    #[test]
    fn lookups_are_deterministic() {
        let policy = policy();
        for _ in 0..2 {
            assert!(policy.is_accessible("/calc/Add", Role::User));
            assert!(!policy.is_accessible("/calc/Divide", Role::Guest));
        }
    }

    #[test]
    fn overrides_replace_entries() {
        let mut policy = policy();
        policy.apply_overrides([("/calc/Divide", vec![Role::Admin, Role::User])]);
        assert!(policy.is_accessible("/calc/Divide", Role::User));
        assert!(!policy.is_accessible("/calc/Divide", Role::Guest));
    }

    #[test]
    fn role_claim_parsing_rejects_sentinel_and_garbage() {
        assert_eq!(Role::from_claim("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::from_claim("USER"), Some(Role::User));
        assert_eq!(Role::from_claim("GUEST"), Some(Role::Guest));
        assert_eq!(Role::from_claim("DENIED"), None);
        assert_eq!(Role::from_claim("admin"), None);
        assert_eq!(Role::from_claim(""), None);
    }
}
