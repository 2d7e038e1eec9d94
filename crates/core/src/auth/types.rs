use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::order::Actor;

/// Header carrying the caller's subject id.
pub const SUBJECT_ID_HEADER: &str = "x-subject-id";
/// Header carrying the caller's role.
pub const SUBJECT_ROLE_HEADER: &str = "x-subject-role";

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

/// Which side of the marketplace the caller acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Shop,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Shop => "shop",
        }
    }

    /// The actor this role drives status changes as.
    pub fn actor(&self) -> Actor {
        match self {
            Role::Customer => Actor::Customer,
            Role::Shop => Actor::Shop,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "shop" => Ok(Role::Shop),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Authenticated identity
///
/// For `Role::Shop` the subject id is the shop id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: String,
    pub role: Role,
    pub method: String,
}

impl Identity {
    pub fn new(subject_id: impl Into<String>, role: Role, method: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            role,
            method: method.into(),
        }
    }

    pub fn is_shop(&self) -> bool {
        self.role == Role::Shop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("customer".parse::<Role>().unwrap(), Role::Customer);
        assert_eq!("shop".parse::<Role>().unwrap(), Role::Shop);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_actor() {
        assert_eq!(Role::Customer.actor(), Actor::Customer);
        assert_eq!(Role::Shop.actor(), Actor::Shop);
    }

    #[test]
    fn test_identity_serialization() {
        let identity = Identity {
            subject_id: "user123".to_string(),
            role: Role::Customer,
            method: "trusted_headers".to_string(),
        };

        let json = serde_json::to_string(&identity).unwrap();
        assert!(json.contains("\"role\":\"customer\""));

        let deserialized: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, identity);
    }
}
