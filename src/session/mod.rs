//! Login session tracking and idle expiry.
//!
//! The monitor runs synchronously on the interaction thread: every check is
//! an in-memory comparison, never I/O, because it directly gates navigation.

mod monitor;

pub use monitor::{SessionCheck, SessionMonitor};

use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Role of a logged-in user, used by the presentation layer to pick which
/// dashboard to route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Merchant,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Merchant => "merchant",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(UserRole::Customer),
            "merchant" => Some(UserRole::Merchant),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// Identity attached to a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: String,
    pub role: UserRole,
}

/// Opaque handle the presentation layer carries for a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn generate() -> SessionToken {
        let rng = rand::rng();
        let random_string: String = rng
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        SessionToken(random_string)
    }
}
