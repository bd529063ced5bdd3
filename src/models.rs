//! Documents persisted in the `users`, `tokens` and `checks` collections.
//!
//! Field names on the wire and on disk are camelCase.

use serde::{Deserialize, Deserializer, Serialize};

use crate::validation;

// ── Users ───────────────────────────────────────────────────────────

/// A registered user, keyed by phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub hashed_password: String,
    pub tos_agreement: bool,
    /// Ids of the checks owned by this user, in creation order.
    #[serde(default, deserialize_with = "lenient_checks")]
    pub checks: Vec<String>,
}

impl User {
    /// The response view of this user. Never carries the password hash.
    pub fn profile(&self) -> UserProfile<'_> {
        UserProfile {
            first_name: &self.first_name,
            last_name: &self.last_name,
            phone: &self.phone,
            tos_agreement: self.tos_agreement,
            checks: &self.checks,
        }
    }
}

/// Serializable view of a [`User`] without `hashedPassword`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: &'a str,
    pub tos_agreement: bool,
    pub checks: &'a [String],
}

fn lenient_checks<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(validation::validate_user_checks(&raw))
}

// ── Tokens ──────────────────────────────────────────────────────────

/// A session token. `expires` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub phone: String,
    pub expires: i64,
}

impl Token {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires <= now_ms
    }
}

// ── Checks ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }
}

/// HTTP method a check issues against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Post,
    Get,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "post" => Some(Self::Post),
            "get" => Some(Self::Get),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// An uptime-check definition owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,
    pub user_phone: String,
    pub protocol: Protocol,
    pub url: String,
    pub method: HttpMethod,
    pub success_codes: Vec<u16>,
    pub timeout_seconds: u8,
}
