use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::token::TokenClaims;

/// Decoded identity of an authenticated caller.
///
/// Attached to the request extensions by the token authenticator and read-only
/// from then on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerIdentity {
    #[serde(rename = "id")]
    pub subject_id: String,
    pub email: String,
}

/// A ban list entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clown {
    pub id: Uuid,
    pub steam_id: String,
    pub steam_profile_url: Option<String>,
    pub discord_id: String,
    pub reason: String,
    pub cheat_name: Option<String>,
    pub ban_date: DateTime<Utc>,
    pub proof_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload accepted when creating an entry, after validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClown {
    pub steam_id: String,
    pub steam_profile_url: Option<String>,
    pub discord_id: String,
    pub reason: String,
    pub cheat_name: Option<String>,
    pub ban_date: Option<DateTime<Utc>>,
    pub proof_url: Option<String>,
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClownPatch {
    pub steam_id: Option<String>,
    pub steam_profile_url: Option<String>,
    pub discord_id: Option<String>,
    pub reason: Option<String>,
    pub cheat_name: Option<String>,
    pub ban_date: Option<DateTime<Utc>>,
    pub proof_url: Option<String>,
}

impl NewClown {
    /// Profile link derived from the hex part of the Steam id.
    pub fn derived_profile_url(&self) -> String {
        let steam_id64 = self.steam_id.trim_start_matches("steam:");
        format!("https://steamcommunity.com/profiles/{}", steam_id64)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    /// The decoded token: `{ id, email, iat, exp }`.
    pub admin: TokenClaims,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
