//! Wallet user profiles

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::types::{GatewayError, Result};

/// Longest accepted value for any profile field
pub const MAX_PROFILE_FIELD_LEN: usize = 500;

/// User row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub address: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub organization: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    #[serde(skip_serializing)]
    pub token_version: u32,
    pub created_at: String,
    pub updated_at: String,
    pub last_login_at: Option<String>,
}

impl UserRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            address: row.get("address")?,
            display_name: row.get("display_name")?,
            email: row.get("email")?,
            organization: row.get("organization")?,
            bio: row.get("bio")?,
            location: row.get("location")?,
            token_version: row.get("token_version")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            last_login_at: row.get("last_login_at")?,
        })
    }

    /// Fields safe to show to anyone
    pub fn public_view(&self) -> PublicProfile {
        PublicProfile {
            address: self.address.clone(),
            display_name: self.display_name.clone(),
            organization: self.organization.clone(),
            bio: self.bio.clone(),
            location: self.location.clone(),
        }
    }
}

/// Profile without contact details
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub address: String,
    pub display_name: Option<String>,
    pub organization: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

/// Partial profile update; absent fields are left alone, empty strings clear.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl ProfileUpdate {
    fn validate(&self) -> Result<()> {
        let fields = [
            ("displayName", &self.display_name),
            ("email", &self.email),
            ("organization", &self.organization),
            ("bio", &self.bio),
            ("location", &self.location),
        ];
        for (name, value) in fields {
            if let Some(v) = value {
                if v.len() > MAX_PROFILE_FIELD_LEN {
                    return Err(GatewayError::BadRequest(format!(
                        "{} must be at most {} characters",
                        name, MAX_PROFILE_FIELD_LEN
                    )));
                }
            }
        }
        if let Some(email) = self.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            if !email.contains('@') {
                return Err(GatewayError::BadRequest("email is not valid".into()));
            }
        }
        Ok(())
    }
}

pub fn get_user(conn: &Connection, address: &str) -> Result<Option<UserRow>> {
    let user = conn
        .query_row(
            "SELECT * FROM users WHERE address = ?",
            params![address],
            |row| UserRow::from_row(row),
        )
        .optional()?;
    Ok(user)
}

/// Create the user if this is their first sign-in and return the row.
pub fn ensure_user(conn: &Connection, address: &str) -> Result<UserRow> {
    conn.execute(
        "INSERT OR IGNORE INTO users (address) VALUES (?)",
        params![address],
    )?;
    get_user(conn, address)?
        .ok_or_else(|| GatewayError::Internal("User not found after insert".to_string()))
}

pub fn record_login(conn: &Connection, address: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET last_login_at = datetime('now') WHERE address = ?",
        params![address],
    )?;
    Ok(())
}

pub fn update_profile(conn: &Connection, address: &str, update: &ProfileUpdate) -> Result<UserRow> {
    update.validate()?;

    // NULL keeps the stored value, '' clears it
    let normalize = |v: &Option<String>| v.as_ref().map(|s| s.trim().to_string());
    let changed = conn.execute(
        r#"
        UPDATE users SET
            display_name = CASE WHEN ?2 IS NULL THEN display_name ELSE NULLIF(?2, '') END,
            email = CASE WHEN ?3 IS NULL THEN email ELSE NULLIF(?3, '') END,
            organization = CASE WHEN ?4 IS NULL THEN organization ELSE NULLIF(?4, '') END,
            bio = CASE WHEN ?5 IS NULL THEN bio ELSE NULLIF(?5, '') END,
            location = CASE WHEN ?6 IS NULL THEN location ELSE NULLIF(?6, '') END,
            updated_at = datetime('now')
        WHERE address = ?1
        "#,
        params![
            address,
            normalize(&update.display_name),
            normalize(&update.email),
            normalize(&update.organization),
            normalize(&update.bio),
            normalize(&update.location),
        ],
    )?;

    if changed == 0 {
        return Err(GatewayError::NotFound(format!("User {}", address)));
    }
    get_user(conn, address)?
        .ok_or_else(|| GatewayError::NotFound(format!("User {}", address)))
}

/// Invalidate every token issued so far. Returns the new version.
pub fn bump_token_version(conn: &Connection, address: &str) -> Result<u32> {
    conn.execute(
        "UPDATE users SET token_version = token_version + 1 WHERE address = ?",
        params![address],
    )?;
    let version: Option<u32> = conn
        .query_row(
            "SELECT token_version FROM users WHERE address = ?",
            params![address],
            |row| row.get(0),
        )
        .optional()?;
    version.ok_or_else(|| GatewayError::NotFound(format!("User {}", address)))
}
