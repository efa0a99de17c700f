//! Role applications
//!
//! A wallet asks for a registry role; an admin approves (which grants the
//! role on chain) or rejects it. Only one application per applicant and role
//! may be pending at a time.

use rusqlite::{params, Connection, OptionalExtension, Row};
use seatrace_registry::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use super::{page_limit, parsed_column};
use crate::types::{GatewayError, Result};

pub const MAX_JUSTIFICATION_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown application status: {0}")]
pub struct UnknownStatus(String);

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Application row from database
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRow {
    pub id: String,
    pub applicant: String,
    pub role: Role,
    pub organization: Option<String>,
    pub justification: Option<String>,
    pub status: ApplicationStatus,
    pub reviewed_by: Option<String>,
    pub review_note: Option<String>,
    pub grant_tx_hash: Option<String>,
    pub created_at: String,
    pub reviewed_at: Option<String>,
}

impl ApplicationRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            applicant: row.get("applicant")?,
            role: parsed_column(row, "role")?,
            organization: row.get("organization")?,
            justification: row.get("justification")?,
            status: parsed_column(row, "status")?,
            reviewed_by: row.get("reviewed_by")?,
            review_note: row.get("review_note")?,
            grant_tx_hash: row.get("grant_tx_hash")?,
            created_at: row.get("created_at")?,
            reviewed_at: row.get("reviewed_at")?,
        })
    }
}

/// Input for a new application
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub applicant: String,
    pub role: Role,
    pub organization: Option<String>,
    pub justification: Option<String>,
}

/// Filter for listing applications
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationQuery {
    #[serde(default)]
    pub applicant: Option<String>,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

pub fn create_application(conn: &Connection, input: NewApplication) -> Result<ApplicationRow> {
    if let Some(j) = &input.justification {
        if j.len() > MAX_JUSTIFICATION_LEN {
            return Err(GatewayError::BadRequest(format!(
                "justification must be at most {} characters",
                MAX_JUSTIFICATION_LEN
            )));
        }
    }
    if find_pending(conn, &input.applicant, input.role)?.is_some() {
        return Err(GatewayError::Conflict(format!(
            "An application for the {} role is already pending",
            input.role
        )));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        r#"
        INSERT INTO role_applications (id, applicant, role, organization, justification)
        VALUES (?, ?, ?, ?, ?)
        "#,
        params![
            id,
            input.applicant,
            input.role.as_str(),
            input.organization,
            input.justification,
        ],
    )?;
    debug!(id = %id, applicant = %input.applicant, role = %input.role, "Role application created");

    get_application(conn, &id)?
        .ok_or_else(|| GatewayError::Internal("Application not found after insert".to_string()))
}

pub fn get_application(conn: &Connection, id: &str) -> Result<Option<ApplicationRow>> {
    let row = conn
        .query_row(
            "SELECT * FROM role_applications WHERE id = ?",
            params![id],
            |row| ApplicationRow::from_row(row),
        )
        .optional()?;
    Ok(row)
}

pub fn find_pending(conn: &Connection, applicant: &str, role: Role) -> Result<Option<ApplicationRow>> {
    let row = conn
        .query_row(
            "SELECT * FROM role_applications WHERE applicant = ? AND role = ? AND status = 'pending'",
            params![applicant, role.as_str()],
            |row| ApplicationRow::from_row(row),
        )
        .optional()?;
    Ok(row)
}

/// List applications, newest first
pub fn list_applications(conn: &Connection, query: &ApplicationQuery) -> Result<Vec<ApplicationRow>> {
    let status = query.status.map(|s| s.as_str());
    let mut stmt = conn.prepare(
        r#"
        SELECT * FROM role_applications
        WHERE (?1 IS NULL OR applicant = ?1)
          AND (?2 IS NULL OR status = ?2)
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?3 OFFSET ?4
        "#,
    )?;
    let rows = stmt
        .query_map(
            params![
                query.applicant,
                status,
                page_limit(query.limit),
                query.offset.unwrap_or(0)
            ],
            |row| ApplicationRow::from_row(row),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Close a pending application. Fails if it is missing or already decided.
pub fn resolve_application(
    conn: &Connection,
    id: &str,
    status: ApplicationStatus,
    reviewer: &str,
    note: Option<&str>,
    grant_tx_hash: Option<&str>,
) -> Result<ApplicationRow> {
    if status == ApplicationStatus::Pending {
        return Err(GatewayError::BadRequest("Cannot resolve an application to pending".into()));
    }

    let changed = conn.execute(
        r#"
        UPDATE role_applications SET
            status = ?2,
            reviewed_by = ?3,
            review_note = ?4,
            grant_tx_hash = ?5,
            reviewed_at = datetime('now')
        WHERE id = ?1 AND status = 'pending'
        "#,
        params![id, status.as_str(), reviewer, note, grant_tx_hash],
    )?;

    let row = get_application(conn, id)?
        .ok_or_else(|| GatewayError::NotFound(format!("Application {}", id)))?;
    if changed == 0 {
        return Err(GatewayError::Conflict(format!(
            "Application {} is already {}",
            id, row.status
        )));
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;
    use crate::db::users::ensure_user;

    const APPLICANT: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
    const ADMIN: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ensure_user(&conn, APPLICANT).unwrap();
        conn
    }

    fn apply(conn: &Connection, role: Role) -> Result<ApplicationRow> {
        create_application(
            conn,
            NewApplication {
                applicant: APPLICANT.into(),
                role,
                organization: Some("Blue Fleet".into()),
                justification: Some("Licensed vessel operator".into()),
            },
        )
    }

    #[test]
    fn test_one_pending_per_role() {
        let conn = conn();
        let app = apply(&conn, Role::Fisher).unwrap();
        assert_eq!(app.status, ApplicationStatus::Pending);
        assert!(matches!(apply(&conn, Role::Fisher), Err(GatewayError::Conflict(_))));
        // A different role is fine
        assert!(apply(&conn, Role::Processor).is_ok());
    }

    #[test]
    fn test_resolve_once() {
        let conn = conn();
        let app = apply(&conn, Role::Fisher).unwrap();

        let approved = resolve_application(
            &conn,
            &app.id,
            ApplicationStatus::Approved,
            ADMIN,
            Some("welcome"),
            Some("0xabc"),
        )
        .unwrap();
        assert_eq!(approved.status, ApplicationStatus::Approved);
        assert_eq!(approved.reviewed_by.as_deref(), Some(ADMIN));
        assert!(approved.reviewed_at.is_some());

        assert!(matches!(
            resolve_application(&conn, &app.id, ApplicationStatus::Rejected, ADMIN, None, None),
            Err(GatewayError::Conflict(_))
        ));
        assert!(matches!(
            resolve_application(&conn, "missing", ApplicationStatus::Rejected, ADMIN, None, None),
            Err(GatewayError::NotFound(_))
        ));

        // No longer pending, so the applicant may apply again
        assert!(apply(&conn, Role::Fisher).is_ok());
    }

    #[test]
    fn test_list_filters() {
        let conn = conn();
        let first = apply(&conn, Role::Fisher).unwrap();
        apply(&conn, Role::Retailer).unwrap();
        resolve_application(&conn, &first.id, ApplicationStatus::Rejected, ADMIN, None, None).unwrap();

        let all = list_applications(&conn, &ApplicationQuery::default()).unwrap();
        assert_eq!(all.len(), 2);

        let pending = list_applications(
            &conn,
            &ApplicationQuery {
                status: Some(ApplicationStatus::Pending),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].role, Role::Retailer);

        let other = list_applications(
            &conn,
            &ApplicationQuery {
                applicant: Some(ADMIN.into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(other.is_empty());
    }
}
