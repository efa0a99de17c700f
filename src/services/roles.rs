//! Role applications and direct role management
//!
//! Applying for a role is off-chain bookkeeping. Approving one submits a
//! `grant_role` transaction from the reviewing admin, and the application is
//! only marked approved once that transaction succeeds.

use std::sync::Arc;

use seatrace_registry::{Address, RegistryCall, Role};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chain::{ChainClient, TxReceipt};
use crate::db::applications::{self, ApplicationQuery, ApplicationRow, ApplicationStatus, NewApplication};
use crate::db::{users, Database};
use crate::types::{GatewayError, Result};

/// Body of `POST /applications`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitApplicationInput {
    pub role: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub justification: Option<String>,
}

/// Body of `POST /applications/{id}/approve` and `/reject`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    #[serde(default)]
    pub note: Option<String>,
}

/// Body of `POST /roles/grant` and `/roles/revoke`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeInput {
    pub address: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationReviewed {
    pub application: ApplicationRow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<TxReceipt>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChanged {
    pub address: Address,
    pub role: Role,
    /// False when granting a role the address already held
    pub changed: bool,
    pub roles: Vec<Role>,
    pub receipt: TxReceipt,
}

pub struct RoleService {
    db: Arc<Database>,
    chain: Arc<dyn ChainClient>,
}

impl RoleService {
    pub fn new(db: Arc<Database>, chain: Arc<dyn ChainClient>) -> Self {
        Self { db, chain }
    }

    pub async fn submit_application(
        &self,
        applicant: &Address,
        input: SubmitApplicationInput,
    ) -> Result<ApplicationRow> {
        let role = parse_role(&input.role)?;
        if role == Role::Admin {
            return Err(GatewayError::BadRequest(
                "The admin role is granted directly, not by application".into(),
            ));
        }
        if self.chain.has_role(applicant, role).await {
            return Err(GatewayError::Conflict(format!("{} already holds the {} role", applicant, role)));
        }

        let application = self.db.with_conn(|conn| {
            users::ensure_user(conn, applicant.as_str())?;
            applications::create_application(
                conn,
                NewApplication {
                    applicant: applicant.to_string(),
                    role,
                    organization: trimmed(input.organization),
                    justification: trimmed(input.justification),
                },
            )
        })?;

        info!(id = %application.id, applicant = %applicant, role = %role, "Role application submitted");
        Ok(application)
    }

    /// Admins see every application; anyone else only their own.
    pub async fn list_applications(&self, caller: &Address, mut query: ApplicationQuery) -> Result<Vec<ApplicationRow>> {
        if !self.chain.has_role(caller, Role::Admin).await {
            query.applicant = Some(caller.to_string());
        } else if let Some(applicant) = &query.applicant {
            query.applicant = Some(parse_address(applicant)?.to_string());
        }
        self.db.with_conn(|conn| applications::list_applications(conn, &query))
    }

    pub async fn approve(&self, reviewer: &Address, id: &str, input: ReviewInput) -> Result<ApplicationReviewed> {
        let application = self.pending(id)?;
        let applicant = parse_address(&application.applicant)?;

        let submitted = self
            .chain
            .submit(
                reviewer,
                RegistryCall::GrantRole {
                    target: applicant,
                    role: application.role,
                },
            )
            .await?;

        let application = self.db.with_conn(|conn| {
            applications::resolve_application(
                conn,
                id,
                ApplicationStatus::Approved,
                reviewer.as_str(),
                input.note.as_deref(),
                Some(&submitted.receipt.tx_hash),
            )
        })?;

        info!(id, applicant = %application.applicant, role = %application.role, reviewer = %reviewer, "Role application approved");
        Ok(ApplicationReviewed {
            application,
            receipt: Some(submitted.receipt),
        })
    }

    pub async fn reject(&self, reviewer: &Address, id: &str, input: ReviewInput) -> Result<ApplicationReviewed> {
        self.require_admin(reviewer).await?;
        self.pending(id)?;

        let application = self.db.with_conn(|conn| {
            applications::resolve_application(
                conn,
                id,
                ApplicationStatus::Rejected,
                reviewer.as_str(),
                input.note.as_deref(),
                None,
            )
        })?;

        info!(id, applicant = %application.applicant, role = %application.role, reviewer = %reviewer, "Role application rejected");
        Ok(ApplicationReviewed {
            application,
            receipt: None,
        })
    }

    pub async fn grant(&self, admin: &Address, input: RoleChangeInput) -> Result<RoleChanged> {
        let target = parse_address(&input.address)?;
        let role = parse_role(&input.role)?;

        let submitted = self
            .chain
            .submit(
                admin,
                RegistryCall::GrantRole {
                    target: target.clone(),
                    role,
                },
            )
            .await?;
        let changed = matches!(
            submitted.outcome,
            seatrace_registry::CallOutcome::RoleGranted {
                newly_granted: true,
                ..
            }
        );

        info!(target = %target, role = %role, admin = %admin, changed, "Role granted");
        Ok(RoleChanged {
            roles: self.chain.roles_of(&target).await,
            address: target,
            role,
            changed,
            receipt: submitted.receipt,
        })
    }

    pub async fn revoke(&self, admin: &Address, input: RoleChangeInput) -> Result<RoleChanged> {
        let target = parse_address(&input.address)?;
        let role = parse_role(&input.role)?;

        let submitted = self
            .chain
            .submit(
                admin,
                RegistryCall::RevokeRole {
                    target: target.clone(),
                    role,
                },
            )
            .await?;

        info!(target = %target, role = %role, admin = %admin, "Role revoked");
        Ok(RoleChanged {
            roles: self.chain.roles_of(&target).await,
            address: target,
            role,
            changed: true,
            receipt: submitted.receipt,
        })
    }

    async fn require_admin(&self, caller: &Address) -> Result<()> {
        if self.chain.has_role(caller, Role::Admin).await {
            Ok(())
        } else {
            Err(GatewayError::Forbidden("Admin role required".into()))
        }
    }

    fn pending(&self, id: &str) -> Result<ApplicationRow> {
        let application = self
            .db
            .with_conn(|conn| applications::get_application(conn, id))?
            .ok_or_else(|| GatewayError::NotFound(format!("Application {}", id)))?;
        if application.status != ApplicationStatus::Pending {
            return Err(GatewayError::Conflict(format!(
                "Application {} is already {}",
                id, application.status
            )));
        }
        Ok(application)
    }
}

pub(crate) fn parse_address(raw: &str) -> Result<Address> {
    Address::parse(raw).map_err(|e| GatewayError::BadRequest(e.to_string()))
}

pub(crate) fn parse_role(raw: &str) -> Result<Role> {
    raw.parse::<Role>().map_err(|e| GatewayError::BadRequest(e.to_string()))
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
