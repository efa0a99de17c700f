//! The registry state machine
//!
//! Every mutating entry point follows the same order: authorise the caller,
//! validate fields, check existence/collision, then write. Nothing is written
//! before the last check passes, so an `Err` means the state is untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::address::Address;
use crate::call::{CallOutcome, RegistryCall, TxContext};
use crate::error::{RegistryError, Result};
use crate::records::{ConservationRecord, RegistryStats, SourceType, SupplyChainRecord};
use crate::roles::{Role, RoleBook, PRODUCER_ROLES, SUPPLY_CHAIN_ROLES};
use crate::validation;

/// Who may overwrite the stage of an existing product
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageUpdatePolicy {
    /// Any supply-chain role-holder may update any product
    #[default]
    AnyRoleHolder,
    /// Only the product's creator (or an admin) may update it
    CreatorOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    roles: RoleBook,
    #[serde(default)]
    stage_update_policy: StageUpdatePolicy,
    conservation: BTreeMap<String, ConservationRecord>,
    supply_chain: BTreeMap<String, SupplyChainRecord>,
}

impl Registry {
    /// Deploy a registry; `deployer` becomes the owner with a permanent admin role.
    pub fn new(deployer: Address) -> Self {
        Self {
            roles: RoleBook::new(deployer),
            stage_update_policy: StageUpdatePolicy::default(),
            conservation: BTreeMap::new(),
            supply_chain: BTreeMap::new(),
        }
    }

    pub fn with_stage_update_policy(mut self, policy: StageUpdatePolicy) -> Self {
        self.stage_update_policy = policy;
        self
    }

    pub fn set_stage_update_policy(&mut self, policy: StageUpdatePolicy) {
        self.stage_update_policy = policy;
    }

    pub fn stage_update_policy(&self) -> StageUpdatePolicy {
        self.stage_update_policy
    }

    pub fn owner(&self) -> &Address {
        self.roles.owner()
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub fn has_role(&self, address: &Address, role: Role) -> bool {
        self.roles.has_role(address, role)
    }

    pub fn roles_of(&self, address: &Address) -> Vec<Role> {
        self.roles.roles_of(address)
    }

    /// Grant `role` to `target`. Returns false if it was already held.
    pub fn grant_role(&mut self, ctx: &TxContext, target: &Address, role: Role) -> Result<bool> {
        self.roles.require_admin(&ctx.caller)?;
        let newly = self.roles.grant(target, role);
        debug!(caller = %ctx.caller, target = %target, role = %role, newly, "grant_role");
        Ok(newly)
    }

    pub fn revoke_role(&mut self, ctx: &TxContext, target: &Address, role: Role) -> Result<()> {
        self.roles.require_admin(&ctx.caller)?;
        self.roles.revoke(target, role)?;
        debug!(caller = %ctx.caller, target = %target, role = %role, "revoke_role");
        Ok(())
    }

    // =========================================================================
    // Conservation records
    // =========================================================================

    pub fn create_conservation_record(
        &mut self,
        ctx: &TxContext,
        sampling_id: &str,
        data_hash: &str,
    ) -> Result<ConservationRecord> {
        self.roles.require_any(&ctx.caller, &[Role::Researcher])?;
        let sampling_id = validation::identifier("samplingId", sampling_id)?;
        let data_hash = validation::data_hash(data_hash)?;

        if self.conservation.contains_key(&sampling_id) {
            return Err(RegistryError::DuplicateSamplingId(sampling_id));
        }

        let record = ConservationRecord {
            sampling_id: sampling_id.clone(),
            researcher: ctx.caller.clone(),
            data_hash,
            verified: false,
            verifier: None,
            created_at: ctx.timestamp,
            verified_at: None,
        };
        self.conservation.insert(sampling_id, record.clone());
        debug!(sampling_id = %record.sampling_id, researcher = %record.researcher, "conservation record created");
        Ok(record)
    }

    pub fn verify_conservation_record(
        &mut self,
        ctx: &TxContext,
        sampling_id: &str,
    ) -> Result<ConservationRecord> {
        self.roles.require_admin(&ctx.caller)?;
        let sampling_id = validation::identifier("samplingId", sampling_id)?;

        let record = self
            .conservation
            .get_mut(&sampling_id)
            .ok_or_else(|| RegistryError::ConservationRecordNotFound(sampling_id.clone()))?;

        if record.verified {
            return Err(RegistryError::AlreadyVerified(sampling_id));
        }

        record.verified = true;
        record.verifier = Some(ctx.caller.clone());
        record.verified_at = Some(ctx.timestamp);
        debug!(sampling_id = %record.sampling_id, verifier = %ctx.caller, "conservation record verified");
        Ok(record.clone())
    }

    pub fn conservation_record(&self, sampling_id: &str) -> Option<&ConservationRecord> {
        self.conservation.get(sampling_id.trim())
    }

    // =========================================================================
    // Supply-chain records
    // =========================================================================

    pub fn create_supply_chain_record(
        &mut self,
        ctx: &TxContext,
        product_id: &str,
        data_hash: &str,
        source_type: SourceType,
        initial_stage: &str,
    ) -> Result<SupplyChainRecord> {
        self.roles.require_any(&ctx.caller, &PRODUCER_ROLES)?;
        let product_id = validation::identifier("productId", product_id)?;
        let data_hash = validation::data_hash(data_hash)?;
        let stage = validation::stage(initial_stage)?;

        if self.supply_chain.contains_key(&product_id) {
            return Err(RegistryError::DuplicateProductId(product_id));
        }

        let record = SupplyChainRecord {
            product_id: product_id.clone(),
            creator: ctx.caller.clone(),
            data_hash,
            source_type,
            current_stage: stage,
            created_at: ctx.timestamp,
            updated_at: ctx.timestamp,
            update_count: 0,
            last_updated_by: ctx.caller.clone(),
        };
        self.supply_chain.insert(product_id, record.clone());
        debug!(product_id = %record.product_id, creator = %record.creator, "supply-chain record created");
        Ok(record)
    }

    /// Overwrite the current stage (and optionally the data hash) of a product.
    ///
    /// No stage history is retained here; `notes` only travel in the call itself.
    pub fn update_supply_chain_record(
        &mut self,
        ctx: &TxContext,
        product_id: &str,
        new_stage: &str,
        new_data_hash: Option<&str>,
        _notes: Option<&str>,
    ) -> Result<SupplyChainRecord> {
        self.roles.require_any(&ctx.caller, &SUPPLY_CHAIN_ROLES)?;
        let product_id = validation::identifier("productId", product_id)?;
        let stage = validation::stage(new_stage)?;
        let data_hash = new_data_hash.map(validation::data_hash).transpose()?;

        let is_admin = self.roles.is_admin(&ctx.caller);
        let policy = self.stage_update_policy;
        let record = self
            .supply_chain
            .get_mut(&product_id)
            .ok_or_else(|| RegistryError::SupplyChainRecordNotFound(product_id.clone()))?;

        if policy == StageUpdatePolicy::CreatorOnly && !is_admin && record.creator != ctx.caller {
            return Err(RegistryError::NotRecordCreator {
                caller: ctx.caller.clone(),
                product_id,
            });
        }

        record.current_stage = stage;
        if let Some(hash) = data_hash {
            record.data_hash = hash;
        }
        record.updated_at = ctx.timestamp;
        record.update_count += 1;
        record.last_updated_by = ctx.caller.clone();
        debug!(product_id = %record.product_id, stage = %record.current_stage, "supply-chain stage updated");
        Ok(record.clone())
    }

    pub fn supply_chain_record(&self, product_id: &str) -> Option<&SupplyChainRecord> {
        self.supply_chain.get(product_id.trim())
    }

    // =========================================================================
    // Aggregates and dispatch
    // =========================================================================

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            conservation_records: self.conservation.len() as u64,
            verified_conservation_records: self
                .conservation
                .values()
                .filter(|r| r.verified)
                .count() as u64,
            supply_chain_records: self.supply_chain.len() as u64,
            role_holders: self.roles.holder_count() as u64,
        }
    }

    /// Dispatch a serialised call to its entry point.
    pub fn execute(&mut self, ctx: &TxContext, call: &RegistryCall) -> Result<CallOutcome> {
        match call {
            RegistryCall::GrantRole { target, role } => {
                let newly_granted = self.grant_role(ctx, target, *role)?;
                Ok(CallOutcome::RoleGranted {
                    target: target.clone(),
                    role: *role,
                    newly_granted,
                })
            }
            RegistryCall::RevokeRole { target, role } => {
                self.revoke_role(ctx, target, *role)?;
                Ok(CallOutcome::RoleRevoked {
                    target: target.clone(),
                    role: *role,
                })
            }
            RegistryCall::CreateConservationRecord {
                sampling_id,
                data_hash,
            } => self
                .create_conservation_record(ctx, sampling_id, data_hash)
                .map(CallOutcome::Conservation),
            RegistryCall::VerifyConservationRecord { sampling_id } => self
                .verify_conservation_record(ctx, sampling_id)
                .map(CallOutcome::Conservation),
            RegistryCall::CreateSupplyChainRecord {
                product_id,
                data_hash,
                source_type,
                initial_stage,
            } => self
                .create_supply_chain_record(ctx, product_id, data_hash, *source_type, initial_stage)
                .map(CallOutcome::SupplyChain),
            RegistryCall::UpdateSupplyChainRecord {
                product_id,
                new_stage,
                new_data_hash,
                notes,
            } => self
                .update_supply_chain_record(
                    ctx,
                    product_id,
                    new_stage,
                    new_data_hash.as_deref(),
                    notes.as_deref(),
                )
                .map(CallOutcome::SupplyChain),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_key_bytes(&[n; 32])
    }

    fn ctx(caller: &Address, block: u64) -> TxContext {
        TxContext::new(caller.clone(), block, 1_700_000_000 + block)
    }

    fn setup() -> (Registry, Address, Address, Address) {
        let admin = addr(1);
        let researcher = addr(2);
        let fisher = addr(3);
        let mut reg = Registry::new(admin.clone());
        reg.grant_role(&ctx(&admin, 1), &researcher, Role::Researcher).unwrap();
        reg.grant_role(&ctx(&admin, 2), &fisher, Role::Fisher).unwrap();
        (reg, admin, researcher, fisher)
    }

    #[test]
    fn test_sample_lifecycle() {
        let (mut reg, admin, researcher, _) = setup();

        let rec = reg
            .create_conservation_record(&ctx(&researcher, 3), "SAMPLE-001", "QmHash1")
            .unwrap();
        assert!(!rec.verified);
        assert_eq!(rec.researcher, researcher);

        let err = reg
            .create_conservation_record(&ctx(&researcher, 4), "SAMPLE-001", "QmHash1")
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateSamplingId("SAMPLE-001".into()));
        assert!(err.to_string().contains("already exists"));

        let verified = reg
            .verify_conservation_record(&ctx(&admin, 5), "SAMPLE-001")
            .unwrap();
        assert!(verified.verified);
        assert_eq!(verified.verifier, Some(admin.clone()));
        assert_eq!(verified.data_hash, "QmHash1");
        assert_eq!(verified.researcher, researcher);
        assert_eq!(verified.verified_at, Some(1_700_000_005));
    }

    #[test]
    fn test_reverification_is_rejected() {
        let (mut reg, admin, researcher, _) = setup();
        reg.create_conservation_record(&ctx(&researcher, 3), "S-1", "h").unwrap();
        reg.verify_conservation_record(&ctx(&admin, 4), "S-1").unwrap();

        let before = reg.conservation_record("S-1").cloned();
        let err = reg.verify_conservation_record(&ctx(&admin, 5), "S-1").unwrap_err();
        assert_eq!(err, RegistryError::AlreadyVerified("S-1".into()));
        assert_eq!(reg.conservation_record("S-1").cloned(), before);
    }

    #[test]
    fn test_verify_requires_admin() {
        let (mut reg, _, researcher, _) = setup();
        reg.create_conservation_record(&ctx(&researcher, 3), "S-1", "h").unwrap();
        let err = reg.verify_conservation_record(&ctx(&researcher, 4), "S-1").unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized { .. }));
        assert!(!reg.conservation_record("S-1").unwrap().verified);
    }

    #[test]
    fn test_verify_missing_record() {
        let (mut reg, admin, _, _) = setup();
        assert_eq!(
            reg.verify_conservation_record(&ctx(&admin, 3), "NOPE"),
            Err(RegistryError::ConservationRecordNotFound("NOPE".into()))
        );
    }

    #[test]
    fn test_product_create_and_update() {
        let (mut reg, admin, _, fisher) = setup();
        let processor = addr(4);
        reg.grant_role(&ctx(&admin, 3), &processor, Role::Processor).unwrap();

        let rec = reg
            .create_supply_chain_record(&ctx(&fisher, 4), "TUNA-1", "bafyhash", SourceType::WildCaught, "caught")
            .unwrap();
        assert_eq!(rec.current_stage, "caught");
        assert_eq!(rec.update_count, 0);

        let updated = reg
            .update_supply_chain_record(&ctx(&processor, 5), "TUNA-1", "processed", Some("bafynew"), Some("filleted"))
            .unwrap();
        assert_eq!(updated.current_stage, "processed");
        assert_eq!(updated.data_hash, "bafynew");
        assert_eq!(updated.creator, fisher);
        assert_eq!(updated.last_updated_by, processor);
        assert_eq!(updated.update_count, 1);
        assert_eq!(updated.updated_at, 1_700_000_005);

        // Stage hash stays when no new hash is supplied
        let again = reg
            .update_supply_chain_record(&ctx(&processor, 6), "TUNA-1", "packed", None, None)
            .unwrap();
        assert_eq!(again.data_hash, "bafynew");
    }

    #[test]
    fn test_processor_cannot_create_product() {
        let (mut reg, admin, _, _) = setup();
        let processor = addr(4);
        reg.grant_role(&ctx(&admin, 3), &processor, Role::Processor).unwrap();
        let err = reg
            .create_supply_chain_record(&ctx(&processor, 4), "P-1", "h", SourceType::Aquaculture, "harvested")
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized { .. }));
        assert_eq!(reg.stats().supply_chain_records, 0);
    }

    #[test]
    fn test_creator_only_policy() {
        let (reg, admin, _, fisher) = setup();
        let mut reg = reg.with_stage_update_policy(StageUpdatePolicy::CreatorOnly);
        let other_fisher = addr(5);
        reg.grant_role(&ctx(&admin, 3), &other_fisher, Role::Fisher).unwrap();
        reg.create_supply_chain_record(&ctx(&fisher, 4), "P-1", "h", SourceType::WildCaught, "caught")
            .unwrap();

        let err = reg
            .update_supply_chain_record(&ctx(&other_fisher, 5), "P-1", "landed", None, None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotRecordCreator { .. }));

        reg.update_supply_chain_record(&ctx(&admin, 6), "P-1", "landed", None, None)
            .unwrap();
        reg.update_supply_chain_record(&ctx(&fisher, 7), "P-1", "sold", None, None)
            .unwrap();
    }

    #[test]
    fn test_execute_dispatch() {
        let (mut reg, admin, _, _) = setup();
        let target = addr(9);
        let out = reg
            .execute(&ctx(&admin, 3), &RegistryCall::GrantRole { target: target.clone(), role: Role::Retailer })
            .unwrap();
        assert_eq!(
            out,
            CallOutcome::RoleGranted { target: target.clone(), role: Role::Retailer, newly_granted: true }
        );
        assert!(reg.has_role(&target, Role::Retailer));
    }

    #[test]
    fn test_stats() {
        let (mut reg, admin, researcher, fisher) = setup();
        reg.create_conservation_record(&ctx(&researcher, 3), "S-1", "h1").unwrap();
        reg.create_conservation_record(&ctx(&researcher, 4), "S-2", "h2").unwrap();
        reg.verify_conservation_record(&ctx(&admin, 5), "S-2").unwrap();
        reg.create_supply_chain_record(&ctx(&fisher, 6), "P-1", "h", SourceType::WildCaught, "caught")
            .unwrap();

        let stats = reg.stats();
        assert_eq!(stats.conservation_records, 2);
        assert_eq!(stats.verified_conservation_records, 1);
        assert_eq!(stats.supply_chain_records, 1);
        assert_eq!(stats.role_holders, 3);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (mut reg, _, researcher, _) = setup();
        reg.create_conservation_record(&ctx(&researcher, 3), "S-1", "h1").unwrap();

        let json = serde_json::to_string(&reg).unwrap();
        let restored: Registry = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.conservation_record("S-1"), reg.conservation_record("S-1"));
        assert!(restored.has_role(&researcher, Role::Researcher));
        assert_eq!(restored.owner(), reg.owner());
    }
}
