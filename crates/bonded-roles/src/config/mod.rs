//! Registry configuration
//!
//! Loaded from TOML (or JSON, by file extension), then overridden from
//! `BONDED_*` environment variables, then validated. Durations are stored as
//! milliseconds so the file format stays flat.
//!
//! ```toml
//! grace_window_ms = 86400000
//! purge_on_revoke = false
//!
//! [min_bonds]
//! MEDIATOR = 1000000
//! SECURITY_MANAGER = 10000000
//! ```

mod validation;

pub use validation::{ConfigValidator, ValidationError, ValidationResult};

use bonded_core::{BondAmount, BondedError, RoleType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "BONDED_";

const MINUTE_MS: u64 = 60 * 1000;
const DAY_MS: u64 = 24 * 60 * MINUTE_MS;

/// Bonded role registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// How far in the future `claimed_at` may lie before a claim is malformed
    pub clock_skew_tolerance_ms: u64,
    /// Delay between expiry (or revocation) and purge
    pub grace_window_ms: u64,
    /// Upper bound on `valid_until - valid_from`; longer claims are clamped
    pub max_claim_lifetime_ms: u64,
    /// Bound on each identity or ledger lookup
    pub evidence_timeout_ms: u64,
    /// Purge revoked entries immediately instead of after the grace window
    pub purge_on_revoke: bool,
    /// Let a revoked claim's bond back a new claim before the entry is purged
    pub release_bond_on_revocation: bool,
    /// Required ledger confirmations on the bond transaction
    pub min_confirmations: u32,
    /// Bound on revocations parked while waiting for their target claim
    pub max_pending_revocations: usize,
    /// Diverging roles beyond which reconciliation requests a full transfer
    pub full_sync_role_threshold: usize,
    /// Interval of the maintenance `tick`
    pub tick_interval_ms: u64,
    /// Interval of snapshot persistence
    pub persist_interval_ms: u64,
    /// Capacity of the registry event broadcast channel
    pub event_channel_capacity: usize,
    /// Minimum bond per role, keyed by wire name (e.g. `MEDIATOR`)
    pub min_bonds: BTreeMap<String, BondAmount>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            clock_skew_tolerance_ms: 5 * MINUTE_MS,
            grace_window_ms: DAY_MS,
            max_claim_lifetime_ms: 15 * DAY_MS,
            evidence_timeout_ms: 5_000,
            purge_on_revoke: false,
            release_bond_on_revocation: false,
            min_confirmations: 1,
            max_pending_revocations: 1024,
            full_sync_role_threshold: 3,
            tick_interval_ms: 30_000,
            persist_interval_ms: 5 * MINUTE_MS,
            event_channel_capacity: 256,
            min_bonds: default_min_bonds(),
        }
    }
}

/// Default minimum bonds, in base units (1 token = 100 units)
fn default_min_bonds() -> BTreeMap<String, BondAmount> {
    [
        (RoleType::Mediator, 1_000_000),
        (RoleType::Arbitrator, 10_000_000),
        (RoleType::Moderator, 500_000),
        (RoleType::SecurityManager, 10_000_000),
        (RoleType::ReleaseManager, 10_000_000),
        (RoleType::SeedNode, 2_000_000),
        (RoleType::OracleNode, 2_000_000),
        (RoleType::ExplorerNode, 500_000),
        (RoleType::MarketPriceNode, 2_000_000),
    ]
    .into_iter()
    .map(|(role, units)| (role.as_str().to_string(), BondAmount::new(units)))
    .collect()
}

impl RegistryConfig {
    /// Load from a TOML or JSON file (chosen by extension), then normalize
    pub fn load_from_file(path: &Path) -> Result<Self, BondedError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BondedError::storage(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        let mut config: RegistryConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| BondedError::invalid(format!("Invalid JSON config: {e}")))?,
            _ => toml::from_str(&content)
                .map_err(|e| BondedError::invalid(format!("Invalid TOML config: {e}")))?,
        };
        config.normalize_role_keys();
        Ok(config)
    }

    /// Load, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self, BondedError> {
        let mut config = Self::load_from_file(path)?;
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BONDED_*` environment overrides
    pub fn merge_with_env(&mut self) -> Result<(), BondedError> {
        let vars: Vec<(String, String)> = std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();
        self.merge_with_vars(vars)
    }

    /// Apply overrides from `(NAME, value)` pairs using the env naming scheme
    pub fn merge_with_vars<I>(&mut self, vars: I) -> Result<(), BondedError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(field) = key.strip_prefix(ENV_PREFIX) {
                self.set_from_string(&field.to_ascii_lowercase(), &value)?;
            }
        }
        Ok(())
    }

    /// Set a single field from its string form
    ///
    /// Role minimums use `min_bond_<role>` keys, e.g. `min_bond_mediator`.
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), BondedError> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, BondedError>
        where
            T::Err: std::fmt::Display,
        {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| BondedError::invalid(format!("Invalid value for {key}: {e}")))
        }

        match key {
            "clock_skew_tolerance_ms" => self.clock_skew_tolerance_ms = parse(key, value)?,
            "grace_window_ms" => self.grace_window_ms = parse(key, value)?,
            "max_claim_lifetime_ms" => self.max_claim_lifetime_ms = parse(key, value)?,
            "evidence_timeout_ms" => self.evidence_timeout_ms = parse(key, value)?,
            "purge_on_revoke" => self.purge_on_revoke = parse(key, value)?,
            "release_bond_on_revocation" => self.release_bond_on_revocation = parse(key, value)?,
            "min_confirmations" => self.min_confirmations = parse(key, value)?,
            "max_pending_revocations" => self.max_pending_revocations = parse(key, value)?,
            "full_sync_role_threshold" => self.full_sync_role_threshold = parse(key, value)?,
            "tick_interval_ms" => self.tick_interval_ms = parse(key, value)?,
            "persist_interval_ms" => self.persist_interval_ms = parse(key, value)?,
            "event_channel_capacity" => self.event_channel_capacity = parse(key, value)?,
            other => {
                let role_name = other
                    .strip_prefix("min_bond_")
                    .ok_or_else(|| BondedError::invalid(format!("Unknown config key: {other}")))?;
                let role: RoleType = role_name.parse()?;
                let amount: u64 = parse(key, value)?;
                self.min_bonds
                    .insert(role.as_str().to_string(), BondAmount::new(amount));
            }
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), BondedError> {
        let mut v = ConfigValidator::new();
        v.positive("evidence_timeout_ms", self.evidence_timeout_ms)
            .positive("max_claim_lifetime_ms", self.max_claim_lifetime_ms)
            .positive("tick_interval_ms", self.tick_interval_ms)
            .positive("persist_interval_ms", self.persist_interval_ms)
            .positive("event_channel_capacity", self.event_channel_capacity as u64)
            .positive("full_sync_role_threshold", self.full_sync_role_threshold as u64)
            .custom(
                "min_bonds",
                &self.min_bonds,
                |bonds| !bonds.is_empty(),
                "at least one role must be bondable",
            );

        let mut bonds = v.for_field("min_bonds");
        for (name, amount) in &self.min_bonds {
            if name.parse::<RoleType>().is_err() {
                bonds.invalid_format(name, "role wire name", name);
            }
            bonds.positive(name, amount.units());
        }
        v.merge(bonds);

        v.result().map_err(BondedError::from)
    }

    /// Minimum bond for a role, `None` if the role is not bondable here
    pub fn min_bond(&self, role: RoleType) -> Option<BondAmount> {
        self.min_bonds.get(role.as_str()).copied()
    }

    /// Set the minimum bond for a role
    pub fn with_min_bond(mut self, role: RoleType, amount: BondAmount) -> Self {
        self.min_bonds.insert(role.as_str().to_string(), amount);
        self
    }

    /// Remove a role from the bondable set
    pub fn without_role(mut self, role: RoleType) -> Self {
        self.min_bonds.remove(role.as_str());
        self
    }

    /// Clock skew tolerance
    pub fn clock_skew_tolerance(&self) -> Duration {
        Duration::from_millis(self.clock_skew_tolerance_ms)
    }

    /// Grace window between expiry and purge
    pub fn grace_window(&self) -> Duration {
        Duration::from_millis(self.grace_window_ms)
    }

    /// Maximum claim lifetime
    pub fn max_claim_lifetime(&self) -> Duration {
        Duration::from_millis(self.max_claim_lifetime_ms)
    }

    /// Per-lookup evidence timeout
    pub fn evidence_timeout(&self) -> Duration {
        Duration::from_millis(self.evidence_timeout_ms)
    }

    /// Maintenance tick interval
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Snapshot persistence interval
    pub fn persist_interval(&self) -> Duration {
        Duration::from_millis(self.persist_interval_ms)
    }

    fn normalize_role_keys(&mut self) {
        let bonds = std::mem::take(&mut self.min_bonds);
        self.min_bonds = bonds
            .into_iter()
            .map(|(name, amount)| match name.parse::<RoleType>() {
                Ok(role) => (role.as_str().to_string(), amount),
                // left as-is so validate() can name it
                Err(_) => (name, amount),
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RegistryConfig::default();
        assert!(config.validate().is_ok());
        for role in RoleType::ALL {
            assert!(config.min_bond(role).is_some(), "{role} should be bondable");
        }
    }

    #[test]
    fn test_set_from_string() {
        let mut config = RegistryConfig::default();
        config.set_from_string("grace_window_ms", "1000").unwrap();
        config.set_from_string("purge_on_revoke", "true").unwrap();
        config.set_from_string("min_bond_seed_node", "42").unwrap();

        assert_eq!(config.grace_window(), Duration::from_secs(1));
        assert!(config.purge_on_revoke);
        assert_eq!(config.min_bond(RoleType::SeedNode), Some(BondAmount::new(42)));

        assert!(config.set_from_string("grace_window_ms", "soon").is_err());
        assert!(config.set_from_string("colour", "blue").is_err());
        assert!(config.set_from_string("min_bond_janitor", "1").is_err());
    }

    #[test]
    fn test_env_style_overrides() {
        let mut config = RegistryConfig::default();
        config
            .merge_with_vars(vec![
                ("BONDED_TICK_INTERVAL_MS".to_string(), "10".to_string()),
                ("OTHER_TICK_INTERVAL_MS".to_string(), "99".to_string()),
            ])
            .unwrap();
        assert_eq!(config.tick_interval_ms, 10);
    }

    #[test]
    fn test_validation_rejects_zero_timeout_and_empty_bonds() {
        let mut config = RegistryConfig::default();
        config.evidence_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = RegistryConfig::default();
        config.min_bonds.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_without_role_makes_role_unknown() {
        let config = RegistryConfig::default().without_role(RoleType::Moderator);
        assert_eq!(config.min_bond(RoleType::Moderator), None);
        assert!(config.validate().is_ok());
    }
}
