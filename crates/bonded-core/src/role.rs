//! Role catalogue and bond amounts

use crate::BondedError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network roles that can be held against a bond
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleType {
    /// Mediates trade disputes
    Mediator,
    /// Arbitrates escalated disputes
    Arbitrator,
    /// Moderates public chat channels
    Moderator,
    /// Publishes alerts and may revoke other roles
    SecurityManager,
    /// Signs and announces software releases
    ReleaseManager,
    /// Operates a seed node
    SeedNode,
    /// Operates an oracle node bridging ledger data
    OracleNode,
    /// Operates a block explorer node
    ExplorerNode,
    /// Operates a market price node
    MarketPriceNode,
}

impl RoleType {
    /// Every role, in canonical order
    pub const ALL: [RoleType; 9] = [
        RoleType::Mediator,
        RoleType::Arbitrator,
        RoleType::Moderator,
        RoleType::SecurityManager,
        RoleType::ReleaseManager,
        RoleType::SeedNode,
        RoleType::OracleNode,
        RoleType::ExplorerNode,
        RoleType::MarketPriceNode,
    ];

    /// Stable one-byte code used in canonical encodings
    pub const fn code(&self) -> u8 {
        match self {
            RoleType::Mediator => 1,
            RoleType::Arbitrator => 2,
            RoleType::Moderator => 3,
            RoleType::SecurityManager => 4,
            RoleType::ReleaseManager => 5,
            RoleType::SeedNode => 6,
            RoleType::OracleNode => 7,
            RoleType::ExplorerNode => 8,
            RoleType::MarketPriceNode => 9,
        }
    }

    /// Wire name of the role
    pub const fn as_str(&self) -> &'static str {
        match self {
            RoleType::Mediator => "MEDIATOR",
            RoleType::Arbitrator => "ARBITRATOR",
            RoleType::Moderator => "MODERATOR",
            RoleType::SecurityManager => "SECURITY_MANAGER",
            RoleType::ReleaseManager => "RELEASE_MANAGER",
            RoleType::SeedNode => "SEED_NODE",
            RoleType::OracleNode => "ORACLE_NODE",
            RoleType::ExplorerNode => "EXPLORER_NODE",
            RoleType::MarketPriceNode => "MARKET_PRICE_NODE",
        }
    }

    /// Roles operated as infrastructure nodes rather than by people
    pub const fn is_node_role(&self) -> bool {
        matches!(
            self,
            RoleType::SeedNode
                | RoleType::OracleNode
                | RoleType::ExplorerNode
                | RoleType::MarketPriceNode
        )
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleType {
    type Err = BondedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        RoleType::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| BondedError::invalid(format!("unknown role type '{s}'")))
    }
}

/// Bond amount in the ledger's smallest unit
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BondAmount(pub u64);

impl BondAmount {
    /// Create from base units
    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    /// Base units
    pub const fn units(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BondAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes_are_unique() {
        let mut codes: Vec<u8> = RoleType::ALL.iter().map(RoleType::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), RoleType::ALL.len());
    }

    #[test]
    fn test_role_parse_is_lenient_about_case() {
        assert_eq!(
            "security-manager".parse::<RoleType>().unwrap(),
            RoleType::SecurityManager
        );
        assert_eq!("MEDIATOR".parse::<RoleType>().unwrap(), RoleType::Mediator);
        assert!("janitor".parse::<RoleType>().is_err());
    }

    #[test]
    fn test_role_serde_uses_wire_names() {
        let json = serde_json::to_string(&RoleType::MarketPriceNode).unwrap();
        assert_eq!(json, "\"MARKET_PRICE_NODE\"");
        for role in RoleType::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }
}
