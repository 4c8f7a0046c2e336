//! Identifier types for nodes, claims and ledger outputs

use crate::hash::{hash, Hash32};
use crate::{BondedError, PublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a network participant
///
/// Derived from the participant's Ed25519 public key, but treated as an opaque
/// 32-byte value everywhere else: the identity collaborator is the authority
/// on which key belongs to which node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Hash32);

impl NodeId {
    /// Wrap raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(Hash32::new(bytes))
    }

    /// Derive the node identifier for a public key
    pub fn from_public_key(key: &PublicKey) -> Self {
        let mut input = Vec::with_capacity(40);
        input.extend_from_slice(b"bonded/node-id");
        input.extend_from_slice(key.as_bytes());
        Self(hash(&input))
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0.short())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0.short())
    }
}

impl FromStr for NodeId {
    type Err = BondedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash32::from_hex(s.strip_prefix("node-").unwrap_or(s)).map(Self)
    }
}

/// Content-derived identifier of a role claim
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(pub Hash32);

impl ClaimId {
    /// Wrap a digest
    pub const fn new(digest: Hash32) -> Self {
        Self(digest)
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "claim-{}", self.0.short())
    }
}

impl fmt::Debug for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClaimId({})", self.0.short())
    }
}

/// Reference to the ledger output that locks a bond
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerRef {
    /// Transaction holding the bond output
    pub txid: Hash32,
    /// Output index within the transaction
    pub output_index: u32,
}

impl LedgerRef {
    /// Create a ledger reference
    pub const fn new(txid: Hash32, output_index: u32) -> Self {
        Self { txid, output_index }
    }

    /// Fixed-width encoding used in canonical claim payloads
    pub fn to_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..32].copy_from_slice(self.txid.as_bytes());
        out[32..].copy_from_slice(&self.output_index.to_be_bytes());
        out
    }
}

impl fmt::Display for LedgerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.output_index)
    }
}

impl FromStr for LedgerRef {
    type Err = BondedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, index) = s
            .rsplit_once(':')
            .ok_or_else(|| BondedError::invalid(format!("ledger ref '{s}' is not txid:index")))?;
        let output_index = index
            .parse::<u32>()
            .map_err(|e| BondedError::invalid(format!("invalid output index '{index}': {e}")))?;
        Ok(Self::new(Hash32::from_hex(txid)?, output_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SigningKey;

    #[test]
    fn test_node_id_derivation_is_stable() {
        let key = SigningKey::from_bytes(&[7u8; 32]).verifying_key();
        assert_eq!(NodeId::from_public_key(&key), NodeId::from_public_key(&key));

        let other = SigningKey::from_bytes(&[8u8; 32]).verifying_key();
        assert_ne!(NodeId::from_public_key(&key), NodeId::from_public_key(&other));
    }

    #[test]
    fn test_node_id_parse_accepts_prefixed_hex() {
        let id = NodeId::new([3u8; 32]);
        let plain: NodeId = id.0.to_hex().parse().unwrap();
        let prefixed: NodeId = format!("node-{}", id.0.to_hex()).parse().unwrap();
        assert_eq!(plain, id);
        assert_eq!(prefixed, id);
    }

    #[test]
    fn test_ledger_ref_round_trips_through_display() {
        let bond = LedgerRef::new(hash(b"bond-tx"), 2);
        let parsed: LedgerRef = bond.to_string().parse().unwrap();
        assert_eq!(parsed, bond);
        assert!("no-colon".parse::<LedgerRef>().is_err());
        assert!(format!("{}:x", bond.txid).parse::<LedgerRef>().is_err());
    }
}
