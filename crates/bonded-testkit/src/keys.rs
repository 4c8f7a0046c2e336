//! Deterministic test nodes

use bonded_core::{
    hash, ClaimId, LedgerRef, NodeId, PublicKey, RevocationClaim, RoleClaim, RoleType, SigningKey,
    Timestamp,
};

/// A network participant with a key derived from a seed string
#[derive(Debug, Clone)]
pub struct TestNode {
    name: String,
    signing_key: SigningKey,
    node_id: NodeId,
}

impl TestNode {
    /// Create a node from a 32-byte seed
    pub fn from_seed(name: impl Into<String>, seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let node_id = NodeId::from_public_key(&signing_key.verifying_key());
        Self {
            name: name.into(),
            signing_key,
            node_id,
        }
    }

    /// Create a node whose key is derived from its name
    pub fn named(name: &str) -> Self {
        let seed = hash(format!("bonded-testkit/{name}").as_bytes());
        Self::from_seed(name, seed.as_bytes())
    }

    /// Human-readable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node identifier
    pub fn id(&self) -> NodeId {
        self.node_id
    }

    /// Signing key
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Public key
    pub fn public_key(&self) -> PublicKey {
        self.signing_key.verifying_key()
    }

    /// Deterministic ledger output owned by this node
    pub fn bond_ref(&self, output_index: u32) -> LedgerRef {
        let mut input = b"bonded-testkit/bond/".to_vec();
        input.extend_from_slice(self.node_id.as_bytes());
        LedgerRef::new(hash(&input), output_index)
    }

    /// Sign a claim
    pub fn claim(
        &self,
        role: RoleType,
        bond: LedgerRef,
        claimed_at: u64,
        expires_at: u64,
    ) -> RoleClaim {
        RoleClaim::sign(
            &self.signing_key,
            self.node_id,
            role,
            bond,
            Timestamp(claimed_at),
            Timestamp(expires_at),
        )
    }

    /// Sign a revocation of `target`
    pub fn revoke(&self, target: ClaimId, revoked_at: u64) -> RevocationClaim {
        RevocationClaim::sign(
            &self.signing_key,
            target,
            self.node_id,
            Timestamp(revoked_at),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_nodes_are_deterministic() {
        assert_eq!(TestNode::named("alice").id(), TestNode::named("alice").id());
        assert_ne!(TestNode::named("alice").id(), TestNode::named("bob").id());
    }

    #[test]
    fn test_claims_verify_with_node_key() {
        let node = TestNode::named("alice");
        let claim = node.claim(RoleType::Mediator, node.bond_ref(0), 100, 200);
        assert!(claim.verify_signature(&node.public_key()).is_ok());
        assert_ne!(node.bond_ref(0), node.bond_ref(1));
    }
}
