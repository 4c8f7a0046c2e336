//! Bond evidence reported by the ledger

use crate::{BondAmount, LedgerRef, NodeId};
use serde::{Deserialize, Serialize};

/// Ledger evidence that a bond exists and who locked it
///
/// How the ledger establishes these facts is outside this crate; a proof is
/// only ever compared against a claim, never trusted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondProof {
    /// Output the proof describes
    pub bond_tx_ref: LedgerRef,
    /// Node the bond is locked for
    pub holder: NodeId,
    /// Locked amount
    pub amount: BondAmount,
    /// Ledger confirmations of the locking transaction
    pub confirmations: u32,
}

impl BondProof {
    /// Create a bond proof
    pub fn new(
        bond_tx_ref: LedgerRef,
        holder: NodeId,
        amount: BondAmount,
        confirmations: u32,
    ) -> Self {
        Self {
            bond_tx_ref,
            holder,
            amount,
            confirmations,
        }
    }

    /// Whether this proof describes `bond` locked for `node`
    pub fn matches(&self, bond: &LedgerRef, node: &NodeId) -> bool {
        self.bond_tx_ref == *bond && self.holder == *node
    }
}
