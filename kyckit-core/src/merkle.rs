//! Merkle inclusion-proof verification for individual identity fields.
//!
//! The provider publishes a root hash committing to the full set of a user's
//! identity fields. Given one field's raw value and the sibling-hash path the
//! provider served for it, [`validate_field`] recomputes the root offline and
//! compares. This is the only cryptographic trust boundary in the SDK: it
//! never touches the network and must not be bypassed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One level of an inclusion path: the two children and the parent they hash
/// to.
///
/// Only `left`/`right` drive the fold; `parent` is carried for audit display
/// and cross-checking by hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofNode {
    /// Hash of `left + right`.
    pub parent: String,
    /// Left child digest.
    pub left: String,
    /// Right child digest.
    pub right: String,
}

/// Validates a field's raw value against a previously published root hash.
///
/// The leaf digest follows the provider's doubling convention,
/// `H(H(raw) + H(raw))` with `H` = lowercase-hex SHA-256. The path is folded
/// left to right; at every level the accumulator must equal one of the two
/// children, otherwise the proof is poisoned and can never match any root.
/// An empty path degenerates to comparing the leaf itself.
#[must_use]
pub fn validate_field(
    root_hash: &str,
    raw_field_data: impl AsRef<[u8]>,
    proof_path: &[ProofNode],
) -> bool {
    let raw_hash = sha256_hex(raw_field_data.as_ref());
    let leaf = sha256_hex(format!("{raw_hash}{raw_hash}").as_bytes());

    let folded = proof_path
        .iter()
        .try_fold(leaf, |acc, node| {
            if acc == node.left {
                Some(sha256_hex(format!("{acc}{}", node.right).as_bytes()))
            } else if acc == node.right {
                Some(sha256_hex(format!("{}{acc}", node.left).as_bytes()))
            } else {
                // Corrupted or mismatched level: abort instead of skipping.
                None
            }
        });

    folded.is_some_and(|root| root == root_hash)
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
