//! Row types for the persisted entity model.

use chrono::{DateTime, Utc};
use satchel_codec::envelope::ActionStatus;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASKET_NAME: &str = "default";
pub const DEFAULT_LABEL: &str = "default";
pub const DEFAULT_DESIRED_UTXOS: i64 = 32;
pub const DEFAULT_MIN_UTXO_VALUE: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: i64,
    /// Compressed hex identity public key; unique.
    pub identity_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Basket {
    pub basket_id: i64,
    pub user_id: i64,
    pub name: String,
    /// Change-splitting hints honored by `generate_change`.
    pub number_of_desired_utxos: i64,
    pub minimum_desired_utxo_value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxLabel {
    pub label_id: i64,
    pub user_id: i64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTag {
    pub tag_id: i64,
    pub user_id: i64,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub action_id: i64,
    pub user_id: i64,
    pub txid: Option<String>,
    pub raw_tx: Option<Vec<u8>>,
    pub input_beef: Option<Vec<u8>>,
    pub status: ActionStatus,
    /// Net satoshi effect on the user, negative for outgoing value.
    pub satoshis: i64,
    pub description: String,
    pub version: u32,
    pub lock_time: u32,
    pub is_outgoing: bool,
    /// Caller-visible resumption token; unique per user, immutable.
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// What an output row is for; free-form in the schema, these are the
/// values the wallet writes.
pub mod output_purpose {
    pub const CHANGE: &str = "change";
    pub const PAYMENT: &str = "payment";
    pub const INTERNALIZED: &str = "internalized";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub output_id: i64,
    pub user_id: i64,
    pub action_id: i64,
    pub vout: u32,
    pub satoshis: i64,
    pub locking_script: Option<String>,
    pub spendable: bool,
    pub change: bool,
    pub basket_id: Option<i64>,
    pub spent_by_action_id: Option<i64>,
    /// Reference of the draft action holding this output, when
    /// reserved.
    pub reserved_by: Option<String>,
    pub output_type: String,
    pub purpose: String,
    pub custom_instructions: Option<String>,
    /// BRC-29 derivation context needed to spend the output later.
    pub derivation_prefix: Option<String>,
    pub derivation_suffix: Option<String>,
    pub sender_identity_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OutputRecord {
    /// `"txid.vout"`, available once the owning action has a txid.
    pub fn outpoint(&self, txid: &str) -> String {
        format!("{txid}.{}", self.vout)
    }
}

/// Fee paid to the wallet service provider, held as a non-spendable
/// output in the user's view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commission {
    pub commission_id: i64,
    pub user_id: i64,
    pub action_id: i64,
    pub satoshis: i64,
    pub locking_script: String,
    pub is_redeemed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenTx {
    pub proven_tx_id: i64,
    pub txid: String,
    pub block_height: u32,
    /// Serialized BUMP.
    pub merkle_path: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReq {
    pub req_id: i64,
    pub user_id: i64,
    pub action_id: i64,
    pub txid: String,
    pub raw_tx: Vec<u8>,
    pub status: ActionStatus,
    pub attempts: i64,
    pub last_status: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub certificate_id: i64,
    pub user_id: i64,
    pub certificate_type: String,
    pub serial_number: String,
    pub subject: String,
    pub certifier: String,
    pub revocation_outpoint: Option<String>,
    pub signature: Option<String>,
    /// Field name → value, stored as a JSON object.
    pub fields: std::collections::BTreeMap<String, String>,
}

/// Transitions admitted by the action state machine. Backward moves
/// are never allowed; `failed` is reachable from any non-terminal
/// state through abort or rejection.
pub fn can_transition(from: ActionStatus, to: ActionStatus) -> bool {
    use ActionStatus::*;
    if from == to {
        return true;
    }
    match (from, to) {
        (_, Failed) => !from.is_terminal(),
        (Unsigned, Signed) | (Unsigned, Nosend) => true,
        (Unprocessed, Signed) | (Unprocessed, Sending) | (Unprocessed, Unproven) => true,
        (Signed, Sending) | (Signed, Unproven) | (Signed, Nosend) => true,
        (Sending, Unproven) => true,
        (Unproven, Completed) => true,
        // nosend is terminal unless the action is later batched into a
        // sendWith submission.
        (Nosend, Sending) | (Nosend, Unproven) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ActionStatus::*;

    #[test]
    fn forward_transitions_allowed() {
        assert!(can_transition(Unsigned, Signed));
        assert!(can_transition(Signed, Sending));
        assert!(can_transition(Sending, Unproven));
        assert!(can_transition(Unproven, Completed));
    }

    #[test]
    fn abort_reaches_failed_from_non_terminal_only() {
        assert!(can_transition(Unsigned, Failed));
        assert!(can_transition(Unproven, Failed));
        assert!(!can_transition(Completed, Failed));
        assert!(!can_transition(Nosend, Failed));
        // Same-state updates are a no-op, not a transition.
        assert!(can_transition(Failed, Failed));
    }

    #[test]
    fn no_backward_transitions() {
        assert!(!can_transition(Completed, Unproven));
        assert!(!can_transition(Unproven, Signed));
        assert!(!can_transition(Signed, Unsigned));
    }
}
