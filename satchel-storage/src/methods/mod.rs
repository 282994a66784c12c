//! The algorithmic layer over the storage provider: change
//! generation, the action lifecycle, internalization, paginated
//! reads, the broadcast pipeline and retention.

mod abort_action;
mod create_action;
mod generate_change;
mod internalize;
mod list;
mod post;
mod process_action;
mod purge;
mod review;
mod sign_action;
mod signing;

pub use abort_action::abort_action;
pub use create_action::{create_action, CreateActionOutcome};
pub use generate_change::{
    generate_change, ChangeParams, FundingAllocation, DEFAULT_FEE_RATE_SAT_PER_KB, DUST_LIMIT,
};
pub use internalize::internalize_action;
pub use list::{list_actions, list_outputs};
pub use post::attempt_to_post_reqs_to_network;
pub use process_action::{process_action, ProcessActionArgs, ProcessActionResult};
pub use purge::{purge_data, purge_data_at, PurgeParams, PurgeSummary};
pub use review::{review_status, ReviewParams, ReviewSummary};
pub use sign_action::sign_action;

use base64::Engine as _;
use rand::RngCore as _;

/// New caller-visible reference token: 12 random bytes, base64.
pub fn new_reference() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// New BRC-29 derivation prefix/suffix material: 10 random bytes,
/// base64.
pub fn new_derivation_part() -> String {
    let mut bytes = [0u8; 10];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
