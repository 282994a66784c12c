//! Reconcile `unproven` actions against the chain: fetch proofs,
//! verify the computed root, and complete what has been mined.

use crate::provider::rows;
use crate::{StorageError, StorageProvider};
use chrono::{Duration, Utc};
use satchel_codec::envelope::ActionStatus;
use satchel_primitives::Txid;
use satchel_services::{ChainServices, Interrupt};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ReviewParams {
    /// Leave freshly broadcast actions alone for this long.
    pub review_after: Duration,
}

impl Default for ReviewParams {
    fn default() -> Self {
        Self {
            review_after: Duration::seconds(60),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReviewSummary {
    pub examined: usize,
    pub completed: usize,
    pub still_unproven: usize,
}

/// Walk `unproven` actions older than the review window. Safe to run
/// repeatedly; completed actions are simply no longer selected.
pub async fn review_status(
    provider: &StorageProvider,
    services: &dyn ChainServices,
    interrupt: &Interrupt,
    params: &ReviewParams,
) -> Result<ReviewSummary, StorageError> {
    let cutoff = Utc::now() - params.review_after;
    let candidates = provider.with_tx(|c| {
        rows::actions_older_than(c, ActionStatus::Unproven, cutoff)
    })?;

    let mut summary = ReviewSummary::default();
    for action in candidates {
        interrupt.check()?;
        summary.examined += 1;

        let txid_str = match &action.txid {
            Some(txid) => txid.clone(),
            None => continue,
        };
        let txid: Txid = match txid_str.parse() {
            Ok(txid) => txid,
            Err(_) => continue,
        };

        let path = match services.get_merkle_path(&txid_str).await? {
            Some(path) => path,
            None => {
                summary.still_unproven += 1;
                continue;
            }
        };

        let root = match path.compute_root(&txid) {
            Ok(root) => root,
            Err(err) => {
                warn!(txid = txid_str, %err, "merkle path does not cover txid");
                summary.still_unproven += 1;
                continue;
            }
        };
        let confirmed = services
            .is_valid_root_for_height(&root.reversed().to_string(), path.block_height)
            .await?;
        if !confirmed {
            warn!(txid = txid_str, "computed root not confirmed by chain tracker");
            summary.still_unproven += 1;
            continue;
        }

        provider.with_tx(|c| {
            rows::insert_proven_tx(c, &txid_str, path.block_height, &path.to_bytes())?;
            rows::update_action_status(c, action.action_id, ActionStatus::Completed)?;
            if let Some(req) = rows::find_req_by_action(c, action.action_id)? {
                if !req.status.is_terminal() {
                    rows::update_req(
                        c,
                        req.req_id,
                        ActionStatus::Completed,
                        req.attempts,
                        Some("proven"),
                        None,
                    )?;
                }
            }
            Ok(())
        })?;
        info!(txid = txid_str, height = path.block_height, "action completed");
        summary.completed += 1;
    }

    debug!(?summary, "review pass finished");
    Ok(summary)
}
