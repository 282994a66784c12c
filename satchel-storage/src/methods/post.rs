//! The broadcast pipeline: push queued requests to the network and
//! record the verdicts.

use crate::provider::rows;
use crate::{StorageError, StorageProvider};
use satchel_codec::envelope::ActionStatus;
use satchel_primitives::beef::build_atomic_beef;
use satchel_primitives::MerklePath;
use satchel_services::{ChainServices, Interrupt, PostBeefResult};
use tracing::{info, warn};

/// Transient failures per request before the broadcast is abandoned.
const MAX_REQ_ATTEMPTS: i64 = 8;

/// Submit every `unprocessed` or re-announceable `unproven` request.
///
/// Acceptance moves the request (and its action) to `unproven`; a
/// terminal rejection fails both and returns the action's inputs to
/// the spendable pool; a transient error leaves the request queued
/// with its attempt counter bumped. Requests are worked one at a time,
/// so no `(user, action)` pair ever has two submissions in flight.
pub async fn attempt_to_post_reqs_to_network(
    provider: &StorageProvider,
    services: &dyn ChainServices,
    interrupt: &Interrupt,
) -> Result<Vec<PostBeefResult>, StorageError> {
    let reqs = provider.with_tx(|c| {
        rows::reqs_with_status(c, &[ActionStatus::Unprocessed, ActionStatus::Unproven])
    })?;

    let mut results = Vec::with_capacity(reqs.len());
    for req in reqs {
        interrupt.check()?;

        let first_post = req.status == ActionStatus::Unprocessed;
        if first_post {
            // Mark in flight; sending survives a transient failure so
            // the next tick retries without a backward transition.
            provider.with_tx(|c| {
                rows::update_action_status(c, req.action_id, ActionStatus::Sending)
            })?;
        }

        let bump = provider
            .find_proven_tx(&req.txid)?
            .and_then(|proven| MerklePath::from_bytes(&proven.merkle_path).ok());
        let beef = build_atomic_beef(&req.raw_tx, bump).to_bytes();

        match services.post_beef(&beef).await {
            Ok(result) if result.accepted => {
                provider.with_tx(|c| {
                    rows::update_req(
                        c,
                        req.req_id,
                        ActionStatus::Unproven,
                        req.attempts + 1,
                        Some("accepted"),
                        None,
                    )?;
                    rows::update_action_status(c, req.action_id, ActionStatus::Unproven)
                })?;
                info!(txid = req.txid, "broadcast accepted");
                results.push(result);
            }
            Ok(result) => {
                // Terminal rejection: fail the action and free what it
                // had claimed.
                provider.with_tx(|c| {
                    rows::update_req(
                        c,
                        req.req_id,
                        ActionStatus::Failed,
                        req.attempts + 1,
                        Some("rejected"),
                        result.message.as_deref(),
                    )?;
                    rows::update_action_status(c, req.action_id, ActionStatus::Failed)?;
                    rows::unspend_inputs_of(c, req.action_id)?;
                    rows::deactivate_outputs(c, req.action_id)
                })?;
                warn!(txid = req.txid, message = ?result.message, "broadcast rejected");
                results.push(result);
            }
            Err(err) if err.is_transient() => {
                let attempts = req.attempts + 1;
                let last_error = err.to_string();
                // Only a never-accepted transaction is abandoned; an
                // unproven re-announce just waits for the next tick.
                let budget_spent = first_post && attempts >= MAX_REQ_ATTEMPTS;
                provider.with_tx(|c| {
                    if budget_spent {
                        rows::update_req(
                            c,
                            req.req_id,
                            ActionStatus::Failed,
                            attempts,
                            Some("retry budget spent"),
                            Some(&last_error),
                        )?;
                        rows::update_action_status(c, req.action_id, ActionStatus::Failed)?;
                        rows::unspend_inputs_of(c, req.action_id)?;
                        rows::deactivate_outputs(c, req.action_id)
                    } else {
                        rows::update_req(
                            c,
                            req.req_id,
                            req.status,
                            attempts,
                            Some("transient"),
                            Some(&last_error),
                        )
                    }
                })?;
                warn!(txid = req.txid, attempts, budget_spent, %err, "broadcast deferred");
                results.push(PostBeefResult {
                    accepted: false,
                    txid: req.txid.clone(),
                    message: Some(err.to_string()),
                });
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(results)
}
