//! Abort an in-flight action and return its resources to the pool.

use crate::provider::rows;
use crate::{StorageError, StorageProvider};
use satchel_codec::envelope::ActionStatus;
use tracing::info;

/// Move the action to `failed`, free the inputs it had claimed,
/// retire the outputs it would have created, and drop its
/// reservation. Aborting a terminal action is an error.
pub fn abort_action(
    provider: &StorageProvider,
    user_id: i64,
    reference: &str,
) -> Result<bool, StorageError> {
    provider.with_tx(|c| {
        let action = rows::find_action_by_reference(c, user_id, reference)?
            .ok_or(StorageError::NotFound("action"))?;
        if action.status.is_terminal() {
            return Err(StorageError::InvalidTransition {
                from: action.status,
                to: ActionStatus::Failed,
            });
        }
        rows::update_action_status(c, action.action_id, ActionStatus::Failed)?;
        rows::unspend_inputs_of(c, action.action_id)?;
        rows::deactivate_outputs(c, action.action_id)?;
        rows::release_outputs(c, reference)?;
        if let Some(req) = rows::find_req_by_action(c, action.action_id)? {
            if !req.status.is_terminal() {
                rows::update_req(
                    c,
                    req.req_id,
                    ActionStatus::Failed,
                    req.attempts,
                    req.last_status.as_deref(),
                    Some("aborted by caller"),
                )?;
            }
        }
        info!(reference, action.action_id, "action aborted");
        Ok(true)
    })
}
