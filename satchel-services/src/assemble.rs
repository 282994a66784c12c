//! AtomicBEEF assembly against the live services.

use crate::{ChainServices, ServiceError};
use satchel_primitives::beef::build_atomic_beef;
use satchel_primitives::AtomicBeef;
use tracing::debug;

/// Best-effort merkle path fetch; unmined and service failures both
/// come back as `None`.
pub async fn try_fetch_merkle_path(
    services: &dyn ChainServices,
    txid: &str,
) -> Option<satchel_primitives::MerklePath> {
    match services.get_merkle_path(txid).await {
        Ok(path) => path,
        Err(err) => {
            debug!(txid, %err, "merkle path lookup failed");
            None
        }
    }
}

/// Fetch the raw transaction (with the facade's retry policy) and its
/// proof when available, then assemble AtomicBEEF. RawTx-only bundles
/// are still useful for internalize flows on unmined transactions.
pub async fn build_atomic_beef_for_txid(
    services: &dyn ChainServices,
    txid: &str,
) -> Result<AtomicBeef, ServiceError> {
    let raw = services.get_raw_tx(txid).await?;
    let path = try_fetch_merkle_path(services, txid).await;
    Ok(build_atomic_beef(&raw, path))
}
