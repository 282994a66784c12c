//! Funding selection and change computation.
//!
//! Selects spendable outputs to cover the target plus estimated fee,
//! recomputing the fee to a fixed point as the selection grows, then
//! shapes change per the basket's desired-UTXO hints and reserves the
//! selection under the draft action's reference.

use crate::provider::rows;
use crate::{Basket, OutputRecord, StorageError};
use rusqlite::Connection;
use satchel_primitives::size::transaction_size;
use satchel_txbuilder::P2PKH_UNLOCKING_SCRIPT_LENGTH;
use tracing::debug;

/// P2PKH relay dust. Residuals under twice this fold into the fee.
pub const DUST_LIMIT: u64 = 135;

pub const DEFAULT_FEE_RATE_SAT_PER_KB: u64 = 50;

const P2PKH_LOCK_LEN: u64 = 25;

#[derive(Debug, Clone)]
pub struct ChangeParams {
    /// Satoshis the caller's outputs require.
    pub target_satoshis: u64,
    /// Satoshis already provided by caller-specified inputs.
    pub provided_input_satoshis: u64,
    /// Unlocking script lengths of caller-specified inputs.
    pub provided_input_script_lens: Vec<u64>,
    /// Locking script lengths of caller-specified outputs.
    pub output_script_lens: Vec<u64>,
    pub fee_rate_sat_per_kb: u64,
    /// Reservation tag, the draft action's reference.
    pub reference: String,
}

/// Outcome of funding: the reserved inputs, the change values to
/// create, and the settled fee.
#[derive(Debug, Clone)]
pub struct FundingAllocation {
    pub selected: Vec<OutputRecord>,
    pub change_satoshis: Vec<u64>,
    pub fee: u64,
}

impl FundingAllocation {
    pub fn selected_satoshis(&self) -> u64 {
        self.selected.iter().map(|o| o.satoshis as u64).sum()
    }
}

fn fee_for(size: u64, rate: u64) -> u64 {
    size.saturating_mul(rate).div_ceil(1000)
}

fn estimate_fee(
    params: &ChangeParams,
    selected_count: usize,
    change_count: u64,
) -> Result<u64, StorageError> {
    let input_lens = params
        .provided_input_script_lens
        .iter()
        .copied()
        .chain(std::iter::repeat(P2PKH_UNLOCKING_SCRIPT_LENGTH).take(selected_count));
    let output_lens = params
        .output_script_lens
        .iter()
        .copied()
        .chain(std::iter::repeat(P2PKH_LOCK_LEN).take(change_count as usize));
    let size = transaction_size(input_lens, output_lens)?;
    Ok(fee_for(size, params.fee_rate_sat_per_kb))
}

/// Extend `selected` from `pool` until it covers `need`.
///
/// Prefers a single output covering the whole requirement within 125%
/// (exact-or-next-above); otherwise accumulates smallest-first. The
/// pool arrives ordered `(satoshis ASC, output_id ASC)`, which makes
/// ties reproducible.
fn extend_selection(
    pool: &mut Vec<OutputRecord>,
    selected: &mut Vec<OutputRecord>,
    have: u64,
    need: u64,
) -> bool {
    if have >= need {
        return true;
    }
    let missing = need - have;

    // Single-close-fit: the smallest lone output in [missing, 125% of
    // missing]. Only worth it when nothing is selected yet.
    if selected.is_empty() {
        let fit = pool
            .iter()
            .position(|o| (o.satoshis as u64) >= missing
                && (o.satoshis as u64) <= missing.saturating_mul(125) / 100);
        if let Some(i) = fit {
            selected.push(pool.remove(i));
            return true;
        }
    }

    // Smallest-first accumulation.
    let mut have = have;
    while have < need {
        if pool.is_empty() {
            return false;
        }
        let output = pool.remove(0);
        have += output.satoshis as u64;
        selected.push(output);
    }
    true
}

/// Split `residual` into change values honoring the basket's hints.
fn shape_change(residual: u64, basket: &Basket, current_change_count: i64) -> Vec<u64> {
    if residual == 0 {
        return Vec::new();
    }
    let min_value = (basket.minimum_desired_utxo_value.max(1) as u64).max(DUST_LIMIT);
    let desired_more = (basket.number_of_desired_utxos - current_change_count).max(1) as u64;
    let k = (residual / min_value).clamp(1, desired_more);
    let each = residual / k;
    let mut change: Vec<u64> = vec![each; k as usize];
    change[0] += residual - each * k;
    change
}

/// Allocate funding for a draft action inside the caller's
/// transaction. On success the selected outputs are reserved under
/// `params.reference`; on failure nothing is reserved.
pub fn generate_change(
    c: &Connection,
    user_id: i64,
    basket: &Basket,
    params: &ChangeParams,
) -> Result<FundingAllocation, StorageError> {
    // Nothing to pay and nothing to fund: empty selection, zero fee.
    if params.target_satoshis == 0
        && params.output_script_lens.is_empty()
        && params.provided_input_script_lens.is_empty()
    {
        return Ok(FundingAllocation {
            selected: Vec::new(),
            change_satoshis: Vec::new(),
            fee: 0,
        });
    }

    let mut pool = rows::spendable_pool(c, user_id)?;
    let pool_total: u64 = pool.iter().map(|o| o.satoshis as u64).sum();
    let current_change_count = rows::count_spendable_change(c, user_id, basket.basket_id)?;

    let mut selected: Vec<OutputRecord> = Vec::new();
    let mut change_count: u64 = 1;
    let mut fee = estimate_fee(params, 0, change_count)?;
    let mut change: Vec<u64> = Vec::new();

    // The fee usually settles in two or three rounds; the bound stops
    // a pathological oscillation between change shapes.
    let mut rounds = 0;
    loop {
        rounds += 1;
        let need = params.target_satoshis + fee;
        let have = params.provided_input_satoshis + selected.iter().map(|o| o.satoshis as u64).sum::<u64>();

        if !extend_selection(&mut pool, &mut selected, have, need) {
            let available = params.provided_input_satoshis + pool_total;
            return Err(StorageError::InsufficientFunds {
                needed: need - available.min(need),
                available,
            });
        }

        let have = params.provided_input_satoshis + selected.iter().map(|o| o.satoshis as u64).sum::<u64>();
        let residual = have - need;

        if residual >= 2 * DUST_LIMIT {
            change = shape_change(residual, basket, current_change_count);
            change_count = change.len() as u64;
        } else {
            // Residual rides along as extra fee.
            change = Vec::new();
            change_count = 0;
        }

        // Fixed point: recompute with the settled selection and change
        // shape; a stable fee terminates the loop.
        let next_fee = estimate_fee(params, selected.len(), change_count.max(1))?;
        if next_fee == fee || rounds >= 10 {
            if change_count == 0 {
                fee += residual;
            }
            break;
        }
        fee = next_fee;
    }

    let ids: Vec<i64> = selected.iter().map(|o| o.output_id).collect();
    rows::reserve_outputs(c, user_id, &ids, &params.reference)?;
    debug!(
        inputs = selected.len(),
        change = change.len(),
        fee,
        "funding allocated"
    );

    Ok(FundingAllocation {
        selected,
        change_satoshis: change,
        fee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::rows::{self, NewAction, NewOutput};
    use crate::StorageProvider;
    use satchel_codec::envelope::ActionStatus;

    fn setup(pool_values: &[u64]) -> (StorageProvider, i64, Basket) {
        let provider = StorageProvider::open_in_memory().unwrap();
        let user = provider.find_or_create_user(&"02".repeat(33)).unwrap();
        let basket = provider
            .find_or_create_basket(user.user_id, "default")
            .unwrap();
        provider
            .with_tx(|c| {
                let action_id = rows::insert_action(
                    c,
                    &NewAction {
                        user_id: user.user_id,
                        reference: "seed",
                        description: "seed outputs",
                        version: 1,
                        lock_time: 0,
                        status: ActionStatus::Completed,
                        satoshis: 0,
                        is_outgoing: false,
                        input_beef: None,
                    },
                )?;
                for (i, value) in pool_values.iter().enumerate() {
                    rows::insert_output(
                        c,
                        &NewOutput {
                            user_id: user.user_id,
                            action_id,
                            vout: i as u32,
                            satoshis: *value as i64,
                            locking_script: Some("76a914"),
                            spendable: true,
                            change: true,
                            basket_id: Some(basket.basket_id),
                            purpose: "change",
                            custom_instructions: None,
                            derivation_prefix: Some("p"),
                            derivation_suffix: Some(&i.to_string()),
                            sender_identity_key: None,
                        },
                    )?;
                }
                Ok(())
            })
            .unwrap();
        (provider, user.user_id, basket)
    }

    fn params(target: u64) -> ChangeParams {
        ChangeParams {
            target_satoshis: target,
            provided_input_satoshis: 0,
            provided_input_script_lens: vec![],
            output_script_lens: vec![25],
            fee_rate_sat_per_kb: 50,
            reference: "ref-1".into(),
        }
    }

    #[test]
    fn zero_target_no_outputs_is_empty() {
        let (provider, user_id, basket) = setup(&[1000]);
        let allocation = provider
            .with_tx(|c| {
                generate_change(
                    c,
                    user_id,
                    &basket,
                    &ChangeParams {
                        target_satoshis: 0,
                        provided_input_satoshis: 0,
                        provided_input_script_lens: vec![],
                        output_script_lens: vec![],
                        fee_rate_sat_per_kb: 500,
                        reference: "r".into(),
                    },
                )
            })
            .unwrap();
        assert!(allocation.selected.is_empty());
        assert_eq!(allocation.fee, 0);
    }

    #[test]
    fn empty_pool_is_insufficient() {
        let (provider, user_id, basket) = setup(&[]);
        let err = provider
            .with_tx(|c| generate_change(c, user_id, &basket, &params(5000)))
            .unwrap_err();
        assert!(matches!(err, StorageError::InsufficientFunds { .. }));
    }

    #[test]
    fn exact_match_prefers_close_fit() {
        let (provider, user_id, basket) = setup(&[1000, 5000]);
        let allocation = provider
            .with_tx(|c| generate_change(c, user_id, &basket, &params(4500)))
            .unwrap();
        // 5000 covers 4500+fee within 125%; the 1000 output stays.
        assert_eq!(allocation.selected.len(), 1);
        assert_eq!(allocation.selected[0].satoshis, 5000);
        let spent = allocation.selected_satoshis();
        let change: u64 = allocation.change_satoshis.iter().sum();
        assert_eq!(spent, 4500 + allocation.fee + change);
    }

    #[test]
    fn accumulates_smallest_first_when_no_single_fit() {
        let (provider, user_id, basket) = setup(&[200, 300, 400, 10_000]);
        let allocation = provider
            .with_tx(|c| generate_change(c, user_id, &basket, &params(800)))
            .unwrap();
        // No single output sits within 125% of target+fee;
        // smallest-first accumulation picks 200+300+400.
        let values: Vec<i64> = allocation.selected.iter().map(|o| o.satoshis).collect();
        assert_eq!(values, vec![200, 300, 400]);
    }

    #[test]
    fn conservation_holds() {
        let (provider, user_id, basket) = setup(&[700, 900, 6000]);
        let allocation = provider
            .with_tx(|c| generate_change(c, user_id, &basket, &params(1200)))
            .unwrap();
        let inputs = allocation.selected_satoshis();
        let change: u64 = allocation.change_satoshis.iter().sum();
        assert_eq!(inputs, 1200 + allocation.fee + change);
        for value in &allocation.change_satoshis {
            assert!(*value >= DUST_LIMIT);
        }
    }

    #[test]
    fn selection_is_reserved() {
        let (provider, user_id, basket) = setup(&[1000, 5000]);
        provider
            .with_tx(|c| generate_change(c, user_id, &basket, &params(4500)))
            .unwrap();
        // The selected output is no longer in the pool for a second
        // allocation.
        let err = provider
            .with_tx(|c| {
                generate_change(
                    c,
                    user_id,
                    &basket,
                    &ChangeParams {
                        reference: "ref-2".into(),
                        ..params(4500)
                    },
                )
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::InsufficientFunds { .. }));
    }
}
