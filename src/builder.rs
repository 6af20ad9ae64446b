//! Transaction planning: coin selection, fee iteration and output assembly
//!
//! Selection is largest-first over a stable descending sort, so UTXOs of equal
//! value keep their input-list order. The fee of a candidate is measured by
//! running the signer in estimation mode over it; when that is impossible the
//! linear segwit model stands in.

use crate::address::lock_script_for_address;
use crate::config::ChainParams;
use crate::constants::MAX_MONEY;
use crate::error::{ErrorCode, Result, SigningError};
use crate::fee::{fee_for_virtual_size, FeeCalculator, LinearFeeCalculator};
use crate::script::build_op_return_script;
use crate::segwit::estimated_virtual_size;
use crate::signer::TransactionSigner;
use crate::transaction::encoded_size;
use crate::types::*;
use tracing::{debug, warn};

pub struct TransactionBuilder;

impl TransactionBuilder {
    /// Plan a spend. Failures are reported through `TransactionPlan::error`.
    pub fn plan(input: &SigningInput, params: &ChainParams) -> TransactionPlan {
        match Self::try_plan(input, params) {
            Ok(plan) => plan,
            Err(e) => {
                debug!(error = %e, "planning failed");
                TransactionPlan::failed(e.code())
            }
        }
    }

    /// Plan a spend, surfacing failures as errors.
    pub fn try_plan(input: &SigningInput, params: &ChainParams) -> Result<TransactionPlan> {
        validate_amounts(input)?;
        if !input.outputs.is_empty() {
            return plan_explicit_outputs(input);
        }
        if input.utxos.is_empty() {
            return Err(SigningError::MissingInputUtxos);
        }
        if input.use_max_amount {
            plan_max_amount(input, params)
        } else {
            plan_exact_amount(input, params)
        }
    }
}

/// Caller-supplied values must be money amounts whose totals fit in an `Amount`.
fn validate_amounts(input: &SigningInput) -> Result<()> {
    if !(0..=MAX_MONEY).contains(&input.byte_fee) {
        return Err(SigningError::InvalidAmount(format!("byte fee {}", input.byte_fee)));
    }
    if !input.use_max_amount && input.outputs.is_empty() && !(0..=MAX_MONEY).contains(&input.amount) {
        return Err(SigningError::InvalidAmount(format!("amount {}", input.amount)));
    }
    checked_total(input.utxos.iter().map(|utxo| utxo.amount))?;
    checked_total(input.outputs.iter().map(|output| output.value))?;
    Ok(())
}

fn checked_total(mut values: impl Iterator<Item = Amount>) -> Result<Amount> {
    values.try_fold(0 as Amount, |total, value| {
        if !(0..=MAX_MONEY).contains(&value) {
            return Err(SigningError::InvalidAmount(format!(
                "value {} outside 0..={}",
                value, MAX_MONEY
            )));
        }
        total
            .checked_add(value)
            .ok_or_else(|| SigningError::InvalidAmount("total overflows".to_string()))
    })
}

/// Every UTXO is spent; whatever the explicit outputs leave over is fee.
fn plan_explicit_outputs(input: &SigningInput) -> Result<TransactionPlan> {
    if input.utxos.is_empty() {
        return Err(SigningError::MissingInputUtxos);
    }
    let available = checked_total(input.utxos.iter().map(|utxo| utxo.amount))?;
    let amount = checked_total(input.outputs.iter().map(|output| output.value))?;
    let fee = available - amount;
    if fee < 0 {
        return Err(SigningError::InsufficientFunds(format!(
            "outputs total {} exceeds available {}",
            amount, available
        )));
    }
    debug!(inputs = input.utxos.len(), amount, fee, "planned explicit outputs");
    Ok(TransactionPlan {
        utxos: input.utxos.clone(),
        amount,
        available_amount: available,
        fee,
        change: 0,
        output_op_return: input.output_op_return.clone(),
        branch_id: None,
        error: ErrorCode::Ok,
    })
}

fn plan_max_amount(input: &SigningInput, params: &ChainParams) -> Result<TransactionPlan> {
    let calculator = LinearFeeCalculator::SEGWIT;
    let dust = calculator.calculate_single_input(input.byte_fee);
    let utxos: Vec<Utxo> = input
        .utxos
        .iter()
        .filter(|utxo| utxo.amount > dust)
        .cloned()
        .collect();
    if utxos.is_empty() {
        return Err(SigningError::InsufficientFunds(format!(
            "no UTXO worth more than its input fee {}",
            dust
        )));
    }

    let available = sum_amounts(utxos.iter());
    let mut plan = TransactionPlan {
        utxos,
        amount: available,
        available_amount: available,
        output_op_return: input.output_op_return.clone(),
        ..Default::default()
    };
    plan.fee = estimate_fee(input, &plan, params);
    plan.amount = available - plan.fee;
    if plan.amount <= 0 {
        return Err(SigningError::InsufficientFunds(format!(
            "fee {} consumes available {}",
            plan.fee, available
        )));
    }
    debug!(
        inputs = plan.utxos.len(),
        amount = plan.amount,
        fee = plan.fee,
        "planned max amount"
    );
    Ok(plan)
}

fn plan_exact_amount(input: &SigningInput, params: &ChainParams) -> Result<TransactionPlan> {
    let order = largest_first(&input.utxos);
    let op_return_outputs = usize::from(input.output_op_return.is_some());
    let start = select_count(
        &input.utxos,
        &order,
        input.amount,
        1 + op_return_outputs,
        input.byte_fee,
    )
    .ok_or_else(|| {
        SigningError::InsufficientFunds(format!(
            "UTXOs total {} cannot cover {}",
            sum_amounts(input.utxos.iter()),
            input.amount
        ))
    })?;

    // Grow the selection until the measured fee is covered
    let with_change = (start..=order.len()).find_map(|count| {
        let candidate = priced_candidate(input, params, &order[..count], true);
        covers_fee(&candidate).then_some(candidate)
    });

    let plan = match with_change {
        Some(mut plan) => {
            plan.change = plan.available_amount - plan.amount - plan.fee;
            if plan.change > 0 && plan.change < params.dust_threshold {
                plan.fee += plan.change;
                plan.change = 0;
            }
            plan
        }
        None => {
            // The change output itself may be what breaks the budget
            let mut plan = (start..=order.len())
                .find_map(|count| {
                    let candidate = priced_candidate(input, params, &order[..count], false);
                    covers_fee(&candidate).then_some(candidate)
                })
                .ok_or_else(|| {
                    SigningError::InsufficientFunds(format!(
                        "UTXOs total {} cannot cover {} plus fee",
                        sum_amounts(input.utxos.iter()),
                        input.amount
                    ))
                })?;
            plan.fee = plan.available_amount - plan.amount;
            plan
        }
    };
    debug!(
        inputs = plan.utxos.len(),
        amount = plan.amount,
        fee = plan.fee,
        change = plan.change,
        "planned spend"
    );
    Ok(plan)
}

/// Plan spending the UTXOs at `selected`, with its fee measured.
/// Without `with_change` the plan is sized with no change output.
fn priced_candidate(
    input: &SigningInput,
    params: &ChainParams,
    selected: &[usize],
    with_change: bool,
) -> TransactionPlan {
    let utxos = in_input_order(&input.utxos, selected);
    let available = sum_amounts(utxos.iter());
    let mut candidate = TransactionPlan {
        utxos,
        amount: input.amount,
        available_amount: available,
        change: if with_change { available - input.amount } else { 0 },
        output_op_return: input.output_op_return.clone(),
        ..Default::default()
    };
    candidate.fee = estimate_fee(input, &candidate, params);
    debug!(selected = selected.len(), available, with_change, fee = candidate.fee, "fee iteration");
    candidate
}

fn covers_fee(plan: &TransactionPlan) -> bool {
    plan.available_amount >= plan.amount.saturating_add(plan.fee)
}

/// Indices of `utxos` sorted by amount, largest first. Ties keep input order.
fn largest_first(utxos: &[Utxo]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..utxos.len()).collect();
    order.sort_by(|a, b| utxos[*b].amount.cmp(&utxos[*a].amount));
    order
}

/// Number of leading UTXOs (in `order`) to start the fee iteration with.
///
/// The first prefix covering target + linear fee + one input's worth of dust
/// margin wins; failing that, the first prefix covering target + linear fee
/// without a change output. When the linear model rules out every prefix but the
/// total still covers the target, all UTXOs are taken and the measured fee decides.
fn select_count(
    utxos: &[Utxo],
    order: &[usize],
    target: Amount,
    non_change_outputs: usize,
    byte_fee: Amount,
) -> Option<usize> {
    let calculator = LinearFeeCalculator::SEGWIT;
    let margin = calculator.calculate_single_input(byte_fee);

    let prefix_sums: Vec<Amount> = order
        .iter()
        .scan(0 as Amount, |acc, i| {
            *acc += utxos[*i].amount;
            Some(*acc)
        })
        .collect();

    let with_change = prefix_sums.iter().enumerate().find(|(k, sum)| {
        **sum
            >= target
                .saturating_add(calculator.calculate(k + 1, non_change_outputs + 1, byte_fee))
                .saturating_add(margin)
    });
    if let Some((k, _)) = with_change {
        return Some(k + 1);
    }
    prefix_sums
        .iter()
        .enumerate()
        .find(|(k, sum)| {
            **sum >= target.saturating_add(calculator.calculate(k + 1, non_change_outputs, byte_fee))
        })
        .map(|(k, _)| k + 1)
        .or_else(|| match prefix_sums.last() {
            Some(total) if *total >= target => Some(prefix_sums.len()),
            _ => None,
        })
}

/// The UTXOs at `selected` indices, in their original relative order.
fn in_input_order(utxos: &[Utxo], selected: &[usize]) -> Vec<Utxo> {
    let mut indices = selected.to_vec();
    indices.sort_unstable();
    indices.into_iter().map(|i| utxos[i].clone()).collect()
}

fn sum_amounts<'a>(utxos: impl Iterator<Item = &'a Utxo>) -> Amount {
    utxos.map(|utxo| utxo.amount).sum()
}

/// Fee of a candidate plan, measured by a dry-run signing pass.
///
/// Formula: fee = byte_fee × vsize, vsize = |legacy| without witness data,
/// ⌈(3 × |legacy| + |segwit|) / 4⌉ with it.
pub fn estimate_fee(input: &SigningInput, plan: &TransactionPlan, params: &ChainParams) -> Amount {
    match TransactionSigner::estimate(input, plan, params) {
        Ok(tx) => {
            let size = encoded_size(&tx);
            let vsize = estimated_virtual_size(&tx, size.non_segwit, size.segwit);
            fee_for_virtual_size(vsize, input.byte_fee)
        }
        Err(e) => {
            let outputs = 1
                + usize::from(plan.change > 0)
                + usize::from(plan.output_op_return.is_some());
            let fee = LinearFeeCalculator::SEGWIT.calculate(plan.utxos.len(), outputs, input.byte_fee);
            warn!(error = %e, fee, "size estimation failed, using linear fee");
            fee
        }
    }
}

/// Outputs of the transaction a plan describes, in wire order.
///
/// Explicit outputs are used as given. Otherwise: destination, change when
/// non-zero, then the OP_RETURN data output when a memo is set.
pub fn build_outputs(
    input: &SigningInput,
    plan: &TransactionPlan,
    params: &ChainParams,
) -> Result<Vec<TransactionOutput>> {
    let mut outputs = Vec::new();
    if !input.outputs.is_empty() {
        outputs.extend(input.outputs.iter().cloned());
    } else {
        outputs.push(TransactionOutput {
            value: plan.amount,
            script_pubkey: lock_script_for_address(&input.to_address, params)?,
        });
        if plan.change > 0 {
            outputs.push(TransactionOutput {
                value: plan.change,
                script_pubkey: lock_script_for_address(&input.change_address, params)?,
            });
        }
    }
    if let Some(data) = &plan.output_op_return {
        let script = build_op_return_script(data).ok_or_else(|| {
            SigningError::InvalidOutputScript(format!("OP_RETURN data of {} bytes", data.len()))
        })?;
        outputs.push(TransactionOutput {
            value: 0,
            script_pubkey: script,
        });
    }
    Ok(outputs)
}
