use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{Share, UserId};

/// split-mode parameters, each parallel to the explicit participant list.
/// when several are supplied by mistake the precedence is
/// exact amounts > percentages > shares > equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitSpec {
    pub exact_amounts: Option<Vec<Decimal>>,
    pub percentages: Option<Vec<Decimal>>,
    pub shares: Option<Vec<u32>>,
}

impl SplitSpec {
    /// equal split among all participants
    pub fn equal() -> Self {
        Self::default()
    }

    /// caller-supplied amount per participant
    pub fn exact(amounts: Vec<Decimal>) -> Self {
        Self {
            exact_amounts: Some(amounts),
            ..Self::default()
        }
    }

    /// caller-supplied percentage per participant, summing to 100
    pub fn percentages(percentages: Vec<Decimal>) -> Self {
        Self {
            percentages: Some(percentages),
            ..Self::default()
        }
    }

    /// positive integer weight per participant
    pub fn weighted(weights: Vec<u32>) -> Self {
        Self {
            shares: Some(weights),
            ..Self::default()
        }
    }
}

/// compute per-user shares for a total under the requested split mode.
/// the returned shares always sum to the total exactly; a payer missing
/// from the participant list is included with a zero base share so ledger
/// bookkeeping still touches their entry.
pub fn compute_shares(
    total: Money,
    payer: UserId,
    participant_ids: &[UserId],
    spec: &SplitSpec,
    config: &EngineConfig,
) -> Result<Vec<Share>> {
    if participant_ids.is_empty() {
        return Err(LedgerError::bad_split("at least one participant is required"));
    }

    if let Some(exact) = &spec.exact_amounts {
        exact_split(total, payer, participant_ids, exact, config)
    } else if let Some(percentages) = &spec.percentages {
        percentage_split(total, payer, participant_ids, percentages, config)
    } else if let Some(weights) = &spec.shares {
        weighted_split(total, payer, participant_ids, weights)
    } else {
        equal_split(total, payer, participant_ids)
    }
}

/// participant list with the payer appended when absent
fn with_payer(participant_ids: &[UserId], payer: UserId) -> Vec<UserId> {
    let mut ids = participant_ids.to_vec();
    if !ids.contains(&payer) {
        ids.push(payer);
    }
    ids
}

/// equal split: floor(total / n) each, remainder cents handed out one at a
/// time in list order starting from index 0
fn equal_split(total: Money, payer: UserId, participant_ids: &[UserId]) -> Result<Vec<Share>> {
    let ids = with_payer(participant_ids, payer);
    let n = ids.len();

    let base = total.mul_fraction(
        Decimal::ONE,
        Decimal::from(n as u64),
        RoundingStrategy::ToZero,
    );
    let mut shares: Vec<Share> = ids
        .iter()
        .map(|&user_id| Share {
            user_id,
            amount: base,
        })
        .collect();

    // remainder is 0 to n-1 cents, handed out in list order from index 0.
    // computed in Money so arbitrarily large totals stay exact.
    let mut diff = shares.iter().fold(total, |d, s| d - s.amount);
    let mut i = 0;
    while diff.is_positive() {
        shares[i % n].amount += Money::CENT;
        diff -= Money::CENT;
        i += 1;
    }

    Ok(shares)
}

fn exact_split(
    total: Money,
    payer: UserId,
    participant_ids: &[UserId],
    amounts: &[Decimal],
    config: &EngineConfig,
) -> Result<Vec<Share>> {
    if amounts.len() != participant_ids.len() {
        return Err(LedgerError::bad_split(
            "exact amounts length must match participant count",
        ));
    }

    let mut shares = Vec::with_capacity(participant_ids.len() + 1);
    for (&user_id, &raw) in participant_ids.iter().zip(amounts) {
        shares.push(Share {
            user_id,
            amount: Money::normalize(raw)?,
        });
    }
    if !participant_ids.contains(&payer) {
        shares.push(Share {
            user_id: payer,
            amount: Money::ZERO,
        });
    }

    let sum: Money = shares.iter().map(|s| s.amount).sum();
    if (sum - total).abs().as_decimal() > config.exact_sum_tolerance {
        return Err(LedgerError::bad_split(
            "exact amounts must sum to the total within tolerance",
        ));
    }

    distribute_leftover(shares, total)
}

fn percentage_split(
    total: Money,
    payer: UserId,
    participant_ids: &[UserId],
    percentages: &[Decimal],
    config: &EngineConfig,
) -> Result<Vec<Share>> {
    if percentages.len() != participant_ids.len() {
        return Err(LedgerError::bad_split(
            "percentages length must match participant count",
        ));
    }

    let sum_pct: Decimal = percentages.iter().sum();
    if (sum_pct - Decimal::ONE_HUNDRED).abs() > config.percent_tolerance {
        return Err(LedgerError::bad_split(
            "percentages must sum to 100 within tolerance",
        ));
    }

    let mut shares = Vec::with_capacity(participant_ids.len() + 1);
    for (&user_id, &pct) in participant_ids.iter().zip(percentages) {
        shares.push(Share {
            user_id,
            amount: total.mul_fraction(pct, Decimal::ONE_HUNDRED, RoundingStrategy::ToZero),
        });
    }
    if !participant_ids.contains(&payer) {
        shares.push(Share {
            user_id: payer,
            amount: Money::ZERO,
        });
    }

    distribute_leftover(shares, total)
}

fn weighted_split(
    total: Money,
    payer: UserId,
    participant_ids: &[UserId],
    weights: &[u32],
) -> Result<Vec<Share>> {
    if weights.len() != participant_ids.len() {
        return Err(LedgerError::bad_split(
            "shares length must match participant count",
        ));
    }

    let weight_sum: u64 = weights.iter().map(|&w| u64::from(w)).sum();
    if weight_sum == 0 {
        return Err(LedgerError::bad_split("sum of shares must be positive"));
    }

    let mut shares = Vec::with_capacity(participant_ids.len() + 1);
    for (&user_id, &weight) in participant_ids.iter().zip(weights) {
        shares.push(Share {
            user_id,
            amount: total.mul_fraction(
                Decimal::from(weight),
                Decimal::from(weight_sum),
                RoundingStrategy::ToZero,
            ),
        });
    }
    if !participant_ids.contains(&payer) {
        shares.push(Share {
            user_id: payer,
            amount: Money::ZERO,
        });
    }

    distribute_leftover(shares, total)
}

/// settle the rounding residue so the shares sum to the total exactly:
/// sort by user id ascending, then walk the list cyclically handing out
/// (or taking back) one cent at a time until the difference is zero
fn distribute_leftover(mut shares: Vec<Share>, total: Money) -> Result<Vec<Share>> {
    shares.sort_by_key(|s| s.user_id);

    // diff is a whole number of cents since every value is scale-2; the
    // walk stays in Money so large totals cannot overflow an integer type
    let sum: Money = shares.iter().map(|s| s.amount).sum();
    let mut diff = total - sum;

    let n = shares.len();
    let mut i = 0;
    while diff.is_positive() {
        shares[i % n].amount += Money::CENT;
        diff -= Money::CENT;
        i += 1;
    }
    while diff.is_negative() {
        shares[i % n].amount -= Money::CENT;
        diff += Money::CENT;
        i += 1;
    }

    // a downward adjustment may not push any share below zero
    for share in &shares {
        if share.amount.is_negative() {
            return Err(LedgerError::InvalidAmount {
                amount: share.amount.as_decimal(),
            });
        }
    }

    Ok(shares)
}
