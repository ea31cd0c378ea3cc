use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{GroupId, Transfer, UserId};

/// reduce a group's net balances to a deterministic list of transfers that
/// drives every balance to exactly zero.
///
/// greedy rule: repeatedly match the debtor with the largest absolute debt
/// against the creditor with the largest credit (ties broken by lower user
/// id) and transfer the smaller of the two amounts. not guaranteed to be
/// minimum-transfer-count optimal, but deterministic, O(n log n), and exact.
pub fn simplify(group_id: GroupId, balances: &BTreeMap<UserId, Money>) -> Result<Vec<Transfer>> {
    let sum: Money = balances.values().copied().sum();
    if !sum.is_zero() {
        tracing::warn!(group_id, sum = %sum, "ledger does not balance");
        return Err(LedgerError::UnbalancedLedger {
            group_id,
            sum: sum.as_decimal(),
        });
    }

    // max-heaps keyed on (amount, lower user id wins ties)
    let mut creditors: BinaryHeap<(Money, Reverse<UserId>)> = BinaryHeap::new();
    let mut debtors: BinaryHeap<(Money, Reverse<UserId>)> = BinaryHeap::new();
    for (&user_id, &balance) in balances {
        if balance.is_positive() {
            creditors.push((balance, Reverse(user_id)));
        } else if balance.is_negative() {
            debtors.push((balance.abs(), Reverse(user_id)));
        }
    }

    let mut transfers = Vec::new();
    while let (Some(&(credit, Reverse(creditor))), Some(&(debt, Reverse(debtor)))) =
        (creditors.peek(), debtors.peek())
    {
        creditors.pop();
        debtors.pop();

        let amount = credit.min(debt);
        transfers.push(Transfer {
            from_user_id: debtor,
            to_user_id: creditor,
            amount,
        });

        let credit_left = credit - amount;
        if !credit_left.is_zero() {
            creditors.push((credit_left, Reverse(creditor)));
        }
        let debt_left = debt - amount;
        if !debt_left.is_zero() {
            debtors.push((debt_left, Reverse(debtor)));
        }
    }

    Ok(transfers)
}
