use std::collections::{BTreeMap, BTreeSet};

use crate::decimal::Money;
use crate::types::{
    ConfirmedTransfer, Expense, ExpenseId, ExpenseParticipant, GroupId, LedgerEntry, UserId,
};

/// per-group, per-user running balances. entries are created lazily on the
/// first delta and never deleted; the balances of a group always sum to zero
/// as long as callers apply matched +/- deltas.
pub trait LedgerStore {
    /// current balance, zero when no entry exists (does not create one)
    fn balance(&self, group_id: GroupId, user_id: UserId) -> Money;

    /// create the entry at zero if absent, add the delta, return the new balance
    fn apply_delta(&mut self, group_id: GroupId, user_id: UserId, delta: Money) -> Money;

    /// all entries of a group, ordered by user id ascending
    fn group_balances(&self, group_id: GroupId) -> Vec<LedgerEntry>;
}

/// expense rows and their participant share rows
pub trait ExpenseStore {
    fn insert_expense(&mut self, expense: Expense);

    fn expense(&self, expense_id: ExpenseId) -> Option<Expense>;

    /// replace the stored row with the same id
    fn save_expense(&mut self, expense: Expense);

    fn find_by_idempotency_key(&self, group_id: GroupId, key: &str) -> Option<Expense>;

    /// expenses of a group in insertion order (oldest first), voided included
    fn group_expenses(&self, group_id: GroupId) -> Vec<Expense>;

    /// participant rows of an expense in stored order
    fn participants(&self, expense_id: ExpenseId) -> Vec<ExpenseParticipant>;

    /// drop all participant rows of an expense and store the given set
    fn replace_participants(&mut self, expense_id: ExpenseId, rows: Vec<ExpenseParticipant>);

    /// sum of shares owed by `participant` on non-voided expenses paid by
    /// `payer` within the group
    fn sum_shares(&self, group_id: GroupId, payer: UserId, participant: UserId) -> Money;
}

/// immutable confirmed-transfer history
pub trait TransferStore {
    fn record_transfer(&mut self, transfer: ConfirmedTransfer);

    /// whether a batch with this confirmation id was already applied
    fn has_confirmation(&self, group_id: GroupId, confirmation_id: &str) -> bool;

    /// sum of confirmed transfers from one user to another within the group
    fn sum_transfers(&self, group_id: GroupId, from: UserId, to: UserId) -> Money;

    /// all transfers of a group in insertion order
    fn group_transfers(&self, group_id: GroupId) -> Vec<ConfirmedTransfer>;
}

/// membership predicate supplied by the surrounding identity layer
pub trait MembershipDirectory {
    fn is_member(&self, group_id: GroupId, user_id: UserId) -> bool;

    /// members of a group, ordered by user id ascending
    fn members(&self, group_id: GroupId) -> Vec<UserId>;
}

/// in-memory storage backing all three store traits; the reference
/// implementation for tests and embedded use
#[derive(Debug, Default)]
pub struct MemoryStore {
    balances: BTreeMap<(GroupId, UserId), Money>,
    expenses: Vec<Expense>,
    participants: Vec<ExpenseParticipant>,
    transfers: Vec<ConfirmedTransfer>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn balance(&self, group_id: GroupId, user_id: UserId) -> Money {
        self.balances
            .get(&(group_id, user_id))
            .copied()
            .unwrap_or(Money::ZERO)
    }

    fn apply_delta(&mut self, group_id: GroupId, user_id: UserId, delta: Money) -> Money {
        let balance = self.balances.entry((group_id, user_id)).or_insert(Money::ZERO);
        *balance += delta;
        *balance
    }

    fn group_balances(&self, group_id: GroupId) -> Vec<LedgerEntry> {
        self.balances
            .range((group_id, UserId::MIN)..=(group_id, UserId::MAX))
            .map(|(&(_, user_id), &balance)| LedgerEntry { user_id, balance })
            .collect()
    }
}

impl ExpenseStore for MemoryStore {
    fn insert_expense(&mut self, expense: Expense) {
        self.expenses.push(expense);
    }

    fn expense(&self, expense_id: ExpenseId) -> Option<Expense> {
        self.expenses.iter().find(|e| e.id == expense_id).cloned()
    }

    fn save_expense(&mut self, expense: Expense) {
        if let Some(slot) = self.expenses.iter_mut().find(|e| e.id == expense.id) {
            *slot = expense;
        }
    }

    fn find_by_idempotency_key(&self, group_id: GroupId, key: &str) -> Option<Expense> {
        self.expenses
            .iter()
            .find(|e| e.group_id == group_id && e.idempotency_key.as_deref() == Some(key))
            .cloned()
    }

    fn group_expenses(&self, group_id: GroupId) -> Vec<Expense> {
        self.expenses
            .iter()
            .filter(|e| e.group_id == group_id)
            .cloned()
            .collect()
    }

    fn participants(&self, expense_id: ExpenseId) -> Vec<ExpenseParticipant> {
        self.participants
            .iter()
            .filter(|p| p.expense_id == expense_id)
            .cloned()
            .collect()
    }

    fn replace_participants(&mut self, expense_id: ExpenseId, rows: Vec<ExpenseParticipant>) {
        self.participants.retain(|p| p.expense_id != expense_id);
        self.participants.extend(rows);
    }

    fn sum_shares(&self, group_id: GroupId, payer: UserId, participant: UserId) -> Money {
        self.expenses
            .iter()
            .filter(|e| e.group_id == group_id && e.payer_user_id == payer && !e.voided)
            .flat_map(|e| {
                self.participants
                    .iter()
                    .filter(move |p| p.expense_id == e.id && p.user_id == participant)
            })
            .map(|p| p.share_amount)
            .sum()
    }
}

impl TransferStore for MemoryStore {
    fn record_transfer(&mut self, transfer: ConfirmedTransfer) {
        self.transfers.push(transfer);
    }

    fn has_confirmation(&self, group_id: GroupId, confirmation_id: &str) -> bool {
        self.transfers.iter().any(|t| {
            t.group_id == group_id && t.confirmation_id.as_deref() == Some(confirmation_id)
        })
    }

    fn sum_transfers(&self, group_id: GroupId, from: UserId, to: UserId) -> Money {
        self.transfers
            .iter()
            .filter(|t| t.group_id == group_id && t.from_user_id == from && t.to_user_id == to)
            .map(|t| t.amount)
            .sum()
    }

    fn group_transfers(&self, group_id: GroupId) -> Vec<ConfirmedTransfer> {
        self.transfers
            .iter()
            .filter(|t| t.group_id == group_id)
            .cloned()
            .collect()
    }
}

/// in-memory membership directory
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    groups: BTreeMap<GroupId, BTreeSet<UserId>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&mut self, group_id: GroupId, user_id: UserId) {
        self.groups.entry(group_id).or_default().insert(user_id);
    }

    /// directory with one group already populated
    pub fn with_members(group_id: GroupId, user_ids: &[UserId]) -> Self {
        let mut directory = Self::new();
        for &user_id in user_ids {
            directory.add_member(group_id, user_id);
        }
        directory
    }
}

impl MembershipDirectory for MemoryDirectory {
    fn is_member(&self, group_id: GroupId, user_id: UserId) -> bool {
        self.groups
            .get(&group_id)
            .is_some_and(|members| members.contains(&user_id))
    }

    fn members(&self, group_id: GroupId) -> Vec<UserId> {
        self.groups
            .get(&group_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }
}
