use std::collections::{BTreeMap, BTreeSet, HashSet};

use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::{EventLog, ExpenseEvent, ExpenseEventKind};
use crate::settlement;
use crate::split::{self, SplitSpec};
use crate::store::{ExpenseStore, LedgerStore, MembershipDirectory, TransferStore};
use crate::types::{
    ConfirmedTransfer, Expense, ExpenseId, ExpenseParticipant, ExpenseResult, GroupId,
    LedgerEntry, Share, Transfer, UserId,
};

/// parameters for creating or updating an expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRequest {
    pub description: String,
    pub amount: Decimal,
    pub payer_user_id: UserId,
    /// explicit participants; defaults to the whole group on create and to
    /// the current participant set on update
    pub participant_user_ids: Option<Vec<UserId>>,
    #[serde(default)]
    pub split: SplitSpec,
    pub idempotency_key: Option<String>,
}

impl ExpenseRequest {
    /// equal split across the whole group
    pub fn equal(description: impl Into<String>, amount: Decimal, payer_user_id: UserId) -> Self {
        Self {
            description: description.into(),
            amount,
            payer_user_id,
            participant_user_ids: None,
            split: SplitSpec::equal(),
            idempotency_key: None,
        }
    }
}

/// the ledger & settlement engine: orchestrates expense lifecycle, settlement
/// confirmation, and obligation queries over caller-supplied storage.
///
/// every mutating operation validates before it touches the stores, so an
/// `Err` return leaves the ledger untouched.
pub struct ExpenseEngine<S, D>
where
    S: LedgerStore + ExpenseStore + TransferStore,
    D: MembershipDirectory,
{
    store: S,
    directory: D,
    log: EventLog,
    config: EngineConfig,
}

impl<S, D> ExpenseEngine<S, D>
where
    S: LedgerStore + ExpenseStore + TransferStore,
    D: MembershipDirectory,
{
    pub fn new(store: S, directory: D) -> Self {
        Self::with_config(store, directory, EngineConfig::default())
    }

    pub fn with_config(store: S, directory: D, config: EngineConfig) -> Self {
        Self {
            store,
            directory,
            log: EventLog::new(),
            config,
        }
    }

    /// create an expense, split it, and debit the participants.
    ///
    /// a request carrying an idempotency key already seen for this group is
    /// a strict replay: the original result is returned unchanged and
    /// nothing is written.
    pub fn create_expense(
        &mut self,
        group_id: GroupId,
        req: ExpenseRequest,
        time: &SafeTimeProvider,
    ) -> Result<ExpenseResult> {
        let idempotency_key = clean_key(req.idempotency_key.as_deref());
        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.store.find_by_idempotency_key(group_id, key) {
                tracing::debug!(group_id, key = %key, "idempotent replay of create");
                return Ok(self.result_for(existing));
            }
        }

        let amount = Money::normalize(req.amount)?;
        if amount < Money::CENT {
            return Err(LedgerError::InvalidAmount { amount: req.amount });
        }

        let participant_ids = match &req.participant_user_ids {
            Some(ids) if !ids.is_empty() => ids.clone(),
            _ => self.directory.members(group_id),
        };
        require_unique(&participant_ids)?;
        self.require_member(group_id, req.payer_user_id)?;
        for &user_id in &participant_ids {
            self.require_member(group_id, user_id)?;
        }

        let splits = split::compute_shares(
            amount,
            req.payer_user_id,
            &participant_ids,
            &req.split,
            &self.config,
        )?;

        let expense = Expense {
            id: Uuid::new_v4(),
            group_id,
            payer_user_id: req.payer_user_id,
            description: req.description.trim().to_string(),
            amount,
            created_at: time.now(),
            idempotency_key,
            voided: false,
        };
        self.store.insert_expense(expense.clone());
        self.store.replace_participants(
            expense.id,
            splits
                .iter()
                .map(|s| ExpenseParticipant {
                    expense_id: expense.id,
                    user_id: s.user_id,
                    share_amount: s.amount,
                })
                .collect(),
        );

        // payer is credited the full amount, every participant owes their share
        self.store.apply_delta(group_id, expense.payer_user_id, amount);
        for share in &splits {
            self.store.apply_delta(group_id, share.user_id, -share.amount);
        }

        self.log.append(ExpenseEvent {
            group_id,
            expense_id: expense.id,
            kind: ExpenseEventKind::Created,
            payload: json!({ "expenseId": expense.id, "amount": amount }),
            created_at: time.now(),
        });
        tracing::debug!(group_id, expense_id = %expense.id, amount = %amount, "expense created");

        Ok(ExpenseResult {
            expense,
            splits,
        })
    }

    /// re-split an expense against new parameters, adjusting the ledger by
    /// the difference between old and new state
    pub fn update_expense(
        &mut self,
        group_id: GroupId,
        expense_id: ExpenseId,
        req: ExpenseRequest,
        time: &SafeTimeProvider,
    ) -> Result<ExpenseResult> {
        let existing = self
            .store
            .expense(expense_id)
            .ok_or(LedgerError::NotFound { expense_id })?;
        if existing.group_id != group_id {
            return Err(LedgerError::CrossGroup {
                expense_id,
                group_id,
            });
        }
        if existing.voided {
            return Err(LedgerError::AlreadyVoided { expense_id });
        }

        let old_rows = self.store.participants(expense_id);

        let participant_ids = match &req.participant_user_ids {
            Some(ids) if !ids.is_empty() => ids.clone(),
            _ => old_rows.iter().map(|p| p.user_id).collect(),
        };
        require_unique(&participant_ids)?;
        self.require_member(group_id, req.payer_user_id)?;
        for &user_id in &participant_ids {
            self.require_member(group_id, user_id)?;
        }

        let new_amount = Money::normalize(req.amount)?;
        if new_amount < Money::CENT {
            return Err(LedgerError::InvalidAmount { amount: req.amount });
        }

        let splits = split::compute_shares(
            new_amount,
            req.payer_user_id,
            &participant_ids,
            &req.split,
            &self.config,
        )?;

        // payer credit: same payer moves by the difference, a payer change
        // reverses the old credit entirely and applies the new one
        if existing.payer_user_id == req.payer_user_id {
            let delta = new_amount - existing.amount;
            if !delta.is_zero() {
                self.store.apply_delta(group_id, req.payer_user_id, delta);
            }
        } else {
            self.store
                .apply_delta(group_id, existing.payer_user_id, -existing.amount);
            self.store.apply_delta(group_id, req.payer_user_id, new_amount);
        }

        // per-user debit moves by oldShare - newShare over the union of old
        // and new participants, so removed users are refunded
        let old_shares: BTreeMap<UserId, Money> = old_rows
            .iter()
            .map(|p| (p.user_id, p.share_amount))
            .collect();
        let new_shares: BTreeMap<UserId, Money> =
            splits.iter().map(|s| (s.user_id, s.amount)).collect();
        let touched: BTreeSet<UserId> = old_shares
            .keys()
            .chain(new_shares.keys())
            .copied()
            .collect();
        for user_id in touched {
            let old = old_shares.get(&user_id).copied().unwrap_or(Money::ZERO);
            let new = new_shares.get(&user_id).copied().unwrap_or(Money::ZERO);
            let delta = old - new;
            if !delta.is_zero() {
                self.store.apply_delta(group_id, user_id, delta);
            }
        }

        self.store.replace_participants(
            expense_id,
            splits
                .iter()
                .map(|s| ExpenseParticipant {
                    expense_id,
                    user_id: s.user_id,
                    share_amount: s.amount,
                })
                .collect(),
        );

        let mut updated = existing.clone();
        updated.payer_user_id = req.payer_user_id;
        updated.description = req.description.trim().to_string();
        updated.amount = new_amount;
        self.store.save_expense(updated.clone());

        self.log.append(ExpenseEvent {
            group_id,
            expense_id,
            kind: ExpenseEventKind::Updated,
            payload: json!({
                "before": { "amount": existing.amount },
                "after": { "amount": new_amount },
            }),
            created_at: time.now(),
        });
        tracing::debug!(group_id, expense_id = %expense_id, amount = %new_amount, "expense updated");

        Ok(ExpenseResult {
            expense: updated,
            splits,
        })
    }

    /// reverse every ledger delta the expense caused and mark it voided.
    /// voiding an already-voided expense is a no-op.
    pub fn void_expense(
        &mut self,
        group_id: GroupId,
        expense_id: ExpenseId,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        let existing = self
            .store
            .expense(expense_id)
            .ok_or(LedgerError::NotFound { expense_id })?;
        if existing.group_id != group_id {
            return Err(LedgerError::CrossGroup {
                expense_id,
                group_id,
            });
        }
        if existing.voided {
            tracing::debug!(group_id, expense_id = %expense_id, "void replay, already voided");
            return Ok(());
        }

        self.store
            .apply_delta(group_id, existing.payer_user_id, -existing.amount);
        for row in self.store.participants(expense_id) {
            self.store.apply_delta(group_id, row.user_id, row.share_amount);
        }

        let mut voided = existing;
        voided.voided = true;
        let amount = voided.amount;
        self.store.save_expense(voided);

        self.log.append(ExpenseEvent {
            group_id,
            expense_id,
            kind: ExpenseEventKind::Voided,
            payload: json!({ "expenseId": expense_id, "amount": amount }),
            created_at: time.now(),
        });
        tracing::debug!(group_id, expense_id = %expense_id, "expense voided");

        Ok(())
    }

    /// non-voided expenses of a group, newest first, each with its splits
    pub fn list_expenses(&self, group_id: GroupId) -> Vec<ExpenseResult> {
        self.store
            .group_expenses(group_id)
            .into_iter()
            .rev()
            .filter(|e| !e.voided)
            .map(|e| self.result_for(e))
            .collect()
    }

    /// net balances of a group, ordered by user id
    pub fn ledger(&self, group_id: GroupId) -> Vec<LedgerEntry> {
        self.store.group_balances(group_id)
    }

    /// minimal transfer list that settles the group's net balances
    pub fn settlements(&self, group_id: GroupId) -> Result<Vec<Transfer>> {
        let balances: BTreeMap<UserId, Money> = self
            .store
            .group_balances(group_id)
            .into_iter()
            .map(|e| (e.user_id, e.balance))
            .collect();
        settlement::simplify(group_id, &balances)
    }

    /// apply externally-confirmed transfers to the ledger and record them.
    ///
    /// the whole batch is validated before any delta is applied; a batch
    /// whose confirmation id was already processed is a silent no-op.
    pub fn confirm_settlements(
        &mut self,
        group_id: GroupId,
        transfers: &[Transfer],
        confirmation_id: Option<&str>,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        if transfers.is_empty() {
            return Ok(());
        }

        let confirmation_id = clean_key(confirmation_id);
        if let Some(cid) = &confirmation_id {
            if self.store.has_confirmation(group_id, cid) {
                tracing::debug!(group_id, confirmation_id = %cid, "idempotent replay of confirmation");
                return Ok(());
            }
        }

        for t in transfers {
            if !t.amount.is_positive() {
                return Err(LedgerError::InvalidAmount {
                    amount: t.amount.as_decimal(),
                });
            }
            self.require_member(group_id, t.from_user_id)?;
            self.require_member(group_id, t.to_user_id)?;
        }

        for t in transfers {
            // the payer's debt shrinks, the payee's credit shrinks
            self.store.apply_delta(group_id, t.from_user_id, t.amount);
            self.store.apply_delta(group_id, t.to_user_id, -t.amount);
            self.store.record_transfer(ConfirmedTransfer {
                id: Uuid::new_v4(),
                group_id,
                from_user_id: t.from_user_id,
                to_user_id: t.to_user_id,
                amount: t.amount,
                confirmation_id: confirmation_id.clone(),
                created_at: time.now(),
            });
        }
        tracing::debug!(group_id, count = transfers.len(), "settlements confirmed");

        Ok(())
    }

    /// what `from` still owes `to`, reconstructed from expense and payment
    /// history rather than the live ledger. negative when confirmed payments
    /// exceed the obligations.
    pub fn amount_owed(&self, group_id: GroupId, from: UserId, to: UserId) -> Result<Money> {
        self.require_member(group_id, from)?;
        self.require_member(group_id, to)?;

        let obligations = self.store.sum_shares(group_id, to, from);
        let payments = self.store.sum_transfers(group_id, from, to);
        Ok(obligations - payments)
    }

    /// audit trail collected so far
    pub fn events(&self) -> &[ExpenseEvent] {
        self.log.events()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn result_for(&self, expense: Expense) -> ExpenseResult {
        let splits = self
            .store
            .participants(expense.id)
            .into_iter()
            .map(|p| Share {
                user_id: p.user_id,
                amount: p.share_amount,
            })
            .collect();
        ExpenseResult { expense, splits }
    }

    fn require_member(&self, group_id: GroupId, user_id: UserId) -> Result<()> {
        if !self.directory.is_member(group_id, user_id) {
            return Err(LedgerError::NotAMember { group_id, user_id });
        }
        Ok(())
    }
}

fn require_unique(ids: &[UserId]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for &user_id in ids {
        if !seen.insert(user_id) {
            return Err(LedgerError::DuplicateParticipant { user_id });
        }
    }
    Ok(())
}

/// treat blank keys the same as absent ones
fn clean_key(key: Option<&str>) -> Option<String> {
    key.map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryDirectory, MemoryStore};
    use chrono::Utc;
    use hourglass_rs::TimeSource;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    const GROUP: GroupId = 1;

    fn clock() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(Utc::now()))
    }

    fn engine_with(members: &[UserId]) -> ExpenseEngine<MemoryStore, MemoryDirectory> {
        ExpenseEngine::new(MemoryStore::new(), MemoryDirectory::with_members(GROUP, members))
    }

    fn balance_map(engine: &ExpenseEngine<MemoryStore, MemoryDirectory>) -> BTreeMap<UserId, Money> {
        engine
            .ledger(GROUP)
            .into_iter()
            .map(|e| (e.user_id, e.balance))
            .collect()
    }

    fn group_sum(engine: &ExpenseEngine<MemoryStore, MemoryDirectory>) -> Money {
        engine.ledger(GROUP).into_iter().map(|e| e.balance).sum()
    }

    #[test]
    fn test_create_equal_split_updates_ledger() {
        let mut engine = engine_with(&[1, 2, 3]);
        let time = clock();

        let result = engine
            .create_expense(GROUP, ExpenseRequest::equal("dinner", dec!(30.00), 1), &time)
            .unwrap();

        assert_eq!(result.expense.amount, Money::from_major(30));
        assert_eq!(result.splits.len(), 3);

        let balances = balance_map(&engine);
        assert_eq!(balances[&1], Money::from_major(20));
        assert_eq!(balances[&2], Money::from_major(-10));
        assert_eq!(balances[&3], Money::from_major(-10));
        assert_eq!(group_sum(&engine), Money::ZERO);
    }

    #[test]
    fn test_create_trims_description() {
        let mut engine = engine_with(&[1, 2]);
        let result = engine
            .create_expense(GROUP, ExpenseRequest::equal("  taxi  ", dec!(10.00), 1), &clock())
            .unwrap();
        assert_eq!(result.expense.description, "taxi");
    }

    #[test]
    fn test_create_rejects_sub_cent_amount() {
        let mut engine = engine_with(&[1, 2]);
        let err = engine
            .create_expense(GROUP, ExpenseRequest::equal("zero", dec!(0.00), 1), &clock())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount { .. }));
    }

    #[test]
    fn test_create_rejects_non_member_payer() {
        let mut engine = engine_with(&[1, 2]);
        let err = engine
            .create_expense(GROUP, ExpenseRequest::equal("x", dec!(10.00), 99), &clock())
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotAMember { user_id: 99, .. }));
    }

    #[test]
    fn test_create_rejects_non_member_participant() {
        let mut engine = engine_with(&[1, 2]);
        let mut req = ExpenseRequest::equal("x", dec!(10.00), 1);
        req.participant_user_ids = Some(vec![1, 7]);
        let err = engine.create_expense(GROUP, req, &clock()).unwrap_err();
        assert!(matches!(err, LedgerError::NotAMember { user_id: 7, .. }));
    }

    #[test]
    fn test_create_rejects_duplicate_participants() {
        let mut engine = engine_with(&[1, 2, 3]);
        let mut req = ExpenseRequest::equal("x", dec!(10.00), 1);
        req.participant_user_ids = Some(vec![2, 3, 2]);
        let err = engine.create_expense(GROUP, req, &clock()).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateParticipant { user_id: 2 }));
    }

    #[test]
    fn test_failed_create_leaves_ledger_untouched() {
        let mut engine = engine_with(&[1, 2]);
        let mut req = ExpenseRequest::equal("x", dec!(10.00), 1);
        req.participant_user_ids = Some(vec![1, 7]);
        let _ = engine.create_expense(GROUP, req, &clock());
        assert!(engine.ledger(GROUP).is_empty());
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_idempotent_create_is_a_strict_replay() {
        let mut engine = engine_with(&[1, 2, 3]);
        let time = clock();

        let mut first_req = ExpenseRequest::equal("hotel", dec!(90.00), 1);
        first_req.idempotency_key = Some("key-1".to_string());
        let first = engine.create_expense(GROUP, first_req, &time).unwrap();

        let balances_before = balance_map(&engine);

        // same key, completely different payload: the first result comes back
        let mut replay_req = ExpenseRequest::equal("something else", dec!(500.00), 2);
        replay_req.idempotency_key = Some("key-1".to_string());
        let replay = engine.create_expense(GROUP, replay_req, &time).unwrap();

        assert_eq!(replay.expense.id, first.expense.id);
        assert_eq!(replay.expense.amount, Money::from_major(90));
        assert_eq!(balance_map(&engine), balances_before);
        assert_eq!(engine.list_expenses(GROUP).len(), 1);
        assert_eq!(engine.events().len(), 1);
    }

    #[test]
    fn test_update_amount_adjusts_by_difference() {
        let mut engine = engine_with(&[1, 2, 3]);
        let time = clock();

        let created = engine
            .create_expense(GROUP, ExpenseRequest::equal("dinner", dec!(30.00), 1), &time)
            .unwrap();
        engine
            .update_expense(
                GROUP,
                created.expense.id,
                ExpenseRequest::equal("dinner", dec!(60.00), 1),
                &time,
            )
            .unwrap();

        let balances = balance_map(&engine);
        assert_eq!(balances[&1], Money::from_major(40));
        assert_eq!(balances[&2], Money::from_major(-20));
        assert_eq!(balances[&3], Money::from_major(-20));
        assert_eq!(group_sum(&engine), Money::ZERO);
    }

    #[test]
    fn test_update_refunds_removed_participant() {
        let mut engine = engine_with(&[1, 2, 3]);
        let time = clock();

        let created = engine
            .create_expense(GROUP, ExpenseRequest::equal("dinner", dec!(30.00), 1), &time)
            .unwrap();

        let mut req = ExpenseRequest::equal("dinner", dec!(30.00), 1);
        req.participant_user_ids = Some(vec![1, 2]);
        engine.update_expense(GROUP, created.expense.id, req, &time).unwrap();

        let balances = balance_map(&engine);
        assert_eq!(balances[&3], Money::ZERO);
        assert_eq!(balances[&1], Money::from_major(15));
        assert_eq!(balances[&2], Money::from_major(-15));
        assert_eq!(group_sum(&engine), Money::ZERO);

        // the removed participant's row is gone too
        let rows = engine.store().participants(created.expense.id);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|p| p.user_id != 3));
    }

    #[test]
    fn test_update_handles_payer_change() {
        let mut engine = engine_with(&[1, 2, 3]);
        let time = clock();

        let created = engine
            .create_expense(GROUP, ExpenseRequest::equal("dinner", dec!(30.00), 1), &time)
            .unwrap();
        engine
            .update_expense(
                GROUP,
                created.expense.id,
                ExpenseRequest::equal("dinner", dec!(30.00), 2),
                &time,
            )
            .unwrap();

        let balances = balance_map(&engine);
        assert_eq!(balances[&1], Money::from_major(-10));
        assert_eq!(balances[&2], Money::from_major(20));
        assert_eq!(balances[&3], Money::from_major(-10));
        assert_eq!(group_sum(&engine), Money::ZERO);
    }

    #[test]
    fn test_update_missing_wrong_group_or_voided() {
        let mut engine = engine_with(&[1, 2]);
        let time = clock();

        let err = engine
            .update_expense(GROUP, Uuid::new_v4(), ExpenseRequest::equal("x", dec!(1.00), 1), &time)
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));

        let created = engine
            .create_expense(GROUP, ExpenseRequest::equal("x", dec!(10.00), 1), &time)
            .unwrap();

        let err = engine
            .update_expense(5, created.expense.id, ExpenseRequest::equal("x", dec!(1.00), 1), &time)
            .unwrap_err();
        assert!(matches!(err, LedgerError::CrossGroup { .. }));

        engine.void_expense(GROUP, created.expense.id, &time).unwrap();
        let err = engine
            .update_expense(GROUP, created.expense.id, ExpenseRequest::equal("x", dec!(1.00), 1), &time)
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyVoided { .. }));
    }

    #[test]
    fn test_void_reverses_all_deltas_and_is_idempotent() {
        let mut engine = engine_with(&[1, 2, 3]);
        let time = clock();

        let created = engine
            .create_expense(GROUP, ExpenseRequest::equal("dinner", dec!(30.00), 1), &time)
            .unwrap();
        engine.void_expense(GROUP, created.expense.id, &time).unwrap();

        let after_first = balance_map(&engine);
        assert!(after_first.values().all(|b| b.is_zero()));
        assert!(engine.list_expenses(GROUP).is_empty());

        // second void is a no-op, ledger and audit trail unchanged
        engine.void_expense(GROUP, created.expense.id, &time).unwrap();
        assert_eq!(balance_map(&engine), after_first);
        assert_eq!(engine.events().len(), 2); // Created + one Voided
    }

    #[test]
    fn test_list_is_newest_first_and_skips_voided() {
        let mut engine = engine_with(&[1, 2]);
        let time = clock();

        let first = engine
            .create_expense(GROUP, ExpenseRequest::equal("first", dec!(10.00), 1), &time)
            .unwrap();
        engine
            .create_expense(GROUP, ExpenseRequest::equal("second", dec!(20.00), 1), &time)
            .unwrap();
        engine
            .create_expense(GROUP, ExpenseRequest::equal("third", dec!(30.00), 1), &time)
            .unwrap();
        engine.void_expense(GROUP, first.expense.id, &time).unwrap();

        let listed = engine.list_expenses(GROUP);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].expense.description, "third");
        assert_eq!(listed[1].expense.description, "second");
    }

    #[test]
    fn test_settlements_zero_the_group() {
        let mut engine = engine_with(&[1, 2, 3]);
        let time = clock();

        engine
            .create_expense(GROUP, ExpenseRequest::equal("dinner", dec!(30.00), 1), &time)
            .unwrap();
        engine
            .create_expense(GROUP, ExpenseRequest::equal("taxi", dec!(15.00), 2), &time)
            .unwrap();

        let transfers = engine.settlements(GROUP).unwrap();
        engine.confirm_settlements(GROUP, &transfers, None, &time).unwrap();

        assert!(engine.ledger(GROUP).iter().all(|e| e.balance.is_zero()));
    }

    #[test]
    fn test_settlement_greedy_scenario() {
        let mut engine = engine_with(&[1, 2, 3]);
        let time = clock();

        // A pays 15 for B and C only: A +15, B -5, C -10
        let mut req = ExpenseRequest::equal("groceries", dec!(15.00), 1);
        req.participant_user_ids = Some(vec![2, 3]);
        req.split = SplitSpec::exact(vec![dec!(5.00), dec!(10.00)]);
        engine.create_expense(GROUP, req, &time).unwrap();

        let transfers = engine.settlements(GROUP).unwrap();
        assert_eq!(
            transfers,
            vec![
                Transfer {
                    from_user_id: 3,
                    to_user_id: 1,
                    amount: Money::from_major(10),
                },
                Transfer {
                    from_user_id: 2,
                    to_user_id: 1,
                    amount: Money::from_major(5),
                },
            ]
        );
    }

    #[test]
    fn test_confirmation_id_makes_replays_a_noop() {
        let mut engine = engine_with(&[1, 2]);
        let time = clock();

        let transfer = Transfer {
            from_user_id: 1,
            to_user_id: 2,
            amount: Money::from_major(10),
        };
        engine
            .confirm_settlements(GROUP, &[transfer], Some("conf-1"), &time)
            .unwrap();
        engine
            .confirm_settlements(GROUP, &[transfer], Some("conf-1"), &time)
            .unwrap();

        // exactly one application on the ledger and one historical record
        let balances = balance_map(&engine);
        assert_eq!(balances[&1], Money::from_major(10));
        assert_eq!(balances[&2], Money::from_major(-10));
        assert_eq!(engine.store().group_transfers(GROUP).len(), 1);
    }

    #[test]
    fn test_confirmation_validates_whole_batch_before_mutating() {
        let mut engine = engine_with(&[1, 2]);
        let time = clock();

        let good = Transfer {
            from_user_id: 1,
            to_user_id: 2,
            amount: Money::from_major(5),
        };
        let bad = Transfer {
            from_user_id: 1,
            to_user_id: 99,
            amount: Money::from_major(5),
        };
        let err = engine
            .confirm_settlements(GROUP, &[good, bad], None, &time)
            .unwrap_err();

        assert!(matches!(err, LedgerError::NotAMember { user_id: 99, .. }));
        assert!(engine.ledger(GROUP).is_empty());
        assert!(engine.store().group_transfers(GROUP).is_empty());
    }

    #[test]
    fn test_confirmation_rejects_non_positive_amount() {
        let mut engine = engine_with(&[1, 2]);
        let bad = Transfer {
            from_user_id: 1,
            to_user_id: 2,
            amount: Money::ZERO,
        };
        let err = engine
            .confirm_settlements(GROUP, &[bad], None, &clock())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount { .. }));
    }

    #[test]
    fn test_amount_owed_is_reconstructed_from_history() {
        let mut engine = engine_with(&[1, 2]);
        let time = clock();

        // user 2 pays 20.00, split equally: user 1 owes 10.00
        let created = engine
            .create_expense(GROUP, ExpenseRequest::equal("dinner", dec!(20.00), 2), &time)
            .unwrap();
        assert_eq!(engine.amount_owed(GROUP, 1, 2).unwrap(), Money::from_major(10));

        // a confirmed payment shrinks the historical obligation
        let partial = Transfer {
            from_user_id: 1,
            to_user_id: 2,
            amount: Money::from_major(4),
        };
        engine.confirm_settlements(GROUP, &[partial], None, &time).unwrap();
        assert_eq!(engine.amount_owed(GROUP, 1, 2).unwrap(), Money::from_major(6));

        // voiding the expense removes the obligation; the payment stands
        engine.void_expense(GROUP, created.expense.id, &time).unwrap();
        assert_eq!(engine.amount_owed(GROUP, 1, 2).unwrap(), Money::from_major(-4));
    }

    #[test]
    fn test_amount_owed_requires_membership() {
        let engine = engine_with(&[1, 2]);
        let err = engine.amount_owed(GROUP, 1, 99).unwrap_err();
        assert!(matches!(err, LedgerError::NotAMember { user_id: 99, .. }));
    }

    #[test]
    fn test_event_payload_shapes() {
        let mut engine = engine_with(&[1, 2]);
        let time = clock();

        let created = engine
            .create_expense(GROUP, ExpenseRequest::equal("dinner", dec!(20.00), 1), &time)
            .unwrap();
        engine
            .update_expense(
                GROUP,
                created.expense.id,
                ExpenseRequest::equal("dinner", dec!(24.00), 1),
                &time,
            )
            .unwrap();
        engine.void_expense(GROUP, created.expense.id, &time).unwrap();

        let events = engine.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, ExpenseEventKind::Created);
        assert_eq!(events[0].payload["amount"], "20.00");
        assert_eq!(events[1].kind, ExpenseEventKind::Updated);
        assert_eq!(events[1].payload["before"]["amount"], "20.00");
        assert_eq!(events[1].payload["after"]["amount"], "24.00");
        assert_eq!(events[2].kind, ExpenseEventKind::Voided);
    }

    proptest! {
        /// conservation law: whatever sequence of expenses is created, the
        /// group's balances always sum to zero and settle cleanly
        #[test]
        fn prop_group_balances_always_sum_to_zero(
            expenses in prop::collection::vec((1i64..=4, 1i64..100_000), 1..25),
        ) {
            let mut engine = engine_with(&[1, 2, 3, 4]);
            let time = clock();

            for (payer, cents) in expenses {
                let amount = Money::from_minor(cents).as_decimal();
                engine
                    .create_expense(GROUP, ExpenseRequest::equal("e", amount, payer), &time)
                    .unwrap();
            }

            let sum: Money = engine.ledger(GROUP).into_iter().map(|e| e.balance).sum();
            prop_assert_eq!(sum, Money::ZERO);

            let transfers = engine.settlements(GROUP).unwrap();
            engine.confirm_settlements(GROUP, &transfers, None, &time).unwrap();
            prop_assert!(engine.ledger(GROUP).iter().all(|e| e.balance.is_zero()));
        }
    }
}
