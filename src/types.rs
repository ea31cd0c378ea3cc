use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;

/// group identifier, assigned by the surrounding identity layer
pub type GroupId = i64;

/// user identifier, assigned by the surrounding identity layer
pub type UserId = i64;

/// unique identifier for an expense
pub type ExpenseId = Uuid;

/// per-group, per-user running net balance.
/// positive: the group owes this user; negative: this user owes the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub user_id: UserId,
    pub balance: Money,
}

/// one participant's cut of an expense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub user_id: UserId,
    pub amount: Money,
}

/// a debtor-to-creditor payment, either proposed by the settlement
/// calculator or asserted by the caller for confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount: Money,
}

/// a shared expense paid by one member on behalf of its participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub group_id: GroupId,
    pub payer_user_id: UserId,
    pub description: String,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
    pub voided: bool,
}

/// (expense, user) share row; the shares of one expense sum to its amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseParticipant {
    pub expense_id: ExpenseId,
    pub user_id: UserId,
    pub share_amount: Money,
}

/// historical record of a confirmed debtor-to-creditor payment.
/// immutable once written; a fact, not a balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedTransfer {
    pub id: Uuid,
    pub group_id: GroupId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount: Money,
    pub confirmation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// an expense together with its computed splits, in participant order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseResult {
    pub expense: Expense,
    pub splits: Vec<Share>,
}
