use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{ExpenseId, GroupId, UserId};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid amount: {amount}")]
    InvalidAmount {
        amount: Decimal,
    },

    #[error("bad split: {message}")]
    BadSplit {
        message: String,
    },

    #[error("duplicate participant: {user_id}")]
    DuplicateParticipant {
        user_id: UserId,
    },

    #[error("user {user_id} is not a member of group {group_id}")]
    NotAMember {
        group_id: GroupId,
        user_id: UserId,
    },

    #[error("expense not found: {expense_id}")]
    NotFound {
        expense_id: ExpenseId,
    },

    #[error("expense {expense_id} does not belong to group {group_id}")]
    CrossGroup {
        expense_id: ExpenseId,
        group_id: GroupId,
    },

    #[error("expense already voided: {expense_id}")]
    AlreadyVoided {
        expense_id: ExpenseId,
    },

    #[error("ledger for group {group_id} does not balance: sum is {sum}")]
    UnbalancedLedger {
        group_id: GroupId,
        sum: Decimal,
    },
}

impl LedgerError {
    pub fn bad_split(message: impl Into<String>) -> Self {
        LedgerError::BadSplit {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
