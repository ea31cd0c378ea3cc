pub mod config;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod events;
pub mod settlement;
pub mod split;
pub mod store;
pub mod types;

// re-export key types
pub use config::EngineConfig;
pub use decimal::{Money, CURRENCY_SCALE};
pub use engine::{ExpenseEngine, ExpenseRequest};
pub use errors::{LedgerError, Result};
pub use events::{EventLog, ExpenseEvent, ExpenseEventKind};
pub use settlement::simplify;
pub use split::{compute_shares, SplitSpec};
pub use store::{
    ExpenseStore, LedgerStore, MembershipDirectory, MemoryDirectory, MemoryStore, TransferStore,
};
pub use types::{
    ConfirmedTransfer, Expense, ExpenseId, ExpenseParticipant, ExpenseResult, GroupId,
    LedgerEntry, Share, Transfer, UserId,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
