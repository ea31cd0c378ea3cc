use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ExpenseId, GroupId};

/// audit event kinds for the expense lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseEventKind {
    Created,
    Updated,
    Voided,
}

/// append-only audit record; never read back into business logic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseEvent {
    pub group_id: GroupId,
    pub expense_id: ExpenseId,
    pub kind: ExpenseEventKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// event log for collecting audit records during operations
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<ExpenseEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn append(&mut self, event: ExpenseEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[ExpenseEvent] {
        &self.events
    }

    pub fn for_group(&self, group_id: GroupId) -> impl Iterator<Item = &ExpenseEvent> {
        self.events.iter().filter(move |e| e.group_id == group_id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
