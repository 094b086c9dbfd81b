use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, LedgerEntry, LedgerKey, UserId};

pub type CashEntryId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Income,
    Expense,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Income => "income",
            EntryType::Expense => "expense",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Some(EntryType::Income),
            "expense" => Some(EntryType::Expense),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One line of the admin's personal cash book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashEntry {
    pub id: CashEntryId,
    pub sequence: i64,
    pub date: NaiveDate,
    pub description: String,
    pub entry_type: EntryType,
    /// Always non-negative; the direction comes from `entry_type`.
    pub amount: Cents,
    pub running_balance: Cents,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CashEntry {
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        entry_type: EntryType,
        amount: Cents,
        created_by: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            date,
            description: description.into().trim().to_string(),
            entry_type,
            amount,
            running_balance: 0,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

impl LedgerEntry for CashEntry {
    fn ledger_key(&self) -> LedgerKey {
        (self.date, self.sequence)
    }

    fn amount_in(&self) -> Cents {
        match self.entry_type {
            EntryType::Income => self.amount,
            EntryType::Expense => 0,
        }
    }

    fn amount_out(&self) -> Cents {
        match self.entry_type {
            EntryType::Income => 0,
            EntryType::Expense => self.amount,
        }
    }

    fn running_balance(&self) -> Cents {
        self.running_balance
    }

    fn set_running_balance(&mut self, balance: Cents) {
        self.running_balance = balance;
    }
}
