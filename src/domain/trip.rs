use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, LedgerEntry, LedgerKey, UserId, VehicleId};

pub type TripId = Uuid;

/// The six expense heads a driver records against a trip.
/// Missing heads count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripExpenses {
    pub fuel: Cents,
    pub fasttag: Cents,
    pub driver_allowance: Cents,
    pub service: Cents,
    /// Cash handed in to the company bank account.
    pub bank_deposit: Cents,
    pub other_expense: Cents,
}

impl TripExpenses {
    pub fn total(&self) -> Cents {
        self.heads().iter().map(|(_, v)| v).sum()
    }

    pub fn heads(&self) -> [(&'static str, Cents); 6] {
        [
            ("fuel", self.fuel),
            ("fasttag", self.fasttag),
            ("driver_allowance", self.driver_allowance),
            ("service", self.service),
            ("bank_deposit", self.bank_deposit),
            ("other_expense", self.other_expense),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    /// Insertion counter, the same-day tiebreak in ledger order.
    pub sequence: i64,
    pub trip_date: NaiveDate,
    /// `YYYY-MM`, derived from `trip_date`.
    pub month: String,
    pub vehicle_id: VehicleId,
    pub driver_id: UserId,
    pub trip_route: String,
    pub income: Cents,
    #[serde(flatten)]
    pub expenses: TripExpenses,
    /// Derived sum of `expenses`.
    pub total_expenses: Cents,
    pub notes: Option<String>,
    pub running_balance: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// Sequence and running balance are assigned when the trip is stored.
    pub fn new(
        vehicle_id: VehicleId,
        driver_id: UserId,
        trip_date: NaiveDate,
        trip_route: impl Into<String>,
        income: Cents,
        expenses: TripExpenses,
    ) -> Self {
        let now = Utc::now();
        let mut trip = Self {
            id: Uuid::new_v4(),
            sequence: 0,
            trip_date,
            month: String::new(),
            vehicle_id,
            driver_id,
            trip_route: trip_route.into().trim().to_string(),
            income,
            expenses,
            total_expenses: 0,
            notes: None,
            running_balance: 0,
            created_at: now,
            updated_at: now,
        };
        trip.refresh_derived();
        trip
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Recompute `month` and `total_expenses` after any field change.
    pub fn refresh_derived(&mut self) {
        self.month = month_key(self.trip_date);
        self.total_expenses = self.expenses.total();
    }

    pub fn year(&self) -> i32 {
        self.trip_date.year()
    }
}

impl LedgerEntry for Trip {
    fn ledger_key(&self) -> LedgerKey {
        (self.trip_date, self.sequence)
    }

    fn amount_in(&self) -> Cents {
        self.income
    }

    fn amount_out(&self) -> Cents {
        self.total_expenses
    }

    fn running_balance(&self) -> Cents {
        self.running_balance
    }

    fn set_running_balance(&mut self, balance: Cents) {
        self.running_balance = balance;
    }
}

/// `2025-01-31` -> `"2025-01"`
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Accepts only `YYYY-MM` with a real month number.
pub fn is_valid_month_key(s: &str) -> bool {
    let Some((y, m)) = s.split_once('-') else {
        return false;
    };
    y.len() == 4
        && m.len() == 2
        && y.chars().all(|c| c.is_ascii_digit())
        && matches!(m.parse::<u32>(), Ok(1..=12))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_fields() {
        let expenses = TripExpenses {
            fuel: 1000,
            fasttag: 200,
            driver_allowance: 300,
            service: 0,
            bank_deposit: 2500,
            other_expense: 50,
        };
        let trip = Trip::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            " Kannur - Mysuru ",
            9000,
            expenses,
        );

        assert_eq!(trip.month, "2025-03");
        assert_eq!(trip.total_expenses, 4050);
        assert_eq!(trip.trip_route, "Kannur - Mysuru");
        assert_eq!(trip.net(), 4950);
    }

    #[test]
    fn test_missing_expense_heads_default_to_zero() {
        let expenses: TripExpenses = serde_json::from_str(r#"{"fuel": 700}"#).unwrap();
        assert_eq!(expenses.total(), 700);
    }

    #[test]
    fn test_month_key_validation() {
        assert!(is_valid_month_key("2025-01"));
        assert!(!is_valid_month_key("2025-13"));
        assert!(!is_valid_month_key("25-01"));
        assert!(!is_valid_month_key("2025/01"));
    }
}
