use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Cents, OpeningBalance, VehicleId};

/// Position of a record in ledger order: `(date, sequence)` ascending.
/// The sequence is the repository-assigned insertion counter, so two
/// records on the same date keep the order in which they were entered.
pub type LedgerKey = (NaiveDate, i64);

/// A financial record that participates in a running-balance chain.
pub trait LedgerEntry {
    fn ledger_key(&self) -> LedgerKey;
    fn amount_in(&self) -> Cents;
    fn amount_out(&self) -> Cents;
    fn running_balance(&self) -> Cents;
    fn set_running_balance(&mut self, balance: Cents);

    /// Net effect of this record on the balance.
    fn net(&self) -> Cents {
        self.amount_in() - self.amount_out()
    }
}

/// Assign a running balance to every record, starting from `opening`.
///
/// Records must already be in ledger order; this never re-sorts.
/// Returns the closing balance (or `opening` for an empty slice).
pub fn compute_ledger<R: LedgerEntry>(opening: Cents, records: &mut [R]) -> Cents {
    debug_assert!(is_ordered(records), "ledger records must be sorted by (date, sequence)");

    let mut balance = opening;
    for record in records.iter_mut() {
        balance = balance + record.amount_in() - record.amount_out();
        record.set_running_balance(balance);
    }
    balance
}

/// Re-chain `records[start..]`, seeding from the record just before `start`
/// or from `base` when `start` is the first position.
///
/// Any insert, edit or delete must call this from the first affected
/// position, otherwise every later balance goes stale.
pub fn recompute_from<R: LedgerEntry>(records: &mut [R], start: usize, base: Cents) -> Cents {
    let start = start.min(records.len());
    let seed = match start {
        0 => base,
        n => records[n - 1].running_balance(),
    };
    compute_ledger(seed, &mut records[start..])
}

/// Index of the first record whose key is not less than `key`.
pub fn first_affected<R: LedgerEntry>(records: &[R], key: LedgerKey) -> usize {
    records.partition_point(|r| r.ledger_key() < key)
}

fn is_ordered<R: LedgerEntry>(records: &[R]) -> bool {
    records
        .windows(2)
        .all(|pair| pair[0].ledger_key() <= pair[1].ledger_key())
}

/// Where a resolved opening balance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpeningBalanceSource {
    /// A row for exactly the requested year.
    Exact,
    /// The most recent row for an earlier year.
    PriorYear,
    /// A row without a year, from before balances were kept per year.
    Legacy,
    /// Nothing recorded; the balance is zero.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOpeningBalance {
    pub amount: Cents,
    /// Year of the row that was used, if it had one.
    pub year: Option<i32>,
    pub source: OpeningBalanceSource,
}

/// Pick the opening balance that applies to `vehicle_id` in `year`.
///
/// Exact year first, then the latest earlier year, then a legacy row
/// without a year, then zero. Rows for other vehicles are ignored.
pub fn resolve_opening_balance(
    balances: &[OpeningBalance],
    vehicle_id: VehicleId,
    year: i32,
) -> ResolvedOpeningBalance {
    let for_vehicle = || balances.iter().filter(|b| b.vehicle_id == vehicle_id);

    if let Some(exact) = for_vehicle().find(|b| b.year == Some(year)) {
        return ResolvedOpeningBalance {
            amount: exact.amount,
            year: exact.year,
            source: OpeningBalanceSource::Exact,
        };
    }

    let prior = for_vehicle()
        .filter(|b| matches!(b.year, Some(y) if y < year))
        .max_by_key(|b| b.year);
    if let Some(prior) = prior {
        return ResolvedOpeningBalance {
            amount: prior.amount,
            year: prior.year,
            source: OpeningBalanceSource::PriorYear,
        };
    }

    if let Some(legacy) = for_vehicle().find(|b| b.year.is_none()) {
        return ResolvedOpeningBalance {
            amount: legacy.amount,
            year: None,
            source: OpeningBalanceSource::Legacy,
        };
    }

    ResolvedOpeningBalance {
        amount: 0,
        year: None,
        source: OpeningBalanceSource::Default,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    #[derive(Debug, Clone)]
    struct Row {
        date: NaiveDate,
        seq: i64,
        income: Cents,
        expense: Cents,
        balance: Cents,
    }

    impl LedgerEntry for Row {
        fn ledger_key(&self) -> LedgerKey {
            (self.date, self.seq)
        }
        fn amount_in(&self) -> Cents {
            self.income
        }
        fn amount_out(&self) -> Cents {
            self.expense
        }
        fn running_balance(&self) -> Cents {
            self.balance
        }
        fn set_running_balance(&mut self, balance: Cents) {
            self.balance = balance;
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn row(d: u32, seq: i64, income: Cents, expense: Cents) -> Row {
        Row {
            date: day(d),
            seq,
            income,
            expense,
            balance: 0,
        }
    }

    fn balances(rows: &[Row]) -> Vec<Cents> {
        rows.iter().map(|r| r.balance).collect()
    }

    #[test]
    fn test_compute_ledger_empty_returns_opening() {
        let mut rows: Vec<Row> = Vec::new();
        assert_eq!(compute_ledger(1000, &mut rows), 1000);
    }

    #[test]
    fn test_compute_ledger_scenario() {
        let mut rows = vec![row(1, 1, 5000, 1000), row(2, 2, 0, 200)];
        let closing = compute_ledger(1000, &mut rows);

        assert_eq!(balances(&rows), vec![5000, 4800]);
        assert_eq!(closing, 4800);
    }

    #[test]
    fn test_delete_first_then_recompute() {
        let mut rows = vec![row(1, 1, 5000, 1000), row(2, 2, 0, 200)];
        compute_ledger(1000, &mut rows);

        rows.remove(0);
        recompute_from(&mut rows, 0, 1000);

        assert_eq!(balances(&rows), vec![800]);
    }

    #[test]
    fn test_running_balance_equals_prefix_sums() {
        let mut rows = vec![
            row(1, 1, 300, 50),
            row(1, 2, 0, 75),
            row(3, 3, 1200, 0),
            row(4, 4, 10, 400),
            row(9, 5, 0, 0),
        ];
        compute_ledger(250, &mut rows);

        let mut expected = 250;
        for r in &rows {
            expected += r.income - r.expense;
            assert_eq!(r.balance, expected);
        }
    }

    #[test]
    fn test_delete_middle_shifts_later_by_its_net() {
        let mut rows = vec![
            row(1, 1, 1000, 0),
            row(2, 2, 400, 100),
            row(3, 3, 0, 250),
            row(4, 4, 50, 0),
        ];
        compute_ledger(0, &mut rows);
        let before = balances(&rows);

        let removed = rows.remove(1);
        let start = first_affected(&rows, removed.ledger_key());
        assert_eq!(start, 1);
        recompute_from(&mut rows, start, 0);

        assert_eq!(rows[0].balance, before[0]);
        assert_eq!(rows[1].balance, before[2] - removed.net());
        assert_eq!(rows[2].balance, before[3] - removed.net());
    }

    #[test]
    fn test_edit_amount_shifts_later_by_difference() {
        let mut rows = vec![
            row(1, 1, 1000, 0),
            row(2, 2, 0, 300),
            row(3, 3, 200, 0),
            row(5, 4, 0, 10),
        ];
        compute_ledger(0, &mut rows);
        let before = balances(&rows);

        rows[1].expense = 500;
        recompute_from(&mut rows, 1, 0);

        assert_eq!(rows[0].balance, before[0]);
        for i in 1..rows.len() {
            assert_eq!(rows[i].balance, before[i] - 200);
        }
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut a = vec![row(1, 3, 10, 0), row(1, 7, 0, 4), row(2, 1, 5, 0)];
        let mut b = vec![row(2, 1, 5, 0), row(1, 7, 0, 4), row(1, 3, 10, 0)];
        b.sort_by_key(|r| r.ledger_key());

        compute_ledger(100, &mut a);
        compute_ledger(100, &mut b);
        assert_eq!(balances(&a), balances(&b));
    }

    #[test]
    fn test_recompute_from_past_end_is_noop() {
        let mut rows = vec![row(1, 1, 10, 0)];
        compute_ledger(0, &mut rows);
        assert_eq!(recompute_from(&mut rows, 5, 0), 10);
        assert_eq!(rows[0].balance, 10);
    }

    #[test]
    fn test_first_affected_uses_sequence_as_tiebreak() {
        let rows = vec![row(1, 1, 0, 0), row(1, 4, 0, 0), row(2, 2, 0, 0)];
        assert_eq!(first_affected(&rows, (day(1), 3)), 1);
        assert_eq!(first_affected(&rows, (day(1), 5)), 2);
        assert_eq!(first_affected(&rows, (day(3), 0)), 3);
    }

    fn opening(vehicle_id: VehicleId, year: Option<i32>, amount: Cents) -> OpeningBalance {
        OpeningBalance {
            id: Uuid::new_v4(),
            vehicle_id,
            year,
            amount,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_exact_year() {
        let v = Uuid::new_v4();
        let rows = vec![opening(v, Some(2024), 100), opening(v, Some(2025), 200)];
        let resolved = resolve_opening_balance(&rows, v, 2025);
        assert_eq!(resolved.amount, 200);
        assert_eq!(resolved.source, OpeningBalanceSource::Exact);
    }

    #[test]
    fn test_resolve_most_recent_prior_year() {
        let v = Uuid::new_v4();
        let rows = vec![
            opening(v, Some(2021), 100),
            opening(v, Some(2023), 300),
            opening(v, Some(2027), 900),
            opening(v, None, 50),
        ];
        let resolved = resolve_opening_balance(&rows, v, 2025);
        assert_eq!(resolved.amount, 300);
        assert_eq!(resolved.year, Some(2023));
        assert_eq!(resolved.source, OpeningBalanceSource::PriorYear);
    }

    #[test]
    fn test_resolve_legacy_then_default() {
        let v = Uuid::new_v4();
        let other = Uuid::new_v4();
        let rows = vec![opening(v, None, 50), opening(other, Some(2020), 999)];

        let resolved = resolve_opening_balance(&rows, v, 2020);
        assert_eq!(resolved.amount, 50);
        assert_eq!(resolved.source, OpeningBalanceSource::Legacy);

        let resolved = resolve_opening_balance(&rows[1..], v, 2020);
        assert_eq!(resolved.amount, 0);
        assert_eq!(resolved.source, OpeningBalanceSource::Default);
    }
}
