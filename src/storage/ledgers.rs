use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteExecutor};

use crate::domain::{
    CashEntry, CashEntryId, Cents, EntryType, OpeningBalance, Trip, TripExpenses, TripId,
    VehicleId,
};

use super::repository::{format_date, parse_date, parse_timestamp, parse_uuid, Repository};

/// Totals for one vehicle in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySummaryRow {
    pub month: String,
    pub vehicle_id: VehicleId,
    pub vehicle_no: String,
    pub total_income: Cents,
    pub total_expenses: Cents,
    pub trip_count: i64,
    pub profit: Cents,
}

const TRIP_COLUMNS: &str = r#"
    id, sequence, trip_date, month, vehicle_id, driver_id, trip_route, income,
    fuel, fasttag, driver_allowance, service, bank_deposit, other_expense,
    total_expenses, notes, running_balance, created_at, updated_at
"#;

const CASH_ENTRY_COLUMNS: &str = r#"
    id, sequence, date, description, entry_type, amount, running_balance,
    created_by, created_at, updated_at
"#;

impl Repository {
    // ========================
    // Trip operations
    // ========================

    /// Insert a trip. The caller assigns `sequence` first.
    pub async fn insert_trip<'e, E>(&self, executor: E, trip: &Trip) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO trips (id, sequence, trip_date, month, vehicle_id, driver_id, trip_route,
                income, fuel, fasttag, driver_allowance, service, bank_deposit, other_expense,
                total_expenses, notes, running_balance, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trip.id.to_string())
        .bind(trip.sequence)
        .bind(format_date(trip.trip_date))
        .bind(&trip.month)
        .bind(trip.vehicle_id.to_string())
        .bind(trip.driver_id.to_string())
        .bind(&trip.trip_route)
        .bind(trip.income)
        .bind(trip.expenses.fuel)
        .bind(trip.expenses.fasttag)
        .bind(trip.expenses.driver_allowance)
        .bind(trip.expenses.service)
        .bind(trip.expenses.bank_deposit)
        .bind(trip.expenses.other_expense)
        .bind(trip.total_expenses)
        .bind(&trip.notes)
        .bind(trip.running_balance)
        .bind(trip.created_at.to_rfc3339())
        .bind(trip.updated_at.to_rfc3339())
        .execute(executor)
        .await
        .context("Failed to save trip")?;
        Ok(())
    }

    /// Overwrite every editable column of a trip. `sequence` never changes.
    pub async fn update_trip<'e, E>(&self, executor: E, trip: &Trip) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            UPDATE trips
            SET trip_date = ?, month = ?, vehicle_id = ?, driver_id = ?, trip_route = ?,
                income = ?, fuel = ?, fasttag = ?, driver_allowance = ?, service = ?,
                bank_deposit = ?, other_expense = ?, total_expenses = ?, notes = ?,
                running_balance = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(format_date(trip.trip_date))
        .bind(&trip.month)
        .bind(trip.vehicle_id.to_string())
        .bind(trip.driver_id.to_string())
        .bind(&trip.trip_route)
        .bind(trip.income)
        .bind(trip.expenses.fuel)
        .bind(trip.expenses.fasttag)
        .bind(trip.expenses.driver_allowance)
        .bind(trip.expenses.service)
        .bind(trip.expenses.bank_deposit)
        .bind(trip.expenses.other_expense)
        .bind(trip.total_expenses)
        .bind(&trip.notes)
        .bind(trip.running_balance)
        .bind(trip.updated_at.to_rfc3339())
        .bind(trip.id.to_string())
        .execute(executor)
        .await
        .context("Failed to update trip")?;
        Ok(())
    }

    pub async fn update_trip_balance<'e, E>(&self, executor: E, id: TripId, balance: Cents) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query("UPDATE trips SET running_balance = ? WHERE id = ?")
            .bind(balance)
            .bind(id.to_string())
            .execute(executor)
            .await
            .context("Failed to update trip balance")?;
        Ok(())
    }

    pub async fn delete_trip<'e, E>(&self, executor: E, id: TripId) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query("DELETE FROM trips WHERE id = ?")
            .bind(id.to_string())
            .execute(executor)
            .await
            .context("Failed to delete trip")?;
        Ok(())
    }

    pub async fn get_trip<'e, E>(&self, executor: E, id: TripId) -> Result<Option<Trip>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!("SELECT {} FROM trips WHERE id = ?", TRIP_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(executor)
            .await
            .context("Failed to fetch trip")?;

        row.as_ref().map(Self::row_to_trip).transpose()
    }

    /// Every trip of a vehicle in ledger order.
    pub async fn list_vehicle_trips<'e, E>(&self, executor: E, vehicle_id: VehicleId) -> Result<Vec<Trip>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!(
            "SELECT {} FROM trips WHERE vehicle_id = ? ORDER BY trip_date ASC, sequence ASC",
            TRIP_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(vehicle_id.to_string())
            .fetch_all(executor)
            .await
            .context("Failed to list trips")?;

        rows.iter().map(Self::row_to_trip).collect()
    }

    pub async fn count_vehicle_trips(&self, vehicle_id: VehicleId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM trips WHERE vehicle_id = ?")
            .bind(vehicle_id.to_string())
            .fetch_one(self.pool())
            .await
            .context("Failed to count trips")?;
        Ok(row.get("count"))
    }

    fn row_to_trip(row: &sqlx::sqlite::SqliteRow) -> Result<Trip> {
        let id: String = row.get("id");
        let trip_date: String = row.get("trip_date");
        let vehicle_id: String = row.get("vehicle_id");
        let driver_id: String = row.get("driver_id");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        Ok(Trip {
            id: parse_uuid(&id, "trip ID")?,
            sequence: row.get("sequence"),
            trip_date: parse_date(&trip_date)?,
            month: row.get("month"),
            vehicle_id: parse_uuid(&vehicle_id, "vehicle ID")?,
            driver_id: parse_uuid(&driver_id, "driver ID")?,
            trip_route: row.get("trip_route"),
            income: row.get("income"),
            expenses: TripExpenses {
                fuel: row.get("fuel"),
                fasttag: row.get("fasttag"),
                driver_allowance: row.get("driver_allowance"),
                service: row.get("service"),
                bank_deposit: row.get("bank_deposit"),
                other_expense: row.get("other_expense"),
            },
            total_expenses: row.get("total_expenses"),
            notes: row.get("notes"),
            running_balance: row.get("running_balance"),
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    // ========================
    // Opening balance operations
    // ========================

    /// Find the row for `(vehicle_id, year)`; `year = None` finds a legacy row.
    pub async fn find_opening_balance(
        &self,
        vehicle_id: VehicleId,
        year: Option<i32>,
    ) -> Result<Option<OpeningBalance>> {
        let row = sqlx::query(
            r#"
            SELECT id, vehicle_id, year, amount, created_at, updated_at
            FROM opening_balances
            WHERE vehicle_id = ? AND year IS ?
            "#,
        )
        .bind(vehicle_id.to_string())
        .bind(year)
        .fetch_optional(self.pool())
        .await
        .context("Failed to fetch opening balance")?;

        row.as_ref().map(Self::row_to_opening_balance).transpose()
    }

    /// Insert or update the balance for `(vehicle_id, year)`.
    pub async fn upsert_opening_balance(&self, balance: &OpeningBalance) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO opening_balances (id, vehicle_id, year, amount, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (vehicle_id, year) DO UPDATE
            SET amount = excluded.amount, updated_at = excluded.updated_at
            "#,
        )
        .bind(balance.id.to_string())
        .bind(balance.vehicle_id.to_string())
        .bind(balance.year)
        .bind(balance.amount)
        .bind(balance.created_at.to_rfc3339())
        .bind(balance.updated_at.to_rfc3339())
        .execute(self.pool())
        .await
        .context("Failed to save opening balance")?;
        Ok(())
    }

    /// Opening balances, optionally narrowed to one vehicle and/or year.
    pub async fn list_opening_balances(
        &self,
        vehicle_id: Option<VehicleId>,
        year: Option<i32>,
    ) -> Result<Vec<OpeningBalance>> {
        let rows = sqlx::query(
            r#"
            SELECT id, vehicle_id, year, amount, created_at, updated_at
            FROM opening_balances
            WHERE (?1 IS NULL OR vehicle_id = ?1)
              AND (?2 IS NULL OR year = ?2)
            ORDER BY vehicle_id, year
            "#,
        )
        .bind(vehicle_id.map(|id| id.to_string()))
        .bind(year)
        .fetch_all(self.pool())
        .await
        .context("Failed to list opening balances")?;

        rows.iter().map(Self::row_to_opening_balance).collect()
    }

    fn row_to_opening_balance(row: &sqlx::sqlite::SqliteRow) -> Result<OpeningBalance> {
        let id: String = row.get("id");
        let vehicle_id: String = row.get("vehicle_id");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        Ok(OpeningBalance {
            id: parse_uuid(&id, "opening balance ID")?,
            vehicle_id: parse_uuid(&vehicle_id, "vehicle ID")?,
            year: row.get("year"),
            amount: row.get("amount"),
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    // ========================
    // Cash entry operations
    // ========================

    pub async fn insert_cash_entry<'e, E>(&self, executor: E, entry: &CashEntry) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO cash_entries (id, sequence, date, description, entry_type, amount,
                running_balance, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.sequence)
        .bind(format_date(entry.date))
        .bind(&entry.description)
        .bind(entry.entry_type.as_str())
        .bind(entry.amount)
        .bind(entry.running_balance)
        .bind(entry.created_by.to_string())
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.updated_at.to_rfc3339())
        .execute(executor)
        .await
        .context("Failed to save cash entry")?;
        Ok(())
    }

    pub async fn update_cash_entry<'e, E>(&self, executor: E, entry: &CashEntry) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            UPDATE cash_entries
            SET date = ?, description = ?, entry_type = ?, amount = ?,
                running_balance = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(format_date(entry.date))
        .bind(&entry.description)
        .bind(entry.entry_type.as_str())
        .bind(entry.amount)
        .bind(entry.running_balance)
        .bind(entry.updated_at.to_rfc3339())
        .bind(entry.id.to_string())
        .execute(executor)
        .await
        .context("Failed to update cash entry")?;
        Ok(())
    }

    pub async fn update_cash_entry_balance<'e, E>(
        &self,
        executor: E,
        id: CashEntryId,
        balance: Cents,
    ) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query("UPDATE cash_entries SET running_balance = ? WHERE id = ?")
            .bind(balance)
            .bind(id.to_string())
            .execute(executor)
            .await
            .context("Failed to update cash entry balance")?;
        Ok(())
    }

    pub async fn delete_cash_entry<'e, E>(&self, executor: E, id: CashEntryId) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query("DELETE FROM cash_entries WHERE id = ?")
            .bind(id.to_string())
            .execute(executor)
            .await
            .context("Failed to delete cash entry")?;
        Ok(())
    }

    pub async fn get_cash_entry<'e, E>(&self, executor: E, id: CashEntryId) -> Result<Option<CashEntry>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!("SELECT {} FROM cash_entries WHERE id = ?", CASH_ENTRY_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(executor)
            .await
            .context("Failed to fetch cash entry")?;

        row.as_ref().map(Self::row_to_cash_entry).transpose()
    }

    /// Cash entries in ledger order, optionally within an inclusive date range.
    pub async fn list_cash_entries<'e, E>(
        &self,
        executor: E,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<CashEntry>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!(
            r#"
            SELECT {}
            FROM cash_entries
            WHERE (?1 IS NULL OR date >= ?1)
              AND (?2 IS NULL OR date <= ?2)
            ORDER BY date ASC, sequence ASC
            "#,
            CASH_ENTRY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(start_date.map(format_date))
            .bind(end_date.map(format_date))
            .fetch_all(executor)
            .await
            .context("Failed to list cash entries")?;

        rows.iter().map(Self::row_to_cash_entry).collect()
    }

    fn row_to_cash_entry(row: &sqlx::sqlite::SqliteRow) -> Result<CashEntry> {
        let id: String = row.get("id");
        let date: String = row.get("date");
        let entry_type: String = row.get("entry_type");
        let created_by: String = row.get("created_by");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        Ok(CashEntry {
            id: parse_uuid(&id, "cash entry ID")?,
            sequence: row.get("sequence"),
            date: parse_date(&date)?,
            description: row.get("description"),
            entry_type: EntryType::from_str(&entry_type)
                .ok_or_else(|| anyhow::anyhow!("Invalid entry type: {}", entry_type))?,
            amount: row.get("amount"),
            running_balance: row.get("running_balance"),
            created_by: parse_uuid(&created_by, "user ID")?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    // ========================
    // Summary operations
    // ========================

    /// Per `(month, vehicle)` totals, newest month first.
    pub async fn monthly_summary(&self, month: Option<&str>) -> Result<Vec<MonthlySummaryRow>> {
        let rows = sqlx::query(
            r#"
            SELECT t.month AS month,
                   t.vehicle_id AS vehicle_id,
                   v.vehicle_no AS vehicle_no,
                   COALESCE(SUM(t.income), 0) AS total_income,
                   COALESCE(SUM(t.total_expenses), 0) AS total_expenses,
                   COUNT(*) AS trip_count
            FROM trips t
            JOIN vehicles v ON v.id = t.vehicle_id
            WHERE (?1 IS NULL OR t.month = ?1)
            GROUP BY t.month, t.vehicle_id, v.vehicle_no
            ORDER BY t.month DESC, v.vehicle_no ASC
            "#,
        )
        .bind(month)
        .fetch_all(self.pool())
        .await
        .context("Failed to compute monthly summary")?;

        rows.iter()
            .map(|row| {
                let vehicle_id: String = row.get("vehicle_id");
                let total_income: i64 = row.get("total_income");
                let total_expenses: i64 = row.get("total_expenses");
                Ok(MonthlySummaryRow {
                    month: row.get("month"),
                    vehicle_id: parse_uuid(&vehicle_id, "vehicle ID")?,
                    vehicle_no: row.get("vehicle_no"),
                    total_income,
                    total_expenses,
                    trip_count: row.get("trip_count"),
                    profit: total_income - total_expenses,
                })
            })
            .collect()
    }

    /// Months that have at least one trip, newest first.
    pub async fn available_months(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT month FROM trips ORDER BY month DESC")
            .fetch_all(self.pool())
            .await
            .context("Failed to list months")?;
        Ok(rows.iter().map(|row| row.get("month")).collect())
    }
}
