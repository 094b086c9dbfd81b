use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqliteExecutor, Transaction};
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    amount_problem, first_affected, format_cents, is_valid_month_key, recompute_from,
    resolve_opening_balance, Actor, CashEntry, CashEntryId, Cents, EntryType, LedgerEntry,
    LedgerKey, OpeningBalance, OpeningBalanceSource, Trip, TripExpenses, TripId, UserId, Vehicle,
    VehicleId, MAX_AMOUNT,
};
use crate::storage::{MonthlySummaryRow, Repository, SequenceCounter};

use super::{AppError, LockKey, OwnerLocks};

/// Every vehicle ledger is chained from zero over the vehicle's full trip
/// history; the opening balance for a year is reported beside it.
pub const VEHICLE_LEDGER_BASE: Cents = 0;

/// The admin cash book starts from zero.
pub const CASH_LEDGER_BASE: Cents = 0;

/// Application service providing the fleet use cases.
/// This is the primary interface for every client (CLI, HTTP API).
///
/// Cloning is cheap; clones share the connection pool and the owner locks.
#[derive(Clone)]
pub struct FleetService {
    pub(super) repo: Repository,
    pub(super) locks: Arc<OwnerLocks>,
}

/// What a trip create or update carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripInput {
    pub trip_date: NaiveDate,
    pub vehicle_id: VehicleId,
    /// Defaults to the acting user on create, and to the current driver on update.
    #[serde(default)]
    pub driver_id: Option<UserId>,
    pub trip_route: String,
    #[serde(default)]
    pub income: Cents,
    #[serde(flatten)]
    pub expenses: TripExpenses,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TripInput {
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.trip_route.trim().is_empty() {
            problems.push("trip route is required".to_string());
        }
        problems.extend(amount_problem("income", self.income));
        for (head, amount) in self.expenses.heads() {
            problems.extend(amount_problem(head, amount));
        }
        problems
    }
}

/// What a cash entry create or update carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashEntryInput {
    pub date: NaiveDate,
    pub description: String,
    pub entry_type: EntryType,
    pub amount: Cents,
}

impl CashEntryInput {
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.description.trim().is_empty() {
            problems.push("description is required".to_string());
        }
        problems.extend(amount_problem("amount", self.amount));
        problems
    }
}

/// Income and expenses of one vehicle for one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: i32,
    pub income: Cents,
    pub expenses: Cents,
    pub net: Cents,
    /// Opening balance plus `net`.
    pub total_balance: Cents,
}

/// A vehicle's ledger for one selected year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleLedger {
    pub vehicle: Vehicle,
    pub opening_balance: Cents,
    pub resolved_opening_balance_year: Option<i32>,
    pub opening_balance_source: OpeningBalanceSource,
    pub selected_year: i32,
    pub year_summary: YearSummary,
    /// Trips of the selected year in ledger order, with running balances
    /// chained over the whole history.
    pub ledger: Vec<Trip>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashLedger {
    pub entries: Vec<CashEntry>,
    /// Running balance of the last listed entry, zero when none.
    pub current_balance: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub month: Option<String>,
    pub rows: Vec<MonthlySummaryRow>,
    pub available_months: Vec<String>,
    pub total_income: Cents,
    pub total_expenses: Cents,
    pub total_profit: Cents,
    pub total_trips: i64,
}

impl FleetService {
    /// Create a new fleet service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            locks: Arc::new(OwnerLocks::new()),
        }
    }

    /// Open (creating if needed) and migrate the database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        Self::init_url(&db_url).await
    }

    /// Open and migrate a database given as a full `sqlite:` URL.
    pub async fn init_url(database_url: &str) -> Result<Self, AppError> {
        let repo = Repository::init(database_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database without migrating.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    pub async fn health(&self) -> Result<(), AppError> {
        Ok(self.repo.ping().await?)
    }

    pub(super) fn require_admin(actor: &Actor, action: &str) -> Result<(), AppError> {
        if actor.is_admin() {
            Ok(())
        } else {
            warn!(user_id = %actor.user_id, action, "admin role required");
            Err(AppError::Forbidden(format!("admin role required to {}", action)))
        }
    }

    pub(super) async fn require_vehicle<'e, E>(
        &self,
        executor: E,
        id: VehicleId,
    ) -> Result<Vehicle, AppError>
    where
        E: SqliteExecutor<'e>,
    {
        self.repo
            .get_vehicle(executor, id)
            .await?
            .ok_or_else(|| AppError::VehicleNotFound(id.to_string()))
    }

    // ========================
    // Trip operations
    // ========================

    /// Log a trip and recompute the vehicle ledger from its position on.
    #[instrument(skip(self, input), fields(user_id = %actor.user_id, vehicle_id = %input.vehicle_id))]
    pub async fn create_trip(&self, actor: &Actor, input: TripInput) -> Result<Trip, AppError> {
        let driver_id = input.driver_id.unwrap_or(actor.user_id);
        if !actor.is_admin() && driver_id != actor.user_id {
            warn!("driver tried to log a trip for someone else");
            return Err(AppError::Forbidden(
                "drivers can only log their own trips".to_string(),
            ));
        }
        AppError::check_problems(input.problems())?;

        let _guard = self.locks.lock(LockKey::Vehicle(input.vehicle_id)).await;
        let mut tx = self.repo.begin().await?;
        self.require_vehicle(&mut *tx, input.vehicle_id).await?;

        let mut trip = Trip::new(
            input.vehicle_id,
            driver_id,
            input.trip_date,
            input.trip_route,
            input.income,
            input.expenses,
        );
        if let Some(notes) = input.notes.filter(|n| !n.trim().is_empty()) {
            trip = trip.with_notes(notes);
        }
        trip.sequence = self.repo.next_sequence(&mut *tx, SequenceCounter::Trip).await?;
        self.repo.insert_trip(&mut *tx, &trip).await?;

        let trips = self
            .rechain_trips(&mut tx, trip.vehicle_id, trip.ledger_key())
            .await?;
        tx.commit().await?;

        let stored = find_by_key(trips, trip.ledger_key()).unwrap_or(trip);
        info!(trip_id = %stored.id, balance = stored.running_balance, "trip logged");
        Ok(stored)
    }

    /// Get a trip. Drivers may only see their own.
    pub async fn get_trip(&self, actor: &Actor, id: TripId) -> Result<Trip, AppError> {
        let trip = self
            .repo
            .get_trip(self.repo.pool(), id)
            .await?
            .ok_or_else(|| AppError::TripNotFound(id.to_string()))?;
        if !actor.owns_or_admin(trip.driver_id) {
            return Err(AppError::Forbidden("not your trip".to_string()));
        }
        Ok(trip)
    }

    /// Edit a trip. If the vehicle changes, both ledgers are recomputed.
    #[instrument(skip(self, input), fields(user_id = %actor.user_id))]
    pub async fn update_trip(
        &self,
        actor: &Actor,
        id: TripId,
        input: TripInput,
    ) -> Result<Trip, AppError> {
        Self::require_admin(actor, "edit trips")?;
        AppError::check_problems(input.problems())?;

        let current = self
            .repo
            .get_trip(self.repo.pool(), id)
            .await?
            .ok_or_else(|| AppError::TripNotFound(id.to_string()))?;
        let _guards = self
            .locks
            .lock_all(&[
                LockKey::Vehicle(current.vehicle_id),
                LockKey::Vehicle(input.vehicle_id),
            ])
            .await;

        let mut tx = self.repo.begin().await?;
        let mut trip = self
            .repo
            .get_trip(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::TripNotFound(id.to_string()))?;
        self.require_vehicle(&mut *tx, input.vehicle_id).await?;

        let old_vehicle = trip.vehicle_id;
        let old_key = trip.ledger_key();

        trip.trip_date = input.trip_date;
        trip.vehicle_id = input.vehicle_id;
        if let Some(driver_id) = input.driver_id {
            trip.driver_id = driver_id;
        }
        trip.trip_route = input.trip_route.trim().to_string();
        trip.income = input.income;
        trip.expenses = input.expenses;
        trip.notes = input.notes.filter(|n| !n.trim().is_empty());
        trip.refresh_derived();
        trip.updated_at = Utc::now();
        self.repo.update_trip(&mut *tx, &trip).await?;

        let new_key = trip.ledger_key();
        let trips = if old_vehicle == trip.vehicle_id {
            self.rechain_trips(&mut tx, trip.vehicle_id, old_key.min(new_key))
                .await?
        } else {
            self.rechain_trips(&mut tx, old_vehicle, old_key).await?;
            self.rechain_trips(&mut tx, trip.vehicle_id, new_key).await?
        };
        tx.commit().await?;

        let stored = find_by_key(trips, new_key).unwrap_or(trip);
        info!(trip_id = %stored.id, balance = stored.running_balance, "trip updated");
        Ok(stored)
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn delete_trip(&self, actor: &Actor, id: TripId) -> Result<(), AppError> {
        Self::require_admin(actor, "delete trips")?;

        let current = self
            .repo
            .get_trip(self.repo.pool(), id)
            .await?
            .ok_or_else(|| AppError::TripNotFound(id.to_string()))?;
        let _guard = self.locks.lock(LockKey::Vehicle(current.vehicle_id)).await;

        let mut tx = self.repo.begin().await?;
        let trip = self
            .repo
            .get_trip(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::TripNotFound(id.to_string()))?;
        self.repo.delete_trip(&mut *tx, id).await?;
        self.rechain_trips(&mut tx, trip.vehicle_id, trip.ledger_key())
            .await?;
        tx.commit().await?;

        info!(trip_id = %id, vehicle_id = %trip.vehicle_id, "trip deleted");
        Ok(())
    }

    /// Every trip of a vehicle in ledger order.
    pub async fn list_vehicle_trips(
        &self,
        actor: &Actor,
        vehicle_id: VehicleId,
    ) -> Result<Vec<Trip>, AppError> {
        Self::require_admin(actor, "list trips")?;
        self.require_vehicle(self.repo.pool(), vehicle_id).await?;
        Ok(self
            .repo
            .list_vehicle_trips(self.repo.pool(), vehicle_id)
            .await?)
    }

    /// Reload a vehicle's trips, re-chain from the first record at or after
    /// `from`, and write back every balance from there on.
    async fn rechain_trips(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        vehicle_id: VehicleId,
        from: LedgerKey,
    ) -> Result<Vec<Trip>, AppError> {
        let mut trips = self.repo.list_vehicle_trips(&mut **tx, vehicle_id).await?;
        let start = first_affected(&trips, from);
        recompute_from(&mut trips, start, VEHICLE_LEDGER_BASE);

        for trip in &trips[start..] {
            self.repo
                .update_trip_balance(&mut **tx, trip.id, trip.running_balance)
                .await?;
        }
        debug!(%vehicle_id, start, rewritten = trips.len() - start, "vehicle ledger recomputed");
        Ok(trips)
    }

    // ========================
    // Ledger operations
    // ========================

    /// A vehicle's ledger for `year` (default: the current year).
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn vehicle_ledger(
        &self,
        actor: &Actor,
        vehicle_id: VehicleId,
        year: Option<i32>,
    ) -> Result<VehicleLedger, AppError> {
        Self::require_admin(actor, "view vehicle ledgers")?;
        let vehicle = self.require_vehicle(self.repo.pool(), vehicle_id).await?;
        let selected_year = year.unwrap_or_else(|| Utc::now().year());

        let balances = self
            .repo
            .list_opening_balances(Some(vehicle_id), None)
            .await?;
        let opening = resolve_opening_balance(&balances, vehicle_id, selected_year);

        let ledger: Vec<Trip> = self
            .repo
            .list_vehicle_trips(self.repo.pool(), vehicle_id)
            .await?
            .into_iter()
            .filter(|t| t.year() == selected_year)
            .collect();

        let income: Cents = ledger.iter().map(|t| t.income).sum();
        let expenses: Cents = ledger.iter().map(|t| t.total_expenses).sum();
        let net = income - expenses;
        debug!(trips = ledger.len(), source = ?opening.source, "vehicle ledger loaded");

        Ok(VehicleLedger {
            vehicle,
            opening_balance: opening.amount,
            resolved_opening_balance_year: opening.year,
            opening_balance_source: opening.source,
            selected_year,
            year_summary: YearSummary {
                year: selected_year,
                income,
                expenses,
                net,
                total_balance: opening.amount + net,
            },
            ledger,
        })
    }

    // ========================
    // Opening balance operations
    // ========================

    /// Record the balance a vehicle carries into `year`, replacing any
    /// earlier value for the same year.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn set_opening_balance(
        &self,
        actor: &Actor,
        vehicle_id: VehicleId,
        year: i32,
        amount: Cents,
    ) -> Result<OpeningBalance, AppError> {
        Self::require_admin(actor, "set opening balances")?;
        if !(1900..=9999).contains(&year) {
            return Err(AppError::Validation(format!("invalid year {}", year)));
        }
        if amount.unsigned_abs() > MAX_AMOUNT.unsigned_abs() {
            return Err(AppError::Validation(format!(
                "opening balance must be within ±{}",
                format_cents(MAX_AMOUNT)
            )));
        }
        self.require_vehicle(self.repo.pool(), vehicle_id).await?;

        self.repo
            .upsert_opening_balance(&OpeningBalance::new(vehicle_id, Some(year), amount))
            .await?;
        let stored = self
            .repo
            .find_opening_balance(vehicle_id, Some(year))
            .await?
            .ok_or_else(|| anyhow::anyhow!("opening balance vanished after upsert"))?;

        info!(%vehicle_id, year, amount, "opening balance set");
        Ok(stored)
    }

    pub async fn list_opening_balances(
        &self,
        actor: &Actor,
        year: Option<i32>,
    ) -> Result<Vec<OpeningBalance>, AppError> {
        Self::require_admin(actor, "list opening balances")?;
        Ok(self.repo.list_opening_balances(None, year).await?)
    }

    // ========================
    // Cash ledger operations
    // ========================

    /// The admin cash book, optionally narrowed to an inclusive date range.
    pub async fn cash_ledger(
        &self,
        actor: &Actor,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<CashLedger, AppError> {
        Self::require_admin(actor, "view the cash ledger")?;
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                return Err(AppError::Validation(
                    "end date is before the start date".to_string(),
                ));
            }
        }

        let entries = self
            .repo
            .list_cash_entries(self.repo.pool(), start_date, end_date)
            .await?;
        let current_balance = entries
            .last()
            .map_or(CASH_LEDGER_BASE, |e| e.running_balance);
        Ok(CashLedger {
            entries,
            current_balance,
        })
    }

    #[instrument(skip(self, input), fields(user_id = %actor.user_id))]
    pub async fn create_cash_entry(
        &self,
        actor: &Actor,
        input: CashEntryInput,
    ) -> Result<CashEntry, AppError> {
        Self::require_admin(actor, "record cash entries")?;
        AppError::check_problems(input.problems())?;

        let _guard = self.locks.lock(LockKey::CashLedger).await;
        let mut tx = self.repo.begin().await?;

        let mut entry = CashEntry::new(
            input.date,
            input.description,
            input.entry_type,
            input.amount,
            actor.user_id,
        );
        entry.sequence = self
            .repo
            .next_sequence(&mut *tx, SequenceCounter::CashEntry)
            .await?;
        self.repo.insert_cash_entry(&mut *tx, &entry).await?;

        let entries = self.rechain_cash(&mut tx, entry.ledger_key()).await?;
        tx.commit().await?;

        let stored = find_by_key(entries, entry.ledger_key()).unwrap_or(entry);
        info!(entry_id = %stored.id, balance = stored.running_balance, "cash entry recorded");
        Ok(stored)
    }

    #[instrument(skip(self, input), fields(user_id = %actor.user_id))]
    pub async fn update_cash_entry(
        &self,
        actor: &Actor,
        id: CashEntryId,
        input: CashEntryInput,
    ) -> Result<CashEntry, AppError> {
        Self::require_admin(actor, "edit cash entries")?;
        AppError::check_problems(input.problems())?;

        let _guard = self.locks.lock(LockKey::CashLedger).await;
        let mut tx = self.repo.begin().await?;
        let mut entry = self
            .repo
            .get_cash_entry(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::CashEntryNotFound(id.to_string()))?;

        let old_key = entry.ledger_key();
        entry.date = input.date;
        entry.description = input.description.trim().to_string();
        entry.entry_type = input.entry_type;
        entry.amount = input.amount;
        entry.updated_at = Utc::now();
        self.repo.update_cash_entry(&mut *tx, &entry).await?;

        let new_key = entry.ledger_key();
        let entries = self.rechain_cash(&mut tx, old_key.min(new_key)).await?;
        tx.commit().await?;

        let stored = find_by_key(entries, new_key).unwrap_or(entry);
        info!(entry_id = %stored.id, balance = stored.running_balance, "cash entry updated");
        Ok(stored)
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn delete_cash_entry(&self, actor: &Actor, id: CashEntryId) -> Result<(), AppError> {
        Self::require_admin(actor, "delete cash entries")?;

        let _guard = self.locks.lock(LockKey::CashLedger).await;
        let mut tx = self.repo.begin().await?;
        let entry = self
            .repo
            .get_cash_entry(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::CashEntryNotFound(id.to_string()))?;
        self.repo.delete_cash_entry(&mut *tx, id).await?;
        self.rechain_cash(&mut tx, entry.ledger_key()).await?;
        tx.commit().await?;

        info!(entry_id = %id, "cash entry deleted");
        Ok(())
    }

    async fn rechain_cash(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        from: LedgerKey,
    ) -> Result<Vec<CashEntry>, AppError> {
        let mut entries = self.repo.list_cash_entries(&mut **tx, None, None).await?;
        let start = first_affected(&entries, from);
        recompute_from(&mut entries, start, CASH_LEDGER_BASE);

        for entry in &entries[start..] {
            self.repo
                .update_cash_entry_balance(&mut **tx, entry.id, entry.running_balance)
                .await?;
        }
        debug!(start, rewritten = entries.len() - start, "cash ledger recomputed");
        Ok(entries)
    }

    // ========================
    // Summary operations
    // ========================

    /// Per-vehicle monthly totals, optionally for a single `YYYY-MM` month.
    pub async fn monthly_summary(
        &self,
        actor: &Actor,
        month: Option<&str>,
    ) -> Result<MonthlySummary, AppError> {
        Self::require_admin(actor, "view the monthly summary")?;
        let month = month.map(str::trim).filter(|m| !m.is_empty());
        if let Some(m) = month {
            if !is_valid_month_key(m) {
                return Err(AppError::Validation(format!(
                    "invalid month '{}', expected YYYY-MM",
                    m
                )));
            }
        }

        let rows = self.repo.monthly_summary(month).await?;
        let available_months = self.repo.available_months().await?;
        let total_income = rows.iter().map(|r| r.total_income).sum();
        let total_expenses = rows.iter().map(|r| r.total_expenses).sum();
        let total_profit = rows.iter().map(|r| r.profit).sum();
        let total_trips = rows.iter().map(|r| r.trip_count).sum();

        Ok(MonthlySummary {
            month: month.map(str::to_string),
            rows,
            available_months,
            total_income,
            total_expenses,
            total_profit,
            total_trips,
        })
    }
}

/// Pull the record at `key` out of a freshly re-chained ledger.
fn find_by_key<R: LedgerEntry>(records: Vec<R>, key: LedgerKey) -> Option<R> {
    records.into_iter().find(|r| r.ledger_key() == key)
}
