use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{Row, SqliteExecutor};

use crate::domain::{
    Role, ServiceDetails, ServiceLog, ServiceLogId, TripSheet, TripSheetDetails, TripSheetId,
    User, UserId, Vehicle, VehicleId, VehicleOverview, VehicleStatus,
};

use super::repository::{
    format_date, parse_date, parse_optional_date, parse_optional_uuid, parse_timestamp,
    parse_uuid, Repository,
};

/// Narrowing options for trip sheet lists.
#[derive(Debug, Clone, Default)]
pub struct TripSheetFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Case-insensitive substring of the registration number.
    pub vehicle_reg: Option<String>,
    /// Case-insensitive substring of the guest name.
    pub guest_name: Option<String>,
}

const SERVICE_LOG_COLUMNS: &str = r#"
    id, vehicle_id, vehicle_no, make, model, year, service_date, odometer_reading,
    service_category, description, parts_cost, labour_cost, total_cost, service_provider,
    follow_up_required, follow_up_completed, follow_up_notes, next_service_date, created_by,
    created_at, updated_at
"#;

impl Repository {
    // ========================
    // Vehicle operations
    // ========================

    pub async fn save_vehicle(&self, vehicle: &Vehicle) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vehicles (id, vehicle_no, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(vehicle.id.to_string())
        .bind(&vehicle.vehicle_no)
        .bind(vehicle.status.as_str())
        .bind(vehicle.created_at.to_rfc3339())
        .bind(vehicle.updated_at.to_rfc3339())
        .execute(self.pool())
        .await
        .context("Failed to save vehicle")?;
        Ok(())
    }

    pub async fn update_vehicle(&self, vehicle: &Vehicle) -> Result<()> {
        sqlx::query("UPDATE vehicles SET vehicle_no = ?, status = ?, updated_at = ? WHERE id = ?")
            .bind(&vehicle.vehicle_no)
            .bind(vehicle.status.as_str())
            .bind(vehicle.updated_at.to_rfc3339())
            .bind(vehicle.id.to_string())
            .execute(self.pool())
            .await
            .context("Failed to update vehicle")?;
        Ok(())
    }

    /// Delete a vehicle together with its opening balances.
    pub async fn delete_vehicle(&self, id: VehicleId) -> Result<()> {
        let mut tx = self.begin().await?;
        sqlx::query("DELETE FROM opening_balances WHERE vehicle_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to delete opening balances")?;
        sqlx::query("DELETE FROM vehicles WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to delete vehicle")?;
        tx.commit().await.context("Failed to commit vehicle deletion")?;
        Ok(())
    }

    pub async fn get_vehicle<'e, E>(&self, executor: E, id: VehicleId) -> Result<Option<Vehicle>>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query(
            "SELECT id, vehicle_no, status, created_at, updated_at FROM vehicles WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(executor)
        .await
        .context("Failed to fetch vehicle")?;

        row.as_ref().map(Self::row_to_vehicle).transpose()
    }

    /// Look up by registration number; the caller normalizes it first.
    pub async fn get_vehicle_by_no(&self, vehicle_no: &str) -> Result<Option<Vehicle>> {
        let row = sqlx::query(
            "SELECT id, vehicle_no, status, created_at, updated_at FROM vehicles WHERE vehicle_no = ?",
        )
        .bind(vehicle_no)
        .fetch_optional(self.pool())
        .await
        .context("Failed to fetch vehicle by number")?;

        row.as_ref().map(Self::row_to_vehicle).transpose()
    }

    /// All vehicles with the earliest still-open follow-up service date.
    pub async fn list_vehicles(&self) -> Result<Vec<VehicleOverview>> {
        let rows = sqlx::query(
            r#"
            SELECT v.id, v.vehicle_no, v.status, v.created_at, v.updated_at,
                   (SELECT MIN(s.next_service_date)
                    FROM service_logs s
                    WHERE s.vehicle_id = v.id
                      AND s.next_service_date IS NOT NULL
                      AND s.follow_up_completed = 0) AS next_service_date
            FROM vehicles v
            ORDER BY v.vehicle_no
            "#,
        )
        .fetch_all(self.pool())
        .await
        .context("Failed to list vehicles")?;

        rows.iter()
            .map(|row| {
                Ok(VehicleOverview {
                    vehicle: Self::row_to_vehicle(row)?,
                    next_service_date: parse_optional_date(row.get("next_service_date"))?,
                })
            })
            .collect()
    }

    pub async fn list_active_vehicles(&self) -> Result<Vec<Vehicle>> {
        let rows = sqlx::query(
            r#"
            SELECT id, vehicle_no, status, created_at, updated_at
            FROM vehicles
            WHERE status = 'active'
            ORDER BY vehicle_no
            "#,
        )
        .fetch_all(self.pool())
        .await
        .context("Failed to list active vehicles")?;

        rows.iter().map(Self::row_to_vehicle).collect()
    }

    fn row_to_vehicle(row: &sqlx::sqlite::SqliteRow) -> Result<Vehicle> {
        let id: String = row.get("id");
        let status: String = row.get("status");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        Ok(Vehicle {
            id: parse_uuid(&id, "vehicle ID")?,
            vehicle_no: row.get("vehicle_no"),
            status: VehicleStatus::from_str(&status)
                .ok_or_else(|| anyhow::anyhow!("Invalid vehicle status: {}", status))?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    // ========================
    // User operations
    // ========================

    pub async fn save_user(&self, user: &User) -> Result<()> {
        let assigned = serde_json::to_string(&user.assigned_vehicles)?;
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, assigned_vehicles, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(assigned)
        .bind(user.created_at.to_rfc3339())
        .execute(self.pool())
        .await
        .context("Failed to save user")?;
        Ok(())
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, name, email, role, assigned_vehicles, created_at FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await
        .context("Failed to fetch user")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, name, email, role, assigned_vehicles, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(self.pool())
        .await
        .context("Failed to fetch user by email")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, name, email, role, assigned_vehicles, created_at FROM users ORDER BY name",
        )
        .fetch_all(self.pool())
        .await
        .context("Failed to list users")?;

        rows.iter().map(Self::row_to_user).collect()
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
        let id: String = row.get("id");
        let role: String = row.get("role");
        let assigned: String = row.get("assigned_vehicles");
        let created_at: String = row.get("created_at");

        Ok(User {
            id: parse_uuid(&id, "user ID")?,
            name: row.get("name"),
            email: row.get("email"),
            role: Role::from_str(&role).ok_or_else(|| anyhow::anyhow!("Invalid role: {}", role))?,
            assigned_vehicles: serde_json::from_str(&assigned)
                .context("Invalid assigned vehicles")?,
            created_at: parse_timestamp(&created_at)?,
        })
    }

    // ========================
    // Service log operations
    // ========================

    pub async fn save_service_log(&self, log: &ServiceLog) -> Result<()> {
        let d = &log.details;
        sqlx::query(
            r#"
            INSERT INTO service_logs (id, vehicle_id, vehicle_no, make, model, year, service_date,
                odometer_reading, service_category, description, parts_cost, labour_cost,
                total_cost, service_provider, follow_up_required, follow_up_completed,
                follow_up_notes, next_service_date, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.id.to_string())
        .bind(log.vehicle_id.to_string())
        .bind(&log.vehicle_no)
        .bind(&d.make)
        .bind(&d.model)
        .bind(d.year)
        .bind(format_date(d.service_date))
        .bind(d.odometer_reading)
        .bind(&d.service_category)
        .bind(&d.description)
        .bind(d.parts_cost)
        .bind(d.labour_cost)
        .bind(log.total_cost)
        .bind(&d.service_provider)
        .bind(d.follow_up_required)
        .bind(d.follow_up_completed)
        .bind(&d.follow_up_notes)
        .bind(d.next_service_date.map(format_date))
        .bind(log.created_by.map(|id| id.to_string()))
        .bind(log.created_at.to_rfc3339())
        .bind(log.updated_at.to_rfc3339())
        .execute(self.pool())
        .await
        .context("Failed to save service log")?;
        Ok(())
    }

    pub async fn update_service_log(&self, log: &ServiceLog) -> Result<()> {
        let d = &log.details;
        sqlx::query(
            r#"
            UPDATE service_logs
            SET make = ?, model = ?, year = ?, service_date = ?, odometer_reading = ?,
                service_category = ?, description = ?, parts_cost = ?, labour_cost = ?,
                total_cost = ?, service_provider = ?, follow_up_required = ?,
                follow_up_completed = ?, follow_up_notes = ?, next_service_date = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&d.make)
        .bind(&d.model)
        .bind(d.year)
        .bind(format_date(d.service_date))
        .bind(d.odometer_reading)
        .bind(&d.service_category)
        .bind(&d.description)
        .bind(d.parts_cost)
        .bind(d.labour_cost)
        .bind(log.total_cost)
        .bind(&d.service_provider)
        .bind(d.follow_up_required)
        .bind(d.follow_up_completed)
        .bind(&d.follow_up_notes)
        .bind(d.next_service_date.map(format_date))
        .bind(log.updated_at.to_rfc3339())
        .bind(log.id.to_string())
        .execute(self.pool())
        .await
        .context("Failed to update service log")?;
        Ok(())
    }

    pub async fn delete_service_log(&self, id: ServiceLogId) -> Result<()> {
        sqlx::query("DELETE FROM service_logs WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .context("Failed to delete service log")?;
        Ok(())
    }

    pub async fn get_service_log(&self, id: ServiceLogId) -> Result<Option<ServiceLog>> {
        let sql = format!("SELECT {} FROM service_logs WHERE id = ?", SERVICE_LOG_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await
            .context("Failed to fetch service log")?;

        row.as_ref().map(Self::row_to_service_log).transpose()
    }

    /// Service history of a vehicle, newest first.
    pub async fn list_service_logs(&self, vehicle_id: VehicleId) -> Result<Vec<ServiceLog>> {
        let sql = format!(
            "SELECT {} FROM service_logs WHERE vehicle_id = ? ORDER BY service_date DESC, created_at DESC",
            SERVICE_LOG_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(vehicle_id.to_string())
            .fetch_all(self.pool())
            .await
            .context("Failed to list service logs")?;

        rows.iter().map(Self::row_to_service_log).collect()
    }

    pub async fn count_vehicle_service_logs(&self, vehicle_id: VehicleId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM service_logs WHERE vehicle_id = ?")
            .bind(vehicle_id.to_string())
            .fetch_one(self.pool())
            .await
            .context("Failed to count service logs")?;
        Ok(row.get("count"))
    }

    fn row_to_service_log(row: &sqlx::sqlite::SqliteRow) -> Result<ServiceLog> {
        let id: String = row.get("id");
        let vehicle_id: String = row.get("vehicle_id");
        let service_date: String = row.get("service_date");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        Ok(ServiceLog {
            id: parse_uuid(&id, "service log ID")?,
            vehicle_id: parse_uuid(&vehicle_id, "vehicle ID")?,
            vehicle_no: row.get("vehicle_no"),
            details: ServiceDetails {
                make: row.get("make"),
                model: row.get("model"),
                year: row.get("year"),
                service_date: parse_date(&service_date)?,
                odometer_reading: row.get("odometer_reading"),
                service_category: row.get("service_category"),
                description: row.get("description"),
                parts_cost: row.get("parts_cost"),
                labour_cost: row.get("labour_cost"),
                service_provider: row.get("service_provider"),
                follow_up_required: row.get::<i32, _>("follow_up_required") != 0,
                follow_up_completed: row.get::<i32, _>("follow_up_completed") != 0,
                follow_up_notes: row.get("follow_up_notes"),
                next_service_date: parse_optional_date(row.get("next_service_date"))?,
            },
            total_cost: row.get("total_cost"),
            created_by: parse_optional_uuid(row.get("created_by"), "user ID")?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    // ========================
    // Trip sheet operations
    // ========================

    /// Highest numeric trip sheet number issued so far.
    pub async fn max_trip_sheet_seq<'e, E>(&self, executor: E) -> Result<Option<i64>>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query("SELECT MAX(trip_sheet_seq) AS seq FROM trip_sheets")
            .fetch_one(executor)
            .await
            .context("Failed to read trip sheet numbering")?;
        Ok(row.get("seq"))
    }

    pub async fn insert_trip_sheet<'e, E>(&self, executor: E, sheet: &TripSheet, seq: i64) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        let details = serde_json::to_string(&sheet.details)?;
        sqlx::query(
            r#"
            INSERT INTO trip_sheets (id, trip_sheet_no, trip_sheet_seq, trip_sheet_date, details,
                guest_name, vehicle_reg_no, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(sheet.id.to_string())
        .bind(&sheet.trip_sheet_no)
        .bind(seq)
        .bind(format_date(sheet.trip_sheet_date))
        .bind(details)
        .bind(&sheet.details.guest_name)
        .bind(&sheet.details.vehicle_reg_no)
        .bind(sheet.created_by.map(|id| id.to_string()))
        .bind(sheet.created_at.to_rfc3339())
        .bind(sheet.updated_at.to_rfc3339())
        .execute(executor)
        .await
        .context("Failed to save trip sheet")?;
        Ok(())
    }

    pub async fn update_trip_sheet(&self, sheet: &TripSheet) -> Result<()> {
        let details = serde_json::to_string(&sheet.details)?;
        sqlx::query(
            r#"
            UPDATE trip_sheets
            SET trip_sheet_date = ?, details = ?, guest_name = ?, vehicle_reg_no = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(format_date(sheet.trip_sheet_date))
        .bind(details)
        .bind(&sheet.details.guest_name)
        .bind(&sheet.details.vehicle_reg_no)
        .bind(sheet.updated_at.to_rfc3339())
        .bind(sheet.id.to_string())
        .execute(self.pool())
        .await
        .context("Failed to update trip sheet")?;
        Ok(())
    }

    pub async fn delete_trip_sheet(&self, id: TripSheetId) -> Result<()> {
        sqlx::query("DELETE FROM trip_sheets WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .context("Failed to delete trip sheet")?;
        Ok(())
    }

    pub async fn get_trip_sheet(&self, id: TripSheetId) -> Result<Option<TripSheet>> {
        let row = sqlx::query(
            r#"
            SELECT id, trip_sheet_no, trip_sheet_date, details, created_by, created_at, updated_at
            FROM trip_sheets
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await
        .context("Failed to fetch trip sheet")?;

        row.as_ref().map(Self::row_to_trip_sheet).transpose()
    }

    /// Trip sheets matching `filter`, newest sheet date first.
    pub async fn list_trip_sheets(&self, filter: &TripSheetFilter) -> Result<Vec<TripSheet>> {
        let rows = sqlx::query(
            r#"
            SELECT id, trip_sheet_no, trip_sheet_date, details, created_by, created_at, updated_at
            FROM trip_sheets
            WHERE (?1 IS NULL OR trip_sheet_date >= ?1)
              AND (?2 IS NULL OR trip_sheet_date <= ?2)
              AND (?3 IS NULL OR LOWER(vehicle_reg_no) LIKE '%' || LOWER(?3) || '%')
              AND (?4 IS NULL OR LOWER(guest_name) LIKE '%' || LOWER(?4) || '%')
            ORDER BY trip_sheet_date DESC, trip_sheet_seq DESC
            "#,
        )
        .bind(filter.start_date.map(format_date))
        .bind(filter.end_date.map(format_date))
        .bind(filter.vehicle_reg.as_deref())
        .bind(filter.guest_name.as_deref())
        .fetch_all(self.pool())
        .await
        .context("Failed to list trip sheets")?;

        rows.iter().map(Self::row_to_trip_sheet).collect()
    }

    fn row_to_trip_sheet(row: &sqlx::sqlite::SqliteRow) -> Result<TripSheet> {
        let id: String = row.get("id");
        let sheet_date: String = row.get("trip_sheet_date");
        let details: String = row.get("details");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        Ok(TripSheet {
            id: parse_uuid(&id, "trip sheet ID")?,
            trip_sheet_no: row.get("trip_sheet_no"),
            trip_sheet_date: parse_date(&sheet_date)?,
            details: serde_json::from_str::<TripSheetDetails>(&details)
                .context("Invalid trip sheet details")?,
            created_by: parse_optional_uuid(row.get("created_by"), "user ID")?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}
