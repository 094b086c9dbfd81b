use chrono::Utc;
use tracing::{info, instrument};

use crate::domain::{
    is_valid_email, next_trip_sheet_no, normalize_vehicle_no, parse_trip_sheet_no, Actor, Role,
    ServiceDetails, ServiceLog, ServiceLogId, TripSheet, TripSheetDetails, TripSheetId, User,
    Vehicle, VehicleId, VehicleOverview, VehicleStatus, MAX_NAME_LEN,
};
use crate::storage::TripSheetFilter;

use super::{AppError, FleetService, LockKey};

/// Fields a user is created with. Credentials live elsewhere.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub assigned_vehicles: Vec<VehicleId>,
}

impl FleetService {
    // ========================
    // Vehicle operations
    // ========================

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn create_vehicle(
        &self,
        actor: &Actor,
        vehicle_no: &str,
        status: VehicleStatus,
    ) -> Result<Vehicle, AppError> {
        Self::require_admin(actor, "add vehicles")?;
        let vehicle = Vehicle::new(vehicle_no).with_status(status);
        if vehicle.vehicle_no.is_empty() {
            return Err(AppError::Validation("vehicle number is required".to_string()));
        }
        self.repo.save_vehicle(&vehicle).await.map_err(|err| {
            AppError::unless_duplicate(err, || AppError::DuplicateVehicle(vehicle.vehicle_no.clone()))
        })?;
        info!(vehicle_no = %vehicle.vehicle_no, "vehicle added");
        Ok(vehicle)
    }

    /// All vehicles, each with its next open follow-up service date.
    pub async fn list_vehicles(&self, actor: &Actor) -> Result<Vec<VehicleOverview>, AppError> {
        Self::require_admin(actor, "list vehicles")?;
        Ok(self.repo.list_vehicles().await?)
    }

    /// Vehicles that can be booked or driven. Open to every role.
    pub async fn list_active_vehicles(&self) -> Result<Vec<Vehicle>, AppError> {
        Ok(self.repo.list_active_vehicles().await?)
    }

    pub async fn get_vehicle(&self, actor: &Actor, id: VehicleId) -> Result<Vehicle, AppError> {
        Self::require_admin(actor, "view vehicles")?;
        self.require_vehicle(self.repo.pool(), id).await
    }

    /// Find a vehicle by its registration number, in any spelling case.
    pub async fn get_vehicle_by_no(&self, vehicle_no: &str) -> Result<Vehicle, AppError> {
        let normalized = normalize_vehicle_no(vehicle_no);
        self.repo
            .get_vehicle_by_no(&normalized)
            .await?
            .ok_or(AppError::VehicleNotFound(normalized))
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn update_vehicle(
        &self,
        actor: &Actor,
        id: VehicleId,
        vehicle_no: Option<&str>,
        status: Option<VehicleStatus>,
    ) -> Result<Vehicle, AppError> {
        Self::require_admin(actor, "edit vehicles")?;
        let mut vehicle = self.require_vehicle(self.repo.pool(), id).await?;

        if let Some(raw) = vehicle_no {
            let normalized = normalize_vehicle_no(raw);
            if normalized.is_empty() {
                return Err(AppError::Validation("vehicle number is required".to_string()));
            }
            vehicle.vehicle_no = normalized;
        }
        if let Some(status) = status {
            vehicle.status = status;
        }
        vehicle.updated_at = Utc::now();

        self.repo.update_vehicle(&vehicle).await.map_err(|err| {
            AppError::unless_duplicate(err, || AppError::DuplicateVehicle(vehicle.vehicle_no.clone()))
        })?;
        info!(vehicle_no = %vehicle.vehicle_no, status = %vehicle.status, "vehicle updated");
        Ok(vehicle)
    }

    /// Delete a vehicle that nothing references any more.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn delete_vehicle(&self, actor: &Actor, id: VehicleId) -> Result<(), AppError> {
        Self::require_admin(actor, "delete vehicles")?;
        let vehicle = self.require_vehicle(self.repo.pool(), id).await?;
        let _guard = self.locks.lock(LockKey::Vehicle(id)).await;

        let trips = self.repo.count_vehicle_trips(id).await?;
        let service_logs = self.repo.count_vehicle_service_logs(id).await?;
        let bookings = self.repo.count_vehicle_bookings(id).await?;
        if trips + service_logs + bookings > 0 {
            return Err(AppError::VehicleInUse(vehicle.vehicle_no));
        }

        self.repo.delete_vehicle(id).await?;
        info!(vehicle_no = %vehicle.vehicle_no, "vehicle deleted");
        Ok(())
    }

    // ========================
    // User operations
    // ========================

    #[instrument(skip(self, new_user), fields(user_id = %actor.user_id))]
    pub async fn create_user(&self, actor: &Actor, new_user: NewUser) -> Result<User, AppError> {
        Self::require_admin(actor, "add users")?;
        let user = User::new(new_user.name, new_user.email, new_user.role);

        let mut problems = Vec::new();
        if user.name.is_empty() || user.name.chars().count() > MAX_NAME_LEN {
            problems.push(format!("name must be 1 to {} characters", MAX_NAME_LEN));
        }
        if !is_valid_email(&user.email) {
            problems.push(format!("invalid email '{}'", user.email));
        }
        AppError::check_problems(problems)?;

        for vehicle_id in &new_user.assigned_vehicles {
            self.require_vehicle(self.repo.pool(), *vehicle_id).await?;
        }

        let user = user.with_assigned_vehicles(new_user.assigned_vehicles);
        self.repo.save_user(&user).await.map_err(|err| {
            AppError::unless_duplicate(err, || AppError::DuplicateEmail(user.email.clone()))
        })?;
        info!(email = %user.email, role = %user.role, "user added");
        Ok(user)
    }

    pub async fn list_users(&self, actor: &Actor) -> Result<Vec<User>, AppError> {
        Self::require_admin(actor, "list users")?;
        Ok(self.repo.list_users().await?)
    }

    /// Resolve a stored user by email into an acting identity.
    pub async fn actor_for_email(&self, email: &str) -> Result<Actor, AppError> {
        let email = email.trim().to_lowercase();
        self.repo
            .get_user_by_email(&email)
            .await?
            .map(|user| user.actor())
            .ok_or(AppError::UserNotFound(email))
    }

    // ========================
    // Service log operations
    // ========================

    /// Service history of a vehicle, newest first.
    pub async fn list_service_logs(
        &self,
        actor: &Actor,
        vehicle_id: VehicleId,
    ) -> Result<Vec<ServiceLog>, AppError> {
        Self::require_admin(actor, "view service logs")?;
        self.require_vehicle(self.repo.pool(), vehicle_id).await?;
        Ok(self.repo.list_service_logs(vehicle_id).await?)
    }

    #[instrument(skip(self, details), fields(user_id = %actor.user_id))]
    pub async fn create_service_log(
        &self,
        actor: &Actor,
        vehicle_id: VehicleId,
        details: ServiceDetails,
    ) -> Result<ServiceLog, AppError> {
        Self::require_admin(actor, "record service logs")?;
        AppError::check_problems(details.problems())?;
        let vehicle = self.require_vehicle(self.repo.pool(), vehicle_id).await?;

        let log = ServiceLog::new(vehicle.id, vehicle.vehicle_no, details, actor.user_id);
        self.repo.save_service_log(&log).await?;
        info!(log_id = %log.id, vehicle_no = %log.vehicle_no, total_cost = log.total_cost, "service logged");
        Ok(log)
    }

    /// Edit a service log. The vehicle it belongs to never changes.
    #[instrument(skip(self, details), fields(user_id = %actor.user_id))]
    pub async fn update_service_log(
        &self,
        actor: &Actor,
        vehicle_id: VehicleId,
        log_id: ServiceLogId,
        details: ServiceDetails,
    ) -> Result<ServiceLog, AppError> {
        Self::require_admin(actor, "edit service logs")?;
        AppError::check_problems(details.problems())?;

        let mut log = self.load_service_log(vehicle_id, log_id).await?;
        log.apply_details(details);
        self.repo.update_service_log(&log).await?;
        info!(log_id = %log.id, total_cost = log.total_cost, "service log updated");
        Ok(log)
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn delete_service_log(
        &self,
        actor: &Actor,
        vehicle_id: VehicleId,
        log_id: ServiceLogId,
    ) -> Result<(), AppError> {
        Self::require_admin(actor, "delete service logs")?;
        self.load_service_log(vehicle_id, log_id).await?;
        self.repo.delete_service_log(log_id).await?;
        info!(%log_id, "service log deleted");
        Ok(())
    }

    /// A log counts as missing when it belongs to another vehicle.
    async fn load_service_log(
        &self,
        vehicle_id: VehicleId,
        log_id: ServiceLogId,
    ) -> Result<ServiceLog, AppError> {
        self.repo
            .get_service_log(log_id)
            .await?
            .filter(|log| log.vehicle_id == vehicle_id)
            .ok_or_else(|| AppError::ServiceLogNotFound(log_id.to_string()))
    }

    // ========================
    // Trip sheet operations
    // ========================

    /// Issue the next trip sheet number and store the sheet.
    #[instrument(skip(self, details), fields(user_id = %actor.user_id))]
    pub async fn create_trip_sheet(
        &self,
        actor: &Actor,
        details: TripSheetDetails,
    ) -> Result<TripSheet, AppError> {
        Self::require_admin(actor, "create trip sheets")?;
        AppError::check_problems(details.problems())?;

        let _guard = self.locks.lock(LockKey::TripSheetNumbers).await;
        let mut tx = self.repo.begin().await?;
        let highest = self.repo.max_trip_sheet_seq(&mut *tx).await?;
        let sheet = TripSheet::new(next_trip_sheet_no(highest), details, actor.user_id);
        let seq = parse_trip_sheet_no(&sheet.trip_sheet_no)
            .ok_or_else(|| anyhow::anyhow!("malformed trip sheet number {}", sheet.trip_sheet_no))?;
        self.repo.insert_trip_sheet(&mut *tx, &sheet, seq).await?;
        tx.commit().await?;

        info!(trip_sheet_no = %sheet.trip_sheet_no, "trip sheet created");
        Ok(sheet)
    }

    pub async fn list_trip_sheets(
        &self,
        actor: &Actor,
        filter: TripSheetFilter,
    ) -> Result<Vec<TripSheet>, AppError> {
        Self::require_admin(actor, "list trip sheets")?;
        Ok(self.repo.list_trip_sheets(&filter).await?)
    }

    pub async fn get_trip_sheet(&self, actor: &Actor, id: TripSheetId) -> Result<TripSheet, AppError> {
        Self::require_admin(actor, "view trip sheets")?;
        self.repo
            .get_trip_sheet(id)
            .await?
            .ok_or_else(|| AppError::TripSheetNotFound(id.to_string()))
    }

    /// Replace a trip sheet's details. Its number never changes.
    #[instrument(skip(self, details), fields(user_id = %actor.user_id))]
    pub async fn update_trip_sheet(
        &self,
        actor: &Actor,
        id: TripSheetId,
        details: TripSheetDetails,
    ) -> Result<TripSheet, AppError> {
        AppError::check_problems(details.problems())?;
        let mut sheet = self.get_trip_sheet(actor, id).await?;
        sheet.apply_details(details);
        self.repo.update_trip_sheet(&sheet).await?;
        info!(trip_sheet_no = %sheet.trip_sheet_no, "trip sheet updated");
        Ok(sheet)
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn delete_trip_sheet(&self, actor: &Actor, id: TripSheetId) -> Result<(), AppError> {
        let sheet = self.get_trip_sheet(actor, id).await?;
        self.repo.delete_trip_sheet(id).await?;
        info!(trip_sheet_no = %sheet.trip_sheet_no, "trip sheet deleted");
        Ok(())
    }
}
