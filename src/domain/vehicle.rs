use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type VehicleId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    #[default]
    Active,
    Inactive,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Active => "active",
            VehicleStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(VehicleStatus::Active),
            "inactive" => Some(VehicleStatus::Inactive),
            _ => None,
        }
    }
}

impl std::fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    /// Registration number, stored trimmed and upper-cased.
    pub vehicle_no: String,
    pub status: VehicleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn new(vehicle_no: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            vehicle_no: normalize_vehicle_no(vehicle_no),
            status: VehicleStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: VehicleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == VehicleStatus::Active
    }
}

/// Vehicle list row, with the earliest still-open follow-up service date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleOverview {
    #[serde(flatten)]
    pub vehicle: Vehicle,
    pub next_service_date: Option<NaiveDate>,
}

/// "ka 01 ab 1234 " -> "KA 01 AB 1234"
pub fn normalize_vehicle_no(raw: &str) -> String {
    raw.trim().to_uppercase()
}
