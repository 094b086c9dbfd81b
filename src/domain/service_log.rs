use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{amount_problem, Cents, UserId, VehicleId};

pub type ServiceLogId = Uuid;

/// Editable part of a service log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetails {
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    pub service_date: NaiveDate,
    pub odometer_reading: i64,
    /// e.g. "Regular Service", "Repair", "Tyre Change"
    pub service_category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parts_cost: Cents,
    #[serde(default)]
    pub labour_cost: Cents,
    #[serde(default)]
    pub service_provider: Option<String>,
    #[serde(default)]
    pub follow_up_required: bool,
    #[serde(default)]
    pub follow_up_completed: bool,
    #[serde(default)]
    pub follow_up_notes: Option<String>,
    #[serde(default)]
    pub next_service_date: Option<NaiveDate>,
}

impl ServiceDetails {
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.service_category.trim().is_empty() {
            problems.push("service category is required".to_string());
        }
        if self.odometer_reading < 0 {
            problems.push("odometer reading must not be negative".to_string());
        }
        problems.extend(amount_problem("parts cost", self.parts_cost));
        problems.extend(amount_problem("labour cost", self.labour_cost));
        problems
    }

    pub fn total_cost(&self) -> Cents {
        self.parts_cost + self.labour_cost
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLog {
    pub id: ServiceLogId,
    /// Fixed at creation.
    pub vehicle_id: VehicleId,
    pub vehicle_no: String,
    #[serde(flatten)]
    pub details: ServiceDetails,
    pub total_cost: Cents,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceLog {
    pub fn new(
        vehicle_id: VehicleId,
        vehicle_no: String,
        details: ServiceDetails,
        created_by: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            vehicle_id,
            vehicle_no,
            total_cost: details.total_cost(),
            details,
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_details(&mut self, details: ServiceDetails) {
        self.total_cost = details.total_cost();
        self.details = details;
        self.updated_at = Utc::now();
    }

    /// Still waiting on a follow-up visit.
    pub fn has_open_follow_up(&self) -> bool {
        self.details.next_service_date.is_some() && !self.details.follow_up_completed
    }
}
