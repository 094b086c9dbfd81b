use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, VehicleId};

pub type OpeningBalanceId = Uuid;

/// Balance a vehicle carries into a year. Unique per `(vehicle_id, year)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningBalance {
    pub id: OpeningBalanceId,
    pub vehicle_id: VehicleId,
    /// `None` for rows recorded before balances were tracked per year.
    pub year: Option<i32>,
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OpeningBalance {
    pub fn new(vehicle_id: VehicleId, year: Option<i32>, amount: Cents) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            vehicle_id,
            year,
            amount,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.year.is_none()
    }
}
