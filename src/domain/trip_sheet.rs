use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{amount_problem, Cents, UserId};

pub type TripSheetId = Uuid;

pub const FIRST_TRIP_SHEET_NO: i64 = 1001;

/// Fields filled in on a printed trip sheet. All optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripSheetDetails {
    pub trip_sheet_date: Option<NaiveDate>,
    pub guest_name: String,
    pub vehicle_type: String,
    pub vehicle_reg_no: String,
    pub trip_details: String,
    pub garage_km_start: Option<i64>,
    pub pickup_km: Option<i64>,
    pub drop_km: Option<i64>,
    pub garage_km_end: Option<i64>,
    pub garage_time_start: String,
    pub pickup_time: String,
    pub drop_time: String,
    pub garage_time_end: String,
    pub starting_date: Option<NaiveDate>,
    pub closing_date: Option<NaiveDate>,
    pub total_bill_amount: Option<Cents>,
    pub driver_name: String,
    pub customer_name: String,
}

impl TripSheetDetails {
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let readings = [
            self.garage_km_start,
            self.pickup_km,
            self.drop_km,
            self.garage_km_end,
        ];
        if readings.iter().flatten().any(|km| *km < 0) {
            problems.push("odometer readings must not be negative".to_string());
        }
        if let Some(amount) = self.total_bill_amount {
            problems.extend(amount_problem("total bill amount", amount));
        }
        if let (Some(start), Some(close)) = (self.starting_date, self.closing_date) {
            if close < start {
                problems.push("closing date is before the starting date".to_string());
            }
        }
        problems
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripSheet {
    pub id: TripSheetId,
    /// `TS-NNNN`; never changes once issued.
    pub trip_sheet_no: String,
    pub trip_sheet_date: NaiveDate,
    #[serde(flatten)]
    pub details: TripSheetDetails,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TripSheet {
    pub fn new(trip_sheet_no: String, details: TripSheetDetails, created_by: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trip_sheet_no,
            trip_sheet_date: details.trip_sheet_date.unwrap_or_else(|| now.date_naive()),
            details,
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_details(&mut self, details: TripSheetDetails) {
        if let Some(date) = details.trip_sheet_date {
            self.trip_sheet_date = date;
        }
        self.details = details;
        self.updated_at = Utc::now();
    }

    /// Kilometres driven garage to garage, when both readings exist.
    pub fn total_km(&self) -> Option<i64> {
        match (self.details.garage_km_start, self.details.garage_km_end) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }
}

/// Numeric part of `TS-1234`, if it has one.
pub fn parse_trip_sheet_no(no: &str) -> Option<i64> {
    no.strip_prefix("TS-")?.parse().ok()
}

/// The number after `highest`, or `TS-1001` for the first sheet.
pub fn next_trip_sheet_no(highest: Option<i64>) -> String {
    let next = highest.map_or(FIRST_TRIP_SHEET_NO, |n| (n + 1).max(FIRST_TRIP_SHEET_NO));
    format!("TS-{}", next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbering() {
        assert_eq!(next_trip_sheet_no(None), "TS-1001");
        assert_eq!(next_trip_sheet_no(Some(1001)), "TS-1002");
        assert_eq!(next_trip_sheet_no(Some(7)), "TS-1001");
        assert_eq!(parse_trip_sheet_no("TS-1044"), Some(1044));
        assert_eq!(parse_trip_sheet_no("TS-x"), None);
        assert_eq!(parse_trip_sheet_no("BK-1"), None);
    }

    #[test]
    fn test_total_km() {
        let details = TripSheetDetails {
            garage_km_start: Some(12000),
            garage_km_end: Some(12450),
            ..Default::default()
        };
        let sheet = TripSheet::new("TS-1001".into(), details, Uuid::nil());
        assert_eq!(sheet.total_km(), Some(450));
    }

    #[test]
    fn test_problems() {
        let details = TripSheetDetails {
            pickup_km: Some(-1),
            starting_date: NaiveDate::from_ymd_opt(2025, 1, 2),
            closing_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            ..Default::default()
        };
        assert_eq!(details.problems().len(), 2);
    }
}
