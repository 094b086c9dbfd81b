use anyhow::Result;
use chrono::NaiveDate;
use std::io::Write;

use crate::application::FleetService;
use crate::domain::{format_cents, Actor, VehicleId};

/// Exporter for writing ledgers out as CSV
pub struct Exporter<'a> {
    service: &'a FleetService,
    actor: &'a Actor,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a FleetService, actor: &'a Actor) -> Self {
        Self { service, actor }
    }

    /// Export one year of a vehicle ledger, with running balances
    pub async fn export_vehicle_ledger_csv<W: Write>(
        &self,
        writer: W,
        vehicle_id: VehicleId,
        year: Option<i32>,
    ) -> Result<usize> {
        let ledger = self
            .service
            .vehicle_ledger(self.actor, vehicle_id, year)
            .await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "date",
            "vehicle_no",
            "trip_route",
            "income",
            "fuel",
            "fasttag",
            "driver_allowance",
            "service",
            "bank_deposit",
            "other_expense",
            "total_expenses",
            "running_balance",
            "notes",
        ])?;

        for trip in &ledger.ledger {
            let e = &trip.expenses;
            csv_writer.write_record([
                trip.trip_date.to_string(),
                ledger.vehicle.vehicle_no.clone(),
                trip.trip_route.clone(),
                format_cents(trip.income),
                format_cents(e.fuel),
                format_cents(e.fasttag),
                format_cents(e.driver_allowance),
                format_cents(e.service),
                format_cents(e.bank_deposit),
                format_cents(e.other_expense),
                format_cents(trip.total_expenses),
                format_cents(trip.running_balance),
                trip.notes.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(ledger.ledger.len())
    }

    /// Export the admin cash book, optionally within a date range
    pub async fn export_cash_ledger_csv<W: Write>(
        &self,
        writer: W,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<usize> {
        let ledger = self
            .service
            .cash_ledger(self.actor, start_date, end_date)
            .await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["date", "description", "type", "amount", "running_balance"])?;

        for entry in &ledger.entries {
            csv_writer.write_record([
                entry.date.to_string(),
                entry.description.clone(),
                entry.entry_type.as_str().to_string(),
                format_cents(entry.amount),
                format_cents(entry.running_balance),
            ])?;
        }

        csv_writer.flush()?;
        Ok(ledger.entries.len())
    }
}
