use std::fs::File;
use std::io::{stdout, Write};

use anyhow::{bail, Context, Result};
use chrono::Utc;

use super::{
    BookingCommands, CashCommands, Commands, ExportCommands, OpeningBalanceCommands,
    ServiceArgs, ServiceLogCommands, TripArgs, TripCommands, TripSheetArgs, TripSheetCommands,
    UserCommands, VehicleCommands, WindowArgs,
};
use crate::application::{CashEntryInput, FleetService, NewUser, TripInput};
use crate::config::Settings;
use crate::domain::{
    format_cents, Actor, AvailabilityRequest, Booking, BookingDetails, BookingStatus,
    ReservationWindow, ServiceDetails, Trip, TripExpenses, TripSheetDetails, VehicleId, VehicleStatus,
};
use crate::io::{Exporter, TextRenderer, TripSheetLayout, TripSheetRenderer};
use crate::storage::{BookingFilter, TripSheetFilter};

pub(super) async fn dispatch(
    service: &FleetService,
    actor: &Actor,
    settings: &Settings,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Vehicle(cmd) => run_vehicle_command(service, actor, cmd).await,
        Commands::User(cmd) => run_user_command(service, actor, cmd).await,
        Commands::Trip(cmd) => run_trip_command(service, actor, cmd).await,
        Commands::Ledger {
            vehicle,
            year,
            json,
        } => run_ledger_command(service, actor, &vehicle, year, json).await,
        Commands::OpeningBalance(cmd) => run_opening_balance_command(service, actor, cmd).await,
        Commands::Cash(cmd) => run_cash_command(service, actor, cmd).await,
        Commands::Booking(cmd) => run_booking_command(service, actor, cmd).await,
        Commands::ServiceLog(cmd) => run_service_log_command(service, actor, cmd).await,
        Commands::TripSheet(cmd) => run_trip_sheet_command(service, actor, settings, cmd).await,
        Commands::Summary { month, json } => {
            run_summary_command(service, actor, month.as_deref(), json).await
        }
        Commands::Export(cmd) => run_export_command(service, actor, cmd).await,
        Commands::Init | Commands::Serve { .. } => Ok(()),
    }
}

async fn vehicle_id(service: &FleetService, vehicle_no: &str) -> Result<VehicleId> {
    Ok(service.get_vehicle_by_no(vehicle_no).await?.id)
}

fn output_writer(output: Option<&str>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(stdout())),
    }
}

fn or_dash(value: Option<impl ToString>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

// ========================
// Vehicles and users
// ========================

async fn run_vehicle_command(
    service: &FleetService,
    actor: &Actor,
    cmd: VehicleCommands,
) -> Result<()> {
    match cmd {
        VehicleCommands::Add {
            vehicle_no,
            inactive,
        } => {
            let status = if inactive {
                VehicleStatus::Inactive
            } else {
                VehicleStatus::Active
            };
            let vehicle = service.create_vehicle(actor, &vehicle_no, status).await?;
            println!("Added vehicle: {} ({})", vehicle.vehicle_no, vehicle.status);
        }

        VehicleCommands::List { active } => {
            if active {
                let vehicles = service.list_active_vehicles().await?;
                if vehicles.is_empty() {
                    println!("No active vehicles.");
                }
                for v in vehicles {
                    println!("{}", v.vehicle_no);
                }
                return Ok(());
            }

            let vehicles = service.list_vehicles(actor).await?;
            if vehicles.is_empty() {
                println!("No vehicles found.");
            } else {
                println!("{:<18} {:<10} {:<14}", "VEHICLE", "STATUS", "NEXT SERVICE");
                println!("{}", "-".repeat(44));
                for row in vehicles {
                    println!(
                        "{:<18} {:<10} {:<14}",
                        row.vehicle.vehicle_no,
                        row.vehicle.status,
                        or_dash(row.next_service_date)
                    );
                }
            }
        }

        VehicleCommands::Show { vehicle } => {
            let id = vehicle_id(service, &vehicle).await?;
            let vehicle = service.get_vehicle(actor, id).await?;
            println!("Vehicle: {}", vehicle.vehicle_no);
            println!("  ID:       {}", vehicle.id);
            println!("  Status:   {}", vehicle.status);
            println!("  Added:    {}", vehicle.created_at.format("%Y-%m-%d %H:%M:%S"));
        }

        VehicleCommands::Update {
            vehicle,
            number,
            status,
        } => {
            if number.is_none() && status.is_none() {
                bail!("Nothing to change. Pass --number and/or --status");
            }
            let id = vehicle_id(service, &vehicle).await?;
            let vehicle = service
                .update_vehicle(actor, id, number.as_deref(), status)
                .await?;
            println!("Updated vehicle: {} ({})", vehicle.vehicle_no, vehicle.status);
        }

        VehicleCommands::Remove { vehicle } => {
            let id = vehicle_id(service, &vehicle).await?;
            service.delete_vehicle(actor, id).await?;
            println!("Removed vehicle: {}", vehicle);
        }
    }
    Ok(())
}

async fn run_user_command(service: &FleetService, actor: &Actor, cmd: UserCommands) -> Result<()> {
    match cmd {
        UserCommands::Add {
            name,
            email,
            role,
            vehicles,
        } => {
            let mut assigned_vehicles = Vec::with_capacity(vehicles.len());
            for vehicle_no in &vehicles {
                assigned_vehicles.push(vehicle_id(service, vehicle_no).await?);
            }
            let user = service
                .create_user(
                    actor,
                    NewUser {
                        name,
                        email,
                        role,
                        assigned_vehicles,
                    },
                )
                .await?;
            println!("Added user: {} <{}> ({})", user.name, user.email, user.role);
            println!("  ID: {}", user.id);
        }

        UserCommands::List => {
            let users = service.list_users(actor).await?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<24} {:<30} {:<8}", "NAME", "EMAIL", "ROLE");
                println!("{}", "-".repeat(64));
                for user in users {
                    println!("{:<24} {:<30} {:<8}", user.name, user.email, user.role);
                }
            }
        }
    }
    Ok(())
}

// ========================
// Trips and ledgers
// ========================

impl TripArgs {
    fn expenses_over(&self, base: TripExpenses) -> TripExpenses {
        TripExpenses {
            fuel: self.fuel.unwrap_or(base.fuel),
            fasttag: self.fasttag.unwrap_or(base.fasttag),
            driver_allowance: self.driver_allowance.unwrap_or(base.driver_allowance),
            service: self.service.unwrap_or(base.service),
            bank_deposit: self.bank_deposit.unwrap_or(base.bank_deposit),
            other_expense: self.other_expense.unwrap_or(base.other_expense),
        }
    }
}

async fn run_trip_command(service: &FleetService, actor: &Actor, cmd: TripCommands) -> Result<()> {
    match cmd {
        TripCommands::Add(args) => {
            let Some(vehicle) = args.vehicle.as_deref() else {
                bail!("--vehicle is required");
            };
            let Some(route) = args.route.clone() else {
                bail!("--route is required");
            };
            let input = TripInput {
                trip_date: args.date.unwrap_or_else(|| Utc::now().date_naive()),
                vehicle_id: vehicle_id(service, vehicle).await?,
                driver_id: args.driver,
                trip_route: route,
                income: args.income.unwrap_or(0),
                expenses: args.expenses_over(TripExpenses::default()),
                notes: args.notes.clone(),
            };
            let trip = service.create_trip(actor, input).await?;
            println!(
                "Recorded trip {} on {}: income {}, expenses {}, balance {}",
                trip.id,
                trip.trip_date,
                format_cents(trip.income),
                format_cents(trip.total_expenses),
                format_cents(trip.running_balance)
            );
        }

        TripCommands::Show { id } => {
            let trip = service.get_trip(actor, id).await?;
            println!("Trip: {}", trip.id);
            println!("  Date:       {}", trip.trip_date);
            println!("  Route:      {}", trip.trip_route);
            println!("  Driver:     {}", trip.driver_id);
            println!("  Income:     {:>12}", format_cents(trip.income));
            for (head, amount) in trip.expenses.heads() {
                if amount != 0 {
                    println!("  {:<11} {:>12}", format!("{}:", head), format_cents(amount));
                }
            }
            println!("  Expenses:   {:>12}", format_cents(trip.total_expenses));
            println!("  Balance:    {:>12}", format_cents(trip.running_balance));
            if let Some(notes) = &trip.notes {
                println!("  Notes:      {}", notes);
            }
        }

        TripCommands::Edit { id, changes } => {
            let current = service.get_trip(actor, id).await?;
            let vehicle_id = match changes.vehicle.as_deref() {
                Some(vehicle) => vehicle_id(service, vehicle).await?,
                None => current.vehicle_id,
            };
            let input = TripInput {
                trip_date: changes.date.unwrap_or(current.trip_date),
                vehicle_id,
                driver_id: changes.driver.or(Some(current.driver_id)),
                trip_route: changes.route.clone().unwrap_or(current.trip_route),
                income: changes.income.unwrap_or(current.income),
                expenses: changes.expenses_over(current.expenses),
                notes: changes.notes.clone().or(current.notes),
            };
            let trip = service.update_trip(actor, id, input).await?;
            println!(
                "Updated trip {}: balance {}",
                trip.id,
                format_cents(trip.running_balance)
            );
        }

        TripCommands::Delete { id } => {
            service.delete_trip(actor, id).await?;
            println!("Deleted trip: {}", id);
        }

        TripCommands::List { vehicle } => {
            let id = vehicle_id(service, &vehicle).await?;
            let trips = service.list_vehicle_trips(actor, id).await?;
            if trips.is_empty() {
                println!("No trips found.");
            } else {
                print_trip_table(&trips);
            }
        }
    }
    Ok(())
}

fn print_trip_table(trips: &[Trip]) {
    println!(
        "{:<10} {:<28} {:>11} {:>11} {:>12}",
        "DATE", "ROUTE", "INCOME", "EXPENSES", "BALANCE"
    );
    println!("{}", "-".repeat(76));
    for trip in trips {
        let route: String = trip.trip_route.chars().take(28).collect();
        println!(
            "{:<10} {:<28} {:>11} {:>11} {:>12}",
            trip.trip_date,
            route,
            format_cents(trip.income),
            format_cents(trip.total_expenses),
            format_cents(trip.running_balance)
        );
    }
}

async fn run_ledger_command(
    service: &FleetService,
    actor: &Actor,
    vehicle: &str,
    year: Option<i32>,
    json: bool,
) -> Result<()> {
    let id = vehicle_id(service, vehicle).await?;
    let ledger = service.vehicle_ledger(actor, id, year).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ledger)?);
        return Ok(());
    }

    println!("Ledger: {} ({})", ledger.vehicle.vehicle_no, ledger.selected_year);
    let source = match ledger.resolved_opening_balance_year {
        Some(y) if y != ledger.selected_year => format!(" (carried from {})", y),
        _ => String::new(),
    };
    println!(
        "Opening balance: {}{}",
        format_cents(ledger.opening_balance),
        source
    );
    println!();
    if ledger.ledger.is_empty() {
        println!("No trips in {}.", ledger.selected_year);
    } else {
        print_trip_table(&ledger.ledger);
    }
    println!();
    let summary = &ledger.year_summary;
    println!("Income:         {:>15}", format_cents(summary.income));
    println!("Expenses:       {:>15}", format_cents(summary.expenses));
    println!("{}", "-".repeat(31));
    println!("Net:            {:>15}", format_cents(summary.net));
    println!("Total balance:  {:>15}", format_cents(summary.total_balance));
    Ok(())
}

async fn run_opening_balance_command(
    service: &FleetService,
    actor: &Actor,
    cmd: OpeningBalanceCommands,
) -> Result<()> {
    match cmd {
        OpeningBalanceCommands::Set {
            vehicle,
            year,
            amount,
        } => {
            let id = vehicle_id(service, &vehicle).await?;
            let balance = service.set_opening_balance(actor, id, year, amount).await?;
            println!(
                "Opening balance for {} in {}: {}",
                vehicle,
                year,
                format_cents(balance.amount)
            );
        }

        OpeningBalanceCommands::List { year } => {
            let balances = service.list_opening_balances(actor, year).await?;
            if balances.is_empty() {
                println!("No opening balances found.");
                return Ok(());
            }
            let vehicles = service.list_vehicles(actor).await?;
            println!("{:<18} {:<6} {:>14}", "VEHICLE", "YEAR", "AMOUNT");
            println!("{}", "-".repeat(40));
            for balance in balances {
                let vehicle_no = vehicles
                    .iter()
                    .find(|row| row.vehicle.id == balance.vehicle_id)
                    .map_or_else(|| balance.vehicle_id.to_string(), |row| row.vehicle.vehicle_no.clone());
                println!(
                    "{:<18} {:<6} {:>14}",
                    vehicle_no,
                    or_dash(balance.year),
                    format_cents(balance.amount)
                );
            }
        }
    }
    Ok(())
}

async fn run_cash_command(service: &FleetService, actor: &Actor, cmd: CashCommands) -> Result<()> {
    match cmd {
        CashCommands::List { from, to, json } => {
            let ledger = service.cash_ledger(actor, from, to).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ledger)?);
                return Ok(());
            }
            if ledger.entries.is_empty() {
                println!("No cash entries found.");
                return Ok(());
            }
            println!(
                "{:<10} {:<30} {:<8} {:>11} {:>12}",
                "DATE", "DESCRIPTION", "TYPE", "AMOUNT", "BALANCE"
            );
            println!("{}", "-".repeat(75));
            for entry in &ledger.entries {
                let description: String = entry.description.chars().take(30).collect();
                println!(
                    "{:<10} {:<30} {:<8} {:>11} {:>12}",
                    entry.date,
                    description,
                    entry.entry_type,
                    format_cents(entry.amount),
                    format_cents(entry.running_balance)
                );
            }
            println!("{}", "-".repeat(75));
            println!(
                "{:<51} {:>23}",
                "Current balance",
                format_cents(ledger.current_balance)
            );
        }

        CashCommands::Add {
            description,
            amount,
            entry_type,
            date,
        } => {
            let input = CashEntryInput {
                date: date.unwrap_or_else(|| Utc::now().date_naive()),
                description,
                entry_type,
                amount,
            };
            let entry = service.create_cash_entry(actor, input).await?;
            println!(
                "Recorded {} of {} on {}; balance {}",
                entry.entry_type,
                format_cents(entry.amount),
                entry.date,
                format_cents(entry.running_balance)
            );
            println!("  ID: {}", entry.id);
        }

        CashCommands::Edit {
            id,
            description,
            amount,
            entry_type,
            date,
        } => {
            let current = service
                .cash_ledger(actor, None, None)
                .await?
                .entries
                .into_iter()
                .find(|e| e.id == id)
                .with_context(|| format!("Cash entry not found: {}", id))?;
            let input = CashEntryInput {
                date: date.unwrap_or(current.date),
                description: description.unwrap_or(current.description),
                entry_type: entry_type.unwrap_or(current.entry_type),
                amount: amount.unwrap_or(current.amount),
            };
            let entry = service.update_cash_entry(actor, id, input).await?;
            println!(
                "Updated cash entry {}; balance {}",
                entry.id,
                format_cents(entry.running_balance)
            );
        }

        CashCommands::Delete { id } => {
            service.delete_cash_entry(actor, id).await?;
            println!("Deleted cash entry: {}", id);
        }
    }
    Ok(())
}

async fn run_summary_command(
    service: &FleetService,
    actor: &Actor,
    month: Option<&str>,
    json: bool,
) -> Result<()> {
    let summary = service.monthly_summary(actor, month).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.rows.is_empty() {
        println!("No trips recorded.");
        return Ok(());
    }
    println!(
        "{:<8} {:<18} {:>6} {:>12} {:>12} {:>12}",
        "MONTH", "VEHICLE", "TRIPS", "INCOME", "EXPENSES", "PROFIT"
    );
    println!("{}", "-".repeat(73));
    for row in &summary.rows {
        println!(
            "{:<8} {:<18} {:>6} {:>12} {:>12} {:>12}",
            row.month,
            row.vehicle_no,
            row.trip_count,
            format_cents(row.total_income),
            format_cents(row.total_expenses),
            format_cents(row.profit)
        );
    }
    println!("{}", "-".repeat(73));
    println!(
        "{:<27} {:>6} {:>12} {:>12} {:>12}",
        "TOTAL",
        summary.total_trips,
        format_cents(summary.total_income),
        format_cents(summary.total_expenses),
        format_cents(summary.total_profit)
    );
    Ok(())
}

// ========================
// Bookings
// ========================

impl WindowArgs {
    fn window(&self, vehicle_id: VehicleId) -> ReservationWindow {
        ReservationWindow {
            vehicle_id,
            start_date: self.start_date,
            end_date: self.end_date,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

fn print_booking(booking: &Booking) {
    let d = &booking.details;
    println!("Booking: {} [{}]", booking.booking_no, booking.status);
    println!("  ID:          {}", booking.id);
    println!("  Vehicle:     {}", booking.vehicle_no);
    println!("  Customer:    {} ({})", d.customer_name, d.customer_phone);
    println!("  Route:       {} -> {}", d.pickup_location, d.trip_destination);
    println!(
        "  Journey:     {} {} to {} {} ({} days)",
        d.journey_start_date, d.trip_start_time, d.journey_return_date, d.trip_end_time, booking.total_days
    );
    println!("  Persons:     {}", d.total_persons);
    if d.total_amount != 0 || d.advance_amount != 0 {
        println!(
            "  Amount:      {} (advance {})",
            format_cents(d.total_amount),
            format_cents(d.advance_amount)
        );
    }
}

async fn run_booking_command(
    service: &FleetService,
    actor: &Actor,
    cmd: BookingCommands,
) -> Result<()> {
    match cmd {
        BookingCommands::Add {
            vehicle,
            window,
            customer,
            phone,
            address,
            pickup,
            destination,
            persons,
            kilometers,
            advance,
            total,
        } => {
            let details = BookingDetails {
                customer_name: customer,
                customer_address: address,
                customer_phone: phone,
                pickup_location: pickup,
                trip_destination: destination,
                total_persons: persons,
                journey_start_date: window.start_date,
                journey_return_date: window.end_date,
                trip_start_time: window.start_time,
                trip_end_time: window.end_time,
                total_kilometers: kilometers,
                night_halt_places: None,
                vehicle_type: None,
                advance_amount: advance.unwrap_or(0),
                total_amount: total.unwrap_or(0),
                other_expenses: None,
                driver_food_accommodation: None,
                vehicle_id: vehicle_id(service, &vehicle).await?,
            };
            let booking = service.create_booking(actor, details).await?;
            println!("Created booking {} (pending approval)", booking.booking_no);
            println!("  ID: {}", booking.id);
        }

        BookingCommands::List {
            status,
            vehicle,
            from,
            to,
        } => {
            let vehicle_id = match vehicle.as_deref() {
                Some(v) => Some(vehicle_id(service, v).await?),
                None => None,
            };
            let filter = BookingFilter {
                status,
                vehicle_id,
                start_date: from,
                end_date: to,
                ..Default::default()
            };
            let bookings = service.list_bookings(actor, filter).await?;
            if bookings.is_empty() {
                println!("No bookings found.");
                return Ok(());
            }
            println!(
                "{:<18} {:<9} {:<16} {:<22} {:<20}",
                "BOOKING", "STATUS", "VEHICLE", "CUSTOMER", "JOURNEY"
            );
            println!("{}", "-".repeat(88));
            for b in bookings {
                let customer: String = b.details.customer_name.chars().take(22).collect();
                println!(
                    "{:<18} {:<9} {:<16} {:<22} {} .. {}",
                    b.booking_no,
                    b.status,
                    b.vehicle_no,
                    customer,
                    b.details.journey_start_date,
                    b.details.journey_return_date
                );
            }
        }

        BookingCommands::Show { id } => {
            let booking = service.get_booking(actor, id).await?;
            print_booking(&booking);
        }

        BookingCommands::Reschedule {
            id,
            window,
            vehicle,
        } => {
            let current = service.get_booking(actor, id).await?;
            let mut details = current.details;
            if let Some(v) = vehicle.as_deref() {
                details.vehicle_id = vehicle_id(service, v).await?;
            }
            details.journey_start_date = window.start_date;
            details.journey_return_date = window.end_date;
            details.trip_start_time = window.start_time;
            details.trip_end_time = window.end_time;

            let booking = service.update_booking(actor, id, details).await?;
            println!("Rescheduled booking {}", booking.booking_no);
        }

        BookingCommands::Approve { id } => {
            let booking = service
                .set_booking_status(actor, id, BookingStatus::Approved)
                .await?;
            println!("Approved booking {}", booking.booking_no);
        }

        BookingCommands::Reject { id } => {
            let booking = service
                .set_booking_status(actor, id, BookingStatus::Rejected)
                .await?;
            println!("Rejected booking {}", booking.booking_no);
        }

        BookingCommands::Delete { id } => {
            service.delete_booking(actor, id).await?;
            println!("Deleted booking: {}", id);
        }

        BookingCommands::Check {
            vehicle,
            window,
            exclude,
        } => {
            let id = vehicle_id(service, &vehicle).await?;
            let mut request = AvailabilityRequest::new(window.window(id));
            if let Some(exclude) = exclude {
                request = request.excluding(exclude);
            }
            let availability = service.check_availability(&request).await?;
            if availability.available {
                println!("{} is available", vehicle);
            } else {
                println!("{} is not available. Conflicting bookings:", vehicle);
                for conflict in &availability.conflicts {
                    println!("  {}", conflict);
                }
            }
        }
    }
    Ok(())
}

// ========================
// Service logs and trip sheets
// ========================

impl ServiceArgs {
    fn apply(self, details: &mut ServiceDetails) {
        if let Some(date) = self.date {
            details.service_date = date;
        }
        if let Some(odometer) = self.odometer {
            details.odometer_reading = odometer;
        }
        if let Some(category) = self.category {
            details.service_category = category;
        }
        if let Some(parts) = self.parts {
            details.parts_cost = parts;
        }
        if let Some(labour) = self.labour {
            details.labour_cost = labour;
        }
        if self.next_service.is_some() {
            details.next_service_date = self.next_service;
            details.follow_up_required = true;
        }
        if self.completed {
            details.follow_up_completed = true;
        }
        details.description = self.description.or(details.description.take());
        details.service_provider = self.provider.or(details.service_provider.take());
        details.make = self.make.or(details.make.take());
        details.model = self.model.or(details.model.take());
        details.year = self.year.or(details.year);
        details.follow_up_notes = self.follow_up_notes.or(details.follow_up_notes.take());
    }
}

async fn run_service_log_command(
    service: &FleetService,
    actor: &Actor,
    cmd: ServiceLogCommands,
) -> Result<()> {
    match cmd {
        ServiceLogCommands::List { vehicle } => {
            let id = vehicle_id(service, &vehicle).await?;
            let logs = service.list_service_logs(actor, id).await?;
            if logs.is_empty() {
                println!("No service logs found.");
                return Ok(());
            }
            println!(
                "{:<10} {:<20} {:>10} {:>12} {:<12}",
                "DATE", "CATEGORY", "ODOMETER", "COST", "NEXT DUE"
            );
            println!("{}", "-".repeat(68));
            for log in logs {
                let next = if log.has_open_follow_up() {
                    or_dash(log.details.next_service_date)
                } else {
                    "-".to_string()
                };
                println!(
                    "{:<10} {:<20} {:>10} {:>12} {:<12}",
                    log.details.service_date,
                    log.details.service_category,
                    log.details.odometer_reading,
                    format_cents(log.total_cost),
                    next
                );
            }
        }

        ServiceLogCommands::Add { vehicle, details } => {
            let Some(service_date) = details.date else {
                bail!("--date is required");
            };
            let Some(odometer_reading) = details.odometer else {
                bail!("--odometer is required");
            };
            let Some(service_category) = details.category.clone() else {
                bail!("--category is required");
            };
            let mut service_details = ServiceDetails {
                make: None,
                model: None,
                year: None,
                service_date,
                odometer_reading,
                service_category,
                description: None,
                parts_cost: 0,
                labour_cost: 0,
                service_provider: None,
                follow_up_required: false,
                follow_up_completed: false,
                follow_up_notes: None,
                next_service_date: None,
            };
            details.apply(&mut service_details);

            let id = vehicle_id(service, &vehicle).await?;
            let log = service.create_service_log(actor, id, service_details).await?;
            println!(
                "Logged {} for {}: total {}",
                log.details.service_category,
                log.vehicle_no,
                format_cents(log.total_cost)
            );
            println!("  ID: {}", log.id);
        }

        ServiceLogCommands::Edit {
            vehicle,
            id,
            changes,
        } => {
            let vehicle_id = vehicle_id(service, &vehicle).await?;
            let current = service
                .list_service_logs(actor, vehicle_id)
                .await?
                .into_iter()
                .find(|log| log.id == id)
                .with_context(|| format!("Service log not found: {}", id))?;
            let mut details = current.details;
            changes.apply(&mut details);

            let log = service
                .update_service_log(actor, vehicle_id, id, details)
                .await?;
            println!("Updated service log {}: total {}", log.id, format_cents(log.total_cost));
        }

        ServiceLogCommands::Delete { vehicle, id } => {
            let vehicle_id = vehicle_id(service, &vehicle).await?;
            service.delete_service_log(actor, vehicle_id, id).await?;
            println!("Deleted service log: {}", id);
        }
    }
    Ok(())
}

impl TripSheetArgs {
    fn apply(self, d: &mut TripSheetDetails) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        d.trip_sheet_date = self.date.or(d.trip_sheet_date);
        set(&mut d.guest_name, self.guest);
        set(&mut d.vehicle_type, self.vehicle_type);
        set(&mut d.vehicle_reg_no, self.reg_no);
        set(&mut d.trip_details, self.details);
        d.garage_km_start = self.garage_km_start.or(d.garage_km_start);
        d.pickup_km = self.pickup_km.or(d.pickup_km);
        d.drop_km = self.drop_km.or(d.drop_km);
        d.garage_km_end = self.garage_km_end.or(d.garage_km_end);
        set(&mut d.garage_time_start, self.garage_time_start);
        set(&mut d.pickup_time, self.pickup_time);
        set(&mut d.drop_time, self.drop_time);
        set(&mut d.garage_time_end, self.garage_time_end);
        d.starting_date = self.starting_date.or(d.starting_date);
        d.closing_date = self.closing_date.or(d.closing_date);
        d.total_bill_amount = self.bill.or(d.total_bill_amount);
        set(&mut d.driver_name, self.driver);
        set(&mut d.customer_name, self.customer);
    }
}

async fn run_trip_sheet_command(
    service: &FleetService,
    actor: &Actor,
    settings: &Settings,
    cmd: TripSheetCommands,
) -> Result<()> {
    match cmd {
        TripSheetCommands::Add(args) => {
            let mut details = TripSheetDetails::default();
            args.apply(&mut details);
            let sheet = service.create_trip_sheet(actor, details).await?;
            println!("Issued trip sheet {}", sheet.trip_sheet_no);
            println!("  ID: {}", sheet.id);
        }

        TripSheetCommands::List {
            from,
            to,
            reg_no,
            guest,
        } => {
            let filter = TripSheetFilter {
                start_date: from,
                end_date: to,
                vehicle_reg: reg_no,
                guest_name: guest,
            };
            let sheets = service.list_trip_sheets(actor, filter).await?;
            if sheets.is_empty() {
                println!("No trip sheets found.");
                return Ok(());
            }
            println!(
                "{:<9} {:<10} {:<24} {:<16} {:>12}",
                "NUMBER", "DATE", "GUEST", "VEHICLE", "BILL"
            );
            println!("{}", "-".repeat(75));
            for s in sheets {
                let guest: String = s.details.guest_name.chars().take(24).collect();
                println!(
                    "{:<9} {:<10} {:<24} {:<16} {:>12}",
                    s.trip_sheet_no,
                    s.trip_sheet_date,
                    guest,
                    s.details.vehicle_reg_no,
                    or_dash(s.details.total_bill_amount.map(format_cents))
                );
            }
        }

        TripSheetCommands::Show { id } => {
            let sheet = service.get_trip_sheet(actor, id).await?;
            println!("{}", serde_json::to_string_pretty(&sheet)?);
        }

        TripSheetCommands::Edit { id, changes } => {
            let current = service.get_trip_sheet(actor, id).await?;
            let mut details = current.details;
            changes.apply(&mut details);
            let sheet = service.update_trip_sheet(actor, id, details).await?;
            println!("Updated trip sheet {}", sheet.trip_sheet_no);
        }

        TripSheetCommands::Delete { id } => {
            service.delete_trip_sheet(actor, id).await?;
            println!("Deleted trip sheet: {}", id);
        }

        TripSheetCommands::Render { id, output } => {
            let sheet = service.get_trip_sheet(actor, id).await?;
            let layout = TripSheetLayout::build(&sheet, &settings.letterhead);
            let bytes = TextRenderer::default().render(&layout)?;
            let mut writer = output_writer(output.as_deref())?;
            writer.write_all(&bytes)?;
            writer.flush()?;
            if let Some(path) = output {
                eprintln!("Rendered {} to {}", sheet.trip_sheet_no, path);
            }
        }
    }
    Ok(())
}

// ========================
// Export
// ========================

async fn run_export_command(
    service: &FleetService,
    actor: &Actor,
    cmd: ExportCommands,
) -> Result<()> {
    let exporter = Exporter::new(service, actor);

    match cmd {
        ExportCommands::Ledger {
            vehicle,
            year,
            output,
        } => {
            let id = vehicle_id(service, &vehicle).await?;
            let writer = output_writer(output.as_deref())?;
            let count = exporter.export_vehicle_ledger_csv(writer, id, year).await?;
            if output.is_some() {
                eprintln!("Exported {} trips", count);
            }
        }

        ExportCommands::Cash { from, to, output } => {
            let writer = output_writer(output.as_deref())?;
            let count = exporter.export_cash_ledger_csv(writer, from, to).await?;
            if output.is_some() {
                eprintln!("Exported {} cash entries", count);
            }
        }
    }
    Ok(())
}
