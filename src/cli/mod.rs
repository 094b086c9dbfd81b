use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use crate::api::{self, AppState};
use crate::application::FleetService;
use crate::config::{Settings, DEFAULT_DATABASE};
use crate::domain::{
    parse_non_negative_cents, Actor, BookingStatus, Cents, ClockTime, EntryType, Role,
    VehicleStatus,
};

mod commands;

/// Fleetbook - small-fleet bookkeeping
#[derive(Parser)]
#[command(name = "fleetbook")]
#[command(about = "Trip ledgers, bookings, service logs and an admin cash book for a small vehicle fleet")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "FLEETBOOK_DATABASE", default_value = DEFAULT_DATABASE, global = true)]
    pub database: String,

    /// Act as this user (email). Defaults to the local system administrator.
    #[arg(short, long, env = "FLEETBOOK_USER", global = true)]
    pub user: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Run the HTTP API
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "FLEETBOOK_BIND")]
        bind: Option<String>,
    },

    /// Vehicle management commands
    #[command(subcommand)]
    Vehicle(VehicleCommands),

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Record and correct trips
    #[command(subcommand)]
    Trip(TripCommands),

    /// Show a vehicle's ledger for one year
    Ledger {
        /// Vehicle registration number
        vehicle: String,

        /// Year to show (defaults to the current year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Opening balance commands
    #[command(subcommand)]
    OpeningBalance(OpeningBalanceCommands),

    /// Admin cash book commands
    #[command(subcommand)]
    Cash(CashCommands),

    /// Booking commands
    #[command(subcommand)]
    Booking(BookingCommands),

    /// Vehicle service history commands
    #[command(subcommand)]
    ServiceLog(ServiceLogCommands),

    /// Trip sheet commands
    #[command(subcommand)]
    TripSheet(TripSheetCommands),

    /// Per-vehicle monthly totals
    Summary {
        /// Month to show (YYYY-MM); omit for every month
        #[arg(short, long)]
        month: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Export ledgers to CSV
    #[command(subcommand)]
    Export(ExportCommands),
}

#[derive(Subcommand)]
pub enum VehicleCommands {
    /// Add a vehicle
    Add {
        /// Registration number (e.g. "KL 58 AB 1234")
        vehicle_no: String,

        /// Register the vehicle as inactive
        #[arg(long)]
        inactive: bool,
    },

    /// List vehicles with their next service date
    List {
        /// Only vehicles that can be booked
        #[arg(long)]
        active: bool,
    },

    /// Show vehicle details
    Show {
        vehicle: String,
    },

    /// Change a vehicle's number or status
    Update {
        vehicle: String,

        /// New registration number
        #[arg(long)]
        number: Option<String>,

        /// New status: active, inactive
        #[arg(long, value_parser = parse_vehicle_status)]
        status: Option<VehicleStatus>,
    },

    /// Remove a vehicle nothing refers to
    Remove {
        vehicle: String,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Add a user
    Add {
        name: String,

        email: String,

        /// Role: admin, driver
        #[arg(short, long, default_value = "driver", value_parser = parse_role)]
        role: Role,

        /// Registration number of a vehicle assigned to the user (repeatable)
        #[arg(long = "vehicle")]
        vehicles: Vec<String>,
    },

    /// List users
    List,
}

/// Trip fields; on `add` the date, vehicle and route are required.
#[derive(Args)]
pub struct TripArgs {
    /// Trip date (YYYY-MM-DD, defaults to today on add)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Vehicle registration number
    #[arg(long)]
    pub vehicle: Option<String>,

    /// Driver user id (defaults to the acting user)
    #[arg(long)]
    pub driver: Option<Uuid>,

    /// Route description (e.g. "Kochi - Munnar")
    #[arg(long)]
    pub route: Option<String>,

    #[arg(long, value_parser = parse_non_negative_cents)]
    pub income: Option<Cents>,

    #[arg(long, value_parser = parse_non_negative_cents)]
    pub fuel: Option<Cents>,

    #[arg(long, value_parser = parse_non_negative_cents)]
    pub fasttag: Option<Cents>,

    #[arg(long, value_parser = parse_non_negative_cents)]
    pub driver_allowance: Option<Cents>,

    #[arg(long, value_parser = parse_non_negative_cents)]
    pub service: Option<Cents>,

    #[arg(long, value_parser = parse_non_negative_cents)]
    pub bank_deposit: Option<Cents>,

    #[arg(long, value_parser = parse_non_negative_cents)]
    pub other_expense: Option<Cents>,

    #[arg(short, long)]
    pub notes: Option<String>,
}

#[derive(Subcommand)]
pub enum TripCommands {
    /// Record a trip
    Add(TripArgs),

    /// Show a trip
    Show { id: Uuid },

    /// Change a trip; omitted fields keep their value
    Edit {
        id: Uuid,

        #[command(flatten)]
        changes: TripArgs,
    },

    /// Delete a trip
    Delete { id: Uuid },

    /// List every trip of a vehicle in ledger order
    List { vehicle: String },
}

#[derive(Subcommand)]
pub enum OpeningBalanceCommands {
    /// Set the balance a vehicle carries into a year
    Set {
        vehicle: String,

        #[arg(short, long)]
        year: i32,

        /// Amount (e.g. "1500.00")
        #[arg(value_parser = parse_non_negative_cents)]
        amount: Cents,
    },

    /// List opening balances
    List {
        #[arg(short, long)]
        year: Option<i32>,
    },
}

#[derive(Subcommand)]
pub enum CashCommands {
    /// Show the cash book with running balances
    List {
        /// From date (YYYY-MM-DD), inclusive
        #[arg(long)]
        from: Option<NaiveDate>,

        /// To date (YYYY-MM-DD), inclusive
        #[arg(long)]
        to: Option<NaiveDate>,

        #[arg(long)]
        json: bool,
    },

    /// Record a cash entry
    Add {
        description: String,

        #[arg(value_parser = parse_non_negative_cents)]
        amount: Cents,

        /// Entry type: income, expense
        #[arg(short = 't', long = "type", value_parser = parse_entry_type)]
        entry_type: EntryType,

        /// Entry date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Change a cash entry; omitted fields keep their value
    Edit {
        id: Uuid,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_parser = parse_non_negative_cents)]
        amount: Option<Cents>,

        #[arg(short = 't', long = "type", value_parser = parse_entry_type)]
        entry_type: Option<EntryType>,

        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Delete a cash entry
    Delete { id: Uuid },
}

/// The reservation slice of a booking.
#[derive(Args)]
pub struct WindowArgs {
    /// First day of the journey (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: NaiveDate,

    /// Last day of the journey (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: NaiveDate,

    /// Pick-up time on the first day (HH:MM)
    #[arg(long)]
    pub start_time: ClockTime,

    /// Drop time on the last day (HH:MM)
    #[arg(long)]
    pub end_time: ClockTime,
}

#[derive(Subcommand)]
pub enum BookingCommands {
    /// Request a booking
    Add {
        /// Vehicle registration number
        vehicle: String,

        #[command(flatten)]
        window: WindowArgs,

        #[arg(long)]
        customer: String,

        #[arg(long)]
        phone: String,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        pickup: String,

        #[arg(long)]
        destination: String,

        #[arg(long, default_value_t = 1)]
        persons: u32,

        #[arg(long, default_value_t = 0)]
        kilometers: i64,

        #[arg(long, value_parser = parse_non_negative_cents)]
        advance: Option<Cents>,

        #[arg(long, value_parser = parse_non_negative_cents)]
        total: Option<Cents>,
    },

    /// List bookings
    List {
        /// Status: pending, approved, rejected
        #[arg(long, value_parser = parse_booking_status)]
        status: Option<BookingStatus>,

        #[arg(long)]
        vehicle: Option<String>,

        /// Bookings ending on or after this date
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Bookings starting on or before this date
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Show booking details
    Show { id: Uuid },

    /// Move a booking to another window or vehicle
    Reschedule {
        id: Uuid,

        #[command(flatten)]
        window: WindowArgs,

        /// Vehicle registration number (defaults to the booked vehicle)
        #[arg(long)]
        vehicle: Option<String>,
    },

    /// Approve a pending booking
    Approve { id: Uuid },

    /// Reject a pending booking
    Reject { id: Uuid },

    /// Delete a booking
    Delete { id: Uuid },

    /// Check whether a vehicle is free
    Check {
        vehicle: String,

        #[command(flatten)]
        window: WindowArgs,

        /// Ignore this booking (the one being edited)
        #[arg(long)]
        exclude: Option<Uuid>,
    },
}

/// Service log fields; on `add` the date, odometer and category are required.
#[derive(Args)]
pub struct ServiceArgs {
    /// Service date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long)]
    pub odometer: Option<i64>,

    /// e.g. "Regular Service", "Repair", "Tyre Change"
    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, value_parser = parse_non_negative_cents)]
    pub parts: Option<Cents>,

    #[arg(long, value_parser = parse_non_negative_cents)]
    pub labour: Option<Cents>,

    #[arg(long)]
    pub provider: Option<String>,

    #[arg(long)]
    pub make: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub year: Option<i32>,

    /// Date the next service is due (marks a follow-up as required)
    #[arg(long)]
    pub next_service: Option<NaiveDate>,

    #[arg(long)]
    pub follow_up_notes: Option<String>,

    /// Mark the follow-up as done
    #[arg(long)]
    pub completed: bool,
}

#[derive(Subcommand)]
pub enum ServiceLogCommands {
    /// Service history of a vehicle, newest first
    List { vehicle: String },

    /// Record a service
    Add {
        vehicle: String,

        #[command(flatten)]
        details: ServiceArgs,
    },

    /// Change a service log; omitted fields keep their value
    Edit {
        vehicle: String,

        id: Uuid,

        #[command(flatten)]
        changes: ServiceArgs,
    },

    /// Delete a service log
    Delete { vehicle: String, id: Uuid },
}

/// Trip sheet fields. Every one is optional.
#[derive(Args)]
pub struct TripSheetArgs {
    /// Sheet date (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long)]
    pub guest: Option<String>,

    #[arg(long)]
    pub vehicle_type: Option<String>,

    #[arg(long)]
    pub reg_no: Option<String>,

    #[arg(long)]
    pub details: Option<String>,

    #[arg(long)]
    pub garage_km_start: Option<i64>,

    #[arg(long)]
    pub pickup_km: Option<i64>,

    #[arg(long)]
    pub drop_km: Option<i64>,

    #[arg(long)]
    pub garage_km_end: Option<i64>,

    #[arg(long)]
    pub garage_time_start: Option<String>,

    #[arg(long)]
    pub pickup_time: Option<String>,

    #[arg(long)]
    pub drop_time: Option<String>,

    #[arg(long)]
    pub garage_time_end: Option<String>,

    #[arg(long)]
    pub starting_date: Option<NaiveDate>,

    #[arg(long)]
    pub closing_date: Option<NaiveDate>,

    #[arg(long, value_parser = parse_non_negative_cents)]
    pub bill: Option<Cents>,

    #[arg(long)]
    pub driver: Option<String>,

    #[arg(long)]
    pub customer: Option<String>,
}

#[derive(Subcommand)]
pub enum TripSheetCommands {
    /// Issue a new trip sheet
    Add(TripSheetArgs),

    /// List trip sheets
    List {
        #[arg(long)]
        from: Option<NaiveDate>,

        #[arg(long)]
        to: Option<NaiveDate>,

        /// Registration number contains (any case)
        #[arg(long)]
        reg_no: Option<String>,

        /// Guest name contains (any case)
        #[arg(long)]
        guest: Option<String>,
    },

    /// Show a trip sheet
    Show { id: Uuid },

    /// Change a trip sheet; its number stays
    Edit {
        id: Uuid,

        #[command(flatten)]
        changes: TripSheetArgs,
    },

    /// Delete a trip sheet
    Delete { id: Uuid },

    /// Print the sheet as text
    Render {
        id: Uuid,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// One year of a vehicle ledger
    Ledger {
        vehicle: String,

        #[arg(short, long)]
        year: Option<i32>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// The admin cash book
    Cash {
        #[arg(long)]
        from: Option<NaiveDate>,

        #[arg(long)]
        to: Option<NaiveDate>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn parse_vehicle_status(s: &str) -> Result<VehicleStatus, String> {
    VehicleStatus::from_str(s)
        .ok_or_else(|| format!("invalid vehicle status '{}'. Valid: active, inactive", s))
}

fn parse_role(s: &str) -> Result<Role, String> {
    Role::from_str(s).ok_or_else(|| format!("invalid role '{}'. Valid: admin, driver", s))
}

fn parse_entry_type(s: &str) -> Result<EntryType, String> {
    EntryType::from_str(s)
        .ok_or_else(|| format!("invalid entry type '{}'. Valid: income, expense", s))
}

fn parse_booking_status(s: &str) -> Result<BookingStatus, String> {
    BookingStatus::from_str(s).ok_or_else(|| {
        format!(
            "invalid booking status '{}'. Valid: pending, approved, rejected",
            s
        )
    })
}

impl Cli {
    pub async fn run(self, settings: Settings) -> Result<()> {
        let settings = settings.with_database(self.database.clone());

        match self.command {
            Commands::Init => {
                FleetService::init_url(&settings.database_url()).await?;
                println!("Database initialized: {}", settings.database);
            }

            Commands::Serve { bind } => {
                let settings = match bind {
                    Some(bind) => settings.with_bind_address(bind),
                    None => settings,
                };
                let service = FleetService::init_url(&settings.database_url()).await?;
                let state = AppState {
                    service,
                    letterhead: settings.letterhead.clone(),
                };
                api::serve(state, &settings.bind_address).await?;
            }

            command => {
                let service = FleetService::connect(&settings.database)
                    .await
                    .with_context(|| {
                        format!(
                            "Failed to open {}. Run `fleetbook init` first",
                            settings.database
                        )
                    })?;
                let actor = match &self.user {
                    Some(email) => service.actor_for_email(email).await?,
                    None => Actor::system_admin(),
                };
                commands::dispatch(&service, &actor, &settings, command).await?;
            }
        }
        Ok(())
    }
}
