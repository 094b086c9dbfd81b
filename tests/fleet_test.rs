mod common;

use anyhow::Result;
use common::{add_user, add_vehicle, admin, booking, date, db_url, test_service, trip};
use fleetbook::application::{ErrorKind, NewUser};
use fleetbook::domain::{Role, ServiceDetails, TripSheetDetails, User, Vehicle, VehicleStatus};
use fleetbook::storage::{is_unique_violation, Repository, TripSheetFilter};

fn service_details(day: &str, parts: i64, labour: i64) -> ServiceDetails {
    ServiceDetails {
        make: Some("Toyota".to_string()),
        model: Some("Innova".to_string()),
        year: Some(2019),
        service_date: date(day),
        odometer_reading: 84_000,
        service_category: "Regular Service".to_string(),
        description: None,
        parts_cost: parts,
        labour_cost: labour,
        service_provider: Some("Kannur Motors".to_string()),
        follow_up_required: false,
        follow_up_completed: false,
        follow_up_notes: None,
        next_service_date: None,
    }
}

fn sheet(guest: &str, reg_no: &str, day: &str) -> TripSheetDetails {
    TripSheetDetails {
        trip_sheet_date: Some(date(day)),
        guest_name: guest.to_string(),
        vehicle_reg_no: reg_no.to_string(),
        garage_km_start: Some(1200),
        garage_km_end: Some(1450),
        ..Default::default()
    }
}

// ========================
// Vehicles
// ========================

#[tokio::test]
async fn test_vehicle_numbers_are_unique_after_normalizing() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let vehicle = add_vehicle(&service, " kl 58 d 4001 ").await?;
    assert_eq!(vehicle.vehicle_no, "KL 58 D 4001");

    let err = add_vehicle(&service, "KL 58 D 4001").await.unwrap_err();
    let err = err.downcast::<fleetbook::AppError>()?;
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let found = service.get_vehicle_by_no("kl 58 d 4001").await?;
    assert_eq!(found.id, vehicle.id);

    let err = service
        .create_vehicle(&admin(), "   ", VehicleStatus::Active)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    Ok(())
}

#[tokio::test]
async fn test_duplicates_written_behind_the_service_are_conflicts() -> Result<()> {
    let (service, temp) = test_service().await?;

    // Another writer gets there first
    let repo = Repository::connect(&db_url(&temp)).await?;
    repo.save_vehicle(&Vehicle::new("KL 58 D 4020")).await?;
    repo.save_user(&User::new("Ravi", "ravi@fleet.test", Role::Driver)).await?;
    let err = repo
        .save_vehicle(&Vehicle::new("KL 58 D 4020"))
        .await
        .unwrap_err();
    assert!(is_unique_violation(&err));
    repo.pool().close().await;

    let err = service
        .create_vehicle(&admin(), "kl 58 d 4020", VehicleStatus::Active)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("KL 58 D 4020"));

    let err = service
        .create_user(
            &admin(),
            NewUser {
                name: "Ravi".to_string(),
                email: "ravi@fleet.test".to_string(),
                role: Role::Driver,
                assigned_vehicles: Vec::new(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    Ok(())
}

#[tokio::test]
async fn test_update_vehicle() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a = add_vehicle(&service, "KL 58 D 4002").await?;
    add_vehicle(&service, "KL 58 D 4003").await?;

    let err = service
        .update_vehicle(&admin(), a.id, Some("kl 58 d 4003"), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Renaming to its own number is not a clash
    let updated = service
        .update_vehicle(&admin(), a.id, Some("KL 58 D 4002"), Some(VehicleStatus::Inactive))
        .await?;
    assert_eq!(updated.status, VehicleStatus::Inactive);

    let active = service.list_active_vehicles().await?;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].vehicle_no, "KL 58 D 4003");

    Ok(())
}

#[tokio::test]
async fn test_vehicle_admin_only() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let driver = add_user(&service, "Ravi", Role::Driver).await?;

    let err = service
        .create_vehicle(&driver, "KL 58 D 4004", VehicleStatus::Active)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(
        service.list_vehicles(&driver).await.unwrap_err().kind(),
        ErrorKind::Forbidden
    );

    // Active vehicles are visible to everyone for booking
    add_vehicle(&service, "KL 58 D 4004").await?;
    assert_eq!(service.list_active_vehicles().await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_vehicle_overview_shows_next_open_service() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let v = add_vehicle(&service, "KL 58 D 4005").await?;

    let mut done = service_details("2025-01-10", 100, 50);
    done.follow_up_required = true;
    done.follow_up_completed = true;
    done.next_service_date = Some(date("2025-02-01"));
    service.create_service_log(&admin(), v.id, done).await?;

    let mut later = service_details("2025-02-10", 100, 50);
    later.follow_up_required = true;
    later.next_service_date = Some(date("2025-06-01"));
    service.create_service_log(&admin(), v.id, later).await?;

    let mut sooner = service_details("2025-03-10", 100, 50);
    sooner.follow_up_required = true;
    sooner.next_service_date = Some(date("2025-04-15"));
    service.create_service_log(&admin(), v.id, sooner).await?;

    let overview = service.list_vehicles(&admin()).await?;
    assert_eq!(overview.len(), 1);
    assert_eq!(overview[0].next_service_date, Some(date("2025-04-15")));

    Ok(())
}

#[tokio::test]
async fn test_delete_vehicle_in_use_is_refused() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let used = add_vehicle(&service, "KL 58 D 4006").await?;
    let booked = add_vehicle(&service, "KL 58 D 4007").await?;
    let idle = add_vehicle(&service, "KL 58 D 4008").await?;

    service
        .create_trip(&admin(), trip(used.id, "2025-01-01", 1000, 0))
        .await?;
    service
        .create_booking(&admin(), booking(booked.id, "2025-01-01", "2025-01-01", "09:00", "10:00"))
        .await?;
    service
        .set_opening_balance(&admin(), idle.id, 2025, 5000)
        .await?;

    for id in [used.id, booked.id] {
        let err = service.delete_vehicle(&admin(), id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    // Opening balances go with the vehicle
    service.delete_vehicle(&admin(), idle.id).await?;
    assert_eq!(
        service.get_vehicle(&admin(), idle.id).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert!(service.list_opening_balances(&admin(), None).await?.is_empty());

    Ok(())
}

// ========================
// Users
// ========================

#[tokio::test]
async fn test_create_user_validation() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .create_user(
            &admin(),
            NewUser {
                name: "".to_string(),
                email: "not-an-email".to_string(),
                role: Role::Driver,
                assigned_vehicles: Vec::new(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    add_user(&service, "Ravi", Role::Driver).await?;
    let err = service
        .create_user(
            &admin(),
            NewUser {
                name: "Ravi K".to_string(),
                email: "RAVI@fleet.test".to_string(),
                role: Role::Admin,
                assigned_vehicles: Vec::new(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = service
        .create_user(
            &admin(),
            NewUser {
                name: "Manu".to_string(),
                email: "manu@fleet.test".to_string(),
                role: Role::Driver,
                assigned_vehicles: vec![uuid::Uuid::new_v4()],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_actor_for_email() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let v = add_vehicle(&service, "KL 58 D 4009").await?;

    let user = service
        .create_user(
            &admin(),
            NewUser {
                name: "Suresh".to_string(),
                email: "suresh@fleet.test".to_string(),
                role: Role::Admin,
                assigned_vehicles: vec![v.id],
            },
        )
        .await?;
    assert_eq!(user.assigned_vehicles, vec![v.id]);

    let actor = service.actor_for_email(" Suresh@Fleet.test ").await?;
    assert_eq!(actor.user_id, user.id);
    assert!(actor.is_admin());

    let err = service.actor_for_email("nobody@fleet.test").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let users = service.list_users(&admin()).await?;
    assert_eq!(users.len(), 1);

    Ok(())
}

// ========================
// Service logs
// ========================

#[tokio::test]
async fn test_service_log_lifecycle() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let v = add_vehicle(&service, "KL 58 D 4010").await?;
    let other = add_vehicle(&service, "KL 58 D 4011").await?;

    let older = service
        .create_service_log(&admin(), v.id, service_details("2025-01-05", 2500, 800))
        .await?;
    assert_eq!(older.total_cost, 3300);
    assert_eq!(older.vehicle_no, "KL 58 D 4010");

    let newer = service
        .create_service_log(&admin(), v.id, service_details("2025-03-05", 1000, 0))
        .await?;

    let logs = service.list_service_logs(&admin(), v.id).await?;
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].id, newer.id);
    assert_eq!(logs[1].id, older.id);

    // Total is recomputed from the edited costs
    let edited = service
        .update_service_log(&admin(), v.id, older.id, service_details("2025-01-05", 2000, 1000))
        .await?;
    assert_eq!(edited.total_cost, 3000);

    // A log is only reachable through its own vehicle
    let err = service
        .delete_service_log(&admin(), other.id, older.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    service.delete_service_log(&admin(), v.id, older.id).await?;
    assert_eq!(service.list_service_logs(&admin(), v.id).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_service_log_validation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let v = add_vehicle(&service, "KL 58 D 4012").await?;
    let driver = add_user(&service, "Ravi", Role::Driver).await?;

    let mut bad = service_details("2025-01-05", -1, 0);
    bad.service_category = " ".to_string();
    let err = service
        .create_service_log(&admin(), v.id, bad)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .create_service_log(&driver, v.id, service_details("2025-01-05", 0, 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    Ok(())
}

// ========================
// Trip sheets
// ========================

#[tokio::test]
async fn test_trip_sheet_numbers_start_at_1001() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let first = service
        .create_trip_sheet(&admin(), sheet("Mr. Nair", "KL 58 D 4013", "2025-01-10"))
        .await?;
    let second = service
        .create_trip_sheet(&admin(), sheet("Ms. Rao", "KL 58 D 4014", "2025-01-11"))
        .await?;
    assert_eq!(first.trip_sheet_no, "TS-1001");
    assert_eq!(second.trip_sheet_no, "TS-1002");
    assert_eq!(first.total_km(), Some(250));

    // Numbering continues from the highest sheet on file
    service.delete_trip_sheet(&admin(), first.id).await?;
    let third = service
        .create_trip_sheet(&admin(), TripSheetDetails::default())
        .await?;
    assert_eq!(third.trip_sheet_no, "TS-1003");

    Ok(())
}

#[tokio::test]
async fn test_trip_sheet_filters() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service
        .create_trip_sheet(&admin(), sheet("Mr. Nair", "KL 58 D 4015", "2025-01-10"))
        .await?;
    service
        .create_trip_sheet(&admin(), sheet("Ms. Rao", "KL 58 D 4016", "2025-02-10"))
        .await?;
    service
        .create_trip_sheet(&admin(), sheet("Dr. Nair", "KL 58 D 4016", "2025-03-10"))
        .await?;

    let all = service
        .list_trip_sheets(&admin(), TripSheetFilter::default())
        .await?;
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].trip_sheet_date, date("2025-03-10"));

    let nairs = service
        .list_trip_sheets(
            &admin(),
            TripSheetFilter {
                guest_name: Some("nair".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(nairs.len(), 2);

    let by_reg = service
        .list_trip_sheets(
            &admin(),
            TripSheetFilter {
                vehicle_reg: Some("d 4016".to_string()),
                start_date: Some(date("2025-03-01")),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(by_reg.len(), 1);
    assert_eq!(by_reg[0].details.guest_name, "Dr. Nair");

    Ok(())
}

#[tokio::test]
async fn test_trip_sheet_update_keeps_number() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let created = service
        .create_trip_sheet(&admin(), sheet("Mr. Nair", "KL 58 D 4017", "2025-01-10"))
        .await?;

    let mut details = created.details.clone();
    details.guest_name = "Mr. K. Nair".to_string();
    details.total_bill_amount = Some(450000);
    let updated = service
        .update_trip_sheet(&admin(), created.id, details)
        .await?;
    assert_eq!(updated.trip_sheet_no, created.trip_sheet_no);

    let reloaded = service.get_trip_sheet(&admin(), created.id).await?;
    assert_eq!(reloaded.trip_sheet_no, "TS-1001");
    assert_eq!(reloaded.details.guest_name, "Mr. K. Nair");
    assert_eq!(reloaded.details.total_bill_amount, Some(450000));

    let mut bad = reloaded.details.clone();
    bad.starting_date = Some(date("2025-01-12"));
    bad.closing_date = Some(date("2025-01-10"));
    let err = service
        .update_trip_sheet(&admin(), created.id, bad)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    Ok(())
}
