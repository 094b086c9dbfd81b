mod common;

use anyhow::Result;
use chrono::Utc;
use common::{add_user, add_vehicle, admin, booking, clock, date, db_url, test_service};
use fleetbook::application::ErrorKind;
use fleetbook::domain::{
    format_booking_no, AvailabilityRequest, Booking, BookingStatus, ReservationWindow, Role,
    VehicleId, VehicleStatus,
};
use fleetbook::storage::{BookingFilter, Repository};

fn request(vehicle_id: VehicleId, start: &str, end: &str, t0: &str, t1: &str) -> AvailabilityRequest {
    AvailabilityRequest::new(ReservationWindow {
        vehicle_id,
        start_date: date(start),
        end_date: date(end),
        start_time: clock(t0),
        end_time: clock(t1),
    })
}

#[tokio::test]
async fn test_multi_day_bookings_conflict_on_shared_date() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let v = add_vehicle(&service, "KL 58 C 3001").await?;

    let held = service
        .create_booking(&admin(), booking(v.id, "2025-01-10", "2025-01-12", "09:00", "18:00"))
        .await?;
    service
        .set_booking_status(&admin(), held.id, BookingStatus::Approved)
        .await?;

    // Times are irrelevant once either side spans several days
    let availability = service
        .check_availability(&request(v.id, "2025-01-12", "2025-01-14", "19:00", "20:00"))
        .await?;
    assert!(!availability.available);
    assert_eq!(availability.conflicts.len(), 1);
    assert_eq!(availability.conflicts[0].booking_no, held.booking_no);

    let free = service
        .check_availability(&request(v.id, "2025-01-13", "2025-01-14", "09:00", "18:00"))
        .await?;
    assert!(free.available);

    Ok(())
}

#[tokio::test]
async fn test_single_day_bookings_use_half_open_times() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let v = add_vehicle(&service, "KL 58 C 3002").await?;

    let held = service
        .create_booking(&admin(), booking(v.id, "2025-02-01", "2025-02-01", "09:00", "12:00"))
        .await?;
    service
        .set_booking_status(&admin(), held.id, BookingStatus::Approved)
        .await?;

    let overlapping = service
        .check_availability(&request(v.id, "2025-02-01", "2025-02-01", "11:00", "14:00"))
        .await?;
    assert!(!overlapping.available);

    let touching = service
        .check_availability(&request(v.id, "2025-02-01", "2025-02-01", "12:00", "15:00"))
        .await?;
    assert!(touching.available);

    Ok(())
}

#[tokio::test]
async fn test_pending_blocks_and_rejected_frees_the_vehicle() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let v = add_vehicle(&service, "KL 58 C 3003").await?;

    let first = service
        .create_booking(&admin(), booking(v.id, "2025-03-05", "2025-03-05", "08:00", "10:00"))
        .await?;

    let err = service
        .create_booking(&admin(), booking(v.id, "2025-03-05", "2025-03-05", "09:00", "11:00"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let conflicts = err.conflicts().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].booking_id, first.id);

    service
        .set_booking_status(&admin(), first.id, BookingStatus::Rejected)
        .await?;
    let second = service
        .create_booking(&admin(), booking(v.id, "2025-03-05", "2025-03-05", "09:00", "11:00"))
        .await?;
    assert_eq!(second.status, BookingStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn test_excluded_booking_never_conflicts_with_itself() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let v = add_vehicle(&service, "KL 58 C 3004").await?;

    let b = service
        .create_booking(&admin(), booking(v.id, "2025-04-01", "2025-04-03", "06:00", "22:00"))
        .await?;

    let same = request(v.id, "2025-04-01", "2025-04-03", "06:00", "22:00");
    assert!(!service.check_availability(&same).await?.available);
    assert!(service.check_availability(&same.excluding(b.id)).await?.available);

    // Editing the booking over its own window is allowed
    let mut details = b.details.clone();
    details.trip_end_time = clock("23:00");
    let edited = service.update_booking(&admin(), b.id, details).await?;
    assert_eq!(edited.details.trip_end_time, clock("23:00"));

    Ok(())
}

#[tokio::test]
async fn test_approval_rechecks_availability() -> Result<()> {
    let (service, temp) = test_service().await?;
    let v = add_vehicle(&service, "KL 58 C 3005").await?;

    let pending = service
        .create_booking(&admin(), booking(v.id, "2025-05-10", "2025-05-10", "10:00", "16:00"))
        .await?;

    // Another writer approves an overlapping booking in the meantime
    let repo = Repository::connect(&db_url(&temp)).await?;
    let mut rival = Booking::new(
        "BK-20250501-999".to_string(),
        date("2025-05-01"),
        booking(v.id, "2025-05-10", "2025-05-10", "15:00", "18:00"),
        v.vehicle_no.clone(),
        admin().user_id,
    );
    rival.status = BookingStatus::Approved;
    repo.insert_booking(repo.pool(), &rival).await?;
    repo.pool().close().await;

    let err = service
        .set_booking_status(&admin(), pending.id, BookingStatus::Approved)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.conflicts().unwrap()[0].booking_id, rival.id);

    // Nothing was written
    let reloaded = service.get_booking(&admin(), pending.id).await?;
    assert_eq!(reloaded.status, BookingStatus::Pending);

    // Rejecting needs no availability
    let rejected = service
        .set_booking_status(&admin(), pending.id, BookingStatus::Rejected)
        .await?;
    assert_eq!(rejected.status, BookingStatus::Rejected);

    Ok(())
}

#[tokio::test]
async fn test_status_transitions() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let v = add_vehicle(&service, "KL 58 C 3006").await?;

    let b = service
        .create_booking(&admin(), booking(v.id, "2025-06-01", "2025-06-01", "09:00", "10:00"))
        .await?;

    let err = service
        .set_booking_status(&admin(), b.id, BookingStatus::Pending)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    service
        .set_booking_status(&admin(), b.id, BookingStatus::Approved)
        .await?;
    let err = service
        .set_booking_status(&admin(), b.id, BookingStatus::Rejected)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    Ok(())
}

#[tokio::test]
async fn test_booking_numbers_count_per_day() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let v = add_vehicle(&service, "KL 58 C 3007").await?;
    let today = Utc::now().date_naive();

    let first = service
        .create_booking(&admin(), booking(v.id, "2025-07-01", "2025-07-01", "09:00", "10:00"))
        .await?;
    let second = service
        .create_booking(&admin(), booking(v.id, "2025-07-02", "2025-07-02", "09:00", "10:00"))
        .await?;
    assert_eq!(first.booking_no, format_booking_no(today, 0));
    assert_eq!(second.booking_no, format_booking_no(today, 1));
    assert_eq!(first.total_days, 1);
    assert_eq!(first.booking_date, today);

    // Deleting the latest booking does not free its number for reuse
    service.delete_booking(&admin(), second.id).await?;
    let third = service
        .create_booking(&admin(), booking(v.id, "2025-07-03", "2025-07-04", "09:00", "10:00"))
        .await?;
    assert_eq!(third.booking_no, format_booking_no(today, 2));
    assert_eq!(third.total_days, 2);

    service.delete_booking(&admin(), first.id).await?;
    service.delete_booking(&admin(), third.id).await?;
    let fourth = service
        .create_booking(&admin(), booking(v.id, "2025-07-05", "2025-07-05", "09:00", "10:00"))
        .await?;
    assert_eq!(fourth.booking_no, format_booking_no(today, 3));

    Ok(())
}

#[tokio::test]
async fn test_booking_validation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let v = add_vehicle(&service, "KL 58 C 3008").await?;

    let err = service
        .create_booking(&admin(), booking(v.id, "2025-08-05", "2025-08-01", "09:00", "10:00"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut missing_phone = booking(v.id, "2025-08-01", "2025-08-01", "09:00", "10:00");
    missing_phone.customer_phone = "  ".to_string();
    let err = service
        .create_booking(&admin(), missing_phone)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    service
        .update_vehicle(&admin(), v.id, None, Some(VehicleStatus::Inactive))
        .await?;
    let err = service
        .create_booking(&admin(), booking(v.id, "2025-08-01", "2025-08-01", "09:00", "10:00"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .create_booking(
            &admin(),
            booking(uuid::Uuid::new_v4(), "2025-08-01", "2025-08-01", "09:00", "10:00"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_driver_booking_permissions() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let v = add_vehicle(&service, "KL 58 C 3009").await?;
    let ravi = add_user(&service, "Ravi", Role::Driver).await?;
    let manu = add_user(&service, "Manu", Role::Driver).await?;

    let own = service
        .create_booking(&ravi, booking(v.id, "2025-09-01", "2025-09-01", "09:00", "10:00"))
        .await?;
    service
        .create_booking(&manu, booking(v.id, "2025-09-02", "2025-09-02", "09:00", "10:00"))
        .await?;

    // Drivers only ever see their own bookings
    let listed = service.list_bookings(&ravi, BookingFilter::default()).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, own.id);
    assert_eq!(service.list_bookings(&admin(), BookingFilter::default()).await?.len(), 2);

    let err = service.get_booking(&manu, own.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // The creator may edit while pending
    let mut details = own.details.clone();
    details.total_persons = 6;
    service.update_booking(&ravi, own.id, details.clone()).await?;

    let err = service
        .set_booking_status(&ravi, own.id, BookingStatus::Approved)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    service
        .set_booking_status(&admin(), own.id, BookingStatus::Approved)
        .await?;

    // Once decided, only an admin may change or remove it
    let err = service
        .update_booking(&ravi, own.id, details.clone())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = service.delete_booking(&ravi, own.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    details.total_persons = 7;
    let edited = service.update_booking(&admin(), own.id, details).await?;
    assert_eq!(edited.details.total_persons, 7);
    assert_eq!(edited.status, BookingStatus::Approved);

    Ok(())
}

#[tokio::test]
async fn test_rescheduling_rechecks_availability() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let v = add_vehicle(&service, "KL 58 C 3010").await?;

    service
        .create_booking(&admin(), booking(v.id, "2025-10-01", "2025-10-01", "09:00", "12:00"))
        .await?;
    let other = service
        .create_booking(&admin(), booking(v.id, "2025-10-02", "2025-10-02", "09:00", "12:00"))
        .await?;

    let mut moved = other.details.clone();
    moved.journey_start_date = date("2025-10-01");
    moved.journey_return_date = date("2025-10-01");
    moved.trip_start_time = clock("11:00");
    let err = service
        .update_booking(&admin(), other.id, moved.clone())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    moved.trip_start_time = clock("12:00");
    moved.trip_end_time = clock("13:00");
    let edited = service.update_booking(&admin(), other.id, moved).await?;
    assert_eq!(edited.details.journey_start_date, date("2025-10-01"));

    Ok(())
}

#[tokio::test]
async fn test_booking_filters() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a = add_vehicle(&service, "KL 58 C 3011").await?;
    let b = add_vehicle(&service, "KL 58 C 3012").await?;

    let jan = service
        .create_booking(&admin(), booking(a.id, "2025-01-05", "2025-01-06", "09:00", "10:00"))
        .await?;
    service
        .create_booking(&admin(), booking(b.id, "2025-03-05", "2025-03-05", "09:00", "10:00"))
        .await?;
    service
        .set_booking_status(&admin(), jan.id, BookingStatus::Approved)
        .await?;

    let approved = service
        .list_bookings(&admin(), BookingFilter::default().with_status(BookingStatus::Approved))
        .await?;
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].id, jan.id);

    let on_b = service
        .list_bookings(&admin(), BookingFilter::default().with_vehicle(b.id))
        .await?;
    assert_eq!(on_b.len(), 1);
    assert_eq!(on_b[0].vehicle_no, "KL 58 C 3012");

    let february_on = BookingFilter {
        start_date: Some(date("2025-02-01")),
        ..Default::default()
    };
    assert_eq!(service.list_bookings(&admin(), february_on).await?.len(), 1);

    Ok(())
}
