//! Integration tests for the API client.
//!
//! These tests use wiremock to simulate the booking API and verify request
//! shapes, response parsing and error handling.

use chrono::NaiveDate;
use gym_portal::{
    api::PortalApiClient,
    config::NetworkConfig,
    error::ApiError,
    models::{BookingFilter, BookingRequest, ClosedDate, LoginRequest, UserRef},
    roles::Role,
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

fn network() -> NetworkConfig {
    NetworkConfig {
        request_timeout_secs: 10,
        connect_timeout_secs: 5,
    }
}

fn client(server: &MockServer) -> PortalApiClient {
    PortalApiClient::new(&format!("{}/api", server.uri()), &network())
        .expect("Client creation should succeed")
        .with_token("secret-token")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Test that both auth headers are sent.
#[tokio::test]
async fn test_token_sent_in_both_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("x-auth-token", "secret-token"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "u1",
            "name": "Ann",
            "email": "ann@example.com",
            "role": "student"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let user = client(&mock_server).me().await.unwrap();
    assert_eq!(user.id, "u1");
    assert_eq!(user.role, Role::Member);
}

/// Test login posts credentials and parses the token.
#[tokio::test]
async fn test_login_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "email": "ann@example.com", "password": "hunter22" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "jwt",
            "user": { "id": "u1", "name": "Ann", "email": "ann@example.com", "role": "admin" }
        })))
        .mount(&mock_server)
        .await;

    let client = PortalApiClient::new(&format!("{}/api", mock_server.uri()), &network()).unwrap();
    let response = client
        .login(&LoginRequest {
            email: "ann@example.com".to_string(),
            password: "hunter22".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(response.token, "jwt");
    assert_eq!(response.user.role, Role::Admin);
}

/// Test that authenticated calls fail locally without a token.
#[tokio::test]
async fn test_requires_token() {
    let mock_server = MockServer::start().await;
    let client = PortalApiClient::new(&format!("{}/api", mock_server.uri()), &network()).unwrap();

    let result = client.my_bookings().await;
    assert!(matches!(result, Err(ApiError::NotLoggedIn)));
}

/// Test settings parsing, including 12-hour slot times.
#[tokio::test]
async fn test_booking_settings() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/bookings/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "s1",
            "bookingEnabled": true,
            "maxAdvanceBookingDays": 7,
            "slots": [
                { "name": "Morning", "startTime": "06:00", "endTime": "08:00", "capacity": 15, "enabled": true },
                { "name": "4:00 PM - 6:00 PM", "startTime": "4:00 PM", "endTime": "6:00 PM", "capacity": 10 }
            ],
            "closedDates": [ { "date": "2024-06-01T00:00:00.000Z", "reason": "Holiday" } ]
        })))
        .mount(&mock_server)
        .await;

    let settings = client(&mock_server).booking_settings().await.unwrap();
    assert!(settings.booking_enabled);
    assert_eq!(settings.max_advance_booking_days, 7);
    assert_eq!(settings.slots.len(), 2);
    assert!(settings.slots[1].enabled);
    assert_eq!(settings.slots[1].start_time.format("%H:%M").to_string(), "16:00");
    assert_eq!(settings.closure_on(date(2024, 6, 1)).unwrap().reason, "Holiday");
    assert!(settings.extra.contains_key("_id"));
}

/// Test availability for a date.
#[tokio::test]
async fn test_availability() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/bookings/availability/2024-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "isClosed": false,
            "slotCounts": { "Morning": 7 },
            "slotCapacities": { "Morning": { "capacity": 12, "enabled": true } }
        })))
        .mount(&mock_server)
        .await;

    let snapshot = client(&mock_server)
        .availability(date(2024, 6, 1))
        .await
        .unwrap();
    assert!(!snapshot.is_closed);
    assert_eq!(snapshot.booked("Morning"), 7);
    assert_eq!(snapshot.booked("Evening"), 0);
    assert_eq!(snapshot.override_for("Morning").unwrap().capacity, Some(12));
}

/// Test the booking request body and message.
#[tokio::test]
async fn test_book_slot() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/bookings"))
        .and(body_json(json!({ "slot": "Morning", "date": "2024-06-02" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "msg": "Booking successful" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client(&mock_server)
        .book(&BookingRequest {
            slot: "Morning".to_string(),
            date: date(2024, 6, 2),
        })
        .await
        .unwrap();
    assert_eq!(response.msg, "Booking successful");
}

/// Test that the server's rejection message is kept verbatim.
#[tokio::test]
async fn test_rejection_message_verbatim() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/bookings"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "msg": "Slot is full" })),
        )
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .book(&BookingRequest {
            slot: "Morning".to_string(),
            date: date(2024, 6, 2),
        })
        .await
        .unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(400));
    assert_eq!(err.server_message(), Some("Slot is full"));
    assert_eq!(err.user_message("Error booking slot"), "Slot is full");
    assert!(err.to_string().contains("400"));
}

/// Test handling of HTTP 500 errors without a body.
#[tokio::test]
async fn test_server_error_uses_fallback() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/bookings/b1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).cancel_booking("b1").await.unwrap_err();
    assert!(err.to_string().contains("500"), "Error should mention status code");
    assert_eq!(err.user_message("Error canceling booking"), "Error canceling booking");
    assert!(!err.is_auth_failure());
}

/// Test that 401 is reported as an auth failure.
#[tokio::test]
async fn test_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "msg": "Token is not valid" })),
        )
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).me().await.unwrap_err();
    assert!(err.is_auth_failure());
    assert_eq!(err.server_message(), Some("Token is not valid"));
}

/// Test handling of malformed JSON response.
#[tokio::test]
async fn test_malformed_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/bookings/my"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server).my_bookings().await;
    assert!(matches!(result, Err(ApiError::Decode(_))));
}

/// Test that an empty success body still yields a message.
#[tokio::test]
async fn test_empty_mutation_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/admin/settings/closed-dates/2024-06-01"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let response = client(&mock_server)
        .remove_closed_date(date(2024, 6, 1))
        .await
        .unwrap();
    assert!(response.msg.is_empty());
}

/// Test the admin booking list filter and populated users.
#[tokio::test]
async fn test_admin_bookings_filter() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/bookings/admin/all"))
        .and(query_param("date", "2024-06-01"))
        .and(query_param("slot", "Morning"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "_id": "b1",
                "user": { "_id": "u1", "name": "Ann", "email": "ann@example.com", "registrationNo": "EN123456" },
                "slot": "Morning",
                "date": "2024-06-01T00:00:00.000Z",
                "createdAt": "2024-05-30T08:00:00.000Z"
            },
            { "_id": "b2", "user": "u2", "slot": "Morning", "date": "2024-06-01" }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let bookings = client(&mock_server)
        .all_bookings(&BookingFilter {
            date: Some(date(2024, 6, 1)),
            slot: Some("Morning".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(bookings.len(), 2);
    assert!(matches!(bookings[0].user, Some(UserRef::Profile(_))));
    assert_eq!(bookings[0].owner_id(), Some("u1"));
    assert_eq!(bookings[1].owner_id(), Some("u2"));
    assert_eq!(bookings[1].date, date(2024, 6, 1));
}

/// Test closing a date.
#[tokio::test]
async fn test_add_closed_date() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/admin/settings/closed-dates"))
        .and(body_json(json!({ "date": "2024-12-25", "reason": "Christmas" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "msg": "Closed date added" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client(&mock_server)
        .add_closed_date(&ClosedDate {
            date: date(2024, 12, 25),
            reason: "Christmas".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(response.msg, "Closed date added");
}

/// Test QR endpoints.
#[tokio::test]
async fn test_generate_and_scan_qr() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/qr/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "qrToken": "tok-1",
            "userData": { "name": "Ann", "email": "ann@example.com" }
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/qr/scan"))
        .and(body_json(json!({ "qrToken": "tok-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "msg": "Attendance marked",
            "attendance": {
                "_id": "a1",
                "user": { "_id": "u1", "name": "Ann", "email": "ann@example.com" },
                "slot": "Morning",
                "date": "2024-06-01",
                "checkInTime": "2024-06-01T06:05:00.000Z",
                "status": "present"
            },
            "booking": { "_id": "b1", "user": "u1", "slot": "Morning", "date": "2024-06-01" }
        })))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let token = client.generate_qr().await.unwrap();
    assert_eq!(token.qr_token, "tok-1");
    assert_eq!(token.user_data.name, "Ann");

    let result = client.scan(&token.qr_token).await.unwrap();
    assert_eq!(result.attendance.slot, "Morning");
    assert_eq!(result.booking.id, "b1");
}

/// Test statistics with the rate formatted as a string.
#[tokio::test]
async fn test_statistics_rate_as_string() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/qr/statistics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "todayAttendances": 3,
            "todayBookings": 4,
            "attendanceRate": "75.00"
        })))
        .mount(&mock_server)
        .await;

    let stats = client(&mock_server).statistics().await.unwrap();
    assert_eq!(stats.today_attendances, 3);
    assert_eq!(stats.today_bookings, 4);
    assert!((stats.attendance_rate - 75.0).abs() < f64::EPSILON);
}

/// Test attendance query parameter.
#[tokio::test]
async fn test_attendance_on_date() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/qr/attendance"))
        .and(query_param("date", "2024-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let records = client(&mock_server)
        .attendance_on(date(2024, 6, 1))
        .await
        .unwrap();
    assert!(records.is_empty());
}

/// Test timeout handling.
#[tokio::test]
async fn test_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/bookings/settings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "bookingEnabled": true, "maxAdvanceBookingDays": 7 }))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let config = NetworkConfig {
        request_timeout_secs: 1,
        connect_timeout_secs: 1,
    };
    let client = PortalApiClient::new(&format!("{}/api", mock_server.uri()), &config)
        .unwrap()
        .with_token("t");

    let result = client.booking_settings().await;
    assert!(matches!(result, Err(ApiError::Transport(_))), "Should time out");
}

/// Test connection refused handling.
#[tokio::test]
async fn test_connection_refused() {
    let client = PortalApiClient::new("http://127.0.0.1:1/api", &network())
        .unwrap()
        .with_token("t");

    let result = client.booking_settings().await;
    assert!(result.is_err(), "Should fail when server is unavailable");
}
