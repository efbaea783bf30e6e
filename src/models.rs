//! Wire types exchanged with the gym booking API.
//!
//! The backend speaks camelCase JSON with Mongo-style `_id` keys. Dates
//! arrive either as plain `YYYY-MM-DD` strings or as full ISO timestamps,
//! so date fields go through [`calendar_date`].

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roles::Role;

// ==================== Gym configuration ====================

/// Gym-wide booking settings, as served by `/bookings/settings` and
/// `/admin/settings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GymConfiguration {
    pub booking_enabled: bool,
    pub max_advance_booking_days: u32,
    #[serde(default)]
    pub slots: Vec<SlotDefinition>,
    #[serde(default)]
    pub closed_dates: Vec<ClosedDate>,
    /// Fields this client does not model (`_id`, timestamps). Kept so that a
    /// read-modify-write of the settings document does not drop them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GymConfiguration {
    /// Look up a slot definition by its unique name.
    pub fn slot(&self, name: &str) -> Option<&SlotDefinition> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Slots members may pick from, in configuration order.
    pub fn enabled_slots(&self) -> impl Iterator<Item = &SlotDefinition> {
        self.slots.iter().filter(|s| s.enabled)
    }

    /// The closure entry for `date`, if an administrator closed it.
    pub fn closure_on(&self, date: NaiveDate) -> Option<&ClosedDate> {
        self.closed_dates.iter().find(|c| c.date == date)
    }
}

/// A named, time-bounded, capacity-limited session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDefinition {
    pub name: String,
    #[serde(with = "time_of_day")]
    pub start_time: NaiveTime,
    #[serde(with = "time_of_day")]
    pub end_time: NaiveTime,
    pub capacity: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// A date on which the gym takes no bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedDate {
    #[serde(with = "calendar_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub reason: String,
}

// ==================== Availability ====================

/// Booking counts and per-date overrides for every slot on one date.
///
/// Every field defaults, so an empty snapshot means "open, nothing booked".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AvailabilitySnapshot {
    pub is_closed: bool,
    pub closure_reason: Option<String>,
    pub slot_counts: HashMap<String, u32>,
    pub slot_capacities: HashMap<String, SlotOverride>,
}

impl AvailabilitySnapshot {
    /// Bookings already placed for `slot`; absent slots count as zero.
    pub fn booked(&self, slot: &str) -> u32 {
        self.slot_counts.get(slot).copied().unwrap_or(0)
    }

    pub fn override_for(&self, slot: &str) -> Option<&SlotOverride> {
        self.slot_capacities.get(slot)
    }
}

/// Per-date view of a slot's capacity and enabled flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotOverride {
    pub capacity: Option<u32>,
    pub enabled: Option<bool>,
}

// ==================== Bookings ====================

/// The candidate a member is about to submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub slot: String,
    #[serde(with = "calendar_date")]
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub user: Option<UserRef>,
    pub slot: String,
    #[serde(with = "calendar_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Id of the member who owns the booking, whether or not the backend
    /// populated the user document.
    pub fn owner_id(&self) -> Option<&str> {
        match self.user.as_ref()? {
            UserRef::Id(id) => Some(id),
            UserRef::Profile(profile) => profile.id.as_deref(),
        }
    }
}

/// A booking's owner: a bare id, or the populated user document on admin
/// listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Id(String),
    Profile(UserSummary),
}

/// The subset of a user the backend embeds in bookings and attendance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSummary {
    #[serde(rename = "_id", alias = "id")]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub registration_no: Option<String>,
    pub index_no: Option<String>,
}

/// Query parameters for the admin booking list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookingFilter {
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "opt_calendar_date::serialize"
    )]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
}

// ==================== Users & auth ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub registration_no: Option<String>,
    #[serde(default)]
    pub index_no: Option<String>,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub tel_no: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Self-registration payload. Empty optional fields are sent as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub registration_no: Option<String>,
    pub index_no: Option<String>,
    pub batch: Option<String>,
    pub tel_no: Option<String>,
}

/// Admin-created account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub registration_no: Option<String>,
    pub index_no: Option<String>,
    pub batch: Option<String>,
    pub tel_no: Option<String>,
}

/// Admin edit of an existing account. Passwords are not editable here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub registration_no: Option<String>,
    pub index_no: Option<String>,
    pub batch: Option<String>,
    pub tel_no: Option<String>,
}

impl From<&User> for UserUpdate {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            registration_no: user.registration_no.clone(),
            index_no: user.index_no.clone(),
            batch: user.batch.clone(),
            tel_no: user.tel_no.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCheck {
    #[serde(default)]
    pub is_admin: bool,
}

/// The `{ "msg": ... }` envelope most mutations answer with.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub msg: String,
}

// ==================== QR check-in ====================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrToken {
    pub qr_token: String,
    #[serde(default)]
    pub user_data: UserSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub qr_token: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub user: Option<UserSummary>,
    pub slot: String,
    #[serde(with = "calendar_date")]
    pub date: NaiveDate,
    pub check_in_time: DateTime<Utc>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub scanned_by: Option<UserSummary>,
}

/// Result of an admin scanning a member's code.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScanResult {
    #[serde(default)]
    pub msg: Option<String>,
    pub attendance: AttendanceRecord,
    pub booking: Booking,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStatistics {
    #[serde(default)]
    pub today_attendances: u32,
    #[serde(default)]
    pub today_bookings: u32,
    /// Percentage; the backend sometimes formats it as a string.
    #[serde(default, deserialize_with = "number_or_string")]
    pub attendance_rate: f64,
}

// ==================== serde helpers ====================

fn default_true() -> bool {
    true
}

fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Parse a calendar date from `YYYY-MM-DD` or a full ISO-8601 timestamp.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

/// `YYYY-MM-DD` on the way out; date or timestamp on the way in.
pub mod calendar_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&date.format("%Y-%m-%d"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_calendar_date(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}")))
    }
}

mod opt_calendar_date {
    use chrono::NaiveDate;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => super::calendar_date::serialize(date, s),
            None => s.serialize_none(),
        }
    }
}

/// `HH:MM` time of day, as produced by an HTML time input.
pub mod time_of_day {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMATS: [&str; 3] = ["%H:%M", "%H:%M:%S", "%I:%M %p"];

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        let raw = raw.trim();
        FORMATS
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&time.format("%H:%M"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time of day: {raw}")))
    }
}
