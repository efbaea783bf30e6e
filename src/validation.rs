//! Client-side form checks.
//!
//! These only catch obvious mistakes before a round trip; the API performs
//! its own validation and its messages are shown verbatim.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

use crate::models::{ClosedDate, NewUser, RegisterRequest, SlotDefinition};
use crate::roles::Role;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const SLOT_CAPACITY_RANGE: std::ops::RangeInclusive<u32> = 1..=50;
pub const ADVANCE_DAYS_RANGE: std::ops::RangeInclusive<u32> = 1..=30;

static REGISTRATION_NO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^EN[0-9]{6}$").expect("valid regex"));
static INDEX_NO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{2}ENG[0-9]{3}$").expect("valid regex"));
static BATCH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{2}$").expect("valid regex"));
static TEL_NO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("valid regex"));

/// The message text is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please fill in all required fields")]
    MissingRequired,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least 6 characters")]
    PasswordTooShort,
    #[error("Registration No must be in format: EN100100")]
    RegistrationNo,
    #[error("Index No must be in format: 22ENG001")]
    IndexNo,
    #[error("Batch must be 2 digits")]
    Batch,
    #[error("Tel No must be 10 digits")]
    TelNo,
    #[error("Slot name is required")]
    SlotNameRequired,
    #[error("A slot named \"{0}\" already exists")]
    DuplicateSlot(String),
    #[error("Capacity must be between 1 and 50")]
    Capacity,
    #[error("Slot must end after it starts")]
    SlotTimes,
    #[error("Advance booking days must be between 1 and 30")]
    AdvanceDays,
    #[error("A reason is required to close a date")]
    ClosureReason,
    #[error("Cannot close a date in the past")]
    ClosedDateInPast,
}

/// Optional member details shared by self-registration and admin forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    pub registration_no: String,
    pub index_no: String,
    pub batch: String,
    pub tel_no: String,
}

/// Normalised optional fields: blanks become `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckedProfile {
    pub registration_no: Option<String>,
    pub index_no: Option<String>,
    pub batch: Option<String>,
    pub tel_no: Option<String>,
}

impl ProfileFields {
    pub fn validate(&self) -> Result<CheckedProfile, ValidationError> {
        let checks: [(&str, &Regex, ValidationError); 4] = [
            (self.registration_no.as_str(), &*REGISTRATION_NO, ValidationError::RegistrationNo),
            (self.index_no.as_str(), &*INDEX_NO, ValidationError::IndexNo),
            (self.batch.as_str(), &*BATCH, ValidationError::Batch),
            (self.tel_no.as_str(), &*TEL_NO, ValidationError::TelNo),
        ];
        for (value, pattern, error) in checks {
            let value = value.trim();
            if !value.is_empty() && !pattern.is_match(value) {
                return Err(error);
            }
        }

        Ok(CheckedProfile {
            registration_no: non_blank(&self.registration_no),
            index_no: non_blank(&self.index_no),
            batch: non_blank(&self.batch),
            tel_no: non_blank(&self.tel_no),
        })
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Self-registration form.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub profile: ProfileFields,
}

impl RegistrationForm {
    /// Checks run in the order the messages are meant to surface.
    pub fn validate(&self) -> Result<RegisterRequest, ValidationError> {
        if [&self.name, &self.email, &self.password, &self.confirm_password]
            .iter()
            .any(|f| f.trim().is_empty())
        {
            return Err(ValidationError::MissingRequired);
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort);
        }
        let profile = self.profile.validate()?;

        Ok(RegisterRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            registration_no: profile.registration_no,
            index_no: profile.index_no,
            batch: profile.batch,
            tel_no: profile.tel_no,
        })
    }
}

/// Admin "add user" form.
#[derive(Debug, Clone, Default)]
pub struct NewUserForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub profile: ProfileFields,
}

impl NewUserForm {
    pub fn validate(&self) -> Result<NewUser, ValidationError> {
        if [&self.name, &self.email, &self.password]
            .iter()
            .any(|f| f.trim().is_empty())
        {
            return Err(ValidationError::MissingRequired);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort);
        }
        let profile = self.profile.validate()?;

        Ok(NewUser {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            role: self.role,
            registration_no: profile.registration_no,
            index_no: profile.index_no,
            batch: profile.batch,
            tel_no: profile.tel_no,
        })
    }
}

// ==================== Settings ====================

/// Check a slot about to be stored at `position` in `existing` (`None` for
/// an appended slot).
pub fn validate_slot(
    slot: &SlotDefinition,
    existing: &[SlotDefinition],
    position: Option<usize>,
) -> Result<(), ValidationError> {
    if slot.name.trim().is_empty() {
        return Err(ValidationError::SlotNameRequired);
    }
    if !SLOT_CAPACITY_RANGE.contains(&slot.capacity) {
        return Err(ValidationError::Capacity);
    }
    if slot.end_time <= slot.start_time {
        return Err(ValidationError::SlotTimes);
    }
    let clash = existing
        .iter()
        .enumerate()
        .any(|(i, other)| Some(i) != position && other.name == slot.name);
    if clash {
        return Err(ValidationError::DuplicateSlot(slot.name.clone()));
    }
    Ok(())
}

pub fn validate_advance_days(days: u32) -> Result<(), ValidationError> {
    if ADVANCE_DAYS_RANGE.contains(&days) {
        Ok(())
    } else {
        Err(ValidationError::AdvanceDays)
    }
}

pub fn validate_closed_date(closed: &ClosedDate, today: NaiveDate) -> Result<(), ValidationError> {
    if closed.reason.trim().is_empty() {
        return Err(ValidationError::ClosureReason);
    }
    if closed.date < today {
        return Err(ValidationError::ClosedDateInPast);
    }
    Ok(())
}
