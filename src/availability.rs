//! Slot availability and booking eligibility.
//!
//! Everything here is a pure function of a [`GymConfiguration`], the
//! [`AvailabilitySnapshot`] for one date and the slot being asked about.
//! Nothing is fetched or cached, so it is safe to call on every render.
//!
//! The server remains the authority: a slot reported bookable here can
//! still be rejected at submission if another member took the last seat.

use chrono::{Days, NaiveDate};
use thiserror::Error;

use crate::models::{AvailabilitySnapshot, BookingRequest, GymConfiguration, SlotDefinition};

/// Seats left in `slot`.
///
/// Capacity comes from the snapshot's per-date override when present, then
/// from the configuration's definition of the slot, then from `slot` itself.
/// The result may be negative if a slot was overbooked; use
/// [`display_remaining`] before showing it.
pub fn remaining_capacity(
    config: &GymConfiguration,
    snapshot: &AvailabilitySnapshot,
    slot: &SlotDefinition,
) -> i64 {
    let capacity = snapshot
        .override_for(&slot.name)
        .and_then(|o| o.capacity)
        .or_else(|| config.slot(&slot.name).map(|s| s.capacity))
        .unwrap_or(slot.capacity);

    i64::from(capacity) - i64::from(snapshot.booked(&slot.name))
}

pub fn is_full(
    config: &GymConfiguration,
    snapshot: &AvailabilitySnapshot,
    slot: &SlotDefinition,
) -> bool {
    remaining_capacity(config, snapshot, slot) <= 0
}

/// A slot is disabled when its own definition, the configuration's copy of
/// it, or the date's override says `enabled: false`. A slot the
/// configuration does not know is disabled too.
pub fn is_disabled(
    config: &GymConfiguration,
    snapshot: &AvailabilitySnapshot,
    slot: &SlotDefinition,
) -> bool {
    let overridden_off = snapshot
        .override_for(&slot.name)
        .and_then(|o| o.enabled)
        .is_some_and(|enabled| !enabled);
    let configured_off = config.slot(&slot.name).is_none_or(|s| !s.enabled);

    overridden_off || configured_off || !slot.enabled
}

pub fn is_bookable(
    config: &GymConfiguration,
    snapshot: &AvailabilitySnapshot,
    slot: &SlotDefinition,
) -> bool {
    config.booking_enabled
        && !snapshot.is_closed
        && !is_disabled(config, snapshot, slot)
        && !is_full(config, snapshot, slot)
}

/// [`is_bookable`] for a slot referenced by name.
pub fn is_bookable_by_name(
    config: &GymConfiguration,
    snapshot: &AvailabilitySnapshot,
    slot_name: &str,
) -> bool {
    config
        .slot(slot_name)
        .is_some_and(|slot| is_bookable(config, snapshot, slot))
}

/// Remaining seats clamped at zero for display.
pub fn display_remaining(remaining: i64) -> u32 {
    u32::try_from(remaining.max(0)).unwrap_or(u32::MAX)
}

// ==================== Date window ====================

/// Inclusive range of dates a member may pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBounds {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

impl DateBounds {
    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.min..=self.max).contains(&date)
    }

    /// Every selectable date, in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let max = self.max;
        self.min.iter_days().take_while(move |d| *d <= max)
    }
}

/// Today through `today + maxAdvanceBookingDays`, inclusive.
pub fn date_selection_bounds(config: &GymConfiguration, today: NaiveDate) -> DateBounds {
    let max = today
        .checked_add_days(Days::new(u64::from(config.max_advance_booking_days)))
        .unwrap_or(NaiveDate::MAX);
    DateBounds { min: today, max }
}

// ==================== Classification ====================

/// What a slot card shows for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStatus {
    Available { remaining: u32 },
    Full,
    Disabled,
    DateClosed { reason: Option<String> },
    BookingClosed,
}

impl SlotStatus {
    pub fn is_bookable(&self) -> bool {
        matches!(self, SlotStatus::Available { .. })
    }

    pub fn label(&self) -> String {
        match self {
            SlotStatus::Available { remaining } => format!("{remaining} spots left"),
            SlotStatus::Full => "FULL".to_string(),
            SlotStatus::Disabled => "DISABLED".to_string(),
            SlotStatus::DateClosed { reason: Some(reason) } => format!("CLOSED ({reason})"),
            SlotStatus::DateClosed { reason: None } => "CLOSED".to_string(),
            SlotStatus::BookingClosed => "BOOKING CLOSED".to_string(),
        }
    }
}

/// Classify one slot. Gym-wide reasons win over slot-specific ones, and a
/// disabled slot reads as disabled even when it is also full.
pub fn slot_status(
    config: &GymConfiguration,
    snapshot: &AvailabilitySnapshot,
    slot: &SlotDefinition,
) -> SlotStatus {
    if !config.booking_enabled {
        SlotStatus::BookingClosed
    } else if snapshot.is_closed {
        SlotStatus::DateClosed {
            reason: snapshot.closure_reason.clone(),
        }
    } else if is_disabled(config, snapshot, slot) {
        SlotStatus::Disabled
    } else if is_full(config, snapshot, slot) {
        SlotStatus::Full
    } else {
        SlotStatus::Available {
            remaining: display_remaining(remaining_capacity(config, snapshot, slot)),
        }
    }
}

/// Status of every enabled slot, in configuration order.
pub fn slot_statuses<'a>(
    config: &'a GymConfiguration,
    snapshot: &AvailabilitySnapshot,
) -> Vec<(&'a SlotDefinition, SlotStatus)> {
    config
        .enabled_slots()
        .map(|slot| (slot, slot_status(config, snapshot, slot)))
        .collect()
}

/// Fold the configuration's closed-date list into a snapshot fetched for
/// `date`, so a closure is honoured even if the availability endpoint did
/// not report it.
pub fn effective_snapshot(
    config: &GymConfiguration,
    snapshot: &AvailabilitySnapshot,
    date: NaiveDate,
) -> AvailabilitySnapshot {
    let mut snapshot = snapshot.clone();
    if let Some(closure) = config.closure_on(date) {
        snapshot.is_closed = true;
        if snapshot.closure_reason.is_none() {
            snapshot.closure_reason = Some(closure.reason.clone());
        }
    }
    snapshot
}

// ==================== Pre-submission check ====================

/// Why a booking request should not be sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Ineligible {
    #[error("The booking system is currently closed")]
    BookingClosed,
    #[error(
        "The gym is closed on this date: {}",
        .reason.as_deref().unwrap_or("no reason given")
    )]
    DateClosed { reason: Option<String> },
    #[error("Bookings are only open from {} to {}", .bounds.min, .bounds.max)]
    OutsideWindow { bounds: DateBounds },
    #[error("Unknown slot: {0}")]
    UnknownSlot(String),
    #[error("This slot is disabled")]
    SlotDisabled,
    #[error("This slot is full")]
    SlotFull,
}

/// Check a request against everything the client knows before submitting
/// it. Returns the seats left on success.
pub fn check_request(
    config: &GymConfiguration,
    snapshot: &AvailabilitySnapshot,
    request: &BookingRequest,
    today: NaiveDate,
) -> Result<u32, Ineligible> {
    let bounds = date_selection_bounds(config, today);
    if !bounds.contains(request.date) {
        return Err(Ineligible::OutsideWindow { bounds });
    }

    let slot = config
        .slot(&request.slot)
        .ok_or_else(|| Ineligible::UnknownSlot(request.slot.clone()))?;
    let snapshot = effective_snapshot(config, snapshot, request.date);

    match slot_status(config, &snapshot, slot) {
        SlotStatus::Available { remaining } => Ok(remaining),
        SlotStatus::Full => Err(Ineligible::SlotFull),
        SlotStatus::Disabled => Err(Ineligible::SlotDisabled),
        SlotStatus::DateClosed { reason } => Err(Ineligible::DateClosed { reason }),
        SlotStatus::BookingClosed => Err(Ineligible::BookingClosed),
    }
}
