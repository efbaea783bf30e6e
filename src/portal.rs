//! Member booking screen state.
//!
//! Every mutation goes to the server and is followed by a refetch of the
//! availability for the selected date and of the member's own bookings. No
//! local state is patched optimistically.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::api::PortalApiClient;
use crate::availability::{
    DateBounds, Ineligible, SlotStatus, check_request, date_selection_bounds, effective_snapshot,
    slot_status,
};
use crate::error::ApiResult;
use crate::models::{AvailabilitySnapshot, Booking, BookingRequest, GymConfiguration, SlotDefinition};
use crate::notice::{ActionError, ActionResult, Notice, OrNotice};
use crate::traits::Clock;

pub const SETTINGS_UNAVAILABLE: &str = "Unable to load gym settings. Please try again later.";
pub const SELECT_A_SLOT: &str = "Please select a slot";

/// Identifies one availability fetch. Only the most recently issued ticket
/// for the currently selected date is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityTicket {
    pub date: NaiveDate,
    pub seq: u64,
}

/// Availability for one date as last applied.
#[derive(Debug, Clone, PartialEq)]
struct DatedSnapshot {
    date: NaiveDate,
    snapshot: AvailabilitySnapshot,
    /// The fetch failed and zero bookings are assumed.
    fallback: bool,
}

/// One row of the slot picker.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotCard {
    pub slot: SlotDefinition,
    pub status: SlotStatus,
    pub selected: bool,
}

pub struct BookingPortal {
    api: PortalApiClient,
    clock: Arc<dyn Clock>,
    config: Option<GymConfiguration>,
    selected_date: NaiveDate,
    selected_slot: Option<String>,
    availability: Option<DatedSnapshot>,
    last_ticket: u64,
    my_bookings: Vec<Booking>,
    notice: Option<Notice>,
}

impl BookingPortal {
    pub fn new(api: PortalApiClient, clock: Arc<dyn Clock>) -> Self {
        let selected_date = clock.today();
        Self {
            api,
            clock,
            config: None,
            selected_date,
            selected_slot: None,
            availability: None,
            last_ticket: 0,
            my_bookings: Vec::new(),
            notice: None,
        }
    }

    /// Fetch settings and the member's bookings, then availability for the
    /// selected date once settings are known.
    pub async fn load(&mut self) {
        self.load_settings().await;
        self.refresh_my_bookings().await;
        if self.config.is_some() {
            self.refresh_availability().await;
        }
    }

    pub async fn load_settings(&mut self) {
        match self.api.booking_settings().await {
            Ok(config) => {
                tracing::debug!(
                    slots = config.slots.len(),
                    booking_enabled = config.booking_enabled,
                    "Loaded gym settings"
                );
                self.config = Some(config);
            }
            Err(e) => {
                tracing::error!("Error fetching gym settings: {}", e);
                self.config = None;
                self.notice = Some(Notice::error(SETTINGS_UNAVAILABLE));
            }
        }
    }

    pub async fn refresh_my_bookings(&mut self) {
        match self.api.my_bookings().await {
            Ok(bookings) => self.my_bookings = bookings,
            Err(e) => tracing::warn!("Error fetching bookings: {}", e),
        }
    }

    // ==================== Availability ====================

    /// Issue a ticket for the selected date. Any ticket issued earlier
    /// becomes stale.
    pub fn begin_availability_fetch(&mut self) -> AvailabilityTicket {
        self.last_ticket += 1;
        AvailabilityTicket {
            date: self.selected_date,
            seq: self.last_ticket,
        }
    }

    /// Apply the outcome of the fetch `ticket` was issued for. Returns
    /// `false` when the result was discarded as stale.
    pub fn apply_availability(
        &mut self,
        ticket: AvailabilityTicket,
        result: ApiResult<AvailabilitySnapshot>,
    ) -> bool {
        if ticket.seq != self.last_ticket || ticket.date != self.selected_date {
            tracing::debug!(
                date = %ticket.date,
                seq = ticket.seq,
                latest = self.last_ticket,
                "Discarding stale availability"
            );
            return false;
        }

        let (snapshot, fallback) = match result {
            Ok(snapshot) => (snapshot, false),
            Err(e) => {
                tracing::warn!("Error fetching availability for {}: {}", ticket.date, e);
                (AvailabilitySnapshot::default(), true)
            }
        };
        self.availability = Some(DatedSnapshot {
            date: ticket.date,
            snapshot,
            fallback,
        });
        true
    }

    pub async fn refresh_availability(&mut self) {
        let ticket = self.begin_availability_fetch();
        let result = self.api.availability(ticket.date).await;
        self.apply_availability(ticket, result);
    }

    /// Availability for the selected date with configured closures folded
    /// in. Zero bookings are assumed until a snapshot arrives.
    pub fn snapshot(&self) -> AvailabilitySnapshot {
        let raw = self
            .availability
            .as_ref()
            .filter(|a| a.date == self.selected_date)
            .map(|a| a.snapshot.clone())
            .unwrap_or_default();
        match &self.config {
            Some(config) => effective_snapshot(config, &raw, self.selected_date),
            None => raw,
        }
    }

    /// Whether the shown availability is the zero-booking fallback.
    pub fn availability_is_fallback(&self) -> bool {
        self.availability
            .as_ref()
            .is_some_and(|a| a.date == self.selected_date && a.fallback)
    }

    // ==================== Selection ====================

    pub fn config(&self) -> Option<&GymConfiguration> {
        self.config.as_ref()
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn selected_slot(&self) -> Option<&str> {
        self.selected_slot.as_deref()
    }

    pub fn date_bounds(&self) -> Option<DateBounds> {
        self.config
            .as_ref()
            .map(|config| date_selection_bounds(config, self.clock.today()))
    }

    /// Move to another date without fetching. The slot selection is
    /// cleared, since the slot may not be bookable on the new date.
    pub fn set_date(&mut self, date: NaiveDate) -> Result<(), Ineligible> {
        if let Some(bounds) = self.date_bounds()
            && !bounds.contains(date)
        {
            return Err(Ineligible::OutsideWindow { bounds });
        }
        if date != self.selected_date {
            self.selected_date = date;
            self.selected_slot = None;
        }
        Ok(())
    }

    /// [`Self::set_date`] followed by an availability fetch.
    pub async fn select_date(&mut self, date: NaiveDate) -> Result<(), Ineligible> {
        self.set_date(date)?;
        if self.config.is_some() {
            self.refresh_availability().await;
        }
        Ok(())
    }

    /// Select a slot for the current date. Only bookable slots can be
    /// selected.
    pub fn select_slot(&mut self, name: &str) -> Result<(), Ineligible> {
        let config = self.config.as_ref().ok_or(Ineligible::BookingClosed)?;
        let slot = config
            .slot(name)
            .filter(|s| s.enabled)
            .ok_or_else(|| Ineligible::UnknownSlot(name.to_string()))?;

        match slot_status(config, &self.snapshot(), slot) {
            SlotStatus::Available { .. } => {
                self.selected_slot = Some(slot.name.clone());
                Ok(())
            }
            SlotStatus::Full => Err(Ineligible::SlotFull),
            SlotStatus::Disabled => Err(Ineligible::SlotDisabled),
            SlotStatus::DateClosed { reason } => Err(Ineligible::DateClosed { reason }),
            SlotStatus::BookingClosed => Err(Ineligible::BookingClosed),
        }
    }

    /// Slot picker rows for the selected date. Empty until settings load.
    pub fn slot_cards(&self) -> Vec<SlotCard> {
        let Some(config) = &self.config else {
            return Vec::new();
        };
        let snapshot = self.snapshot();
        config
            .enabled_slots()
            .map(|slot| SlotCard {
                slot: slot.clone(),
                status: slot_status(config, &snapshot, slot),
                selected: self.selected_slot.as_deref() == Some(slot.name.as_str()),
            })
            .collect()
    }

    // ==================== Mutations ====================

    /// Submit the selected slot for the selected date.
    pub async fn book(&mut self) -> ActionResult<String> {
        let result = self.try_book().await;
        self.record(&result);
        result
    }

    async fn try_book(&mut self) -> ActionResult<String> {
        let Some(slot) = self.selected_slot.clone() else {
            return Err(ActionError::Rejected(SELECT_A_SLOT.to_string()));
        };
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ActionError::Rejected(SETTINGS_UNAVAILABLE.to_string()))?;

        let request = BookingRequest {
            slot,
            date: self.selected_date,
        };
        check_request(config, &self.snapshot(), &request, self.clock.today())?;

        let response = self.api.book(&request).await.or_notice("Error booking slot")?;
        tracing::info!(slot = %request.slot, date = %request.date, "Slot booked");

        self.selected_slot = None;
        self.refresh_availability().await;
        self.refresh_my_bookings().await;
        Ok(response.msg)
    }

    pub async fn cancel(&mut self, booking_id: &str) -> ActionResult<String> {
        let result = self
            .api
            .cancel_booking(booking_id)
            .await
            .or_notice("Error canceling booking");

        if result.is_ok() {
            tracing::info!(booking_id, "Booking cancelled");
            self.refresh_my_bookings().await;
            if self.config.is_some() {
                self.refresh_availability().await;
            }
        }

        let result = result.map(|response| response.msg);
        self.record(&result);
        result
    }

    fn record(&mut self, result: &ActionResult<String>) {
        self.notice = Some(match result {
            Ok(msg) => Notice::success(msg.clone()),
            Err(e) => Notice::from(e),
        });
    }

    // ==================== My bookings ====================

    pub fn my_bookings(&self) -> &[Booking] {
        &self.my_bookings
    }

    /// Bookings from today on, soonest first.
    pub fn upcoming(&self) -> Vec<&Booking> {
        let today = self.clock.today();
        let mut upcoming: Vec<_> = self.my_bookings.iter().filter(|b| b.date >= today).collect();
        upcoming.sort_by_key(|b| b.date);
        upcoming
    }

    /// Bookings before today, most recent first.
    pub fn past(&self) -> Vec<&Booking> {
        let today = self.clock.today();
        let mut past: Vec<_> = self.my_bookings.iter().filter(|b| b.date < today).collect();
        past.sort_by_key(|b| std::cmp::Reverse(b.date));
        past
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveTime;

    use super::*;
    use crate::config::NetworkConfig;
    use crate::error::ApiError;
    use crate::traits::MockClock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn slot(name: &str, capacity: u32, enabled: bool) -> SlotDefinition {
        SlotDefinition {
            name: name.to_string(),
            start_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            capacity,
            enabled,
        }
    }

    fn portal() -> BookingPortal {
        let api = PortalApiClient::new("http://127.0.0.1:9/api", &NetworkConfig::default())
            .unwrap()
            .with_token("t");
        let mut portal = BookingPortal::new(api, Arc::new(MockClock::on_date(date(2024, 6, 1))));
        portal.config = Some(GymConfiguration {
            booking_enabled: true,
            max_advance_booking_days: 14,
            slots: vec![slot("Morning", 10, true), slot("Evening", 10, true), slot("Late", 5, false)],
            closed_dates: Vec::new(),
            extra: Default::default(),
        });
        portal
    }

    fn counts(pairs: &[(&str, u32)]) -> AvailabilitySnapshot {
        AvailabilitySnapshot {
            slot_counts: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect::<HashMap<_, _>>(),
            ..Default::default()
        }
    }

    fn booking(id: &str, on: NaiveDate) -> Booking {
        Booking {
            id: id.to_string(),
            user: None,
            slot: "Morning".to_string(),
            date: on,
            created_at: None,
        }
    }

    #[test]
    fn test_starts_on_today() {
        let portal = portal();
        assert_eq!(portal.selected_date(), date(2024, 6, 1));
        assert_eq!(
            portal.date_bounds(),
            Some(DateBounds {
                min: date(2024, 6, 1),
                max: date(2024, 6, 15)
            })
        );
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let mut portal = portal();

        portal.set_date(date(2024, 6, 2)).unwrap();
        let first = portal.begin_availability_fetch();
        portal.set_date(date(2024, 6, 3)).unwrap();
        let second = portal.begin_availability_fetch();

        // The later request answers first.
        assert!(portal.apply_availability(second, Ok(counts(&[("Morning", 3)]))));
        assert!(!portal.apply_availability(first, Ok(counts(&[("Morning", 9)]))));

        assert_eq!(portal.snapshot().booked("Morning"), 3);
    }

    #[test]
    fn test_older_ticket_for_same_date_is_discarded() {
        let mut portal = portal();
        let first = portal.begin_availability_fetch();
        let second = portal.begin_availability_fetch();

        assert!(portal.apply_availability(second, Ok(counts(&[("Evening", 4)]))));
        assert!(!portal.apply_availability(first, Ok(counts(&[("Evening", 1)]))));
        assert_eq!(portal.snapshot().booked("Evening"), 4);
    }

    #[test]
    fn test_failed_fetch_falls_back_to_zero_bookings() {
        let mut portal = portal();
        let ticket = portal.begin_availability_fetch();
        assert!(portal.apply_availability(ticket, Err(ApiError::NotLoggedIn)));

        assert!(portal.availability_is_fallback());
        assert_eq!(portal.snapshot(), AvailabilitySnapshot::default());
        let cards = portal.slot_cards();
        assert_eq!(cards[0].status, SlotStatus::Available { remaining: 10 });
    }

    #[test]
    fn test_slot_cards_list_enabled_slots_only() {
        let mut portal = portal();
        let ticket = portal.begin_availability_fetch();
        portal.apply_availability(ticket, Ok(counts(&[("Morning", 10), ("Evening", 7)])));

        let cards = portal.slot_cards();
        let names: Vec<_> = cards.iter().map(|c| c.slot.name.as_str()).collect();
        assert_eq!(names, ["Morning", "Evening"]);
        assert_eq!(cards[0].status, SlotStatus::Full);
        assert_eq!(cards[1].status, SlotStatus::Available { remaining: 3 });
    }

    #[test]
    fn test_select_slot_rejects_full_and_unknown() {
        let mut portal = portal();
        let ticket = portal.begin_availability_fetch();
        portal.apply_availability(ticket, Ok(counts(&[("Morning", 10)])));

        assert_eq!(portal.select_slot("Morning"), Err(Ineligible::SlotFull));
        assert_eq!(
            portal.select_slot("Late"),
            Err(Ineligible::UnknownSlot("Late".to_string()))
        );
        assert!(portal.select_slot("Evening").is_ok());
        assert_eq!(portal.selected_slot(), Some("Evening"));
        assert!(portal.slot_cards()[1].selected);
    }

    #[test]
    fn test_closed_date_from_settings_blocks_selection() {
        let mut portal = portal();
        if let Some(config) = portal.config.as_mut() {
            config.closed_dates.push(crate::models::ClosedDate {
                date: date(2024, 6, 1),
                reason: "Holiday".to_string(),
            });
        }

        assert_eq!(
            portal.select_slot("Morning"),
            Err(Ineligible::DateClosed {
                reason: Some("Holiday".to_string())
            })
        );
    }

    #[test]
    fn test_set_date_outside_window() {
        let mut portal = portal();
        assert!(matches!(
            portal.set_date(date(2024, 6, 16)),
            Err(Ineligible::OutsideWindow { .. })
        ));
        assert!(matches!(
            portal.set_date(date(2024, 5, 31)),
            Err(Ineligible::OutsideWindow { .. })
        ));
        assert!(portal.set_date(date(2024, 6, 15)).is_ok());
    }

    #[test]
    fn test_changing_date_clears_selection() {
        let mut portal = portal();
        portal.select_slot("Morning").unwrap();
        portal.set_date(date(2024, 6, 1)).unwrap();
        assert_eq!(portal.selected_slot(), Some("Morning"));

        portal.set_date(date(2024, 6, 2)).unwrap();
        assert_eq!(portal.selected_slot(), None);
    }

    #[tokio::test]
    async fn test_book_without_selection() {
        let mut portal = portal();
        let err = portal.book().await.unwrap_err();

        assert_eq!(err.to_string(), SELECT_A_SLOT);
        assert_eq!(portal.notice(), Some(&Notice::error(SELECT_A_SLOT)));
    }

    #[test]
    fn test_upcoming_and_past_split() {
        let mut portal = portal();
        portal.my_bookings = vec![
            booking("a", date(2024, 5, 20)),
            booking("b", date(2024, 6, 3)),
            booking("c", date(2024, 6, 1)),
            booking("d", date(2024, 5, 30)),
        ];

        let upcoming: Vec<_> = portal.upcoming().iter().map(|b| b.id.as_str()).collect();
        let past: Vec<_> = portal.past().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(upcoming, ["c", "b"]);
        assert_eq!(past, ["d", "a"]);
    }
}
