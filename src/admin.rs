//! Administration: gym settings, the booking ledger, user accounts and the
//! dashboard figures.
//!
//! Slot edits and the advance-days setting are read-modify-write of the
//! whole settings document, followed by a refetch so the console always
//! shows what the server stored.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::api::PortalApiClient;
use crate::models::{Booking, BookingFilter, ClosedDate, GymConfiguration, SlotDefinition, User, UserUpdate};
use crate::notice::{ActionError, ActionResult, OrNotice};
use crate::traits::Clock;
use crate::validation::{
    NewUserForm, ProfileFields, ValidationError, validate_advance_days, validate_closed_date,
    validate_slot,
};

/// How many bookings the dashboard lists.
pub const RECENT_BOOKINGS: usize = 5;

pub struct AdminConsole {
    api: PortalApiClient,
    clock: Arc<dyn Clock>,
    settings: Option<GymConfiguration>,
}

impl AdminConsole {
    pub fn new(api: PortalApiClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            clock,
            settings: None,
        }
    }

    // ==================== Settings ====================

    pub async fn load_settings(&mut self) -> ActionResult<&GymConfiguration> {
        let settings = self.api.admin_settings().await.or_notice("Error loading settings")?;
        Ok(&*self.settings.insert(settings))
    }

    /// Settings as last loaded, if any.
    pub fn settings(&self) -> Option<&GymConfiguration> {
        self.settings.as_ref()
    }

    pub async fn toggle_booking(&mut self) -> ActionResult<String> {
        let response = self
            .api
            .toggle_booking()
            .await
            .or_notice("Error toggling booking system")?;
        tracing::info!("Booking system toggled");
        self.refetch_settings().await;
        Ok(response.msg)
    }

    pub async fn add_slot(&mut self, slot: SlotDefinition) -> ActionResult<String> {
        let mut settings = self.editable_settings().await?;
        validate_slot(&slot, &settings.slots, None)?;
        settings.slots.push(slot);
        self.store_settings(&settings, "Slot added successfully", "Error adding slot")
            .await
    }

    /// Replace the slot at `index`.
    pub async fn update_slot(&mut self, index: usize, slot: SlotDefinition) -> ActionResult<String> {
        let mut settings = self.editable_settings().await?;
        let target = settings.slots.get_mut(index).ok_or_else(|| no_slot_at(index))?;
        *target = slot;
        validate_slot(&settings.slots[index], &settings.slots, Some(index))?;
        self.store_settings(&settings, "Slot updated successfully", "Error updating slot")
            .await
    }

    pub async fn delete_slot(&mut self, index: usize) -> ActionResult<String> {
        let mut settings = self.editable_settings().await?;
        if index >= settings.slots.len() {
            return Err(no_slot_at(index));
        }
        settings.slots.remove(index);
        self.store_settings(&settings, "Slot deleted successfully", "Error deleting slot")
            .await
    }

    /// Position of the slot called `name` in the loaded settings.
    pub async fn slot_index(&mut self, name: &str) -> ActionResult<usize> {
        let settings = self.editable_settings().await?;
        settings
            .slots
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| ActionError::Rejected(format!("Unknown slot: {name}")))
    }

    pub async fn set_advance_days(&mut self, days: u32) -> ActionResult<String> {
        validate_advance_days(days)?;
        let mut settings = self.editable_settings().await?;
        settings.max_advance_booking_days = days;
        self.store_settings(&settings, "Advance booking days updated", "Error updating settings")
            .await
    }

    pub async fn close_date(&mut self, closed: ClosedDate) -> ActionResult<String> {
        validate_closed_date(&closed, self.clock.today())?;
        self.api
            .add_closed_date(&closed)
            .await
            .or_notice("Error adding closed date")?;
        tracing::info!(date = %closed.date, reason = %closed.reason, "Date closed");
        self.refetch_settings().await;
        Ok("Date marked as closed".to_string())
    }

    pub async fn reopen_date(&mut self, date: NaiveDate) -> ActionResult<String> {
        self.api
            .remove_closed_date(date)
            .await
            .or_notice("Error removing closed date")?;
        tracing::info!(%date, "Closed date removed");
        self.refetch_settings().await;
        Ok("Closed date removed".to_string())
    }

    async fn editable_settings(&mut self) -> ActionResult<GymConfiguration> {
        match &self.settings {
            Some(settings) => Ok(settings.clone()),
            None => self.load_settings().await.cloned(),
        }
    }

    async fn store_settings(
        &mut self,
        settings: &GymConfiguration,
        success: &str,
        fallback: &str,
    ) -> ActionResult<String> {
        self.api.update_settings(settings).await.or_notice(fallback)?;
        tracing::info!("{}", success);
        self.refetch_settings().await;
        Ok(success.to_string())
    }

    /// Reload after a mutation. The mutation already succeeded, so a failed
    /// reload only drops the cached copy.
    async fn refetch_settings(&mut self) {
        match self.api.admin_settings().await {
            Ok(settings) => self.settings = Some(settings),
            Err(e) => {
                tracing::warn!("Error reloading settings: {}", e);
                self.settings = None;
            }
        }
    }

    // ==================== Bookings ====================

    pub async fn bookings(&self, filter: &BookingFilter) -> ActionResult<Vec<Booking>> {
        self.api
            .all_bookings(filter)
            .await
            .or_notice("Error loading bookings")
    }

    pub async fn delete_booking(&self, id: &str) -> ActionResult<String> {
        let response = self
            .api
            .delete_booking(id)
            .await
            .or_notice("Error deleting booking")?;
        tracing::info!(booking_id = id, "Booking deleted");
        Ok(response.msg)
    }

    /// Figures for the admin dashboard, over every booking.
    pub async fn summary(&self) -> ActionResult<DashboardSummary> {
        let bookings = self.bookings(&BookingFilter::default()).await?;
        Ok(dashboard_summary(&bookings, self.clock.today()))
    }

    // ==================== Users ====================

    pub async fn users(&self) -> ActionResult<Vec<User>> {
        self.api.users().await.or_notice("Error loading users")
    }

    pub async fn create_user(&self, form: &NewUserForm) -> ActionResult<String> {
        let user = form.validate()?;
        let response = self
            .api
            .create_user(&user)
            .await
            .or_notice("Error adding user")?;
        tracing::info!(email = %user.email, role = %user.role, "User created");
        Ok(response.msg)
    }

    pub async fn update_user(&self, id: &str, update: &UserUpdate) -> ActionResult<String> {
        validate_update(update)?;
        let response = self
            .api
            .update_user(id, update)
            .await
            .or_notice("Error updating user")?;
        tracing::info!(user_id = id, "User updated");
        Ok(response.msg)
    }

    /// Deleting a user also removes their bookings server-side.
    pub async fn delete_user(&self, id: &str) -> ActionResult<String> {
        let response = self
            .api
            .delete_user(id)
            .await
            .or_notice("Error deleting user")?;
        tracing::info!(user_id = id, "User deleted");
        Ok(response.msg)
    }
}

fn no_slot_at(index: usize) -> ActionError {
    ActionError::Rejected(format!("No slot at position {}", index + 1))
}

fn validate_update(update: &UserUpdate) -> Result<(), ValidationError> {
    if update.name.trim().is_empty() || update.email.trim().is_empty() {
        return Err(ValidationError::MissingRequired);
    }
    let profile = ProfileFields {
        registration_no: update.registration_no.clone().unwrap_or_default(),
        index_no: update.index_no.clone().unwrap_or_default(),
        batch: update.batch.clone().unwrap_or_default(),
        tel_no: update.tel_no.clone().unwrap_or_default(),
    };
    profile.validate().map(|_| ())
}

// ==================== Dashboard ====================

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub total_bookings: usize,
    pub today_bookings: usize,
    /// Distinct members with at least one booking.
    pub distinct_members: usize,
    pub recent: Vec<Booking>,
}

pub fn dashboard_summary(bookings: &[Booking], today: NaiveDate) -> DashboardSummary {
    let distinct_members = bookings
        .iter()
        .filter_map(Booking::owner_id)
        .collect::<HashSet<_>>()
        .len();

    let mut recent = bookings.to_vec();
    // Stable, so server order breaks ties between bookings without a
    // creation time.
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(RECENT_BOOKINGS);

    DashboardSummary {
        total_bookings: bookings.len(),
        today_bookings: bookings.iter().filter(|b| b.date == today).count(),
        distinct_members,
        recent,
    }
}
