//! Gym Portal Library
//!
//! Client side of the gym slot-booking portal: the availability resolver,
//! the check-in code timer, and the screens that sit on top of the remote
//! booking API.

pub mod admin;
pub mod api;
pub mod auth;
pub mod availability;
pub mod checkin;
pub mod config;
pub mod error;
pub mod models;
pub mod notice;
pub mod portal;
pub mod qr_timer;
pub mod roles;
pub mod session;
pub mod traits;
pub mod validation;

// Re-export commonly used types
pub use admin::{AdminConsole, DashboardSummary, dashboard_summary};
pub use api::PortalApiClient;
pub use availability::{
    DateBounds,
    Ineligible,
    SlotStatus,
    check_request,
    // Resolver
    date_selection_bounds,
    display_remaining,
    effective_snapshot,
    is_bookable,
    is_bookable_by_name,
    is_disabled,
    is_full,
    remaining_capacity,
    slot_status,
    slot_statuses,
};
pub use checkin::{CheckInCode, CheckInDesk, ScanOutcome};
pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use models::{
    AvailabilitySnapshot, Booking, BookingRequest, ClosedDate, GymConfiguration, SlotDefinition,
    SlotOverride, User,
};
pub use notice::{ActionError, ActionResult, Notice, NoticeKind};
pub use portal::{AvailabilityTicket, BookingPortal, SlotCard};
pub use qr_timer::{QrSessionTimer, TimerEvent, format_countdown, run_countdown};
pub use roles::{Action, Role, Route, RouteDecision, guard};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore};
pub use traits::{Clock, MockClock, SystemClock};
pub use validation::{NewUserForm, ProfileFields, RegistrationForm, ValidationError};
