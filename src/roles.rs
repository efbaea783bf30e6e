//! Roles, routes and what each role may reach.
//!
//! The portal knows two roles. Instead of sprinkling `role == admin` checks
//! across screens, every route and action is looked up here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Account role. Members are called "student" on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    #[serde(rename = "student", alias = "member")]
    Member,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "student",
            Role::Admin => "admin",
        }
    }

    /// Whether this role may perform `action`.
    pub fn can(self, action: Action) -> bool {
        match action {
            Action::BookSlot
            | Action::CancelOwnBooking
            | Action::GenerateCheckInCode
            | Action::ViewOwnAttendance => true,
            Action::ViewAllBookings
            | Action::DeleteAnyBooking
            | Action::ScanCheckInCode
            | Action::ViewAttendance
            | Action::ManageUsers
            | Action::ManageSettings => self == Role::Admin,
        }
    }

    /// Whether this role may open `route` once logged in.
    pub fn may_visit(self, route: Route) -> bool {
        match route.access() {
            Access::Public | Access::Private => true,
            Access::AdminOnly => self == Role::Admin,
        }
    }

    /// Sidebar entries, in display order.
    pub fn menu(self) -> &'static [MenuItem] {
        match self {
            Role::Admin => ADMIN_MENU,
            Role::Member => MEMBER_MENU,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" | "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Things a signed-in user can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    BookSlot,
    CancelOwnBooking,
    GenerateCheckInCode,
    ViewOwnAttendance,
    ViewAllBookings,
    DeleteAnyBooking,
    ScanCheckInCode,
    ViewAttendance,
    ManageUsers,
    ManageSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Dashboard,
    Booking,
    MyBookings,
    MyQrCode,
    AdminBookings,
    AdminScanner,
    AdminUsers,
    AdminSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Private,
    AdminOnly,
}

impl Route {
    pub const ALL: [Route; 10] = [
        Route::Login,
        Route::Register,
        Route::Dashboard,
        Route::Booking,
        Route::MyBookings,
        Route::MyQrCode,
        Route::AdminBookings,
        Route::AdminScanner,
        Route::AdminUsers,
        Route::AdminSettings,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Dashboard => "/dashboard",
            Route::Booking => "/booking",
            Route::MyBookings => "/my-bookings",
            Route::MyQrCode => "/my-qr",
            Route::AdminBookings => "/admin",
            Route::AdminScanner => "/admin/scanner",
            Route::AdminUsers => "/admin/users",
            Route::AdminSettings => "/admin/settings",
        }
    }

    pub fn access(self) -> Access {
        match self {
            Route::Login | Route::Register => Access::Public,
            Route::Dashboard | Route::Booking | Route::MyBookings | Route::MyQrCode => {
                Access::Private
            }
            Route::AdminBookings | Route::AdminScanner | Route::AdminUsers | Route::AdminSettings => {
                Access::AdminOnly
            }
        }
    }

    /// Resolve a path. `/` is an alias of the login page.
    pub fn from_path(path: &str) -> Option<Route> {
        if path == "/" {
            return Some(Route::Login);
        }
        Route::ALL.into_iter().find(|r| r.path() == path)
    }
}

/// Outcome of guarding a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    RedirectToLogin,
    RedirectToDashboard,
}

/// Decide whether a visitor with `role` (None when signed out) may open
/// `route`.
pub fn guard(role: Option<Role>, route: Route) -> RouteDecision {
    match (route.access(), role) {
        (Access::Public, _) => RouteDecision::Allow,
        (_, None) => RouteDecision::RedirectToLogin,
        (_, Some(role)) if role.may_visit(route) => RouteDecision::Allow,
        (_, Some(_)) => RouteDecision::RedirectToDashboard,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    pub label: &'static str,
    pub route: Route,
}

const ADMIN_MENU: &[MenuItem] = &[
    MenuItem { label: "Dashboard", route: Route::Dashboard },
    MenuItem { label: "All Bookings", route: Route::AdminBookings },
    MenuItem { label: "QR Scanner", route: Route::AdminScanner },
    MenuItem { label: "Users", route: Route::AdminUsers },
    MenuItem { label: "Settings", route: Route::AdminSettings },
    MenuItem { label: "Book Slot", route: Route::Booking },
];

const MEMBER_MENU: &[MenuItem] = &[
    MenuItem { label: "Dashboard", route: Route::Dashboard },
    MenuItem { label: "Book Gym", route: Route::Booking },
    MenuItem { label: "My Bookings", route: Route::MyBookings },
    MenuItem { label: "My QR Code", route: Route::MyQrCode },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Member).unwrap(), "\"student\"");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"member\"").unwrap(),
            Role::Member
        );
        assert_eq!(
            serde_json::from_str::<Role>("\"student\"").unwrap(),
            Role::Member
        );
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("member".parse::<Role>(), Ok(Role::Member));
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_member_capabilities() {
        assert!(Role::Member.can(Action::BookSlot));
        assert!(Role::Member.can(Action::GenerateCheckInCode));
        assert!(!Role::Member.can(Action::ScanCheckInCode));
        assert!(!Role::Member.can(Action::ManageSettings));
        assert!(!Role::Member.can(Action::DeleteAnyBooking));
    }

    #[test]
    fn test_admin_can_do_everything() {
        let actions = [
            Action::BookSlot,
            Action::CancelOwnBooking,
            Action::GenerateCheckInCode,
            Action::ViewOwnAttendance,
            Action::ViewAllBookings,
            Action::DeleteAnyBooking,
            Action::ScanCheckInCode,
            Action::ViewAttendance,
            Action::ManageUsers,
            Action::ManageSettings,
        ];
        assert!(actions.iter().all(|a| Role::Admin.can(*a)));
    }

    #[test]
    fn test_guard_signed_out() {
        assert_eq!(guard(None, Route::Login), RouteDecision::Allow);
        assert_eq!(guard(None, Route::Register), RouteDecision::Allow);
        assert_eq!(guard(None, Route::Booking), RouteDecision::RedirectToLogin);
        assert_eq!(
            guard(None, Route::AdminSettings),
            RouteDecision::RedirectToLogin
        );
    }

    #[test]
    fn test_guard_member_bounced_from_admin_routes() {
        assert_eq!(guard(Some(Role::Member), Route::Booking), RouteDecision::Allow);
        assert_eq!(
            guard(Some(Role::Member), Route::AdminScanner),
            RouteDecision::RedirectToDashboard
        );
    }

    #[test]
    fn test_guard_admin_allowed_everywhere() {
        for route in Route::ALL {
            assert_eq!(guard(Some(Role::Admin), route), RouteDecision::Allow);
        }
    }

    #[test]
    fn test_route_paths_round_trip() {
        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
        assert_eq!(Route::from_path("/"), Some(Route::Login));
        assert_eq!(Route::from_path("/nowhere"), None);
    }

    #[test]
    fn test_menus_only_list_reachable_routes() {
        for role in [Role::Member, Role::Admin] {
            for item in role.menu() {
                assert_eq!(guard(Some(role), item.route), RouteDecision::Allow);
            }
        }
        assert!(
            Role::Admin
                .menu()
                .iter()
                .any(|i| i.route == Route::AdminScanner)
        );
        assert!(
            !Role::Member
                .menu()
                .iter()
                .any(|i| i.route.access() == Access::AdminOnly)
        );
    }
}
