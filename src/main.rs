use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use gym_portal::{
    AdminConsole, BookingPortal, CheckInCode, CheckInDesk, Clock, FileSessionStore,
    PortalApiClient, RouteDecision, ScanOutcome, Session, SystemClock, TimerEvent, auth,
    config::AppConfig,
    models::{Booking, BookingFilter, ClosedDate, SlotDefinition, UserRef, UserUpdate, time_of_day},
    notice::OrNotice,
    roles::{Role, Route},
    session::guard_session,
    validation::{NewUserForm, ProfileFields, RegistrationForm},
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "gym-portal")]
#[command(about = "Book gym slots and check in with a QR code")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create a member account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user and their menu
    Whoami,
    /// Show slot availability for a date (default: today)
    Slots {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Book a slot
    Book {
        #[arg(long)]
        slot: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Cancel one of your bookings
    Cancel { id: String },
    /// List your upcoming and past bookings
    Bookings,
    /// Generate a check-in code and count down until it expires
    Qr,
    /// Show your attendance history
    Attendance,
    /// Administrator commands
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// List all bookings
    Bookings {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        slot: Option<String>,
    },
    DeleteBooking { id: String },
    /// Show the gym settings
    Settings,
    /// Open or close the booking system
    ToggleBooking,
    AddSlot {
        #[arg(long)]
        name: String,
        #[arg(long, value_parser = parse_time)]
        start: NaiveTime,
        #[arg(long, value_parser = parse_time)]
        end: NaiveTime,
        #[arg(long, default_value_t = 10)]
        capacity: u32,
        #[arg(long)]
        disabled: bool,
    },
    /// Change an existing slot
    SetSlot {
        name: String,
        #[arg(long)]
        rename: Option<String>,
        #[arg(long, value_parser = parse_time)]
        start: Option<NaiveTime>,
        #[arg(long, value_parser = parse_time)]
        end: Option<NaiveTime>,
        #[arg(long)]
        capacity: Option<u32>,
        #[arg(long)]
        enabled: Option<bool>,
    },
    RemoveSlot { name: String },
    /// How many days ahead members may book
    AdvanceDays { days: u32 },
    CloseDate {
        date: NaiveDate,
        #[arg(long)]
        reason: String,
    },
    OpenDate { date: NaiveDate },
    Users,
    AddUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value_t = Role::Member)]
        role: Role,
        #[command(flatten)]
        profile: ProfileArgs,
    },
    UpdateUser {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        role: Option<Role>,
    },
    DeleteUser { id: String },
    /// Check a member in with the token from their code
    Scan { token: String },
    /// Check-ins for a date (default: today)
    Attendance {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Today's attendance statistics
    Stats,
    /// Booking totals and the most recent bookings
    Summary,
}

#[derive(clap::Args, Debug, Default)]
struct ProfileArgs {
    #[arg(long, default_value = "")]
    registration_no: String,
    #[arg(long, default_value = "")]
    index_no: String,
    #[arg(long, default_value = "")]
    batch: String,
    #[arg(long, default_value = "")]
    tel_no: String,
}

impl From<ProfileArgs> for ProfileFields {
    fn from(args: ProfileArgs) -> Self {
        Self {
            registration_no: args.registration_no,
            index_no: args.index_no,
            batch: args.batch,
            tel_no: args.tel_no,
        }
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    time_of_day::parse(raw).ok_or_else(|| format!("invalid time {raw:?}, expected HH:MM"))
}

/// `RUST_LOG` directives when set and valid, else INFO with crate debug.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| {
            EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .parse_lossy("gym_portal=debug")
        })
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(run(args.command, config))
}

async fn run(command: Command, config: AppConfig) -> Result<()> {
    let store = FileSessionStore::new(config.session.path());
    let mut api = PortalApiClient::new(&config.api.base_url, &config.network)
        .context("Failed to create API client")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match command {
        Command::Login { email, password } => {
            let session = auth::login(&mut api, &store, &email, &password).await?;
            print_identity(&session);
            return Ok(());
        }
        Command::Register {
            name,
            email,
            password,
            confirm_password,
            profile,
        } => {
            let form = RegistrationForm {
                name,
                email,
                password,
                confirm_password,
                profile: profile.into(),
            };
            let session = auth::register(&mut api, &store, &form).await?;
            print_identity(&session);
            return Ok(());
        }
        Command::Logout => {
            auth::logout(&mut api, &store)?;
            println!("Signed out");
            return Ok(());
        }
        _ => {}
    }

    let Some(session) = auth::restore(&mut api, &store).await else {
        anyhow::bail!("Not signed in. Run `gym-portal login` first.");
    };
    require(&session, route_for(&command))?;

    match command {
        Command::Whoami => print_identity(&session),
        Command::Slots { date } => {
            let portal = open_portal(api, clock, date).await?;
            show_slots(&portal);
        }
        Command::Book { slot, date } => {
            let mut portal = open_portal(api, clock, date).await?;
            portal.select_slot(&slot)?;
            let msg = portal.book().await?;
            println!("{}", non_empty(msg, "Booking confirmed"));
        }
        Command::Cancel { id } => {
            let mut portal = BookingPortal::new(api, clock);
            let msg = portal.cancel(&id).await?;
            println!("{}", non_empty(msg, "Booking cancelled"));
        }
        Command::Bookings => {
            let mut portal = BookingPortal::new(api, clock);
            portal.refresh_my_bookings().await;
            println!("Upcoming:");
            portal.upcoming().into_iter().for_each(print_booking);
            println!("Past:");
            portal.past().into_iter().for_each(print_booking);
        }
        Command::Qr => show_check_in_code(api, config.qr.validity_secs).await?,
        Command::Attendance => {
            let mut screen = CheckInCode::new(api, config.qr.validity_secs);
            screen.refresh_attendance().await;
            for record in screen.attendance() {
                println!(
                    "{}  {:<24} {}",
                    record.date,
                    record.slot,
                    record.check_in_time.format("%H:%M")
                );
            }
        }
        Command::Admin(admin) => run_admin(admin, api, clock).await?,
        Command::Login { .. } | Command::Register { .. } | Command::Logout => {}
    }
    Ok(())
}

async fn run_admin(command: AdminCommand, api: PortalApiClient, clock: Arc<dyn Clock>) -> Result<()> {
    let mut console = AdminConsole::new(api.clone(), clock.clone());

    let msg = match command {
        AdminCommand::Bookings { date, slot } => {
            let bookings = console.bookings(&BookingFilter { date, slot }).await?;
            bookings.iter().for_each(print_booking);
            return Ok(());
        }
        AdminCommand::DeleteBooking { id } => console.delete_booking(&id).await?,
        AdminCommand::Settings => {
            let settings = console.load_settings().await?;
            println!("Booking enabled:   {}", settings.booking_enabled);
            println!("Advance days:      {}", settings.max_advance_booking_days);
            println!("Slots:");
            for slot in &settings.slots {
                println!(
                    "  {:<24} {}-{}  capacity {:>2}{}",
                    slot.name,
                    slot.start_time.format("%H:%M"),
                    slot.end_time.format("%H:%M"),
                    slot.capacity,
                    if slot.enabled { "" } else { "  (disabled)" }
                );
            }
            println!("Closed dates:");
            for closed in &settings.closed_dates {
                println!("  {}  {}", closed.date, closed.reason);
            }
            return Ok(());
        }
        AdminCommand::ToggleBooking => console.toggle_booking().await?,
        AdminCommand::AddSlot {
            name,
            start,
            end,
            capacity,
            disabled,
        } => {
            let slot = SlotDefinition {
                name,
                start_time: start,
                end_time: end,
                capacity,
                enabled: !disabled,
            };
            console.add_slot(slot).await?
        }
        AdminCommand::SetSlot {
            name,
            rename,
            start,
            end,
            capacity,
            enabled,
        } => {
            let index = console.slot_index(&name).await?;
            let mut slot = console
                .settings()
                .and_then(|s| s.slots.get(index))
                .cloned()
                .context("Settings changed while editing; try again")?;
            if let Some(rename) = rename {
                slot.name = rename;
            }
            slot.start_time = start.unwrap_or(slot.start_time);
            slot.end_time = end.unwrap_or(slot.end_time);
            slot.capacity = capacity.unwrap_or(slot.capacity);
            slot.enabled = enabled.unwrap_or(slot.enabled);
            console.update_slot(index, slot).await?
        }
        AdminCommand::RemoveSlot { name } => {
            let index = console.slot_index(&name).await?;
            console.delete_slot(index).await?
        }
        AdminCommand::AdvanceDays { days } => console.set_advance_days(days).await?,
        AdminCommand::CloseDate { date, reason } => {
            console.close_date(ClosedDate { date, reason }).await?
        }
        AdminCommand::OpenDate { date } => console.reopen_date(date).await?,
        AdminCommand::Users => {
            for user in console.users().await? {
                println!(
                    "{}  {:<24} {:<32} {}",
                    user.id, user.name, user.email, user.role
                );
            }
            return Ok(());
        }
        AdminCommand::AddUser {
            name,
            email,
            password,
            role,
            profile,
        } => {
            let form = NewUserForm {
                name,
                email,
                password,
                role,
                profile: profile.into(),
            };
            console.create_user(&form).await?
        }
        AdminCommand::UpdateUser {
            id,
            name,
            email,
            role,
        } => {
            let users = console.users().await?;
            let user = users
                .iter()
                .find(|u| u.id == id)
                .with_context(|| format!("No user with id {id}"))?;
            let mut update = UserUpdate::from(user);
            update.name = name.unwrap_or(update.name);
            update.email = email.unwrap_or(update.email);
            update.role = role.unwrap_or(update.role);
            console.update_user(&id, &update).await?
        }
        AdminCommand::DeleteUser { id } => console.delete_user(&id).await?,
        AdminCommand::Scan { token } => {
            let mut desk = CheckInDesk::new(api, clock);
            match desk.scan(&token).await {
                ScanOutcome::Accepted(result) => {
                    println!("Check-in successful!");
                    println!(
                        "  {} for {} on {}",
                        result
                            .attendance
                            .user
                            .as_ref()
                            .map_or("Member", |u| u.name.as_str()),
                        result.attendance.slot,
                        result.attendance.date
                    );
                }
                ScanOutcome::Rejected(msg) => anyhow::bail!("{msg}"),
            }
            if let Some(stats) = desk.statistics() {
                println!(
                    "Today: {} of {} booked members checked in ({:.1}%)",
                    stats.today_attendances, stats.today_bookings, stats.attendance_rate
                );
            }
            return Ok(());
        }
        AdminCommand::Attendance { date } => {
            let date = date.unwrap_or_else(|| clock.today());
            let records = api
                .attendance_on(date)
                .await
                .or_notice("Error loading attendance")?;
            for record in records {
                println!(
                    "{}  {:<24} {:<24} {}",
                    record.check_in_time.format("%H:%M"),
                    record.user.as_ref().map_or("", |u| u.name.as_str()),
                    record.slot,
                    record.status
                );
            }
            return Ok(());
        }
        AdminCommand::Stats => {
            let mut desk = CheckInDesk::new(api, clock);
            desk.refresh().await;
            let stats = desk.statistics().context("Statistics unavailable")?;
            println!("Check-ins today:  {}", stats.today_attendances);
            println!("Bookings today:   {}", stats.today_bookings);
            println!("Attendance rate:  {:.1}%", stats.attendance_rate);
            return Ok(());
        }
        AdminCommand::Summary => {
            let summary = console.summary().await?;
            println!("Total bookings:   {}", summary.total_bookings);
            println!("Today's bookings: {}", summary.today_bookings);
            println!("Members:          {}", summary.distinct_members);
            println!("Recent:");
            summary.recent.iter().for_each(print_booking);
            return Ok(());
        }
    };

    println!("{msg}");
    Ok(())
}

/// The screen a command stands in for.
fn route_for(command: &Command) -> Route {
    match command {
        Command::Login { .. } | Command::Logout => Route::Login,
        Command::Register { .. } => Route::Register,
        Command::Whoami => Route::Dashboard,
        Command::Slots { .. } | Command::Book { .. } => Route::Booking,
        Command::Cancel { .. } | Command::Bookings => Route::MyBookings,
        Command::Qr | Command::Attendance => Route::MyQrCode,
        Command::Admin(admin) => match admin {
            AdminCommand::Bookings { .. }
            | AdminCommand::DeleteBooking { .. }
            | AdminCommand::Summary => Route::AdminBookings,
            AdminCommand::Scan { .. } | AdminCommand::Attendance { .. } | AdminCommand::Stats => {
                Route::AdminScanner
            }
            AdminCommand::Users
            | AdminCommand::AddUser { .. }
            | AdminCommand::UpdateUser { .. }
            | AdminCommand::DeleteUser { .. } => Route::AdminUsers,
            _ => Route::AdminSettings,
        },
    }
}

fn require(session: &Session, route: Route) -> Result<()> {
    match guard_session(Some(session), route) {
        RouteDecision::Allow => Ok(()),
        RouteDecision::RedirectToLogin => {
            anyhow::bail!("Not signed in. Run `gym-portal login` first.")
        }
        RouteDecision::RedirectToDashboard => {
            anyhow::bail!("This command needs an administrator account")
        }
    }
}

async fn open_portal(
    api: PortalApiClient,
    clock: Arc<dyn Clock>,
    date: Option<NaiveDate>,
) -> Result<BookingPortal> {
    let mut portal = BookingPortal::new(api, clock);
    portal.load().await;
    if portal.config().is_none() {
        anyhow::bail!("{}", gym_portal::portal::SETTINGS_UNAVAILABLE);
    }
    if let Some(date) = date {
        portal.select_date(date).await?;
    }
    Ok(portal)
}

fn show_slots(portal: &BookingPortal) {
    if let Some(bounds) = portal.date_bounds() {
        println!(
            "{} (bookable {} to {})",
            portal.selected_date(),
            bounds.min,
            bounds.max
        );
    }
    if portal.availability_is_fallback() {
        println!("Availability could not be loaded; counts may be out of date.");
    }
    for card in portal.slot_cards() {
        println!(
            "  {:<24} {}-{}  {}",
            card.slot.name,
            card.slot.start_time.format("%H:%M"),
            card.slot.end_time.format("%H:%M"),
            card.status.label()
        );
    }
}

async fn show_check_in_code(api: PortalApiClient, validity_secs: u32) -> Result<()> {
    let mut screen = CheckInCode::new(api, validity_secs);
    let token = screen.generate().await?.clone();
    if let Some(notice) = screen.notice() {
        println!("{notice}");
    }
    println!("Token: {}", token.qr_token);

    let finished = tokio::select! {
        event = screen.wait_for_expiry(|event, timer| {
            if let TimerEvent::Running { .. } = event {
                print!("\rExpires in {}  ", timer.display());
                let _ = std::io::stdout().flush();
            }
        }) => Some(event),
        _ = tokio::signal::ctrl_c() => None,
    };
    println!();

    match finished {
        Some(_) => {
            if let Some(notice) = screen.notice() {
                println!("{notice}");
            }
        }
        None => {
            screen.discard();
            println!("Code discarded");
        }
    }
    Ok(())
}

fn print_identity(session: &Session) {
    let Some(user) = &session.user else {
        println!("Signed in");
        return;
    };
    println!("{} <{}> ({})", user.name, user.email, user.role);
    let menu: Vec<_> = user.role.menu().iter().map(|item| item.label).collect();
    println!("Menu: {}", menu.join(", "));
}

fn print_booking(booking: &Booking) {
    let owner = match &booking.user {
        Some(UserRef::Profile(profile)) => profile.name.as_str(),
        _ => "",
    };
    println!(
        "{}  {}  {:<24} {}",
        booking.id, booking.date, booking.slot, owner
    );
}

fn non_empty(msg: String, fallback: &str) -> String {
    if msg.trim().is_empty() {
        fallback.to_string()
    } else {
        msg
    }
}
