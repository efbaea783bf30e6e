//! QR check-in: members generate a short-lived code, admins scan it.

use std::sync::Arc;

use crate::api::PortalApiClient;
use crate::models::{AttendanceRecord, AttendanceStatistics, QrToken, ScanResult};
use crate::notice::{ActionResult, Notice, OrNotice};
use crate::qr_timer::{QrSessionTimer, TimerEvent, run_countdown};
use crate::traits::Clock;

pub const QR_GENERATED: &str = "QR code generated successfully!";
pub const QR_EXPIRED: &str = "QR code expired. Please generate a new one.";
pub const CHECK_IN_SUCCESSFUL: &str = "Check-in successful!";

// ==================== Member ====================

/// A member's check-in screen: at most one live code plus their history.
pub struct CheckInCode {
    api: PortalApiClient,
    timer: QrSessionTimer,
    validity_secs: u32,
    current: Option<QrToken>,
    attendance: Vec<AttendanceRecord>,
    notice: Option<Notice>,
}

impl CheckInCode {
    pub fn new(api: PortalApiClient, validity_secs: u32) -> Self {
        Self {
            api,
            timer: QrSessionTimer::new(),
            validity_secs,
            current: None,
            attendance: Vec::new(),
            notice: None,
        }
    }

    /// Request a fresh code. A code already on screen is replaced and its
    /// countdown restarted.
    pub async fn generate(&mut self) -> ActionResult<&QrToken> {
        self.notice = None;
        match self.api.generate_qr().await.or_notice("Error generating QR code") {
            Ok(token) => {
                self.timer.start(self.validity_secs);
                self.notice = Some(Notice::success(QR_GENERATED));
                tracing::info!(validity_secs = self.validity_secs, "Check-in code generated");
                Ok(&*self.current.insert(token))
            }
            Err(e) => {
                self.notice = Some(Notice::from(&e));
                Err(e)
            }
        }
    }

    /// Advance the countdown by one second. On expiry the code is dropped.
    pub fn tick(&mut self) -> TimerEvent {
        let event = self.timer.tick();
        if event == TimerEvent::Expired {
            self.expire();
        }
        event
    }

    fn expire(&mut self) {
        if self.current.take().is_some() {
            self.notice = Some(Notice::error(QR_EXPIRED));
        }
    }

    /// Drop the code early.
    pub fn discard(&mut self) {
        self.timer.cancel();
        self.current = None;
    }

    pub fn current(&self) -> Option<&QrToken> {
        self.current.as_ref()
    }

    pub fn timer(&self) -> &QrSessionTimer {
        &self.timer
    }

    /// Count down in real time until the code expires or the timer is
    /// cancelled, reporting each second to `on_tick`.
    pub async fn wait_for_expiry<F>(&mut self, on_tick: F) -> TimerEvent
    where
        F: FnMut(TimerEvent, &QrSessionTimer),
    {
        let event = run_countdown(&mut self.timer, on_tick).await;
        if event == TimerEvent::Expired {
            self.expire();
        }
        event
    }

    pub async fn refresh_attendance(&mut self) {
        match self.api.my_attendance().await {
            Ok(records) => self.attendance = records,
            Err(e) => tracing::warn!("Error fetching attendance: {}", e),
        }
    }

    pub fn attendance(&self) -> &[AttendanceRecord] {
        &self.attendance
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }
}

// ==================== Admin ====================

/// What the scanner shows after a code was processed.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Accepted(Box<ScanResult>),
    Rejected(String),
}

/// Admin check-in desk: scans codes and keeps today's figures current.
pub struct CheckInDesk {
    api: PortalApiClient,
    clock: Arc<dyn Clock>,
    today: Vec<AttendanceRecord>,
    statistics: Option<AttendanceStatistics>,
    last: Option<ScanOutcome>,
}

impl CheckInDesk {
    pub fn new(api: PortalApiClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            clock,
            today: Vec::new(),
            statistics: None,
            last: None,
        }
    }

    /// Submit a scanned code. A successful check-in refreshes today's
    /// attendance and the statistics.
    pub async fn scan(&mut self, qr_token: &str) -> &ScanOutcome {
        let outcome = match self.api.scan(qr_token.trim()).await.or_notice("Error processing QR code") {
            Ok(result) => {
                tracing::info!(
                    slot = %result.attendance.slot,
                    date = %result.attendance.date,
                    "Check-in recorded"
                );
                ScanOutcome::Accepted(Box::new(result))
            }
            Err(e) => ScanOutcome::Rejected(e.to_string()),
        };

        if matches!(outcome, ScanOutcome::Accepted(_)) {
            self.refresh().await;
        }
        self.last.insert(outcome)
    }

    pub async fn refresh(&mut self) {
        match self.api.attendance_on(self.clock.today()).await {
            Ok(records) => self.today = records,
            Err(e) => tracing::warn!("Error fetching attendance: {}", e),
        }
        match self.api.statistics().await {
            Ok(stats) => self.statistics = Some(stats),
            Err(e) => tracing::warn!("Error fetching statistics: {}", e),
        }
    }

    pub fn today(&self) -> &[AttendanceRecord] {
        &self.today
    }

    pub fn statistics(&self) -> Option<&AttendanceStatistics> {
        self.statistics.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&ScanOutcome> {
        self.last.as_ref()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.last.as_ref().map(|outcome| match outcome {
            ScanOutcome::Accepted(_) => Notice::success(CHECK_IN_SUCCESSFUL),
            ScanOutcome::Rejected(msg) => Notice::error(msg.clone()),
        })
    }
}
