use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::config::NetworkConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AdminCheck, AttendanceRecord, AttendanceStatistics, AuthResponse, AvailabilitySnapshot,
    Booking, BookingFilter, BookingRequest, ClosedDate, GymConfiguration, LoginRequest,
    MessageResponse, NewUser, QrToken, RegisterRequest, ScanRequest, ScanResult, User, UserUpdate,
};

/// Client for the gym booking API.
///
/// Cheap to clone. The token, when set, is sent on every request both as
/// `x-auth-token` and as a bearer `Authorization` header, since different
/// backend routes read different ones.
#[derive(Clone, Debug)]
pub struct PortalApiClient {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl PortalApiClient {
    /// Create a new API client with configurable timeouts.
    pub fn new(base_url: &str, network_config: &NetworkConfig) -> ApiResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network_config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ==================== Auth ====================

    pub async fn login(&self, request: &LoginRequest) -> ApiResult<AuthResponse> {
        self.send(self.public(Method::POST, &["auth", "login"])?.json(request))
            .await
    }

    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<AuthResponse> {
        self.send(self.public(Method::POST, &["auth", "register"])?.json(request))
            .await
    }

    /// The user the current token belongs to.
    pub async fn me(&self) -> ApiResult<User> {
        self.send(self.authed(Method::GET, &["auth", "me"])?).await
    }

    pub async fn verify_admin(&self) -> ApiResult<bool> {
        let check: AdminCheck = self
            .send(self.authed(Method::GET, &["auth", "verify-admin"])?)
            .await?;
        Ok(check.is_admin)
    }

    // ==================== Member bookings ====================

    /// Gym configuration as members see it.
    pub async fn booking_settings(&self) -> ApiResult<GymConfiguration> {
        self.send(self.authed(Method::GET, &["bookings", "settings"])?)
            .await
    }

    pub async fn availability(&self, date: NaiveDate) -> ApiResult<AvailabilitySnapshot> {
        let date = date.format("%Y-%m-%d").to_string();
        self.send(self.authed(Method::GET, &["bookings", "availability", &date])?)
            .await
    }

    pub async fn my_bookings(&self) -> ApiResult<Vec<Booking>> {
        self.send(self.authed(Method::GET, &["bookings", "my"])?)
            .await
    }

    pub async fn book(&self, request: &BookingRequest) -> ApiResult<MessageResponse> {
        self.send_message(self.authed(Method::POST, &["bookings"])?.json(request))
            .await
    }

    pub async fn cancel_booking(&self, id: &str) -> ApiResult<MessageResponse> {
        self.send_message(self.authed(Method::DELETE, &["bookings", id])?)
            .await
    }

    // ==================== Admin bookings ====================

    pub async fn all_bookings(&self, filter: &BookingFilter) -> ApiResult<Vec<Booking>> {
        self.send(
            self.authed(Method::GET, &["bookings", "admin", "all"])?
                .query(filter),
        )
        .await
    }

    pub async fn delete_booking(&self, id: &str) -> ApiResult<MessageResponse> {
        self.send_message(self.authed(Method::DELETE, &["bookings", "admin", id])?)
            .await
    }

    // ==================== Admin settings ====================

    pub async fn admin_settings(&self) -> ApiResult<GymConfiguration> {
        self.send(self.authed(Method::GET, &["admin", "settings"])?)
            .await
    }

    /// Replace the whole settings document.
    pub async fn update_settings(&self, settings: &GymConfiguration) -> ApiResult<MessageResponse> {
        self.send_message(self.authed(Method::PUT, &["admin", "settings"])?.json(settings))
            .await
    }

    pub async fn toggle_booking(&self) -> ApiResult<MessageResponse> {
        self.send_message(self.authed(Method::POST, &["admin", "settings", "toggle-booking"])?)
            .await
    }

    pub async fn add_closed_date(&self, closed: &ClosedDate) -> ApiResult<MessageResponse> {
        self.send_message(
            self.authed(Method::POST, &["admin", "settings", "closed-dates"])?
                .json(closed),
        )
        .await
    }

    pub async fn remove_closed_date(&self, date: NaiveDate) -> ApiResult<MessageResponse> {
        let date = date.format("%Y-%m-%d").to_string();
        self.send_message(self.authed(
            Method::DELETE,
            &["admin", "settings", "closed-dates", &date],
        )?)
        .await
    }

    // ==================== Admin users ====================

    pub async fn users(&self) -> ApiResult<Vec<User>> {
        self.send(self.authed(Method::GET, &["admin", "users"])?)
            .await
    }

    pub async fn create_user(&self, user: &NewUser) -> ApiResult<MessageResponse> {
        self.send_message(self.authed(Method::POST, &["admin", "users"])?.json(user))
            .await
    }

    pub async fn update_user(&self, id: &str, update: &UserUpdate) -> ApiResult<MessageResponse> {
        self.send_message(self.authed(Method::PUT, &["admin", "users", id])?.json(update))
            .await
    }

    pub async fn delete_user(&self, id: &str) -> ApiResult<MessageResponse> {
        self.send_message(self.authed(Method::DELETE, &["admin", "users", id])?)
            .await
    }

    // ==================== QR check-in ====================

    pub async fn generate_qr(&self) -> ApiResult<QrToken> {
        self.send(self.authed(Method::GET, &["qr", "generate"])?)
            .await
    }

    pub async fn my_attendance(&self) -> ApiResult<Vec<AttendanceRecord>> {
        self.send(self.authed(Method::GET, &["qr", "my-attendance"])?)
            .await
    }

    pub async fn attendance_on(&self, date: NaiveDate) -> ApiResult<Vec<AttendanceRecord>> {
        let date = date.format("%Y-%m-%d").to_string();
        self.send(
            self.authed(Method::GET, &["qr", "attendance"])?
                .query(&[("date", date)]),
        )
        .await
    }

    pub async fn statistics(&self) -> ApiResult<AttendanceStatistics> {
        self.send(self.authed(Method::GET, &["qr", "statistics"])?)
            .await
    }

    pub async fn scan(&self, qr_token: &str) -> ApiResult<ScanResult> {
        let body = ScanRequest {
            qr_token: qr_token.to_string(),
        };
        self.send(self.authed(Method::POST, &["qr", "scan"])?.json(&body))
            .await
    }

    // ==================== Plumbing ====================

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn public(&self, method: Method, segments: &[&str]) -> ApiResult<RequestBuilder> {
        let url = self.endpoint(segments)?;
        tracing::debug!("{} {}", method, url.path());
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.header("x-auth-token", token).bearer_auth(token);
        }
        Ok(builder)
    }

    fn authed(&self, method: Method, segments: &[&str]) -> ApiResult<RequestBuilder> {
        if self.token.is_none() {
            return Err(ApiError::NotLoggedIn);
        }
        self.public(method, segments)
    }

    async fn fetch_body(&self, builder: RequestBuilder) -> ApiResult<String> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!("API answered {}: {}", status, body);
            return Err(ApiError::from_response(status, &body));
        }
        Ok(body)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let body = self.fetch_body(builder).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Like [`Self::send`] for `{ "msg": ... }` replies, tolerating an
    /// empty body.
    async fn send_message(&self, builder: RequestBuilder) -> ApiResult<MessageResponse> {
        let body = self.fetch_body(builder).await?;
        if body.trim().is_empty() {
            return Ok(MessageResponse::default());
        }
        Ok(serde_json::from_str(&body)?)
    }
}
