pub mod error;
pub mod responses;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, COOKIE};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::dates::DateWindow;
use crate::models::{PriceQuote, PropertyConfig, PropertyDetails, RoomSlot};

pub use self::error::ApiError;
pub use self::responses::{BookingPage, RawBookingDetail, RawPayment};
use self::responses::{BlockedRoomsResponse, DetailResponse, PricingResponse, RoomsResponse};

// ── Source trait ──────────────────────────────────────────────────────────────

/// Everything the reports read from the hotel-management backend.
#[async_trait]
pub trait HotelApi: Send + Sync {
    /// One page of bookings whose check-in falls inside `window`, oldest first.
    async fn booking_page(
        &self,
        property: &PropertyConfig,
        window: &DateWindow,
        offset: u32,
        limit: u32,
    ) -> Result<BookingPage, ApiError>;

    async fn booking_detail(
        &self,
        property: &PropertyConfig,
        booking_no: &str,
    ) -> Result<RawBookingDetail, ApiError>;

    /// Size of the room inventory.
    async fn room_count(&self, property: &PropertyConfig) -> Result<u64, ApiError>;

    async fn property_details(&self, property: &PropertyConfig) -> Result<PropertyDetails, ApiError>;

    /// Nightly prices on `day`.
    async fn price_quote(&self, property: &PropertyConfig, day: NaiveDate) -> Result<PriceQuote, ApiError>;

    /// Every room with its booking state for the night starting on `night`.
    async fn rooms_for_night(
        &self,
        property: &PropertyConfig,
        night: NaiveDate,
    ) -> Result<Vec<RoomSlot>, ApiError>;
}

// ── OYO OS client ─────────────────────────────────────────────────────────────

pub struct OyoClient {
    http: reqwest::Client,
    base_url: String,
    config: ApiConfig,
}

impl OyoClient {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config: config.clone(),
        })
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url, ApiError> {
        Ok(Url::parse_with_params(&format!("{}{}", self.base_url, path), params)?)
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: &Url,
        property: &PropertyConfig,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        debug!("GET {} ({})", endpoint, property.name);

        let resp = self
            .http
            .get(url.clone())
            .timeout(timeout)
            .header(ACCEPT, "application/json")
            .header("x-qid", property.qid.to_string())
            .header("x-source-client", "merchant")
            .header(COOKIE, format!("uif={}; uuid={}", property.uif, property.uuid))
            .send()
            .await
            .map_err(|source| ApiError::Transport { endpoint, source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status { endpoint, status: status.as_u16() });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|source| ApiError::Transport { endpoint, source })?;
        serde_json::from_slice(&body).map_err(|source| ApiError::Decode { endpoint, source })
    }

    /// GET with the configured per-call retry policy.
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: Url,
        property: &PropertyConfig,
        timeout_secs: u64,
    ) -> Result<T, ApiError> {
        let label = format!("{} {}", property.name, endpoint);
        let timeout = Duration::from_secs(timeout_secs);
        self.config
            .retry
            .run_if(
                &label,
                || self.get_once(endpoint, &url, property, timeout),
                ApiError::is_transient,
            )
            .await
    }
}

#[async_trait]
impl HotelApi for OyoClient {
    async fn booking_page(
        &self,
        property: &PropertyConfig,
        window: &DateWindow,
        offset: u32,
        limit: u32,
    ) -> Result<BookingPage, ApiError> {
        let url = self.url(
            "/hms_ms/api/v1/get_booking_with_ids",
            &[
                ("qid", property.qid.to_string()),
                ("checkin_from", window.from.to_string()),
                ("checkin_till", window.till.to_string()),
                ("batch_count", limit.to_string()),
                ("batch_offset", offset.to_string()),
                ("visibility_required", "true".into()),
                ("additionalParams", "payment_hold_transaction,guest,stay_details".into()),
                ("decimal_price", "true".into()),
                ("ascending", "true".into()),
                ("sort_on", "checkin_date".into()),
            ],
        )?;
        self.get("booking list", url, property, self.config.batch_timeout_secs).await
    }

    async fn booking_detail(
        &self,
        property: &PropertyConfig,
        booking_no: &str,
    ) -> Result<RawBookingDetail, ApiError> {
        let url = self.url(
            "/hms_ms/api/v1/visibility/booking_details_with_entities",
            &[
                ("qid", property.qid.to_string()),
                ("booking_id", booking_no.to_string()),
                ("role", "0".into()),
                ("platform", "OYOOS".into()),
                ("country_code", "1".into()),
            ],
        )?;
        let resp: DetailResponse = self
            .get("booking detail", url, property, self.config.detail_timeout_secs)
            .await?;
        Ok(resp.into())
    }

    async fn room_count(&self, property: &PropertyConfig) -> Result<u64, ApiError> {
        let url = self.url("/hms_ms/api/v1/hotels/roomsNew", &[("qid", property.qid.to_string())])?;
        let resp: RoomsResponse = self
            .get("room inventory", url, property, self.config.rooms_timeout_secs)
            .await?;
        Ok(resp.count())
    }

    async fn property_details(&self, property: &PropertyConfig) -> Result<PropertyDetails, ApiError> {
        let url = self.url(
            "/hms_ms/api/v1/location/property-details",
            &[("qid", property.qid.to_string())],
        )?;
        self.get("property details", url, property, self.config.timeout_secs).await
    }

    async fn price_quote(&self, property: &PropertyConfig, day: NaiveDate) -> Result<PriceQuote, ApiError> {
        let url = self.url(
            &format!("/hms_ms/api/v2/smart_owner_pricing/{}/", property.qid),
            &[
                ("qid", property.qid.to_string()),
                ("start_date", day.to_string()),
                ("end_date", day.to_string()),
                ("smart_price_enable", "false".into()),
            ],
        )?;
        let resp: PricingResponse = self
            .get("pricing", url, property, self.config.rooms_timeout_secs)
            .await?;
        Ok(resp.quote_for(day))
    }

    async fn rooms_for_night(
        &self,
        property: &PropertyConfig,
        night: NaiveDate,
    ) -> Result<Vec<RoomSlot>, ApiError> {
        let url = self.url(
            &format!("/crs_api/hotels/{}/rooms/blocked_rooms", property.qid),
            &[
                ("start_date", night.to_string()),
                ("end_date", (night + chrono::Duration::days(1)).to_string()),
                ("block_start_date", night.to_string()),
                ("block_end_date", night.to_string()),
                ("blocked_rooms", "true".into()),
                ("pinned_rooms", "false".into()),
                ("pending_approvals", "false".into()),
                ("qid", property.qid.to_string()),
                ("locale", "en".into()),
            ],
        )?;
        let resp: BlockedRoomsResponse = self
            .get("blocked rooms", url, property, self.config.rooms_timeout_secs)
            .await?;
        Ok(resp.rooms)
    }
}
