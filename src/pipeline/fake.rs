//! In-memory `HotelApi` for pipeline tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::api::{ApiError, BookingPage, HotelApi, RawBookingDetail, RawPayment};
use crate::dates::DateWindow;
use crate::models::{BookingRecord, PriceQuote, PropertyConfig, PropertyDetails, RoomSlot};

#[derive(Default)]
pub struct FakeApi {
    pub bookings: HashMap<u32, Vec<BookingRecord>>,
    pub details: HashMap<String, RawBookingDetail>,
    pub failing_details: HashSet<String>,
    pub rooms: HashMap<u32, u64>,
    pub nights: HashMap<(u32, NaiveDate), Vec<RoomSlot>>,
    pub prices: HashMap<u32, PriceQuote>,
    pub property_details: HashMap<u32, PropertyDetails>,
    pub page_calls: AtomicU32,
    pub detail_calls: Mutex<HashMap<String, u32>>,
}

impl FakeApi {
    pub fn detail_calls(&self, booking_no: &str) -> u32 {
        self.detail_calls.lock().unwrap().get(booking_no).copied().unwrap_or(0)
    }
}

pub fn property(key: u32, name: &str) -> PropertyConfig {
    PropertyConfig {
        key,
        name: name.to_string(),
        qid: 1000 + key as u64,
        uif: String::new(),
        uuid: String::new(),
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn booking(no: &str, status: &str, checkin: NaiveDate, checkout: NaiveDate) -> BookingRecord {
    BookingRecord {
        booking_no: Some(no.to_string()),
        status: status.to_string().into(),
        guest_name: Some(format!("Guest {}", no)),
        checkin: Some(checkin),
        checkout: Some(checkout),
        source: Some("Direct".to_string()),
        ..Default::default()
    }
}

pub fn payment(mode: &str, amount: f64, created_at: &str) -> RawPayment {
    RawPayment {
        mode: mode.to_string(),
        amount,
        created_at: Some(created_at.to_string()),
    }
}

#[async_trait]
impl HotelApi for FakeApi {
    async fn booking_page(
        &self,
        property: &PropertyConfig,
        window: &DateWindow,
        offset: u32,
        limit: u32,
    ) -> Result<BookingPage, ApiError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        let page: Vec<BookingRecord> = self
            .bookings
            .get(&property.key)
            .map(|all| {
                all.iter()
                    .filter(|b| b.checkin.is_none_or(|ci| window.contains(ci)))
                    .skip(offset as usize)
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(BookingPage::from_bookings(page))
    }

    async fn booking_detail(
        &self,
        _property: &PropertyConfig,
        booking_no: &str,
    ) -> Result<RawBookingDetail, ApiError> {
        *self
            .detail_calls
            .lock()
            .unwrap()
            .entry(booking_no.to_string())
            .or_insert(0) += 1;
        if self.failing_details.contains(booking_no) {
            return Err(ApiError::Status { endpoint: "booking detail", status: 503 });
        }
        Ok(self.details.get(booking_no).cloned().unwrap_or_default())
    }

    async fn room_count(&self, property: &PropertyConfig) -> Result<u64, ApiError> {
        Ok(self.rooms.get(&property.key).copied().unwrap_or(0))
    }

    async fn property_details(&self, property: &PropertyConfig) -> Result<PropertyDetails, ApiError> {
        self.property_details
            .get(&property.key)
            .cloned()
            .ok_or(ApiError::Status { endpoint: "property details", status: 404 })
    }

    async fn price_quote(&self, property: &PropertyConfig, _day: NaiveDate) -> Result<PriceQuote, ApiError> {
        Ok(self.prices.get(&property.key).copied().unwrap_or_default())
    }

    async fn rooms_for_night(
        &self,
        property: &PropertyConfig,
        night: NaiveDate,
    ) -> Result<Vec<RoomSlot>, ApiError> {
        Ok(self.nights.get(&(property.key, night)).cloned().unwrap_or_default())
    }
}
