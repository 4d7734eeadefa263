//! Vendor response shapes, decoded once at the API boundary.

use chrono::{NaiveDate, Timelike};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::classify::payment_mode;
use crate::dates::ReportClock;
use crate::models::lenient;
use crate::models::{BookingDetail, BookingRecord, PaymentEvent, PaymentMode, PriceQuote, RoomSlot};

// ── Booking list ──────────────────────────────────────────────────────────────

/// One page of the booking list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingPage {
    #[serde(rename = "bookingIds", default, deserialize_with = "lenient::or_default")]
    pub booking_ids: Vec<Value>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub entities: PageEntities,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageEntities {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub bookings: BTreeMap<String, BookingRecord>,
}

impl BookingPage {
    #[cfg(test)]
    pub fn from_bookings(bookings: Vec<BookingRecord>) -> Self {
        let booking_ids = (0..bookings.len()).map(|i| Value::from(i as u64)).collect();
        let bookings = bookings
            .into_iter()
            .enumerate()
            .map(|(i, b)| (format!("{:06}", i), b))
            .collect();
        Self { booking_ids, entities: PageEntities { bookings } }
    }

    pub fn id_count(&self) -> usize {
        self.booking_ids.len()
    }

    pub fn into_bookings(self) -> impl Iterator<Item = BookingRecord> {
        self.entities.bookings.into_values()
    }
}

// ── Booking detail ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailResponse {
    #[serde(default, deserialize_with = "lenient::or_default")]
    entities: DetailEntities,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DetailEntities {
    #[serde(default, deserialize_with = "lenient::or_default")]
    bookings: BTreeMap<String, DetailBooking>,
    #[serde(rename = "stayDetails", default, deserialize_with = "lenient::or_default")]
    stay_details: BTreeMap<String, StayDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DetailBooking {
    #[serde(default, deserialize_with = "lenient::or_default")]
    payments: Vec<RawPayment>,
    #[serde(default, deserialize_with = "lenient::number")]
    payable_amount: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StayDetail {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    room_number: Option<String>,
}

/// One payment line as the vendor reports it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawPayment {
    #[serde(default, deserialize_with = "lenient::text")]
    pub mode: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub amount: f64,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub created_at: Option<String>,
}

/// Detail endpoint payload reduced to what the reports use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBookingDetail {
    pub payments: Vec<RawPayment>,
    pub balance: f64,
    pub room_numbers: Vec<String>,
}

impl From<DetailResponse> for RawBookingDetail {
    fn from(resp: DetailResponse) -> Self {
        let DetailEntities { bookings, stay_details } = resp.entities;
        let booking = bookings.into_values().next().unwrap_or_default();
        Self {
            payments: booking.payments,
            balance: booking.payable_amount,
            room_numbers: stay_details.into_values().filter_map(|s| s.room_number).collect(),
        }
    }
}

impl RawBookingDetail {
    /// Localise payments and bucket them by mode.
    ///
    /// Mode sums cover every payment line; only positive, timestamped lines
    /// become events.
    pub fn into_detail(self, clock: &ReportClock) -> BookingDetail {
        let mut detail = BookingDetail {
            balance: self.balance,
            room_numbers: self.room_numbers,
            ..Default::default()
        };

        for p in self.payments {
            let mode = payment_mode(&p.mode);
            match mode {
                PaymentMode::Cash => detail.cash += p.amount,
                PaymentMode::Qr => detail.qr += p.amount,
                PaymentMode::Online => detail.online += p.amount,
                PaymentMode::Discount => detail.discount += p.amount,
            }

            if p.amount <= 0.0 {
                continue;
            }
            let Some(local) = p.created_at.as_deref().and_then(|raw| clock.localize(raw)) else {
                continue;
            };
            detail.events.push(PaymentEvent {
                date: local.date_naive(),
                time: local.time(),
                hour: local.hour(),
                amount: p.amount,
                mode,
            });
        }
        detail
    }
}

// ── Rooms, pricing ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomsResponse {
    #[serde(default)]
    rooms: Value,
}

impl RoomsResponse {
    /// The vendor returns rooms keyed by id; a list is accepted too.
    pub fn count(&self) -> u64 {
        match &self.rooms {
            Value::Object(m) => m.len() as u64,
            Value::Array(a) => a.len() as u64,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockedRoomsResponse {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub rooms: Vec<RoomSlot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PricingResponse {
    #[serde(default, deserialize_with = "lenient::or_default")]
    room_categories_info: Vec<RoomCategory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RoomCategory {
    #[serde(default, deserialize_with = "lenient::text")]
    room_category_name: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    datewise_details: Vec<DatePrices>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DatePrices {
    #[serde(default, deserialize_with = "lenient::opt_date")]
    date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    current_prices: BTreeMap<String, Value>,
}

impl PricingResponse {
    /// Nightly prices on `day` for the "classic" category, or the first category listed.
    pub fn quote_for(&self, day: NaiveDate) -> PriceQuote {
        let categories = &self.room_categories_info;
        let selected = categories
            .iter()
            .find(|c| c.room_category_name.eq_ignore_ascii_case("classic"))
            .or_else(|| categories.first());

        let Some(prices) = selected
            .and_then(|c| c.datewise_details.iter().find(|d| d.date == Some(day)))
            .map(|d| &d.current_prices)
        else {
            return PriceQuote::default();
        };

        let occupancy = |guests: &str| prices.get(guests).and_then(lenient::value_to_f64);
        PriceQuote {
            one: occupancy("1"),
            two: occupancy("2"),
            three: occupancy("3"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_booking_page_decodes_entities() {
        let page: BookingPage = serde_json::from_str(
            r#"{
                "bookingIds": [11, 12],
                "entities": {"bookings": {
                    "11": {"booking_no": "AB11", "status": "Checked Out"},
                    "12": {"booking_no": "AB12", "status": "Checked In"}
                }}
            }"#,
        )
        .unwrap();
        assert_eq!(page.id_count(), 2);
        let nos: Vec<_> = page.into_bookings().filter_map(|b| b.booking_no).collect();
        assert_eq!(nos, ["AB11", "AB12"]);
    }

    #[test]
    fn test_booking_page_tolerates_nulls() {
        let page: BookingPage =
            serde_json::from_str(r#"{"bookingIds": null, "entities": null}"#).unwrap();
        assert_eq!(page.id_count(), 0);
        assert_eq!(page.into_bookings().count(), 0);
    }

    #[test]
    fn test_detail_into_events() {
        let resp: DetailResponse = serde_json::from_str(
            r#"{"entities": {
                "bookings": {"x": {
                    "payable_amount": "250.5",
                    "payments": [
                        {"mode": "Cash at Hotel", "amount": 500, "created_at": "2024-05-01T04:00:00Z"},
                        {"mode": "UPI QR", "amount": "300", "created_at": "2024-05-01T18:45:00"},
                        {"mode": "Prepaid", "amount": 0, "created_at": "2024-05-01T04:00:00Z"},
                        {"mode": "oyo_wizard_discount", "amount": 75, "created_at": null},
                        {"mode": "Cash at Hotel", "amount": 20, "created_at": "not a time"}
                    ]
                }},
                "stayDetails": {"s1": {"room_number": "101"}, "s2": {"room_number": null}}
            }}"#,
        )
        .unwrap();

        let clock = ReportClock::pinned(d(2024, 5, 1), 330, 12).unwrap();
        let detail = RawBookingDetail::from(resp).into_detail(&clock);

        assert_eq!(detail.balance, 250.5);
        assert_eq!(detail.room_numbers, ["101"]);
        assert_eq!(detail.cash, 520.0);
        assert_eq!(detail.qr, 300.0);
        assert_eq!(detail.discount, 75.0);

        assert_eq!(detail.events.len(), 2);
        assert_eq!(detail.events[0].hour, 9);
        assert_eq!(detail.events[0].time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(detail.events[1].date, d(2024, 5, 2));
        assert_eq!(detail.events[1].hour, 0);
        assert_eq!(detail.events[1].mode, PaymentMode::Qr);
    }

    #[test]
    fn test_rooms_count() {
        let r: RoomsResponse = serde_json::from_str(r#"{"rooms": {"1": {}, "2": {}}}"#).unwrap();
        assert_eq!(r.count(), 2);
        let r: RoomsResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(r.count(), 0);
    }

    #[test]
    fn test_pricing_prefers_classic() {
        let p: PricingResponse = serde_json::from_str(
            r#"{"room_categories_info": [
                {"room_category_name": "Deluxe", "datewise_details": [
                    {"date": "2024-05-01", "current_prices": {"1": 2000, "2": 2200, "3": 2400}}
                ]},
                {"room_category_name": "CLASSIC", "datewise_details": [
                    {"date": "2024-04-30", "current_prices": {"1": 1}},
                    {"date": "2024-05-01", "current_prices": {"1": "999.9", "2": 1199}}
                ]}
            ]}"#,
        )
        .unwrap();

        let q = p.quote_for(d(2024, 5, 1));
        assert_eq!(q.one, Some(999.9));
        assert_eq!(q.two, Some(1199.0));
        assert_eq!(q.three, None);
        assert_eq!(p.quote_for(d(2024, 6, 1)), PriceQuote::default());
    }

    #[test]
    fn test_pricing_falls_back_to_first_category() {
        let p: PricingResponse = serde_json::from_str(
            r#"{"room_categories_info": [
                {"room_category_name": "Suite", "datewise_details": [
                    {"date": "2024-05-01", "current_prices": {"1": 3000}}
                ]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(p.quote_for(d(2024, 5, 1)).one, Some(3000.0));
    }
}
