pub mod lenient;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Property ──────────────────────────────────────────────────────────────────

/// One hotel location and the credentials used to query it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyConfig {
    pub key: u32,
    pub name: String,
    pub qid: u64,
    pub uif: String,
    pub uuid: String,
}

// ── Booking list entry ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BookingStatus {
    CheckedIn,
    CheckedOut,
    Confirmed,
    Cancelled,
    #[default]
    Unknown,
    Other(String),
}

impl From<String> for BookingStatus {
    fn from(s: String) -> Self {
        match s.trim() {
            "Checked In" => Self::CheckedIn,
            "Checked Out" => Self::CheckedOut,
            "Confirm Booking" => Self::Confirmed,
            "Cancelled Booking" => Self::Cancelled,
            "" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }
}

fn status<'de, D: serde::Deserializer<'de>>(d: D) -> Result<BookingStatus, D::Error> {
    Ok(BookingStatus::from(lenient::text(d)?))
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CheckedIn => "Checked In",
            Self::CheckedOut => "Checked Out",
            Self::Confirmed => "Confirm Booking",
            Self::Cancelled => "Cancelled Booking",
            Self::Unknown => "",
            Self::Other(s) => s,
        };
        f.write_str(s)
    }
}

impl BookingStatus {
    /// Guest has arrived (in-house or already left); payments are final enough to report.
    pub fn is_stayed(&self) -> bool {
        matches!(self, Self::CheckedIn | Self::CheckedOut)
    }
}

/// One reservation as returned by the booking list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BookingRecord {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub booking_no: Option<String>,
    #[serde(default, deserialize_with = "status")]
    pub status: BookingStatus,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub guest_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_date")]
    pub checkin: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::opt_date")]
    pub checkout: Option<NaiveDate>,
    /// Actual check-in timestamp, when the guest has arrived.
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub checkin_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub ota_source: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub sub_source: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_corporate: bool,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub booking_identifier: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub no_of_rooms: Option<u32>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub get_amount_paid: f64,
}

impl BookingRecord {
    pub fn rooms(&self) -> u32 {
        self.no_of_rooms.unwrap_or(1)
    }

    pub fn booking_no(&self) -> Option<&str> {
        self.booking_no.as_deref()
    }

    /// Nights between check-in and check-out, never less than one.
    pub fn stay_nights(&self) -> i64 {
        match (self.checkin, self.checkout) {
            (Some(ci), Some(co)) => (co - ci).num_days().max(1),
            _ => 1,
        }
    }
}

// ── Channel ───────────────────────────────────────────────────────────────────

/// Sales channel a reservation came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Oyo,
    WalkIn,
    Mmt,
    Bdc,
    Agoda,
    Cb,
    Ta,
    Oba,
}

impl Channel {
    /// Report column order.
    pub const ALL: [Channel; 8] = [
        Channel::Oyo,
        Channel::WalkIn,
        Channel::Mmt,
        Channel::Bdc,
        Channel::Agoda,
        Channel::Cb,
        Channel::Ta,
        Channel::Oba,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Channel::Oyo => "OYO",
            Channel::WalkIn => "Walk-in",
            Channel::Mmt => "MMT",
            Channel::Bdc => "BDC",
            Channel::Agoda => "Agoda",
            Channel::Cb => "CB",
            Channel::Ta => "TA",
            Channel::Oba => "OBA",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Channel {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.label())
    }
}

// ── Payments ──────────────────────────────────────────────────────────────────

/// Payment mode bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentMode {
    Cash,
    Qr,
    Online,
    Discount,
}

impl PaymentMode {
    pub const ALL: [PaymentMode; 4] = [
        PaymentMode::Cash,
        PaymentMode::Qr,
        PaymentMode::Online,
        PaymentMode::Discount,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PaymentMode::Cash => "Cash",
            PaymentMode::Qr => "QR",
            PaymentMode::Online => "Online",
            PaymentMode::Discount => "Discount",
        }
    }
}

/// One payment line, already localised to the report's clock.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEvent {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub hour: u32,
    pub amount: f64,
    pub mode: PaymentMode,
}

/// Everything the detail endpoint tells us about one booking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingDetail {
    /// Positive, timestamped payments.
    pub events: Vec<PaymentEvent>,
    /// Per-mode sums over every payment line, timestamped or not.
    pub cash: f64,
    pub qr: f64,
    pub online: f64,
    pub discount: f64,
    /// Amount still payable.
    pub balance: f64,
    pub room_numbers: Vec<String>,
}

// ── Flattened rows ────────────────────────────────────────────────────────────

/// One booking's payments on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Booking Id")]
    pub booking_no: String,
    #[serde(rename = "Guest Name")]
    pub guest_name: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Booking Source")]
    pub source: Channel,
    #[serde(rename = "Check In")]
    pub checkin: Option<NaiveDate>,
    #[serde(rename = "Check Out")]
    pub checkout: Option<NaiveDate>,
    #[serde(rename = "Cash")]
    pub cash: f64,
    #[serde(rename = "QR")]
    pub qr: f64,
    #[serde(rename = "Online")]
    pub online: f64,
    #[serde(rename = "Discount")]
    pub discount: f64,
    #[serde(rename = "Total Paid")]
    pub total_paid: f64,
    #[serde(rename = "Time")]
    pub times: String,
}

/// One in-house booking on the report night, amounts spread per stay-night.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StayRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Booking Id")]
    pub booking_no: String,
    #[serde(rename = "Guest Name")]
    pub guest_name: String,
    #[serde(rename = "Booking Source")]
    pub source: Channel,
    #[serde(rename = "Check In")]
    pub checkin: Option<NaiveDate>,
    #[serde(rename = "Check Out")]
    pub checkout: Option<NaiveDate>,
    #[serde(rename = "Rooms")]
    pub rooms: u32,
    #[serde(rename = "Room Numbers")]
    pub room_numbers: String,
    #[serde(rename = "Amount")]
    pub amount: f64,
    #[serde(rename = "Cash")]
    pub cash: f64,
    #[serde(rename = "QR")]
    pub qr: f64,
    #[serde(rename = "Online")]
    pub online: f64,
    #[serde(rename = "Discount")]
    pub discount: f64,
    #[serde(rename = "Balance")]
    pub balance: f64,
}

// ── Property metadata, rooms, pricing ─────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PropertyDetails {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub alternate_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub plot_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub street: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub pincode: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub map_link: Option<String>,
}

impl PropertyDetails {
    /// "plot, street, city - pincode", skipping blanks.
    pub fn address(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        parts.extend(self.plot_number.clone());
        parts.extend(self.street.clone());
        match (&self.city, &self.pincode) {
            (Some(c), Some(p)) => parts.push(format!("{} - {}", c, p)),
            (Some(c), None) => parts.push(c.clone()),
            (None, Some(p)) => parts.push(p.clone()),
            (None, None) => {}
        }
        if parts.is_empty() { None } else { Some(parts.join(", ")) }
    }
}

/// One physical room on one night, from the blocked-rooms endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RoomSlot {
    #[serde(default, deserialize_with = "lenient::text")]
    pub number: String,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub floor: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub booking_id: Option<String>,
}

impl RoomSlot {
    pub fn is_booked(&self) -> bool {
        self.booking_id.is_some()
    }
}

/// Nightly price for one, two and three guests in the selected room category.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceQuote {
    pub one: Option<f64>,
    pub two: Option<f64>,
    pub three: Option<f64>,
}

impl PriceQuote {
    pub fn for_nights(&self, nights: i64) -> PriceQuote {
        let n = nights as f64;
        PriceQuote {
            one: self.one.map(|p| (p * n).trunc()),
            two: self.two.map(|p| (p * n).trunc()),
            three: self.three.map(|p| (p * n).trunc()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_record_tolerates_vendor_shapes() {
        let b: BookingRecord = serde_json::from_str(
            r#"{
                "booking_no": 123456,
                "status": "Checked In",
                "guest_name": "  A Guest ",
                "checkin": "2024-05-01",
                "checkout": "2024-05-03",
                "source": "Walk In",
                "ota_source": null,
                "is_corporate": null,
                "no_of_rooms": "2",
                "get_amount_paid": "1500.00"
            }"#,
        )
        .unwrap();

        assert_eq!(b.booking_no(), Some("123456"));
        assert_eq!(b.status, BookingStatus::CheckedIn);
        assert_eq!(b.guest_name.as_deref(), Some("A Guest"));
        assert_eq!(b.rooms(), 2);
        assert_eq!(b.stay_nights(), 2);
        assert_eq!(b.get_amount_paid, 1500.0);
        assert!(!b.is_corporate);
        assert!(b.ota_source.is_none());
    }

    #[test]
    fn test_booking_defaults() {
        let b: BookingRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(b.status, BookingStatus::Unknown);
        assert_eq!(b.rooms(), 1);
        assert_eq!(b.stay_nights(), 1);
        assert!(!b.status.is_stayed());
    }

    #[test]
    fn test_status_round_trips_unknown_labels() {
        let s = BookingStatus::from("No Show".to_string());
        assert_eq!(s, BookingStatus::Other("No Show".to_string()));
        assert_eq!(s.to_string(), "No Show");
    }

    #[test]
    fn test_address_skips_blanks() {
        let d = PropertyDetails {
            street: Some("MG Road".into()),
            city: Some("Hyderabad".into()),
            pincode: Some("500001".into()),
            ..Default::default()
        };
        assert_eq!(d.address().as_deref(), Some("MG Road, Hyderabad - 500001"));
        assert_eq!(PropertyDetails::default().address(), None);
    }

    #[test]
    fn test_price_quote_for_nights() {
        let q = PriceQuote { one: Some(999.5), two: None, three: Some(1500.0) };
        let total = q.for_nights(2);
        assert_eq!(total.one, Some(1999.0));
        assert_eq!(total.two, None);
        assert_eq!(total.three, Some(3000.0));
    }
}
