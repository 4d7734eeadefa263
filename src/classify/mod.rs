//! Booking → channel and vendor payment mode → bucket.
//!
//! Channel rules are evaluated top to bottom and the first match wins. Several
//! rules can hold for the same booking (a corporate booking made through an
//! OTA, say); the order below is the precedence.

use crate::models::{BookingRecord, Channel, PaymentMode};

const OYO_DIRECT_SOURCES: [&str; 6] = [
    "Android App",
    "IOS App",
    "Web Booking",
    "Mobile Web Booking",
    "Website Booking",
    "Direct",
];

pub fn classify(b: &BookingRecord) -> Channel {
    let source = b.source.as_deref().unwrap_or("").trim();
    let ota = b.ota_source.as_deref().unwrap_or("").trim();
    let sub = b.sub_source.as_deref().unwrap_or("").trim();
    let identifier = b.booking_identifier.as_deref().unwrap_or("").trim();

    if identifier == "TA" {
        return Channel::Ta;
    }
    if source == "Walk In" {
        return Channel::WalkIn;
    }
    if b.is_corporate || sub == "corporate" {
        return Channel::Cb;
    }
    if ota.contains("Booking.com") {
        return Channel::Bdc;
    }
    if ota.contains("GoMMT") {
        return Channel::Mmt;
    }
    if ota.contains("Agoda") {
        return Channel::Agoda;
    }
    if source == "Travel Agent" || sub == "TPO" {
        return Channel::Ta;
    }
    if OYO_DIRECT_SOURCES.contains(&source) {
        return Channel::Oyo;
    }
    Channel::Oba
}

pub fn payment_mode(vendor_mode: &str) -> PaymentMode {
    match vendor_mode.trim() {
        "Cash at Hotel" => PaymentMode::Cash,
        "UPI QR" => PaymentMode::Qr,
        "oyo_wizard_discount" => PaymentMode::Discount,
        _ => PaymentMode::Online,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(json: &str) -> BookingRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_scenarios() {
        assert_eq!(classify(&booking(r#"{"source": "Walk In"}"#)), Channel::WalkIn);
        assert_eq!(classify(&booking(r#"{"ota_source": "GoMMT"}"#)), Channel::Mmt);
        assert_eq!(
            classify(&booking(r#"{"source": "Travel Agent", "sub_source": "TPO"}"#)),
            Channel::Ta
        );
        assert_eq!(classify(&booking(r#"{"is_corporate": true}"#)), Channel::Cb);
        assert_eq!(classify(&booking(r#"{"source": "Direct"}"#)), Channel::Oyo);
    }

    #[test]
    fn test_unmatched_falls_back_to_oba() {
        assert_eq!(classify(&booking(r#"{"source": "Unknown App"}"#)), Channel::Oba);
        assert_eq!(classify(&BookingRecord::default()), Channel::Oba);
    }

    #[test]
    fn test_ta_identifier_beats_everything() {
        let cases = [
            r#"{"booking_identifier": "TA", "source": "Walk In"}"#,
            r#"{"booking_identifier": "TA", "is_corporate": true}"#,
            r#"{"booking_identifier": "TA", "ota_source": "Booking.com"}"#,
            r#"{"booking_identifier": "TA", "source": "Android App"}"#,
        ];
        for json in cases {
            assert_eq!(classify(&booking(json)), Channel::Ta, "{}", json);
        }
    }

    #[test]
    fn test_first_listed_rule_wins() {
        // corporate precedes the OTA rules
        assert_eq!(
            classify(&booking(r#"{"sub_source": "corporate", "ota_source": "Agoda"}"#)),
            Channel::Cb
        );
        // OTA precedes travel agent
        assert_eq!(
            classify(&booking(r#"{"source": "Travel Agent", "ota_source": "Booking.com B2B"}"#)),
            Channel::Bdc
        );
        // walk-in precedes corporate
        assert_eq!(
            classify(&booking(r#"{"source": "Walk In", "is_corporate": true}"#)),
            Channel::WalkIn
        );
    }

    #[test]
    fn test_every_direct_source_maps_to_oyo() {
        for src in OYO_DIRECT_SOURCES {
            let b = BookingRecord {
                source: Some(src.to_string()),
                ..Default::default()
            };
            assert_eq!(classify(&b), Channel::Oyo);
        }
    }

    #[test]
    fn test_payment_mode() {
        assert_eq!(payment_mode("Cash at Hotel"), PaymentMode::Cash);
        assert_eq!(payment_mode("UPI QR"), PaymentMode::Qr);
        assert_eq!(payment_mode("oyo_wizard_discount"), PaymentMode::Discount);
        assert_eq!(payment_mode("Prepaid"), PaymentMode::Online);
        assert_eq!(payment_mode(""), PaymentMode::Online);
    }
}
