//! Chat message bodies. Every report is a `<pre>` block so columns line up in
//! Telegram's monospace rendering.

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::aggregate::{CollectionSummary, OccupancySummary, RoomAvailability};
use crate::models::{Channel, PriceQuote, PropertyDetails};
use crate::utils::{escape_html, fmt_amount, fmt_number, fmt_whole};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━";
const ROOMS_PER_LINE: usize = 12;
const TEXT_WIDTH: usize = 64;

/// Occupancy report channel order.
const OCCUPANCY_CHANNELS: [Channel; 8] = [
    Channel::WalkIn,
    Channel::Oyo,
    Channel::Mmt,
    Channel::Agoda,
    Channel::Cb,
    Channel::Bdc,
    Channel::Ta,
    Channel::Oba,
];

fn human(d: NaiveDate) -> String {
    d.format("%d/%m/%Y").to_string()
}

// ── Collection ────────────────────────────────────────────────────────────────

pub fn collection(prop: &str, date: NaiveDate, s: &CollectionSummary) -> String {
    let prop = escape_html(prop);
    let t = &s.totals;
    format!(
        "<pre>
DAILY COLLECTION REPORT : {prop}

🏢 Property Code     : {prop}
📅 Date              : {date}

🔹 Total Guests Paid : {guests}

🔹 Total Amount      : ₹{total}
🔹 Cash              : ₹{cash}
🔹 QR                : ₹{qr}
🔹 Online            : ₹{online}
🔹 Discount          : ₹{discount}

</pre>",
        date = human(date),
        guests = s.guests_paid,
        total = fmt_amount(t.total()),
        cash = fmt_amount(t.cash),
        qr = fmt_amount(t.qr),
        online = fmt_amount(t.online),
        discount = fmt_amount(t.discount),
    )
}

// ── Occupancy ─────────────────────────────────────────────────────────────────

pub fn occupancy(prop: &str, now: DateTime<FixedOffset>, s: &OccupancySummary) -> String {
    let prop = escape_html(prop);
    let booked = s.booked_rooms();
    let modes = s.mode_totals();
    let by_channel = s.rooms_by_channel();

    let mut lines = vec![format!("<pre>\nHOURLY REPORT : {}\n", prop)];
    lines.push(format!("🏢 Property Code     : {}", prop));
    lines.push(format!("📅 Date              : {}", now.format("%d/%m/%Y")));
    lines.push(format!("⏰ Time              : {}", now.format("%I:%M %p")));
    lines.push(format!("📆 Day               : {}\n", now.format("%A")));

    lines.push(format!("🔹 URN In-House      : {}", booked));
    lines.push(format!("🔹 Checked Out       : {:02}", s.checked_out));
    lines.push(format!("🔹 Upcoming Bookings : {:02}", s.upcoming));
    lines.push(format!("🔹 Cancelled         : {:02}\n", s.cancelled));

    lines.push(format!("🔹 Total Rooms       : {}", s.total_rooms));
    lines.push(format!("🔹 Booked Rooms      : {}", booked));
    lines.push(format!("🔹 Available Rooms   : {}", s.available_rooms()));
    lines.push(format!("🔹 Occupancy         : {}%\n", s.occupancy_pct()));

    for ch in OCCUPANCY_CHANNELS {
        lines.push(format!("🔹 {:<18}: {:02}", ch.label(), by_channel.get(ch)));
    }
    lines.push(String::new());

    let amounts = [
        ("Total Amount", s.amount()),
        ("Cash", modes.cash),
        ("QR", modes.qr),
        ("Online", modes.online),
        ("Discount", modes.discount),
        ("Balance", s.balance()),
    ];
    for (label, value) in amounts {
        lines.push(format!("🔹 {:<18}: ₹{}", label, fmt_whole(value)));
    }
    lines.push(String::new());

    lines.push(format!("🔹 ARR               : ₹{}", fmt_amount(s.arr())));
    lines.push(format!("🔹 App ARR           : ₹{}\n", fmt_amount(s.app_arr())));
    lines.push("</pre>".to_string());
    lines.join("\n")
}

/// Early check-ins and late check-outs on the report night; `None` when there are none.
pub fn exception_alert(prop: &str, date: NaiveDate, s: &OccupancySummary) -> Option<String> {
    if !s.has_exceptions() {
        return None;
    }

    let mut lines = vec![
        "<b>IN-HOUSE EXCEPTION ALERT</b>".to_string(),
        format!("<b>🏢 Property :</b> {}", escape_html(prop)),
        format!("<b>📅 Date     :</b> {}", human(date)),
        String::new(),
    ];
    for (title, ids) in [
        ("🟢 <b>EARLY CHECK-IN FOUND :</b>", &s.early_checkins),
        ("🔴 <b>LATE CHECK-OUT FOUND :</b>", &s.late_checkouts),
    ] {
        if ids.is_empty() {
            continue;
        }
        lines.push(format!("{} <b>{}</b>", title, ids.len()));
        let shown: Vec<String> = ids.iter().take(10).map(|id| escape_html(id)).collect();
        let more = if ids.len() > 10 { " ..." } else { "" };
        lines.push(format!("<b>Booking IDs:</b> {}{}", shown.join(", "), more));
        lines.push(String::new());
    }
    lines.push("<b>Action Required:</b> Please verify front-office status immediately.".to_string());
    Some(lines.join("\n"))
}

// ── Availability ──────────────────────────────────────────────────────────────

/// `prefix` then up to twelve rooms per line; continuation lines are indented
/// to line up under the first room.
pub fn wrap_rooms(prefix: &str, rooms: &[String]) -> String {
    if rooms.is_empty() {
        return format!("{} -", prefix);
    }
    let indent = " ".repeat(prefix.chars().count());
    rooms
        .chunks(ROOMS_PER_LINE)
        .enumerate()
        .map(|(i, chunk)| {
            let lead = if i == 0 { prefix } else { indent.as_str() };
            format!("{} {}", lead, chunk.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Word-wrap to `width`; links are cut at `width` instead. Blank text is `-`.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return vec!["-".to_string()];
    }
    if text.starts_with("http://") || text.starts_with("https://") {
        let chars: Vec<char> = text.chars().collect();
        return chars.chunks(width).map(|c| c.iter().collect()).collect();
    }

    let mut lines = Vec::new();
    let mut cur = String::new();
    for word in text.split_whitespace() {
        if cur.is_empty() {
            cur = word.to_string();
        } else if cur.chars().count() + word.chars().count() + 1 <= width {
            cur.push(' ');
            cur.push_str(word);
        } else {
            lines.push(std::mem::take(&mut cur));
            cur = word.to_string();
        }
    }
    if !cur.is_empty() {
        lines.push(cur);
    }
    lines
}

fn details_block(details: Option<&PropertyDetails>) -> String {
    let field = |f: fn(&PropertyDetails) -> Option<String>| {
        details.and_then(f).unwrap_or_else(|| "-".to_string())
    };
    let blocks = [
        ("🏨 Name:", field(|d| d.name.clone())),
        ("🏷 Alternate Name:", field(|d| d.alternate_name.clone())),
        ("📍 Address:", field(|d| d.address())),
        ("🗺 Google Map:", field(|d| d.map_link.clone())),
    ];

    let mut lines = vec![RULE.to_string(), "Property Details".to_string(), RULE.to_string()];
    for (i, (label, value)) in blocks.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.push(label.to_string());
        lines.extend(wrap_text(value, TEXT_WIDTH).iter().map(|l| format!("  {}", escape_html(l))));
    }
    lines.join("\n")
}

fn price(p: Option<f64>) -> String {
    p.map(|v| fmt_number(v as i64)).unwrap_or_else(|| "-".to_string())
}

/// Rooms, floor layout, stay price and property details for one property.
pub fn availability(
    prop: &str,
    checkin: NaiveDate,
    checkout: NaiveDate,
    rooms: &RoomAvailability,
    quote: &PriceQuote,
    details: Option<&PropertyDetails>,
) -> String {
    let nights = (checkout - checkin).num_days().max(1);
    let floors = rooms.floors();

    let mut lines = vec![format!("<pre>\nRoom and Price Details : {}\n", escape_html(prop))];
    lines.push(format!("✅ Stay Dates         : {} to {}\n", human(checkin), human(checkout)));
    lines.push(format!("🌙 Stay Nights        : {}\n", nights));
    lines.push(format!("🏨 Total Rooms        : {}", rooms.total()));
    lines.push(format!("🟢 Available Rooms    : {}", rooms.available()));
    lines.push(format!("🔴 Booked Rooms       : {}\n", rooms.booked()));
    lines.push(format!("🏢 Floors             : {}\n", floors.len()));

    lines.push(format!("{}\nFloor-wise Availability\n{}\n", RULE, RULE));
    for f in &floors {
        lines.push(format!(
            "Floor {}  | 🟢 Avl: {:02}  🔴 Bkd: {:02}",
            f.floor,
            f.available.len(),
            f.booked.len()
        ));
        lines.push(wrap_rooms("🟢", &f.available));
        lines.push(format!("{}\n", wrap_rooms("🔴", &f.booked)));
    }

    lines.push(format!("{}\nPricing (Range Total)\n{}", RULE, RULE));
    lines.push(format!("👤 1 Guest            : ₹{}", price(quote.one)));
    lines.push(format!("👥 2 Guests           : ₹{}", price(quote.two)));
    lines.push(format!("👥👤 3 Guests          : ₹{}\n", price(quote.three)));

    lines.push(details_block(details));
    lines.push("</pre>".to_string());
    lines.join("\n")
}

/// All properties' room counts, busiest first.
pub fn availability_consolidated(
    properties: &[(String, RoomAvailability)],
    checkin: NaiveDate,
    checkout: NaiveDate,
) -> String {
    let total: usize = properties.iter().map(|(_, r)| r.total()).sum();
    let booked: usize = properties.iter().map(|(_, r)| r.booked()).sum();
    let available: usize = properties.iter().map(|(_, r)| r.available()).sum();

    let mut sorted: Vec<&(String, RoomAvailability)> = properties.iter().collect();
    sorted.sort_by(|a, b| b.1.booked().cmp(&a.1.booked()));

    let mut lines = vec!["<pre>\nCONSOLIDATED : ALL\n".to_string()];
    lines.push(format!("🗓 Range : {} → {} (Checkout)\n", human(checkin), human(checkout)));
    lines.push(format!("🏨 Total Rooms        : {}", total));
    lines.push(format!("🟢 Available Rooms     : {}", available));
    lines.push(format!("🔴 Booked Rooms        : {}\n", booked));
    lines.push("📌 Property-wise Summary:\n".to_string());
    for (name, r) in sorted {
        lines.push(format!(
            "- {} | Total:{} | Avl:{} | Bkd:{} | Occ:{}%",
            escape_html(name),
            r.total(),
            r.available(),
            r.booked(),
            r.occupancy_pct()
        ));
    }
    lines.push("</pre>".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ModeTotals;
    use crate::models::{RoomSlot, StayRow};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_collection_message() {
        let s = CollectionSummary {
            guests_paid: 3,
            totals: ModeTotals { cash: 1500.0, qr: 250.5, online: 0.0, discount: 100.0 },
        };
        let msg = collection("HYD1", d(2024, 5, 1), &s);
        assert!(msg.starts_with("<pre>\nDAILY COLLECTION REPORT : HYD1\n"));
        assert!(msg.contains("📅 Date              : 01/05/2024"));
        assert!(msg.contains("🔹 Total Guests Paid : 3"));
        assert!(msg.contains("🔹 Total Amount      : ₹1,850.50"));
        assert!(msg.contains("🔹 Discount          : ₹100.00"));
        assert!(msg.ends_with("</pre>"));
    }

    fn stay(no: &str, source: Channel, rooms: u32, amount: f64) -> StayRow {
        StayRow {
            date: d(2024, 5, 10),
            booking_no: no.into(),
            guest_name: String::new(),
            source,
            checkin: None,
            checkout: None,
            rooms,
            room_numbers: String::new(),
            amount,
            cash: amount,
            qr: 0.0,
            online: 0.0,
            discount: 0.0,
            balance: 12.75,
        }
    }

    #[test]
    fn test_occupancy_message() {
        let s = OccupancySummary {
            total_rooms: 20,
            checked_out: 4,
            upcoming: 2,
            rows: vec![stay("A", Channel::Oyo, 2, 3000.0), stay("B", Channel::WalkIn, 1, 1234.56)],
            ..Default::default()
        };
        let now = DateTime::parse_from_rfc3339("2024-05-10T15:05:00+05:30").unwrap();
        let msg = occupancy("HYD1", now, &s);

        assert!(msg.contains("⏰ Time              : 03:05 PM"));
        assert!(msg.contains("📆 Day               : Friday"));
        assert!(msg.contains("🔹 URN In-House      : 3"));
        assert!(msg.contains("🔹 Checked Out       : 04"));
        assert!(msg.contains("🔹 Occupancy         : 15%"));
        assert!(msg.contains("🔹 Walk-in           : 01"));
        assert!(msg.contains("🔹 OYO               : 02"));
        assert!(msg.contains("🔹 Total Amount      : ₹4,234"));
        assert!(msg.contains("🔹 Balance           : ₹25"));
        assert!(msg.contains("🔹 ARR               : ₹1,411.52"));
        assert!(msg.contains("🔹 App ARR           : ₹1,500.00"));
    }

    #[test]
    fn test_exception_alert() {
        let mut s = OccupancySummary::default();
        assert!(exception_alert("P", d(2024, 5, 10), &s).is_none());

        s.early_checkins = (1..=12).map(|i| format!("E{}", i)).collect();
        let alert = exception_alert("P", d(2024, 5, 10), &s).unwrap();
        assert!(alert.contains("🟢 <b>EARLY CHECK-IN FOUND :</b> <b>12</b>"));
        assert!(alert.contains("E10 ..."));
        assert!(!alert.contains("E11"));
        assert!(!alert.contains("LATE CHECK-OUT"));
        assert!(alert.ends_with("Please verify front-office status immediately."));
    }

    #[test]
    fn test_wrap_rooms() {
        assert_eq!(wrap_rooms("🟢", &[]), "🟢 -");
        let rooms: Vec<String> = (101..=114).map(|n| n.to_string()).collect();
        let wrapped = wrap_rooms("🔴", &rooms);
        let lines: Vec<&str> = wrapped.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("🔴 101, 102"));
        assert_eq!(lines[1], "  113, 114");
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("  ", 64), ["-"]);
        assert_eq!(wrap_text("one two three", 7), ["one two", "three"]);
        let link = format!("https://maps.example.com/{}", "x".repeat(80));
        let parts = wrap_text(&link, 64);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 64);
    }

    #[test]
    fn test_availability_messages() {
        let mut rooms = RoomAvailability::default();
        rooms.add_night(&[
            RoomSlot { number: "101".into(), floor: Some(1), booking_id: Some("B".into()) },
            RoomSlot { number: "102".into(), floor: Some(1), booking_id: None },
        ]);
        let quote = PriceQuote { one: Some(1999.0), two: None, three: Some(2600.0) };
        let msg = availability("HYD1", d(2024, 5, 10), d(2024, 5, 11), &rooms, &quote, None);

        assert!(msg.contains("✅ Stay Dates         : 10/05/2024 to 11/05/2024"));
        assert!(msg.contains("🌙 Stay Nights        : 1"));
        assert!(msg.contains("Floor 1  | 🟢 Avl: 01  🔴 Bkd: 01"));
        assert!(msg.contains("👤 1 Guest            : ₹1,999"));
        assert!(msg.contains("👥 2 Guests           : ₹-"));
        assert!(msg.contains("🏨 Name:\n  -"));
        assert!(msg.ends_with("</pre>"));

        let mut quiet = RoomAvailability::default();
        quiet.add_night(&[RoomSlot { number: "1".into(), floor: None, booking_id: None }]);
        let all = availability_consolidated(
            &[("QUIET".into(), quiet), ("HYD1".into(), rooms)],
            d(2024, 5, 10),
            d(2024, 5, 11),
        );
        assert!(all.contains("🏨 Total Rooms        : 3"));
        let busy = all.find("- HYD1").unwrap();
        let idle = all.find("- QUIET").unwrap();
        assert!(busy < idle);
        assert!(all.contains("- HYD1 | Total:2 | Avl:1 | Bkd:1 | Occ:50%"));
    }

    #[test]
    fn test_consolidated_availability_layout() {
        let mut quiet = RoomAvailability::default();
        quiet.add_night(&[RoomSlot { number: "1".into(), floor: None, booking_id: None }]);
        let all = availability_consolidated(&[("QUIET".into(), quiet)], d(2024, 5, 10), d(2024, 5, 11));

        assert_eq!(
            all,
            "<pre>\nCONSOLIDATED : ALL\n\n\
             🗓 Range : 10/05/2024 → 11/05/2024 (Checkout)\n\n\
             🏨 Total Rooms        : 1\n\
             🟢 Available Rooms     : 1\n\
             🔴 Booked Rooms        : 0\n\n\
             📌 Property-wise Summary:\n\n\
             - QUIET | Total:1 | Avl:1 | Bkd:0 | Occ:0%\n\
             </pre>"
        );
    }
}
