//! In-memory aggregates built from payment events and booking records.
//!
//! Every bucket is a plain sum: folding the same events in any order gives the
//! same totals, and merging two buckets equals folding both event streams.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::dates::DateWindow;
use crate::models::{
    BookingRecord, Channel, PaymentEvent, PaymentMode, ReportRow, RoomSlot, StayRow,
};

// ── Payment-mode totals ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModeTotals {
    pub cash: f64,
    pub qr: f64,
    pub online: f64,
    pub discount: f64,
}

impl ModeTotals {
    pub fn add(&mut self, mode: PaymentMode, amount: f64) {
        match mode {
            PaymentMode::Cash => self.cash += amount,
            PaymentMode::Qr => self.qr += amount,
            PaymentMode::Online => self.online += amount,
            PaymentMode::Discount => self.discount += amount,
        }
    }

    pub fn get(&self, mode: PaymentMode) -> f64 {
        match mode {
            PaymentMode::Cash => self.cash,
            PaymentMode::Qr => self.qr,
            PaymentMode::Online => self.online,
            PaymentMode::Discount => self.discount,
        }
    }

    pub fn total(&self) -> f64 {
        self.cash + self.qr + self.online + self.discount
    }

    pub fn merge(&mut self, other: &ModeTotals) {
        for mode in PaymentMode::ALL {
            self.add(mode, other.get(mode));
        }
    }
}

// ── Date × mode ───────────────────────────────────────────────────────────────

/// Date → payment-mode totals. Dates of the report window are always present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyCollection {
    days: BTreeMap<NaiveDate, ModeTotals>,
}

impl DailyCollection {
    /// Pre-fill every date in `window` with zeros.
    pub fn for_window(window: &DateWindow) -> Self {
        Self {
            days: window.days().into_iter().map(|d| (d, ModeTotals::default())).collect(),
        }
    }

    pub fn add(&mut self, event: &PaymentEvent) {
        self.days.entry(event.date).or_default().add(event.mode, event.amount);
    }

    pub fn get(&self, date: NaiveDate) -> ModeTotals {
        self.days.get(&date).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &ModeTotals)> {
        self.days.iter()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn totals(&self) -> ModeTotals {
        let mut t = ModeTotals::default();
        for day in self.days.values() {
            t.merge(day);
        }
        t
    }

    pub fn merge(&mut self, other: &DailyCollection) {
        for (date, totals) in &other.days {
            self.days.entry(*date).or_default().merge(totals);
        }
    }
}

// ── Hour × cash ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyCash([f64; 24]);

impl Default for HourlyCash {
    fn default() -> Self {
        Self([0.0; 24])
    }
}

impl HourlyCash {
    /// Only cash payments count.
    pub fn add(&mut self, event: &PaymentEvent) {
        if event.mode == PaymentMode::Cash {
            self.0[(event.hour as usize) % 24] += event.amount;
        }
    }

    pub fn hours(&self) -> &[f64; 24] {
        &self.0
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn merge(&mut self, other: &HourlyCash) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += b;
        }
    }
}

// ── Channel counts ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelCounts([u64; 8]);

impl ChannelCounts {
    pub fn add(&mut self, channel: Channel, n: u64) {
        self.0[channel.index()] += n;
    }

    pub fn get(&self, channel: Channel) -> u64 {
        self.0[channel.index()]
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub fn merge(&mut self, other: &ChannelCounts) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += b;
        }
    }
}

/// Hour × channel booking counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HourlyChannels([ChannelCounts; 24]);

impl HourlyChannels {
    pub fn add(&mut self, hour: u32, channel: Channel) {
        self.0[(hour as usize) % 24].add(channel, 1);
    }

    pub fn hour(&self, hour: u32) -> &ChannelCounts {
        &self.0[(hour as usize) % 24]
    }

    pub fn column_totals(&self) -> ChannelCounts {
        let mut t = ChannelCounts::default();
        for h in &self.0 {
            t.merge(h);
        }
        t
    }

    pub fn merge(&mut self, other: &HourlyChannels) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            a.merge(b);
        }
    }
}

// ── Per-booking ledger ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct LedgerEntry {
    guest_name: String,
    status: String,
    source: Channel,
    checkin: Option<NaiveDate>,
    checkout: Option<NaiveDate>,
    totals: ModeTotals,
    times: BTreeSet<String>,
}

/// (date, booking) → mode totals and the payment times seen.
#[derive(Debug, Clone, Default)]
pub struct BookingLedger {
    entries: BTreeMap<(NaiveDate, String), LedgerEntry>,
}

impl BookingLedger {
    pub fn add(&mut self, booking: &BookingRecord, source: Channel, event: &PaymentEvent) {
        let key = (event.date, booking.booking_no().unwrap_or_default().to_string());
        let entry = self.entries.entry(key).or_insert_with(|| LedgerEntry {
            guest_name: booking.guest_name.clone().unwrap_or_default(),
            status: booking.status.to_string(),
            source,
            checkin: booking.checkin,
            checkout: booking.checkout,
            totals: ModeTotals::default(),
            times: BTreeSet::new(),
        });
        entry.totals.add(event.mode, event.amount);
        entry.times.insert(event.time.format("%H:%M").to_string());
    }

    pub fn into_rows(self) -> Vec<ReportRow> {
        self.entries
            .into_iter()
            .map(|((date, booking_no), e)| ReportRow {
                date,
                booking_no,
                guest_name: e.guest_name,
                status: e.status,
                source: e.source,
                checkin: e.checkin,
                checkout: e.checkout,
                cash: e.totals.cash,
                qr: e.totals.qr,
                online: e.totals.online,
                discount: e.totals.discount,
                total_paid: e.totals.total(),
                times: e.times.into_iter().collect::<Vec<_>>().join(", "),
            })
            .collect()
    }
}

// ── Collection summary ────────────────────────────────────────────────────────

/// Today's collection for one property (or all of them).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollectionSummary {
    pub guests_paid: usize,
    pub totals: ModeTotals,
}

impl CollectionSummary {
    pub fn merge(&mut self, other: &CollectionSummary) {
        self.guests_paid += other.guests_paid;
        self.totals.merge(&other.totals);
    }
}

// ── Occupancy ─────────────────────────────────────────────────────────────────

/// Status counters and in-house rows for one property on one business date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OccupancySummary {
    pub total_rooms: u64,
    pub in_house: u64,
    pub checked_out: u64,
    pub upcoming: u64,
    pub cancelled: u64,
    pub early_checkins: Vec<String>,
    pub late_checkouts: Vec<String>,
    pub rows: Vec<StayRow>,
}

impl OccupancySummary {
    pub fn booked_rooms(&self) -> u64 {
        self.rows.iter().map(|r| r.rooms as u64).sum()
    }

    pub fn available_rooms(&self) -> i64 {
        self.total_rooms as i64 - self.booked_rooms() as i64
    }

    /// Whole percent, rounded.
    pub fn occupancy_pct(&self) -> u64 {
        if self.total_rooms == 0 {
            return 0;
        }
        (self.booked_rooms() as f64 / self.total_rooms as f64 * 100.0).round() as u64
    }

    pub fn rooms_by_channel(&self) -> ChannelCounts {
        let mut c = ChannelCounts::default();
        for r in &self.rows {
            c.add(r.source, r.rooms as u64);
        }
        c
    }

    pub fn amount(&self) -> f64 {
        self.rows.iter().map(|r| r.amount).sum()
    }

    pub fn balance(&self) -> f64 {
        self.rows.iter().map(|r| r.balance).sum()
    }

    pub fn mode_totals(&self) -> ModeTotals {
        let mut t = ModeTotals::default();
        for r in &self.rows {
            t.cash += r.cash;
            t.qr += r.qr;
            t.online += r.online;
            t.discount += r.discount;
        }
        t
    }

    /// Average room rate over every booked room, to two decimals.
    pub fn arr(&self) -> f64 {
        average_rate(self.amount(), self.booked_rooms())
    }

    /// Average room rate over rooms sold through the OYO channel only.
    pub fn app_arr(&self) -> f64 {
        let (amount, rooms) = self
            .rows
            .iter()
            .filter(|r| r.source == Channel::Oyo)
            .fold((0.0, 0u64), |(a, n), r| (a + r.amount, n + r.rooms as u64));
        average_rate(amount, rooms)
    }

    pub fn has_exceptions(&self) -> bool {
        !self.early_checkins.is_empty() || !self.late_checkouts.is_empty()
    }

    /// Consolidated view: counters add up and rows concatenate.
    pub fn merge(&mut self, other: &OccupancySummary) {
        self.total_rooms += other.total_rooms;
        self.in_house += other.in_house;
        self.checked_out += other.checked_out;
        self.upcoming += other.upcoming;
        self.cancelled += other.cancelled;
        self.early_checkins.extend(other.early_checkins.iter().cloned());
        self.late_checkouts.extend(other.late_checkouts.iter().cloned());
        self.rows.extend(other.rows.iter().cloned());
    }
}

fn average_rate(amount: f64, rooms: u64) -> f64 {
    if rooms == 0 {
        return 0.0;
    }
    round2(amount / rooms as f64)
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ── Ranking ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RankEntry {
    pub rank: usize,
    /// Position in the ranked input; names need not be unique.
    pub index: usize,
    pub name: String,
    pub total: f64,
}

impl RankEntry {
    pub fn badge(&self) -> &'static str {
        match self.rank {
            1 => "🥇 Gold",
            2 => "🥈 Silver",
            3 => "🥉 Bronze",
            _ => "",
        }
    }
}

/// Rank properties by total, highest first; ties keep input order.
pub fn rank(totals: &[(String, f64)]) -> Vec<RankEntry> {
    let mut sorted: Vec<(usize, &(String, f64))> = totals.iter().enumerate().collect();
    sorted.sort_by(|a, b| b.1.1.total_cmp(&a.1.1));
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, (index, (name, total)))| RankEntry {
            rank: i + 1,
            index,
            name: name.clone(),
            total: *total,
        })
        .collect()
}

// ── Room availability ─────────────────────────────────────────────────────────

/// Rooms on one floor, in room-number order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorRooms {
    pub floor: i64,
    pub available: Vec<String>,
    pub booked: Vec<String>,
}

/// Union of the rooms seen over a stay's nights. A room booked on any night
/// counts as booked for the whole stay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomAvailability {
    all: BTreeSet<String>,
    booked: BTreeSet<String>,
    floor_all: BTreeMap<i64, BTreeSet<String>>,
    floor_booked: BTreeMap<i64, BTreeSet<String>>,
}

impl RoomAvailability {
    pub fn add_night(&mut self, rooms: &[RoomSlot]) {
        for room in rooms {
            let number = room.number.trim();
            if number.is_empty() {
                continue;
            }
            self.all.insert(number.to_string());
            if let Some(floor) = room.floor {
                self.floor_all.entry(floor).or_default().insert(number.to_string());
            }
            if room.is_booked() {
                self.booked.insert(number.to_string());
                if let Some(floor) = room.floor {
                    self.floor_booked.entry(floor).or_default().insert(number.to_string());
                }
            }
        }
    }

    pub fn total(&self) -> usize {
        self.all.len()
    }

    pub fn booked(&self) -> usize {
        self.booked.len()
    }

    pub fn available(&self) -> usize {
        self.total().saturating_sub(self.booked())
    }

    pub fn occupancy_pct(&self) -> u64 {
        if self.total() == 0 {
            return 0;
        }
        (self.booked() as f64 / self.total() as f64 * 100.0).round() as u64
    }

    /// Floors with rooms, lowest first. Rooms without a floor only count in the totals.
    pub fn floors(&self) -> Vec<FloorRooms> {
        let floors: BTreeSet<i64> =
            self.floor_all.keys().chain(self.floor_booked.keys()).copied().collect();
        let empty = BTreeSet::new();

        floors
            .into_iter()
            .map(|floor| {
                let all = self.floor_all.get(&floor).unwrap_or(&empty);
                let booked = self.floor_booked.get(&floor).unwrap_or(&empty);
                FloorRooms {
                    floor,
                    available: sorted_rooms(all.difference(booked)),
                    booked: sorted_rooms(booked.iter()),
                }
            })
            .collect()
    }
}

/// Numeric room numbers first, in numeric order; the rest after them.
fn sorted_rooms<'a>(rooms: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut v: Vec<String> = rooms.cloned().collect();
    v.sort_by_key(|n| (n.parse::<i64>().unwrap_or(999_999), n.clone()));
    v
}
