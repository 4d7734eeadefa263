//! Per-property jobs. Each one pages through the property's bookings over the
//! lookback window and folds what it needs into a report-specific result.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Timelike};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::details::DetailFetcher;
use super::fanout::PipelineError;
use crate::aggregate::{
    BookingLedger, CollectionSummary, DailyCollection, HourlyCash, HourlyChannels,
    OccupancySummary, RoomAvailability, round2,
};
use crate::api::{ApiError, HotelApi};
use crate::classify::classify;
use crate::dates::{ReportClock, ReportWindow};
use crate::models::{
    BookingRecord, BookingStatus, PriceQuote, PropertyConfig, PropertyDetails, ReportRow, StayRow,
};

/// Immutable inputs shared by every property job of one run.
#[derive(Clone)]
pub struct JobContext {
    pub api: Arc<dyn HotelApi>,
    pub clock: ReportClock,
    pub window: ReportWindow,
    pub batch_size: u32,
    pub detail_concurrency: usize,
}

impl JobContext {
    fn details(&self, property: &PropertyConfig) -> DetailFetcher {
        DetailFetcher::new(
            Arc::clone(&self.api),
            property.clone(),
            self.detail_concurrency,
            self.clock,
        )
    }
}

// ── Booking list ──────────────────────────────────────────────────────────────

/// Every booking checked in during the lookback window, once per booking number.
pub async fn fetch_bookings(
    ctx: &JobContext,
    property: &PropertyConfig,
) -> Result<Vec<BookingRecord>, ApiError> {
    let batch = ctx.batch_size.max(1);
    let mut offset = 0;
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    loop {
        let page = ctx
            .api
            .booking_page(property, &ctx.window.lookback, offset, batch)
            .await?;
        let ids = page.id_count();
        if ids == 0 {
            break;
        }

        let bookings: Vec<BookingRecord> = page.into_bookings().collect();
        if bookings.is_empty() {
            break;
        }

        let before = out.len();
        for b in bookings {
            let duplicate = b.booking_no().is_some_and(|no| !seen.insert(no.to_string()));
            if !duplicate {
                out.push(b);
            }
        }
        debug!("{}: page at {} → {} ids, {} new bookings", property.name, offset, ids, out.len() - before);

        if ids < batch as usize {
            break;
        }
        offset += batch;
    }

    Ok(out)
}

/// Booking numbers of guests who have arrived.
fn stayed_booking_nos(bookings: &[BookingRecord]) -> Vec<String> {
    bookings
        .iter()
        .filter(|b| b.status.is_stayed())
        .filter_map(|b| b.booking_no().map(str::to_string))
        .collect()
}

// ── Payments ──────────────────────────────────────────────────────────────────

/// Payments received during the target window, in every shape the reports need.
#[derive(Debug, Clone, Default)]
pub struct PaymentSnapshot {
    pub rows: Vec<ReportRow>,
    pub daily: DailyCollection,
    pub hourly: HourlyCash,
    pub summary: CollectionSummary,
    /// Bookings left out because their details never came back.
    pub skipped: usize,
}

pub async fn payments_job(ctx: JobContext, property: PropertyConfig) -> Result<PaymentSnapshot> {
    let target = ctx.window.target;
    let bookings = fetch_bookings(&ctx, &property)
        .await
        .with_context(|| format!("{}: booking list", property.name))?;

    let mut details = ctx.details(&property);
    details.fetch(&stayed_booking_nos(&bookings)).await;

    let mut ledger = BookingLedger::default();
    let mut daily = DailyCollection::for_window(&target);
    let mut hourly = HourlyCash::default();
    let mut paid: BTreeSet<String> = BTreeSet::new();

    for b in bookings.iter().filter(|b| b.status.is_stayed()) {
        let Some(no) = b.booking_no() else { continue };
        let Some(detail) = details.get(no) else { continue };
        let channel = classify(b);

        for event in detail.events.iter().filter(|e| target.contains(e.date)) {
            ledger.add(b, channel, event);
            daily.add(event);
            hourly.add(event);
            paid.insert(no.to_string());
        }
    }

    let summary = CollectionSummary {
        guests_paid: paid.len(),
        totals: daily.totals(),
    };
    info!(
        "{}: {} bookings, {} paid in {}, total {:.2}",
        property.name,
        bookings.len(),
        summary.guests_paid,
        target,
        summary.totals.total()
    );

    Ok(PaymentSnapshot {
        rows: ledger.into_rows(),
        daily,
        hourly,
        summary,
        skipped: details.skipped(),
    })
}

// ── Check-ins by channel ──────────────────────────────────────────────────────

/// Arrived bookings whose check-in time falls in the target window, by hour and channel.
pub async fn checkins_job(ctx: JobContext, property: PropertyConfig) -> Result<HourlyChannels> {
    let target = ctx.window.target;
    let bookings = fetch_bookings(&ctx, &property)
        .await
        .with_context(|| format!("{}: booking list", property.name))?;

    let mut counts = HourlyChannels::default();
    let mut counted = 0;
    for b in bookings.iter().filter(|b| b.status.is_stayed()) {
        let Some(at) = b.checkin_time.as_deref().and_then(|raw| ctx.clock.localize(raw)) else {
            continue;
        };
        if !target.contains(at.date_naive()) {
            continue;
        }
        counts.add(at.hour(), classify(b));
        counted += 1;
    }

    info!("{}: {} check-ins in {}", property.name, counted, target);
    Ok(counts)
}

// ── Occupancy ─────────────────────────────────────────────────────────────────

/// Status counters and in-house rows for the business date.
///
/// A checked-in booking is in house when its stay covers the report night,
/// or when it arrived early the next morning before the cutover.
pub async fn occupancy_job(ctx: JobContext, property: PropertyConfig) -> Result<OccupancySummary> {
    let total_rooms = ctx
        .api
        .room_count(&property)
        .await
        .with_context(|| format!("{}: room inventory", property.name))?;
    if total_rooms == 0 {
        return Err(PipelineError::NoRooms { property: property.name.clone() }.into());
    }

    let bookings = fetch_bookings(&ctx, &property)
        .await
        .with_context(|| format!("{}: booking list", property.name))?;

    let night = ctx.window.target.from;
    let next = night + Duration::days(1);
    let today = ctx.clock.today();

    let mut summary = OccupancySummary { total_rooms, ..Default::default() };
    let mut early: BTreeSet<String> = BTreeSet::new();
    let mut late: BTreeSet<String> = BTreeSet::new();
    let mut staying: Vec<&BookingRecord> = Vec::new();

    for b in &bookings {
        let (Some(ci), Some(co)) = (b.checkin, b.checkout) else { continue };
        let no = b.booking_no().unwrap_or_default().to_string();

        match b.status {
            BookingStatus::CheckedIn => {
                if ci <= next {
                    summary.in_house += 1;
                }
                if ci > night {
                    early.insert(no);
                } else if co == night {
                    late.insert(no);
                }
                if covers_night(ci, co, night) {
                    staying.push(b);
                }
            }
            BookingStatus::CheckedOut if co == today => summary.checked_out += 1,
            BookingStatus::Confirmed if ci == today => summary.upcoming += 1,
            BookingStatus::Cancelled if ci == night || ci == next => summary.cancelled += 1,
            _ => {}
        }
    }

    let nos: Vec<String> = staying
        .iter()
        .filter_map(|b| b.booking_no().map(str::to_string))
        .collect();
    let mut details = ctx.details(&property);
    details.fetch(&nos).await;

    for b in staying {
        let Some(detail) = b.booking_no().and_then(|no| details.get(no)) else { continue };
        let nights = b.stay_nights() as f64;
        let per_night = |x: f64| round2(x / nights);

        summary.rows.push(StayRow {
            date: night,
            booking_no: b.booking_no().unwrap_or_default().to_string(),
            guest_name: b.guest_name.clone().unwrap_or_default(),
            source: classify(b),
            checkin: b.checkin,
            checkout: b.checkout,
            rooms: b.rooms(),
            room_numbers: detail.room_numbers.join(", "),
            amount: per_night(b.get_amount_paid + detail.balance),
            cash: per_night(detail.cash),
            qr: per_night(detail.qr),
            online: per_night(detail.online),
            discount: per_night(detail.discount),
            balance: per_night(detail.balance),
        });
    }

    summary.early_checkins = early.into_iter().collect();
    summary.late_checkouts = late.into_iter().collect();

    info!(
        "{}: {} in house, {} rooms booked of {}",
        property.name,
        summary.in_house,
        summary.booked_rooms(),
        total_rooms
    );
    Ok(summary)
}

fn covers_night(checkin: NaiveDate, checkout: NaiveDate, night: NaiveDate) -> bool {
    (checkin <= night || checkin == night + Duration::days(1)) && night < checkout
}

// ── Availability ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PropertyAvailability {
    pub rooms: RoomAvailability,
    /// Price for the whole stay, per guest count.
    pub quote: PriceQuote,
    /// `None` when the property-details endpoint failed.
    pub details: Option<PropertyDetails>,
}

pub async fn availability_job(
    ctx: JobContext,
    property: PropertyConfig,
) -> Result<PropertyAvailability> {
    let stay = ctx.window.target;
    let nights = stay.len() as i64;

    let mut rooms = RoomAvailability::default();
    for night in stay.days() {
        let slots = ctx
            .api
            .rooms_for_night(&property, night)
            .await
            .with_context(|| format!("{}: rooms on {}", property.name, night))?;
        rooms.add_night(&slots);
    }

    let quote = ctx
        .api
        .price_quote(&property, stay.from)
        .await
        .with_context(|| format!("{}: pricing", property.name))?
        .for_nights(nights);

    let details = match ctx.api.property_details(&property).await {
        Ok(d) => Some(d),
        Err(e) => {
            warn!("{}: property details unavailable: {}", property.name, e);
            None
        }
    };

    info!(
        "{}: {} rooms, {} booked over {} night(s)",
        property.name,
        rooms.total(),
        rooms.booked(),
        nights
    );
    Ok(PropertyAvailability { rooms, quote, details })
}
