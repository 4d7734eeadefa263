//! Pipeline orchestrator: property jobs → consolidated aggregates → rendered report.
//!
//! ## Reports
//!
//! Every report fans one property job out over all configured properties
//! (`fanout::RoundRunner`), then folds the per-property results into a
//! consolidated view:
//!
//!   - `hourly_cash`, `booking_modes`, `date_wise` render one workbook
//!   - `collection`, `occupancy`, `availability` render one message per property
//!     plus a consolidated message
//!
//! A run with any property still missing after the last round returns an error
//! and produces nothing to deliver.

pub mod collect;
pub mod details;
pub mod fanout;

#[cfg(test)]
mod fake;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use self::collect::JobContext;
use self::fanout::RoundRunner;
use crate::aggregate::{
    CollectionSummary, DailyCollection, HourlyCash, HourlyChannels, OccupancySummary,
    RoomAvailability,
};
use crate::api::HotelApi;
use crate::config::{AppConfig, ReportConfig};
use crate::dates::{DateWindow, ReportClock, ReportWindow, month_label};
use crate::models::{PropertyConfig, ReportRow, StayRow};
use crate::notify::Notifier;
use crate::report::{Document, message, workbook};

// ── Outputs ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct OutMessage {
    pub text: String,
    /// A failed send of a non-critical message is logged and skipped.
    pub critical: bool,
}

impl OutMessage {
    fn critical(text: String) -> Self {
        Self { text, critical: true }
    }

    fn optional(text: String) -> Self {
        Self { text, critical: false }
    }
}

#[derive(Debug, Clone)]
pub enum ReportOutput {
    Document(Document),
    Messages(Vec<OutMessage>),
}

#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub properties: usize,
    pub rounds: u32,
    /// Bookings whose details never came back, summed over properties.
    pub skipped_details: usize,
}

/// A finished report, ready to deliver or export.
#[derive(Debug, Clone)]
pub struct ReportRun {
    /// File stem for exports, e.g. `hourly_cash_2024-05-10`.
    pub name: String,
    pub output: ReportOutput,
    pub payment_rows: Vec<ReportRow>,
    pub stay_rows: Vec<StayRow>,
    pub stats: RunStats,
}

/// Target range for the date-wise collection workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    MonthToDate,
    LastMonth,
    Range(DateWindow),
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct Pipeline {
    api: Arc<dyn HotelApi>,
    clock: ReportClock,
    properties: Vec<PropertyConfig>,
    runner: RoundRunner,
    report: ReportConfig,
    batch_size: u32,
    detail_concurrency: usize,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        api: Arc<dyn HotelApi>,
        clock: ReportClock,
        properties: Vec<PropertyConfig>,
    ) -> Self {
        Self {
            api,
            clock,
            properties,
            runner: RoundRunner::new(&config.pipeline),
            report: config.report.clone(),
            batch_size: config.api.batch_size,
            detail_concurrency: config.pipeline.detail_concurrency,
        }
    }

    /// Run `job` for every property; results come back in configured order.
    async fn fan_out<R, F, Fut>(
        &self,
        window: ReportWindow,
        job: F,
    ) -> Result<(Vec<(PropertyConfig, R)>, u32)>
    where
        R: Send + 'static,
        F: Fn(JobContext, PropertyConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        info!(
            "{} properties | target {} | lookback {}",
            self.properties.len(),
            window.target,
            window.lookback
        );
        let ctx = JobContext {
            api: Arc::clone(&self.api),
            clock: self.clock,
            window,
            batch_size: self.batch_size,
            detail_concurrency: self.detail_concurrency,
        };

        let outcome = self
            .runner
            .run(&self.properties, move |property| job(ctx.clone(), property))
            .await?;

        let mut results = outcome.results;
        let ordered = self
            .properties
            .iter()
            .filter_map(|p| results.remove(&p.key).map(|r| (p.clone(), r)))
            .collect();
        Ok((ordered, outcome.rounds))
    }

    // ── Workbooks ─────────────────────────────────────────────────────────────

    /// Yesterday's cash payments by hour.
    pub async fn hourly_cash(&self) -> Result<ReportRun> {
        let window = self.clock.yesterday_window(self.report.payment_lookback_days);
        let date = window.target.from;
        info!("=== Hourly cash: {} ===", date);

        let (results, rounds) = self.fan_out(window, collect::payments_job).await?;

        let mut consolidated = HourlyCash::default();
        let mut sheets = Vec::with_capacity(results.len());
        let mut rows = Vec::new();
        let mut skipped = 0;
        for (property, snapshot) in results {
            consolidated.merge(&snapshot.hourly);
            sheets.push((property.name, snapshot.hourly));
            rows.extend(snapshot.rows);
            skipped += snapshot.skipped;
        }

        let bytes = workbook::hourly_cash(date, &sheets, &consolidated)?;
        info!("Cash total {:.2} across {} properties", consolidated.total(), sheets.len());

        Ok(ReportRun {
            name: format!("hourly_cash_{}", date),
            output: ReportOutput::Document(Document {
                filename: format!("Cash_Collection_{}.xlsx", date),
                caption: "📊 Yesterday Hourly Cash Report (All Properties)".into(),
                bytes,
            }),
            payment_rows: rows,
            stay_rows: Vec::new(),
            stats: RunStats { properties: sheets.len(), rounds, skipped_details: skipped },
        })
    }

    /// Yesterday's check-ins by hour and channel.
    pub async fn booking_modes(&self) -> Result<ReportRun> {
        let window = self.clock.yesterday_window(self.report.checkin_lookback_days);
        let date = window.target.from;
        info!("=== Booking modes: {} ===", date);

        let (results, rounds) = self.fan_out(window, collect::checkins_job).await?;

        let mut consolidated = HourlyChannels::default();
        let sheets: Vec<(String, HourlyChannels)> = results
            .into_iter()
            .map(|(property, counts)| {
                consolidated.merge(&counts);
                (property.name, counts)
            })
            .collect();

        let bytes = workbook::booking_modes(date, &sheets, &consolidated)?;

        Ok(ReportRun {
            name: format!("booking_modes_{}", date),
            output: ReportOutput::Document(Document {
                filename: format!("Booking_Mode_{}.xlsx", date.format("%d-%m-%Y")),
                caption: "📊 Date-wise Booking Mode Report".into(),
                bytes,
            }),
            payment_rows: Vec::new(),
            stay_rows: Vec::new(),
            stats: RunStats { properties: sheets.len(), rounds, skipped_details: 0 },
        })
    }

    /// Payment-mode totals for every date in the period, plus a property ranking.
    pub async fn date_wise(&self, period: Period) -> Result<ReportRun> {
        let lookback = self.report.payment_lookback_days;
        let window = match period {
            Period::MonthToDate => self.clock.month_to_date(lookback),
            Period::LastMonth => self.clock.last_month(lookback),
            Period::Range(target) => self.clock.explicit(target, lookback),
        };
        let target = window.target;
        info!("=== Date-wise collection: {} ===", target);

        let (results, rounds) = self.fan_out(window, collect::payments_job).await?;

        let mut consolidated = DailyCollection::for_window(&target);
        let mut sheets: Vec<(String, DailyCollection)> = Vec::with_capacity(results.len());
        let mut rows = Vec::new();
        let mut skipped = 0;
        for (property, snapshot) in results {
            consolidated.merge(&snapshot.daily);
            sheets.push((property.name, snapshot.daily));
            rows.extend(snapshot.rows);
            skipped += snapshot.skipped;
        }

        let bytes = workbook::date_wise(&sheets, &consolidated)?;

        Ok(ReportRun {
            name: format!("date_wise_{}_{}", target.from, target.till),
            output: ReportOutput::Document(Document {
                filename: format!("Collection_{}.xlsx", month_label(target.from)),
                caption: "📊 Date Wise Collection Report (Paid Only)".into(),
                bytes,
            }),
            payment_rows: rows,
            stay_rows: Vec::new(),
            stats: RunStats { properties: sheets.len(), rounds, skipped_details: skipped },
        })
    }

    // ── Messages ──────────────────────────────────────────────────────────────

    /// Today's collection per property, then all properties together.
    pub async fn collection(&self) -> Result<ReportRun> {
        let window = self.clock.today_window(self.report.collection_lookback_days);
        let date = window.target.from;
        info!("=== Collection: {} ===", date);

        let (results, rounds) = self.fan_out(window, collect::payments_job).await?;

        let mut total = CollectionSummary::default();
        let mut messages = Vec::with_capacity(results.len() + 1);
        let mut rows = Vec::new();
        let mut skipped = 0;
        for (property, snapshot) in &results {
            total.merge(&snapshot.summary);
            messages.push(OutMessage::critical(message::collection(
                &property.name,
                date,
                &snapshot.summary,
            )));
            skipped += snapshot.skipped;
        }
        messages.push(OutMessage::critical(message::collection("ALL PROPERTIES", date, &total)));
        for (_, snapshot) in results {
            rows.extend(snapshot.rows);
        }

        Ok(ReportRun {
            name: format!("collection_{}", date),
            output: ReportOutput::Messages(messages),
            payment_rows: rows,
            stay_rows: Vec::new(),
            stats: RunStats { properties: self.properties.len(), rounds, skipped_details: skipped },
        })
    }

    /// Business-date occupancy per property, any early/late alerts, then the consolidated view.
    pub async fn occupancy(&self) -> Result<ReportRun> {
        let window = self.clock.business_window(self.report.checkin_lookback_days);
        let date = window.target.from;
        info!("=== Occupancy: {} ===", date);

        let (results, rounds) = self.fan_out(window, collect::occupancy_job).await?;

        let now = self.clock.now();
        let mut total = OccupancySummary::default();
        let mut messages = Vec::new();
        for (property, summary) in &results {
            total.merge(summary);
            messages.push(OutMessage::critical(message::occupancy(&property.name, now, summary)));
            if let Some(alert) = message::exception_alert(&property.name, date, summary) {
                messages.push(OutMessage::optional(alert));
            }
        }
        messages.push(OutMessage::critical(message::occupancy("ALL", now, &total)));
        info!(
            "Occupancy {}% ({} of {} rooms)",
            total.occupancy_pct(),
            total.booked_rooms(),
            total.total_rooms
        );

        Ok(ReportRun {
            name: format!("occupancy_{}", date),
            output: ReportOutput::Messages(messages),
            payment_rows: Vec::new(),
            stay_rows: total.rows,
            stats: RunStats { properties: results.len(), rounds, skipped_details: 0 },
        })
    }

    /// Room availability and pricing for a stay of `nights` starting `checkin`.
    pub async fn availability(&self, checkin: Option<NaiveDate>, nights: u32) -> Result<ReportRun> {
        let checkin = checkin.unwrap_or_else(|| self.clock.today());
        let nights = nights.max(1);
        let checkout = checkin + Days::new(nights as u64);
        let stay = DateWindow::new(checkin, checkout - Days::new(1))
            .context("Invalid stay dates")?;
        info!("=== Availability: {} → {} ({} nights) ===", checkin, checkout, nights);

        let (results, rounds) = self
            .fan_out(self.clock.explicit(stay, 0), collect::availability_job)
            .await?;

        let mut messages = Vec::with_capacity(results.len() + 1);
        let mut consolidated: Vec<(String, RoomAvailability)> = Vec::with_capacity(results.len());
        for (property, a) in results {
            messages.push(OutMessage::critical(message::availability(
                &property.name,
                checkin,
                checkout,
                &a.rooms,
                &a.quote,
                a.details.as_ref(),
            )));
            consolidated.push((property.name, a.rooms));
        }
        messages.push(OutMessage::critical(message::availability_consolidated(
            &consolidated,
            checkin,
            checkout,
        )));

        Ok(ReportRun {
            name: format!("availability_{}", checkin),
            output: ReportOutput::Messages(messages),
            payment_rows: Vec::new(),
            stay_rows: Vec::new(),
            stats: RunStats { properties: consolidated.len(), rounds, skipped_details: 0 },
        })
    }
}

// ── Delivery ──────────────────────────────────────────────────────────────────

/// Send a finished report. Messages go out in order with `gap` between them.
pub async fn deliver(output: &ReportOutput, notifier: &dyn Notifier, gap: Duration) -> Result<()> {
    match output {
        ReportOutput::Document(doc) => {
            notifier
                .send_document(doc)
                .await
                .with_context(|| format!("Upload of {} failed", doc.filename))?;
        }
        ReportOutput::Messages(messages) => {
            for (i, msg) in messages.iter().enumerate() {
                if i > 0 && !gap.is_zero() {
                    tokio::time::sleep(gap).await;
                }
                match notifier.send_message(&msg.text).await {
                    Ok(()) => {}
                    Err(e) if !msg.critical => warn!("Alert not delivered: {}", e),
                    Err(e) => {
                        return Err(e).with_context(|| format!("Message {}/{} failed", i + 1, messages.len()));
                    }
                }
            }
            info!("📨 {} messages delivered", messages.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::fake::{FakeApi, booking, day, payment, property};
    use super::fanout::PipelineError;
    use super::*;
    use crate::api::RawBookingDetail;
    use crate::notify::NotifyError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn pipeline(api: FakeApi, today: NaiveDate, hour: u32, properties: Vec<PropertyConfig>) -> Pipeline {
        let mut config = AppConfig::default();
        config.pipeline.max_rounds = 2;
        config.pipeline.round_delay_secs = 0;
        config.pipeline.property_retry = crate::retry::RetryPolicy::none();
        let now = today
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_local_timezone(chrono::FixedOffset::east_opt(330 * 60).unwrap())
            .unwrap();
        Pipeline::new(&config, Arc::new(api), ReportClock::new(now, 12), properties)
    }

    fn paid_api() -> FakeApi {
        let mut api = FakeApi::default();
        api.bookings.insert(1, vec![booking("A", "Checked In", day(2024, 5, 1), day(2024, 5, 3))]);
        api.bookings.insert(2, vec![booking("B", "Checked Out", day(2024, 5, 1), day(2024, 5, 2))]);
        api.details.insert(
            "A".into(),
            RawBookingDetail {
                payments: vec![payment("Cash at Hotel", 400.0, "2024-05-01T04:00:00Z")],
                ..Default::default()
            },
        );
        api.details.insert(
            "B".into(),
            RawBookingDetail {
                payments: vec![
                    payment("Cash at Hotel", 100.0, "2024-05-01T09:00:00Z"),
                    payment("UPI QR", 60.0, "2024-05-01T09:30:00Z"),
                ],
                ..Default::default()
            },
        );
        api
    }

    #[derive(Default)]
    struct Recorder {
        messages: Mutex<Vec<String>>,
        documents: Mutex<Vec<String>>,
        fail_containing: Option<&'static str>,
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
            if self.fail_containing.is_some_and(|s| text.contains(s)) {
                return Err(NotifyError::Api { status: 400, description: "rejected".into() });
            }
            self.messages.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn send_document(&self, doc: &Document) -> Result<(), NotifyError> {
            self.documents.lock().unwrap().push(doc.filename.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_collection_sends_one_message_per_property_plus_total() {
        let p = pipeline(paid_api(), day(2024, 5, 1), 18, vec![property(1, "Alpha"), property(2, "Beta")]);
        let run = p.collection().await.unwrap();

        let ReportOutput::Messages(messages) = &run.output else {
            panic!("expected messages");
        };
        assert_eq!(messages.len(), 3);
        assert!(messages[0].text.contains("Alpha"));
        assert!(messages[1].text.contains("Beta"));
        assert!(messages[2].text.contains("ALL PROPERTIES"));
        assert!(messages[2].text.contains("₹560.00"));
        assert!(messages.iter().all(|m| m.critical));
        assert_eq!(run.payment_rows.len(), 2);
        assert_eq!(run.name, "collection_2024-05-01");
    }

    #[tokio::test]
    async fn test_hourly_cash_builds_one_document() {
        let p = pipeline(paid_api(), day(2024, 5, 2), 9, vec![property(1, "Alpha"), property(2, "Beta")]);
        let run = p.hourly_cash().await.unwrap();

        let ReportOutput::Document(doc) = &run.output else {
            panic!("expected a document");
        };
        assert_eq!(doc.filename, "Cash_Collection_2024-05-01.xlsx");
        assert!(doc.bytes.starts_with(b"PK"));
        assert_eq!(run.stats.properties, 2);
        assert_eq!(run.stats.rounds, 1);
        assert_eq!(run.payment_rows.len(), 2);
    }

    #[tokio::test]
    async fn test_date_wise_last_month_names_the_month() {
        let p = pipeline(paid_api(), day(2024, 6, 3), 15, vec![property(1, "Alpha")]);
        let run = p.date_wise(Period::LastMonth).await.unwrap();

        let ReportOutput::Document(doc) = &run.output else {
            panic!("expected a document");
        };
        assert_eq!(doc.filename, "Collection_May 2024.xlsx");
        assert_eq!(run.name, "date_wise_2024-05-01_2024-05-31");
    }

    #[tokio::test]
    async fn test_occupancy_incomplete_run_fails_as_a_whole() {
        let mut api = FakeApi::default();
        api.rooms.insert(1, 10);
        let p = pipeline(api, day(2024, 5, 11), 9, vec![property(1, "Alpha"), property(2, "Beta")]);

        let err = p.occupancy().await.unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Incomplete { missing }) => assert_eq!(missing, &["Beta"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_occupancy_alert_is_optional() {
        let mut api = FakeApi::default();
        api.rooms.insert(1, 10);
        api.bookings.insert(
            1,
            vec![booking("EARLY", "Checked In", day(2024, 5, 11), day(2024, 5, 12))],
        );
        let p = pipeline(api, day(2024, 5, 11), 9, vec![property(1, "Alpha")]);
        let run = p.occupancy().await.unwrap();

        let ReportOutput::Messages(messages) = &run.output else {
            panic!("expected messages");
        };
        assert_eq!(messages.len(), 3);
        assert!(messages[0].critical);
        assert!(!messages[1].critical);
        assert!(messages[1].text.contains("EARLY"));
        assert!(messages[2].text.contains("ALL"));
        assert_eq!(run.stay_rows.len(), 1);
    }

    #[tokio::test]
    async fn test_availability_defaults_to_tonight() {
        let p = pipeline(FakeApi::default(), day(2024, 5, 10), 10, vec![property(1, "Alpha")]);
        let run = p.availability(None, 1).await.unwrap();

        assert_eq!(run.name, "availability_2024-05-10");
        let ReportOutput::Messages(messages) = &run.output else {
            panic!("expected messages");
        };
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_deliver_skips_failed_optional_messages() {
        let notifier = Recorder { fail_containing: Some("alert"), ..Default::default() };
        let output = ReportOutput::Messages(vec![
            OutMessage::critical("first".into()),
            OutMessage::optional("alert".into()),
            OutMessage::critical("last".into()),
        ]);

        deliver(&output, &notifier, Duration::ZERO).await.unwrap();
        assert_eq!(*notifier.messages.lock().unwrap(), ["first", "last"]);
    }

    #[tokio::test]
    async fn test_deliver_stops_on_failed_critical_message() {
        let notifier = Recorder { fail_containing: Some("second"), ..Default::default() };
        let output = ReportOutput::Messages(vec![
            OutMessage::critical("first".into()),
            OutMessage::critical("second".into()),
            OutMessage::critical("third".into()),
        ]);

        assert!(deliver(&output, &notifier, Duration::ZERO).await.is_err());
        assert_eq!(*notifier.messages.lock().unwrap(), ["first"]);
    }

    #[tokio::test]
    async fn test_deliver_uploads_documents() {
        let notifier = Recorder::default();
        let output = ReportOutput::Document(Document {
            filename: "x.xlsx".into(),
            caption: String::new(),
            bytes: vec![0],
        });
        deliver(&output, &notifier, Duration::ZERO).await.unwrap();
        assert_eq!(*notifier.documents.lock().unwrap(), ["x.xlsx"]);
    }
}
