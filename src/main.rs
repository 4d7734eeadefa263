mod aggregate;
mod api;
mod classify;
mod config;
mod dates;
mod export;
mod models;
mod notify;
mod pipeline;
mod pool;
mod report;
mod retry;
mod utils;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::api::{HotelApi, OyoClient};
use crate::config::AppConfig;
use crate::dates::{DateWindow, ReportClock};
use crate::notify::{FileSink, Notifier, TelegramNotifier};
use crate::pipeline::{Period, Pipeline, ReportOutput, ReportRun, deliver};

#[derive(Parser)]
#[command(name = "hotel-reports", about = "Hotel property reports for Telegram", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Chat map key to deliver to (defaults to `telegram.default_chat`)
    #[arg(long, global = true)]
    chat: Option<String>,

    /// Write the report into this directory instead of sending it
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Also export the flattened rows as CSV into this directory
    #[arg(long, global = true)]
    csv_dir: Option<PathBuf>,

    /// Run as if today were this date (YYYY-MM-DD)
    #[arg(long, global = true)]
    date: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Command {
    /// Yesterday's cash collection by hour (workbook)
    HourlyCash,

    /// Yesterday's check-ins by hour and booking channel (workbook)
    BookingModes,

    /// Collection by date and payment mode with a property ranking (workbook)
    DateWise {
        #[arg(long, value_enum, default_value = "mtd")]
        period: PeriodArg,

        /// First date of an explicit range; overrides --period
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,

        /// Last date of an explicit range
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
    },

    /// Today's collection per property (messages)
    Collection,

    /// Business-date occupancy, ARR and early/late alerts (messages)
    Occupancy,

    /// Room availability and pricing from today or --date (messages)
    Availability {
        #[arg(long, default_value_t = 1)]
        nights: u32,
    },

    /// List configured properties
    Properties,
}

#[derive(Clone, Copy, ValueEnum)]
enum PeriodArg {
    Mtd,
    LastMonth,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "hotel_reports=info,warn",
        1 => "hotel_reports=debug,info",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(env_filter)
        .init();

    let config = AppConfig::load()?;

    let clock = match cli.date {
        Some(day) => ReportClock::pinned(day, config.report.utc_offset_minutes, config.report.cutover_hour)?,
        None => ReportClock::now_in(config.report.utc_offset_minutes, config.report.cutover_hour)?,
    };
    let api: Arc<dyn HotelApi> =
        Arc::new(OyoClient::new(&config.api).context("Failed to build API client")?);
    let pipeline = Pipeline::new(&config, api, clock, config.property_list()?);

    let run = match cli.command {
        Command::HourlyCash => {
            let _t = utils::Timer::start("Hourly cash report");
            pipeline.hourly_cash().await?
        }
        Command::BookingModes => {
            let _t = utils::Timer::start("Booking mode report");
            pipeline.booking_modes().await?
        }
        Command::DateWise { period, from, to } => {
            let _t = utils::Timer::start("Date-wise collection report");
            let period = match (from, to) {
                (Some(from), Some(to)) => Period::Range(DateWindow::new(from, to)?),
                _ => match period {
                    PeriodArg::Mtd => Period::MonthToDate,
                    PeriodArg::LastMonth => Period::LastMonth,
                },
            };
            pipeline.date_wise(period).await?
        }
        Command::Collection => {
            let _t = utils::Timer::start("Collection report");
            pipeline.collection().await?
        }
        Command::Occupancy => {
            let _t = utils::Timer::start("Occupancy report");
            pipeline.occupancy().await?
        }
        Command::Availability { nights } => {
            let _t = utils::Timer::start("Availability report");
            pipeline.availability(cli.date, nights).await?
        }
        Command::Properties => {
            let properties = config.property_list()?;
            println!("{} properties:", properties.len());
            for p in &properties {
                println!("  {:>3}  {:<24} QID {}", p.key, p.name, p.qid);
            }
            return Ok(());
        }
    };

    if let Some(dir) = &cli.csv_dir {
        export_rows(dir, &run)?;
    }

    let notifier: Box<dyn Notifier> = match &cli.output {
        Some(dir) => Box::new(FileSink::create(dir).await?),
        None => {
            let token = config
                .telegram
                .bot_token
                .as_deref()
                .context("TELEGRAM_BOT_TOKEN is not set")?;
            let chat_id = config.chat_id(cli.chat.as_deref())?;
            Box::new(TelegramNotifier::new(&config.telegram, token, chat_id)?)
        }
    };
    let gap = Duration::from_millis(config.telegram.message_gap_ms);
    deliver(&run.output, notifier.as_ref(), gap).await?;

    let delivered = match &run.output {
        ReportOutput::Document(doc) => doc.filename.clone(),
        ReportOutput::Messages(m) => format!("{} messages", m.len()),
    };
    info!("=== Done: {} ===", run.name);
    println!(
        "{}: {} | {} properties | {} round(s) | {} skipped bookings",
        run.name, delivered, run.stats.properties, run.stats.rounds, run.stats.skipped_details
    );

    Ok(())
}

fn export_rows(dir: &std::path::Path, run: &ReportRun) -> Result<()> {
    if !run.payment_rows.is_empty() {
        export::export_to_dir(dir, &run.name, &run.payment_rows)?;
    }
    if !run.stay_rows.is_empty() {
        export::export_to_dir(dir, &run.name, &run.stay_rows)?;
    }
    Ok(())
}
