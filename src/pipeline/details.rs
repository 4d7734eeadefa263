//! Booking-detail fan-out inside one property job.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::api::HotelApi;
use crate::dates::ReportClock;
use crate::models::{BookingDetail, PropertyConfig};
use crate::pool::WorkerPool;

/// Fetches booking details with bounded concurrency and remembers them for
/// the rest of the job. Per-call retries happen in the client; a booking that
/// still fails is skipped.
pub struct DetailFetcher {
    api: Arc<dyn HotelApi>,
    property: PropertyConfig,
    pool: WorkerPool,
    clock: ReportClock,
    cache: HashMap<String, BookingDetail>,
    skipped: usize,
}

impl DetailFetcher {
    pub fn new(
        api: Arc<dyn HotelApi>,
        property: PropertyConfig,
        concurrency: usize,
        clock: ReportClock,
    ) -> Self {
        Self {
            api,
            property,
            pool: WorkerPool::new(concurrency),
            clock,
            cache: HashMap::new(),
            skipped: 0,
        }
    }

    /// Fetch every booking number not already cached.
    pub async fn fetch(&mut self, booking_nos: &[String]) {
        let mut missing: Vec<String> = booking_nos
            .iter()
            .filter(|no| !self.cache.contains_key(no.as_str()))
            .cloned()
            .collect();
        missing.sort();
        missing.dedup();
        if missing.is_empty() {
            return;
        }
        debug!("{}: fetching {} booking details", self.property.name, missing.len());

        let api = Arc::clone(&self.api);
        let property = self.property.clone();
        let outcomes = self
            .pool
            .map(missing.clone(), move |no: String| {
                let api = Arc::clone(&api);
                let property = property.clone();
                async move { api.booking_detail(&property, &no).await }
            })
            .await;

        for (no, outcome) in missing.into_iter().zip(outcomes) {
            match outcome {
                Ok(Ok(raw)) => {
                    self.cache.insert(no, raw.into_detail(&self.clock));
                }
                Ok(Err(e)) => {
                    warn!("{}: skipping booking {}: {}", self.property.name, no, e);
                    self.skipped += 1;
                }
                Err(e) => {
                    error!("Task panic for booking {}: {}", no, e);
                    self.skipped += 1;
                }
            }
        }
    }

    pub fn get(&self, booking_no: &str) -> Option<&BookingDetail> {
        self.cache.get(booking_no)
    }

    /// Bookings dropped after their retries ran out.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
