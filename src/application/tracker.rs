//! Calorie tracker: resolves bar codes through the cache and the product
//! database, keeps the running energy total and publishes it.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use tracing::{info, warn};

use crate::domain::barcode::BarCode;
use crate::domain::energy::{self, EnergyValue, Resolution};
use crate::domain::product::ProductRecord;

use super::error::AppError;
use super::ports::{BlobStore, LookupError, Partition, ProductLookup, PublishError, Publisher};

pub const METRIC_CACHE_HIT: &str = "caloriecounter_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "caloriecounter_cache_miss_total";
pub const METRIC_LOOKUP_FAILURE: &str = "caloriecounter_lookup_failure_total";
pub const METRIC_REJECT: &str = "caloriecounter_reject_total";
pub const METRIC_INVALID_BARCODE: &str = "caloriecounter_invalid_barcode_total";
pub const METRIC_LOOKUP_MS: &str = "caloriecounter_lookup_ms";
pub const METRIC_RUNNING_TOTAL: &str = "caloriecounter_running_total_kj";

const ENERGY_UNIT: &str = "kJ";

/// Sum of every resolved energy value since the tracker started.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningTotal(f64);

impl RunningTotal {
    pub fn add(&mut self, energy: EnergyValue) {
        self.0 += energy.kilojoules();
    }

    pub fn kilojoules(self) -> f64 {
        self.0
    }

    /// Outbound payload: whole kilojoules, ties rounded away from zero.
    pub fn to_payload(self) -> String {
        format!("{:.0} {ENERGY_UNIT}", self.0.round())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    Cache,
    Network,
}

/// A product record together with its classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductLookupResult {
    pub bar_code: BarCode,
    pub record: ProductRecord,
    pub source: RecordSource,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    InvalidBarCode,
    LookupFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    Discarded(DiscardReason),
    Published {
        contribution: EnergyValue,
        payload: String,
    },
}

pub struct CalorieTracker {
    store: Arc<dyn BlobStore>,
    lookup: Arc<dyn ProductLookup>,
    publisher: Arc<dyn Publisher>,
    destination: String,
    total: RunningTotal,
}

impl CalorieTracker {
    pub fn new(
        store: Arc<dyn BlobStore>,
        lookup: Arc<dyn ProductLookup>,
        publisher: Arc<dyn Publisher>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            store,
            lookup,
            publisher,
            destination: destination.into(),
            total: RunningTotal::default(),
        }
    }

    /// Prepare the blob store. The tracker must not accept messages when
    /// this fails.
    pub async fn start(&self) -> Result<(), AppError> {
        info!("Starting calorie tracker");
        self.store.ensure_partitions().await?;
        info!(destination = %self.destination, "Started calorie tracker");
        Ok(())
    }

    /// Release the tracker and report the final total.
    pub fn stop(self) -> RunningTotal {
        info!(
            total_kj = self.total.kilojoules(),
            "Stopping calorie tracker"
        );
        self.total
    }

    pub fn total(&self) -> RunningTotal {
        self.total
    }

    /// Process one inbound message.
    ///
    /// Invalid bar codes and failed lookups are logged and discarded. Only a
    /// closed publisher is returned as an error.
    pub async fn handle_message(
        &mut self,
        topic: &str,
        payload: &str,
    ) -> Result<MessageOutcome, AppError> {
        let bar_code = match BarCode::parse(payload) {
            Ok(bar_code) => bar_code,
            Err(err) => {
                counter!(METRIC_INVALID_BARCODE).increment(1);
                info!(topic, error = %err, "Skipping message");
                return Ok(MessageOutcome::Discarded(DiscardReason::InvalidBarCode));
            }
        };

        let resolved = match self.lookup(&bar_code).await {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(bar_code = %bar_code, error = %err, "Product lookup failed, skipping");
                return Ok(MessageOutcome::Discarded(DiscardReason::LookupFailed));
            }
        };

        let contribution = resolved.resolution.contribution();
        self.total.add(contribution);
        gauge!(METRIC_RUNNING_TOTAL).set(self.total.kilojoules());

        let payload = self.total.to_payload();
        info!(topic = %self.destination, payload = %payload, "Publishing total");
        match self.publisher.publish(&self.destination, &payload).await {
            Ok(()) => {}
            Err(PublishError::Closed) => return Err(PublishError::Closed.into()),
            Err(err) => warn!(error = %err, "Publishing total failed"),
        }

        Ok(MessageOutcome::Published {
            contribution,
            payload,
        })
    }

    /// Obtain and classify the product for `bar_code`.
    ///
    /// Unusable records are copied to the reject partition on a best-effort
    /// basis. The running total is not touched.
    pub async fn lookup(&self, bar_code: &BarCode) -> Result<ProductLookupResult, LookupError> {
        let (record, source) = self.product_record(bar_code).await?;

        if let Some(name) = record.product_name() {
            info!(bar_code = %bar_code, name, "Product name");
        }

        let resolution = energy::resolve(Some(&record));
        match &resolution {
            Resolution::Usable(energy) => {
                info!(bar_code = %bar_code, energy_kj = energy.kilojoules(), "Energy per serving");
            }
            Resolution::Unusable(reason) => {
                warn!(bar_code = %bar_code, %reason, "No energy determined");
                counter!(METRIC_REJECT).increment(1);
                self.quarantine(bar_code, &record).await;
            }
        }

        Ok(ProductLookupResult {
            bar_code: bar_code.clone(),
            record,
            source,
            resolution,
        })
    }

    async fn product_record(
        &self,
        bar_code: &BarCode,
    ) -> Result<(ProductRecord, RecordSource), LookupError> {
        match self.store.get(Partition::Cache, bar_code.as_str()).await {
            Ok(Some(record)) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                info!(bar_code = %bar_code, "Using cached product");
                return Ok((record, RecordSource::Cache));
            }
            Ok(None) => {}
            Err(err) => {
                warn!(bar_code = %bar_code, error = %err, "Cached product unreadable, fetching again");
            }
        }

        counter!(METRIC_CACHE_MISS).increment(1);
        info!(bar_code = %bar_code, "Retrieving product");
        let started = Instant::now();
        let fetched = self.lookup.fetch(bar_code).await;
        histogram!(METRIC_LOOKUP_MS).record(started.elapsed().as_secs_f64() * 1000.0);
        let record = fetched.inspect_err(|_| counter!(METRIC_LOOKUP_FAILURE).increment(1))?;

        match self
            .store
            .put(Partition::Cache, bar_code.as_str(), &record)
            .await
        {
            Ok(()) => info!(bar_code = %bar_code, "Cached product"),
            Err(err) => warn!(bar_code = %bar_code, error = %err, "Caching product failed"),
        }

        Ok((record, RecordSource::Network))
    }

    async fn quarantine(&self, bar_code: &BarCode, record: &ProductRecord) {
        match self
            .store
            .put(Partition::Reject, bar_code.as_str(), record)
            .await
        {
            Ok(()) => warn!(bar_code = %bar_code, "Saved unusable product"),
            Err(err) => warn!(bar_code = %bar_code, error = %err, "Saving unusable product failed"),
        }
    }
}
