//! Message pipeline: a single consumer task that feeds inbound messages to
//! the tracker strictly one at a time.
//!
//! Any fault escaping the tracker (an error or a panic) stops the loop, the
//! tracker is released and the fault is returned to the caller, which is
//! expected to shut the remaining components down.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::error::AppError;
use super::tracker::{CalorieTracker, RunningTotal};

pub const INBOX_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

pub type InboxSender = mpsc::Sender<InboundMessage>;
pub type InboxReceiver = mpsc::Receiver<InboundMessage>;

/// Create the bounded queue every message source writes into.
pub fn inbox() -> (InboxSender, InboxReceiver) {
    mpsc::channel(INBOX_CAPACITY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineExit {
    /// Every sender went away and the queue was drained.
    Drained,
    /// The shutdown future resolved.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineReport {
    pub exit: PipelineExit,
    pub processed: usize,
    pub total: RunningTotal,
}

/// Drive `tracker` until the inbox closes, `shutdown` resolves or handling a
/// message faults.
pub async fn run<F>(
    mut tracker: CalorieTracker,
    mut inbox: InboxReceiver,
    shutdown: F,
) -> Result<PipelineReport, AppError>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    info!("Message pipeline started");

    let mut processed = 0usize;
    let outcome = loop {
        let next = tokio::select! {
            biased;
            () = &mut shutdown => break Ok(PipelineExit::Shutdown),
            next = inbox.recv() => next,
        };
        let Some(message) = next else {
            break Ok(PipelineExit::Drained);
        };

        let handled = AssertUnwindSafe(tracker.handle_message(&message.topic, &message.payload))
            .catch_unwind()
            .await;
        match handled {
            Ok(Ok(_)) => processed += 1,
            Ok(Err(err)) => {
                error!(error = %err, "Caught unhandled error, pipeline will be stopped");
                break Err(err);
            }
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                error!(reason = %reason, "Caught panic while handling message, pipeline will be stopped");
                break Err(AppError::fault(reason));
            }
        }
    };

    inbox.close();
    let total = tracker.stop();
    info!(processed, "Message pipeline stopped");

    outcome.map(|exit| PipelineReport {
        exit,
        processed,
        total,
    })
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::application::ports::{
        BlobStore, LookupError, Partition, ProductLookup, PublishError, Publisher, StorageError,
    };
    use crate::domain::barcode::BarCode;
    use crate::domain::product::ProductRecord;

    struct NullStore;

    #[async_trait]
    impl BlobStore for NullStore {
        async fn ensure_partitions(&self) -> Result<(), StorageError> {
            Ok(())
        }

        async fn get(
            &self,
            _partition: Partition,
            _key: &str,
        ) -> Result<Option<ProductRecord>, StorageError> {
            Ok(None)
        }

        async fn put(
            &self,
            _partition: Partition,
            _key: &str,
            _record: &ProductRecord,
        ) -> Result<(), StorageError> {
            Ok(())
        }
    }

    struct FixedLookup;

    #[async_trait]
    impl ProductLookup for FixedLookup {
        async fn fetch(&self, bar_code: &BarCode) -> Result<ProductRecord, LookupError> {
            if bar_code.as_str() == "99999999" {
                panic!("lookup exploded");
            }
            Ok(ProductRecord::new(json!({
                "status": 1,
                "product": { "nutriments": { "energy_serving": "10" } }
            })))
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    #[async_trait]
    impl Publisher for Collect {
        async fn publish(&self, _topic: &str, payload: &str) -> Result<(), PublishError> {
            self.0.lock().expect("lock").push(payload.to_string());
            Ok(())
        }
    }

    fn tracker(publisher: Arc<Collect>) -> CalorieTracker {
        CalorieTracker::new(Arc::new(NullStore), Arc::new(FixedLookup), publisher, "out")
    }

    #[tokio::test]
    async fn drains_queue_in_order_when_senders_close() {
        let publisher = Arc::new(Collect::default());
        let (tx, rx) = inbox();
        for payload in ["11111111", "nope", "22222222", "33333333"] {
            tx.send(InboundMessage::new("in", payload))
                .await
                .expect("queue open");
        }
        drop(tx);

        let report = run(tracker(publisher.clone()), rx, std::future::pending())
            .await
            .expect("pipeline ran");

        assert_eq!(report.exit, PipelineExit::Drained);
        assert_eq!(report.processed, 4);
        assert_eq!(report.total.to_payload(), "30 kJ");
        assert_eq!(
            *publisher.0.lock().expect("lock"),
            vec!["10 kJ", "20 kJ", "30 kJ"]
        );
    }

    #[tokio::test]
    async fn stops_on_shutdown_signal() {
        let publisher = Arc::new(Collect::default());
        let (_tx, rx) = inbox();

        let report = run(tracker(publisher), rx, async {})
            .await
            .expect("pipeline ran");

        assert_eq!(report.exit, PipelineExit::Shutdown);
        assert_eq!(report.processed, 0);
    }

    #[tokio::test]
    async fn panic_in_handler_becomes_fault() {
        let publisher = Arc::new(Collect::default());
        let (tx, rx) = inbox();
        for payload in ["11111111", "99999999", "22222222"] {
            tx.send(InboundMessage::new("in", payload))
                .await
                .expect("queue open");
        }

        let err = run(tracker(publisher.clone()), rx, std::future::pending())
            .await
            .expect_err("fault");

        assert!(matches!(err, AppError::Fault(ref reason) if reason == "lookup exploded"));
        assert_eq!(*publisher.0.lock().expect("lock"), vec!["10 kJ"]);
        assert!(tx.is_closed());
    }
}
