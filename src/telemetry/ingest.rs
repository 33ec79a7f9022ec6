//! Message ingestion
//!
//! Turns one broker message into a store update and a hub broadcast.
//! Kept separate from the MQTT event loop so the whole pipeline can be
//! driven without a broker.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::parser::{parse_payload, IngestError, TopicMap};
use super::sink::{ReadingRecord, ReadingSink};
use crate::readings::{Reading, ReadingStore, ReadingValue, Snapshot};
use crate::websocket::BroadcastHub;

/// Records buffered for the sink before new ones are dropped
pub const DEFAULT_SINK_QUEUE: usize = 256;

/// Applies inbound messages to the store and fans them out
#[derive(Clone)]
pub struct Ingestor {
    topics: TopicMap,
    store: Arc<ReadingStore>,
    hub: Arc<BroadcastHub>,
    sink: Option<SinkQueue>,
}

/// Sending side of the sink worker
#[derive(Clone)]
struct SinkQueue {
    name: String,
    tx: mpsc::Sender<ReadingRecord>,
}

impl Ingestor {
    pub fn new(topics: TopicMap, store: Arc<ReadingStore>, hub: Arc<BroadcastHub>) -> Self {
        Self {
            topics,
            store,
            hub,
            sink: None,
        }
    }

    /// Attach a persistence hook with the default queue size
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_sink(self, sink: Arc<dyn ReadingSink>) -> Self {
        self.with_sink_queue(sink, DEFAULT_SINK_QUEUE)
    }

    /// Attach a persistence hook fed through a bounded queue
    ///
    /// A single worker task hands records to the sink in acceptance order.
    /// When the queue is full, new records are dropped and logged.
    pub fn with_sink_queue(mut self, sink: Arc<dyn ReadingSink>, capacity: usize) -> Self {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(sink = %sink.name(), "No runtime, reading sink disabled");
            return self;
        };

        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.sink = Some(SinkQueue {
            name: sink.name().to_string(),
            tx,
        });
        runtime.spawn(run_sink(sink, rx));
        self
    }

    pub fn topics(&self) -> &TopicMap {
        &self.topics
    }

    /// Handle one message from the broker
    ///
    /// On success the store has been updated and every subscriber has been
    /// offered the returned snapshot. On error nothing has changed.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> Result<Snapshot, IngestError> {
        let quantity = self
            .topics
            .resolve(topic)
            .ok_or_else(|| IngestError::UnknownTopic(topic.to_string()))?;
        let value = parse_payload(payload)?;

        let now = Utc::now();
        let snapshot = self.store.update(quantity, value, now);
        let delivered = self.hub.broadcast(&snapshot);

        tracing::debug!(
            topic = %topic,
            quantity = %quantity,
            value = %snapshot.value(quantity),
            delivered,
            "Reading accepted"
        );

        self.persist(ReadingRecord {
            reading: Reading::new(quantity, ReadingValue::Value(value)),
            recorded_at: now,
            domain: snapshot.domain.clone(),
        });

        Ok(snapshot)
    }

    /// Queue the record for the sink worker without waiting
    fn persist(&self, record: ReadingRecord) {
        let Some(queue) = &self.sink else {
            return;
        };

        match queue.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                tracing::warn!(
                    sink = %queue.name,
                    quantity = %record.reading.quantity,
                    "Reading sink queue full, dropping record"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(sink = %queue.name, "Reading sink worker stopped");
            }
        }
    }
}

/// Drain the queue into the sink until every sender is gone
async fn run_sink(sink: Arc<dyn ReadingSink>, mut rx: mpsc::Receiver<ReadingRecord>) {
    while let Some(record) = rx.recv().await {
        if let Err(e) = sink.record(&record).await {
            tracing::warn!(
                sink = %sink.name(),
                quantity = %record.reading.quantity,
                error = %e,
                "Reading sink failed"
            );
        }
    }
    tracing::debug!(sink = %sink.name(), "Reading sink worker finished");
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("topics", &self.topics)
            .field("sink", &self.sink.as_ref().map(|q| q.name.as_str()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readings::Quantity;
    use crate::telemetry::sink::SinkError;
    use crate::websocket::HubConfig;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn setup() -> (Ingestor, Arc<ReadingStore>, Arc<BroadcastHub>) {
        let store = Arc::new(ReadingStore::new("plant-7"));
        let hub = Arc::new(BroadcastHub::new(Arc::clone(&store), HubConfig::default()));
        let ingestor = Ingestor::new(TopicMap::default(), Arc::clone(&store), Arc::clone(&hub));
        (ingestor, store, hub)
    }

    struct FailingSink;

    #[async_trait]
    impl ReadingSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn record(&self, _record: &ReadingRecord) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("database down".to_string()))
        }
    }

    struct HangingSink;

    #[async_trait]
    impl ReadingSink for HangingSink {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn record(&self, _record: &ReadingRecord) -> Result<(), SinkError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    struct ChannelSink(mpsc::UnboundedSender<ReadingRecord>);

    #[async_trait]
    impl ReadingSink for ChannelSink {
        fn name(&self) -> &str {
            "channel"
        }

        async fn record(&self, record: &ReadingRecord) -> Result<(), SinkError> {
            self.0
                .send(record.clone())
                .map_err(|e| SinkError::Rejected(e.to_string()))
        }
    }

    #[tokio::test]
    async fn test_temperature_message_updates_snapshot() {
        let (ingestor, store, _hub) = setup();

        ingestor
            .handle_message("sensor/temperature", b"23.40")
            .unwrap();

        let snapshot = store.get();
        assert_eq!(snapshot.temperature.to_string(), "23.40");
        assert_eq!(snapshot.humidity, ReadingValue::Unavailable);
        assert!(snapshot.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_a_no_op() {
        let (ingestor, store, _hub) = setup();
        ingestor.handle_message("sensor/humidity", b"41.2").unwrap();
        let before = store.get();

        let result = ingestor.handle_message("sensor/humidity", b"abc");

        assert!(matches!(result, Err(IngestError::InvalidPayload(_))));
        assert_eq!(store.get(), before);
    }

    #[tokio::test]
    async fn test_unknown_topic_is_dropped() {
        let (ingestor, store, _hub) = setup();
        let result = ingestor.handle_message("sensor/pressure", b"1013");

        assert_eq!(
            result,
            Err(IngestError::UnknownTopic("sensor/pressure".to_string()))
        );
        assert!(store.get().last_updated.is_none());
    }

    #[tokio::test]
    async fn test_subscriber_sees_initial_then_update() {
        let (ingestor, _store, hub) = setup();
        let (tx, mut rx) = hub.channel();
        hub.register(tx).unwrap();

        ingestor.handle_message("sensor/humidity", b"65.00").unwrap();

        let initial = rx.try_recv().unwrap();
        assert_eq!(initial.snapshot().unwrap().humidity, ReadingValue::Unavailable);
        let update = rx.try_recv().unwrap();
        assert_eq!(update.snapshot().unwrap().humidity.to_string(), "65.00");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_not_broadcast() {
        let (ingestor, _store, hub) = setup();
        let (tx, mut rx) = hub.channel();
        hub.register(tx).unwrap();
        let _ = rx.try_recv();

        let _ = ingestor.handle_message("sensor/temperature", b"warm");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_ingestion() {
        let (ingestor, store, _hub) = setup();
        let ingestor = ingestor.with_sink(Arc::new(FailingSink));

        ingestor.handle_message("sensor/temperature", b"18").unwrap();
        tokio::task::yield_now().await;

        assert_eq!(store.get().value(Quantity::Temperature).to_string(), "18.00");
    }

    #[tokio::test]
    async fn test_hanging_sink_does_not_block_ingestion() {
        let (ingestor, store, _hub) = setup();
        let ingestor = ingestor.with_sink(Arc::new(HangingSink));

        let result = tokio::time::timeout(Duration::from_secs(1), async {
            ingestor.handle_message("sensor/temperature", b"18").unwrap();
            ingestor.handle_message("sensor/humidity", b"30").unwrap();
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(store.get().humidity.to_string(), "30.00");
    }

    struct SlowSink {
        tx: mpsc::UnboundedSender<ReadingRecord>,
        delay: Duration,
    }

    #[async_trait]
    impl ReadingSink for SlowSink {
        fn name(&self) -> &str {
            "slow"
        }

        async fn record(&self, record: &ReadingRecord) -> Result<(), SinkError> {
            tokio::time::sleep(self.delay).await;
            self.tx
                .send(record.clone())
                .map_err(|e| SinkError::Rejected(e.to_string()))
        }
    }

    #[tokio::test]
    async fn test_sink_sees_records_in_acceptance_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (ingestor, _store, _hub) = setup();
        let ingestor = ingestor.with_sink(Arc::new(SlowSink {
            tx,
            delay: Duration::from_millis(2),
        }));

        for value in ["10", "11", "12", "13", "14"] {
            ingestor
                .handle_message("sensor/temperature", value.as_bytes())
                .unwrap();
        }

        for expected in [10.0, 11.0, 12.0, 13.0, 14.0] {
            let record = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(record.reading.value, ReadingValue::Value(expected));
        }
    }

    #[tokio::test]
    async fn test_full_sink_queue_drops_new_records() {
        let (ingestor, store, _hub) = setup();
        let ingestor = ingestor.with_sink_queue(Arc::new(HangingSink), 2);

        // One record is held by the worker, two wait in the queue, the rest are dropped
        for i in 0..50 {
            ingestor
                .handle_message("sensor/humidity", i.to_string().as_bytes())
                .unwrap();
            tokio::task::yield_now().await;
        }

        assert_eq!(store.get().humidity.to_string(), "49.00");
        let queue = ingestor.sink.as_ref().unwrap();
        assert_eq!(queue.tx.capacity(), 0);
    }

    #[tokio::test]
    async fn test_sink_receives_accepted_readings() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (ingestor, _store, _hub) = setup();
        let ingestor = ingestor.with_sink(Arc::new(ChannelSink(tx)));

        ingestor.handle_message("sensor/humidity", b"52.25").unwrap();
        let _ = ingestor.handle_message("sensor/humidity", b"bad");

        let record = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.reading.quantity, Quantity::Humidity);
        assert_eq!(record.reading.value, ReadingValue::Value(52.25));
        assert_eq!(record.domain, "plant-7");
    }
}
