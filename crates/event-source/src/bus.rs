//! `EventBus` trait plus a NATS JetStream-compatible implementation and an
//! in-memory test double, following the `EcosystemConsumer` adapter shape
//! the teacher uses for every upstream integration: a small trait, a real
//! client behind it, a config struct carrying connection details.

use crate::normalize::{normalize, RawMessage};
use async_trait::async_trait;
use trace_governance_common::error::{AppError, Result};
use trace_governance_models::event::Event;

#[derive(Debug, Clone)]
pub struct NatsCredentials {
    pub file_path: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub url: String,
    pub stream: String,
    pub subject_prefix: String,
    pub credentials: Option<NatsCredentials>,
}

/// A durable, subject-addressed event bus supporting time-range pull reads.
///
/// Implementations must never propagate a connect failure as a panic or a
/// hard error from `fetch_by_time_range`: per §4.1, an unreachable broker
/// makes the source report unavailable and the caller proceeds with an
/// empty event stream.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Pulls all events published in `[start_ms, end_ms]`, already
    /// normalized into the canonical `Event` shape. Order is whatever the
    /// broker returns it in; callers sort downstream.
    async fn fetch_by_time_range(&self, start_ms: i64, end_ms: i64) -> Result<Vec<Event>>;

    /// Non-blocking reachability probe.
    async fn is_available(&self) -> bool;

    /// Releases any held consumer/connection resources. Always called by
    /// the pipeline driver in a deferred teardown, including on error paths.
    async fn close(&self) -> Result<()>;
}

/// Durable ephemeral/pull consumer over `<prefix>.*.*`, one connection per
/// process. Connect failures and stream errors are logged and surfaced as
/// `AppError::EventBusUnavailable`, which callers degrade on rather than
/// propagate (except mid-stream errors after `close()`, per §4.1
/// "Failure semantics").
pub struct NatsEventBus {
    config: BusConfig,
    client: tokio::sync::RwLock<Option<async_nats::Client>>,
}

impl NatsEventBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            client: tokio::sync::RwLock::new(None),
        }
    }

    async fn ensure_connected(&self) -> Result<async_nats::Client> {
        {
            let guard = self.client.read().await;
            if let Some(client) = guard.as_ref() {
                return Ok(client.clone());
            }
        }

        let mut connect = async_nats::ConnectOptions::new();
        if let Some(creds) = &self.config.credentials {
            if let Some(path) = &creds.file_path {
                connect = connect
                    .credentials_file(path)
                    .await
                    .map_err(|e| AppError::EventBusUnavailable(e.to_string()))?;
            } else if let (Some(user), Some(password)) = (&creds.user, &creds.password) {
                connect = connect.user_and_password(user.clone(), password.clone());
            }
        }

        let client = connect
            .connect(&self.config.url)
            .await
            .map_err(|e| AppError::EventBusUnavailable(e.to_string()))?;

        *self.client.write().await = Some(client.clone());
        Ok(client)
    }

    fn subject_glob(&self) -> String {
        format!("{}.*.*", self.config.subject_prefix)
    }
}

#[async_trait]
impl EventBus for NatsEventBus {
    async fn fetch_by_time_range(&self, start_ms: i64, end_ms: i64) -> Result<Vec<Event>> {
        let client = match self.ensure_connected().await {
            Ok(c) => c,
            Err(err) => {
                tracing::warn!(error = %err, "event bus unreachable, yielding empty window");
                return Ok(Vec::new());
            }
        };

        let jetstream = async_nats::jetstream::new(client);
        let stream = jetstream
            .get_stream(&self.config.stream)
            .await
            .map_err(|e| AppError::EventBusUnavailable(e.to_string()));

        let stream = match stream {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(error = %err, "jetstream stream unavailable, yielding empty window");
                return Ok(Vec::new());
            }
        };

        let consumer_name = format!("trace-analyzer-{}", self.config.stream);
        let consumer = stream
            .get_or_create_consumer(
                &consumer_name,
                async_nats::jetstream::consumer::pull::Config {
                    durable_name: Some(consumer_name.clone()),
                    filter_subject: self.subject_glob(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| AppError::EventBusUnavailable(e.to_string()));

        let consumer = match consumer {
            Ok(c) => c,
            Err(err) => {
                tracing::warn!(error = %err, "could not establish durable consumer, yielding empty window");
                return Ok(Vec::new());
            }
        };

        let mut messages = consumer
            .fetch()
            .max_messages(10_000)
            .messages()
            .await
            .map_err(|e| AppError::EventBusUnavailable(e.to_string()))?;

        let mut out = Vec::new();
        let mut seq: u64 = 0;
        use futures::StreamExt;
        while let Some(msg) = messages.next().await {
            let msg = msg.map_err(|e| AppError::EventStreamInterrupted {
                events_seen: seq,
                source: e.to_string(),
            })?;
            seq += 1;
            if let Some(event) = normalize(RawMessage {
                seq,
                data: msg.payload.to_vec(),
            }) {
                if event.ts >= start_ms && event.ts <= end_ms {
                    out.push(event);
                }
            }
            let _ = msg.ack().await;
        }

        Ok(out)
    }

    async fn is_available(&self) -> bool {
        self.ensure_connected().await.is_ok()
    }

    async fn close(&self) -> Result<()> {
        if let Some(client) = self.client.write().await.take() {
            let _ = client.drain().await;
        }
        Ok(())
    }
}

/// In-process test double: a flat `Vec<Event>` queried by time range,
/// used in pipeline and CLI tests so they don't need a live broker.
#[derive(Default)]
pub struct MemoryEventBus {
    events: Vec<Event>,
    available: bool,
}

impl MemoryEventBus {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            events: Vec::new(),
            available: false,
        }
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn fetch_by_time_range(&self, start_ms: i64, end_ms: i64) -> Result<Vec<Event>> {
        if !self.available {
            return Ok(Vec::new());
        }
        Ok(self
            .events
            .iter()
            .filter(|e| e.ts >= start_ms && e.ts <= end_ms)
            .cloned()
            .collect())
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
