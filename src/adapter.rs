// Protocol adapter layer: the capability interface every channel type
// implements, the uniform outcome shape, and the factory registry that
// selects an implementation by type code. Channel-specific behaviour lives
// behind `ProtocolAdapter`; nothing in the engine switches on type-code
// strings.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{AdapterKind, ChannelCatalog, SyncConfig};
use crate::model::{BookingStatus, Channel, ChannelBooking, DateRange, InventoryRecord};
use crate::ota_xml::OtaXmlAdapter;

// Uniform result of one adapter call. Expected failure modes — auth
// rejection, timeouts, remote validation errors — are `success = false`
// outcomes, never errors.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
    pub records_processed: u32,
    pub records_successful: u32,
    pub records_failed: u32,
    pub request_payload: Option<String>,
    pub response_payload: Option<String>,
}

impl SyncOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            records_processed: 0,
            records_successful: 0,
            records_failed: 0,
            request_payload: None,
            response_payload: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(message)
        }
    }
}

// Result of a reservation pull: the exchange outcome plus the parsed
// bookings (empty on failure).
#[derive(Debug, Clone)]
pub struct PullOutcome {
    pub outcome: SyncOutcome,
    pub bookings: Vec<ChannelBooking>,
}

// Configuration and programmer errors. These are the only hard failures an
// adapter may raise; the service boundary maps them to 4xx responses.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("missing credential field `{0}`")]
    MissingCredential(&'static str),

    #[error("channel has no external property identifier")]
    MissingPropertyId,

    #[error("failed to build HTTP client: {0}")]
    Init(String),
}

#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    // Lightweight reachability probe. Total: configuration problems are
    // reported as failed outcomes naming the offending field, never raised.
    async fn test_connection(&self, channel: &Channel) -> SyncOutcome;

    async fn push_inventory(
        &self,
        channel: &Channel,
        records: &[InventoryRecord],
    ) -> Result<SyncOutcome, AdapterError>;

    async fn pull_reservations(
        &self,
        channel: &Channel,
        range: DateRange,
    ) -> Result<PullOutcome, AdapterError>;

    async fn update_reservation_status(
        &self,
        channel: &Channel,
        reservation_id: &str,
        status: BookingStatus,
    ) -> Result<SyncOutcome, AdapterError>;
}

// Placeholder for channel types without a wire implementation yet. Keeps
// the interface uniform: pushes and pulls report a failed outcome rather
// than pretending to deliver.
pub struct StubAdapter {
    code: String,
}

impl StubAdapter {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

#[async_trait]
impl ProtocolAdapter for StubAdapter {
    async fn test_connection(&self, _channel: &Channel) -> SyncOutcome {
        SyncOutcome::ok(format!(
            "no connection probe implemented for channel type {}; skipped",
            self.code
        ))
    }

    async fn push_inventory(
        &self,
        _channel: &Channel,
        records: &[InventoryRecord],
    ) -> Result<SyncOutcome, AdapterError> {
        let mut outcome = SyncOutcome::fail(format!(
            "inventory push not implemented for channel type {}",
            self.code
        ));
        outcome.records_processed = records.len() as u32;
        outcome.records_failed = records.len() as u32;
        Ok(outcome)
    }

    async fn pull_reservations(
        &self,
        _channel: &Channel,
        _range: DateRange,
    ) -> Result<PullOutcome, AdapterError> {
        Ok(PullOutcome {
            outcome: SyncOutcome::fail(format!(
                "reservation pull not implemented for channel type {}",
                self.code
            )),
            bookings: Vec::new(),
        })
    }

    async fn update_reservation_status(
        &self,
        _channel: &Channel,
        _reservation_id: &str,
        _status: BookingStatus,
    ) -> Result<SyncOutcome, AdapterError> {
        Ok(SyncOutcome::fail(format!(
            "reservation status update not implemented for channel type {}",
            self.code
        )))
    }
}

// Factory keyed by channel type code, built once from the catalog and
// injected wherever adapters are needed.
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ProtocolAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, code: impl Into<String>, adapter: Arc<dyn ProtocolAdapter>) {
        self.adapters.insert(code.into(), adapter);
    }

    pub fn from_catalog(catalog: &ChannelCatalog, config: &SyncConfig) -> Result<Self, AdapterError> {
        let mut registry = Self::new();
        for entry in catalog.entries() {
            let adapter: Arc<dyn ProtocolAdapter> = match entry.adapter_kind {
                AdapterKind::OtaXml => Arc::new(OtaXmlAdapter::new(config)?),
                AdapterKind::Stub => Arc::new(StubAdapter::new(entry.code.clone())),
            };
            registry.register(entry.code.clone(), adapter);
        }
        Ok(registry)
    }

    // Codes outside the catalog resolve to a stub so callers always get a
    // working adapter object.
    pub fn resolve(&self, code: &str) -> Arc<dyn ProtocolAdapter> {
        self.adapters
            .get(code)
            .cloned()
            .unwrap_or_else(|| Arc::new(StubAdapter::new(code)))
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Configurable in-crate test double, used by dispatcher and service tests.
#[cfg(test)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        Succeed,
        RemoteFailure(String),
        ConfigError,
        Partial { successful: u32, failed: u32 },
    }

    #[derive(Debug, Clone)]
    pub struct PushCall {
        pub channel_id: u64,
        pub record_count: usize,
    }

    pub struct MockAdapter {
        behaviors: Mutex<HashMap<u64, MockBehavior>>,
        pushes: Mutex<Vec<PushCall>>,
        probes: Mutex<Vec<u64>>,
        pull_bookings: Mutex<Vec<ChannelBooking>>,
    }

    impl MockAdapter {
        pub fn new() -> Self {
            Self {
                behaviors: Mutex::new(HashMap::new()),
                pushes: Mutex::new(Vec::new()),
                probes: Mutex::new(Vec::new()),
                pull_bookings: Mutex::new(Vec::new()),
            }
        }

        pub fn set_behavior(&self, channel_id: u64, behavior: MockBehavior) {
            self.behaviors.lock().insert(channel_id, behavior);
        }

        pub fn set_pull_bookings(&self, bookings: Vec<ChannelBooking>) {
            *self.pull_bookings.lock() = bookings;
        }

        pub fn pushes(&self) -> Vec<PushCall> {
            self.pushes.lock().clone()
        }

        pub fn probe_count(&self) -> usize {
            self.probes.lock().len()
        }

        fn behavior_for(&self, channel_id: u64) -> MockBehavior {
            self.behaviors
                .lock()
                .get(&channel_id)
                .cloned()
                .unwrap_or(MockBehavior::Succeed)
        }
    }

    #[async_trait]
    impl ProtocolAdapter for MockAdapter {
        async fn test_connection(&self, channel: &Channel) -> SyncOutcome {
            self.probes.lock().push(channel.id);
            match self.behavior_for(channel.id) {
                MockBehavior::RemoteFailure(message) => SyncOutcome::fail(message),
                MockBehavior::ConfigError => {
                    SyncOutcome::fail("missing credential field `username`")
                }
                _ => SyncOutcome::ok("connection ok"),
            }
        }

        async fn push_inventory(
            &self,
            channel: &Channel,
            records: &[InventoryRecord],
        ) -> Result<SyncOutcome, AdapterError> {
            self.pushes.lock().push(PushCall {
                channel_id: channel.id,
                record_count: records.len(),
            });
            let count = records.len() as u32;
            match self.behavior_for(channel.id) {
                MockBehavior::Succeed => {
                    let mut outcome = SyncOutcome::ok("pushed");
                    outcome.records_processed = count;
                    outcome.records_successful = count;
                    Ok(outcome)
                }
                MockBehavior::RemoteFailure(message) => {
                    let mut outcome = SyncOutcome::fail(message);
                    outcome.records_processed = count;
                    outcome.records_failed = count;
                    Ok(outcome)
                }
                MockBehavior::ConfigError => Err(AdapterError::MissingCredential("username")),
                MockBehavior::Partial { successful, failed } => {
                    let mut outcome = SyncOutcome::fail("some date batches were rejected");
                    outcome.records_processed = count;
                    outcome.records_successful = successful;
                    outcome.records_failed = failed;
                    Ok(outcome)
                }
            }
        }

        async fn pull_reservations(
            &self,
            channel: &Channel,
            _range: DateRange,
        ) -> Result<PullOutcome, AdapterError> {
            match self.behavior_for(channel.id) {
                MockBehavior::RemoteFailure(message) => Ok(PullOutcome {
                    outcome: SyncOutcome::fail(message),
                    bookings: Vec::new(),
                }),
                MockBehavior::ConfigError => Err(AdapterError::MissingCredential("username")),
                _ => {
                    let bookings = self.pull_bookings.lock().clone();
                    let mut outcome =
                        SyncOutcome::ok(format!("retrieved {} reservations", bookings.len()));
                    outcome.records_processed = bookings.len() as u32;
                    outcome.records_successful = bookings.len() as u32;
                    Ok(PullOutcome { outcome, bookings })
                }
            }
        }

        async fn update_reservation_status(
            &self,
            channel: &Channel,
            _reservation_id: &str,
            _status: BookingStatus,
        ) -> Result<SyncOutcome, AdapterError> {
            match self.behavior_for(channel.id) {
                MockBehavior::RemoteFailure(message) => Ok(SyncOutcome::fail(message)),
                MockBehavior::ConfigError => Err(AdapterError::MissingCredential("username")),
                _ => Ok(SyncOutcome::ok("status delivered")),
            }
        }
    }
}
