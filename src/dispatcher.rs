// Sync dispatcher: orchestrates one synchronization attempt end to end.
// Builds inventory, selects eligible channels, invokes the protocol adapter
// and records the outcome in the audit log. Every attempt's result is
// persisted before the dispatcher returns; a channel's failure never aborts
// its siblings.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::adapter::{AdapterError, AdapterRegistry};
use crate::audit::{AuditError, NewSyncLog, SyncAuditLog, SyncCompletion};
use crate::config::SyncConfig;
use crate::inventory::InventoryGenerator;
use crate::model::{
    BookingStatus, Channel, ChannelStatus, DateRange, InvalidDateRange, InventoryRecord,
    SyncDirection, SyncKind, SyncStatus,
};
use crate::registry::{ChannelRegistry, RegistryError};

// Hint returned alongside failed attempts. Remote failures are worth
// retrying after a cool-down; configuration failures need a human first.
const RETRY_AFTER_REMOTE_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("channel {0} is not active")]
    ChannelNotActive(u64),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    InvalidDateRange(#[from] InvalidDateRange),
}

// Per-channel outcome of one inventory synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSyncResult {
    pub channel_id: u64,
    pub channel_name: String,
    pub success: bool,
    pub status: SyncStatus,
    pub message: String,
    pub records_pushed: u32,
    pub log_id: Option<u64>,
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSyncResult {
    pub synced_channels: usize,
    pub results: Vec<ChannelSyncResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullResult {
    pub log_id: u64,
    pub success: bool,
    pub message: String,
    pub bookings_received: usize,
}

pub struct SyncDispatcher {
    registry: Arc<dyn ChannelRegistry>,
    audit: Arc<dyn SyncAuditLog>,
    adapters: Arc<AdapterRegistry>,
    generator: InventoryGenerator,
    config: SyncConfig,
}

impl SyncDispatcher {
    pub fn new(
        registry: Arc<dyn ChannelRegistry>,
        audit: Arc<dyn SyncAuditLog>,
        adapters: Arc<AdapterRegistry>,
        config: SyncConfig,
    ) -> Self {
        let generator = InventoryGenerator::new(Arc::clone(&registry));
        Self {
            registry,
            audit,
            adapters,
            generator,
            config,
        }
    }

    // Pushes the given records to one channel. Verifies the channel is
    // active before anything else, then brackets the network exchange with
    // a pending row and exactly one terminal update. Configuration errors
    // from the adapter still finalize the row before propagating.
    pub async fn sync_inventory_to_channel(
        &self,
        hotel_id: u64,
        channel_id: u64,
        records: &[InventoryRecord],
    ) -> Result<ChannelSyncResult, SyncError> {
        let channel = self.registry.channel(hotel_id, channel_id).await?;
        if channel.status != ChannelStatus::Active {
            return Err(SyncError::ChannelNotActive(channel_id));
        }

        let log = self
            .audit
            .open(NewSyncLog {
                hotel_id,
                channel_id,
                kind: SyncKind::Inventory,
                direction: SyncDirection::Push,
                records_processed: records.len() as u32,
            })
            .await;

        // correlation id ties the start/end log lines of one attempt together
        let attempt = format!("sync-{:08x}", rand::random::<u32>());
        info!(
            hotel_id,
            channel_id,
            records = records.len(),
            attempt = %attempt,
            "pushing inventory"
        );

        let adapter = self.adapters.resolve(&channel.channel_type);
        match adapter.push_inventory(&channel, records).await {
            Ok(outcome) => {
                let status = terminal_status(outcome.success, outcome.records_successful);
                self.audit
                    .finalize(
                        log.id,
                        SyncCompletion {
                            status,
                            records_successful: outcome.records_successful,
                            records_failed: outcome.records_failed,
                            request_payload: outcome.request_payload,
                            response_payload: outcome.response_payload,
                            error_message: (!outcome.success).then(|| outcome.message.clone()),
                        },
                    )
                    .await?;

                if !outcome.success {
                    warn!(hotel_id, channel_id, attempt = %attempt, message = %outcome.message, "inventory push failed");
                }

                Ok(ChannelSyncResult {
                    channel_id,
                    channel_name: channel.name,
                    success: outcome.success,
                    status,
                    message: outcome.message,
                    records_pushed: outcome.records_successful,
                    log_id: Some(log.id),
                    retry_after_secs: (!outcome.success).then_some(RETRY_AFTER_REMOTE_SECS),
                })
            }
            Err(e) => {
                warn!(hotel_id, channel_id, attempt = %attempt, error = %e, "inventory push rejected by adapter");
                self.audit
                    .finalize(
                        log.id,
                        SyncCompletion {
                            status: SyncStatus::Failed,
                            records_successful: 0,
                            records_failed: records.len() as u32,
                            request_payload: None,
                            response_payload: None,
                            error_message: Some(e.to_string()),
                        },
                    )
                    .await?;
                Err(e.into())
            }
        }
    }

    // Synchronizes every auto-sync channel of the hotel over the forward
    // horizon. Channels are processed strictly sequentially; one channel's
    // error is contained into its result entry and never aborts the loop.
    pub async fn sync_all_channels(&self, hotel_id: u64) -> Result<BulkSyncResult, SyncError> {
        let horizon_days = i64::from(self.config.sync_horizon_days.max(1));
        let today = Utc::now().date_naive();
        let range = DateRange::new(today, today + Duration::days(horizon_days - 1))?;

        let records = self.generator.generate_for_range(hotel_id, range).await;
        let mut by_channel: HashMap<u64, Vec<InventoryRecord>> = HashMap::new();
        for record in records {
            by_channel.entry(record.channel_id).or_default().push(record);
        }

        let eligible: Vec<Channel> = self
            .registry
            .channels_for_hotel(hotel_id)
            .await
            .into_iter()
            .filter(|c| c.status == ChannelStatus::Active && c.settings.auto_sync)
            .collect();

        info!(hotel_id, channels = eligible.len(), "bulk sync started");

        let mut results = Vec::with_capacity(eligible.len());
        for channel in eligible {
            let channel_records = by_channel.remove(&channel.id).unwrap_or_default();
            match self
                .sync_inventory_to_channel(hotel_id, channel.id, &channel_records)
                .await
            {
                Ok(result) => results.push(result),
                // containment: the attempt is already audited, the error
                // becomes this channel's result entry
                Err(e) => results.push(ChannelSyncResult {
                    channel_id: channel.id,
                    channel_name: channel.name,
                    success: false,
                    status: SyncStatus::Failed,
                    message: e.to_string(),
                    records_pushed: 0,
                    log_id: None,
                    retry_after_secs: None,
                }),
            }
        }

        let synced_channels = results.iter().filter(|r| r.success).count();
        Ok(BulkSyncResult {
            synced_channels,
            results,
        })
    }

    // Single-channel synchronization over an optional date range,
    // defaulting to a short forward window.
    pub async fn sync_channel(
        &self,
        hotel_id: u64,
        channel_id: u64,
        range: Option<DateRange>,
    ) -> Result<ChannelSyncResult, SyncError> {
        let range = match range {
            Some(range) => range,
            None => self.default_window()?,
        };
        let records = self
            .generator
            .generate_for_channel(hotel_id, channel_id, range)
            .await?;
        self.sync_inventory_to_channel(hotel_id, channel_id, &records)
            .await
    }

    // Pull direction: retrieves reservations from the channel and upserts
    // them as channel bookings, with the same audit bracketing as a push.
    pub async fn pull_reservations(
        &self,
        hotel_id: u64,
        channel_id: u64,
        range: Option<DateRange>,
    ) -> Result<PullResult, SyncError> {
        let channel = self.registry.channel(hotel_id, channel_id).await?;
        if channel.status != ChannelStatus::Active {
            return Err(SyncError::ChannelNotActive(channel_id));
        }
        let range = match range {
            Some(range) => range,
            None => self.default_window()?,
        };

        let log = self
            .audit
            .open(NewSyncLog {
                hotel_id,
                channel_id,
                kind: SyncKind::Reservation,
                direction: SyncDirection::Pull,
                records_processed: 0,
            })
            .await;

        let adapter = self.adapters.resolve(&channel.channel_type);
        match adapter.pull_reservations(&channel, range).await {
            Ok(pull) => {
                let received = pull.bookings.len();
                for booking in pull.bookings {
                    self.audit.upsert_booking(booking).await;
                }
                let status = terminal_status(pull.outcome.success, pull.outcome.records_successful);
                self.audit
                    .finalize(
                        log.id,
                        SyncCompletion {
                            status,
                            records_successful: pull.outcome.records_successful,
                            records_failed: pull.outcome.records_failed,
                            request_payload: pull.outcome.request_payload,
                            response_payload: pull.outcome.response_payload,
                            error_message: (!pull.outcome.success)
                                .then(|| pull.outcome.message.clone()),
                        },
                    )
                    .await?;
                Ok(PullResult {
                    log_id: log.id,
                    success: pull.outcome.success,
                    message: pull.outcome.message,
                    bookings_received: received,
                })
            }
            Err(e) => {
                warn!(hotel_id, channel_id, error = %e, "reservation pull rejected by adapter");
                self.audit
                    .finalize(
                        log.id,
                        SyncCompletion {
                            status: SyncStatus::Failed,
                            records_successful: 0,
                            records_failed: 0,
                            request_payload: None,
                            response_payload: None,
                            error_message: Some(e.to_string()),
                        },
                    )
                    .await?;
                Err(e.into())
            }
        }
    }

    // Push direction of reservation sync: acknowledges a status change
    // back to the channel and mirrors it on the stored booking.
    pub async fn push_reservation_status(
        &self,
        hotel_id: u64,
        channel_id: u64,
        external_booking_id: &str,
        status: BookingStatus,
    ) -> Result<ChannelSyncResult, SyncError> {
        let channel = self.registry.channel(hotel_id, channel_id).await?;
        if channel.status != ChannelStatus::Active {
            return Err(SyncError::ChannelNotActive(channel_id));
        }

        let log = self
            .audit
            .open(NewSyncLog {
                hotel_id,
                channel_id,
                kind: SyncKind::Reservation,
                direction: SyncDirection::Push,
                records_processed: 1,
            })
            .await;

        let adapter = self.adapters.resolve(&channel.channel_type);
        match adapter
            .update_reservation_status(&channel, external_booking_id, status)
            .await
        {
            Ok(outcome) => {
                let status = terminal_status(outcome.success, outcome.records_successful);
                self.audit
                    .finalize(
                        log.id,
                        SyncCompletion {
                            status,
                            records_successful: outcome.records_successful,
                            records_failed: outcome.records_failed,
                            request_payload: outcome.request_payload,
                            response_payload: outcome.response_payload,
                            error_message: (!outcome.success).then(|| outcome.message.clone()),
                        },
                    )
                    .await?;
                Ok(ChannelSyncResult {
                    channel_id,
                    channel_name: channel.name,
                    success: outcome.success,
                    status,
                    message: outcome.message,
                    records_pushed: outcome.records_successful,
                    log_id: Some(log.id),
                    retry_after_secs: (!outcome.success).then_some(RETRY_AFTER_REMOTE_SECS),
                })
            }
            Err(e) => {
                self.audit
                    .finalize(
                        log.id,
                        SyncCompletion {
                            status: SyncStatus::Failed,
                            records_successful: 0,
                            records_failed: 1,
                            request_payload: None,
                            response_payload: None,
                            error_message: Some(e.to_string()),
                        },
                    )
                    .await?;
                Err(e.into())
            }
        }
    }

    fn default_window(&self) -> Result<DateRange, InvalidDateRange> {
        let today = Utc::now().date_naive();
        let days = i64::from(self.config.default_pull_window_days.max(1));
        DateRange::new(today, today + Duration::days(days - 1))
    }
}

fn terminal_status(success: bool, records_successful: u32) -> SyncStatus {
    if success {
        SyncStatus::Success
    } else if records_successful > 0 {
        SyncStatus::Partial
    } else {
        SyncStatus::Failed
    }
}
