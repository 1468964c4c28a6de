// Channel service: the boundary the HTTP layer calls. Owns request
// validation, catalog lookups and the create-time connection probe, and
// delegates synchronization to the dispatcher. Errors out of this module
// are 4xx material; remote failures surface inside result payloads.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::adapter::{AdapterRegistry, SyncOutcome};
use crate::audit::{Page, PageResult, SyncAuditLog, SyncStats};
use crate::config::{AdapterKind, ChannelCatalog, SyncConfig};
use crate::dispatcher::{BulkSyncResult, ChannelSyncResult, PullResult, SyncDispatcher, SyncError};
use crate::model::{
    BookingStatus, Channel, ChannelBooking, ChannelSettings, ChannelStatus, DateRange, RatePlan,
    Room, RoomMapping, SyncLog,
};
use crate::registry::{
    ChannelRegistry, ChannelUpdate, NewChannel, NewRatePlan, NewRoom, NewRoomMapping,
    RegistryError,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unsupported channel type `{0}`")]
    UnknownChannelType(String),

    #[error("connection test failed: {0}")]
    ConnectionTest(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

// Static catalog entry as exposed on the supported-channels listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedChannel {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub commission: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChannelRequest {
    pub channel_type: String,
    pub name: String,
    pub property_id: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    pub credentials: serde_json::Value,
    #[serde(default)]
    pub settings: Option<ChannelSettings>,
}

pub struct ChannelService {
    registry: Arc<dyn ChannelRegistry>,
    audit: Arc<dyn SyncAuditLog>,
    adapters: Arc<AdapterRegistry>,
    catalog: Arc<ChannelCatalog>,
    dispatcher: SyncDispatcher,
}

impl ChannelService {
    pub fn new(
        registry: Arc<dyn ChannelRegistry>,
        audit: Arc<dyn SyncAuditLog>,
        adapters: Arc<AdapterRegistry>,
        catalog: Arc<ChannelCatalog>,
        config: SyncConfig,
    ) -> Self {
        let dispatcher = SyncDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&audit),
            Arc::clone(&adapters),
            config,
        );
        Self {
            registry,
            audit,
            adapters,
            catalog,
            dispatcher,
        }
    }

    pub fn supported_channels(&self) -> Vec<SupportedChannel> {
        self.catalog
            .entries()
            .iter()
            .map(|entry| SupportedChannel {
                id: entry.code.clone(),
                name: entry.name.clone(),
                endpoint: entry.default_endpoint.clone(),
                commission: entry.commission_pct,
            })
            .collect()
    }

    pub async fn list_channels(&self, hotel_id: u64) -> Vec<Channel> {
        self.registry.channels_for_hotel(hotel_id).await
    }

    // Creates a channel. For the concrete OTA-XML type the endpoint is
    // probed before anything is persisted and a failed probe rejects the
    // request; stub types persist in `Testing` without a probe.
    pub async fn create_channel(
        &self,
        hotel_id: u64,
        request: CreateChannelRequest,
    ) -> Result<Channel, ServiceError> {
        if request.name.trim().is_empty() {
            return Err(ServiceError::Validation(
                "channel name must not be empty".to_string(),
            ));
        }
        let entry = self
            .catalog
            .find(&request.channel_type)
            .ok_or_else(|| ServiceError::UnknownChannelType(request.channel_type.clone()))?;

        let endpoint = request
            .endpoint
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| entry.default_endpoint.clone());
        let settings = request.settings.unwrap_or_default();

        let status = match entry.adapter_kind {
            AdapterKind::OtaXml => {
                let candidate = Channel {
                    id: 0,
                    hotel_id,
                    channel_type: request.channel_type.clone(),
                    name: request.name.clone(),
                    property_id: request.property_id.clone(),
                    endpoint: endpoint.clone(),
                    credentials: request.credentials.clone(),
                    status: ChannelStatus::Testing,
                    settings: settings.clone(),
                    created_at: Utc::now(),
                };
                let adapter = self.adapters.resolve(&request.channel_type);
                let outcome = adapter.test_connection(&candidate).await;
                if !outcome.success {
                    return Err(ServiceError::ConnectionTest(outcome.message));
                }
                ChannelStatus::Active
            }
            AdapterKind::Stub => ChannelStatus::Testing,
        };

        let channel = self
            .registry
            .create_channel(NewChannel {
                hotel_id,
                channel_type: request.channel_type,
                name: request.name,
                property_id: request.property_id,
                endpoint,
                credentials: request.credentials,
                status,
                settings,
            })
            .await?;
        info!(hotel_id, channel_id = channel.id, "channel created");
        Ok(channel)
    }

    pub async fn update_channel(
        &self,
        hotel_id: u64,
        channel_id: u64,
        update: ChannelUpdate,
    ) -> Result<Channel, ServiceError> {
        Ok(self.registry.update_channel(hotel_id, channel_id, update).await?)
    }

    pub async fn delete_channel(&self, hotel_id: u64, channel_id: u64) -> Result<(), ServiceError> {
        Ok(self.registry.delete_channel(hotel_id, channel_id).await?)
    }

    // Re-probes an existing channel. A failed probe demotes the channel to
    // `Error`; a successful probe of an errored channel restores `Active`.
    pub async fn test_channel(
        &self,
        hotel_id: u64,
        channel_id: u64,
    ) -> Result<SyncOutcome, ServiceError> {
        let channel = self.registry.channel(hotel_id, channel_id).await?;
        let adapter = self.adapters.resolve(&channel.channel_type);
        let outcome = adapter.test_connection(&channel).await;

        let new_status = if outcome.success {
            (channel.status == ChannelStatus::Error).then_some(ChannelStatus::Active)
        } else {
            Some(ChannelStatus::Error)
        };
        if let Some(status) = new_status {
            self.registry
                .update_channel(
                    hotel_id,
                    channel_id,
                    ChannelUpdate {
                        status: Some(status),
                        ..Default::default()
                    },
                )
                .await?;
        }
        Ok(outcome)
    }

    pub async fn rate_plans(
        &self,
        hotel_id: u64,
        channel_id: u64,
    ) -> Result<Vec<RatePlan>, ServiceError> {
        Ok(self.registry.rate_plans_for_channel(hotel_id, channel_id).await?)
    }

    pub async fn create_rate_plan(
        &self,
        hotel_id: u64,
        plan: NewRatePlan,
    ) -> Result<RatePlan, ServiceError> {
        if plan.base_rate < 0.0 {
            return Err(ServiceError::Validation(
                "base rate must not be negative".to_string(),
            ));
        }
        for seasonal in &plan.seasonal_rates {
            if seasonal.start > seasonal.end {
                return Err(ServiceError::Validation(format!(
                    "seasonal rate range {} .. {} is inverted",
                    seasonal.start, seasonal.end
                )));
            }
        }
        Ok(self.registry.create_rate_plan(hotel_id, plan).await?)
    }

    pub async fn add_room_mapping(
        &self,
        hotel_id: u64,
        mapping: NewRoomMapping,
    ) -> Result<RoomMapping, ServiceError> {
        Ok(self.registry.create_room_mapping(hotel_id, mapping).await?)
    }

    pub async fn add_room(&self, room: NewRoom) -> Room {
        self.registry.add_room(room).await
    }

    // Hotel-scoped bulk synchronization over the forward horizon.
    pub async fn sync_inventory(&self, hotel_id: u64) -> Result<BulkSyncResult, ServiceError> {
        Ok(self.dispatcher.sync_all_channels(hotel_id).await?)
    }

    pub async fn sync_channel(
        &self,
        hotel_id: u64,
        channel_id: u64,
        range: Option<DateRange>,
    ) -> Result<ChannelSyncResult, ServiceError> {
        Ok(self.dispatcher.sync_channel(hotel_id, channel_id, range).await?)
    }

    pub async fn pull_reservations(
        &self,
        hotel_id: u64,
        channel_id: u64,
        range: Option<DateRange>,
    ) -> Result<PullResult, ServiceError> {
        Ok(self
            .dispatcher
            .pull_reservations(hotel_id, channel_id, range)
            .await?)
    }

    pub async fn push_reservation_status(
        &self,
        hotel_id: u64,
        channel_id: u64,
        external_booking_id: &str,
        status: BookingStatus,
    ) -> Result<ChannelSyncResult, ServiceError> {
        Ok(self
            .dispatcher
            .push_reservation_status(hotel_id, channel_id, external_booking_id, status)
            .await?)
    }

    pub async fn sync_logs(&self, hotel_id: u64, page: Page) -> PageResult<SyncLog> {
        self.audit.logs_for_hotel(hotel_id, page).await
    }

    pub async fn bookings(&self, hotel_id: u64, page: Page) -> PageResult<ChannelBooking> {
        self.audit.bookings_for_hotel(hotel_id, page).await
    }

    pub async fn analytics(&self, hotel_id: u64) -> SyncStats {
        self.audit.sync_stats(hotel_id).await
    }
}
