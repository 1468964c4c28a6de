// Channel registry: CRUD access to OTA connections, rate plans, room
// mappings and room stock. The relational store is an external collaborator;
// the engine only sees the `ChannelRegistry` trait. An in-memory DashMap
// implementation backs tests and embedded deployments.
//
// Every channel-scoped operation takes the calling hotel's id and rejects
// channels owned by a different hotel.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    Channel, ChannelSettings, ChannelStatus, RatePlan, Room, RoomCategory, RoomMapping,
    SeasonalRate,
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("channel {0} not found")]
    ChannelNotFound(u64),

    #[error("channel {channel_id} does not belong to hotel {hotel_id}")]
    ChannelNotOwned { channel_id: u64, hotel_id: u64 },

    #[error("rate plan already exists for channel {channel_id} and room category {category:?}")]
    RatePlanExists {
        channel_id: u64,
        category: RoomCategory,
    },

    #[error("room mapping already exists for channel {channel_id} and room category {category:?}")]
    MappingExists {
        channel_id: u64,
        category: RoomCategory,
    },
}

// Input for creating a channel; the registry assigns id and creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChannel {
    pub hotel_id: u64,
    pub channel_type: String,
    pub name: String,
    pub property_id: String,
    pub endpoint: String,
    pub credentials: serde_json::Value,
    pub status: ChannelStatus,
    #[serde(default)]
    pub settings: ChannelSettings,
}

// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelUpdate {
    pub name: Option<String>,
    pub property_id: Option<String>,
    pub endpoint: Option<String>,
    pub credentials: Option<serde_json::Value>,
    pub status: Option<ChannelStatus>,
    pub settings: Option<ChannelSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRatePlan {
    pub channel_id: u64,
    pub room_category: RoomCategory,
    pub base_rate: f64,
    #[serde(default)]
    pub weekend_surcharge: f64,
    #[serde(default)]
    pub tax_rate: f64,
    #[serde(default)]
    pub discount_pct: f64,
    #[serde(default)]
    pub seasonal_rates: Vec<SeasonalRate>,
    #[serde(default = "crate::model::default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoomMapping {
    pub channel_id: u64,
    pub room_category: RoomCategory,
    pub external_room_id: String,
    pub external_rate_plan_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoom {
    pub hotel_id: u64,
    pub number: String,
    pub category: RoomCategory,
}

#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    async fn create_channel(&self, channel: NewChannel) -> Result<Channel, RegistryError>;

    // Loads a channel, verifying it belongs to the given hotel.
    async fn channel(&self, hotel_id: u64, channel_id: u64) -> Result<Channel, RegistryError>;

    async fn channels_for_hotel(&self, hotel_id: u64) -> Vec<Channel>;

    async fn update_channel(
        &self,
        hotel_id: u64,
        channel_id: u64,
        update: ChannelUpdate,
    ) -> Result<Channel, RegistryError>;

    async fn delete_channel(&self, hotel_id: u64, channel_id: u64) -> Result<(), RegistryError>;

    async fn create_rate_plan(
        &self,
        hotel_id: u64,
        plan: NewRatePlan,
    ) -> Result<RatePlan, RegistryError>;

    async fn rate_plans_for_channel(
        &self,
        hotel_id: u64,
        channel_id: u64,
    ) -> Result<Vec<RatePlan>, RegistryError>;

    // Mapping/plan lookups used by the inventory generator. Absence is a
    // valid configuration state, hence `Option` rather than an error.
    async fn rate_plan(&self, channel_id: u64, category: RoomCategory) -> Option<RatePlan>;

    async fn create_room_mapping(
        &self,
        hotel_id: u64,
        mapping: NewRoomMapping,
    ) -> Result<RoomMapping, RegistryError>;

    async fn room_mapping(&self, channel_id: u64, category: RoomCategory) -> Option<RoomMapping>;

    async fn add_room(&self, room: NewRoom) -> Room;

    async fn rooms_for_hotel(&self, hotel_id: u64) -> Vec<Room>;
}

// DashMap-backed registry. Id assignment is a plain atomic counter.
pub struct InMemoryRegistry {
    channels: DashMap<u64, Channel>,
    rate_plans: DashMap<u64, RatePlan>,
    mappings: DashMap<u64, RoomMapping>,
    rooms: DashMap<u64, Room>,
    next_id: AtomicU64,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            rate_plans: DashMap::new(),
            mappings: DashMap::new(),
            rooms: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn owned_channel(&self, hotel_id: u64, channel_id: u64) -> Result<Channel, RegistryError> {
        let channel = self
            .channels
            .get(&channel_id)
            .map(|entry| entry.clone())
            .ok_or(RegistryError::ChannelNotFound(channel_id))?;
        if channel.hotel_id != hotel_id {
            return Err(RegistryError::ChannelNotOwned {
                channel_id,
                hotel_id,
            });
        }
        Ok(channel)
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelRegistry for InMemoryRegistry {
    async fn create_channel(&self, channel: NewChannel) -> Result<Channel, RegistryError> {
        let id = self.allocate_id();
        let stored = Channel {
            id,
            hotel_id: channel.hotel_id,
            channel_type: channel.channel_type,
            name: channel.name,
            property_id: channel.property_id,
            endpoint: channel.endpoint,
            credentials: channel.credentials,
            status: channel.status,
            settings: channel.settings,
            created_at: Utc::now(),
        };
        self.channels.insert(id, stored.clone());
        Ok(stored)
    }

    async fn channel(&self, hotel_id: u64, channel_id: u64) -> Result<Channel, RegistryError> {
        self.owned_channel(hotel_id, channel_id)
    }

    async fn channels_for_hotel(&self, hotel_id: u64) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self
            .channels
            .iter()
            .filter(|entry| entry.hotel_id == hotel_id)
            .map(|entry| entry.clone())
            .collect();
        channels.sort_by_key(|c| c.id);
        channels
    }

    async fn update_channel(
        &self,
        hotel_id: u64,
        channel_id: u64,
        update: ChannelUpdate,
    ) -> Result<Channel, RegistryError> {
        let mut channel = self.owned_channel(hotel_id, channel_id)?;
        if let Some(name) = update.name {
            channel.name = name;
        }
        if let Some(property_id) = update.property_id {
            channel.property_id = property_id;
        }
        if let Some(endpoint) = update.endpoint {
            channel.endpoint = endpoint;
        }
        if let Some(credentials) = update.credentials {
            channel.credentials = credentials;
        }
        if let Some(status) = update.status {
            channel.status = status;
        }
        if let Some(settings) = update.settings {
            channel.settings = settings;
        }
        self.channels.insert(channel_id, channel.clone());
        Ok(channel)
    }

    async fn delete_channel(&self, hotel_id: u64, channel_id: u64) -> Result<(), RegistryError> {
        self.owned_channel(hotel_id, channel_id)?;
        self.channels.remove(&channel_id);
        self.rate_plans.retain(|_, plan| plan.channel_id != channel_id);
        self.mappings
            .retain(|_, mapping| mapping.channel_id != channel_id);
        Ok(())
    }

    async fn create_rate_plan(
        &self,
        hotel_id: u64,
        plan: NewRatePlan,
    ) -> Result<RatePlan, RegistryError> {
        self.owned_channel(hotel_id, plan.channel_id)?;
        let duplicate = self.rate_plans.iter().any(|entry| {
            entry.channel_id == plan.channel_id && entry.room_category == plan.room_category
        });
        if duplicate {
            return Err(RegistryError::RatePlanExists {
                channel_id: plan.channel_id,
                category: plan.room_category,
            });
        }
        let id = self.allocate_id();
        let stored = RatePlan {
            id,
            channel_id: plan.channel_id,
            room_category: plan.room_category,
            base_rate: plan.base_rate,
            weekend_surcharge: plan.weekend_surcharge,
            tax_rate: plan.tax_rate,
            discount_pct: plan.discount_pct,
            seasonal_rates: plan.seasonal_rates,
            currency: plan.currency,
        };
        self.rate_plans.insert(id, stored.clone());
        Ok(stored)
    }

    async fn rate_plans_for_channel(
        &self,
        hotel_id: u64,
        channel_id: u64,
    ) -> Result<Vec<RatePlan>, RegistryError> {
        self.owned_channel(hotel_id, channel_id)?;
        let mut plans: Vec<RatePlan> = self
            .rate_plans
            .iter()
            .filter(|entry| entry.channel_id == channel_id)
            .map(|entry| entry.clone())
            .collect();
        plans.sort_by_key(|p| p.id);
        Ok(plans)
    }

    async fn rate_plan(&self, channel_id: u64, category: RoomCategory) -> Option<RatePlan> {
        self.rate_plans
            .iter()
            .find(|entry| entry.channel_id == channel_id && entry.room_category == category)
            .map(|entry| entry.clone())
    }

    async fn create_room_mapping(
        &self,
        hotel_id: u64,
        mapping: NewRoomMapping,
    ) -> Result<RoomMapping, RegistryError> {
        self.owned_channel(hotel_id, mapping.channel_id)?;
        let duplicate = self.mappings.iter().any(|entry| {
            entry.channel_id == mapping.channel_id && entry.room_category == mapping.room_category
        });
        if duplicate {
            return Err(RegistryError::MappingExists {
                channel_id: mapping.channel_id,
                category: mapping.room_category,
            });
        }
        let id = self.allocate_id();
        let stored = RoomMapping {
            id,
            channel_id: mapping.channel_id,
            room_category: mapping.room_category,
            external_room_id: mapping.external_room_id,
            external_rate_plan_id: mapping.external_rate_plan_id,
        };
        self.mappings.insert(id, stored.clone());
        Ok(stored)
    }

    async fn room_mapping(&self, channel_id: u64, category: RoomCategory) -> Option<RoomMapping> {
        self.mappings
            .iter()
            .find(|entry| entry.channel_id == channel_id && entry.room_category == category)
            .map(|entry| entry.clone())
    }

    async fn add_room(&self, room: NewRoom) -> Room {
        let id = self.allocate_id();
        let stored = Room {
            id,
            hotel_id: room.hotel_id,
            number: room.number,
            category: room.category,
        };
        self.rooms.insert(id, stored.clone());
        stored
    }

    async fn rooms_for_hotel(&self, hotel_id: u64) -> Vec<Room> {
        let mut rooms: Vec<Room> = self
            .rooms
            .iter()
            .filter(|entry| entry.hotel_id == hotel_id)
            .map(|entry| entry.clone())
            .collect();
        rooms.sort_by_key(|r| r.id);
        rooms
    }
}
