// Inventory generator: projects room stock, channel configuration and rate
// plans into the per-(channel, room category, date) records a sync run
// pushes. Records are computed fresh each run; nothing here persists.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{
    Channel, ChannelStatus, DateRange, InventoryRecord, RoomCategory,
};
use crate::rates::calculate_rate;
use crate::registry::{ChannelRegistry, RegistryError};

pub struct InventoryGenerator {
    registry: Arc<dyn ChannelRegistry>,
}

impl InventoryGenerator {
    pub fn new(registry: Arc<dyn ChannelRegistry>) -> Self {
        Self { registry }
    }

    // One record per (active channel, mapped room category, day). Triples
    // without room stock, a rate plan or a room mapping are skipped
    // silently: absence is a valid configuration state, not a failure.
    // Output order is (day, channel id, category) and stable within a call.
    pub async fn generate_for_range(
        &self,
        hotel_id: u64,
        range: DateRange,
    ) -> Vec<InventoryRecord> {
        let channels: Vec<Channel> = self
            .registry
            .channels_for_hotel(hotel_id)
            .await
            .into_iter()
            .filter(|c| c.status == ChannelStatus::Active)
            .collect();
        self.generate(&channels, hotel_id, range).await
    }

    // Single-channel variant used by the per-channel sync trigger. The
    // channel need not be active here; the dispatcher enforces status.
    pub async fn generate_for_channel(
        &self,
        hotel_id: u64,
        channel_id: u64,
        range: DateRange,
    ) -> Result<Vec<InventoryRecord>, RegistryError> {
        let channel = self.registry.channel(hotel_id, channel_id).await?;
        Ok(self.generate(&[channel], hotel_id, range).await)
    }

    async fn generate(
        &self,
        channels: &[Channel],
        hotel_id: u64,
        range: DateRange,
    ) -> Vec<InventoryRecord> {
        let rooms = self.registry.rooms_for_hotel(hotel_id).await;
        let mut stock: HashMap<RoomCategory, u32> = HashMap::new();
        for room in &rooms {
            *stock.entry(room.category).or_insert(0) += 1;
        }

        let mut records = Vec::new();
        for day in range.days() {
            for channel in channels {
                for category in RoomCategory::ALL {
                    let total_rooms = match stock.get(&category) {
                        Some(count) => *count,
                        None => continue,
                    };
                    let mapping = match self.registry.room_mapping(channel.id, category).await {
                        Some(mapping) => mapping,
                        None => continue,
                    };
                    let plan = match self.registry.rate_plan(channel.id, category).await {
                        Some(plan) => plan,
                        None => continue,
                    };

                    let available_rooms =
                        total_rooms.saturating_sub(channel.settings.inventory_buffer);

                    records.push(InventoryRecord {
                        channel_id: channel.id,
                        room_category: category,
                        date: day,
                        total_rooms,
                        available_rooms,
                        rate: calculate_rate(&plan, day),
                        currency: plan.currency.clone(),
                        external_room_id: mapping.external_room_id,
                        external_rate_plan_id: mapping.external_rate_plan_id,
                    });
                }
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelSettings;
    use crate::registry::{
        InMemoryRegistry, NewChannel, NewRatePlan, NewRoom, NewRoomMapping,
    };
    use chrono::NaiveDate;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seed_channel(
        registry: &InMemoryRegistry,
        hotel_id: u64,
        status: ChannelStatus,
        buffer: u32,
    ) -> u64 {
        let channel = registry
            .create_channel(NewChannel {
                hotel_id,
                channel_type: "booking_com".to_string(),
                name: "Booking.com".to_string(),
                property_id: "PROP-1".to_string(),
                endpoint: "https://example.invalid/xml".to_string(),
                credentials: json!({}),
                status,
                settings: ChannelSettings {
                    inventory_buffer: buffer,
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        channel.id
    }

    async fn map_category(
        registry: &InMemoryRegistry,
        hotel_id: u64,
        channel_id: u64,
        category: RoomCategory,
        base_rate: f64,
    ) {
        registry
            .create_room_mapping(
                hotel_id,
                NewRoomMapping {
                    channel_id,
                    room_category: category,
                    external_room_id: format!("EXT-{}", category.code()),
                    external_rate_plan_id: format!("RP-{}", category.code()),
                },
            )
            .await
            .unwrap();
        registry
            .create_rate_plan(
                hotel_id,
                NewRatePlan {
                    channel_id,
                    room_category: category,
                    base_rate,
                    weekend_surcharge: 0.0,
                    tax_rate: 0.0,
                    discount_pct: 0.0,
                    seasonal_rates: Vec::new(),
                    currency: "USD".to_string(),
                },
            )
            .await
            .unwrap();
    }

    async fn add_rooms(registry: &InMemoryRegistry, hotel_id: u64, category: RoomCategory, n: u32) {
        for i in 0..n {
            registry
                .add_room(NewRoom {
                    hotel_id,
                    number: format!("{}-{}", category.code(), i),
                    category,
                })
                .await;
        }
    }

    #[tokio::test]
    async fn test_three_day_range_two_categories_yields_six_records() {
        let registry = Arc::new(InMemoryRegistry::new());
        let channel_id = seed_channel(&registry, 7, ChannelStatus::Active, 0).await;
        add_rooms(&registry, 7, RoomCategory::Double, 4).await;
        add_rooms(&registry, 7, RoomCategory::Suite, 2).await;
        map_category(&registry, 7, channel_id, RoomCategory::Double, 100.0).await;
        map_category(&registry, 7, channel_id, RoomCategory::Suite, 250.0).await;

        let generator = InventoryGenerator::new(registry);
        let range = DateRange::new(date(2025, 6, 2), date(2025, 6, 4)).unwrap();
        let records = generator.generate_for_range(7, range).await;

        // 2 mapped categories x 3 days, never 8
        assert_eq!(records.len(), 6);
        assert!(records.iter().all(|r| r.channel_id == channel_id));
        assert_eq!(
            records
                .iter()
                .filter(|r| r.room_category == RoomCategory::Double)
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn test_unmapped_categories_are_skipped_silently() {
        let registry = Arc::new(InMemoryRegistry::new());
        let channel_id = seed_channel(&registry, 7, ChannelStatus::Active, 0).await;
        add_rooms(&registry, 7, RoomCategory::Double, 4).await;
        // rooms exist for Suite too, but no mapping or plan
        add_rooms(&registry, 7, RoomCategory::Suite, 2).await;
        map_category(&registry, 7, channel_id, RoomCategory::Double, 100.0).await;

        // mapping without a plan must also be skipped
        registry
            .create_room_mapping(
                7,
                NewRoomMapping {
                    channel_id,
                    room_category: RoomCategory::Twin,
                    external_room_id: "EXT-twin".to_string(),
                    external_rate_plan_id: "RP-twin".to_string(),
                },
            )
            .await
            .unwrap();
        add_rooms(&registry, 7, RoomCategory::Twin, 1).await;

        let generator = InventoryGenerator::new(registry);
        let range = DateRange::new(date(2025, 6, 2), date(2025, 6, 2)).unwrap();
        let records = generator.generate_for_range(7, range).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].room_category, RoomCategory::Double);
    }

    #[tokio::test]
    async fn test_inactive_channels_produce_nothing() {
        let registry = Arc::new(InMemoryRegistry::new());
        let channel_id = seed_channel(&registry, 7, ChannelStatus::Inactive, 0).await;
        add_rooms(&registry, 7, RoomCategory::Double, 4).await;
        map_category(&registry, 7, channel_id, RoomCategory::Double, 100.0).await;

        let generator = InventoryGenerator::new(registry);
        let range = DateRange::new(date(2025, 6, 2), date(2025, 6, 4)).unwrap();
        assert!(generator.generate_for_range(7, range).await.is_empty());
    }

    #[tokio::test]
    async fn test_buffer_is_subtracted_and_floored_at_zero() {
        let registry = Arc::new(InMemoryRegistry::new());
        let channel_id = seed_channel(&registry, 7, ChannelStatus::Active, 3).await;
        add_rooms(&registry, 7, RoomCategory::Double, 4).await;
        add_rooms(&registry, 7, RoomCategory::Suite, 2).await;
        map_category(&registry, 7, channel_id, RoomCategory::Double, 100.0).await;
        map_category(&registry, 7, channel_id, RoomCategory::Suite, 250.0).await;

        let generator = InventoryGenerator::new(registry);
        let range = DateRange::new(date(2025, 6, 2), date(2025, 6, 2)).unwrap();
        let records = generator.generate_for_range(7, range).await;

        let double = records
            .iter()
            .find(|r| r.room_category == RoomCategory::Double)
            .unwrap();
        assert_eq!(double.total_rooms, 4);
        assert_eq!(double.available_rooms, 1);

        // 2 rooms minus buffer 3 floors at zero
        let suite = records
            .iter()
            .find(|r| r.room_category == RoomCategory::Suite)
            .unwrap();
        assert_eq!(suite.total_rooms, 2);
        assert_eq!(suite.available_rooms, 0);
    }

    #[tokio::test]
    async fn test_rates_flow_from_the_calculator() {
        let registry = Arc::new(InMemoryRegistry::new());
        let channel_id = seed_channel(&registry, 7, ChannelStatus::Active, 0).await;
        add_rooms(&registry, 7, RoomCategory::Double, 1).await;
        registry
            .create_room_mapping(
                7,
                NewRoomMapping {
                    channel_id,
                    room_category: RoomCategory::Double,
                    external_room_id: "EXT".to_string(),
                    external_rate_plan_id: "RP".to_string(),
                },
            )
            .await
            .unwrap();
        registry
            .create_rate_plan(
                7,
                NewRatePlan {
                    channel_id,
                    room_category: RoomCategory::Double,
                    base_rate: 2000.0,
                    weekend_surcharge: 500.0,
                    tax_rate: 0.0,
                    discount_pct: 0.0,
                    seasonal_rates: Vec::new(),
                    currency: "USD".to_string(),
                },
            )
            .await
            .unwrap();

        let generator = InventoryGenerator::new(registry);
        // Friday through Sunday: surcharge on Fri+Sat only
        let range = DateRange::new(date(2025, 6, 6), date(2025, 6, 8)).unwrap();
        let records = generator.generate_for_range(7, range).await;
        let rates: Vec<f64> = records.iter().map(|r| r.rate).collect();
        assert_eq!(rates, vec![2500.0, 2500.0, 2000.0]);
    }

    #[tokio::test]
    async fn test_output_order_is_stable_across_calls() {
        let registry = Arc::new(InMemoryRegistry::new());
        let first = seed_channel(&registry, 7, ChannelStatus::Active, 0).await;
        let second = seed_channel(&registry, 7, ChannelStatus::Active, 0).await;
        add_rooms(&registry, 7, RoomCategory::Double, 2).await;
        for id in [first, second] {
            map_category(&registry, 7, id, RoomCategory::Double, 100.0).await;
        }

        let generator = InventoryGenerator::new(registry);
        let range = DateRange::new(date(2025, 6, 2), date(2025, 6, 3)).unwrap();
        let a = generator.generate_for_range(7, range).await;
        let b = generator.generate_for_range(7, range).await;
        assert_eq!(a, b);
        // day-major ordering, channels in id order inside a day
        assert_eq!(a[0].date, a[1].date);
        assert!(a[0].channel_id < a[1].channel_id);
    }

    #[tokio::test]
    async fn test_generate_for_channel_checks_ownership() {
        let registry = Arc::new(InMemoryRegistry::new());
        let channel_id = seed_channel(&registry, 7, ChannelStatus::Active, 0).await;

        let generator = InventoryGenerator::new(registry);
        let range = DateRange::new(date(2025, 6, 2), date(2025, 6, 2)).unwrap();
        let err = generator
            .generate_for_channel(8, channel_id, range)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::ChannelNotOwned { .. }));
    }
}
