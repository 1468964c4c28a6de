// Domain model for the channel synchronization engine: OTA connections,
// pricing rules, computed inventory projections and audit records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Lifecycle status of an OTA connection. Transitions are driven by external
// events: a manual toggle, or demotion to `Error` after a failed connection
// test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Testing,
    Active,
    Inactive,
    Error,
}

// Per-channel behaviour toggles and distribution parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub auto_sync: bool,
    pub rate_parity: bool,
    pub inventory_buffer: u32,
    pub commission_rate: f64,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            auto_sync: true,
            rate_parity: false,
            inventory_buffer: 0,
            commission_rate: 0.0,
        }
    }
}

// One OTA connection for one hotel. The credential bundle is opaque to the
// core; only the protocol adapter for the channel type interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: u64,
    pub hotel_id: u64,
    pub channel_type: String,
    pub name: String,
    pub property_id: String,
    pub endpoint: String,
    pub credentials: serde_json::Value,
    pub status: ChannelStatus,
    pub settings: ChannelSettings,
    pub created_at: DateTime<Utc>,
}

// The fixed room-type categories a hotel's room stock is bucketed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomCategory {
    Single,
    Double,
    Twin,
    Deluxe,
    Suite,
}

impl RoomCategory {
    pub const ALL: [RoomCategory; 5] = [
        RoomCategory::Single,
        RoomCategory::Double,
        RoomCategory::Twin,
        RoomCategory::Deluxe,
        RoomCategory::Suite,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            RoomCategory::Single => "single",
            RoomCategory::Double => "double",
            RoomCategory::Twin => "twin",
            RoomCategory::Deluxe => "deluxe",
            RoomCategory::Suite => "suite",
        }
    }
}

// A physical room belonging to a hotel's stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: u64,
    pub hotel_id: u64,
    pub number: String,
    pub category: RoomCategory,
}

// Date-ranged override rate. Both endpoints are inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalRate {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rate: f64,
}

impl SeasonalRate {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

// Pricing rule for one (channel, room category) pair. At most one plan may
// exist per pair; the registry enforces the invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatePlan {
    pub id: u64,
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
    #[serde(default = "default_currency")]
    pub currency: String,
}

pub(crate) fn default_currency() -> String {
    "USD".to_string()
}

// Correspondence between an internal room category and the channel-side
// room / rate-plan identifiers. Required before any push for the category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMapping {
    pub id: u64,
    pub channel_id: u64,
    pub room_category: RoomCategory,
    pub external_room_id: String,
    pub external_rate_plan_id: String,
}

// Computed projection for one (channel, room category, date) triple. Produced
// fresh on every sync run and never persisted by default. The external
// identifiers are resolved from the room mapping at generation time so the
// adapter stays a pure translator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub channel_id: u64,
    pub room_category: RoomCategory,
    pub date: NaiveDate,
    pub total_rooms: u32,
    pub available_rooms: u32,
    pub rate: f64,
    pub currency: String,
    pub external_room_id: String,
    pub external_rate_plan_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Success,
    Failed,
    Partial,
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Inventory,
    Reservation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Push,
    Pull,
}

// Audit record of one synchronization attempt. Created in `Pending` before
// the network exchange and finalized exactly once afterwards; terminal rows
// are immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLog {
    pub id: u64,
    pub hotel_id: u64,
    pub channel_id: u64,
    pub kind: SyncKind,
    pub direction: SyncDirection,
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_processed: u32,
    pub records_successful: u32,
    pub records_failed: u32,
    pub request_payload: Option<String>,
    pub response_payload: Option<String>,
    pub error_message: Option<String>,
}

// Reservation state as reported by the OTA. Unrecognized wire values are
// preserved rather than dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Modified,
    Cancelled,
    Unknown(String),
}

impl BookingStatus {
    // OTA `ResStatus` values; the notification and retrieve flavours of the
    // message family use slightly different vocabularies.
    pub fn from_res_status(raw: &str) -> Self {
        match raw {
            "Commit" | "Confirmed" | "Book" => BookingStatus::Confirmed,
            "Modify" | "Modified" => BookingStatus::Modified,
            "Cancel" | "Cancelled" => BookingStatus::Cancelled,
            other => BookingStatus::Unknown(other.to_string()),
        }
    }

    pub fn as_res_status(&self) -> &str {
        match self {
            BookingStatus::Confirmed => "Commit",
            BookingStatus::Modified => "Modify",
            BookingStatus::Cancelled => "Cancel",
            BookingStatus::Unknown(raw) => raw,
        }
    }
}

// A reservation that originated on an OTA, written by the pull direction of
// synchronization. Upserted by (channel, external booking id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelBooking {
    pub id: u64,
    pub hotel_id: u64,
    pub channel_id: u64,
    pub external_booking_id: String,
    pub guest_name: String,
    pub room_type_code: String,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub total_amount: f64,
    pub currency: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error)]
#[error("invalid date range: {from} is after {to}")]
pub struct InvalidDateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, InvalidDateRange> {
        if from > to {
            return Err(InvalidDateRange { from, to });
        }
        Ok(Self { from, to })
    }

    // Number of days covered, both endpoints included.
    pub fn len_days(&self) -> u64 {
        (self.to - self.from).num_days() as u64 + 1
    }

    pub fn days(&self) -> DateRangeIter {
        DateRangeIter {
            next: Some(self.from),
            last: self.to,
        }
    }
}

pub struct DateRangeIter {
    next: Option<NaiveDate>,
    last: NaiveDate,
}

impl Iterator for DateRangeIter {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        self.next = if current < self.last {
            current.succ_opt()
        } else {
            None
        };
        Some(current)
    }
}
