// Sync audit log: append/update store for synchronization attempts plus the
// channel-booking records written by the pull direction. Rows open in
// `Pending` and are finalized exactly once; terminal rows never change
// again. A process crash between open and finalize leaves the row `Pending`
// forever — reconciliation is a scheduler concern, not handled here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ChannelBooking, SyncDirection, SyncKind, SyncLog, SyncStatus};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("sync log {0} not found")]
    LogNotFound(u64),

    #[error("sync log {0} is already finalized")]
    AlreadyFinalized(u64),

    #[error("{0:?} is not a terminal status")]
    NotTerminal(SyncStatus),
}

#[derive(Debug, Clone)]
pub struct NewSyncLog {
    pub hotel_id: u64,
    pub channel_id: u64,
    pub kind: SyncKind,
    pub direction: SyncDirection,
    pub records_processed: u32,
}

// Everything the dispatcher learns from one attempt, written back in a
// single update.
#[derive(Debug, Clone)]
pub struct SyncCompletion {
    pub status: SyncStatus,
    pub records_successful: u32,
    pub records_failed: u32,
    pub request_payload: Option<String>,
    pub response_payload: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Page {
    pub page: usize,
    pub per_page: usize,
}

impl Page {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

// Aggregate view backing the analytics read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStats {
    pub total_attempts: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub partial: usize,
    pub pending: usize,
    pub records_pushed: u64,
    pub attempts_by_channel: HashMap<u64, usize>,
}

#[async_trait]
pub trait SyncAuditLog: Send + Sync {
    // Creates the attempt row in `Pending` state, timestamped now.
    async fn open(&self, entry: NewSyncLog) -> SyncLog;

    // One-shot transition to a terminal state. Rejects non-terminal target
    // statuses and repeated finalization.
    async fn finalize(&self, log_id: u64, completion: SyncCompletion)
        -> Result<SyncLog, AuditError>;

    async fn log(&self, log_id: u64) -> Option<SyncLog>;

    // Newest-first page of a hotel's attempts.
    async fn logs_for_hotel(&self, hotel_id: u64, page: Page) -> PageResult<SyncLog>;

    // Insert-or-update by (channel, external booking id).
    async fn upsert_booking(&self, booking: ChannelBooking) -> ChannelBooking;

    async fn bookings_for_hotel(&self, hotel_id: u64, page: Page) -> PageResult<ChannelBooking>;

    async fn sync_stats(&self, hotel_id: u64) -> SyncStats;
}

pub struct InMemorySyncAuditLog {
    logs: DashMap<u64, SyncLog>,
    bookings: DashMap<u64, ChannelBooking>,
    // (channel_id, external_booking_id) -> booking id, for upserts
    booking_index: RwLock<HashMap<(u64, String), u64>>,
    next_id: AtomicU64,
}

impl InMemorySyncAuditLog {
    pub fn new() -> Self {
        Self {
            logs: DashMap::new(),
            bookings: DashMap::new(),
            booking_index: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for InMemorySyncAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

fn paginate<T>(mut items: Vec<T>, page: Page) -> PageResult<T> {
    let total = items.len();
    let per_page = page.per_page.max(1);
    let start = (page.page.max(1) - 1) * per_page;
    let items = if start >= total {
        Vec::new()
    } else {
        items.drain(start..(start + per_page).min(total)).collect()
    };
    PageResult {
        items,
        total,
        page: page.page.max(1),
        per_page,
    }
}

#[async_trait]
impl SyncAuditLog for InMemorySyncAuditLog {
    async fn open(&self, entry: NewSyncLog) -> SyncLog {
        let id = self.allocate_id();
        let log = SyncLog {
            id,
            hotel_id: entry.hotel_id,
            channel_id: entry.channel_id,
            kind: entry.kind,
            direction: entry.direction,
            status: SyncStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            records_processed: entry.records_processed,
            records_successful: 0,
            records_failed: 0,
            request_payload: None,
            response_payload: None,
            error_message: None,
        };
        self.logs.insert(id, log.clone());
        log
    }

    async fn finalize(
        &self,
        log_id: u64,
        completion: SyncCompletion,
    ) -> Result<SyncLog, AuditError> {
        if !completion.status.is_terminal() {
            return Err(AuditError::NotTerminal(completion.status));
        }
        let mut entry = self
            .logs
            .get_mut(&log_id)
            .ok_or(AuditError::LogNotFound(log_id))?;
        if entry.status.is_terminal() {
            return Err(AuditError::AlreadyFinalized(log_id));
        }
        entry.status = completion.status;
        entry.completed_at = Some(Utc::now());
        entry.records_successful = completion.records_successful;
        entry.records_failed = completion.records_failed;
        entry.request_payload = completion.request_payload;
        entry.response_payload = completion.response_payload;
        entry.error_message = completion.error_message;
        Ok(entry.clone())
    }

    async fn log(&self, log_id: u64) -> Option<SyncLog> {
        self.logs.get(&log_id).map(|entry| entry.clone())
    }

    async fn logs_for_hotel(&self, hotel_id: u64, page: Page) -> PageResult<SyncLog> {
        let mut logs: Vec<SyncLog> = self
            .logs
            .iter()
            .filter(|entry| entry.hotel_id == hotel_id)
            .map(|entry| entry.clone())
            .collect();
        logs.sort_by(|a, b| b.id.cmp(&a.id));
        paginate(logs, page)
    }

    async fn upsert_booking(&self, mut booking: ChannelBooking) -> ChannelBooking {
        let key = (booking.channel_id, booking.external_booking_id.clone());
        let existing = self.booking_index.read().get(&key).copied();
        match existing {
            Some(id) => {
                booking.id = id;
                self.bookings.insert(id, booking.clone());
            }
            None => {
                let id = self.allocate_id();
                booking.id = id;
                self.booking_index.write().insert(key, id);
                self.bookings.insert(id, booking.clone());
            }
        }
        booking
    }

    async fn bookings_for_hotel(&self, hotel_id: u64, page: Page) -> PageResult<ChannelBooking> {
        let mut bookings: Vec<ChannelBooking> = self
            .bookings
            .iter()
            .filter(|entry| entry.hotel_id == hotel_id)
            .map(|entry| entry.clone())
            .collect();
        bookings.sort_by(|a, b| b.id.cmp(&a.id));
        paginate(bookings, page)
    }

    async fn sync_stats(&self, hotel_id: u64) -> SyncStats {
        let mut stats = SyncStats::default();
        for entry in self.logs.iter().filter(|e| e.hotel_id == hotel_id) {
            stats.total_attempts += 1;
            match entry.status {
                SyncStatus::Success => stats.succeeded += 1,
                SyncStatus::Failed => stats.failed += 1,
                SyncStatus::Partial => stats.partial += 1,
                SyncStatus::Pending => stats.pending += 1,
            }
            stats.records_pushed += u64::from(entry.records_successful);
            *stats
                .attempts_by_channel
                .entry(entry.channel_id)
                .or_insert(0) += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BookingStatus;

    fn pending_entry(hotel_id: u64, channel_id: u64) -> NewSyncLog {
        NewSyncLog {
            hotel_id,
            channel_id,
            kind: SyncKind::Inventory,
            direction: SyncDirection::Push,
            records_processed: 10,
        }
    }

    fn success_completion() -> SyncCompletion {
        SyncCompletion {
            status: SyncStatus::Success,
            records_successful: 10,
            records_failed: 0,
            request_payload: Some("<OTA_HotelInvNotifRQ/>".to_string()),
            response_payload: Some("OK".to_string()),
            error_message: None,
        }
    }

    fn booking(channel_id: u64, external_id: &str) -> ChannelBooking {
        ChannelBooking {
            id: 0,
            hotel_id: 7,
            channel_id,
            external_booking_id: external_id.to_string(),
            guest_name: "Jane Doe".to_string(),
            room_type_code: "DLX".to_string(),
            check_in: None,
            check_out: None,
            total_amount: 184.5,
            currency: "USD".to_string(),
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_open_creates_pending_row() {
        let audit = InMemorySyncAuditLog::new();
        let log = audit.open(pending_entry(7, 1)).await;
        assert_eq!(log.status, SyncStatus::Pending);
        assert_eq!(log.records_processed, 10);
        assert!(log.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_finalize_transitions_once() {
        let audit = InMemorySyncAuditLog::new();
        let log = audit.open(pending_entry(7, 1)).await;

        let finalized = audit.finalize(log.id, success_completion()).await.unwrap();
        assert_eq!(finalized.status, SyncStatus::Success);
        assert!(finalized.completed_at.is_some());
        assert_eq!(finalized.records_successful, 10);

        // terminal rows are immutable
        let err = audit.finalize(log.id, success_completion()).await.unwrap_err();
        assert!(matches!(err, AuditError::AlreadyFinalized(_)));
    }

    #[tokio::test]
    async fn test_finalize_rejects_pending_target() {
        let audit = InMemorySyncAuditLog::new();
        let log = audit.open(pending_entry(7, 1)).await;
        let mut completion = success_completion();
        completion.status = SyncStatus::Pending;
        let err = audit.finalize(log.id, completion).await.unwrap_err();
        assert!(matches!(err, AuditError::NotTerminal(SyncStatus::Pending)));
    }

    #[tokio::test]
    async fn test_finalize_unknown_log() {
        let audit = InMemorySyncAuditLog::new();
        let err = audit.finalize(42, success_completion()).await.unwrap_err();
        assert!(matches!(err, AuditError::LogNotFound(42)));
    }

    #[tokio::test]
    async fn test_logs_are_paginated_newest_first() {
        let audit = InMemorySyncAuditLog::new();
        for i in 0..5 {
            let log = audit.open(pending_entry(7, i)).await;
            audit.finalize(log.id, success_completion()).await.unwrap();
        }
        // a different hotel's rows must not leak in
        audit.open(pending_entry(8, 99)).await;

        let first = audit.logs_for_hotel(7, Page::new(1, 2)).await;
        assert_eq!(first.total, 5);
        assert_eq!(first.items.len(), 2);
        assert!(first.items[0].id > first.items[1].id);

        let last = audit.logs_for_hotel(7, Page::new(3, 2)).await;
        assert_eq!(last.items.len(), 1);

        let beyond = audit.logs_for_hotel(7, Page::new(4, 2)).await;
        assert!(beyond.items.is_empty());
    }

    #[tokio::test]
    async fn test_booking_upsert_replaces_by_external_id() {
        let audit = InMemorySyncAuditLog::new();
        let first = audit.upsert_booking(booking(1, "BK-1001")).await;

        let mut changed = booking(1, "BK-1001");
        changed.status = BookingStatus::Cancelled;
        let second = audit.upsert_booking(changed).await;

        assert_eq!(first.id, second.id);
        let page = audit.bookings_for_hotel(7, Page::default()).await;
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].status, BookingStatus::Cancelled);

        // same external id on another channel is a distinct booking
        audit.upsert_booking(booking(2, "BK-1001")).await;
        let page = audit.bookings_for_hotel(7, Page::default()).await;
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_sync_stats_aggregates_by_status() {
        let audit = InMemorySyncAuditLog::new();

        let a = audit.open(pending_entry(7, 1)).await;
        audit.finalize(a.id, success_completion()).await.unwrap();

        let b = audit.open(pending_entry(7, 2)).await;
        let mut failed = success_completion();
        failed.status = SyncStatus::Failed;
        failed.records_successful = 0;
        failed.records_failed = 10;
        audit.finalize(b.id, failed).await.unwrap();

        audit.open(pending_entry(7, 1)).await; // stuck pending

        let stats = audit.sync_stats(7).await;
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.records_pushed, 10);
        assert_eq!(stats.attempts_by_channel.get(&1), Some(&2));
    }
}
