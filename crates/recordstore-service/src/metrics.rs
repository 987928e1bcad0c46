//! Service counters
//!
//! Recorded through the `metrics` facade; the embedding process decides
//! whether and how they are exported.

use metrics::counter;

pub const RECORDS_WRITTEN_TOTAL: &str = "recordstore_records_written_total";
pub const RECORDS_SKIPPED_TOTAL: &str = "recordstore_records_skipped_total";
pub const RECORDS_DELETED_TOTAL: &str = "recordstore_records_deleted_total";
pub const RECORDS_PURGED_TOTAL: &str = "recordstore_records_purged_total";
pub const PURGE_ROLLBACKS_TOTAL: &str = "recordstore_purge_rollbacks_total";
pub const BULK_UPDATE_LOCKED_TOTAL: &str = "recordstore_bulk_update_locked_total";
pub const NOTIFICATION_FAILURES_TOTAL: &str = "recordstore_notification_failures_total";

fn increment(name: &'static str, count: usize) {
    counter!(name).increment(u64::try_from(count).unwrap_or(u64::MAX));
}

pub fn records_written(count: usize) {
    increment(RECORDS_WRITTEN_TOTAL, count);
}

pub fn records_skipped(count: usize) {
    increment(RECORDS_SKIPPED_TOTAL, count);
}

pub fn record_deleted() {
    increment(RECORDS_DELETED_TOTAL, 1);
}

pub fn record_purged() {
    increment(RECORDS_PURGED_TOTAL, 1);
}

pub fn purge_rolled_back() {
    increment(PURGE_ROLLBACKS_TOTAL, 1);
}

pub fn bulk_update_locked(count: usize) {
    increment(BULK_UPDATE_LOCKED_TOTAL, count);
}

pub fn notification_failed(count: usize) {
    increment(NOTIFICATION_FAILURES_TOTAL, count);
}
