//! Redb table definitions for persistent metadata storage.

use redb::TableDefinition;

// Key: record id, Value: bincode-encoded RecordMetadata
pub const RECORD_METADATA: TableDefinition<&str, &[u8]> = TableDefinition::new("record_metadata");
