//! Redb table definitions for version payloads.

use redb::TableDefinition;

// Key: version path, Value: JSON-encoded RecordData
pub const RECORD_VERSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("record_versions");
