//! Database schema definitions.

/// SQL schema for the scan result database.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS channels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace INTEGER NOT NULL,
    transport_stream_id INTEGER NOT NULL,
    original_network_id INTEGER NOT NULL,
    orbital_position INTEGER NOT NULL DEFAULT 0,
    tuning_params TEXT NOT NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER DEFAULT (strftime('%s', 'now')),
    UNIQUE(namespace, transport_stream_id, original_network_id)
);

CREATE TABLE IF NOT EXISTS services (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace INTEGER NOT NULL,
    transport_stream_id INTEGER NOT NULL,
    original_network_id INTEGER NOT NULL,
    service_id INTEGER NOT NULL,
    service_type INTEGER NOT NULL,
    name TEXT,
    provider_name TEXT,
    ca_system_ids TEXT,
    hold_name INTEGER DEFAULT 0,
    no_sdt INTEGER DEFAULT 0,
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER DEFAULT (strftime('%s', 'now')),
    UNIQUE(namespace, transport_stream_id, original_network_id, service_id)
);

CREATE TABLE IF NOT EXISTS bouquets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS bouquet_services (
    bouquet_id INTEGER NOT NULL,
    namespace INTEGER NOT NULL,
    transport_stream_id INTEGER NOT NULL,
    original_network_id INTEGER NOT NULL,
    service_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    FOREIGN KEY(bouquet_id) REFERENCES bouquets(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_channels_namespace ON channels(namespace);
CREATE INDEX IF NOT EXISTS idx_channels_orbital_position ON channels(orbital_position);
CREATE INDEX IF NOT EXISTS idx_services_namespace ON services(namespace);
CREATE INDEX IF NOT EXISTS idx_services_channel ON services(namespace, transport_stream_id, original_network_id);
CREATE INDEX IF NOT EXISTS idx_bouquet_services_bouquet ON bouquet_services(bouquet_id);

CREATE TRIGGER IF NOT EXISTS channels_updated_at
AFTER UPDATE ON channels
BEGIN
    UPDATE channels SET updated_at = strftime('%s', 'now') WHERE id = NEW.id;
END;

CREATE TRIGGER IF NOT EXISTS services_updated_at
AFTER UPDATE ON services
BEGIN
    UPDATE services SET updated_at = strftime('%s', 'now') WHERE id = NEW.id;
END;
"#;

/// "Last Scanned" is recreated wholesale after every foreground scan, never
/// merged with a previous run's contents.
pub const LAST_SCANNED_BOUQUET_NAME: &str = "Last Scanned";

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn schema_creates_expected_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for name in ["channels", "services", "bouquets", "bouquet_services"] {
            assert!(tables.contains(&name.to_string()), "missing table {name}");
        }
    }
}
