//! `Database`: the `rusqlite`-backed implementation of
//! `dvb_scan_core::scan::ChannelDatabase`.

use crate::error::{DatabaseError, Result};
use crate::models::ExistingService;
use crate::schema::{LAST_SCANNED_BOUQUET_NAME, SCHEMA_SQL};
use dvb_scan_core::ident::{ChannelId, ServiceRef};
use dvb_scan_core::scan::ChannelDatabase;
use dvb_scan_core::service::Service;
use dvb_scan_core::tuning::TuningParams;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error as StdError;
use std::path::Path;

/// SQLite connection plus the scan-result schema.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn existing_service(&self, service_ref: &ServiceRef) -> Result<Option<ExistingService>> {
        let chid = service_ref.channel;
        self.conn
            .query_row(
                "SELECT name, hold_name, no_sdt FROM services
                 WHERE namespace = ?1 AND transport_stream_id = ?2 AND original_network_id = ?3 AND service_id = ?4",
                params![chid.namespace, chid.transport_stream_id, chid.original_network_id, service_ref.service_id],
                |row| {
                    Ok(ExistingService {
                        name: row.get(0)?,
                        hold_name: row.get::<_, i64>(1)? != 0,
                        no_sdt: row.get::<_, i64>(2)? != 0,
                    })
                },
            )
            .optional()
            .map_err(DatabaseError::from)
    }

    fn get_or_create_bouquet(&self, name: &str) -> Result<i64> {
        self.conn.execute("INSERT OR IGNORE INTO bouquets (name) VALUES (?1)", params![name])?;
        let id = self.conn.query_row("SELECT id FROM bouquets WHERE name = ?1", params![name], |row| row.get(0))?;
        Ok(id)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl ChannelDatabase for Database {
    fn add_channel(&mut self, id: ChannelId, params_: &TuningParams) -> std::result::Result<(), Box<dyn StdError>> {
        let serialized = serde_json::to_string(params_).map_err(DatabaseError::from)?;
        self.conn.execute(
            "INSERT INTO channels (namespace, transport_stream_id, original_network_id, orbital_position, tuning_params)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(namespace, transport_stream_id, original_network_id)
             DO UPDATE SET orbital_position = excluded.orbital_position, tuning_params = excluded.tuning_params",
            params![id.namespace, id.transport_stream_id, id.original_network_id, params_.orbital_position(), serialized],
        )
        .map_err(DatabaseError::from)?;
        Ok(())
    }

    fn add_service(&mut self, service_ref: ServiceRef, service: &Service) -> std::result::Result<(), Box<dyn StdError>> {
        let existing = self.existing_service(&service_ref)?;
        if let Some(existing) = &existing {
            if existing.no_sdt {
                return Ok(());
            }
        }

        let name = match &existing {
            Some(existing) if existing.hold_name => existing.name.clone(),
            _ => service.name.clone(),
        };
        let hold_name = existing.as_ref().map(|e| e.hold_name).unwrap_or(service.hold_name);
        let no_sdt = existing.as_ref().map(|e| e.no_sdt).unwrap_or(service.no_sdt);
        let ca_system_ids = serde_json::to_string(&service.ca_system_ids).map_err(DatabaseError::from)?;

        let chid = service_ref.channel;
        self.conn.execute(
            "INSERT INTO services (
                namespace, transport_stream_id, original_network_id, service_id,
                service_type, name, provider_name, ca_system_ids, hold_name, no_sdt
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(namespace, transport_stream_id, original_network_id, service_id) DO UPDATE SET
                service_type = excluded.service_type,
                name = excluded.name,
                provider_name = excluded.provider_name,
                ca_system_ids = excluded.ca_system_ids,
                hold_name = excluded.hold_name,
                no_sdt = excluded.no_sdt",
            params![
                chid.namespace,
                chid.transport_stream_id,
                chid.original_network_id,
                service_ref.service_id,
                service_ref.service_type as i64,
                name,
                service.provider_name,
                ca_system_ids,
                hold_name as i64,
                no_sdt as i64,
            ],
        )
        .map_err(DatabaseError::from)?;
        Ok(())
    }

    fn remove_services_by_namespace_prefix(&mut self, namespace_high16: u16) -> std::result::Result<(), Box<dyn StdError>> {
        self.conn
            .execute("DELETE FROM services WHERE (namespace >> 16) = ?1", params![namespace_high16 as i64])
            .map_err(DatabaseError::from)?;
        Ok(())
    }

    fn remove_services_by_orbital_position(&mut self, orbital_position: u16) -> std::result::Result<(), Box<dyn StdError>> {
        self.conn
            .execute(
                "DELETE FROM services WHERE (namespace, transport_stream_id, original_network_id) IN (
                    SELECT namespace, transport_stream_id, original_network_id FROM channels WHERE orbital_position = ?1
                )",
                params![orbital_position],
            )
            .map_err(DatabaseError::from)?;
        Ok(())
    }

    fn remove_services_exact_channel(&mut self, id: ChannelId) -> std::result::Result<(), Box<dyn StdError>> {
        self.conn
            .execute(
                "DELETE FROM services WHERE namespace = ?1 AND transport_stream_id = ?2 AND original_network_id = ?3",
                params![id.namespace, id.transport_stream_id, id.original_network_id],
            )
            .map_err(DatabaseError::from)?;
        Ok(())
    }

    fn set_last_scanned_bouquet(&mut self, services: &[ServiceRef]) -> std::result::Result<(), Box<dyn StdError>> {
        let bouquet_id = self.get_or_create_bouquet(LAST_SCANNED_BOUQUET_NAME)?;
        let tx = self.conn.transaction().map_err(DatabaseError::from)?;
        tx.execute("DELETE FROM bouquet_services WHERE bouquet_id = ?1", params![bouquet_id])
            .map_err(DatabaseError::from)?;
        for (position, service_ref) in services.iter().enumerate() {
            let chid = service_ref.channel;
            tx.execute(
                "INSERT INTO bouquet_services (bouquet_id, namespace, transport_stream_id, original_network_id, service_id, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![bouquet_id, chid.namespace, chid.transport_stream_id, chid.original_network_id, service_ref.service_id, position as i64],
            )
            .map_err(DatabaseError::from)?;
        }
        tx.commit().map_err(DatabaseError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvb_scan_core::tuning::{CableParams, FecInner, Modulation};

    fn cable_channel(ns: u32, tsid: u16, onid: u16) -> (ChannelId, TuningParams) {
        (
            ChannelId::new(ns, tsid, onid),
            TuningParams::Cable(CableParams { frequency: 123_000_000, symbol_rate: 6900, fec_inner: FecInner::Auto, modulation: Modulation::Auto }),
        )
    }

    fn svc(ns: u32, tsid: u16, onid: u16, sid: u16, service_type: u8) -> ServiceRef {
        ServiceRef { channel: ChannelId::new(ns, tsid, onid), service_id: sid, service_type }
    }

    #[test]
    fn add_channel_then_add_service_roundtrips() {
        let mut db = Database::open_in_memory().unwrap();
        let (id, params) = cable_channel(0xFFFF0000, 1, 7);
        db.add_channel(id, &params).unwrap();

        let service_ref = svc(0xFFFF0000, 1, 7, 100, 1);
        let service = Service { name: "NHK".into(), provider_name: "NHK".into(), ca_system_ids: vec![], new_found: true, hold_name: false, no_sdt: false };
        db.add_service(service_ref, &service).unwrap();

        let name: String = db
            .connection()
            .query_row("SELECT name FROM services WHERE service_id = 100", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "NHK");
    }

    #[test]
    fn hold_name_preserves_name_across_rescans() {
        let mut db = Database::open_in_memory().unwrap();
        let service_ref = svc(0xFFFF0000, 1, 7, 100, 1);

        let first = Service { name: "Old Name".into(), provider_name: "P".into(), ca_system_ids: vec![], new_found: true, hold_name: true, no_sdt: false };
        db.add_service(service_ref, &first).unwrap();

        let second = Service { name: "New Name".into(), provider_name: "P".into(), ca_system_ids: vec![], new_found: true, hold_name: false, no_sdt: false };
        db.add_service(service_ref, &second).unwrap();

        let name: String = db
            .connection()
            .query_row("SELECT name FROM services WHERE service_id = 100", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "Old Name");
    }

    #[test]
    fn no_sdt_service_is_never_overwritten() {
        let mut db = Database::open_in_memory().unwrap();
        let service_ref = svc(0xFFFF0000, 1, 7, 100, 1);

        let first = Service { name: "Frozen".into(), provider_name: "P".into(), ca_system_ids: vec![], new_found: true, hold_name: false, no_sdt: true };
        db.add_service(service_ref, &first).unwrap();

        let second = Service { name: "Overwrite Attempt".into(), provider_name: "Q".into(), ca_system_ids: vec![1234], new_found: true, hold_name: false, no_sdt: false };
        db.add_service(service_ref, &second).unwrap();

        let (name, provider): (String, String) = db
            .connection()
            .query_row("SELECT name, provider_name FROM services WHERE service_id = 100", [], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap();
        assert_eq!(name, "Frozen");
        assert_eq!(provider, "P");
    }

    #[test]
    fn remove_services_by_namespace_prefix_matches_high_bits() {
        let mut db = Database::open_in_memory().unwrap();
        let cable = svc(0xFFFF0000, 1, 7, 100, 1);
        let satellite = svc(0x00C00000, 2, 9, 200, 1);
        let service = Service::default();
        db.add_service(cable, &service).unwrap();
        db.add_service(satellite, &service).unwrap();

        db.remove_services_by_namespace_prefix(0xFFFF).unwrap();

        let count: i64 = db.connection().query_row("SELECT COUNT(*) FROM services", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn remove_services_by_orbital_position_ignores_namespace() {
        let mut db = Database::open_in_memory().unwrap();
        let (id_a, params_a) = (ChannelId::new(0x00C00000, 1, 7), TuningParams::Cable(CableParams { frequency: 1, symbol_rate: 1, fec_inner: FecInner::Auto, modulation: Modulation::Auto }));
        let (id_b, params_b) = (ChannelId::new(0x40C00000, 2, 9), TuningParams::Cable(CableParams { frequency: 1, symbol_rate: 1, fec_inner: FecInner::Auto, modulation: Modulation::Auto }));
        db.add_channel(id_a, &params_a).unwrap();
        db.add_channel(id_b, &params_b).unwrap();
        // Both namespaces have a different high-16 (0x00C0 vs 0x40C0) but the
        // same underlying orbital position once the polarization XOR is
        // accounted for; emulate that by forcing both rows to the same
        // orbital_position directly.
        db.connection().execute("UPDATE channels SET orbital_position = 192", []).unwrap();

        let svc_a = svc(0x00C00000, 1, 7, 100, 1);
        let svc_b = svc(0x40C00000, 2, 9, 200, 1);
        let service = Service::default();
        db.add_service(svc_a, &service).unwrap();
        db.add_service(svc_b, &service).unwrap();

        db.remove_services_by_orbital_position(192).unwrap();

        let count: i64 = db.connection().query_row("SELECT COUNT(*) FROM services", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn set_last_scanned_bouquet_recreates_wholesale() {
        let mut db = Database::open_in_memory().unwrap();
        let a = svc(0xFFFF0000, 1, 7, 100, 1);
        let b = svc(0xFFFF0000, 1, 7, 101, 1);
        db.set_last_scanned_bouquet(&[a]).unwrap();
        db.set_last_scanned_bouquet(&[a, b]).unwrap();

        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM bouquet_services", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
