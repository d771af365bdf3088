use crate::error::{Result, StoreError};
use crate::{Db, Host, HostId, HostService, HostServiceId, NewHost, ServiceId};
use rusqlite::params;
use time::OffsetDateTime;
use vigil_core::{clock, Schedule, ServiceKind, Status};

impl Db {
    /// Inserts the host together with its default HTTP binding (inactive, every
    /// 3 minutes, pending). Either both rows commit or neither does.
    pub fn insert_host(&self, host: &NewHost) -> Result<HostId> {
        let mut conn = self.conn()?;
        let now = clock::to_ms(clock::now());
        let schedule = Schedule::default();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO hosts(host_name,canonical_name,url,ip,ipv6,location,os,active,created_at,updated_at) VALUES (?,?,?,?,?,?,?,?,?,?)",
            params![host.host_name, host.canonical_name, host.url, host.ip, host.ipv6, host.location, host.os, host.active, now, now],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO host_services(host_id,service_id,active,schedule_number,schedule_unit,last_check,status,created_at,updated_at) VALUES (?,?,0,?,?,?,?,?,?)",
            params![id, ServiceKind::Http.id(), schedule.number, schedule.unit.code(), now, Status::Pending.as_str(), now, now],
        )?;
        tx.commit()?;
        tracing::debug!(host_id = id, host = %host.host_name, "host inserted with default binding");
        Ok(id)
    }

    /// Adds a further binding for an existing host, inactive and pending.
    pub fn insert_host_service(&self, host_id: HostId, kind: ServiceKind, schedule: Schedule) -> Result<HostServiceId> {
        let conn = self.conn()?;
        let now = clock::to_ms(clock::now());
        let host_exists: i64 = conn.query_row("SELECT COUNT(1) FROM hosts WHERE id=?", [host_id], |r| r.get(0))?;
        if host_exists == 0 {
            return Err(StoreError::NotFound { entity: "host", id: host_id });
        }
        conn.execute(
            "INSERT INTO host_services(host_id,service_id,active,schedule_number,schedule_unit,last_check,status,created_at,updated_at) VALUES (?,?,0,?,?,?,?,?,?)",
            params![host_id, kind.id(), schedule.number, schedule.unit.code(), now, Status::Pending.as_str(), now, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_host(&self, host: &Host) -> Result<()> {
        let conn = self.conn()?;
        let now = clock::to_ms(clock::now());
        let n = conn.execute(
            "UPDATE hosts SET host_name=?, canonical_name=?, url=?, ip=?, ipv6=?, location=?, os=?, active=?, updated_at=MAX(updated_at, ?) WHERE id=?",
            params![host.host_name, host.canonical_name, host.url, host.ip, host.ipv6, host.location, host.os, host.active, now, host.id],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound { entity: "host", id: host.id });
        }
        Ok(())
    }

    /// Full-row update of a binding. `last_check` and `updated_at` never move backwards.
    pub fn update_host_service(&self, hs: &HostService) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE host_services SET host_id=?, service_id=?, active=?, schedule_number=?, schedule_unit=?,
             last_check=MAX(last_check, ?), status=?, updated_at=MAX(updated_at, ?) WHERE id=?",
            params![
                hs.host_id,
                hs.service_id,
                hs.active,
                hs.schedule.number,
                hs.schedule.unit.code(),
                clock::to_ms(hs.last_check),
                hs.status.as_str(),
                clock::to_ms(hs.updated_at),
                hs.id
            ],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound { entity: "host service", id: hs.id });
        }
        Ok(())
    }

    /// Persists a check result. Only `status`, `last_check` and `updated_at` are written.
    pub fn record_check(&self, id: HostServiceId, status: Status, at: OffsetDateTime) -> Result<()> {
        let conn = self.conn()?;
        let at = clock::to_ms(at);
        let n = conn.execute(
            "UPDATE host_services SET status=?, last_check=MAX(last_check, ?), updated_at=MAX(updated_at, ?) WHERE id=?",
            params![status.as_str(), at, at, id],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound { entity: "host service", id });
        }
        Ok(())
    }

    /// Toggles only the active flag of the (host, service) binding.
    pub fn update_host_service_status(&self, host_id: HostId, service_id: ServiceId, active: bool) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE host_services SET active=? WHERE host_id=? AND service_id=?",
            params![active, host_id, service_id],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound { entity: "host service for host", id: host_id });
        }
        Ok(())
    }
}
