use crate::error::{Result, StoreError};
use crate::{Db, Host, HostId, HostService, HostServiceId, Service, ServiceStatusRow, StatusCounts};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use std::str::FromStr;
use vigil_core::{clock, Schedule, Status};

const HOST_COLUMNS: &str =
    "h.id, h.host_name, h.canonical_name, h.url, h.ip, h.ipv6, h.location, h.os, h.active, h.created_at, h.updated_at";

const HOST_SERVICE_COLUMNS: &str = "hs.id, hs.host_id, hs.service_id, hs.active, hs.schedule_number, hs.schedule_unit,
     hs.last_check, hs.status, hs.created_at, hs.updated_at,
     s.id, s.service_name, s.active, s.icon, s.created_at, s.updated_at";

impl Db {
    pub fn get_host_by_id(&self, id: HostId) -> Result<Host> {
        let conn = self.conn()?;
        let mut host = conn
            .query_row(&format!("SELECT {HOST_COLUMNS} FROM hosts h WHERE h.id = ?"), [id], host_from_row)
            .optional()?
            .ok_or(StoreError::NotFound { entity: "host", id })?;
        host.host_services = services_for_host(&conn, id)?;
        Ok(host)
    }

    /// All hosts ordered by id, each with its bindings. One binding query per host.
    pub fn get_all_hosts(&self) -> Result<Vec<Host>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {HOST_COLUMNS} FROM hosts h ORDER BY h.id"))?;
        let mut hosts = stmt.query_map([], host_from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        for host in &mut hosts {
            host.host_services = services_for_host(&conn, host.id)?;
        }
        Ok(hosts)
    }

    pub fn get_host_service_by_id(&self, id: HostServiceId) -> Result<HostService> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {HOST_SERVICE_COLUMNS} FROM host_services hs JOIN services s ON s.id = hs.service_id WHERE hs.id = ?"),
            [id],
            |r| host_service_from_row(r, 0),
        )
        .optional()?
        .ok_or(StoreError::NotFound { entity: "host service", id })
    }

    /// Active bindings in `status`, ordered by host name then service name.
    pub fn get_services_by_status(&self, status: Status) -> Result<Vec<ServiceStatusRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {HOST_SERVICE_COLUMNS}, h.host_name
             FROM host_services hs
             JOIN hosts h ON h.id = hs.host_id
             JOIN services s ON s.id = hs.service_id
             WHERE hs.status = ? AND hs.active = 1
             ORDER BY h.host_name, s.service_name"
        ))?;
        let rows = stmt
            .query_map([status.as_str()], |r| {
                let host_service = host_service_from_row(r, 0)?;
                Ok(ServiceStatusRow {
                    host_name: r.get(16)?,
                    service_name: host_service.service.service_name.clone(),
                    host_service,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Counts of active bindings per status, in a single query.
    pub fn get_all_service_status_counts(&self) -> Result<StatusCounts> {
        let conn = self.conn()?;
        let counts = conn.query_row(
            "SELECT
               COALESCE(SUM(status = 'pending'), 0),
               COALESCE(SUM(status = 'healthy'), 0),
               COALESCE(SUM(status = 'warning'), 0),
               COALESCE(SUM(status = 'problem'), 0)
             FROM host_services WHERE active = 1",
            [],
            |r| Ok(StatusCounts { pending: r.get(0)?, healthy: r.get(1)?, warning: r.get(2)?, problem: r.get(3)? }),
        )?;
        Ok(counts)
    }

    pub fn get_all_services(&self) -> Result<Vec<Service>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.id, s.service_name, s.active, s.icon, s.created_at, s.updated_at FROM services s ORDER BY s.id",
        )?;
        let services = stmt.query_map([], |r| service_from_row(r, 0))?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(services)
    }
}

fn services_for_host(conn: &Connection, host_id: HostId) -> Result<Vec<HostService>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {HOST_SERVICE_COLUMNS} FROM host_services hs JOIN services s ON s.id = hs.service_id
         WHERE hs.host_id = ? ORDER BY hs.id"
    ))?;
    let rows = stmt.query_map([host_id], |r| host_service_from_row(r, 0))?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn host_from_row(r: &Row) -> rusqlite::Result<Host> {
    Ok(Host {
        id: r.get(0)?,
        host_name: r.get(1)?,
        canonical_name: r.get(2)?,
        url: r.get(3)?,
        ip: r.get(4)?,
        ipv6: r.get(5)?,
        location: r.get(6)?,
        os: r.get(7)?,
        active: r.get(8)?,
        created_at: clock::from_ms(r.get(9)?),
        updated_at: clock::from_ms(r.get(10)?),
        host_services: Vec::new(),
    })
}

fn service_from_row(r: &Row, at: usize) -> rusqlite::Result<Service> {
    Ok(Service {
        id: r.get(at)?,
        service_name: r.get(at + 1)?,
        active: r.get(at + 2)?,
        icon: r.get(at + 3)?,
        created_at: clock::from_ms(r.get(at + 4)?),
        updated_at: clock::from_ms(r.get(at + 5)?),
    })
}

fn host_service_from_row(r: &Row, at: usize) -> rusqlite::Result<HostService> {
    Ok(HostService {
        id: r.get(at)?,
        host_id: r.get(at + 1)?,
        service_id: r.get(at + 2)?,
        active: r.get(at + 3)?,
        schedule: Schedule { number: r.get(at + 4)?, unit: parse_text(r, at + 5)? },
        last_check: clock::from_ms(r.get(at + 6)?),
        status: parse_text(r, at + 7)?,
        created_at: clock::from_ms(r.get(at + 8)?),
        updated_at: clock::from_ms(r.get(at + 9)?),
        service: service_from_row(r, at + 10)?,
    })
}

/// Reads a text column into one of the closed enums, rejecting anything else.
fn parse_text<T>(r: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = r.get(idx)?;
    raw.parse().map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
