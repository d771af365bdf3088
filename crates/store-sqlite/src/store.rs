use crate::error::Result;
use crate::{Db, Host, HostId, HostService, HostServiceId, NewHost, Service, ServiceId, ServiceStatusRow, StatusCounts};
use time::OffsetDateTime;
use vigil_core::{Schedule, ServiceKind, Status};

/// Storage capabilities the dispatcher and aggregator are built against.
pub trait HostStore: Send + Sync {
    fn insert_host(&self, host: &NewHost) -> Result<HostId>;
    fn insert_host_service(&self, host_id: HostId, kind: ServiceKind, schedule: Schedule) -> Result<HostServiceId>;
    fn get_host_by_id(&self, id: HostId) -> Result<Host>;
    fn get_all_hosts(&self) -> Result<Vec<Host>>;
    fn update_host(&self, host: &Host) -> Result<()>;
    fn update_host_service(&self, hs: &HostService) -> Result<()>;
    fn record_check(&self, id: HostServiceId, status: Status, at: OffsetDateTime) -> Result<()>;
    fn update_host_service_status(&self, host_id: HostId, service_id: ServiceId, active: bool) -> Result<()>;
    fn get_host_service_by_id(&self, id: HostServiceId) -> Result<HostService>;
    fn get_services_by_status(&self, status: Status) -> Result<Vec<ServiceStatusRow>>;
    fn get_all_service_status_counts(&self) -> Result<StatusCounts>;
    fn get_all_services(&self) -> Result<Vec<Service>>;
}

impl HostStore for Db {
    fn insert_host(&self, host: &NewHost) -> Result<HostId> {
        Db::insert_host(self, host)
    }

    fn insert_host_service(&self, host_id: HostId, kind: ServiceKind, schedule: Schedule) -> Result<HostServiceId> {
        Db::insert_host_service(self, host_id, kind, schedule)
    }

    fn get_host_by_id(&self, id: HostId) -> Result<Host> {
        Db::get_host_by_id(self, id)
    }

    fn get_all_hosts(&self) -> Result<Vec<Host>> {
        Db::get_all_hosts(self)
    }

    fn update_host(&self, host: &Host) -> Result<()> {
        Db::update_host(self, host)
    }

    fn update_host_service(&self, hs: &HostService) -> Result<()> {
        Db::update_host_service(self, hs)
    }

    fn record_check(&self, id: HostServiceId, status: Status, at: OffsetDateTime) -> Result<()> {
        Db::record_check(self, id, status, at)
    }

    fn update_host_service_status(&self, host_id: HostId, service_id: ServiceId, active: bool) -> Result<()> {
        Db::update_host_service_status(self, host_id, service_id, active)
    }

    fn get_host_service_by_id(&self, id: HostServiceId) -> Result<HostService> {
        Db::get_host_service_by_id(self, id)
    }

    fn get_services_by_status(&self, status: Status) -> Result<Vec<ServiceStatusRow>> {
        Db::get_services_by_status(self, status)
    }

    fn get_all_service_status_counts(&self) -> Result<StatusCounts> {
        Db::get_all_service_status_counts(self)
    }

    fn get_all_services(&self) -> Result<Vec<Service>> {
        Db::get_all_services(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;
    use vigil_core::{clock, ScheduleUnit};

    fn host(name: &str) -> NewHost {
        NewHost { host_name: name.into(), url: format!("http://{name}.example"), active: true, ..Default::default() }
    }

    fn set_status(db: &Db, id: HostServiceId, status: Status, active: bool) {
        let mut hs = db.get_host_service_by_id(id).unwrap();
        hs.status = status;
        hs.active = active;
        db.update_host_service(&hs).unwrap();
    }

    #[test]
    fn insert_host_creates_default_binding() {
        let db = Db::open_in_memory().unwrap();
        let id = db.insert_host(&host("alpha")).unwrap();
        let h = db.get_host_by_id(id).unwrap();
        assert_eq!(h.host_services.len(), 1);
        let hs = &h.host_services[0];
        assert_eq!(hs.status, Status::Pending);
        assert!(!hs.active);
        assert_eq!(hs.service_id, ServiceKind::Http.id());
        assert_eq!(hs.schedule, Schedule { number: 3, unit: ScheduleUnit::Minutes });
        assert_eq!(hs.service.service_name, "HTTP");
    }

    #[test]
    fn failed_binding_insert_rolls_back_host() {
        let db = Db::open_in_memory().unwrap();
        db.conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_bindings BEFORE INSERT ON host_services BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        assert!(db.insert_host(&host("beta")).is_err());
        assert!(db.get_all_hosts().unwrap().is_empty());
    }

    #[test]
    fn lookups_report_not_found() {
        let db = Db::open_in_memory().unwrap();
        assert!(db.get_host_by_id(42).unwrap_err().is_not_found());
        assert!(db.get_host_service_by_id(42).unwrap_err().is_not_found());
        assert!(db.update_host_service_status(42, 1, true).unwrap_err().is_not_found());
        assert!(db.insert_host_service(42, ServiceKind::Https, Schedule::default()).unwrap_err().is_not_found());
    }

    #[test]
    fn all_hosts_ordered_by_id_with_bindings() {
        let db = Db::open_in_memory().unwrap();
        let b = db.insert_host(&host("zulu")).unwrap();
        let a = db.insert_host(&host("alpha")).unwrap();
        db.insert_host_service(b, ServiceKind::Https, Schedule::default()).unwrap();
        let hosts = db.get_all_hosts().unwrap();
        assert_eq!(hosts.iter().map(|h| h.id).collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(hosts[0].host_services.len(), 2);
        assert_eq!(hosts[1].host_services.len(), 1);
    }

    #[test]
    fn duplicate_binding_is_rejected() {
        let db = Db::open_in_memory().unwrap();
        let id = db.insert_host(&host("alpha")).unwrap();
        assert!(matches!(
            db.insert_host_service(id, ServiceKind::Http, Schedule::default()),
            Err(StoreError::Sqlite(_))
        ));
    }

    #[test]
    fn toggle_changes_only_active_flag() {
        let db = Db::open_in_memory().unwrap();
        let id = db.insert_host(&host("alpha")).unwrap();
        let before = db.get_host_by_id(id).unwrap().host_services.remove(0);
        db.update_host_service_status(id, ServiceKind::Http.id(), true).unwrap();
        let after = db.get_host_service_by_id(before.id).unwrap();
        assert!(after.active);
        assert_eq!(after.status, before.status);
        assert_eq!(after.updated_at, before.updated_at);
        assert_eq!(after.schedule, before.schedule);
    }

    #[test]
    fn update_host_rewrites_mutable_fields() {
        let db = Db::open_in_memory().unwrap();
        let id = db.insert_host(&host("alpha")).unwrap();
        let mut h = db.get_host_by_id(id).unwrap();
        h.os = "linux".into();
        h.location = "rack 4".into();
        h.active = false;
        db.update_host(&h).unwrap();
        let back = db.get_host_by_id(id).unwrap();
        assert_eq!(back.os, "linux");
        assert_eq!(back.location, "rack 4");
        assert!(!back.active);
        assert!(back.updated_at >= h.updated_at);
    }

    #[test]
    fn check_timestamps_never_move_backwards() {
        let db = Db::open_in_memory().unwrap();
        let id = db.insert_host(&host("alpha")).unwrap();
        let mut hs = db.get_host_by_id(id).unwrap().host_services.remove(0);
        let original = hs.last_check;
        let original_updated = hs.updated_at;
        hs.last_check = clock::from_ms(0);
        hs.updated_at = clock::from_ms(0);
        hs.status = Status::Warning;
        db.update_host_service(&hs).unwrap();
        let back = db.get_host_service_by_id(hs.id).unwrap();
        assert_eq!(back.status, Status::Warning);
        assert_eq!(back.last_check, original);
        assert!(back.updated_at >= original_updated);

        db.record_check(hs.id, Status::Healthy, clock::from_ms(0)).unwrap();
        let back = db.get_host_service_by_id(hs.id).unwrap();
        assert_eq!(back.status, Status::Healthy);
        assert_eq!(back.last_check, original);
        assert!(back.updated_at >= original_updated);
    }

    #[test]
    fn record_check_leaves_admin_fields_alone() {
        let db = Db::open_in_memory().unwrap();
        let id = db.insert_host(&host("alpha")).unwrap();
        let hs = db.get_host_by_id(id).unwrap().host_services.remove(0);
        db.update_host_service_status(id, ServiceKind::Http.id(), true).unwrap();

        let at = clock::now();
        db.record_check(hs.id, Status::Problem, at).unwrap();
        let back = db.get_host_service_by_id(hs.id).unwrap();
        assert!(back.active);
        assert_eq!(back.schedule, hs.schedule);
        assert_eq!(back.status, Status::Problem);
        assert_eq!(back.last_check, clock::from_ms(clock::to_ms(at)));
        assert!(db.record_check(hs.id + 100, Status::Healthy, at).unwrap_err().is_not_found());
    }

    #[test]
    fn held_connection_times_out_instead_of_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open_or_create(dir.path().join("vigil.db"), std::time::Duration::from_millis(50)).unwrap();
        let id = db.insert_host(&host("alpha")).unwrap();
        let held = db.conn().unwrap();
        assert!(matches!(db.get_host_by_id(id), Err(StoreError::Timeout(_))));
        drop(held);
        assert!(db.get_host_by_id(id).is_ok());
    }

    #[test]
    fn unknown_status_on_disk_is_rejected() {
        let db = Db::open_in_memory().unwrap();
        let id = db.insert_host(&host("alpha")).unwrap();
        let hs_id = db.get_host_by_id(id).unwrap().host_services[0].id;
        // the CHECK constraint refuses the write outright
        let res = db.conn().unwrap().execute("UPDATE host_services SET status='down' WHERE id=?", [hs_id]);
        assert!(res.is_err());
        assert_eq!(db.get_host_service_by_id(hs_id).unwrap().status, Status::Pending);
    }

    #[test]
    fn services_by_status_filters_active_and_sorts() {
        let db = Db::open_in_memory().unwrap();
        let zulu = db.insert_host(&host("zulu")).unwrap();
        let alpha = db.insert_host(&host("alpha")).unwrap();
        let mike = db.insert_host(&host("mike")).unwrap();
        let zulu_https = db.insert_host_service(zulu, ServiceKind::Https, Schedule::default()).unwrap();
        let default_of = |h: HostId| db.get_host_by_id(h).unwrap().host_services[0].id;

        set_status(&db, default_of(zulu), Status::Healthy, true);
        set_status(&db, zulu_https, Status::Healthy, true);
        set_status(&db, default_of(alpha), Status::Healthy, true);
        set_status(&db, default_of(mike), Status::Healthy, false);

        let rows = db.get_services_by_status(Status::Healthy).unwrap();
        let got: Vec<(&str, &str)> = rows.iter().map(|r| (r.host_name.as_str(), r.service_name.as_str())).collect();
        assert_eq!(got, vec![("alpha", "HTTP"), ("zulu", "HTTP"), ("zulu", "HTTPS")]);
        assert!(rows.iter().all(|r| r.host_service.active && r.host_service.status == Status::Healthy));
        assert!(db.get_services_by_status(Status::Problem).unwrap().is_empty());
    }

    #[test]
    fn status_counts_cover_every_active_binding() {
        let db = Db::open_in_memory().unwrap();
        assert_eq!(db.get_all_service_status_counts().unwrap(), StatusCounts::default());

        let statuses = [Status::Pending, Status::Healthy, Status::Healthy, Status::Warning, Status::Problem];
        for (i, status) in statuses.iter().enumerate() {
            let id = db.insert_host(&host(&format!("h{i}"))).unwrap();
            let hs = db.get_host_by_id(id).unwrap().host_services[0].id;
            set_status(&db, hs, *status, true);
        }
        // inactive bindings are not counted
        let idle = db.insert_host(&host("idle")).unwrap();
        db.insert_host_service(idle, ServiceKind::SslCertificate, Schedule::default()).unwrap();

        let counts = db.get_all_service_status_counts().unwrap();
        assert_eq!(counts, StatusCounts { pending: 1, healthy: 2, warning: 1, problem: 1 });
        let active_rows: i64 = db
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(1) FROM host_services WHERE active = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(counts.total(), active_rows);
    }

    #[test]
    fn service_catalogue_is_seeded() {
        let db = Db::open_in_memory().unwrap();
        let services = db.get_all_services().unwrap();
        let kinds: Vec<_> = services.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![Some(ServiceKind::Http), Some(ServiceKind::Https), Some(ServiceKind::SslCertificate)]);
    }

    #[test]
    fn reopening_a_file_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.db");
        let id = {
            let db = Db::open_or_create(&path, std::time::Duration::from_secs(1)).unwrap();
            db.insert_host(&host("alpha")).unwrap()
        };
        let db = Db::open_or_create(&path, std::time::Duration::from_secs(1)).unwrap();
        assert_eq!(db.get_host_by_id(id).unwrap().host_name, "alpha");
        assert_eq!(db.get_all_services().unwrap().len(), 3);
    }

    #[test]
    fn host_serializes_timestamps_as_rfc3339() {
        let db = Db::open_in_memory().unwrap();
        let id = db.insert_host(&host("alpha")).unwrap();
        let v = serde_json::to_value(db.get_host_by_id(id).unwrap()).unwrap();
        assert!(v["created_at"].as_str().unwrap().contains('T'));
        assert_eq!(v["host_services"][0]["status"], "pending");
    }
}
