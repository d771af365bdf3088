pub const MIG_0001_INIT: &str = r#"
BEGIN;

CREATE TABLE hosts (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  host_name       TEXT NOT NULL,
  canonical_name  TEXT NOT NULL DEFAULT '',
  url             TEXT NOT NULL DEFAULT '',
  ip              TEXT NOT NULL DEFAULT '',
  ipv6            TEXT NOT NULL DEFAULT '',
  location        TEXT NOT NULL DEFAULT '',
  os              TEXT NOT NULL DEFAULT '',
  active          INTEGER NOT NULL DEFAULT 1 CHECK (active IN (0,1)),
  created_at      INTEGER NOT NULL,
  updated_at      INTEGER NOT NULL
);

CREATE TABLE services (
  id              INTEGER PRIMARY KEY,
  service_name    TEXT NOT NULL UNIQUE,
  active          INTEGER NOT NULL DEFAULT 1 CHECK (active IN (0,1)),
  icon            TEXT NOT NULL DEFAULT '',
  created_at      INTEGER NOT NULL,
  updated_at      INTEGER NOT NULL
);

CREATE TABLE host_services (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  host_id         INTEGER NOT NULL REFERENCES hosts(id),
  service_id      INTEGER NOT NULL REFERENCES services(id),
  active          INTEGER NOT NULL DEFAULT 0 CHECK (active IN (0,1)),
  schedule_number INTEGER NOT NULL CHECK (schedule_number > 0),
  schedule_unit   TEXT NOT NULL CHECK (schedule_unit IN ('s','m','h','d')),
  last_check      INTEGER NOT NULL,
  status          TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending','healthy','warning','problem')),
  created_at      INTEGER NOT NULL,
  updated_at      INTEGER NOT NULL,
  UNIQUE (host_id, service_id)
);

INSERT INTO services (id, service_name, active, icon, created_at, updated_at) VALUES
  (1, 'HTTP', 1, 'fas fa-server', CAST(strftime('%s','now') AS INTEGER) * 1000, CAST(strftime('%s','now') AS INTEGER) * 1000),
  (2, 'HTTPS', 1, 'fas fa-lock', CAST(strftime('%s','now') AS INTEGER) * 1000, CAST(strftime('%s','now') AS INTEGER) * 1000),
  (3, 'SSL Certificate', 1, 'fas fa-certificate', CAST(strftime('%s','now') AS INTEGER) * 1000, CAST(strftime('%s','now') AS INTEGER) * 1000);

CREATE INDEX idx_host_services_host ON host_services(host_id);
CREATE INDEX idx_host_services_status ON host_services(active, status);
CREATE INDEX idx_hosts_name ON hosts(host_name);

COMMIT;
"#
;
