pub const SCHEMA: &[&str] = &[
    r#"
CREATE EXTENSION IF NOT EXISTS postgis;
"#,
    r#"
CREATE TABLE IF NOT EXISTS alerts (
    id uuid PRIMARY KEY,
    title text NOT NULL,
    description text NOT NULL,
    alert_type text NOT NULL,
    severity text NOT NULL,
    lng float8 NOT NULL CHECK (lng BETWEEN -180 AND 180),
    lat float8 NOT NULL CHECK (lat BETWEEN -90 AND 90),
    address text NOT NULL,
    geog geography(Point, 4326) GENERATED ALWAYS AS (ST_SetSRID(ST_MakePoint(lng, lat), 4326)::geography) STORED,
    status text NOT NULL DEFAULT 'Active',
    created_by text NOT NULL,
    version int8 NOT NULL DEFAULT 1,
    created_at timestamptz NOT NULL,
    updated_at timestamptz NOT NULL
);
"#,
    r#"
CREATE INDEX IF NOT EXISTS alerts_geog_idx ON alerts USING GIST (geog);
"#,
    r#"
CREATE INDEX IF NOT EXISTS alerts_created_at_idx ON alerts (created_at DESC);
"#,
    r#"
CREATE TABLE IF NOT EXISTS resources (
    id uuid PRIMARY KEY,
    name text NOT NULL,
    resource_type text NOT NULL,
    quantity float8 NOT NULL CHECK (quantity >= 0),
    unit text NOT NULL,
    lng float8 NOT NULL CHECK (lng BETWEEN -180 AND 180),
    lat float8 NOT NULL CHECK (lat BETWEEN -90 AND 90),
    address text NOT NULL,
    geog geography(Point, 4326) GENERATED ALWAYS AS (ST_SetSRID(ST_MakePoint(lng, lat), 4326)::geography) STORED,
    description text,
    status text NOT NULL DEFAULT 'Available',
    created_by text NOT NULL,
    version int8 NOT NULL DEFAULT 1,
    created_at timestamptz NOT NULL,
    updated_at timestamptz NOT NULL
);
"#,
    r#"
CREATE INDEX IF NOT EXISTS resources_geog_idx ON resources USING GIST (geog);
"#,
    r#"
CREATE TABLE IF NOT EXISTS reports (
    id uuid PRIMARY KEY,
    title text NOT NULL,
    description text NOT NULL,
    report_type text NOT NULL,
    lng float8 NOT NULL CHECK (lng BETWEEN -180 AND 180),
    lat float8 NOT NULL CHECK (lat BETWEEN -90 AND 90),
    address text NOT NULL,
    geog geography(Point, 4326) GENERATED ALWAYS AS (ST_SetSRID(ST_MakePoint(lng, lat), 4326)::geography) STORED,
    media text[] NOT NULL DEFAULT '{}',
    related_alert uuid,
    status text NOT NULL DEFAULT 'Pending',
    created_by text NOT NULL,
    version int8 NOT NULL DEFAULT 1,
    created_at timestamptz NOT NULL,
    updated_at timestamptz NOT NULL
);
"#,
    r#"
CREATE INDEX IF NOT EXISTS reports_geog_idx ON reports USING GIST (geog);
"#,
    r#"
CREATE INDEX IF NOT EXISTS reports_related_alert_idx ON reports (related_alert);
"#,
];

/// Newest first; ties broken by id so every backend returns the same order.
pub const LIST_ORDER: &str = " ORDER BY created_at DESC, id ASC";

pub const SELECT_ALERTS: &str = r#"
SELECT id, title, description, alert_type, severity, lng, lat, address, status, created_by, version, created_at, updated_at
FROM alerts
"#;

pub const SELECT_ALERT: &str = r#"
SELECT id, title, description, alert_type, severity, lng, lat, address, status, created_by, version, created_at, updated_at
FROM alerts WHERE id = $1;
"#;

pub const SELECT_ALERT_FOR_UPDATE: &str = r#"
SELECT id, title, description, alert_type, severity, lng, lat, address, status, created_by, version, created_at, updated_at
FROM alerts WHERE id = $1 FOR UPDATE;
"#;

pub const INSERT_ALERT: &str = r#"
INSERT INTO alerts (id, title, description, alert_type, severity, lng, lat, address, status, created_by, version, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13);
"#;

pub const UPDATE_ALERT: &str = r#"
UPDATE alerts
SET title = $2,
    description = $3,
    alert_type = $4,
    severity = $5,
    lng = $6,
    lat = $7,
    address = $8,
    status = $9,
    version = $10,
    updated_at = $11
WHERE id = $1;
"#;

pub const DELETE_ALERT: &str = r#"
DELETE FROM alerts WHERE id = $1;
"#;

// Spherical distance (use_spheroid = false) so results match the haversine used in memory.
pub const SELECT_ALERTS_WITHIN: &str = r#"
SELECT id, title, description, alert_type, severity, lng, lat, address, status, created_by, version, created_at, updated_at
FROM alerts
WHERE ST_DWithin(geog, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3, false)
ORDER BY ST_Distance(geog, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, false) ASC;
"#;

pub const SELECT_RESOURCES: &str = r#"
SELECT id, name, resource_type, quantity, unit, lng, lat, address, description, status, created_by, version, created_at, updated_at
FROM resources
"#;

pub const SELECT_RESOURCE: &str = r#"
SELECT id, name, resource_type, quantity, unit, lng, lat, address, description, status, created_by, version, created_at, updated_at
FROM resources WHERE id = $1;
"#;

pub const SELECT_RESOURCE_FOR_UPDATE: &str = r#"
SELECT id, name, resource_type, quantity, unit, lng, lat, address, description, status, created_by, version, created_at, updated_at
FROM resources WHERE id = $1 FOR UPDATE;
"#;

pub const INSERT_RESOURCE: &str = r#"
INSERT INTO resources (id, name, resource_type, quantity, unit, lng, lat, address, description, status, created_by, version, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14);
"#;

pub const UPDATE_RESOURCE: &str = r#"
UPDATE resources
SET name = $2,
    resource_type = $3,
    quantity = $4,
    unit = $5,
    lng = $6,
    lat = $7,
    address = $8,
    description = $9,
    status = $10,
    version = $11,
    updated_at = $12
WHERE id = $1;
"#;

pub const DELETE_RESOURCE: &str = r#"
DELETE FROM resources WHERE id = $1;
"#;

pub const SELECT_RESOURCES_WITHIN: &str = r#"
SELECT id, name, resource_type, quantity, unit, lng, lat, address, description, status, created_by, version, created_at, updated_at
FROM resources
WHERE ST_DWithin(geog, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3, false)
ORDER BY ST_Distance(geog, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, false) ASC;
"#;

pub const SELECT_REPORTS: &str = r#"
SELECT id, title, description, report_type, lng, lat, address, media, related_alert, status, created_by, version, created_at, updated_at
FROM reports
"#;

pub const SELECT_REPORT: &str = r#"
SELECT id, title, description, report_type, lng, lat, address, media, related_alert, status, created_by, version, created_at, updated_at
FROM reports WHERE id = $1;
"#;

pub const SELECT_REPORT_FOR_UPDATE: &str = r#"
SELECT id, title, description, report_type, lng, lat, address, media, related_alert, status, created_by, version, created_at, updated_at
FROM reports WHERE id = $1 FOR UPDATE;
"#;

pub const INSERT_REPORT: &str = r#"
INSERT INTO reports (id, title, description, report_type, lng, lat, address, media, related_alert, status, created_by, version, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14);
"#;

pub const UPDATE_REPORT: &str = r#"
UPDATE reports
SET title = $2,
    description = $3,
    report_type = $4,
    lng = $5,
    lat = $6,
    address = $7,
    media = $8,
    related_alert = $9,
    status = $10,
    version = $11,
    updated_at = $12
WHERE id = $1;
"#;

pub const DELETE_REPORT: &str = r#"
DELETE FROM reports WHERE id = $1;
"#;

pub const SELECT_REPORTS_WITHIN: &str = r#"
SELECT id, title, description, report_type, lng, lat, address, media, related_alert, status, created_by, version, created_at, updated_at
FROM reports
WHERE ST_DWithin(geog, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3, false)
ORDER BY ST_Distance(geog, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, false) ASC;
"#;
