//! Idempotent schema DDL. Table names are inherited from the wider
//! platform schema; the worker only ever creates what it reads or writes.

pub(crate) const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS api_partner (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    kosten_recherche_grundgebuehr TEXT NOT NULL DEFAULT '0.50',
    kosten_recherche_standard TEXT NOT NULL DEFAULT '0.05',
    kosten_recherche_premium TEXT NOT NULL DEFAULT '0.12',
    kosten_recherche_komplett TEXT NOT NULL DEFAULT '0.18',
    rate_limit_pro_minute INTEGER NOT NULL DEFAULT 60,
    rate_limit_pro_stunde INTEGER NOT NULL DEFAULT 1000,
    rate_limit_pro_tag INTEGER NOT NULL DEFAULT 10000,
    ist_gesperrt INTEGER NOT NULL DEFAULT 0,
    erstellt_am TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rch_auftrag (
    id TEXT PRIMARY KEY,
    partner_id TEXT NOT NULL REFERENCES api_partner(id),
    quality_tier TEXT NOT NULL,
    geo_ort_id TEXT,
    geo_kreis_id TEXT,
    plz TEXT,
    category_gcid TEXT,
    freitext TEXT,
    status TEXT NOT NULL DEFAULT 'draft',
    attempts INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL DEFAULT 3,
    estimated_cost_cents INTEGER NOT NULL DEFAULT 0,
    actual_cost_cents INTEGER,
    raw_count INTEGER NOT NULL DEFAULT 0,
    new_count INTEGER NOT NULL DEFAULT 0,
    duplicate_count INTEGER NOT NULL DEFAULT 0,
    updated_count INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_auftrag_lease
    ON rch_auftrag(status, attempts, created_at);
CREATE INDEX IF NOT EXISTS idx_auftrag_partner ON rch_auftrag(partner_id);

CREATE TABLE IF NOT EXISTS rch_roh_ergebnis (
    id TEXT PRIMARY KEY,
    auftrag_id TEXT NOT NULL REFERENCES rch_auftrag(id),
    seq INTEGER NOT NULL,
    source TEXT NOT NULL,
    external_id TEXT,
    name TEXT NOT NULL,
    address TEXT,
    postal_code TEXT,
    city TEXT,
    phone TEXT,
    email TEXT,
    website TEXT,
    category TEXT,
    lat REAL,
    lng REAL,
    payload TEXT NOT NULL DEFAULT 'null',
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_roh_auftrag ON rch_roh_ergebnis(auftrag_id, seq);

CREATE TABLE IF NOT EXISTS com_unternehmen (
    id TEXT PRIMARY KEY,
    firmierung TEXT NOT NULL,
    address TEXT,
    postal_code TEXT,
    city TEXT,
    phone TEXT,
    phone_normalized TEXT,
    email TEXT,
    website TEXT,
    website_normalized TEXT,
    lat REAL,
    lng REAL,
    metadaten TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_unternehmen_website
    ON com_unternehmen(website_normalized);
CREATE INDEX IF NOT EXISTS idx_unternehmen_phone
    ON com_unternehmen(phone_normalized);
CREATE INDEX IF NOT EXISTS idx_unternehmen_geo ON com_unternehmen(lat, lng);

CREATE TABLE IF NOT EXISTS api_billing_account (
    id TEXT PRIMARY KEY,
    partner_id TEXT NOT NULL UNIQUE REFERENCES api_partner(id),
    guthaben_cents INTEGER NOT NULL DEFAULT 0,
    rechnungs_limit_cents INTEGER NOT NULL DEFAULT 0,
    warnung_bei_cents INTEGER NOT NULL DEFAULT 1000,
    warnung_gesendet_am TEXT,
    ist_gesperrt INTEGER NOT NULL DEFAULT 0,
    gesperrt_grund TEXT,
    erstellt_am TEXT NOT NULL,
    aktualisiert_am TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS api_credit_transaction (
    id TEXT PRIMARY KEY,
    billing_account_id TEXT NOT NULL REFERENCES api_billing_account(id),
    typ TEXT NOT NULL,
    betrag_cents INTEGER NOT NULL,
    saldo_danach_cents INTEGER NOT NULL,
    beschreibung TEXT,
    referenz_typ TEXT,
    referenz_id TEXT,
    erstellt_von TEXT NOT NULL DEFAULT 'system',
    erstellt_am TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_credit_account
    ON api_credit_transaction(billing_account_id, erstellt_am);
CREATE INDEX IF NOT EXISTS idx_credit_reference
    ON api_credit_transaction(referenz_typ, referenz_id);

CREATE TABLE IF NOT EXISTS api_usage (
    id TEXT PRIMARY KEY,
    partner_id TEXT NOT NULL REFERENCES api_partner(id),
    endpoint TEXT NOT NULL,
    methode TEXT NOT NULL DEFAULT 'GET',
    parameter TEXT,
    status_code INTEGER NOT NULL DEFAULT 200,
    anzahl_ergebnisse INTEGER NOT NULL DEFAULT 0,
    kosten REAL NOT NULL DEFAULT 0.0,
    antwortzeit_ms INTEGER,
    erstellt_am TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_usage_partner_date ON api_usage(partner_id, erstellt_am);

CREATE TABLE IF NOT EXISTS api_usage_daily (
    id TEXT PRIMARY KEY,
    partner_id TEXT NOT NULL REFERENCES api_partner(id),
    datum TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    anzahl_abrufe INTEGER NOT NULL DEFAULT 0,
    anzahl_ergebnisse_gesamt INTEGER NOT NULL DEFAULT 0,
    kosten_gesamt REAL NOT NULL DEFAULT 0.0,
    erstellt_am TEXT NOT NULL,
    UNIQUE (partner_id, datum, endpoint)
);

CREATE TABLE IF NOT EXISTS app_setting (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS geo_kreis (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    einwohner INTEGER
);

CREATE TABLE IF NOT EXISTS geo_ort (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    plz TEXT,
    kreis_id TEXT REFERENCES geo_kreis(id),
    lat REAL NOT NULL,
    lng REAL NOT NULL,
    ist_hauptort INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_ort_plz ON geo_ort(plz);
CREATE INDEX IF NOT EXISTS idx_ort_kreis ON geo_ort(kreis_id, ist_hauptort);

CREATE TABLE IF NOT EXISTS brn_google_kategorie (
    gcid TEXT PRIMARY KEY,
    name TEXT,
    name_de TEXT
);
";
