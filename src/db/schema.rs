//! On-device schema for the directory cache.
//!
//! Complex fields (links, tables, tiles) are JSON text columns.
//! All `last_updated` values are epoch milliseconds.

/// Bump whenever a table definition changes; older files are rebuilt from scratch.
pub const SCHEMA_VERSION: u32 = 2;

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS bases (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    city TEXT NOT NULL,
    state TEXT NOT NULL,
    active INTEGER,
    last_updated INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY,
    base_id TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    description TEXT,
    contact TEXT,
    web_url TEXT,
    image_url TEXT,
    primary_color TEXT,
    secondary_color TEXT,
    text_color TEXT,
    email TEXT NOT NULL,
    building_number TEXT,
    address TEXT,
    links TEXT,
    use_table INTEGER NOT NULL,
    table_data TEXT NOT NULL,
    last_updated INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_organizations_base ON organizations(base_id);

CREATE TABLE IF NOT EXISTS base_details (
    id TEXT PRIMARY KEY,
    base_id TEXT NOT NULL,
    image_url TEXT NOT NULL,
    phone TEXT,
    email TEXT,
    commander TEXT,
    motto TEXT,
    population REAL,
    user_id TEXT NOT NULL,
    last_updated INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_base_details_base ON base_details(base_id);

CREATE TABLE IF NOT EXISTS page_cards (
    id TEXT PRIMARY KEY,
    base_id TEXT,
    org_id TEXT,
    show_name INTEGER NOT NULL,
    show_motto INTEGER NOT NULL,
    show_commander INTEGER NOT NULL,
    show_phone INTEGER NOT NULL,
    show_email INTEGER NOT NULL,
    show_tables INTEGER NOT NULL,
    table_data TEXT NOT NULL,
    tiles_config TEXT NOT NULL,
    last_updated INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_page_cards_base ON page_cards(base_id);
"#;

/// Drops every cache table; used when the stored schema version doesn't match.
pub const DROP_ALL: &str = r#"
DROP TABLE IF EXISTS bases;
DROP TABLE IF EXISTS organizations;
DROP TABLE IF EXISTS base_details;
DROP TABLE IF EXISTS page_cards;
"#;
