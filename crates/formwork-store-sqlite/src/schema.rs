//! SQL schema for the formwork SQLite store.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Uniqueness notes:
/// - slugs and names are unique within their parent scope;
/// - sibling order uses a unique expression index with
///   `COALESCE(parent_id, '')` because SQLite treats NULLs as distinct in
///   plain UNIQUE constraints;
/// - SQLite cannot defer UNIQUE and checks it per row, so sibling reorders
///   go through a temporary ordinal inside the transaction.
pub const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS collections (
    id      TEXT NOT NULL,
    version INTEGER NOT NULL,
    name    TEXT NOT NULL,
    PRIMARY KEY (id, version),
    UNIQUE (name, version)
);

CREATE TABLE IF NOT EXISTS sections (
    id                 TEXT PRIMARY KEY,
    collection_id      TEXT NOT NULL,
    collection_version INTEGER NOT NULL,
    title              TEXT NOT NULL,
    slug               TEXT NOT NULL,
    "order"            INTEGER NOT NULL,
    FOREIGN KEY (collection_id, collection_version)
      REFERENCES collections(id, version) ON DELETE CASCADE,
    UNIQUE (collection_id, collection_version, slug),
    UNIQUE (collection_id, collection_version, "order")
);

CREATE TABLE IF NOT EXISTS forms (
    id         TEXT PRIMARY KEY,
    section_id TEXT NOT NULL REFERENCES sections(id) ON DELETE CASCADE,
    title      TEXT NOT NULL,
    slug       TEXT NOT NULL,
    "order"    INTEGER NOT NULL,
    UNIQUE (section_id, slug),
    UNIQUE (section_id, "order")
);

-- Questions and groups share one table, tagged by `type`. Groups nest via
-- parent_id; top-level components have parent_id NULL.
CREATE TABLE IF NOT EXISTS components (
    id               TEXT PRIMARY KEY,
    form_id          TEXT NOT NULL REFERENCES forms(id) ON DELETE CASCADE,
    parent_id        TEXT REFERENCES components(id) ON DELETE CASCADE,
    type             TEXT NOT NULL,           -- 'question' | 'group'
    name             TEXT NOT NULL,
    slug             TEXT NOT NULL,
    text             TEXT NOT NULL,
    hint             TEXT,
    data_type        TEXT,                    -- questions only
    presentation     TEXT NOT NULL DEFAULT '{}',
    guidance_heading TEXT,                    -- groups only
    guidance_body    TEXT,
    same_page        INTEGER NOT NULL DEFAULT 0,
    add_another      INTEGER NOT NULL DEFAULT 0,
    "order"          INTEGER NOT NULL,
    UNIQUE (form_id, slug),
    UNIQUE (form_id, name)
);

CREATE UNIQUE INDEX IF NOT EXISTS components_sibling_order_idx
  ON components(form_id, COALESCE(parent_id, ''), "order");

CREATE TABLE IF NOT EXISTS data_source_items (
    id           TEXT PRIMARY KEY,
    component_id TEXT NOT NULL REFERENCES components(id) ON DELETE CASCADE,
    key          TEXT NOT NULL,
    label        TEXT NOT NULL,
    "order"      INTEGER NOT NULL,
    UNIQUE (component_id, key),
    UNIQUE (component_id, "order")
);

CREATE TABLE IF NOT EXISTS expressions (
    id           TEXT PRIMARY KEY,
    component_id TEXT NOT NULL REFERENCES components(id) ON DELETE CASCADE,
    kind         TEXT NOT NULL,               -- 'condition' | 'validation'
    managed_name TEXT,
    context      TEXT NOT NULL DEFAULT 'null',
    statement    TEXT
);

-- Denormalized dependency edges, fully recomputed (delete-then-insert) on
-- every write to the owning component.
CREATE TABLE IF NOT EXISTS component_references (
    component_id                   TEXT NOT NULL
      REFERENCES components(id) ON DELETE CASCADE,
    depends_on_component_id        TEXT NOT NULL
      REFERENCES components(id),
    expression_id                  TEXT,
    depends_on_data_source_item_id TEXT
);

CREATE INDEX IF NOT EXISTS component_references_depends_idx
  ON component_references(depends_on_component_id);

CREATE TABLE IF NOT EXISTS submissions (
    id                 TEXT PRIMARY KEY,
    collection_id      TEXT NOT NULL,
    collection_version INTEGER NOT NULL,
    mode               TEXT NOT NULL,         -- 'test' | 'live'
    created_by         TEXT NOT NULL,
    created_at         TEXT NOT NULL,
    data               TEXT NOT NULL DEFAULT '{}'
);

-- Append-only milestones; "un-completing" a form deletes its rows.
CREATE TABLE IF NOT EXISTS submission_events (
    id            TEXT PRIMARY KEY,
    submission_id TEXT NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
    key           TEXT NOT NULL,
    created_by    TEXT NOT NULL,
    form_id       TEXT,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS submission_events_submission_idx
  ON submission_events(submission_id);

PRAGMA user_version = 1;
"#;
