use rusqlite::Connection;

use eqtrend_core::EqError;

pub fn init_db(conn: &Connection) -> Result<(), EqError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS equations (
            id TEXT PRIMARY KEY,
            origin_kind TEXT NOT NULL, -- wikidata | wikipedia
            origin_key TEXT NOT NULL,  -- Q-id or page name
            fetched_at TEXT NOT NULL,

            label TEXT,
            latex TEXT,

            person TEXT,
            birth TEXT, -- raw Wikidata time literal
            birth_place TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_equations_origin ON equations(origin_kind, origin_key);

        CREATE TABLE IF NOT EXISTS scores (
            equation_id TEXT NOT NULL REFERENCES equations(id) ON DELETE CASCADE,
            backend TEXT NOT NULL,
            ops INTEGER,
            depth INTEGER,
            nodes INTEGER,
            parsed TEXT,
            error TEXT,
            scored_at TEXT NOT NULL,
            PRIMARY KEY (equation_id, backend)
        );

        CREATE INDEX IF NOT EXISTS idx_scores_backend ON scores(backend);
        ",
    )
    .map_err(|e| EqError::Database(e.to_string()))?;

    Ok(())
}
