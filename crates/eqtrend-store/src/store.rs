use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use eqtrend_core::{
    Backend, EqError, EqResult, Equation, EquationStore, Origin, Score, StoreStats,
};

use crate::schema::init_db;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(path: &Path) -> EqResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EqError::Database(format!("cannot create db directory: {e}")))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| EqError::Database(format!("cannot open database: {e}")))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| EqError::Database(e.to_string()))?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> EqResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EqError::Database(format!("cannot open in-memory db: {e}")))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| EqError::Database(e.to_string()))?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    /// Run `f` inside one transaction. Bulk inserts go from minutes to
    /// milliseconds on a WAL database.
    pub fn batch<T>(&self, f: impl FnOnce(&Self) -> EqResult<T>) -> EqResult<T> {
        self.conn
            .execute_batch("BEGIN")
            .map_err(|e| EqError::Database(e.to_string()))?;
        match f(self) {
            Ok(v) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|e| EqError::Database(e.to_string()))?;
                Ok(v)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

const EQUATION_COLS: &str =
    "id, origin_kind, origin_key, fetched_at, label, latex, person, birth, birth_place";

const SCORE_COLS: &str = "equation_id, backend, ops, depth, nodes, parsed, error, scored_at";

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(EqError::Parse(msg)))
}

fn row_to_equation(row: &rusqlite::Row) -> rusqlite::Result<Equation> {
    let kind: String = row.get(1)?;
    let key: String = row.get(2)?;
    let origin = Origin::from_parts(&kind, key)
        .ok_or_else(|| conversion_error(1, format!("unknown origin kind: {kind}")))?;
    let fetched_at: String = row.get(3)?;

    Ok(Equation {
        id: row.get(0)?,
        origin,
        fetched_at: parse_dt(&fetched_at),
        label: row.get(4)?,
        latex: row.get(5)?,
        person: row.get(6)?,
        birth: row.get(7)?,
        birth_place: row.get(8)?,
    })
}

fn row_to_score(row: &rusqlite::Row) -> rusqlite::Result<Score> {
    let backend: String = row.get(1)?;
    let backend: Backend = backend.parse().map_err(|e| conversion_error(1, e))?;
    let scored_at: String = row.get(7)?;

    Ok(Score {
        equation_id: row.get(0)?,
        backend,
        ops: row.get(2)?,
        depth: row.get(3)?,
        nodes: row.get(4)?,
        parsed: row.get(5)?,
        error: row.get(6)?,
        scored_at: parse_dt(&scored_at),
    })
}

impl SqliteStore {
    fn count_where(&self, clause: &str) -> EqResult<usize> {
        self.conn
            .query_row(
                &format!("SELECT COUNT(*) FROM equations WHERE {clause}"),
                [],
                |row| row.get::<_, usize>(0),
            )
            .map_err(|e| EqError::Database(e.to_string()))
    }

    fn fetch_bound(&self, agg: &str) -> EqResult<Option<DateTime<Utc>>> {
        Ok(self
            .conn
            .query_row(&format!("SELECT {agg}(fetched_at) FROM equations"), [], |row| {
                row.get::<_, Option<String>>(0)
            })
            .map_err(|e| EqError::Database(e.to_string()))?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)))
    }
}

// ---------------------------------------------------------------------------
// EquationStore impl
// ---------------------------------------------------------------------------

impl EquationStore for SqliteStore {
    fn insert(&self, equation: &Equation) -> EqResult<bool> {
        let existed = self
            .conn
            .query_row(
                "SELECT 1 FROM equations WHERE id = ?1",
                params![equation.id],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| EqError::Database(e.to_string()))?
            .is_some();

        self.conn
            .execute(
                "INSERT INTO equations (id, origin_kind, origin_key, fetched_at,
                 label, latex, person, birth, birth_place)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    fetched_at = excluded.fetched_at,
                    label = excluded.label,
                    person = excluded.person,
                    birth = excluded.birth,
                    birth_place = excluded.birth_place",
                params![
                    equation.id,
                    equation.origin.kind(),
                    equation.origin.key(),
                    equation.fetched_at.to_rfc3339(),
                    equation.label,
                    equation.latex,
                    equation.person,
                    equation.birth,
                    equation.birth_place,
                ],
            )
            .map_err(|e| EqError::Database(e.to_string()))?;

        Ok(!existed)
    }

    fn get(&self, id: &str) -> EqResult<Option<Equation>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {EQUATION_COLS} FROM equations WHERE id = ?1"))
            .map_err(|e| EqError::Database(e.to_string()))?;

        let result = stmt
            .query_row(params![id], row_to_equation)
            .optional()
            .map_err(|e| EqError::Database(e.to_string()))?;

        Ok(result)
    }

    fn list(&self) -> EqResult<Vec<Equation>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {EQUATION_COLS} FROM equations ORDER BY origin_kind, origin_key, id"
            ))
            .map_err(|e| EqError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], row_to_equation)
            .map_err(|e| EqError::Database(e.to_string()))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| EqError::Database(e.to_string()))?);
        }
        Ok(result)
    }

    fn count(&self) -> EqResult<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM equations", [], |row| {
                row.get::<_, usize>(0)
            })
            .map_err(|e| EqError::Database(e.to_string()))
    }

    fn put_score(&self, score: &Score) -> EqResult<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO scores (equation_id, backend, ops, depth, nodes,
                 parsed, error, scored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    score.equation_id,
                    score.backend.to_string(),
                    score.ops,
                    score.depth,
                    score.nodes,
                    score.parsed,
                    score.error,
                    score.scored_at.to_rfc3339(),
                ],
            )
            .map_err(|e| EqError::Database(e.to_string()))?;
        Ok(())
    }

    fn scores(&self, backend: Backend) -> EqResult<Vec<Score>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {SCORE_COLS} FROM scores WHERE backend = ?1 ORDER BY equation_id"
            ))
            .map_err(|e| EqError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![backend.to_string()], row_to_score)
            .map_err(|e| EqError::Database(e.to_string()))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| EqError::Database(e.to_string()))?);
        }
        Ok(result)
    }

    fn unscored(&self, backend: Backend) -> EqResult<Vec<Equation>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {EQUATION_COLS} FROM equations
                 WHERE NOT EXISTS (
                    SELECT 1 FROM scores
                    WHERE scores.equation_id = equations.id AND scores.backend = ?1
                 )
                 ORDER BY id"
            ))
            .map_err(|e| EqError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![backend.to_string()], row_to_equation)
            .map_err(|e| EqError::Database(e.to_string()))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| EqError::Database(e.to_string()))?);
        }
        Ok(result)
    }

    fn clear_scores(&self, backend: Backend) -> EqResult<usize> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM scores WHERE backend = ?1",
                params![backend.to_string()],
            )
            .map_err(|e| EqError::Database(e.to_string()))?;
        tracing::debug!(%backend, removed, "cleared scores");
        Ok(removed)
    }

    fn stats(&self) -> EqResult<StoreStats> {
        let total_equations = self.count()?;
        let wikidata = self.count_where("origin_kind = 'wikidata'")?;
        let wikipedia = self.count_where("origin_kind = 'wikipedia'")?;
        let with_birth = self.count_where("birth IS NOT NULL")?;

        let mut scores = Vec::with_capacity(Backend::ALL.len());
        for backend in Backend::ALL {
            let (ok, failed): (usize, usize) = self
                .conn
                .query_row(
                    "SELECT COALESCE(SUM(error IS NULL), 0), COALESCE(SUM(error IS NOT NULL), 0)
                     FROM scores WHERE backend = ?1",
                    params![backend.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(|e| EqError::Database(e.to_string()))?;
            scores.push((backend, ok, failed));
        }

        Ok(StoreStats {
            total_equations,
            wikidata,
            wikipedia,
            with_birth,
            scores,
            oldest_fetch: self.fetch_bound("MIN")?,
            newest_fetch: self.fetch_bound("MAX")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    fn wikidata_eq(item: &str, latex: &str) -> Equation {
        let mut eq = Equation::new(
            Origin::Wikidata { item: item.into() },
            Some(latex.into()),
        );
        eq.label = Some(format!("label of {item}"));
        eq
    }

    fn wikipedia_eq(page: &str, latex: &str) -> Equation {
        Equation::new(Origin::Wikipedia { page: page.into() }, Some(latex.into()))
    }

    #[test]
    fn test_insert_and_get() {
        let store = test_store();
        let mut eq = wikidata_eq("Q11402", "E=mc^2");
        eq.person = Some("Albert Einstein".into());
        eq.birth = Some("1879-03-14T00:00:00Z".into());

        assert!(store.insert(&eq).unwrap());
        let got = store.get(&eq.id).unwrap().unwrap();
        assert_eq!(got.origin, eq.origin);
        assert_eq!(got.latex.as_deref(), Some("E=mc^2"));
        assert_eq!(got.person.as_deref(), Some("Albert Einstein"));
        assert_eq!(got.birth.as_deref(), Some("1879-03-14T00:00:00Z"));
        assert!(got.birth_place.is_none());
    }

    #[test]
    fn test_get_not_found() {
        let store = test_store();
        assert!(store.get("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_insert_is_upsert() {
        let store = test_store();
        let mut eq = wikidata_eq("Q1", "a=b");
        assert!(store.insert(&eq).unwrap());

        eq.birth_place = Some("Basel".into());
        assert!(!store.insert(&eq).unwrap());

        assert_eq!(store.count().unwrap(), 1);
        let got = store.get(&eq.id).unwrap().unwrap();
        assert_eq!(got.birth_place.as_deref(), Some("Basel"));
    }

    #[test]
    fn test_list_orders_by_origin() {
        let store = test_store();
        store.insert(&wikipedia_eq("Ohm's_law", "V=IR")).unwrap();
        store.insert(&wikidata_eq("Q2", "x")).unwrap();
        store.insert(&wikidata_eq("Q1", "y")).unwrap();

        let keys: Vec<String> = store
            .list()
            .unwrap()
            .iter()
            .map(|e| e.origin.to_string())
            .collect();
        assert_eq!(
            keys,
            vec!["wikidata:Q1", "wikidata:Q2", "wikipedia:Ohm's_law"]
        );
    }

    #[test]
    fn test_scores_roundtrip_and_replace() {
        let store = test_store();
        let eq = wikidata_eq("Q1", "a+b");
        store.insert(&eq).unwrap();

        let mut score = Score::measured(eq.id.clone(), Backend::Grammar, 1, 2, 3);
        score.parsed = Some("(+ a b)".into());
        store.put_score(&score).unwrap();

        let scores = store.scores(Backend::Grammar).unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].ops, Some(1));
        assert_eq!(scores[0].nodes, Some(3));
        assert_eq!(scores[0].parsed.as_deref(), Some("(+ a b)"));
        assert!(store.scores(Backend::Mathml).unwrap().is_empty());

        store
            .put_score(&Score::failed(eq.id.clone(), Backend::Grammar, "bad"))
            .unwrap();
        let scores = store.scores(Backend::Grammar).unwrap();
        assert_eq!(scores.len(), 1);
        assert!(scores[0].ops.is_none());
        assert_eq!(scores[0].error.as_deref(), Some("bad"));
    }

    #[test]
    fn test_score_needs_equation() {
        let store = test_store();
        let score = Score::measured("missing".into(), Backend::Grammar, 1, 1, 1);
        assert!(store.put_score(&score).is_err());
    }

    #[test]
    fn test_unscored_is_per_backend() {
        let store = test_store();
        let a = wikidata_eq("Q1", "a");
        let b = wikidata_eq("Q2", "b");
        store.insert(&a).unwrap();
        store.insert(&b).unwrap();
        store
            .put_score(&Score::measured(a.id.clone(), Backend::Grammar, 0, 1, 1))
            .unwrap();

        let pending = store.unscored(Backend::Grammar).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);
        assert_eq!(store.unscored(Backend::Mathml).unwrap().len(), 2);
    }

    #[test]
    fn test_clear_scores() {
        let store = test_store();
        let a = wikidata_eq("Q1", "a");
        store.insert(&a).unwrap();
        store
            .put_score(&Score::measured(a.id.clone(), Backend::Grammar, 0, 1, 1))
            .unwrap();
        store
            .put_score(&Score::measured(a.id.clone(), Backend::Mathml, 0, 2, 2))
            .unwrap();

        assert_eq!(store.clear_scores(Backend::Grammar).unwrap(), 1);
        assert!(store.scores(Backend::Grammar).unwrap().is_empty());
        assert_eq!(store.scores(Backend::Mathml).unwrap().len(), 1);
    }

    #[test]
    fn test_batch_rolls_back_on_error() {
        let store = test_store();
        let result: EqResult<()> = store.batch(|s| {
            s.insert(&wikidata_eq("Q1", "a"))?;
            Err(EqError::Parse("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.count().unwrap(), 0);

        store
            .batch(|s| {
                s.insert(&wikidata_eq("Q1", "a"))?;
                s.insert(&wikidata_eq("Q2", "b"))
            })
            .unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_stats() {
        let store = test_store();
        let empty = store.stats().unwrap();
        assert_eq!(empty.total_equations, 0);
        assert!(empty.oldest_fetch.is_none());

        let mut a = wikidata_eq("Q1", "a");
        a.birth = Some("1700-01-01T00:00:00Z".into());
        let b = wikipedia_eq("Page", "b");
        store.insert(&a).unwrap();
        store.insert(&b).unwrap();
        store
            .put_score(&Score::measured(a.id.clone(), Backend::Grammar, 0, 1, 1))
            .unwrap();
        store
            .put_score(&Score::failed(b.id.clone(), Backend::Grammar, "x"))
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_equations, 2);
        assert_eq!(stats.wikidata, 1);
        assert_eq!(stats.wikipedia, 1);
        assert_eq!(stats.with_birth, 1);
        assert_eq!(stats.scores[0], (Backend::Grammar, 1, 1));
        assert_eq!(stats.scores[1], (Backend::Mathml, 0, 0));
        assert!(stats.oldest_fetch.is_some());
        assert!(stats.newest_fetch >= stats.oldest_fetch);
    }

    #[test]
    fn test_on_disk_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("eq.db");
        {
            let store = SqliteStore::new(&path).unwrap();
            store.insert(&wikidata_eq("Q1", "a")).unwrap();
        }
        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
