use crate::matcher::normalize_text;
use crate::types::{HelpEntry, HelpSection};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Result, Row};
use std::path::Path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    section TEXT,
    question TEXT NOT NULL,
    data TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_section ON entries(section);

-- One row per (entry, keyword): the multi-valued keyword index
CREATE TABLE IF NOT EXISTS entry_keywords (
    entry_id TEXT NOT NULL,
    keyword TEXT NOT NULL,
    PRIMARY KEY (entry_id, keyword)
);

CREATE INDEX IF NOT EXISTS idx_entry_keywords_keyword ON entry_keywords(keyword);

CREATE TABLE IF NOT EXISTS sections (
    id TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    data TEXT NOT NULL
);
"#;

/// Offline copy of the knowledge store backed by SQLite
pub struct CacheStore {
    conn: Connection,
}

impl CacheStore {
    /// Open or create the cache database
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // -------------------------------------------------------------------------
    // Row decoding
    // -------------------------------------------------------------------------

    fn decode<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> Result<T> {
        let data: String = row.get(idx)?;
        serde_json::from_str(&data)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
    }

    fn query_entries(&self, sql: &str, param: Option<&str>) -> Result<Vec<HelpEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = match param {
            Some(p) => stmt.query(params![p])?,
            None => stmt.query([])?,
        };

        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            results.push(Self::decode(row, 0)?);
        }
        Ok(results)
    }

    // -------------------------------------------------------------------------
    // Entries
    // -------------------------------------------------------------------------

    /// Replace every cached entry. The clear and the inserts share one
    /// transaction, so readers never see a half-written cache.
    pub fn replace_entries(&mut self, entries: &[HelpEntry]) -> Result<usize> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM entry_keywords", [])?;
        tx.execute("DELETE FROM entries", [])?;

        for (position, entry) in entries.iter().enumerate() {
            tx.execute(
                "INSERT OR REPLACE INTO entries (id, position, section, question, data) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.id,
                    position as i64,
                    entry.section,
                    entry.question,
                    Self::encode(entry)?
                ],
            )?;

            for keyword in &entry.keywords {
                tx.execute(
                    "INSERT OR IGNORE INTO entry_keywords (entry_id, keyword) VALUES (?1, ?2)",
                    params![entry.id, normalize_text(keyword)],
                )?;
            }
        }

        tx.commit()?;
        Ok(entries.len())
    }

    /// All cached entries in declaration order
    pub fn all_entries(&self) -> Result<Vec<HelpEntry>> {
        self.query_entries("SELECT data FROM entries ORDER BY position", None)
    }

    /// Entries of one section, via the section index
    pub fn entries_by_section(&self, section: &str) -> Result<Vec<HelpEntry>> {
        self.query_entries(
            "SELECT data FROM entries WHERE section = ?1 ORDER BY position",
            Some(section),
        )
    }

    /// Entries tagged with a keyword, via the keyword index
    pub fn entries_by_keyword(&self, keyword: &str) -> Result<Vec<HelpEntry>> {
        let keyword = normalize_text(keyword);
        self.query_entries(
            "SELECT e.data FROM entries e
             JOIN entry_keywords k ON e.id = k.entry_id
             WHERE k.keyword = ?1
             ORDER BY e.position",
            Some(&keyword),
        )
    }

    pub fn count_entries(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Distinct keywords with how many entries carry them
    pub fn keyword_counts(&self) -> Result<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare(
            "SELECT keyword, COUNT(*) as count FROM entry_keywords GROUP BY keyword ORDER BY count DESC, keyword",
        )?;

        let mut results = Vec::new();
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            results.push((row.get(0)?, row.get::<_, i64>(1)? as usize));
        }

        Ok(results)
    }

    // -------------------------------------------------------------------------
    // Sections
    // -------------------------------------------------------------------------

    /// Replace every cached section. Entries are stripped; they live in
    /// the entries table.
    pub fn replace_sections(&mut self, sections: &[HelpSection]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM sections", [])?;

        for (position, section) in sections.iter().enumerate() {
            let stripped = HelpSection {
                entries: Vec::new(),
                ..section.clone()
            };
            tx.execute(
                "INSERT OR REPLACE INTO sections (id, position, data) VALUES (?1, ?2, ?3)",
                params![section.id, position as i64, Self::encode(&stripped)?],
            )?;
        }

        tx.commit()?;
        Ok(sections.len())
    }

    pub fn all_sections(&self) -> Result<Vec<HelpSection>> {
        let mut stmt = self.conn.prepare("SELECT data FROM sections ORDER BY position")?;
        let mut rows = stmt.query([])?;

        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            results.push(Self::decode(row, 0)?);
        }
        Ok(results)
    }

    pub fn get_section(&self, id: &str) -> Result<Option<HelpSection>> {
        let mut stmt = self.conn.prepare("SELECT data FROM sections WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;

        if let Some(row) = rows.next()? {
            Ok(Some(Self::decode(row, 0)?))
        } else {
            Ok(None)
        }
    }

    pub fn count_sections(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM sections", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Drop all cached entries and sections
    pub fn clear(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM entry_keywords", [])?;
        tx.execute("DELETE FROM entries", [])?;
        tx.execute("DELETE FROM sections", [])?;
        tx.commit()
    }
}
