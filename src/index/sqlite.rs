//! SQLite-backed fragment index.
//!
//! One row per fragment; the embedding is stored as a little-endian f32
//! blob. Upserts are `INSERT OR REPLACE` keyed by fragment id and committed
//! per fragment, so a crash mid-batch leaves previously committed entries
//! in a valid, queryable state. WAL mode allows concurrent reads.

use super::traits::{FragmentIndex, IndexEntry, IndexError, IndexResult, IndexStats, SearchFilter};
use crate::fragment::{Fragment, FragmentId, PriorityTag};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

/// Persistent fragment index backed by SQLite.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    dimensions: usize,
}

impl SqliteIndex {
    /// Open or create an index at the given path.
    pub fn open(path: impl AsRef<Path>, dimensions: usize) -> IndexResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn, dimensions)
    }

    /// Create an in-memory index (useful for testing).
    pub fn open_in_memory(dimensions: usize) -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn, dimensions)
    }

    fn init_connection(conn: Connection, dimensions: usize) -> IndexResult<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS fragments (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                page INTEGER NOT NULL,
                span_start INTEGER NOT NULL,
                span_end INTEGER NOT NULL,
                text TEXT NOT NULL,
                priority TEXT NOT NULL,
                trusted INTEGER NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_fragments_document
                ON fragments(document_id);
            CREATE INDEX IF NOT EXISTS idx_fragments_document_page
                ON fragments(document_id, page);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<IndexEntry> {
        let id: String = row.get(0)?;
        let document_id: String = row.get(1)?;
        let page: u32 = row.get(2)?;
        let span_start: usize = row.get::<_, i64>(3)? as usize;
        let span_end: usize = row.get::<_, i64>(4)? as usize;
        let text: String = row.get(5)?;
        let priority: String = row.get(6)?;
        let trusted: bool = row.get(7)?;
        let blob: Vec<u8> = row.get(8)?;

        let priority_tag = PriorityTag::from_str(&priority).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
            )
        })?;

        Ok(IndexEntry {
            fragment: Fragment {
                id: FragmentId::new(id),
                document_id,
                text,
                page_number: page,
                char_span: (span_start, span_end),
                priority_tag,
                trusted,
            },
            vector: bytes_to_f32_vec(&blob),
        })
    }
}

/// Reinterpret a `&[f32]` slice as raw bytes for blob storage.
///
/// # Safety
/// f32 has no padding and a fixed layout; this is a trivial reinterpretation.
fn f32_slice_as_bytes(slice: &[f32]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, slice.len() * 4) }
}

fn bytes_to_f32_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

impl FragmentIndex for SqliteIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn upsert_entry(&self, fragment: &Fragment, vector: &[f32]) -> IndexResult<()> {
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO fragments \
             (id, document_id, page, span_start, span_end, text, priority, trusted, embedding) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                fragment.id.as_str(),
                fragment.document_id,
                fragment.page_number,
                fragment.char_span.0 as i64,
                fragment.char_span.1 as i64,
                fragment.text,
                fragment.priority_tag.as_str(),
                fragment.trusted,
                f32_slice_as_bytes(vector),
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &FragmentId) -> IndexResult<Option<Fragment>> {
        let conn = self.conn.lock().unwrap();
        let entry = conn
            .query_row(
                "SELECT id, document_id, page, span_start, span_end, text, priority, trusted, embedding \
                 FROM fragments WHERE id = ?1",
                params![id.as_str()],
                Self::row_to_entry,
            )
            .optional()?;
        Ok(entry.map(|e| e.fragment))
    }

    fn delete_by_document(&self, document_id: &str) -> IndexResult<usize> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM fragments WHERE document_id = ?1",
            params![document_id],
        )?;
        Ok(removed)
    }

    fn scan(&self, filter: &SearchFilter) -> IndexResult<Vec<IndexEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from(
            "SELECT id, document_id, page, span_start, span_end, text, priority, trusted, embedding \
             FROM fragments WHERE 1=1",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(doc) = &filter.document_id {
            sql.push_str(" AND document_id = ?");
            args.push(Box::new(doc.clone()));
        }
        if let Some(page) = filter.page_number {
            sql.push_str(" AND page = ?");
            args.push(Box::new(page));
        }
        if let Some(tag) = filter.priority_tag {
            sql.push_str(" AND priority = ?");
            args.push(Box::new(tag.as_str().to_string()));
        }

        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let entries = stmt
            .query_map(params.as_slice(), Self::row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn stats(&self) -> IndexResult<IndexStats> {
        let conn = self.conn.lock().unwrap();
        let fragment_count: usize =
            conn.query_row("SELECT COUNT(*) FROM fragments", [], |row| row.get(0))?;
        let document_count: usize = conn.query_row(
            "SELECT COUNT(DISTINCT document_id) FROM fragments",
            [],
            |row| row.get(0),
        )?;
        let mut stmt =
            conn.prepare("SELECT priority, COUNT(*) FROM fragments GROUP BY priority")?;
        let priority_counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?))
            })?
            .collect::<rusqlite::Result<BTreeMap<String, usize>>>()?;
        Ok(IndexStats {
            fragment_count,
            document_count,
            priority_counts,
        })
    }

    fn clear(&self) -> IndexResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM fragments", [])?;
        Ok(())
    }
}
