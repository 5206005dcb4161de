use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, TransactionBehavior};

use crate::error::{Error, Result};
use crate::model::ContactRecord;

/// Durable, keyed store for contact records, backed by a single SQLite
/// table. One handle is meant to be shared (`Arc<ContactStore>`) across
/// concurrent readers and writers; the interior lock serializes access so
/// a read sees a record either before or after a write, never mid-write.
pub struct ContactStore {
    conn: Mutex<Connection>,
}

const UPSERT_SQL: &str = r#"
    INSERT INTO contacts (
      id, source_seed, source_results, source_page, source_version,
      gender, name_title, first_name, last_name, email, phone, cell,
      external_id_name, external_id_value,
      picture_large, picture_medium, picture_thumbnail
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
    ON CONFLICT(id) DO UPDATE SET
      source_seed=excluded.source_seed,
      source_results=excluded.source_results,
      source_page=excluded.source_page,
      source_version=excluded.source_version,
      gender=excluded.gender,
      name_title=excluded.name_title,
      first_name=excluded.first_name,
      last_name=excluded.last_name,
      email=excluded.email,
      phone=excluded.phone,
      cell=excluded.cell,
      external_id_name=excluded.external_id_name,
      external_id_value=excluded.external_id_value,
      picture_large=excluded.picture_large,
      picture_medium=excluded.picture_medium,
      picture_thumbnail=excluded.picture_thumbnail
"#;

const SELECT_COLUMNS: &str = "id, source_seed, source_results, source_page, source_version, \
     gender, name_title, first_name, last_name, email, phone, cell, \
     external_id_name, external_id_value, picture_large, picture_medium, picture_thumbnail";

impl ContactStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::storage(format!("create {}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.setup()?;
        Ok(store)
    }

    fn setup(&self) -> Result<()> {
        let conn = self.lock();
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "FULL")?;

        // AUTOINCREMENT keeps assigned ids strictly increasing and never
        // reused, whatever order inserts interleave in.
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS contacts (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              source_seed    TEXT,
              source_results INTEGER,
              source_page    INTEGER,
              source_version TEXT,
              gender     TEXT,
              name_title TEXT,
              first_name TEXT,
              last_name  TEXT,
              email      TEXT,
              phone      TEXT,
              cell       TEXT,
              external_id_name  TEXT,
              external_id_value TEXT,
              picture_large     TEXT,
              picture_medium    TEXT,
              picture_thumbnail TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_contacts_first_name ON contacts(first_name);
            CREATE INDEX IF NOT EXISTS idx_contacts_last_name ON contacts(last_name);
        "#,
        )?;
        Ok(())
    }

    // Recover the guard even if a previous caller panicked mid-operation.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write a batch of records in one transaction. Records carrying an id
    /// replace the stored record with that id wholesale; records without
    /// one are inserted under a fresh id. The batch commits or rolls back
    /// as a unit.
    pub fn upsert_many(&self, records: &[ContactRecord]) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare(UPSERT_SQL)?;
            for record in records {
                stmt.execute(params![
                    record.id,
                    record.source_seed,
                    record.source_results,
                    record.source_page,
                    record.source_version,
                    record.gender,
                    record.name_title,
                    record.first_name,
                    record.last_name,
                    record.email,
                    record.phone,
                    record.cell,
                    record.external_id_name,
                    record.external_id_value,
                    record.picture_large,
                    record.picture_medium,
                    record.picture_thumbnail,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_one(&self, record: &ContactRecord) -> Result<()> {
        self.upsert_many(std::slice::from_ref(record))
    }

    /// Full snapshot of every stored record, in storage order.
    pub fn get_all(&self) -> Result<Vec<ContactRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM contacts", SELECT_COLUMNS))?;
        let rows = stmt.query_map([], row_to_record)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Point lookup by id. Absence is not an error.
    pub fn get_by_id(&self, id: i64) -> Result<Option<ContactRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM contacts WHERE id = ?1",
            SELECT_COLUMNS
        ))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(row_to_record(row)?));
        }
        Ok(None)
    }

    /// Replace the stored record bearing `record.id`. The id must be set
    /// and must already exist.
    pub fn update_one(&self, record: &ContactRecord) -> Result<()> {
        let id = record
            .id
            .ok_or_else(|| Error::validation("record has no id"))?;
        let conn = self.lock();
        let changed = conn.execute(
            r#"
            UPDATE contacts SET
              source_seed=?1, source_results=?2, source_page=?3, source_version=?4,
              gender=?5, name_title=?6, first_name=?7, last_name=?8,
              email=?9, phone=?10, cell=?11,
              external_id_name=?12, external_id_value=?13,
              picture_large=?14, picture_medium=?15, picture_thumbnail=?16
            WHERE id = ?17
        "#,
            params![
                record.source_seed,
                record.source_results,
                record.source_page,
                record.source_version,
                record.gender,
                record.name_title,
                record.first_name,
                record.last_name,
                record.email,
                record.phone,
                record.cell,
                record.external_id_name,
                record.external_id_value,
                record.picture_large,
                record.picture_medium,
                record.picture_thumbnail,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }

    /// Insert as a new record, ignoring any id on the input, and return the
    /// stored record with the id the store assigned.
    pub fn insert(&self, record: &ContactRecord) -> Result<ContactRecord> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO contacts (
              source_seed, source_results, source_page, source_version,
              gender, name_title, first_name, last_name, email, phone, cell,
              external_id_name, external_id_value,
              picture_large, picture_medium, picture_thumbnail
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        "#,
            params![
                record.source_seed,
                record.source_results,
                record.source_page,
                record.source_version,
                record.gender,
                record.name_title,
                record.first_name,
                record.last_name,
                record.email,
                record.phone,
                record.cell,
                record.external_id_name,
                record.external_id_value,
                record.picture_large,
                record.picture_medium,
                record.picture_thumbnail,
            ],
        )?;
        let mut stored = record.clone();
        stored.id = Some(conn.last_insert_rowid());
        Ok(stored)
    }

    /// Listing query: name-ordered, optionally filtered by a
    /// case-insensitive substring over first or last name.
    pub fn list(&self, filter: Option<&str>) -> Result<Vec<ContactRecord>> {
        let filter = filter.map(str::trim).filter(|f| !f.is_empty());

        let mut sql = format!("SELECT {} FROM contacts", SELECT_COLUMNS);
        let mut args: Vec<String> = Vec::new();
        if let Some(filter) = filter {
            sql.push_str(
                " WHERE first_name LIKE ?1 ESCAPE '\\' OR last_name LIKE ?1 ESCAPE '\\'",
            );
            args.push(like_pattern(filter));
        }
        sql.push_str(" ORDER BY first_name COLLATE NOCASE, last_name COLLATE NOCASE, id");

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = if args.is_empty() {
            stmt.query_map([], row_to_record)?
        } else {
            stmt.query_map([args[0].as_str()], row_to_record)?
        };

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM contacts", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContactRecord> {
    Ok(ContactRecord {
        id: row.get(0)?,
        source_seed: row.get(1)?,
        source_results: row.get(2)?,
        source_page: row.get(3)?,
        source_version: row.get(4)?,
        gender: row.get(5)?,
        name_title: row.get(6)?,
        first_name: row.get(7)?,
        last_name: row.get(8)?,
        email: row.get(9)?,
        phone: row.get(10)?,
        cell: row.get(11)?,
        external_id_name: row.get(12)?,
        external_id_value: row.get(13)?,
        picture_large: row.get(14)?,
        picture_medium: row.get(15)?,
        picture_thumbnail: row.get(16)?,
    })
}

fn like_pattern(filter: &str) -> String {
    let escaped = filter
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
