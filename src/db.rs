//! Database schema and the SQLite receipt store

use std::cell::Cell;

use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::calculator::receipt_kilos;
use crate::error::{ReceiptError, Result};
use crate::models::{Chemical, ChemicalFields, Receipt, ReceiptDraft, ReceiptField};
use crate::store::{ReceiptStore, SnapshotCallback, Subscribers, Subscription};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Receipts; chemical quantities are kept as entered
        CREATE TABLE IF NOT EXISTS receipts (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            dmp TEXT NOT NULL DEFAULT '',
            h3po4 TEXT NOT NULL DEFAULT '',
            color TEXT NOT NULL DEFAULT '',
            yellow TEXT NOT NULL DEFAULT '',
            blue TEXT NOT NULL DEFAULT '',
            kilos REAL NOT NULL DEFAULT 0,
            litre TEXT NOT NULL DEFAULT ''
        );

        -- Accounts
        CREATE TABLE IF NOT EXISTS users (
            uid TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            display_name TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        -- Signed-in sessions
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            uid TEXT NOT NULL REFERENCES users(uid) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_receipts_name ON receipts(name);
        CREATE INDEX IF NOT EXISTS idx_sessions_uid ON sessions(uid);
        "#,
    )?;
    Ok(())
}

const RECEIPT_COLUMNS: &str = "id, name, dmp, h3po4, color, yellow, blue, kilos, litre";

fn column(chemical: Chemical) -> &'static str {
    match chemical {
        Chemical::Dmp => "dmp",
        Chemical::H3po4 => "h3po4",
        Chemical::Color => "color",
        Chemical::Yellow => "yellow",
        Chemical::Blue => "blue",
    }
}

fn receipt_from_row(row: &Row<'_>) -> rusqlite::Result<Receipt> {
    Ok(Receipt {
        id: row.get(0)?,
        name: row.get(1)?,
        chemicals: ChemicalFields {
            dmp: row.get(2)?,
            h3po4: row.get(3)?,
            color: row.get(4)?,
            yellow: row.get(5)?,
            blue: row.get(6)?,
        },
        kilos: row.get(7)?,
        litre: row.get(8)?,
    })
}

/// Receipt store backed by a SQLite connection
pub struct SqliteReceiptStore {
    conn: Connection,
    subscribers: Subscribers,
    data_version: Cell<i64>,
}

impl SqliteReceiptStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        let version = data_version(&conn)?;
        Ok(Self {
            conn,
            subscribers: Subscribers::new(),
            data_version: Cell::new(version),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Notify subscribers if another connection has committed since the
    /// last check. Returns whether a change was seen.
    pub fn poll_external_changes(&self) -> Result<bool> {
        let version = data_version(&self.conn)?;
        if version == self.data_version.replace(version) {
            return Ok(false);
        }
        debug!(version, "external change detected");
        self.publish()?;
        Ok(true)
    }

    /// Delete every receipt
    pub fn clear(&self) -> Result<()> {
        let removed = self.conn.execute("DELETE FROM receipts", [])?;
        info!(removed, "receipts cleared");
        self.publish()
    }

    fn publish(&self) -> Result<()> {
        if self.subscribers.is_empty() {
            return Ok(());
        }
        let snapshot = self.list()?;
        self.subscribers.notify(&snapshot);
        Ok(())
    }

    fn require(&self, id: &str) -> Result<Receipt> {
        self.get(id)?.ok_or_else(|| ReceiptError::NotFound(id.to_string()))
    }
}

fn data_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
}

impl ReceiptStore for SqliteReceiptStore {
    fn create(&self, draft: &ReceiptDraft) -> Result<Receipt> {
        self.put(&Uuid::new_v4().to_string(), draft)
    }

    fn put(&self, id: &str, draft: &ReceiptDraft) -> Result<Receipt> {
        let kilos = receipt_kilos(&draft.chemicals);
        let c = &draft.chemicals;
        self.conn.execute(
            "INSERT OR REPLACE INTO receipts (id, name, dmp, h3po4, color, yellow, blue, kilos, litre)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            (
                id,
                &draft.name,
                &c.dmp,
                &c.h3po4,
                &c.color,
                &c.yellow,
                &c.blue,
                kilos,
                &draft.litre,
            ),
        )?;
        info!(id, name = %draft.name, kilos, "receipt saved");

        self.publish()?;
        Ok(Receipt {
            id: id.to_string(),
            name: draft.name.clone(),
            chemicals: draft.chemicals.clone(),
            kilos,
            litre: draft.litre.clone(),
        })
    }

    fn get(&self, id: &str) -> Result<Option<Receipt>> {
        debug!(id, "loading receipt");
        let receipt = self
            .conn
            .query_row(
                &format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE id = ?1"),
                [id],
                receipt_from_row,
            )
            .optional()?;
        Ok(receipt)
    }

    fn list(&self) -> Result<Vec<Receipt>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RECEIPT_COLUMNS} FROM receipts ORDER BY name, id"))?;

        let rows = stmt.query_map([], receipt_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        debug!(count = results.len(), "listed receipts");
        Ok(results)
    }

    fn update_field(&self, id: &str, field: ReceiptField, value: &str) -> Result<Receipt> {
        let mut receipt = self.require(id)?;

        let changed = match field {
            ReceiptField::Name => {
                receipt.name = value.to_string();
                self.conn
                    .execute("UPDATE receipts SET name = ?1 WHERE id = ?2", (value, id))?
            }
            ReceiptField::Litre => {
                receipt.litre = value.to_string();
                self.conn
                    .execute("UPDATE receipts SET litre = ?1 WHERE id = ?2", (value, id))?
            }
            ReceiptField::Chemical(chemical) => {
                receipt.chemicals.set(chemical, value);
                receipt.kilos = receipt_kilos(&receipt.chemicals);
                self.conn.execute(
                    &format!(
                        "UPDATE receipts SET {} = ?1, kilos = ?2 WHERE id = ?3",
                        column(chemical)
                    ),
                    (value, receipt.kilos, id),
                )?
            }
        };
        // The row can vanish between the read and the write
        if changed == 0 {
            return Err(ReceiptError::NotFound(id.to_string()));
        }
        info!(id, ?field, "receipt updated");

        self.publish()?;
        Ok(receipt)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let removed = self.conn.execute("DELETE FROM receipts WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(ReceiptError::NotFound(id.to_string()));
        }
        info!(id, "receipt deleted");
        self.publish()
    }

    fn subscribe(&self, callback: SnapshotCallback) -> Result<Subscription> {
        let snapshot = self.list()?;
        callback(&snapshot);
        Ok(self.subscribers.add(callback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, dmp: &str, blue: &str) -> ReceiptDraft {
        let mut chemicals = ChemicalFields::default();
        chemicals.set(Chemical::Dmp, dmp);
        chemicals.set(Chemical::Blue, blue);
        ReceiptDraft {
            name: name.to_string(),
            chemicals,
            litre: "10".to_string(),
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn create_stores_derived_kilos() {
        let store = SqliteReceiptStore::open_in_memory().unwrap();
        let receipt = store.create(&draft("Mix A", "10", "2.5")).unwrap();
        assert_eq!(receipt.kilos, 12.5);

        let loaded = store.get(&receipt.id).unwrap().unwrap();
        assert_eq!(loaded, receipt);
    }

    #[test]
    fn chemical_edit_recomputes_kilos() {
        let store = SqliteReceiptStore::open_in_memory().unwrap();
        let receipt = store.create(&draft("Mix A", "10", "")).unwrap();

        let updated = store
            .update_field(&receipt.id, ReceiptField::Chemical(Chemical::Yellow), "5")
            .unwrap();
        assert_eq!(updated.kilos, 15.0);
        assert_eq!(store.get(&receipt.id).unwrap().unwrap().kilos, 15.0);

        let renamed = store
            .update_field(&receipt.id, ReceiptField::Name, "Mix B")
            .unwrap();
        assert_eq!(renamed.kilos, 15.0);
        assert_eq!(renamed.name, "Mix B");
    }

    #[test]
    fn missing_receipts_are_reported() {
        let store = SqliteReceiptStore::open_in_memory().unwrap();
        assert!(store.get("nope").unwrap().is_none());
        assert!(matches!(
            store.update_field("nope", ReceiptField::Litre, "1"),
            Err(ReceiptError::NotFound(_))
        ));
        assert!(matches!(store.delete("nope"), Err(ReceiptError::NotFound(_))));
    }

    #[test]
    fn update_of_vanished_row_is_not_found_and_silent() {
        let store = SqliteReceiptStore::open_in_memory().unwrap();
        let receipt = store.create(&draft("Mix A", "10", "")).unwrap();

        let notified = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = std::sync::Arc::clone(&notified);
        let _subscription = store
            .subscribe(std::sync::Arc::new(move |_: &[Receipt]| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }))
            .unwrap();

        // Every UPDATE now skips its row, as if another connection deleted it
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER skip_updates BEFORE UPDATE ON receipts
                 BEGIN SELECT RAISE(IGNORE); END;",
            )
            .unwrap();

        for field in [
            ReceiptField::Name,
            ReceiptField::Litre,
            ReceiptField::Chemical(Chemical::Yellow),
        ] {
            assert!(matches!(
                store.update_field(&receipt.id, field, "5"),
                Err(ReceiptError::NotFound(_))
            ));
        }
        assert_eq!(notified.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(store.get(&receipt.id).unwrap().unwrap(), receipt);
    }

    #[test]
    fn external_poll_without_changes_is_quiet() {
        let store = SqliteReceiptStore::open_in_memory().unwrap();
        assert!(!store.poll_external_changes().unwrap());
    }
}
