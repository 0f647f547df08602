// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer registry: persistent catalog of dispatch targets.
//
// Connection descriptors are validated against their type before any write,
// and names are unique among printers that have not been retired. Health
// fields (last success / failure / error) are written only by dispatch.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::{debug, info, instrument, warn};

use bonspool_core::error::{Result, SpoolError};
use bonspool_core::types::{
    NewPrinter, Printer, PrinterFilter, PrinterId, PrinterType, PrinterUpdate,
};

use crate::db::{db_err, format_ts, open_file, open_memory, parse_col, parse_opt_ts, parse_ts};

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS printers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        model TEXT,
        description TEXT,
        printer_type TEXT NOT NULL CHECK (printer_type IN ('physical', 'spool', 'usb')),
        connection TEXT NOT NULL,
        enabled INTEGER NOT NULL DEFAULT 1,
        timeout_ms INTEGER NOT NULL CHECK (timeout_ms > 0),
        retry_attempts INTEGER NOT NULL DEFAULT 0,
        last_success_at TEXT,
        last_failure_at TEXT,
        last_error TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_printers_active_name
        ON printers (name) WHERE deleted_at IS NULL;
"#;

const PRINTER_COLUMNS: &str = "id, name, model, description, printer_type, connection, enabled,
    timeout_ms, retry_attempts, last_success_at, last_failure_at, last_error,
    created_at, updated_at, deleted_at";

/// Used when neither the request nor the registry owner supplies a timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

pub struct PrinterRegistry {
    conn: Mutex<Connection>,
    default_timeout_ms: u64,
}

impl PrinterRegistry {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = open_file(path.as_ref())?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(db_err("create printers table"))?;
        info!("printer registry opened");
        Ok(Self {
            conn: Mutex::new(conn),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = open_memory()?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(db_err("create printers table"))?;
        debug!("in-memory printer registry opened");
        Ok(Self {
            conn: Mutex::new(conn),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        })
    }

    /// Timeout applied to printers registered without one.
    pub fn with_default_timeout(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SpoolError::Database("printer registry lock poisoned".into()))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub fn register(&self, request: NewPrinter) -> Result<Printer> {
        let printer = Printer::new(request, self.default_timeout_ms)?;
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err("begin register"))?;

        if fetch_by_name(&tx, &printer.name)?.is_some() {
            return Err(SpoolError::DuplicatePrinterName(printer.name));
        }

        let connection_json = serde_json::to_string(&printer.connection)?;
        tx.execute(
            &format!(
                "INSERT INTO printers ({PRINTER_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                printer.id.to_string(),
                printer.name,
                printer.model,
                printer.description,
                printer.printer_type.as_str(),
                connection_json,
                printer.enabled,
                printer.timeout_ms as i64,
                printer.retry_attempts,
                Option::<String>::None,
                Option::<String>::None,
                Option::<String>::None,
                format_ts(&printer.created_at),
                format_ts(&printer.updated_at),
                Option::<String>::None,
            ],
        )
        .map_err(db_err("insert printer"))?;
        tx.commit().map_err(db_err("commit register"))?;

        info!(
            printer_id = %printer.id,
            printer_type = %printer.printer_type,
            target = %printer.connection.target(),
            "printer registered"
        );
        Ok(printer)
    }

    /// Fetch an active printer. Retired printers read as absent.
    pub fn get(&self, id: &PrinterId) -> Result<Option<Printer>> {
        let conn = self.conn()?;
        fetch_by_id(&conn, id)
    }

    pub fn require(&self, id: &PrinterId) -> Result<Printer> {
        self.get(id)?.ok_or(SpoolError::PrinterNotFound(*id))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<Printer>> {
        let conn = self.conn()?;
        fetch_by_name(&conn, name.trim())
    }

    /// Active printers ordered by name.
    pub fn list(&self, filter: PrinterFilter) -> Result<Vec<Printer>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PRINTER_COLUMNS} FROM printers
                 WHERE deleted_at IS NULL
                   AND (?1 = 0 OR enabled = 1)
                   AND (?2 IS NULL OR printer_type = ?2)
                 ORDER BY name ASC"
            ))
            .map_err(db_err("prepare list printers"))?;
        let printers = stmt
            .query_map(
                params![
                    filter.enabled_only,
                    filter.printer_type.map(|t: PrinterType| t.as_str())
                ],
                row_to_printer,
            )
            .map_err(db_err("query list printers"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("collect printer rows"))?;
        debug!(count = printers.len(), "listed printers");
        Ok(printers)
    }

    /// Apply a partial update. Validation runs on the merged record before
    /// anything is written.
    #[instrument(skip(self, update), fields(printer_id = %id))]
    pub fn update(&self, id: &PrinterId, update: PrinterUpdate) -> Result<Printer> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err("begin update"))?;

        let mut printer = fetch_by_id(&tx, id)?.ok_or(SpoolError::PrinterNotFound(*id))?;
        let previous_name = printer.name.clone();
        printer.apply_update(update)?;

        if printer.name != previous_name {
            if let Some(other) = fetch_by_name(&tx, &printer.name)? {
                if other.id != printer.id {
                    return Err(SpoolError::DuplicatePrinterName(printer.name));
                }
            }
        }

        let connection_json = serde_json::to_string(&printer.connection)?;
        tx.execute(
            "UPDATE printers SET name = ?1, model = ?2, description = ?3, printer_type = ?4,
                connection = ?5, enabled = ?6, timeout_ms = ?7, retry_attempts = ?8,
                updated_at = ?9
             WHERE id = ?10 AND deleted_at IS NULL",
            params![
                printer.name,
                printer.model,
                printer.description,
                printer.printer_type.as_str(),
                connection_json,
                printer.enabled,
                printer.timeout_ms as i64,
                printer.retry_attempts,
                format_ts(&printer.updated_at),
                id.to_string(),
            ],
        )
        .map_err(db_err("update printer"))?;
        tx.commit().map_err(db_err("commit update"))?;

        info!(printer_id = %id, enabled = printer.enabled, "printer updated");
        Ok(printer)
    }

    /// Retire a printer. Jobs that reference it are left alone.
    #[instrument(skip(self), fields(printer_id = %id))]
    pub fn delete(&self, id: &PrinterId) -> Result<Printer> {
        let conn = self.conn()?;
        let mut printer = fetch_by_id(&conn, id)?.ok_or(SpoolError::PrinterNotFound(*id))?;
        let now = Utc::now();
        conn.execute(
            "UPDATE printers SET deleted_at = ?1, updated_at = ?1
             WHERE id = ?2 AND deleted_at IS NULL",
            params![format_ts(&now), id.to_string()],
        )
        .map_err(db_err("soft delete printer"))?;
        printer.deleted_at = Some(now);
        printer.updated_at = now;
        info!(printer_id = %id, name = %printer.name, "printer retired");
        Ok(printer)
    }

    /// Stamp a successful dispatch and clear the last error.
    pub(crate) fn record_success(&self, id: &PrinterId) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE printers SET last_success_at = ?1, last_error = NULL WHERE id = ?2",
            params![format_ts(&Utc::now()), id.to_string()],
        )
        .map_err(db_err("record printer success"))?;
        debug!(printer_id = %id, "printer success recorded");
        Ok(())
    }

    /// Stamp a failed dispatch with its message.
    pub(crate) fn record_failure(&self, id: &PrinterId, message: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE printers SET last_failure_at = ?1, last_error = ?2 WHERE id = ?3",
            params![format_ts(&Utc::now()), message, id.to_string()],
        )
        .map_err(db_err("record printer failure"))?;
        warn!(printer_id = %id, error = message, "printer failure recorded");
        Ok(())
    }
}

fn fetch_by_id(conn: &Connection, id: &PrinterId) -> Result<Option<Printer>> {
    conn.query_row(
        &format!("SELECT {PRINTER_COLUMNS} FROM printers WHERE id = ?1 AND deleted_at IS NULL"),
        params![id.to_string()],
        row_to_printer,
    )
    .optional()
    .map_err(db_err("get printer"))
}

fn fetch_by_name(conn: &Connection, name: &str) -> Result<Option<Printer>> {
    conn.query_row(
        &format!("SELECT {PRINTER_COLUMNS} FROM printers WHERE name = ?1 AND deleted_at IS NULL"),
        params![name],
        row_to_printer,
    )
    .optional()
    .map_err(db_err("get printer by name"))
}

fn row_to_printer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Printer> {
    let id: String = row.get(0)?;
    let printer_type: String = row.get(4)?;
    let connection_json: String = row.get(5)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    let connection = serde_json::from_str(&connection_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Printer {
        id: parse_col::<PrinterId>(0, &id)?,
        name: row.get(1)?,
        model: row.get(2)?,
        description: row.get(3)?,
        printer_type: parse_col::<PrinterType>(4, &printer_type)?,
        connection,
        enabled: row.get(6)?,
        timeout_ms: row.get::<_, i64>(7)?.max(1) as u64,
        retry_attempts: row.get(8)?,
        last_success_at: parse_opt_ts(9, row.get(9)?)?,
        last_failure_at: parse_opt_ts(10, row.get(10)?)?,
        last_error: row.get(11)?,
        created_at: parse_ts(12, &created_at)?,
        updated_at: parse_ts(13, &updated_at)?,
        deleted_at: parse_opt_ts(14, row.get(14)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bonspool_core::types::PrinterConnection;

    fn registry() -> PrinterRegistry {
        PrinterRegistry::open_in_memory().expect("open in-memory registry")
    }

    fn kitchen() -> NewPrinter {
        NewPrinter::new("kitchen", PrinterConnection::physical("192.168.1.40", 9100))
    }

    #[test]
    fn register_and_lookup_by_id_and_name() {
        let registry = registry();
        let printer = registry.register(kitchen()).expect("register");
        assert_eq!(printer.printer_type, PrinterType::Physical);
        assert_eq!(printer.timeout_ms, DEFAULT_TIMEOUT_MS);

        let by_id = registry.require(&printer.id).expect("by id");
        assert_eq!(by_id.name, "kitchen");
        assert_eq!(by_id.connection, printer.connection);
        let by_name = registry.get_by_name("kitchen").expect("by name").expect("found");
        assert_eq!(by_name.id, printer.id);
    }

    #[test]
    fn invalid_ports_and_hosts_are_rejected() {
        let registry = registry();
        for connection in [
            PrinterConnection::physical("192.168.1.40", 0),
            PrinterConnection::physical("192.168.1.40", 70000),
            PrinterConnection::physical("", 9100),
        ] {
            let result = registry.register(NewPrinter::new("bad", connection));
            assert!(matches!(result, Err(SpoolError::InvalidConfiguration(_))));
        }
        assert!(registry.list(PrinterFilter::default()).expect("list").is_empty());
    }

    #[test]
    fn names_are_unique_among_active_printers() {
        let registry = registry();
        let first = registry.register(kitchen()).expect("register");
        assert!(matches!(
            registry.register(kitchen()),
            Err(SpoolError::DuplicatePrinterName(_))
        ));

        registry.delete(&first.id).expect("retire");
        let replacement = registry.register(kitchen()).expect("name free again");
        assert_ne!(replacement.id, first.id);
    }

    #[test]
    fn rename_into_existing_name_is_refused() {
        let registry = registry();
        registry.register(kitchen()).expect("register");
        let bar = registry
            .register(NewPrinter::new("bar", PrinterConnection::physical("192.168.1.41", 9100)))
            .expect("register");
        let result = registry.update(
            &bar.id,
            PrinterUpdate {
                name: Some("kitchen".into()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(SpoolError::DuplicatePrinterName(_))));
        assert_eq!(registry.require(&bar.id).expect("bar").name, "bar");
    }

    #[test]
    fn invalid_update_leaves_record_untouched() {
        let registry = registry();
        let printer = registry.register(kitchen()).expect("register");
        let result = registry.update(
            &printer.id,
            PrinterUpdate {
                enabled: Some(false),
                connection: Some(PrinterConnection::spool("relative/path")),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(SpoolError::InvalidConfiguration(_))));
        let stored = registry.require(&printer.id).expect("printer");
        assert!(stored.enabled);
        assert_eq!(stored.connection, printer.connection);
    }

    #[test]
    fn list_filters_by_enabled_and_type() {
        let registry = registry();
        let kitchen = registry.register(kitchen()).expect("register");
        registry
            .register(NewPrinter::new("hq", PrinterConnection::spool("http://hq:8631")))
            .expect("register");
        registry
            .update(
                &kitchen.id,
                PrinterUpdate {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .expect("disable");

        let all = registry.list(PrinterFilter::default()).expect("all");
        assert_eq!(all.len(), 2);
        let enabled = registry
            .list(PrinterFilter {
                enabled_only: true,
                printer_type: None,
            })
            .expect("enabled");
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "hq");
        let physical = registry
            .list(PrinterFilter {
                enabled_only: false,
                printer_type: Some(PrinterType::Physical),
            })
            .expect("physical");
        assert_eq!(physical.len(), 1);
        assert_eq!(physical[0].id, kitchen.id);
    }

    #[test]
    fn health_bookkeeping() {
        let registry = registry();
        let printer = registry.register(kitchen()).expect("register");

        registry
            .record_failure(&printer.id, "TIMEOUT: no answer within 50ms")
            .expect("failure");
        let failed = registry.require(&printer.id).expect("printer");
        assert!(failed.last_failure_at.is_some());
        assert_eq!(failed.last_error.as_deref(), Some("TIMEOUT: no answer within 50ms"));

        registry.record_success(&printer.id).expect("success");
        let healthy = registry.require(&printer.id).expect("printer");
        assert!(healthy.last_success_at.is_some());
        assert!(healthy.last_error.is_none());
        assert!(healthy.last_failure_at.is_some());
    }

    #[test]
    fn configured_default_timeout_applies() {
        let registry = registry().with_default_timeout(1_500);
        let printer = registry.register(kitchen()).expect("register");
        assert_eq!(printer.timeout_ms, 1_500);
    }
}
