use std::path::Path;

use duckdb::{params, Appender, Connection};

use crate::record::Syscall;

/// Rows are bound positionally, so the append code below must stay in
/// column order.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS syscalls (
    trace_file VARCHAR,
    pid INTEGER,
    timestamp VARCHAR,
    syscall VARCHAR,
    args TEXT,
    return_value BIGINT,
    error_code VARCHAR,
    error_message VARCHAR,
    duration DOUBLE,
    unfinished BOOLEAN DEFAULT FALSE,
    resumed BOOLEAN DEFAULT FALSE
);
CREATE INDEX IF NOT EXISTS idx_syscall ON syscalls(syscall);
CREATE INDEX IF NOT EXISTS idx_pid ON syscalls(pid);
CREATE INDEX IF NOT EXISTS idx_error ON syscalls(error_code);
CREATE INDEX IF NOT EXISTS idx_trace_file ON syscalls(trace_file);
";

/// Handle on the syscall database: one connection plus the operations the
/// ingestion pipeline needs. The coordinator opens the instance; workers
/// get additional connections on it via [`Database::add_connection`].
pub struct Database {
    conn: Connection,
}

/// Headline numbers for the post-ingest summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbSummary {
    pub total_rows: usize,
    pub distinct_syscalls: usize,
    pub distinct_pids: usize,
    pub failed_syscalls: usize,
}

impl Database {
    /// Open (or create) the database at `path` and make sure the schema
    /// exists. `:memory:` works and is what the tests use.
    pub fn open<P: AsRef<Path>>(path: P) -> duckdb::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// A further connection on the same database instance. Each worker
    /// thread takes one; dropping it closes only that connection, the
    /// instance stays up until the coordinator's handle goes away.
    pub fn add_connection(&self) -> duckdb::Result<Self> {
        Ok(Self {
            conn: self.conn.try_clone()?,
        })
    }

    /// Start a bulk-append session on `syscalls`. The session borrows this
    /// handle; finish or drop it before beginning another.
    pub fn begin_append(&self) -> duckdb::Result<AppendSession<'_>> {
        Ok(AppendSession {
            appender: self.conn.appender("syscalls")?,
        })
    }

    pub fn summary(&self) -> duckdb::Result<DbSummary> {
        Ok(DbSummary {
            total_rows: self.count("SELECT COUNT(*) FROM syscalls")?,
            distinct_syscalls: self.count("SELECT COUNT(DISTINCT syscall) FROM syscalls")?,
            distinct_pids: self.count("SELECT COUNT(DISTINCT pid) FROM syscalls")?,
            failed_syscalls: self
                .count("SELECT COUNT(*) FROM syscalls WHERE error_code IS NOT NULL")?,
        })
    }

    fn count(&self, sql: &str) -> duckdb::Result<usize> {
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

/// One bulk-append session. Rows go through DuckDB's Appender API, which
/// is 10-100x faster than prepared INSERTs for this workload.
pub struct AppendSession<'conn> {
    appender: Appender<'conn>,
}

impl AppendSession<'_> {
    /// Emit one row in schema column order; absent optional fields are
    /// bound as SQL NULL.
    pub fn append(
        &mut self,
        trace_file: &str,
        pid: i32,
        syscall: &Syscall<'_>,
    ) -> duckdb::Result<()> {
        self.appender.append_row(params![
            trace_file,
            pid,
            syscall.timestamp,
            syscall.name,
            syscall.args,
            syscall.return_value,
            syscall.error_code,
            syscall.error_message,
            syscall.duration,
            syscall.unfinished,
            syscall.resumed,
        ])
    }

    /// Flush buffered rows and end the session.
    pub fn finish(mut self) -> duckdb::Result<()> {
        self.appender.flush()
    }
}
