use super::{MetricIdentity, Sample, SampleStore};
use crate::error::Result;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const DATABASE_FILE: &str = "samples.db";
const DIRECTORY_MODE: u32 = 0o770;
const FILE_MODE: u32 = 0o660;

/// Keeps the most recent sample per (instance, metric) in a SQLite file
/// under the configured state directory.
pub struct SqliteSampleStore {
    root: PathBuf,
    db_path: PathBuf,
}

impl SqliteSampleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let db_path = root.join(DATABASE_FILE);
        Self { root, db_path }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn ensure_root_directory(&self) -> Result<()> {
        if self.root.is_dir() {
            return Ok(());
        }
        debug!("Creating sample directory {}", self.root.display());
        create_restricted_dir(&self.root)?;
        Ok(())
    }

    fn get_connection(&self, flags: OpenFlags) -> rusqlite::Result<Connection> {
        let conn = Connection::open_with_flags(&self.db_path, flags)?;
        conn.busy_timeout(Duration::from_millis(500))?;
        Ok(conn)
    }

    fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS samples (
                instance TEXT NOT NULL,
                metric TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                raw_value REAL NOT NULL,
                PRIMARY KEY (instance, metric)
            )",
            [],
        )?;
        Ok(())
    }

    fn read(&self, identity: &MetricIdentity) -> Result<Option<Sample>> {
        if !self.db_path.exists() {
            return Ok(None);
        }

        let conn = self.get_connection(OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let sample = conn
            .query_row(
                "SELECT timestamp, raw_value FROM samples WHERE instance = ?1 AND metric = ?2",
                params![identity.instance_name, identity.metric_name],
                |row| {
                    Ok(Sample {
                        timestamp: row.get(0)?,
                        raw_value: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(sample)
    }

    fn prepare_writable(&self) -> rusqlite::Result<Connection> {
        let conn = self.get_connection(
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        Self::create_tables(&conn)?;
        Ok(conn)
    }

    /// Opens the database for writing. A file SQLite rejects as corrupt only
    /// holds replaceable samples, so it is recreated instead of failing
    /// every later save.
    fn open_writable(&self) -> Result<Connection> {
        let mut created = !self.db_path.exists();
        let conn = match self.prepare_writable() {
            Err(e) if is_corrupt(&e) => {
                warn!(
                    "Recreating corrupt sample database {}: {}",
                    self.db_path.display(),
                    e
                );
                self.remove_database()?;
                created = true;
                self.prepare_writable()?
            }
            other => other?,
        };
        if created {
            restrict_permissions(&self.db_path, FILE_MODE)?;
        }
        Ok(conn)
    }

    fn remove_database(&self) -> std::io::Result<()> {
        fs::remove_file(&self.db_path)?;
        // a leftover journal would be replayed into the fresh file
        let journal = self.db_path.with_file_name(format!("{DATABASE_FILE}-journal"));
        match fs::remove_file(journal) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

fn is_corrupt(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
    )
}

impl SampleStore for SqliteSampleStore {
    fn load(&self, identity: &MetricIdentity) -> Option<Sample> {
        match self.read(identity) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(
                    "Ignoring unreadable sample for {}/{}: {}",
                    identity.instance_name, identity.metric_name, e
                );
                None
            }
        }
    }

    fn save(&self, identity: &MetricIdentity, sample: &Sample) -> Result<()> {
        self.ensure_root_directory()?;

        let mut conn = self.open_writable()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO samples (instance, metric, timestamp, raw_value)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(instance, metric)
             DO UPDATE SET timestamp = excluded.timestamp, raw_value = excluded.raw_value",
            params![
                identity.instance_name,
                identity.metric_name,
                sample.timestamp,
                sample.raw_value
            ],
        )?;
        tx.commit()?;

        debug!(
            "Saved sample {} for {}/{}",
            sample.raw_value, identity.instance_name, identity.metric_name
        );
        Ok(())
    }
}

#[cfg(unix)]
fn create_restricted_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(DIRECTORY_MODE)
        .create(path)?;
    // the umask may have masked group bits
    restrict_permissions(path, DIRECTORY_MODE)
}

#[cfg(not(unix))]
fn create_restricted_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
