//! Store connection and pool management.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::migrate::Migrator;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Embedded migrations that are run automatically on open, one set per kind.
static METADATA_MIGRATOR: Migrator = sqlx::migrate!("./migrations/metadata");
static THUMBNAIL_MIGRATOR: Migrator = sqlx::migrate!("./migrations/thumbnails");

/// Which derived artifact a store holds. Each kind lives in its own file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Decoded EXIF tag sets
    Metadata,
    /// Encoded thumbnail bitmaps
    Thumbnails,
}
impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Metadata => "metadata",
            CacheKind::Thumbnails => "thumbnails",
        }
    }

    /// Name of the store file inside the cache directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            CacheKind::Metadata => "metadata.db",
            CacheKind::Thumbnails => "thumbnails.db",
        }
    }

    fn migrator(&self) -> &'static Migrator {
        match self {
            CacheKind::Metadata => &METADATA_MIGRATOR,
            CacheKind::Thumbnails => &THUMBNAIL_MIGRATOR,
        }
    }
}
impl Display for CacheKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Tunables for opening a [`Store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// How long a connection waits on a locked database before giving up.
    pub busy_timeout: Duration,
    pub max_connections: u32,
}
impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(1500),
            max_connections: 5,
        }
    }
}

/// Connection pool for one cache store.
///
/// Reads go straight to the pool and run concurrently. Writes must hold the
/// store's write lock (see [`Store::write_lock`]) since SQLite only ever has
/// one writer.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    kind: CacheKind,
    writer: Arc<Mutex<()>>,
}

impl Store {
    async fn new(options: SqliteConnectOptions, kind: CacheKind, max: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Query-based PRAGMAs are per connection, not per database.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let store = Self { pool, kind, writer: Arc::new(Mutex::new(())) };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open the store for `kind` inside `directory`.
    ///
    /// Creates the directory and the store file if they don't exist, then
    /// initializes the schema. Any failure along the way is reported as
    /// [`ErrorKind::StorageUnavailable`]; the store is not usable after that.
    #[instrument(skip(directory, options), fields(kind = %kind))]
    pub async fn open(directory: impl AsRef<Path>, kind: CacheKind, options: &StoreOptions) -> Result<Self> {
        let directory = directory.as_ref();
        tokio::fs::create_dir_all(directory)
            .await
            .or_raise(|| ErrorKind::StorageUnavailable(directory.to_path_buf()))?;
        let path = directory.join(kind.file_name());
        let sqlite = Self::base_options(options).filename(&path).create_if_missing(true);
        let store = Self::new(sqlite, kind, options.max_connections)
            .await
            .or_raise(|| ErrorKind::StorageUnavailable(path.clone()))?;
        tracing::info!(path = %path.display(), "Opened cache store");
        Ok(store)
    }

    /// Connect to an in-memory store (useful for testing).
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory(kind: CacheKind) -> Result<Self> {
        let options = Self::base_options(&StoreOptions::default()).filename(":memory:");
        // In-memory database must either use the same cache `.shared_cache(true)`,
        // or be limited to one connection. Otherwise parallel connections will
        // see different databases that contain different data.
        Self::new(options, kind, 1).await
    }

    /// Base connection options shared between file and in-memory stores.
    fn base_options(options: &StoreOptions) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // Enable WAL mode for better concurrent read performance
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            // PRAGMA synchronous = NORMAL (balance between safety and speed).
            // Losing the last few writes on power loss only costs a rebuild.
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(options.busy_timeout)
            // Space is reclaimed explicitly through `compact()`.
            .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::None)
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Create the schema for this store's kind.
    ///
    /// Called on every open; safe to call again at any time.
    #[instrument("initializing cache schema", skip(self), fields(kind = %self.kind))]
    pub async fn init_schema(&self) -> Result<()> {
        self.kind.migrator().run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Serialize a write against every other write to this store.
    pub(crate) async fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    /// Move the record keyed `from` to `to`, replacing whatever `to` held.
    ///
    /// Runs as one transaction under the write lock, so readers observe the
    /// record under exactly one of the two keys. Returns `false` (and changes
    /// nothing) when `from` has no record.
    pub(crate) async fn rename_key(
        &self,
        delete_sql: &'static str,
        rename_sql: &'static str,
        from: &str,
        to: &str,
    ) -> Result<bool> {
        let _guard = self.write_lock().await;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        if from != to {
            sqlx::query(delete_sql)
                .bind(to)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        let moved = sqlx::query(rename_sql)
            .bind(to)
            .bind(from)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?
            .rows_affected();
        if moved == 0 {
            tx.rollback().await.or_raise(|| ErrorKind::Database)?;
            return Ok(false);
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(true)
    }

    /// Reclaim unused pages.
    ///
    /// Blocks other writers while the database is rebuilt; logical contents
    /// are untouched.
    #[instrument("compacting cache store", skip(self), fields(kind = %self.kind))]
    pub async fn compact(&self) -> Result<()> {
        let _guard = self.write_lock().await;
        sqlx::query("VACUUM").execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Close the connection pool.
    ///
    /// This waits for all connections to be returned to the pool and then
    /// closes them. After calling this, the Store instance should not
    /// be used.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

/// Where the caches live on disk.
///
/// Implemented by whoever knows the application's cache location; the
/// directory for `name` is created on first use.
pub trait CacheDirectoryProvider: Send + Sync {
    fn cache_directory(&self, name: &str) -> Result<PathBuf>;
}

/// Places every cache in a sub-directory of one root directory.
#[derive(Debug, Clone)]
pub struct RootDirectory {
    root: PathBuf,
}
impl RootDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
impl CacheDirectoryProvider for RootDirectory {
    fn cache_directory(&self, name: &str) -> Result<PathBuf> {
        let directory = self.root.join(name);
        std::fs::create_dir_all(&directory).or_raise(|| ErrorKind::StorageUnavailable(directory.clone()))?;
        Ok(directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CacheKind::Metadata, "metadata")]
    #[case(CacheKind::Thumbnails, "thumbnails")]
    #[tokio::test]
    async fn test_connect_in_memory(#[case] kind: CacheKind, #[case] table: &str) {
        let store = Store::connect_in_memory(kind).await.unwrap();
        assert!(!store.pool().is_closed());
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_schema_init_is_idempotent() {
        let store = Store::connect_in_memory(CacheKind::Thumbnails).await.unwrap();
        // Running init again should succeed (already applied)
        store.init_schema().await.unwrap();
        store.init_schema().await.unwrap();
        store.close().await;
    }

    #[tokio::test]
    async fn test_pragmas_are_applied() {
        let store = Store::connect_in_memory(CacheKind::Metadata).await.unwrap();
        // Verify a PRAGMA set by after_connect().
        let row: (i64,) = sqlx::query_as("PRAGMA wal_autocheckpoint").fetch_one(store.pool()).await.unwrap();
        assert_eq!(row.0, 800, "WAL checkpoint should be 800");
        store.close().await;
    }

    #[tokio::test]
    async fn test_open_creates_directory_and_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let directory = temp_dir.path().join("nested").join("metadata");
        let store = Store::open(&directory, CacheKind::Metadata, &StoreOptions::default()).await.unwrap();
        assert!(directory.join("metadata.db").is_file());
        store.close().await;
        // Reopening an existing store runs the schema step again without complaint.
        let store = Store::open(&directory, CacheKind::Metadata, &StoreOptions::default()).await.unwrap();
        store.close().await;
    }

    #[tokio::test]
    async fn test_open_unavailable_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be.
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let err = Store::open(blocker.join("cache"), CacheKind::Thumbnails, &StoreOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_compact_on_empty_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path(), CacheKind::Thumbnails, &StoreOptions::default()).await.unwrap();
        store.compact().await.unwrap();
        store.close().await;
    }

    #[test]
    fn test_root_directory_creates_named_subdirectory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let provider = RootDirectory::new(temp_dir.path());
        let directory = provider.cache_directory("thumbnails").unwrap();
        assert_eq!(directory, temp_dir.path().join("thumbnails"));
        assert!(directory.is_dir());
    }
}
