//! DeltaStore: table layer under the Delta-backed identity and profile stores
//!
//! Provides ACID appends, predicate deletes, SQL reads and table maintenance.
//! All operations return `Result<T, PortalError>` (railway programming).
//!
//! A field change is a single `UPDATE` commit, so a failed write never
//! leaves a row missing. Read-check-write sequences hold [`DeltaStore::writer`]
//! so that writers of both tables run one at a time.

use std::sync::Arc;

use deltalake::arrow::array::RecordBatch;
use deltalake::kernel::StructField;
use deltalake::protocol::SaveMode;
use deltalake::writer::{DeltaWriter, RecordBatchWriter};
use deltalake::{open_table, DeltaTable};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use url::Url;

use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::schema;

/// Metrics returned by delete operations
#[derive(Debug, Clone)]
pub struct DeleteMetrics {
    pub num_deleted_rows: usize,
    pub new_version: i64,
}

/// Metrics returned by update operations
#[derive(Debug, Clone)]
pub struct UpdateMetrics {
    pub num_updated_rows: usize,
    pub new_version: i64,
}

/// Metrics returned by compact operations
#[derive(Debug, Clone)]
pub struct CompactMetrics {
    pub files_added: usize,
    pub files_removed: usize,
    pub new_version: i64,
}

/// Metrics returned by vacuum operations
#[derive(Debug, Clone)]
pub struct VacuumMetrics {
    pub files_deleted: usize,
    pub dry_run: bool,
}

/// Manages the portal tables under a base path
///
/// Thread-safe: can be shared across tokio tasks via `Arc<DeltaStore>`.
pub struct DeltaStore {
    config: PortalConfig,
    writer: Mutex<()>,
}

impl DeltaStore {
    /// Create a new DeltaStore and initialize all tables
    pub async fn new(config: PortalConfig) -> Result<Self> {
        let store = Self {
            config,
            writer: Mutex::new(()),
        };
        for table_def in schema::all_tables() {
            store
                .ensure_table(table_def.name, table_def.delta_fields, table_def.partition_columns)
                .await?;
        }
        info!(
            path = %store.config.base_path.display(),
            "Portal tables initialized"
        );
        Ok(store)
    }

    fn table_url(&self, name: &str) -> Result<Url> {
        let path = self.config.table_path(name);
        Url::from_directory_path(&path).map_err(|_| {
            PortalError::Config(format!("Invalid table path: {}", path.display()))
        })
    }

    /// Create a Delta table if it doesn't exist (idempotent)
    pub async fn ensure_table(
        &self,
        name: &str,
        fields: Vec<StructField>,
        partition_columns: Vec<String>,
    ) -> Result<()> {
        let url = self.table_url(name)?;

        if let Ok(table) = open_table(url.clone()).await {
            debug!(table = name, version = ?table.version(), "Table already exists");
            return Ok(());
        }

        std::fs::create_dir_all(self.config.table_path(name))?;

        let table = DeltaTable::try_from_url(url).await?;
        let mut builder = table
            .create()
            .with_table_name(name)
            .with_save_mode(SaveMode::Ignore)
            .with_columns(fields);

        if !partition_columns.is_empty() {
            builder = builder.with_partition_columns(partition_columns);
        }

        builder.await?;
        info!(table = name, "Created Delta table");
        Ok(())
    }

    // ─── Writes ───

    /// Exclusive write access to every table of this store
    ///
    /// `append`, `update` and `delete` do not take it themselves; callers hold
    /// it across their existence checks and the commit that depends on them.
    pub async fn writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    /// Append records to a table (ACID transaction)
    ///
    /// Returns the new table version after the write.
    pub async fn append(&self, table_name: &str, batch: RecordBatch) -> Result<i64> {
        let url = self.table_url(table_name)?;
        let mut table = open_table(url).await?;

        let mut writer = RecordBatchWriter::for_table(&table)?;
        writer.write(batch).await?;
        let version = writer.flush_and_commit(&mut table).await?;

        debug!(table = table_name, version, "Appended records");
        Ok(version as i64)
    }

    /// Delete rows matching a SQL predicate
    pub async fn delete(&self, table_name: &str, predicate: &str) -> Result<DeleteMetrics> {
        let url = self.table_url(table_name)?;
        let table = open_table(url).await?;

        let (result_table, metrics) = table.delete().with_predicate(predicate).await?;
        let version = result_table.version().unwrap_or(-1);

        debug!(
            table = table_name,
            deleted = metrics.num_deleted_rows,
            version,
            "Deleted records"
        );

        Ok(DeleteMetrics {
            num_deleted_rows: metrics.num_deleted_rows,
            new_version: version,
        })
    }

    /// Set columns on the rows matching a SQL predicate, in one commit
    ///
    /// Each assignment is `(column, sql_expression)`; string values must be
    /// quoted with [`schema::sql_quote`].
    pub async fn update(
        &self,
        table_name: &str,
        predicate: &str,
        assignments: &[(&str, String)],
    ) -> Result<UpdateMetrics> {
        let url = self.table_url(table_name)?;
        let table = open_table(url).await?;

        let mut builder = table.update().with_predicate(predicate);
        for (column, expression) in assignments {
            builder = builder.with_update(*column, expression.clone());
        }
        let (result_table, metrics) = builder.await?;
        let version = result_table.version().unwrap_or(-1);

        debug!(
            table = table_name,
            updated = metrics.num_updated_rows,
            version,
            "Updated records"
        );

        Ok(UpdateMetrics {
            num_updated_rows: metrics.num_updated_rows,
            new_version: version,
        })
    }

    // ─── Reads ───

    /// Read all rows from a table (current version)
    pub async fn scan(&self, table_name: &str) -> Result<Vec<RecordBatch>> {
        self.sql(table_name, "SELECT * FROM t").await
    }

    /// Query a table with a SQL WHERE clause
    ///
    /// # Example
    /// ```rust,no_run
    /// # use horizon_rbac::store::DeltaStore;
    /// # async fn example(store: &DeltaStore) -> horizon_rbac::Result<()> {
    /// let admins = store.query("users", "role = 'admin'").await?;
    /// # Ok(()) }
    /// ```
    pub async fn query(&self, table_name: &str, sql_where: &str) -> Result<Vec<RecordBatch>> {
        self.sql(table_name, &format!("SELECT * FROM t WHERE {sql_where}"))
            .await
    }

    /// Full SQL query against the table registered as `t`
    pub async fn sql(&self, table_name: &str, sql: &str) -> Result<Vec<RecordBatch>> {
        let url = self.table_url(table_name)?;
        let table = open_table(url).await?;
        let table_provider: Arc<dyn deltalake::datafusion::catalog::TableProvider> =
            Arc::new(table);

        let ctx = deltalake::datafusion::prelude::SessionContext::new();
        ctx.register_table("t", table_provider)?;

        let batches = ctx.sql(sql).await?.collect().await?;
        debug!(table = table_name, sql, batches = batches.len(), "Query executed");
        Ok(batches)
    }

    /// Get the current version of a table
    pub async fn version(&self, table_name: &str) -> Result<i64> {
        let url = self.table_url(table_name)?;
        let table = open_table(url).await?;
        Ok(table.version().unwrap_or(0))
    }

    // ─── Maintenance ───

    /// Compact small files; every commit leaves one behind
    pub async fn compact(&self, table_name: &str) -> Result<CompactMetrics> {
        let _writer = self.writer().await;
        let url = self.table_url(table_name)?;
        let table = open_table(url).await?;

        let (new_table, metrics) = table.optimize().await?;
        let version = new_table.version().unwrap_or(-1);

        info!(
            table = table_name,
            files_added = metrics.num_files_added,
            files_removed = metrics.num_files_removed,
            "Compaction complete"
        );

        Ok(CompactMetrics {
            files_added: metrics.num_files_added as usize,
            files_removed: metrics.num_files_removed as usize,
            new_version: version,
        })
    }

    /// Vacuum files no longer referenced by the Delta log
    ///
    /// With `retention_hours = 0`, deleted identities are physically gone.
    pub async fn vacuum(
        &self,
        table_name: &str,
        retention_hours: u64,
        dry_run: bool,
    ) -> Result<VacuumMetrics> {
        let _writer = self.writer().await;
        let url = self.table_url(table_name)?;
        let table = open_table(url).await?;

        let retention = chrono::Duration::hours(retention_hours as i64);

        let (_, metrics) = table
            .vacuum()
            .with_retention_period(retention)
            .with_enforce_retention_duration(retention_hours > 0)
            .with_dry_run(dry_run)
            .await?;

        info!(
            table = table_name,
            retention_hours,
            dry_run,
            files_deleted = metrics.files_deleted.len(),
            "Vacuum complete"
        );

        Ok(VacuumMetrics {
            files_deleted: metrics.files_deleted.len(),
            dry_run,
        })
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }
}

// ─── Batch helpers ───

/// Iterate `(batch, row)` pairs across a query result
pub(crate) fn rows(batches: &[RecordBatch]) -> impl Iterator<Item = (&RecordBatch, usize)> {
    batches
        .iter()
        .flat_map(|b| (0..b.num_rows()).map(move |i| (b, i)))
}

/// Read a required string column by name
pub(crate) fn str_col(batch: &RecordBatch, name: &str, i: usize) -> Result<String> {
    use deltalake::arrow::array::{Array, StringArray};

    let col = batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| PortalError::Internal(format!("Schema error: {name}")))?;
    if col.is_null(i) {
        return Err(PortalError::Internal(format!("Unexpected null in {name}")));
    }
    Ok(col.value(i).to_string())
}

/// Read a nullable string column by name
pub(crate) fn opt_str_col(batch: &RecordBatch, name: &str, i: usize) -> Option<String> {
    use deltalake::arrow::array::{Array, StringArray};

    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .and_then(|a| if a.is_null(i) { None } else { Some(a.value(i).to_string()) })
}
