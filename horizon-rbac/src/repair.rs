//! Repair scheduler: periodic reconciliation and table upkeep
//!
//! Background tasks:
//! - Reconciliation sweep over every known uid
//! - Compaction of the Delta tables (Delta backend only)
//! - Vacuum of unreferenced files, which makes deletions physical

use std::time::Duration;

#[cfg(feature = "delta")]
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::admin::{RoleService, SweepReport};
use crate::error::Result;

#[cfg(feature = "delta")]
use crate::{schema, store::DeltaStore};

/// Totals of one repair cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub sweep: SweepReport,
    pub tables_compacted: usize,
    pub files_vacuumed: usize,
}

/// Background repair scheduler
pub struct RepairScheduler {
    service: RoleService,
    #[cfg(feature = "delta")]
    store: Option<Arc<DeltaStore>>,
    handles: Vec<JoinHandle<()>>,
}

impl RepairScheduler {
    pub fn new(service: RoleService) -> Self {
        Self {
            service,
            #[cfg(feature = "delta")]
            store: None,
            handles: Vec::new(),
        }
    }

    /// Also maintain the tables behind a Delta-backed service
    #[cfg(feature = "delta")]
    pub fn with_delta_store(mut self, store: Arc<DeltaStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Start all background tasks
    ///
    /// - Sweep: every `interval`
    /// - Compaction: every 6 × `interval`
    /// - Vacuum: every 24 × `interval`
    pub fn start(&mut self, interval: Duration) {
        self.start_sweep(interval);
        #[cfg(feature = "delta")]
        {
            if self.store.is_some() {
                self.start_compaction(interval * 6);
                self.start_vacuum(interval * 24);
            }
        }
        info!(interval_secs = interval.as_secs(), "Repair scheduler started");
    }

    pub fn start_sweep(&mut self, interval: Duration) {
        let service = self.service.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match service.sweep().await {
                    Ok(report) => {
                        if report.repaired > 0 || report.failed > 0 {
                            info!(
                                checked = report.checked,
                                repaired = report.repaired,
                                failed = report.failed,
                                "Sweep done"
                            );
                        }
                    }
                    Err(e) => error!(error = ?e, "Sweep failed"),
                }
            }
        });
        self.handles.push(handle);
    }

    #[cfg(feature = "delta")]
    pub fn start_compaction(&mut self, interval: Duration) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for table_def in schema::all_tables() {
                    if let Err(e) = store.compact(table_def.name).await {
                        error!(table = table_def.name, error = ?e, "Compaction failed");
                    }
                }
            }
        });
        self.handles.push(handle);
    }

    #[cfg(feature = "delta")]
    pub fn start_vacuum(&mut self, interval: Duration) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let retention_hours = store.config().vacuum_retention_hours;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for table_def in schema::all_tables() {
                    match store.vacuum(table_def.name, retention_hours, false).await {
                        Ok(m) if m.files_deleted > 0 => {
                            info!(table = table_def.name, deleted = m.files_deleted, "Vacuum done")
                        }
                        Ok(_) => {}
                        Err(e) => error!(table = table_def.name, error = ?e, "Vacuum failed"),
                    }
                }
            }
        });
        self.handles.push(handle);
    }

    /// Run one full cycle now (useful for CLI or tests)
    pub async fn run_once(&self) -> Result<RepairReport> {
        info!("Running one-shot repair cycle");
        #[cfg_attr(not(feature = "delta"), allow(unused_mut))]
        let mut report = RepairReport {
            sweep: self.service.sweep().await?,
            ..Default::default()
        };

        #[cfg(feature = "delta")]
        {
            if let Some(store) = &self.store {
                let retention = store.config().vacuum_retention_hours;
                for table_def in schema::all_tables() {
                    store.compact(table_def.name).await?;
                    report.tables_compacted += 1;
                    report.files_vacuumed +=
                        store.vacuum(table_def.name, retention, false).await?.files_deleted;
                }
            }
        }

        info!(
            checked = report.sweep.checked,
            repaired = report.sweep.repaired,
            "Repair cycle complete"
        );
        Ok(report)
    }

    /// Stop all background tasks
    pub fn stop(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        info!("Repair scheduler stopped");
    }
}

impl Drop for RepairScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
