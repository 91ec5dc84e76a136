//! Service facade wiring sync, indexing, and search together.
//!
//! [`DocsHarness`] is what the CLI, the HTTP server, and the MCP bridge hold.
//! It owns the only [`Indexer`], so every refresh goes through the same
//! rebuild lock.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::indexer::Indexer;
use crate::migrate;
use crate::models::RebuildReport;
use crate::parser::DocumentParser;
use crate::search::SearchEngine;
use crate::store::IndexStore;
use crate::sync::{self, SourceSync};
use crate::taxonomy::PathTaxonomy;

/// Caller-facing result of a refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    pub success: bool,
    pub message: String,
    pub indexed: usize,
    pub skipped: usize,
}

impl RefreshOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            indexed: 0,
            skipped: 0,
        }
    }
}

pub struct DocsHarness {
    config: Arc<Config>,
    store: IndexStore,
    search: SearchEngine,
    indexer: Indexer,
    source: Arc<dyn SourceSync>,
}

impl DocsHarness {
    /// Open the store and wire the components. Does not touch the mirror.
    pub async fn open(config: Arc<Config>) -> Result<Self> {
        let source: Arc<dyn SourceSync> = Arc::from(sync::from_config(&config.source));
        Self::with_source(config, source).await
    }

    /// Like [`open`](Self::open) with an explicit sync implementation.
    pub async fn with_source(config: Arc<Config>, source: Arc<dyn SourceSync>) -> Result<Self> {
        let pool = migrate::run_migrations(&config)
            .await
            .context("Failed to open index database")?;
        Self::from_parts(config, pool, source)
    }

    fn from_parts(config: Arc<Config>, pool: SqlitePool, source: Arc<dyn SourceSync>) -> Result<Self> {
        let store = IndexStore::new(pool.clone());
        let parser = DocumentParser::new(Arc::new(PathTaxonomy::new(
            config.source.root_marker.clone(),
        )));
        let indexer = Indexer::new(&config, store.clone(), parser)
            .context("Invalid source glob configuration")?;
        let search = SearchEngine::new(pool, &config);

        Ok(Self {
            config,
            store,
            search,
            indexer,
            source,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn search(&self) -> &SearchEngine {
        &self.search
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Make the mirror ready and build the index if the store is empty.
    ///
    /// A mirror that cannot be made ready is logged; the process keeps
    /// serving whatever the store already holds.
    pub async fn initialize(&self) -> Result<()> {
        let source = self.source.clone();
        let ready = tokio::task::spawn_blocking(move || source.ensure_ready()).await?;
        if !ready {
            warn!(
                path = %self.source.docs_dir().display(),
                "documentation source is not ready"
            );
            return Ok(());
        }

        if self.store.is_empty().await? {
            info!("index is empty, building");
            let report = self.rebuild_index().await?;
            if !report.replaced {
                warn!("initial build parsed no documents");
            }
        }
        Ok(())
    }

    /// Rebuild from the current mirror without syncing it.
    pub async fn rebuild_index(&self) -> Result<RebuildReport> {
        let report = self.indexer.rebuild(&self.source.docs_dir()).await?;
        Ok(report)
    }

    /// Sync the mirror, then rebuild the whole index.
    pub async fn refresh(&self) -> RefreshOutcome {
        let source = self.source.clone();
        let synced = match tokio::task::spawn_blocking(move || source.refresh()).await {
            Ok(ok) => ok,
            Err(err) => {
                error!(error = %err, "source update task failed");
                false
            }
        };
        if !synced {
            return RefreshOutcome::failed("Failed to update documentation source");
        }

        let report = match self.indexer.rebuild(&self.source.docs_dir()).await {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, "rebuild failed");
                return RefreshOutcome::failed(format!("Failed to rebuild search index: {}", err));
            }
        };

        if report.indexed == 0 {
            let message = if report.replaced {
                "No documents could be parsed; index is now empty"
            } else {
                "No documents could be parsed; previous index kept"
            };
            return RefreshOutcome {
                success: false,
                message: message.to_string(),
                indexed: 0,
                skipped: report.skipped,
            };
        }

        RefreshOutcome {
            success: true,
            message: format!(
                "Documentation refreshed: {} indexed, {} skipped",
                report.indexed, report.skipped
            ),
            indexed: report.indexed,
            skipped: report.skipped,
        }
    }
}
