//! # Statement Analytics
//!
//! A library for turning a delimited bank-statement export into the data
//! behind an interactive report: headline totals, time-bucketed flow
//! statistics, a gap-filled daily balance series, week/month balance
//! summaries, ranked counterparties and categories, and a generic sortable
//! table over any of the derived collections.
//!
//! ## Core concepts
//!
//! - **Canonicalization**: known spellings of the account holder's own name
//!   collapse into one "My Transfers" bucket before any grouping.
//! - **Gap-filled series**: the daily balance series covers every calendar
//!   day between the first and last booking date, carrying the last known
//!   balance into days without transactions.
//! - **ISO weeks**: weekly balance summaries use ISO-8601 week numbering,
//!   attributed to the ISO week-year.
//! - **One report per load**: `analyze` builds a single immutable
//!   [`AnalysisReport`]; a new input replaces it wholesale.
//!
//! ## Example
//!
//! ```rust,ignore
//! use statement_analytics::{AnalyzerConfig, StatementAnalyzer};
//!
//! let mut config = AnalyzerConfig::default();
//! config.self_aliases = vec!["Jane Doe".to_string(), "JANE DOE".to_string()];
//!
//! let text = std::fs::read_to_string("statement.csv")?;
//! let report = StatementAnalyzer::new(config).analyze_text(&text)?;
//! println!("net flow: {:.2}", report.basic.net_flow);
//! ```

pub mod engine;
pub mod error;
pub mod ingestion;
pub mod schema;
pub mod table;
pub mod utils;

pub use engine::{analyze, Aggregator, UNNAMED_COUNTERPARTY};
pub use error::{AnalyticsError, Result};
pub use ingestion::{canonicalize, parse_statement};
pub use schema::*;
pub use table::{
    rows_from_serialize, CellRenderer, Column, ColumnKind, Row, RowStyler, RowView,
    SortDirection, SortSpec, Table, TableState, Viewport,
};

use log::{debug, info};

/// Configured entry point: parse, canonicalize, aggregate.
pub struct StatementAnalyzer {
    config: AnalyzerConfig,
}

impl StatementAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Runs the whole pipeline on raw delimited text. Synchronous and
    /// single-pass; the report is complete when this returns.
    pub fn analyze_text(&self, text: &str) -> Result<AnalysisReport> {
        validate_config(&self.config)?;

        let records = ingestion::parse_statement(text, &self.config.columns)?;
        info!("Loaded {} statement records", records.len());

        let canonical = ingestion::canonicalize(&records, &self.config);
        debug!(
            "Canonicalized records with {} self aliases and {} category renames",
            self.config.self_aliases.len(),
            self.config.category_display.len()
        );

        engine::analyze(&canonical, &self.config)
    }
}

/// Runs the pipeline with the default configuration.
pub fn analyze_statement(text: &str) -> Result<AnalysisReport> {
    StatementAnalyzer::new(AnalyzerConfig::default()).analyze_text(text)
}

fn validate_config(config: &AnalyzerConfig) -> Result<()> {
    if config.self_aliases.iter().any(|a| a.trim().is_empty()) {
        return Err(AnalyticsError::InvalidConfig {
            field: "self_aliases".to_string(),
            details: "alias entries must not be blank".to_string(),
        });
    }

    if config.self_label.trim().is_empty() {
        return Err(AnalyticsError::InvalidConfig {
            field: "self_label".to_string(),
            details: "canonical label must not be blank".to_string(),
        });
    }

    for (field, limit) in [
        ("top_counterparties", config.top_counterparties),
        ("top_currencies", config.top_currencies),
        ("top_categories", config.top_categories),
        ("top_transactions", config.top_transactions),
    ] {
        if limit == 0 {
            return Err(AnalyticsError::InvalidConfig {
                field: field.to_string(),
                details: "top-N limit must be at least 1".to_string(),
            });
        }
    }

    if config.columns.delimiter.as_bytes().len() != 1 {
        return Err(AnalyticsError::InvalidDelimiter(
            config.columns.delimiter.clone(),
        ));
    }

    Ok(())
}
