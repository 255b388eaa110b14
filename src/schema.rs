use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One row of the statement export after type coercion. Fields that were
/// blank in the source are `None`; a date that failed to parse is also
/// `None`, which keeps the record in listings but out of every date-keyed
/// aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub booking_date: Option<NaiveDate>,
    pub counterparty: Option<String>,
    pub category: String,
    /// Signed amount in the reference currency. Positive = inflow.
    pub amount: Option<f64>,
    pub original_amount: Option<f64>,
    pub original_currency: Option<String>,
    pub exchange_rate: Option<f64>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct CategoryRename {
    #[schemars(description = "Raw category label as it appears in the export (e.g. 'Presentment')")]
    pub raw: String,

    #[schemars(description = "User-facing display label (e.g. 'Card Payment')")]
    pub display: String,
}

/// Header names expected in the export, plus the field delimiter.
/// Matching is case-sensitive.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ColumnMap {
    #[schemars(description = "Header of the booking date column, values in YYYY-MM-DD form")]
    pub date: String,

    #[schemars(description = "Header of the counterparty display-name column")]
    pub counterparty: String,

    #[schemars(description = "Header of the category/type label column")]
    pub category: String,

    #[schemars(description = "Header of the signed amount column in the reference currency")]
    pub amount: String,

    #[schemars(description = "Header of the optional original-amount column")]
    pub original_amount: String,

    #[schemars(description = "Header of the optional original-currency code column")]
    pub original_currency: String,

    #[schemars(description = "Header of the optional exchange-rate column")]
    pub exchange_rate: String,

    #[schemars(description = "Header of the free-text reference column")]
    pub reference: String,

    #[schemars(description = "Field delimiter, a single character (default ',')")]
    pub delimiter: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            date: "Date".to_string(),
            counterparty: "Counterparty".to_string(),
            category: "Type".to_string(),
            amount: "Amount".to_string(),
            original_amount: "Original Amount".to_string(),
            original_currency: "Original Currency".to_string(),
            exchange_rate: "Exchange Rate".to_string(),
            reference: "Reference".to_string(),
            delimiter: ",".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzerConfig {
    #[schemars(
        description = "Label reported for records whose original-currency field is blank"
    )]
    pub reference_currency: String,

    #[schemars(
        description = "Known spellings of the account holder's own name. A counterparty matching any entry (case-insensitive, exact) is rewritten to the self label so transfers between own accounts collapse into one bucket."
    )]
    pub self_aliases: Vec<String>,

    #[schemars(description = "Canonical label substituted for matched self aliases")]
    pub self_label: String,

    #[schemars(
        description = "Raw-to-display category renames, applied both to the category distribution and to the full transaction listing"
    )]
    pub category_display: Vec<CategoryRename>,

    #[schemars(description = "How many counterparties the volume ranking keeps")]
    pub top_counterparties: usize,

    #[schemars(description = "How many currencies the distribution keeps")]
    pub top_currencies: usize,

    #[schemars(description = "How many categories the distribution keeps")]
    pub top_categories: usize,

    #[schemars(description = "How many transactions the largest-inflow/outflow lists keep")]
    pub top_transactions: usize,

    #[schemars(description = "Column headers and delimiter of the export format")]
    pub columns: ColumnMap,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            reference_currency: "EUR".to_string(),
            self_aliases: Vec::new(),
            self_label: "My Transfers".to_string(),
            category_display: vec![
                CategoryRename {
                    raw: "Presentment".to_string(),
                    display: "Card Payment".to_string(),
                },
                CategoryRename {
                    raw: "Presentment Refund".to_string(),
                    display: "Card Refund".to_string(),
                },
            ],
            top_counterparties: 10,
            top_currencies: 6,
            top_categories: 7,
            top_transactions: 10,
            columns: ColumnMap::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalyzerConfig)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Headline figures over the whole input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicStats {
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub transaction_count: usize,
    /// Sum of absolute amounts.
    pub total_volume: f64,
    pub inflow_total: f64,
    /// Kept negative.
    pub outflow_total: f64,
    pub net_flow: f64,
}

/// Per-month flow figures, keyed "YYYY-MM".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyFlow {
    pub key: String,
    pub label: String,
    pub count: usize,
    pub inflow: f64,
    /// Reported as a positive magnitude.
    pub outflow: f64,
    pub net: f64,
}

/// One counterparty in the volume ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub name: String,
    pub count: usize,
    pub volume: f64,
    pub inflow: f64,
    pub outflow: f64,
    pub net: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyShare {
    pub currency: String,
    pub count: usize,
    /// Share of total record count, rounded to one decimal.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    /// Display label after renaming.
    pub label: String,
    pub count: usize,
    pub percentage: f64,
    /// Sum of absolute amounts in the category.
    pub volume: f64,
    /// Sum of signed amounts.
    pub net: f64,
}

/// One day of the gap-filled running-balance series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBalance {
    pub date: NaiveDate,
    pub balance: f64,
    /// Calendar quarter 1-4.
    pub quarter: u32,
}

/// Balance summary for one week or month bucket of the daily series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodBalance {
    pub key: String,
    pub label: String,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtremeTransaction {
    pub counterparty: String,
    pub date: Option<NaiveDate>,
    /// Positive magnitude in both the inflow and outflow lists.
    pub amount: f64,
}

/// The single output of one `analyze` call. Built once per input load and
/// never mutated afterwards; a new load replaces it wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub basic: BasicStats,
    pub monthly_flows: Vec<MonthlyFlow>,
    pub counterparty_rankings: Vec<RankingEntry>,
    pub currency_distribution: Vec<CurrencyShare>,
    pub category_distribution: Vec<CategoryShare>,
    pub daily_balances: Vec<DailyBalance>,
    pub weekly_balances: Vec<PeriodBalance>,
    pub monthly_balances: Vec<PeriodBalance>,
    /// Mean of every daily balance in the gap-filled series.
    pub yearly_average_balance: f64,
    pub largest_inflows: Vec<ExtremeTransaction>,
    pub largest_outflows: Vec<ExtremeTransaction>,
    /// Canonicalized records sorted ascending by booking date; records
    /// without a parseable date sort last in input order.
    pub transactions: Vec<Transaction>,
}
