//! Record normalization: raw delimited text in, typed [`Transaction`]s out.
//!
//! Parsing never drops a row for a bad date or amount; those fields become
//! `None` and downstream aggregates decide what to exclude. Canonicalization
//! rewrites self-transfer aliases and raw category labels without touching
//! the parsed records.

use crate::error::{AnalyticsError, Result};
use crate::schema::{AnalyzerConfig, ColumnMap, Transaction};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use log::{debug, warn};
use std::collections::HashMap;

struct FieldIndex {
    date: usize,
    counterparty: usize,
    category: usize,
    amount: usize,
    original_amount: Option<usize>,
    original_currency: Option<usize>,
    exchange_rate: Option<usize>,
    reference: Option<usize>,
}

impl FieldIndex {
    fn from_headers(headers: &csv::StringRecord, columns: &ColumnMap) -> Result<Self> {
        let position = |name: &str| headers.iter().position(|h| h == name);

        let mut missing = Vec::new();
        let required = |name: &str, missing: &mut Vec<String>| {
            position(name).unwrap_or_else(|| {
                missing.push(name.to_string());
                usize::MAX
            })
        };

        let date = required(&columns.date, &mut missing);
        let counterparty = required(&columns.counterparty, &mut missing);
        let category = required(&columns.category, &mut missing);
        let amount = required(&columns.amount, &mut missing);

        if !missing.is_empty() {
            return Err(AnalyticsError::MissingColumns(missing.join(", ")));
        }

        Ok(Self {
            date,
            counterparty,
            category,
            amount,
            original_amount: position(&columns.original_amount),
            original_currency: position(&columns.original_currency),
            exchange_rate: position(&columns.exchange_rate),
            reference: position(&columns.reference),
        })
    }
}

fn non_blank(record: &csv::StringRecord, idx: usize) -> Option<String> {
    let value = record.get(idx)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_number(record: &csv::StringRecord, idx: usize) -> Option<f64> {
    non_blank(record, idx).and_then(|v| v.parse::<f64>().ok())
}

fn delimiter_byte(columns: &ColumnMap) -> Result<u8> {
    let bytes = columns.delimiter.as_bytes();
    if bytes.len() != 1 {
        return Err(AnalyticsError::InvalidDelimiter(columns.delimiter.clone()));
    }
    Ok(bytes[0])
}

/// Parses raw delimited text (header row required) into typed records.
///
/// Fails fast when the input is empty or a required column is absent from
/// the header; individual cells that fail to coerce become `None` and the
/// record is retained.
pub fn parse_statement(text: &str, columns: &ColumnMap) -> Result<Vec<Transaction>> {
    if text.trim().is_empty() {
        return Err(AnalyticsError::EmptyInput);
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter_byte(columns)?)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let index = FieldIndex::from_headers(&headers, columns)?;

    let mut records = Vec::new();
    let mut unparseable_dates = 0usize;

    for row in reader.records() {
        let row = row?;

        let booking_date = non_blank(&row, index.date).and_then(|raw| {
            let parsed = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok();
            if parsed.is_none() {
                unparseable_dates += 1;
            }
            parsed
        });

        records.push(Transaction {
            booking_date,
            counterparty: non_blank(&row, index.counterparty),
            category: non_blank(&row, index.category).unwrap_or_default(),
            amount: parse_number(&row, index.amount),
            original_amount: index.original_amount.and_then(|i| parse_number(&row, i)),
            original_currency: index.original_currency.and_then(|i| non_blank(&row, i)),
            exchange_rate: index.exchange_rate.and_then(|i| parse_number(&row, i)),
            reference: index.reference.and_then(|i| non_blank(&row, i)),
        });
    }

    if unparseable_dates > 0 {
        warn!(
            "{} of {} records have unparseable booking dates and will be excluded from date-keyed aggregates",
            unparseable_dates,
            records.len()
        );
    }
    debug!("Parsed {} records from statement text", records.len());

    Ok(records)
}

/// Rewrites self-transfer aliases to the canonical label and raw category
/// labels to their display names. Produces a fresh list; the input is never
/// mutated.
pub fn canonicalize(records: &[Transaction], config: &AnalyzerConfig) -> Vec<Transaction> {
    let aliases: Vec<String> = config
        .self_aliases
        .iter()
        .map(|a| a.to_lowercase())
        .collect();

    let renames: HashMap<&str, &str> = config
        .category_display
        .iter()
        .map(|r| (r.raw.as_str(), r.display.as_str()))
        .collect();

    records
        .iter()
        .map(|record| {
            let mut out = record.clone();

            if let Some(name) = &out.counterparty {
                if aliases.iter().any(|a| *a == name.to_lowercase()) {
                    out.counterparty = Some(config.self_label.clone());
                }
            }

            if let Some(display) = renames.get(out.category.as_str()) {
                out.category = (*display).to_string();
            }

            out
        })
        .collect()
}
