//! The aggregation core: one pass over canonicalized records produces the
//! whole [`AnalysisReport`] — headline totals, monthly flows, rankings,
//! the gap-filled daily balance series and its week/month summaries, and
//! the extreme-transaction lists.

use crate::error::{AnalyticsError, Result};
use crate::schema::*;
use crate::utils::{calendar_days, iso_week_key, iso_week_label, month_key, month_label, quarter_of};
use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeMap;

pub struct Aggregator<'a> {
    config: &'a AnalyzerConfig,
}

/// Display label for records without a counterparty. They form their own
/// ranking group rather than being dropped.
pub const UNNAMED_COUNTERPARTY: &str = "(unnamed)";

fn amount_of(record: &Transaction) -> f64 {
    record.amount.unwrap_or(0.0)
}

fn round_percentage(part: usize, total: usize) -> f64 {
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

impl<'a> Aggregator<'a> {
    pub fn new(config: &'a AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Computes the full report. Expects records that already went through
    /// canonicalization; fails with [`AnalyticsError::NoData`] when the
    /// input is empty or no record carries a parseable booking date.
    pub fn analyze(&self, records: &[Transaction]) -> Result<AnalysisReport> {
        if records.is_empty() {
            return Err(AnalyticsError::NoData(
                "statement contained no records".to_string(),
            ));
        }

        let basic = self.basic_stats(records)?;
        let daily_balances = self.daily_balance_series(records, basic.first_date, basic.last_date)?;
        let (weekly_balances, monthly_balances) = self.period_balances(&daily_balances);
        let yearly_average_balance = daily_balances
            .iter()
            .map(|d| d.balance)
            .sum::<f64>()
            / daily_balances.len() as f64;

        debug!(
            "Aggregated {} records spanning {} days",
            records.len(),
            daily_balances.len()
        );

        Ok(AnalysisReport {
            monthly_flows: self.monthly_flows(records),
            counterparty_rankings: self.counterparty_rankings(records),
            currency_distribution: self.currency_distribution(records),
            category_distribution: self.category_distribution(records),
            largest_inflows: self.largest_inflows(records),
            largest_outflows: self.largest_outflows(records),
            transactions: self.sorted_listing(records),
            basic,
            daily_balances,
            weekly_balances,
            monthly_balances,
            yearly_average_balance,
        })
    }

    fn basic_stats(&self, records: &[Transaction]) -> Result<BasicStats> {
        let dates: Vec<NaiveDate> = records.iter().filter_map(|r| r.booking_date).collect();
        let (first_date, last_date) = match (dates.iter().min(), dates.iter().max()) {
            (Some(min), Some(max)) => (*min, *max),
            _ => {
                return Err(AnalyticsError::NoData(
                    "no record carries a parseable booking date".to_string(),
                ))
            }
        };

        let mut inflow_total = 0.0;
        let mut outflow_total = 0.0;
        let mut total_volume = 0.0;
        for record in records {
            let amount = amount_of(record);
            total_volume += amount.abs();
            if amount >= 0.0 {
                inflow_total += amount;
            } else {
                outflow_total += amount;
            }
        }

        Ok(BasicStats {
            first_date,
            last_date,
            transaction_count: records.len(),
            total_volume,
            inflow_total,
            outflow_total,
            net_flow: inflow_total + outflow_total,
        })
    }

    fn monthly_flows(&self, records: &[Transaction]) -> Vec<MonthlyFlow> {
        let mut groups: BTreeMap<String, MonthlyFlow> = BTreeMap::new();

        for record in records {
            let Some(date) = record.booking_date else {
                continue;
            };
            let entry = groups
                .entry(month_key(date))
                .or_insert_with(|| MonthlyFlow {
                    key: month_key(date),
                    label: month_label(date),
                    count: 0,
                    inflow: 0.0,
                    outflow: 0.0,
                    net: 0.0,
                });

            let amount = amount_of(record);
            entry.count += 1;
            entry.net += amount;
            if amount >= 0.0 {
                entry.inflow += amount;
            } else {
                entry.outflow += amount.abs();
            }
        }

        groups.into_values().collect()
    }

    fn counterparty_rankings(&self, records: &[Transaction]) -> Vec<RankingEntry> {
        let mut groups: BTreeMap<String, RankingEntry> = BTreeMap::new();

        for record in records {
            let name = record
                .counterparty
                .clone()
                .unwrap_or_else(|| UNNAMED_COUNTERPARTY.to_string());
            let entry = groups.entry(name.clone()).or_insert_with(|| RankingEntry {
                name,
                count: 0,
                volume: 0.0,
                inflow: 0.0,
                outflow: 0.0,
                net: 0.0,
            });

            let amount = amount_of(record);
            entry.count += 1;
            entry.volume += amount.abs();
            entry.net += amount;
            if amount >= 0.0 {
                entry.inflow += amount;
            } else {
                entry.outflow += amount;
            }
        }

        let mut ranked: Vec<RankingEntry> = groups.into_values().collect();
        ranked.sort_by(|a, b| b.volume.total_cmp(&a.volume));
        ranked.truncate(self.config.top_counterparties);
        ranked
    }

    fn currency_distribution(&self, records: &[Transaction]) -> Vec<CurrencyShare> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in records {
            let currency = record
                .original_currency
                .clone()
                .unwrap_or_else(|| self.config.reference_currency.clone());
            *counts.entry(currency).or_insert(0) += 1;
        }

        let total = records.len();
        let mut shares: Vec<CurrencyShare> = counts
            .into_iter()
            .map(|(currency, count)| CurrencyShare {
                currency,
                count,
                percentage: round_percentage(count, total),
            })
            .collect();

        shares.sort_by(|a, b| b.count.cmp(&a.count));
        shares.truncate(self.config.top_currencies);
        shares
    }

    fn category_distribution(&self, records: &[Transaction]) -> Vec<CategoryShare> {
        let mut groups: BTreeMap<String, CategoryShare> = BTreeMap::new();

        for record in records {
            let entry = groups
                .entry(record.category.clone())
                .or_insert_with(|| CategoryShare {
                    label: record.category.clone(),
                    count: 0,
                    percentage: 0.0,
                    volume: 0.0,
                    net: 0.0,
                });

            let amount = amount_of(record);
            entry.count += 1;
            entry.volume += amount.abs();
            entry.net += amount;
        }

        let total = records.len();
        let mut shares: Vec<CategoryShare> = groups.into_values().collect();
        for share in &mut shares {
            share.percentage = round_percentage(share.count, total);
        }
        shares.sort_by(|a, b| b.count.cmp(&a.count));
        shares.truncate(self.config.top_categories);
        shares
    }

    /// Running balance per calendar day with carry-forward gap filling.
    ///
    /// Only the closing balance of a date is kept when several records share
    /// it; days without any record inherit the previous day's balance.
    fn daily_balance_series(
        &self,
        records: &[Transaction],
        first_date: NaiveDate,
        last_date: NaiveDate,
    ) -> Result<Vec<DailyBalance>> {
        let mut dated: Vec<&Transaction> =
            records.iter().filter(|r| r.booking_date.is_some()).collect();
        // Stable sort: same-date records keep their input order.
        dated.sort_by_key(|r| r.booking_date);

        let mut closing: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        let mut running = 0.0;
        for record in dated {
            running += amount_of(record);
            closing.insert(record.booking_date.unwrap_or(first_date), running);
        }

        let days = calendar_days(first_date, last_date);
        if days.is_empty() {
            return Err(AnalyticsError::Computation(format!(
                "empty calendar range {first_date} to {last_date}"
            )));
        }

        let mut series = Vec::with_capacity(days.len());
        let mut last_known = 0.0;
        for day in days {
            if let Some(balance) = closing.get(&day) {
                last_known = *balance;
            }
            series.push(DailyBalance {
                date: day,
                balance: last_known,
                quarter: quarter_of(day),
            });
        }

        Ok(series)
    }

    fn period_balances(&self, series: &[DailyBalance]) -> (Vec<PeriodBalance>, Vec<PeriodBalance>) {
        let weekly = Self::bucket_balances(series, |d| (iso_week_key(d), iso_week_label(d)));
        let monthly = Self::bucket_balances(series, |d| (month_key(d), month_label(d)));
        (weekly, monthly)
    }

    fn bucket_balances<F>(series: &[DailyBalance], key_of: F) -> Vec<PeriodBalance>
    where
        F: Fn(NaiveDate) -> (String, String),
    {
        let mut buckets: BTreeMap<String, (String, Vec<f64>)> = BTreeMap::new();
        for day in series {
            let (key, label) = key_of(day.date);
            buckets
                .entry(key)
                .or_insert_with(|| (label, Vec::new()))
                .1
                .push(day.balance);
        }

        buckets
            .into_iter()
            .map(|(key, (label, balances))| {
                let days = balances.len();
                let sum: f64 = balances.iter().sum();
                let min = balances.iter().copied().fold(f64::INFINITY, f64::min);
                let max = balances.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                PeriodBalance {
                    key,
                    label,
                    average: sum / days as f64,
                    min,
                    max,
                    days,
                }
            })
            .collect()
    }

    fn largest_inflows(&self, records: &[Transaction]) -> Vec<ExtremeTransaction> {
        let mut inflows: Vec<&Transaction> = records
            .iter()
            .filter(|r| amount_of(r) > 0.0)
            .collect();
        inflows.sort_by(|a, b| amount_of(b).total_cmp(&amount_of(a)));
        inflows
            .into_iter()
            .take(self.config.top_transactions)
            .map(|r| Self::extreme_entry(r, amount_of(r)))
            .collect()
    }

    fn largest_outflows(&self, records: &[Transaction]) -> Vec<ExtremeTransaction> {
        let mut outflows: Vec<&Transaction> = records
            .iter()
            .filter(|r| amount_of(r) < 0.0)
            .collect();
        // Most negative first; reported as positive magnitudes.
        outflows.sort_by(|a, b| amount_of(a).total_cmp(&amount_of(b)));
        outflows
            .into_iter()
            .take(self.config.top_transactions)
            .map(|r| Self::extreme_entry(r, amount_of(r).abs()))
            .collect()
    }

    fn extreme_entry(record: &Transaction, amount: f64) -> ExtremeTransaction {
        ExtremeTransaction {
            counterparty: record
                .counterparty
                .clone()
                .unwrap_or_else(|| UNNAMED_COUNTERPARTY.to_string()),
            date: record.booking_date,
            amount,
        }
    }

    /// Date-sorted copy of the full listing. Records without a parseable
    /// date sort last, keeping their relative input order.
    fn sorted_listing(&self, records: &[Transaction]) -> Vec<Transaction> {
        let mut listing = records.to_vec();
        listing.sort_by_key(|r| match r.booking_date {
            Some(date) => (0, date),
            None => (1, NaiveDate::MAX),
        });
        listing
    }
}

/// Convenience wrapper over [`Aggregator::analyze`].
pub fn analyze(records: &[Transaction], config: &AnalyzerConfig) -> Result<AnalysisReport> {
    Aggregator::new(config).analyze(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(d: Option<NaiveDate>, counterparty: Option<&str>, category: &str, amount: f64) -> Transaction {
        Transaction {
            booking_date: d,
            counterparty: counterparty.map(str::to_string),
            category: category.to_string(),
            amount: Some(amount),
            original_amount: None,
            original_currency: None,
            exchange_rate: None,
            reference: None,
        }
    }

    #[test]
    fn test_empty_input_is_no_data() {
        let err = analyze(&[], &AnalyzerConfig::default()).unwrap_err();
        assert!(matches!(err, AnalyticsError::NoData(_)));
    }

    #[test]
    fn test_all_dates_unparseable_is_no_data() {
        let records = vec![tx(None, Some("A"), "Fee", -1.0)];
        let err = analyze(&records, &AnalyzerConfig::default()).unwrap_err();
        assert!(matches!(err, AnalyticsError::NoData(_)));
    }

    #[test]
    fn test_basic_stats_totals() {
        let records = vec![
            tx(Some(date(2024, 1, 1)), Some("A"), "Transfer", 100.0),
            tx(Some(date(2024, 1, 3)), Some("B"), "Card Payment", -50.0),
            tx(Some(date(2024, 1, 4)), Some("C"), "Card Payment", -20.0),
        ];

        let report = analyze(&records, &AnalyzerConfig::default()).unwrap();
        let basic = &report.basic;
        assert_eq!(basic.first_date, date(2024, 1, 1));
        assert_eq!(basic.last_date, date(2024, 1, 4));
        assert_eq!(basic.transaction_count, 3);
        assert!((basic.total_volume - 170.0).abs() < 1e-9);
        assert!((basic.inflow_total - 100.0).abs() < 1e-9);
        assert!((basic.outflow_total + 70.0).abs() < 1e-9);
        assert!((basic.net_flow - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_gap_filled_daily_series() {
        // The worked scenario: 01-01 +100, 01-03 -50.
        let records = vec![
            tx(Some(date(2024, 1, 1)), None, "Transfer", 100.0),
            tx(Some(date(2024, 1, 3)), None, "Card Payment", -50.0),
        ];

        let report = analyze(&records, &AnalyzerConfig::default()).unwrap();
        let series = &report.daily_balances;
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].date, date(2024, 1, 1));
        assert!((series[0].balance - 100.0).abs() < 1e-9);
        assert!((series[1].balance - 100.0).abs() < 1e-9);
        assert!((series[2].balance - 50.0).abs() < 1e-9);
        assert!(series.iter().all(|d| d.quarter == 1));

        assert!((report.yearly_average_balance - 250.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_date_records_keep_only_closing_balance() {
        let records = vec![
            tx(Some(date(2024, 1, 1)), None, "Transfer", 100.0),
            tx(Some(date(2024, 1, 1)), None, "Card Payment", -30.0),
        ];

        let report = analyze(&records, &AnalyzerConfig::default()).unwrap();
        assert_eq!(report.daily_balances.len(), 1);
        assert!((report.daily_balances[0].balance - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_monthly_flows_sorted_ascending() {
        let records = vec![
            tx(Some(date(2024, 2, 10)), None, "Fee", -10.0),
            tx(Some(date(2024, 1, 5)), None, "Transfer", 200.0),
            tx(Some(date(2024, 1, 20)), None, "Card Payment", -40.0),
            tx(None, None, "Fee", -999.0),
        ];

        let report = analyze(&records, &AnalyzerConfig::default()).unwrap();
        let flows = &report.monthly_flows;
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[0].key, "2024-01");
        assert_eq!(flows[0].count, 2);
        assert!((flows[0].inflow - 200.0).abs() < 1e-9);
        assert!((flows[0].outflow - 40.0).abs() < 1e-9);
        assert!((flows[0].net - 160.0).abs() < 1e-9);
        assert_eq!(flows[1].key, "2024-02");
        // The dateless record is excluded from monthly grouping.
        assert_eq!(flows[0].count + flows[1].count, 3);
    }

    #[test]
    fn test_counterparty_ranking_keeps_unnamed_group() {
        let records = vec![
            tx(Some(date(2024, 1, 1)), Some("Acme"), "Card Payment", -300.0),
            tx(Some(date(2024, 1, 2)), None, "Fee", -1.0),
            tx(Some(date(2024, 1, 3)), Some("Acme"), "Card Refund", 50.0),
        ];

        let report = analyze(&records, &AnalyzerConfig::default()).unwrap();
        let ranked = &report.counterparty_rankings;
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "Acme");
        assert_eq!(ranked[0].count, 2);
        assert!((ranked[0].volume - 350.0).abs() < 1e-9);
        assert!((ranked[0].net + 250.0).abs() < 1e-9);
        assert_eq!(ranked[1].name, UNNAMED_COUNTERPARTY);
    }

    #[test]
    fn test_ranking_truncates_to_top_n() {
        let mut records = Vec::new();
        for i in 0..15 {
            records.push(tx(
                Some(date(2024, 1, 1 + i as u32)),
                Some(&format!("Shop {i}")),
                "Card Payment",
                -(i as f64 + 1.0),
            ));
        }

        let report = analyze(&records, &AnalyzerConfig::default()).unwrap();
        assert_eq!(report.counterparty_rankings.len(), 10);
        // Highest volume first.
        assert_eq!(report.counterparty_rankings[0].name, "Shop 14");
    }

    #[test]
    fn test_currency_distribution_defaults_reference() {
        let mut records = vec![
            tx(Some(date(2024, 1, 1)), None, "Transfer", 10.0),
            tx(Some(date(2024, 1, 2)), None, "Transfer", 10.0),
        ];
        records[1].original_currency = Some("USD".to_string());

        let report = analyze(&records, &AnalyzerConfig::default()).unwrap();
        let shares = &report.currency_distribution;
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].currency, "EUR");
        assert!((shares[0].percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_category_percentage_rounding() {
        let mut records = Vec::new();
        for i in 0..10 {
            let category = if i < 3 { "Card Payment" } else { "Transfer" };
            records.push(tx(Some(date(2024, 1, 1 + i as u32)), None, category, 1.0));
        }

        let report = analyze(&records, &AnalyzerConfig::default()).unwrap();
        let card = report
            .category_distribution
            .iter()
            .find(|c| c.label == "Card Payment")
            .unwrap();
        assert_eq!(card.count, 3);
        assert!((card.percentage - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_largest_transactions() {
        let records = vec![
            tx(Some(date(2024, 1, 1)), Some("A"), "Transfer", 500.0),
            tx(Some(date(2024, 1, 2)), Some("B"), "Transfer", 900.0),
            tx(Some(date(2024, 1, 3)), Some("C"), "Card Payment", -700.0),
            tx(Some(date(2024, 1, 4)), Some("D"), "Card Payment", -100.0),
        ];

        let report = analyze(&records, &AnalyzerConfig::default()).unwrap();
        assert_eq!(report.largest_inflows[0].counterparty, "B");
        assert!((report.largest_inflows[0].amount - 900.0).abs() < 1e-9);
        assert_eq!(report.largest_outflows[0].counterparty, "C");
        // Outflows are reported as positive magnitudes.
        assert!((report.largest_outflows[0].amount - 700.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_amount_counts_as_zero_but_is_listed() {
        let mut no_amount = tx(Some(date(2024, 1, 2)), Some("A"), "Fee", 0.0);
        no_amount.amount = None;
        let records = vec![
            tx(Some(date(2024, 1, 1)), None, "Transfer", 10.0),
            no_amount,
        ];

        let report = analyze(&records, &AnalyzerConfig::default()).unwrap();
        assert!((report.basic.net_flow - 10.0).abs() < 1e-9);
        assert_eq!(report.transactions.len(), 2);
    }

    #[test]
    fn test_listing_sorted_with_dateless_last() {
        let records = vec![
            tx(Some(date(2024, 1, 5)), Some("B"), "Fee", -1.0),
            tx(None, Some("X"), "Fee", -1.0),
            tx(Some(date(2024, 1, 1)), Some("A"), "Fee", -1.0),
            tx(None, Some("Y"), "Fee", -1.0),
        ];

        let report = analyze(&records, &AnalyzerConfig::default()).unwrap();
        let names: Vec<_> = report
            .transactions
            .iter()
            .map(|t| t.counterparty.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["A", "B", "X", "Y"]);
    }

    #[test]
    fn test_weekly_buckets_use_iso_week_year() {
        // 2024-12-28 (Sat, 2024-W52) through 2025-01-02 (Thu, 2025-W01).
        let records = vec![
            tx(Some(date(2024, 12, 28)), None, "Transfer", 100.0),
            tx(Some(date(2025, 1, 2)), None, "Fee", -10.0),
        ];

        let report = analyze(&records, &AnalyzerConfig::default()).unwrap();
        let keys: Vec<_> = report.weekly_balances.iter().map(|w| w.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-W52", "2025-W01"]);

        // W52 covers Sat+Sun, W01 covers Mon..Thu.
        assert_eq!(report.weekly_balances[0].days, 2);
        assert_eq!(report.weekly_balances[1].days, 4);
    }

    #[test]
    fn test_single_day_range() {
        let records = vec![tx(Some(date(2024, 6, 15)), None, "Transfer", 42.0)];

        let report = analyze(&records, &AnalyzerConfig::default()).unwrap();
        assert_eq!(report.daily_balances.len(), 1);
        assert!((report.yearly_average_balance - 42.0).abs() < 1e-9);
        assert_eq!(report.weekly_balances.len(), 1);
        assert_eq!(report.monthly_balances.len(), 1);
    }
}
