//! Bank statement import.
//!
//! Parser adapters turn a bank export into [`ImportRecord`]s, sign
//! normalized and sorted by date. The engine deduplicates them against the
//! bank account's existing rows with a [`DuplicatePredicate`]. A generic CSV
//! adapter lives here; bank specific formats do not.

use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents, ResultEngine, UnbookedTransaction};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    pub description: Option<String>,
    pub datetime: DateTime<Utc>,
    pub amount_in_cents: i64,
    #[serde(default)]
    pub other_account_number: Option<String>,
}

impl ImportRecord {
    pub fn new(datetime: DateTime<Utc>, amount_in_cents: i64) -> Self {
        Self {
            description: None,
            datetime,
            amount_in_cents,
            other_account_number: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub error: Option<String>,
}

impl ImportReport {
    /// A batch that did not commit imported nothing; all `records` count
    /// as skipped.
    pub(crate) fn rolled_back(&mut self, records: usize, error: String) {
        self.imported = 0;
        self.skipped = records;
        self.error = Some(error);
    }
}

/// Decides whether `incoming` repeats a row already stored for the same day.
pub trait DuplicatePredicate: Send + Sync {
    fn is_duplicate(&self, existing: &UnbookedTransaction, incoming: &ImportRecord) -> bool;
}

impl<F> DuplicatePredicate for F
where
    F: Fn(&UnbookedTransaction, &ImportRecord) -> bool + Send + Sync,
{
    fn is_duplicate(&self, existing: &UnbookedTransaction, incoming: &ImportRecord) -> bool {
        self(existing, incoming)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicatePolicy {
    SameDateAndAmount,
    #[default]
    SameDateAmountAndDescription,
    None,
}

impl DuplicatePredicate for DuplicatePolicy {
    fn is_duplicate(&self, existing: &UnbookedTransaction, incoming: &ImportRecord) -> bool {
        let same_day_and_amount = existing.datetime.date_naive() == incoming.datetime.date_naive()
            && existing.amount_in_cents == incoming.amount_in_cents;
        match self {
            Self::SameDateAndAmount => same_day_and_amount,
            Self::SameDateAmountAndDescription => {
                same_day_and_amount
                    && existing.memo.as_deref().map(str::trim)
                        == incoming.description.as_deref().map(str::trim)
            }
            Self::None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    description: Option<String>,
    amount: String,
}

fn parse_date(value: &str) -> ResultEngine<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(NaiveDateTime::new(date, NaiveTime::MIN).and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%d.%m.%Y") {
        return Ok(NaiveDateTime::new(date, NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| EngineError::Validation(format!("invalid date: {value}")))
}

/// Reads a `date,description,amount` CSV export.
///
/// Every data line yields one item; malformed lines yield an error instead
/// of aborting the whole file. Records are returned in file order.
pub fn read_csv(reader: impl Read) -> Vec<ResultEngine<ImportRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    csv_reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(index, row)| {
            let line = index + 2;
            let row = row.map_err(|err| {
                EngineError::Validation(format!("line {line}: {err}"))
            })?;
            let datetime = parse_date(&row.date)
                .map_err(|err| EngineError::Validation(format!("line {line}: {err}")))?;
            let amount: MoneyCents = row
                .amount
                .parse()
                .map_err(|err| EngineError::Validation(format!("line {line}: {err}")))?;
            Ok(ImportRecord {
                description: row.description.filter(|d| !d.is_empty()),
                datetime,
                amount_in_cents: amount.cents(),
                other_account_number: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn existing(day: u32, amount: i64, memo: &str) -> UnbookedTransaction {
        UnbookedTransaction {
            realm_id: "r".to_string(),
            account_id: "bank".to_string(),
            id: 1,
            memo: Some(memo.to_string()),
            datetime: Utc.with_ymd_and_hms(2026, 3, day, 9, 30, 0).unwrap(),
            amount_in_cents: amount,
            other_account_number: None,
            matched_booking_id: None,
        }
    }

    fn incoming(day: u32, amount: i64, memo: &str) -> ImportRecord {
        ImportRecord::new(Utc.with_ymd_and_hms(2026, 3, day, 0, 0, 0).unwrap(), amount)
            .description(memo)
    }

    #[test]
    fn rolled_back_batches_skip_every_record() {
        let mut report = ImportReport {
            imported: 0,
            skipped: 3,
            error: Some("bank account bank is closed".to_string()),
        };
        report.rolled_back(7, "disk full".to_string());
        assert_eq!(
            report,
            ImportReport {
                imported: 0,
                skipped: 7,
                error: Some("disk full".to_string()),
            }
        );
    }

    #[test]
    fn policies_compare_by_day() {
        let row = existing(4, -5000, "Store X");
        assert!(DuplicatePolicy::SameDateAndAmount.is_duplicate(&row, &incoming(4, -5000, "other")));
        assert!(!DuplicatePolicy::SameDateAndAmount.is_duplicate(&row, &incoming(5, -5000, "Store X")));
        assert!(
            DuplicatePolicy::SameDateAmountAndDescription
                .is_duplicate(&row, &incoming(4, -5000, "Store X"))
        );
        assert!(
            !DuplicatePolicy::SameDateAmountAndDescription
                .is_duplicate(&row, &incoming(4, -5000, "Store Y"))
        );
        assert!(!DuplicatePolicy::None.is_duplicate(&row, &incoming(4, -5000, "Store X")));
    }

    #[test]
    fn closures_are_predicates() {
        let by_memo = |e: &UnbookedTransaction, i: &ImportRecord| {
            e.memo.as_deref() == i.description.as_deref()
        };
        assert!(by_memo.is_duplicate(&existing(1, 1, "a"), &incoming(9, 2, "a")));
    }

    #[test]
    fn csv_lines_parse_independently() {
        let data = "date,description,amount\n\
                    2026-03-04,Store X,-50.00\n\
                    not-a-date,Broken,1.00\n\
                    05.03.2026,\"Salary, March\",\"1'234,50\"\n";
        let records = read_csv(data.as_bytes());
        assert_eq!(records.len(), 3);

        let first = records[0].as_ref().unwrap();
        assert_eq!(first.amount_in_cents, -5000);
        assert_eq!(first.description.as_deref(), Some("Store X"));
        assert!(records[1].is_err());

        let third = records[2].as_ref().unwrap();
        assert_eq!(third.amount_in_cents, 123_450);
        assert_eq!(third.datetime.date_naive().to_string(), "2026-03-05");
    }
}
