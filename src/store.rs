use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::PulseError;
use crate::models::UpdateRecord;

/// Raw CSV row as uploaded. Only `district` and `date` are required
/// columns; counters left blank or absent deserialize to `None` and are
/// stored as zero.
#[derive(Debug, Deserialize)]
struct RawRow {
    district: String,
    date: NaiveDate,
    total_updates: Option<u64>,
    total_enrolment: Option<u64>,
    age_0_5: Option<u64>,
    age_5_17: Option<u64>,
    bio_age_5_17: Option<u64>,
    #[serde(rename = "bio_age_17_")]
    bio_age_17_plus: Option<u64>,
    demo_age_5_17: Option<u64>,
    #[serde(rename = "demo_age_17_")]
    demo_age_17_plus: Option<u64>,
}

impl From<RawRow> for UpdateRecord {
    fn from(row: RawRow) -> Self {
        UpdateRecord {
            district: row.district,
            date: row.date,
            total_updates: row.total_updates.unwrap_or(0),
            total_enrolment: row.total_enrolment.unwrap_or(0),
            age_0_5: row.age_0_5.unwrap_or(0),
            age_5_17: row.age_5_17.unwrap_or(0),
            bio_age_5_17: row.bio_age_5_17.unwrap_or(0),
            bio_age_17_plus: row.bio_age_17_plus.unwrap_or(0),
            demo_age_5_17: row.demo_age_5_17.unwrap_or(0),
            demo_age_17_plus: row.demo_age_17_plus.unwrap_or(0),
        }
    }
}

/// Holds the current administrative table as an immutable snapshot.
///
/// `replace` builds the whole table first and swaps it in under a single
/// write lock, so readers either see the previous table or the new one,
/// never a partially ingested mix. A failed parse leaves the previous
/// snapshot in place.
pub struct TableStore {
    snapshot: RwLock<Option<Arc<Vec<UpdateRecord>>>>,
}

impl TableStore {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
        }
    }

    /// Parse raw tabular bytes and replace the current table wholesale.
    /// Returns the ingested record count.
    pub fn replace(&self, raw: &[u8]) -> Result<usize, PulseError> {
        let records = parse_records(raw)?;
        let count = records.len();
        let mut slot = self.snapshot.write().map_err(|_| PulseError::Lock)?;
        *slot = Some(Arc::new(records));
        Ok(count)
    }

    /// Current table snapshot, or `None` if nothing ever loaded. A
    /// poisoned lock also reads as "no data" rather than panicking.
    pub fn current(&self) -> Option<Arc<Vec<UpdateRecord>>> {
        let slot = self.snapshot.read().ok()?;
        slot.clone()
    }
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_records(raw: &[u8]) -> Result<Vec<UpdateRecord>, PulseError> {
    let mut reader = csv::Reader::from_reader(raw);
    let headers = reader
        .headers()
        .map_err(|err| PulseError::Parse(err.to_string()))?;
    // Uploads vary in header casing and spacing ("Total Updates",
    // "TOTAL_UPDATES", ...); normalize before deserializing.
    let normalized: csv::StringRecord = headers.iter().map(normalize_header).collect();
    reader.set_headers(normalized);

    let mut records = Vec::new();
    for row in reader.deserialize::<RawRow>() {
        let row = row.map_err(|err| PulseError::Parse(err.to_string()))?;
        records.push(row.into());
    }
    Ok(records)
}

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
district,date,total_updates,total_enrolment,age_0_5,age_5_17,bio_age_5_17,bio_age_17_,demo_age_5_17,demo_age_17_
North Block,2024-01-01,100,50,10,30,50,20,15,5
South Block,2024-01-01,200,60,20,40,80,40,30,10
North Block,2024-02-01,150,55,15,35,60,30,20,10
";

    #[test]
    fn replace_then_current_returns_records() {
        let store = TableStore::new();
        let count = store.replace(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(count, 3);

        let table = store.current().expect("table should be loaded");
        assert_eq!(table.len(), 3);
        assert_eq!(table[0].district, "North Block");
        assert_eq!(table[0].total_updates, 100);
        assert_eq!(table[1].bio_age_17_plus, 40);
    }

    #[test]
    fn empty_store_reports_absent() {
        let store = TableStore::new();
        assert!(store.current().is_none());
    }

    #[test]
    fn headers_normalized_for_case_and_spaces() {
        let csv = "\
District,Date,Total Updates,Total Enrolment,Age 0 5,Age 5 17,Bio Age 5 17,BIO_AGE_17_,Demo Age 5 17,DEMO_AGE_17_
North Block,2024-01-01,100,50,10,30,50,20,15,5
";
        let store = TableStore::new();
        assert_eq!(store.replace(csv.as_bytes()).unwrap(), 1);
        let table = store.current().unwrap();
        assert_eq!(table[0].total_updates, 100);
        assert_eq!(table[0].bio_age_5_17, 50);
    }

    #[test]
    fn missing_numeric_fields_default_to_zero() {
        let csv = "\
district,date,total_updates
North Block,2024-01-01,100
";
        let store = TableStore::new();
        store.replace(csv.as_bytes()).unwrap();
        let table = store.current().unwrap();
        assert_eq!(table[0].total_updates, 100);
        assert_eq!(table[0].total_enrolment, 0);
        assert_eq!(table[0].bio_age_5_17, 0);

        let blanks = "\
district,date,total_updates,total_enrolment
North Block,2024-01-01,,
";
        store.replace(blanks.as_bytes()).unwrap();
        let table = store.current().unwrap();
        assert_eq!(table[0].total_updates, 0);
        assert_eq!(table[0].total_enrolment, 0);
    }

    #[test]
    fn unknown_columns_are_ignored() {
        let csv = "\
district,date,total_updates,age_18_greater
North Block,2024-01-01,100,9000
";
        let store = TableStore::new();
        assert_eq!(store.replace(csv.as_bytes()).unwrap(), 1);
    }

    #[test]
    fn malformed_payload_keeps_prior_table() {
        let store = TableStore::new();
        store.replace(SAMPLE_CSV.as_bytes()).unwrap();

        let malformed = "\
district,date,total_updates
North Block,not-a-date,100
";
        let err = store.replace(malformed.as_bytes()).unwrap_err();
        assert!(matches!(err, PulseError::Parse(_)));

        // Read-after-failed-write equals read-before.
        let table = store.current().expect("prior table should survive");
        assert_eq!(table.len(), 3);
        assert_eq!(table[0].district, "North Block");
    }

    #[test]
    fn poisoned_lock_degrades_reads_and_fails_writes() {
        let store = TableStore::new();
        store.replace(SAMPLE_CSV.as_bytes()).unwrap();

        let poison = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.snapshot.write().unwrap();
            panic!("poison the table lock");
        }));
        assert!(poison.is_err());

        // Readers treat the wrecked lock as "no data"; writers report it.
        assert!(store.current().is_none());
        let err = store.replace(SAMPLE_CSV.as_bytes()).unwrap_err();
        assert!(matches!(err, PulseError::Lock));
    }

    #[test]
    fn missing_required_column_is_a_parse_error() {
        let csv = "\
date,total_updates
2024-01-01,100
";
        let store = TableStore::new();
        let err = store.replace(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, PulseError::Parse(_)));
    }
}
