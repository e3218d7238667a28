use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::models::{GovernanceIndex, UpdateRecord};

/// Compute the five governance health indices for the current table.
///
/// The output order is fixed (Compliance, Growth, Stability, Freshness,
/// Equity) and every value is rounded to two decimals. An empty table
/// yields an empty vec.
pub fn compute_indices(records: &[UpdateRecord]) -> Vec<GovernanceIndex> {
    if records.is_empty() {
        return Vec::new();
    }

    vec![
        index("Update Compliance", update_compliance(records)),
        index("Enrolment Growth", enrolment_growth(records)),
        index("System Stability", system_stability(records)),
        index("Data Freshness", data_freshness(records)),
        index("Coverage Equity", coverage_equity(records)),
    ]
}

fn index(subject: &str, value: f64) -> GovernanceIndex {
    GovernanceIndex {
        subject: subject.to_string(),
        value: round2(value),
    }
}

/// Share of all updates attributable to the mandatory school-age biometric
/// bracket.
fn update_compliance(records: &[UpdateRecord]) -> f64 {
    let mbu: u64 = records.iter().map(|r| r.bio_age_5_17).sum();
    let updates: u64 = records.iter().map(|r| r.total_updates).sum();
    if updates == 0 {
        return 0.0;
    }
    mbu as f64 / updates as f64 * 100.0
}

/// Month-over-month change of summed enrolment between the two most recent
/// dates, reported as an absolute percentage. Fewer than two distinct
/// dates carries no temporal signal and reads as the 50.0 baseline.
fn enrolment_growth(records: &[UpdateRecord]) -> f64 {
    let mut by_date: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for record in records {
        *by_date.entry(record.date).or_insert(0) += record.total_enrolment;
    }
    if by_date.len() < 2 {
        return 50.0;
    }

    let sums: Vec<u64> = by_date.values().copied().collect();
    let latest = sums[sums.len() - 1] as f64;
    let previous = sums[sums.len() - 2] as f64;
    if previous == 0.0 {
        return 0.0;
    }
    ((latest - previous) / previous * 100.0).abs()
}

/// 100 minus the coefficient of variation of per-district update load,
/// scaled by a fixed x10 sensitivity factor and floored at 0. Higher
/// means load spreads more evenly across districts. With fewer than two
/// districts (or an all-zero load) there is no measurable dispersion and
/// the index reads 100.
fn system_stability(records: &[UpdateRecord]) -> f64 {
    let mut by_district: HashMap<&str, u64> = HashMap::new();
    for record in records {
        *by_district.entry(record.district.as_str()).or_insert(0) += record.total_updates;
    }

    let loads: Vec<f64> = by_district.values().map(|load| *load as f64).collect();
    let mean = loads.iter().sum::<f64>() / loads.len() as f64;
    let cv = if mean == 0.0 {
        0.0
    } else {
        sample_std(&loads) / mean
    };
    (100.0 - cv * 10.0).max(0.0)
}

/// Biometric share of recent update activity.
fn data_freshness(records: &[UpdateRecord]) -> f64 {
    let bio: u64 = records
        .iter()
        .map(|r| r.bio_age_5_17 + r.bio_age_17_plus)
        .sum();
    let demo: u64 = records
        .iter()
        .map(|r| r.demo_age_5_17 + r.demo_age_17_plus)
        .sum();
    let total = bio + demo;
    if total == 0 {
        return 0.0;
    }
    bio as f64 / total as f64 * 100.0
}

/// Early-childhood vs school-age enrolment balance; defaults to 50 when
/// there is no school-age enrolment to compare against.
fn coverage_equity(records: &[UpdateRecord]) -> f64 {
    let child: u64 = records.iter().map(|r| r.age_0_5).sum();
    let student: u64 = records.iter().map(|r| r.age_5_17).sum();
    if student == 0 {
        return 50.0;
    }
    child as f64 / student as f64 * 100.0
}

// Sample standard deviation (n-1 divisor), matching the statistics the
// stability factor was calibrated against.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
