use chrono::NaiveDate;
use serde::Serialize;

/// One row of the district update/enrolment summary table. Counters that
/// are missing or empty in the source file are stored as zero.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateRecord {
    pub district: String,
    pub date: NaiveDate,
    pub total_updates: u64,
    pub total_enrolment: u64,
    pub age_0_5: u64,
    pub age_5_17: u64,
    pub bio_age_5_17: u64,
    #[serde(rename = "bio_age_17_")]
    pub bio_age_17_plus: u64,
    pub demo_age_5_17: u64,
    #[serde(rename = "demo_age_17_")]
    pub demo_age_17_plus: u64,
}

/// A named governance health score, normally in [0, 100], rounded to two
/// decimals.
#[derive(Debug, Clone, Serialize)]
pub struct GovernanceIndex {
    pub subject: String,
    pub value: f64,
}

/// The three engineered features both forecast models were trained on.
#[derive(Debug, Clone)]
pub struct ForecastFeatures {
    pub days_since_start: i64,
    pub month: u32,
    pub lag_1: u64,
}

impl ForecastFeatures {
    /// Field order here is the training contract shared by every predictor:
    /// `[days_since_start, month, lag_1]`. Reordering silently corrupts
    /// predictions.
    pub fn to_vector(&self) -> [f64; 3] {
        [
            self.days_since_start as f64,
            self.month as f64,
            self.lag_1 as f64,
        ]
    }
}

/// One model's packaged prediction. `confidence` and `sensitivity` describe
/// the model's known historical behaviour, not per-request uncertainty.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResult {
    pub value: f64,
    pub magnitude: String,
    pub confidence: f64,
    pub sensitivity: String,
}

#[derive(Debug, Clone)]
pub struct DistrictLoad {
    pub district: String,
    pub total_updates: u64,
}
