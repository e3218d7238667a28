use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::PulseError;
use crate::models::{ForecastFeatures, ForecastResult, UpdateRecord};

struct ModelProfile {
    name: &'static str,
    artifact: &'static str,
    confidence: f64,
    sensitivity: &'static str,
}

/// The two models the comparison is configured for. Confidence and
/// sensitivity are static descriptions of each model's historical
/// behaviour, keyed by model identity, never derived from a prediction.
const MODEL_PROFILES: [ModelProfile; 2] = [
    ModelProfile {
        name: "XGBoost",
        artifact: "challenger_xgb.json",
        confidence: 0.985,
        sensitivity: "High Response",
    },
    ModelProfile {
        name: "RandomForest",
        artifact: "champion_rf.json",
        confidence: 0.821,
        sensitivity: "Stable Baseline",
    },
];

/// A loaded forecast model: features in, one predicted volume out.
pub trait VolumePredictor: Send + Sync {
    fn predict(&self, features: &ForecastFeatures) -> f64;
}

/// Weights of a linear surrogate artifact: bias plus one weight per
/// feature, in the contract order of `ForecastFeatures::to_vector`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelWeights {
    pub bias: f64,
    pub weights: Vec<f64>,
}

// Every artifact must carry exactly one weight per feature in
// `ForecastFeatures::to_vector`.
const FEATURE_COUNT: usize = 3;

pub struct LinearVolumeModel {
    weights: ModelWeights,
}

impl LinearVolumeModel {
    pub fn new(weights: ModelWeights) -> Self {
        Self { weights }
    }
}

impl VolumePredictor for LinearVolumeModel {
    fn predict(&self, features: &ForecastFeatures) -> f64 {
        let vector = features.to_vector();
        self.weights.bias
            + vector
                .iter()
                .zip(self.weights.weights.iter())
                .map(|(feature, weight)| feature * weight)
                .sum::<f64>()
    }
}

/// Load whichever configured model artifacts exist under `dir`. A missing
/// or unreadable artifact skips that model; an empty result is a normal
/// outcome that `compare_models` later reports as offline.
pub fn load_models(dir: &Path) -> HashMap<String, Box<dyn VolumePredictor>> {
    let mut models: HashMap<String, Box<dyn VolumePredictor>> = HashMap::new();

    for profile in &MODEL_PROFILES {
        let path = dir.join(profile.artifact);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(
                    "model {} unavailable, skipping ({}): {err}",
                    profile.name,
                    path.display()
                );
                continue;
            }
        };
        match serde_json::from_str::<ModelWeights>(&raw) {
            Ok(weights) if weights.weights.len() != FEATURE_COUNT => {
                tracing::warn!(
                    "model {} artifact carries {} weights, expected {}, skipping ({})",
                    profile.name,
                    weights.weights.len(),
                    FEATURE_COUNT,
                    path.display()
                );
            }
            Ok(weights) => {
                models.insert(
                    profile.name.to_string(),
                    Box::new(LinearVolumeModel::new(weights)),
                );
            }
            Err(err) => {
                tracing::warn!(
                    "model {} artifact corrupt, skipping ({}): {err}",
                    profile.name,
                    path.display()
                );
            }
        }
    }

    models
}

/// Aggregate the table's time series and derive the three-feature vector
/// both models consume.
pub fn build_features(records: &[UpdateRecord]) -> Result<ForecastFeatures, PulseError> {
    let mut by_date: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for record in records {
        *by_date.entry(record.date).or_insert(0) += record.total_updates;
    }

    let earliest = *by_date.keys().next().ok_or(PulseError::NoData)?;
    let (latest, latest_sum) = by_date
        .iter()
        .next_back()
        .map(|(date, sum)| (*date, *sum))
        .ok_or(PulseError::NoData)?;

    Ok(ForecastFeatures {
        // Elapsed days are relative to the live table's own first date,
        // not a fixed training epoch.
        days_since_start: (latest - earliest).num_days(),
        month: latest.month(),
        // The latest period's own aggregate; the models were trained with
        // this same-period value under the lag_1 name.
        lag_1: latest_sum,
    })
}

/// Run every loaded predictor over the feature vector and package each
/// output with the model's static profile. Models that never loaded are
/// omitted; an empty registry fails with `ModelUnavailable`.
pub fn compare_models(
    features: &ForecastFeatures,
    models: &HashMap<String, Box<dyn VolumePredictor>>,
) -> Result<BTreeMap<String, ForecastResult>, PulseError> {
    let mut results = BTreeMap::new();

    for profile in &MODEL_PROFILES {
        if let Some(model) = models.get(profile.name) {
            let value = model.predict(features);
            results.insert(
                profile.name.to_string(),
                ForecastResult {
                    value,
                    magnitude: format_magnitude(value),
                    confidence: profile.confidence,
                    sensitivity: profile.sensitivity.to_string(),
                },
            );
        }
    }

    if results.is_empty() {
        return Err(PulseError::ModelUnavailable);
    }
    Ok(results)
}

/// Millions with two decimals and an "M" suffix. Downstream consumers
/// parse this exact shape.
pub fn format_magnitude(value: f64) -> String {
    format!("{:.2}M", value / 1_000_000.0)
}
