use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use crate::models::{DistrictLoad, ForecastResult, GovernanceIndex, UpdateRecord};

pub fn district_rollup(records: &[UpdateRecord]) -> Vec<DistrictLoad> {
    let mut map: std::collections::HashMap<String, u64> = std::collections::HashMap::new();

    for record in records {
        let entry = map.entry(record.district.clone()).or_insert(0);
        *entry += record.total_updates;
    }

    let mut loads: Vec<DistrictLoad> = map
        .into_iter()
        .map(|(district, total_updates)| DistrictLoad {
            district,
            total_updates,
        })
        .collect();

    loads.sort_by(|a, b| b.total_updates.cmp(&a.total_updates));
    loads
}

pub fn build_briefing(
    records: &[UpdateRecord],
    indices: &[GovernanceIndex],
    forecast: Option<&BTreeMap<String, ForecastResult>>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# District Operations Briefing");

    if let (Some(first), Some(last)) = (
        records.iter().map(|record| record.date).min(),
        records.iter().map(|record| record.date).max(),
    ) {
        let districts: HashSet<&str> = records
            .iter()
            .map(|record| record.district.as_str())
            .collect();
        let _ = writeln!(
            output,
            "Covering {} records across {} districts ({} to {})",
            records.len(),
            districts.len(),
            first,
            last
        );
    } else {
        let _ = writeln!(output, "No administrative records loaded.");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Governance Indices");

    if indices.is_empty() {
        let _ = writeln!(output, "No indices available for an empty table.");
    } else {
        for index in indices.iter() {
            let _ = writeln!(output, "- {}: {:.2}", index.subject, index.value);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Update Volume Forecast");

    match forecast {
        Some(results) if !results.is_empty() => {
            for (name, result) in results.iter() {
                let _ = writeln!(
                    output,
                    "- {}: {} updates projected next cycle (confidence {:.3}, {})",
                    name, result.magnitude, result.confidence, result.sensitivity
                );
            }
        }
        _ => {
            let _ = writeln!(output, "No forecast models loaded for this cycle.");
        }
    }

    let loads = district_rollup(records);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Busiest Districts");

    if loads.is_empty() {
        let _ = writeln!(output, "No district activity recorded.");
    } else {
        for load in loads.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {} updates",
                load.district, load.total_updates
            );
        }
    }

    output
}
