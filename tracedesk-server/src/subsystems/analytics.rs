//! Aggregate counts and latency over stored traces.

use std::collections::BTreeMap;

use serde::Serialize;
use tracedesk_core::Category;

use crate::subsystems::store::TraceStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub total_traces: i64,
    pub category_breakdown: BTreeMap<String, CategoryStats>,
    pub average_response_time_ms: f64,
}

/// Round half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Totals for every category (present even at zero) and the mean latency.
pub async fn compute_analytics(store: &dyn TraceStore) -> Result<AnalyticsReport, sqlx::Error> {
    let total = store.count(None).await?;

    let mut breakdown = BTreeMap::new();
    for category in Category::ALL {
        let count = store.count(Some(category)).await?;
        let percentage = if total > 0 {
            count as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        breakdown.insert(
            category.as_str().to_string(),
            CategoryStats {
                count,
                percentage: round2(percentage),
            },
        );
    }

    let average = store.average_response_time(None).await?.unwrap_or(0.0);

    Ok(AnalyticsReport {
        total_traces: total,
        category_breakdown: breakdown,
        average_response_time_ms: round2(average),
    })
}
