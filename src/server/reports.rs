use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::{PerformanceGraphParams, PerformanceGraphResponse, ReportDataset};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};

/// Accepts either a full RFC3339 timestamp or a plain YYYY-MM-DD date.
fn parse_date_param(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("Invalid date '{raw}'")))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59).unwrap()
    } else {
        NaiveTime::from_hms_opt(0, 0, 0).unwrap()
    };
    Ok(date.and_time(time).and_utc())
}

/// Monthly sums of worked area per contract group, shaped for charting:
/// sorted month labels on the x axis, one dataset per requested group.
pub async fn performance_graph(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PerformanceGraphParams>,
) -> Result<impl IntoResponse, ApiError> {
    let start = parse_date_param(&params.start_date, false)?;
    let end = parse_date_param(&params.end_date, true)?;
    if end < start {
        return Err(ApiError::bad_request("End date precedes start date"));
    }

    let groups: Vec<String> = params
        .contract_groups
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(String::from)
        .collect();
    if groups.is_empty() {
        return Err(ApiError::bad_request(
            "At least one contract group is required",
        ));
    }

    let rows = state
        .store
        .list_report_rows(&groups, start, end)
        .api_err("Failed to load report data")?;

    // month -> group -> summed area. BTreeMap keeps the labels sorted.
    let mut monthly: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for row in rows {
        let month = row.start_time.format("%Y-%m").to_string();
        *monthly
            .entry(month)
            .or_default()
            .entry(row.contract_group)
            .or_default() += row.location_area;
    }

    let labels: Vec<String> = monthly.keys().cloned().collect();
    let datasets = groups
        .into_iter()
        .map(|group| {
            let data = labels
                .iter()
                .map(|label| {
                    monthly
                        .get(label)
                        .and_then(|by_group| by_group.get(&group))
                        .copied()
                        .unwrap_or(0.0)
                })
                .collect();
            ReportDataset { label: group, data }
        })
        .collect();

    Ok(Json(ApiResponse::success(PerformanceGraphResponse {
        labels,
        datasets,
    })))
}
