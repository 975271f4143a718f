use crate::constants::RESERVED_COLUMNS;
use crate::error::{DashboardError, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Europe::Helsinki;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw response row as exported by the RC2 API.
pub type RawResponse = serde_json::Value;

/// One survey response after decoding the RC2 export.
///
/// `startdate` is stored in UTC; the export carries naive Helsinki local
/// timestamps. Rows without a usable `startdate` are kept but never pass a
/// cutoff filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: String,
    pub token: Option<String>,
    pub lastpage: i64,
    pub startdate: Option<DateTime<Utc>>,
    pub is_completed: bool,
    /// Remaining answer columns, keyed by question code.
    pub answers: BTreeMap<String, Value>,
}

impl SurveyResponse {
    /// Decodes one exported row. The export is loosely typed: numeric columns
    /// arrive as numbers or strings depending on the LimeSurvey version.
    pub fn from_raw(raw: &RawResponse, lastpage_threshold: i64) -> Result<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| DashboardError::MissingField("response row is not an object".into()))?;

        let id = obj
            .get("id")
            .and_then(value_as_string)
            .ok_or_else(|| DashboardError::MissingField("id not found in response row".into()))?;

        let token = obj
            .get("token")
            .and_then(value_as_string)
            .filter(|t| !t.is_empty());

        let lastpage = obj.get("lastpage").and_then(value_as_i64).unwrap_or(0);

        let startdate = obj
            .get("startdate")
            .and_then(|v| v.as_str())
            .and_then(parse_start_date);

        let answers = obj
            .iter()
            .filter(|(key, _)| {
                !RESERVED_COLUMNS.contains(&key.as_str()) && key.as_str() != "lastpage"
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            id,
            token,
            lastpage,
            startdate,
            is_completed: lastpage >= lastpage_threshold,
            answers,
        })
    }
}

/// Parses an export timestamp (`YYYY-MM-DD HH:MM:SS`, Helsinki local) to UTC.
fn parse_start_date(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok()?;
    let local = Helsinki.from_local_datetime(&naive).earliest()?;
    Some(local.with_timezone(&Utc))
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Keeps only responses started strictly after the cutoff. Responses without
/// a start date are dropped.
pub fn filter_by_cutoff(responses: &[SurveyResponse], cutoff: DateTime<Utc>) -> Vec<SurveyResponse> {
    responses
        .iter()
        .filter(|r| r.startdate.map(|d| d > cutoff).unwrap_or(false))
        .cloned()
        .collect()
}

/// Keeps only completed responses.
pub fn filter_completed(responses: &[SurveyResponse]) -> Vec<SurveyResponse> {
    responses.iter().filter(|r| r.is_completed).cloned().collect()
}
