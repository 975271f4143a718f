use crate::config::SurveyConfig;
use crate::error::{DashboardError, Result};
use crate::types::SurveyResponse;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

/// Seam over the remote survey backend so the poller and the tests do not
/// depend on a live LimeSurvey instance.
#[async_trait::async_trait]
pub trait ResponseSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Fetch all responses currently recorded for the survey.
    async fn fetch_responses(&self) -> Result<Vec<SurveyResponse>>;
}

/// Client for the LimeSurvey RemoteControl 2 JSON-RPC API.
pub struct LimeSurveyClient {
    client: reqwest::Client,
    config: SurveyConfig,
}

impl LimeSurveyClient {
    pub fn new(config: SurveyConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Issues one RC2 call and unwraps the JSON-RPC envelope.
    async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "method": method,
            "params": params,
            "id": 1,
        });
        let resp = self
            .client
            .post(&self.config.api_url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let envelope: Value = resp.json().await?;

        if let Some(err) = envelope.get("error") {
            if !err.is_null() {
                return Err(DashboardError::Api {
                    message: format!("{} failed: {}", method, err),
                });
            }
        }
        let result = envelope.get("result").cloned().unwrap_or(Value::Null);
        // RC2 reports some failures as {"status": "..."} inside result
        if let Some(status) = result.get("status").and_then(|s| s.as_str()) {
            return Err(DashboardError::Api {
                message: format!("{} failed: {}", method, status),
            });
        }
        Ok(result)
    }

    async fn open_session(&self) -> Result<String> {
        let result = self
            .rpc(
                "get_session_key",
                json!([self.config.username, self.config.password]),
            )
            .await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| DashboardError::Api {
                message: format!("get_session_key returned a non-string result: {}", result),
            })
    }

    async fn close_session(&self, session_key: &str) {
        if let Err(e) = self.rpc("release_session_key", json!([session_key])).await {
            warn!("Failed to release session key: {}", e);
        }
    }

    async fn export_raw(&self, session_key: &str) -> Result<Vec<Value>> {
        let result = self
            .rpc(
                "export_responses",
                json!([
                    session_key,
                    self.config.survey_id,
                    "json",
                    Value::Null,
                    "all",
                    "code",
                    "long"
                ]),
            )
            .await?;
        let encoded = result.as_str().ok_or_else(|| DashboardError::Api {
            message: "export_responses did not return a base64 string".to_string(),
        })?;
        let decoded = STANDARD.decode(encoded)?;
        let data: Value = serde_json::from_slice(&decoded)?;
        let rows = data
            .get("responses")
            .and_then(|r| r.as_array())
            .cloned()
            .ok_or_else(|| DashboardError::MissingField("responses not found in export".into()))?;
        Ok(rows.iter().map(unwrap_row).collect())
    }
}

/// Older RC2 versions wrap each row in a single-key object keyed by id.
fn unwrap_row(row: &Value) -> Value {
    if let Some(obj) = row.as_object() {
        if obj.len() == 1 {
            if let Some(inner) = obj.values().next() {
                if inner.is_object() {
                    return inner.clone();
                }
            }
        }
    }
    row.clone()
}

#[async_trait::async_trait]
impl ResponseSource for LimeSurveyClient {
    fn source_name(&self) -> &'static str {
        "limesurvey_rc2"
    }

    #[instrument(skip(self))]
    async fn fetch_responses(&self) -> Result<Vec<SurveyResponse>> {
        debug!("Opening RC2 session");
        let session_key = self.open_session().await?;

        let result = self.export_raw(&session_key).await;
        self.close_session(&session_key).await;
        let rows = result?;

        let mut responses = Vec::with_capacity(rows.len());
        for row in &rows {
            match SurveyResponse::from_raw(row, self.config.lastpage_threshold) {
                Ok(response) => responses.push(response),
                Err(e) => warn!("Skipping undecodable response row: {}", e),
            }
        }
        info!(
            "Fetched {} responses from survey {}",
            responses.len(),
            self.config.survey_id
        );
        Ok(responses)
    }
}
