use crate::utils::error::{HarvestError, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const AUTH_ERROR_TYPES: &[&str] = &["UNAUTHORIZED", "FORBIDDEN", "RATE_LIMITED"];

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a, V: Serialize> {
    query: &'a str,
    variables: &'a V,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<D> {
    data: Option<D>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl GraphQlError {
    fn is_auth_failure(&self) -> bool {
        let message = self.message.to_lowercase();
        self.kind
            .as_deref()
            .is_some_and(|kind| AUTH_ERROR_TYPES.contains(&kind))
            || message.contains("bad credentials")
            || message.contains("rate limit")
    }
}

/// 以 bearer token 呼叫 GraphQL 端點
#[derive(Clone)]
pub struct GraphQlClient {
    client: Client,
    endpoint: String,
    token: String,
}

impl GraphQlClient {
    pub fn new(client: Client, endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }

    pub async fn execute<V, D>(&self, query: &str, variables: &V) -> Result<D>
    where
        V: Serialize + Sync,
        D: DeserializeOwned,
    {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&GraphQlRequest { query, variables })
            .send()
            .await
            .map_err(|e| HarvestError::fetch(&self.endpoint, e))?;

        let status = response.status();
        tracing::debug!("GraphQL response status: {}", status);

        let rate_limit_exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0");

        match status {
            StatusCode::UNAUTHORIZED => {
                return Err(HarvestError::auth("credential rejected (HTTP 401)"))
            }
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                let reason = if rate_limit_exhausted {
                    "rate limit exhausted"
                } else {
                    "access forbidden or rate limited"
                };
                return Err(HarvestError::auth(format!("{} (HTTP {})", reason, status)));
            }
            s if !s.is_success() => return Err(HarvestError::status(&self.endpoint, s)),
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::fetch(&self.endpoint, e))?;

        Self::decode(&body)
    }

    fn decode<D: DeserializeOwned>(body: &str) -> Result<D> {
        let envelope: GraphQlResponse<serde_json::Value> = serde_json::from_str(body)
            .map_err(|e| HarvestError::query(format!("malformed response: {}", e)))?;

        if let Some(auth_error) = envelope.errors.iter().find(|e| e.is_auth_failure()) {
            return Err(HarvestError::auth(auth_error.message.clone()));
        }

        if !envelope.errors.is_empty() {
            let messages: Vec<&str> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(HarvestError::query(messages.join("; ")));
        }

        let data = envelope
            .data
            .filter(|data| !data.is_null())
            .ok_or_else(|| HarvestError::query("response has no data"))?;

        serde_json::from_value(data)
            .map_err(|e| HarvestError::query(format!("unexpected response shape: {}", e)))
    }
}
