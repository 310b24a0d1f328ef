use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::core::compat::{CompatClient, CompatError, CompatOutcome, TitleInfo};

const MAINTENANCE_CODE: i32 = -2;
const COMMUNICATION_ERROR_CODE: i32 = -1;

/// Minimal compatibility list API client. Only the search call is exposed.
pub struct CompatApiClient {
    client: Client,
    base_url: String,
}

impl CompatApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CompatError> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert("User-Agent", HeaderValue::from_static("CompatBot/1.0"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| CompatError::Api(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn map_response(response: ApiResponse) -> CompatOutcome {
        match response.return_code {
            MAINTENANCE_CODE => CompatOutcome::Maintenance,
            COMMUNICATION_ERROR_CODE => CompatOutcome::CommunicationError,
            _ => CompatOutcome::Found(
                response
                    .results
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(code, info)| (code.to_ascii_uppercase(), info))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl CompatClient for CompatApiClient {
    async fn search(&self, term: &str) -> Result<CompatOutcome, CompatError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("api", "v1"), ("g", term)])
            .send()
            .await
            .map_err(|e| CompatError::Api(e.to_string()))?;

        if resp.status() == StatusCode::SERVICE_UNAVAILABLE {
            return Ok(CompatOutcome::Maintenance);
        }

        if !resp.status().is_success() {
            return Err(CompatError::Api(format!(
                "Compatibility API returned {} for {}",
                resp.status(),
                term
            )));
        }

        let body: ApiResponse = resp
            .json()
            .await
            .map_err(|e| CompatError::Api(e.to_string()))?;
        Ok(Self::map_response(body))
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    return_code: i32,
    #[serde(default)]
    results: Option<HashMap<String, TitleInfo>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> CompatOutcome {
        CompatApiClient::map_response(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_results_are_mapped() {
        let outcome = parse(
            r#"{
                "return_code": 0,
                "search_term": "BLES00932",
                "results": {
                    "bles00932": {
                        "title": "Demon's Souls",
                        "status": "Playable",
                        "date": "2019-05-12",
                        "thread": 1234,
                        "commit": "abcdef0",
                        "pr": 5893
                    }
                }
            }"#,
        );

        let CompatOutcome::Found(results) = outcome else {
            panic!("expected results");
        };
        let info = &results["BLES00932"];
        assert_eq!(info.title.as_deref(), Some("Demon's Souls"));
        assert_eq!(info.status.as_deref(), Some("Playable"));
        assert_eq!(info.thread, Some(1234));
        assert_eq!(info.pr, Some(5893));
    }

    #[test]
    fn test_return_codes_signal_service_state() {
        assert_eq!(parse(r#"{"return_code": -2}"#), CompatOutcome::Maintenance);
        assert_eq!(
            parse(r#"{"return_code": -1}"#),
            CompatOutcome::CommunicationError
        );
    }

    #[test]
    fn test_no_results_is_empty_found() {
        assert_eq!(
            parse(r#"{"return_code": 2, "search_term": "NPUB99999"}"#),
            CompatOutcome::Found(HashMap::new())
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client =
            CompatApiClient::new("https://rpcs3.net/compatibility/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.base_url, "https://rpcs3.net/compatibility");
    }
}
