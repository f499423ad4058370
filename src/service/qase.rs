//! Qase API Client
//!
//! Blocking HTTP client for the Qase v1 REST API implementing both the read
//! and the write side of the service layer. Every call is synchronous; there
//! is no internal retry, timeout or cancellation — those responsibilities
//! belong to the caller's boundary.

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{CaseWrite, Page, RemoteCase, RemoteSource, RemoteSuite, SuiteWrite, WriteService};
use crate::config::SyncConfig;
use crate::error::{ServiceError, SyncError};

/// Response envelope wrapping every Qase API payload.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default, rename = "errorCode")]
    error_code: Option<String>,
    #[serde(default, rename = "errorMessage")]
    error_message: Option<String>,
}

/// Write-call result payload.
#[derive(Debug, Deserialize)]
struct IdResult {
    id: u64,
}

/// Client bound to one project of one Qase workspace.
pub struct QaseClient {
    client: Client,
    endpoint: String,
    token: String,
    project_code: String,
}

impl QaseClient {
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        config.require_remote()?;
        Ok(QaseClient {
            client: Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
            project_code: config.project_code.clone(),
        })
    }

    fn suite_url(&self, id: Option<u64>) -> String {
        match id {
            Some(id) => format!("{}/suite/{}/{}", self.endpoint, self.project_code, id),
            None => format!("{}/suite/{}", self.endpoint, self.project_code),
        }
    }

    fn case_url(&self, id: Option<u64>) -> String {
        match id {
            Some(id) => format!("{}/case/{}/{}", self.endpoint, self.project_code, id),
            None => format!("{}/case/{}", self.endpoint, self.project_code),
        }
    }

    /// Unwrap a response envelope into its result payload.
    fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, ServiceError> {
        let status = response.status();
        let envelope: Envelope<T> = response.json().map_err(ServiceError::Transport)?;
        if !status.is_success() || !envelope.status {
            return Err(rejection(status.as_u16(), envelope.error_code, envelope.error_message));
        }
        envelope
            .result
            .ok_or_else(|| ServiceError::Malformed("missing result payload".to_string()))
    }

    /// Check a response envelope that carries no payload we need.
    fn expect_ok(&self, response: Response) -> Result<(), ServiceError> {
        let status = response.status();
        let envelope: Envelope<serde_json::Value> =
            response.json().map_err(ServiceError::Transport)?;
        if !status.is_success() || !envelope.status {
            return Err(rejection(status.as_u16(), envelope.error_code, envelope.error_message));
        }
        Ok(())
    }
}

fn rejection(status: u16, code: Option<String>, message: Option<String>) -> ServiceError {
    ServiceError::Rejected {
        status,
        code,
        message: message.unwrap_or_else(|| format!("HTTP {status}")),
    }
}

impl RemoteSource for QaseClient {
    fn suites_page(&self, limit: usize, offset: usize) -> Result<Page<RemoteSuite>, ServiceError> {
        let response = self
            .client
            .get(self.suite_url(None))
            .header("Token", &self.token)
            .query(&[("limit", limit.to_string()), ("offset", offset.to_string())])
            .send()?;
        self.decode(response)
    }

    fn cases_page(
        &self,
        suite_id: u64,
        limit: usize,
        offset: usize,
    ) -> Result<Page<RemoteCase>, ServiceError> {
        let response = self
            .client
            .get(self.case_url(None))
            .header("Token", &self.token)
            .query(&[
                ("suite_id", suite_id.to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()?;
        self.decode(response)
    }
}

impl WriteService for QaseClient {
    fn create_suite(&self, suite: &SuiteWrite) -> Result<u64, ServiceError> {
        let response = self
            .client
            .post(self.suite_url(None))
            .header("Token", &self.token)
            .json(suite)
            .send()?;
        let result: IdResult = self.decode(response)?;
        Ok(result.id)
    }

    fn update_suite(&self, id: u64, suite: &SuiteWrite) -> Result<u64, ServiceError> {
        let response = self
            .client
            .patch(self.suite_url(Some(id)))
            .header("Token", &self.token)
            .json(suite)
            .send()?;
        let result: IdResult = self.decode(response)?;
        Ok(result.id)
    }

    fn delete_suite(&self, id: u64) -> Result<(), ServiceError> {
        let response = self
            .client
            .delete(self.suite_url(Some(id)))
            .header("Token", &self.token)
            .send()?;
        self.expect_ok(response)
    }

    fn create_case(&self, case: &CaseWrite) -> Result<u64, ServiceError> {
        let response = self
            .client
            .post(self.case_url(None))
            .header("Token", &self.token)
            .json(case)
            .send()?;
        let result: IdResult = self.decode(response)?;
        Ok(result.id)
    }

    fn update_case(&self, id: u64, case: &CaseWrite) -> Result<u64, ServiceError> {
        let response = self
            .client
            .patch(self.case_url(Some(id)))
            .header("Token", &self.token)
            .json(case)
            .send()?;
        let result: IdResult = self.decode(response)?;
        Ok(result.id)
    }

    fn delete_case(&self, id: u64) -> Result<(), ServiceError> {
        let response = self
            .client
            .delete(self.case_url(Some(id)))
            .header("Token", &self.token)
            .send()?;
        self.expect_ok(response)
    }
}
