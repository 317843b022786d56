//! # Remote Store Client
//!
//! HTTP client for the intake server of the process holding the coverage
//! store. The maintenance commands fall back to it when the database file
//! is locked by a running `explore --serve` or `serve`.

use crate::api::{ForgetRequest, ForgetResponse, Scope, StatusResponse};
use serde::de::DeserializeOwned;
use xanthippe_core::{ButtonSequence, CoverageStats, XanthippeError};

/// Client for one running intake server.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteStore {
    /// Point at `base_url`, e.g. `http://127.0.0.1:8080`.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Server this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request carrying the scope's key, if one is configured.
    fn request(&self, method: reqwest::Method, path: &str, scope: Scope) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, &url);
        if let Some(key) = scope.key_from_env() {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        scope: Scope,
    ) -> Result<reqwest::Response, XanthippeError> {
        let resp = req.send().await.map_err(|e| {
            XanthippeError::IoError(format!("Cannot reach {}: {}", self.base_url, e))
        })?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(XanthippeError::IoError(format!(
                "{} rejected the key (check {})",
                self.base_url,
                scope.env()
            )));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(XanthippeError::IoError(format!(
                "{} is rate limiting requests",
                self.base_url
            )));
        }
        Ok(resp)
    }

    async fn json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, XanthippeError> {
        resp.json::<T>()
            .await
            .map_err(|e| XanthippeError::DeserializationError(e.to_string()))
    }

    /// GET /status
    pub async fn stats(&self) -> Result<CoverageStats, XanthippeError> {
        let req = self.request(reqwest::Method::GET, "/status", Scope::Maintenance);
        let status: StatusResponse = Self::json(self.send(req, Scope::Maintenance).await?).await?;
        match (status.stats, status.error) {
            (Some(stats), _) => Ok(stats),
            (None, error) => Err(XanthippeError::IoError(
                error.unwrap_or_else(|| "Status returned no counts".to_string()),
            )),
        }
    }

    /// POST / with the sequences joined by commas.
    pub async fn request_sequences(&self, sequences: &[ButtonSequence]) -> Result<(), XanthippeError> {
        let body = sequences
            .iter()
            .map(ButtonSequence::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let req = self
            .request(reqwest::Method::POST, "/", Scope::Intake)
            .body(body);
        let resp = self.send(req, Scope::Intake).await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(XanthippeError::IoError(format!(
                "Intake failed with {}",
                resp.status()
            )))
        }
    }

    /// POST /forget; counts only when `dry_run`.
    pub async fn forget(&self, prefix: &ButtonSequence, dry_run: bool) -> Result<usize, XanthippeError> {
        let body = ForgetRequest {
            prefix: prefix.as_str().to_string(),
            dry_run,
        };
        let req = self
            .request(reqwest::Method::POST, "/forget", Scope::Maintenance)
            .json(&body);
        let response: ForgetResponse =
            Self::json(self.send(req, Scope::Maintenance).await?).await?;
        match (response.affected, response.error) {
            (Some(affected), _) => Ok(affected),
            (None, error) => Err(XanthippeError::IoError(
                error.unwrap_or_else(|| "Forget returned no count".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_drops_trailing_slash() {
        assert_eq!(
            RemoteStore::new("http://127.0.0.1:8080/").base_url(),
            "http://127.0.0.1:8080"
        );
    }
}
