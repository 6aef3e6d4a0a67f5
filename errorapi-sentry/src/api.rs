//! Thin client for the Sentry HTTP APIs used by the forwarder.
//!
//! Management calls (project lookup, creation, deletion and the keys
//! listing) authenticate with the configured bearer token; the store call
//! authenticates through its DSN query parameters instead.

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::config::{ConfigError, SentryConfig};
use crate::payload::StorePayload;

/// Error raised by an individual API call.
///
/// Callers of the forwarder never handle this directly; it either
/// disappears into the boolean submission result or becomes the source of
/// an [`IntegrationError`](crate::IntegrationError).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be sent.
    #[error("could not send request")]
    Send(#[from] reqwest::Error),

    /// The remote responded with a non-success status code.
    #[error("unexpected status code {0}")]
    Status(StatusCode),

    /// The response body did not decode.
    #[error("failed to parse JSON response")]
    Json(#[from] serde_json::Error),
}

/// Ingestion credentials of a resolved project.
///
/// Deserialized straight from one entry of the keys listing; additional
/// fields of the listing are ignored. Resolved fresh for every report and
/// never cached.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ProjectCredentials {
    /// Numeric project identifier, as reported by the keys API.
    #[serde(rename = "projectId", deserialize_with = "string_or_number")]
    pub id: String,

    /// Public DSN key.
    #[serde(rename = "public")]
    pub public_key: String,

    /// Secret DSN key.
    #[serde(rename = "secret")]
    pub secret_key: String,
}

/// Accepts the project identifier both as JSON string and as number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        String(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::String(value) => value,
        Raw::Number(value) => value.to_string(),
    })
}

#[derive(Debug, Serialize)]
struct CreateProject<'a> {
    name: &'a str,
    slug: &'a str,
}

/// Client for the subset of Sentry's management and ingestion APIs the
/// forwarder needs.
#[derive(Debug)]
pub(crate) struct SentryApi {
    client: Client,
    base_url: Url,
    config: SentryConfig,
}

impl SentryApi {
    pub fn new(config: SentryConfig) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url)?;
        Ok(Self {
            client: Client::new(),
            base_url,
            config,
        })
    }

    /// Looks up the project `slug` under the configured organisation.
    pub async fn get_project(&self, slug: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!(
            "/api/0/projects/{}/{}/",
            self.config.organisation, slug
        ));
        let response = self.client.get(url).bearer_auth(&self.config.token).send().await?;
        expect_success(response).map(drop)
    }

    /// Creates the project `slug` named `name` under the configured team.
    pub async fn create_project(&self, name: &str, slug: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!(
            "/api/0/teams/{}/{}/projects/",
            self.config.organisation, self.config.team
        ));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.token)
            .json(&CreateProject { name, slug })
            .send()
            .await?;
        expect_success(response).map(drop)
    }

    /// Deletes the project `slug` under the configured organisation.
    pub async fn delete_project(&self, slug: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!(
            "/api/0/projects/{}/{}/",
            self.config.organisation, slug
        ));
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.config.token)
            .send()
            .await?;
        expect_success(response).map(drop)
    }

    /// Lists the client keys of the project `slug`.
    pub async fn list_keys(&self, slug: &str) -> Result<Vec<ProjectCredentials>, ApiError> {
        let url = self.endpoint(&format!(
            "/api/0/projects/{}/{}/keys/",
            self.config.organisation, slug
        ));
        let response = self.client.get(url).bearer_auth(&self.config.token).send().await?;
        let body = expect_success(response)?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Submits a store payload with the given credentials.
    pub async fn store_event(
        &self,
        credentials: &ProjectCredentials,
        payload: &StorePayload,
    ) -> Result<(), ApiError> {
        let mut url = self.endpoint(&format!("/api/{}/store/", credentials.id));
        url.set_query(Some(&format!(
            "sentry_version=5&sentry_key={}&sentry_secret={}",
            credentials.public_key, credentials.secret_key
        )));
        let response = self.client.post(url).json(payload).send().await?;
        expect_success(response).map(drop)
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }
}

fn expect_success(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status(response.status()))
    }
}
