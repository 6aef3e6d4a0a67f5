use std::fmt;
use std::sync::Arc;

use errorapi_event::ErrorEvent;

use crate::api::{ApiError, ProjectCredentials, SentryApi};
use crate::config::{ConfigError, SentryConfig};
use crate::fingerprint::{DefaultFingerprint, Fingerprint};
use crate::payload::StorePayload;
use crate::slug;

/// Raised when client keys cannot be obtained for a resolved project.
///
/// This is the only failure a report surfaces as an error; its message is
/// safe to show to end users and never contains the configured token.
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    /// The keys listing failed, most likely because the token is invalid
    /// or lacks permissions for the project.
    #[error(
        "unable to fetch keys for project `{slug}`, the configured token may be invalid or missing permissions"
    )]
    KeysUnavailable {
        /// Slug of the project whose keys were requested.
        slug: String,
        /// The underlying API failure.
        #[source]
        source: ApiError,
    },

    /// The keys listing succeeded but contained no keys.
    #[error("project `{slug}` has no client keys")]
    NoKeys {
        /// Slug of the project whose keys were requested.
        slug: String,
    },
}

/// A project the forwarder settled on for one report.
#[derive(Debug)]
struct ResolvedProject {
    /// Slug identifying the project in API paths.
    slug: String,
    /// Whether this report created the project.
    created: bool,
}

/// Forwards error events to Sentry.
///
/// Stateless between reports: every call to [`report`](Self::report)
/// resolves its project and keys from scratch.
pub struct SentryForwarder {
    api: SentryApi,
    fingerprint: Arc<dyn Fingerprint>,
}

impl fmt::Debug for SentryForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentryForwarder").finish_non_exhaustive()
    }
}

impl SentryForwarder {
    /// Creates a forwarder with the default fingerprint strategy.
    ///
    /// Validates the configuration eagerly; no network activity happens
    /// before validation passes.
    pub fn new(config: SentryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            api: SentryApi::new(config)?,
            fingerprint: Arc::new(DefaultFingerprint),
        })
    }

    /// Replaces the fingerprint strategy.
    pub fn with_fingerprint(mut self, fingerprint: impl Fingerprint + 'static) -> Self {
        self.fingerprint = Arc::new(fingerprint);
        self
    }

    /// Reports a single error event.
    ///
    /// Returns `Ok(true)` iff Sentry acknowledged the submission. A failed
    /// submission or a failed project lookup/creation yields `Ok(false)`
    /// at worst; only failing key retrieval raises an error.
    pub async fn report(&self, event: &ErrorEvent) -> Result<bool, IntegrationError> {
        let project = self.resolve_project(event).await;
        let credentials = self.fetch_keys(&project).await?;
        let payload = StorePayload::from_event(event, self.fingerprint.as_ref());
        Ok(self.send(&credentials, &payload).await)
    }

    /// Finds or creates the project for the event's host name.
    ///
    /// `created` is set only when the creation call succeeded; a failed
    /// creation leaves it unset so no compensation runs for a project that
    /// never existed.
    async fn resolve_project(&self, event: &ErrorEvent) -> ResolvedProject {
        let name = slug::domain(event.server_name.as_deref().unwrap_or_default()).to_owned();
        let slug = slug::slugify(&name);

        if let Err(error) = self.api.get_project(&slug).await {
            tracing::debug!(%slug, %error, "project not found upstream, creating it");

            let created = match self.api.create_project(&name, &slug).await {
                Ok(()) => true,
                Err(error) => {
                    tracing::warn!(%slug, %error, "project creation failed");
                    false
                }
            };
            return ResolvedProject { slug, created };
        }

        ResolvedProject {
            slug,
            created: false,
        }
    }

    /// Fetches the first client key of the resolved project.
    async fn fetch_keys(
        &self,
        project: &ResolvedProject,
    ) -> Result<ProjectCredentials, IntegrationError> {
        let keys = match self.api.list_keys(&project.slug).await {
            Ok(keys) => keys,
            Err(source) => {
                self.compensate(project).await;
                return Err(IntegrationError::KeysUnavailable {
                    slug: project.slug.clone(),
                    source,
                });
            }
        };

        match keys.into_iter().next() {
            Some(credentials) => Ok(credentials),
            None => {
                self.compensate(project).await;
                Err(IntegrationError::NoKeys {
                    slug: project.slug.clone(),
                })
            }
        }
    }

    /// Removes a project this report created, once, ignoring the outcome.
    async fn compensate(&self, project: &ResolvedProject) {
        if !project.created {
            return;
        }

        if let Err(error) = self.api.delete_project(&project.slug).await {
            tracing::debug!(slug = %project.slug, %error, "compensating project delete failed");
        }
    }

    /// Submits the payload, reporting the outcome as a plain boolean.
    async fn send(&self, credentials: &ProjectCredentials, payload: &StorePayload) -> bool {
        match self.api.store_event(credentials, payload).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(%error, "event submission was not accepted");
                false
            }
        }
    }
}
