//! Sentry integration for errorapi error events.
//!
//! Forwards one [`ErrorEvent`](errorapi_event::ErrorEvent) at a time to
//! Sentry. Each report runs the same sequential, stateless pipeline:
//!
//! 1. Resolve the project for the event's host name, creating it through
//!    the management API if it does not exist yet.
//! 2. Fetch the project's client keys.
//! 3. Map the event onto the store payload and submit it.
//!
//! Nothing is cached between reports. Submission failures are returned as
//! `Ok(false)` rather than errors; only missing configuration
//! ([`ConfigError`]) and failing key retrieval ([`IntegrationError`]) are
//! raised.
//!
//! ```no_run
//! use errorapi_event::ErrorEvent;
//! use errorapi_sentry::{SentryConfig, SentryForwarder};
//!
//! # async fn report(event: ErrorEvent) -> Result<(), Box<dyn std::error::Error>> {
//! let forwarder = SentryForwarder::new(SentryConfig::new("token", "acme", "backend"))?;
//!
//! if !forwarder.report(&event).await? {
//!     tracing::warn!("report was not confirmed");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod api;
pub use self::api::{ApiError, ProjectCredentials};

mod config;
pub use self::config::{ConfigError, SentryConfig};

mod fingerprint;
pub use self::fingerprint::{DefaultFingerprint, Fingerprint};

mod forwarder;
pub use self::forwarder::{IntegrationError, SentryForwarder};

mod payload;
pub use self::payload::StorePayload;

mod slug;
