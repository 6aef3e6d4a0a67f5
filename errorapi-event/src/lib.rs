//! Error event model for the errorapi Sentry forwarder.
//!
//! The hosting framework's error handler produces one [`ErrorEvent`] per
//! application error and hands it to the forwarder as a read-only view. The
//! forwarder never mutates an event; it only maps it onto the ingestion
//! payload.
//!
//! All fields are optional except the error message, and every field has a
//! serde default, so partial documents produced by older framework versions
//! deserialize cleanly.

#![warn(missing_docs)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single entry of the error's stack trace, in original trace order.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TraceEntry {
    /// Source file the entry points into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Absolute path of the source file, if it differs from `file`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abs_path: Option<String>,

    /// Function or method name, possibly including the class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,

    /// Line number within the source file, starting at 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,

    /// The source line the entry points at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_line: Option<String>,

    /// Source lines immediately before `context_line`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_context: Vec<String>,

    /// Source lines immediately after `context_line`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_context: Vec<String>,
}

/// Client environment as detected by the framework's user agent parser.
///
/// Every field is individually optional; detection libraries routinely
/// identify a browser without a version or vice versa.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientEnvironment {
    /// Display name of the operating system.
    pub os_name: Option<String>,
    /// Version string of the operating system.
    pub os_version: Option<String>,
    /// Display name of the browser application.
    pub browser_name: Option<String>,
    /// Version string of the browser.
    pub browser_version: Option<String>,
}

/// One application error as reported by the hosting framework.
///
/// The superglobal-style request maps (`get`, `post`, `server`, `session`)
/// carry arbitrary JSON values since the framework forwards nested form
/// data as-is.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ErrorEvent {
    /// Human readable error message.
    pub error_message: String,

    /// Class name of the thrown exception.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_name: Option<String>,

    /// Source file the error originated in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Line number the error originated at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,

    /// Request URI of the failing request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_uri: Option<String>,

    /// HTTP status code the framework responded with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Server or host name the error originated on. May be a bare host or
    /// a full URL, depending on the framework's configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    /// IP address of the client that triggered the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Query parameters of the failing request.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub get: BTreeMap<String, Value>,

    /// Form body of the failing request.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub post: BTreeMap<String, Value>,

    /// Server environment of the failing request.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub server: BTreeMap<String, Value>,

    /// Session data of the failing request.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub session: BTreeMap<String, Value>,

    /// Version of the reporting application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    /// Version of the web framework the application runs on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework_version: Option<String>,

    /// Version of the PHP runtime the application runs on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub php_version: Option<String>,

    /// Client environment descriptor, if the framework detected one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_environment: Option<ClientEnvironment>,

    /// Stack trace of the error, outermost entry first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TraceEntry>,

    /// Point in time the framework recorded the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}
