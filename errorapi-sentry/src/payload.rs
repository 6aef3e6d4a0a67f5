//! The store payload and its mapping from an error event.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use errorapi_event::{ClientEnvironment, ErrorEvent, TraceEntry};

use crate::fingerprint::Fingerprint;

/// Logger name reported with every event.
const LOGGER: &str = "luya.errorapi";

/// Platform of the reporting application.
const PLATFORM: &str = "php";

/// Severity reported with every event.
const LEVEL: &str = "error";

/// SDK identifier reported with every event.
const SDK_NAME: &str = "luya-errorapi";
const SDK_VERSION: &str = "2.0.0";

/// The JSON document submitted to Sentry's store endpoint.
///
/// Built once per error event by [`StorePayload::from_event`]. Top-level
/// fields whose computed value is empty are omitted from the document
/// entirely; nested fields are forwarded as-is. Every payload carries
/// exactly one exception entry with a stack frame list, which stays
/// present even when the trace is empty.
#[derive(Debug, PartialEq, Serialize)]
pub struct StorePayload {
    logger: &'static str,
    platform: &'static str,
    level: &'static str,
    sdk: SdkInfo,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    fingerprint: Vec<String>,

    exception: ExceptionList,

    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    culprit: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    server_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    release: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    request: Option<RequestPayload>,

    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserPayload>,

    #[serde(skip_serializing_if = "Option::is_none")]
    contexts: Option<Contexts>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    tags: BTreeMap<&'static str, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    extra: BTreeMap<&'static str, Value>,
}

/// Minimal SDK descriptor, always constant for this forwarder.
#[derive(Debug, PartialEq, Serialize)]
struct SdkInfo {
    name: &'static str,
    version: &'static str,
}

/// Container holding the single exception entry of a payload.
#[derive(Debug, PartialEq, Serialize)]
struct ExceptionList {
    values: [ExceptionEntry; 1],
}

#[derive(Debug, PartialEq, Serialize)]
struct ExceptionEntry {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    ty: Option<String>,
    value: String,
    stacktrace: Stacktrace,
}

#[derive(Debug, PartialEq, Serialize)]
struct Stacktrace {
    frames: Vec<Frame>,
}

#[derive(Debug, PartialEq, Serialize)]
struct Frame {
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lineno: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context_line: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pre_context: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    post_context: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    abs_path: Option<String>,
}

/// The request interface of the store payload.
///
/// `query_string` is forwarded as a dictionary, which the store endpoint
/// accepts alongside the unparsed-string form.
#[derive(Debug, PartialEq, Serialize)]
struct RequestPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    query_string: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    data: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    env: BTreeMap<String, Value>,
}

#[derive(Debug, PartialEq, Serialize)]
struct UserPayload {
    ip_address: String,
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct Contexts {
    #[serde(skip_serializing_if = "Option::is_none")]
    os: Option<OsContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    browser: Option<BrowserContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    runtime: Option<RuntimeContext>,
}

/// Operating system of the client, fields individually nullable.
#[derive(Debug, PartialEq, Serialize)]
struct OsContext {
    name: Option<String>,
    version: Option<String>,
}

/// Browser of the client, fields individually nullable.
#[derive(Debug, PartialEq, Serialize)]
struct BrowserContext {
    name: Option<String>,
    version: Option<String>,
}

#[derive(Debug, PartialEq, Serialize)]
struct RuntimeContext {
    name: &'static str,
    version: String,
}

impl StorePayload {
    /// Maps an error event onto the store payload.
    ///
    /// Pure; performs no I/O. The fingerprint strategy's result is
    /// forwarded verbatim.
    pub fn from_event(event: &ErrorEvent, fingerprint: &dyn Fingerprint) -> Self {
        Self {
            logger: LOGGER,
            platform: PLATFORM,
            level: LEVEL,
            sdk: SdkInfo {
                name: SDK_NAME,
                version: SDK_VERSION,
            },
            fingerprint: fingerprint.fingerprint(event),
            exception: ExceptionList {
                values: [ExceptionEntry {
                    ty: event.exception_name.clone(),
                    value: event.error_message.clone(),
                    stacktrace: Stacktrace {
                        frames: event.trace.iter().map(frame).collect(),
                    },
                }],
            },
            timestamp: event.timestamp,
            message: non_empty(&event.error_message),
            culprit: culprit(event),
            server_name: event.server_name.as_deref().and_then(non_empty),
            release: event.app_version.as_deref().and_then(non_empty),
            request: request(event),
            user: event
                .ip
                .as_deref()
                .and_then(non_empty)
                .map(|ip_address| UserPayload { ip_address }),
            contexts: contexts(event),
            tags: tags(event),
            extra: extra(event),
        }
    }
}

/// Returns an owned copy of `value` unless it is empty.
fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

fn culprit(event: &ErrorEvent) -> Option<String> {
    let file = event.file.as_deref().and_then(non_empty)?;
    Some(match event.line {
        Some(line) => format!("{file}:{line}"),
        None => file,
    })
}

fn frame(entry: &TraceEntry) -> Frame {
    Frame {
        filename: entry.file.clone(),
        function: entry.function.clone(),
        lineno: entry.line,
        context_line: entry.context_line.clone(),
        pre_context: entry.pre_context.clone(),
        post_context: entry.post_context.clone(),
        abs_path: entry.abs_path.clone(),
    }
}

fn request(event: &ErrorEvent) -> Option<RequestPayload> {
    let url = event.request_uri.as_deref().and_then(non_empty);
    if url.is_none() && event.get.is_empty() && event.post.is_empty() && event.server.is_empty() {
        return None;
    }

    Some(RequestPayload {
        url,
        query_string: event.get.clone(),
        data: event.post.clone(),
        env: event.server.clone(),
    })
}

fn contexts(event: &ErrorEvent) -> Option<Contexts> {
    let mut contexts = Contexts::default();

    if let Some(environment) = &event.client_environment {
        let ClientEnvironment {
            os_name,
            os_version,
            browser_name,
            browser_version,
        } = environment.clone();

        contexts.os = Some(OsContext {
            name: os_name,
            version: os_version,
        });
        contexts.browser = Some(BrowserContext {
            name: browser_name,
            version: browser_version,
        });
    }

    if let Some(version) = event.php_version.as_deref().and_then(non_empty) {
        contexts.runtime = Some(RuntimeContext {
            name: PLATFORM,
            version,
        });
    }

    (contexts != Contexts::default()).then_some(contexts)
}

fn tags(event: &ErrorEvent) -> BTreeMap<&'static str, String> {
    let mut tags = BTreeMap::new();
    if let Some(status_code) = event.status_code {
        tags.insert("status_code", status_code.to_string());
    }
    if let Some(version) = event.framework_version.as_deref().and_then(non_empty) {
        tags.insert("framework_version", version);
    }
    tags
}

fn extra(event: &ErrorEvent) -> BTreeMap<&'static str, Value> {
    let mut extra = BTreeMap::new();
    if !event.session.is_empty() {
        let session = event
            .session
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<serde_json::Map<_, _>>();
        extra.insert("session", Value::Object(session));
    }
    extra
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use similar_asserts::assert_eq;

    use crate::fingerprint::DefaultFingerprint;

    use super::*;

    fn to_json(payload: &StorePayload) -> Value {
        serde_json::to_value(payload).unwrap()
    }

    fn minimal_event() -> ErrorEvent {
        ErrorEvent {
            error_message: "Division by zero".to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn constant_fields_are_always_present() {
        let payload = StorePayload::from_event(&minimal_event(), &DefaultFingerprint);
        let json = to_json(&payload);

        assert_eq!(json["logger"], "luya.errorapi");
        assert_eq!(json["platform"], "php");
        assert_eq!(json["level"], "error");
        assert_eq!(
            json["sdk"],
            json!({"name": "luya-errorapi", "version": "2.0.0"}),
        );
    }

    #[test]
    fn empty_fields_are_dropped_from_the_top_level() {
        let payload = StorePayload::from_event(&minimal_event(), &DefaultFingerprint);
        let json = to_json(&payload);
        let object = json.as_object().unwrap();

        for absent in [
            "timestamp",
            "culprit",
            "server_name",
            "release",
            "request",
            "user",
            "contexts",
            "tags",
            "extra",
        ] {
            assert!(!object.contains_key(absent), "`{absent}` should be absent");
        }

        // Non-empty values stay byte-equal to their source.
        assert_eq!(json["message"], "Division by zero");
    }

    #[test]
    fn empty_message_is_dropped_but_exception_keeps_it() {
        let event = ErrorEvent {
            error_message: String::new(),
            ..Default::default()
        };
        let payload = StorePayload::from_event(&event, &DefaultFingerprint);
        let json = to_json(&payload);

        assert!(!json.as_object().unwrap().contains_key("message"));
        assert_eq!(json["exception"]["values"][0]["value"], "");
    }

    #[test]
    fn default_fingerprint_is_message_and_uri() {
        let event = ErrorEvent {
            request_uri: Some("/en/shop".to_owned()),
            ..minimal_event()
        };
        let payload = StorePayload::from_event(&event, &DefaultFingerprint);

        assert_eq!(
            to_json(&payload)["fingerprint"],
            json!(["Division by zero", "/en/shop"]),
        );
    }

    #[test]
    fn custom_fingerprint_is_forwarded_verbatim() {
        let strategy =
            |_: &ErrorEvent| vec!["b".to_owned(), "a".to_owned(), String::new()];
        let payload = StorePayload::from_event(&minimal_event(), &strategy);

        assert_eq!(to_json(&payload)["fingerprint"], json!(["b", "a", ""]));
    }

    #[test]
    fn empty_custom_fingerprint_is_dropped() {
        let strategy = |_: &ErrorEvent| Vec::<String>::new();
        let payload = StorePayload::from_event(&minimal_event(), &strategy);

        assert!(!to_json(&payload).as_object().unwrap().contains_key("fingerprint"));
    }

    #[test]
    fn empty_trace_keeps_an_empty_frame_list() {
        let payload = StorePayload::from_event(&minimal_event(), &DefaultFingerprint);

        assert_eq!(
            to_json(&payload)["exception"],
            json!({"values": [{"value": "Division by zero", "stacktrace": {"frames": []}}]}),
        );
    }

    #[test]
    fn frames_preserve_trace_order() {
        let event = ErrorEvent {
            trace: vec![
                TraceEntry {
                    file: Some("a.php".to_owned()),
                    function: Some("f".to_owned()),
                    line: Some(10),
                    ..Default::default()
                },
                TraceEntry {
                    file: Some("b.php".to_owned()),
                    line: Some(3),
                    ..Default::default()
                },
            ],
            ..minimal_event()
        };
        let payload = StorePayload::from_event(&event, &DefaultFingerprint);
        let frames = to_json(&payload)["exception"]["values"][0]["stacktrace"]["frames"].clone();

        assert_eq!(
            frames,
            json!([
                {"filename": "a.php", "function": "f", "lineno": 10},
                {"filename": "b.php", "lineno": 3},
            ]),
        );
    }

    #[test]
    fn contexts_follow_the_environment() {
        // No client environment, no PHP version: no contexts at all.
        let payload = StorePayload::from_event(&minimal_event(), &DefaultFingerprint);
        assert!(!to_json(&payload).as_object().unwrap().contains_key("contexts"));

        // A client environment yields os and browser with nullable fields.
        let event = ErrorEvent {
            client_environment: Some(ClientEnvironment {
                os_name: Some("Windows".to_owned()),
                browser_name: Some("Firefox".to_owned()),
                ..Default::default()
            }),
            ..minimal_event()
        };
        let payload = StorePayload::from_event(&event, &DefaultFingerprint);
        assert_eq!(
            to_json(&payload)["contexts"],
            json!({
                "os": {"name": "Windows", "version": null},
                "browser": {"name": "Firefox", "version": null},
            }),
        );

        // A PHP version alone yields only the runtime context.
        let event = ErrorEvent {
            php_version: Some("8.1.2".to_owned()),
            ..minimal_event()
        };
        let payload = StorePayload::from_event(&event, &DefaultFingerprint);
        assert_eq!(
            to_json(&payload)["contexts"],
            json!({"runtime": {"name": "php", "version": "8.1.2"}}),
        );
    }

    #[test]
    fn full_event_maps_onto_the_documented_shape() {
        let event = ErrorEvent {
            error_message: "Call to undefined method".to_owned(),
            exception_name: Some("yii\\base\\UnknownMethodException".to_owned()),
            file: Some("controllers/DefaultController.php".to_owned()),
            line: Some(42),
            request_uri: Some("/en/shop/checkout".to_owned()),
            status_code: Some(500),
            server_name: Some("shop.example.com".to_owned()),
            ip: Some("203.0.113.4".to_owned()),
            get: [("page".to_owned(), json!("2"))].into(),
            post: [("qty".to_owned(), json!(3))].into(),
            server: [("REQUEST_METHOD".to_owned(), json!("POST"))].into(),
            session: [("user_id".to_owned(), json!(7))].into(),
            app_version: Some("1.0.4".to_owned()),
            framework_version: Some("2.0.47".to_owned()),
            php_version: Some("8.1.2".to_owned()),
            client_environment: Some(ClientEnvironment {
                os_name: Some("Windows".to_owned()),
                os_version: Some("10".to_owned()),
                browser_name: Some("Firefox".to_owned()),
                browser_version: None,
            }),
            trace: vec![TraceEntry {
                file: Some("DefaultController.php".to_owned()),
                function: Some("actionCheckout".to_owned()),
                line: Some(42),
                context_line: Some("$cart->finalize();".to_owned()),
                pre_context: vec!["public function actionCheckout()".to_owned(), "{".to_owned()],
                ..Default::default()
            }],
            timestamp: Some("2023-05-17T09:30:00Z".parse().unwrap()),
        };

        let payload = StorePayload::from_event(&event, &DefaultFingerprint);

        assert_eq!(
            to_json(&payload),
            json!({
                "logger": "luya.errorapi",
                "platform": "php",
                "level": "error",
                "sdk": {"name": "luya-errorapi", "version": "2.0.0"},
                "fingerprint": ["Call to undefined method", "/en/shop/checkout"],
                "exception": {"values": [{
                    "type": "yii\\base\\UnknownMethodException",
                    "value": "Call to undefined method",
                    "stacktrace": {"frames": [{
                        "filename": "DefaultController.php",
                        "function": "actionCheckout",
                        "lineno": 42,
                        "context_line": "$cart->finalize();",
                        "pre_context": ["public function actionCheckout()", "{"],
                    }]},
                }]},
                "timestamp": "2023-05-17T09:30:00Z",
                "message": "Call to undefined method",
                "culprit": "controllers/DefaultController.php:42",
                "server_name": "shop.example.com",
                "release": "1.0.4",
                "request": {
                    "url": "/en/shop/checkout",
                    "query_string": {"page": "2"},
                    "data": {"qty": 3},
                    "env": {"REQUEST_METHOD": "POST"},
                },
                "user": {"ip_address": "203.0.113.4"},
                "contexts": {
                    "os": {"name": "Windows", "version": "10"},
                    "browser": {"name": "Firefox", "version": null},
                    "runtime": {"name": "php", "version": "8.1.2"},
                },
                "tags": {"status_code": "500", "framework_version": "2.0.47"},
                "extra": {"session": {"user_id": 7}},
            }),
        );
    }
}
