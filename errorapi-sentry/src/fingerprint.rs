use errorapi_event::ErrorEvent;

/// Strategy computing the fingerprint Sentry groups events by.
///
/// The returned list is forwarded verbatim, including its order. Implemented
/// for any `Fn(&ErrorEvent) -> Vec<String>`, so a plain closure can be
/// passed to
/// [`SentryForwarder::with_fingerprint`](crate::SentryForwarder::with_fingerprint).
pub trait Fingerprint: Send + Sync {
    /// Computes the fingerprint for `event`.
    fn fingerprint(&self, event: &ErrorEvent) -> Vec<String>;
}

impl<F> Fingerprint for F
where
    F: Fn(&ErrorEvent) -> Vec<String> + Send + Sync,
{
    fn fingerprint(&self, event: &ErrorEvent) -> Vec<String> {
        self(event)
    }
}

/// Default grouping by error message and request URI.
///
/// A missing request URI contributes the empty string, keeping the
/// grouping stable across requests with and without a URI.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultFingerprint;

impl Fingerprint for DefaultFingerprint {
    fn fingerprint(&self, event: &ErrorEvent) -> Vec<String> {
        vec![
            event.error_message.clone(),
            event.request_uri.clone().unwrap_or_default(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn default_fingerprint_is_message_and_uri() {
        let event = ErrorEvent {
            error_message: "Division by zero".to_owned(),
            request_uri: Some("/en/shop".to_owned()),
            ..Default::default()
        };

        assert_eq!(
            DefaultFingerprint.fingerprint(&event),
            vec!["Division by zero".to_owned(), "/en/shop".to_owned()],
        );
    }

    #[test]
    fn missing_uri_contributes_empty_string() {
        let event = ErrorEvent {
            error_message: "Division by zero".to_owned(),
            ..Default::default()
        };

        assert_eq!(
            DefaultFingerprint.fingerprint(&event),
            vec!["Division by zero".to_owned(), String::new()],
        );
    }

    #[test]
    fn closures_implement_the_strategy() {
        let strategy = |event: &ErrorEvent| vec![event.error_message.clone()];
        let event = ErrorEvent {
            error_message: "oops".to_owned(),
            ..Default::default()
        };

        assert_eq!(strategy.fingerprint(&event), vec!["oops".to_owned()]);
    }
}
