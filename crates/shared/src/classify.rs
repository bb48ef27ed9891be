//! Total error classification.
//!
//! [`classify`] turns any failure value into an [`ErrorDescriptor`] carrying a
//! stable code, the raw message, a user-facing message and a retry flag. It
//! accepts typed envelopes, arbitrary JSON payloads returned by the remote
//! backend, `std::error::Error` trait objects and plain strings, and it never
//! panics.

use crate::ErrorEnvelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Code reported for failures that do not match the known taxonomy.
pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN_ERROR";

/// User message reported for failures outside the known taxonomy.
pub const GENERIC_USER_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Normalized description of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDescriptor {
    /// Canonical code (`unavailable`, `not-found`, ... or `UNKNOWN_ERROR`).
    pub code: Box<str>,
    /// Raw message from the failure.
    pub message: Box<str>,
    /// Human-readable message, never empty.
    pub user_message: Box<str>,
    /// Whether the failure is worth retrying.
    pub retryable: bool,
}

impl ErrorDescriptor {
    fn known(code: ServiceErrorCode, message: impl Into<Box<str>>) -> Self {
        Self {
            code: code.as_str().into(),
            message: message.into(),
            user_message: code.user_message().into(),
            retryable: code.is_retryable(),
        }
    }

    fn unknown(message: impl Into<Box<str>>) -> Self {
        Self {
            code: UNKNOWN_ERROR_CODE.into(),
            message: message.into(),
            user_message: GENERIC_USER_MESSAGE.into(),
            retryable: true,
        }
    }

    /// Returns true for cancellation or supersession descriptors.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(
            ServiceErrorCode::parse(&self.code),
            Some(ServiceErrorCode::Cancelled | ServiceErrorCode::Superseded)
        )
    }
}

impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.code, self.user_message)
    }
}

/// Known remote-service error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorCode {
    /// Service temporarily unavailable.
    Unavailable,
    /// Request deadline elapsed.
    DeadlineExceeded,
    /// Quota or rate limit hit.
    ResourceExhausted,
    /// Operation aborted by the backend.
    Aborted,
    /// Backend internal error.
    Internal,
    /// Transport failure before reaching the backend.
    NetworkRequestFailed,
    /// Resource does not exist.
    NotFound,
    /// Resource already exists.
    AlreadyExists,
    /// Caller lacks permission.
    PermissionDenied,
    /// Caller is not signed in.
    Unauthenticated,
    /// Request payload rejected by the backend.
    InvalidArgument,
    /// Credential failure: wrong password.
    WrongPassword,
    /// Credential failure: unknown account.
    UserNotFound,
    /// Credential failure: email taken.
    EmailAlreadyInUse,
    /// Credential failure: password too weak.
    WeakPassword,
    /// Credential failure: malformed email.
    InvalidEmail,
    /// Credential failure: rejected credential.
    InvalidCredential,
    /// Cooperative cancellation.
    Cancelled,
    /// A newer call replaced this one.
    Superseded,
}

impl ServiceErrorCode {
    /// Every known code, in table order.
    pub const ALL: [Self; 19] = [
        Self::Unavailable,
        Self::DeadlineExceeded,
        Self::ResourceExhausted,
        Self::Aborted,
        Self::Internal,
        Self::NetworkRequestFailed,
        Self::NotFound,
        Self::AlreadyExists,
        Self::PermissionDenied,
        Self::Unauthenticated,
        Self::InvalidArgument,
        Self::WrongPassword,
        Self::UserNotFound,
        Self::EmailAlreadyInUse,
        Self::WeakPassword,
        Self::InvalidEmail,
        Self::InvalidCredential,
        Self::Cancelled,
        Self::Superseded,
    ];

    /// Parse a raw code such as `functions/unavailable`, `DEADLINE_EXCEEDED`
    /// or `auth/wrong-password`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let tail = trimmed
            .rsplit(|c: char| c == '/' || c == ':')
            .next()
            .unwrap_or(trimmed)
            .to_ascii_lowercase()
            .replace('_', "-");

        let code = match tail.as_str() {
            "unavailable" => Self::Unavailable,
            "deadline-exceeded" => Self::DeadlineExceeded,
            "resource-exhausted" => Self::ResourceExhausted,
            "aborted" => Self::Aborted,
            "internal" => Self::Internal,
            "network-request-failed" => Self::NetworkRequestFailed,
            "not-found" => Self::NotFound,
            "already-exists" => Self::AlreadyExists,
            "permission-denied" => Self::PermissionDenied,
            "unauthenticated" => Self::Unauthenticated,
            "invalid-argument" | "invalid-input" => Self::InvalidArgument,
            "wrong-password" => Self::WrongPassword,
            "user-not-found" => Self::UserNotFound,
            "email-already-in-use" => Self::EmailAlreadyInUse,
            "weak-password" => Self::WeakPassword,
            "invalid-email" => Self::InvalidEmail,
            "invalid-credential" => Self::InvalidCredential,
            "cancelled" | "canceled" => Self::Cancelled,
            "superseded" => Self::Superseded,
            _ => return None,
        };
        Some(code)
    }

    /// Canonical kebab-case code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::DeadlineExceeded => "deadline-exceeded",
            Self::ResourceExhausted => "resource-exhausted",
            Self::Aborted => "aborted",
            Self::Internal => "internal",
            Self::NetworkRequestFailed => "network-request-failed",
            Self::NotFound => "not-found",
            Self::AlreadyExists => "already-exists",
            Self::PermissionDenied => "permission-denied",
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidArgument => "invalid-argument",
            Self::WrongPassword => "wrong-password",
            Self::UserNotFound => "user-not-found",
            Self::EmailAlreadyInUse => "email-already-in-use",
            Self::WeakPassword => "weak-password",
            Self::InvalidEmail => "invalid-email",
            Self::InvalidCredential => "invalid-credential",
            Self::Cancelled => "cancelled",
            Self::Superseded => "superseded",
        }
    }

    /// Fixed retry policy for the code.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Unavailable
                | Self::DeadlineExceeded
                | Self::ResourceExhausted
                | Self::Aborted
                | Self::Internal
                | Self::NetworkRequestFailed
        )
    }

    /// User-facing message for the code.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Unavailable => {
                "The service is temporarily unavailable. Please try again in a moment."
            },
            Self::DeadlineExceeded => "The request took too long. Please try again.",
            Self::ResourceExhausted => "Too many requests right now. Please wait and try again.",
            Self::Aborted => "The operation was interrupted. Please try again.",
            Self::Internal => "Something went wrong on our side. Please try again.",
            Self::NetworkRequestFailed => {
                "Network connection problem. Check your connection and try again."
            },
            Self::NotFound => "The requested item could not be found.",
            Self::AlreadyExists => "This item already exists.",
            Self::PermissionDenied => "You do not have permission to do that.",
            Self::Unauthenticated => "Please sign in to continue.",
            Self::InvalidArgument => "The request was not valid. Please check your input.",
            Self::WrongPassword => "Incorrect password. Please try again.",
            Self::UserNotFound => "No account was found with that email address.",
            Self::EmailAlreadyInUse => "An account with this email already exists.",
            Self::WeakPassword => "That password is too weak. Please choose a stronger one.",
            Self::InvalidEmail => "Please enter a valid email address.",
            Self::InvalidCredential => "Those credentials were not accepted. Please try again.",
            Self::Cancelled => "The request was cancelled.",
            Self::Superseded => "A newer request replaced this one.",
        }
    }
}

impl fmt::Display for ServiceErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Values that can be classified into an [`ErrorDescriptor`].
pub trait Classify {
    /// Produce a descriptor. Implementations must not panic.
    fn classify(&self) -> ErrorDescriptor;
}

/// Classify any supported failure value.
pub fn classify<E>(error: &E) -> ErrorDescriptor
where
    E: Classify + ?Sized,
{
    error.classify()
}

impl Classify for ErrorEnvelope {
    fn classify(&self) -> ErrorDescriptor {
        match ServiceErrorCode::parse(self.code.code()) {
            Some(code) => ErrorDescriptor::known(code, self.message.as_str()),
            None => ErrorDescriptor::unknown(self.message.as_str()),
        }
    }
}

impl Classify for Value {
    fn classify(&self) -> ErrorDescriptor {
        match self {
            Self::Null => ErrorDescriptor::unknown("null"),
            Self::String(text) => ErrorDescriptor::unknown(text.as_str()),
            Self::Object(fields) => {
                let message = fields.get("message").and_then(Value::as_str);
                let known = fields
                    .get("code")
                    .or_else(|| fields.get("status"))
                    .and_then(Value::as_str)
                    .and_then(ServiceErrorCode::parse);

                match (known, message) {
                    (Some(code), Some(message)) => ErrorDescriptor::known(code, message),
                    (Some(code), None) => ErrorDescriptor::known(code, code.as_str()),
                    (None, Some(message)) => ErrorDescriptor::unknown(message),
                    (None, None) => ErrorDescriptor::unknown(self.to_string()),
                }
            },
            other => ErrorDescriptor::unknown(other.to_string()),
        }
    }
}

impl Classify for dyn std::error::Error + 'static {
    fn classify(&self) -> ErrorDescriptor {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(candidate) = current {
            if let Some(envelope) = candidate.downcast_ref::<ErrorEnvelope>() {
                return envelope.classify();
            }
            current = candidate.source();
        }
        ErrorDescriptor::unknown(self.to_string())
    }
}

impl Classify for dyn std::error::Error + Send + Sync + 'static {
    fn classify(&self) -> ErrorDescriptor {
        let erased: &(dyn std::error::Error + 'static) = self;
        erased.classify()
    }
}

impl Classify for str {
    fn classify(&self) -> ErrorDescriptor {
        ErrorDescriptor::unknown(self)
    }
}

impl Classify for String {
    fn classify(&self) -> ErrorDescriptor {
        self.as_str().classify()
    }
}

impl<T: Classify> Classify for Option<T> {
    fn classify(&self) -> ErrorDescriptor {
        self.as_ref()
            .map_or_else(|| ErrorDescriptor::unknown("null"), Classify::classify)
    }
}

impl<T: Classify + ?Sized> Classify for Box<T> {
    fn classify(&self) -> ErrorDescriptor {
        (**self).classify()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorClass, ErrorCode};
    use proptest::prelude::*;
    use serde_json::json;

    const RETRYABLE: [&str; 6] = [
        "unavailable",
        "deadline-exceeded",
        "resource-exhausted",
        "aborted",
        "internal",
        "network-request-failed",
    ];

    const NON_RETRYABLE: [&str; 10] = [
        "not-found",
        "already-exists",
        "permission-denied",
        "unauthenticated",
        "wrong-password",
        "user-not-found",
        "email-already-in-use",
        "weak-password",
        "invalid-email",
        "invalid-credential",
    ];

    #[test]
    fn retry_table_matches_policy() {
        for code in RETRYABLE {
            let descriptor = classify(&json!({ "code": code, "message": "x" }));
            assert!(descriptor.retryable, "{code} should be retryable");
            assert_eq!(&*descriptor.code, code);
        }
        for code in NON_RETRYABLE {
            let descriptor = classify(&json!({ "code": code, "message": "x" }));
            assert!(!descriptor.retryable, "{code} should not be retryable");
            assert_eq!(&*descriptor.code, code);
        }
    }

    #[test]
    fn codes_are_parsed_tolerantly() {
        assert_eq!(
            ServiceErrorCode::parse("functions/unavailable"),
            Some(ServiceErrorCode::Unavailable)
        );
        assert_eq!(
            ServiceErrorCode::parse("DEADLINE_EXCEEDED"),
            Some(ServiceErrorCode::DeadlineExceeded)
        );
        assert_eq!(
            ServiceErrorCode::parse("auth/wrong-password"),
            Some(ServiceErrorCode::WrongPassword)
        );
        assert_eq!(
            ServiceErrorCode::parse("remote:network-request-failed"),
            Some(ServiceErrorCode::NetworkRequestFailed)
        );
        assert_eq!(ServiceErrorCode::parse("teapot"), None);
        for code in ServiceErrorCode::ALL {
            assert_eq!(ServiceErrorCode::parse(code.as_str()), Some(code));
        }
    }

    #[test]
    fn envelopes_classify_by_code() {
        let retriable = ErrorEnvelope::remote("unavailable", "503", ErrorClass::Retriable);
        let descriptor = classify(&retriable);
        assert_eq!(&*descriptor.code, "unavailable");
        assert_eq!(&*descriptor.message, "503");
        assert!(descriptor.retryable);

        let denied = ErrorEnvelope::expected(ErrorCode::permission_denied(), "nope");
        assert!(!classify(&denied).retryable);

        let cancelled = classify(&ErrorEnvelope::cancelled("stop"));
        assert!(!cancelled.retryable);
        assert!(cancelled.is_cancellation());

        let superseded = classify(&ErrorEnvelope::superseded("newer"));
        assert!(!superseded.retryable);
        assert!(superseded.is_cancellation());

        let generic = classify(&ErrorEnvelope::expected(ErrorCode::new("app", "odd"), "odd"));
        assert_eq!(&*generic.code, UNKNOWN_ERROR_CODE);
        assert_eq!(&*generic.message, "odd");
        assert!(generic.retryable);
    }

    #[test]
    fn generic_and_non_error_values() {
        let message_only = classify(&json!({ "message": "boom" }));
        assert_eq!(&*message_only.code, UNKNOWN_ERROR_CODE);
        assert_eq!(&*message_only.message, "boom");
        assert_eq!(&*message_only.user_message, GENERIC_USER_MESSAGE);
        assert!(message_only.retryable);

        let null = classify(&Value::Null);
        assert_eq!(&*null.message, "null");
        assert!(null.retryable);

        assert_eq!(&*classify(&json!(42)).message, "42");
        assert_eq!(&*classify("plain text").message, "plain text");
        assert_eq!(&*classify(&None::<String>).message, "null");

        let io: Box<dyn std::error::Error + Send + Sync> =
            Box::new(std::io::Error::other("disk on fire"));
        let descriptor = classify(&*io);
        assert_eq!(&*descriptor.code, UNKNOWN_ERROR_CODE);
        assert_eq!(&*descriptor.message, "disk on fire");
    }

    #[test]
    fn wrapped_envelopes_are_found_in_source_chain() {
        #[derive(Debug)]
        struct Wrapper(ErrorEnvelope);

        impl fmt::Display for Wrapper {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("wrapped")
            }
        }

        impl std::error::Error for Wrapper {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        let wrapped = Wrapper(ErrorEnvelope::remote(
            "not-found",
            "missing",
            ErrorClass::NonRetriable,
        ));
        let erased: &(dyn std::error::Error + 'static) = &wrapped;
        let descriptor = classify(erased);
        assert_eq!(&*descriptor.code, "not-found");
        assert!(!descriptor.retryable);
    }

    #[test]
    fn descriptor_serializes_camel_case() -> Result<(), serde_json::Error> {
        let descriptor = classify(&json!({ "code": "aborted" }));
        let value = serde_json::to_value(&descriptor)?;
        assert_eq!(value["userMessage"], json!(ServiceErrorCode::Aborted.user_message()));
        assert_eq!(value["retryable"], json!(true));
        Ok(())
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            any::<f64>().prop_map(|n| json!(n)),
            ".*".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("(code|message|status|[a-z]{1,6})", inner, 0..6)
                    .prop_map(|map| Value::Object(map.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn classify_is_total_for_json(value in arb_json()) {
            let descriptor = classify(&value);
            prop_assert!(!descriptor.code.is_empty());
            prop_assert!(!descriptor.user_message.is_empty());
        }

        #[test]
        fn classify_is_total_for_codes(code in ".*", message in ".*") {
            let descriptor = classify(&json!({ "code": code, "message": message }));
            prop_assert!(!descriptor.code.is_empty());
            prop_assert!(!descriptor.user_message.is_empty());
            prop_assert_eq!(&*descriptor.message, message.as_str());
        }
    }
}
