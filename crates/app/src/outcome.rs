//! Result of a remote use case that may have fallen back or lost a race.

use rehearse_shared::ErrorDescriptor;

/// Outcome of a use case backed by a remote function.
///
/// Degraded values come from the offline responder and are never reported
/// as live results.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    /// Produced by the live backend.
    Live(T),
    /// Placeholder produced after the live call failed or was unavailable.
    Degraded {
        /// Placeholder value.
        value: T,
        /// Why the live result is missing.
        reason: ErrorDescriptor,
    },
    /// A newer call completed first; this result was discarded.
    Stale,
}

impl<T> CallOutcome<T> {
    /// Stable label (`live`, `degraded`, `stale`).
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Live(_) => "live",
            Self::Degraded { .. } => "degraded",
            Self::Stale => "stale",
        }
    }

    /// Returns true for degraded outcomes.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Borrow the value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Live(value) | Self::Degraded { value, .. } => Some(value),
            Self::Stale => None,
        }
    }

    /// Take the value, if any.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Live(value) | Self::Degraded { value, .. } => Some(value),
            Self::Stale => None,
        }
    }

    /// Degradation reason, if any.
    #[must_use]
    pub const fn degraded_reason(&self) -> Option<&ErrorDescriptor> {
        match self {
            Self::Degraded { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Convert the value while keeping the outcome kind.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<CallOutcome<U>, E> {
        Ok(match self {
            Self::Live(value) => CallOutcome::Live(f(value)?),
            Self::Degraded { value, reason } => CallOutcome::Degraded {
                value: f(value)?,
                reason,
            },
            Self::Stale => CallOutcome::Stale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehearse_shared::{ErrorClass, ErrorEnvelope, classify};

    #[test]
    fn try_map_preserves_kind_and_reason() -> Result<(), String> {
        let reason = classify(&ErrorEnvelope::remote(
            "unavailable",
            "down",
            ErrorClass::Retriable,
        ));
        let outcome = CallOutcome::Degraded {
            value: 2,
            reason: reason.clone(),
        };

        let mapped = outcome.try_map(|value| Ok::<_, String>(value * 10))?;
        assert_eq!(mapped.value(), Some(&20));
        assert_eq!(mapped.degraded_reason(), Some(&reason));
        assert_eq!(mapped.label(), "degraded");

        let stale: CallOutcome<u32> = CallOutcome::Stale;
        assert_eq!(stale.try_map(|_| Err::<u32, _>("unused".to_string()))?, CallOutcome::Stale);
        Ok(())
    }

    #[test]
    fn live_values_are_not_degraded() {
        let outcome = CallOutcome::Live("reply");
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.into_value(), Some("reply"));
    }
}
