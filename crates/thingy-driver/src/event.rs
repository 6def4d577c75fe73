//! Events published by a device session.

use serde::{Deserialize, Serialize};
use thingy_codec::{Command, Reading};
use thingy_core::error::Error;
use thingy_core::types::{FeatureId, MethodKind};

/// Something a session wants its observers to know about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A notification was decoded
    Reading {
        /// Source feature
        feature: FeatureId,
        /// Decoded value
        value: Reading,
    },
    /// A write completed
    WriteOk {
        /// Target feature
        feature: FeatureId,
        /// The command as given by the caller
        value: Command,
    },
    /// An operation failed
    Error {
        /// Feature the failure belongs to, if any
        feature: Option<FeatureId>,
        /// What went wrong
        error: Error,
    },
    /// An operation was parked in the queue
    OperationQueued {
        /// Feature
        feature: FeatureId,
        /// Operation
        method: MethodKind,
    },
    /// A queued operation was given up on
    OperationDiscarded {
        /// Feature
        feature: FeatureId,
        /// Operation
        method: MethodKind,
    },
    /// The transaction gate was released
    GattAvailable,
    /// The session is gone
    Disconnected,
}

impl SessionEvent {
    /// Feature the event is about
    pub fn feature(&self) -> Option<FeatureId> {
        match self {
            SessionEvent::Reading { feature, .. }
            | SessionEvent::WriteOk { feature, .. }
            | SessionEvent::OperationQueued { feature, .. }
            | SessionEvent::OperationDiscarded { feature, .. } => Some(*feature),
            SessionEvent::Error { feature, .. } => *feature,
            SessionEvent::GattAvailable | SessionEvent::Disconnected => None,
        }
    }

    /// Whether this is an error event
    pub fn is_error(&self) -> bool {
        matches!(self, SessionEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thingy_codec::environment::Temperature;

    #[test]
    fn test_event_json() {
        let event = SessionEvent::Reading {
            feature: FeatureId::Temperature,
            value: Reading::Temperature(Temperature { celsius: 22.5 }),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "reading");
        assert_eq!(json["feature"], "temperature");
        assert_eq!(json["value"]["kind"], "temperature");

        let discarded = SessionEvent::OperationDiscarded {
            feature: FeatureId::Led,
            method: MethodKind::Connect,
        };
        let json = serde_json::to_string(&discarded).unwrap();
        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, discarded);
    }

    #[test]
    fn test_feature_accessor() {
        assert_eq!(SessionEvent::GattAvailable.feature(), None);
        let error = SessionEvent::Error {
            feature: Some(FeatureId::Gas),
            error: Error::timeout("slow"),
        };
        assert!(error.is_error());
        assert_eq!(error.feature(), Some(FeatureId::Gas));
    }
}
