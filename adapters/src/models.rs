//! Data models shared by every adapter.
//!
//! `ProcessEvent` is the typed form of one inbound message. Raw payloads are
//! only ever turned into it through [`ProcessEvent::from_payload`], which
//! rejects anything missing a field or carrying the wrong type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AdapterError;

/// The two named event streams published by a process event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "processesStarted")]
    ProcessesStarted,
    #[serde(rename = "processesEnded")]
    ProcessesEnded,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::ProcessesStarted, Channel::ProcessesEnded];

    /// Event name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::ProcessesStarted => "processesStarted",
            Channel::ProcessesEnded => "processesEnded",
        }
    }

    /// Heading shown above the channel's table.
    pub fn title(&self) -> &'static str {
        match self {
            Channel::ProcessesStarted => "Processes Started",
            Channel::ProcessesEnded => "Processes Ended",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processesStarted" => Ok(Channel::ProcessesStarted),
            "processesEnded" => Ok(Channel::ProcessesEnded),
            other => Err(AdapterError::UnknownChannel(other.to_string())),
        }
    }
}

/// One process start or end occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEvent {
    pub name: String,
    pub pid: u64,
    /// Kept verbatim; two dates only match when the strings are identical.
    pub date: String,
}

impl ProcessEvent {
    pub fn new(name: impl Into<String>, pid: u64, date: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pid,
            date: date.into(),
        }
    }

    /// Validates an untyped payload. Extra fields are ignored.
    pub fn from_payload(payload: &Value) -> Result<Self, AdapterError> {
        let object = payload.as_object().ok_or_else(|| {
            AdapterError::ValidationError(format!("expected an object, got {}", kind_of(payload)))
        })?;

        let name = match object.get("name") {
            Some(Value::String(name)) => name.clone(),
            Some(other) => {
                return Err(AdapterError::ValidationError(format!(
                    "`name` must be a string, got {}",
                    kind_of(other)
                )))
            }
            None => return Err(AdapterError::ValidationError("missing `name`".to_string())),
        };

        let pid = match object.get("pid") {
            Some(Value::Number(pid)) => pid.as_u64().ok_or_else(|| {
                AdapterError::ValidationError(format!(
                    "`pid` must be a non-negative integer, got {}",
                    pid
                ))
            })?,
            Some(other) => {
                return Err(AdapterError::ValidationError(format!(
                    "`pid` must be a number, got {}",
                    kind_of(other)
                )))
            }
            None => return Err(AdapterError::ValidationError("missing `pid`".to_string())),
        };

        let date = match object.get("date") {
            Some(Value::String(date)) => date.clone(),
            Some(other) => {
                return Err(AdapterError::ValidationError(format!(
                    "`date` must be a string, got {}",
                    kind_of(other)
                )))
            }
            None => return Err(AdapterError::ValidationError("missing `date`".to_string())),
        };

        Ok(Self { name, pid, date })
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn channel_names_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>(), Ok(channel));
        }
        assert_eq!(
            "processesPaused".parse::<Channel>(),
            Err(AdapterError::UnknownChannel("processesPaused".to_string()))
        );
    }

    #[test]
    fn channel_serializes_to_wire_name() {
        assert_eq!(
            serde_json::to_string(&Channel::ProcessesEnded).unwrap(),
            "\"processesEnded\""
        );
    }

    #[test]
    fn accepts_well_formed_payload_with_extra_fields() {
        let payload = json!({"name": "nginx", "pid": 4021, "date": "2024-01-01", "user": "root"});
        assert_eq!(
            ProcessEvent::from_payload(&payload).unwrap(),
            ProcessEvent::new("nginx", 4021, "2024-01-01")
        );
    }

    #[test]
    fn rejects_missing_fields() {
        let err = ProcessEvent::from_payload(&json!({"name": "a", "pid": 1})).unwrap_err();
        assert_eq!(err, AdapterError::ValidationError("missing `date`".to_string()));
    }

    #[test]
    fn rejects_wrong_types() {
        let cases = [
            json!({"name": 7, "pid": 1, "date": "d"}),
            json!({"name": "a", "pid": "1", "date": "d"}),
            json!({"name": "a", "pid": -1, "date": "d"}),
            json!({"name": "a", "pid": 1.5, "date": "d"}),
            json!({"name": "a", "pid": 1, "date": null}),
            json!(["a", 1, "d"]),
        ];
        for payload in cases {
            let err = ProcessEvent::from_payload(&payload).unwrap_err();
            assert!(
                matches!(err, AdapterError::ValidationError(_)),
                "{payload} gave {err:?}"
            );
            assert!(!err.is_terminal());
        }
    }

    #[test]
    fn date_is_not_normalized() {
        let event =
            ProcessEvent::from_payload(&json!({"name": "a", "pid": 1, "date": " 2024-01-01 "}))
                .unwrap();
        assert_eq!(event.date, " 2024-01-01 ");
    }
}
