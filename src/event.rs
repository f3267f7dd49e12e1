//! Frames, payloads and the events they turn into

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{
    constants::{
        DEFAULT_OPERATION, DONE_EVENT, ERROR_EVENT, FILE_CHANGES_EVENT, GENERIC_ERROR_MESSAGE,
    },
    errors::PayloadError,
};

/// One event type paired with the raw data of a single `data:` line, dispatched then discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub event: &'a str,
    pub data: &'a str,
}

impl<'a> Frame<'a> {
    pub fn new(event: &'a str, data: &'a str) -> Self {
        Self { event, data }
    }

    /// Parse the data as JSON and pick the dispatch for this frame's event type
    pub fn dispatch(&self) -> Result<Step, PayloadError> {
        Payload::from_json(self.data)?.into_step(self.event)
    }
}

/// A single file touched by the assistant's reply
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileChange {
    pub file: String,
    /// `modify` when absent or null
    #[serde(default = "default_operation", deserialize_with = "operation_or_default")]
    pub operation: String,
    #[serde(default)]
    pub diff: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

fn default_operation() -> String {
    DEFAULT_OPERATION.to_owned()
}

fn operation_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_operation))
}

/// Token accounting reported by a `done` frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Usage {
    pub tokens_used: Option<i64>,
    pub new_balance: Option<i64>,
}

/// Fields read from a `data:` payload. Which ones matter depends on the event type.
///
/// A field holding the wrong JSON type reads as absent, so only broken JSON can make a frame
/// fail. `changes` stays raw until a `file_changes` frame asks for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    pub token: Option<String>,
    pub tokens_used: Option<i64>,
    pub new_balance: Option<i64>,
    pub error: Option<Value>,
    pub changes: Option<Value>,
}

impl Payload {
    pub fn from_json(data: &str) -> Result<Self, PayloadError> {
        let mut deserializer = serde_json::Deserializer::from_str(data);
        let value = Value::deserialize(&mut deserializer)?;
        deserializer.end()?;
        Ok(Self::from_value(value))
    }

    /// Anything other than an object carries no fields
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::default();
        };

        Self {
            token: match fields.remove("token") {
                Some(Value::String(token)) => Some(token),
                _ => None,
            },
            tokens_used: fields.get("tokensUsed").and_then(Value::as_i64),
            new_balance: fields.get("newBalance").and_then(Value::as_i64),
            error: fields.remove("error").filter(|error| !error.is_null()),
            changes: fields.remove("changes").filter(|changes| !changes.is_null()),
        }
    }

    /// | event type          | result                                        |
    /// | ------------------- | --------------------------------------------- |
    /// | `error`             | [Step::Error], `error` or a generic message   |
    /// | `done`              | [Step::Done]                                  |
    /// | `file_changes`      | [Step::FileChanges] if `changes` is present   |
    /// | anything else       | [Step::Token] if `token` is present           |
    ///
    /// Everything that matches nothing is a [Step::Skip]. A non-string `error` is forwarded as
    /// its JSON text. Only a `changes` list that does not match [FileChange] fails.
    pub fn into_step(self, event_type: &str) -> Result<Step, PayloadError> {
        let step = match event_type {
            ERROR_EVENT => Step::Error(match self.error {
                Some(Value::String(message)) => message,
                Some(other) => other.to_string(),
                None => GENERIC_ERROR_MESSAGE.to_owned(),
            }),
            DONE_EVENT => Step::Done(Usage {
                tokens_used: self.tokens_used,
                new_balance: self.new_balance,
            }),
            FILE_CHANGES_EVENT => match self.changes {
                Some(changes) => Step::FileChanges(serde_path_to_error::deserialize(changes)?),
                None => Step::Skip,
            },
            _ => match self.token {
                Some(token) => Step::Token(token),
                None => Step::Skip,
            },
        };
        Ok(step)
    }
}

/// Outcome of feeding one line to the assembler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Token(String),
    Done(Usage),
    Error(String),
    FileChanges(Vec<FileChange>),
    /// A frame was committed but triggers no callback (malformed payload or no matching field)
    Skip,
    /// The line was consumed without committing a frame
    Continue,
}

impl Step {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::Done(_) | Step::Error(_))
    }

    /// The caller-facing event, if this step dispatches one
    pub fn into_event(self) -> Option<ChatEvent> {
        match self {
            Step::Token(token) => Some(ChatEvent::Token(token)),
            Step::Done(usage) => Some(ChatEvent::Done(usage)),
            Step::Error(message) => Some(ChatEvent::Error(message)),
            Step::FileChanges(changes) => Some(ChatEvent::FileChanges(changes)),
            Step::Skip | Step::Continue => None,
        }
    }
}

/// Event handed out by an [EventStream][crate::event_stream::EventStream], in wire order
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ChatEvent {
    Token(String),
    FileChanges(Vec<FileChange>),
    /// Terminal
    Done(Usage),
    /// Terminal. Sent by the server as an `error` frame.
    Error(String),
}

impl ChatEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Done(_) | ChatEvent::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_table() {
        assert_eq!(
            Frame::new("message", r#"{"token":"Hi"}"#).dispatch().unwrap(),
            Step::Token("Hi".to_owned())
        );
        assert_eq!(
            Frame::new("done", r#"{"tokensUsed":5,"newBalance":95}"#)
                .dispatch()
                .unwrap(),
            Step::Done(Usage {
                tokens_used: Some(5),
                new_balance: Some(95)
            })
        );
        assert_eq!(
            Frame::new("error", r#"{"error":"rate limited"}"#)
                .dispatch()
                .unwrap(),
            Step::Error("rate limited".to_owned())
        );
        // unrecognized types behave like `message`
        assert_eq!(
            Frame::new("delta", r#"{"token":"x"}"#).dispatch().unwrap(),
            Step::Token("x".to_owned())
        );
    }

    #[test]
    fn missing_fields() {
        assert_eq!(
            Frame::new("error", "{}").dispatch().unwrap(),
            Step::Error(GENERIC_ERROR_MESSAGE.to_owned())
        );
        assert_eq!(
            Frame::new("done", "{}").dispatch().unwrap(),
            Step::Done(Usage::default())
        );
        assert_eq!(Frame::new("message", "{}").dispatch().unwrap(), Step::Skip);
        assert_eq!(
            Frame::new("message", r#"{"token":null}"#).dispatch().unwrap(),
            Step::Skip
        );
        assert_eq!(
            Frame::new("file_changes", r#"{"token":"ignored"}"#)
                .dispatch()
                .unwrap(),
            Step::Skip
        );
        // an empty token is still present
        assert_eq!(
            Frame::new("message", r#"{"token":""}"#).dispatch().unwrap(),
            Step::Token(String::new())
        );
    }

    #[test]
    fn insufficient_tokens_payload() {
        assert_eq!(
            Frame::new(
                "error",
                r#"{"error":"insufficient_tokens","required":10,"balance":3}"#
            )
            .dispatch()
            .unwrap(),
            Step::Error("insufficient_tokens".to_owned())
        );
    }

    #[test]
    fn file_changes() {
        let step = Frame::new(
            "file_changes",
            r#"{"changes":[{"file":"src/App.tsx","operation":"modify","diff":"+a","explanation":"why"},{"file":"b.ts","operation":"create"}]}"#,
        )
        .dispatch()
        .unwrap();
        assert_eq!(
            step,
            Step::FileChanges(vec![
                FileChange {
                    file: "src/App.tsx".to_owned(),
                    operation: "modify".to_owned(),
                    diff: Some("+a".to_owned()),
                    explanation: Some("why".to_owned()),
                },
                FileChange {
                    file: "b.ts".to_owned(),
                    operation: "create".to_owned(),
                    diff: None,
                    explanation: None,
                },
            ])
        );
        assert!(!step.is_terminal());
    }

    #[test]
    fn malformed_payloads() {
        assert!(matches!(
            Frame::new("message", "not json").dispatch(),
            Err(PayloadError::Syntax(_))
        ));
        assert!(Frame::new("message", r#"{"token":"a"} trailing"#).dispatch().is_err());
        assert!(Frame::new("done", "").dispatch().is_err());

        let err = Frame::new("file_changes", r#"{"changes":[{"file":"a.rs","diff":7}]}"#)
            .dispatch()
            .unwrap_err();
        assert!(matches!(err, PayloadError::Changes(_)));
        assert!(err.to_string().contains("diff"), "{err}");
    }

    #[test]
    fn mistyped_fields_read_as_absent() {
        assert_eq!(
            Frame::new("done", r#"{"tokensUsed":"five","newBalance":90}"#)
                .dispatch()
                .unwrap(),
            Step::Done(Usage {
                tokens_used: None,
                new_balance: Some(90)
            })
        );
        assert_eq!(
            Frame::new("done", r#"{"tokensUsed":10.0,"newBalance":90,"token":5}"#)
                .dispatch()
                .unwrap(),
            Step::Done(Usage {
                tokens_used: None,
                new_balance: Some(90)
            })
        );
        assert_eq!(
            Frame::new("error", r#"{"error":{"code":429}}"#)
                .dispatch()
                .unwrap(),
            Step::Error(r#"{"code":429}"#.to_owned())
        );
        assert_eq!(
            Frame::new("error", r#"{"error":null}"#).dispatch().unwrap(),
            Step::Error(GENERIC_ERROR_MESSAGE.to_owned())
        );
        assert_eq!(
            Frame::new("message", r#"{"token":5}"#).dispatch().unwrap(),
            Step::Skip
        );
        // valid JSON that is not an object carries no fields
        assert_eq!(
            Frame::new("done", "[1,2]").dispatch().unwrap(),
            Step::Done(Usage::default())
        );
        assert_eq!(
            Frame::new("error", r#""oops""#).dispatch().unwrap(),
            Step::Error(GENERIC_ERROR_MESSAGE.to_owned())
        );
    }

    #[test]
    fn missing_operation_defaults_to_modify() {
        let step = Frame::new(
            "file_changes",
            r#"{"changes":[{"file":"a.rs","operation":null},{"file":"b.rs"}]}"#,
        )
        .dispatch()
        .unwrap();
        let Step::FileChanges(changes) = step else {
            panic!("expected file changes, got {step:?}");
        };
        assert!(changes.iter().all(|change| change.operation == "modify"));
    }

    #[test]
    fn steps_to_events() {
        assert!(Step::Done(Usage::default()).is_terminal());
        assert!(Step::Error(String::new()).is_terminal());
        assert!(!Step::Token(String::new()).is_terminal());
        assert_eq!(Step::Skip.into_event(), None);
        assert_eq!(Step::Continue.into_event(), None);
        assert_eq!(
            Step::Token("a".to_owned()).into_event(),
            Some(ChatEvent::Token("a".to_owned()))
        );
    }
}
