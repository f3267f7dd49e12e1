//! Callback-driven consumption of a chat stream
//!
//! [`drive`] pulls chunks one at a time, so callbacks fire strictly in wire order and never
//! concurrently. Exactly one of `on_done` / `on_error` fires per stream, unless the driving
//! future is dropped first: dropping it releases the byte source and no further callback runs.
//! A caller that has seen neither must treat the stream as still open.

use core::{fmt::Display, future::IntoFuture, pin::pin};

use futures_core::Stream;
use futures_util::StreamExt;

use crate::{
    errors::StreamError,
    event::{ChatEvent, FileChange, Usage},
    event_stream::EventStream,
};

/// Receives the events of one chat stream
pub trait StreamHandler {
    fn on_token(&mut self, token: &str);

    fn on_done(&mut self, tokens_used: Option<i64>, new_balance: Option<i64>);

    fn on_error(&mut self, message: &str);

    /// Files the reply changed, sent before `on_done`. Ignored unless overridden.
    fn on_file_changes(&mut self, changes: &[FileChange]) {
        let _ = changes;
    }
}

impl<H: StreamHandler + ?Sized> StreamHandler for &mut H {
    fn on_token(&mut self, token: &str) {
        (**self).on_token(token)
    }

    fn on_done(&mut self, tokens_used: Option<i64>, new_balance: Option<i64>) {
        (**self).on_done(tokens_used, new_balance)
    }

    fn on_error(&mut self, message: &str) {
        (**self).on_error(message)
    }

    fn on_file_changes(&mut self, changes: &[FileChange]) {
        (**self).on_file_changes(changes)
    }
}

fn ignore_file_changes(_: &[FileChange]) {}

/// [`StreamHandler`] built from closures
pub struct Callbacks<T, D, R, F = fn(&[FileChange])> {
    on_token: T,
    on_done: D,
    on_error: R,
    on_file_changes: F,
}

impl<T, D, R> Callbacks<T, D, R>
where
    T: FnMut(&str),
    D: FnMut(Option<i64>, Option<i64>),
    R: FnMut(&str),
{
    pub fn new(on_token: T, on_done: D, on_error: R) -> Self {
        Self {
            on_token,
            on_done,
            on_error,
            on_file_changes: ignore_file_changes,
        }
    }
}

impl<T, D, R, F> Callbacks<T, D, R, F> {
    pub fn with_file_changes<F2>(self, on_file_changes: F2) -> Callbacks<T, D, R, F2>
    where
        F2: FnMut(&[FileChange]),
    {
        Callbacks {
            on_token: self.on_token,
            on_done: self.on_done,
            on_error: self.on_error,
            on_file_changes,
        }
    }
}

impl<T, D, R, F> StreamHandler for Callbacks<T, D, R, F>
where
    T: FnMut(&str),
    D: FnMut(Option<i64>, Option<i64>),
    R: FnMut(&str),
    F: FnMut(&[FileChange]),
{
    fn on_token(&mut self, token: &str) {
        (self.on_token)(token)
    }

    fn on_done(&mut self, tokens_used: Option<i64>, new_balance: Option<i64>) {
        (self.on_done)(tokens_used, new_balance)
    }

    fn on_error(&mut self, message: &str) {
        (self.on_error)(message)
    }

    fn on_file_changes(&mut self, changes: &[FileChange]) {
        (self.on_file_changes)(changes)
    }
}

/// How a driven stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `on_done` was called
    Completed(Usage),
    /// `on_error` was called
    Failed,
}

/// Feed `source` through the decoder until a terminal event fires or the source runs dry.
///
/// Runtime failures (a failed read, or running out before `done`/`error`) go through `on_error`
/// exactly like an `error` frame, once, and end the stream.
pub async fn drive<S, E, B, H>(source: S, mut handler: H) -> Outcome
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    H: StreamHandler,
{
    let mut events = pin!(EventStream::new(source));

    while let Some(next) = events.next().await {
        match next {
            Ok(ChatEvent::Token(token)) => handler.on_token(&token),
            Ok(ChatEvent::FileChanges(changes)) => handler.on_file_changes(&changes),
            Ok(ChatEvent::Done(usage)) => {
                tracing::debug!(
                    tokens_used = usage.tokens_used,
                    new_balance = usage.new_balance,
                    "chat stream completed"
                );
                handler.on_done(usage.tokens_used, usage.new_balance);
                return Outcome::Completed(usage);
            }
            Ok(ChatEvent::Error(message)) => {
                tracing::debug!(%message, "chat stream reported an error");
                handler.on_error(&message);
                return Outcome::Failed;
            }
            Err(e) => {
                report_stream_error(&e, &mut handler);
                return Outcome::Failed;
            }
        }
    }

    // EventStream always yields a terminal item before ending
    report_stream_error::<E, H>(&StreamError::UnexpectedEnd, &mut handler);
    Outcome::Failed
}

fn report_stream_error<E, H>(error: &StreamError<E>, handler: &mut H)
where
    E: Display,
    H: StreamHandler,
{
    tracing::warn!(%error, "chat stream failed");
    handler.on_error(&error.to_string());
}

/// Open a stream and drive it.
///
/// A failure to open is returned as `Err` before any callback runs; it is never routed through
/// `on_error`.
pub async fn start<O, S, OE, E, B, H>(open: O, handler: H) -> Result<Outcome, OE>
where
    O: IntoFuture<Output = Result<S, OE>>,
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    H: StreamHandler,
{
    let source = open.await?;
    Ok(drive(source, handler).await)
}
