use core::{
    pin::Pin,
    task::{Context, Poll, ready},
};

use bytes_utils::Str;
use futures_core::Stream;

use crate::{
    constants::MESSAGE_STR,
    errors::StreamError,
    event::{ChatEvent, Frame, Step},
    parser::{Line, LineBuffer, parse_line},
    utf8::Utf8Decoder,
};

/// Per-session assembler state: the line buffer, the pending event type and whether a terminal
/// frame has been seen.
///
/// Never shared. One instance per stream.
#[derive(Debug)]
pub struct StreamState {
    buffer: LineBuffer,
    event_type: Str,
    terminated: bool,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            buffer: LineBuffer::new(),
            event_type: MESSAGE_STR,
            terminated: false,
        }
    }
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Event type the next `data:` line will be dispatched as
    pub fn current_event_type(&self) -> &str {
        &self.event_type
    }

    /// Append decoded text. Ignored once terminated.
    pub fn push_text(&mut self, text: &str) {
        if !self.terminated {
            self.buffer.push(text);
        }
    }

    /// Process the next complete buffered line. [None] when more input is needed or the stream is terminated.
    pub fn next_step(&mut self) -> Option<Step> {
        if self.terminated {
            return None;
        }
        let line = self.buffer.next_line()?;
        Some(self.process_line(&line))
    }

    /// Treat whatever is left in the buffer as one last line
    pub fn finish(&mut self) -> Option<Step> {
        if self.terminated {
            return None;
        }
        let line = self.buffer.take_remainder()?;
        Some(self.process_line(&line))
    }

    /// The per-line transition. `event:` sets the pending type, `data:` commits a frame under it
    /// and resets the type to `message`, everything else is ignored.
    pub fn process_line(&mut self, line: &str) -> Step {
        if self.terminated {
            return Step::Continue;
        }

        match parse_line(line) {
            Line::Event(event_type) => {
                self.event_type = Str::from(event_type);
                Step::Continue
            }
            Line::Data(data) => {
                let event_type = core::mem::replace(&mut self.event_type, MESSAGE_STR);
                let step = match Frame::new(&event_type, data).dispatch() {
                    Ok(step) => step,
                    Err(e) => {
                        tracing::debug!(event_type = %event_type, error = %e, "dropping malformed frame");
                        Step::Skip
                    }
                };
                tracing::trace!(event_type = %event_type, ?step, "frame dispatched");

                if step.is_terminal() {
                    self.terminated = true;
                }
                step
            }
            Line::Other => Step::Continue,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum EventStreamPhase {
    Reading,
    /// The source is exhausted, only buffered lines are left
    Draining,
    Terminated,
}

pin_project_lite::pin_project! {
    /// [`Stream`][futures_core::Stream] that turns a byte stream into [`ChatEvent`]s.
    ///
    /// Ends right after the first `done` or `error` event. If the source is exhausted before
    /// either arrives it yields [`StreamError::UnexpectedEnd`] once and then ends; a failed read
    /// yields [`StreamError::Transport`] once and then ends.
    #[derive(Debug)]
    pub struct EventStream<S> {
        #[pin]
        stream: S,
        decoder: Utf8Decoder,
        state: StreamState,
        phase: EventStreamPhase,
    }
}

impl<S> EventStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: Utf8Decoder::new(),
            state: StreamState::new(),
            phase: EventStreamPhase::Reading,
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Give back the underlying byte source, dropping any buffered partial line
    pub fn into_inner(self) -> S {
        self.stream
    }
}

fn next_event(state: &mut StreamState) -> Option<ChatEvent> {
    while let Some(step) = state.next_step() {
        if let Some(event) = step.into_event() {
            return Some(event);
        }
    }
    None
}

impl<S, E, B> Stream for EventStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    type Item = Result<ChatEvent, StreamError<E>>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<<Self as Stream>::Item>> {
        let mut this = self.project();

        loop {
            match *this.phase {
                EventStreamPhase::Terminated => return Poll::Ready(None),
                EventStreamPhase::Draining => {
                    let event = match next_event(this.state) {
                        Some(event) => Some(event),
                        None => this.state.finish().and_then(Step::into_event),
                    };

                    return match event {
                        Some(event) => {
                            if event.is_terminal() {
                                *this.phase = EventStreamPhase::Terminated;
                            }
                            Poll::Ready(Some(Ok(event)))
                        }
                        None => {
                            *this.phase = EventStreamPhase::Terminated;
                            tracing::warn!("stream ended without a terminal event");
                            Poll::Ready(Some(Err(StreamError::UnexpectedEnd)))
                        }
                    };
                }
                EventStreamPhase::Reading => {}
            }

            if let Some(event) = next_event(this.state) {
                if event.is_terminal() {
                    *this.phase = EventStreamPhase::Terminated;
                }
                return Poll::Ready(Some(Ok(event)));
            }

            let chunk = match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    *this.phase = EventStreamPhase::Terminated;
                    tracing::warn!("failed to read the next chunk");
                    return Poll::Ready(Some(Err(StreamError::Transport(e))));
                }
                None => {
                    *this.phase = EventStreamPhase::Draining;
                    this.state.push_text(&this.decoder.finish());
                    continue;
                }
            };

            let chunk = chunk.as_ref();
            if chunk.is_empty() {
                continue;
            }

            let text = this.decoder.decode(chunk);
            this.state.push_text(&text);
        }
    }
}
