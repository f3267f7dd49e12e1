//! Incremental decoding of AI chat replies streamed token by token as
//! [Server-Sent Events](https://html.spec.whatwg.org/multipage/server-sent-events.html).
//!
//! A reply arrives as a chunked HTTP body of `event:` / `data:` lines:
//!
//! ```text
//! data: {"token":"Hel"}
//!
//! data: {"token":"lo"}
//!
//! event: done
//! data: {"tokensUsed":10,"newBalance":90}
//! ```
//!
//! `chatsse` is layered, leaves first:
//!
//! - [`Utf8Decoder`][utf8::Utf8Decoder] - turns byte chunks into text, holding back characters
//!   split across chunks and replacing malformed bytes with U+FFFD.
//! - [`LineBuffer`][parser::LineBuffer] and [`parse_line`][parser::parse_line] - split text into
//!   complete lines and classify them.
//! - [`StreamState`][event_stream::StreamState] - the assembler: tracks the pending event type,
//!   parses each `data:` payload and decides what it dispatches as a [`Step`][event::Step].
//! - [`EventStream`] - a [`Stream`][futures_core::Stream] adapter from any
//!   `Stream<Item = Result<impl AsRef<[u8]>, E>>` to [`ChatEvent`][event::ChatEvent]s that ends
//!   at the first `done` or `error`.
//! - [`drive`] / [`start`] - run a stream to completion against a [`StreamHandler`]'s
//!   `on_token` / `on_done` / `on_error` callbacks.
//! - `ChatClient` (requires `reqwest`) - opens the stream over HTTP.
//!
//! # Driving a stream
//!
//! ```rust
//! use bytes::Bytes;
//! use chatsse::{Callbacks, Outcome, drive};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let chunks = vec![
//!     Ok::<_, std::io::Error>(Bytes::from("data: {\"token\":\"Hi\"}\n\nevent: do")),
//!     Ok(Bytes::from("ne\ndata: {\"tokensUsed\":5,\"newBalance\":95}\n\n")),
//! ];
//!
//! let mut reply = String::new();
//! let outcome = drive(
//!     futures::stream::iter(chunks),
//!     Callbacks::new(
//!         |token| reply.push_str(token),
//!         |tokens_used, new_balance| println!("used {tokens_used:?}, left {new_balance:?}"),
//!         |message| eprintln!("error: {message}"),
//!     ),
//! )
//! .await;
//!
//! assert!(matches!(outcome, Outcome::Completed(_)));
//! assert_eq!(reply, "Hi");
//! # }
//! ```
//!
//! # Feature flags
//!
//! | Feature | Default | Description |
//! | --- | --- | --- |
//! | `reqwest` | off | Provides `ChatClient` for opening chat streams over HTTP with [`reqwest`]. |
//! | `serde` | off | Derives [`Serialize`][::serde::Serialize] on [`ChatEvent`][event::ChatEvent], [`FileChange`][event::FileChange] and [`Usage`][event::Usage]. |

pub(crate) mod constants;
pub mod driver;
pub mod errors;
pub mod event;
pub mod event_stream;
pub mod parser;
#[cfg(feature = "reqwest")]
pub mod reqwest;
pub mod utf8;

pub use constants::{GENERIC_ERROR_MESSAGE, UNEXPECTED_END_MESSAGE};
pub use driver::{Callbacks, Outcome, StreamHandler, drive, start};
pub use event::ChatEvent;
pub use event_stream::EventStream;
#[cfg(feature = "reqwest")]
pub use reqwest::{ChatClient, ClientConfig};
