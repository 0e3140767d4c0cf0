//! Incremental SSE parsing.
//!
//! [`EventParser`] turns decoded text chunks into [`ParseOutput`]s following
//! the [HTML Living Standard](https://html.spec.whatwg.org/multipage/server-sent-events.html)
//! field rules, plus the `heartbeatTimeout` extension field. It never sees
//! bytes: decoding happens in the transport.

pub(crate) mod assembler;
pub(crate) mod constants;
pub(crate) mod errors;
pub mod event;
pub mod event_stream;
pub(crate) mod parser;

pub use assembler::{EventParser, ParseOutput};
pub use errors::EventStreamError;
pub use event::MessageEvent;
pub use event_stream::EventStream;
