//! Common constants used across the SSE parser.

/// Newline byte
pub(crate) const LF: u8 = b'\n';
/// Carriage return byte
pub(crate) const CR: u8 = b'\r';
/// Field/value separator
pub(crate) const COLON: u8 = b':';

/// Default event type (`"message"`)
pub(crate) const MESSAGE_TYPE: &str = "message";
/// Event type that additionally fires the `onopen` slot
pub(crate) const OPEN_TYPE: &str = "open";
/// Event type that additionally fires the `onerror` slot
pub(crate) const ERROR_TYPE: &str = "error";
