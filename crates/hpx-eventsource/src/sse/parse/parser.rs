//! Incremental line/field tokenizer for decoded SSE text.
//!
//! Only complete lines are ever tokenized: the tail of a chunk after its last
//! line terminator is carried in a text buffer until the next terminator
//! shows up. The only state that crosses a chunk boundary besides that
//! buffer is whether the last terminator was a CR, so that an LF opening the
//! next chunk is not counted as a second terminator.

use std::ops::ControlFlow;

use super::constants::{COLON, CR, LF};

/// Field names with an effect on the event being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldName {
    Data,
    Id,
    Event,
    Retry,
    HeartbeatTimeout,
    /// Unknown names and comment lines (empty name).
    Ignored,
}

impl FieldName {
    fn resolve(name: &str) -> Self {
        match name {
            "data" => Self::Data,
            "id" => Self::Id,
            "event" => Self::Event,
            "retry" => Self::Retry,
            "heartbeatTimeout" => Self::HeartbeatTimeout,
            _ => Self::Ignored,
        }
    }
}

/// A full line from an SSE stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Line<'a> {
    /// An empty line (dispatch boundary).
    Blank,
    /// A field line. Lines without a colon have an empty value.
    Field { name: FieldName, value: &'a str },
}

impl<'a> Line<'a> {
    fn read(line: &'a str) -> Self {
        if line.is_empty() {
            return Self::Blank;
        }

        match memchr::memchr(COLON, line.as_bytes()) {
            Some(colon_pos) => {
                let value = &line[colon_pos + 1..];
                // Strip exactly one leading space.
                let value = value.strip_prefix(' ').unwrap_or(value);
                Self::Field {
                    name: FieldName::resolve(&line[..colon_pos]),
                    value,
                }
            }
            None => Self::Field {
                name: FieldName::resolve(line),
                value: "",
            },
        }
    }
}

/// Where the tokenizer stands between chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LineMode {
    /// At the start of a line.
    #[default]
    FieldStart,
    /// The previous line ended in CR; a leading LF belongs to it.
    AfterCr,
}

/// Splits decoded text into [`Line`]s on CR, LF and CRLF.
#[derive(Debug, Clone, Default)]
pub(crate) struct LineTokenizer {
    mode: LineMode,
    text_buffer: String,
}

impl LineTokenizer {
    /// Return to the initial state, dropping any partial line.
    pub(crate) fn reset(&mut self) {
        self.mode = LineMode::FieldStart;
        self.text_buffer.clear();
    }

    /// Text received after the last line terminator.
    #[cfg(test)]
    pub(crate) fn pending_text(&self) -> &str {
        &self.text_buffer
    }

    /// Tokenize `chunk`, handing every complete line to `on_line` in order.
    ///
    /// Stops early when `on_line` breaks; the rest of the chunk is dropped.
    pub(crate) fn feed(
        &mut self,
        chunk: &str,
        mut on_line: impl FnMut(Line<'_>) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        let Some(last_eol) = memchr::memrchr2(CR, LF, chunk.as_bytes()) else {
            self.text_buffer.push_str(chunk);
            return ControlFlow::Continue(());
        };

        let (complete, rest) = chunk.split_at(last_eol + 1);
        let joined;
        let text = if self.text_buffer.is_empty() {
            complete
        } else {
            self.text_buffer.push_str(complete);
            joined = std::mem::take(&mut self.text_buffer);
            joined.as_str()
        };

        let result = self.tokenize(text, &mut on_line);
        self.text_buffer.clear();
        self.text_buffer.push_str(rest);
        result
    }

    fn tokenize(
        &mut self,
        text: &str,
        on_line: &mut impl FnMut(Line<'_>) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        let bytes = text.as_bytes();
        let mut pos = 0;

        while pos < bytes.len() {
            if self.mode == LineMode::AfterCr {
                self.mode = LineMode::FieldStart;
                if bytes[pos] == LF {
                    pos += 1;
                    continue;
                }
            }

            let Some(offset) = memchr::memchr2(CR, LF, &bytes[pos..]) else {
                break;
            };
            let eol = pos + offset;

            self.mode = if bytes[eol] == CR {
                LineMode::AfterCr
            } else {
                LineMode::FieldStart
            };
            on_line(Line::read(&text[pos..eol]))?;
            pos = eol + 1;
        }

        ControlFlow::Continue(())
    }
}
