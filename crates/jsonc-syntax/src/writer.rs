//! Streaming writer: the inverse of `parser` over a fixed-ceiling output
//! buffer instead of an arena, driven by a context stack of its own.
//!
//! Every value method funnels through [`Writer::prep`], which emits the
//! leading comma and `"name":` prefix a container expects, then the caller
//! appends the value's own bytes. A structural or capacity violation sets a
//! sticky error flag rather than panicking or unwinding — later calls become
//! no-ops (container-end calls still balance the stack so nesting stays
//! consistent), and [`Writer::get`] reports whichever violation was first.

use crate::error::{WriteError, WriteResult};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    TopValue,
    InArray,
    InObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastToken {
    None,
    Value,
}

#[derive(Clone, Copy)]
struct Frame {
    context: Context,
    last: LastToken,
}

/// Emits a JSON document into a fixed-capacity buffer.
pub struct Writer {
    buf: Vec<u8>,
    cap: usize,
    stack: Vec<Frame>,
    stack_limit: usize,
    error: Option<WriteError>,
}

impl Writer {
    /// `0` for either argument selects the default; values below the floor
    /// are raised to it. `stack_depth` bounds writer nesting the same way it
    /// bounds parser nesting.
    #[must_use]
    pub fn new(buf_bytes: usize, stack_depth: usize) -> Self {
        let cap = buf_bytes.max(crate::parser::DEFAULT_ARENA_BYTES);
        let stack_limit = stack_depth.max(crate::parser::DEFAULT_STACK_DEPTH);
        let mut w = Writer {
            buf: Vec::with_capacity(cap),
            cap,
            stack: Vec::with_capacity(stack_limit),
            stack_limit,
            error: None,
        };
        w.begin();
        w
    }

    /// Resets position, error flag, and stack, ready for a fresh document.
    pub fn begin(&mut self) {
        self.buf.clear();
        self.error = None;
        self.stack.clear();
        self.stack.push(Frame {
            context: Context::TopValue,
            last: LastToken::None,
        });
    }

    /// Finishes the document. Fails if a container is still open or if any
    /// prior call set the sticky error flag.
    pub fn get(&self) -> WriteResult<&[u8]> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.stack.len() != 1 {
            return Err(WriteError::IncompleteDocument);
        }
        Ok(&self.buf)
    }

    fn fail(&mut self, err: WriteError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn raw(&mut self, bytes: &[u8]) {
        if self.error.is_some() {
            return;
        }
        if self.buf.len() + bytes.len() > self.cap {
            self.fail(WriteError::BufferFull);
            return;
        }
        self.buf.extend_from_slice(bytes);
    }

    /// Validates `name`'s presence against the current context, emits a
    /// leading separator if needed, and emits `"name":` inside an object.
    fn prep(&mut self, name: Option<&[u8]>) {
        if self.error.is_some() {
            return;
        }
        let frame = *self.stack.last().expect("the top frame is never popped");
        let name_required = frame.context == Context::InObject;
        if name.is_some() != name_required {
            self.fail(WriteError::NameContextMismatch);
            return;
        }
        if frame.last == LastToken::Value {
            self.raw(b",");
        }
        if let Some(name) = name {
            self.raw(b"\"");
            self.write_escaped(name);
            self.raw(b"\":");
        }
    }

    fn mark_value(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.last = LastToken::Value;
        }
    }

    fn write_escaped(&mut self, bytes: &[u8]) {
        let mut out = Vec::with_capacity(bytes.len());
        for &b in bytes {
            match b {
                b'"' => out.extend_from_slice(b"\\\""),
                b'\\' => out.extend_from_slice(b"\\\\"),
                b'/' => out.extend_from_slice(b"\\/"),
                0x08 => out.extend_from_slice(b"\\b"),
                0x0C => out.extend_from_slice(b"\\f"),
                b'\n' => out.extend_from_slice(b"\\n"),
                b'\r' => out.extend_from_slice(b"\\r"),
                b'\t' => out.extend_from_slice(b"\\t"),
                _ => out.push(b),
            }
        }
        self.raw(&out);
    }

    pub fn null(&mut self, name: Option<&[u8]>) {
        self.prep(name);
        self.raw(b"null");
        self.mark_value();
    }

    pub fn bool(&mut self, val: bool, name: Option<&[u8]>) {
        self.prep(name);
        self.raw(if val { b"true" } else { b"false" });
        self.mark_value();
    }

    pub fn int(&mut self, val: i32, name: Option<&[u8]>) {
        self.prep(name);
        let mut text = String::new();
        let _ = write!(text, "{val}");
        self.raw(text.as_bytes());
        self.mark_value();
    }

    /// Emits `val` fixed-point with the reference's default six fractional
    /// digits.
    pub fn double(&mut self, val: f64, name: Option<&[u8]>) {
        self.double_with_precision(val, 6, name);
    }

    pub fn double_with_precision(&mut self, val: f64, precision: usize, name: Option<&[u8]>) {
        self.prep(name);
        let mut text = String::new();
        let _ = write!(text, "{val:.precision$}");
        self.raw(text.as_bytes());
        self.mark_value();
    }

    pub fn string(&mut self, val: &[u8], name: Option<&[u8]>) {
        self.prep(name);
        self.raw(b"\"");
        self.write_escaped(val);
        self.raw(b"\"");
        self.mark_value();
    }

    pub fn array_begin(&mut self, name: Option<&[u8]>) {
        self.open_container(name, Context::InArray, b'[');
    }

    pub fn array_end(&mut self) {
        self.close_container(Context::InArray, b']');
    }

    pub fn object_begin(&mut self, name: Option<&[u8]>) {
        self.open_container(name, Context::InObject, b'{');
    }

    pub fn object_end(&mut self) {
        self.close_container(Context::InObject, b'}');
    }

    fn open_container(&mut self, name: Option<&[u8]>, context: Context, opening: u8) {
        self.prep(name);
        if self.error.is_some() {
            return;
        }
        if self.stack.len() >= self.stack_limit {
            self.fail(WriteError::BufferFull);
            return;
        }
        self.raw(&[opening]);
        self.stack.push(Frame {
            context,
            last: LastToken::None,
        });
    }

    fn close_container(&mut self, expected: Context, closing: u8) {
        if self.stack.len() <= 1 || self.stack.last().map(|f| f.context) != Some(expected) {
            self.fail(WriteError::UnbalancedContainer);
            if self.stack.len() > 1 {
                self.stack.pop();
            }
            return;
        }
        self.raw(&[closing]);
        self.stack.pop();
        self.mark_value();
    }
}

impl Default for Writer {
    fn default() -> Self {
        Writer::new(crate::parser::DEFAULT_ARENA_BYTES, crate::parser::DEFAULT_STACK_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_flat_array() {
        let mut w = Writer::default();
        w.array_begin(None);
        w.int(223_344, None);
        w.int(867_757, None);
        w.string(b"Test String '1234567'", None);
        w.array_end();
        assert_eq!(w.get().unwrap(), br#"[223344,867757,"Test String '1234567'"]"#);
    }

    #[test]
    fn writes_an_object_with_mixed_values() {
        let mut w = Writer::default();
        w.object_begin(None);
        w.int(1, Some(b"a"));
        w.double(3.5, Some(b"b"));
        w.bool(true, Some(b"c"));
        w.null(Some(b"d"));
        w.object_end();
        assert_eq!(
            w.get().unwrap(),
            br#"{"a":1,"b":3.500000,"c":true,"d":null}"#
        );
    }

    #[test]
    fn escapes_special_bytes_in_strings() {
        let mut w = Writer::default();
        w.string(b"a\"b\\c/d\n", None);
        assert_eq!(w.get().unwrap(), br#""a\"b\\c\/d\n""#);
    }

    #[test]
    fn rejects_name_outside_object() {
        let mut w = Writer::default();
        w.int(1, Some(b"x"));
        assert_eq!(w.get(), Err(WriteError::NameContextMismatch));
    }

    #[test]
    fn rejects_missing_name_inside_object() {
        let mut w = Writer::default();
        w.object_begin(None);
        w.int(1, None);
        w.object_end();
        assert_eq!(w.get(), Err(WriteError::NameContextMismatch));
    }

    #[test]
    fn rejects_unbalanced_end() {
        let mut w = Writer::default();
        w.array_end();
        assert_eq!(w.get(), Err(WriteError::UnbalancedContainer));
    }

    #[test]
    fn get_requires_every_container_closed() {
        let mut w = Writer::default();
        w.array_begin(None);
        w.int(1, None);
        assert_eq!(w.get(), Err(WriteError::IncompleteDocument));
    }

    #[test]
    fn empty_document_is_not_an_error() {
        let w = Writer::default();
        assert_eq!(w.get().unwrap(), b"");
    }

    #[test]
    fn double_with_precision_controls_fractional_digits() {
        let mut w = Writer::default();
        w.double_with_precision(1.0 / 3.0, 2, None);
        assert_eq!(w.get().unwrap(), b"0.33");
    }

    #[test]
    fn sticky_error_ignores_further_value_calls() {
        let mut w = Writer::default();
        w.int(1, Some(b"x")); // NameContextMismatch at TopValue
        w.int(2, None); // no-op: error already latched
        assert_eq!(w.get(), Err(WriteError::NameContextMismatch));
    }
}
