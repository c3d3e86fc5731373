//! The context-stack-driven parser.
//!
//! A [`Parser`] owns one [`BoundedArena`] and resets it at the start of
//! every [`Parser::parse`] call. `parse` takes `&mut self`, so the node tree
//! it returns — wrapped in [`Document`] — borrows the parser for exactly as
//! long as that generation is valid: calling `parse` again requires the
//! previous `Document` to have gone out of scope first, which the borrow
//! checker enforces. The reference implementation this codec's allocator
//! design was distilled from instead treats this as a documented contract
//! the caller must not violate; tying it to `&mut self`/`&'p self.arena`
//! turns that contract into a compile-time guarantee.

use crate::error::{ParseError, ParseResult};
use crate::lexer::Lexer;
use crate::names::NameTable;
use crate::token::{Token, TokenKind};
use crate::value::{ArenaStr, ArrayNode, NodeRef, ObjectNode, Value};
use jsonc_mem::arena::BoundedArena;

/// Floor and default for a parser's arena budget.
pub const DEFAULT_ARENA_BYTES: usize = 16 * 1024;
/// Floor and default for nesting depth.
pub const DEFAULT_STACK_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    TopValue,
    InArray,
    InObject,
}

struct Frame<'p> {
    prev: TokenKind,
    context: Context,
    container: Option<NodeRef<'p>>,
}

/// Parses a complete JSON-shaped byte slice into a value tree.
pub struct Parser {
    arena: BoundedArena,
    stack_depth: usize,
}

impl Parser {
    /// Creates a parser with the given arena budget and nesting-depth limit.
    /// `0` for either selects the default; values below the floor are
    /// raised to it.
    pub fn new(mem_bytes: usize, stack_depth: usize) -> ParseResult<Self> {
        let mem_bytes = mem_bytes.max(DEFAULT_ARENA_BYTES);
        let stack_depth = stack_depth.max(DEFAULT_STACK_DEPTH);
        let arena = BoundedArena::new(mem_bytes).map_err(|_| ParseError::OutOfMemory)?;
        Ok(Parser { arena, stack_depth })
    }

    /// Parses `input`, resetting this parser's arena first. Every node
    /// handle returned by a previous call is invalidated by this call.
    pub fn parse<'p>(&'p mut self, input: &[u8]) -> ParseResult<Document<'p>> {
        self.arena.reset();
        let arena: &'p BoundedArena = &self.arena;
        let mut names = NameTable::new(arena)?;
        let mut driver = Driver::new(arena, self.stack_depth);

        let result = driver.run(&mut names, input);
        match result {
            Ok(root) => Ok(Document { root, names }),
            Err(err) => {
                jsonc_log::warn!("parse rejected: {err}");
                Err(err)
            }
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new(DEFAULT_ARENA_BYTES, DEFAULT_STACK_DEPTH)
            .expect("default parser construction should not fail")
    }
}

/// The parsed tree plus the name table it was built against. `attribute`
/// needs the latter to resolve a name string to its interned symbol before
/// probing an object's index.
pub struct Document<'p> {
    root: NodeRef<'p>,
    names: NameTable<'p>,
}

impl<'p> Document<'p> {
    #[must_use]
    pub fn root(&self) -> &'p Value<'p> {
        self.root.get()
    }

    #[must_use]
    pub fn attribute(&self, node: &Value<'p>, name: &[u8]) -> Option<NodeRef<'p>> {
        node.attribute(&self.names, name)
    }
}

struct Driver<'p> {
    arena: &'p BoundedArena,
    stack: Vec<Frame<'p>>,
    stack_limit: usize,
    root: Option<NodeRef<'p>>,
}

impl<'p> Driver<'p> {
    fn new(arena: &'p BoundedArena, stack_limit: usize) -> Self {
        let mut stack = Vec::with_capacity(stack_limit);
        stack.push(Frame {
            prev: TokenKind::InputStart,
            context: Context::TopValue,
            container: None,
        });
        Driver {
            arena,
            stack,
            stack_limit,
            root: None,
        }
    }

    fn run(&mut self, names: &mut NameTable<'p>, input: &[u8]) -> ParseResult<NodeRef<'p>> {
        let mut lexer = Lexer::new(input);
        loop {
            let tok = lexer.next();
            match tok.kind {
                TokenKind::Error => return Err(ParseError::InvalidByte { pos: tok.span.pos }),
                TokenKind::InputEnd => {
                    let frame = self.top();
                    if self.stack.len() != 1
                        || frame.context != Context::TopValue
                        || frame.prev == TokenKind::InputStart
                    {
                        return Err(ParseError::UnexpectedEnd);
                    }
                    break;
                }
                TokenKind::ArrayStart => self.enter_array(tok)?,
                TokenKind::ObjectStart => self.enter_object(tok)?,
                TokenKind::ArrayEnd => self.exit_array(tok)?,
                TokenKind::ObjectEnd => self.exit_object(names, tok)?,
                TokenKind::Comma => self.dispatch_comma(tok)?,
                TokenKind::Name => self.dispatch_name(names, input, tok)?,
                TokenKind::Null | TokenKind::Bool | TokenKind::Int | TokenKind::Double | TokenKind::String => {
                    self.dispatch_scalar(input, tok)?;
                }
                TokenKind::InputStart => {
                    unreachable!("the lexer never produces InputStart; it is a frame sentinel")
                }
            }
        }
        self.root.ok_or(ParseError::UnexpectedEnd)
    }

    fn top(&self) -> &Frame<'p> {
        self.stack.last().expect("the root frame is never popped")
    }

    fn alloc_node(&self, value: Value<'p>) -> ParseResult<NodeRef<'p>> {
        let raw = self
            .arena
            .alloc(std::mem::size_of::<Value<'p>>())
            .map_err(|_| ParseError::OutOfMemory)?;
        let ptr = raw.cast();
        // SAFETY: `raw` references `size_of::<Value>()` freshly bump-allocated,
        // arena-owned, alignment-rounded bytes exclusively owned by this call.
        unsafe {
            ptr.as_ptr().write(value);
        }
        Ok(NodeRef::new(ptr))
    }

    /// Validates and wires `node` into whatever frame is currently on top,
    /// per that frame's context and recorded previous token.
    fn wire(&mut self, node: NodeRef<'p>, pos: usize) -> ParseResult<()> {
        let frame = self.stack.last_mut().expect("the root frame is never popped");
        match frame.context {
            Context::TopValue => {
                if frame.prev != TokenKind::InputStart {
                    return Err(ParseError::UnexpectedToken { pos });
                }
                self.root = Some(node);
            }
            Context::InArray => {
                if !matches!(frame.prev, TokenKind::ArrayStart | TokenKind::Comma) {
                    return Err(ParseError::UnexpectedToken { pos });
                }
                let container = frame
                    .container
                    .expect("an InArray frame always has a container node");
                // SAFETY: only this driver ever mutates a container node, and only while
                // that node's frame is on top of the stack; no other `NodeRef` to it
                // escapes until the frame is popped and the node becomes read-only.
                if let Value::Array(arr) = container.get_mut() {
                    arr.push(node)?;
                }
            }
            Context::InObject => {
                if frame.prev != TokenKind::Name {
                    return Err(ParseError::UnexpectedToken { pos });
                }
                let container = frame
                    .container
                    .expect("an InObject frame always has a container node");
                // SAFETY: see the InArray arm above.
                if let Value::Object(obj) = container.get_mut() {
                    obj.set_last_value(node);
                }
            }
        }
        Ok(())
    }

    fn push_child_frame(&mut self, context: Context, container: NodeRef<'p>, tok: Token) -> ParseResult<()> {
        if self.stack.len() >= self.stack_limit {
            return Err(ParseError::StackOverflow {
                depth: self.stack_limit,
            });
        }
        self.stack.push(Frame {
            prev: tok.kind,
            context,
            container: Some(container),
        });
        Ok(())
    }

    fn enter_array(&mut self, tok: Token) -> ParseResult<()> {
        let node = self.alloc_node(Value::Array(ArrayNode::new(self.arena)?))?;
        self.wire(node, tok.span.pos)?;
        self.stack.last_mut().expect("the root frame is never popped").prev = tok.kind;
        self.push_child_frame(Context::InArray, node, tok)
    }

    fn enter_object(&mut self, tok: Token) -> ParseResult<()> {
        let node = self.alloc_node(Value::Object(ObjectNode::new(self.arena)?))?;
        self.wire(node, tok.span.pos)?;
        self.stack.last_mut().expect("the root frame is never popped").prev = tok.kind;
        self.push_child_frame(Context::InObject, node, tok)
    }

    fn exit_array(&mut self, tok: Token) -> ParseResult<()> {
        {
            let frame = self.top();
            if frame.context != Context::InArray || frame.prev == TokenKind::Comma {
                return Err(ParseError::UnexpectedToken { pos: tok.span.pos });
            }
        }
        self.stack.pop();
        self.stack
            .last_mut()
            .expect("the root frame is never popped")
            .prev = TokenKind::ArrayEnd;
        Ok(())
    }

    fn exit_object(&mut self, names: &NameTable<'p>, tok: Token) -> ParseResult<()> {
        let container = {
            let frame = self.top();
            if frame.context != Context::InObject
                || matches!(frame.prev, TokenKind::Comma | TokenKind::Name)
            {
                return Err(ParseError::UnexpectedToken { pos: tok.span.pos });
            }
            frame
                .container
                .expect("an InObject frame always has a container node")
        };
        // SAFETY: see `wire`'s InObject arm — this frame's container is only mutated
        // through this one live handle, and only while the frame is on top.
        if let Value::Object(obj) = container.get_mut() {
            obj.finalize(self.arena, names)?;
        }
        self.stack.pop();
        self.stack
            .last_mut()
            .expect("the root frame is never popped")
            .prev = TokenKind::ObjectEnd;
        Ok(())
    }

    fn dispatch_comma(&mut self, tok: Token) -> ParseResult<()> {
        let frame = self.stack.last_mut().expect("the root frame is never popped");
        match frame.context {
            Context::TopValue => return Err(ParseError::UnexpectedToken { pos: tok.span.pos }),
            Context::InArray => {
                if frame.prev == TokenKind::ArrayStart {
                    return Err(ParseError::UnexpectedToken { pos: tok.span.pos });
                }
            }
            Context::InObject => {
                if matches!(frame.prev, TokenKind::ObjectStart | TokenKind::Name) {
                    return Err(ParseError::UnexpectedToken { pos: tok.span.pos });
                }
            }
        }
        frame.prev = TokenKind::Comma;
        Ok(())
    }

    fn dispatch_name(&mut self, names: &mut NameTable<'p>, input: &[u8], tok: Token) -> ParseResult<()> {
        let frame = self.stack.last().expect("the root frame is never popped");
        if frame.context != Context::InObject
            || !matches!(frame.prev, TokenKind::ObjectStart | TokenKind::Comma)
        {
            return Err(ParseError::UnexpectedToken { pos: tok.span.pos });
        }
        let container = frame
            .container
            .expect("an InObject frame always has a container node");
        let sym = names.intern(tok.span.slice(input), tok.span.pos)?;
        // SAFETY: see `wire`'s InObject arm.
        if let Value::Object(obj) = container.get_mut() {
            obj.push_attribute(sym)?;
        }
        self.stack.last_mut().expect("the root frame is never popped").prev = TokenKind::Name;
        Ok(())
    }

    fn dispatch_scalar(&mut self, input: &[u8], tok: Token) -> ParseResult<()> {
        let value = self.build_scalar(input, tok)?;
        let node = self.alloc_node(value)?;
        self.wire(node, tok.span.pos)?;
        self.stack.last_mut().expect("the root frame is never popped").prev = tok.kind;
        Ok(())
    }

    fn build_scalar(&self, input: &[u8], tok: Token) -> ParseResult<Value<'p>> {
        let bytes = tok.span.slice(input);
        match tok.kind {
            TokenKind::Null => Ok(Value::Null),
            TokenKind::Bool => Ok(Value::Bool(bytes[0].to_ascii_lowercase() == b't')),
            TokenKind::Int => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| ParseError::MalformedNumber { pos: tok.span.pos })?;
                text.parse::<i32>()
                    .map(Value::Int)
                    .map_err(|_| ParseError::MalformedNumber { pos: tok.span.pos })
            }
            TokenKind::Double => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| ParseError::MalformedNumber { pos: tok.span.pos })?;
                text.parse::<f64>()
                    .map(Value::Double)
                    .map_err(|_| ParseError::MalformedNumber { pos: tok.span.pos })
            }
            TokenKind::String => {
                let unescaped = unescape_into_arena(self.arena, bytes)
                    .map_err(|_| ParseError::OutOfMemory)?;
                Ok(Value::Str(unescaped))
            }
            _ => unreachable!("build_scalar only called for scalar token kinds"),
        }
    }
}

/// Decodes backslash escapes into a freshly arena-allocated buffer.
///
/// Recognized escapes: `\"`, `\\`, `\/`, `\b`, `\f`, `\n`, `\r`, `\t`. Any
/// other escape (including an unsupported `\uXXXX`) is preserved as its two
/// literal source bytes rather than rejected — a lossy round-trip that
/// matches this codec's accepted dialect.
fn unescape_into_arena<'p>(arena: &'p BoundedArena, bytes: &[u8]) -> Result<ArenaStr, ()> {
    let raw = arena.alloc(bytes.len().max(1)).map_err(|_| ())?;
    let out = raw.as_ptr();
    let mut out_len = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && i + 1 < bytes.len() {
            let esc = bytes[i + 1];
            let mapped = match esc {
                b'"' => Some(b'"'),
                b'\\' => Some(b'\\'),
                b'/' => Some(b'/'),
                b'b' => Some(0x08),
                b'f' => Some(0x0C),
                b'n' => Some(b'\n'),
                b'r' => Some(b'\r'),
                b't' => Some(b'\t'),
                _ => None,
            };
            match mapped {
                Some(m) => {
                    // SAFETY: each escape pair consumes 2 input bytes but writes only 1
                    // output byte, so `out_len` never exceeds `bytes.len()`.
                    unsafe {
                        out.add(out_len).write(m);
                    }
                    out_len += 1;
                    i += 2;
                }
                None => {
                    // SAFETY: an unrecognized escape writes 2 output bytes for the 2
                    // input bytes it consumes, staying within the buffer's capacity.
                    unsafe {
                        out.add(out_len).write(b'\\');
                        out.add(out_len + 1).write(esc);
                    }
                    out_len += 2;
                    i += 2;
                }
            }
        } else {
            // SAFETY: one input byte, one output byte.
            unsafe {
                out.add(out_len).write(b);
            }
            out_len += 1;
            i += 1;
        }
    }
    Ok(ArenaStr::from_raw(out, out_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_integer() {
        let mut p = Parser::default();
        let doc = p.parse(b"55").unwrap();
        assert!(matches!(doc.root(), Value::Int(55)));
    }

    #[test]
    fn parses_an_array_of_doubles() {
        let mut p = Parser::default();
        let doc = p.parse(b"[3.14,3.14]").unwrap();
        let Value::Array(arr) = doc.root() else {
            panic!("expected array");
        };
        assert_eq!(arr.len(), 2);
        for i in 0..2 {
            let Value::Double(d) = arr.get(i).unwrap().get() else {
                panic!("expected double");
            };
            assert!((d - 3.14).abs() < 1e-6);
        }
    }

    #[test]
    fn parses_a_string() {
        let mut p = Parser::default();
        let doc = p.parse(br#""Hello""#).unwrap();
        let Value::Str(s) = doc.root() else {
            panic!("expected string");
        };
        assert_eq!(s.as_str(), "Hello");
    }

    #[test]
    fn parses_an_object_and_looks_up_attributes() {
        let mut p = Parser::default();
        let input = br#"{"abc1":800,"def1":801,"ghi1":802,"abc2":803,"def2":804,"ghi2":805,"abc3":806,"def3":807,"ghi3":808}"#;
        let doc = p.parse(input).unwrap();
        let root = doc.root();
        let Some(v) = doc.attribute(root, b"def2") else {
            panic!("expected def2 to be present");
        };
        assert!(matches!(v.get(), Value::Int(804)));
        assert!(doc.attribute(root, b"zzz").is_none());
    }

    #[test]
    fn parses_array_of_objects() {
        let mut p = Parser::default();
        let input = br#"[{"id":111,"name":"obj_111"},{"id":222,"name":"obj_222"},{"id":333,"name":"obj_333"}]"#;
        let doc = p.parse(input).unwrap();
        let Value::Array(arr) = doc.root() else {
            panic!("expected array");
        };
        assert_eq!(arr.len(), 3);
        let second = arr.get(1).unwrap().get();
        let id = doc.attribute(second, b"id").unwrap();
        assert!(matches!(id.get(), Value::Int(222)));
    }

    #[test]
    fn duplicate_attribute_names_resolve_to_last_occurrence() {
        let mut p = Parser::default();
        let doc = p.parse(br#"{"a":1,"a":2}"#).unwrap();
        let root = doc.root();
        let v = doc.attribute(root, b"a").unwrap();
        assert!(matches!(v.get(), Value::Int(2)));
    }

    #[test]
    fn rejects_trailing_comma_in_array() {
        let mut p = Parser::default();
        assert!(p.parse(b"[1,2,]").is_err());
    }

    #[test]
    fn rejects_dangling_attribute_in_object() {
        let mut p = Parser::default();
        assert!(p.parse(br#"{"a":1,"b":}"#).is_err());
    }

    #[test]
    fn rejects_comments() {
        let mut p = Parser::default();
        assert!(p.parse(b"{ // comment\n \"a\": 1 }").is_err());
    }

    #[test]
    fn name_too_long_is_rejected() {
        let mut p = Parser::default();
        let name_63 = "a".repeat(63);
        let ok = format!(r#"{{"{name_63}":1}}"#);
        assert!(p.parse(ok.as_bytes()).is_ok());

        let name_64 = "a".repeat(64);
        let bad = format!(r#"{{"{name_64}":1}}"#);
        let mut p2 = Parser::default();
        assert!(p2.parse(bad.as_bytes()).is_err());
    }

    #[test]
    fn depth_bound_is_enforced() {
        // `stack_depth` below `DEFAULT_STACK_DEPTH` is raised to the floor, so the
        // smallest depth this construction call can actually enforce is the
        // default itself; request comfortably above it to get a real ceiling.
        let limit = DEFAULT_STACK_DEPTH + 4;
        let nested = |depth: usize| {
            let mut s = "[".repeat(depth);
            s.push('1');
            s.push_str(&"]".repeat(depth));
            s
        };

        // Starting from the root frame, `limit - 1` nested containers is the
        // deepest this stack can hold before the next push would reach `limit`.
        let mut under = Parser::new(DEFAULT_ARENA_BYTES, limit).unwrap();
        assert!(under.parse(nested(limit - 1).as_bytes()).is_ok());

        let mut over = Parser::new(DEFAULT_ARENA_BYTES, limit).unwrap();
        assert!(over.parse(nested(limit).as_bytes()).is_err());
    }

    #[test]
    fn reset_invalidates_the_previous_generation() {
        let mut p = Parser::default();
        {
            let doc = p.parse(b"1").unwrap();
            assert!(matches!(doc.root(), Value::Int(1)));
        }
        let doc2 = p.parse(b"2").unwrap();
        assert!(matches!(doc2.root(), Value::Int(2)));
    }
}
