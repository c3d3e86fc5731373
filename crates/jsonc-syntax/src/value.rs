//! The value node tree a parse produces.
//!
//! Every node, array slot-vector, and object index lives inside the arena
//! that produced it; `NodeRef` is a thin `Copy` handle over a raw pointer
//! into that storage, mirroring the raw-pointer arena idiom used throughout
//! this lineage rather than threading `&'a Value` references through every
//! intermediate builder.
//!
//! Lookup misses are rendered as `Option::None` rather than a shared
//! "Absent" sentinel node — the natural Rust reading of the design note
//! that a language with a built-in optional type should use it in place of
//! a sentinel singleton.

use crate::error::ParseError;
use crate::names::NameTable;
use jsonc_mem::arena::BoundedArena;
use jsonc_mem::{ArenaVec, Symbol};
use std::ptr::NonNull;
use std::slice;
use std::str;

/// A borrowed, arena-owned, NUL-terminated-in-memory UTF-8 string.
#[derive(Clone, Copy)]
pub struct ArenaStr {
    ptr: *const u8,
    len: u32,
}

impl ArenaStr {
    #[must_use]
    pub fn as_str(&self) -> &str {
        // SAFETY: `ArenaStr` is only constructed over bytes copied verbatim from a
        // validated UTF-8 input (the parser's `bytes` argument), so the byte range
        // referenced here is valid UTF-8.
        unsafe { str::from_utf8_unchecked(slice::from_raw_parts(self.ptr, self.len as usize)) }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: see `as_str`.
        unsafe { slice::from_raw_parts(self.ptr, self.len as usize) }
    }

    pub(crate) fn from_raw(ptr: *const u8, len: usize) -> Self {
        ArenaStr {
            ptr,
            len: len as u32,
        }
    }
}

/// A handle to one node in the tree produced by a parse.
///
/// Valid only for the lifetime of the parse that produced it — a later call
/// to [`crate::parser::Parser::parse`] resets the backing arena and the
/// borrow checker ties `'a` to that call's exclusive borrow, so an old
/// `NodeRef` cannot outlive the generation that invalidates it.
#[derive(Clone, Copy)]
pub struct NodeRef<'a>(NonNull<Value<'a>>);

impl<'a> NodeRef<'a> {
    pub(crate) fn new(ptr: NonNull<Value<'a>>) -> Self {
        NodeRef(ptr)
    }

    #[must_use]
    pub fn get(self) -> &'a Value<'a> {
        // SAFETY: every `NodeRef` is constructed from a `Value` permanently allocated
        // out of the arena that owns this generation, and node construction always
        // precedes any `NodeRef` being handed to a caller.
        unsafe { &*self.0.as_ptr() }
    }

    /// Mutable access to the pointee. Restricted to the parser driver: a
    /// container node is only ever mutated through the single `NodeRef` held
    /// in that container's stack frame, and only while the frame is on top —
    /// no other live handle to it is read until the frame is popped.
    pub(crate) fn get_mut(self) -> &'a mut Value<'a> {
        // SAFETY: see above; the driver upholds exclusivity by construction.
        unsafe { &mut *self.0.as_ptr() }
    }
}

/// A JSON value node.
pub enum Value<'a> {
    Null,
    Bool(bool),
    Int(i32),
    Double(f64),
    Str(ArenaStr),
    Array(ArrayNode<'a>),
    Object(ObjectNode<'a>),
}

impl<'a> Value<'a> {
    /// Returns the `i`-th array element, or `None` if this node is not an
    /// array or `i` is out of range.
    #[must_use]
    pub fn element(&self, i: usize) -> Option<NodeRef<'a>> {
        match self {
            Value::Array(arr) => arr.get(i),
            _ => None,
        }
    }

    /// Returns the named attribute, or `None` if this node is not an object
    /// or has no such attribute.
    #[must_use]
    pub fn attribute(&self, names: &NameTable<'a>, name: &[u8]) -> Option<NodeRef<'a>> {
        match self {
            Value::Object(obj) => obj.attribute(names, name),
            _ => None,
        }
    }
}

/// A growable array of child node handles.
pub struct ArrayNode<'a> {
    items: ArenaVec<'a, NodeRef<'a>>,
}

impl<'a> ArrayNode<'a> {
    pub(crate) fn new(arena: &'a BoundedArena) -> Result<Self, ParseError> {
        Ok(ArrayNode {
            items: ArenaVec::with_capacity(arena, 8).map_err(|_| ParseError::OutOfMemory)?,
        })
    }

    pub(crate) fn push(&mut self, node: NodeRef<'a>) -> Result<(), ParseError> {
        self.items.push(node).map_err(|_| ParseError::OutOfMemory)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, i: usize) -> Option<NodeRef<'a>> {
        self.items.get(i).copied()
    }
}

/// An open-addressed map from a 16-bit interned name index to the object's
/// slot position for that name. Linear probing; insertion overwrites the
/// value cell of an existing key in place, which is how duplicate attribute
/// names resolve to their last occurrence (see `attribute`'s callers).
///
/// Keyed directly by the symbol's integer value modulo table size — not by
/// re-hashing the name's bytes. This is a distinct, simpler scheme from the
/// shared name table's string hash, matching the reference this was
/// distilled from.
pub(crate) struct ObjectIndex<'a> {
    keys: ArenaVec<'a, u32>,
    slots: ArenaVec<'a, u32>,
}

impl<'a> ObjectIndex<'a> {
    fn build(arena: &'a BoundedArena, ids: &ArenaVec<'a, Symbol>) -> Result<Self, ParseError> {
        let cap = (ids.len() * 4).max(4);
        let mut keys = ArenaVec::with_capacity(arena, cap).map_err(|_| ParseError::OutOfMemory)?;
        let mut slots = ArenaVec::with_capacity(arena, cap).map_err(|_| ParseError::OutOfMemory)?;
        for _ in 0..cap {
            keys.push(0).map_err(|_| ParseError::OutOfMemory)?;
            slots.push(0).map_err(|_| ParseError::OutOfMemory)?;
        }

        for i in 0..ids.len() {
            let sym = *ids.get(i).expect("i within ids length");
            let key = sym.as_u32();
            let mut idx = (key as usize) % cap;
            loop {
                let occupant = *keys.get(idx).expect("idx within table capacity");
                if occupant == 0 || occupant == key {
                    keys.set(idx, key);
                    // store `position + 1` so 0 stays reserved for "empty".
                    slots.set(idx, (i + 1) as u32);
                    break;
                }
                idx = (idx + 1) % cap;
            }
        }

        Ok(ObjectIndex { keys, slots })
    }

    fn lookup(&self, sym: Symbol) -> Option<usize> {
        let cap = self.keys.len();
        if cap == 0 {
            return None;
        }
        let key = sym.as_u32();
        let mut idx = (key as usize) % cap;
        for _ in 0..cap {
            let occupant = *self.keys.get(idx).expect("idx within table capacity");
            if occupant == 0 {
                return None;
            }
            if occupant == key {
                let slot = *self.slots.get(idx).expect("idx within table capacity");
                return Some((slot - 1) as usize);
            }
            idx = (idx + 1) % cap;
        }
        None
    }
}

pub(crate) enum ObjectShape<'a> {
    Building {
        name_ids: ArenaVec<'a, Symbol>,
        values: ArenaVec<'a, NodeRef<'a>>,
    },
    Finalized {
        names: ArenaVec<'a, ArenaStr>,
        values: ArenaVec<'a, NodeRef<'a>>,
        index: ObjectIndex<'a>,
    },
}

/// An object's attribute name/value arrays plus (once finalised) its
/// per-object name index.
pub struct ObjectNode<'a> {
    pub(crate) shape: ObjectShape<'a>,
}

impl<'a> ObjectNode<'a> {
    pub(crate) fn new(arena: &'a BoundedArena) -> Result<Self, ParseError> {
        Ok(ObjectNode {
            shape: ObjectShape::Building {
                name_ids: ArenaVec::with_capacity(arena, 8).map_err(|_| ParseError::OutOfMemory)?,
                values: ArenaVec::with_capacity(arena, 8).map_err(|_| ParseError::OutOfMemory)?,
            },
        })
    }

    pub(crate) fn push_attribute(&mut self, name: Symbol) -> Result<(), ParseError> {
        match &mut self.shape {
            ObjectShape::Building { name_ids, values } => {
                name_ids.push(name).map_err(|_| ParseError::OutOfMemory)?;
                // A placeholder; `set_last_value` fills it in once the value token
                // is wired. Any `Value` is fine to reuse since every slot is
                // overwritten before the object closes in a syntactically valid parse.
                values
                    .push(NodeRef(NonNull::dangling()))
                    .map_err(|_| ParseError::OutOfMemory)
            }
            ObjectShape::Finalized { .. } => {
                unreachable!("push_attribute called on a finalized object")
            }
        }
    }

    pub(crate) fn set_last_value(&mut self, node: NodeRef<'a>) {
        match &mut self.shape {
            ObjectShape::Building { values, .. } => {
                let last = values.len() - 1;
                values.set(last, node);
            }
            ObjectShape::Finalized { .. } => {
                unreachable!("set_last_value called on a finalized object")
            }
        }
    }

    pub(crate) fn finalize(&mut self, arena: &'a BoundedArena, names_table: &NameTable<'a>) -> Result<(), ParseError> {
        let (name_ids, values) = match std::mem::replace(
            &mut self.shape,
            ObjectShape::Building {
                name_ids: ArenaVec::new(arena),
                values: ArenaVec::new(arena),
            },
        ) {
            ObjectShape::Building { name_ids, values } => (name_ids, values),
            ObjectShape::Finalized { .. } => unreachable!("object finalized twice"),
        };

        let n = name_ids.len();
        let mut names: ArenaVec<'a, ArenaStr> =
            ArenaVec::with_capacity(arena, n.max(1)).map_err(|_| ParseError::OutOfMemory)?;
        for i in 0..n {
            let sym = *name_ids.get(i).expect("i within name_ids length");
            let bytes = names_table.resolve(sym);
            names
                .push(ArenaStr::from_raw(bytes.as_ptr(), bytes.len()))
                .map_err(|_| ParseError::OutOfMemory)?;
        }

        let index = ObjectIndex::build(arena, &name_ids)?;
        let _ = name_ids.retire();

        self.shape = ObjectShape::Finalized {
            names,
            values,
            index,
        };
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.shape {
            ObjectShape::Building { name_ids, .. } => name_ids.len(),
            ObjectShape::Finalized { names, .. } => names.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the named attribute's value. `None` if the object was never
    /// finalised, or has no such attribute.
    #[must_use]
    pub fn attribute(&self, names_table: &NameTable<'a>, name: &[u8]) -> Option<NodeRef<'a>> {
        let ObjectShape::Finalized {
            values, index, ..
        } = &self.shape
        else {
            return None;
        };
        let sym = names_table.lookup(name)?;
        let slot = index.lookup(sym)?;
        values.get(slot).copied()
    }

    /// Enumerates every `(name, value)` pair in source order, including
    /// shadowed duplicate occurrences — unlike `attribute`, which only
    /// surfaces the last occurrence of a repeated name.
    #[must_use]
    pub fn entries(&self) -> Vec<(&str, NodeRef<'a>)> {
        let ObjectShape::Finalized { names, values, .. } = &self.shape else {
            return Vec::new();
        };
        (0..names.len())
            .filter_map(|i| {
                let name = names.get(i)?.as_str();
                let value = *values.get(i)?;
                Some((name, value))
            })
            .collect()
    }
}
