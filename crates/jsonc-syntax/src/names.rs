//! Attribute-name interning table.
//!
//! One table is shared across an entire parse. Every attribute name is
//! copied into the arena once, assigned a 1-based [`Symbol`], and indexed by
//! an open-addressed hash table keyed on the name's bytes. This (and the
//! per-object index in `value.rs`) is hand-rolled rather than built on
//! `std::collections::HashMap`: the exact hash formula and linear-probe
//! order are load-bearing behaviour this codec's duplicate-key resolution
//! depends on, not an incidental implementation detail.

use crate::error::{ParseError, ParseResult};
use jsonc_mem::arena::BoundedArena;
use jsonc_mem::{ArenaVec, Symbol};
use std::slice;

/// Payload bytes allowed in one attribute name, excluding the NUL terminator
/// the table stores alongside it. 64 or more is a parse error.
pub const MAX_NAME_BYTES: usize = 63;

const INITIAL_NAME_CAPACITY: usize = 16;

#[derive(Clone, Copy)]
struct NameEntry {
    ptr: *const u8,
    len: u8,
}

/// Shared name→[`Symbol`] interning table for one parse.
pub struct NameTable<'a> {
    arena: &'a BoundedArena,
    entries: ArenaVec<'a, NameEntry>,
    hash: ArenaVec<'a, u32>,
}

impl<'a> NameTable<'a> {
    pub fn new(arena: &'a BoundedArena) -> ParseResult<Self> {
        let entries = ArenaVec::with_capacity(arena, INITIAL_NAME_CAPACITY)
            .map_err(|_| ParseError::OutOfMemory)?;
        let hash = Self::fresh_hash(arena, INITIAL_NAME_CAPACITY * 4)?;
        Ok(NameTable {
            arena,
            entries,
            hash,
        })
    }

    fn fresh_hash(arena: &'a BoundedArena, slots: usize) -> ParseResult<ArenaVec<'a, u32>> {
        let mut hash = ArenaVec::with_capacity(arena, slots).map_err(|_| ParseError::OutOfMemory)?;
        for _ in 0..slots {
            hash.push(0).map_err(|_| ParseError::OutOfMemory)?;
        }
        Ok(hash)
    }

    /// `h = h*7879 + (h>>16) + byte`, over unsigned bytes. Not cryptographic;
    /// chosen to keep probe order — and therefore which occurrence wins on a
    /// name collision — identical to the reference this table was distilled
    /// from.
    fn hash_bytes(bytes: &[u8]) -> u32 {
        let mut h: u32 = 0;
        for &b in bytes {
            h = h
                .wrapping_mul(7879)
                .wrapping_add(h >> 16)
                .wrapping_add(u32::from(b));
        }
        h
    }

    fn entry_bytes(entry: &NameEntry) -> &[u8] {
        // SAFETY: `ptr`/`len` were recorded by `intern` at insertion time and reference
        // arena-owned bytes that remain valid for the arena's current generation, which
        // this table's lifetime is tied to.
        unsafe { slice::from_raw_parts(entry.ptr, entry.len as usize) }
    }

    /// Looks up an already-interned name. Returns `None` on a miss — this is
    /// not an error, just an absent symbol.
    #[must_use]
    pub fn lookup(&self, name: &[u8]) -> Option<Symbol> {
        if self.hash.is_empty() {
            return None;
        }
        let cap = self.hash.len();
        let mut idx = (Self::hash_bytes(name) as usize) % cap;
        for _ in 0..cap {
            let slot = *self.hash.get(idx).expect("idx within hash capacity");
            if slot == 0 {
                return None;
            }
            let entry = self.entries.get((slot - 1) as usize)?;
            if Self::entry_bytes(entry) == name {
                return Some(Symbol::new(slot));
            }
            idx = (idx + 1) % cap;
        }
        None
    }

    /// Resolves a previously-interned symbol back to its bytes. Panics if
    /// `sym` was not produced by this table, which would indicate a bug in
    /// the caller rather than malformed input.
    #[must_use]
    pub fn resolve(&self, sym: Symbol) -> &[u8] {
        let entry = self
            .entries
            .get(sym.as_usize() - 1)
            .expect("symbol must have been produced by this table");
        Self::entry_bytes(entry)
    }

    /// Interns `name`, returning its existing symbol if already present.
    /// `pos` is only used to annotate a `NameTooLong` error.
    pub fn intern(&mut self, name: &[u8], pos: usize) -> ParseResult<Symbol> {
        if let Some(sym) = self.lookup(name) {
            return Ok(sym);
        }
        if name.len() > MAX_NAME_BYTES {
            return Err(ParseError::NameTooLong {
                pos,
                len: name.len(),
            });
        }

        self.maybe_grow()?;

        let buf = self
            .arena
            .alloc(name.len() + 1)
            .map_err(|_| ParseError::OutOfMemory)?;
        // SAFETY: `buf` references `name.len() + 1` freshly bump-allocated, arena-owned
        // bytes exclusively owned by this call.
        unsafe {
            std::ptr::copy_nonoverlapping(name.as_ptr(), buf.as_ptr(), name.len());
            buf.as_ptr().add(name.len()).write(0);
        }

        let entry = NameEntry {
            ptr: buf.as_ptr().cast_const(),
            len: name.len() as u8,
        };
        self.entries
            .push(entry)
            .map_err(|_| ParseError::OutOfMemory)?;
        let sym = Symbol::new(self.entries.len() as u32);
        self.insert_hash(sym, name);
        Ok(sym)
    }

    fn insert_hash(&mut self, sym: Symbol, name: &[u8]) {
        let cap = self.hash.len();
        let mut idx = (Self::hash_bytes(name) as usize) % cap;
        loop {
            if *self.hash.get(idx).expect("idx within hash capacity") == 0 {
                self.hash.set(idx, sym.as_u32());
                return;
            }
            idx = (idx + 1) % cap;
        }
    }

    /// Doubles the name array's capacity and rebuilds a fresh 4x hash index
    /// over every existing entry when the array is about to overflow. The
    /// old hash storage is returned to the arena's freelist.
    fn maybe_grow(&mut self) -> ParseResult<()> {
        if self.entries.len() < self.entries.capacity() {
            return Ok(());
        }
        let new_name_cap = if self.entries.capacity() == 0 {
            8
        } else {
            self.entries.capacity() * 2
        };
        let mut new_hash = Self::fresh_hash(self.arena, new_name_cap * 4)?;

        for i in 0..self.entries.len() {
            let entry = *self.entries.get(i).expect("i within entries length");
            let bytes = Self::entry_bytes(&entry);
            let cap = new_hash.len();
            let mut idx = (Self::hash_bytes(bytes) as usize) % cap;
            loop {
                if *new_hash.get(idx).expect("idx within hash capacity") == 0 {
                    new_hash.set(idx, (i + 1) as u32);
                    break;
                }
                idx = (idx + 1) % cap;
            }
        }

        let old_hash = std::mem::replace(&mut self.hash, new_hash);
        let _ = old_hash.retire();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interns_and_looks_up() {
        let arena = BoundedArena::default();
        let mut table = NameTable::new(&arena).unwrap();
        let sym = table.intern(b"hello", 0).unwrap();
        assert_eq!(table.resolve(sym), b"hello");
        assert_eq!(table.lookup(b"hello"), Some(sym));
        assert_eq!(table.lookup(b"missing"), None);
    }

    #[test]
    fn reinterning_returns_the_same_symbol() {
        let arena = BoundedArena::default();
        let mut table = NameTable::new(&arena).unwrap();
        let a = table.intern(b"dup", 0).unwrap();
        let b = table.intern(b"dup", 10).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn name_length_boundary() {
        let arena = BoundedArena::default();
        let mut table = NameTable::new(&arena).unwrap();
        let ok = vec![b'a'; 63];
        assert!(table.intern(&ok, 0).is_ok());
        let too_long = vec![b'a'; 64];
        assert!(matches!(
            table.intern(&too_long, 0),
            Err(ParseError::NameTooLong { .. })
        ));
    }

    #[test]
    fn survives_growth_and_rehash() {
        let arena = BoundedArena::default();
        let mut table = NameTable::new(&arena).unwrap();
        let mut symbols = Vec::new();
        for i in 0..100 {
            let name = format!("attr{i}");
            symbols.push((name.clone(), table.intern(name.as_bytes(), 0).unwrap()));
        }
        for (name, sym) in &symbols {
            assert_eq!(table.lookup(name.as_bytes()), Some(*sym));
            assert_eq!(table.resolve(*sym), name.as_bytes());
        }
    }

    #[test]
    fn hash_formula_matches_reference() {
        // h = h*7879 + (h>>16) + byte, over b"ab".
        let mut h: u32 = 0;
        h = h.wrapping_mul(7879).wrapping_add(h >> 16).wrapping_add(b'a' as u32);
        h = h.wrapping_mul(7879).wrapping_add(h >> 16).wrapping_add(b'b' as u32);
        assert_eq!(NameTable::hash_bytes(b"ab"), h);
    }
}
