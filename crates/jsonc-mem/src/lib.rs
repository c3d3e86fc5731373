//! Memory management infrastructure for the `jsonc` codec.
//!
//! A JSON parse or a JSON write each own exactly one [`BoundedArena`] (or, for
//! the writer, one flat output buffer — see `jsonc-syntax`). The arena
//! supplies two allocation modes over a chain of fixed-size chunks:
//!
//! - **Permanent bump allocation** (`alloc`): never individually freed, only
//!   reclaimed wholesale by [`BoundedArena::reset`].
//! - **Returnable allocation** (`alloc_rt` / `realloc_rt` / `free_rt`): a
//!   first-fit freelist layered on top of the bump allocator, for the
//!   growable vectors (attribute arrays, interning tables) that need to grow
//!   and shrink during one parse without leaking the arena's space.
//!
//! This crate also provides [`symbol::Symbol`], the small interned-index
//! newtype the name table and per-object index are built around.
//!
//! # Design goals
//!
//! 1. Steady-state parsing performs no process-heap allocation once the
//!    arena's chunks are warm.
//! 2. A single generation reset invalidates every previously-returned
//!    pointer; the chunk chain itself is reused, not freed.
//! 3. Safety is localized: every raw-pointer operation carries a `SAFETY`
//!    comment justifying it.

pub mod arena;
pub mod arena_vec;
pub mod symbol;

pub use arena::{ArenaError, ArenaStats, BoundedArena};
pub use arena_vec::ArenaVec;
pub use symbol::Symbol;
