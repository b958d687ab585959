//! fixed-delegate-map: heap-free delegates and a fixed-capacity bucketed
//! hash map for targets where dynamic allocation is off the table.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: two statically bounded building blocks whose memory footprint
//!   is fully known at compile time.
//! - Layers (leaves first):
//!   - NodePool<T, N>: N inline slots with an intrusive free list; O(1)
//!     allocate/release; ids are stable while a value is live.
//!   - Bucket: an intrusive singly-linked list of pool node ids; owns
//!     nothing, only rewires links.
//!   - UnorderedMap<K, V, N, B, H, E>: B buckets over one NodePool of N
//!     nodes, plus first/last occupied-bucket markers.
//!   - Delegate<'a, S, EXTRA, A>: a type-erased callable of signature `S`
//!     stored inline in `size_of::<usize>() + EXTRA` bytes.
//!
//! Constraints
//! - `no_std`; nothing allocates. Capacities are const generics.
//! - Single-threaded: `Delegate` is `!Send`/`!Sync`; the map has no
//!   interior mutability and follows the usual borrow rules.
//! - Storage overflow, alignment overflow and narrowing a delegate are
//!   build errors (post-monomorphisation `const` assertions), never
//!   runtime truncation.
//!
//! Failure boundaries
//! - Every runtime failure is an `Error` value: an unbound delegate call,
//!   a full map, an absent key for `at`, an invalid cursor range.
//! - A failed map insertion changes nothing.
//! - `Delegate::call_if`/`call_or` turn "unbound" into an ordinary return
//!   value for call sites that expect it.
//!
//! Occupied-bucket markers
//! - `first`/`last` bound the non-empty buckets (both 0 when empty).
//!   Insert widens the span; erase re-scans only when the bucket it
//!   emptied sat on a marker, and only within the old span. Iteration
//!   from `begin()` therefore costs the occupied span, not `B`.
//!
//! Delegate dispatch
//! - One immutable operation table `{invoke, copy, destroy, identity}`
//!   per (payload type, signature), referenced from static memory.
//! - Mutable-receiver methods are bound through a `RefCell`, so copies of
//!   a delegate cannot alias `&mut T`; re-entering the same instance
//!   panics at the borrow.
//! - Equality is identity: same table and same bound instance or function
//!   address. Closures with captured state only equal themselves.
//!
//! Notes and non-goals
//! - No growth, no rehashing, no thread safety.
//! - Cursors are plain `Copy` positions; mutation may invalidate them, and
//!   a stale cursor resolves to nothing rather than to freed memory.
//! - Logging goes through the `log` facade; no logger is installed here.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod bucket;
pub mod callable;
pub mod delegate;
mod error;
pub mod pool;
pub mod unordered_map;
mod unordered_map_proptest;

// Public surface
pub use callable::{Callable, ConstMethod, Method, SharedCallable, Signature, StaticInstance};
pub use delegate::Delegate;
pub use error::{Error, Result};
pub use unordered_map::{Cursor, EqualTo, Iter, KeyEqual, UnorderedMap};
