//! NodePool: fixed-capacity slot storage with an intrusive free list.
//!
//! Slots live inline in the pool; there is no heap allocation. A vacant
//! slot stores the index of the next vacant slot, so `allocate` and
//! `release` are O(1). Ids stay valid for as long as the value they were
//! handed out for is live.

use crate::error::{Error, Result};
use core::fmt;

/// Stable index of an occupied pool slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeId(usize);

impl NodeId {
    /// Raw slot index.
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone)]
enum Slot<T> {
    Vacant { next_free: Option<usize> },
    Occupied(T),
}

#[derive(Clone)]
pub struct NodePool<T, const N: usize> {
    slots: [Slot<T>; N],
    free_head: Option<usize>,
    len: usize,
}

impl<T, const N: usize> NodePool<T, N> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(Self::vacant_at),
            free_head: if N > 0 { Some(0) } else { None },
            len: 0,
        }
    }

    // Vacant slot `i` chains to `i + 1`, the last one ends the list.
    fn vacant_at(i: usize) -> Slot<T> {
        Slot::Vacant {
            next_free: if i + 1 < N { Some(i + 1) } else { None },
        }
    }

    /// Move `value` into a free slot.
    pub fn allocate(&mut self, value: T) -> Result<NodeId> {
        self.try_allocate(value).map_err(|_| Error::PoolFull)
    }

    /// Like `allocate`, but hands the value back when the pool is full.
    pub fn try_allocate(&mut self, value: T) -> core::result::Result<NodeId, T> {
        let Some(index) = self.free_head else {
            return Err(value);
        };
        let slot = &mut self.slots[index];
        let next_free = match slot {
            Slot::Vacant { next_free } => *next_free,
            Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
        };
        *slot = Slot::Occupied(value);
        self.free_head = next_free;
        self.len += 1;
        Ok(NodeId(index))
    }

    /// Return a slot to the free list, handing its value back.
    pub fn release(&mut self, id: NodeId) -> Option<T> {
        let slot = self.slots.get_mut(id.0)?;
        if let Slot::Vacant { .. } = slot {
            return None;
        }
        let old = core::mem::replace(
            slot,
            Slot::Vacant {
                next_free: self.free_head,
            },
        );
        self.free_head = Some(id.0);
        self.len -= 1;
        match old {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    /// Drop every live value and rebuild the free list.
    pub fn release_all(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            *slot = Self::vacant_at(i);
        }
        self.free_head = if N > 0 { Some(0) } else { None };
        self.len = 0;
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        match self.slots.get(id.0)? {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        match self.slots.get_mut(id.0)? {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub fn is_full(&self) -> bool {
        self.len == N
    }
    pub fn capacity(&self) -> usize {
        N
    }
    pub fn available(&self) -> usize {
        N - self.len
    }

    /// Occupied slots in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| match s {
            Slot::Occupied(value) => Some((NodeId(i), value)),
            Slot::Vacant { .. } => None,
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| match s {
            Slot::Occupied(value) => Some((NodeId(i), value)),
            Slot::Vacant { .. } => None,
        })
    }
}

impl<T, const N: usize> Default for NodePool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for NodePool<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodePool")
            .field("len", &self.len)
            .field("capacity", &N)
            .finish()
    }
}
