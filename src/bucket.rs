//! Bucket: an intrusive singly-linked list over pool-owned nodes.
//!
//! The link to the next node lives inside the node itself (`Linked`); the
//! list is nothing but a head index. The list never owns or frees a node,
//! it only rewires links through whatever storage implements `Links`.

use crate::pool::{NodeId, NodePool};

/// A node that carries its own forward link.
pub trait Linked {
    fn next(&self) -> Option<NodeId>;
    fn set_next(&mut self, next: Option<NodeId>);
}

/// Storage that can read and rewrite node links by id.
pub trait Links {
    fn link(&self, id: NodeId) -> Option<NodeId>;
    fn set_link(&mut self, id: NodeId, next: Option<NodeId>);
}

impl<T: Linked, const N: usize> Links for NodePool<T, N> {
    #[inline]
    fn link(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(Linked::next)
    }

    #[inline]
    fn set_link(&mut self, id: NodeId, next: Option<NodeId>) {
        if let Some(node) = self.get_mut(id) {
            node.set_next(next);
        }
    }
}

/// A position usable with `insert_after`/`erase_after`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Position {
    BeforeBegin,
    At(NodeId),
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Bucket {
    head: Option<NodeId>,
}

impl Bucket {
    pub const fn new() -> Self {
        Self { head: None }
    }

    pub fn before_begin(&self) -> Position {
        Position::BeforeBegin
    }

    pub fn begin(&self) -> Option<NodeId> {
        self.head
    }

    /// One past the last node; always `None`.
    pub fn end(&self) -> Option<NodeId> {
        None
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Node that follows `pos`.
    pub fn next_of<L: Links + ?Sized>(&self, pos: Position, links: &L) -> Option<NodeId> {
        match pos {
            Position::BeforeBegin => self.head,
            Position::At(id) => links.link(id),
        }
    }

    /// Link `node` directly after `pos`.
    pub fn insert_after<L: Links + ?Sized>(&mut self, pos: Position, node: NodeId, links: &mut L) {
        let next = self.next_of(pos, links);
        links.set_link(node, next);
        match pos {
            Position::BeforeBegin => self.head = Some(node),
            Position::At(id) => links.set_link(id, Some(node)),
        }
    }

    /// Unlink the node after `pos` and return the node that now follows `pos`.
    pub fn erase_after<L: Links + ?Sized>(&mut self, pos: Position, links: &mut L) -> Option<NodeId> {
        let victim = self.next_of(pos, links)?;
        let after = links.link(victim);
        match pos {
            Position::BeforeBegin => self.head = after,
            Position::At(id) => links.set_link(id, after),
        }
        links.set_link(victim, None);
        after
    }

    /// Position whose successor is `target`, if `target` is in this list.
    pub fn position_before<L: Links + ?Sized>(&self, target: NodeId, links: &L) -> Option<Position> {
        let mut pos = Position::BeforeBegin;
        while let Some(id) = self.next_of(pos, links) {
            if id == target {
                return Some(pos);
            }
            pos = Position::At(id);
        }
        None
    }

    /// Position of the last node, or `BeforeBegin` when empty.
    pub fn last_position<L: Links + ?Sized>(&self, links: &L) -> Position {
        let mut pos = Position::BeforeBegin;
        while let Some(id) = self.next_of(pos, links) {
            pos = Position::At(id);
        }
        pos
    }

    /// Forget every node. The nodes themselves are untouched.
    pub fn clear(&mut self) {
        self.head = None;
    }

    pub fn iter<'l, L: Links + ?Sized>(&self, links: &'l L) -> BucketIter<'l, L> {
        BucketIter {
            next: self.head,
            links,
        }
    }

    pub fn len<L: Links + ?Sized>(&self, links: &L) -> usize {
        self.iter(links).count()
    }
}

/// Node ids of one bucket, front to back.
pub struct BucketIter<'l, L: ?Sized> {
    next: Option<NodeId>,
    links: &'l L,
}

impl<'l, L: Links + ?Sized> Iterator for BucketIter<'l, L> {
    type Item = NodeId;
    #[inline]
    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.links.link(id);
        Some(id)
    }
}
