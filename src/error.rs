//! Error conditions raised by delegates, the node pool and the map.

/// Every runtime failure this crate can report.
///
/// Storage and alignment mismatches never show up here: they are rejected
/// at compile time.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A delegate was invoked while unbound.
    #[error("delegate:uninitialised")]
    UninitializedCallable,

    /// An insertion needed a node and the map's pool had none left.
    ///
    /// The map is left exactly as it was before the call.
    #[error("unordered_map:full")]
    MapFull,

    /// `at` was called with a key that is not present.
    #[error("unordered_map:range")]
    MapOutOfRange,

    /// A cursor range was reversed, crossed the end of the map, or was
    /// longer than the map can hold.
    #[error("unordered_map:iterator")]
    InvalidIteratorRange,

    /// The node pool has no free slot.
    #[error("pool:full")]
    PoolFull,
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
