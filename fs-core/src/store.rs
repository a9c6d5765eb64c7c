//! Growable record store
//!
//! A resizable container used to hold the tokenized fields of one log line
//! and the bootstrap path table. Growth doubles capacity and reports
//! allocation failure instead of aborting, so a caller never sees a
//! silently truncated record.

use thiserror::Error;

/// Capacity floor for a freshly created store.
///
/// Typical records have at most 16 fields, so they never reallocate.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Error type for record store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Growing the buffer failed
    #[error("Out of memory: cannot grow record store from {capacity} to {requested} elements")]
    OutOfMemory {
        /// Capacity before the attempt
        capacity: usize,
        /// Capacity that was requested
        requested: usize,
    },
}

/// Result type for record store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Append-only store of fixed-size elements with amortized O(1) push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStore<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> RecordStore<T> {
    /// Create an empty store with the default capacity floor
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    /// Create an empty store; capacities below the floor are raised to it
    pub fn with_capacity(initial: usize) -> Self {
        let capacity = initial.max(DEFAULT_INITIAL_CAPACITY);
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an element, doubling the backing storage when full
    pub fn push(&mut self, item: T) -> Result<()> {
        if self.items.len() >= self.capacity {
            self.expand()?;
        }
        self.items.push(item);
        Ok(())
    }

    fn expand(&mut self) -> Result<()> {
        let requested = match self.capacity {
            0 => DEFAULT_INITIAL_CAPACITY,
            cap => cap.checked_mul(2).ok_or(StoreError::OutOfMemory {
                capacity: cap,
                requested: usize::MAX,
            })?,
        };
        self.items
            .try_reserve_exact(requested - self.items.len())
            .map_err(|_| StoreError::OutOfMemory {
                capacity: self.capacity,
                requested,
            })?;
        self.capacity = requested;
        Ok(())
    }

    /// Positional read
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// The most recently appended element
    pub fn peek_top(&self) -> Option<&T> {
        self.items.last()
    }

    /// Number of stored elements
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store holds no elements
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Logical capacity (always a power-of-two multiple of the initial capacity)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate over the elements in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// View the elements as a slice
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Drop every element and free the backing storage
    pub fn release(&mut self) {
        self.items = Vec::new();
        self.capacity = 0;
    }
}

impl<T> Default for RecordStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> IntoIterator for &'a RecordStore<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
