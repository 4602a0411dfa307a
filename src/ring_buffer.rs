//! Fixed-size slot storage for the ring.

use std::cell::UnsafeCell;

use crate::{DisruptorError, Result};

/// A contiguously allocated, power-of-two array of payload slots.
///
/// Index `i` maps to slot `i & (N - 1)`; slots are overwritten in place on
/// wrap. There is no per-slot validity flag here: publication is tracked by
/// the claim strategy, and all cross-thread access is coordinated through
/// sequences.
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Box<[UnsafeCell<T>]>,
    index_mask: i64,
}

impl<T> RingBuffer<T>
where
    T: Send + Sync,
{
    /// Allocate a ring of `buffer_size` default-initialized slots.
    pub fn new(buffer_size: usize) -> Result<Self>
    where
        T: Default,
    {
        Self::from_iter(buffer_size, (0..buffer_size).map(|_| T::default()))
    }

    /// Build a ring from a caller-supplied buffer; its length is the ring
    /// capacity.
    pub fn from_buffer(buffer: Vec<T>) -> Result<Self> {
        let len = buffer.len();
        Self::from_iter(len, buffer)
    }

    fn from_iter(buffer_size: usize, values: impl IntoIterator<Item = T>) -> Result<Self> {
        if !crate::is_power_of_two(buffer_size) {
            return Err(DisruptorError::InvalidBufferSize(buffer_size));
        }
        let slots: Box<[UnsafeCell<T>]> =
            values.into_iter().map(UnsafeCell::new).collect();
        debug_assert_eq!(slots.len(), buffer_size);
        Ok(Self {
            slots,
            index_mask: (buffer_size - 1) as i64,
        })
    }

    /// Shared reference to the slot for `sequence`.
    ///
    /// Unchecked: the caller must have observed `sequence` as published
    /// before reading, or the slot may be mid-write.
    #[inline]
    pub fn get(&self, sequence: i64) -> &T {
        let index = (sequence & self.index_mask) as usize;
        // SAFETY: index is masked into bounds; read/write partitioning is
        // guaranteed by the claim/publish protocol.
        unsafe { &*self.slots.get_unchecked(index).get() }
    }

    /// Raw mutable pointer to the slot for `sequence`.
    ///
    /// # Safety
    /// The caller must hold the claim on `sequence` and be the only writer
    /// of that index until it is published.
    #[inline]
    pub unsafe fn get_mut_unchecked(&self, sequence: i64) -> *mut T {
        let index = (sequence & self.index_mask) as usize;
        self.slots.get_unchecked(index).get()
    }

    /// Ring capacity.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// SAFETY: slots are UnsafeCell, but the claim/publish protocol partitions
// them logically: one writer per claimed index, readers only after the
// index is published, with release/acquire pairing on the cursor.
unsafe impl<T: Send + Sync> Send for RingBuffer<T> {}
unsafe impl<T: Send + Sync> Sync for RingBuffer<T> {}
