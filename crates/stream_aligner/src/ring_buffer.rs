//! Fixed-capacity double-ended ring buffer.
//!
//! Lossy by construction: pushing into a full buffer evicts one element from
//! the opposite end instead of growing or failing. Capacity is fixed when the
//! buffer is created and all index arithmetic wraps modulo capacity.

use std::fmt;
use std::iter::FusedIterator;

/// Double-ended circular buffer with overwrite-on-full semantics
///
/// Slots are kept as `Option<T>` so elements move out on pop without
/// requiring `T: Default` or `T: Clone`.
#[derive(Clone)]
pub struct RingBuffer<T> {
    slots: Box<[Option<T>]>,
    /// Slot of the logical first element (valid when `len > 0`)
    front: usize,
    /// Slot of the logical last element (valid when `len > 0`)
    rear: usize,
    len: usize,
}

impl<T: fmt::Debug> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("items", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer holding at most `capacity` elements
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            front: 0,
            rear: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    #[inline]
    fn wrap_inc(&self, idx: usize) -> usize {
        if idx + 1 == self.capacity() {
            0
        } else {
            idx + 1
        }
    }

    #[inline]
    fn wrap_dec(&self, idx: usize) -> usize {
        if idx == 0 {
            self.capacity() - 1
        } else {
            idx - 1
        }
    }

    /// Insert at the logical end
    ///
    /// Returns the element evicted from the front if the buffer was full.
    pub fn push_back(&mut self, value: T) -> Option<T> {
        let evicted = if self.is_full() { self.pop_front() } else { None };

        if self.is_empty() {
            self.front = 0;
            self.rear = 0;
        } else {
            self.rear = self.wrap_inc(self.rear);
        }
        self.slots[self.rear] = Some(value);
        self.len += 1;
        evicted
    }

    /// Insert at the logical start
    ///
    /// Returns the element evicted from the back if the buffer was full.
    pub fn push_front(&mut self, value: T) -> Option<T> {
        let evicted = if self.is_full() { self.pop_back() } else { None };

        if self.is_empty() {
            self.front = 0;
            self.rear = 0;
        } else {
            self.front = self.wrap_dec(self.front);
        }
        self.slots[self.front] = Some(value);
        self.len += 1;
        evicted
    }

    /// Remove and return the oldest element
    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.slots[self.front].take();
        self.len -= 1;
        if self.len > 0 {
            self.front = self.wrap_inc(self.front);
        }
        value
    }

    /// Remove and return the newest element
    pub fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.slots[self.rear].take();
        self.len -= 1;
        if self.len > 0 {
            self.rear = self.wrap_dec(self.rear);
        }
        value
    }

    /// Peek at the oldest element
    #[inline]
    pub fn front(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.front].as_ref()
    }

    /// Peek at the newest element
    #[inline]
    pub fn back(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.rear].as_ref()
    }

    /// Element at logical position `i` (0 = front)
    pub fn get(&self, i: usize) -> Option<&T> {
        if i >= self.len {
            return None;
        }
        self.slots[(self.front + i) % self.capacity()].as_ref()
    }

    /// Drop all elements, keeping the capacity
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.front = 0;
        self.rear = 0;
        self.len = 0;
    }

    /// Front-to-back view over the stored elements.
    ///
    /// Use `.rev()` for back-to-front traversal.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ring: self,
            head: 0,
            tail: self.len,
        }
    }
}

impl<'a, T> IntoIterator for &'a RingBuffer<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Cyclic iterator over a [`RingBuffer`] in logical order
pub struct Iter<'a, T> {
    ring: &'a RingBuffer<T>,
    /// Next logical position from the front
    head: usize,
    /// One past the last logical position not yet yielded from the back
    tail: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.head >= self.tail {
            return None;
        }
        let item = self.ring.get(self.head);
        self.head += 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.tail - self.head;
        (remaining, Some(remaining))
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<&'a T> {
        if self.head >= self.tail {
            return None;
        }
        self.tail -= 1;
        self.ring.get(self.tail)
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}
