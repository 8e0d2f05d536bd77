//! Cache line alignment for hot shared state.

use std::fmt;
use std::ops::Deref;

/// Aligns `T` to a 64-byte cache line so neighbouring values in an array
/// never share a line.
#[repr(align(64))]
#[derive(Default)]
pub struct CachePadded<T> {
    value: T,
}

impl<T> CachePadded<T> {
    pub const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> Deref for CachePadded<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for CachePadded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CachePadded").field(&self.value).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn test_alignment_spans_a_line() {
        assert_eq!(align_of::<CachePadded<u32>>(), 64);
        assert_eq!(size_of::<[CachePadded<u32>; 2]>(), 128);
    }

    #[test]
    fn test_deref() {
        let padded = CachePadded::new(7u8);
        assert_eq!(*padded, 7);
    }
}
