//! Interlocked read-modify-write primitives.
//!
//! Every operation is a single hardware atomic with `SeqCst` ordering.
//! `increment`, `decrement` and `add` return the *new* value and wrap on
//! overflow; `exchange` and `compare_exchange` return the value held before
//! the operation. `compare_exchange(loc, value, comparand)` stores `value`
//! only if `loc` held `comparand`; the caller detects success by comparing
//! the returned value against `comparand`.
//!
//! The [`raw`] module offers the same operations over plain fields of
//! generated object layouts.

use std::sync::atomic::{AtomicI32, AtomicI64, AtomicPtr, AtomicU64, Ordering::SeqCst};

#[inline]
pub fn increment_i32(location: &AtomicI32) -> i32 {
    location.fetch_add(1, SeqCst).wrapping_add(1)
}

#[inline]
pub fn decrement_i32(location: &AtomicI32) -> i32 {
    location.fetch_sub(1, SeqCst).wrapping_sub(1)
}

#[inline]
pub fn exchange_i32(location: &AtomicI32, value: i32) -> i32 {
    location.swap(value, SeqCst)
}

#[inline]
pub fn compare_exchange_i32(location: &AtomicI32, value: i32, comparand: i32) -> i32 {
    match location.compare_exchange(comparand, value, SeqCst, SeqCst) {
        Ok(prev) | Err(prev) => prev,
    }
}

#[inline]
pub fn add_i32(location: &AtomicI32, value: i32) -> i32 {
    location.fetch_add(value, SeqCst).wrapping_add(value)
}

#[inline]
pub fn increment_i64(location: &AtomicI64) -> i64 {
    location.fetch_add(1, SeqCst).wrapping_add(1)
}

#[inline]
pub fn decrement_i64(location: &AtomicI64) -> i64 {
    location.fetch_sub(1, SeqCst).wrapping_sub(1)
}

#[inline]
pub fn exchange_i64(location: &AtomicI64, value: i64) -> i64 {
    location.swap(value, SeqCst)
}

#[inline]
pub fn compare_exchange_i64(location: &AtomicI64, value: i64, comparand: i64) -> i64 {
    match location.compare_exchange(comparand, value, SeqCst, SeqCst) {
        Ok(prev) | Err(prev) => prev,
    }
}

#[inline]
pub fn add_i64(location: &AtomicI64, value: i64) -> i64 {
    location.fetch_add(value, SeqCst).wrapping_add(value)
}

/// Untorn 64-bit read, also on 32-bit targets.
#[inline]
pub fn read_i64(location: &AtomicI64) -> i64 {
    location.load(SeqCst)
}

#[inline]
pub fn exchange_ref<T>(location: &AtomicPtr<T>, value: *mut T) -> *mut T {
    location.swap(value, SeqCst)
}

#[inline]
pub fn compare_exchange_ref<T>(location: &AtomicPtr<T>, value: *mut T, comparand: *mut T) -> *mut T {
    match location.compare_exchange(comparand, value, SeqCst, SeqCst) {
        Ok(prev) | Err(prev) => prev,
    }
}

/// Exchange on an `f64` stored as its bit pattern.
#[inline]
pub fn exchange_f64(location: &AtomicU64, value: f64) -> f64 {
    f64::from_bits(location.swap(value.to_bits(), SeqCst))
}

/// Compare-exchange on an `f64` stored as its bit pattern.
///
/// The comparison is bitwise: `-0.0` does not match `0.0` and a NaN matches
/// only an identical NaN payload.
#[inline]
pub fn compare_exchange_f64(location: &AtomicU64, value: f64, comparand: f64) -> f64 {
    match location.compare_exchange(comparand.to_bits(), value.to_bits(), SeqCst, SeqCst) {
        Ok(prev) | Err(prev) => f64::from_bits(prev),
    }
}

/// Interlocked operations over plain memory locations.
///
/// # Safety
///
/// For every function here `location` must be non-null, aligned for the
/// atomic type, valid for reads and writes, and for the duration of the call
/// it must only be accessed through atomic operations.
pub mod raw {
    use std::sync::atomic::{AtomicI32, AtomicI64, AtomicPtr};

    pub unsafe fn increment_i32(location: *mut i32) -> i32 {
        super::increment_i32(AtomicI32::from_ptr(location))
    }

    pub unsafe fn decrement_i32(location: *mut i32) -> i32 {
        super::decrement_i32(AtomicI32::from_ptr(location))
    }

    pub unsafe fn exchange_i32(location: *mut i32, value: i32) -> i32 {
        super::exchange_i32(AtomicI32::from_ptr(location), value)
    }

    pub unsafe fn compare_exchange_i32(location: *mut i32, value: i32, comparand: i32) -> i32 {
        super::compare_exchange_i32(AtomicI32::from_ptr(location), value, comparand)
    }

    pub unsafe fn add_i32(location: *mut i32, value: i32) -> i32 {
        super::add_i32(AtomicI32::from_ptr(location), value)
    }

    /// `location` must be 8-byte aligned, which `i64` fields are not on
    /// every 32-bit target.
    pub unsafe fn increment_i64(location: *mut i64) -> i64 {
        super::increment_i64(AtomicI64::from_ptr(location))
    }

    pub unsafe fn decrement_i64(location: *mut i64) -> i64 {
        super::decrement_i64(AtomicI64::from_ptr(location))
    }

    pub unsafe fn exchange_i64(location: *mut i64, value: i64) -> i64 {
        super::exchange_i64(AtomicI64::from_ptr(location), value)
    }

    pub unsafe fn compare_exchange_i64(location: *mut i64, value: i64, comparand: i64) -> i64 {
        super::compare_exchange_i64(AtomicI64::from_ptr(location), value, comparand)
    }

    pub unsafe fn add_i64(location: *mut i64, value: i64) -> i64 {
        super::add_i64(AtomicI64::from_ptr(location), value)
    }

    pub unsafe fn exchange_ref<T>(location: *mut *mut T, value: *mut T) -> *mut T {
        super::exchange_ref(AtomicPtr::from_ptr(location), value)
    }

    pub unsafe fn compare_exchange_ref<T>(
        location: *mut *mut T,
        value: *mut T,
        comparand: *mut T,
    ) -> *mut T {
        super::compare_exchange_ref(AtomicPtr::from_ptr(location), value, comparand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_increment_decrement_return_new_value() {
        let v = AtomicI32::new(5);
        assert_eq!(increment_i32(&v), 6);
        assert_eq!(decrement_i32(&v), 5);
        assert_eq!(decrement_i32(&v), 4);

        let w = AtomicI64::new(i64::MAX);
        assert_eq!(increment_i64(&w), i64::MIN);
    }

    #[test]
    fn test_exchange_returns_old_value() {
        let v = AtomicI32::new(10);
        assert_eq!(exchange_i32(&v, 20), 10);
        assert_eq!(v.load(SeqCst), 20);

        let w = AtomicI64::new(-1);
        assert_eq!(exchange_i64(&w, 1 << 40), -1);
        assert_eq!(read_i64(&w), 1 << 40);
    }

    #[test]
    fn test_compare_exchange_success_and_failure() {
        let v = AtomicI32::new(10);

        // matches: swapped, prior value returned
        assert_eq!(compare_exchange_i32(&v, 99, 10), 10);
        assert_eq!(v.load(SeqCst), 99);

        // mismatch: untouched, prior value returned
        assert_eq!(compare_exchange_i32(&v, 7, 10), 99);
        assert_eq!(v.load(SeqCst), 99);

        let w = AtomicI64::new(100);
        assert_eq!(compare_exchange_i64(&w, 200, 100), 100);
        assert_eq!(compare_exchange_i64(&w, 300, 100), 200);
        assert_eq!(read_i64(&w), 200);
    }

    #[test]
    fn test_add_returns_new_value() {
        let v = AtomicI32::new(10);
        assert_eq!(add_i32(&v, 5), 15);
        assert_eq!(add_i32(&v, -20), -5);

        let w = AtomicI64::new(0);
        assert_eq!(add_i64(&w, 1 << 33), 1 << 33);
    }

    #[test]
    fn test_reference_slots() {
        let mut a = 1u32;
        let mut b = 2u32;
        let pa: *mut u32 = &mut a;
        let pb: *mut u32 = &mut b;

        let slot = AtomicPtr::new(pa);
        assert_eq!(compare_exchange_ref(&slot, pb, std::ptr::null_mut()), pa);
        assert_eq!(slot.load(SeqCst), pa);
        assert_eq!(compare_exchange_ref(&slot, pb, pa), pa);
        assert_eq!(exchange_ref(&slot, std::ptr::null_mut()), pb);
        assert!(slot.load(SeqCst).is_null());
    }

    #[test]
    fn test_f64_bitwise_compare() {
        let v = AtomicU64::new(1.5f64.to_bits());
        assert_eq!(compare_exchange_f64(&v, 2.5, 1.5), 1.5);
        assert_eq!(exchange_f64(&v, -0.0), 2.5);

        // -0.0 != 0.0 bitwise
        assert_eq!(compare_exchange_f64(&v, 9.0, 0.0).to_bits(), (-0.0f64).to_bits());
        assert_eq!(f64::from_bits(v.load(SeqCst)).to_bits(), (-0.0f64).to_bits());
    }

    #[test]
    fn test_raw_ops_on_plain_fields() {
        let mut counter = 0i32;
        let mut wide = 7i64;
        unsafe {
            assert_eq!(raw::increment_i32(&mut counter), 1);
            assert_eq!(raw::add_i32(&mut counter, 4), 5);
            assert_eq!(raw::compare_exchange_i32(&mut counter, 0, 5), 5);
            assert_eq!(raw::exchange_i64(&mut wide, 8), 7);
        }
        assert_eq!(counter, 0);
        assert_eq!(wide, 8);
    }

    #[test]
    fn test_concurrent_increments_are_exact() {
        let counter = Arc::new(AtomicI32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        increment_i32(&counter);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counter.load(SeqCst), 8_000);
    }
}
