//! Shared cart state.
//!
//! A single non-negative item count, shared by the cart handlers (atomic add)
//! and the `cart.items` gauge callback (atomic load). Nothing else touches it,
//! so no lock is needed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cart item count shared between request tasks and the metrics pipeline.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    items: Arc<AtomicU64>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` items and return the total produced by this addition.
    pub fn add(&self, count: u64) -> u64 {
        let previous = self.items.fetch_add(count, Ordering::SeqCst);
        previous.wrapping_add(count)
    }

    /// Current item count.
    pub fn items(&self) -> u64 {
        self.items.load(Ordering::SeqCst)
    }
}

/// Effective item count for a raw `count` query value.
///
/// Missing, non-numeric, zero and negative values all count as one item.
pub fn effective_count(raw: Option<&str>) -> u64 {
    match raw.and_then(|v| v.parse::<i64>().ok()) {
        Some(n) if n > 0 => n as u64,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_count_defaults_to_one() {
        assert_eq!(effective_count(None), 1);
        assert_eq!(effective_count(Some("")), 1);
        assert_eq!(effective_count(Some("abc")), 1);
        assert_eq!(effective_count(Some("0")), 1);
        assert_eq!(effective_count(Some("-5")), 1);
        assert_eq!(effective_count(Some("3")), 3);
    }

    #[test]
    fn padded_counts_are_not_numbers() {
        assert_eq!(effective_count(Some(" 3")), 1);
        assert_eq!(effective_count(Some("3 ")), 1);
        assert_eq!(effective_count(Some("+3")), 3);
    }

    #[test]
    fn sequential_adds_sum() {
        let cart = Cart::new();
        for _ in 0..10 {
            cart.add(4);
        }
        assert_eq!(cart.items(), 40);
    }

    #[test]
    fn add_returns_own_total() {
        let cart = Cart::new();
        assert_eq!(cart.add(3), 3);
        assert_eq!(cart.add(1), 4);
    }

    #[test]
    fn clones_share_state() {
        let cart = Cart::new();
        let other = cart.clone();
        other.add(2);
        assert_eq!(cart.items(), 2);
    }

    #[test]
    fn concurrent_adds_are_not_lost() {
        let cart = Cart::new();
        let handles: Vec<_> = (1..=8u64)
            .map(|k| {
                let cart = cart.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        cart.add(k);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // 1000 * (1 + 2 + ... + 8)
        assert_eq!(cart.items(), 36_000);
    }
}
