//! Drop-oldest bounded channel
//!
//! The live view prefers the newest data over complete data: when a consumer falls
//! behind, the oldest queued item is evicted so the producer never waits. Producers
//! call [`BoundedChannel::push`], the UI polls with [`BoundedChannel::try_pop`].
//! Worker threads use [`BoundedChannel::pop_timeout`] so they can sleep on an
//! empty queue and still check for shutdown regularly.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
pub struct BoundedChannel<T> {
    queue: Mutex<VecDeque<T>>,
    available: Condvar,
    capacity: usize,
}

impl<T> BoundedChannel<T> {
    /// Create a channel holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { queue: Mutex::new(VecDeque::with_capacity(capacity)), available: Condvar::new(), capacity }
    }

    /// Enqueue without blocking, returning the evicted oldest item when full.
    pub fn push(&self, item: T) -> Option<T> {
        let evicted = {
            let mut queue = self.queue.lock();
            let evicted = if queue.len() >= self.capacity { queue.pop_front() } else { None };
            queue.push_back(item);
            evicted
        };
        self.available.notify_one();
        evicted
    }

    /// Enqueue without blocking, folding instead of evicting when full.
    ///
    /// The oldest item is removed and handed to `fold` together with the item
    /// queued after it (or `item` itself at capacity 1), so nothing it carried is
    /// lost. Returns whether a fold happened.
    pub fn push_folding(&self, mut item: T, fold: impl FnOnce(T, &mut T)) -> bool {
        let folded = {
            let mut queue = self.queue.lock();
            let oldest = if queue.len() >= self.capacity { queue.pop_front() } else { None };
            let folded = oldest.is_some();
            if let Some(oldest) = oldest {
                match queue.front_mut() {
                    Some(next) => fold(oldest, next),
                    None => fold(oldest, &mut item),
                }
            }
            queue.push_back(item);
            folded
        };
        self.available.notify_one();
        folded
    }

    pub fn try_pop(&self) -> Option<T> {
        self.queue.lock().pop_front()
    }

    /// Wait up to `timeout` for an item.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.queue.lock();
        loop {
            if let Some(item) = queue.pop_front() {
                return Some(item);
            }
            if self.available.wait_until(&mut queue, deadline).timed_out() {
                return queue.pop_front();
            }
        }
    }

    /// Remove everything, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn evicts_oldest_when_full() {
        let channel = BoundedChannel::new(2);
        assert_eq!(channel.push(1), None);
        assert_eq!(channel.push(2), None);
        assert_eq!(channel.push(3), Some(1));
        assert_eq!(channel.len(), 2);
        assert_eq!(channel.try_pop(), Some(2));
        assert_eq!(channel.try_pop(), Some(3));
        assert_eq!(channel.try_pop(), None);
    }

    #[test]
    fn zero_capacity_holds_one_item() {
        let channel = BoundedChannel::new(0);
        assert_eq!(channel.capacity(), 1);
        channel.push("a");
        assert_eq!(channel.push("b"), Some("a"));
    }

    #[test]
    fn folding_push_keeps_every_item_accounted_for() {
        let channel = BoundedChannel::new(2);
        let concat = |older: String, newer: &mut String| newer.insert_str(0, &older);

        assert!(!channel.push_folding("a".to_string(), concat));
        assert!(!channel.push_folding("b".to_string(), concat));
        assert!(channel.push_folding("c".to_string(), concat));
        assert!(channel.push_folding("d".to_string(), concat));

        assert_eq!(channel.drain(), vec!["abc".to_string(), "d".to_string()]);
    }

    #[test]
    fn folding_push_at_capacity_one_folds_into_the_new_item() {
        let channel = BoundedChannel::new(1);
        channel.push_folding(1u32, |older, newer| *newer += older);
        channel.push_folding(10u32, |older, newer| *newer += older);
        assert_eq!(channel.drain(), vec![11]);
    }

    #[test]
    fn drain_empties_in_order() {
        let channel = BoundedChannel::new(3);
        for i in 0..5 {
            channel.push(i);
        }
        assert_eq!(channel.drain(), vec![2, 3, 4]);
        assert!(channel.is_empty());
    }

    #[test]
    fn pop_timeout_returns_none_when_empty() {
        let channel: BoundedChannel<u8> = BoundedChannel::new(1);
        let started = Instant::now();
        assert_eq!(channel.pop_timeout(Duration::from_millis(20)), None);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn pop_timeout_wakes_on_push() {
        let channel = Arc::new(BoundedChannel::new(2));
        let producer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                channel.push(42u32);
            })
        };

        assert_eq!(channel.pop_timeout(Duration::from_secs(5)), Some(42));
        producer.join().unwrap();
    }

    proptest! {
        #[test]
        fn keeps_the_last_c_items(
            items in prop::collection::vec(any::<u16>(), 0..64),
            capacity in 1usize..8,
        ) {
            let channel = BoundedChannel::new(capacity);
            for item in &items {
                channel.push(*item);
                prop_assert!(channel.len() <= capacity);
            }

            let expected: Vec<u16> = items.iter().skip(items.len().saturating_sub(capacity)).copied().collect();
            prop_assert_eq!(channel.drain(), expected);
        }
    }
}
