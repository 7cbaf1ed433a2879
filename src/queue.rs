//! Output queue between a collector and the parsers consuming its output.
//!
//! The collector is the only producer. It places one serialized
//! [`PathDescriptor`] per discovered file on the queue and closes the queue
//! once, after the last item, which is the end-of-stream signal consumers
//! wait for.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crossbeam::channel::{self, Receiver, Sender};
use log::debug;

use crate::models::PathDescriptor;

/// Error returned when an item cannot be queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// `close()` was already called
    Closed,
    /// Every consumer has gone away
    Disconnected,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Closed => write!(f, "output queue is closed"),
            QueueError::Disconnected => write!(f, "output queue has no consumers"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Producer side of the output queue
#[cfg_attr(test, mockall::automock)]
pub trait OutputQueue: Send + Sync {
    /// Enqueue one serialized descriptor, blocking while a bounded queue is full
    fn queue_item(&self, item: String) -> Result<(), QueueError>;

    /// Signal end-of-stream; calling it again has no effect
    fn close(&self);
}

/// Queue backed by a crossbeam channel.
///
/// Closing drops the sender, which ends iteration on the paired
/// [`QueueReceiver`] once the buffered items are drained.
pub struct ChannelQueue {
    sender: Mutex<Option<Sender<String>>>,
}

impl ChannelQueue {
    /// A queue holding at most `capacity` undelivered items
    pub fn bounded(capacity: usize) -> (Self, QueueReceiver) {
        let (sender, receiver) = channel::bounded(capacity);
        (Self::from_sender(sender), QueueReceiver { receiver })
    }

    pub fn unbounded() -> (Self, QueueReceiver) {
        let (sender, receiver) = channel::unbounded();
        (Self::from_sender(sender), QueueReceiver { receiver })
    }

    fn from_sender(sender: Sender<String>) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<Sender<String>>> {
        self.sender.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_closed(&self) -> bool {
        self.sender().is_none()
    }
}

impl OutputQueue for ChannelQueue {
    fn queue_item(&self, item: String) -> Result<(), QueueError> {
        // Clone so a blocking send does not hold the lock close() needs
        let sender = self.sender().clone().ok_or(QueueError::Closed)?;
        sender.send(item).map_err(|_| QueueError::Disconnected)
    }

    fn close(&self) {
        if self.sender().take().is_some() {
            debug!("Output queue closed");
        }
    }
}

/// Consumer side of a [`ChannelQueue`]
#[derive(Clone)]
pub struct QueueReceiver {
    receiver: Receiver<String>,
}

impl QueueReceiver {
    /// Next serialized descriptor, or `None` once the queue is closed and drained
    pub fn next_item(&self) -> Option<String> {
        self.receiver.recv().ok()
    }

    /// Drain the queue until end-of-stream, decoding every item
    pub fn collect_descriptors(&self) -> anyhow::Result<Vec<PathDescriptor>> {
        self.iter().map(|item| PathDescriptor::from_wire(&item)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = String> + '_ {
        self.receiver.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::thread;

    #[test]
    fn test_items_arrive_in_order_then_end() {
        let (queue, receiver) = ChannelQueue::unbounded();
        queue.queue_item("one".to_string()).unwrap();
        queue.queue_item("two".to_string()).unwrap();
        queue.close();

        assert_eq!(receiver.next_item().as_deref(), Some("one"));
        assert_eq!(receiver.next_item().as_deref(), Some("two"));
        assert_eq!(receiver.next_item(), None);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (queue, receiver) = ChannelQueue::unbounded();
        queue.close();
        queue.close();

        assert!(queue.is_closed());
        assert_eq!(queue.queue_item("late".to_string()), Err(QueueError::Closed));
        assert_eq!(receiver.next_item(), None);
    }

    #[test]
    fn test_dropped_consumer_is_reported() {
        let (queue, receiver) = ChannelQueue::unbounded();
        drop(receiver);
        assert_eq!(queue.queue_item("x".to_string()), Err(QueueError::Disconnected));
    }

    #[test]
    fn test_bounded_queue_with_concurrent_consumer() {
        let (queue, receiver) = ChannelQueue::bounded(2);
        let consumer = thread::spawn(move || receiver.collect_descriptors().unwrap());

        for i in 0..10 {
            let descriptor = PathDescriptor::live(Path::new(&format!("/data/{}.txt", i)));
            queue.queue_item(descriptor.to_wire().unwrap()).unwrap();
        }
        queue.close();

        let descriptors = consumer.join().unwrap();
        assert_eq!(descriptors.len(), 10);
        assert_eq!(descriptors[9].file_path(), "/data/9.txt");
    }
}
