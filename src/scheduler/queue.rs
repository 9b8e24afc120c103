//! Bounded outbound queue
//!
//! Holds messages submitted while the link is down. Priority messages are kept
//! apart so a flush can send them ahead of normal ones, and so eviction never
//! touches them.

use super::OutboundMessage;
use std::collections::VecDeque;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// What happened to a pushed message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnqueueOutcome {
    Queued,
    /// Queue was full, the oldest normal message made room
    Evicted(OutboundMessage),
    /// Queue was full of priority messages, the new message was dropped
    Rejected(OutboundMessage),
}

#[derive(Debug, Clone)]
pub struct OutboundQueue {
    capacity: usize,
    priority: VecDeque<OutboundMessage>,
    normal: VecDeque<OutboundMessage>,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            priority: VecDeque::new(),
            normal: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.priority.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, message: OutboundMessage) -> EnqueueOutcome {
        let evicted = if self.len() >= self.capacity {
            match self.normal.pop_front() {
                Some(oldest) => Some(oldest),
                None => return EnqueueOutcome::Rejected(message),
            }
        } else {
            None
        };

        if message.priority {
            self.priority.push_back(message);
        } else {
            self.normal.push_back(message);
        }

        match evicted {
            Some(oldest) => EnqueueOutcome::Evicted(oldest),
            None => EnqueueOutcome::Queued,
        }
    }

    /// Next message in flush order: priority first, each class in arrival order
    pub fn pop_next(&mut self) -> Option<OutboundMessage> {
        self.priority
            .pop_front()
            .or_else(|| self.normal.pop_front())
    }

    /// Puts a message taken with [`OutboundQueue::pop_next`] back at the front
    pub fn restore_front(&mut self, message: OutboundMessage) {
        if message.priority {
            self.priority.push_front(message);
        } else {
            self.normal.push_front(message);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutboundMessage> {
        self.priority.iter().chain(self.normal.iter())
    }

    pub fn clear(&mut self) {
        self.priority.clear();
        self.normal.clear();
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
