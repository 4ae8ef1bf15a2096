//! Per-user concurrency limit.
//!
//! A user may have at most `max` requests in flight. A [`ChatPermit`] is
//! held for the lifetime of a request and gives its slot back on drop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone)]
pub struct UserChatLimiter {
    max: usize,
    active: Arc<Mutex<HashMap<String, usize>>>,
}

impl UserChatLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Take a slot for `user_id`, or `None` if the user is at the limit.
    pub fn try_acquire(&self, user_id: &str) -> Option<ChatPermit> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let count = active.entry(user_id.to_string()).or_insert(0);
        if *count >= self.max {
            return None;
        }
        *count += 1;
        Some(ChatPermit {
            user_id: user_id.to_string(),
            active: Arc::clone(&self.active),
        })
    }

    /// Requests currently in flight for `user_id`.
    pub fn in_flight(&self, user_id: &str) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .copied()
            .unwrap_or(0)
    }
}

/// One in-flight request slot.
#[derive(Debug)]
pub struct ChatPermit {
    user_id: String,
    active: Arc<Mutex<HashMap<String, usize>>>,
}

impl Drop for ChatPermit {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = active.get_mut(&self.user_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                active.remove(&self.user_id);
            }
        }
    }
}
