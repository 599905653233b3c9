// Per-conversation async locks with eviction of idle entries

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

const DEFAULT_PRUNE_THRESHOLD: usize = 1024;

/// Registry of mutexes keyed by conversation id.
///
/// Entries are created lazily. An entry is idle when the registry holds the only
/// reference to it: nobody owns the guard and nobody is waiting.
pub struct ConversationLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    prune_threshold: usize,
}

impl Default for ConversationLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::with_prune_threshold(DEFAULT_PRUNE_THRESHOLD)
    }

    /// Idle entries are dropped whenever the registry reaches `threshold` entries
    pub fn with_prune_threshold(threshold: usize) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            prune_threshold: threshold.max(1),
        }
    }

    /// Wait for exclusive access to a conversation
    pub async fn acquire(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            if locks.len() >= self.prune_threshold {
                let removed = prune(&mut locks);
                if removed > 0 {
                    tracing::debug!("Pruned {} idle conversation locks", removed);
                }
            }
            locks
                .entry(conversation_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        lock.lock_owned().await
    }

    /// Drop every entry nobody holds or waits for, returning how many were removed
    pub fn prune_idle(&self) -> usize {
        prune(&mut self.locks.lock())
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn prune(locks: &mut HashMap<String, Arc<AsyncMutex<()>>>) -> usize {
    let before = locks.len();
    locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    before - locks.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_conversation_is_serialized() {
        let locks = Arc::new(ConversationLocks::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let locks = locks.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("conv").await;
                // read-modify-write with a yield in between
                let current = counter.load(Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                counter.store(current + 1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_different_conversations_do_not_block() {
        let locks = ConversationLocks::new();
        let _a = locks.acquire("a").await;

        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locks = ConversationLocks::new();
        let held = locks.acquire("held").await;
        drop(locks.acquire("idle").await);

        assert_eq!(locks.len(), 2);
        assert_eq!(locks.prune_idle(), 1);
        assert_eq!(locks.len(), 1);

        drop(held);
        assert_eq!(locks.prune_idle(), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_registry_prunes_when_threshold_reached() {
        let locks = ConversationLocks::with_prune_threshold(4);
        for i in 0..4 {
            drop(locks.acquire(&format!("conv-{}", i)).await);
        }
        assert_eq!(locks.len(), 4);

        let _guard = locks.acquire("conv-new").await;
        assert_eq!(locks.len(), 1);
    }
}
