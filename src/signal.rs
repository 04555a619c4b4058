//! A one-shot, awaitable value.
//!
//! 一次性的、可等待的值。
//!
//! `OnceSignal` replaces polling loops around "is it there yet" checks: the
//! first writer wins, every later write is rejected, and any number of tasks
//! can await the value without spinning.

use tokio::sync::watch;

/// A value that transitions from unset to set exactly once.
///
/// 一个只会从未设置转换为已设置一次的值。
#[derive(Debug)]
pub struct OnceSignal<V> {
    tx: watch::Sender<Option<V>>,
}

impl<V> OnceSignal<V>
where
    V: Clone + Send + Sync,
{
    /// Creates a new unset signal.
    ///
    /// 创建一个新的未设置的信号。
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Sets the value if it is still unset.
    ///
    /// The check and the store happen under one lock, so of several racing
    /// writers exactly one observes `true`.
    ///
    /// 如果值仍未设置，则设置它。检查与存储在同一把锁下完成，
    /// 因此多个竞争的写入者中恰好只有一个得到 `true`。
    pub fn set(&self, value: V) -> bool {
        self.tx.send_if_modified(move |current| {
            if current.is_some() {
                return false;
            }
            *current = Some(value);
            true
        })
    }

    /// Returns a copy of the value, if set.
    pub fn get(&self) -> Option<V> {
        self.tx.borrow().clone()
    }

    /// Returns `true` once the value has been set.
    pub fn is_set(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Waits until the value is set and returns a copy of it.
    ///
    /// Returns immediately when the value is already set. Safe to call from
    /// any number of tasks concurrently.
    ///
    /// 等待值被设置并返回其副本。
    pub async fn wait(&self) -> V {
        let mut rx = self.tx.subscribe();
        let found = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|value| value.as_ref().cloned());
        match found {
            Some(value) => value,
            // The sender lives in `self`, so the channel cannot close while we wait.
            None => std::future::pending().await,
        }
    }
}

impl<V> Default for OnceSignal<V>
where
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn first_writer_wins() {
        let signal = OnceSignal::new();
        assert!(!signal.is_set());
        assert!(signal.set(1));
        assert!(!signal.set(2));
        assert_eq!(signal.get(), Some(1));
        assert_eq!(signal.wait().await, 1);
    }

    #[tokio::test]
    async fn waiters_wake_when_set() {
        let signal = Arc::new(OnceSignal::<u32>::new());
        let mut waiters = Vec::new();
        for _ in 0..4 {
            let signal = signal.clone();
            waiters.push(tokio::spawn(async move { signal.wait().await }));
        }

        tokio::task::yield_now().await;
        assert!(waiters.iter().all(|w| !w.is_finished()));

        signal.set(7);
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), 7);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wait_blocks_while_unset() {
        let signal = OnceSignal::<()>::new();
        let result = tokio::time::timeout(Duration::from_secs(1), signal.wait()).await;
        assert!(result.is_err(), "wait must not complete before set");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_setters_have_single_winner() {
        let signal = Arc::new(OnceSignal::<usize>::new());
        let mut setters = Vec::new();
        for i in 0..32 {
            let signal = signal.clone();
            setters.push(tokio::spawn(async move { signal.set(i) }));
        }

        let results = futures::future::join_all(setters).await;
        let winners: Vec<usize> = results
            .into_iter()
            .enumerate()
            .filter_map(|(i, won)| won.unwrap().then_some(i))
            .collect();

        assert_eq!(winners.len(), 1);
        assert_eq!(signal.get(), Some(winners[0]));
    }
}
