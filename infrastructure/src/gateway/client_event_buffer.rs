//! Per-client bounded event queue sitting between the session event bus and
//! a transport client. Structurally a per-session `mpsc::UnboundedSender
//! <RoutedMessage>` routing table turned bounded with an explicit overflow
//! policy, since a gateway facing untrusted network clients cannot trust a
//! well-behaved subprocess the way a router talking only to one spawned
//! child process could.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const OVERFLOW_CLOSE_CODE: u16 = 4008;
pub const OVERFLOW_CLOSE_REASON: &str = "Event buffer overflow";

/// What the buffer sends to and asks about. Implemented by each transport's
/// connection handle.
#[async_trait]
pub trait ClientSink<T>: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Whether the underlying transport cannot accept another send right now
    /// (e.g. a full socket write buffer). Defaults to "never pressured" for
    /// transports that don't expose one.
    fn is_pressured(&self) -> bool {
        false
    }

    async fn send(&self, event: T);
    fn close(&self, code: u16, reason: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    Disconnect,
    DropOldest,
}

pub struct ClientEventBuffer<T> {
    sink: Arc<dyn ClientSink<T>>,
    max: usize,
    policy: OverflowPolicy,
    queue: Mutex<VecDeque<T>>,
}

impl<T: Send + 'static> ClientEventBuffer<T> {
    pub fn new(sink: Arc<dyn ClientSink<T>>, max: usize, policy: OverflowPolicy) -> Self {
        Self { sink, max, policy, queue: Mutex::new(VecDeque::new()) }
    }

    /// Current queue depth.
    pub async fn pending(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn clear(&self) {
        self.queue.lock().await.clear();
    }

    /// Offer one event. No-op if the client is already disconnected.
    pub async fn push(&self, event: T) {
        if !self.sink.is_connected() {
            return;
        }

        let mut queue = self.queue.lock().await;
        if queue.is_empty() && !self.sink.is_pressured() {
            drop(queue);
            self.sink.send(event).await;
            return;
        }

        queue.push_back(event);
        self.enforce_overflow(&mut queue);
        drop(queue);
        self.drain().await;
    }

    fn enforce_overflow(&self, queue: &mut VecDeque<T>) {
        if queue.len() <= self.max {
            return;
        }
        match self.policy {
            OverflowPolicy::Disconnect => {
                self.sink.close(OVERFLOW_CLOSE_CODE, OVERFLOW_CLOSE_REASON);
                queue.clear();
            }
            OverflowPolicy::DropOldest => {
                while queue.len() > self.max {
                    queue.pop_front();
                }
            }
        }
    }

    /// Drain FIFO until the client disconnects, becomes pressured again, or
    /// the queue empties. Order is preserved across fast-path and drained
    /// sends since this only ever pops from the front.
    pub async fn drain(&self) {
        loop {
            if !self.sink.is_connected() || self.sink.is_pressured() {
                return;
            }
            let mut queue = self.queue.lock().await;
            let Some(event) = queue.pop_front() else { return };
            drop(queue);
            self.sink.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct TestSink {
        connected: AtomicBool,
        pressured: AtomicBool,
        sent: Mutex<Vec<u32>>,
        closed: AtomicBool,
    }

    impl TestSink {
        fn new() -> Self {
            Self {
                connected: AtomicBool::new(true),
                pressured: AtomicBool::new(false),
                sent: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ClientSink<u32> for TestSink {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
        fn is_pressured(&self) -> bool {
            self.pressured.load(Ordering::SeqCst)
        }
        async fn send(&self, event: u32) {
            self.sent.lock().await.push(event);
        }
        fn close(&self, _code: u16, _reason: &str) {
            self.closed.store(true, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn fast_path_sends_directly_when_not_pressured() {
        let sink = Arc::new(TestSink::new());
        let buf = ClientEventBuffer::new(sink.clone(), 10, OverflowPolicy::DropOldest);
        buf.push(1).await;
        assert_eq!(*sink.sent.lock().await, vec![1]);
        assert_eq!(buf.pending().await, 0);
    }

    #[tokio::test]
    async fn pressured_client_enqueues_then_drains_on_clear() {
        let sink = Arc::new(TestSink::new());
        sink.pressured.store(true, Ordering::SeqCst);
        let buf = ClientEventBuffer::new(sink.clone(), 10, OverflowPolicy::DropOldest);
        buf.push(1).await;
        buf.push(2).await;
        assert_eq!(buf.pending().await, 2);
        assert!(sink.sent.lock().await.is_empty());

        sink.pressured.store(false, Ordering::SeqCst);
        buf.drain().await;
        assert_eq!(*sink.sent.lock().await, vec![1, 2]);
        assert_eq!(buf.pending().await, 0);
    }

    #[tokio::test]
    async fn drop_oldest_evicts_head_past_max() {
        let sink = Arc::new(TestSink::new());
        sink.pressured.store(true, Ordering::SeqCst);
        let buf = ClientEventBuffer::new(sink.clone(), 2, OverflowPolicy::DropOldest);
        buf.push(1).await;
        buf.push(2).await;
        buf.push(3).await;
        assert_eq!(buf.pending().await, 2);
        sink.pressured.store(false, Ordering::SeqCst);
        buf.drain().await;
        assert_eq!(*sink.sent.lock().await, vec![2, 3]);
    }

    #[tokio::test]
    async fn disconnect_policy_closes_and_clears_on_overflow() {
        let sink = Arc::new(TestSink::new());
        sink.pressured.store(true, Ordering::SeqCst);
        let buf = ClientEventBuffer::new(sink.clone(), 1, OverflowPolicy::Disconnect);
        buf.push(1).await;
        buf.push(2).await;
        assert!(sink.closed.load(Ordering::SeqCst));
        assert_eq!(buf.pending().await, 0);
    }

    #[tokio::test]
    async fn disconnected_client_push_is_a_no_op() {
        let sink = Arc::new(TestSink::new());
        sink.connected.store(false, Ordering::SeqCst);
        let buf = ClientEventBuffer::new(sink.clone(), 10, OverflowPolicy::DropOldest);
        buf.push(1).await;
        assert_eq!(buf.pending().await, 0);
        assert!(sink.sent.lock().await.is_empty());
    }
}
