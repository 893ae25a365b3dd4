//! A typed, replayable, multi-consumer event stream.
//!
//! Every consumer holds an independent cursor into an append-only log; a
//! consumer that subscribes late still sees the full history before blocking
//! on future pushes. `on`/`once` handlers are invoked synchronously, in
//! registration order, at push time, isolated from each other's panics via
//! `catch_unwind` so one broken handler never blocks delivery to the rest.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::warn;

type Handler<T> = Box<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    events: VecDeque<T>,
    closed: bool,
    error: Option<String>,
    handlers: Vec<(u64, Handler<T>)>,
}

/// A subscription handle returned by [`EventBuffer::on`]; dropping it does
/// **not** unsubscribe — call [`EventBuffer::off`] explicitly, matching the
/// explicit unsubscribe-closure contract rather than RAII semantics.
pub struct SubscriptionId(u64);

pub struct EventBuffer<T> {
    inner: Arc<Mutex<Inner<T>>>,
    notify: Arc<Notify>,
    next_handler_id: AtomicU64,
}

impl<T> Default for EventBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventBuffer<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { events: VecDeque::new(), closed: false, error: None, handlers: Vec::new() })),
            notify: Arc::new(Notify::new()),
            next_handler_id: AtomicU64::new(0),
        }
    }

    /// Register a handler invoked for every future push (not replayed).
    pub fn on<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_handler_id.fetch_add(1, Ordering::SeqCst);
        self.inner.lock().unwrap().handlers.push((id, Box::new(handler)));
        SubscriptionId(id)
    }

    pub fn off(&self, id: SubscriptionId) {
        self.inner.lock().unwrap().handlers.retain(|(hid, _)| *hid != id.0);
    }

    /// Replay the buffered history through `handler` synchronously, then keep
    /// delivering future events to it.
    pub fn on_replay<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        {
            let inner = self.inner.lock().unwrap();
            for event in &inner.events {
                handler(event);
            }
        }
        self.on(handler)
    }

    pub fn push(&self, event: T)
    where
        T: Clone,
    {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return;
        }
        inner.events.push_back(event.clone());
        for (_, handler) in &inner.handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                warn!("event buffer handler panicked; continuing delivery to remaining handlers");
            }
        }
        drop(inner);
        self.notify.notify_waiters();
    }

    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        drop(inner);
        self.notify.notify_waiters();
    }

    pub fn error(&self, message: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        inner.error = Some(message.into());
        drop(inner);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of the events pushed so far, in order.
    pub fn history(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.inner.lock().unwrap().events.iter().cloned().collect()
    }

    /// A new cursor over this buffer's history and future events.
    pub fn subscribe(&self) -> Subscriber<T> {
        Subscriber { inner: self.inner.clone(), notify: self.notify.clone(), cursor: 0 }
    }
}

/// An independent read cursor over an [`EventBuffer`].
pub struct Subscriber<T> {
    inner: Arc<Mutex<Inner<T>>>,
    notify: Arc<Notify>,
    cursor: usize,
}

impl<T: Clone> Subscriber<T> {
    /// Await the next event. Returns `Ok(None)` once the buffer is closed and
    /// fully drained, `Err(message)` if the buffer was closed with an error
    /// after this cursor caught up to the tail.
    pub async fn next(&mut self) -> Result<Option<T>, String> {
        loop {
            let notified = {
                let inner = self.inner.lock().unwrap();
                if self.cursor < inner.events.len() {
                    let event = inner.events[self.cursor].clone();
                    self.cursor += 1;
                    return Ok(Some(event));
                }
                if inner.closed {
                    return match &inner.error {
                        Some(message) => Err(message.clone()),
                        None => Ok(None),
                    };
                }
                self.notify.notified()
            };
            notified.await;
        }
    }
}
