//! Unbounded multi-consumer fan-out, grounded on `oplog/broadcaster.go`.
//!
//! A single coordinator task owns the tail of a singly-linked chain of
//! [`Segment`]s, each an empty slot until the coordinator fills it.
//! [`Broadcaster::publish`] sends a value to the coordinator and returns
//! immediately, never waiting on any listener. [`Broadcaster::listen`] asks
//! the coordinator (via a one-shot reply, matching this codebase's actor
//! idiom in `services/server/src/state.rs`) for the segment currently at
//! the tail and hands back a [`Receiver`] pinned there. A receiver that
//! never calls [`Receiver::read`] holds its entire suffix of the chain in
//! memory — unbounded per-laggard buffering is the explicit trade this
//! primitive makes for never blocking the publisher or other subscribers.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Notify, OnceCell};

enum Frame<T> {
    Value(T),
    Shutdown,
}

struct Filled<T> {
    frame: Frame<T>,
    next: Arc<Segment<T>>,
}

struct Segment<T> {
    filled: OnceCell<Filled<T>>,
    ready: Notify,
}

impl<T> Segment<T> {
    fn empty() -> Arc<Self> {
        Arc::new(Self {
            filled: OnceCell::new(),
            ready: Notify::new(),
        })
    }
}

enum Command<T> {
    Publish(T),
    Listen(oneshot::Sender<Arc<Segment<T>>>),
    Shutdown,
}

/// Handle to the fan-out. Cloning is cheap; every clone talks to the same
/// coordinator task.
#[derive(Clone)]
pub struct Broadcaster<T> {
    cmd_tx: mpsc::UnboundedSender<Command<T>>,
}

/// A listener's position in the chain, created by [`Broadcaster::listen`].
pub struct Receiver<T> {
    current: Arc<Segment<T>>,
}

impl<T: Clone + Send + Sync + 'static> Broadcaster<T> {
    /// Spawns the coordinator task and returns a handle to it.
    pub fn new() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::coordinate(cmd_rx));
        Self { cmd_tx }
    }

    /// Publishes `value` to every listener attached at or before this call.
    /// Never blocks on a listener; the only way this can fail is if the
    /// coordinator task has already shut down.
    pub fn publish(&self, value: T) {
        let _ = self.cmd_tx.send(Command::Publish(value));
    }

    /// Returns a [`Receiver`] pinned to the current tail. It observes every
    /// publish from this call onward, in order, exactly once.
    pub async fn listen(&self) -> Receiver<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Listen(reply_tx)).is_err() {
            return Receiver {
                current: shutdown_segment(),
            };
        }
        let current = reply_rx.await.unwrap_or_else(|_| shutdown_segment());
        Receiver { current }
    }

    /// Publishes the shutdown sentinel and stops the coordinator task.
    /// Listeners currently blocked in [`Receiver::read`] wake up and
    /// observe `None`; listeners that attach afterward get a pre-shut-down
    /// receiver.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
    }

    async fn coordinate(mut cmd_rx: mpsc::UnboundedReceiver<Command<T>>) {
        let mut tail = Segment::empty();

        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Publish(value) => {
                    let next = Segment::empty();
                    let _ = tail.filled.set(Filled {
                        frame: Frame::Value(value),
                        next: next.clone(),
                    });
                    tail.ready.notify_waiters();
                    tail = next;
                }
                Command::Listen(reply) => {
                    let _ = reply.send(tail.clone());
                }
                Command::Shutdown => {
                    let _ = tail.filled.set(Filled {
                        frame: Frame::Shutdown,
                        next: Segment::empty(),
                    });
                    tail.ready.notify_waiters();
                    break;
                }
            }
        }
    }
}

/// A segment that reads as already shut down, for listeners that attach
/// after (or race with) the coordinator's exit.
fn shutdown_segment<T>() -> Arc<Segment<T>> {
    let segment = Segment::empty();
    let _ = segment.filled.set(Filled {
        frame: Frame::Shutdown,
        next: Segment::empty(),
    });
    segment
}

impl<T: Clone + Send + Sync + 'static> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Receiver<T> {
    /// Blocks until the next value is available, returns it, and advances.
    /// Returns `None` once the shutdown sentinel is reached; the receiver
    /// should not be read from again afterward.
    pub async fn read(&mut self) -> Option<T> {
        loop {
            let notified = self.current.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(filled) = self.current.filled.get() {
                let result = match &filled.frame {
                    Frame::Value(v) => Some(v.clone()),
                    Frame::Shutdown => None,
                };
                self.current = filled.next.clone();
                return result;
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listener_sees_publishes_after_listen_in_order() {
        let bus: Broadcaster<i32> = Broadcaster::new();
        let mut rx = bus.listen().await;

        bus.publish(1);
        bus.publish(2);
        bus.publish(3);

        assert_eq!(rx.read().await, Some(1));
        assert_eq!(rx.read().await, Some(2));
        assert_eq!(rx.read().await, Some(3));
    }

    #[tokio::test]
    async fn two_listeners_each_see_every_publish_independently() {
        let bus: Broadcaster<&'static str> = Broadcaster::new();
        let mut a = bus.listen().await;
        let mut b = bus.listen().await;

        bus.publish("hello");

        assert_eq!(a.read().await, Some("hello"));
        assert_eq!(b.read().await, Some("hello"));
    }

    #[tokio::test]
    async fn a_lagging_listener_still_gets_everything_in_order() {
        let bus: Broadcaster<i32> = Broadcaster::new();
        let mut rx = bus.listen().await;

        for i in 0..100 {
            bus.publish(i);
        }

        for i in 0..100 {
            assert_eq!(rx.read().await, Some(i));
        }
    }

    #[tokio::test]
    async fn shutdown_wakes_a_blocked_reader_with_none() {
        let bus: Broadcaster<i32> = Broadcaster::new();
        let mut rx = bus.listen().await;

        let read = tokio::spawn(async move { rx.read().await });
        bus.shutdown();

        assert_eq!(read.await.unwrap(), None);
    }

    #[tokio::test]
    async fn listener_attached_before_publish_does_not_miss_it() {
        let bus: Broadcaster<i32> = Broadcaster::new();
        let mut rx = bus.listen().await;
        // Give the coordinator a chance to register the listener before
        // publishing, exercising the ordering guarantee rather than relying
        // on the unbounded mpsc's FIFO delivery alone.
        tokio::task::yield_now().await;
        bus.publish(42);
        assert_eq!(rx.read().await, Some(42));
    }
}
