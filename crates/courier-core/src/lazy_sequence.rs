// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
//! A cold producer closure driven over a bounded channel — the lazy-sequence
//! primitive the executor uses to stream events to its consumer without
//! doing any work before the consumer asks for the first item.
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Handle a producer closure uses to emit items and observe cancellation.
///
/// Cheaply cloneable: both fields are themselves clonable channel handles,
/// so multiple concurrent tool tasks can each hold one to emit events
/// independently into the same sequence.
#[derive(Clone)]
pub struct Yielder<T> {
    tx: mpsc::Sender<Result<T, anyhow::Error>>,
    cancelled: watch::Receiver<bool>,
}

impl<T> Yielder<T> {
    /// Send an item downstream. Returns `false` once the consumer has
    /// stopped polling or the sequence was closed — the producer should
    /// wind down at the next opportunity.
    pub async fn emit(&self, item: T) -> bool {
        if *self.cancelled.borrow() {
            return false;
        }
        self.tx.send(Ok(item)).await.is_ok()
    }

    /// Terminate the sequence with an error instead of a further item.
    pub async fn fail(&self, err: anyhow::Error) {
        let _ = self.tx.send(Err(err)).await;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }
}

/// Error surfaced by [`LazySequence::next`].
#[derive(Debug, Error)]
pub enum SequenceError {
    /// The producer finished normally; there are no more items.
    #[error("generator done")]
    Done,
    /// `close()` was already called; the sequence will not produce further
    /// items.
    #[error("sequence closed")]
    Closed,
    /// The producer failed.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

type Producer<T> = Box<dyn FnOnce(Yielder<T>) -> BoxFuture<'static, ()> + Send>;

enum State<T> {
    Cold(Producer<T>),
    Running { rx: mpsc::Receiver<Result<T, anyhow::Error>>, cancel_tx: watch::Sender<bool> },
    Closed,
}

/// A lazy, cancellable, single-consumer sequence of `T`.
///
/// The producer closure does not run at all until the first [`next`][Self::next]
/// call. `close()` is idempotent; calling `next` after close returns
/// [`SequenceError::Closed`] rather than panicking or blocking.
pub struct LazySequence<T> {
    state: State<T>,
}

impl<T: Send + 'static> LazySequence<T> {
    pub fn new<F>(producer: F) -> Self
    where
        F: FnOnce(Yielder<T>) -> BoxFuture<'static, ()> + Send + 'static,
    {
        Self { state: State::Cold(Box::new(producer)) }
    }

    fn start(&mut self) {
        let State::Cold(_) = &self.state else { return };
        let State::Cold(producer) = std::mem::replace(&mut self.state, State::Closed) else {
            unreachable!()
        };
        let (tx, rx) = mpsc::channel(16);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let yielder = Yielder { tx, cancelled: cancel_rx };
        tokio::spawn(producer(yielder));
        self.state = State::Running { rx, cancel_tx };
    }

    /// Pull the next item, starting the producer on the first call.
    pub async fn next(&mut self) -> Result<T, SequenceError> {
        if matches!(self.state, State::Cold(_)) {
            self.start();
        }
        match &mut self.state {
            State::Running { rx, .. } => match rx.recv().await {
                Some(Ok(item)) => Ok(item),
                Some(Err(e)) => {
                    self.state = State::Closed;
                    Err(SequenceError::Other(e))
                }
                None => {
                    self.state = State::Closed;
                    Err(SequenceError::Done)
                }
            },
            State::Closed => Err(SequenceError::Closed),
            State::Cold(_) => unreachable!("start() always transitions out of Cold"),
        }
    }

    /// Signal the producer to stop and mark the sequence closed. Safe to
    /// call any number of times, including before the first `next()`.
    pub fn close(&mut self) {
        if let State::Running { cancel_tx, .. } = &self.state {
            let _ = cancel_tx.send(true);
        }
        self.state = State::Closed;
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed<T, F>(f: F) -> BoxFuture<'static, ()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Box::pin(f)
    }

    #[tokio::test]
    async fn producer_does_not_run_until_first_next() {
        let started = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let started2 = started.clone();
        let seq: LazySequence<i32> = LazySequence::new(move |y| {
            boxed(async move {
                started2.store(true, std::sync::atomic::Ordering::SeqCst);
                y.emit(1).await;
            })
        });
        assert!(!started.load(std::sync::atomic::Ordering::SeqCst));
        drop(seq); // never polled — producer must not have run
    }

    #[tokio::test]
    async fn yields_items_in_order_then_done() {
        let mut seq: LazySequence<i32> = LazySequence::new(|y| {
            boxed(async move {
                for i in 1..=3 {
                    if !y.emit(i).await {
                        break;
                    }
                }
            })
        });
        assert_eq!(seq.next().await.unwrap(), 1);
        assert_eq!(seq.next().await.unwrap(), 2);
        assert_eq!(seq.next().await.unwrap(), 3);
        assert!(matches!(seq.next().await, Err(SequenceError::Done)));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_next_then_errors() {
        let mut seq: LazySequence<i32> = LazySequence::new(|y| {
            boxed(async move {
                loop {
                    if !y.emit(1).await {
                        break;
                    }
                }
            })
        });
        seq.next().await.unwrap();
        seq.close();
        seq.close();
        seq.close();
        assert!(matches!(seq.next().await, Err(SequenceError::Closed)));
        assert!(matches!(seq.next().await, Err(SequenceError::Closed)));
    }

    #[tokio::test]
    async fn producer_error_terminates_sequence() {
        let mut seq: LazySequence<i32> = LazySequence::new(|y| {
            boxed(async move {
                y.emit(1).await;
                y.fail(anyhow::anyhow!("boom")).await;
            })
        });
        assert_eq!(seq.next().await.unwrap(), 1);
        let err = seq.next().await.unwrap_err();
        assert!(matches!(err, SequenceError::Other(_)));
        assert!(matches!(seq.next().await, Err(SequenceError::Closed)));
    }
}
