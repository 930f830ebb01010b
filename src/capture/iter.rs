use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use crate::ring::Ring;

/// Asynchronous consumer over one capture queue.
///
/// Yields queued events as they are published and ends (`None`) once the
/// capture has shut down and the queue is drained. One stream per queue:
/// concurrent consumers steal each other's events and wake-ups.
pub struct EventStream<'a, T> {
    ring: &'a Ring<T>,
}

impl<'a, T> EventStream<'a, T> {
    pub(crate) fn new(ring: &'a Ring<T>) -> Self {
        Self { ring }
    }

    /// Waits for the next queued event.
    pub async fn next(&mut self) -> Option<T> {
        struct Next<'r, T>(&'r Ring<T>);

        impl<T> Future for Next<'_, T> {
            type Output = Option<T>;

            fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
                self.0.poll_pop(cx)
            }
        }

        Next(self.ring).await
    }
}

impl<T> Stream for EventStream<'_, T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.ring.poll_pop(cx)
    }
}
