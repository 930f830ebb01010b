
use std::sync::Mutex;
use std::task::{Context, Poll, Waker};

/// Bounded FIFO between the acquisition thread and a polling consumer.
///
/// `head == tail` means empty and `(head + 1) % cap == tail` means full, so
/// a ring of `2^exp` slots buffers at most `2^exp - 1` elements. On a full
/// ring [`push`][Self::push] drops the element being pushed: the producer
/// runs in the latency-sensitive acquisition loop and must never stall,
/// and a consumer that lags loses stale data, not fresh data.
///
/// One producer and one consumer; both sides take the mutex only for the
/// slot update.
pub(crate) struct Ring<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    closed: bool,
    waker: Option<Waker>,
}

impl<T> Ring<T> {
    pub fn with_exp(exp: u8) -> Self {
        let cap = 1usize << exp;
        Self {
            inner: Mutex::new(Inner {
                slots: (0..cap).map(|_| None).collect(),
                head: 0,
                tail: 0,
                closed: false,
                waker: None,
            }),
        }
    }

    /// Non-blocking push. Returns `false` when the ring is full and the
    /// element was dropped.
    pub fn push(&self, item: T) -> bool {
        let mut r = self.inner.lock().unwrap();
        let mask = r.slots.len() - 1;
        let next = (r.head + 1) & mask;
        if next == r.tail {
            return false;
        }
        let head = r.head;
        r.slots[head] = Some(item);
        r.head = next;
        let waker = r.waker.take();
        drop(r);
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// Non-blocking drain of up to `out.len()` elements, in push order.
    pub fn pop_many(&self, out: &mut [T]) -> usize {
        let mut r = self.inner.lock().unwrap();
        let mask = r.slots.len() - 1;
        let mut n = 0;
        while n < out.len() && r.tail != r.head {
            let tail = r.tail;
            if let Some(item) = r.slots[tail].take() {
                out[n] = item;
                n += 1;
            }
            r.tail = (tail + 1) & mask;
        }
        n
    }

    /// Wakes the parked consumer and makes the ring report end-of-stream
    /// once drained.
    pub fn close(&self) {
        let mut r = self.inner.lock().unwrap();
        r.closed = true;
        let waker = r.waker.take();
        drop(r);
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Pops one element or parks the consumer's waker. The waker is stored
    /// under the same lock the producer publishes under, so a push between
    /// the emptiness check and the park cannot be missed.
    pub fn poll_pop(&self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let mut r = self.inner.lock().unwrap();
        if r.tail != r.head {
            let tail = r.tail;
            let mask = r.slots.len() - 1;
            let item = r.slots[tail].take();
            r.tail = (tail + 1) & mask;
            if let Some(item) = item {
                return Poll::Ready(Some(item));
            }
        }
        if r.closed {
            return Poll::Ready(None);
        }
        r.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}
