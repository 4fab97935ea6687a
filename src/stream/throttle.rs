//! Latest-wins stream throttling

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

/// Extension trait to add throttling to any Stream
pub trait ThrottleExt: Stream {
    /// Emit at most once per `period`.
    ///
    /// Items arriving between emissions replace each other; only the newest one is
    /// emitted. The first item goes out immediately, and the last one is flushed
    /// when the source ends.
    fn throttle(self, period: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, period)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// Stream returned by [`ThrottleExt::throttle`].
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        period: Duration,
        // Created on first poll so the stream can be built outside a runtime.
        interval: Option<Interval>,
        latest: Option<S::Item>,
        source_done: bool,
    }
}

impl<S: Stream> Throttle<S> {
    pub fn new(stream: S, period: Duration) -> Self {
        Self { stream, period, interval: None, latest: None, source_done: false }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        while !*this.source_done {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.latest = Some(item),
                Poll::Ready(None) => *this.source_done = true,
                Poll::Pending => break,
            }
        }

        if *this.source_done {
            return Poll::Ready(this.latest.take());
        }
        if this.latest.is_none() {
            return Poll::Pending;
        }

        let period = *this.period;
        let ticker = this.interval.get_or_insert_with(|| {
            let mut ticker = interval(period);
            // A quiet source must not bank ticks for a burst later.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ready!(ticker.poll_tick(cx));
        Poll::Ready(this.latest.take())
    }
}
