//! Time-paced iteration

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep, sleep};

/// Extension trait to turn any iterator into a paced stream
pub trait PaceExt: Iterator {
    /// Yield items as a stream, waiting `period` after each item
    ///
    /// The first item is available immediately. The wait after the last item
    /// still happens before the stream reports its end, so a consumer that
    /// acts on exhaustion sees it one period after the final item.
    ///
    /// Must be called from within a tokio runtime.
    fn paced(self, period: Duration) -> Paced<Self>
    where
        Self: Sized,
    {
        Paced::new(self, period)
    }
}

impl<I: Iterator> PaceExt for I {}

pin_project! {
    /// A stream that releases iterator items one period apart
    pub struct Paced<I> {
        iter: I,
        #[pin]
        delay: Sleep,
        period: Duration,
        waiting: bool,
        finished: bool,
    }
}

impl<I: Iterator> Paced<I> {
    /// Create a new paced stream
    pub fn new(iter: I, period: Duration) -> Self {
        Self { iter, delay: sleep(Duration::ZERO), period, waiting: false, finished: false }
    }
}

impl<I: Iterator> Stream for Paced<I> {
    type Item = I::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.finished {
            return Poll::Ready(None);
        }

        if *this.waiting {
            ready!(this.delay.as_mut().poll(cx));
            *this.waiting = false;
        }

        match this.iter.next() {
            Some(item) => {
                this.delay.as_mut().reset(Instant::now() + *this.period);
                *this.waiting = true;
                Poll::Ready(Some(item))
            }
            None => {
                *this.finished = true;
                Poll::Ready(None)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished { (0, Some(0)) } else { self.iter.size_hint() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn items_are_one_period_apart() {
        let start = Instant::now();
        let mut stream = std::pin::pin!((0..3).paced(Duration::from_secs(1)));

        let mut arrivals = Vec::new();
        while let Some(item) = stream.next().await {
            arrivals.push((item, start.elapsed()));
        }

        assert_eq!(
            arrivals,
            vec![(0, Duration::ZERO), (1, Duration::from_secs(1)), (2, Duration::from_secs(2))]
        );
        // End of stream comes after the trailing pause
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_iterator_ends_immediately() {
        let start = Instant::now();
        let items: Vec<u32> =
            std::iter::empty::<u32>().paced(Duration::from_secs(5)).collect().await;
        assert!(items.is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
