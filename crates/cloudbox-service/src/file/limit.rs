//! Byte-counting stream wrapper that fails once a declared size is exceeded.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;

pin_project! {
    /// Passes chunks through until the running total goes past `limit`, then
    /// yields one error and raises the shared overflow flag.
    ///
    /// The consumer sees an ordinary I/O error; the flag lets the caller tell
    /// an oversized upload apart from a broken connection afterwards.
    pub struct LimitedStream<S> {
        #[pin]
        inner: S,
        limit: u64,
        received: u64,
        overflowed: Arc<AtomicBool>,
    }
}

impl<S> LimitedStream<S> {
    /// Wrap `inner`, allowing at most `limit` bytes.
    pub fn new(inner: S, limit: u64) -> Self {
        Self {
            inner,
            limit,
            received: 0,
            overflowed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that reports whether the limit was exceeded.
    pub fn overflow_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.overflowed)
    }
}

impl<S> Stream for LimitedStream<S>
where
    S: Stream<Item = Result<Bytes, io::Error>>,
{
    type Item = Result<Bytes, io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if this.overflowed.load(Ordering::Acquire) {
            return Poll::Ready(None);
        }

        match ready!(this.inner.poll_next(cx)) {
            Some(Ok(chunk)) => {
                *this.received += chunk.len() as u64;
                if *this.received > *this.limit {
                    this.overflowed.store(true, Ordering::Release);
                    return Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("received more than the declared {} bytes", this.limit),
                    ))));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            other => Poll::Ready(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::stream;

    fn source(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, io::Error>> + use<> {
        let items: Vec<Result<Bytes, io::Error>> = parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn test_within_limit_passes_through() {
        let limited = LimitedStream::new(source(&["abc", "de"]), 5);
        let flag = limited.overflow_flag();
        let chunks: Vec<_> = limited.collect().await;

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(Result::is_ok));
        assert!(!flag.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_overflow_errors_once_and_stops() {
        let limited = LimitedStream::new(source(&["abc", "def", "ghi"]), 4);
        let flag = limited.overflow_flag();
        let chunks: Vec<_> = limited.collect().await;

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].is_ok());
        assert_eq!(
            chunks[1].as_ref().unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
        assert!(flag.load(Ordering::Acquire));
    }
}
