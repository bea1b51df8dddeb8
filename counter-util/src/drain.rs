use bytes::Buf;
use hyper::body::Body;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum DrainError {
    #[error("failed to read body frame")]
    Frame {
        #[source]
        source: BoxError,
    },
}

pin_project! {
    /// Collects every data frame of a body into one buffer. Trailer frames are skipped.
    pub struct DrainBodyFuture<B: Body> {
        #[pin]
        body: B,
        buf: Vec<u8>,
    }
}

impl<B> DrainBodyFuture<B>
where
    B: Body,
{
    /// `size_hint` only preallocates, a body longer than the hint still drains fully.
    #[inline]
    #[must_use]
    pub fn with_size_hint(body: B, size_hint: usize) -> Self {
        Self {
            body,
            buf: Vec::with_capacity(size_hint),
        }
    }
}

impl<B> Future for DrainBodyFuture<B>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    type Output = Result<Vec<u8>, DrainError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slf = self.project();
        loop {
            let Some(next_res) = ready!(slf.body.as_mut().poll_frame(cx)) else {
                return Poll::Ready(Ok(std::mem::take(slf.buf)));
            };
            let frame = next_res.map_err(|e| DrainError::Frame { source: e.into() })?;
            if let Ok(mut data) = frame.into_data() {
                while data.has_remaining() {
                    let chunk = data.chunk();
                    let len = chunk.len();
                    slf.buf.extend_from_slice(chunk);
                    data.advance(len);
                }
            }
            if slf.body.is_end_stream() {
                return Poll::Ready(Ok(std::mem::take(slf.buf)));
            }
        }
    }
}
