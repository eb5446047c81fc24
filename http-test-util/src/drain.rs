use bytes::Buf;
use hyper::body::Body;
use pin_project_lite::pin_project;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

pin_project! {
    /// Reads a body to its end without keeping it, resolving to the number of
    /// data bytes seen.
    ///
    /// Trailer frames are skipped.
    pub struct DiscardBodyFuture<B: Body> {
        #[pin]
        body: B,
        len: usize,
    }
}

impl<B> DiscardBodyFuture<B>
where
    B: Body,
{
    #[inline]
    #[must_use]
    pub fn new(body: B) -> Self {
        Self { body, len: 0 }
    }
}

impl<B> Future for DiscardBodyFuture<B>
where
    B: Body,
    B::Error: Display,
{
    type Output = Result<usize, anyhow::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slf = self.project();
        loop {
            let Some(next_res) = ready!(slf.body.as_mut().poll_frame(cx)) else {
                return Poll::Ready(Ok(*slf.len));
            };
            let frame = match next_res {
                Ok(frame) => frame,
                Err(e) => {
                    return Poll::Ready(Err(anyhow::anyhow!("Failed to poll next frame: {e}")));
                }
            };
            if let Ok(data) = frame.into_data() {
                *slf.len += data.remaining();
            }
            if slf.body.is_end_stream() {
                return Poll::Ready(Ok(*slf.len));
            }
        }
    }
}
