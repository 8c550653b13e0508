// Connection stream module
// Watches response framing on the way out so heads hyper writes on its own
// (parse errors such as 400 or 431) also get the isolation headers

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::isolation;

/// Body lengths of the responses the handler produced, in order.
///
/// The service pushes one entry per response before hyper serializes it;
/// a response head written with no entry queued came from hyper itself.
#[derive(Debug, Clone, Default)]
pub struct ResponseLedger {
    bodies: Arc<Mutex<VecDeque<Option<u64>>>>,
}

impl ResponseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a handler response; `None` when its body length is unknown
    pub fn record(&self, body_len: Option<u64>) {
        self.bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(body_len);
    }

    fn next(&self) -> Option<Option<u64>> {
        self.bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

/// Where the writer is within the outgoing byte stream
#[derive(Debug)]
enum WriteState {
    /// Between responses
    Idle,
    /// Head of a handler response, already finished by the service
    Handler { matched: usize, body: u64 },
    /// Head written by hyper itself, held back until the blank line
    Own { head: Vec<u8>, matched: usize },
    /// Body bytes still to pass through
    Body(u64),
    /// Framing unknown from here on; bytes are no longer inspected
    Passthrough,
}

const HEAD_END: &[u8] = b"\r\n\r\n";

/// Advance a match of `HEAD_END` by one byte
const fn advance(matched: usize, byte: u8) -> usize {
    if byte == HEAD_END[matched] {
        matched + 1
    } else if byte == b'\r' {
        1
    } else {
        0
    }
}

/// Length of the prefix of `buf` that ends the head, if it does
fn head_end(mut matched: usize, buf: &[u8]) -> Option<usize> {
    for (i, &byte) in buf.iter().enumerate() {
        matched = advance(matched, byte);
        if matched == HEAD_END.len() {
            return Some(i + 1);
        }
    }
    None
}

/// TCP stream wrapper used for every server connection
pub struct IsolatedStream<S> {
    inner: S,
    ledger: ResponseLedger,
    state: WriteState,
    /// Patched head waiting to reach `inner`
    pending: Vec<u8>,
    flushed: usize,
}

impl<S> IsolatedStream<S> {
    pub const fn new(inner: S, ledger: ResponseLedger) -> Self {
        Self {
            inner,
            ledger,
            state: WriteState::Idle,
            pending: Vec::new(),
            flushed: 0,
        }
    }
}

impl<S: AsyncWrite + Unpin> IsolatedStream<S> {
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.flushed < self.pending.len() {
            let n = ready!(Pin::new(&mut self.inner).poll_write(cx, &self.pending[self.flushed..]))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.flushed += n;
        }
        self.pending.clear();
        self.flushed = 0;
        Poll::Ready(Ok(()))
    }

    fn start_response(&mut self) {
        self.state = match self.ledger.next() {
            Some(Some(body)) => WriteState::Handler { matched: 0, body },
            Some(None) => WriteState::Passthrough,
            None => WriteState::Own {
                head: Vec::new(),
                matched: 0,
            },
        };
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for IsolatedStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for IsolatedStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        if matches!(this.state, WriteState::Idle) {
            this.start_response();
        }

        match &mut this.state {
            WriteState::Idle | WriteState::Passthrough => {
                Pin::new(&mut this.inner).poll_write(cx, buf)
            }
            WriteState::Body(remaining) => {
                let limit = usize::try_from(*remaining).map_or(buf.len(), |r| r.min(buf.len()));
                let n = ready!(Pin::new(&mut this.inner).poll_write(cx, &buf[..limit]))?;
                let left = remaining.saturating_sub(u64::try_from(n).unwrap_or(u64::MAX));
                this.state = if left == 0 {
                    WriteState::Idle
                } else {
                    WriteState::Body(left)
                };
                Poll::Ready(Ok(n))
            }
            WriteState::Handler { matched, body } => {
                let limit = head_end(*matched, buf).unwrap_or(buf.len());
                let n = ready!(Pin::new(&mut this.inner).poll_write(cx, &buf[..limit]))?;
                let matched_now = buf[..n].iter().fold(*matched, |m, &b| advance(m, b));
                let body = *body;
                this.state = if matched_now < HEAD_END.len() {
                    WriteState::Handler {
                        matched: matched_now,
                        body,
                    }
                } else if body == 0 {
                    WriteState::Idle
                } else {
                    WriteState::Body(body)
                };
                Poll::Ready(Ok(n))
            }
            WriteState::Own { head, matched } => {
                let Some(taken) = head_end(*matched, buf) else {
                    *matched = buf.iter().fold(*matched, |m, &b| advance(m, b));
                    head.extend_from_slice(buf);
                    return Poll::Ready(Ok(buf.len()));
                };
                head.extend_from_slice(&buf[..taken]);
                isolation::append_to_head(head);
                this.pending = std::mem::take(head);
                this.state = WriteState::Idle;
                // Accepted either way; a pending drain resumes on the next write or flush
                if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
                    return Poll::Ready(Err(e));
                }
                Poll::Ready(Ok(taken))
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        // An unterminated head goes out unpatched
        if let WriteState::Own { head, .. } = &mut this.state {
            this.pending.append(head);
            this.state = WriteState::Passthrough;
        }
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}
