//! In-memory transport for exercising the connection layer without
//! hardware. The mock side implements `AsyncRead`/`AsyncWrite`; the handle
//! lets a test play the device role: inspect what the host wrote and feed
//! bytes back, in arbitrary chunking.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Debug, Default)]
struct MockState {
    /// Bytes queued for the host to read.
    inbound: VecDeque<u8>,
    /// Bytes the host has written.
    outbound: Vec<u8>,
    closed: bool,
    read_waker: Option<Waker>,
}

impl MockState {
    fn wake(&mut self) {
        if let Some(waker) = self.read_waker.take() {
            waker.wake();
        }
    }
}

/// The transport half, handed to `NibusConnection::new`.
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// The device half, kept by the test.
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

/// Creates a connected transport/handle pair.
pub fn mock_transport() -> (MockTransport, MockHandle) {
    let state = Arc::new(Mutex::new(MockState::default()));
    (
        MockTransport {
            state: state.clone(),
        },
        MockHandle { state },
    )
}

impl MockHandle {
    /// Queues bytes for the host side to read and wakes a pending reader.
    pub fn feed(&self, bytes: &[u8]) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.inbound.extend(bytes);
        state.wake();
    }

    /// Signals end of stream; a pending read completes with 0 bytes.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.closed = true;
        state.wake();
    }

    /// Takes everything the host has written so far.
    pub fn take_written(&self) -> Vec<u8> {
        let mut state = self.state.lock().expect("mock state poisoned");
        std::mem::take(&mut state.outbound)
    }
}

impl AsyncRead for MockTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = self.state.lock().expect("mock state poisoned");
        if state.inbound.is_empty() {
            if state.closed {
                return Poll::Ready(Ok(()));
            }
            // Park until feed() or close(); returning Ready with no bytes
            // would read as EOF.
            state.read_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }
        let n = state.inbound.len().min(buf.remaining());
        for byte in state.inbound.drain(..n) {
            buf.put_slice(&[byte]);
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.state.lock().expect("mock state poisoned");
        if state.closed {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock transport closed",
            )));
        }
        state.outbound.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
