// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Per-connection stream guard
//!
//! Wraps each accepted TCP stream before it is handed to the Modbus engine:
//!
//! - once a client has sent bytes of a request, the response must be written
//!   within the request timeout, otherwise the next read fails with
//!   `TimedOut` and the engine drops the connection. Idle clients are left
//!   alone.
//! - when the server shuts down, pending and future reads report end of
//!   stream so the engine closes the connection.

use std::{
    future::Future,
    io,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use log::debug;
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    sync::watch,
    time::{self, Instant, Sleep},
};

type ShutdownFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Stream adapter applying the request timeout and server shutdown.
pub struct ConnectionStream<S> {
    inner: S,
    request_timeout: Option<Duration>,
    deadline: Option<Pin<Box<Sleep>>>,
    shutdown: ShutdownFuture,
    closed: bool,
}

impl<S> ConnectionStream<S> {
    /// Wrap `inner`. The connection ends once `shutdown` holds `true`.
    pub fn new(
        inner: S,
        request_timeout: Option<Duration>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self {
        let shutdown = Box::pin(async move {
            loop {
                if *shutdown.borrow_and_update() {
                    break;
                }
                // A dropped sender means the server is gone as well.
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        });
        Self {
            inner,
            request_timeout,
            deadline: None,
            shutdown,
            closed: false,
        }
    }

    fn arm(&mut self) {
        let Some(timeout) = self.request_timeout else {
            return;
        };
        if self.deadline.is_none() {
            self.deadline = Some(Box::pin(time::sleep_until(Instant::now() + timeout)));
        }
    }

    fn poll_closed(&mut self, cx: &mut Context<'_>) -> bool {
        if !self.closed && self.shutdown.as_mut().poll(cx).is_ready() {
            debug!("Server stopping, closing client connection");
            self.closed = true;
        }
        self.closed
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ConnectionStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.poll_closed(cx) {
            return Poll::Ready(Ok(()));
        }

        let filled = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                if buf.filled().len() > filled {
                    this.arm();
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
            Poll::Pending => {
                if let Some(deadline) = this.deadline.as_mut() {
                    if deadline.as_mut().poll(cx).is_ready() {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "client did not complete its request in time",
                        )));
                    }
                }
                Poll::Pending
            }
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ConnectionStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let res = Pin::new(&mut this.inner).poll_write(cx, buf);
        if matches!(res, Poll::Ready(Ok(_))) {
            // A response went out, the pending request is complete.
            this.deadline = None;
        }
        res
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn passes_data_through() {
        let (mut client, server) = duplex(64);
        let (_tx, rx) = watch::channel(false);
        let mut stream = ConnectionStream::new(server, Some(Duration::from_secs(5)), rx);

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        stream.write_all(b"pong").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_connection_is_not_timed_out() {
        let (mut client, server) = duplex(64);
        let (_tx, rx) = watch::channel(false);
        let mut stream = ConnectionStream::new(server, Some(Duration::from_millis(100)), rx);

        let mut buf = [0u8; 1];
        let read = time::timeout(Duration::from_secs(10), stream.read(&mut buf)).await;
        assert!(read.is_err(), "idle read should still be pending");

        client.write_all(b"x").await.unwrap();
        assert_eq!(stream.read(&mut buf).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unfinished_request_times_out() {
        let (mut client, server) = duplex(64);
        let (_tx, rx) = watch::channel(false);
        let mut stream = ConnectionStream::new(server, Some(Duration::from_millis(100)), rx);

        client.write_all(b"\x00\x01").await.unwrap();
        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).await.unwrap();

        let err = stream.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn response_disarms_timeout() {
        let (mut client, server) = duplex(64);
        let (_tx, rx) = watch::channel(false);
        let mut stream = ConnectionStream::new(server, Some(Duration::from_millis(100)), rx);

        client.write_all(b"req").await.unwrap();
        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).await.unwrap();
        stream.write_all(b"rsp").await.unwrap();

        let read = time::timeout(Duration::from_secs(10), stream.read(&mut buf)).await;
        assert!(read.is_err(), "read after a response should wait for the client");
    }

    #[tokio::test]
    async fn shutdown_ends_the_stream() {
        let (_client, server) = duplex(64);
        let (tx, rx) = watch::channel(false);
        let mut stream = ConnectionStream::new(server, None, rx);

        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 8];
            stream.read(&mut buf).await
        });
        tx.send_replace(true);

        let read = reader.await.unwrap().unwrap();
        assert_eq!(read, 0);
    }
}
