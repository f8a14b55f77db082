use std::{
    future::Future,
    io,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    net::TcpStream,
    sync::broadcast,
};
use tonic::transport::server::{Connected, TcpConnectInfo};

type ShutdownFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A `TcpStream` whose reads and writes fail once the server shuts down.
///
/// The shutdown fires on a message or when every sender is dropped, which ends
/// the HTTP/2 connection and every call still running on it.
pub struct ShutdownAwareStream {
    inner: TcpStream,
    shutdown: Option<ShutdownFuture>,
}

impl ShutdownAwareStream {
    pub fn new(inner: TcpStream, mut shutdown_rx: broadcast::Receiver<()>) -> Self {
        let shutdown = Box::pin(async move {
            let _ = shutdown_rx.recv().await;
        });

        Self {
            inner,
            shutdown: Some(shutdown),
        }
    }

    fn poll_closed(&mut self, cx: &mut Context<'_>) -> io::Result<()> {
        let fired = match self.shutdown.as_mut() {
            None => true,
            Some(shutdown) => shutdown.as_mut().poll(cx).is_ready(),
        };

        if fired {
            self.shutdown = None;
            return Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "server shutting down",
            ));
        }
        Ok(())
    }
}

impl AsyncRead for ShutdownAwareStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Err(e) = this.poll_closed(cx) {
            return Poll::Ready(Err(e));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for ShutdownAwareStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if let Err(e) = this.poll_closed(cx) {
            return Poll::Ready(Err(e));
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Err(e) = this.poll_closed(cx) {
            return Poll::Ready(Err(e));
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

impl Connected for ShutdownAwareStream {
    type ConnectInfo = TcpConnectInfo;

    fn connect_info(&self) -> Self::ConnectInfo {
        self.inner.connect_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_passes_bytes_through_until_shutdown() {
        let (mut client, accepted) = connected_pair().await;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let mut stream = ShutdownAwareStream::new(accepted, shutdown_rx);

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        shutdown_tx.send(()).unwrap();
        let err = stream.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
        let err = stream.write_all(b"pong").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[tokio::test]
    async fn test_pending_read_wakes_when_sender_dropped() {
        let (_client, accepted) = connected_pair().await;
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let mut stream = ShutdownAwareStream::new(accepted, shutdown_rx);

        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 1];
            stream.read(&mut buf).await
        });
        tokio::task::yield_now().await;
        drop(shutdown_tx);

        let err = reader.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }
}
