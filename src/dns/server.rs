use crate::dns::handlers::{Handler, Protocol};
use crate::error::Error;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Largest UDP payload accepted.
const MAX_UDP_MESSAGE: usize = 65_535;

/// How long in-flight messages may keep running once shutdown was requested.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

/// UDP and TCP listeners bound to the same address, sharing one [`Handler`].
pub struct DnsServer {
    udp: Arc<UdpSocket>,
    tcp: TcpListener,
    handler: Arc<Handler>,
    tcp_timeout: Duration,
}

/// Bind the UDP socket and TCP listener on `addr`.
///
/// # Errors
///
/// Returns [`Error::IO`] if either can't be bound.
pub async fn new(
    addr: SocketAddr,
    handler: Handler,
    tcp_timeout: Duration,
) -> Result<DnsServer, Error> {
    let udp = UdpSocket::bind(addr).await?;
    // With port 0 the TCP listener follows the port the kernel picked for UDP.
    let tcp = TcpListener::bind(udp.local_addr()?).await?;
    Ok(DnsServer {
        udp: Arc::new(udp),
        tcp,
        handler: Arc::new(handler),
        tcp_timeout,
    })
}

impl DnsServer {
    /// The address both listeners are bound to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the socket address can't be read.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.udp.local_addr()?)
    }

    /// Serve until `shutdown` fires (or its sender is dropped) or one of the listeners fails.
    ///
    /// Every datagram and TCP connection is handled on its own task. Once the loop stops, no
    /// new messages are read, idle TCP connections are closed and messages already being
    /// processed are given a bounded drain period to finish before they're aborted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] when receiving on the UDP socket or accepting a TCP connection fails.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), Error> {
        info!("DNS server listening on {} (udp+tcp)", self.local_addr()?);
        let mut tasks = JoinSet::new();
        let mut buf = vec![0; MAX_UDP_MESSAGE];

        let result = loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("DNS server received shutdown signal");
                    break Ok(());
                }
                received = self.udp.recv_from(&mut buf) => {
                    let (len, src) = match received {
                        Ok(received) => received,
                        Err(e) => break Err(Error::from(e)),
                    };
                    let message = buf[..len].to_vec();
                    let (socket, handler) = (self.udp.clone(), self.handler.clone());
                    tasks.spawn(answer_datagram(socket, handler, src, message));
                }
                accepted = self.tcp.accept() => {
                    let (stream, src) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => break Err(Error::from(e)),
                    };
                    let handler = self.handler.clone();
                    let shutdown = shutdown.resubscribe();
                    let idle = self.tcp_timeout;
                    tasks.spawn(serve_client(stream, src, handler, idle, shutdown));
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!("DNS task failed: {e}");
                    }
                }
            }
        };

        drain(tasks).await;
        info!("DNS server stopped");
        result
    }
}

async fn drain(mut tasks: JoinSet<()>) {
    if tasks.is_empty() {
        return;
    }
    debug!("waiting for {} in-flight DNS tasks", tasks.len());
    let drained = timeout(DRAIN_TIMEOUT, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            "aborting {} DNS tasks still running after {DRAIN_TIMEOUT:?}",
            tasks.len()
        );
        tasks.shutdown().await;
    }
}

async fn answer_datagram(
    socket: Arc<UdpSocket>,
    handler: Arc<Handler>,
    src: SocketAddr,
    message: Vec<u8>,
) {
    let Some(reply) = handler.handle(Protocol::Udp, src, &message).await else {
        return;
    };
    if let Err(e) = socket.send_to(&reply, src).await {
        warn!("failed to send UDP reply to {src}: {e}");
    }
}

async fn serve_client(
    stream: TcpStream,
    src: SocketAddr,
    handler: Arc<Handler>,
    idle: Duration,
    shutdown: broadcast::Receiver<()>,
) {
    if let Err(e) = serve_connection(stream, src, &handler, idle, shutdown).await {
        debug!("TCP connection from {src} failed: {e}");
    }
}

/// Serve length-prefixed messages on one connection, in order, until the peer closes it, it
/// stays idle for `idle` or `shutdown` fires between two messages.
async fn serve_connection(
    mut stream: TcpStream,
    src: SocketAddr,
    handler: &Handler,
    idle: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> io::Result<()> {
    let mut length = [0; 2];
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!("closing TCP connection from {src} on shutdown");
                return Ok(());
            }
            read = timeout(idle, stream.read_exact(&mut length)) => match read {
                Err(_) => {
                    debug!("closing idle TCP connection from {src}");
                    return Ok(());
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Ok(Err(e)) => return Err(e),
                Ok(Ok(_)) => {}
            },
        }

        let mut message = vec![0; usize::from(u16::from_be_bytes(length))];
        timeout(idle, stream.read_exact(&mut message))
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))??;

        let Some(reply) = handler.handle(Protocol::Tcp, src, &message).await else {
            continue;
        };
        let Ok(reply_len) = u16::try_from(reply.len()) else {
            warn!(
                "dropping {} byte reply to {src}: too large for TCP framing",
                reply.len()
            );
            continue;
        };
        stream.write_all(&reply_len.to_be_bytes()).await?;
        stream.write_all(&reply).await?;
    }
}
