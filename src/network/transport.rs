//! The `Transport` collaborator (§6.1): a bidirectional byte stream with
//! `read`/`write`/`close`, a peer address, and deadline setters. Plain TCP,
//! TLS, and WebSocket are all just different ways of producing lines; the
//! rest of the daemon only ever sees a reader/writer pair split at
//! construction time, matching §4.B's requirement that the read loop and
//! the writer task never share the same half of the socket.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;

#[async_trait]
pub trait TransportReader: Send {
    /// Read one line, with `\r\n`/`\n` already stripped. Returns `Ok(None)`
    /// on clean EOF.
    async fn read_line(&mut self, deadline: Duration) -> io::Result<Option<String>>;

    fn peer_addr(&self) -> SocketAddr;

    fn is_tls(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait TransportWriter: Send {
    /// Write one line, appending the wire terminator.
    async fn write_line(&mut self, line: &str, deadline: Duration) -> io::Result<()>;

    async fn close(&mut self);
}

pub fn split_plain_tcp(stream: TcpStream, peer_addr: SocketAddr) -> (Box<dyn TransportReader>, Box<dyn TransportWriter>) {
    let (read_half, write_half) = stream.into_split();
    (
        Box::new(PlainReader {
            reader: BufReader::new(read_half),
            peer_addr,
        }),
        Box::new(PlainWriter { writer: write_half }),
    )
}

struct PlainReader {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    peer_addr: SocketAddr,
}

#[async_trait]
impl TransportReader for PlainReader {
    async fn read_line(&mut self, deadline: Duration) -> io::Result<Option<String>> {
        read_line_with_deadline(&mut self.reader, deadline).await
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

struct PlainWriter {
    writer: tokio::net::tcp::OwnedWriteHalf,
}

#[async_trait]
impl TransportWriter for PlainWriter {
    async fn write_line(&mut self, line: &str, deadline: Duration) -> io::Result<()> {
        write_line_with_deadline(&mut self.writer, line, deadline).await
    }

    async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

pub fn split_tls(
    stream: tokio_rustls::server::TlsStream<TcpStream>,
    peer_addr: SocketAddr,
) -> (Box<dyn TransportReader>, Box<dyn TransportWriter>) {
    let (read_half, write_half) = tokio::io::split(stream);
    (
        Box::new(TlsReader {
            reader: BufReader::new(read_half),
            peer_addr,
        }),
        Box::new(TlsWriter { writer: write_half }),
    )
}

struct TlsReader {
    reader: BufReader<tokio::io::ReadHalf<tokio_rustls::server::TlsStream<TcpStream>>>,
    peer_addr: SocketAddr,
}

#[async_trait]
impl TransportReader for TlsReader {
    async fn read_line(&mut self, deadline: Duration) -> io::Result<Option<String>> {
        read_line_with_deadline(&mut self.reader, deadline).await
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    fn is_tls(&self) -> bool {
        true
    }
}

struct TlsWriter {
    writer: tokio::io::WriteHalf<tokio_rustls::server::TlsStream<TcpStream>>,
}

#[async_trait]
impl TransportWriter for TlsWriter {
    async fn write_line(&mut self, line: &str, deadline: Duration) -> io::Result<()> {
        write_line_with_deadline(&mut self.writer, line, deadline).await
    }

    async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

/// One text frame = one line (§4.J: "a close frame maps to socket close").
pub fn split_websocket(
    stream: WebSocketStream<TcpStream>,
    peer_addr: SocketAddr,
) -> (Box<dyn TransportReader>, Box<dyn TransportWriter>) {
    let (sink, stream) = stream.split();
    (
        Box::new(WsReader { stream, peer_addr }),
        Box::new(WsWriter { sink }),
    )
}

type WsSink = futures_util::stream::SplitSink<WebSocketStream<TcpStream>, WsMessage>;
type WsStream = futures_util::stream::SplitStream<WebSocketStream<TcpStream>>;

struct WsReader {
    stream: WsStream,
    peer_addr: SocketAddr,
}

#[async_trait]
impl TransportReader for WsReader {
    async fn read_line(&mut self, deadline: Duration) -> io::Result<Option<String>> {
        match timeout(deadline, self.stream.next()).await {
            Ok(Some(Ok(WsMessage::Text(text)))) => Ok(Some(text.to_string())),
            Ok(Some(Ok(WsMessage::Close(_)))) | Ok(None) => Ok(None),
            Ok(Some(Ok(_))) => Ok(Some(String::new())),
            Ok(Some(Err(e))) => Err(io::Error::new(io::ErrorKind::Other, e)),
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "read deadline exceeded")),
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

struct WsWriter {
    sink: WsSink,
}

#[async_trait]
impl TransportWriter for WsWriter {
    async fn write_line(&mut self, line: &str, deadline: Duration) -> io::Result<()> {
        timeout(deadline, self.sink.send(WsMessage::Text(line.to_string().into())))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write deadline exceeded"))?
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

async fn read_line_with_deadline<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
    deadline: Duration,
) -> io::Result<Option<String>> {
    let mut buf = String::new();
    let n = timeout(deadline, reader.read_line(&mut buf))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read deadline exceeded"))??;
    if n == 0 {
        return Ok(None);
    }
    while buf.ends_with('\n') || buf.ends_with('\r') {
        buf.pop();
    }
    Ok(Some(buf))
}

async fn write_line_with_deadline<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    line: &str,
    deadline: Duration,
) -> io::Result<()> {
    let mut framed = String::with_capacity(line.len() + 2);
    framed.push_str(line);
    framed.push_str("\r\n");
    timeout(deadline, writer.write_all(framed.as_bytes()))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write deadline exceeded"))?
}
