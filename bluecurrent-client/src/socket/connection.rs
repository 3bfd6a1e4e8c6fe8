//! Socket ownership
//!
//! A [`Connection`] owns both halves of the WebSocket through two tasks:
//! - the receive loop decodes every frame and publishes it to the fan-out queue
//! - the writer drains an outbound channel, one frame at a time
//!
//! Both tasks exist for exactly as long as the connection does. When the
//! receive loop ends (close, transport error, malformed frame) the queue is
//! closed with the reason so pending waits fail instead of hanging, and the
//! writer is stopped so no task outlives the socket.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header, HeaderValue},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use super::messages::InboundMessage;
use super::queue::{FanoutQueue, Subscription};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the outbound frame channel
const OUTBOUND_CAPACITY: usize = 64;

/// Frame queued for the writer, with a slot for the write outcome
struct OutboundFrame {
    text: String,
    written: oneshot::Sender<Result<()>>,
}

/// Cheap handle used by operations to send frames and subscribe to replies
#[derive(Clone)]
pub struct ConnectionHandle {
    outbound: mpsc::Sender<OutboundFrame>,
    queue: FanoutQueue,
}

impl ConnectionHandle {
    /// Queue a frame and wait until it has been written to the socket
    pub async fn send(&self, text: String) -> Result<()> {
        let (written, outcome) = oneshot::channel();
        self.outbound
            .send(OutboundFrame { text, written })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        outcome.await.map_err(|_| ClientError::NotConnected)?
    }

    pub fn subscribe(&self) -> Subscription {
        self.queue.subscribe()
    }

    pub fn queue(&self) -> &FanoutQueue {
        &self.queue
    }
}

/// Live socket plus its receive and writer tasks
pub struct Connection {
    handle: ConnectionHandle,
    /// Raised by `shutdown` or by the receive loop when it ends
    stop: Arc<watch::Sender<bool>>,
    reader: JoinHandle<Result<()>>,
    writer: JoinHandle<()>,
}

impl Connection {
    /// Open the socket and start both tasks
    pub async fn open(config: &ClientConfig) -> Result<Self> {
        let mut request = config.socket_url.as_str().into_client_request()?;
        let agent = HeaderValue::from_str(&config.user_agent())
            .map_err(|e| ClientError::InvalidHeader(e.to_string()))?;
        request.headers_mut().insert(header::USER_AGENT, agent);

        let (socket, _response) = connect_async(request).await.map_err(|e| {
            error!("WebSocket connection failed: {}", e);
            ClientError::from(e)
        })?;
        info!("WebSocket connected to {}", config.socket_url);

        Ok(Self::start(socket))
    }

    fn start(socket: Socket) -> Self {
        let (sink, stream) = socket.split();
        let queue = FanoutQueue::new();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);
        let stop = Arc::new(stop_tx);

        let reader = tokio::spawn(receive_loop(stream, queue.clone(), Arc::clone(&stop)));
        let writer = tokio::spawn(write_loop(sink, outbound_rx, stop_rx));

        Self {
            handle: ConnectionHandle {
                outbound: outbound_tx,
                queue,
            },
            stop,
            reader,
            writer,
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Receive loop still running; once false the writer is stopping too
    pub fn is_alive(&self) -> bool {
        !self.handle.queue.is_closed() && !self.reader.is_finished()
    }

    /// Stop the receive loop, close the socket and wait for both tasks
    pub async fn shutdown(mut self, close_timeout: Duration) {
        self.reader.abort();
        if let Err(e) = (&mut self.reader).await {
            if !e.is_cancelled() {
                warn!("Receive loop panicked: {}", e);
            }
        }
        self.handle.queue.close("session closed");

        self.stop.send_replace(true);
        if tokio::time::timeout(close_timeout, &mut self.writer).await.is_err() {
            warn!("Close handshake timed out after {:?}", close_timeout);
            self.writer.abort();
        }
        info!("Connection closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // No-ops once shutdown() has joined the tasks
        self.reader.abort();
        self.writer.abort();
        self.handle.queue.close("connection dropped");
    }
}

async fn receive_loop(
    mut stream: SplitStream<Socket>,
    queue: FanoutQueue,
    stop: Arc<watch::Sender<bool>>,
) -> Result<()> {
    let outcome = loop {
        let frame = match stream.next().await {
            Some(Ok(Message::Text(text))) => InboundMessage::from_frame(&text),
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => InboundMessage::from_frame(text),
                Err(e) => Err(ClientError::MalformedFrame(e.to_string())),
            },
            Some(Ok(Message::Close(_))) | None => break Ok(()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => break Err(ClientError::from(e)),
        };

        match frame {
            Ok(message) => {
                debug!(kind = ?message.kind(), "Received message");
                queue.publish(message);
            }
            Err(e) => break Err(e),
        }
    };

    match &outcome {
        Ok(()) => {
            info!("WebSocket closed by server");
            queue.close("socket closed by server");
        }
        Err(e) => {
            error!("Receive loop failed: {}", e);
            queue.close(e.to_string());
        }
    }
    stop.send_replace(true);
    outcome
}

async fn write_loop(
    mut sink: SplitSink<Socket, Message>,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                let result = sink.send(Message::Text(frame.text.into())).await;
                let failed = result.is_err();
                let _ = frame.written.send(result.map_err(ClientError::from));
                if failed {
                    error!("Failed to write frame, stopping writer");
                    return;
                }
            }
            _ = stop.changed() => break,
        }
    }

    if let Err(e) = sink.close().await {
        debug!("Error while closing socket: {}", e);
    }
}
