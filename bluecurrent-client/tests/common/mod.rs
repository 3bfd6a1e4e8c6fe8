//! In-process stand-in for the vendor socket
//!
//! Accepts any number of connections, records every command frame and answers
//! through a caller-supplied responder.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bluecurrent_client::{BlueCurrentClient, ClientConfig, CredentialEncryptor, Result};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub const TOKEN: &str = "tok-123";

/// What the mock does after a command frame
pub enum Reply {
    Frame(Value),
    Delayed(Duration, Value),
    /// Text frame sent as-is, not necessarily JSON
    Raw(String),
    Close,
}

type Responder = Arc<dyn Fn(&Value) -> Vec<Reply> + Send + Sync>;

pub struct MockSocket {
    pub url: String,
    received: Arc<Mutex<Vec<Value>>>,
}

impl MockSocket {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&Value) -> Vec<Reply> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let responder: Responder = Arc::new(responder);
        let received = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&received);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&responder), Arc::clone(&log)));
            }
        });

        Self { url, received }
    }

    /// Every frame received so far, across connections
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }

    /// Command names received so far
    pub fn commands(&self) -> Vec<String> {
        self.received()
            .iter()
            .map(|frame| command(frame).to_string())
            .collect()
    }

    /// Last frame carrying `name`
    pub fn last(&self, name: &str) -> Option<Value> {
        self.received()
            .into_iter()
            .rev()
            .find(|frame| command(frame) == name)
    }
}

async fn serve(stream: TcpStream, responder: Responder, received: Arc<Mutex<Vec<Value>>>) {
    let Ok(socket) = accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let close = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || close {
                break;
            }
        }
    });

    while let Some(Ok(message)) = source.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let frame: Value = serde_json::from_str(&text).unwrap();
        received.lock().push(frame.clone());

        for reply in responder(&frame) {
            match reply {
                Reply::Frame(value) => {
                    let _ = tx.send(Message::Text(value.to_string()));
                }
                Reply::Delayed(delay, value) => {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(Message::Text(value.to_string()));
                    });
                }
                Reply::Raw(text) => {
                    let _ = tx.send(Message::Text(text));
                }
                Reply::Close => {
                    let _ = tx.send(Message::Close(None));
                }
            }
        }
    }

    drop(tx);
    let _ = writer.await;
}

pub fn command(frame: &Value) -> &str {
    frame["command"].as_str().unwrap_or_default()
}

pub fn reply(value: Value) -> Vec<Reply> {
    vec![Reply::Frame(value)]
}

/// Accepts any password and acknowledges HELLO; silent otherwise
pub fn vendor(frame: &Value) -> Vec<Reply> {
    match command(frame) {
        "VALIDATE_PASSWORD" => reply(json!({
            "object": "STATUS_PASSWORD",
            "accepted": true,
            "token": TOKEN,
        })),
        "HELLO" => reply(json!({"object": "HELLO", "success": true})),
        _ => Vec::new(),
    }
}

/// Passes the secret through readable, prefixed with the key
pub struct PlainEncryptor;

impl CredentialEncryptor for PlainEncryptor {
    fn encrypt(&self, secret: &str, key: &str) -> Result<String> {
        Ok(format!("{}:{}", key, secret))
    }
}

pub fn config(server: &MockSocket) -> ClientConfig {
    ClientConfig::new()
        .with_socket_url(&server.url)
        .with_receive_timeout(Duration::from_secs(2))
        .with_action_timeout(Duration::from_secs(2))
        .with_close_timeout(Duration::from_secs(1))
}

pub fn client(server: &MockSocket) -> BlueCurrentClient {
    BlueCurrentClient::with_config("user@example.com", "secret", config(server))
        .with_encryptor(PlainEncryptor)
}
