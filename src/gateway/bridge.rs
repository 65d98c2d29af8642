//! UNIX socket client for the messaging bridge process.
//!
//! `authorize`, `contacts` and `send_text` each open a connection, write one
//! NDJSON request and read one NDJSON response. `subscribe` keeps its
//! connection open and streams one update per line after the acknowledgement.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial implementation

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::protocol::{Request, Response};
use super::{Account, ContactList, Gateway, GatewayError, Login, Update, UserId};

/// Updates buffered between the socket reader and the dispatcher.
const UPDATE_BUFFER: usize = 256;

/// Gateway backed by a bridge process on a UNIX socket.
pub struct BridgeGateway {
    socket_path: PathBuf,
    timeout: Duration,
}

impl BridgeGateway {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn connect(&self) -> Result<UnixStream, GatewayError> {
        UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| GatewayError::Unavailable {
                path: self.socket_path.clone(),
                source,
            })
    }

    /// One request, one response, bounded by the configured timeout.
    async fn call(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let request = Request::new(method, params);
        debug!(method, id = %request.id, "bridge request");

        let exchange = async {
            let stream = self.connect().await?;
            let (reader, mut writer) = stream.into_split();
            writer.write_all(request.to_ndjson_line()?.as_bytes()).await?;
            writer.flush().await?;

            let mut reader = BufReader::new(reader);
            read_response(&mut reader, &request.id).await
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| GatewayError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl Gateway for BridgeGateway {
    async fn authorize(&self, login: &Login) -> Result<Account, GatewayError> {
        let mut params = serde_json::to_value(login).map_err(GatewayError::Protocol)?;

        match self.call("authorize", params.clone()).await {
            Ok(value) => decode(value),
            Err(GatewayError::Remote { code, .. }) if code == "CODE_REQUIRED" => {
                let code = prompt_login_code().await?;
                if let Some(map) = params.as_object_mut() {
                    map.insert("code".to_string(), Value::String(code));
                }
                decode(self.call("authorize", params).await?)
            }
            Err(e) => Err(e),
        }
    }

    async fn list_contacts(&self, hash: i64) -> Result<ContactList, GatewayError> {
        decode(self.call("contacts", json!({ "hash": hash })).await?)
    }

    async fn send_text(&self, to: UserId, text: &str) -> Result<(), GatewayError> {
        self.call("send_text", json!({ "user_id": to, "text": text }))
            .await
            .map(|_| ())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Update>, GatewayError> {
        let request = Request::new("subscribe", json!({}));

        let handshake = async {
            let stream = self.connect().await?;
            let (reader, mut writer) = stream.into_split();
            writer.write_all(request.to_ndjson_line()?.as_bytes()).await?;
            writer.flush().await?;

            let mut reader = BufReader::new(reader);
            read_response(&mut reader, &request.id).await?;
            Ok::<_, GatewayError>((reader, writer))
        };

        let (reader, writer) = tokio::time::timeout(self.timeout, handshake)
            .await
            .map_err(|_| GatewayError::Timeout(self.timeout))??;

        info!(socket = ?self.socket_path, "subscribed to bridge updates");

        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);
        tokio::spawn(pump_updates(reader, writer, tx));
        Ok(rx)
    }
}

async fn read_response<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    request_id: &str,
) -> Result<Value, GatewayError> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(GatewayError::Closed);
    }

    let response = Response::from_ndjson_line(&line)?;
    if response.id != request_id {
        warn!(expected = request_id, got = %response.id, "bridge answered with a different request id");
    }
    response.into_result()
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(GatewayError::Protocol)
}

/// Forward update lines to the channel until either side goes away.
///
/// The write half is held only to keep the subscription open.
async fn pump_updates(
    mut reader: BufReader<OwnedReadHalf>,
    _writer: OwnedWriteHalf,
    tx: mpsc::Sender<Update>,
) {
    let mut line = String::new();
    loop {
        line.clear();
        let read = tokio::select! {
            _ = tx.closed() => break,
            read = reader.read_line(&mut line) => read,
        };

        match read {
            Ok(0) => {
                info!("bridge closed the update stream");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "failed to read bridge update stream");
                break;
            }
        }

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Update>(&line) {
            Ok(update) => {
                if tx.send(update).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "skipping malformed update line"),
        }
    }
}

/// Ask the operator for the login code sent by the messaging service.
async fn prompt_login_code() -> Result<String, GatewayError> {
    tokio::task::spawn_blocking(|| {
        use std::io::{BufRead, IsTerminal, Write};

        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return Err(GatewayError::Auth(
                "login code required but stdin is not a terminal; run `start --foreground` once to log in"
                    .to_string(),
            ));
        }

        eprint!("Enter the code sent to your phone: ");
        std::io::stderr().flush()?;

        let mut code = String::new();
        stdin.lock().read_line(&mut code)?;
        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(GatewayError::Auth("empty login code".to_string()));
        }
        Ok(code)
    })
    .await
    .map_err(|e| GatewayError::Io(std::io::Error::other(e)))?
}
