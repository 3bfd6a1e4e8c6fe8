//! Blue Current socket client
//!
//! Owns one session per credentials pair. `connect` opens the socket, starts
//! the receive loop, logs in when no token is cached and completes the HELLO
//! handshake; `disconnect` tears everything down again. Any number of
//! operations may run concurrently on a connected client, each waiting on its
//! own subscription.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::Stream;
use parking_lot::{Mutex, RwLock};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use super::connection::{Connection, ConnectionHandle};
use super::messages::{command, kind, received_kind, status_kind, Command, InboundMessage};
use super::session::{Session, SessionEvent, SessionState};
use crate::config::ClientConfig;
use crate::crypto::{CredentialEncryptor, SjclEncryptor};
use crate::dates::{self, ACCOUNT_DATE, ISO_DATE};
use crate::error::{ClientError, Result};
use crate::rest::{RestClient, TransactionPage};

/// JSON object returned by most operations
pub type Payload = Map<String, Value>;

/// Username and secret, fixed for the lifetime of a client
pub struct Credentials {
    pub username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Client for the Blue Current charging cloud
pub struct BlueCurrentClient {
    config: ClientConfig,
    credentials: Credentials,
    encryptor: Arc<dyn CredentialEncryptor>,
    session: RwLock<Session>,
    connection: Mutex<Option<Connection>>,
    /// Serializes connect/disconnect
    lifecycle: tokio::sync::Mutex<()>,
    rest: RestClient,
}

impl BlueCurrentClient {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_config(username, password, ClientConfig::default())
    }

    pub fn with_config(
        username: impl Into<String>,
        password: impl Into<String>,
        config: ClientConfig,
    ) -> Self {
        let credentials = Credentials::new(username, password);
        Self {
            session: RwLock::new(Session::new(credentials.username.clone())),
            rest: RestClient::new(&config),
            config,
            credentials,
            encryptor: Arc::new(SjclEncryptor),
            connection: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Replace the credential transform used at login
    pub fn with_encryptor(mut self, encryptor: impl CredentialEncryptor + 'static) -> Self {
        self.encryptor = Arc::new(encryptor);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    /// Current session state; a connection whose receive loop has ended
    /// reports `Disconnected`
    pub fn state(&self) -> SessionState {
        if !self.is_connected() {
            let mut session = self.session.write();
            if session.state != SessionState::Disconnected {
                warn!("Connection lost");
                session.handle_event(SessionEvent::Disconnected);
            }
            return session.state;
        }
        self.session.read().state
    }

    /// Socket open and its receive loop still running
    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .as_ref()
            .map_or(false, Connection::is_alive)
    }

    /// Cached bearer token
    pub fn token(&self) -> Option<String> {
        self.session.read().token().map(str::to_string)
    }

    /// Use a token obtained earlier instead of logging in
    pub fn set_token(&self, token: impl Into<String>) {
        self.session.write().set_token(token);
    }

    /// Forget the cached token; the next connect logs in again
    pub fn clear_token(&self) {
        self.session.write().handle_event(SessionEvent::TokenCleared);
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the session: socket, receive loop, login if needed, HELLO
    ///
    /// On failure everything opened so far is torn down again.
    pub async fn connect(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;

        let stale = match self.connection.lock().as_ref() {
            Some(connection) if connection.is_alive() => {
                debug!("Already connected");
                return Ok(());
            }
            Some(_) => true,
            None => false,
        };
        if stale {
            warn!("Previous connection is dead, reconnecting");
            self.teardown().await;
        }

        info!("Creating BlueCurrent websocket connection");
        let connection = Connection::open(&self.config).await?;
        *self.connection.lock() = Some(connection);
        self.session.write().handle_event(SessionEvent::Connected);

        if let Err(e) = self.handshake().await {
            self.teardown().await;
            return Err(e);
        }
        Ok(())
    }

    /// Leave the connected scope; the token stays cached
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.teardown().await;
    }

    /// Disconnect and forget the token
    pub async fn close(&self) {
        self.disconnect().await;
        self.clear_token();
    }

    async fn handshake(&self) -> Result<()> {
        let needs_login = self.session.read().needs_login();
        if needs_login {
            self.login().await?;
        }
        self.hello().await
    }

    async fn teardown(&self) {
        let connection = self.connection.lock().take();
        if let Some(connection) = connection {
            info!("Closing BlueCurrent connection");
            connection.shutdown(self.config.close_timeout).await;
        }
        self.session.write().handle_event(SessionEvent::Disconnected);
    }

    async fn login(&self) -> Result<()> {
        self.session.write().handle_event(SessionEvent::LoginStarted);

        let password = self
            .encryptor
            .encrypt(self.credentials.password.expose_secret(), &self.config.psk)?;
        let command = Command::new(command::VALIDATE_PASSWORD)
            .with("username", self.credentials.username.clone())
            .with("password", password);

        let mut reply = self
            .request(command, false, kind::STATUS_PASSWORD, self.config.receive_timeout)
            .await?;

        if !reply.is_accepted() {
            error!("Authentication failed");
            self.session.write().handle_event(SessionEvent::LoginRejected);
            return Err(ClientError::AuthenticationFailed(reply.into_inner()));
        }

        let token = match reply.take("token")? {
            Value::String(token) => token,
            _ => {
                return Err(ClientError::MissingField {
                    kind: kind::STATUS_PASSWORD.to_string(),
                    field: "token".to_string(),
                })
            }
        };
        self.session.write().handle_event(SessionEvent::TokenIssued(token));
        Ok(())
    }

    async fn hello(&self) -> Result<()> {
        self.request(Command::new(command::HELLO), true, kind::HELLO, self.config.receive_timeout)
            .await?;
        self.session.write().handle_event(SessionEvent::HelloAcknowledged);
        Ok(())
    }

    // ── Dispatch and correlation ─────────────────────────────────────

    fn handle(&self) -> Result<ConnectionHandle> {
        self.connection
            .lock()
            .as_ref()
            .map(Connection::handle)
            .ok_or(ClientError::NotConnected)
    }

    /// Serialize a command, with the bearer token when `requires_auth`, and write it
    pub async fn send(&self, command: Command, requires_auth: bool) -> Result<()> {
        let handle = self.handle()?;
        self.dispatch(&handle, &command, requires_auth).await
    }

    async fn dispatch(
        &self,
        handle: &ConnectionHandle,
        command: &Command,
        requires_auth: bool,
    ) -> Result<()> {
        let token = match requires_auth {
            true => Some(self.token().ok_or(ClientError::NotAuthenticated)?),
            false => None,
        };
        let frame = command.to_frame(token.as_deref())?;
        debug!(command = command.name(), "Sending command");
        handle.send(frame).await
    }

    /// Wait for the next message of `kind` with the default timeout
    pub async fn receive(&self, kind: &str) -> Result<InboundMessage> {
        self.receive_within(kind, self.config.receive_timeout).await
    }

    /// Wait for the next message of `kind`, failing after `timeout`
    pub async fn receive_within(&self, kind: &str, timeout: Duration) -> Result<InboundMessage> {
        let handle = self.handle()?;
        let mut subscription = handle.subscribe();
        subscription.expect(kind, timeout).await
    }

    /// Send a command and wait for its reply; subscribes before sending
    async fn request(
        &self,
        command: Command,
        requires_auth: bool,
        reply: &str,
        timeout: Duration,
    ) -> Result<InboundMessage> {
        let handle = self.handle()?;
        let mut subscription = handle.subscribe();
        self.dispatch(&handle, &command, requires_auth).await?;
        subscription.expect(reply, timeout).await
    }

    /// Command → `RECEIVED_*` acknowledgment → `STATUS_*` terminal status
    async fn acknowledged(&self, command: Command) -> Result<InboundMessage> {
        let name = command.name().to_string();
        let handle = self.handle()?;
        let mut subscription = handle.subscribe();

        self.dispatch(&handle, &command, true).await?;
        subscription
            .expect(&received_kind(&name), self.config.receive_timeout)
            .await?;
        debug!(command = %name, "Command acknowledged, awaiting status");
        subscription
            .expect(&status_kind(&name), self.config.action_timeout)
            .await
    }

    async fn query(&self, command: Command, reply: &str) -> Result<InboundMessage> {
        self.request(command, true, reply, self.config.receive_timeout)
            .await
    }

    // ── Socket operations ────────────────────────────────────────────

    /// Account information, `first_login_app` parsed as a date
    pub async fn get_account(&self) -> Result<Payload> {
        let reply = self.query(Command::new(command::GET_ACCOUNT), kind::ACCOUNT).await?;
        let formats = dates::formats(&[("first_login_app", ACCOUNT_DATE)]);
        dates::parse_datetime_keys(reply.without_kind(), &formats)
    }

    /// Charge cards, with their dates parsed
    pub async fn get_charge_cards(&self) -> Result<Value> {
        let mut reply = self
            .query(Command::new(command::GET_CHARGE_CARDS), kind::CHARGE_CARDS)
            .await?;
        let formats = dates::formats(&[
            ("date_created", ISO_DATE),
            ("date_modified", ISO_DATE),
            ("date_became_invalid", ISO_DATE),
        ]);
        dates::parse_value(reply.take("cards")?, &formats)
    }

    pub async fn get_charge_points(&self) -> Result<Value> {
        let mut reply = self
            .query(Command::new(command::GET_CHARGE_POINTS), kind::CHARGE_POINTS)
            .await?;
        reply.take("data")
    }

    pub async fn get_charge_point_settings(&self, evse_id: &str) -> Result<Value> {
        let command = Command::new(command::GET_CH_SETTINGS).with("evse_id", evse_id);
        let mut reply = self.query(command, kind::CH_SETTINGS).await?;
        reply.take("data")
    }

    /// Actual and maximum grid currents of the charge point's connection
    pub async fn get_grid_status(&self, evse_id: &str) -> Result<Value> {
        let command = Command::new(command::GET_GRID_STATUS).with("evse_id", evse_id);
        let mut reply = self.query(command, kind::GRID_STATUS).await?;
        reply.take("data")
    }

    pub async fn get_sessions(&self, evse_id: &str) -> Result<Payload> {
        let command = Command::new(command::GET_SESSIONS).with("evse_id", evse_id);
        Ok(self.query(command, kind::SESSIONS).await?.into_inner())
    }

    pub async fn get_status(&self, evse_id: &str) -> Result<Payload> {
        let command = Command::new(command::GET_STATUS).with("evse_id", evse_id);
        Ok(self.query(command, kind::STATUS).await?.into_inner())
    }

    pub async fn get_sustainability_status(&self) -> Result<Payload> {
        let command = Command::new(command::GET_SUSTAINABILITY_STATUS);
        Ok(self
            .query(command, kind::SUSTAINABILITY_STATUS)
            .await?
            .without_kind())
    }

    /// Make a charge point operative (`enabled`) or inoperative
    pub async fn set_status(&self, evse_id: &str, enabled: bool) -> Result<Payload> {
        let name = match enabled {
            true => command::SET_OPERATIVE,
            false => command::SET_INOPERATIVE,
        };
        let command = Command::new(name).with("evse_id", evse_id).with_flow_id();
        Ok(self.acknowledged(command).await?.into_inner())
    }

    pub async fn unlock_connector(&self, evse_id: &str) -> Result<Payload> {
        let command = Command::new(command::UNLOCK_CONNECTOR)
            .with("evse_id", evse_id)
            .with_flow_id();
        Ok(self.acknowledged(command).await?.into_inner())
    }

    pub async fn soft_reset(&self, evse_id: &str) -> Result<Payload> {
        let command = Command::new(command::SOFT_RESET)
            .with("evse_id", evse_id)
            .with_flow_id();
        Ok(self.acknowledged(command).await?.into_inner())
    }

    // ── REST operations ──────────────────────────────────────────────

    fn bearer(&self) -> Result<String> {
        self.token().ok_or(ClientError::NotAuthenticated)
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub async fn get_charge_point_status(&self, evse_id: &str) -> Result<Value> {
        self.rest.get_charge_point_status(&self.bearer()?, evse_id).await
    }

    pub async fn get_contracts(&self) -> Result<Value> {
        self.rest.get_contracts(&self.bearer()?).await
    }

    pub async fn get_grids(&self) -> Result<Value> {
        self.rest.get_grids(&self.bearer()?).await
    }

    pub async fn get_transactions(
        &self,
        evse_id: &str,
        newest_first: bool,
        page: u32,
    ) -> Result<TransactionPage> {
        self.rest
            .get_transactions(&self.bearer()?, evse_id, newest_first, page)
            .await
    }

    /// Every transaction of a charge point, fetched page by page
    pub fn iterate_transactions<'a>(
        &'a self,
        evse_id: &'a str,
        newest_first: bool,
    ) -> impl Stream<Item = Result<Value>> + 'a {
        crate::rest::paginate(move |page| self.get_transactions(evse_id, newest_first, page))
    }
}

impl std::fmt::Debug for BlueCurrentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlueCurrentClient")
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .field("session", &*self.session.read())
            .field("connected", &self.is_connected())
            .finish()
    }
}
