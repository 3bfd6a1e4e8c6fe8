//! Synchronous façade
//!
//! Drives a [`BlueCurrentClient`] on a private current-thread runtime. Must
//! not be used from inside another tokio runtime.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::rest::{PageIter, TransactionPage};
use crate::socket::BlueCurrentClient;

/// Blocking client
pub struct Client {
    runtime: Runtime,
    inner: Arc<BlueCurrentClient>,
}

impl Client {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        Self::with_config(username, password, ClientConfig::default())
    }

    pub fn with_config(
        username: impl Into<String>,
        password: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        Self::from_async(BlueCurrentClient::with_config(username, password, config))
    }

    /// Wrap an already configured async client
    pub fn from_async(client: BlueCurrentClient) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime,
            inner: Arc::new(client),
        })
    }

    pub fn inner(&self) -> &BlueCurrentClient {
        &self.inner
    }

    /// Obtain a token with a short connect/disconnect cycle
    ///
    /// No-op when a token is already cached.
    pub fn login(&self) -> Result<()> {
        if self.inner.token().is_some() {
            debug!("Token cached, skipping login");
            return Ok(());
        }
        self.run(|_| async { Ok(()) })
    }

    pub fn token(&self) -> Option<String> {
        self.inner.token()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.inner.set_token(token);
    }

    /// Run `operation` inside a connected scope
    ///
    /// Connects (logging in if needed), awaits the operation and disconnects
    /// again whatever the outcome.
    pub fn run<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Arc<BlueCurrentClient>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let client = Arc::clone(&self.inner);
        self.runtime.block_on(async move {
            client.connect().await?;
            let result = operation(Arc::clone(&client)).await;
            client.disconnect().await;
            result
        })
    }

    pub fn get_charge_point_status(&self, evse_id: &str) -> Result<Value> {
        self.runtime
            .block_on(self.inner.get_charge_point_status(evse_id))
    }

    pub fn get_contracts(&self) -> Result<Value> {
        self.runtime.block_on(self.inner.get_contracts())
    }

    pub fn get_grids(&self) -> Result<Value> {
        self.runtime.block_on(self.inner.get_grids())
    }

    pub fn get_transactions(
        &self,
        evse_id: &str,
        newest_first: bool,
        page: u32,
    ) -> Result<TransactionPage> {
        self.runtime
            .block_on(self.inner.get_transactions(evse_id, newest_first, page))
    }

    /// Every transaction of a charge point; pages are fetched as iteration reaches them
    pub fn iterate_transactions<'a>(
        &'a self,
        evse_id: &'a str,
        newest_first: bool,
    ) -> impl Iterator<Item = Result<Value>> + 'a {
        PageIter::new(move |page| self.get_transactions(evse_id, newest_first, page))
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("inner", &self.inner).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    #[test]
    fn test_rest_without_token() {
        let client = Client::new("user", "secret").unwrap();
        assert!(client.token().is_none());
        assert!(matches!(client.get_grids(), Err(ClientError::NotAuthenticated)));
    }

    #[test]
    fn test_iterate_without_token_yields_one_error() {
        let client = Client::new("user", "secret").unwrap();
        let results: Vec<_> = client.iterate_transactions("BCU101", true).collect();

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ClientError::NotAuthenticated)));
    }

    #[test]
    fn test_login_skipped_with_cached_token() {
        let client = Client::new("user", "secret").unwrap();
        client.set_token("abc");

        client.login().unwrap();

        assert_eq!(client.token().as_deref(), Some("abc"));
        assert!(!client.inner().is_connected());
    }
}
