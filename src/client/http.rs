//! HTTP transport for remote command execution.
//!
//! A single `reqwest::Client` (and its connection pool) is shared by every
//! handle. The pool keeps idle handles per server and verifies liveness with a
//! ping on checkout; the ping is the only request that is ever retried.

use super::{CallError, ConnectionPool, RemoteClient};
use crate::command::protocol::{
    CommandReply, ENDPOINT_COMMAND_EXECUTE, ENDPOINT_COMMAND_RECONNECT, ENDPOINT_PING,
    ExecuteRequest, ReconnectRequest,
};
use crate::command::types::{Arguments, CommandKind, ExecutionId, Response};
use crate::config::ClientConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::routing::types::{Server, Shard};

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub struct HttpCommandClient {
    server: Server,
    http_client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpCommandClient {
    pub fn new(server: Server, http_client: reqwest::Client, request_timeout: Duration) -> Self {
        Self {
            server,
            http_client,
            request_timeout,
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("http://{}{}", self.server, endpoint)
    }

    async fn post_reply<T: serde::Serialize>(
        &self,
        endpoint: &str,
        payload: &T,
    ) -> Result<Response, CallError> {
        let response = self
            .http_client
            .post(self.url(endpoint))
            .json(payload)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| CallError::Failed(format!("transport error: {}", e)))?;

        let status = response.status();
        let reply: CommandReply = response
            .json()
            .await
            .map_err(|e| CallError::Failed(format!("bad reply (HTTP {}): {}", status, e)))?;

        match reply {
            CommandReply::Complete { response } => Ok(response),
            CommandReply::Running { execution_id } => Err(CallError::StillRunning(execution_id)),
            CommandReply::Failed { message } => Err(CallError::Failed(message)),
        }
    }

    /// Liveness check with jittered exponential backoff.
    pub async fn ping(&self, timeout: Duration, attempts: usize) -> ClusterResult<()> {
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            let response = self
                .http_client
                .get(self.url(ENDPOINT_PING))
                .timeout(timeout)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    return Err(ClusterError::Connection {
                        server: self.server.to_string(),
                        message: format!("ping returned {}", resp.status()),
                    });
                }
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(ClusterError::Connection {
                            server: self.server.to_string(),
                            message: e.to_string(),
                        });
                    }
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(ClusterError::Connection {
            server: self.server.to_string(),
            message: "ping attempts exhausted".to_string(),
        })
    }
}

#[async_trait]
impl RemoteClient for HttpCommandClient {
    fn server(&self) -> &Server {
        &self.server
    }

    async fn execute(
        &self,
        command: &str,
        kind: CommandKind,
        arguments: &Arguments,
        shards: &[Shard],
    ) -> Result<Response, CallError> {
        let request = ExecuteRequest {
            command: command.to_string(),
            kind,
            arguments: arguments.clone(),
            shards: shards.to_vec(),
        };
        self.post_reply(ENDPOINT_COMMAND_EXECUTE, &request).await
    }

    async fn reconnect(&self, execution_id: &ExecutionId) -> Result<Response, CallError> {
        let request = ReconnectRequest {
            execution_id: execution_id.clone(),
        };
        self.post_reply(ENDPOINT_COMMAND_RECONNECT, &request).await
    }
}

/// Pool of HTTP command clients keyed by server.
pub struct HttpConnectionPool {
    http_client: reqwest::Client,
    idle: DashMap<Server, Vec<Arc<dyn RemoteClient>>>,
    checked_out: AtomicUsize,
    config: ClientConfig,
}

impl HttpConnectionPool {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            idle: DashMap::new(),
            checked_out: AtomicUsize::new(0),
            config,
        }
    }

    pub fn checked_out(&self) -> usize {
        self.checked_out.load(Ordering::SeqCst)
    }

    pub fn idle_count(&self, server: &Server) -> usize {
        self.idle.get(server).map(|clients| clients.len()).unwrap_or(0)
    }

    fn release(&self) {
        let _ = self
            .checked_out
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

#[async_trait]
impl ConnectionPool for HttpConnectionPool {
    async fn get_client(&self, server: &Server) -> ClusterResult<Arc<dyn RemoteClient>> {
        let reused = self
            .idle
            .get_mut(server)
            .and_then(|mut clients| clients.pop());

        let client = match reused {
            Some(client) => client,
            None => {
                let client = HttpCommandClient::new(
                    server.clone(),
                    self.http_client.clone(),
                    self.config.request_timeout(),
                );
                client
                    .ping(self.config.ping_timeout(), self.config.ping_attempts)
                    .await?;
                tracing::debug!("Opened client for {}", server);
                Arc::new(client) as Arc<dyn RemoteClient>
            }
        };

        self.checked_out.fetch_add(1, Ordering::SeqCst);
        Ok(client)
    }

    fn return_client(&self, server: &Server, client: Arc<dyn RemoteClient>) {
        self.release();
        let mut clients = self.idle.entry(server.clone()).or_default();
        if clients.len() < self.config.max_idle_per_server {
            clients.push(client);
        }
    }

    fn discard_client(&self, server: &Server, client: Arc<dyn RemoteClient>) {
        self.release();
        tracing::debug!("Discarding client for {}", server);
        drop(client);
    }
}
