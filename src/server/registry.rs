//! Command Handler Registry
//!
//! Maps command names (e.g. "search") to the async closures that run them on
//! this node. The executing side stays generic: any command a peer sends is
//! dispatched by name, and the handler's response shape is checked against the
//! kind the caller asked for.

use crate::command::types::{Arguments, CommandKind, Response};
use crate::routing::types::Shard;

use anyhow::{Result, bail};
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Everything a handler receives about one execution.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub command: String,
    pub kind: CommandKind,
    pub arguments: Arguments,
    /// Shards the caller expects a value for. Empty for server reads that
    /// cover every local shard.
    pub shards: Vec<Shard>,
}

pub type CommandHandlerFn =
    Arc<dyn Fn(CommandRequest) -> Pin<Box<dyn Future<Output = Result<Response>> + Send>> + Send + Sync>;

#[derive(Default)]
pub struct CommandHandlerRegistry {
    handlers: DashMap<String, CommandHandlerFn>,
}

impl CommandHandlerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `handler` under `name`, replacing any previous one.
    pub fn register<F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(CommandRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send + 'static,
    {
        let handler_fn: CommandHandlerFn = Arc::new(move |request: CommandRequest| {
            Box::pin(handler(request)) as Pin<Box<dyn Future<Output = Result<Response>> + Send>>
        });

        self.handlers.insert(name.to_string(), handler_fn);

        tracing::info!("Registered command handler: {}", name);
    }

    /// Runs the handler registered for `request.command`.
    ///
    /// Fails for unknown commands and for handlers answering with the wrong
    /// response shape.
    pub async fn execute(&self, request: CommandRequest) -> Result<Response> {
        // Clone out of the map so no shard lock is held across the await.
        let Some(handler_fn) = self.handlers.get(&request.command).map(|h| h.value().clone()) else {
            let error = format!("Unknown command handler: {}", request.command);
            tracing::error!("{}", error);
            bail!(error);
        };

        tracing::debug!(
            "Executing command '{}' ({:?}, {} shards, arguments {} bytes)",
            request.command,
            request.kind,
            request.shards.len(),
            request.arguments.encoded_len()
        );

        let kind = request.kind;
        let command = request.command.clone();
        let response = handler_fn(request).await?;
        if response.kind() != kind {
            bail!(
                "Command '{}' answered {:?} to a {:?} request",
                command,
                response.kind(),
                kind
            );
        }
        Ok(response)
    }

    pub fn list_handlers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}
