//! Server Module Tests
//!
//! ## Test Scopes
//! - **Registry**: handler registration, dispatch and response-shape checks.
//! - **Runner**: executions answered in time, reported as running, reattached
//!   by id and evicted when never claimed.
//! - **Built-ins**: the commands every node registers.

#[cfg(test)]
mod tests {
    use crate::command::protocol::{CommandReply, ExecuteRequest};
    use crate::command::types::{Arguments, CommandKind, ExecutionId, Response};
    use crate::config::ExecutionConfig;
    use crate::routing::layout::StaticLayout;
    use crate::routing::types::{Server, Shard};
    use crate::server::builtin::{SERVER_INFO_COMMAND, SHARD_LAYOUT_COMMAND, register_builtin};
    use crate::server::registry::{CommandHandlerRegistry, CommandRequest};
    use crate::server::runner::ExecutionManager;

    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn request(command: &str, kind: CommandKind) -> CommandRequest {
        CommandRequest {
            command: command.to_string(),
            kind,
            arguments: Arguments::new(json!({"term": "rust"})),
            shards: vec![Shard::new("docs", "0")],
        }
    }

    fn execute_request(command: &str) -> ExecuteRequest {
        ExecuteRequest {
            command: command.to_string(),
            kind: CommandKind::ServerRead,
            arguments: Arguments::empty(),
            shards: vec![],
        }
    }

    /// A registry with one server read that sleeps for `delay` and counts runs.
    fn slow_registry(delay: Duration, runs: Arc<AtomicUsize>) -> Arc<CommandHandlerRegistry> {
        let registry = CommandHandlerRegistry::new();
        registry.register("slow", move |_request| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                Ok(Response::server_value(json!("done")))
            }
        });
        registry
    }

    fn manager(registry: Arc<CommandHandlerRegistry>, wait_ms: u64) -> Arc<ExecutionManager> {
        ExecutionManager::new(
            Server::new("127.0.0.1", 9000),
            registry,
            ExecutionConfig {
                wait_ms,
                retention_ms: 60_000,
            },
        )
    }

    // ============================================================
    // TEST 1: CommandHandlerRegistry
    // ============================================================

    #[tokio::test]
    async fn test_registry_register_and_execute() {
        // ARRANGE
        let registry = CommandHandlerRegistry::new();
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        // ACT: Register handler
        registry.register("count", move |request| {
            let count = call_count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(Response::server_value(json!(request.shards.len())))
            }
        });

        // ASSERT: Handler is registered
        assert!(registry.has_handler("count"));
        assert_eq!(registry.handler_count(), 1);
        assert_eq!(registry.list_handlers(), vec!["count".to_string()]);

        // ACT: Execute
        let response = registry
            .execute(request("count", CommandKind::ServerRead))
            .await
            .unwrap();

        // ASSERT
        assert_eq!(response, Response::server_value(json!(1)));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_registry_unknown_handler_returns_error() {
        // ARRANGE
        let registry = CommandHandlerRegistry::new();

        // ACT
        let result = registry
            .execute(request("missing", CommandKind::IndexRead))
            .await;

        // ASSERT
        assert!(result.unwrap_err().to_string().contains("Unknown command handler"));
    }

    #[tokio::test]
    async fn test_registry_rejects_wrong_response_shape() {
        // ARRANGE: answers a server value to an index read
        let registry = CommandHandlerRegistry::new();
        registry.register("confused", |_request| async {
            Ok(Response::server_value(json!(1)))
        });

        // ACT
        let result = registry
            .execute(request("confused", CommandKind::IndexRead))
            .await;

        // ASSERT
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_registry_handler_can_fail() {
        // ARRANGE
        let registry = CommandHandlerRegistry::new();
        registry.register("failing", |_request| async {
            Err(anyhow::anyhow!("Intentional error"))
        });

        // ACT
        let result = registry
            .execute(request("failing", CommandKind::ServerRead))
            .await;

        // ASSERT
        assert!(result.unwrap_err().to_string().contains("Intentional error"));
    }

    // ============================================================
    // TEST 2: ExecutionManager
    // ============================================================

    #[tokio::test]
    async fn test_fast_execution_completes_in_first_reply() {
        // ARRANGE
        let runs = Arc::new(AtomicUsize::new(0));
        let manager = manager(slow_registry(Duration::ZERO, runs.clone()), 1_000);

        // ACT
        let reply = manager.execute(execute_request("slow")).await;

        // ASSERT
        assert_eq!(
            reply,
            CommandReply::Complete {
                response: Response::server_value(json!("done"))
            }
        );
        assert_eq!(manager.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_execution_reattached_without_rerun() {
        // ARRANGE: work takes 2.5s, each request waits 1s
        let runs = Arc::new(AtomicUsize::new(0));
        let manager = manager(slow_registry(Duration::from_millis(2_500), runs.clone()), 1_000);

        // ACT: first request times out
        let reply = manager.execute(execute_request("slow")).await;
        let execution_id = match reply {
            CommandReply::Running { execution_id } => execution_id,
            other => panic!("expected running, got {:?}", other),
        };

        // ACT: reconnect until complete
        let mut attempts = 0;
        let response = loop {
            attempts += 1;
            match manager.reconnect(execution_id.clone()).await {
                CommandReply::Running { execution_id: again } => assert_eq!(again, execution_id),
                CommandReply::Complete { response } => break response,
                CommandReply::Failed { message } => panic!("unexpected failure: {}", message),
            }
        };

        // ASSERT: one run, claimed result removed
        assert_eq!(response, Response::server_value(json!("done")));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(attempts, 2);
        assert_eq!(manager.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_unknown_command_and_execution_fail() {
        // ARRANGE
        let manager = manager(CommandHandlerRegistry::new(), 1_000);

        // ACT
        let unknown_command = manager.execute(execute_request("nope")).await;
        let unknown_execution = manager.reconnect(ExecutionId::new()).await;

        // ASSERT
        assert!(matches!(unknown_command, CommandReply::Failed { .. }));
        assert!(matches!(unknown_execution, CommandReply::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclaimed_result_is_evicted_after_retention() {
        // ARRANGE: work outlives the wait window, nobody reconnects
        let runs = Arc::new(AtomicUsize::new(0));
        let manager = manager(slow_registry(Duration::from_secs(2), runs), 1_000);
        let reply = manager.execute(execute_request("slow")).await;
        assert!(matches!(reply, CommandReply::Running { .. }));

        // ACT + ASSERT: still running, kept
        assert_eq!(manager.evict_stale(), 0);

        // ACT + ASSERT: finished long ago, dropped
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(manager.evict_stale(), 1);
        assert_eq!(manager.in_flight(), 0);
    }

    // ============================================================
    // TEST 3: Built-in commands
    // ============================================================

    #[tokio::test]
    async fn test_shard_layout_answers_only_local_shards() {
        // ARRANGE
        let local = Server::new("127.0.0.1", 9000);
        let layout = Arc::new(StaticLayout::from_assignments([
            (local.clone(), vec![Shard::new("docs", "0")]),
            (Server::new("127.0.0.1", 9001), vec![Shard::new("docs", "1")]),
        ]));
        let registry = CommandHandlerRegistry::new();
        let manager = ExecutionManager::new(local, registry.clone(), ExecutionConfig::default());
        register_builtin(&manager, layout);

        let mut req = request(SHARD_LAYOUT_COMMAND, CommandKind::IndexRead);
        req.shards = vec![Shard::new("docs", "0"), Shard::new("docs", "1")];

        // ACT
        let response = registry.execute(req).await.unwrap();

        // ASSERT
        let values = response.into_shard_values("local").unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[&Shard::new("docs", "0")], json!("127.0.0.1:9000"));
    }

    #[tokio::test]
    async fn test_server_info_reports_local_tables() {
        // ARRANGE
        let local = Server::new("127.0.0.1", 9000);
        let layout = Arc::new(StaticLayout::from_assignments([(
            local.clone(),
            vec![Shard::new("docs", "0"), Shard::new("logs", "0")],
        )]));
        let registry = CommandHandlerRegistry::new();
        let manager = ExecutionManager::new(local, registry.clone(), ExecutionConfig::default());
        register_builtin(&manager, layout);

        // ACT
        let response = registry
            .execute(request(SERVER_INFO_COMMAND, CommandKind::ServerRead))
            .await
            .unwrap();

        // ASSERT
        let value = response.into_server_value("local").unwrap();
        assert_eq!(value["shards"], 2);
        assert_eq!(value["tables"], json!(["docs", "logs"]));
        assert_eq!(value["executions_in_flight"], 0);
    }
}
