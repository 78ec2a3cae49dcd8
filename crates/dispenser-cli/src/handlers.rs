//! Built-in handlers available to `dispenser start -t QUEUE HANDLER`.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::info;

use dispenser_core::typed::HandlerRegistry;
use dispenser_core::{Batch, BatchHandler, DispenserClient, HandlerError, QueueName, QueueStore};

const FORWARD_PREFIX: &str = "forward:";

/// Logs every batch at info level.
pub struct LogHandler;

#[async_trait]
impl BatchHandler for LogHandler {
    fn name(&self) -> &str {
        "log"
    }

    async fn handle(&self, batch: Batch) -> Result<(), HandlerError> {
        info!(
            queue = %batch.queue(),
            batch_id = %batch.id(),
            items = %serde_json::Value::from(batch.items().to_vec()),
            "Batch received"
        );
        Ok(())
    }
}

/// Writes every batch to stdout as one JSON array per line.
pub struct PrintHandler;

impl PrintHandler {
    fn render(batch: &Batch) -> Result<String, serde_json::Error> {
        serde_json::to_string(batch.items())
    }
}

#[async_trait]
impl BatchHandler for PrintHandler {
    fn name(&self) -> &str {
        "print"
    }

    async fn handle(&self, batch: Batch) -> Result<(), HandlerError> {
        let line = Self::render(&batch)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}")?;
        Ok(())
    }
}

pub struct NoopHandler;

#[async_trait]
impl BatchHandler for NoopHandler {
    fn name(&self) -> &str {
        "noop"
    }

    async fn handle(&self, _batch: Batch) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Always fails. Useful to see what the error policy does.
pub struct FailHandler;

#[async_trait]
impl BatchHandler for FailHandler {
    fn name(&self) -> &str {
        "fail"
    }

    async fn handle(&self, batch: Batch) -> Result<(), HandlerError> {
        Err(format!("rejected {} items on purpose", batch.len()).into())
    }
}

/// Pushes the whole batch as a single entry onto another queue.
pub struct ForwardHandler {
    name: String,
    target: QueueName,
    client: DispenserClient,
}

impl ForwardHandler {
    pub fn new(target: QueueName, store: Arc<dyn QueueStore>) -> Self {
        Self {
            name: format!("{FORWARD_PREFIX}{target}"),
            target,
            client: DispenserClient::new(store),
        }
    }
}

#[async_trait]
impl BatchHandler for ForwardHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, batch: Batch) -> Result<(), HandlerError> {
        self.client.add(self.target.clone(), batch.items()).await?;
        Ok(())
    }
}

pub fn builtin_registry() -> Result<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(LogHandler))?;
    registry.register(Arc::new(PrintHandler))?;
    registry.register(Arc::new(NoopHandler))?;
    registry.register(Arc::new(FailHandler))?;
    Ok(registry)
}

/// Resolve a handler name given on the command line or in the config file.
pub fn resolve(
    registry: &HandlerRegistry,
    name: &str,
    store: &Arc<dyn QueueStore>,
) -> Result<Arc<dyn BatchHandler>> {
    if let Some(target) = name.strip_prefix(FORWARD_PREFIX) {
        if target.is_empty() {
            bail!("forward handler needs a target queue, e.g. forward:results");
        }
        return Ok(Arc::new(ForwardHandler::new(QueueName::new(target), Arc::clone(store))));
    }
    registry
        .resolve(name)
        .with_context(|| format!("unknown handler '{name}'"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use dispenser_core::impls::InMemoryQueueStore;

    fn batch() -> Batch {
        Batch::new(QueueName::new("q1"), vec![json!(1), json!({"b": 2, "a": "é"})])
    }

    fn store() -> Arc<dyn QueueStore> {
        Arc::new(InMemoryQueueStore::new())
    }

    #[test]
    fn registry_holds_builtins() {
        let registry = builtin_registry().unwrap();
        assert_eq!(registry.names(), vec!["fail", "log", "noop", "print"]);
    }

    #[test]
    fn resolve_unknown_handler() {
        let registry = builtin_registry().unwrap();
        let err = resolve(&registry, "mystery", &store()).err().unwrap();
        assert!(format!("{err:#}").contains("mystery"));
    }

    #[test]
    fn resolve_forward_requires_target() {
        let registry = builtin_registry().unwrap();
        assert!(resolve(&registry, "forward:", &store()).is_err());
        let handler = resolve(&registry, "forward:out", &store()).unwrap();
        assert_eq!(handler.name(), "forward:out");
    }

    #[test]
    fn print_renders_batch_as_one_line() {
        assert_eq!(PrintHandler::render(&batch()).unwrap(), r#"[1,{"a":"é","b":2}]"#);
    }

    #[tokio::test]
    async fn fail_handler_fails() {
        assert!(FailHandler.handle(batch()).await.is_err());
    }

    #[tokio::test]
    async fn forward_pushes_batch_as_single_entry() {
        let memory = InMemoryQueueStore::new();
        let store: Arc<dyn QueueStore> = Arc::new(memory.clone());
        let registry = builtin_registry().unwrap();

        let handler = resolve(&registry, "forward:out", &store).unwrap();
        handler.handle(batch()).await.unwrap();

        assert_eq!(
            memory.contents(&QueueName::new("out")).await,
            vec![r#"[1,{"a":"é","b":2}]"#]
        );
    }
}
