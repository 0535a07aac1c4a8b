//! [`NodeRegistry`] – the host's table of node types.
//!
//! Node crates register a factory under a type name; the host instantiates
//! nodes by name when it builds a flow.  The registry is an ordinary value
//! owned by the host, so nothing here is process-global.

use std::collections::HashMap;
use std::sync::Arc;

use hatflow_types::{HatError, RawNodeConfig};
use tracing::debug;

use crate::node::{FlowNode, NodeContext};

/// Builds a node instance from its context and host configuration.
pub type NodeFactory =
    Box<dyn Fn(NodeContext, &RawNodeConfig) -> Arc<dyn FlowNode> + Send + Sync>;

#[derive(Default)]
pub struct NodeRegistry {
    factories: HashMap<String, NodeFactory>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `type_name`.  A previous registration with
    /// the same name is replaced.
    pub fn register(&mut self, type_name: impl Into<String>, factory: NodeFactory) {
        let type_name = type_name.into();
        debug!(type_name = %type_name, "node type registered");
        self.factories.insert(type_name, factory);
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate a node of `type_name`.
    ///
    /// # Errors
    ///
    /// Returns [`HatError::UnknownNodeType`] when nothing is registered under
    /// `type_name`.
    pub fn create(
        &self,
        type_name: &str,
        ctx: NodeContext,
        config: &RawNodeConfig,
    ) -> Result<Arc<dyn FlowNode>, HatError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| HatError::UnknownNodeType(type_name.to_string()))?;
        Ok(factory(ctx, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{EventBus, FlowEvent, Topic};
    use async_trait::async_trait;
    use hatflow_types::Message;

    /// Echoes every inbound message.
    struct EchoNode {
        ctx: NodeContext,
    }

    #[async_trait]
    impl FlowNode for EchoNode {
        fn id(&self) -> &str {
            self.ctx.id()
        }
        fn type_name(&self) -> &str {
            "echo"
        }
        async fn on_input(&self, msg: Message) {
            self.ctx.send(msg);
        }
        async fn close(&self) {}
    }

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register(
            "echo",
            Box::new(|ctx: NodeContext, _: &RawNodeConfig| {
                Arc::new(EchoNode { ctx }) as Arc<dyn FlowNode>
            }),
        );
        registry
    }

    #[tokio::test]
    async fn create_registered_type() {
        let registry = registry();
        let bus = EventBus::default();
        let mut outputs = bus.subscribe_to(Topic::Output);

        let node = registry
            .create("echo", NodeContext::new("echo-1", bus), &RawNodeConfig::default())
            .unwrap();
        assert_eq!(node.id(), "echo-1");
        assert_eq!(node.type_name(), "echo");

        node.on_input(Message::new("ping")).await;
        assert!(matches!(outputs.recv().await.unwrap(), FlowEvent::Output { .. }));
    }

    #[test]
    fn factory_receives_config() {
        let mut registry = NodeRegistry::new();
        registry.register(
            "echo",
            Box::new(|ctx: NodeContext, config: &RawNodeConfig| {
                assert_eq!(config.topic.as_deref(), Some("roof"));
                Arc::new(EchoNode { ctx }) as Arc<dyn FlowNode>
            }),
        );
        let config = RawNodeConfig {
            topic: Some("roof".to_string()),
            ..RawNodeConfig::default()
        };
        let node = registry.create("echo", NodeContext::new("e", EventBus::default()), &config);
        assert!(node.is_ok());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let registry = registry();
        let result = registry.create(
            "thermometer",
            NodeContext::new("t-1", EventBus::default()),
            &RawNodeConfig::default(),
        );
        assert!(matches!(result, Err(HatError::UnknownNodeType(name)) if name == "thermometer"));
    }

    #[test]
    fn type_names_are_sorted() {
        let mut registry = registry();
        registry.register(
            "alpha",
            Box::new(|ctx: NodeContext, _: &RawNodeConfig| {
                Arc::new(EchoNode { ctx }) as Arc<dyn FlowNode>
            }),
        );
        assert!(registry.contains("echo"));
        assert_eq!(registry.type_names(), vec!["alpha", "echo"]);
    }
}
