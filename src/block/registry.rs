use std::collections::BTreeMap;

use super::Block;
use super::builtin;
use crate::error::{BarError, BlockResult};
use crate::logging::Logger;
use crate::theme::SharedConfig;

/// Inputs available while a block is being constructed.
#[derive(Debug, Clone)]
pub struct BlockContext {
    pub id: usize,
    pub shared: SharedConfig,
    pub logger: Logger,
}

/// Builds a block from its kind-specific configuration keys.
pub type BlockFactory = fn(&BlockContext, toml::Table) -> BlockResult<Box<dyn Block>>;

/// Block kinds by name.
#[derive(Clone, Default)]
pub struct BlockRegistry {
    factories: BTreeMap<String, BlockFactory>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `text`, `time` and `custom`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register("text", builtin::text_factory)
            .register("time", builtin::time_factory)
            .register("custom", builtin::custom_factory);
        registry
    }

    pub fn register(&mut self, kind: impl Into<String>, factory: BlockFactory) -> &mut Self {
        self.factories.insert(kind.into(), factory);
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn build(
        &self,
        kind: &str,
        ctx: &BlockContext,
        params: toml::Table,
    ) -> Result<Box<dyn Block>, BarError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| BarError::UnknownBlock(kind.to_string()))?;
        factory(ctx, params).map_err(|source| BarError::block(kind, source))
    }
}

impl std::fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlockError;

    fn ctx() -> BlockContext {
        BlockContext {
            id: 0,
            shared: SharedConfig::default(),
            logger: Logger::disabled(),
        }
    }

    #[test]
    fn builtin_kinds_are_registered() {
        let registry = BlockRegistry::with_builtin();
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["custom", "text", "time"]);
    }

    #[test]
    fn unknown_kind_is_reported() {
        let registry = BlockRegistry::with_builtin();
        assert!(matches!(
            registry.build("weather", &ctx(), toml::Table::new()),
            Err(BarError::UnknownBlock(kind)) if kind == "weather"
        ));
    }

    #[test]
    fn compile_errors_fail_construction() {
        let registry = BlockRegistry::with_builtin();
        let params: toml::Table = toml::from_str("format = \"{unclosed\"").unwrap();
        assert!(matches!(
            registry.build("text", &ctx(), params),
            Err(BarError::Block {
                source: BlockError::Compile(_),
                ..
            })
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let registry = BlockRegistry::with_builtin();
        let params: toml::Table = toml::from_str("colour = 3").unwrap();
        assert!(matches!(
            registry.build("time", &ctx(), params),
            Err(BarError::Block {
                source: BlockError::Config(_),
                ..
            })
        ));
    }
}
