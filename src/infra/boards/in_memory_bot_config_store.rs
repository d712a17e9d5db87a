use crate::core::boards::{BoardError, BotConfigStore};
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Default)]
pub struct InMemoryBotConfigStore {
    values: DashMap<String, u64>,
}

impl InMemoryBotConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BotConfigStore for InMemoryBotConfigStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, BoardError> {
        Ok(self.values.get(key).map(|v| *v))
    }

    async fn set(&self, key: &str, value: u64) -> Result<(), BoardError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}
