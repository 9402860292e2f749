use crate::config::{CheckpointKind, Config};
use crate::memory::{FileCheckpointer, InMemoryCheckpointer};
use crate::traits::Checkpointer;
use anyhow::Result;
use std::sync::Arc;

pub fn create_checkpointer(config: &Config) -> Result<Arc<dyn Checkpointer>> {
    match config.checkpoint {
        CheckpointKind::Memory => Ok(Arc::new(InMemoryCheckpointer::new())),
        CheckpointKind::File => Ok(Arc::new(FileCheckpointer::new(config.threads_dir())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_defaults_to_memory() {
        let checkpointer = create_checkpointer(&Config::default()).unwrap();
        assert_eq!(checkpointer.name(), "memory");
    }
}
