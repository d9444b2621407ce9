mod ask;
mod config;
mod search;
mod serve;
mod status;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::models::Config;
use crate::services::VectorIndex;

pub use ask::AskArgs;
pub use config::ConfigCommand;
pub use search::SearchArgs;
pub use serve::ServeArgs;
pub use status::StatusArgs;

pub use ask::handle_ask;
pub use config::handle_config;
pub use search::handle_search;
pub use serve::handle_serve;
pub use status::handle_status;

fn load_index(config: &Config) -> Result<Arc<VectorIndex>> {
    let index = VectorIndex::load(&config.index.vectors_path, &config.index.metadata_path)
        .with_context(|| {
            format!(
                "failed to load index from {} and {}",
                config.index.vectors_path.display(),
                config.index.metadata_path.display()
            )
        })?;
    Ok(Arc::new(index))
}
