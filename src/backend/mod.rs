pub mod error;
pub mod library;
pub mod mangadex;
pub mod models;
pub mod source;

use library::DataStore;
use source::SourceRegistry;

/// The data layer views talk to.
#[derive(Clone)]
pub struct Backend {
    pub store: DataStore,
    pub sources: SourceRegistry,
}

impl Backend {
    pub fn new(store: DataStore, sources: SourceRegistry) -> Self {
        Self { store, sources }
    }
}
