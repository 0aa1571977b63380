use std::sync::Arc;

use crate::{
    Config,
    auth::{KeyedRateLimiter, build_rate_limiter},
    cache::CacheStore,
    clock::Clock,
    repository::CatalogRepository,
    templates::Templates,
};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogRepository>,
    pub cache: Arc<dyn CacheStore>,
    pub clock: Arc<dyn Clock>,
    pub templates: Templates,
    pub config: Config,
    pub rate_limiter: Arc<KeyedRateLimiter>,
}

impl AppState {
    /// Wire the collaborators together and compile the page templates.
    ///
    /// # Errors
    /// Returns an error if an embedded template fails to compile.
    pub fn new(
        config: Config,
        catalog: Arc<dyn CatalogRepository>,
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, tera::Error> {
        Ok(Self {
            catalog,
            cache,
            clock,
            templates: Templates::new()?,
            rate_limiter: build_rate_limiter(config.rate_limit_per_minute),
            config,
        })
    }
}
