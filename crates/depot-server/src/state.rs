use std::sync::Arc;

use depot_content::STATIC_CONTENT_ROUTE;
use depot_engine::{DynCombinedStore, LockedAppender};
use depot_sync::MemorySynchronizationStore;
use depot_types::{RouteResolver, RouteTable};

use crate::config::ServerConfig;
use crate::error::ServerResult;

/// Route name of the content upload endpoint handed out after a blob is
/// described.
pub const CONTENT_UPLOAD_ROUTE: &str = "content-upload";

/// Templates for every route the server resolves by name.
pub fn route_table(base_url: &str) -> RouteTable {
    RouteTable::new(base_url)
        .with_route(CONTENT_UPLOAD_ROUTE, "/v1/blobs/byId/{id}/content")
        .with_route(STATIC_CONTENT_ROUTE, "/static/{id}")
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DynCombinedStore>,
    pub appender: Arc<LockedAppender<Arc<DynCombinedStore>, MemorySynchronizationStore>>,
    pub routes: Arc<RouteTable>,
}

impl AppState {
    pub fn new(engine: DynCombinedStore, routes: RouteTable) -> Self {
        let engine = Arc::new(engine);
        let appender = LockedAppender::new(Arc::clone(&engine), MemorySynchronizationStore::new());
        Self {
            engine,
            appender: Arc::new(appender),
            routes: Arc::new(routes),
        }
    }

    /// Assemble the engine described by `config`, wired to this server's
    /// routes.
    pub fn from_config(config: &ServerConfig) -> ServerResult<Self> {
        let routes = route_table(&config.base_url);
        let resolver: Arc<dyn RouteResolver> = Arc::new(routes.clone());
        let engine = config.engine.build(Some(resolver))?;
        Ok(Self::new(engine, routes))
    }
}
