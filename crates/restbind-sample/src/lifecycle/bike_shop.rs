use crate::model::Bike;
use crate::server::{ResourceServer, ServerConfig, ServerTransport};
use restbind::{ModelType, Record, RestError, RestResult};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    #[error(transparent)]
    Rest(#[from] RestError),
    #[error("server task failed: {0}")]
    ServerTask(String),
}

/// A running bike shop: the resource server plus the `Bike` model type bound to it.
///
/// # Example
///
/// ```rust
/// use restbind::QueryParams;
/// use restbind_sample::lifecycle::BikeShop;
/// use restbind_sample::model::Bike;
///
/// #[tokio::main]
/// async fn main() -> Result<(), restbind_sample::lifecycle::ShopError> {
///     let shop = BikeShop::new();
///     shop.seed([Bike::new("Slash", "trek"), Bike::new("Reign", "giant")]).await?;
///
///     let trek = shop.bikes.collection(QueryParams::from([("brand", "trek")]));
///     trek.fetch(QueryParams::new()).wait().await?;
///     assert_eq!(trek.len(), 1);
///
///     shop.shutdown().await
/// }
/// ```
pub struct BikeShop {
    /// Model type for every collection and record of the shop.
    pub bikes: ModelType<Bike>,
    server: ServerTransport,
    handle: JoinHandle<()>,
}

impl Default for BikeShop {
    fn default() -> Self {
        Self::new()
    }
}

impl BikeShop {
    /// Starts a shop with the default [`ServerConfig`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        info!(path = %config.path, buffer_size = config.buffer_size, "Starting shop");
        let (server, transport) = ResourceServer::new(config);
        let handle = tokio::spawn(server.run());
        let bikes = ModelType::<Bike>::builder(transport.path(), Arc::new(transport.clone())).build();
        Self {
            bikes,
            server: transport,
            handle,
        }
    }

    /// Saves each bike to the server, in order, and returns the persisted records.
    pub async fn seed(&self, bikes: impl IntoIterator<Item = Bike>) -> RestResult<Vec<Record<Bike>>> {
        let mut seeded = Vec::new();
        for bike in bikes {
            let record = self.bikes.build(bike);
            record.save().await?;
            seeded.push(record);
        }
        info!(count = seeded.len(), "Seeded");
        Ok(seeded)
    }

    /// Stops the server and waits for its task to finish.
    pub async fn shutdown(self) -> Result<(), ShopError> {
        info!("Shutting down shop...");
        self.server.shutdown().await;
        drop(self.bikes);

        self.handle.await.map_err(|e| {
            error!(error = %e, "Server task failed");
            ShopError::ServerTask(e.to_string())
        })?;

        info!("Shop shut down");
        Ok(())
    }
}
