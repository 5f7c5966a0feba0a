use restbind::tracing::setup_tracing;
use restbind::{Event, EventKind, QueryParams};
use restbind_sample::lifecycle::{BikeShop, ShopError};
use restbind_sample::model::Bike;
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), ShopError> {
    setup_tracing();

    info!("Starting bike shop");
    let shop = BikeShop::new();

    shop.seed([
        Bike::new("Slash", "trek"),
        Bike::new("Remedy", "trek"),
        Bike::new("Reign", "giant"),
        Bike::new("Trance", "giant"),
    ])
    .await?;

    let bikes = shop
        .bikes
        .collection(QueryParams::from([("brand", "trek")]));
    bikes.on(EventKind::AfterAdd, |event| {
        if let Event::AfterAdd { record, index } = event {
            info!(index, model = ?record.attributes().model, "Bike added");
        }
    });
    bikes.on(EventKind::AfterFetchError, |event| {
        if let Event::AfterFetchError { error, .. } = event {
            error!(%error, "Listing failed");
        }
    });

    let span = tracing::info_span!("listing");
    async {
        bikes.fetch(QueryParams::new()).wait().await?;
        info!(count = bikes.len(), "Trek bikes listed");

        bikes.refresh(QueryParams::from([("brand", "giant")])).wait().await?;
        info!(count = bikes.len(), "Giant bikes listed");
        Ok::<_, ShopError>(())
    }
    .instrument(span)
    .await?;

    let span = tracing::info_span!("inventory");
    async {
        let trance = bikes.create(Bike::new("Trance X", "giant")).await?;
        info!(id = ?trance.attributes().id, count = bikes.len(), "Bike created");

        if let Some(first) = bikes.get(0) {
            bikes.destroy(&first).await?;
            info!(count = bikes.len(), "Bike sold");
        }
        Ok::<_, ShopError>(())
    }
    .instrument(span)
    .await?;

    shop.shutdown().await?;

    info!("Bike shop closed");
    Ok(())
}
