use restbind::{EventKind, FetchStatus, ModelType, QueryParams, RestError};
use restbind_sample::lifecycle::BikeShop;
use restbind_sample::model::Bike;
use restbind_sample::server::ServerConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

async fn stocked_shop() -> BikeShop {
    let shop = BikeShop::new();
    shop.seed([
        Bike::new("Slash", "trek"),
        Bike::new("Reign", "giant"),
        Bike::new("Remedy", "trek"),
    ])
    .await
    .expect("Failed to seed");
    shop
}

/// Full round trip through the real server actor.
#[tokio::test]
async fn test_fetch_refresh_create_destroy() {
    let shop = stocked_shop().await;
    let bikes = shop.bikes.collection(QueryParams::from([("brand", "trek")]));

    bikes.fetch(QueryParams::new()).wait().await.expect("fetch");
    assert_eq!(bikes.len(), 2);
    assert!(bikes.is_resolved());
    let models: Vec<_> = bikes
        .items()
        .iter()
        .map(|b| b.attributes().model.unwrap_or_default())
        .collect();
    assert_eq!(models, vec!["Slash", "Remedy"]);

    // Append semantics across queries.
    bikes
        .fetch(QueryParams::from([("brand", "giant")]))
        .wait()
        .await
        .expect("second fetch");
    assert_eq!(bikes.len(), 3);

    bikes
        .refresh(QueryParams::from([("brand", "giant")]))
        .wait()
        .await
        .expect("refresh");
    assert_eq!(bikes.len(), 1);

    let created = bikes
        .create(Bike::new("Trance", "giant"))
        .await
        .expect("create");
    assert_eq!(created.attributes().id, Some(4));
    assert_eq!(bikes.len(), 2);

    bikes.destroy(&created).await.expect("destroy");
    assert_eq!(bikes.len(), 1);

    // The server agrees.
    bikes.refresh(QueryParams::new()).wait().await.expect("refresh");
    assert_eq!(bikes.len(), 1);

    shop.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn test_saved_changes_show_up_in_a_fresh_listing() {
    let shop = stocked_shop().await;
    let bikes = shop.bikes.collection(QueryParams::new());
    bikes.fetch(QueryParams::new()).wait().await.expect("fetch");

    let reign = bikes.get(1).expect("Reign listed");
    reign.update(|bike| bike.brand = Some("trek".into()));
    reign.save().await.expect("save");

    let trek = shop.bikes.collection(QueryParams::from([("brand", "trek")]));
    trek.fetch(QueryParams::new()).wait().await.expect("fetch");
    assert_eq!(trek.len(), 3);
    assert_eq!(trek.index_where(|b| b.attributes().id == Some(2)), Some(1));
    // Fresh decodes are distinct instances.
    assert_eq!(trek.index_of(&reign), None);

    shop.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn test_custom_path_and_unknown_resources() {
    let shop = BikeShop::with_config(ServerConfig {
        buffer_size: 4,
        path: "/v2/bikes".into(),
    });
    shop.seed([Bike::new("Fuel EX", "trek")]).await.expect("seed");
    assert_eq!(shop.bikes.path(), "/v2/bikes");

    let bikes = shop.bikes.collection(QueryParams::new());
    bikes.fetch(QueryParams::new()).wait().await.expect("fetch");
    assert_eq!(bikes.len(), 1);

    let cars = ModelType::<Bike>::builder("/api/cars", shop.bikes.transport().clone()).build();
    let listing = cars.collection(QueryParams::new());
    let err = listing.fetch(QueryParams::new()).wait().await.unwrap_err();
    assert!(matches!(err, RestError::Transport(ref e) if e.status == Some(404)));
    assert!(listing.is_empty());

    shop.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn test_requests_after_shutdown_fail() {
    let shop = stocked_shop().await;
    let bikes = shop.bikes.collection(QueryParams::new());
    let failures = Arc::new(AtomicUsize::new(0));
    let counter = failures.clone();
    bikes.on(EventKind::AfterFetchError, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    shop.shutdown().await.expect("shutdown");

    let err = bikes.fetch(QueryParams::new()).wait().await.unwrap_err();
    assert!(matches!(err, RestError::Transport(ref e) if e.status.is_none()));
    assert_eq!(bikes.status(), FetchStatus::Failed);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_destroying_an_unsaved_bike_is_rejected() {
    let shop = BikeShop::new();
    let bikes = shop.bikes.collection(QueryParams::new());
    let draft = bikes.build(Bike::new("Stache", "trek"));
    bikes.add(draft.clone());

    assert_eq!(bikes.destroy(&draft).await, Err(RestError::NotPersisted));
    assert_eq!(bikes.len(), 1);

    shop.shutdown().await.expect("shutdown");
}
