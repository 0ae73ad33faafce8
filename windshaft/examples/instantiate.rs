use std::sync::Arc;

use windshaft::{
    CartoLayer, FeatureEventKind, LayerGroupBuilder, LayerGroupView, RawFeatureEvent, TileUrls,
};

struct PrintingView;

impl LayerGroupView for PrintingView {
    fn repaint(&self, urls: &TileUrls) {
        for url in &urls.tiles {
            log::info!("Tiles: {url}");
        }
        for (index, grids) in &urls.grids {
            log::info!("Grids of layer {index}: {grids:?}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let user_name = std::env::var("CARTO_USER").unwrap_or_else(|_| "cartojs-test".into());
    let mut builder = LayerGroupBuilder::new()
        .with_url_template("https://{user}.carto.com")
        .with_user_name(user_name)
        .with_layer(
            CartoLayer::mapnik(
                "select * from ne_10m_populated_places_simple",
                "#layer { marker-width: 7; marker-fill: #EE4D5A; marker-line-color: #FFFFFF; }",
            )
            .with_option("interactivity", "cartodb_id"),
        );
    if let Ok(api_key) = std::env::var("CARTO_API_KEY") {
        builder = builder.with_api_key(api_key);
    }

    let layer_group = builder.build()?;
    layer_group.on_feature_event(|event| {
        log::info!(
            "{:?} on layer {}: {}",
            event.kind,
            event.layer.id(),
            event.data
        );
    });

    layer_group.add_to(Arc::new(PrintingView));
    layer_group.settled().await?;

    layer_group.forward_feature_event(RawFeatureEvent {
        kind: FeatureEventKind::Click,
        layer_index: 0,
        position: None,
        data: serde_json::json!({ "cartodb_id": 1 }),
    });

    let attributes = layer_group.fetch_attributes(0, 1).await?;
    log::info!("Attributes of feature 1: {attributes}");

    Ok(())
}
