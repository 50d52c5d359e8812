//! EHCPA viewer driver.
//!
//! Runs the headless viewer core against the configured GeoServer,
//! Nominatim and backend, printing what the map UI would show.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ehcpa_common::tile::latlon_to_tile;
use ehcpa_common::{LatLng, LayerGroup, LayerKey};
use ehcpa_viewer::search::SearchStatus;
use ehcpa_viewer::{HeadlessMap, MapSurface, Viewer, ViewerConfig};
use geocoding::zoom_for_place;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "ehcpa-viewer")]
#[command(about = "Headless EHCPA precipitation/SPI map viewer")]
struct Args {
    /// GeoServer WMS endpoint
    #[arg(long, env = "GEOSERVER_DATA_URL")]
    geoserver_url: Option<String>,

    /// Backend download base URL
    #[arg(long, env = "BACKEND_DOWNLOAD_URL")]
    download_url: Option<String>,

    /// Backend dates URL
    #[arg(long, env = "BACKEND_GET_DATES_URL")]
    dates_url: Option<String>,

    /// Nominatim base URL
    #[arg(long, env = "GEOCODER_URL")]
    geocoder_url: Option<String>,

    /// YAML layer catalog replacing the built-in one
    #[arg(long, env = "LAYER_CATALOG_FILE")]
    layer_catalog: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query the enabled layers at a point, as a map click would
    Query {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lng: f64,

        /// Layers to enable instead of the defaults (e.g. PTM,SPI_3)
        #[arg(long, value_delimiter = ',')]
        layers: Vec<String>,
    },

    /// Search a place and optionally select one result
    Search {
        text: String,

        /// Index of the result to select
        #[arg(long)]
        select: Option<usize>,
    },

    /// Download the archive of the enabled layers
    Download {
        #[arg(long, value_delimiter = ',')]
        layers: Vec<String>,

        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Show the data currency dates
    Dates,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_lowercase()));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let mut config = ViewerConfig::from_env().context("Invalid configuration")?;
    if let Some(url) = args.geoserver_url {
        config.geoserver_url = url;
    }
    if let Some(url) = args.download_url {
        config.download_url = url;
    }
    if let Some(url) = args.dates_url {
        config.dates_url = url;
    }
    if let Some(url) = args.geocoder_url {
        config.geocoder_url = url;
    }
    if args.layer_catalog.is_some() {
        config.layer_catalog_file = args.layer_catalog;
    }

    let mut viewer = Viewer::from_config(&config, HeadlessMap::default())
        .context("Failed to initialize viewer")?;
    info!("Viewer ready");

    match args.command {
        Command::Query { lat, lng, layers } => {
            select_layers(&mut viewer, &layers)?;
            let position = LatLng::new(lat, lng);
            viewer.map_mut().fly_to(position, None);
            viewer.zoom_ended();

            let tile = latlon_to_tile(lat, lng, u32::from(viewer.map().zoom()));
            debug!(url = %config.base_tile_url.url_for(tile), "Base map tile under the click");

            let click = viewer.map().click_at(position);
            viewer.click_and_query(click).await;

            if let Some(text) = viewer.panel().coordinates_text() {
                println!("{}", text);
            }
            for row in viewer.panel_rows() {
                println!("{}", row);
            }
        }

        Command::Search { text, select } => {
            viewer.search_input(&text);
            match viewer.search_settled().await {
                Some(SearchStatus::Results) => {
                    for (i, result) in viewer.search().results().iter().enumerate() {
                        let zoom = zoom_for_place(result.place_rank, &result.address_type, &result.name);
                        match zoom {
                            Some(z) => println!("[{}] {} (zoom {})", i, result.label, z),
                            None => println!("[{}] {}", i, result.label),
                        }
                    }
                }
                _ => {
                    if let Some(message) = viewer.search().message() {
                        println!("{}", message);
                    }
                    return Ok(());
                }
            }

            if let Some(index) = select {
                let selection = viewer
                    .select_search_result(index)
                    .ok_or_else(|| anyhow!("No search result at index {}", index))?;
                let center = viewer.map().center();
                println!(
                    "Centro: {} - Zoom: {} - Marcador: {}",
                    center,
                    viewer.map().zoom(),
                    selection.result.label
                );
            }
        }

        Command::Download { layers, output_dir } => {
            select_layers(&mut viewer, &layers)?;
            match viewer.download(&output_dir).await {
                Ok(path) => println!("{}", path.display()),
                Err(alert) => return Err(anyhow!("{}: {}", alert.title, alert.text)),
            }
        }

        Command::Dates => {
            let dates = viewer.dates().await;
            println!(
                "Fecha actual: {} de {} de {}",
                dates.today_day, dates.today_month, dates.today_year
            );
            println!(
                "Última banda: {} de {} de {}",
                dates.last_band_day, dates.last_band_month, dates.last_band_year
            );
            println!("Calibración: {}", dates.calibration_date);
        }
    }

    Ok(())
}

/// Replace the default value layers with `keys`, if any were given.
fn select_layers(viewer: &mut Viewer<HeadlessMap>, keys: &[String]) -> Result<()> {
    if keys.is_empty() {
        return Ok(());
    }
    for group in [LayerGroup::Precipitation, LayerGroup::Spi] {
        viewer.set_group_enabled(group, false)?;
    }
    for key in keys {
        viewer
            .set_layer_enabled(&LayerKey::new(key.trim()), true)
            .with_context(|| format!("Cannot enable layer {}", key))?;
    }
    Ok(())
}
