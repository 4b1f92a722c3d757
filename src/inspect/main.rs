//! Command-line inspection of parcel maps.
//!
//! Loads a map file or package and prints its GeoJSON, its attribute
//! table or the parcels adjacent to one parcel. Several files can also be
//! loaded together as layers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use parcelmap::config::Config;
use parcelmap::{
    find_adjacent, AdjacencyIndex, AdjacencyMethod, FeatureCollection, MapLoader, MapSession,
};

#[derive(Parser, Debug)]
#[command(name = "inspect")]
#[command(about = "Inspect parcel maps and parcel adjacency")]
struct Args {
    /// Optional TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the map as GeoJSON
    Export {
        /// Vector file or package
        file: PathBuf,
    },

    /// Print the indices of parcels adjacent to one parcel
    Adjacent {
        /// Vector file or package
        file: PathBuf,

        /// Index of the selected parcel
        #[arg(allow_negative_numbers = true)]
        index: i64,

        /// touches, intersects or overlaps
        #[arg(short, long, default_value = "touches")]
        method: String,

        /// Use an R-tree index instead of a full scan
        #[arg(long)]
        indexed: bool,
    },

    /// Print the attribute table as JSON
    Attributes {
        /// Vector file or package
        file: PathBuf,
    },

    /// Load several files as layers of one map and print the layer summary
    Layers {
        /// Vector files or packages
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for results
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    let mut session = MapSession::new(MapLoader::new(config.loader));

    match args.command {
        Command::Export { file } => {
            let collection = load(&mut session, &file)?;
            println!("{}", collection.to_geojson_string()?);
        }
        Command::Adjacent {
            file,
            index,
            method,
            indexed,
        } => {
            let collection = load(&mut session, &file)?;
            let method = AdjacencyMethod::from_name(&method);

            // Negative indices select nothing
            let adjacent = match usize::try_from(index) {
                Ok(selected) if indexed => {
                    AdjacencyIndex::build(collection).find_adjacent(selected, method)
                }
                Ok(selected) => find_adjacent(collection, selected, method),
                Err(_) => Vec::new(),
            };

            info!(
                "Parcel {}: {} adjacent parcels ({})",
                index,
                adjacent.len(),
                method
            );
            println!("{}", serde_json::to_string(&adjacent)?);
        }
        Command::Attributes { file } => {
            let collection = load(&mut session, &file)?;
            println!("{}", serde_json::to_string_pretty(&collection.attributes())?);
        }
        Command::Layers { files } => {
            let layers = session
                .load_layers(Path::new("."), &files)
                .context("No valid geospatial files could be loaded")?;
            for layer in &layers.layers {
                info!("Layer {}: {} features", layer.name, layer.feature_count);
            }
            println!("{}", serde_json::to_string(&layers)?);
        }
    }

    Ok(())
}

fn load<'a>(session: &'a mut MapSession, file: &Path) -> Result<&'a FeatureCollection> {
    session
        .try_load(file)
        .with_context(|| format!("Failed to load {}", file.display()))
}
