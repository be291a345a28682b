//! MapExport CLI - Command-line interface
//!
//! This binary drives the MapExport library: scheduled exports, one-off
//! exports and coordinate lookups against a live web map.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mapexport")]
#[command(version = mapexport::VERSION)]
#[command(about = "Periodic change-aware exports of live web map tiles", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.mapexport/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the export timer and accept console commands on stdin
    ///
    /// Console commands: now, reload, debug, quit.
    Run,

    /// Run every configured export once and exit
    Now,

    /// Export the single tile containing a world position
    Tile {
        world: String,
        map: String,
        /// World X
        #[arg(allow_hyphen_values = true)]
        x: i32,
        /// World Z
        #[arg(allow_hyphen_values = true)]
        z: i32,
        zoom: u8,
    },

    /// Print the tile containing a world position
    Worldtomap {
        world: String,
        map: String,
        #[arg(allow_hyphen_values = true)]
        x: i32,
        #[arg(allow_hyphen_values = true)]
        y: i32,
        #[arg(allow_hyphen_values = true)]
        z: i32,
        #[arg(default_value = "0")]
        zoom: u8,
    },

    /// Print the loaded worlds, maps and exports
    Debug,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run => commands::run::run(cli.config),
        Commands::Now => commands::now::run(cli.config),
        Commands::Tile {
            world,
            map,
            x,
            z,
            zoom,
        } => commands::tile::run(cli.config, commands::tile::TileArgs { world, map, x, z, zoom }),
        Commands::Worldtomap {
            world,
            map,
            x,
            y,
            z,
            zoom,
        } => commands::worldtomap::run(
            cli.config,
            commands::worldtomap::WorldToMapArgs {
                world,
                map,
                x,
                y,
                z,
                zoom,
            },
        ),
        Commands::Debug => commands::debug::run(cli.config),
    };

    if let Err(e) = result {
        e.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_tile_with_negative_coordinates() {
        let cli = Cli::try_parse_from(["mapexport", "tile", "world", "flat", "-100", "-250", "2"])
            .unwrap();
        match cli.command {
            Commands::Tile { x, z, zoom, .. } => assert_eq!((x, z, zoom), (-100, -250, 2)),
            _ => panic!("expected tile command"),
        }
    }

    #[test]
    fn test_worldtomap_zoom_defaults_to_zero() {
        let cli = Cli::try_parse_from(["mapexport", "worldtomap", "world", "flat", "1", "64", "2"])
            .unwrap();
        match cli.command {
            Commands::Worldtomap { zoom, .. } => assert_eq!(zoom, 0),
            _ => panic!("expected worldtomap command"),
        }
    }

    #[test]
    fn test_global_config_option() {
        let cli =
            Cli::try_parse_from(["mapexport", "debug", "--config", "/tmp/mapexport.ini"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/mapexport.ini")));
    }
}
