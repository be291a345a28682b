//! Worldtomap command - print the tile containing a world position.

use std::path::PathBuf;

use mapexport::coord::WorldCoords;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the worldtomap command.
pub struct WorldToMapArgs {
    pub world: String,
    pub map: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub zoom: u8,
}

pub fn run(config_path: Option<PathBuf>, args: WorldToMapArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    let service = runner.create_service()?;

    let position = WorldCoords::new(args.x, args.y, args.z);
    let tile = service.compute_tile(&args.world, &args.map, position, args.zoom)?;
    println!("{} is in tile {}", position, tile);
    Ok(())
}
