//! Tile command - export the single tile under a world position.

use std::path::PathBuf;

use mapexport::coord::{WorldCoords, SEA_LEVEL_Y};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the tile command.
pub struct TileArgs {
    pub world: String,
    pub map: String,
    pub x: i32,
    pub z: i32,
    pub zoom: u8,
}

impl TileArgs {
    fn position(&self) -> WorldCoords {
        WorldCoords::new(self.x, SEA_LEVEL_Y, self.z)
    }
}

pub fn run(config_path: Option<PathBuf>, args: TileArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("tile");

    let service = runner.create_service()?;
    let path = service.export_tile(&args.world, &args.map, args.position(), args.zoom)?;
    println!("Saved tile at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_uses_sea_level() {
        let args = TileArgs {
            world: "world".to_string(),
            map: "flat".to_string(),
            x: 10,
            z: -20,
            zoom: 0,
        };
        assert_eq!(args.position(), WorldCoords::new(10, 64, -20));
    }
}
