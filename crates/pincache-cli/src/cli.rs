//! Command-line argument parsing.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use pincache_core::{Coordinate, MapRegion, PhotoId, PinId};

pub const USAGE: &str = "\
Usage: pincache <command> [args]

Commands:
  drop <lat> <lon>              Drop a pin and cache photos near it
  more <pin>                    Replace a pin's photos with the next page
  refresh <pin>                 Fetch the pin's current page again
  pins                          List pins
  find <lat> <lon>              Find the pin at a coordinate
  photos <pin>                  List a pin's cached photos
  export <pin> <dir>            Write a pin's photos to a directory
  delete <pin>                  Delete a pin and its photos
  remove-photos <pin> <id>...   Delete selected photos from a pin
  region [<lat> <lon> <dlat> <dlon>]
                                Show or save the map region
  reset                         Delete every pin and photo
";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Drop(Coordinate),
    More(PinId),
    Refresh(PinId),
    Pins,
    Find(Coordinate),
    Photos(PinId),
    Export(PinId, PathBuf),
    Delete(PinId),
    RemovePhotos(PinId, Vec<PhotoId>),
    ShowRegion,
    SetRegion(MapRegion),
    Reset,
    Help,
}

impl Command {
    /// Parse arguments after the program name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

        let command = match (name.as_str(), rest.as_slice()) {
            ("drop", [lat, lon]) => Command::Drop(parse_coordinate(lat, lon)?),
            ("more", [pin]) => Command::More(parse_pin(pin)?),
            ("refresh", [pin]) => Command::Refresh(parse_pin(pin)?),
            ("pins", []) => Command::Pins,
            ("find", [lat, lon]) => Command::Find(parse_coordinate(lat, lon)?),
            ("photos", [pin]) => Command::Photos(parse_pin(pin)?),
            ("export", [pin, dir]) => Command::Export(parse_pin(pin)?, PathBuf::from(dir)),
            ("delete", [pin]) => Command::Delete(parse_pin(pin)?),
            ("remove-photos", [pin, ids @ ..]) if !ids.is_empty() => {
                let ids = ids
                    .iter()
                    .map(|id| parse_id(id).map(PhotoId))
                    .collect::<Result<Vec<_>>>()?;
                Command::RemovePhotos(parse_pin(pin)?, ids)
            }
            ("region", []) => Command::ShowRegion,
            ("region", [lat, lon, dlat, dlon]) => Command::SetRegion(MapRegion {
                center: parse_coordinate(lat, lon)?,
                latitude_delta: parse_number(dlat)?,
                longitude_delta: parse_number(dlon)?,
            }),
            ("reset", []) => Command::Reset,
            ("help" | "--help" | "-h", _) => Command::Help,
            (other, _) => bail!("Unknown command or wrong arguments: {}\n\n{}", other, USAGE),
        };
        Ok(command)
    }
}

fn parse_number(s: &str) -> Result<f64> {
    s.parse::<f64>()
        .with_context(|| format!("Not a number: {}", s))
}

fn parse_id(s: &str) -> Result<u64> {
    s.parse::<u64>().with_context(|| format!("Not an id: {}", s))
}

fn parse_pin(s: &str) -> Result<PinId> {
    parse_id(s).map(PinId)
}

fn parse_coordinate(lat: &str, lon: &str) -> Result<Coordinate> {
    let coordinate = Coordinate::new(parse_number(lat)?, parse_number(lon)?);
    if !coordinate.is_valid() {
        return Err(anyhow!("Coordinate out of range: {}", coordinate));
    }
    Ok(coordinate)
}
