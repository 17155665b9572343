//! Search region around a pin.

use std::fmt;

use crate::models::{Coordinate, LAT_RANGE, LON_RANGE};

/// Half the width of the search box, in degrees of longitude.
pub const BBOX_HALF_WIDTH: f64 = 1.0;

/// Half the height of the search box, in degrees of latitude.
pub const BBOX_HALF_HEIGHT: f64 = 1.0;

/// A lat/lon rectangle, rendered for the API as `minLon,minLat,maxLon,maxLat`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_longitude: f64,
    pub min_latitude: f64,
    pub max_longitude: f64,
    pub max_latitude: f64,
}

impl BoundingBox {
    /// The degenerate box sent when no usable coordinate is available.
    pub const ZERO: BoundingBox = BoundingBox {
        min_longitude: 0.0,
        min_latitude: 0.0,
        max_longitude: 0.0,
        max_latitude: 0.0,
    };

    /// Box of fixed half-width/height centred on `coordinate`, clamped to the
    /// valid lat/lon ranges. Missing or non-finite input yields `ZERO`.
    pub fn around(coordinate: Option<Coordinate>) -> Self {
        match coordinate {
            Some(c) if c.is_finite() => BoundingBox {
                min_longitude: (c.longitude - BBOX_HALF_WIDTH).max(LON_RANGE.0),
                min_latitude: (c.latitude - BBOX_HALF_HEIGHT).max(LAT_RANGE.0),
                max_longitude: (c.longitude + BBOX_HALF_WIDTH).min(LON_RANGE.1),
                max_latitude: (c.latitude + BBOX_HALF_HEIGHT).min(LAT_RANGE.1),
            },
            _ => Self::ZERO,
        }
    }

    pub fn contains(&self, coordinate: Coordinate) -> bool {
        (self.min_longitude..=self.max_longitude).contains(&coordinate.longitude)
            && (self.min_latitude..=self.max_latitude).contains(&coordinate.latitude)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_longitude, self.min_latitude, self.max_longitude, self.max_latitude
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_around_san_francisco() {
        let bbox = BoundingBox::around(Some(Coordinate::new(37.5, -122.5)));
        assert_eq!(bbox.to_string(), "-123.5,36.5,-121.5,38.5");
    }

    #[test]
    fn test_bbox_clamps_at_poles_and_antimeridian() {
        let bbox = BoundingBox::around(Some(Coordinate::new(89.5, 179.5)));
        assert_eq!(bbox.max_latitude, 90.0);
        assert_eq!(bbox.max_longitude, 180.0);
        assert_eq!(bbox.min_latitude, 88.5);
        assert_eq!(bbox.min_longitude, 178.5);

        let bbox = BoundingBox::around(Some(Coordinate::new(-90.0, -180.0)));
        assert_eq!(bbox.min_latitude, -90.0);
        assert_eq!(bbox.min_longitude, -180.0);
    }

    #[test]
    fn test_bbox_zero_fallback() {
        assert_eq!(BoundingBox::around(None).to_string(), "0,0,0,0");
        assert_eq!(
            BoundingBox::around(Some(Coordinate::new(f64::NAN, 10.0))),
            BoundingBox::ZERO
        );
    }

    #[test]
    fn test_bbox_contains_its_centre_for_valid_points() {
        let mut lat = -90.0;
        while lat <= 90.0 {
            let mut lon = -180.0;
            while lon <= 180.0 {
                let c = Coordinate::new(lat, lon);
                let bbox = BoundingBox::around(Some(c));
                assert!(bbox.contains(c), "{c} not inside {bbox}");
                assert!(bbox.min_latitude >= -90.0 && bbox.max_latitude <= 90.0);
                assert!(bbox.min_longitude >= -180.0 && bbox.max_longitude <= 180.0);
                lon += 7.25;
            }
            lat += 3.75;
        }
    }
}
