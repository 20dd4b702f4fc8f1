//! Coordinate Reference System handling
//!
//! A `CRS` resolves to a `Projection` that can bring layer coordinates back
//! to geographic longitude/latitude for ellipsoidal measurement.

mod ellipsoid;
mod transverse_mercator;

pub use ellipsoid::Ellipsoid;
pub use transverse_mercator::TransverseMercator;

use geo_types::Coord;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wkt: Option<String>,
    /// EPSG code if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    epsg: Option<u32>,
    /// PROJ string if available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proj: Option<String>,
}

/// How layer coordinates map to geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Coordinates already are (longitude, latitude) in degrees
    Geographic,
    /// Transverse Mercator grid coordinates in metres
    TransverseMercator(TransverseMercator),
}

impl Projection {
    /// Map one layer coordinate to (longitude, latitude)
    pub fn to_lon_lat(&self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Projection::Geographic => c,
            Projection::TransverseMercator(tm) => tm.to_lon_lat(c),
        }
    }
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Poland CS92 (EPSG:2180), the national cadastral grid
    pub fn poland_cs92() -> Self {
        Self::from_epsg(2180)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Resolve the projection used to recover geographic coordinates.
    ///
    /// EPSG codes are tried first, then the PROJ string. WKT alone is not
    /// parsed.
    pub fn projection(&self) -> Result<Projection> {
        if let Some(code) = self.epsg {
            return projection_for_epsg(code)
                .ok_or_else(|| Error::UnsupportedCrs(format!("EPSG:{}", code)));
        }
        if let Some(proj) = &self.proj {
            return parse_proj_string(proj);
        }
        Err(Error::UnsupportedCrs(self.identifier()))
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            // First 50 chars of WKT
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{}", head);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// Projection for the EPSG codes parcel data usually comes in.
///
/// - 4326 / 4258 / 4019: geographic
/// - 326xx / 327xx: UTM North / South on WGS84
/// - 25828-25838: ETRS89 UTM on GRS80
/// - 2180: Poland CS92
/// - 2176-2179: Poland CS2000 zones 5-8
fn projection_for_epsg(code: u32) -> Option<Projection> {
    let tm = match code {
        4326 | 4258 | 4019 => return Some(Projection::Geographic),
        32601..=32660 => TransverseMercator::utm(Ellipsoid::WGS84, code - 32600, true),
        32701..=32760 => TransverseMercator::utm(Ellipsoid::WGS84, code - 32700, false),
        25828..=25838 => TransverseMercator::utm(Ellipsoid::GRS80, code - 25800, true),
        2180 => TransverseMercator {
            ellipsoid: Ellipsoid::GRS80,
            lon0: 19.0,
            lat0: 0.0,
            k0: 0.9993,
            false_easting: 500_000.0,
            false_northing: -5_300_000.0,
        },
        2176..=2179 => {
            let zone = code - 2171;
            TransverseMercator {
                ellipsoid: Ellipsoid::GRS80,
                lon0: 3.0 * zone as f64,
                lat0: 0.0,
                k0: 0.999_923,
                false_easting: zone as f64 * 1_000_000.0 + 500_000.0,
                false_northing: 0.0,
            }
        }
        _ => return None,
    };
    Some(Projection::TransverseMercator(tm))
}

/// Parse the subset of PROJ strings describing geographic, UTM and
/// Transverse Mercator systems.
fn parse_proj_string(proj: &str) -> Result<Projection> {
    let unsupported = || Error::UnsupportedCrs(proj.to_string());

    let mut params: Vec<(&str, Option<&str>)> = Vec::new();
    for token in proj.split_whitespace() {
        let token = token.trim_start_matches('+');
        match token.split_once('=') {
            Some((k, v)) => params.push((k, Some(v))),
            None => params.push((token, None)),
        }
    }
    let get = |key: &str| params.iter().find(|(k, _)| *k == key).and_then(|(_, v)| *v);
    let has = |key: &str| params.iter().any(|(k, _)| *k == key);
    let number = |key: &str, default: f64| -> Result<f64> {
        match get(key) {
            Some(v) => v.parse().map_err(|_| Error::InvalidParameter {
                name: "proj",
                value: proj.to_string(),
                reason: format!("+{} is not a number", key),
            }),
            None => Ok(default),
        }
    };

    let ellipsoid = match get("ellps").or_else(|| get("datum")) {
        Some(name) => name.parse::<Ellipsoid>().map_err(|_| unsupported())?,
        None => Ellipsoid::WGS84,
    };

    match get("proj") {
        Some("longlat") | Some("latlong") | Some("lonlat") | Some("latlon") => {
            Ok(Projection::Geographic)
        }
        Some("utm") => {
            let zone = get("zone")
                .and_then(|z| z.parse::<u32>().ok())
                .filter(|z| (1..=60).contains(z))
                .ok_or_else(unsupported)?;
            Ok(Projection::TransverseMercator(TransverseMercator::utm(
                ellipsoid,
                zone,
                !has("south"),
            )))
        }
        Some("tmerc") => Ok(Projection::TransverseMercator(TransverseMercator {
            ellipsoid,
            lon0: number("lon_0", 0.0)?,
            lat0: number("lat_0", 0.0)?,
            k0: number("k", number("k_0", 1.0)?)?,
            false_easting: number("x_0", 0.0)?,
            false_northing: number("y_0", 0.0)?,
        })),
        _ => Err(unsupported()),
    }
}
