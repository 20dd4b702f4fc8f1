//! Bring layer coordinates to geographic longitude/latitude

use geo::{Geometry, MapCoords};
use parcelmerge_core::{Projection, Result, CRS};

/// Unproject a geometry from `crs` to geographic coordinates
pub fn to_geographic(geom: &Geometry<f64>, crs: &CRS) -> Result<Geometry<f64>> {
    let projection = crs.projection()?;
    Ok(unproject(geom, &projection))
}

/// Apply a resolved projection's inverse to every coordinate
pub fn unproject(geom: &Geometry<f64>, projection: &Projection) -> Geometry<f64> {
    match projection {
        Projection::Geographic => geom.clone(),
        Projection::TransverseMercator(_) => geom.map_coords(|c| projection.to_lon_lat(c)),
    }
}
