//! Geometric measurements: planar area and ellipsoidal area

use geo::{Area as GeoArea, Geometry, LineString, Polygon};
use geographiclib_rs::{Geodesic, PolygonArea, Winding};
use parcelmerge_core::Ellipsoid;

/// Square metres per hectare
pub const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// Calculate the planar area of a geometry.
///
/// Returns unsigned area in CRS units squared. Non-polygonal geometries
/// have zero area.
pub fn area(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => p.unsigned_area(),
        Geometry::MultiPolygon(mp) => mp.unsigned_area(),
        Geometry::Rect(r) => r.unsigned_area(),
        Geometry::Triangle(t) => t.unsigned_area(),
        Geometry::GeometryCollection(gc) => gc.0.iter().map(area).sum(),
        _ => 0.0,
    }
}

/// Ellipsoidal area in square metres of a geometry in geographic
/// coordinates (x = longitude, y = latitude, degrees).
///
/// Edges are geodesics on `ellipsoid`. Holes are subtracted.
pub fn ellipsoidal_area(geom: &Geometry<f64>, ellipsoid: &Ellipsoid) -> f64 {
    let geodesic = Geodesic::new(ellipsoid.semi_major, ellipsoid.flattening);
    geometry_area(&geodesic, geom)
}

/// Convert square metres to hectares rounded to 2 decimals
pub fn to_hectares(square_meters: f64) -> f64 {
    (square_meters / SQUARE_METERS_PER_HECTARE * 100.0).round() / 100.0
}

fn geometry_area(geodesic: &Geodesic, geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => polygon_area(geodesic, p),
        Geometry::MultiPolygon(mp) => mp.0.iter().map(|p| polygon_area(geodesic, p)).sum(),
        Geometry::Rect(r) => polygon_area(geodesic, &r.to_polygon()),
        Geometry::Triangle(t) => polygon_area(geodesic, &t.to_polygon()),
        Geometry::GeometryCollection(gc) => gc.0.iter().map(|g| geometry_area(geodesic, g)).sum(),
        _ => 0.0,
    }
}

fn polygon_area(geodesic: &Geodesic, polygon: &Polygon<f64>) -> f64 {
    let exterior = ring_area(geodesic, polygon.exterior());
    let holes: f64 = polygon
        .interiors()
        .iter()
        .map(|ring| ring_area(geodesic, ring))
        .sum();
    (exterior - holes).max(0.0)
}

/// Unsigned geodesic area enclosed by a ring
fn ring_area(geodesic: &Geodesic, ring: &LineString<f64>) -> f64 {
    let coords = &ring.0;
    if coords.len() < 3 {
        return 0.0;
    }
    // The closing vertex is implied
    let open = if coords.first() == coords.last() {
        &coords[..coords.len() - 1]
    } else {
        &coords[..]
    };

    let mut polygon = PolygonArea::new(geodesic, Winding::CounterClockwise);
    for c in open {
        polygon.add_point(c.y, c.x);
    }
    // Signed so that clockwise rings come back negative instead of as the
    // complement of the ellipsoid
    let (_perimeter, area, _count) = polygon.compute(true);
    area.abs()
}
