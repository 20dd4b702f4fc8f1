//! Set-union of many geometries into one

use geo::{
    BooleanOps, Geometry, GeometryCollection, HasDimensions, LineString, MultiLineString,
    MultiPoint, MultiPolygon, Point, Polygon,
};

/// Union of all input geometries.
///
/// Polygonal parts are merged with a boolean union; points are collected
/// without duplicates and lines are collected as-is (not noded). When the
/// inputs mix dimensions the per-dimension results come back as a
/// geometry collection. The result may be empty.
pub fn union_all(geometries: &[Geometry<f64>]) -> Geometry<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    let mut lines: Vec<LineString<f64>> = Vec::new();
    let mut points: Vec<Point<f64>> = Vec::new();
    for geom in geometries {
        split_by_dimension(geom, &mut polygons, &mut lines, &mut points);
    }

    let mut parts: Vec<Geometry<f64>> = Vec::new();
    if let Some(merged) = union_polygons(polygons) {
        parts.push(merged);
    }
    match lines.len() {
        0 => {}
        1 => parts.extend(lines.pop().map(Geometry::LineString)),
        _ => parts.push(Geometry::MultiLineString(MultiLineString::new(lines))),
    }
    let mut unique: Vec<Point<f64>> = Vec::new();
    for p in points {
        if !unique.contains(&p) {
            unique.push(p);
        }
    }
    match unique.len() {
        0 => {}
        1 => parts.extend(unique.pop().map(Geometry::Point)),
        _ => parts.push(Geometry::MultiPoint(MultiPoint::new(unique))),
    }

    match parts.len() {
        0 => Geometry::GeometryCollection(GeometryCollection(vec![])),
        1 => parts.remove(0),
        _ => Geometry::GeometryCollection(GeometryCollection(parts)),
    }
}

fn split_by_dimension(
    geom: &Geometry<f64>,
    polygons: &mut Vec<Polygon<f64>>,
    lines: &mut Vec<LineString<f64>>,
    points: &mut Vec<Point<f64>>,
) {
    if geom.is_empty() {
        return;
    }
    match geom {
        Geometry::Point(p) => points.push(*p),
        Geometry::MultiPoint(mp) => points.extend(mp.0.iter().copied()),
        Geometry::Line(l) => lines.push(LineString::new(vec![l.start, l.end])),
        Geometry::LineString(ls) => lines.push(ls.clone()),
        Geometry::MultiLineString(mls) => lines.extend(mls.0.iter().cloned()),
        Geometry::Polygon(p) => polygons.push(p.clone()),
        Geometry::MultiPolygon(mp) => polygons.extend(mp.0.iter().cloned()),
        Geometry::Rect(r) => polygons.push(r.to_polygon()),
        Geometry::Triangle(t) => polygons.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in &gc.0 {
                split_by_dimension(g, polygons, lines, points);
            }
        }
    }
}

fn union_polygons(polygons: Vec<Polygon<f64>>) -> Option<Geometry<f64>> {
    let mut iter = polygons.into_iter();
    let first = MultiPolygon::new(vec![iter.next()?]);
    let mut merged = iter.fold(first, |acc, p| acc.union(&MultiPolygon::new(vec![p])));
    match merged.0.len() {
        0 => None,
        1 => merged.0.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(merged)),
    }
}
