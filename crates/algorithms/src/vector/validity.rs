//! Geometry validity checks and automatic repair
//!
//! A geometry is considered valid when all coordinates are finite, lines
//! have at least two distinct points, rings are closed with at least four
//! coordinates and enclose some area, and no two ring segments cross or
//! overlap. Rings touching at a single vertex are accepted.

use std::fmt;

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{
    Area, BooleanOps, Coord, CoordsIter, Geometry, GeometryCollection, HasDimensions, Line,
    LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};

/// A reason a geometry is not valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityIssue {
    NonFiniteCoordinate,
    TooFewPoints,
    UnclosedRing,
    CollapsedRing,
    SelfIntersection,
}

impl fmt::Display for ValidityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidityIssue::NonFiniteCoordinate => "non-finite coordinate",
            ValidityIssue::TooFewPoints => "too few points",
            ValidityIssue::UnclosedRing => "unclosed ring",
            ValidityIssue::CollapsedRing => "ring encloses no area",
            ValidityIssue::SelfIntersection => "self-intersection",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of validating a geometry
#[derive(Debug, Clone)]
pub struct Validated {
    /// The valid geometry (repaired when needed)
    pub geometry: Geometry<f64>,
    /// Issues found on the input; empty when it was already valid
    pub issues: Vec<ValidityIssue>,
}

impl Validated {
    pub fn was_repaired(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// Validate a geometry, repairing it when invalid.
///
/// Returns `None` when the geometry is empty or repair leaves nothing valid.
pub fn validate(geom: &Geometry<f64>) -> Option<Validated> {
    if geom.is_empty() {
        return None;
    }
    let issues = validity_issues(geom);
    if issues.is_empty() {
        return Some(Validated {
            geometry: geom.clone(),
            issues,
        });
    }
    let repaired = make_valid(geom)?;
    if !validity_issues(&repaired).is_empty() {
        return None;
    }
    Some(Validated {
        geometry: repaired,
        issues,
    })
}

pub fn is_valid(geom: &Geometry<f64>) -> bool {
    validity_issues(geom).is_empty()
}

/// All distinct issues found on a geometry
pub fn validity_issues(geom: &Geometry<f64>) -> Vec<ValidityIssue> {
    let mut issues = Vec::new();
    collect_issues(geom, &mut issues);
    issues.sort_by_key(|issue| *issue as u8);
    issues.dedup();
    issues
}

fn collect_issues(geom: &Geometry<f64>, issues: &mut Vec<ValidityIssue>) {
    if geom.coords_iter().any(|c| !is_finite(&c)) {
        issues.push(ValidityIssue::NonFiniteCoordinate);
    }
    match geom {
        Geometry::Point(_) | Geometry::MultiPoint(_) => {}
        Geometry::Line(l) => {
            if l.start == l.end {
                issues.push(ValidityIssue::TooFewPoints);
            }
        }
        Geometry::LineString(ls) => check_line(ls, issues),
        Geometry::MultiLineString(mls) => mls.0.iter().for_each(|ls| check_line(ls, issues)),
        Geometry::Polygon(p) => check_polygons(std::slice::from_ref(p), issues),
        Geometry::MultiPolygon(mp) => check_polygons(&mp.0, issues),
        Geometry::Rect(r) => {
            if r.width() == 0.0 || r.height() == 0.0 {
                issues.push(ValidityIssue::CollapsedRing);
            }
        }
        Geometry::Triangle(t) => {
            if t.unsigned_area() == 0.0 {
                issues.push(ValidityIssue::CollapsedRing);
            }
        }
        Geometry::GeometryCollection(gc) => gc.0.iter().for_each(|g| collect_issues(g, issues)),
    }
}

fn check_line(ls: &LineString<f64>, issues: &mut Vec<ValidityIssue>) {
    let first = ls.0.first();
    if ls.0.len() < 2 || ls.0.iter().all(|c| Some(c) == first) {
        issues.push(ValidityIssue::TooFewPoints);
    }
}

fn check_polygons(polygons: &[Polygon<f64>], issues: &mut Vec<ValidityIssue>) {
    let mut rings: Vec<&LineString<f64>> = Vec::new();
    for polygon in polygons {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            if ring.0.len() < 4 {
                issues.push(ValidityIssue::TooFewPoints);
                continue;
            }
            if ring.0.first() != ring.0.last() {
                issues.push(ValidityIssue::UnclosedRing);
                continue;
            }
            // Already reported as non-finite; crossing tests need real coordinates
            if !ring.0.iter().all(is_finite) {
                continue;
            }
            if is_collapsed(ring) {
                issues.push(ValidityIssue::CollapsedRing);
                continue;
            }
            rings.push(ring);
        }
    }

    if rings_intersect(&rings) {
        issues.push(ValidityIssue::SelfIntersection);
    }
}

/// Whether an intersection is more than two segments touching at a point
fn is_crossing(intersection: Option<LineIntersection<f64>>) -> bool {
    match intersection {
        Some(LineIntersection::SinglePoint { is_proper, .. }) => is_proper,
        Some(LineIntersection::Collinear { intersection }) => intersection.start != intersection.end,
        None => false,
    }
}

/// A ring segment and its bounding box
struct Segment {
    line: Line<f64>,
    ring: usize,
    /// Position along the ring
    index: usize,
    min: Coord<f64>,
    max: Coord<f64>,
}

impl Segment {
    fn new(line: Line<f64>, ring: usize, index: usize) -> Self {
        let min = Coord {
            x: line.start.x.min(line.end.x),
            y: line.start.y.min(line.end.y),
        };
        let max = Coord {
            x: line.start.x.max(line.end.x),
            y: line.start.y.max(line.end.y),
        };
        Self {
            line,
            ring,
            index,
            min,
            max,
        }
    }
}

/// Whether any two ring segments cross or overlap.
///
/// Segments are swept left to right by their bounding boxes, so only pairs
/// whose boxes overlap are intersected.
fn rings_intersect(rings: &[&LineString<f64>]) -> bool {
    let sizes: Vec<usize> = rings.iter().map(|ring| ring.0.len() - 1).collect();
    let mut segments: Vec<Segment> = rings
        .iter()
        .enumerate()
        .flat_map(|(r, ring)| ring.lines().enumerate().map(move |(i, line)| Segment::new(line, r, i)))
        .collect();
    segments.sort_by(|a, b| a.min.x.total_cmp(&b.min.x));

    for (k, a) in segments.iter().enumerate() {
        for b in segments[k + 1..].iter().take_while(|b| b.min.x <= a.max.x) {
            if b.min.y > a.max.y || b.max.y < a.min.y {
                continue;
            }
            let hit = line_intersection(a.line, b.line);
            let crossing = if a.ring == b.ring && are_adjacent(a.index, b.index, sizes[a.ring]) {
                // Neighbours always share a vertex; only a fold-back overlap counts
                matches!(hit, Some(LineIntersection::Collinear { intersection }) if intersection.start != intersection.end)
            } else {
                is_crossing(hit)
            };
            if crossing {
                return true;
            }
        }
    }
    false
}

/// Whether segments `i` and `j` of a ring with `n` segments share a vertex
fn are_adjacent(i: usize, j: usize, n: usize) -> bool {
    let (lo, hi) = (i.min(j), i.max(j));
    hi == lo + 1 || (lo == 0 && hi == n - 1)
}

/// Whether all vertices of a ring lie on one line
fn is_collapsed(ring: &LineString<f64>) -> bool {
    let Some(&a) = ring.0.first() else {
        return true;
    };
    let Some(&b) = ring.0.iter().find(|c| **c != a) else {
        return true;
    };
    ring.0
        .iter()
        .all(|c| (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x) == 0.0)
}

fn is_finite(c: &Coord<f64>) -> bool {
    c.x.is_finite() && c.y.is_finite()
}

/// Repair a geometry.
///
/// Non-finite coordinates and repeated vertices are dropped, rings are
/// closed, degenerate parts removed and polygonal parts re-noded through a
/// boolean union. Returns `None` when nothing valid remains.
pub fn make_valid(geom: &Geometry<f64>) -> Option<Geometry<f64>> {
    let repaired = match geom {
        Geometry::Point(p) => is_finite(&p.0).then(|| Geometry::Point(*p)),
        Geometry::MultiPoint(mp) => {
            let points: Vec<Point<f64>> = mp.0.iter().filter(|p| is_finite(&p.0)).copied().collect();
            (!points.is_empty()).then(|| Geometry::MultiPoint(MultiPoint::new(points)))
        }
        Geometry::Line(l) => clean_line(&LineString::new(vec![l.start, l.end])).map(Geometry::LineString),
        Geometry::LineString(ls) => clean_line(ls).map(Geometry::LineString),
        Geometry::MultiLineString(mls) => {
            let lines: Vec<LineString<f64>> = mls.0.iter().filter_map(clean_line).collect();
            (!lines.is_empty()).then(|| Geometry::MultiLineString(MultiLineString::new(lines)))
        }
        Geometry::Polygon(p) => repair_polygons(std::slice::from_ref(p)),
        Geometry::MultiPolygon(mp) => repair_polygons(&mp.0),
        Geometry::Rect(r) => repair_polygons(&[r.to_polygon()]),
        Geometry::Triangle(t) => repair_polygons(&[t.to_polygon()]),
        Geometry::GeometryCollection(gc) => {
            let parts: Vec<Geometry<f64>> = gc.0.iter().filter_map(make_valid).collect();
            match parts.len() {
                0 => None,
                1 => parts.into_iter().next(),
                _ => Some(Geometry::GeometryCollection(GeometryCollection(parts))),
            }
        }
    }?;
    (!repaired.is_empty()).then_some(repaired)
}

/// Finite coordinates with consecutive duplicates removed
fn clean_coords(ls: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut coords: Vec<Coord<f64>> = ls.0.iter().copied().filter(is_finite).collect();
    coords.dedup();
    coords
}

fn clean_line(ls: &LineString<f64>) -> Option<LineString<f64>> {
    let coords = clean_coords(ls);
    (coords.len() >= 2).then(|| LineString::new(coords))
}

fn clean_ring(ls: &LineString<f64>) -> Option<LineString<f64>> {
    let mut coords = clean_coords(ls);
    if coords.first() != coords.last() {
        if let Some(first) = coords.first().copied() {
            coords.push(first);
        }
    }
    (coords.len() >= 4).then(|| LineString::new(coords))
}

fn repair_polygons(polygons: &[Polygon<f64>]) -> Option<Geometry<f64>> {
    let mut result = MultiPolygon::<f64>::new(vec![]);
    for polygon in polygons {
        let Some(exterior) = clean_ring(polygon.exterior()) else {
            continue;
        };
        let interiors: Vec<LineString<f64>> = polygon.interiors().iter().filter_map(clean_ring).collect();
        let part = MultiPolygon::new(vec![Polygon::new(exterior, interiors)]);
        // Self-union re-nodes crossing rings into valid parts
        let noded = part.union(&part);
        result = if result.0.is_empty() {
            noded
        } else {
            result.union(&noded)
        };
    }
    result.0.retain(|p| p.unsigned_area() > 0.0);
    match result.0.len() {
        0 => None,
        1 => result.0.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(result)),
    }
}
