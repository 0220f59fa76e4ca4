//! Spatial values and the `point.*` function family. A point is a tagged map
//! (`__kind` = `point`), the same representation durations use, so it flows
//! through rows, lists, and serialization without a dedicated `Value` variant.
//! Cartesian distances are Euclidean; geographic distances use the haversine
//! formula in meters.

use super::Value;
use std::collections::BTreeMap;

const SRID_CARTESIAN: i64 = 7203;
const SRID_CARTESIAN_3D: i64 = 9157;
const SRID_WGS84: i64 = 4326;
const SRID_WGS84_3D: i64 = 4979;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

pub(super) fn evaluate_spatial_function(name: &str, args: &[Value]) -> Option<Value> {
    match name {
        "point" => Some(construct_point(args)),
        "distance" | "point.distance" => Some(point_distance(args)),
        "point.x" => Some(point_component(args, "x")),
        "point.y" => Some(point_component(args, "y")),
        "point.z" => Some(point_component(args, "z")),
        "point.latitude" => Some(point_component(args, "latitude")),
        "point.longitude" => Some(point_component(args, "longitude")),
        "point.height" => Some(point_component(args, "height")),
        "point.srid" => Some(point_srid(args)),
        "point.crs" => Some(point_crs(args)),
        "point.withinbbox" => Some(point_within_bbox(args)),
        "point.withindistance" => Some(point_within_distance(args)),
        "point.contains" => Some(point_contains(args)),
        "point.intersects" => Some(point_intersects(args)),
        "polygon" => Some(construct_polygon(args)),
        "linestring" => Some(construct_line_string(args)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Point {
    pub horizontal: f64,
    pub vertical: f64,
    pub third: Option<f64>,
    pub geographic: bool,
}

impl Point {
    fn srid(&self) -> i64 {
        match (self.geographic, self.third.is_some()) {
            (true, true) => SRID_WGS84_3D,
            (true, false) => SRID_WGS84,
            (false, true) => SRID_CARTESIAN_3D,
            (false, false) => SRID_CARTESIAN,
        }
    }

    fn crs(&self) -> &'static str {
        match (self.geographic, self.third.is_some()) {
            (true, true) => "wgs-84-3d",
            (true, false) => "wgs-84",
            (false, true) => "cartesian-3d",
            (false, false) => "cartesian",
        }
    }
}

fn map_number(map: &BTreeMap<String, Value>, key: &str) -> Option<f64> {
    match map.get(key) {
        Some(Value::Int(v)) => Some(*v as f64),
        Some(Value::Float(v)) => Some(*v),
        _ => None,
    }
}

fn point_from_component_map(map: &BTreeMap<String, Value>) -> Option<Point> {
    // An explicit crs wins; otherwise the coordinate keys decide. Geographic
    // points also carry x/y aliases, so the crs check must come first when
    // a constructed point round-trips through here.
    let wgs84_tagged = matches!(map.get("crs"), Some(Value::String(c)) if c.starts_with("wgs-84"));

    if !wgs84_tagged && let (Some(x), Some(y)) = (map_number(map, "x"), map_number(map, "y")) {
        return Some(Point {
            horizontal: x,
            vertical: y,
            third: map_number(map, "z"),
            geographic: false,
        });
    }
    if let (Some(lon), Some(lat)) = (map_number(map, "longitude"), map_number(map, "latitude")) {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        return Some(Point {
            horizontal: lon,
            vertical: lat,
            third: map_number(map, "height"),
            geographic: true,
        });
    }
    None
}

pub(super) fn point_from_value(value: &Value) -> Option<Point> {
    let Value::Map(map) = value else {
        return None;
    };
    match map.get("__kind") {
        Some(Value::String(kind)) if kind == "point" => {}
        _ => return None,
    }
    point_from_component_map(map)
}

pub(super) fn point_value(point: Point) -> Value {
    let mut out = BTreeMap::new();
    out.insert("__kind".to_string(), Value::String("point".to_string()));
    if point.geographic {
        out.insert("longitude".to_string(), Value::Float(point.horizontal));
        out.insert("latitude".to_string(), Value::Float(point.vertical));
        if let Some(height) = point.third {
            out.insert("height".to_string(), Value::Float(height));
        }
        // Geographic coordinates double as x/y so both accessor families work.
        out.insert("x".to_string(), Value::Float(point.horizontal));
        out.insert("y".to_string(), Value::Float(point.vertical));
    } else {
        out.insert("x".to_string(), Value::Float(point.horizontal));
        out.insert("y".to_string(), Value::Float(point.vertical));
        if let Some(z) = point.third {
            out.insert("z".to_string(), Value::Float(z));
        }
    }
    out.insert("srid".to_string(), Value::Int(point.srid()));
    out.insert("crs".to_string(), Value::String(point.crs().to_string()));
    Value::Map(out)
}

fn construct_point(args: &[Value]) -> Value {
    let Some(Value::Map(map)) = args.first() else {
        return Value::Null;
    };
    point_from_component_map(map)
        .map(point_value)
        .unwrap_or(Value::Null)
}

fn point_component(args: &[Value], component: &str) -> Value {
    let Some(point) = args.first().and_then(point_from_value) else {
        return Value::Null;
    };
    let value = match (component, point.geographic) {
        ("x", _) | ("longitude", true) => Some(point.horizontal),
        ("y", _) | ("latitude", true) => Some(point.vertical),
        ("z", false) | ("height", true) => point.third,
        _ => None,
    };
    value.map(Value::Float).unwrap_or(Value::Null)
}

fn point_srid(args: &[Value]) -> Value {
    args.first()
        .and_then(point_from_value)
        .map(|p| Value::Int(p.srid()))
        .unwrap_or(Value::Null)
}

fn point_crs(args: &[Value]) -> Value {
    args.first()
        .and_then(point_from_value)
        .map(|p| Value::String(p.crs().to_string()))
        .unwrap_or(Value::Null)
}

pub(super) fn distance_between(a: &Point, b: &Point) -> Option<f64> {
    if a.geographic != b.geographic {
        return None;
    }
    if a.geographic {
        let surface = haversine_meters(a.vertical, a.horizontal, b.vertical, b.horizontal);
        match (a.third, b.third) {
            (Some(ha), Some(hb)) => Some(surface.hypot(hb - ha)),
            _ => Some(surface),
        }
    } else {
        let dx = b.horizontal - a.horizontal;
        let dy = b.vertical - a.vertical;
        let dz = match (a.third, b.third) {
            (Some(za), Some(zb)) => zb - za,
            _ => 0.0,
        };
        Some((dx * dx + dy * dy + dz * dz).sqrt())
    }
}

fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

fn point_distance(args: &[Value]) -> Value {
    let (Some(a), Some(b)) = (
        args.first().and_then(point_from_value),
        args.get(1).and_then(point_from_value),
    ) else {
        return Value::Null;
    };
    distance_between(&a, &b)
        .map(Value::Float)
        .unwrap_or(Value::Null)
}

fn point_within_bbox(args: &[Value]) -> Value {
    let (Some(p), Some(lower), Some(upper)) = (
        args.first().and_then(point_from_value),
        args.get(1).and_then(point_from_value),
        args.get(2).and_then(point_from_value),
    ) else {
        return Value::Null;
    };
    if p.geographic != lower.geographic || p.geographic != upper.geographic {
        return Value::Null;
    }
    let inside = p.horizontal >= lower.horizontal
        && p.horizontal <= upper.horizontal
        && p.vertical >= lower.vertical
        && p.vertical <= upper.vertical;
    Value::Bool(inside)
}

fn point_within_distance(args: &[Value]) -> Value {
    let (Some(p), Some(center)) = (
        args.first().and_then(point_from_value),
        args.get(1).and_then(point_from_value),
    ) else {
        return Value::Null;
    };
    let radius = match args.get(2) {
        Some(Value::Int(v)) => *v as f64,
        Some(Value::Float(v)) => *v,
        _ => return Value::Null,
    };
    distance_between(&p, &center)
        .map(|d| Value::Bool(d <= radius))
        .unwrap_or(Value::Null)
}

fn vertices_from_value(value: &Value) -> Option<Vec<Point>> {
    let Value::Map(map) = value else {
        return None;
    };
    match map.get("__kind") {
        Some(Value::String(kind)) if kind == "polygon" || kind == "linestring" => {}
        _ => return None,
    }
    let Some(Value::List(items)) = map.get("points") else {
        return None;
    };
    items.iter().map(point_from_value).collect()
}

fn collect_points(args: &[Value]) -> Option<Vec<Point>> {
    let Some(Value::List(items)) = args.first() else {
        return None;
    };
    items.iter().map(point_from_value).collect()
}

fn shape_value(kind: &str, points: Vec<Point>) -> Value {
    let mut out = BTreeMap::new();
    out.insert("__kind".to_string(), Value::String(kind.to_string()));
    out.insert(
        "points".to_string(),
        Value::List(points.into_iter().map(point_value).collect()),
    );
    Value::Map(out)
}

fn construct_polygon(args: &[Value]) -> Value {
    match collect_points(args) {
        Some(points) if points.len() >= 3 => shape_value("polygon", points),
        _ => Value::Null,
    }
}

fn construct_line_string(args: &[Value]) -> Value {
    match collect_points(args) {
        Some(points) if points.len() >= 2 => shape_value("linestring", points),
        _ => Value::Null,
    }
}

/// Ray casting: count crossings of a rightward ray from the probe point.
fn polygon_contains(vertices: &[Point], probe: &Point) -> bool {
    let mut inside = false;
    let n = vertices.len();
    for i in 0..n {
        let a = &vertices[i];
        let b = &vertices[(i + 1) % n];
        let crosses = (a.vertical > probe.vertical) != (b.vertical > probe.vertical);
        if crosses {
            let slope_x = (b.horizontal - a.horizontal) * (probe.vertical - a.vertical)
                / (b.vertical - a.vertical)
                + a.horizontal;
            if probe.horizontal < slope_x {
                inside = !inside;
            }
        }
    }
    inside
}

fn orientation(a: &Point, b: &Point, c: &Point) -> f64 {
    (b.horizontal - a.horizontal) * (c.vertical - a.vertical)
        - (b.vertical - a.vertical) * (c.horizontal - a.horizontal)
}

fn segments_intersect(a1: &Point, a2: &Point, b1: &Point, b2: &Point) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);
    (d1 * d2 < 0.0) && (d3 * d4 < 0.0)
}

fn segment_list(vertices: &[Point], closed: bool) -> Vec<(Point, Point)> {
    let n = vertices.len();
    let mut out = Vec::new();
    let last = if closed { n } else { n.saturating_sub(1) };
    for i in 0..last {
        out.push((vertices[i], vertices[(i + 1) % n]));
    }
    out
}

fn point_contains(args: &[Value]) -> Value {
    let (Some(shape), Some(probe)) = (args.first(), args.get(1)) else {
        return Value::Null;
    };
    let (Some(vertices), Some(p)) = (vertices_from_value(shape), point_from_value(probe)) else {
        return Value::Null;
    };
    if vertices.len() < 3 {
        return Value::Bool(false);
    }
    Value::Bool(polygon_contains(&vertices, &p))
}

fn point_intersects(args: &[Value]) -> Value {
    let (Some(left), Some(right)) = (args.first(), args.get(1)) else {
        return Value::Null;
    };

    // Point against shape degrades to containment.
    if let Some(p) = point_from_value(left)
        && let Some(vertices) = vertices_from_value(right)
    {
        return Value::Bool(vertices.len() >= 3 && polygon_contains(&vertices, &p));
    }
    if let Some(p) = point_from_value(right)
        && let Some(vertices) = vertices_from_value(left)
    {
        return Value::Bool(vertices.len() >= 3 && polygon_contains(&vertices, &p));
    }

    let (Some(a), Some(b)) = (vertices_from_value(left), vertices_from_value(right)) else {
        return Value::Null;
    };
    let a_closed = shape_kind(left) == Some("polygon");
    let b_closed = shape_kind(right) == Some("polygon");

    if a_closed && b.iter().any(|v| polygon_contains(&a, v)) {
        return Value::Bool(true);
    }
    if b_closed && a.iter().any(|v| polygon_contains(&b, v)) {
        return Value::Bool(true);
    }

    let a_segments = segment_list(&a, a_closed);
    let b_segments = segment_list(&b, b_closed);
    for (a1, a2) in &a_segments {
        for (b1, b2) in &b_segments {
            if segments_intersect(a1, a2, b1, b2) {
                return Value::Bool(true);
            }
        }
    }
    Value::Bool(false)
}

fn shape_kind(value: &Value) -> Option<&str> {
    let Value::Map(map) = value else {
        return None;
    };
    match map.get("__kind") {
        Some(Value::String(kind)) => Some(kind.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cartesian(x: f64, y: f64) -> Value {
        let mut m = BTreeMap::new();
        m.insert("x".to_string(), Value::Float(x));
        m.insert("y".to_string(), Value::Float(y));
        construct_point(&[Value::Map(m)])
    }

    fn geographic(lon: f64, lat: f64) -> Value {
        let mut m = BTreeMap::new();
        m.insert("longitude".to_string(), Value::Float(lon));
        m.insert("latitude".to_string(), Value::Float(lat));
        construct_point(&[Value::Map(m)])
    }

    #[test]
    fn cartesian_point_carries_srid_and_crs() {
        let p = cartesian(1.0, 2.0);
        assert_eq!(
            evaluate_spatial_function("point.srid", &[p.clone()]),
            Some(Value::Int(SRID_CARTESIAN))
        );
        assert_eq!(
            evaluate_spatial_function("point.crs", &[p]),
            Some(Value::String("cartesian".to_string()))
        );
    }

    #[test]
    fn cartesian_distance_is_euclidean() {
        let a = cartesian(0.0, 0.0);
        let b = cartesian(3.0, 4.0);
        assert_eq!(
            evaluate_spatial_function("distance", &[a, b]),
            Some(Value::Float(5.0))
        );
    }

    #[test]
    fn geographic_distance_uses_haversine_meters() {
        // One degree of latitude along a meridian is roughly 111.2 km.
        let a = geographic(0.0, 0.0);
        let b = geographic(0.0, 1.0);
        let Some(Value::Float(d)) = evaluate_spatial_function("point.distance", &[a, b]) else {
            panic!("expected a float distance");
        };
        assert!((d - 111_194.9).abs() < 100.0, "got {d}");
    }

    #[test]
    fn mixed_crs_distance_is_null() {
        let a = cartesian(0.0, 0.0);
        let b = geographic(0.0, 0.0);
        assert_eq!(
            evaluate_spatial_function("distance", &[a, b]),
            Some(Value::Null)
        );
    }

    #[test]
    fn latitude_out_of_range_is_null() {
        let mut m = BTreeMap::new();
        m.insert("longitude".to_string(), Value::Float(0.0));
        m.insert("latitude".to_string(), Value::Float(91.0));
        assert_eq!(
            evaluate_spatial_function("point", &[Value::Map(m)]),
            Some(Value::Null)
        );
    }

    #[test]
    fn within_bbox_checks_both_axes() {
        let p = cartesian(1.0, 1.0);
        let low = cartesian(0.0, 0.0);
        let high = cartesian(2.0, 2.0);
        assert_eq!(
            evaluate_spatial_function("point.withinbbox", &[p, low.clone(), high.clone()]),
            Some(Value::Bool(true))
        );
        let outside = cartesian(3.0, 1.0);
        assert_eq!(
            evaluate_spatial_function("point.withinbbox", &[outside, low, high]),
            Some(Value::Bool(false))
        );
    }

    #[test]
    fn within_distance_compares_against_radius() {
        let p = cartesian(3.0, 4.0);
        let center = cartesian(0.0, 0.0);
        assert_eq!(
            evaluate_spatial_function(
                "point.withindistance",
                &[p.clone(), center.clone(), Value::Float(5.0)]
            ),
            Some(Value::Bool(true))
        );
        assert_eq!(
            evaluate_spatial_function("point.withindistance", &[p, center, Value::Float(4.9)]),
            Some(Value::Bool(false))
        );
    }

    #[test]
    fn polygon_contains_by_ray_casting() {
        let square = evaluate_spatial_function(
            "polygon",
            &[Value::List(vec![
                cartesian(0.0, 0.0),
                cartesian(4.0, 0.0),
                cartesian(4.0, 4.0),
                cartesian(0.0, 4.0),
            ])],
        )
        .unwrap();
        assert_eq!(
            evaluate_spatial_function("point.contains", &[square.clone(), cartesian(2.0, 2.0)]),
            Some(Value::Bool(true))
        );
        assert_eq!(
            evaluate_spatial_function("point.contains", &[square, cartesian(5.0, 2.0)]),
            Some(Value::Bool(false))
        );
    }

    #[test]
    fn disjoint_polygons_do_not_intersect() {
        let a = evaluate_spatial_function(
            "polygon",
            &[Value::List(vec![
                cartesian(0.0, 0.0),
                cartesian(1.0, 0.0),
                cartesian(1.0, 1.0),
            ])],
        )
        .unwrap();
        let b = evaluate_spatial_function(
            "polygon",
            &[Value::List(vec![
                cartesian(10.0, 10.0),
                cartesian(11.0, 10.0),
                cartesian(11.0, 11.0),
            ])],
        )
        .unwrap();
        assert_eq!(
            evaluate_spatial_function("point.intersects", &[a.clone(), b.clone()]),
            Some(Value::Bool(false))
        );
        let overlapping = evaluate_spatial_function(
            "polygon",
            &[Value::List(vec![
                cartesian(0.5, 0.1),
                cartesian(2.0, 0.1),
                cartesian(2.0, 2.0),
            ])],
        )
        .unwrap();
        assert_eq!(
            evaluate_spatial_function("point.intersects", &[a, overlapping]),
            Some(Value::Bool(true))
        );
    }

    #[test]
    fn line_string_needs_two_points() {
        assert_eq!(
            evaluate_spatial_function("linestring", &[Value::List(vec![cartesian(0.0, 0.0)])]),
            Some(Value::Null)
        );
        let line = evaluate_spatial_function(
            "linestring",
            &[Value::List(vec![cartesian(0.0, 0.0), cartesian(1.0, 1.0)])],
        )
        .unwrap();
        assert_eq!(shape_kind(&line), Some("linestring"));
    }

    #[test]
    fn geographic_point_stays_geographic_through_round_trip() {
        // Geographic points carry x/y aliases; re-reading one must not
        // reclassify it as cartesian.
        let g = geographic(12.5, 55.6);
        let p = point_from_value(&g).unwrap();
        assert!(p.geographic);
        assert_eq!(
            evaluate_spatial_function("point.crs", &[g]),
            Some(Value::String("wgs-84".to_string()))
        );
    }

    #[test]
    fn component_accessors_respect_crs_family() {
        let g = geographic(12.5, 55.6);
        assert_eq!(
            evaluate_spatial_function("point.longitude", &[g.clone()]),
            Some(Value::Float(12.5))
        );
        assert_eq!(
            evaluate_spatial_function("point.latitude", &[g.clone()]),
            Some(Value::Float(55.6))
        );
        assert_eq!(
            evaluate_spatial_function("point.z", &[g]),
            Some(Value::Null)
        );
    }
}
