//! GeoJSON rendering of bus lines.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};

use crate::domain::BusLine;

/// One `Feature` per line; positions are `[lng, lat]`.
pub fn bus_line_feature(line: &BusLine) -> Value {
    let coordinates: Vec<[f64; 2]> = line
        .points
        .iter()
        .map(|p| [to_f64(p.lng), to_f64(p.lat)])
        .collect();

    json!({
        "type": "Feature",
        "id": line.line_id,
        "geometry": {
            "type": "LineString",
            "coordinates": coordinates,
        },
        "properties": {
            "line_id": line.line_id,
            "name": line.name,
            "speed": to_f64(line.speed),
            "distance": to_f64(line.distance),
            "total_time": to_f64(line.total_time),
        },
    })
}

pub fn bus_lines_to_geojson(lines: &[BusLine]) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": lines.iter().map(bus_line_feature).collect::<Vec<_>>(),
    })
}

/// Serialized `FeatureCollection`, ready to write or upload.
pub fn bus_lines_geojson_bytes(lines: &[BusLine]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&bus_lines_to_geojson(lines))
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(f64::NAN)
}
