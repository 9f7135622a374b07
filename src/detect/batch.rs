//! Detection batch extraction.
//!
//! Inference results arrive as untyped JSON from the plugin boundary. This
//! module turns an arbitrary payload value into a validated batch:
//!
//! - a non-array payload yields an empty batch
//! - a record missing a coordinate, or carrying a non-numeric or non-finite
//!   one, is dropped; valid siblings in the same payload survive
//! - coordinates are not reordered here; either corner of a box may be the
//!   minimum (the renderer normalizes corner order when mapping)
//!
//! Extraction never fails. Malformed input degrades to fewer detections, so
//! a bad inference cycle can never take down the draw loop.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One detected region in model pixel space.
///
/// `x1,y1` and `x2,y2` are opposite corners in either order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Extract the valid detections from a payload value.
///
/// The value is expected to be an array of `{x1,y1,x2,y2}` objects; anything
/// else (null, object, string, number) is treated as an empty batch.
pub fn normalize_detections(payload: &Value) -> Vec<Detection> {
    let Some(items) = payload.as_array() else {
        return Vec::new();
    };

    let mut detections = Vec::with_capacity(items.len());
    for item in items {
        let (Some(x1), Some(y1), Some(x2), Some(y2)) = (
            finite_coord(item, "x1"),
            finite_coord(item, "y1"),
            finite_coord(item, "x2"),
            finite_coord(item, "y2"),
        ) else {
            continue;
        };
        detections.push(Detection { x1, y1, x2, y2 });
    }
    detections
}

/// Read one coordinate field as a finite `f32`.
///
/// Rejects missing fields, non-numbers, non-finite numbers, and values that
/// overflow `f32` when narrowed.
fn finite_coord(record: &Value, key: &str) -> Option<f32> {
    let raw = record.get(key)?.as_f64()?;
    if !raw.is_finite() {
        return None;
    }
    let narrowed = raw as f32;
    if !narrowed.is_finite() {
        return None;
    }
    Some(narrowed)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_records_are_extracted_in_order() {
        let payload = json!([
            {"x1": 10.0, "y1": 20.0, "x2": 110.0, "y2": 220.0},
            {"x1": 5.5, "y1": 6.5, "x2": 7.5, "y2": 8.5},
        ]);

        let batch = normalize_detections(&payload);
        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch[0],
            Detection {
                x1: 10.0,
                y1: 20.0,
                x2: 110.0,
                y2: 220.0
            }
        );
        assert_eq!(batch[1].x1, 5.5);
    }

    #[test]
    fn non_numeric_field_drops_record_but_keeps_siblings() {
        let payload = json!([
            {"x1": "a", "y1": 1, "x2": 2, "y2": 3},
            {"x1": 1, "y1": 1, "x2": 2, "y2": 2},
        ]);

        let batch = normalize_detections(&payload);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].x2, 2.0);
    }

    #[test]
    fn missing_field_drops_record() {
        let payload = json!([
            {"x1": 1, "y1": 1, "x2": 2},
            {"x1": 1, "y1": 1, "x2": 2, "y2": 2},
        ]);

        assert_eq!(normalize_detections(&payload).len(), 1);
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        // JSON has no literal infinity; an f32-overflowing double covers the
        // non-finite-after-narrowing path.
        let payload = json!([
            {"x1": 1e300, "y1": 1, "x2": 2, "y2": 3},
            {"x1": 0, "y1": 0, "x2": 1, "y2": 1},
        ]);

        let batch = normalize_detections(&payload);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].x1, 0.0);
    }

    #[test]
    fn non_array_payloads_yield_empty_batches() {
        for payload in [
            Value::Null,
            json!("detections"),
            json!(42),
            json!({"detections": []}),
        ] {
            assert!(normalize_detections(&payload).is_empty());
        }
    }

    #[test]
    fn empty_array_yields_empty_batch() {
        assert!(normalize_detections(&json!([])).is_empty());
    }

    #[test]
    fn integer_coordinates_are_accepted() {
        let payload = json!([{"x1": 100, "y1": 50, "x2": 500, "y2": 300}]);
        let batch = normalize_detections(&payload);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].y2, 300.0);
    }
}
