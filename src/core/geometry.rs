//! Geometry Helpers
//!
//! Pure functions used by bullet sweeps and placement checks.

use super::vec2::Vec2;

/// Shortest distance from point `p` to the segment `a -> b`.
///
/// Degenerate segments (a == b) fall back to point distance.
#[inline]
pub fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return p.distance(a);
    }

    // Projection of p onto the infinite line, clamped to the segment
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    let closest = a + ab.scale(t);
    p.distance(closest)
}

/// Check if a point lies inside (or on) a circle.
#[inline]
pub fn circle_contains(center: Vec2, radius: f32, point: Vec2) -> bool {
    center.distance_squared(point) <= radius * radius
}

/// Swept circle test: does the segment `from -> to` pass within
/// `radius` of `center`?
#[inline]
pub fn segment_hits_circle(from: Vec2, to: Vec2, center: Vec2, radius: f32) -> bool {
    point_segment_distance(center, from, to) < radius
}

/// Check if a point lies in the axis-aligned rectangle `[0, width] x [0, height]`.
#[inline]
pub fn in_rect(point: Vec2, width: f32, height: f32) -> bool {
    point.x >= 0.0 && point.x <= width && point.y >= 0.0 && point.y <= height
}

// =============================================================================
// TESTS
// =============================================================================
