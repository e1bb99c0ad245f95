//! This module contains the value types shared by the classifier and its
//! search backends.

use num_traits::{AsPrimitive, Float};

/// A 2D point with named coordinates.
///
/// - `F`: The type of the coordinates (e.g., `f64`, `f32`).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point2<F> {
    pub x: F,
    pub y: F,
}

impl<F> Point2<F> {
    pub fn new(x: F, y: F) -> Self {
        Point2 { x, y }
    }
}

impl<F: Copy> Point2<F> {
    /// Coordinate along a split axis: 0 is x, 1 is y.
    pub fn coordinate(&self, axis: usize) -> F {
        match axis {
            0 => self.x,
            _ => self.y,
        }
    }
}

/// A training point paired with its class label.
///
/// - `F`: The type of the coordinates.
/// - `L`: The type of the label (e.g., `i32`, `String`, an enum).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabeledPoint<F, L> {
    pub point: Point2<F>,
    pub label: L,
}

impl<F, L> LabeledPoint<F, L> {
    pub fn new(point: Point2<F>, label: L) -> Self {
        LabeledPoint { point, label }
    }
}

/// Manhattan distance `|dx| + |dy|` between two points.
pub fn manhattan_distance<F>(a: Point2<F>, b: Point2<F>) -> f64
where
    F: Float + AsPrimitive<f64>,
{
    ((a.x - b.x).abs() + (a.y - b.y).abs()).as_()
}
