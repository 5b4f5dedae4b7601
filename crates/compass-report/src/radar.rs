//! Radar-chart geometry.
//!
//! Pure layout: coordinates for grid rings, axes, labels and the score
//! polygon. Drawing is left to whoever consumes the geometry.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use compass_core::scoring::round2;

use crate::insights::ClusterInsight;

/// Canvas size and radii of the chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarLayout {
    #[serde(default = "default_size")]
    pub width: f64,
    #[serde(default = "default_size")]
    pub height: f64,
    #[serde(default = "default_radius")]
    pub radius: f64,
    /// Distance of the labels beyond the outer ring.
    #[serde(default = "default_label_offset")]
    pub label_offset: f64,
}

fn default_size() -> f64 {
    400.0
}

fn default_radius() -> f64 {
    140.0
}

fn default_label_offset() -> f64 {
    20.0
}

impl Default for RadarLayout {
    fn default() -> Self {
        Self {
            width: default_size(),
            height: default_size(),
            radius: default_radius(),
            label_offset: default_label_offset(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One grid ring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarCircle {
    /// Percentage the ring stands for (25, 50, 75, 100).
    pub level: u32,
    pub r: f64,
}

/// Axis line from the center to the outer ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarAxis {
    pub name: String,
    /// Degrees, `-90` pointing up.
    pub angle: f64,
    pub start: Point,
    pub end: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

impl TextAnchor {
    pub fn as_str(self) -> &'static str {
        match self {
            TextAnchor::Start => "start",
            TextAnchor::Middle => "middle",
            TextAnchor::End => "end",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarLabel {
    pub text: String,
    pub percentage: u32,
    pub position: Point,
    pub anchor: TextAnchor,
}

/// Everything needed to draw the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarGeometry {
    pub width: f64,
    pub height: f64,
    pub center: Point,
    pub radius: f64,
    pub circles: Vec<RadarCircle>,
    pub axes: Vec<RadarAxis>,
    pub labels: Vec<RadarLabel>,
    pub polygon: Vec<Point>,
    /// `polygon` as an SVG `points` attribute.
    pub polygon_points: String,
}

/// Labels closer than this to the vertical axis are centered.
const CENTER_TOLERANCE: f64 = 1.0;

fn polar(center: Point, distance: f64, angle: f64) -> Point {
    Point {
        x: round2(center.x + distance * angle.cos()),
        y: round2(center.y + distance * angle.sin()),
    }
}

/// Lay out `insights` evenly around a circle starting at the top.
///
/// Returns `None` when there is nothing to draw.
pub fn compute_radar(insights: &[ClusterInsight], layout: &RadarLayout) -> Option<RadarGeometry> {
    if insights.is_empty() {
        return None;
    }

    let center = Point {
        x: layout.width / 2.0,
        y: layout.height / 2.0,
    };
    let step = 2.0 * PI / insights.len() as f64;

    let circles = (1..=4)
        .map(|quarter| RadarCircle {
            level: quarter * 25,
            r: round2(layout.radius * f64::from(quarter) / 4.0),
        })
        .collect();

    let mut axes = Vec::with_capacity(insights.len());
    let mut labels = Vec::with_capacity(insights.len());
    let mut polygon = Vec::with_capacity(insights.len());

    for (i, insight) in insights.iter().enumerate() {
        let angle = -PI / 2.0 + step * i as f64;

        axes.push(RadarAxis {
            name: insight.name.clone(),
            angle: round2(angle.to_degrees()),
            start: center,
            end: polar(center, layout.radius, angle),
        });

        let distance = layout.radius * f64::from(insight.percentage.min(100)) / 100.0;
        polygon.push(polar(center, distance, angle));

        let position = polar(center, layout.radius + layout.label_offset, angle);
        let anchor = if (position.x - center.x).abs() < CENTER_TOLERANCE {
            TextAnchor::Middle
        } else if position.x > center.x {
            TextAnchor::Start
        } else {
            TextAnchor::End
        };
        labels.push(RadarLabel {
            text: insight.name.clone(),
            percentage: insight.percentage,
            position,
            anchor,
        });
    }

    let polygon_points = polygon
        .iter()
        .map(|p| format!("{},{}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ");

    Some(RadarGeometry {
        width: layout.width,
        height: layout.height,
        center,
        radius: layout.radius,
        circles,
        axes,
        labels,
        polygon,
        polygon_points,
    })
}
