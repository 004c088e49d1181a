//! Parametric trajectory shapes
//!
//! Every shape maps a phase in [0, 1) to a point in a local frame roughly inside [-1, 1], centred on
//! the origin, and every shape is a closed curve: `f(0) == f(1)`, so a phase wrap never makes a jump.

use std::f64::consts::{PI, TAU};

use crate::constants::DEFAULT_SHAPE_RADIUS;
use crate::error::{HubError, HubResult};
use crate::math::DVec3;
use crate::params::ParamBag;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Static,
    Circle,
    Ellipse { aspect: f64 }, // radius_y / radius
    Spiral { turns: f64 },
    Lemniscate,
    Figure8,
    Square,
    Triangle,
    Rose { petals: f64 },
    Lissajous { freq_a: f64, freq_b: f64, phase_offset: f64 },
    Butterfly,
    Heart,
}

/// Parameter keys understood by `ShapeSpec::from_params`
pub const SHAPE_PARAMS: [&str; 9] = [
    "shape", "radius", "radius_y", "elevation", "turns", "petals", "freq_a", "freq_b", "phase_offset",
];

impl Shape {
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Static => "static",
            Shape::Circle => "circle",
            Shape::Ellipse { .. } => "ellipse",
            Shape::Spiral { .. } => "spiral",
            Shape::Lemniscate => "lemniscate",
            Shape::Figure8 => "figure8",
            Shape::Square => "square",
            Shape::Triangle => "triangle",
            Shape::Rose { .. } => "rose",
            Shape::Lissajous { .. } => "lissajous",
            Shape::Butterfly => "butterfly",
            Shape::Heart => "heart",
        }
    }

    /// Unit-scale point for `phase`, in the xy plane
    fn unit_point(&self, phase: f64) -> (f64, f64) {
        let t = TAU * phase;
        match *self {
            Shape::Static => (0.0, 0.0),
            Shape::Circle => (t.cos(), t.sin()),
            Shape::Ellipse { aspect } => (t.cos(), aspect * t.sin()),
            Shape::Spiral { turns } => {
                // winds out and back in over one cycle
                let rho = 0.5 * (1.0 - t.cos());
                let angle = turns * t;
                (rho * angle.cos(), rho * angle.sin())
            },
            Shape::Lemniscate => {
                let d = 1.0 + t.sin() * t.sin();
                (t.cos() / d, t.sin() * t.cos() / d)
            },
            Shape::Figure8 => (t.sin(), t.sin() * t.cos()),
            Shape::Square => polygon(&[(1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0)], phase),
            Shape::Triangle => {
                let (s, c) = (PI / 3.0).sin_cos();
                polygon(&[(0.0, 1.0), (-s, -c), (s, -c)], phase)
            },
            Shape::Rose { petals } => {
                let rho = (petals * t).cos();
                (rho * t.cos(), rho * t.sin())
            },
            Shape::Lissajous { freq_a, freq_b, phase_offset } => {
                ((freq_a * t + phase_offset).sin(), (freq_b * t).sin())
            },
            Shape::Butterfly => {
                // the curve closes after 12 pi
                let u = 6.0 * t;
                let rho = u.cos().exp() - 2.0 * (4.0 * u).cos() - (u / 12.0).sin().powi(5);
                (u.sin() * rho / 4.0, u.cos() * rho / 4.0)
            },
            Shape::Heart => {
                let x = 16.0 * t.sin().powi(3);
                let y = 13.0 * t.cos() - 5.0 * (2.0 * t).cos() - 2.0 * (3.0 * t).cos() - (4.0 * t).cos();
                (x / 16.0, y / 16.0)
            },
        }
    }
}

impl std::str::FromStr for Shape {
    type Err = HubError;

    /// Parses a bare shape name with default shape parameters
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Shape::Static),
            "circle" => Ok(Shape::Circle),
            "ellipse" => Ok(Shape::Ellipse { aspect: 0.5 }),
            "spiral" => Ok(Shape::Spiral { turns: 3.0 }),
            "lemniscate" => Ok(Shape::Lemniscate),
            "figure8" | "figure_8" => Ok(Shape::Figure8),
            "square" => Ok(Shape::Square),
            "triangle" => Ok(Shape::Triangle),
            "rose" => Ok(Shape::Rose { petals: 3.0 }),
            "lissajous" => Ok(Shape::Lissajous { freq_a: 3.0, freq_b: 2.0, phase_offset: PI / 2.0 }),
            "butterfly" => Ok(Shape::Butterfly),
            "heart" => Ok(Shape::Heart),
            other => Err(HubError::InvalidShape(other.to_string())),
        }
    }
}

fn polygon(vertices: &[(f64, f64)], phase: f64) -> (f64, f64) {
    let n = vertices.len();
    let s = phase * n as f64;
    let seg = (s.floor() as usize).min(n - 1);
    let frac = s - seg as f64;
    let (ax, ay) = vertices[seg];
    let (bx, by) = vertices[(seg + 1) % n];
    (ax + (bx - ax) * frac, ay + (by - ay) * frac)
}

fn whole_number(bag: &ParamBag, key: &str, default: f64) -> HubResult<f64> {
    let value = bag.scalar_or(key, default)?;
    if value < 1.0 || value.fract() != 0.0 {
        return Err(HubError::invalid(key, format!("{} must be a whole number >= 1", value)));
    }
    Ok(value)
}

/// A shape plus its scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeSpec {
    pub shape: Shape,
    pub radius: f64,
    pub elevation: f64, // z amplitude
}

impl ShapeSpec {
    pub fn new(shape: Shape, radius: f64) -> Self {
        ShapeSpec { shape, radius, elevation: 0.0 }
    }

    /// Reads `shape` (default circle) and its parameters from a bag
    pub fn from_params(bag: &ParamBag) -> HubResult<Self> {
        let mut shape: Shape = bag.text("shape")?.unwrap_or("circle").parse()?;
        let radius = bag.scalar_or("radius", DEFAULT_SHAPE_RADIUS)?;
        if radius < 0.0 {
            return Err(HubError::invalid("radius", "must not be negative"));
        }

        match &mut shape {
            Shape::Ellipse { aspect } => {
                if let Some(radius_y) = bag.scalar("radius_y")? {
                    *aspect = if radius > 0.0 { radius_y / radius } else { 0.0 };
                }
            },
            Shape::Spiral { turns } => *turns = whole_number(bag, "turns", *turns)?,
            Shape::Rose { petals } => *petals = whole_number(bag, "petals", *petals)?,
            Shape::Lissajous { freq_a, freq_b, phase_offset } => {
                *freq_a = whole_number(bag, "freq_a", *freq_a)?;
                *freq_b = whole_number(bag, "freq_b", *freq_b)?;
                *phase_offset = bag.scalar_or("phase_offset", *phase_offset)?;
            },
            _ => {},
        }

        Ok(ShapeSpec {
            shape,
            radius,
            elevation: bag.scalar_or("elevation", 0.0)?,
        })
    }

    /// Point on the curve for `phase`, relative to the trajectory centre
    pub fn point(&self, phase: f64) -> DVec3 {
        if self.shape == Shape::Static {
            return DVec3::zero();
        }
        let (x, y) = self.shape.unit_point(phase);
        DVec3::new(x * self.radius, y * self.radius, self.elevation * (TAU * phase).sin())
    }

    /// Displacement when the phase moves from `from` to `to`
    pub fn displacement(&self, from: f64, to: f64) -> DVec3 {
        self.point(to) - self.point(from)
    }
}
