//! Selector types of the live parameter state
//!
//! Each selector is a closed enum; parsing accepts the protocol names (and a
//! few legacy aliases), serialization uses the lowercase canonical name.
//! Stored names are read case-insensitively and an unknown name falls back
//! to the default variant.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::warn;

/// Geometry drawn by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Circle,
    Line,
    Triangle,
    Square,
    StaticWave,
}

impl Shape {
    pub const ALL: [Shape; 5] = [
        Shape::Circle,
        Shape::Line,
        Shape::Triangle,
        Shape::Square,
        Shape::StaticWave,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "circle" => Some(Shape::Circle),
            "line" => Some(Shape::Line),
            "triangle" => Some(Shape::Triangle),
            "square" => Some(Shape::Square),
            "wave" | "staticwave" => Some(Shape::StaticWave),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Shape::Circle => "circle",
            Shape::Line => "line",
            Shape::Triangle => "triangle",
            Shape::Square => "square",
            Shape::StaticWave => "staticwave",
        }
    }
}

/// Palette color used when no custom color is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSel {
    #[default]
    Blue,
    Red,
    Green,
}

impl ColorSel {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "blue" => Some(ColorSel::Blue),
            "red" => Some(ColorSel::Red),
            "green" => Some(ColorSel::Green),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorSel::Blue => "blue",
            ColorSel::Red => "red",
            ColorSel::Green => "green",
        }
    }

    /// Normalized RGB of the palette entry
    pub fn rgb(&self) -> [f32; 3] {
        let [r, g, b] = match self {
            ColorSel::Red => [255u8, 0, 20],
            ColorSel::Green => [0, 220, 80],
            ColorSel::Blue => [0, 50, 255],
        };
        [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
    }
}

/// Position modulation pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Movement {
    #[default]
    None,
    Circle,
    Pan,
    Tilt,
    Eight,
    Random,
}

impl Movement {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Some(Movement::None),
            "circle" => Some(Movement::Circle),
            "pan" => Some(Movement::Pan),
            "tilt" => Some(Movement::Tilt),
            "eight" | "figure8" | "8" => Some(Movement::Eight),
            "random" => Some(Movement::Random),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Movement::None => "none",
            Movement::Circle => "circle",
            Movement::Pan => "pan",
            Movement::Tilt => "tilt",
            Movement::Eight => "eight",
            Movement::Random => "random",
        }
    }
}

/// Beam effect selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeamFx {
    #[default]
    None,
    Prisma,
}

impl BeamFx {
    pub fn name(&self) -> &'static str {
        match self {
            BeamFx::None => "none",
            BeamFx::Prisma => "prisma",
        }
    }
}

macro_rules! display_by_name {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        })*
    };
}

display_by_name!(Shape, ColorSel, Movement, BeamFx);

macro_rules! deserialize_by_parse {
    ($($ty:ty),*) => {
        $(impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let name = String::deserialize(deserializer)?;
                Ok(<$ty>::parse(&name).unwrap_or_else(|| {
                    let fallback = <$ty>::default();
                    warn!("Unknown {} '{}', using {}", stringify!($ty), name, fallback);
                    fallback
                }))
            }
        })*
    };
}

deserialize_by_parse!(Shape, ColorSel, Movement);
