use serde::{Deserialize, Serialize};

use crate::model::NodeType;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn lerp(self, other: Rgb, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }

    /// Largest per-channel difference, used to compare colors with a tolerance.
    pub fn distance(self, other: Rgb) -> u8 {
        self.r
            .abs_diff(other.r)
            .max(self.g.abs_diff(other.g))
            .max(self.b.abs_diff(other.b))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
}

impl ThemeMode {
    /// Unknown mode names resolve to dark.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Self::Light,
            _ => Self::Dark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    pub fn palette(self) -> &'static Palette {
        match self {
            Self::Light => &LIGHT,
            Self::Dark => &DARK,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    pub background: Rgb,
    pub background_secondary: Rgb,
    pub text: Rgb,
    pub text_secondary: Rgb,
    pub panel_border: Rgb,
    pub panel_background: Rgb,
    pub panel_background_alt: Rgb,
    pub button_background_active: Rgb,
    pub node_inbox: Rgb,
    pub node_concept: Rgb,
    pub node_system: Rgb,
    pub node_decision: Rgb,
    pub node_task: Rgb,
    pub node_artifact: Rgb,
    pub node_default: Rgb,
    pub status_success: Rgb,
    pub status_success_text: Rgb,
    pub status_error: Rgb,
    pub status_error_text: Rgb,
    pub status_info: Rgb,
    pub status_info_text: Rgb,
    pub canvas_background: Rgb,
    pub edge_default: Rgb,
    pub edge_highlight: Rgb,
}

impl Palette {
    pub fn node_color(&self, node_type: NodeType) -> Rgb {
        match node_type {
            NodeType::Inbox => self.node_inbox,
            NodeType::Concept => self.node_concept,
            NodeType::System => self.node_system,
            NodeType::Decision => self.node_decision,
            NodeType::Task => self.node_task,
            NodeType::Artifact => self.node_artifact,
            NodeType::Other => self.node_default,
        }
    }
}

static LIGHT: Palette = Palette {
    background: Rgb::new(0xff, 0xff, 0xff),
    background_secondary: Rgb::new(0xf9, 0xf9, 0xf9),
    text: Rgb::new(0x33, 0x33, 0x33),
    text_secondary: Rgb::new(0x66, 0x66, 0x66),
    panel_border: Rgb::new(0xdd, 0xdd, 0xdd),
    panel_background: Rgb::new(0xff, 0xff, 0xff),
    panel_background_alt: Rgb::new(0xf5, 0xf5, 0xf5),
    button_background_active: Rgb::new(0x4c, 0xaf, 0x50),
    node_inbox: Rgb::new(0x95, 0xa5, 0xa6),
    node_concept: Rgb::new(0x34, 0x98, 0xdb),
    node_system: Rgb::new(0x9b, 0x59, 0xb6),
    node_decision: Rgb::new(0xe6, 0x7e, 0x22),
    node_task: Rgb::new(0x2e, 0xcc, 0x71),
    node_artifact: Rgb::new(0xf3, 0x9c, 0x12),
    node_default: Rgb::new(0x95, 0xa5, 0xa6),
    status_success: Rgb::new(0xd4, 0xed, 0xda),
    status_success_text: Rgb::new(0x15, 0x57, 0x24),
    status_error: Rgb::new(0xf8, 0xd7, 0xda),
    status_error_text: Rgb::new(0x72, 0x1c, 0x24),
    status_info: Rgb::new(0xe3, 0xf2, 0xfd),
    status_info_text: Rgb::new(0x19, 0x76, 0xd2),
    canvas_background: Rgb::new(0xf8, 0xf9, 0xfa),
    edge_default: Rgb::new(0x99, 0x99, 0x99),
    edge_highlight: Rgb::new(0x00, 0xbc, 0xd4),
};

// Node colors are desaturated for dark backgrounds.
static DARK: Palette = Palette {
    background: Rgb::new(0x1a, 0x1a, 0x1a),
    background_secondary: Rgb::new(0x24, 0x24, 0x24),
    text: Rgb::new(0xe0, 0xe0, 0xe0),
    text_secondary: Rgb::new(0xa0, 0xa0, 0xa0),
    panel_border: Rgb::new(0x3a, 0x3a, 0x3a),
    panel_background: Rgb::new(0x24, 0x24, 0x24),
    panel_background_alt: Rgb::new(0x2a, 0x2a, 0x2a),
    button_background_active: Rgb::new(0x38, 0x8e, 0x3c),
    node_inbox: Rgb::new(0x6b, 0x7b, 0x7d),
    node_concept: Rgb::new(0x24, 0x71, 0xa3),
    node_system: Rgb::new(0x6c, 0x34, 0x83),
    node_decision: Rgb::new(0xb9, 0x67, 0x0f),
    node_task: Rgb::new(0x23, 0x9b, 0x56),
    node_artifact: Rgb::new(0xb9, 0x77, 0x0e),
    node_default: Rgb::new(0x6b, 0x7b, 0x7d),
    status_success: Rgb::new(0x1e, 0x46, 0x20),
    status_success_text: Rgb::new(0x81, 0xc7, 0x84),
    status_error: Rgb::new(0x4a, 0x1f, 0x1f),
    status_error_text: Rgb::new(0xe5, 0x73, 0x73),
    status_info: Rgb::new(0x1a, 0x3a, 0x52),
    status_info_text: Rgb::new(0x64, 0xb5, 0xf6),
    canvas_background: Rgb::new(0x1e, 0x1e, 0x1e),
    edge_default: Rgb::new(0x50, 0x50, 0x50),
    edge_highlight: Rgb::new(0x00, 0xac, 0xc1),
};
