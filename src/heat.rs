use serde::{Deserialize, Serialize};

use crate::model::Node;
use crate::theme::Rgb;

pub const NO_DATA_COLOR: Rgb = Rgb::new(0xcc, 0xcc, 0xcc);

pub const LOW_BAND_END: f64 = 0.3;
pub const HIGH_BAND_START: f64 = 0.7;

// Ramp anchors: each band interpolates between two consecutive anchors, so
// band edges share a color.
const COLD: Rgb = Rgb::new(200, 100, 100);
const WARM: Rgb = Rgb::new(255, 165, 0);
const BRIGHT: Rgb = Rgb::new(210, 220, 30);
const HOT: Rgb = Rgb::new(76, 230, 80);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatMetric {
    Recency,
    Density,
    #[default]
    Task,
}

pub struct HeatLegend {
    pub title: &'static str,
    pub description: &'static str,
    pub low_label: &'static str,
    pub high_label: &'static str,
}

impl HeatMetric {
    pub const ALL: [Self; 3] = [Self::Recency, Self::Density, Self::Task];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recency => "recency",
            Self::Density => "density",
            Self::Task => "task",
        }
    }

    pub fn legend(self) -> HeatLegend {
        match self {
            Self::Recency => HeatLegend {
                title: "Recency Heat",
                description: "Recently modified files",
                low_label: "Old",
                high_label: "Recent",
            },
            Self::Density => HeatLegend {
                title: "Link Density",
                description: "Highly connected nodes",
                low_label: "Few links",
                high_label: "Many links",
            },
            Self::Task => HeatLegend {
                title: "Task Heat",
                description: "Open/blocked task activity",
                low_label: "Simple",
                high_label: "Complex",
            },
        }
    }
}

/// Map a normalized metric to the three-band heat ramp.
///
/// Values outside `[0, 1]` are clamped; `None` and NaN map to the no-data gray.
pub fn heat_color(value: Option<f64>) -> Rgb {
    let Some(value) = value.filter(|value| !value.is_nan()) else {
        return NO_DATA_COLOR;
    };
    let value = value.clamp(0.0, 1.0);

    if value < LOW_BAND_END {
        COLD.lerp(WARM, value / LOW_BAND_END)
    } else if value < HIGH_BAND_START {
        WARM.lerp(BRIGHT, (value - LOW_BAND_END) / (HIGH_BAND_START - LOW_BAND_END))
    } else {
        BRIGHT.lerp(HOT, (value - HIGH_BAND_START) / (1.0 - HIGH_BAND_START))
    }
}

/// Legend swatches: low, medium, high, no-data.
pub fn legend_keys() -> [(&'static str, Rgb); 4] {
    [
        ("Low (0.0-0.3)", COLD),
        ("Medium (0.3-0.7)", heat_color(Some(0.5))),
        ("High (0.7-1.0)", HOT),
        ("No data", NO_DATA_COLOR),
    ]
}

#[derive(Clone, Debug, PartialEq)]
pub struct Hotspot {
    pub id: String,
    pub title: String,
    pub node_type: String,
    pub value: f64,
    pub source_path: Option<String>,
}

pub const DEFAULT_HOTSPOT_LIMIT: usize = 10;
pub const HOTSPOT_PREVIEW_ROWS: usize = 5;

/// Nodes with a positive value for `metric`, hottest first.
pub fn hotspots(nodes: &[Node], metric: HeatMetric, limit: usize) -> Vec<Hotspot> {
    let mut ranked = nodes
        .iter()
        .filter_map(|node| {
            let value = node.metrics.value(metric)?;
            (value > 0.0).then(|| Hotspot {
                id: node.id.clone(),
                title: node.display_title().to_owned(),
                node_type: node.node_type.clone(),
                value,
                source_path: node.source_path.clone(),
            })
        })
        .collect::<Vec<_>>();

    ranked.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.id.cmp(&b.id)));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::node;

    #[test]
    fn absent_value_is_no_data() {
        assert_eq!(heat_color(None), NO_DATA_COLOR);
        assert_eq!(heat_color(Some(f64::NAN)), NO_DATA_COLOR);
    }

    #[test]
    fn ramp_is_continuous_at_band_edges() {
        let epsilon = 1e-9;
        assert!(heat_color(Some(LOW_BAND_END - epsilon)).distance(heat_color(Some(LOW_BAND_END))) <= 1);
        assert!(
            heat_color(Some(HIGH_BAND_START - epsilon)).distance(heat_color(Some(HIGH_BAND_START)))
                <= 1
        );
    }

    #[test]
    fn ramp_has_no_large_jumps_anywhere() {
        let mut previous = heat_color(Some(0.0));
        for step in 1..=1000 {
            let color = heat_color(Some(step as f64 / 1000.0));
            assert!(previous.distance(color) <= 3, "jump at step {step}");
            previous = color;
        }
    }

    #[test]
    fn bands_start_and_end_at_anchors() {
        assert_eq!(heat_color(Some(0.0)), COLD);
        assert_eq!(heat_color(Some(0.3)), WARM);
        assert_eq!(heat_color(Some(0.7)), BRIGHT);
        assert_eq!(heat_color(Some(1.0)), HOT);
        assert_eq!(heat_color(Some(7.5)), HOT);
        assert_eq!(heat_color(Some(-1.0)), COLD);
    }

    #[test]
    fn green_channel_rises_through_low_and_mid_bands() {
        let samples = [0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let greens = samples
            .iter()
            .map(|value| heat_color(Some(*value)).g)
            .collect::<Vec<_>>();
        assert!(greens.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn hotspots_rank_positive_values_descending() {
        let mut a = node("a", "task", &[]);
        a.metrics.task = Some(0.4);
        let mut b = node("b", "task", &[]);
        b.metrics.task = Some(0.9);
        let mut c = node("c", "task", &[]);
        c.metrics.task = Some(0.0);
        let d = node("d", "task", &[]);

        let ranked = hotspots(&[a, b, c, d], HeatMetric::Task, 10);
        let ids = ranked.iter().map(|hotspot| hotspot.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["b", "a"]);

        let none = hotspots(&ranked_nodes(), HeatMetric::Density, 10);
        assert!(none.is_empty());
    }

    fn ranked_nodes() -> Vec<Node> {
        vec![node("x", "task", &[])]
    }
}
