use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::warn;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BrainMapError, Result};
use crate::filter::{BooleanMode, FilterState};

pub const SHARE_QUERY_KEY: &str = "view";

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub angle: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub name: String,
    #[serde(default)]
    pub filters: FilterState,
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default)]
    pub camera: Camera,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
}

fn default_zoom() -> f64 {
    1.0
}

impl ViewState {
    pub fn shared(&self) -> SharedView {
        SharedView {
            filters: self.filters.clone(),
            zoom: self.zoom,
            camera: self.camera,
        }
    }
}

/// The part of a view carried by a share link.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SharedView {
    #[serde(default)]
    pub filters: FilterState,
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default)]
    pub camera: Camera,
}

pub fn encode_share(view: &SharedView) -> Result<String> {
    let json = serde_json::to_vec(view).map_err(|error| BrainMapError::Decode(error.to_string()))?;
    Ok(STANDARD.encode(json))
}

pub fn decode_share(payload: &str) -> Result<SharedView> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|error| BrainMapError::MalformedShare(error.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|error| BrainMapError::MalformedShare(error.to_string()))
}

/// Decode a share payload, falling back to defaults when it is corrupt.
pub fn decode_share_or_default(payload: &str) -> (SharedView, Option<BrainMapError>) {
    match decode_share(payload) {
        Ok(view) => (view, None),
        Err(error) => {
            warn!("ignoring shared view: {error}");
            (
                SharedView {
                    filters: FilterState::default(),
                    zoom: default_zoom(),
                    camera: Camera::default(),
                },
                Some(error),
            )
        }
    }
}

pub fn share_url(base: &str, view: &SharedView) -> Result<String> {
    let mut url = Url::parse(base).map_err(|error| BrainMapError::validation(error.to_string()))?;
    let encoded = encode_share(view)?;
    let retained = url
        .query_pairs()
        .filter(|(key, _)| key != SHARE_QUERY_KEY)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect::<Vec<_>>();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair(SHARE_QUERY_KEY, &encoded);
    Ok(url.into())
}

/// Extract the shared view from a full link, if it carries one.
pub fn share_from_url(link: &str) -> Result<Option<SharedView>> {
    let url = Url::parse(link).map_err(|error| BrainMapError::MalformedShare(error.to_string()))?;
    url.query_pairs()
        .find(|(key, _)| key == SHARE_QUERY_KEY)
        .map(|(_, value)| decode_share(&value))
        .transpose()
}

fn seeded_view(name: &str, filters: FilterState) -> ViewState {
    ViewState {
        name: name.to_owned(),
        filters,
        zoom: 1.0,
        camera: Camera::default(),
        timestamp: 0,
        is_default: true,
    }
}

pub fn default_views() -> Vec<ViewState> {
    vec![
        seeded_view("All nodes", FilterState::default()),
        seeded_view("Inbox triage", FilterState::quick_inbox()),
        seeded_view(
            "Active tasks",
            FilterState {
                node_type: "Task".to_owned(),
                status: "active".to_owned(),
                ..FilterState::default()
            },
        ),
        seeded_view(
            "Blocked or high risk",
            FilterState {
                status: "blocked".to_owned(),
                risk: "high".to_owned(),
                boolean_mode: BooleanMode::Or,
                ..FilterState::default()
            },
        ),
    ]
}

/// Seeded default views followed by the user's saved views.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewLibrary {
    defaults: Vec<ViewState>,
    user: Vec<ViewState>,
}

impl Default for ViewLibrary {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ViewLibrary {
    /// Merge persisted user views with the defaults. Persisted entries that
    /// claim to be defaults or shadow a default name are dropped.
    pub fn new(persisted: Vec<ViewState>) -> Self {
        let defaults = default_views();
        let mut user: Vec<ViewState> = Vec::with_capacity(persisted.len());
        for view in persisted {
            let shadows_default = defaults.iter().any(|seeded| seeded.name == view.name);
            if view.is_default || shadows_default || view.name.trim().is_empty() {
                continue;
            }
            if let Some(existing) = user.iter_mut().find(|saved| saved.name == view.name) {
                *existing = view;
            } else {
                user.push(view);
            }
        }
        Self { defaults, user }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViewState> {
        self.defaults.iter().chain(self.user.iter())
    }

    pub fn user_views(&self) -> &[ViewState] {
        &self.user
    }

    pub fn get(&self, name: &str) -> Option<&ViewState> {
        self.iter().find(|view| view.name == name)
    }

    /// Save or overwrite a user view.
    pub fn save(
        &mut self,
        name: &str,
        shared: SharedView,
        timestamp: i64,
    ) -> Result<&ViewState> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BrainMapError::validation("view name is required"));
        }
        if self.defaults.iter().any(|view| view.name == name) {
            return Err(BrainMapError::validation(format!(
                "\"{name}\" is a built-in view"
            )));
        }

        let view = ViewState {
            name: name.to_owned(),
            filters: shared.filters,
            zoom: shared.zoom,
            camera: shared.camera,
            timestamp,
            is_default: false,
        };
        let index = match self.user.iter().position(|saved| saved.name == name) {
            Some(index) => {
                self.user[index] = view;
                index
            }
            None => {
                self.user.push(view);
                self.user.len() - 1
            }
        };
        Ok(&self.user[index])
    }

    pub fn delete(&mut self, name: &str) -> Result<ViewState> {
        if self.defaults.iter().any(|view| view.name == name) {
            return Err(BrainMapError::validation("default views cannot be deleted"));
        }
        let index = self
            .user
            .iter()
            .position(|view| view.name == name)
            .ok_or_else(|| BrainMapError::NotFound(name.to_owned()))?;
        Ok(self.user.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Recency;

    fn sample() -> SharedView {
        SharedView {
            filters: FilterState {
                node_type: "Task".to_owned(),
                tags: "infra, perf".to_owned(),
                recency: Recency::Quarter,
                boolean_mode: BooleanMode::Or,
                ..FilterState::default()
            },
            zoom: 0.35,
            camera: Camera {
                x: -120.5,
                y: 48.25,
                angle: 0.0,
            },
        }
    }

    #[test]
    fn saved_view_loads_back_equivalent_state() {
        let mut library = ViewLibrary::default();
        library.save("Perf work", sample(), 1_700_000_000_000).expect("save");

        let loaded = library.get("Perf work").expect("saved view");
        assert_eq!(loaded.shared(), sample());
        assert!(!loaded.is_default);
    }

    #[test]
    fn share_link_round_trips() {
        let encoded = encode_share(&sample()).expect("encode");
        assert_eq!(decode_share(&encoded).expect("decode"), sample());

        let link = share_url("http://localhost:5173/?type=Task", &sample()).expect("url");
        assert!(link.contains("type=Task"));
        assert_eq!(share_from_url(&link).expect("parse"), Some(sample()));
        assert_eq!(share_from_url("http://localhost:5173/").expect("parse"), None);
    }

    #[test]
    fn malformed_share_payloads_fall_back_to_defaults() {
        assert!(matches!(decode_share("%%%"), Err(BrainMapError::MalformedShare(_))));

        let not_json = STANDARD.encode("not json");
        let (view, error) = decode_share_or_default(&not_json);
        assert!(matches!(error, Some(BrainMapError::MalformedShare(_))));
        assert_eq!(view.filters, FilterState::default());
        assert_eq!(view.zoom, 1.0);
    }

    #[test]
    fn defaults_are_immutable() {
        let mut library = ViewLibrary::default();
        assert!(matches!(library.delete("All nodes"), Err(BrainMapError::Validation(_))));
        assert!(matches!(
            library.save("Inbox triage", sample(), 0),
            Err(BrainMapError::Validation(_))
        ));
        assert!(matches!(library.delete("nope"), Err(BrainMapError::NotFound(_))));
        assert!(matches!(library.save("  ", sample(), 0), Err(BrainMapError::Validation(_))));
    }

    #[test]
    fn saving_twice_overwrites_and_delete_removes() {
        let mut library = ViewLibrary::default();
        library.save("Mine", sample(), 1).expect("save");
        let mut moved = sample();
        moved.zoom = 2.0;
        library.save("Mine", moved, 2).expect("save");

        assert_eq!(library.user_views().len(), 1);
        assert_eq!(library.get("Mine").map(|view| view.zoom), Some(2.0));

        let removed = library.delete("Mine").expect("delete");
        assert_eq!(removed.timestamp, 2);
        assert!(library.user_views().is_empty());
    }

    #[test]
    fn persisted_views_merge_after_defaults() {
        let mut rogue = default_views().remove(0);
        rogue.zoom = 9.0;
        let persisted = vec![
            rogue,
            ViewState {
                name: "Mine".to_owned(),
                filters: FilterState::default(),
                zoom: 1.5,
                camera: Camera::default(),
                timestamp: 5,
                is_default: false,
            },
        ];
        let library = ViewLibrary::new(persisted);
        let names = library.iter().map(|view| view.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names.last(), Some(&"Mine"));
        assert_eq!(library.get("All nodes").map(|view| view.zoom), Some(1.0));
        assert_eq!(names.len(), default_views().len() + 1);
    }

    #[test]
    fn view_json_uses_camel_case_default_flag() {
        let view = default_views().remove(0);
        let json = serde_json::to_value(&view).expect("json");
        assert_eq!(json["isDefault"], serde_json::Value::Bool(true));
        assert_eq!(json["filters"]["recency"], "all");
        assert_eq!(json["filters"]["booleanMode"], "AND");
    }
}
