use std::collections::BTreeSet;

use eframe::egui::{self, Key, Response, RichText, Ui};

use brain_map::export::ExportFormat;
use brain_map::filter::{self, BooleanMode, FilterField, FilterState, Recency};
use brain_map::heat::{self, DEFAULT_HOTSPOT_LIMIT, HOTSPOT_PREVIEW_ROWS, HeatMetric};
use brain_map::interaction::NoticeLevel;
use brain_map::model::{Node, NodeType};
use brain_map::view_state::{encode_share, share_url};

use super::super::ViewModel;
use super::super::render_utils::color;

const SLIDER_KEY_BASE_RATE: f64 = 10.0;
const SLIDER_KEY_ACCEL_PER_SEC: f64 = 9.0;
const SLIDER_KEY_ACCEL_MAX: f64 = 40.0;

#[derive(Clone, Copy, Default)]
struct SliderKeyHoldState {
    positive_secs: f64,
    negative_secs: f64,
}

fn slider_key_accel_multiplier(hold_secs: f64) -> f64 {
    let ramp = hold_secs * SLIDER_KEY_ACCEL_PER_SEC;
    (1.0 + ramp + ramp * ramp * 0.15).min(SLIDER_KEY_ACCEL_MAX)
}

fn default_slider_key_step(min: f64, max: f64) -> f64 {
    ((max - min) / 200.0).max(0.0005)
}

/// Holding an arrow key on a focused slider speeds up the longer it is held.
fn apply_slider_arrow_acceleration(
    ui: &Ui,
    response: &Response,
    value: &mut f64,
    min: f64,
    max: f64,
    step: f64,
) -> bool {
    let state_id = response.id.with("arrow_key_hold_state");
    let mut hold_state = ui.ctx().data(|data| {
        data.get_temp::<SliderKeyHoldState>(state_id)
            .unwrap_or_default()
    });

    if !response.has_focus() {
        ui.ctx()
            .data_mut(|data| data.insert_temp(state_id, SliderKeyHoldState::default()));
        return false;
    }

    let (delta_time, increase_down, decrease_down) = ui.input(|input| {
        (
            f64::from(input.stable_dt.min(0.1)),
            input.key_down(Key::ArrowRight) || input.key_down(Key::ArrowUp),
            input.key_down(Key::ArrowLeft) || input.key_down(Key::ArrowDown),
        )
    });

    hold_state.positive_secs = if increase_down {
        hold_state.positive_secs + delta_time
    } else {
        0.0
    };
    hold_state.negative_secs = if decrease_down {
        hold_state.negative_secs + delta_time
    } else {
        0.0
    };
    ui.ctx()
        .data_mut(|data| data.insert_temp(state_id, hold_state));

    let direction = f64::from(i8::from(increase_down) - i8::from(decrease_down));
    if direction == 0.0 {
        return false;
    }

    let hold_secs = if direction > 0.0 {
        hold_state.positive_secs
    } else {
        hold_state.negative_secs
    };
    let speed = SLIDER_KEY_BASE_RATE * slider_key_accel_multiplier(hold_secs);
    let old_value = *value;
    *value = (*value + direction * step * speed * delta_time).clamp(min, max);
    ui.ctx().request_repaint();
    (*value - old_value).abs() > f64::EPSILON
}

fn tuning_slider(
    ui: &mut Ui,
    value: &mut f64,
    min: f64,
    max: f64,
    text: &str,
    hover: &str,
) {
    let response = ui
        .add(
            egui::Slider::new(&mut *value, min..=max)
                .text(text)
                .clamping(egui::SliderClamping::Always),
        )
        .on_hover_text(hover);
    if response.hovered() {
        response.request_focus();
    }
    let step = default_slider_key_step(min, max);
    apply_slider_arrow_acceleration(ui, &response, value, min, max, step);
}

/// Distinct non-empty values of one node field, for filter dropdowns.
fn distinct_values<'a>(
    nodes: &'a [Node],
    field: impl Fn(&'a Node) -> Option<&'a str>,
) -> Vec<&'a str> {
    nodes
        .iter()
        .filter_map(field)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn choice_combo(ui: &mut Ui, label: &str, current: &mut String, options: &[&str]) -> bool {
    let mut changed = false;
    let selected_text = if current.is_empty() { "Any" } else { current.as_str() }.to_owned();
    egui::ComboBox::from_label(label)
        .selected_text(selected_text)
        .show_ui(ui, |ui| {
            changed |= ui.selectable_value(current, String::new(), "Any").changed();
            for option in options {
                changed |= ui
                    .selectable_value(current, (*option).to_owned(), *option)
                    .changed();
            }
        });
    changed
}

fn format_day(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map(|moment| moment.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_owned())
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Graph Controls");
        ui.separator();

        egui::ScrollArea::vertical()
            .id_salt("controls_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                self.draw_filters(ui);
                ui.separator();
                self.draw_heat(ui);
                ui.separator();
                self.draw_timeline(ui);
                ui.separator();
                self.draw_views(ui);
                ui.separator();
                self.draw_layout_controls(ui);
                ui.separator();
                self.draw_exports(ui);
            });
    }

    fn draw_filters(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Filters").strong());

        let statuses = distinct_values(&self.graph.nodes, |node| Some(node.status.as_str()));
        let priorities = distinct_values(&self.graph.nodes, |node| node.priority.as_deref());
        let risks = distinct_values(&self.graph.nodes, |node| node.risk.as_deref());
        let types = NodeType::ALL.map(NodeType::label);

        let mut changed = false;
        changed |= choice_combo(ui, "Type", &mut self.filters.node_type, &types);
        changed |= choice_combo(ui, "Status", &mut self.filters.status, &statuses);
        changed |= choice_combo(ui, "Priority", &mut self.filters.priority, &priorities);
        changed |= choice_combo(ui, "Risk", &mut self.filters.risk, &risks);

        egui::ComboBox::from_label("Recency")
            .selected_text(self.filters.recency.label())
            .show_ui(ui, |ui| {
                for recency in Recency::ALL {
                    changed |= ui
                        .selectable_value(&mut self.filters.recency, recency, recency.label())
                        .changed();
                }
            });

        ui.horizontal(|ui| {
            ui.label("Tags");
            let response = ui
                .text_edit_singleline(&mut self.tag_input)
                .on_hover_text("Comma-separated; a node must carry every listed tag.");
            if response.changed() {
                self.filters.tags.clone_from(&self.tag_input);
                changed = true;
            }
        });

        ui.horizontal(|ui| {
            ui.label("Combine");
            changed |= ui
                .selectable_value(&mut self.filters.boolean_mode, BooleanMode::And, "AND")
                .on_hover_text("A node must pass every active filter.")
                .changed();
            changed |= ui
                .selectable_value(&mut self.filters.boolean_mode, BooleanMode::Or, "OR")
                .on_hover_text("A node must pass at least one active filter.")
                .changed();
        });

        let chips = self.filters.active_chips();
        if !chips.is_empty() {
            ui.horizontal_wrapped(|ui| {
                for chip in chips {
                    let text = format!("{}: {}  x", chip.label, chip.value);
                    if ui.small_button(text).on_hover_text("Remove this filter").clicked() {
                        self.filters.clear(chip.field);
                        if chip.field == FilterField::Tags {
                            self.tag_input.clear();
                        }
                        changed = true;
                    }
                }
            });
        }

        ui.horizontal(|ui| {
            if ui
                .add_enabled(!self.filters.is_empty(), egui::Button::new("Reset"))
                .clicked()
            {
                self.filters.reset();
                self.tag_input.clear();
                changed = true;
            }
            if ui
                .button("Inbox only")
                .on_hover_text("Show only unprocessed Inbox notes.")
                .clicked()
            {
                self.filters = FilterState::quick_inbox();
                self.tag_input.clear();
                changed = true;
            }
        });

        if changed {
            self.filters_changed();
        }

        ui.horizontal(|ui| {
            let shown = if self.filter_query.is_empty() {
                "no filters"
            } else {
                self.filter_query.as_str()
            };
            ui.small(RichText::new(shown).monospace())
                .on_hover_text("Pass to --filters to reopen with these filters.");
            if ui
                .add_enabled(!self.filter_query.is_empty(), egui::Button::new("Copy").small())
                .clicked()
            {
                ui.ctx().copy_text(self.filter_query.clone());
                self.notify(NoticeLevel::Info, "Filter query copied");
            }
        });

        let now_ms = chrono::Utc::now().timestamp_millis();
        let matched = filter::count_matches(&self.graph.nodes, &self.filters, now_ms);
        ui.small(format!("{matched} of {} nodes match", self.graph.nodes.len()));
    }

    fn draw_heat(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Heat map").strong());

        let mut changed = false;
        let selected_text = self.heat.map_or("Off", |metric| metric.legend().title);
        egui::ComboBox::from_id_salt("heat_metric")
            .selected_text(selected_text)
            .show_ui(ui, |ui| {
                changed |= ui.selectable_value(&mut self.heat, None, "Off").changed();
                for metric in HeatMetric::ALL {
                    changed |= ui
                        .selectable_value(&mut self.heat, Some(metric), metric.legend().title)
                        .changed();
                }
            });
        if changed {
            self.hotspots_expanded = false;
            self.render_dirty = true;
        }

        let Some(metric) = self.heat else {
            return;
        };
        let legend = metric.legend();
        ui.small(legend.description);
        ui.horizontal(|ui| {
            ui.small(legend.low_label);
            for (label, rgb) in heat::legend_keys() {
                let (rect, response) =
                    ui.allocate_exact_size(egui::vec2(18.0, 12.0), egui::Sense::hover());
                ui.painter().rect_filled(rect, 2.0, color(rgb));
                response.on_hover_text(label);
            }
            ui.small(legend.high_label);
        });

        let spots = heat::hotspots(&self.graph.nodes, metric, DEFAULT_HOTSPOT_LIMIT);
        if spots.is_empty() {
            ui.small("No hotspots for this metric.");
            return;
        }
        ui.label("Hotspots");
        let shown = if self.hotspots_expanded {
            spots.len()
        } else {
            spots.len().min(HOTSPOT_PREVIEW_ROWS)
        };
        let mut clicked = None;
        for spot in spots.iter().take(shown) {
            let label = format!("{:.2}  {}  ({})", spot.value, spot.title, spot.node_type);
            let response = ui.link(label);
            let response = match &spot.source_path {
                Some(path) => response.on_hover_text(path.as_str()),
                None => response,
            };
            if response.clicked() {
                clicked = Some(spot.id.clone());
            }
        }
        if spots.len() > HOTSPOT_PREVIEW_ROWS {
            let toggle = if self.hotspots_expanded { "Show less" } else { "Show all" };
            if ui.small_button(toggle).clicked() {
                self.hotspots_expanded = !self.hotspots_expanded;
            }
        }
        if let Some(id) = clicked {
            self.select_node(&id, true);
        }
    }

    fn draw_timeline(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Timeline").strong());

        let mut active = self.playback.timeline().is_active();
        if ui
            .checkbox(&mut active, "Replay by creation date")
            .on_hover_text("Hide nodes created after the selected moment.")
            .changed()
        {
            if active {
                self.playback.enable(&self.graph);
            } else {
                self.playback.disable();
            }
            self.render_dirty = true;
        }

        let timeline = self.playback.timeline();
        let (Some((start, end)), Some(selected)) = (timeline.range_ms(), timeline.selected_ms())
        else {
            if active {
                ui.small("No node carries a creation date.");
            }
            return;
        };
        let playing = timeline.is_playing();

        let mut value = selected as f64;
        let (min, max) = (start as f64, (end as f64).max(start as f64 + 1.0));
        let response = ui.add(
            egui::Slider::new(&mut value, min..=max)
                .show_value(false)
                .clamping(egui::SliderClamping::Always),
        );
        let step = default_slider_key_step(min, max);
        let mut changed = response.changed();
        changed |= apply_slider_arrow_acceleration(ui, &response, &mut value, min, max, step);
        if changed {
            self.playback.seek(value as i64);
            self.render_dirty = true;
        }

        ui.horizontal(|ui| {
            ui.small(format_day(selected));
            if playing {
                if ui.button("Pause").clicked() {
                    self.playback.pause();
                }
            } else if ui.button("Play").clicked() {
                let ctx = ui.ctx().clone();
                self.playback.play(move || ctx.request_repaint());
            }
        });
    }

    fn draw_views(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Saved views").strong());

        let views = self
            .views
            .iter()
            .map(|view| (view.name.clone(), view.is_default))
            .collect::<Vec<_>>();
        let mut apply = None;
        let mut delete = None;
        for (name, is_default) in views {
            ui.horizontal(|ui| {
                if ui.link(name.as_str()).clicked() {
                    apply = Some(name.clone());
                }
                if !is_default && ui.small_button("Delete").clicked() {
                    delete = Some(name.clone());
                }
            });
        }
        if let Some(name) = apply {
            self.apply_view(&name);
        }
        if let Some(name) = delete {
            self.delete_view(&name);
        }

        ui.horizontal(|ui| {
            ui.add(egui::TextEdit::singleline(&mut self.view_name).hint_text("View name"));
            if ui
                .add_enabled(!self.view_name.trim().is_empty(), egui::Button::new("Save"))
                .clicked()
            {
                self.save_view();
            }
        });

        ui.horizontal(|ui| {
            if ui.button("Copy share code").clicked() {
                match encode_share(&self.current_view()) {
                    Ok(payload) => {
                        ui.ctx().copy_text(payload);
                        self.notify(NoticeLevel::Info, "Share code copied");
                    }
                    Err(error) => self.notify(NoticeLevel::Error, error.to_string()),
                }
            }
            if ui.button("Copy link").clicked() {
                let base = self.jobs.api().base_url().to_string();
                match share_url(&base, &self.current_view()) {
                    Ok(link) => {
                        ui.ctx().copy_text(link);
                        self.notify(NoticeLevel::Info, "Share link copied");
                    }
                    Err(error) => self.notify(NoticeLevel::Error, error.to_string()),
                }
            }
        });

        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.share_input).hint_text("Paste a link or code"),
            );
            if ui
                .add_enabled(!self.share_input.trim().is_empty(), egui::Button::new("Open"))
                .clicked()
            {
                let input = std::mem::take(&mut self.share_input);
                self.open_shared_payload(&input);
            }
        });
    }

    fn draw_layout_controls(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Layout").strong());

        let locked = self.controller.layout_locked();
        let label = if locked { "Unlock layout" } else { "Lock layout" };
        if ui
            .button(label)
            .on_hover_text("Freeze the simulation; dragged nodes stay where they are dropped.")
            .clicked()
        {
            self.toggle_layout_lock();
        }

        ui.collapsing("Physics tuning", |ui| {
            let config = &mut self.layout_config;
            tuning_slider(
                ui,
                &mut config.intensity,
                0.2,
                2.5,
                "Intensity",
                "Overall strength applied to all layout forces.",
            );
            tuning_slider(
                ui,
                &mut config.repulsion_scale,
                0.25,
                2.6,
                "Repulsion",
                "How strongly nodes push away from each other.",
            );
            tuning_slider(
                ui,
                &mut config.spring_scale,
                0.2,
                2.2,
                "Link spring",
                "How strongly linked nodes pull toward each other.",
            );
            tuning_slider(
                ui,
                &mut config.collision_scale,
                0.2,
                2.0,
                "Collision",
                "Extra separation between overlapping nodes.",
            );
            tuning_slider(
                ui,
                &mut config.velocity_damping,
                0.78,
                0.97,
                "Velocity damping",
                "How quickly node movement slows each frame.",
            );
        });
    }

    fn draw_exports(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Export").strong());
        ui.horizontal_wrapped(|ui| {
            for format in ExportFormat::ALL {
                if ui.button(format.label()).clicked() {
                    self.export(format);
                }
            }
        });
        ui.small(format!("Saved to {}", self.export_dir.display()));
    }
}
