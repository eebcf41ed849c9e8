use std::time::Instant;

use eframe::egui::{self, Align, Align2, Context, Key, Layout, RichText, vec2};

use brain_map::activity::LEVEL_COLORS;
use brain_map::interaction::{InteractionMode, NoticeLevel};
use brain_map::model::NodeType;
use brain_map::theme::ThemeMode;

use super::super::render_utils::color;
use super::super::ViewModel;
use super::super::actions::split_tags;

impl ViewModel {
    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        reload_requested: &mut bool,
        is_loading: bool,
    ) {
        self.poll_jobs();
        if std::mem::take(&mut self.reload_requested) {
            *reload_requested = true;
        }
        if self.playback.poll() > 0 {
            self.render_dirty = true;
        }
        self.handle_shortcuts(ctx);
        self.poll_search(ctx);
        self.handle_screenshot(ctx);

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("Brain Map");
                    ui.separator();
                    ui.label(format!("nodes: {}", self.graph.nodes.len()));
                    ui.label(format!("edges: {}", self.graph.edges.len()));
                    let reload_button = ui.add_enabled(!is_loading, egui::Button::new("Reload"));
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }
                    if ui.button("Search").on_hover_text("Ctrl+K").clicked() {
                        self.search.open = true;
                    }
                    if ui.button("Quick add").clicked() {
                        self.quick_add.open = true;
                    }

                    let path_finding =
                        matches!(self.controller.mode(), InteractionMode::FindingPath { .. });
                    if ui.selectable_label(path_finding, "Path finder").clicked() {
                        self.set_path_finder(!path_finding);
                    }
                    if ui.button("Insights").clicked() {
                        self.insights.open = true;
                        self.refresh_insights();
                    }
                    if ui.button("Activity").clicked() {
                        self.activity.open = true;
                        self.load_activity();
                    }
                    if ui
                        .selectable_label(self.presentation, "Present")
                        .on_hover_text("Hide the side panels; Esc leaves presentation mode.")
                        .clicked()
                    {
                        self.presentation = !self.presentation;
                    }

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        let theme_label = match self.theme.toggled() {
                            ThemeMode::Light => "Light theme",
                            ThemeMode::Dark => "Dark theme",
                        };
                        if ui.button(theme_label).clicked() {
                            self.set_theme(ui.ctx(), self.theme.toggled());
                        }
                        ui.label(format!(
                            "visible: {} of {}",
                            self.render.matched_count, self.render.total_count
                        ));
                        if is_loading {
                            ui.spinner();
                        }
                    });
                });
            });

        if !self.presentation {
            egui::SidePanel::left("controls")
                .resizable(true)
                .default_width(320.0)
                .show(ctx, |ui| self.draw_controls(ui));

            egui::SidePanel::right("details")
                .resizable(true)
                .default_width(360.0)
                .show(ctx, |ui| self.draw_details(ui));
        }

        egui::CentralPanel::default().show(ctx, |ui| self.draw_graph(ui));

        self.draw_search_window(ctx);
        self.draw_quick_add_window(ctx);
        self.draw_insights_window(ctx);
        self.draw_activity_window(ctx);
        self.draw_plan_window(ctx);
        self.draw_notices(ctx);
    }

    fn handle_shortcuts(&mut self, ctx: &Context) {
        let (open_search, escape) = ctx.input(|input| {
            (
                input.modifiers.command && input.key_pressed(Key::K),
                input.key_pressed(Key::Escape),
            )
        });
        if open_search {
            self.search.open = true;
        }
        if escape {
            self.presentation = false;
            self.search.open = false;
        }
    }

    fn poll_search(&mut self, ctx: &Context) {
        let now = Instant::now();
        if let Some(query) = self.search.debouncer.poll(now) {
            self.run_search(query);
        }
        if let Some(deadline) = self.search.debouncer.deadline() {
            ctx.request_repaint_after(deadline.saturating_duration_since(now));
        }
    }

    fn handle_screenshot(&mut self, ctx: &Context) {
        if std::mem::take(&mut self.pending_screenshot) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Screenshot(egui::UserData::default()));
        }
        let image = ctx.input(|input| {
            input.raw.events.iter().find_map(|event| match event {
                egui::Event::Screenshot { image, .. } => Some(image.clone()),
                _ => None,
            })
        });
        if let Some(image) = image {
            let result = self.write_screenshot(&image);
            self.report_export(result);
        }
    }

    fn draw_search_window(&mut self, ctx: &Context) {
        if !self.search.open {
            return;
        }
        let mut open = true;
        let mut chosen = None;
        egui::Window::new("Search")
            .open(&mut open)
            .collapsible(false)
            .anchor(Align2::CENTER_TOP, vec2(0.0, 60.0))
            .default_width(420.0)
            .show(ctx, |ui| {
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.search.query)
                        .hint_text("Search titles and notes")
                        .desired_width(f32::INFINITY),
                );
                response.request_focus();
                if response.changed() {
                    if self.search.query.trim().is_empty() {
                        self.search.debouncer.cancel();
                        self.gates.search.invalidate();
                        self.search.results.clear();
                        self.search.loading = false;
                    } else {
                        self.search
                            .debouncer
                            .input(self.search.query.trim(), Instant::now());
                    }
                }

                if self.search.loading {
                    ui.spinner();
                }
                egui::ScrollArea::vertical().max_height(320.0).show(ui, |ui| {
                    for item in &self.search.results {
                        let label = format!("{}  ({}, {})", item.title, item.node_type, item.status);
                        let response = ui.link(label);
                        let response = if item.tags.is_empty() {
                            response
                        } else {
                            response.on_hover_text(item.tags.join(", "))
                        };
                        if response.clicked() {
                            chosen = Some(item.id.clone());
                        }
                    }
                    if self.search.results.is_empty()
                        && !self.search.loading
                        && !self.search.query.trim().is_empty()
                    {
                        ui.small("No matches.");
                    }
                });
            });

        self.search.open = open;
        if let Some(id) = chosen {
            self.search.open = false;
            if self.graph.node(&id).is_some() {
                self.select_node(&id, true);
            } else {
                self.notify(NoticeLevel::Info, "That node is not loaded yet; reload to see it");
            }
        }
    }

    fn draw_quick_add_window(&mut self, ctx: &Context) {
        if !self.quick_add.open {
            return;
        }
        let mut open = true;
        let mut place = false;
        egui::Window::new("Quick add")
            .open(&mut open)
            .collapsible(false)
            .default_width(360.0)
            .show(ctx, |ui| {
                let draft = &mut self.quick_add;
                ui.horizontal(|ui| {
                    ui.label("Title");
                    ui.text_edit_singleline(&mut draft.title);
                });
                egui::ComboBox::from_label("Type")
                    .selected_text(draft.node_type.clone())
                    .show_ui(ui, |ui| {
                        for node_type in NodeType::ALL {
                            ui.selectable_value(
                                &mut draft.node_type,
                                node_type.label().to_owned(),
                                node_type.label(),
                            );
                        }
                    });
                ui.horizontal(|ui| {
                    ui.label("Status");
                    ui.text_edit_singleline(&mut draft.status);
                });
                ui.horizontal(|ui| {
                    ui.label("Tags");
                    ui.text_edit_singleline(&mut draft.tags);
                });
                ui.label("Body");
                ui.add(
                    egui::TextEdit::multiline(&mut draft.body)
                        .desired_rows(5)
                        .desired_width(f32::INFINITY),
                );
                let ready = !draft.title.trim().is_empty() && !draft.body.trim().is_empty();
                let tags = split_tags(&draft.tags);
                if !tags.is_empty() {
                    ui.small(format!("tags: {}", tags.join(" | ")));
                }
                place = ui
                    .add_enabled(ready, egui::Button::new("Place on canvas"))
                    .on_hover_text("Then click where the node should go.")
                    .clicked();
            });

        self.quick_add.open = open;
        if place {
            self.quick_add.open = false;
            self.set_placing(true);
        }
    }

    fn draw_insights_window(&mut self, ctx: &Context) {
        if !self.insights.open {
            return;
        }
        let mut open = true;
        let mut refresh = false;
        egui::Window::new("Insights")
            .open(&mut open)
            .default_width(380.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.add(
                        egui::Slider::new(&mut self.insights.threshold_days, 1..=90)
                            .text("stale after days"),
                    );
                    refresh = ui.button("Refresh").clicked();
                    if self.insights.loading {
                        ui.spinner();
                    }
                });

                if let Some(metrics) = &self.insights.metrics {
                    egui::Grid::new("graph_metrics").striped(true).show(ui, |ui| {
                        let rows = [
                            ("Nodes", metrics.node_count.to_string()),
                            ("Edges", metrics.edge_count.to_string()),
                            ("Orphans", metrics.orphan_count.to_string()),
                            ("Average degree", format!("{:.2}", metrics.avg_degree)),
                            ("Components", metrics.num_components.to_string()),
                            ("Largest component", metrics.largest_component_size.to_string()),
                        ];
                        for (label, value) in rows {
                            ui.label(label);
                            ui.label(value);
                            ui.end_row();
                        }
                    });
                }

                ui.separator();
                ui.label(RichText::new("Suggestions").strong());
                if self.insights.suggestions.is_empty() {
                    ui.small("Nothing to suggest.");
                }
                for suggestion in &self.insights.suggestions {
                    ui.horizontal_wrapped(|ui| {
                        if !suggestion.priority.is_empty() {
                            ui.small(format!("[{}]", suggestion.priority));
                        }
                        ui.label(RichText::new(suggestion.title.as_str()).strong());
                    });
                    if !suggestion.description.is_empty() {
                        ui.label(suggestion.description.as_str());
                    }
                    if !suggestion.action.is_empty() {
                        ui.small(suggestion.action.as_str());
                    }
                    ui.add_space(4.0);
                }
            });

        self.insights.open = open;
        if refresh {
            self.refresh_insights();
        }
    }

    fn draw_activity_window(&mut self, ctx: &Context) {
        if !self.activity.open {
            return;
        }
        let mut open = true;
        egui::Window::new("Activity")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                if self.activity.loading {
                    ui.spinner();
                }
                let Some(calendar) = &self.activity.calendar else {
                    return;
                };
                ui.label(format!(
                    "{} changes, busiest day {}",
                    calendar.total, calendar.max_count
                ));

                const CELL: f32 = 11.0;
                const GAP: f32 = 2.0;
                ui.horizontal(|ui| {
                    ui.spacing_mut().item_spacing.x = GAP;
                    for week in &calendar.weeks {
                        ui.vertical(|ui| {
                            ui.spacing_mut().item_spacing.y = GAP;
                            ui.small(week.month_label.as_deref().unwrap_or(" "));
                            for day in &week.days {
                                let (rect, response) =
                                    ui.allocate_exact_size(vec2(CELL, CELL), egui::Sense::hover());
                                let Some(day) = day else {
                                    continue;
                                };
                                let fill = LEVEL_COLORS[day.level.min(LEVEL_COLORS.len() - 1)];
                                ui.painter().rect_filled(rect, 2.0, color(fill));
                                response.on_hover_text(format!("{}: {} changes", day.date, day.count));
                            }
                        });
                    }
                });
                ui.horizontal(|ui| {
                    ui.small("Less");
                    for fill in LEVEL_COLORS {
                        let (rect, _) = ui.allocate_exact_size(vec2(CELL, CELL), egui::Sense::hover());
                        ui.painter().rect_filled(rect, 2.0, color(fill));
                    }
                    ui.small("More");
                });
            });
        self.activity.open = open;
    }

    fn draw_plan_window(&mut self, ctx: &Context) {
        if !self.plan.open {
            return;
        }
        let mut open = true;
        egui::Window::new("Plan")
            .open(&mut open)
            .default_width(460.0)
            .show(ctx, |ui| {
                if self.plan.loading {
                    ui.spinner();
                    return;
                }
                let Some(markdown) = &self.plan.markdown else {
                    ui.small("No plan yet.");
                    return;
                };
                if ui.button("Copy").clicked() {
                    ui.ctx().copy_text(markdown.clone());
                }
                egui::ScrollArea::vertical().max_height(420.0).show(ui, |ui| {
                    ui.label(RichText::new(markdown.as_str()).monospace());
                });
            });
        self.plan.open = open;
        if !open {
            self.gates.plan.invalidate();
        }
    }

    fn draw_notices(&mut self, ctx: &Context) {
        let now = Instant::now();
        self.notices.retain(|notice| notice.expires > now);
        let Some(next_expiry) = self.notices.iter().map(|notice| notice.expires).min() else {
            return;
        };
        ctx.request_repaint_after(next_expiry.saturating_duration_since(now));

        let palette = self.theme.palette();
        egui::Area::new(egui::Id::new("notices"))
            .order(egui::Order::Foreground)
            .anchor(Align2::RIGHT_BOTTOM, vec2(-16.0, -16.0))
            .show(ctx, |ui| {
                for notice in &self.notices {
                    let (fill, text) = match notice.level {
                        NoticeLevel::Success => (palette.status_success, palette.status_success_text),
                        NoticeLevel::Error => (palette.status_error, palette.status_error_text),
                        NoticeLevel::Info => (palette.status_info, palette.status_info_text),
                    };
                    egui::Frame::new()
                        .fill(color(fill))
                        .corner_radius(4.0)
                        .inner_margin(8.0)
                        .show(ui, |ui| {
                            ui.label(RichText::new(notice.message.as_str()).color(color(text)));
                        });
                    ui.add_space(4.0);
                }
            });
    }
}
