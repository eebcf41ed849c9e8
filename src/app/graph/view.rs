use std::collections::HashMap;

use eframe::egui::{self, Align2, Color32, FontId, Pos2, RichText, Sense, Shape, Stroke, Ui, vec2};

use brain_map::interaction::InteractionMode;
use brain_map::model::NodeType;
use brain_map::pipeline::RenderKind;

use super::super::ViewModel;
use super::super::render_utils::{
    blend_color, circle_visible, color, draw_background, edge_visible, translucent, world_to_screen,
};
use super::interaction::cursor_for;

enum MenuAction {
    Open(String),
    Promote(String),
    Archive(String),
    Delete(String),
    Close,
}

impl ViewModel {
    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.handle_canvas_input(ui, rect, &response);
        self.refresh_render_set();

        let frame_delta_seconds = ui
            .ctx()
            .input(|input| input.stable_dt)
            .clamp(1.0 / 240.0, 1.0 / 20.0);
        if self.step_layout(frame_delta_seconds) || self.controller.is_gesture_active() {
            ui.ctx().request_repaint();
        }

        let palette = self.theme.palette();
        let viewport = self.viewport();
        draw_background(&painter, rect, palette, viewport);

        let zoom = viewport.zoom as f32;
        let node_scale = zoom.powf(0.40);
        let screen = self
            .render
            .visible_nodes()
            .filter_map(|node| {
                let position = node.position?;
                let radius = (node.visual.size as f32 * node_scale).clamp(2.5, 46.0);
                Some((node.id.as_str(), (world_to_screen(rect, &viewport, position), radius)))
            })
            .collect::<HashMap<_, _>>();

        let zoom_sqrt = zoom.sqrt();
        for edge in self.render.visible_edges() {
            let (Some(&(start, _)), Some(&(end, end_radius))) =
                (screen.get(edge.from.as_str()), screen.get(edge.to.as_str()))
            else {
                continue;
            };
            if !edge_visible(rect, start, end, 2.5) {
                continue;
            }

            let width = (edge.visual.width as f32 * zoom_sqrt).clamp(0.6, 7.0);
            let alpha = if edge.visual.faded { 80 } else { 210 };
            let stroke = Stroke::new(width, translucent(edge.visual.color, alpha));
            painter.line_segment([start, end], stroke);

            let span = end - start;
            let length = span.length();
            if edge.relationship.is_some() && zoom > 0.8 && length > end_radius * 3.0 {
                let direction = span / length;
                let tip = end - direction * (end_radius + 2.0);
                painter.arrow(tip - direction * 9.0, direction * 9.0, stroke);
            }
        }

        if let InteractionMode::CreatingLink {
            source,
            preview,
            hover,
        } = self.controller.mode()
            && let Some(&(start, _)) = screen.get(source.as_str())
        {
            let end = hover
                .as_deref()
                .and_then(|id| screen.get(id))
                .map_or_else(|| world_to_screen(rect, &viewport, *preview), |(point, _)| *point);
            painter.extend(Shape::dashed_line(
                &[start, end],
                Stroke::new(2.0, color(palette.edge_highlight)),
                6.0,
                4.0,
            ));
        }

        let hovered = self.hovered_node(ui, rect);
        let label_color = color(palette.text);
        let label_size = if self.presentation { 17.0 } else { 12.0 };
        let mut selection_animating = false;

        for node in self.render.visible_nodes() {
            let Some(&(center, radius)) = screen.get(node.id.as_str()) else {
                continue;
            };
            if !circle_visible(rect, center, radius) {
                continue;
            }

            let is_selected = self.controller.selection().contains(&node.id);
            let is_hovered = hovered.as_deref() == Some(node.id.as_str());
            let selection_mix = ui.ctx().animate_bool(
                ui.make_persistent_id(("node-selection", node.id.as_str())),
                is_selected,
            );
            if selection_mix > 0.0 && selection_mix < 1.0 {
                selection_animating = true;
            }

            let fill = if node.visual.faded {
                translucent(node.visual.color, 150)
            } else {
                color(node.visual.color)
            };
            let fill = if is_hovered {
                blend_color(fill, Color32::WHITE, 0.25)
            } else {
                fill
            };
            painter.circle_filled(center, radius, fill);
            if selection_mix > 0.0 {
                let halo_strength = (selection_mix * (1.0 - selection_mix) * 4.0).clamp(0.0, 1.0);
                let halo_alpha = (30.0 + (halo_strength * 145.0)) as u8;
                painter.circle_stroke(
                    center,
                    radius + 4.0 + ((1.0 - selection_mix) * 6.0),
                    Stroke::new(
                        1.0 + (halo_strength * 1.6),
                        translucent(palette.edge_highlight, halo_alpha),
                    ),
                );
            }
            painter.circle_stroke(
                center,
                radius,
                Stroke::new(
                    node.visual.border_width as f32 + selection_mix * 1.2,
                    color(node.visual.border_color),
                ),
            );

            let cluster = node.is_cluster();
            if cluster {
                painter.text(
                    center,
                    Align2::CENTER_CENTER,
                    match &node.kind {
                        RenderKind::Cluster { members } => members.len().to_string(),
                        RenderKind::Node(_) => String::new(),
                    },
                    FontId::proportional(label_size),
                    Color32::WHITE,
                );
            }

            let draw_label = cluster
                || is_selected
                || is_hovered
                || self.presentation
                || radius > 17.0
                || zoom > 1.35;
            if draw_label {
                painter.text(
                    center + vec2(radius + 5.0, 0.0),
                    Align2::LEFT_CENTER,
                    &node.label,
                    FontId::proportional(label_size),
                    label_color,
                );
            }
        }

        if selection_animating {
            ui.ctx().request_repaint();
        }

        if let Some(id) = &hovered
            && let Some(node) = self.graph.node(id)
        {
            let panel_text = format!(
                "{}  |  {}  |  {}  |  links {}",
                node.display_title(),
                node.node_type,
                node.status,
                node.links.len()
            );
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                panel_text,
                FontId::proportional(13.0),
                label_color,
            );
        }

        let banner = match self.controller.mode() {
            InteractionMode::PlacingNode => Some("Click on the canvas to place the new node (Esc cancels)"),
            InteractionMode::FindingPath { start: None, .. } => Some("Path finder: click the start node"),
            InteractionMode::FindingPath { .. } => Some("Path finder: click the end node"),
            InteractionMode::CreatingLink { .. } => Some("Release over a node to link"),
            _ => None,
        };
        if let Some(banner) = banner {
            painter.text(
                rect.center_top() + vec2(0.0, 12.0),
                Align2::CENTER_TOP,
                banner,
                FontId::proportional(14.0),
                color(palette.status_info_text),
            );
        }

        let dragging = matches!(
            self.controller.mode(),
            InteractionMode::Panning { .. } | InteractionMode::DraggingNode(_)
        );
        if dragging || hovered.is_some() {
            ui.output_mut(|output| output.cursor_icon = cursor_for(dragging, hovered.is_some()));
        }

        self.draw_context_menu(ui, rect.center());
    }

    fn draw_context_menu(&mut self, ui: &Ui, canvas_center: Pos2) {
        let Some((id, anchor)) = self.context_menu.clone() else {
            return;
        };
        let Some(node) = self.graph.node(&id) else {
            self.context_menu = None;
            return;
        };
        let title = node.display_title().to_owned();
        let is_inbox = node.kind() == NodeType::Inbox;
        let position = canvas_center + vec2(anchor.x as f32, anchor.y as f32);

        let mut action = None;
        egui::Area::new(egui::Id::new("node_context_menu"))
            .order(egui::Order::Foreground)
            .fixed_pos(position)
            .show(ui.ctx(), |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.label(RichText::new(title).strong());
                    ui.separator();
                    if ui.button("Open details").clicked() {
                        action = Some(MenuAction::Open(id.clone()));
                    }
                    if is_inbox && ui.button("Promote to Concept").clicked() {
                        action = Some(MenuAction::Promote(id.clone()));
                    }
                    if ui.button("Archive").clicked() {
                        action = Some(MenuAction::Archive(id.clone()));
                    }
                    if ui.button("Delete").clicked() {
                        action = Some(MenuAction::Delete(id.clone()));
                    }
                    if ui.button("Close").clicked() {
                        action = Some(MenuAction::Close);
                    }
                });
            });

        let Some(action) = action else {
            return;
        };
        self.context_menu = None;
        match action {
            MenuAction::Open(id) => self.select_node(&id, false),
            MenuAction::Promote(id) => self.promote(&id),
            MenuAction::Archive(id) => self.archive(&id),
            MenuAction::Delete(id) => self.delete_node(&id),
            MenuAction::Close => {}
        }
    }
}
