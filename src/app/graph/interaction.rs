use eframe::egui::{self, Key, Rect, Response, Ui};

use brain_map::cluster;
use brain_map::interaction::{Effect, InputEvent, NoticeLevel};

use super::super::ViewModel;
use super::super::render_utils::canvas_point;

impl ViewModel {
    /// Translate this frame's pointer and keyboard state into controller events.
    pub(in crate::app) fn handle_canvas_input(&mut self, ui: &Ui, rect: Rect, response: &Response) {
        let (pointer, pressed, released, shift, scroll, escape, time) = ui.input(|input| {
            (
                input.pointer.latest_pos(),
                input.pointer.primary_pressed(),
                input.pointer.primary_released(),
                input.modifiers.shift,
                input.raw_scroll_delta.y,
                input.key_pressed(Key::Escape),
                input.time,
            )
        });
        let time_ms = (time * 1000.0) as u64;
        let mut events = Vec::new();

        if response.hovered() && scroll.abs() > f32::EPSILON {
            let anchor = pointer.map_or_else(Default::default, |pointer| canvas_point(rect, pointer));
            let factor = f64::from((1.0 + scroll * 0.0018).clamp(0.85, 1.15));
            events.push(InputEvent::Wheel { anchor, factor });
        }

        if let Some(pointer) = pointer {
            let point = canvas_point(rect, pointer);
            if pressed && response.hovered() {
                self.canvas_press = true;
                self.context_menu = None;
                events.push(InputEvent::PointerDown {
                    point,
                    shift,
                    time_ms,
                });
            } else if self.canvas_press || self.controller.is_gesture_active() {
                events.push(InputEvent::PointerMove { point, time_ms });
            }
            if released && self.canvas_press {
                self.canvas_press = false;
                events.push(InputEvent::PointerUp { point, time_ms });
            }
        } else if self.canvas_press {
            events.push(InputEvent::Tick { time_ms });
        }

        if escape {
            self.context_menu = None;
            events.push(InputEvent::Escape);
        }

        for event in events {
            let effects = self.controller.handle(event, &self.scene, &self.graph);
            self.apply_effects(effects);
        }

        if self.canvas_press {
            ui.ctx().request_repaint();
        }
    }

    pub(in crate::app) fn apply_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SelectionChanged => self.on_selection_changed(),
                Effect::ToggleCluster(id) => {
                    cluster::toggle_expanded(&mut self.expanded, &id);
                    self.render_dirty = true;
                }
                Effect::MoveNode { id, position } => {
                    self.layout.set_position(&id, position);
                    self.layout.apply_to(&mut self.render);
                    self.scene = self.render.scene_index();
                }
                Effect::PersistPosition { id, position } => {
                    self.layout.set_position(&id, position);
                    self.layout.apply_to(&mut self.render);
                    self.scene = self.render.scene_index();
                    self.persist_position(id, position);
                }
                Effect::CreateLink { source, link } => {
                    self.add_link(&source, &link.to, link.relationship);
                }
                Effect::PlacementCancelled => {
                    self.quick_add.open = true;
                    self.notify(NoticeLevel::Info, "Placement cancelled");
                }
                Effect::PlaceNode { position } => {
                    self.place_node(position);
                    let effects = self.controller.set_placing(false);
                    self.apply_effects(effects);
                }
                Effect::FindPath { from, to } => self.find_path(from, to),
                Effect::ClearPath => self.clear_path(),
                Effect::OpenContextMenu { id, anchor } => self.context_menu = Some((id, anchor)),
                Effect::Notice { level, message } => self.notify(level, message),
            }
        }
    }

    pub(in crate::app) fn hovered_node(&self, ui: &Ui, rect: Rect) -> Option<String> {
        let pointer = ui.input(|input| input.pointer.hover_pos())?;
        if !rect.contains(pointer) {
            return None;
        }
        let world = self.viewport().to_world(canvas_point(rect, pointer));
        self.scene.hit(world).map(str::to_owned)
    }

    pub(in crate::app) fn toggle_layout_lock(&mut self) {
        let locked = !self.controller.layout_locked();
        self.controller.set_layout_locked(locked);
        if !locked {
            self.layout.unpin_all();
        }
    }

    pub(in crate::app) fn set_path_finder(&mut self, on: bool) {
        let effects = self.controller.set_path_finder(on);
        self.apply_effects(effects);
    }

    pub(in crate::app) fn set_placing(&mut self, on: bool) {
        let effects = self.controller.set_placing(on);
        self.apply_effects(effects);
    }
}

pub(in crate::app) fn cursor_for(dragging: bool, hovering: bool) -> egui::CursorIcon {
    if dragging {
        egui::CursorIcon::Grabbing
    } else if hovering {
        egui::CursorIcon::PointingHand
    } else {
        egui::CursorIcon::Default
    }
}
