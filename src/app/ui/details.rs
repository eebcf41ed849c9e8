use eframe::egui::{self, RichText, Ui};

use brain_map::api::{Comment, NodeUpdate};
use brain_map::model::{NodeType, RelationshipType};
use brain_map::search::{MENTION_LIMIT, insert_mention, mention_query, mention_suggestions};

use super::super::ViewModel;

enum EditorAction {
    Save,
    Delete,
    Promote,
    Center,
}

fn optional_field(ui: &mut Ui, label: &str, value: &mut Option<String>) {
    let mut text = value.clone().unwrap_or_default();
    ui.horizontal(|ui| {
        ui.label(label);
        if ui.text_edit_singleline(&mut text).changed() {
            let trimmed = text.trim();
            *value = (!trimmed.is_empty()).then(|| trimmed.to_owned());
        }
    });
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Selection Details");
        ui.add_space(6.0);

        let ids = self.controller.selection().ids();
        match ids.len() {
            0 => {
                ui.label("Click a node to inspect it. Shift-click adds to the selection.");
                ui.small("Drag from a node with Shift held to link it to another node.");
            }
            1 => {
                egui::ScrollArea::vertical()
                    .id_salt("details_scroll")
                    .auto_shrink([false, false])
                    .show(ui, |ui| self.draw_single(ui, &ids[0]));
            }
            _ => self.draw_multi(ui, &ids),
        }
    }

    fn draw_multi(&mut self, ui: &mut Ui, ids: &[String]) {
        ui.label(RichText::new(format!("{} nodes selected", ids.len())).strong());

        let mut focus = None;
        egui::ScrollArea::vertical()
            .id_salt("multi_selection_scroll")
            .max_height(240.0)
            .show(ui, |ui| {
                for id in ids {
                    let title = self
                        .graph
                        .node(id)
                        .map_or(id.as_str(), |node| node.display_title());
                    if ui.link(title).clicked() {
                        focus = Some(id.clone());
                    }
                }
            });
        if let Some(id) = focus {
            self.select_node(&id, true);
            return;
        }

        ui.separator();
        ui.horizontal_wrapped(|ui| {
            if ui.button("Promote to Concept").clicked() {
                self.bulk_update(NodeUpdate::node_type("Concept"));
            }
            if ui.button("Archive").clicked() {
                self.bulk_update(NodeUpdate::status("archived"));
            }
            if ui
                .button("Generate plan")
                .on_hover_text("Draft a plan covering the selected nodes and their dependencies.")
                .clicked()
            {
                self.generate_plan();
            }
            if ids.len() == 2 && ui.button("Find path between").clicked() {
                self.find_path(ids[0].clone(), ids[1].clone());
            }
        });
        self.draw_path_result(ui);
    }

    fn draw_single(&mut self, ui: &mut Ui, id: &str) {
        let Some(editor) = self.editor.as_mut() else {
            ui.label("Selected node no longer exists in the graph.");
            return;
        };

        let mut action = None;
        let draft = &mut editor.draft;
        ui.small(draft.id.as_str());
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
            ui.text_edit_singleline(&mut editor.tags)
                .on_hover_text("Comma-separated");
        });
        optional_field(ui, "Priority", &mut draft.priority);
        optional_field(ui, "Risk", &mut draft.risk);

        ui.label("Notes");
        let mut body = draft.body_md.clone().unwrap_or_default();
        if ui
            .add(
                egui::TextEdit::multiline(&mut body)
                    .desired_rows(6)
                    .desired_width(f32::INFINITY),
            )
            .changed()
        {
            draft.body_md = Some(body);
        }

        if let Some(created) = &draft.created_at {
            ui.small(format!("Created {created}"));
        }
        if let Some(updated) = &draft.updated_at {
            ui.small(format!("Updated {updated}"));
        }
        if let Some(path) = &draft.source_path {
            ui.small(path.as_str());
        }

        let is_inbox = draft.kind() == NodeType::Inbox;
        let saving = editor.saving;
        ui.horizontal_wrapped(|ui| {
            let label = if saving { "Saving..." } else { "Save" };
            if ui.add_enabled(!saving, egui::Button::new(label)).clicked() {
                action = Some(EditorAction::Save);
            }
            if is_inbox && ui.button("Promote").clicked() {
                action = Some(EditorAction::Promote);
            }
            if ui.button("Center").clicked() {
                action = Some(EditorAction::Center);
            }
            if ui.button("Delete").clicked() {
                action = Some(EditorAction::Delete);
            }
        });

        match action {
            Some(EditorAction::Save) => self.save_editor(),
            Some(EditorAction::Promote) => self.promote(id),
            Some(EditorAction::Center) => self.select_node(id, true),
            Some(EditorAction::Delete) => {
                self.delete_node(id);
                return;
            }
            None => {}
        }

        ui.separator();
        self.draw_relationships(ui, id);
        ui.separator();
        if ui
            .button("Generate plan")
            .on_hover_text("Draft a plan from this node and its dependencies.")
            .clicked()
        {
            self.generate_plan();
        }
        self.draw_path_result(ui);
        ui.separator();
        self.draw_comments(ui);
    }

    fn draw_relationships(&mut self, ui: &mut Ui, id: &str) {
        ui.label(RichText::new("Relationships").strong());

        let Some(node) = self.graph.node(id) else {
            return;
        };
        let outgoing = node
            .links
            .iter()
            .enumerate()
            .map(|(index, link)| {
                let title = self
                    .graph
                    .node(&link.to)
                    .map_or(link.to.as_str(), |target| target.display_title());
                let label = format!("{} -> {title}", link.relationship.label());
                (index, link.to.clone(), label)
            })
            .collect::<Vec<_>>();
        let incoming = self
            .graph
            .inbound_edges(id)
            .map(|edge| {
                let title = self
                    .graph
                    .node(&edge.from)
                    .map_or(edge.from.as_str(), |source| source.display_title());
                (edge.from.clone(), format!("{title} -> this"))
            })
            .collect::<Vec<_>>();

        let mut remove = None;
        let mut focus = None;
        for (index, target, label) in &outgoing {
            ui.horizontal(|ui| {
                if ui.link(label.as_str()).clicked() {
                    focus = Some(target.clone());
                }
                if ui.small_button("Remove").clicked() {
                    remove = Some(*index);
                }
            });
        }
        for (source, label) in &incoming {
            if ui.link(label.as_str()).clicked() {
                focus = Some(source.clone());
            }
        }
        if outgoing.is_empty() && incoming.is_empty() {
            ui.small("No links yet.");
        }

        let mut targets = self
            .graph
            .nodes
            .iter()
            .filter(|candidate| candidate.id != id)
            .map(|candidate| (candidate.id.clone(), candidate.display_title().to_owned()))
            .collect::<Vec<_>>();
        targets.sort_by(|(_, left), (_, right)| left.cmp(right));

        let target_text = targets
            .iter()
            .find(|(candidate, _)| *candidate == self.new_link.target)
            .map_or("Choose target", |(_, title)| title.as_str())
            .to_owned();
        let mut add = false;
        ui.horizontal(|ui| {
            egui::ComboBox::from_id_salt("new_link_target")
                .selected_text(target_text)
                .width(150.0)
                .show_ui(ui, |ui| {
                    for (candidate, title) in &targets {
                        ui.selectable_value(&mut self.new_link.target, candidate.clone(), title);
                    }
                });
            egui::ComboBox::from_id_salt("new_link_relationship")
                .selected_text(self.new_link.relationship.label())
                .show_ui(ui, |ui| {
                    for relationship in RelationshipType::ALL {
                        ui.selectable_value(
                            &mut self.new_link.relationship,
                            relationship,
                            relationship.label(),
                        );
                    }
                });
            add = ui
                .add_enabled(!self.new_link.target.is_empty(), egui::Button::new("Link"))
                .clicked();
        });

        if add {
            let target = std::mem::take(&mut self.new_link.target);
            self.add_link(id, &target, self.new_link.relationship);
        }
        if let Some(index) = remove {
            self.remove_link(id, index);
        }
        if let Some(target) = focus {
            self.select_node(&target, true);
        }
    }

    fn draw_path_result(&mut self, ui: &mut Ui) {
        let Some(result) = &self.path_result else {
            return;
        };
        ui.separator();
        ui.label(RichText::new("Path").strong());
        if result.found {
            let hops = result
                .path
                .iter()
                .map(|id| self.graph.node(id).map_or(id.as_str(), |node| node.display_title()))
                .collect::<Vec<_>>()
                .join(" -> ");
            ui.label(hops);
            ui.small(format!(
                "{} hops, total weight {:.2}",
                result.length, result.total_weight
            ));
        } else {
            ui.label("These nodes are not connected.");
        }
        if ui.small_button("Clear path").clicked() {
            self.clear_path();
        }
    }

    fn draw_comments(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.label(RichText::new("Comments").strong());
            if self.comments.loading {
                ui.spinner();
            }
        });

        let mut reply_to = None;
        for (depth, comment) in Comment::flatten(&self.comments.tree) {
            ui.horizontal(|ui| {
                ui.add_space(depth as f32 * 16.0);
                ui.vertical(|ui| {
                    ui.horizontal(|ui| {
                        let author = if comment.author.is_empty() {
                            "anonymous"
                        } else {
                            comment.author.as_str()
                        };
                        ui.label(RichText::new(author).strong());
                        ui.small(comment.created_at.as_str());
                    });
                    ui.label(comment.body.as_str());
                    if ui.small_button("Reply").clicked() {
                        reply_to = Some(comment.id.clone());
                    }
                });
            });
        }
        if self.comments.tree.is_empty() && !self.comments.loading {
            ui.small("No comments yet.");
        }
        if reply_to.is_some() {
            self.comments.reply_to = reply_to;
        }

        if let Some(parent) = self.comments.reply_to.clone() {
            ui.horizontal(|ui| {
                ui.small(format!("Replying to {parent}"));
                if ui.small_button("Cancel").clicked() {
                    self.comments.reply_to = None;
                }
            });
        }

        let response = ui.add(
            egui::TextEdit::multiline(&mut self.comments.draft)
                .hint_text("Write a comment; @ mentions a node")
                .desired_rows(3)
                .desired_width(f32::INFINITY),
        );
        if response.has_focus() {
            self.load_mentions();
        }

        let cursor = self.comments.draft.len();
        if let Some((at, query)) = mention_query(&self.comments.draft, cursor) {
            let candidates = self.mention_candidates();
            let picks = mention_suggestions(&candidates, query, MENTION_LIMIT)
                .into_iter()
                .map(|candidate| (candidate.id.clone(), candidate.title.clone()))
                .collect::<Vec<_>>();
            let mut chosen = None;
            ui.horizontal_wrapped(|ui| {
                for (id, title) in &picks {
                    let response = ui.small_button(title.as_str()).on_hover_text(id.as_str());
                    if response.clicked() {
                        chosen = Some(id.clone());
                    }
                }
            });
            if let Some(id) = chosen {
                insert_mention(&mut self.comments.draft, at, cursor, &id);
            }
        }

        let posting = self.comments.posting;
        let label = if posting { "Posting..." } else { "Post" };
        if ui.add_enabled(!posting, egui::Button::new(label)).clicked() {
            self.post_comment();
        }
    }
}
