use log::debug;

use brain_map::cluster;
use brain_map::pipeline::{PipelineInput, build_render_set};

use super::super::ViewModel;

impl ViewModel {
    /// Re-run the pipeline when inputs changed or the zoom crossed the
    /// cluster threshold, then carry layout positions over.
    pub(in crate::app) fn refresh_render_set(&mut self) {
        let zoom = self.viewport().zoom;
        if !self.render_dirty && self.render.clustered == cluster::use_clusters(zoom) {
            return;
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut render = build_render_set(&PipelineInput {
            graph: &self.graph,
            filters: &self.filters,
            expanded: &self.expanded,
            zoom,
            timeline: self.playback.timeline(),
            heat: self.heat,
            path: &self.path,
            selection: self.controller.selection(),
            palette: self.theme.palette(),
            now_ms,
        });
        self.layout.sync(&render);
        self.layout.apply_to(&mut render);
        self.scene = render.scene_index();
        debug!(
            "render set: {} nodes, {} edges, clustered={}",
            render.nodes.len(),
            render.edges.len(),
            render.clustered
        );
        self.render = render;
        self.render_dirty = false;
    }

    /// Advances the simulation unless the layout is locked. Returns whether
    /// anything moved.
    pub(in crate::app) fn step_layout(&mut self, delta_seconds: f32) -> bool {
        if self.controller.layout_locked() {
            return false;
        }
        self.layout_config.delta_seconds = f64::from(delta_seconds);
        let moving = self.layout.step(self.layout_config);
        if moving {
            self.layout.apply_to(&mut self.render);
            self.scene = self.render.scene_index();
        }
        moving
    }
}
