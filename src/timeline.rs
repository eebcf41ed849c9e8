use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;

use crate::model::{GraphData, Node};

pub const WEEK_MS: i64 = 604_800_000;
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Inactive,
    Paused,
    Playing,
}

/// Scrubber over the creation-date range of the whole graph.
///
/// Whenever `selected` is set it lies inside `range`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timeline {
    state: PlaybackState,
    selected: Option<i64>,
    range: Option<(i64, i64)>,
}

impl Timeline {
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != PlaybackState::Inactive
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn selected_ms(&self) -> Option<i64> {
        self.selected
    }

    pub fn range_ms(&self) -> Option<(i64, i64)> {
        self.range
    }

    /// Turn the timeline on. The date range is derived from every node the
    /// first time, regardless of filters.
    pub fn enable(&mut self, graph: &GraphData) {
        if self.is_active() {
            return;
        }
        if self.range.is_none() {
            self.range = graph.created_range_ms();
        }
        if self.selected.is_none() {
            self.selected = self.range.map(|(_, max)| max);
        }
        self.state = PlaybackState::Paused;
    }

    pub fn disable(&mut self) {
        self.state = PlaybackState::Inactive;
    }

    /// Recompute the range after the graph itself changed.
    pub fn refresh_range(&mut self, graph: &GraphData) {
        self.range = graph.created_range_ms();
        self.selected = match (self.range, self.selected) {
            (Some((min, max)), Some(selected)) => Some(selected.clamp(min, max)),
            (Some((_, max)), None) => Some(max),
            (None, _) => None,
        };
    }

    pub fn seek(&mut self, timestamp_ms: i64) {
        if let Some((min, max)) = self.range {
            self.selected = Some(timestamp_ms.clamp(min, max));
        }
    }

    /// Start playing. Returns false when there is nothing to play over.
    pub fn play(&mut self) -> bool {
        let Some((min, max)) = self.range else {
            return false;
        };
        if !self.is_active() {
            return false;
        }
        if self.selected.is_none_or(|selected| selected >= max) {
            self.selected = Some(min);
        }
        self.state = PlaybackState::Playing;
        true
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// Advance one week. Reaching the end clamps and pauses.
    pub fn tick(&mut self) {
        if !self.is_playing() {
            return;
        }
        let (Some((_, max)), Some(selected)) = (self.range, self.selected) else {
            self.state = PlaybackState::Paused;
            return;
        };

        let next = selected.saturating_add(WEEK_MS);
        if next >= max {
            self.selected = Some(max);
            self.state = PlaybackState::Paused;
        } else {
            self.selected = Some(next);
        }
    }

    /// Nodes created after the scrubber are hidden; undated nodes never are.
    pub fn is_hidden(&self, node: &Node) -> bool {
        if !self.is_active() {
            return false;
        }
        match (self.selected, node.created_ms()) {
            (Some(selected), Some(created)) => created > selected,
            _ => false,
        }
    }
}

/// Background clock for playback. Dropping it stops and joins the thread.
pub struct PlaybackTicker {
    ticks: Receiver<()>,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackTicker {
    pub fn start(interval: Duration, notify: impl Fn() + Send + 'static) -> Self {
        let (tick_tx, tick_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let worker = thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if tick_tx.send(()).is_err() {
                            break;
                        }
                        notify();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Self {
            ticks: tick_rx,
            stop: Some(stop_tx),
            worker: Some(worker),
        }
    }

    pub fn pending(&self) -> usize {
        self.ticks.try_iter().count()
    }
}

impl Drop for PlaybackTicker {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Timeline plus the ticker that drives it while playing.
pub struct Playback {
    timeline: Timeline,
    ticker: Option<PlaybackTicker>,
    interval: Duration,
}

impl Default for Playback {
    fn default() -> Self {
        Self::new(TICK_INTERVAL)
    }
}

impl Playback {
    pub fn new(interval: Duration) -> Self {
        Self {
            timeline: Timeline::default(),
            ticker: None,
            interval,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn enable(&mut self, graph: &GraphData) {
        self.timeline.enable(graph);
    }

    pub fn disable(&mut self) {
        self.pause();
        self.timeline.disable();
    }

    pub fn seek(&mut self, timestamp_ms: i64) {
        self.timeline.seek(timestamp_ms);
    }

    pub fn refresh_range(&mut self, graph: &GraphData) {
        self.timeline.refresh_range(graph);
    }

    pub fn play(&mut self, notify: impl Fn() + Send + 'static) {
        if self.timeline.play() && self.ticker.is_none() {
            debug!("timeline playback started");
            self.ticker = Some(PlaybackTicker::start(self.interval, notify));
        }
    }

    pub fn pause(&mut self) {
        self.timeline.pause();
        if self.ticker.take().is_some() {
            debug!("timeline playback stopped");
        }
    }

    /// Apply ticks that arrived since the last poll. Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let Some(ticker) = &self.ticker else {
            return 0;
        };

        let pending = ticker.pending();
        let mut applied = 0;
        for _ in 0..pending {
            if !self.timeline.is_playing() {
                break;
            }
            self.timeline.tick();
            applied += 1;
        }

        if !self.timeline.is_playing() {
            self.pause();
        }
        applied
    }
}
