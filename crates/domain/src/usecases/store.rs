//! Effect runtime for the export reducer
//!
//! Actions are reduced one at a time. Synchronous follow-ups are drained
//! before any async completion is admitted, async effects run concurrently
//! in a `FuturesUnordered`, and render signals are debounced before a state
//! snapshot is handed to a single render worker.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::usecases::export::{Effect, ExportAction, ExportFeature, ExportState};

enum Event {
    Completed(ExportAction),
    Rendered(ExportAction),
    RenderDue,
}

/// Owns the export state and drives effects to completion
pub struct ExportStore {
    feature: ExportFeature,
    state: ExportState,
    in_flight: FuturesUnordered<BoxFuture<'static, ExportAction>>,
    render_deadline: Option<Instant>,
    render_jobs: mpsc::UnboundedSender<ExportState>,
    render_results: mpsc::UnboundedReceiver<ExportAction>,
    renders_in_flight: usize,
    worker: JoinHandle<()>,
    log: Vec<ExportAction>,
}

impl ExportStore {
    /// Create a store and spawn its render worker; must be called inside a
    /// tokio runtime
    pub fn new(feature: ExportFeature) -> Self {
        Self::with_state(feature, ExportState::default())
    }

    pub fn with_state(feature: ExportFeature, state: ExportState) -> Self {
        let (render_jobs, mut jobs) = mpsc::unbounded_channel::<ExportState>();
        let (results, render_results) = mpsc::unbounded_channel();
        let renderer = feature.renderer();

        let worker = tokio::spawn(async move {
            while let Some(snapshot) = jobs.recv().await {
                let result = renderer.render(&snapshot).await;
                if results.send(ExportAction::RenderCompleted(result)).is_err() {
                    break;
                }
            }
        });

        Self {
            feature,
            state,
            in_flight: FuturesUnordered::new(),
            render_deadline: None,
            render_jobs,
            render_results,
            renders_in_flight: 0,
            worker,
            log: Vec::new(),
        }
    }

    pub fn state(&self) -> &ExportState {
        &self.state
    }

    /// Every action processed so far, in order
    pub fn actions(&self) -> &[ExportAction] {
        &self.log
    }

    /// Reduce `action` and every synchronous follow-up it produces
    pub fn send(&mut self, action: ExportAction) {
        let mut queue = VecDeque::from([action]);

        while let Some(action) = queue.pop_front() {
            tracing::debug!(action = action.name(), "Processing action");
            self.log.push(action.clone());

            for effect in self.feature.reduce(&mut self.state, action) {
                match effect {
                    Effect::Send(next) => queue.push_back(next),
                    Effect::Render => self.schedule_render(),
                    effect => {
                        if let Some(future) = self.feature.perform(effect) {
                            self.in_flight.push(future);
                        }
                    }
                }
            }
        }
    }

    fn schedule_render(&mut self) {
        self.render_deadline = Some(Instant::now() + self.feature.config().render_debounce);
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty() && self.render_deadline.is_none() && self.renders_in_flight == 0
    }

    /// Wait for the next completion or due render and process it.
    ///
    /// Returns `false` once nothing is pending.
    pub async fn step(&mut self) -> bool {
        if self.is_idle() {
            return false;
        }

        let effects_pending = !self.in_flight.is_empty();
        let render_pending = self.renders_in_flight > 0;
        let deadline = self.render_deadline;

        let event = tokio::select! {
            Some(action) = self.in_flight.next(), if effects_pending => Event::Completed(action),
            Some(action) = self.render_results.recv(), if render_pending => Event::Rendered(action),
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => Event::RenderDue,
            else => return false,
        };

        match event {
            Event::Completed(action) => self.send(action),
            Event::Rendered(action) => {
                self.renders_in_flight -= 1;
                self.send(action);
            }
            Event::RenderDue => self.start_render(),
        }
        true
    }

    fn start_render(&mut self) {
        self.render_deadline = None;
        match self.render_jobs.send(self.state.clone()) {
            Ok(()) => self.renders_in_flight += 1,
            Err(_) => tracing::error!("Render worker is gone, dropping render"),
        }
    }

    /// Process until no effect, debounce or render is pending
    pub async fn settle(&mut self) {
        while self.step().await {}
    }

    /// Process until `done` holds for the state or nothing is pending.
    ///
    /// Returns whether `done` was reached.
    pub async fn settle_until(&mut self, done: impl Fn(&ExportState) -> bool) -> bool {
        loop {
            if done(&self.state) {
                return true;
            }
            if !self.step().await {
                return done(&self.state);
            }
        }
    }
}

impl Drop for ExportStore {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
