//! Live progress of resolution tasks.
//!
//! Every task owns exactly one [`SlotHandle`] and is the only writer of its
//! slot. The [`Tracker`] keeps a read view of all slots and redraws them on a
//! fixed cadence until every task settles. Bars are drawn through
//! `tracing-indicatif`, so without an `IndicatifLayer` installed nothing is
//! drawn at all.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::Identifier;
use crate::pipeline::Stage;

/// Bar units per stage, giving the single bar room to ease between stages.
const STEPS_PER_STAGE: u64 = 8;

/// Shortest redraw interval, `tokio::time::interval` rejects zero.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Receiver of a task's progress.
pub trait Report {
    /// Records that `stage` was reached. Stages only move forward.
    fn report(&mut self, stage: Stage);

    /// Last stage reached.
    fn stage(&self) -> Stage;

    /// Replaces the placeholder label once the task knows its display name.
    fn label(&mut self, _label: &str) {}

    /// Marks the task as finished without reaching [`Stage::DONE`].
    fn fail(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One bar, eased toward the reported stage.
    Single,
    /// One bar per task, drawn at the reported stage.
    Multi,
}

#[derive(Debug)]
struct Slot {
    root: Identifier,
    label: OnceLock<String>,
    stage: AtomicU8,
    failed: AtomicBool,
}

impl Slot {
    fn stage(&self) -> Stage {
        Stage::new(self.stage.load(Ordering::Acquire))
    }

    fn is_settled(&self) -> bool {
        self.stage().is_done() || self.failed.load(Ordering::Acquire)
    }
}

/// Write side of one tracker slot. Not clonable, so each slot has a single
/// writer.
#[derive(Debug)]
pub struct SlotHandle {
    index: usize,
    slot: Arc<Slot>,
}

impl SlotHandle {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Report for SlotHandle {
    fn report(&mut self, stage: Stage) {
        let current = self.slot.stage();
        debug_assert!(
            stage == current || stage == current.next(),
            "stage went from {current} to {stage}"
        );
        self.slot
            .stage
            .fetch_max(stage.value(), Ordering::AcqRel);
    }

    fn stage(&self) -> Stage {
        self.slot.stage()
    }

    fn label(&mut self, label: &str) {
        let _ = self.slot.label.set(label.to_string());
    }

    fn fail(&mut self) {
        self.slot.failed.store(true, Ordering::Release);
    }
}

impl Drop for SlotHandle {
    /// A handle dropped before its task finished frees the slot, so the
    /// renderer never waits on it.
    fn drop(&mut self) {
        if !self.slot.stage().is_done() {
            self.slot.failed.store(true, Ordering::Release);
        }
    }
}

/// Point-in-time copy of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotView {
    pub index: usize,
    pub label: String,
    pub stage: Stage,
    pub failed: bool,
}

/// Read side of all slots of one query, plus the renderer.
#[derive(Debug)]
pub struct Tracker {
    slots: Vec<Arc<Slot>>,
    spans: Vec<Span>,
    mode: Mode,
    tick: Duration,
}

impl Tracker {
    /// Creates one slot per root and returns the write handles in the same
    /// order. A single root renders in [`Mode::Single`].
    pub fn new(roots: &[Identifier], tick: Duration) -> (Self, Vec<SlotHandle>) {
        let mode = match roots.len() {
            1 => Mode::Single,
            _ => Mode::Multi,
        };

        let style = crate::utils::style_stage(mode);
        let mut slots = Vec::with_capacity(roots.len());
        let mut spans = Vec::with_capacity(roots.len());
        let mut handles = Vec::with_capacity(roots.len());

        for (index, &root) in roots.iter().enumerate() {
            let slot = Arc::new(Slot {
                root,
                label: OnceLock::new(),
                stage: AtomicU8::new(Stage::START.value()),
                failed: AtomicBool::new(false),
            });

            let span = tracing::info_span!("task", root);
            span.pb_set_style(&style);
            span.pb_set_length(Stage::DONE.value() as u64 * STEPS_PER_STAGE);
            span.pb_set_message(&root.to_string());

            slots.push(slot.clone());
            spans.push(span);
            handles.push(SlotHandle { index, slot });
        }

        let tracker = Self {
            slots,
            spans,
            mode,
            tick: tick.max(MIN_TICK),
        };

        (tracker, handles)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Span of the task in slot `index`; instrumenting the task with it
    /// puts its log lines under its bar.
    pub fn span(&self, index: usize) -> Span {
        self.spans.get(index).cloned().unwrap_or_else(Span::none)
    }

    pub fn snapshot(&self) -> Vec<SlotView> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| SlotView {
                index,
                label: slot
                    .label
                    .get()
                    .cloned()
                    .unwrap_or_else(|| slot.root.to_string()),
                stage: slot.stage(),
                failed: slot.failed.load(Ordering::Acquire),
            })
            .collect()
    }

    /// True once every slot reached [`Stage::DONE`] or failed.
    pub fn is_settled(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_settled())
    }

    /// Redraws every slot each tick until all of them settle or `stop`
    /// fires, then draws one last frame showing the final state.
    pub async fn run(&self, mut stop: oneshot::Receiver<()>) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut shown = vec![0; self.slots.len()];

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.render(&mut shown, false);
                    if self.is_settled() {
                        break;
                    }
                }
                _ = &mut stop => break,
            }
        }

        self.render(&mut shown, true);
    }

    /// Returns once every task has settled.
    pub async fn await_all_complete(&self) {
        let (_keep, stop) = oneshot::channel();
        self.run(stop).await;
    }

    fn render(&self, shown: &mut [u64], last: bool) {
        for (view, span) in self.snapshot().into_iter().zip(&self.spans) {
            let target = view.stage.value() as u64 * STEPS_PER_STAGE;
            let position = &mut shown[view.index];

            *position = match self.mode {
                Mode::Single if !last => ease(*position, target),
                _ => target,
            };

            span.pb_set_position(*position);
            span.pb_set_message(&status(&view));
        }
    }
}

/// Moves a third of the remaining distance, at least one unit.
fn ease(shown: u64, target: u64) -> u64 {
    if shown >= target {
        return target;
    }
    shown + ((target - shown) / 3).max(1)
}

fn status(view: &SlotView) -> String {
    if view.failed {
        format!("{} (failed at {})", view.label, view.stage)
    } else {
        format!("{} ({})", view.label, view.stage)
    }
}
