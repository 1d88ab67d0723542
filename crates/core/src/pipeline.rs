//! The stage chain and its driver.
//!
//! Every primary event goes through the stages in order until one of them
//! consumes it. Events a stage enqueues while processing are fed through that
//! stage and the ones after it, and the queue is drained completely before the
//! driver moves on to the next primary event.

use crate::context::{Context, StageId};
use crate::error::ConversionError;
use sheaf_markup::Event;
use sheaf_types::Diagnostic;
use std::collections::VecDeque;

/// Whether later stages see the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Consumed,
}

/// Synthetic events produced by a stage.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }
}

pub trait Stage {
    fn name(&self) -> &'static str;

    fn process(
        &mut self,
        event: &Event,
        ctx: &mut Context,
        queue: &mut EventQueue,
    ) -> Result<Flow, ConversionError>;
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub pages: usize,
    pub blocks: usize,
    pub bookmarks: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Counts the sink keeps while emitting, read back into the report.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunStats {
    pub pages: usize,
    pub blocks: usize,
    pub bookmarks: usize,
}

/// Synthetic events may themselves cause more; this bounds the cascade.
const MAX_SYNTHETIC_DEPTH: usize = 256;

pub struct Pipeline<'a> {
    stages: Vec<Box<dyn Stage + 'a>>,
}

impl<'a> Default for Pipeline<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Pipeline<'a> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn with_stage(mut self, stage: impl Stage + 'a) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Feeds one event through the chain.
    pub fn feed(&mut self, event: Event, ctx: &mut Context) -> Result<(), ConversionError> {
        feed_from(&mut self.stages, 0, event, ctx, 0)
    }

    /// Runs a whole event stream and returns the report. The stream is
    /// expected to start with `DocumentStart` and end with `DocumentEnd`.
    pub fn run(
        &mut self,
        events: impl IntoIterator<Item = Event>,
        mut ctx: Context,
    ) -> Result<RunReport, ConversionError> {
        let mut count = 0usize;
        for event in events {
            self.feed(event, &mut ctx)?;
            count += 1;
        }
        log::debug!("Pipeline {:?} processed {} events", self.stage_names(), count);
        let stats = ctx.run_stats();
        Ok(RunReport {
            pages: stats.pages,
            blocks: stats.blocks,
            bookmarks: stats.bookmarks,
            diagnostics: ctx.into_diagnostics(),
        })
    }
}

fn feed_from(
    stages: &mut [Box<dyn Stage + '_>],
    start: usize,
    event: Event,
    ctx: &mut Context,
    depth: usize,
) -> Result<(), ConversionError> {
    if depth > MAX_SYNTHETIC_DEPTH {
        return Err(ConversionError::State(format!(
            "synthetic events nested deeper than {}",
            MAX_SYNTHETIC_DEPTH
        )));
    }
    for index in start..stages.len() {
        let mut queue = EventQueue::new();
        ctx.enter_stage(StageId(index));
        let flow = stages[index].process(&event, ctx, &mut queue)?;
        while let Some(synthetic) = queue.pop() {
            feed_from(stages, index, synthetic, ctx, depth + 1)?;
        }
        if flow == Flow::Consumed {
            break;
        }
    }
    Ok(())
}
