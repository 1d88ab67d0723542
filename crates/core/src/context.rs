//! Per-run mutable state threaded through every stage.
//!
//! One conversion is one `Context`. It is created when the run starts and
//! dropped when the run ends, so nothing leaks between documents.

use crate::config::ConversionConfig;
use crate::handlers::HandlerId;
use crate::pipeline::RunStats;
use sheaf_idf::ContentNode;
use sheaf_style::StyleMap;
use sheaf_traits::PageLayout;
use sheaf_types::Diagnostic;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

/// Index of a stage within its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StageId(pub usize);

/// An element that has been opened but not yet closed.
#[derive(Debug)]
pub struct Frame {
    pub tag: String,
    pub style: Arc<StyleMap>,
    /// `None` for transparent elements, whose content flows into the nearest
    /// enclosing node.
    pub node: Option<ContentNode>,
    pub handler: HandlerId,
    /// The element and everything below it produce no output.
    pub suppressed: bool,
    /// The content before a block the node could not hold was already
    /// delivered; `node` carries only what came after it.
    pub split: bool,
}

/// Private state a stage keeps in the context, one slot per stage.
#[derive(Default)]
pub struct StageStateTable {
    slots: Vec<Option<Box<dyn Any>>>,
}

impl std::fmt::Debug for StageStateTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageStateTable")
            .field("occupied", &self.slots.iter().filter(|s| s.is_some()).count())
            .finish()
    }
}

impl StageStateTable {
    /// Returns the slot for `id`, creating it on first use. A slot holding a
    /// different type is replaced.
    pub fn get_or_default<T: Any + Default>(&mut self, id: StageId) -> &mut T {
        if self.slots.len() <= id.0 {
            self.slots.resize_with(id.0 + 1, || None);
        }
        let slot = &mut self.slots[id.0];
        if !slot.as_ref().is_some_and(|state| state.is::<T>()) {
            *slot = Some(Box::new(T::default()));
        }
        match slot.as_mut().and_then(|state| state.downcast_mut::<T>()) {
            Some(state) => state,
            None => unreachable!("slot was just filled with a T"),
        }
    }

    pub fn get<T: Any>(&self, id: StageId) -> Option<&T> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .and_then(|state| state.downcast_ref::<T>())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Running number used in auto-bookmark names.
    pub bookmarks: usize,
}

#[derive(Debug)]
pub struct Context {
    config: Arc<ConversionConfig>,
    styles: Vec<Arc<StyleMap>>,
    pub frames: Vec<Frame>,
    state: StageStateTable,
    current_stage: StageId,
    pub counters: Counters,
    output: VecDeque<ContentNode>,
    diagnostics: Vec<Diagnostic>,
    pending_layout: Option<PageLayout>,
    title: Option<String>,
    stats: RunStats,
}

impl Context {
    pub fn new(config: Arc<ConversionConfig>) -> Self {
        Self {
            config,
            styles: Vec::new(),
            frames: Vec::new(),
            state: StageStateTable::default(),
            current_stage: StageId::default(),
            counters: Counters::default(),
            output: VecDeque::new(),
            diagnostics: Vec::new(),
            pending_layout: None,
            title: None,
            stats: RunStats::default(),
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    // --- Style stack ---

    pub fn push_style(&mut self, style: Arc<StyleMap>) {
        self.styles.push(style);
    }

    pub fn pop_style(&mut self) -> Option<Arc<StyleMap>> {
        self.styles.pop()
    }

    /// Style of the innermost open element.
    pub fn current_style(&self) -> Option<Arc<StyleMap>> {
        self.styles.last().cloned()
    }

    pub fn style_depth(&self) -> usize {
        self.styles.len()
    }

    // --- Stage state ---

    pub(crate) fn enter_stage(&mut self, id: StageId) {
        self.current_stage = id;
    }

    /// State private to the stage currently processing an event.
    pub fn stage_state<T: Any + Default>(&mut self) -> &mut T {
        self.state.get_or_default(self.current_stage)
    }

    pub fn stage_states(&self) -> &StageStateTable {
        &self.state
    }

    // --- Output ---

    /// Queues a finished top-level block for the sink.
    pub fn emit(&mut self, node: ContentNode) {
        self.output.push_back(node);
    }

    pub fn take_output(&mut self) -> Option<ContentNode> {
        self.output.pop_front()
    }

    pub fn pending_output(&self) -> usize {
        self.output.len()
    }

    pub fn request_page_layout(&mut self, layout: PageLayout) {
        self.pending_layout = Some(layout);
    }

    pub fn take_page_layout(&mut self) -> Option<PageLayout> {
        self.pending_layout.take()
    }

    pub fn append_title(&mut self, text: &str) {
        self.title.get_or_insert_with(String::new).push_str(text);
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn run_stats(&self) -> RunStats {
        self.stats
    }

    pub fn run_stats_mut(&mut self) -> &mut RunStats {
        &mut self.stats
    }

    pub fn shared_config(&self) -> Arc<ConversionConfig> {
        Arc::clone(&self.config)
    }

    // --- Diagnostics ---

    pub fn report(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.diagnostics.push(diagnostic);
    }

    pub fn extend_diagnostics(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.report(diagnostic);
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Seen(usize);

    #[test]
    fn test_stage_state_is_keyed_by_stage() {
        let mut ctx = Context::new(Arc::new(ConversionConfig::default()));
        ctx.enter_stage(StageId(2));
        ctx.stage_state::<Seen>().0 += 3;
        ctx.enter_stage(StageId(0));
        ctx.stage_state::<Seen>().0 += 1;

        assert_eq!(ctx.stage_states().get::<Seen>(StageId(2)).map(|s| s.0), Some(3));
        assert_eq!(ctx.stage_states().get::<Seen>(StageId(0)).map(|s| s.0), Some(1));
        assert!(ctx.stage_states().get::<Seen>(StageId(1)).is_none());
    }

    #[test]
    fn test_output_is_fifo() {
        let mut ctx = Context::new(Arc::new(ConversionConfig::default()));
        ctx.emit(ContentNode::PageBreak);
        ctx.emit(ContentNode::LineBreak);
        assert_eq!(ctx.pending_output(), 2);
        assert_eq!(ctx.take_output(), Some(ContentNode::PageBreak));
        assert_eq!(ctx.take_output(), Some(ContentNode::LineBreak));
        assert_eq!(ctx.take_output(), None);
    }

    #[test]
    fn test_title_accumulates() {
        let mut ctx = Context::new(Arc::new(ConversionConfig::default()));
        assert_eq!(ctx.title(), None);
        ctx.append_title("Annual ");
        ctx.append_title("Report");
        assert_eq!(ctx.title(), Some("Annual Report"));
    }
}
