//! # sheaf-core
//!
//! The conversion pipeline: markup events flow through a CSS stage, a tag
//! stage and a sink stage, and come out as structured blocks handed to a
//! [`DocumentWriter`](sheaf_traits::DocumentWriter).
//!
//! - **pipeline**: the stage chain and the synthetic event queue
//! - **context**: per-run state threaded through the stages
//! - **stages**: CSS resolution, tag handling, output
//! - **handlers**: per-tag behaviour of the tag stage
//! - **repair**: wrapping of misplaced content
//! - **fonts**: font resolution against a catalog and the base-14 faces
//! - **converter**: everything wired together
//!
//! The crate does no I/O of its own beyond what the providers passed to it do.

pub use sheaf_css as css;
pub use sheaf_idf as idf;
pub use sheaf_markup as markup;
pub use sheaf_style as style;
pub use sheaf_traits as traits;
pub use sheaf_types as types;

pub mod config;
pub mod context;
pub mod converter;
pub mod error;
pub mod fonts;
pub mod handlers;
pub mod pipeline;
pub mod repair;
pub mod stages;

pub use config::{ConversionConfig, FontEmbedding, PageConfig};
pub use context::{Context, Frame, StageId};
pub use converter::Converter;
pub use error::ConversionError;
pub use fonts::FontResolver;
pub use handlers::{HandlerCtx, HandlerId, HandlerRegistry, TagHandler, TextFlow};
pub use pipeline::{EventQueue, Flow, Pipeline, RunReport, RunStats, Stage};
pub use stages::{CssStage, SinkStage, TagStage};

#[cfg(feature = "system-fonts")]
pub use fonts::SystemFontProvider;

pub use sheaf_idf::{Bookmark, ContentNode};
pub use sheaf_traits::{
    DocumentWriter, FilesystemResourceProvider, FontProvider, InMemoryFontProvider,
    InMemoryResourceProvider, InsertionPoint, PageLayout, RecordingWriter, ResourceProvider,
    WriterError,
};
pub use sheaf_types::{Diagnostic, DiagnosticKind};
