//! The three stages of the standard pipeline, in the order they run.

pub mod css;
pub mod sink;
pub mod tags;

pub use css::CssStage;
pub use sink::SinkStage;
pub use tags::TagStage;
