pub mod font;
pub mod resource;
pub mod writer;

pub use font::{
    FontDescriptor, FontError, FontProvider, FontQuery, InMemoryFontProvider, SharedFontData,
};
pub use resource::{
    FilesystemResourceProvider, InMemoryResourceProvider, ResourceError, ResourceProvider,
    SharedResourceData,
};
pub use writer::{
    DocumentWriter, InsertionPoint, PageLayout, RecordedCall, RecordingWriter, WriterError,
};
