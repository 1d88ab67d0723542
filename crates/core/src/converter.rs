//! Wires the parser and the three stages into one conversion.
//!
//! A [`Converter`] holds everything that is shared between runs: the
//! configuration, parsed stylesheets, the handler registry and the providers.
//! All of it is immutable once built, so one converter can serve many
//! documents, concurrently if the caller wants to.

use crate::config::ConversionConfig;
use crate::context::Context;
use crate::error::ConversionError;
use crate::fonts::FontResolver;
use crate::handlers::HandlerRegistry;
use crate::pipeline::{Pipeline, RunReport};
use crate::stages::{CssStage, SinkStage, TagStage};
use sheaf_css::user_agent::user_agent_stylesheet;
use sheaf_css::{CssResolver, Stylesheet, StylesheetParser};
use sheaf_markup::{Event, MarkupParser};
use sheaf_traits::{DocumentWriter, FontProvider, InMemoryResourceProvider, ResourceProvider};
use sheaf_types::Diagnostic;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Converter {
    config: Arc<ConversionConfig>,
    user_agent: Arc<Stylesheet>,
    stylesheets: Vec<Arc<Stylesheet>>,
    registry: Arc<HandlerRegistry>,
    resources: Arc<dyn ResourceProvider>,
    fonts: Option<Arc<dyn FontProvider>>,
    /// Problems found in caller-supplied stylesheets, repeated in every report.
    setup_diagnostics: Vec<Diagnostic>,
}

impl Converter {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            config: Arc::new(config),
            user_agent: Arc::new(user_agent_stylesheet()),
            stylesheets: Vec::new(),
            registry: Arc::new(HandlerRegistry::with_defaults()),
            resources: Arc::new(InMemoryResourceProvider::new()),
            fonts: None,
            setup_diagnostics: Vec::new(),
        }
    }

    pub fn with_resources(mut self, resources: Arc<dyn ResourceProvider>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_fonts(mut self, fonts: Arc<dyn FontProvider>) -> Self {
        log::info!(
            "Font catalog {} offers {} families",
            fonts.name(),
            fonts.list_families().len()
        );
        self.fonts = Some(fonts);
        self
    }

    pub fn with_registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Adds an already parsed author stylesheet. Sheets added later win ties.
    pub fn with_stylesheet(mut self, sheet: Arc<Stylesheet>) -> Self {
        self.stylesheets.push(sheet);
        self
    }

    /// Parses and adds an author stylesheet. `@import` references resolve
    /// through the converter's resource provider, so set that first.
    pub fn with_stylesheet_source(mut self, source: &str) -> Self {
        let (sheet, diagnostics) = StylesheetParser::new()
            .with_medium(self.config.media.clone())
            .with_resources(self.resources.as_ref())
            .parse(source);
        for diagnostic in &diagnostics {
            diagnostic.log();
        }
        self.setup_diagnostics.extend(diagnostics);
        self.stylesheets.push(Arc::new(sheet));
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn stylesheets(&self) -> &[Arc<Stylesheet>] {
        &self.stylesheets
    }

    /// Decodes and converts `bytes`. `charset` is the encoding label the
    /// caller knows the input to be in. Decoding failures are returned before
    /// the writer sees any call.
    pub fn convert<W: DocumentWriter>(
        &self,
        bytes: &[u8],
        charset: Option<&str>,
        writer: W,
    ) -> Result<RunReport, ConversionError> {
        let parser = MarkupParser::new(self.config.markup_config());
        let parsed = parser.parse(bytes, charset)?;
        log::debug!(
            "Decoded {} bytes as {} into {} events",
            bytes.len(),
            parsed.encoding,
            parsed.events.len()
        );
        self.convert_events(parsed.events, parsed.diagnostics, writer)
    }

    /// Converts text that is already decoded.
    pub fn convert_str<W: DocumentWriter>(&self, text: &str, writer: W) -> Result<RunReport, ConversionError> {
        let parsed = MarkupParser::new(self.config.markup_config()).parse_str(text);
        self.convert_events(parsed.events, parsed.diagnostics, writer)
    }

    /// Runs a ready-made event stream through the stages.
    pub fn convert_events<W: DocumentWriter>(
        &self,
        events: Vec<Event>,
        diagnostics: Vec<Diagnostic>,
        writer: W,
    ) -> Result<RunReport, ConversionError> {
        let mut ctx = Context::new(Arc::clone(&self.config));
        ctx.extend_diagnostics(self.setup_diagnostics.iter().cloned());
        ctx.extend_diagnostics(diagnostics);

        let mut resolver = CssResolver::new().with_user_agent(Arc::clone(&self.user_agent));
        for sheet in &self.stylesheets {
            resolver.add_stylesheet(Arc::clone(sheet));
        }
        let fonts = FontResolver::new(
            self.fonts.clone(),
            self.config.font_embedding,
            self.config.default_font_family.clone(),
        );

        let mut pipeline = Pipeline::new()
            .with_stage(CssStage::new(resolver, Arc::clone(&self.resources)))
            .with_stage(TagStage::new(
                Arc::clone(&self.registry),
                fonts,
                Arc::clone(&self.resources),
            ))
            .with_stage(SinkStage::new(writer));

        let report = pipeline.run(events, ctx)?;
        log::info!(
            "Converted document: {} blocks on {} pages, {} bookmarks, {} diagnostics",
            report.blocks,
            report.pages,
            report.bookmarks,
            report.diagnostics.len()
        );
        Ok(report)
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConversionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheaf_idf::ContentNode;
    use sheaf_markup::MarkupError;
    use sheaf_traits::RecordingWriter;
    use sheaf_types::DiagnosticKind;

    #[test]
    fn test_convert_builds_blocks_in_document_order() {
        let mut writer = RecordingWriter::new();
        let report = Converter::default()
            .convert_str("<h1>Intro</h1><p>First</p><ul><li>one<li>two</ul>", &mut writer)
            .unwrap();
        let kinds: Vec<&str> = writer.blocks().iter().map(|b| b.kind()).collect();
        assert_eq!(kinds, vec!["heading", "paragraph", "list"]);
        assert_eq!(report.blocks, 3);
        assert_eq!(report.bookmarks, 1);
        assert_eq!(report.pages, 1);
    }

    #[test]
    fn test_caller_stylesheet_applies() {
        let mut writer = RecordingWriter::new();
        Converter::default()
            .with_stylesheet_source("p { color: #0000ff }")
            .convert_str("<p>blue</p>", &mut writer)
            .unwrap();
        let ContentNode::Paragraph { children, .. } = writer.blocks()[0] else {
            panic!("expected a paragraph");
        };
        let ContentNode::TextRun(run) = &children[0] else {
            panic!("expected a text run");
        };
        assert_eq!(run.color.b, 255);
    }

    #[test]
    fn test_font_catalog_serves_author_families() {
        let catalog = sheaf_traits::InMemoryFontProvider::new();
        catalog
            .add_font("Inter", sheaf_style::FontWeight::Regular, sheaf_style::FontStyle::Normal, vec![0u8; 16])
            .unwrap();
        let mut writer = RecordingWriter::new();
        Converter::default()
            .with_fonts(Arc::new(catalog))
            .with_stylesheet_source("p { font-family: Inter, serif }")
            .convert_str("<p>text</p>", &mut writer)
            .unwrap();
        let ContentNode::TextRun(run) = &writer.blocks()[0].children()[0] else {
            panic!("expected a text run");
        };
        assert_eq!(run.font.family, "Inter");
    }

    #[test]
    fn test_undecodable_input_never_reaches_writer() {
        let mut writer = RecordingWriter::new();
        let converter = Converter::new(ConversionConfig::default().with_charset_override("x-no-such-charset"));
        let err = converter.convert(b"<p>x</p>", None, &mut writer).unwrap_err();
        assert!(matches!(err, ConversionError::Markup(MarkupError::UnknownCharset(_))));
        assert!(writer.calls.is_empty());
    }

    #[test]
    fn test_stylesheet_problems_show_up_in_report() {
        let mut writer = RecordingWriter::new();
        let report = Converter::default()
            .with_stylesheet_source("p { color: notacolor }")
            .convert_str("<p>x</p>", &mut writer)
            .unwrap();
        assert!(report.diagnostics.iter().any(|d| d.kind == DiagnosticKind::Style));
    }
}
