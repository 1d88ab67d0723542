//! # sheaf
//!
//! Converts HTML with CSS into structured, paginated documents. The pipeline
//! itself lives in `sheaf-core`; this crate wires it to the PDF writer from
//! `sheaf-render-lopdf` behind a small builder.
//!
//! ```no_run
//! use sheaf::HtmlConverter;
//!
//! let converter = HtmlConverter::builder()
//!     .with_stylesheet_source("h1 { color: navy }")
//!     .build()?;
//! let (pdf, report) = converter.convert_to_vec(b"<h1>Hello</h1><p>World</p>")?;
//! println!("{} bytes, {} pages", pdf.len(), report.pages);
//! # Ok::<(), sheaf::SheafError>(())
//! ```

pub use sheaf_core::*;
pub use sheaf_render_lopdf::{PdfDocumentWriter, RenderError};

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SheafError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SheafError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        SheafError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Collects configuration, resources and stylesheets for an [`HtmlConverter`].
#[derive(Debug, Default)]
pub struct HtmlConverterBuilder {
    config: Option<ConversionConfig>,
    base_dir: Option<PathBuf>,
    resources: Option<Arc<dyn ResourceProvider>>,
    fonts: Option<Arc<dyn FontProvider>>,
    system_fonts: bool,
    stylesheet_sources: Vec<String>,
    stylesheet_files: Vec<PathBuf>,
}

impl HtmlConverterBuilder {
    pub fn with_config(mut self, config: ConversionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Loads the configuration from a JSON file with camelCase keys.
    pub fn with_config_file(mut self, path: impl AsRef<Path>) -> Result<Self, SheafError> {
        self.config = Some(ConversionConfig::from_file(path)?);
        Ok(self)
    }

    /// Resolves images and stylesheet links relative to `dir`, without leaving it.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Uses a custom resource provider. Takes precedence over `with_base_dir`.
    pub fn with_resources(mut self, resources: Arc<dyn ResourceProvider>) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn with_fonts(mut self, fonts: Arc<dyn FontProvider>) -> Self {
        self.fonts = Some(fonts);
        self
    }

    /// Scans the host's installed fonts. Only has an effect with the
    /// `system-fonts` feature; without it a warning is logged at build time.
    pub fn with_system_fonts(mut self, system_fonts: bool) -> Self {
        self.system_fonts = system_fonts;
        self
    }

    /// Adds an author stylesheet. Later sheets win ties.
    pub fn with_stylesheet_source(mut self, source: impl Into<String>) -> Self {
        self.stylesheet_sources.push(source.into());
        self
    }

    /// Adds an author stylesheet read from disk when the converter is built.
    /// File sheets come after inline sources.
    pub fn with_stylesheet_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stylesheet_files.push(path.into());
        self
    }

    pub fn build(self) -> Result<HtmlConverter, SheafError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let page = config.page.layout();

        let resources: Arc<dyn ResourceProvider> = match (self.resources, &self.base_dir) {
            (Some(resources), _) => resources,
            (None, Some(dir)) => Arc::new(FilesystemResourceProvider::new(dir)),
            (None, None) => Arc::new(InMemoryResourceProvider::new()),
        };

        let mut converter = Converter::new(config).with_resources(resources);
        if let Some(fonts) = system_fonts(self.system_fonts).or(self.fonts) {
            converter = converter.with_fonts(fonts);
        }
        for source in &self.stylesheet_sources {
            converter = converter.with_stylesheet_source(source);
        }
        for path in &self.stylesheet_files {
            let source = std::fs::read_to_string(path).map_err(|e| SheafError::io(path, e))?;
            log::info!("Loaded stylesheet {}", path.display());
            converter = converter.with_stylesheet_source(&source);
        }
        Ok(HtmlConverter { converter, page })
    }
}

#[cfg(feature = "system-fonts")]
fn system_fonts(enabled: bool) -> Option<Arc<dyn FontProvider>> {
    enabled.then(|| Arc::new(SystemFontProvider::load()) as Arc<dyn FontProvider>)
}

#[cfg(not(feature = "system-fonts"))]
fn system_fonts(enabled: bool) -> Option<Arc<dyn FontProvider>> {
    if enabled {
        log::warn!("System fonts requested but sheaf was built without the `system-fonts` feature");
    }
    None
}

/// A ready-to-use converter. Cheap to share: every run gets its own state
/// and output while stylesheets, fonts and resources are shared.
#[derive(Debug, Clone)]
pub struct HtmlConverter {
    converter: Converter,
    page: PageLayout,
}

impl HtmlConverter {
    pub fn builder() -> HtmlConverterBuilder {
        HtmlConverterBuilder::default()
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// Runs the pipeline into any writer.
    pub fn convert_with<W: DocumentWriter>(&self, html: &[u8], writer: W) -> Result<RunReport, SheafError> {
        Ok(self.converter.convert(html, None, writer)?)
    }

    /// Converts `html` and writes the PDF to `out`.
    pub fn convert_to_pdf<W: Write>(&self, html: &[u8], out: W) -> Result<(W, RunReport), SheafError> {
        let mut writer = PdfDocumentWriter::new(out).with_page_layout(self.page.clone());
        let report = self.converter.convert(html, None, &mut writer)?;
        Ok((writer.into_inner(), report))
    }

    pub fn convert_to_vec(&self, html: &[u8]) -> Result<(Vec<u8>, RunReport), SheafError> {
        self.convert_to_pdf(html, Vec::new())
    }

    /// Converts one file into another. Nothing is created at `output` when
    /// the input cannot be decoded.
    pub fn convert_file(&self, input: &Path, output: &Path) -> Result<RunReport, SheafError> {
        let html = std::fs::read(input).map_err(|e| SheafError::io(input, e))?;
        let (pdf, report) = self.convert_to_vec(&html)?;
        let file = File::create(output).map_err(|e| SheafError::io(output, e))?;
        let mut out = BufWriter::new(file);
        out.write_all(&pdf)
            .and_then(|_| out.flush())
            .map_err(|e| SheafError::io(output, e))?;
        Ok(report)
    }

    /// Converts independent documents in parallel. Results keep input order.
    #[cfg(feature = "rayon")]
    pub fn convert_batch<D>(&self, documents: &[D]) -> Vec<Result<(Vec<u8>, RunReport), SheafError>>
    where
        D: AsRef<[u8]> + Sync,
    {
        use rayon::prelude::*;
        documents
            .par_iter()
            .map(|html| self.convert_to_vec(html.as_ref()))
            .collect()
    }

    /// Converts independent documents one after another.
    #[cfg(not(feature = "rayon"))]
    pub fn convert_batch<D>(&self, documents: &[D]) -> Vec<Result<(Vec<u8>, RunReport), SheafError>>
    where
        D: AsRef<[u8]> + Sync,
    {
        documents
            .iter()
            .map(|html| self.convert_to_vec(html.as_ref()))
            .collect()
    }
}
