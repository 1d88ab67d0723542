#![allow(dead_code)]

pub mod pdf_assertions;

use lopdf::Document as LopdfDocument;
use sheaf::idf::TextRun;
use sheaf::{ContentNode, HtmlConverter, RecordingWriter, RunReport, SheafError};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Wrapper around a generated PDF with helper methods
pub struct GeneratedPdf {
    pub bytes: Vec<u8>,
    pub doc: LopdfDocument,
    pub report: RunReport,
}

impl GeneratedPdf {
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    pub fn text(&self) -> String {
        pdf_assertions::extract_text(&self.doc)
    }
}

/// Converts `html` with a default converter into a recording writer.
pub fn record(html: &str) -> (RecordingWriter, RunReport) {
    record_with(&HtmlConverter::builder().build().unwrap(), html)
}

pub fn record_with(converter: &HtmlConverter, html: &str) -> (RecordingWriter, RunReport) {
    let mut writer = RecordingWriter::new();
    let report = converter.convert_with(html.as_bytes(), &mut writer).unwrap();
    (writer, report)
}

/// Converts `html` with the given stylesheet into a recording writer.
pub fn record_styled(css: &str, html: &str) -> (RecordingWriter, RunReport) {
    let converter = HtmlConverter::builder().with_stylesheet_source(css).build().unwrap();
    record_with(&converter, html)
}

pub fn generate_pdf(html: &str) -> Result<GeneratedPdf, SheafError> {
    generate_pdf_with(&HtmlConverter::builder().build()?, html)
}

pub fn generate_pdf_with(converter: &HtmlConverter, html: &str) -> Result<GeneratedPdf, SheafError> {
    let (bytes, report) = converter.convert_to_vec(html.as_bytes())?;
    let doc = LopdfDocument::load_mem(&bytes).expect("generated PDF should parse");
    Ok(GeneratedPdf { bytes, doc, report })
}

/// Every text run below `node`, depth first.
pub fn text_runs(node: &ContentNode) -> Vec<&TextRun> {
    let mut runs = Vec::new();
    collect_runs(node, &mut runs);
    runs
}

fn collect_runs<'a>(node: &'a ContentNode, runs: &mut Vec<&'a TextRun>) {
    if let ContentNode::TextRun(run) = node {
        runs.push(run);
    }
    for child in node.children() {
        collect_runs(child, runs);
    }
}

pub fn kinds(nodes: &[&ContentNode]) -> Vec<&'static str> {
    nodes.iter().map(|n| n.kind()).collect()
}
