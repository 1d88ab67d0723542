mod common;

use common::pdf_assertions::{has_image, link_actions, outline_titles, page_sizes};
use common::{TestResult, generate_pdf, generate_pdf_with};
use sheaf::markup::MarkupError;
use sheaf::{ConversionError, HtmlConverter, SheafError};
use std::io::Cursor;

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 120, 200]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

#[test]
fn test_simple_document_renders_text() -> TestResult {
    let pdf = generate_pdf("<h1>Quarterly</h1><p>Revenue grew steadily.</p>")?;
    assert_eq!(pdf.page_count(), 1);
    assert_eq!(pdf.report.pages, 1);
    let text = pdf.text();
    assert!(text.contains("Quarterly"), "missing heading in {:?}", text);
    assert!(text.contains("Revenue"), "missing body in {:?}", text);
    Ok(())
}

#[test]
fn test_outline_has_one_entry_per_heading() -> TestResult {
    let pdf = generate_pdf("<h1>Intro</h1><p>a</p><h2>Scope</h2><h2>Method</h2><h1>Results</h1><h3>Deep</h3>")?;
    let titles = outline_titles(&pdf.doc);
    assert_eq!(
        titles,
        vec![
            (0, "Intro".to_string()),
            (1, "Scope".to_string()),
            (1, "Method".to_string()),
            (0, "Results".to_string()),
            (1, "Deep".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn test_non_latin_heading_titles_survive() -> TestResult {
    let pdf = generate_pdf("<h1>Übersicht ΩΣ</h1>")?;
    assert_eq!(outline_titles(&pdf.doc), vec![(0, "Übersicht ΩΣ".to_string())]);
    Ok(())
}

#[test]
fn test_long_documents_paginate() -> TestResult {
    let body: String = (0..200).map(|i| format!("<p>Paragraph number {}</p>", i)).collect();
    let pdf = generate_pdf(&format!("<h1>Start</h1>{}<h1>Finish</h1>", body))?;
    assert!(pdf.page_count() > 1);
    assert_eq!(pdf.report.pages, pdf.page_count());
    assert_eq!(outline_titles(&pdf.doc).len(), 2);
    Ok(())
}

#[test]
fn test_explicit_page_breaks() -> TestResult {
    let pdf = generate_pdf(
        "<p>one</p><div style=\"page-break-after: always\">two</div><p>three</p><h2 style=\"page-break-before: always\">four</h2>",
    )?;
    assert_eq!(pdf.page_count(), 3);
    Ok(())
}

#[test]
fn test_page_rule_sets_media_box() -> TestResult {
    let pdf = generate_pdf("<style>@page { size: letter }</style><p>letter sized</p>")?;
    assert_eq!(page_sizes(&pdf.doc), vec![(612.0, 792.0)]);
    Ok(())
}

#[test]
fn test_links_become_annotations() -> TestResult {
    let pdf = generate_pdf(
        "<p><a href=\"https://example.com\">site</a> and <a href=\"#later\">jump</a></p>\
         <h2 id=\"later\">Later</h2><p><a href=\"#nowhere\">dangling</a></p>",
    )?;
    assert_eq!(link_actions(&pdf.doc, b"URI"), 1);
    assert_eq!(link_actions(&pdf.doc, b"GoTo"), 1);
    Ok(())
}

#[test]
fn test_images_load_from_base_directory() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("chart.png"), png(40, 20))?;
    let converter = HtmlConverter::builder().with_base_dir(dir.path()).build()?;
    let pdf = generate_pdf_with(&converter, "<p>Chart:<img src=\"chart.png\" alt=\"chart\"></p>")?;
    assert!(has_image(&pdf.doc));
    assert!(pdf.report.diagnostics.is_empty(), "{:?}", pdf.report.diagnostics);
    Ok(())
}

#[test]
fn test_missing_image_falls_back_to_alt_text() -> TestResult {
    let pdf = generate_pdf("<p><img src=\"nope.png\" alt=\"Company logo\"></p>")?;
    assert!(!has_image(&pdf.doc));
    assert!(pdf.text().contains("logo"));
    Ok(())
}

#[test]
fn test_tables_and_lists_render() -> TestResult {
    let pdf = generate_pdf(
        "<table><tr><th>Name</th><th>Qty</th></tr><tr><td>Apples</td><td>3</td></tr></table>\
         <ol><li>first</li><li>second</li></ol>",
    )?;
    let text = pdf.text();
    for word in ["Name", "Qty", "Apples", "first", "second"] {
        assert!(text.contains(word), "missing {} in {:?}", word, text);
    }
    Ok(())
}

#[test]
fn test_convert_file_writes_output() -> TestResult {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("in.html");
    let output = dir.path().join("out.pdf");
    let css = dir.path().join("extra.css");
    std::fs::write(&input, "<title>File test</title><h1>Hello</h1>")?;
    std::fs::write(&css, "h1 { color: #aa0000 }")?;

    let converter = HtmlConverter::builder()
        .with_base_dir(dir.path())
        .with_stylesheet_file(&css)
        .build()?;
    let report = converter.convert_file(&input, &output)?;
    assert_eq!(report.bookmarks, 1);

    let doc = lopdf::Document::load_mem(&std::fs::read(&output)?)?;
    assert_eq!(doc.get_pages().len(), 1);
    Ok(())
}

#[test]
fn test_undecodable_file_creates_no_output() -> TestResult {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("bad.html");
    let output = dir.path().join("bad.pdf");
    std::fs::write(&input, b"<p>\xff\xff</p>")?;

    let err = HtmlConverter::builder()
        .build()?
        .convert_file(&input, &output)
        .unwrap_err();
    assert!(matches!(
        err,
        SheafError::Conversion(ConversionError::Markup(MarkupError::Decoding { .. }))
    ));
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_config_file_drives_page_geometry() -> TestResult {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("sheaf.json");
    std::fs::write(
        &config,
        serde_json::json!({
            "page": { "size": "A5", "margins": { "top": 20, "right": 20, "bottom": 20, "left": 20 } },
            "autoBookmark": false
        })
        .to_string(),
    )?;
    let converter = HtmlConverter::builder().with_config_file(&config)?.build()?;
    let pdf = generate_pdf_with(&converter, "<h1>Small</h1>")?;
    let sizes = page_sizes(&pdf.doc);
    assert!((sizes[0].0 - 419.53).abs() < 0.01);
    assert!(outline_titles(&pdf.doc).is_empty());
    Ok(())
}

#[test]
fn test_batch_conversion_keeps_input_order() -> TestResult {
    let converter = HtmlConverter::builder()
        .with_stylesheet_source("p { margin-bottom: 6pt }")
        .build()?;
    let long: String = (0..150).map(|i| format!("<p>line {}</p>", i)).collect();
    let documents = vec![
        "<p>short</p>".to_string(),
        long,
        "<p>bad \u{0}</p>".to_string(),
    ];
    let results = converter.convert_batch(&documents);
    assert_eq!(results.len(), 3);
    let pages: Vec<usize> = results
        .iter()
        .map(|r| r.as_ref().map(|(_, report)| report.pages).unwrap_or(0))
        .collect();
    assert_eq!(pages[0], 1);
    assert!(pages[1] > 1);
    Ok(())
}
