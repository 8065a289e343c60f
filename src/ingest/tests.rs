use super::*;

const CAPITAL_PDF: &[u8] = include_bytes!("../../tests/fixtures/capital.pdf");
const TWO_PAGES_PDF: &[u8] = include_bytes!("../../tests/fixtures/two_pages.pdf");

#[test]
fn accepts_pdf_filenames() {
    for name in ["report.pdf", "REPORT.PDF", "archive.v2.Pdf", "with space.pdf"] {
        assert!(validate_pdf_filename(name).is_ok(), "{name} should be accepted");
    }
}

#[test]
fn rejects_other_filenames() {
    for name in ["notes.txt", "pdf", "report.pdf.exe", ".pdf", "", "report.pdfx"] {
        let error = validate_pdf_filename(name).expect_err("should be rejected");
        assert!(
            matches!(error, AssistantError::UnsupportedFormat(_)),
            "{name} gave {error:?}"
        );
        assert_eq!(error.to_string(), "Only PDF files are supported.");
    }
}

#[test]
fn extracts_single_page_text() {
    let text = extract_text(CAPITAL_PDF).expect("fixture should parse");

    assert!(
        text.contains("The capital of France is Paris."),
        "unexpected text: {text:?}"
    );
    assert!(text.ends_with('\n'));
}

#[test]
fn pages_are_separated_in_order() {
    let text = extract_text(TWO_PAGES_PDF).expect("fixture should parse");

    let first = text
        .find("Rust was first released in 2015.")
        .expect("first page text");
    let second = text
        .find("Cargo is the Rust package manager.")
        .expect("second page text");
    assert!(first < second);

    let between = text.get(first..second).expect("char boundary");
    assert!(between.contains('\n'), "pages should be newline separated");
}

#[test]
fn invalid_bytes_are_an_extraction_error() {
    let error = extract_text(b"definitely not a pdf").expect_err("garbage should fail");
    assert!(matches!(error, AssistantError::Extraction(_)));
}

#[test]
fn truncated_pdf_is_an_extraction_error() {
    let truncated = CAPITAL_PDF.get(..CAPITAL_PDF.len() / 2).expect("slice");
    assert!(matches!(
        extract_text(truncated),
        Err(AssistantError::Extraction(_))
    ));
}

#[test]
fn multiple_documents_concatenate_in_order() {
    let documents = vec![
        PdfDocument::new("two_pages.pdf", TWO_PAGES_PDF.to_vec()),
        PdfDocument::new("capital.pdf", CAPITAL_PDF.to_vec()),
    ];

    let text = extract_text_from_pdfs(&documents).expect("both fixtures should parse");

    let cargo = text.find("Cargo").expect("second document page");
    let paris = text.find("Paris").expect("capital document");
    assert!(cargo < paris);
}

#[test]
fn one_bad_document_fails_the_batch() {
    let documents = vec![
        PdfDocument::new("capital.pdf", CAPITAL_PDF.to_vec()),
        PdfDocument::new("broken.pdf", b"%PDF-1.4 broken".to_vec()),
    ];

    assert!(extract_text_from_pdfs(&documents).is_err());
}

#[tokio::test]
async fn extraction_runs_off_the_runtime() {
    let text = extract_text_blocking(vec![PdfDocument::new(
        "capital.pdf",
        CAPITAL_PDF.to_vec(),
    )])
    .await
    .expect("fixture should parse");

    assert!(text.contains("Paris"));
}
