//! Plain-text export of a document.

use ghostwriter_core::document::Paragraph;

/// File name used when the document has no usable name.
pub const DEFAULT_EXPORT_FILE_NAME: &str = "ghostwriter.txt";

/// Renders paragraphs as plain text, one block per paragraph.
///
/// The generated output is preferred; paragraphs that were never completed
/// fall back to their input. Empty paragraphs are skipped.
pub fn render<'a>(paragraphs: impl IntoIterator<Item = &'a Paragraph>) -> String {
    let blocks: Vec<&str> = paragraphs
        .into_iter()
        .map(|paragraph| {
            let output = paragraph.output.trim();
            if output.is_empty() {
                paragraph.input.trim()
            } else {
                output
            }
        })
        .filter(|text| !text.is_empty())
        .collect();

    if blocks.is_empty() {
        return String::new();
    }
    let mut text = blocks.join("\n\n");
    text.push('\n');
    text
}

/// Derives a safe `.txt` file name from a document name.
pub fn file_name(document_name: &str) -> String {
    let sanitized: String = document_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_matches('.').trim();

    if sanitized.is_empty() {
        return DEFAULT_EXPORT_FILE_NAME.to_string();
    }
    if sanitized.to_lowercase().ends_with(".txt") {
        sanitized.to_string()
    } else {
        format!("{sanitized}.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prefers_output() {
        let paragraphs = vec![
            Paragraph::new("idea one").with_output("Polished one."),
            Paragraph::new("idea two"),
            Paragraph::new(""),
            Paragraph::new("").with_output("Only output."),
        ];

        assert_eq!(
            render(&paragraphs),
            "Polished one.\n\nidea two\n\nOnly output.\n"
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&Vec::<Paragraph>::new()), "");
        assert_eq!(render(&[Paragraph::new("  ")]), "");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("Chapter 1"), "Chapter 1.txt");
        assert_eq!(file_name("notes.txt"), "notes.txt");
        assert_eq!(file_name("a/b:c"), "a_b_c.txt");
        assert_eq!(file_name("   "), DEFAULT_EXPORT_FILE_NAME);
        assert_eq!(file_name(".."), DEFAULT_EXPORT_FILE_NAME);
    }
}
