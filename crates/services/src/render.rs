//! Default text renderer: HTML-escaped paragraphs.

use domains::TextRenderer;

/// Escapes HTML and turns blank-line separated blocks into `<p>` paragraphs,
/// with single newlines kept as `<br>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscapingRenderer;

impl TextRenderer for EscapingRenderer {
    fn render(&self, text: &str) -> String {
        let normalized = text.replace("\r\n", "\n");
        normalized
            .split("\n\n")
            .map(str::trim)
            .filter(|block| !block.is_empty())
            .map(|block| {
                let lines: Vec<String> = block
                    .lines()
                    .map(|line| html_escape::encode_safe(line).to_string())
                    .collect();
                format!("<p>{}</p>", lines.join("<br>"))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
