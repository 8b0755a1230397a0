//! Markup rendering for the display buffer.
//!
//! The accumulated buffer is treated as lightweight markup and rendered to
//! sanitized HTML on every update. `markdown::to_html` escapes raw HTML by
//! default, so capability output cannot inject markup.

/// Render the display buffer as sanitized rich text.
pub fn render_markup(buffer: &str) -> String {
    markdown::to_html(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_markdown_structure() {
        let html = render_markup("# Summary\n\nSome **bold** text");
        assert!(html.contains("<h1>Summary</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
    }

    #[test]
    fn test_is_pure_function_of_buffer() {
        let buffer = "- one\n- two";
        assert_eq!(render_markup(buffer), render_markup(buffer));
    }

    #[test]
    fn test_escapes_raw_html() {
        let html = render_markup("hello <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(render_markup(""), "");
    }
}
