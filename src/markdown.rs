use comrak::{markdown_to_html_with_plugins, plugins::syntect, Options, Plugins};

// Render Markdown into HTML, raw HTML in the source is omitted from the output.
pub fn render(md_content: &str, code_theme: &str) -> String {
    // enable some extension options.
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.extension.table = true;
    options.render.figure_with_caption = true;
    // enable the syntax highlight adapter.
    let mut plugins = Plugins::default();
    let adapter = syntect::SyntectAdapterBuilder::new()
        .theme(code_theme)
        .build();
    plugins.render.codefence_syntax_highlighter = Some(&adapter);

    markdown_to_html_with_plugins(md_content, &options, &plugins)
}

#[cfg(test)]
mod tests {
    use super::render;

    const THEME: &str = "base16-ocean.dark";

    #[test]
    fn test_render_basics() {
        let html = render("# Title\n\nSome **bold** and ~~gone~~ text.", THEME);
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn test_render_autolink_and_table() {
        let html = render("see https://example.com\n\n| a | b |\n|---|---|\n| 1 | 2 |\n", THEME);
        assert!(html.contains("<a href=\"https://example.com\">"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_raw_html_is_not_passed_through() {
        let html = render("<script>alert(1)</script>\n\nhello", THEME);
        assert!(!html.contains("<script>"));
        assert!(html.contains("hello"));
    }

    #[test]
    fn test_code_fence_is_highlighted() {
        let html = render("```rust\nfn main() {}\n```\n", THEME);
        assert!(html.contains("<pre"));
        assert!(html.contains("style="));
    }
}
