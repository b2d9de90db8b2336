use std::fmt::Write as _;

const PAGE_STYLE: &str = "body { font-family: Arial, sans-serif; margin: 2cm; } \
h1 { color: #333366; } h2 { color: #336699; margin-top: 1.5em; } \
h3 { color: #339999; margin-top: 1.2em; } \
.footer { text-align: center; font-size: 0.8em; margin-top: 2em; color: #666; }";

/// Converts a markdown report into a complete styled HTML page. The
/// converter covers the subset the report prompts produce: headings,
/// bullet lists, and paragraphs.
#[must_use]
pub fn markdown_to_html_page(title: &str, markdown: &str) -> String {
    let body = markdown_to_html(markdown);
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n\
         <title>{}</title>\n<style>{PAGE_STYLE}</style>\n</head>\n<body>\n{body}\
         <div class=\"footer\">Generated by Ethica</div>\n</body>\n</html>\n",
        escape(title)
    )
}

/// Converts the markdown subset into an HTML fragment.
#[must_use]
pub fn markdown_to_html(markdown: &str) -> String {
    let mut html = String::new();
    let mut in_list = false;
    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            close_list(&mut html, &mut in_list);
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("### ") {
            close_list(&mut html, &mut in_list);
            let _ = writeln!(html, "<h3>{}</h3>", escape(rest));
        } else if let Some(rest) = trimmed.strip_prefix("## ") {
            close_list(&mut html, &mut in_list);
            let _ = writeln!(html, "<h2>{}</h2>", escape(rest));
        } else if let Some(rest) = trimmed.strip_prefix("# ") {
            close_list(&mut html, &mut in_list);
            let _ = writeln!(html, "<h1>{}</h1>", escape(rest));
        } else if let Some(rest) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* "))
        {
            if !in_list {
                html.push_str("<ul>\n");
                in_list = true;
            }
            let _ = writeln!(html, "<li>{}</li>", escape(rest));
        } else {
            close_list(&mut html, &mut in_list);
            let _ = writeln!(html, "<p>{}</p>", escape(trimmed));
        }
    }
    close_list(&mut html, &mut in_list);
    html
}

fn close_list(html: &mut String, in_list: &mut bool) {
    if *in_list {
        html.push_str("</ul>\n");
        *in_list = false;
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
