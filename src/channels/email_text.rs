//! Plain-text extraction for fetched email bodies.

/// Drop HTML tags and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove reply quoting: `>` lines, and everything from an
/// "On ... wrote:" attribution or an "Original Message" separator on.
pub fn strip_quoted_text(body: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('>') {
            continue;
        }
        let attribution = trimmed.starts_with("On ") && trimmed.ends_with("wrote:");
        let separator = trimmed.starts_with("---") && trimmed.contains("Original Message");
        if attribution || separator {
            break;
        }
        kept.push(line);
    }

    while kept.last().is_some_and(|l| l.trim().is_empty()) {
        kept.pop();
    }
    kept.join("\n")
}
