//! Chat formatting helpers

/// Split `text` into pages of at most `page_len` chars, preferring line breaks
pub fn pagify(text: &str, page_len: usize) -> Vec<String> {
    let mut pages = Vec::new();
    let mut rest = text;
    while rest.chars().count() > page_len {
        let cut = rest
            .char_indices()
            .nth(page_len)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let split = rest[..cut].rfind('\n').filter(|&i| i > 0).unwrap_or(cut);
        let (page, tail) = rest.split_at(split);
        if !page.trim().is_empty() {
            pages.push(page.to_string());
        }
        rest = tail.strip_prefix('\n').unwrap_or(tail);
    }
    if !rest.trim().is_empty() {
        pages.push(rest.to_string());
    }
    pages
}

/// `1234567` -> `1,234,567`
pub fn humanize_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Truncate to at most `max` chars
pub fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Wrap in a code block
pub fn box_text(text: &str) -> String {
    format!("```\n{}```", text)
}
