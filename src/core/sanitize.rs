// src/core/sanitize.rs

pub fn normalize_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space { out.push(' '); prev_space = true; }
        } else { out.push(ch); prev_space = false; }
    }
    out.trim().to_string()
}

/// Parse a portal number cell: `"1,234"`, `" 12 "`, `"3.0"`.
/// Negative, empty or non-finite values are rejected.
pub fn parse_amount(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let v: f64 = cleaned.parse().ok()?;
    (v.is_finite() && v >= 0.0).then_some(v)
}

/// Identifiers keep their digits and letters only; stray spaces and zero-width
/// junk from the portal would otherwise split one product into two keys.
pub fn clean_identifier(cell: &str) -> String {
    cell.chars()
        .filter(|c| !c.is_whitespace() && !c.is_control() && *c != '\u{200b}')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts() {
        assert_eq!(parse_amount("1,234"), Some(1234.0));
        assert_eq!(parse_amount(" 12 "), Some(12.0));
        assert_eq!(parse_amount("3.5"), Some(3.5));
        assert_eq!(parse_amount("-1"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("銷售量"), None);
        assert_eq!(parse_amount("NaN"), None);
    }

    #[test]
    fn identifiers_lose_inner_whitespace() {
        assert_eq!(clean_identifier(" 4710 001\u{200b}23 "), "471000123");
    }

    #[test]
    fn ws_collapses() {
        assert_eq!(normalize_ws("  a \n\t b  "), "a b");
    }
}
