// src/core/html.rs
//! Tolerant, case-insensitive HTML slicing. No DOM; we only need a table and a
//! handful of hidden form fields out of ASP.NET pages.

pub fn to_lower(s: &str) -> String {
    // ASCII-only lowering keeps byte offsets identical to the input.
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

/// All `<o …>…</c>` blocks in order.
pub fn tag_blocks_ci<'a>(s: &'a str, o: &str, c: &str) -> Vec<&'a str> {
    let lc = to_lower(s);
    let (o, c) = (to_lower(o), to_lower(c));
    let mut out = Vec::new();
    let mut pos = 0usize;
    while let Some((a, b)) = next_block(s, &lc, &o, &c, pos) {
        out.push(&s[a..b]);
        pos = b;
    }
    out
}

// Byte range `[start, end)` of the next block at or after `from`. `lc` is `s`
// lowered once by the caller; `o` and `c` are already lowercase.
fn next_block(s: &str, lc: &str, o: &str, c: &str, from: usize) -> Option<(usize, usize)> {
    let start = lc.get(from..)?.find(o)? + from;
    let open_end = s[start..].find('>')? + start + 1;
    let end_rel = lc[open_end..].find(c)?;
    Some((start, open_end + end_rel + c.len()))
}

pub fn inner_after_open_tag(block: &str) -> String {
    if let (Some(oe), Some(cs)) = (block.find('>'), block.rfind('<')) {
        if cs > oe {
            return block[oe + 1..cs].to_string();
        }
    }
    s!()
}

pub fn strip_tags<S: AsRef<str>>(s: S) -> String {
    let s = s.as_ref();
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    super::sanitize::normalize_ws(&out)
}

/// Visible text of every `<td>` in a row, entity- and whitespace-normalised.
pub fn row_cells(tr: &str) -> Vec<String> {
    tag_blocks_ci(tr, "<td", "</td>")
        .into_iter()
        .map(|td| strip_tags(super::sanitize::normalize_entities(&inner_after_open_tag(td))))
        .collect()
}

/// The `<tag … id="id" …>…</tag>` element, attribute quoting tolerant.
pub fn element_by_id<'a>(doc: &'a str, tag: &str, id: &str) -> Option<&'a str> {
    let lc = to_lower(doc);
    let open = format!("<{}", to_lower(tag));
    let close = format!("</{}>", to_lower(tag));
    let id_lc = to_lower(id);

    let mut pos = 0usize;
    while let Some(rel) = lc[pos..].find(&open) {
        let start = pos + rel;
        let open_end = lc[start..].find('>')? + start;
        let attrs = &lc[start + open.len()..open_end];
        if attr_value(attrs, "id").as_deref() == Some(id_lc.as_str()) {
            let end_rel = lc[open_end..].find(&close)?;
            return Some(&doc[start..open_end + end_rel + close.len()]);
        }
        pos = open_end + 1;
    }
    None
}

/// `value` attribute of `<input name="name" …>`. Used to echo ASP.NET form state.
pub fn input_value(doc: &str, name: &str) -> Option<String> {
    let lc = to_lower(doc);
    let name_lc = to_lower(name);
    let mut pos = 0usize;
    while let Some(rel) = lc[pos..].find("<input") {
        let start = pos + rel;
        let end = lc[start..].find('>').map(|e| start + e)?;
        // Attribute names are matched lowercased, values are taken from the original.
        let attrs_lc = &lc[start + 6..end];
        if attr_value(attrs_lc, "name").as_deref() == Some(name_lc.as_str()) {
            let attrs = &doc[start + 6..end];
            return Some(attr_value_raw(attrs_lc, attrs, "value").unwrap_or_default());
        }
        pos = end + 1;
    }
    None
}

fn attr_value(attrs_lc: &str, attr: &str) -> Option<String> {
    attr_value_raw(attrs_lc, attrs_lc, attr)
}

// `attrs_lc` is the ASCII-lowered twin of `attrs`; offsets line up.
fn attr_value_raw(attrs_lc: &str, attrs: &str, attr: &str) -> Option<String> {
    let needle = format!("{attr}=");
    let mut pos = 0usize;
    while let Some(rel) = attrs_lc[pos..].find(&needle) {
        let at = pos + rel;
        // must start an attribute, not end another one (e.g. `data-id=`)
        let boundary = at == 0 || attrs_lc.as_bytes()[at - 1].is_ascii_whitespace();
        let val_start = at + needle.len();
        if boundary {
            let rest = &attrs[val_start..];
            let value = match rest.as_bytes().first() {
                Some(b'"') => rest[1..].split('"').next(),
                Some(b'\'') => rest[1..].split('\'').next(),
                _ => rest.split(|c: char| c.is_ascii_whitespace() || c == '/').next(),
            };
            return value.map(str::to_string);
        }
        pos = val_start;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_value_reads_hidden_fields() {
        let doc = r#"<form><INPUT type="hidden" Name="__VIEWSTATE" id="__VIEWSTATE" value="dDwx+MjA=" />
            <input type='hidden' name='__EVENTVALIDATION' value='abc'></form>"#;
        assert_eq!(input_value(doc, "__VIEWSTATE").as_deref(), Some("dDwx+MjA="));
        assert_eq!(input_value(doc, "__eventvalidation").as_deref(), Some("abc"));
        assert_eq!(input_value(doc, "__VIEWSTATEGENERATOR"), None);
    }

    #[test]
    fn input_without_value_is_empty() {
        let doc = r#"<input type="hidden" name="__LASTFOCUS" id="__LASTFOCUS" />"#;
        assert_eq!(input_value(doc, "__LASTFOCUS").as_deref(), Some(""));
    }

    #[test]
    fn element_by_id_skips_other_tables() {
        let doc = r#"<table id="menu"><tr><td>x</td></tr></table>
            <TABLE cellspacing=0 ID="dgProd"><tr><td>1</td></tr></TABLE>"#;
        let t = element_by_id(doc, "table", "dgProd").unwrap();
        assert!(t.contains("<td>1</td>"));
        assert!(!t.contains("menu"));
        assert!(element_by_id(doc, "table", "missing").is_none());
    }

    #[test]
    fn id_match_is_attribute_bounded() {
        let doc = r#"<table data-id="dgProd"><tr></tr></table><table id=dgProd><tr></tr></table>"#;
        let t = element_by_id(doc, "table", "dgProd").unwrap();
        assert!(t.starts_with("<table id=dgProd"));
    }

    #[test]
    fn row_cells_normalises_text() {
        let tr = "<tr><td> A&nbsp;&amp;B </td><TD><span>12</span></TD></tr>";
        assert_eq!(row_cells(tr), vec!["A &B", "12"]);
    }

    #[test]
    fn tag_blocks_keep_offsets_with_mixed_case_and_wide_chars() {
        let s = "<TR><td>銷售量</td></TR><tr class=x><TD>茶 Tea</TD></tr>";
        let rows = tag_blocks_ci(s, "<tr", "</tr>");
        assert_eq!(rows, vec!["<TR><td>銷售量</td></TR>", "<tr class=x><TD>茶 Tea</TD></tr>"]);
        assert_eq!(row_cells(rows[1]), vec!["茶 Tea"]);
    }

    #[test]
    fn tag_blocks_in_order() {
        let s = "<tr><td>1</td></tr><tr><td>2</td></tr>";
        let rows = tag_blocks_ci(s, "<tr", "</tr>");
        assert_eq!(rows.len(), 2);
        assert!(rows[1].contains('2'));
    }
}
