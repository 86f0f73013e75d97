//! HTML scrubbing and CSS-selector fallback-chain extraction for the
//! Generic Adapter's HTML format.
//!
//! A selector expression is either a bare CSS selector (the concatenated,
//! whitespace-normalized text of every matching descendant) or
//! `selector::attr(name)` (the named attribute of the first match).

use scraper::{ElementRef, Html, Selector};

/// Strip `<script>`/`<style>` blocks before parsing. Case-insensitive, tolerant of attributes on
/// the opening tag.
#[must_use]
pub fn scrub(raw: &str) -> String {
    strip_tag_blocks(&strip_tag_blocks(raw, "script"), "style")
}

fn strip_tag_blocks(raw: &str, tag: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    let open_prefix = format!("<{tag}");
    let close_tag = format!("</{tag}>");
    let mut out = String::with_capacity(raw.len());
    let mut pos = 0;
    while let Some(rel_start) = lower[pos..].find(&open_prefix) {
        let start = pos + rel_start;
        out.push_str(&raw[pos..start]);
        let Some(rel_gt) = lower[start..].find('>') else {
            // Unterminated opening tag: keep the remainder verbatim.
            out.push_str(&raw[start..]);
            return out;
        };
        let tag_end = start + rel_gt + 1;
        match lower[tag_end..].find(&close_tag) {
            Some(rel_close) => pos = tag_end + rel_close + close_tag.len(),
            None => return out,
        }
    }
    out.push_str(&raw[pos..]);
    out
}

/// Collapse runs of whitespace (including newlines) into single spaces and
/// trim the ends.
#[must_use]
pub fn normalize_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = true;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

enum Expr {
    Text(Selector),
    Attr(Selector, String),
}

fn parse_expr(expr: &str) -> Option<Expr> {
    if let Some(idx) = expr.find("::attr(") {
        let sel = expr[..idx].trim();
        let name = expr[idx + "::attr(".len()..].strip_suffix(')')?.trim();
        Some(Expr::Attr(Selector::parse(sel).ok()?, name.to_string()))
    } else {
        Some(Expr::Text(Selector::parse(expr.trim()).ok()?))
    }
}

fn eval_one(root: ElementRef<'_>, expr: &Expr) -> Option<String> {
    match expr {
        Expr::Text(sel) => {
            let text: String = root.select(sel).next().map(|el| {
                let joined: String = el.text().collect::<Vec<_>>().join(" ");
                normalize_whitespace(&joined)
            })?;
            (!text.is_empty()).then_some(text)
        }
        Expr::Attr(sel, name) => {
            let value = root.select(sel).next().and_then(|el| el.value().attr(name))?;
            let trimmed = value.trim();
            (!trimmed.is_empty()).then_some(trimmed.to_string())
        }
    }
}

/// Evaluate a fallback chain against `root`, returning the first
/// expression that yields a non-empty value.
/// Unparseable expressions are silently skipped rather than aborting the
/// chain, matching the registry's general tolerance of malformed config.
#[must_use]
pub fn extract_first(root: ElementRef<'_>, chain: &[String]) -> Option<String> {
    chain.iter().filter_map(|e| parse_expr(e)).find_map(|e| eval_one(root, &e))
}

/// Evaluate a fallback chain against `root`, returning every value matched
/// by the first expression in the chain with at least one match. Used for
/// the `chapters`/`pages` keys, which name a repeating field rather than a
/// single one.
#[must_use]
pub fn extract_all(root: ElementRef<'_>, chain: &[String]) -> Vec<String> {
    for expr in chain.iter().filter_map(|e| parse_expr(e)) {
        let values: Vec<String> = match &expr {
            Expr::Text(sel) => root
            .select(sel)
            .map(|el| normalize_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .filter(|s| !s.is_empty())
            .collect(),
            Expr::Attr(sel, name) => root
            .select(sel)
            .filter_map(|el| el.value().attr(name))
            .map(|v| v.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        };
        if !values.is_empty() {
            return values;
        }
    }
    Vec::new()
}

/// Whether any expression in `chain` matches at least one element under
/// `root`, used for presence-only fields like `nsfw_indicator`.
#[must_use]
pub fn any_present(root: ElementRef<'_>, chain: &[String]) -> bool {
    chain
    .iter()
    .filter_map(|e| parse_expr(e))
    .any(|e| match &e {
        Expr::Text(sel) | Expr::Attr(sel, _) => root.select(sel).next().is_some(),
    })
}

/// Parse `document` and select every search-result container.
#[must_use]
pub fn parse_document(document: &str) -> Html {
    Html::parse_document(document)
}

/// Select the repeating result containers named by `search_items`.
#[must_use]
pub fn select_items<'a>(doc: &'a Html, search_items: &str) -> Vec<ElementRef<'a>> {
    let Ok(selector) = Selector::parse(search_items) else {
        return Vec::new();
    };
    doc.select(&selector).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
 <html><head><script>alert('x')</script><style>.a{color:red}</style></head>
 <body>
 <div class="result">
 <h3 class="title"> One Piece </h3>
 <a class="title" href="/title/1">One Piece</a>
 <img class="cover" src="https://example.test/cover1.jpg">
 <span class="nsfw-badge">18+</span>
 </div>
 <div class="result">
 <h3 class="title">Naruto</h3>
 <a class="title" href="/title/2">Naruto</a>
 </div>
 </body></html>
 "#;

    #[test]
    fn scrub_removes_script_and_style_blocks() {
        let scrubbed = scrub(DOC);
        assert!(!scrubbed.contains("alert"));
        assert!(!scrubbed.contains("color:red"));
        assert!(scrubbed.contains("One"));
    }

    #[test]
    fn extracts_title_and_href_attribute() {
        let doc = parse_document(&scrub(DOC));
        let items = select_items(&doc, "div.result");
        assert_eq!(items.len(), 2);
        let title = extract_first(items[0], &["h3.title".to_string()]);
        assert_eq!(title.as_deref(), Some("One Piece"));
        let link = extract_first(items[0], &["a.title::attr(href)".to_string()]);
        assert_eq!(link.as_deref(), Some("/title/1"));
    }

    #[test]
    fn fallback_chain_uses_first_non_empty_match() {
        let doc = parse_document(&scrub(DOC));
        let items = select_items(&doc, "div.result");
        let cover = extract_first(
            items[1],
            &["img.cover::attr(src)".to_string(), "h3.title".to_string()],
        );
        assert_eq!(cover.as_deref(), Some("Naruto"));
    }

    #[test]
    fn extract_all_returns_every_match_of_the_first_winning_expression() {
        let listing = r#"<div id="chapters">
 <a class="ch" href="/ch/1">Chapter 1</a>
 <a class="ch" href="/ch/2">Chapter 2</a>
 </div>"#;
        let doc = parse_document(listing);
        let root = doc.root_element();
        let hrefs = extract_all(root, &["a.ch::attr(href)".to_string()]);
        assert_eq!(hrefs, vec!["/ch/1".to_string(), "/ch/2".to_string()]);
    }

    #[test]
    fn presence_indicator_detects_nsfw_badge() {
        let doc = parse_document(&scrub(DOC));
        let items = select_items(&doc, "div.result");
        assert!(any_present(items[0], &[".nsfw-badge".to_string()]));
        assert!(!any_present(items[1], &[".nsfw-badge".to_string()]));
    }
}
