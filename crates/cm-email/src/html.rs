//! HTML to plain text
//!
//! A streaming, tag-driven text accumulator used for the plain text part of
//! outgoing mail. It is not a general HTML parser: tags are recognised one at
//! a time without building a tree.

use std::collections::HashMap;

/// Render an HTML document as best-effort plain text.
///
/// - closing `p`, `div`, `tr`, `td` and `th` emit a newline
/// - `br` emits a newline
/// - links are followed by ` <href> ` unless the link text is the href
/// - images are replaced by their `alt` text
pub fn html_to_plain(html: &str) -> String {
    let mut renderer = PlainTextRenderer::default();
    let mut rest = html;

    while !rest.is_empty() {
        match rest.find('<') {
            None => {
                renderer.text(rest);
                break;
            }
            Some(0) => rest = renderer.markup(rest),
            Some(i) => {
                renderer.text(&rest[..i]);
                rest = &rest[i..];
            }
        }
    }

    renderer.out
}

#[derive(Default)]
struct PlainTextRenderer {
    out: String,
    pending_space: bool,
    link: Option<String>,
    link_text: String,
}

impl PlainTextRenderer {
    fn text(&mut self, raw: &str) {
        let decoded = decode_entities(raw);
        self.append(&decoded);
    }

    /// Append text, collapsing whitespace runs into a single space
    fn append(&mut self, s: &str) {
        if self.link.is_some() {
            self.link_text.push_str(s);
        }

        for c in s.chars() {
            if c.is_whitespace() {
                self.pending_space = true;
                continue;
            }
            if self.pending_space && !self.out.is_empty() && !self.out.ends_with('\n') {
                self.out.push(' ');
            }
            self.pending_space = false;
            self.out.push(c);
        }
    }

    fn newline(&mut self) {
        let trimmed = self.out.trim_end_matches(' ').len();
        self.out.truncate(trimmed);
        self.out.push('\n');
        self.pending_space = false;
    }

    /// Consume one markup construct at the start of `input`, returning the rest
    fn markup<'a>(&mut self, input: &'a str) -> &'a str {
        if let Some(body) = input.strip_prefix("<!--") {
            return match body.find("-->") {
                Some(end) => &body[end + 3..],
                None => "",
            };
        }

        let first = input[1..].chars().next();
        if matches!(first, Some('!') | Some('?')) {
            return match input.find('>') {
                Some(end) => &input[end + 1..],
                None => "",
            };
        }
        if !matches!(first, Some(c) if c.is_ascii_alphabetic() || c == '/') {
            // A lone '<' is text
            self.append("<");
            return &input[1..];
        }

        let end = match find_tag_end(input) {
            Some(end) => end,
            None => return "",
        };
        let tag = Tag::parse(&input[1..end]);
        let rest = &input[end + 1..];

        if tag.closing {
            self.end_tag(&tag.name);
            return rest;
        }

        self.start_tag(&tag);

        if (tag.name == "script" || tag.name == "style") && !tag.self_closing {
            return skip_raw_text(rest, &tag.name);
        }
        rest
    }

    fn start_tag(&mut self, tag: &Tag) {
        match tag.name.as_str() {
            "br" => self.newline(),
            "a" => {
                self.link = tag.attributes.get("href").cloned();
                self.link_text.clear();
            }
            "img" => {
                if let Some(alt) = tag.attributes.get("alt") {
                    let alt = alt.clone();
                    self.append(&alt);
                }
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, name: &str) {
        match name {
            "a" => {
                if let Some(href) = self.link.take() {
                    if self.link_text.trim() != href {
                        self.pending_space = true;
                        self.append(&format!("<{}>", href));
                        self.pending_space = true;
                    }
                }
            }
            "p" | "div" | "tr" | "td" | "th" => self.newline(),
            _ => {}
        }
    }
}

struct Tag {
    name: String,
    closing: bool,
    self_closing: bool,
    attributes: HashMap<String, String>,
}

impl Tag {
    /// Parse the text between `<` and `>`
    fn parse(inner: &str) -> Self {
        let (closing, inner) = match inner.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, inner),
        };
        let trimmed = inner.trim_end();
        let (self_closing, inner) = match trimmed.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let name_len = inner
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':'))
            .unwrap_or(inner.len());

        Self {
            name: inner[..name_len].to_ascii_lowercase(),
            closing,
            self_closing,
            attributes: parse_attributes(&inner[name_len..]),
        }
    }
}

/// Index of the `>` closing the tag at the start of `input`, skipping quoted values
fn find_tag_end(input: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in input.char_indices().skip(1) {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => return Some(i),
            None => {}
        }
    }
    None
}

fn parse_attributes(input: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    let mut chars = input.char_indices().peekable();

    loop {
        while matches!(chars.peek(), Some((_, c)) if c.is_whitespace() || *c == '/') {
            chars.next();
        }
        let start = match chars.peek() {
            Some((i, _)) => *i,
            None => break,
        };

        let mut end = input.len();
        while let Some((i, c)) = chars.peek() {
            if c.is_whitespace() || *c == '=' || *c == '/' {
                end = *i;
                break;
            }
            chars.next();
        }
        let name = input[start..end].to_ascii_lowercase();

        while matches!(chars.peek(), Some((_, c)) if c.is_whitespace()) {
            chars.next();
        }
        if !matches!(chars.peek(), Some((_, '='))) {
            if !name.is_empty() {
                attributes.insert(name, String::new());
            }
            continue;
        }
        chars.next();
        while matches!(chars.peek(), Some((_, c)) if c.is_whitespace()) {
            chars.next();
        }

        let mut value = String::new();
        match chars.peek().copied() {
            Some((_, q)) if q == '"' || q == '\'' => {
                chars.next();
                for (_, c) in chars.by_ref() {
                    if c == q {
                        break;
                    }
                    value.push(c);
                }
            }
            _ => {
                while let Some((_, c)) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    value.push(*c);
                    chars.next();
                }
            }
        }

        if !name.is_empty() {
            attributes.insert(name, decode_entities(&value));
        }
    }

    attributes
}

/// Skip everything up to and including the closing tag of a raw text element
fn skip_raw_text<'a>(input: &'a str, name: &str) -> &'a str {
    let needle = format!("</{}", name);
    let lower = input.to_ascii_lowercase();
    match lower.find(&needle) {
        Some(start) => match input[start..].find('>') {
            Some(end) => &input[start + end + 1..],
            None => "",
        },
        None => "",
    }
}

/// Decode the handful of character references mail templates actually use
fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = entity.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_with_link() {
        let text = html_to_plain("<p>Hello <a href=\"http://x\">there</a></p>");
        assert_eq!(text, "Hello there <http://x>\n");
    }

    #[test]
    fn test_line_breaks() {
        let text = html_to_plain("Line one<br>Line two<br/>Line three<BR />");
        assert_eq!(text, "Line one\nLine two\nLine three\n");
    }

    #[test]
    fn test_table_cells() {
        let text = html_to_plain("<table><tr><th>Item</th><td>Qty</td></tr><tr><td>Shoes</td><td>2</td></tr></table>");
        assert_eq!(text, "Item\nQty\n\nShoes\n2\n\n");
    }

    #[test]
    fn test_image_alt_text() {
        let text = html_to_plain("<div>Logo: <img src=\"logo.png\" alt=\"Heat Clinic\"></div>");
        assert_eq!(text, "Logo: Heat Clinic\n");
    }

    #[test]
    fn test_link_text_equal_to_href() {
        let text = html_to_plain("<a href=\"http://shop.test\">http://shop.test</a>");
        assert_eq!(text, "http://shop.test");
    }

    #[test]
    fn test_entities() {
        let text = html_to_plain("Fish &amp; Chips &lt;3 &#169; &#x41; &bogus; a&b");
        assert_eq!(text, "Fish & Chips <3 © A &bogus; a&b");
    }

    #[test]
    fn test_skips_comments_scripts_and_styles() {
        let html = "<!DOCTYPE html><html><head><style>p { color: red; }</style>\
                    <script type=\"text/javascript\">if (a < b) {}</script></head>\
                    <body><!-- header --><div>Body</div></body></html>";
        assert_eq!(html_to_plain(html), "Body\n");
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        let text = html_to_plain("<div>\n    Order   #123\n    shipped\n</div>");
        assert_eq!(text, "Order #123 shipped\n");
    }

    #[test]
    fn test_quoted_angle_bracket_in_attribute() {
        let text = html_to_plain("<a href='http://x?a>b'>go</a>");
        assert_eq!(text, "go <http://x?a>b>");
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        assert_eq!(html_to_plain("a < b"), "a < b");
    }
}
