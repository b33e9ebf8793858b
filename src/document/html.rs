//! HTML parsing and serialisation on top of the `html5ever` tokenizer.
//!
//! Tokenising is full HTML5: character references are decoded, a `<` that
//! does not open a tag stays text, and `<script>`, `<style>`, `<textarea>`,
//! `<title>` bodies end only at their own end tag. Tree construction is a
//! reduced form of the HTML5 rules, enough for the structure a browser builds
//! from ordinary pages:
//!
//! - void elements never take children
//! - optional end tags are implied (`<p>`, `<li>`, `<dt>`/`<dd>`, table rows
//!   and cells, `<option>`, headings)
//! - end tags close the nearest matching open element within scope; stray
//!   end tags are dropped (`</p>` and `</br>` insert elements, as in browsers)
//! - `<svg>` and `<math>` content honours self-closing tags
//! - no `<html>`, `<head>`, `<body>` or `<tbody>` is synthesised, so
//!   fragments stay fragments
//!
//! The serialiser writes every non-void end tag explicitly. A browser parsing
//! the output builds the same tree it builds from the input.

use super::{Attributes, Document, Element, Node};
use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Doctype, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer,
    TokenizerOpts,
};
use std::fmt::Write as _;
use tracing::trace;

/// Elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose text content is written without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "noscript", "plaintext",
];

/// Start tags that close an open `<p>`.
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "center", "dd", "details", "dialog", "dir",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hgroup", "hr", "li", "listing", "main", "menu", "nav", "ol", "p",
    "plaintext", "pre", "search", "section", "summary", "table", "ul", "xmp",
];

/// Elements that bound "has an element in scope" searches.
const SCOPE_BOUNDARIES: &[&str] = &[
    "applet", "caption", "html", "table", "td", "th", "marquee", "object", "template", "svg",
    "math", "foreignobject", "desc", "mi", "mo", "mn", "ms", "mtext", "annotation-xml",
];

/// HTML's "special" category: stray end tags and list items stop here.
const SPECIAL_ELEMENTS: &[&str] = &[
    "address", "applet", "area", "article", "aside", "base", "basefont", "bgsound", "blockquote",
    "body", "br", "button", "caption", "center", "col", "colgroup", "dd", "details", "dir", "div",
    "dl", "dt", "embed", "fieldset", "figcaption", "figure", "footer", "form", "frame",
    "frameset", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hgroup", "hr", "html",
    "iframe", "img", "input", "keygen", "li", "link", "listing", "main", "marquee", "menu",
    "meta", "nav", "noembed", "noframes", "noscript", "object", "ol", "p", "param", "plaintext",
    "pre", "script", "search", "section", "select", "source", "style", "summary", "table",
    "tbody", "td", "template", "textarea", "tfoot", "th", "thead", "title", "tr", "track", "ul",
    "wbr", "xmp",
];

/// Elements inside `<svg>`/`<math>` whose content is HTML again.
const INTEGRATION_POINTS: &[&str] =
    &["foreignobject", "desc", "mi", "mo", "mn", "ms", "mtext", "annotation-xml"];

/// HTML start tags that end `<svg>`/`<math>` content.
const BREAKS_OUT_OF_FOREIGN: &[&str] = &[
    "b", "big", "blockquote", "body", "br", "center", "code", "dd", "div", "dl", "dt", "em",
    "embed", "h1", "h2", "h3", "h4", "h5", "h6", "head", "hr", "i", "img", "li", "listing", "menu",
    "meta", "nobr", "ol", "p", "pre", "ruby", "s", "small", "span", "strong", "strike", "sub",
    "sup", "table", "tt", "u", "ul", "var",
];

const TABLE_PARTS: &[&str] =
    &["table", "caption", "colgroup", "tbody", "thead", "tfoot", "tr", "td", "th"];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

fn is_void(tag_name: &str) -> bool {
    VOID_ELEMENTS.contains(&tag_name)
}

fn is_raw_text(tag_name: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag_name)
}

fn is_special(tag_name: &str) -> bool {
    SPECIAL_ELEMENTS.contains(&tag_name)
}

fn is_scope_boundary(tag_name: &str) -> bool {
    SCOPE_BOUNDARIES.contains(&tag_name)
}

fn is_foreign_root(tag_name: &str) -> bool {
    tag_name == "svg" || tag_name == "math"
}

/// Parse markup into a [`Document`].
///
/// Never fails: like a browser, the parser repairs whatever it is given.
/// Unclosed elements are closed at end of input.
pub fn parse(markup: &str) -> Document {
    let mut tokenizer = Tokenizer::new(DocumentSink::default(), TokenizerOpts::default());
    let mut input = BufferQueue::new();
    input.push_back(StrTendril::from_slice(markup));
    // The sink never asks the tokenizer to pause for a script.
    let _ = tokenizer.feed(&mut input);
    tokenizer.end();
    Document::new(std::mem::take(&mut tokenizer.sink).finish())
}

/// Builds the owned tree from tokenizer output.
#[derive(Default)]
struct DocumentSink {
    root: Vec<Node>,
    open: Vec<Element>,
}

impl TokenSink for DocumentSink {
    type Handle = ();

    fn process_token(&mut self, token: Token, line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) if tag.kind == TagKind::StartTag => return self.start_tag(tag),
            Token::TagToken(tag) => self.end_tag(&tag.name),
            Token::CharacterTokens(text) => self.text(&text),
            Token::CommentToken(comment) => self.append(Node::Comment(String::from(&*comment))),
            Token::DoctypeToken(doctype) => self.append(Node::Doctype(doctype_text(&doctype))),
            Token::NullCharacterToken => {}
            Token::ParseError(error) => trace!(line = line_number, %error, "HTML parse error"),
            Token::EOFToken => self.close_all(),
        }
        TokenSinkResult::Continue
    }

    fn adjusted_current_node_present_but_not_in_html_namespace(&self) -> bool {
        self.in_foreign_content()
            || self.open.last().is_some_and(|el| {
                INTEGRATION_POINTS.contains(&el.tag_name.as_str()) && self.open.len() > 1
            })
    }
}

impl DocumentSink {
    fn finish(mut self) -> Vec<Node> {
        self.close_all();
        self.root
    }

    fn start_tag(&mut self, tag: Tag) -> TokenSinkResult<()> {
        let name: &str = &tag.name;

        let mut foreign = self.in_foreign_content();
        if foreign && BREAKS_OUT_OF_FOREIGN.contains(&name) {
            while self.in_foreign_content() {
                self.pop();
            }
            foreign = false;
        }
        if !foreign {
            self.close_implied_by(name);
        }

        let element = element_from(&tag);
        let in_foreign_namespace = foreign || is_foreign_root(name);
        let childless = if in_foreign_namespace {
            tag.self_closing
        } else {
            is_void(name)
        };
        if childless {
            self.append(Node::Element(element));
            return TokenSinkResult::Continue;
        }
        self.open.push(element);

        if in_foreign_namespace {
            return TokenSinkResult::Continue;
        }
        match name {
            "script" => TokenSinkResult::RawData(RawKind::ScriptData),
            "style" | "xmp" | "iframe" | "noembed" | "noframes" | "noscript" => {
                TokenSinkResult::RawData(RawKind::Rawtext)
            }
            "title" | "textarea" => TokenSinkResult::RawData(RawKind::Rcdata),
            "plaintext" => TokenSinkResult::Plaintext,
            _ => TokenSinkResult::Continue,
        }
    }

    /// Close the elements whose end tag HTML lets a new `name` start tag imply.
    fn close_implied_by(&mut self, name: &str) {
        match name {
            "li" => {
                self.close_nearest(&["li"], |t| {
                    is_special(t) && !matches!(t, "address" | "div" | "p")
                });
            }
            "dd" | "dt" => {
                self.close_nearest(&["dd", "dt"], |t| {
                    is_special(t) && !matches!(t, "address" | "div" | "p")
                });
            }
            _ => {}
        }

        if CLOSES_PARAGRAPH.contains(&name) {
            self.close_nearest(&["p"], |t| is_scope_boundary(t) || t == "button");
        }

        match name {
            n if HEADINGS.contains(&n) => {
                if self.current_is(HEADINGS) {
                    self.pop();
                }
            }
            "td" | "th" => {
                self.close_nearest(&["td", "th"], |t| matches!(t, "table" | "html" | "template"));
            }
            "tr" => self.clear_to_context(
                &["tbody", "thead", "tfoot", "table", "template", "html"],
                &["tr", "td", "th"],
            ),
            "tbody" | "thead" | "tfoot" | "caption" | "colgroup" => self.clear_to_context(
                &["table", "template", "html"],
                &["tbody", "thead", "tfoot", "tr", "td", "th", "caption", "colgroup"],
            ),
            "option" => {
                if self.current_is(&["option"]) {
                    self.pop();
                }
            }
            "optgroup" => {
                if self.current_is(&["option"]) {
                    self.pop();
                }
                if self.current_is(&["optgroup"]) {
                    self.pop();
                }
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, name: &str) {
        if is_void(name) {
            if name == "br" {
                self.append(Node::Element(Element::new("br")));
            }
            return;
        }
        if name == "p" {
            if !self.close_nearest(&["p"], |t| is_scope_boundary(t) || t == "button") {
                self.append(Node::Element(Element::new("p")));
            }
            return;
        }
        if TABLE_PARTS.contains(&name) {
            self.close_nearest(&[name], |t| matches!(t, "table" | "html" | "template"));
        } else if is_special(name) || self.in_foreign_content() {
            self.close_nearest(&[name], is_scope_boundary);
        } else {
            self.close_nearest(&[name], is_special);
        }
    }

    fn text(&mut self, text: &str) {
        let siblings = match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.root,
        };
        match siblings.last_mut() {
            Some(Node::Text(previous)) => previous.push_str(text),
            _ => siblings.push(Node::Text(text.to_string())),
        }
    }

    /// Attach `node` to the innermost open element, or the root.
    fn append(&mut self, node: Node) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.root.push(node),
        }
    }

    fn pop(&mut self) {
        if let Some(el) = self.open.pop() {
            self.append(Node::Element(el));
        }
    }

    fn pop_to(&mut self, len: usize) {
        while self.open.len() > len {
            self.pop();
        }
    }

    fn close_all(&mut self) {
        self.pop_to(0);
    }

    fn current_is(&self, names: &[&str]) -> bool {
        self.open
            .last()
            .is_some_and(|el| names.contains(&el.tag_name.as_str()))
    }

    /// Close the innermost open element named in `targets`, unless an
    /// element matching `barrier` sits above it. Returns whether one closed.
    fn close_nearest(&mut self, targets: &[&str], barrier: impl Fn(&str) -> bool) -> bool {
        for idx in (0..self.open.len()).rev() {
            let tag_name = self.open[idx].tag_name.as_str();
            if targets.contains(&tag_name) {
                self.pop_to(idx);
                return true;
            }
            if barrier(tag_name) {
                return false;
            }
        }
        false
    }

    /// Pop back to the innermost `context` element when any of `closes` is
    /// open above it.
    fn clear_to_context(&mut self, context: &[&str], closes: &[&str]) {
        let Some(idx) = self
            .open
            .iter()
            .rposition(|el| context.contains(&el.tag_name.as_str()))
        else {
            return;
        };
        if self.open[idx + 1..]
            .iter()
            .any(|el| closes.contains(&el.tag_name.as_str()))
        {
            self.pop_to(idx + 1);
        }
    }

    /// Whether new start tags land in `<svg>`/`<math>` content.
    fn in_foreign_content(&self) -> bool {
        for el in self.open.iter().rev() {
            let tag_name = el.tag_name.as_str();
            if is_foreign_root(tag_name) {
                return true;
            }
            if INTEGRATION_POINTS.contains(&tag_name) {
                return false;
            }
        }
        false
    }
}

fn element_from(tag: &Tag) -> Element {
    let attributes: Attributes = tag
        .attrs
        .iter()
        .map(|attr| (String::from(&*attr.name.local), String::from(&*attr.value)))
        .collect();
    Element {
        tag_name: String::from(&*tag.name),
        attributes,
        children: Vec::new(),
    }
}

fn doctype_text(doctype: &Doctype) -> String {
    let mut text = doctype
        .name
        .as_ref()
        .map(|name| String::from(&**name))
        .unwrap_or_default();
    // Writing into a String cannot fail.
    let _ = match (&doctype.public_id, &doctype.system_id) {
        (Some(public), Some(system)) => {
            write!(text, " PUBLIC \"{}\" \"{}\"", &**public, &**system)
        }
        (Some(public), None) => write!(text, " PUBLIC \"{}\"", &**public),
        (None, Some(system)) => write!(text, " SYSTEM \"{}\"", &**system),
        (None, None) => Ok(()),
    };
    text
}

/// Serialise a [`Document`] back to markup.
pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    for node in &doc.children {
        write_node(&mut out, node, false, false);
    }
    out
}

/// `foreign`: the node's parent content is `<svg>`/`<math>`.
/// `raw`: the parent is an HTML raw-text element.
fn write_node(out: &mut String, node: &Node, foreign: bool, raw: bool) {
    match node {
        Node::Element(el) => write_element(out, el, foreign || is_foreign_root(&el.tag_name)),
        Node::Text(text) if raw => out.push_str(text),
        Node::Text(text) => escape_into(out, text, false),
        Node::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        Node::Doctype(d) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(d);
            out.push('>');
        }
    }
}

fn write_element(out: &mut String, el: &Element, foreign: bool) {
    out.push('<');
    out.push_str(&el.tag_name);
    for (name, value) in el.attributes.iter() {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_into(out, value, true);
        out.push('"');
    }

    if foreign && el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    if !foreign && is_void(&el.tag_name) {
        return;
    }

    let children_foreign = foreign && !INTEGRATION_POINTS.contains(&el.tag_name.as_str());
    let raw = !foreign && is_raw_text(&el.tag_name);
    for child in &el.children {
        write_node(out, child, children_foreign, raw);
    }
    out.push_str("</");
    out.push_str(&el.tag_name);
    out.push('>');
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(markup: &str) -> String {
        parse(markup).to_html()
    }

    fn first_element(doc: &Document) -> &Element {
        match &doc.children[0] {
            Node::Element(el) => el,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn simple_fragment_roundtrips() {
        let html = r#"<p class="lead">Hello <b>world</b></p><img src="x.png" alt="x">"#;
        assert_eq!(roundtrip(html), html);
    }

    #[test]
    fn full_document_roundtrips() {
        let html = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head>\
                    <body><!-- hero --><img src=\"a.png\"></body></html>";
        assert_eq!(roundtrip(html), html);
    }

    #[test]
    fn legacy_doctype_keeps_identifiers() {
        let html = "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \
                    \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\"><p>x</p>";
        assert_eq!(roundtrip(html), html);
    }

    #[test]
    fn void_elements_do_not_capture_siblings() {
        let doc = parse(r#"<div><img src="a.png"><span>after</span></div>"#);
        let div = first_element(&doc);
        assert_eq!(div.children.len(), 2);
        match &div.children[0] {
            Node::Element(img) => assert!(img.children.is_empty()),
            other => panic!("expected img, got {other:?}"),
        }
    }

    #[test]
    fn self_closing_img_is_accepted() {
        let doc = parse(r#"<img src="a.png" />"#);
        assert_eq!(doc.elements_by_tag("img")[0].attribute("src"), Some("a.png"));
        assert_eq!(doc.to_html(), r#"<img src="a.png">"#);
    }

    #[test]
    fn unquoted_and_valueless_attributes() {
        let doc = parse("<img src=a.png hidden>");
        let img = doc.elements_by_tag("img")[0];
        assert_eq!(img.attribute("src"), Some("a.png"));
        assert!(img.attributes.contains("hidden"));
        assert_eq!(doc.to_html(), r#"<img src="a.png" hidden="">"#);
    }

    #[test]
    fn uppercase_tags_are_normalised() {
        let doc = parse(r#"<DIV><IMG SRC="a.png"></DIV>"#);
        let imgs = doc.elements_by_tag("img");
        assert_eq!(imgs.len(), 1);
        assert_eq!(imgs[0].attribute("src"), Some("a.png"));
    }

    #[test]
    fn script_body_is_verbatim() {
        let html = "<script>if (a < b && c > d) { go(); }</script><img src=\"a.png\">";
        assert_eq!(roundtrip(html), html);
    }

    #[test]
    fn script_with_unmatched_less_than_ends_at_its_end_tag() {
        let html = "<script>for(i=0;i<n;i++){}</script><img src=\"a.png\">";
        let doc = parse(html);
        assert_eq!(doc.children.len(), 2);
        assert_eq!(doc.elements_by_tag("img").len(), 1);
        assert_eq!(doc.to_html(), html);
    }

    #[test]
    fn style_and_textarea_bodies_are_text() {
        let html = "<style>a<b{color:red}</style><textarea><img src=\"no.png\"></textarea>";
        let doc = parse(html);
        assert!(doc.elements_by_tag("img").is_empty());
        assert_eq!(
            doc.to_html(),
            "<style>a<b{color:red}</style><textarea>&lt;img src=\"no.png\"&gt;</textarea>"
        );
    }

    #[test]
    fn less_than_in_text_stays_text() {
        let doc = parse("<p>a < b and i<3</p><img src=a.png>");
        assert_eq!(doc.children.len(), 2);
        let p = first_element(&doc);
        assert_eq!(p.children, vec![Node::Text("a < b and i<3".to_string())]);
        assert_eq!(
            doc.to_html(),
            r#"<p>a &lt; b and i&lt;3</p><img src="a.png">"#
        );
    }

    #[test]
    fn paragraphs_close_each_other() {
        assert_eq!(roundtrip("<p>a<p>b"), "<p>a</p><p>b</p>");
        assert_eq!(roundtrip("<p>text<div>block</div>"), "<p>text</p><div>block</div>");
        assert_eq!(roundtrip("<p>a<span>b<p>c"), "<p>a<span>b</span></p><p>c</p>");
    }

    #[test]
    fn list_items_close_each_other() {
        assert_eq!(
            roundtrip("<ul><li>one<li>two</ul>"),
            "<ul><li>one</li><li>two</li></ul>"
        );
        assert_eq!(
            roundtrip("<ul><li>a<ul><li>b</ul><li>c</ul>"),
            "<ul><li>a<ul><li>b</li></ul></li><li>c</li></ul>"
        );
        assert_eq!(
            roundtrip("<dl><dt>t<dd>d<dt>u</dl>"),
            "<dl><dt>t</dt><dd>d</dd><dt>u</dt></dl>"
        );
    }

    #[test]
    fn table_cells_and_rows_close_each_other() {
        assert_eq!(
            roundtrip("<table><tr><td>a<td>b<tr><th>c</table>"),
            "<table><tr><td>a</td><td>b</td></tr><tr><th>c</th></tr></table>"
        );
    }

    #[test]
    fn options_close_each_other() {
        assert_eq!(
            roundtrip("<select><option>a<option>b</select>"),
            "<select><option>a</option><option>b</option></select>"
        );
    }

    #[test]
    fn unclosed_elements_close_at_eof() {
        assert_eq!(roundtrip("<div><p>text"), "<div><p>text</p></div>");
    }

    #[test]
    fn stray_end_tag_is_dropped() {
        assert_eq!(roundtrip("<p>a</span>b</p>"), "<p>ab</p>");
    }

    #[test]
    fn inline_end_tag_does_not_close_blocks() {
        assert_eq!(
            roundtrip("<span><div>x</span>y</div>"),
            "<span><div>xy</div></span>"
        );
    }

    #[test]
    fn stray_paragraph_end_inserts_empty_paragraph() {
        assert_eq!(roundtrip("<div></p></div>"), "<div><p></p></div>");
    }

    #[test]
    fn attribute_entities_are_unescaped_and_reescaped() {
        let doc = parse(r#"<img src="a&amp;b.png" alt='say "hi"'>"#);
        let img = doc.elements_by_tag("img")[0];
        assert_eq!(img.attribute("src"), Some("a&b.png"));
        assert_eq!(img.attribute("alt"), Some("say \"hi\""));
        assert_eq!(doc.to_html(), r#"<img src="a&amp;b.png" alt="say &quot;hi&quot;">"#);
    }

    #[test]
    fn text_entities_are_decoded_and_reescaped() {
        let doc = parse("<p>caf&eacute; &amp; bar&nbsp;</p>");
        assert_eq!(
            first_element(&doc).children,
            vec![Node::Text("café & bar\u{a0}".to_string())]
        );
        assert_eq!(doc.to_html(), "<p>café &amp; bar&nbsp;</p>");
    }

    #[test]
    fn svg_self_closing_children_stay_siblings() {
        let html = r#"<svg viewbox="0 0 1 1"><path d="M0 0"/><circle r="1"/></svg><img src="a.png">"#;
        let doc = parse(html);
        let svg = first_element(&doc);
        assert_eq!(svg.children.len(), 2);
        assert_eq!(doc.elements_by_tag("img").len(), 1);
        assert_eq!(doc.to_html(), html);
    }

    #[test]
    fn html_tag_breaks_out_of_svg() {
        assert_eq!(
            roundtrip(r#"<svg><g><img src="a.png">"#),
            r#"<svg><g/></svg><img src="a.png">"#
        );
    }

    #[test]
    fn serialised_output_reparses_to_the_same_tree() {
        let html = "<ul><li>one<li>two &amp; <b>three</ul><p>x<y then</p><script>i<3</script>";
        let once = parse(html);
        let twice = parse(&once.to_html());
        assert_eq!(once, twice);
    }
}
