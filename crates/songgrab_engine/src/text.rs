use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};

/// Render the visible text of a whole document.
pub fn visible_text(document: &Html) -> String {
    let mut ctx = TextContext::default();
    for child in document.root_element().children() {
        visit_node(child, &mut ctx);
    }
    ctx.into_text()
}

/// Render the visible text below one element, with line breaks for `<br>` and blocks.
pub fn element_text(element: ElementRef) -> String {
    let mut ctx = TextContext::default();
    visit_children(element, &mut ctx);
    ctx.into_text()
}

fn visit_node(node: NodeRef<'_, Node>, ctx: &mut TextContext) {
    match node.value() {
        Node::Text(text) => ctx.append_text(text),
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                visit_element(element, ctx);
            }
        }
        _ => {
            for child in node.children() {
                visit_node(child, ctx);
            }
        }
    }
}

fn visit_element(element: ElementRef, ctx: &mut TextContext) {
    let tag = element.value().name().to_ascii_lowercase();
    match tag.as_str() {
        "br" => ctx.newline(),
        "p" | "div" | "section" | "article" | "header" | "footer" | "li" | "pre" | "h1"
        | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote" | "tr" => {
            ctx.newline();
            visit_children(element, ctx);
            ctx.newline();
        }
        "script" | "style" | "noscript" | "iframe" | "template" | "head" => {}
        _ => visit_children(element, ctx),
    }
}

fn visit_children(element: ElementRef, ctx: &mut TextContext) {
    for child in element.children() {
        visit_node(child, ctx);
    }
}

#[derive(Default)]
struct TextContext {
    builder: String,
    last_char: Option<char>,
}

impl TextContext {
    fn into_text(self) -> String {
        self.builder.trim().to_string()
    }

    /// Source newlines are kept; other whitespace runs become one space.
    fn append_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.newline();
            } else if ch.is_whitespace() {
                if self.last_char == Some(' ') || self.last_char == Some('\n') {
                    continue;
                }
                self.push_char(' ');
            } else {
                self.push_char(ch);
            }
        }
    }

    fn newline(&mut self) {
        if self.builder.is_empty() {
            return;
        }
        if self.last_char == Some(' ') {
            self.builder.pop();
        }
        self.push_char('\n');
    }

    fn push_char(&mut self, ch: char) {
        self.builder.push(ch);
        self.last_char = Some(ch);
    }
}
