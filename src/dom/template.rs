//! Static markup - the immutable tree every instance is cloned from.

/// A node of a component's static markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateNode {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<TemplateNode>,
    },
    Text(String),
}

impl TemplateNode {
    pub fn element(tag: &str) -> Self {
        TemplateNode::Element {
            tag: tag.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: &str) -> Self {
        TemplateNode::Text(text.to_string())
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        if let TemplateNode::Element { attributes, .. } = &mut self {
            attributes.push((name.to_string(), value.to_string()));
        }
        self
    }

    pub fn child(mut self, child: TemplateNode) -> Self {
        if let TemplateNode::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    /// Serialize to HTML.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        match self {
            TemplateNode::Text(text) => escape_into(text, out),
            TemplateNode::Element {
                tag,
                attributes,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                for (k, v) in attributes {
                    write_attribute(k, v, out);
                }
                out.push('>');
                for child in children {
                    child.write_markup(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

pub(crate) fn write_attribute(name: &str, value: &str, out: &mut String) {
    out.push(' ');
    out.push_str(name);
    if value.is_empty() {
        return;
    }
    out.push_str("=\"");
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("&quot;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(ch),
        }
    }
    out.push('"');
}

pub(crate) fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(ch),
        }
    }
}
