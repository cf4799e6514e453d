//! Minimal XML rendering for the reports that offer it.

pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

pub fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn open_document(root: &str) -> String {
    format!("{XML_DECLARATION}<{root}>\n")
}

pub fn close_document(root: &str) -> String {
    format!("</{root}>\n")
}

/// One row element with a child element per field. Empty fields become empty elements.
pub fn element<S: AsRef<str>>(name: &str, tags: &[&str], fields: &[S]) -> String {
    let mut out = format!("  <{name}>");
    for (tag, value) in tags.iter().zip(fields) {
        let value = value.as_ref();
        if value.is_empty() {
            out.push_str(&format!("<{tag}/>"));
        } else {
            out.push_str(&format!("<{tag}>{}</{tag}>", escape_xml(value)));
        }
    }
    out.push_str(&format!("</{name}>\n"));
    out
}
