//! HTML string builders
//!
//! Elements are rendered to strings with attributes sorted by name. Text and
//! attribute values are escaped; `children` are HTML already.

/// Escape text for use in element content or a quoted attribute value.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn open_tag(name: &str, attrs: &[(&str, &str)]) -> String {
    let mut sorted = attrs.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut html = format!("<{}", name);
    for (key, value) in sorted {
        html.push_str(&format!(" {}=\"{}\"", key, escape(value)));
    }
    html
}

/// Element with a closing tag.
pub fn el(name: &str, attrs: &[(&str, &str)], children: &[String]) -> String {
    let mut html = open_tag(name, attrs);
    html.push('>');
    html.extend(children.iter().map(String::as_str));
    html.push_str(&format!("</{}>", name));
    html
}

/// Self-closing element.
pub fn elc(name: &str, attrs: &[(&str, &str)]) -> String {
    let mut html = open_tag(name, attrs);
    html.push_str(" />");
    html
}

pub fn tr(cells: &[String]) -> String {
    el("tr", &[], cells)
}

/// Table cell holding escaped text.
pub fn td(text: &str) -> String {
    el("td", &[], &[escape(text)])
}

/// Table cell wrapping other elements.
pub fn td_html(child: String) -> String {
    el("td", &[], &[child])
}

pub fn button(attrs: &[(&str, &str)], text: &str) -> String {
    el("button", attrs, &[escape(text)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_attributes_sorted() {
        let html = button(&[("type", "button"), ("class", "x")], "go");
        assert_eq!(html, r#"<button class="x" type="button">go</button>"#);
    }

    #[test]
    fn test_text_and_attributes_escaped() {
        assert_eq!(td("<b>&</b>"), "<td>&lt;b&gt;&amp;&lt;/b&gt;</td>");
        assert_eq!(elc("img", &[("alt", "say \"hi\"")]), r#"<img alt="say &quot;hi&quot;" />"#);
    }

    #[test]
    fn test_nested() {
        let row = tr(&[td("1"), td_html(button(&[], "x"))]);
        assert_eq!(row, "<tr><td>1</td><td><button>x</button></td></tr>");
    }
}
