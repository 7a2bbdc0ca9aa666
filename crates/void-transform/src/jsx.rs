//! Built-in JSX transformer.
//!
//! Rewrites JSX elements embedded in JavaScript into element factory calls
//! (`React.createElement` by default). Everything outside of JSX is copied
//! through untouched, including comments and formatting.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::traits::{Transform, TransformError};

/// Factory names used by the generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsxOptions {
    /// Element factory, e.g. `React.createElement`
    pub pragma: String,

    /// Fragment component, e.g. `React.Fragment`
    pub pragma_frag: String,
}

impl Default for JsxOptions {
    fn default() -> Self {
        Self {
            pragma: "React.createElement".to_string(),
            pragma_frag: "React.Fragment".to_string(),
        }
    }
}

/// JSX to JavaScript transformation capability.
#[derive(Debug, Default)]
pub struct JsxTransform {
    options: JsxOptions,
}

impl JsxTransform {
    /// Create a transformer with the given factory names.
    pub fn new(options: JsxOptions) -> Self {
        Self { options }
    }
}

impl Transform for JsxTransform {
    fn name(&self) -> &str {
        "jsx"
    }

    fn transform(&mut self, source: &str) -> Result<String, TransformError> {
        transform_jsx(source, &self.options)
    }
}

/// Transform every JSX element in `source`.
pub fn transform_jsx(source: &str, options: &JsxOptions) -> Result<String, TransformError> {
    let mut rewriter = Rewriter {
        src: source,
        bytes: source.as_bytes(),
        pos: 0,
        options,
    };

    let mut out = String::with_capacity(source.len());
    rewriter.script(&mut out, false)?;
    Ok(out)
}

/// Keywords after which an expression (and therefore JSX) may start.
const EXPRESSION_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
    "default",
];

struct Rewriter<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    options: &'a JsxOptions,
}

impl<'a> Rewriter<'a> {
    /// Copy JavaScript into `out`, rewriting JSX along the way.
    ///
    /// With `nested` set, stops in front of the `}` that closes the current
    /// expression container. Returns whether anything besides whitespace and
    /// comments was seen.
    fn script(&mut self, out: &mut String, nested: bool) -> Result<bool, TransformError> {
        let mut depth = 0usize;
        let mut expr_allowed = true;
        let mut has_code = false;

        loop {
            let Some(c) = self.peek() else {
                if nested {
                    return Err(self.error("Unexpected end of input, expected `}`"));
                }
                return Ok(has_code);
            };

            match c {
                b'/' if self.peek_at(1) == Some(b'/') => self.line_comment(out),
                b'/' if self.peek_at(1) == Some(b'*') => self.block_comment(out)?,
                c if c.is_ascii_whitespace() => {
                    out.push(c as char);
                    self.pos += 1;
                }
                _ => {
                    has_code = true;
                    match c {
                        b'\'' | b'"' => {
                            self.string(out, c)?;
                            expr_allowed = false;
                        }
                        b'`' => {
                            self.template(out)?;
                            expr_allowed = false;
                        }
                        b'/' if expr_allowed => {
                            self.regex(out)?;
                            expr_allowed = false;
                        }
                        b'{' => {
                            depth += 1;
                            out.push('{');
                            self.pos += 1;
                            expr_allowed = true;
                        }
                        b'}' => {
                            if depth == 0 && nested {
                                return Ok(has_code);
                            }
                            depth = depth.saturating_sub(1);
                            out.push('}');
                            self.pos += 1;
                            expr_allowed = false;
                        }
                        b'<' if expr_allowed && self.starts_element() => {
                            let element = self.element()?;
                            out.push_str(&element);
                            expr_allowed = false;
                        }
                        b')' | b']' => {
                            out.push(c as char);
                            self.pos += 1;
                            expr_allowed = false;
                        }
                        c if c.is_ascii_digit() => {
                            let start = self.pos;
                            while self
                                .peek()
                                .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.')
                            {
                                self.pos += 1;
                            }
                            out.push_str(&self.src[start..self.pos]);
                            expr_allowed = false;
                        }
                        c if is_ident_start(c) => {
                            let word = self.word();
                            out.push_str(word);
                            expr_allowed = EXPRESSION_KEYWORDS.contains(&word);
                        }
                        _ => {
                            self.bump_char(out);
                            expr_allowed = true;
                        }
                    }
                }
            }
        }
    }

    fn line_comment(&mut self, out: &mut String) {
        let end = self.src[self.pos..]
            .find('\n')
            .map_or(self.src.len(), |i| self.pos + i);
        out.push_str(&self.src[self.pos..end]);
        self.pos = end;
    }

    fn block_comment(&mut self, out: &mut String) -> Result<(), TransformError> {
        let Some(i) = self.src[self.pos + 2..].find("*/") else {
            return Err(self.error("Unterminated comment"));
        };
        let end = self.pos + 2 + i + 2;
        out.push_str(&self.src[self.pos..end]);
        self.pos = end;
        Ok(())
    }

    fn string(&mut self, out: &mut String, quote: u8) -> Result<(), TransformError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    self.pos = start;
                    return Err(self.error("Unterminated string literal"));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    self.skip_char();
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    break;
                }
                Some(_) => self.skip_char(),
            }
        }
        out.push_str(&self.src[start..self.pos]);
        Ok(())
    }

    fn template(&mut self, out: &mut String) -> Result<(), TransformError> {
        let start = self.pos;
        out.push('`');
        self.pos += 1;
        loop {
            match self.peek() {
                None => {
                    self.pos = start;
                    return Err(self.error("Unterminated template literal"));
                }
                Some(b'\\') => {
                    out.push('\\');
                    self.pos += 1;
                    self.bump_char(out);
                }
                Some(b'`') => {
                    out.push('`');
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'$') if self.peek_at(1) == Some(b'{') => {
                    out.push_str("${");
                    self.pos += 2;
                    self.script(out, true)?;
                    out.push('}');
                    self.pos += 1;
                }
                Some(_) => self.bump_char(out),
            }
        }
    }

    fn regex(&mut self, out: &mut String) -> Result<(), TransformError> {
        let start = self.pos;
        let mut in_class = false;
        self.pos += 1;
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    self.pos = start;
                    return Err(self.error("Unterminated regular expression"));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    self.skip_char();
                }
                Some(b'[') => {
                    in_class = true;
                    self.pos += 1;
                }
                Some(b']') => {
                    in_class = false;
                    self.pos += 1;
                }
                Some(b'/') if !in_class => {
                    self.pos += 1;
                    break;
                }
                Some(_) => self.skip_char(),
            }
        }
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        out.push_str(&self.src[start..self.pos]);
        Ok(())
    }

    fn starts_element(&self) -> bool {
        self.peek_at(1)
            .is_some_and(|b| b == b'>' || b.is_ascii_alphabetic() || b == b'_' || b == b'$')
    }

    /// Parse one element or fragment starting at `<` and return its factory call.
    fn element(&mut self) -> Result<String, TransformError> {
        let options = self.options;
        let pragma = &options.pragma;
        self.pos += 1;
        self.skip_whitespace();

        if self.peek() == Some(b'>') {
            self.pos += 1;
            let children = self.children("")?;
            return Ok(format!(
                "{}({}, null{})",
                pragma,
                options.pragma_frag,
                join_children(&children)
            ));
        }

        let name = self.element_name()?;
        let mut props: Vec<String> = Vec::new();
        let self_closing;

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error(&format!("Unterminated element <{}>", name))),
                Some(b'/') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    self.expect(b'>')?;
                    self_closing = true;
                    break;
                }
                Some(b'>') => {
                    self.pos += 1;
                    self_closing = false;
                    break;
                }
                Some(b'{') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    if !self.src[self.pos..].starts_with("...") {
                        return Err(self.error("Expected `...` in spread attribute"));
                    }
                    let expr = self.container_body()?;
                    props.push(expr.trim().to_string());
                }
                Some(c) if is_ident_start(c) => {
                    let attr = self.attribute_name();
                    self.skip_whitespace();
                    let value = if self.peek() == Some(b'=') {
                        self.pos += 1;
                        self.skip_whitespace();
                        self.attribute_value()?
                    } else {
                        "true".to_string()
                    };
                    props.push(format!("{}: {}", property_key(attr), value));
                }
                Some(_) => {
                    return Err(self.error(&format!("Unexpected character in element <{}>", name)))
                }
            }
        }

        let children = if self_closing {
            Vec::new()
        } else {
            self.children(name)?
        };

        let tag = if is_intrinsic(name) {
            quote_string(name)
        } else {
            name.to_string()
        };
        let props = if props.is_empty() {
            "null".to_string()
        } else {
            format!("{{{}}}", props.join(", "))
        };

        Ok(format!(
            "{}({}, {}{})",
            pragma,
            tag,
            props,
            join_children(&children)
        ))
    }

    /// Parse children up to and including the closing tag for `name`
    /// (empty for fragments).
    fn children(&mut self, name: &str) -> Result<Vec<String>, TransformError> {
        let mut children = Vec::new();

        loop {
            match self.peek() {
                None => {
                    let what = if name.is_empty() { "fragment" } else { name };
                    return Err(self.error(&format!("Unterminated element <{}>", what)));
                }
                Some(b'<') if self.peek_at(1) == Some(b'/') => {
                    let tag_start = self.pos;
                    self.pos += 2;
                    self.skip_whitespace();
                    let closing = if self.peek() == Some(b'>') {
                        ""
                    } else {
                        self.element_name()?
                    };
                    self.skip_whitespace();
                    self.expect(b'>')?;
                    if closing != name {
                        self.pos = tag_start;
                        return Err(self.error(&format!(
                            "Expected closing tag </{}> but found </{}>",
                            name, closing
                        )));
                    }
                    return Ok(children);
                }
                Some(b'<') => children.push(self.element()?),
                Some(b'{') => {
                    self.pos += 1;
                    let mut expr = String::new();
                    let has_code = self.script(&mut expr, true)?;
                    self.pos += 1;
                    if has_code {
                        children.push(expr.trim().to_string());
                    }
                }
                Some(_) => {
                    let start = self.pos;
                    while self.peek().is_some_and(|b| b != b'<' && b != b'{') {
                        self.pos += 1;
                    }
                    if let Some(text) = clean_text(&self.src[start..self.pos]) {
                        children.push(quote_string(&decode_entities(&text)));
                    }
                }
            }
        }
    }

    fn attribute_value(&mut self) -> Result<String, TransformError> {
        match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                let start = self.pos;
                self.pos += 1;
                while self.peek().is_some_and(|b| b != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    self.pos = start;
                    return Err(self.error("Unterminated attribute value"));
                }
                let raw = &self.src[start + 1..self.pos];
                self.pos += 1;
                Ok(quote_string(&decode_entities(raw)))
            }
            Some(b'{') => {
                self.pos += 1;
                let expr = self.container_body()?;
                let expr = expr.trim();
                if expr.is_empty() {
                    return Err(self.error("JSX attributes must only be assigned a non-empty expression"));
                }
                Ok(expr.to_string())
            }
            Some(b'<') if self.starts_element() => self.element(),
            _ => Err(self.error("Expected attribute value")),
        }
    }

    /// Read the rest of an expression container whose `{` was consumed.
    fn container_body(&mut self) -> Result<String, TransformError> {
        let mut expr = String::new();
        self.script(&mut expr, true)?;
        self.pos += 1;
        Ok(expr)
    }

    fn element_name(&mut self) -> Result<&'a str, TransformError> {
        if !self.peek().is_some_and(is_ident_start) {
            return Err(self.error("Expected element name"));
        }
        let src = self.src;
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| is_ident_char(b) || b == b'-' || b == b':' || b == b'.')
        {
            self.pos += 1;
        }
        Ok(&src[start..self.pos])
    }

    fn attribute_name(&mut self) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| is_ident_char(b) || b == b'-' || b == b':')
        {
            self.pos += 1;
        }
        &src[start..self.pos]
    }

    fn word(&mut self) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        &src[start..self.pos]
    }

    fn expect(&mut self, byte: u8) -> Result<(), TransformError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("Expected `{}`", byte as char)))
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn skip_char(&mut self) {
        if let Some(ch) = self.src[self.pos..].chars().next() {
            self.pos += ch.len_utf8();
        }
    }

    fn bump_char(&mut self, out: &mut String) {
        if let Some(ch) = self.src[self.pos..].chars().next() {
            out.push(ch);
            self.pos += ch.len_utf8();
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn error(&self, message: &str) -> TransformError {
        let consumed = &self.src[..self.pos.min(self.src.len())];
        let line_start = consumed.rfind('\n').map_or(0, |i| i + 1);
        TransformError::Syntax {
            line: consumed.matches('\n').count() + 1,
            column: consumed[line_start..].chars().count() + 1,
            message: message.to_string(),
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_ident_char(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

/// Lower-case names and names with dashes or namespaces are host elements.
fn is_intrinsic(name: &str) -> bool {
    if name.contains('.') {
        return false;
    }
    name.starts_with(|c: char| c.is_ascii_lowercase()) || name.contains(['-', ':'])
}

fn property_key(name: &str) -> String {
    if name.bytes().all(is_ident_char) {
        name.to_string()
    } else {
        quote_string(name)
    }
}

fn join_children(children: &[String]) -> String {
    children.iter().map(|c| format!(", {}", c)).collect()
}

static LINE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r\n|\n|\r").expect("Invalid line break regex"));

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#x([0-9a-fA-F]+)|#([0-9]+)|([a-zA-Z]+));").expect("Invalid entity regex")
});

/// Apply JSX whitespace rules to a text child.
///
/// Lines are trimmed where they touch a line break, blank lines disappear
/// and the remaining lines are joined with single spaces.
fn clean_text(raw: &str) -> Option<String> {
    let lines: Vec<&str> = LINE_BREAK_RE.split(raw).collect();
    let last = lines.len() - 1;

    let parts: Vec<String> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            let line = line.replace('\t', " ");
            let mut line = line.as_str();
            if i != 0 {
                line = line.trim_start_matches(' ');
            }
            if i != last {
                line = line.trim_end_matches(' ');
            }
            (!line.is_empty()).then(|| line.to_string())
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let decoded = if let Some(hex) = caps.get(1) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = caps.get(2) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match &caps[3] {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    "copy" => Some('\u{a9}'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Quote a string as a double-quoted JavaScript literal.
fn quote_string(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\u{2028}' => quoted.push_str("\\u2028"),
            '\u{2029}' => quoted.push_str("\\u2029"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn transform(source: &str) -> String {
        transform_jsx(source, &JsxOptions::default()).unwrap()
    }

    #[test]
    fn transforms_host_element() {
        assert_eq!(
            transform(r#"const a = <div class="demo">Hi</div>;"#),
            r#"const a = React.createElement("div", {class: "demo"}, "Hi");"#
        );
    }

    #[test]
    fn transforms_component_with_expressions() {
        assert_eq!(
            transform("let page = () => <Demo name={user.name} active count={1 + 2} />;"),
            "let page = () => React.createElement(Demo, {name: user.name, active: true, count: 1 + 2});"
        );
    }

    #[test]
    fn collapses_multiline_children() {
        let source = r#"const Demo = () => (
    <div class="demo">
        <h1>Void Framework</h1>
        <p>
            This is a
            demo page
        </p>
    </div>
);"#;

        assert_eq!(
            transform(source),
            "const Demo = () => (\n    React.createElement(\"div\", {class: \"demo\"}, \
             React.createElement(\"h1\", null, \"Void Framework\"), \
             React.createElement(\"p\", null, \"This is a demo page\"))\n);"
        );
    }

    #[test]
    fn transforms_fragments_and_spreads() {
        assert_eq!(
            transform("x = <><Item {...props} data-id=\"7\" /></>"),
            "x = React.createElement(React.Fragment, null, React.createElement(Item, {...props, \"data-id\": \"7\"}))"
        );
    }

    #[test]
    fn transforms_nested_jsx_in_expressions() {
        assert_eq!(
            transform("<ul>{items.map(i => <li key={i}>{i}</li>)}</ul>"),
            "React.createElement(\"ul\", null, items.map(i => React.createElement(\"li\", {key: i}, i)))"
        );
    }

    #[test]
    fn skips_empty_and_comment_containers() {
        assert_eq!(
            transform("<p>{/* note */}{}text</p>"),
            "React.createElement(\"p\", null, \"text\")"
        );
    }

    #[test]
    fn leaves_plain_javascript_alone() {
        let source = "if (a < b && c > d) { s = '<div>'; t = `<p>${n}</p>`; r = /<a>/g; }\n// <b>\n";
        assert_eq!(transform(source), source);
    }

    #[test]
    fn transforms_jsx_inside_template_expressions() {
        assert_eq!(
            transform("t = `${<b />}`;"),
            "t = `${React.createElement(\"b\", null)}`;"
        );
    }

    #[test]
    fn decodes_entities_and_escapes_quotes() {
        assert_eq!(
            transform(r#"<p title='say "hi"'>a &amp; b&#33;</p>"#),
            r#"React.createElement("p", {title: "say \"hi\""}, "a & b!")"#
        );
    }

    #[test]
    fn uses_configured_pragma() {
        let options = JsxOptions {
            pragma: "h".to_string(),
            pragma_frag: "Fragment".to_string(),
        };
        assert_eq!(
            transform_jsx("return <><br /></>", &options).unwrap(),
            "return h(Fragment, null, h(\"br\", null))"
        );
    }

    #[test]
    fn reports_mismatched_closing_tag() {
        let err = transform_jsx("const a = (\n  <div></span>\n);", &JsxOptions::default())
            .unwrap_err();

        match err {
            TransformError::Syntax {
                line,
                column,
                message,
            } => {
                assert_eq!(line, 2);
                assert_eq!(column, 8);
                assert!(message.contains("</div>"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn reports_unterminated_element() {
        let err = transform_jsx("const a = <div>hello", &JsxOptions::default()).unwrap_err();
        assert!(err.is_syntax());
        assert!(err.to_string().contains("Unterminated element <div>"));
    }
}
