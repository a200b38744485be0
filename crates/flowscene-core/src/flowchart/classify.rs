use super::link::parse_link;
use super::text::{is_id_byte, node_label, shape_closer};
use super::{NodeRef, StatementKind};

/// Keywords that start statements the scene has no use for.
const IGNORED_KEYWORDS: &[&str] = &[
    "subgraph",
    "end",
    "style",
    "linkStyle",
    "click",
    "direction",
    "accTitle",
    "accDescr",
];

pub(super) struct Cursor<'input> {
    pub(super) input: &'input str,
    pub(super) pos: usize,
}

impl<'input> Cursor<'input> {
    pub(super) fn new(input: &'input str) -> Self {
        Self { input, pos: 0 }
    }

    pub(super) fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.as_bytes().get(self.pos + offset).copied()
    }

    pub(super) fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b == b' ' || b == b'\t' || b == b'\r' {
                self.pos += 1;
                continue;
            }
            break;
        }
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn rest(&self) -> &'input str {
        &self.input[self.pos..]
    }

    fn starts_with_kw(&self, kw: &str) -> bool {
        let rest = self.rest();
        if !rest.starts_with(kw) {
            return false;
        }
        match rest.as_bytes().get(kw.len()) {
            None => true,
            Some(&b) => !is_id_byte(b) && b != b'-' && b != b'[' && b != b'(' && b != b'{',
        }
    }

    /// Identifier bytes. A `-` belongs to the identifier only when an identifier byte follows
    /// it, so `A-->B` reads as `A` and a connector.
    fn ident(&mut self) -> Option<&'input str> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_id_byte(b) {
                self.pos += 1;
                continue;
            }
            if b == b'-' && self.peek_at(1).is_some_and(is_id_byte) && self.pos > start {
                self.pos += 1;
                continue;
            }
            break;
        }
        (self.pos > start).then(|| &self.input[start..self.pos])
    }

    /// Text up to the matching closer, honouring quotes and nesting of the same bracket pair.
    fn delimited(&mut self, open: u8, close: u8) -> Option<&'input str> {
        let bytes = self.input.as_bytes();
        let start = self.pos;
        let mut depth = 0usize;
        let mut in_quote = false;
        let mut i = self.pos;
        while i < bytes.len() {
            let b = bytes[i];
            if in_quote {
                in_quote = b != b'"';
                i += 1;
                continue;
            }
            if b == b'"' {
                in_quote = true;
            } else if b == close && depth == 0 {
                self.pos = i + 1;
                return Some(&self.input[start..i]);
            } else if b == close {
                depth -= 1;
            } else if b == open && open != b'>' {
                depth += 1;
            }
            i += 1;
        }
        None
    }

    fn class_suffix(&mut self) -> Option<&'input str> {
        if !self.rest().starts_with(":::") {
            return None;
        }
        let save = self.pos;
        self.pos += 3;
        let start = self.pos;
        while self.peek().is_some_and(|b| is_id_byte(b) || b == b'-') {
            self.pos += 1;
        }
        if self.pos == start {
            self.pos = save;
            return None;
        }
        Some(&self.input[start..self.pos])
    }
}

fn node_ref(cur: &mut Cursor<'_>) -> Option<NodeRef> {
    cur.skip_ws();
    let id = cur.ident()?;
    let mut node = NodeRef::new(id);

    if let Some(open) = cur.peek() {
        if let Some(close) = shape_closer(open) {
            let save = cur.pos;
            cur.pos += 1;
            match cur.delimited(open, close) {
                Some(interior) => node.label = Some(node_label(interior)),
                None => cur.pos = save,
            }
        }
    }

    node.class_name = cur.class_suffix().map(str::to_string);
    Some(node)
}

fn split_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    match s.find(|c: char| c.is_ascii_whitespace()) {
        Some(i) => Some((&s[..i], s[i..].trim())),
        None => Some((s, "")),
    }
}

fn comma_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn header(keyword: &str, rest: &str) -> StatementKind {
    let direction = rest
        .split_whitespace()
        .next()
        .and_then(|d| match d {
            "TB" | "TD" => Some("TB"),
            "BT" | "LR" | "RL" => Some(d),
            _ => None,
        })
        .map(str::to_string);
    StatementKind::Header {
        keyword: keyword.to_string(),
        direction,
    }
}

/// `classDef <names> <style>`. The style runs to the end of the statement and is kept verbatim
/// apart from surrounding whitespace and a trailing `;`.
fn class_def(rest: &str) -> StatementKind {
    let Some((names, style)) = split_word(rest) else {
        return StatementKind::Other {
            keyword: Some("classDef".to_string()),
        };
    };
    StatementKind::ClassDef {
        names: comma_list(names),
        style: style.trim_end_matches(';').trim().to_string(),
    }
}

fn class_assign(rest: &str) -> StatementKind {
    let rest = rest.trim();
    let Some(split) = rest.rfind(|c: char| c.is_ascii_whitespace()) else {
        return StatementKind::Other {
            keyword: Some("class".to_string()),
        };
    };
    StatementKind::ClassAssign {
        targets: comma_list(&rest[..split]),
        class_name: rest[split..].trim().to_string(),
    }
}

/// Classifies one statement of flowchart source.
pub(super) fn classify(text: &str) -> StatementKind {
    let mut cur = Cursor::new(text.trim());

    for kw in ["flowchart-elk", "flowchart", "graph"] {
        if cur.starts_with_kw(kw) {
            return header(kw, &cur.rest()[kw.len()..]);
        }
    }
    if cur.starts_with_kw("classDef") {
        return class_def(&cur.rest()["classDef".len()..]);
    }
    if cur.starts_with_kw("class") {
        return class_assign(&cur.rest()["class".len()..]);
    }
    if let Some(kw) = IGNORED_KEYWORDS.iter().find(|kw| cur.starts_with_kw(kw)) {
        return StatementKind::Other {
            keyword: Some((*kw).to_string()),
        };
    }

    let Some(first) = node_ref(&mut cur) else {
        return StatementKind::Other { keyword: None };
    };
    let mut nodes = vec![first];
    let mut links = Vec::new();

    loop {
        cur.skip_ws();
        if cur.eof() {
            break;
        }
        let Some(link) = parse_link(&mut cur) else {
            return StatementKind::Other { keyword: None };
        };
        let Some(next) = node_ref(&mut cur) else {
            return StatementKind::Other { keyword: None };
        };
        links.push(link);
        nodes.push(next);
    }

    if links.is_empty() {
        let node = nodes.swap_remove(0);
        return StatementKind::NodeDecl(node);
    }
    StatementKind::Edges { nodes, links }
}
