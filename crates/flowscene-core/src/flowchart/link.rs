use super::Link;
use super::classify::Cursor;
use super::text::{is_connector_byte, unquote};

/// Consumes a run of connector bytes (`-`, `.`, `=`) and returns its length.
fn connector_run(cur: &mut Cursor<'_>) -> usize {
    let start = cur.pos;
    while cur.peek().is_some_and(is_connector_byte) {
        cur.pos += 1;
    }
    cur.pos - start
}

/// Finds the end segment of an unquoted inline label (`== text ==>`): a connector run of at
/// least two bytes followed by `>`. Returns `(label_end, segment_end)` as absolute offsets.
fn find_end_segment(input: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = input.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if !is_connector_byte(bytes[i]) {
            i += 1;
            continue;
        }
        let run_start = i;
        while i < bytes.len() && is_connector_byte(bytes[i]) {
            i += 1;
        }
        if i - run_start >= 2 && bytes.get(i) == Some(&b'>') {
            return Some((run_start, i + 1));
        }
    }
    None
}

fn pipe_label(cur: &mut Cursor<'_>) -> Option<String> {
    let save = cur.pos;
    cur.skip_ws();
    if cur.peek() != Some(b'|') {
        cur.pos = save;
        return None;
    }
    let open = cur.pos + 1;
    let Some(close) = cur.input[open..].find('|') else {
        cur.pos = save;
        return None;
    };
    cur.pos = open + close + 1;
    let label = unquote(cur.input[open..open + close].trim()).to_string();
    Some(label).filter(|l| !l.is_empty())
}

/// `--`, `==` and `-.` open a labelled connector (`-- text -->`); longer runs without a `>`
/// (`---`, `-.-`, `===`) are complete undirected links.
fn opens_label(run: &str) -> bool {
    matches!(run, "--" | "==" | "-.")
}

/// Parses a connector at the cursor.
///
/// Directed forms: `-->`, `==>`, `-.->`, `-- "label" -->`, `-."label".->`, `== label ==>`,
/// each optionally followed by a `|label|`. Undirected runs (`---`, `-.-`, `===`) parse as
/// links with `directed == false`. On rejection the cursor is left where it was.
pub(super) fn parse_link(cur: &mut Cursor<'_>) -> Option<Link> {
    let save = cur.pos;
    cur.skip_ws();
    let run_start = cur.pos;
    let run = connector_run(cur);
    if run < 2 {
        cur.pos = save;
        return None;
    }

    if cur.peek() == Some(b'>') {
        cur.pos += 1;
        let label = pipe_label(cur);
        return Some(Link {
            label,
            directed: true,
        });
    }

    if !opens_label(&cur.input[run_start..cur.pos]) {
        let label = pipe_label(cur);
        return Some(Link {
            label,
            directed: false,
        });
    }

    // Start segment of a labelled connector; the label sits between the two segments.
    cur.skip_ws();
    let label = if cur.peek() == Some(b'"') {
        let open = cur.pos + 1;
        let Some(close) = cur.input[open..].find('"') else {
            cur.pos = save;
            return None;
        };
        cur.pos = open + close + 1;
        let text = cur.input[open..open + close].to_string();
        cur.skip_ws();
        if connector_run(cur) == 0 || cur.peek() != Some(b'>') {
            cur.pos = save;
            return None;
        }
        cur.pos += 1;
        text
    } else {
        let Some((label_end, segment_end)) = find_end_segment(cur.input, cur.pos) else {
            cur.pos = save;
            return None;
        };
        let text = cur.input[cur.pos..label_end].trim().to_string();
        if text.is_empty() {
            cur.pos = save;
            return None;
        }
        cur.pos = segment_end;
        text
    };

    let label = pipe_label(cur).or(Some(label));
    Some(Link {
        label,
        directed: true,
    })
}
