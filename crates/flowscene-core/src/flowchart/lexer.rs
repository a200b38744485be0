/// One statement of flowchart source: the text between separators, with the 1-based line it
/// starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStatement<'input> {
    pub line: usize,
    pub text: &'input str,
}

/// Splits flowchart source into statements.
///
/// Separators are newlines and `;`, except inside quotes, `|pipe labels|` or shape brackets.
/// `%%` starts a comment that runs to the end of the line. Blank statements are skipped.
pub(crate) struct StatementSplitter<'input> {
    input: &'input str,
    pos: usize,
    line: usize,
}

impl<'input> StatementSplitter<'input> {
    pub(crate) fn new(input: &'input str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn peek2(&self) -> Option<[u8; 2]> {
        let bytes = self.input.as_bytes();
        if self.pos + 1 >= bytes.len() {
            return None;
        }
        Some([bytes[self.pos], bytes[self.pos + 1]])
    }

    fn skip_comment(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'\n' {
                return;
            }
            self.pos += 1;
        }
    }

    /// Scans one statement. Returns the byte range of its text and the line it starts on, or
    /// `None` at end of input.
    fn scan(&mut self) -> Option<(usize, usize, usize)> {
        if self.pos >= self.input.len() {
            return None;
        }
        let start = self.pos;
        let line = self.line;
        let mut quote: Option<u8> = None;
        let mut depth = 0usize;
        let mut comment_at: Option<usize> = None;
        let mut end = None;

        while let Some(b) = self.peek() {
            if let Some(q) = quote {
                if b == b'\n' {
                    // Unterminated quotes never swallow the next line.
                    quote = None;
                } else {
                    if b == q {
                        quote = None;
                    }
                    self.pos += 1;
                    continue;
                }
            }

            match b {
                b'\n' => {
                    end = Some(comment_at.unwrap_or(self.pos));
                    self.pos += 1;
                    self.line += 1;
                    break;
                }
                b';' if depth == 0 => {
                    end = Some(self.pos);
                    self.pos += 1;
                    break;
                }
                b'"' => quote = Some(b),
                b'|' if depth == 0 => quote = Some(b),
                b'[' | b'(' | b'{' => depth += 1,
                b']' | b')' | b'}' => depth = depth.saturating_sub(1),
                b'%' if self.peek2() == Some([b'%', b'%']) => {
                    comment_at = Some(self.pos);
                    self.skip_comment();
                    continue;
                }
                _ => {}
            }
            self.pos += 1;
        }

        let end = end.unwrap_or_else(|| comment_at.unwrap_or(self.pos));
        Some((start, end, line))
    }
}

impl<'input> Iterator for StatementSplitter<'input> {
    type Item = RawStatement<'input>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (start, end, line) = self.scan()?;
            let text = self.input[start..end].trim();
            if text.is_empty() {
                continue;
            }
            return Some(RawStatement { line, text });
        }
    }
}
