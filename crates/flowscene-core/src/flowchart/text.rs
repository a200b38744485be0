pub(super) fn unquote(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"' {
        return &s[1..s.len() - 1];
    }
    s
}

/// Closing delimiter for a node shape opener, if `b` opens one.
pub(super) fn shape_closer(b: u8) -> Option<u8> {
    match b {
        b'[' => Some(b']'),
        b'(' => Some(b')'),
        b'{' => Some(b'}'),
        // Asymmetric shape: `A>label]`.
        b'>' => Some(b']'),
        _ => None,
    }
}

/// Strips the inner decoration of compound shapes (`[(db)]`, `((circle))`, `([stadium])`,
/// `[[subroutine]]`, `{{hexagon}}`, `[/parallelogram/]`, `[\trapezoid/]`, ...) from the text
/// found between the outer delimiters. Plain `[label]` text comes back untouched.
pub(super) fn strip_shape_decoration(interior: &str) -> &str {
    let bytes = interior.as_bytes();
    if bytes.len() < 2 {
        return interior;
    }
    let first = bytes[0];
    let last = bytes[bytes.len() - 1];
    let decorated = matches!(
        (first, last),
        (b'(', b')')
            | (b'[', b']')
            | (b'{', b'}')
            | (b'/', b'/')
            | (b'\\', b'\\')
            | (b'/', b'\\')
            | (b'\\', b'/')
    );
    if decorated {
        return &interior[1..interior.len() - 1];
    }
    interior
}

/// Resolves the declared label from the raw text between a shape's outer delimiters.
///
/// The result keeps surrounding whitespace unless the whole label is a quoted string.
pub(super) fn node_label(interior: &str) -> String {
    let inner = strip_shape_decoration(interior);
    let trimmed = inner.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        return unquote(trimmed).to_string();
    }
    inner.to_string()
}

pub(super) fn is_id_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

pub(super) fn is_connector_byte(b: u8) -> bool {
    matches!(b, b'-' | b'.' | b'=')
}
