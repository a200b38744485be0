use crate::geom::PathEnds;
use regex::Regex;
use std::sync::OnceLock;

fn re_num() -> &'static Regex {
    static ONCE: OnceLock<Regex> = OnceLock::new();
    ONCE.get_or_init(|| {
        Regex::new(r"-?(?:\d+\.\d*|\.\d+|\d+)(?:[eE][+-]?\d+)?").expect("valid number regex")
    })
}

/// Start and end points of a path-drawing command string.
///
/// The start is the first coordinate pair after the first move-to (`M`/`m`); the end is the
/// last coordinate pair in the string. Strings without a move-to or with fewer than two
/// numbers after it yield `None`.
pub fn parse_path_ends(d: &str) -> Option<PathEnds> {
    let move_to = d.find(['M', 'm'])?;
    let nums = re_num()
        .find_iter(&d[move_to + 1..])
        .map(|m| m.as_str().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    if nums.len() < 2 || nums.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let n = nums.len();
    Some(PathEnds {
        x1: nums[0],
        y1: nums[1],
        x2: nums[n - 2],
        y2: nums[n - 1],
    })
}
