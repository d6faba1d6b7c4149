//! Small helpers mods keep reaching for.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Returns `true` if dotted version `a` is strictly newer than `b`.
///
/// Missing parts count as `0`, so `"1.2"` equals `"1.2.0"`. Each part is
/// read from its leading digits (`"3-beta"` is `3`); a part with no digits
/// is skipped.
pub fn is_version_newer(a: &str, b: &str) -> bool {
    let a: Vec<&str> = a.split('.').collect();
    let b: Vec<&str> = b.split('.').collect();

    for i in 0..a.len().max(b.len()) {
        let (Some(x), Some(y)) = (version_part(a.get(i)), version_part(b.get(i))) else {
            continue;
        };
        if x != y {
            return x > y;
        }
    }
    false
}

fn version_part(part: Option<&&str>) -> Option<u64> {
    let part = match part {
        Some(p) if !p.is_empty() => p.trim_start(),
        _ => return Some(0),
    };
    let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// An item color: one value, or one per layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Color {
    Single(String),
    Layers(Vec<String>),
}

const DEFAULT_COLOR: &str = "Default";

impl Color {
    fn is_default(&self) -> bool {
        matches!(self, Self::Single(s) if s == DEFAULT_COLOR)
    }

    fn all_default(&self) -> bool {
        matches!(self, Self::Layers(layers) if layers.iter().all(|l| l == DEFAULT_COLOR))
    }
}

/// Compares two item colors, treating "no color", `"Default"` and a list
/// of `"Default"` layers as the same thing.
pub fn colors_equal(a: Option<&Color>, b: Option<&Color>) -> bool {
    let a = a.filter(|c| !matches!(c, Color::Single(s) if s.is_empty()));
    let b = b.filter(|c| !matches!(c, Color::Single(s) if s.is_empty()));

    match (a, b) {
        (None, None) => true,
        (None, Some(c)) | (Some(c), None) => c.is_default(),
        (Some(x), Some(y)) => {
            (x.is_default() && y.all_default()) || (y.is_default() && x.all_default()) || x == y
        }
    }
}

/// Size of a value in kilobytes (1000 bytes), rounded to one decimal.
///
/// Strings are measured as UTF-8; anything else as its JSON text.
pub fn size_in_kbytes(value: &Value) -> f64 {
    let bytes = match value {
        Value::String(s) => s.len(),
        other => other.to_string().len(),
    };
    (bytes as f64 / 100.0).round() / 10.0
}

/// A random integer in `[min, max]`. Swapped bounds are tolerated.
pub fn random_in_range(min: i64, max: i64) -> i64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    rand::rng().random_range(lo..=hi)
}
