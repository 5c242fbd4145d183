//! Regex family for plan text, plus decimal and unit normalization.
//!
//! All patterns are case-insensitive and compiled once.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{Decimal, Dimension, FloorMarker};

/// `<decimal> m²` / `<decimal> m2`.
pub(crate) static AREA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,4}(?:[.,]\d{1,2})?)\s*m[²2]").unwrap()
});

/// Area pattern used when binding values to a room; also accepts the
/// spelled-out unit.
pub(crate) static AREA_LOOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,4}(?:[.,]\d{1,2})?)\s*(?:m[²2]|metros\s+quadrados)").unwrap()
});

/// `<decimal> x <decimal>` as width, length.
pub(crate) static DIMENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,4}(?:[.,]\d{1,2})?)\s*[x×]\s*(\d{1,4}(?:[.,]\d{1,2})?)").unwrap()
});

/// Room vocabulary. Accents are optional since OCR drops them often.
pub(crate) static ROOM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(SALA|QUARTO|COZINHA|BANHEIRO|VARANDA|[ÁA]REA|SU[ÍI]TE|LAVABO|WC|GARAGEM|ESCRIT[ÓO]RIO|CLOSET|HALL|CORREDOR|SACADA|TERRA[ÇC]O|CHURRASQUEIRA|PISCINA|DESPENSA)\b",
    )
    .unwrap()
});

/// Ordinal directly after a room token ("QUARTO 2"), not the start of a measure.
pub(crate) static ROOM_ORDINAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,2})(?:\s|$)").unwrap()
});

/// `<number> cm`.
pub(crate) static LINEAR_CM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,4}(?:[.,]\d{1,2})?)\s*cm\b").unwrap()
});

pub(crate) static FLOOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(T[ÉE]RREO|PAVIMENTO|ANDAR|COBERTURA)\b(?:\s*(\d+))?").unwrap()
});

pub(crate) static FCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bFCK\s*[=:]?\s*(\d+)").unwrap()
});

/// Room names that describe amenities rather than living space.
pub const AMENITY_ROOMS: &[&str] = &[
    "VARANDA",
    "SACADA",
    "TERRAÇO",
    "GARAGEM",
    "CHURRASQUEIRA",
    "PISCINA",
];

pub fn is_amenity(room: &str) -> bool {
    AMENITY_ROOMS.contains(&room)
}

/// Canonical spelling of a matched room token: upper-case, accents restored.
pub fn canonical_room(token: &str) -> String {
    let upper = token.trim().to_uppercase();
    match upper.as_str() {
        "AREA" => "ÁREA".to_string(),
        "SUITE" => "SUÍTE".to_string(),
        "ESCRITORIO" => "ESCRITÓRIO".to_string(),
        "TERRACO" => "TERRAÇO".to_string(),
        _ => upper,
    }
}

/// Apply centimeter → meter normalization to one dimension value.
///
/// Values above `threshold` are read as centimeters and divided by 100;
/// the text form is then re-rendered with two decimals.
pub fn normalize_length(raw: Decimal, threshold: f64) -> Decimal {
    if raw.value() > threshold {
        Decimal::from_value(raw.value() / 100.0)
    } else {
        raw
    }
}

/// Parse the two captures of a `DIMENSION` match into meters.
pub fn dimension_from_captures(caps: &regex::Captures<'_>, cm_threshold: f64) -> Option<Dimension> {
    let width = Decimal::parse(caps.get(1)?.as_str())?;
    let length = Decimal::parse(caps.get(2)?.as_str())?;
    Some(Dimension {
        width: normalize_length(width, cm_threshold),
        length: normalize_length(length, cm_threshold),
    })
}

/// First dimension in `text`, normalized to meters.
pub fn find_dimension(text: &str, cm_threshold: f64) -> Option<Dimension> {
    DIMENSION
        .captures(text)
        .and_then(|caps| dimension_from_captures(&caps, cm_threshold))
}

/// Every dimension in `text`, in order.
pub fn all_dimensions(text: &str, cm_threshold: f64) -> Vec<Dimension> {
    DIMENSION
        .captures_iter(text)
        .filter_map(|caps| dimension_from_captures(&caps, cm_threshold))
        .collect()
}

/// Every `m²` area in `text`, in order.
pub fn all_areas(text: &str) -> Vec<Decimal> {
    AREA.captures_iter(text)
        .filter_map(|caps| Decimal::parse(caps.get(1)?.as_str()))
        .collect()
}

/// First area in `text`, accepting the spelled-out unit as well.
pub fn find_area_loose(text: &str) -> Option<Decimal> {
    AREA_LOOSE
        .captures(text)
        .and_then(|caps| Decimal::parse(caps.get(1)?.as_str()))
}

/// Every raw centimeter measurement, `.`-normalized.
pub fn all_cm_measurements(text: &str) -> Vec<String> {
    LINEAR_CM
        .captures_iter(text)
        .filter_map(|caps| Decimal::parse(caps.get(1)?.as_str()))
        .map(|d| d.as_str().to_string())
        .collect()
}

pub fn all_floor_markers(text: &str) -> Vec<FloorMarker> {
    FLOOR
        .captures_iter(text)
        .filter_map(|caps| {
            let label = caps.get(1)?.as_str().to_uppercase().replace("TERREO", "TÉRREO");
            let number = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
            Some(FloorMarker { label, number })
        })
        .collect()
}

/// First `FCK <n>` value in MPa.
pub fn find_fck(text: &str) -> Option<u32> {
    FCK.captures(text)
        .and_then(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
}

/// Room token (with optional ordinal) at the start of the first room match.
///
/// Returns the canonical name, e.g. "QUARTO 2".
pub fn find_room_label(text: &str) -> Option<String> {
    ROOM.find(text).map(|m| room_label(text, m))
}

/// Canonical name for a room token matched in `text`, with its ordinal
/// when one follows. A number that opens a measure ("SALA 12 m2",
/// "QUARTO 3 x 3") is not an ordinal.
pub fn room_label(text: &str, token: regex::Match<'_>) -> String {
    let base = canonical_room(token.as_str());
    let rest = &text[token.end()..];
    let ordinal = ROOM_ORDINAL
        .captures(rest)
        .and_then(|c| c.get(1))
        .filter(|o| !starts_with_measure(&rest[o.start()..]));
    match ordinal {
        Some(o) => format!("{base} {}", o.as_str()),
        None => base,
    }
}

fn starts_with_measure(text: &str) -> bool {
    [&*AREA_LOOSE, &*DIMENSION]
        .iter()
        .any(|re| re.find(text).is_some_and(|m| m.start() == 0))
}

/// Room token without its ordinal ("QUARTO 2" → "QUARTO").
pub fn room_base(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

/// Whether `a` and `b` can name the same room: equal, or the same token
/// where at least one side carries no ordinal.
pub fn same_room(a: &str, b: &str) -> bool {
    a == b || (room_base(a) == room_base(b) && (!has_ordinal(a) || !has_ordinal(b)))
}

pub fn has_ordinal(name: &str) -> bool {
    name.split_whitespace().nth(1).is_some()
}

/// Byte range covering `radius` characters on each side of `start..end`,
/// clamped to the text and always on char boundaries.
pub fn char_window(text: &str, start: usize, end: usize, radius: usize) -> (usize, usize) {
    let from = if radius == 0 {
        start
    } else {
        text[..start]
            .char_indices()
            .rev()
            .nth(radius - 1)
            .map(|(i, _)| i)
            .unwrap_or(0)
    };
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    (from, to)
}
