//! Human-facing views of an extracted record.

use std::fmt::Write;

use super::types::{round2, Environment, ExtractedRecord};

/// Width and length below this are doors or wall noise, not rooms.
pub const MIN_ROOM_SIDE_M: f64 = 2.0;

/// Checklist lines: one per essential function, plus room and area lines
/// when those groups were found.
pub fn checklist(record: &ExtractedRecord) -> Vec<String> {
    let mut items: Vec<String> = record
        .essential_functions()
        .iter()
        .map(|f| format!("✓ {f}"))
        .collect();

    let info = record.relevant_info();
    if let Some(rooms) = info.room_names() {
        items.push(format!("✓ {} ambientes identificados", rooms.len()));
    }
    if info.areas().is_some() {
        items.push("✓ Áreas calculadas disponíveis".to_string());
    }
    items
}

/// Total floor area in m².
///
/// Measured rooms count as width × length when both sides are at least
/// `MIN_ROOM_SIDE_M`; rooms without dimensions contribute their explicit
/// area.
pub fn total_area(environments: &[Environment]) -> f64 {
    let total: f64 = environments
        .iter()
        .map(|env| match (env.dimensions, env.area) {
            (Some((w, l)), _) if w >= MIN_ROOM_SIDE_M && l >= MIN_ROOM_SIDE_M => w * l,
            (Some(_), _) => 0.0,
            (None, Some(area)) => area,
            (None, None) => 0.0,
        })
        .sum();
    round2(total)
}

/// Plain-text summary for the terminal.
pub fn render_summary(record: &ExtractedRecord) -> String {
    let mut out = String::new();
    let info = record.relevant_info();

    let _ = writeln!(out, "Tipo de planta: {}", record.plan_type());
    let _ = writeln!(out, "Objetivo: {}", record.purpose());
    if record.is_degraded() {
        let _ = writeln!(out, "Aviso: ambientes não identificados com confiança");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Checklist:");
    for item in checklist(record) {
        let _ = writeln!(out, "  {item}");
    }

    if let Some(rooms) = info.room_names() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Ambientes:");
        for room in rooms {
            let _ = writeln!(out, "  - {room}");
        }
    }

    if let Some(measured) = info.room_measurements() {
        let _ = writeln!(out, "Área total estimada: {:.2} m²", total_area(measured));
    }
    if let Some(areas) = info.areas() {
        let _ = writeln!(out, "Áreas encontradas: {}", areas.len());
    }

    out
}
