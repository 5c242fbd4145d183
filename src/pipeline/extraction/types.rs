use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════
// Plan type + per-type profile
// ═══════════════════════════════════════════

/// Category of a construction drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    #[serde(alias = "arquitetonica")]
    Architectural,
    #[serde(alias = "estrutural")]
    Structural,
    #[serde(alias = "eletrica")]
    Electrical,
    #[serde(alias = "hidraulica")]
    Hydraulic,
    Layout,
    #[serde(alias = "detalhamento")]
    Detail,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Architectural => "architectural",
            Self::Structural => "structural",
            Self::Electrical => "electrical",
            Self::Hydraulic => "hydraulic",
            Self::Layout => "layout",
            Self::Detail => "detail",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "architectural" | "arquitetonica" => Some(Self::Architectural),
            "structural" | "estrutural" => Some(Self::Structural),
            "electrical" | "eletrica" => Some(Self::Electrical),
            "hydraulic" | "hidraulica" => Some(Self::Hydraulic),
            "layout" => Some(Self::Layout),
            "detail" | "detalhamento" => Some(Self::Detail),
            _ => None,
        }
    }
}

impl Default for PlanType {
    fn default() -> Self {
        Self::Architectural
    }
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static description of a plan type: the keywords that identify it,
/// what the drawing is for, and what a reader checks on it.
#[derive(Debug, Clone, Copy)]
pub struct PlanProfile {
    pub plan_type: PlanType,
    pub keywords: &'static [&'static str],
    pub purpose: &'static str,
    pub essential_functions: &'static [&'static str],
}

/// Profiles in classification priority order. The first profile that reaches
/// the keyword threshold wins, so the order of this table is the tie-break.
pub static PLAN_PROFILES: &[PlanProfile] = &[
    PlanProfile {
        plan_type: PlanType::Architectural,
        keywords: &["SALA", "QUARTO", "COZINHA", "BANHEIRO", "VARANDA"],
        purpose: "Definir layout e distribuição dos ambientes",
        essential_functions: &[
            "Dimensionamento de ambientes",
            "Fluxo de circulação",
            "Aproveitamento de espaço",
        ],
    },
    PlanProfile {
        plan_type: PlanType::Structural,
        keywords: &["PILAR", "VIGA", "LAJE", "FUNDAÇÃO", "CONCRETO"],
        purpose: "Garantir estabilidade e segurança estrutural",
        essential_functions: &[
            "Distribuição de cargas",
            "Dimensionamento estrutural",
            "Especificações técnicas",
        ],
    },
    PlanProfile {
        plan_type: PlanType::Electrical,
        keywords: &["TOMADA", "INTERRUPTOR", "QUADRO", "CIRCUITO", "ILUMINAÇÃO"],
        purpose: "Distribuir energia elétrica com segurança",
        essential_functions: &[
            "Pontos de energia",
            "Circuitos elétricos",
            "Dimensionamento de cabos",
        ],
    },
    PlanProfile {
        plan_type: PlanType::Hydraulic,
        keywords: &["ÁGUA", "ESGOTO", "REGISTRO", "CAIXA", "TUBULAÇÃO"],
        purpose: "Distribuir água e coletar esgoto eficientemente",
        essential_functions: &[
            "Pontos hidráulicos",
            "Dimensionamento de tubulações",
            "Sistema de drenagem",
        ],
    },
    PlanProfile {
        plan_type: PlanType::Layout,
        keywords: &["LAYOUT", "LEIAUTE", "MOBILIÁRIO", "BANCADA", "ARMÁRIO"],
        purpose: "Posicionar mobiliário e equipamentos nos ambientes",
        essential_functions: &[
            "Disposição de mobiliário",
            "Áreas de uso",
            "Compatibilização com pontos de instalação",
        ],
    },
    PlanProfile {
        plan_type: PlanType::Detail,
        keywords: &["DETALHE", "AMPLIAÇÃO", "CORTE", "ELEVAÇÃO", "VISTA"],
        purpose: "Especificar elementos construtivos em escala ampliada",
        essential_functions: &[
            "Especificação de materiais",
            "Cotas de execução",
            "Interfaces entre elementos",
        ],
    },
];

impl PlanProfile {
    /// Profile for a plan type. Every variant has exactly one entry in
    /// `PLAN_PROFILES`; the architectural profile is returned if that
    /// table is ever edited inconsistently.
    pub fn for_type(plan_type: PlanType) -> &'static PlanProfile {
        PLAN_PROFILES
            .iter()
            .find(|p| p.plan_type == plan_type)
            .unwrap_or(&PLAN_PROFILES[0])
    }
}

// ═══════════════════════════════════════════
// Numeric values
// ═══════════════════════════════════════════

/// A decimal number normalized to `.` as separator.
///
/// Keeps the canonical text form (so "3,20" stays "3.20", not 3.2) next to
/// the parsed value. Serializes as the text form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Decimal {
    text: String,
    value: f64,
}

impl Decimal {
    /// Parse a number written with either `,` or `.` as decimal separator.
    pub fn parse(raw: &str) -> Option<Self> {
        let text = raw.trim().replace(',', ".");
        let value = text.parse::<f64>().ok()?;
        if !value.is_finite() {
            return None;
        }
        Some(Self { text, value })
    }

    /// Build from an already-computed value, formatted with two decimals.
    pub fn from_value(value: f64) -> Self {
        Self {
            text: format!("{value:.2}"),
            value,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl From<Decimal> for String {
    fn from(d: Decimal) -> Self {
        d.text
    }
}

impl TryFrom<String> for Decimal {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Decimal::parse(&s).ok_or_else(|| format!("not a decimal number: {s}"))
    }
}

impl std::fmt::Display for Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// A `width x length` pair, in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub width: Decimal,
    pub length: Decimal,
}

impl Dimension {
    pub fn as_meters(&self) -> (f64, f64) {
        (self.width.value(), self.length.value())
    }
}

/// Concrete strength class read from an `FCK <n>` annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcreteStrength {
    pub fck_mpa: u32,
    pub label: String,
}

impl ConcreteStrength {
    pub fn new(fck_mpa: u32) -> Self {
        Self {
            fck_mpa,
            label: format!("FCK {fck_mpa} MPa"),
        }
    }
}

// ═══════════════════════════════════════════
// Environment (a named room with optional measures)
// ═══════════════════════════════════════════

/// A named room, optionally with its area and `(width, length)` in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<(f64, f64)>,
}

impl Environment {
    /// Room name only. The name is trimmed, upper-cased and has inner
    /// whitespace collapsed.
    pub fn named(name: &str) -> Self {
        Self {
            name: canonical_name(name),
            area: None,
            dimensions: None,
        }
    }

    /// Room with measured dimensions; area is derived as width × length.
    pub fn measured(name: &str, width: f64, length: f64) -> Self {
        Self {
            name: canonical_name(name),
            area: Some(round2(width * length)),
            dimensions: Some((width, length)),
        }
    }
}

/// Upper-case, trim, collapse whitespace.
pub fn canonical_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ═══════════════════════════════════════════
// OCR regions
// ═══════════════════════════════════════════

/// Bounding box of a recognized text region, in image pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A recognized text region, in the order the OCR provider produced it.
/// Reading order, not guaranteed to be spatially sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub text: String,
    #[serde(default)]
    pub bbox: BoundingBox,
}

impl TextRegion {
    pub fn new(text: &str, bbox: BoundingBox) -> Self {
        Self {
            text: text.to_string(),
            bbox,
        }
    }
}

// ═══════════════════════════════════════════
// Extracted record
// ═══════════════════════════════════════════

/// Names of the field groups a record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    AreasM2,
    Dimensions,
    Environments,
    RoomMeasurements,
    ConcreteStrength,
}

impl FieldKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AreasM2 => "areas_m2",
            Self::Dimensions => "dimensions",
            Self::Environments => "environments",
            Self::RoomMeasurements => "room_measurements",
            Self::ConcreteStrength => "concrete_strength",
        }
    }
}

/// Typed payload of one field group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldGroup {
    /// Every `<n> m²` occurrence, in document order.
    Areas(Vec<Decimal>),
    /// Every `<w> x <l>` occurrence, normalized to meters.
    Dimensions(Vec<Dimension>),
    /// Distinct canonical room names.
    RoomNames(BTreeSet<String>),
    /// Rooms bound to nearby area / dimension values.
    RoomMeasurements(Vec<Environment>),
    ConcreteStrength(ConcreteStrength),
}

impl FieldGroup {
    pub fn key(&self) -> FieldKey {
        match self {
            Self::Areas(_) => FieldKey::AreasM2,
            Self::Dimensions(_) => FieldKey::Dimensions,
            Self::RoomNames(_) => FieldKey::Environments,
            Self::RoomMeasurements(_) => FieldKey::RoomMeasurements,
            Self::ConcreteStrength(_) => FieldKey::ConcreteStrength,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Areas(v) => v.is_empty(),
            Self::Dimensions(v) => v.is_empty(),
            Self::RoomNames(v) => v.is_empty(),
            Self::RoomMeasurements(v) => v.is_empty(),
            Self::ConcreteStrength(_) => false,
        }
    }
}

/// Field groups found in a document. A group with no instances is never
/// stored, so consumers test key presence rather than emptiness.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RelevantInfo {
    groups: BTreeMap<FieldKey, FieldGroup>,
}

impl RelevantInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a group under its own key. Empty groups are dropped.
    pub fn insert(&mut self, group: FieldGroup) {
        if group.is_empty() {
            return;
        }
        self.groups.insert(group.key(), group);
    }

    pub fn contains(&self, key: FieldKey) -> bool {
        self.groups.contains_key(&key)
    }

    pub fn get(&self, key: FieldKey) -> Option<&FieldGroup> {
        self.groups.get(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.groups.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn areas(&self) -> Option<&[Decimal]> {
        match self.groups.get(&FieldKey::AreasM2) {
            Some(FieldGroup::Areas(v)) => Some(v),
            _ => None,
        }
    }

    pub fn dimensions(&self) -> Option<&[Dimension]> {
        match self.groups.get(&FieldKey::Dimensions) {
            Some(FieldGroup::Dimensions(v)) => Some(v),
            _ => None,
        }
    }

    pub fn room_names(&self) -> Option<&BTreeSet<String>> {
        match self.groups.get(&FieldKey::Environments) {
            Some(FieldGroup::RoomNames(v)) => Some(v),
            _ => None,
        }
    }

    pub fn room_measurements(&self) -> Option<&[Environment]> {
        match self.groups.get(&FieldKey::RoomMeasurements) {
            Some(FieldGroup::RoomMeasurements(v)) => Some(v),
            _ => None,
        }
    }

    pub fn concrete_strength(&self) -> Option<&ConcreteStrength> {
        match self.groups.get(&FieldKey::ConcreteStrength) {
            Some(FieldGroup::ConcreteStrength(v)) => Some(v),
            _ => None,
        }
    }
}

/// Floor / pavement marker, e.g. "PAVIMENTO 2" or "TÉRREO".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorMarker {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
}

/// Expensive extras, only computed when the caller asks for detailed mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedInfo {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cm_measurements: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub floor_markers: Vec<FloorMarker>,
    pub original_text: String,
}

impl DetailedInfo {
    /// Distinct floors named in the document.
    pub fn floor_count(&self) -> usize {
        self.floor_markers
            .iter()
            .map(|m| (m.label.as_str(), m.number))
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// Structured data extracted from one plan document.
///
/// Built once by the extractor and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedRecord {
    plan_type: PlanType,
    purpose: String,
    essential_functions: Vec<String>,
    relevant_info: RelevantInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    detailed_info: Option<DetailedInfo>,
    /// True when region correlation fell back to placeholder rooms.
    /// Placeholder rooms are never stored in `relevant_info`.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    degraded: bool,
}

impl ExtractedRecord {
    pub(crate) fn new(
        profile: &PlanProfile,
        relevant_info: RelevantInfo,
        detailed_info: Option<DetailedInfo>,
        degraded: bool,
    ) -> Self {
        Self {
            plan_type: profile.plan_type,
            purpose: profile.purpose.to_string(),
            essential_functions: profile
                .essential_functions
                .iter()
                .map(|f| f.to_string())
                .collect(),
            relevant_info,
            detailed_info,
            degraded,
        }
    }

    pub fn plan_type(&self) -> PlanType {
        self.plan_type
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    pub fn essential_functions(&self) -> &[String] {
        &self.essential_functions
    }

    pub fn relevant_info(&self) -> &RelevantInfo {
        &self.relevant_info
    }

    pub fn detailed_info(&self) -> Option<&DetailedInfo> {
        self.detailed_info.as_ref()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

// ═══════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════

/// Tunables for classification and entity extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorSettings {
    /// Characters searched on each side of a room name when binding values.
    pub proximity_window: usize,
    /// Distinct keyword hits needed to assign a plan type.
    pub keyword_threshold: usize,
    /// Dimension values above this are read as centimeters.
    pub cm_to_m_threshold: f64,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            proximity_window: 100,
            keyword_threshold: 2,
            cm_to_m_threshold: 100.0,
        }
    }
}

/// Tunables for region correlation and its fallback ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorSettings {
    /// Regions after a room label searched for its dimension.
    pub lookahead: usize,
    /// Maximum lines scanned in the coarse full-page pass.
    pub coarse_pass_line_cap: usize,
    /// Emit illustrative rooms when nothing was measured.
    pub allow_placeholder: bool,
}

impl Default for CorrelatorSettings {
    fn default() -> Self {
        Self {
            lookahead: 2,
            coarse_pass_line_cap: 2000,
            allow_placeholder: true,
        }
    }
}
