use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Unix milliseconds — the only time type.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 60 * MINUTE_MS;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One participant's declared free window, exactly as the store hands it over.
///
/// Bounds stay as text until the engine looks at them: a row whose bounds do
/// not parse is dropped there, not rejected here. A missing, null or
/// non-text bound decodes as an empty string for the same reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityInterval {
    pub room_id: String,
    pub participant_id: String,
    #[serde(default, deserialize_with = "deserialize_bound")]
    pub start_at: String,
    #[serde(default, deserialize_with = "deserialize_bound")]
    pub end_at: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBound {
    Text(String),
    Other(serde::de::IgnoredAny),
}

fn deserialize_bound<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match RawBound::deserialize(deserializer)? {
        RawBound::Text(text) => text,
        RawBound::Other(_) => String::new(),
    })
}

impl AvailabilityInterval {
    pub fn new(
        room_id: impl Into<String>,
        participant_id: impl Into<String>,
        start_at: impl Into<String>,
        end_at: impl Into<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            participant_id: participant_id.into(),
            start_at: start_at.into(),
            end_at: end_at.into(),
        }
    }

    /// Build a row from instants. Instants chrono cannot represent become
    /// empty strings, which the engine treats as unparseable.
    pub fn from_ms(
        room_id: impl Into<String>,
        participant_id: impl Into<String>,
        start: Ms,
        end: Ms,
    ) -> Self {
        Self::new(
            room_id,
            participant_id,
            format_instant(start).unwrap_or_default(),
            format_instant(end).unwrap_or_default(),
        )
    }

    /// The parsed window, or `None` if either bound is unparseable or
    /// `end <= start`.
    pub fn span(&self) -> Option<Span> {
        let start = parse_instant(&self.start_at)?;
        let end = parse_instant(&self.end_at)?;
        (end > start).then(|| Span::new(start, end))
    }
}

/// Parse a timestamp into Unix milliseconds.
///
/// Accepts RFC 3339, PostgreSQL `timestamptz` text (`2025-03-01 09:00:00+00`),
/// and offset-less date-times or bare dates, which are read as UTC.
pub fn parse_instant(raw: &str) -> Option<Ms> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.timestamp_millis());
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Render an instant as ISO-8601 UTC with millisecond precision,
/// e.g. `2025-03-01T09:00:00.000Z`.
pub fn format_instant(ms: Ms) -> Option<String> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn serialize_instant<S: Serializer>(ms: &Ms, serializer: S) -> Result<S::Ok, S::Error> {
    match format_instant(*ms) {
        Some(text) => serializer.serialize_str(&text),
        None => Err(serde::ser::Error::custom(format!(
            "instant {ms} out of representable range"
        ))),
    }
}

fn deserialize_instant<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Ms, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_instant(&text)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid instant: {text}")))
}

// ── Engine output ────────────────────────────────────────────────

/// One occupied slot with the number of distinct participants free in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedSlot {
    #[serde(serialize_with = "serialize_instant", deserialize_with = "deserialize_instant")]
    pub slot_start: Ms,
    #[serde(serialize_with = "serialize_instant", deserialize_with = "deserialize_instant")]
    pub slot_end: Ms,
    pub participant_count: usize,
}

impl RankedSlot {
    pub fn span(&self) -> Span {
        Span::new(self.slot_start, self.slot_end)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlapReport {
    /// Best overlap first, earliest among equals.
    pub slots: Vec<RankedSlot>,
    /// Distinct participants holding at least one all-day interval.
    pub all_day_count: usize,
}
