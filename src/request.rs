use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Instrument, debug, warn};
use ulid::Ulid;

use crate::engine::{OverlapEngine, ValidationError};
use crate::limits::*;
use crate::model::*;
use crate::observability;
use crate::store::{Store, StoreError};

// ── Request parsing ──────────────────────────────────────────────

/// Body as it arrives; both fields stay loose until validated.
#[derive(Debug, Default, Deserialize)]
struct RawRequest {
    #[serde(default)]
    room_id: Option<Value>,
    #[serde(default)]
    slot_minutes: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapRequest {
    pub room_id: String,
    pub slot_minutes: i64,
}

impl OverlapRequest {
    /// Parse and validate one request body.
    ///
    /// A body that is not a JSON object is read as `{}`, so it fails on the
    /// missing `room_id` rather than on syntax.
    pub fn parse(body: &str) -> Result<Self, ValidationError> {
        let raw: RawRequest = match serde_json::from_str::<Value>(body) {
            Ok(object @ Value::Object(_)) => serde_json::from_value(object).unwrap_or_default(),
            _ => RawRequest::default(),
        };

        let room_id = match raw.room_id {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        if room_id.is_empty() {
            return Err(ValidationError::MissingRoomId);
        }

        let slot_minutes = match raw.slot_minutes {
            None | Some(Value::Null) => DEFAULT_SLOT_MINUTES,
            Some(v) => slot_minutes_from(&v).ok_or(ValidationError::InvalidSlotMinutes)?,
        };
        if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&slot_minutes) {
            return Err(ValidationError::InvalidSlotMinutes);
        }

        Ok(Self {
            room_id,
            slot_minutes,
        })
    }

    pub fn slot_width_ms(&self) -> Ms {
        self.slot_minutes * MINUTE_MS
    }
}

/// Whole numbers only: `30`, `30.0` and `"30"` are fine, `30.5` is not.
fn slot_minutes_from(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ── Errors ───────────────────────────────────────────────────────

#[derive(Debug)]
pub enum RequestError {
    Validation(ValidationError),
    Store(StoreError),
    StoreTimeout(Duration),
}

impl RequestError {
    /// HTTP-style status for the response line.
    pub fn status(&self) -> u16 {
        match self {
            RequestError::Validation(_) => 400,
            RequestError::Store(_) => 500,
            RequestError::StoreTimeout(_) => 504,
        }
    }
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::Validation(e) => write!(f, "{e}"),
            RequestError::Store(e) => write!(f, "{e}"),
            RequestError::StoreTimeout(after) => {
                write!(f, "store fetch timed out after {}ms", after.as_millis())
            }
        }
    }
}

impl std::error::Error for RequestError {}

impl From<ValidationError> for RequestError {
    fn from(e: ValidationError) -> Self {
        RequestError::Validation(e)
    }
}

impl From<StoreError> for RequestError {
    fn from(e: StoreError) -> Self {
        RequestError::Store(e)
    }
}

// ── Responses ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub all_day_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Overlap {
        data: Vec<RankedSlot>,
        meta: ReportMeta,
    },
    Error {
        error: String,
    },
}

/// One response line: `{"request_id", "status", ...body}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub request_id: Ulid,
    pub status: u16,
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl Response {
    pub fn ok(request_id: Ulid, report: OverlapReport) -> Self {
        Self {
            request_id,
            status: 200,
            body: ResponseBody::Overlap {
                data: report.slots,
                meta: ReportMeta {
                    all_day_count: report.all_day_count,
                },
            },
        }
    }

    pub fn error(request_id: Ulid, status: u16, message: impl Into<String>) -> Self {
        Self {
            request_id,
            status,
            body: ResponseBody::Error {
                error: message.into(),
            },
        }
    }

    /// Encode as a single JSON line. A report that cannot be rendered becomes a
    /// 500 line instead.
    pub fn to_line(&self) -> String {
        match serde_json::to_string(self) {
            Ok(line) => line,
            Err(e) => {
                warn!(request_id = %self.request_id, "response encoding failed: {e}");
                serde_json::json!({
                    "request_id": self.request_id.to_string(),
                    "status": 500,
                    "error": format!("response encoding failed: {e}"),
                })
                .to_string()
            }
        }
    }
}

// ── Service ──────────────────────────────────────────────────────

/// Validates requests, fetches rows under a deadline and runs the engine.
pub struct OverlapService {
    store: Arc<dyn Store>,
    engine: OverlapEngine,
    fetch_timeout: Duration,
}

impl OverlapService {
    pub fn new(store: Arc<dyn Store>, engine: OverlapEngine, fetch_timeout: Duration) -> Self {
        Self {
            store,
            engine,
            fetch_timeout,
        }
    }

    /// Handle one request body end to end. Never fails: errors become
    /// error responses.
    pub async fn handle(&self, body: &str) -> Response {
        let request_id = Ulid::new();
        let span = tracing::info_span!(
            "overlap_request",
            %request_id,
            room_id = tracing::field::Empty
        );

        async move {
            let started = Instant::now();
            let response = match self.run(body).await {
                Ok(report) => {
                    debug!(
                        slots = report.slots.len(),
                        all_day = report.all_day_count,
                        "overlap computed"
                    );
                    metrics::histogram!(observability::SLOTS_EMITTED)
                        .record(report.slots.len() as f64);
                    Response::ok(request_id, report)
                }
                Err(e) => {
                    match &e {
                        RequestError::Validation(_) => debug!("rejected: {e}"),
                        _ => warn!("failed: {e}"),
                    }
                    Response::error(request_id, e.status(), e.to_string())
                }
            };
            metrics::counter!(
                observability::REQUESTS_TOTAL,
                "status" => observability::status_label(response.status)
            )
            .increment(1);
            metrics::histogram!(observability::REQUEST_DURATION_SECONDS)
                .record(started.elapsed().as_secs_f64());
            response
        }
        .instrument(span)
        .await
    }

    pub async fn run(&self, body: &str) -> Result<OverlapReport, RequestError> {
        let request = OverlapRequest::parse(body)?;
        tracing::Span::current().record("room_id", request.room_id.as_str());

        let rows = tokio::time::timeout(
            self.fetch_timeout,
            self.store.fetch_intervals(&request.room_id),
        )
        .await
        .map_err(|_| RequestError::StoreTimeout(self.fetch_timeout))??;

        Ok(self.engine.compute(&rows, request.slot_width_ms())?)
    }
}
