use crate::limits::{MAX_SLOT_MINUTES, MIN_SLOT_MINUTES};
use crate::model::Ms;

/// Caller-side mistakes. Malformed interval rows never end up here; the
/// engine drops those silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingRoomId,
    InvalidSlotMinutes,
    NonPositiveSlotWidth(Ms),
    SlotWidthOutOfRange { width_ms: Ms, min_ms: Ms, max_ms: Ms },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingRoomId => write!(f, "room_id is required"),
            ValidationError::InvalidSlotMinutes => write!(
                f,
                "slot_minutes must be a number between {MIN_SLOT_MINUTES} and {MAX_SLOT_MINUTES}"
            ),
            ValidationError::NonPositiveSlotWidth(width) => {
                write!(f, "slot width must be positive, got {width}ms")
            }
            ValidationError::SlotWidthOutOfRange {
                width_ms,
                min_ms,
                max_ms,
            } => write!(
                f,
                "slot width {width_ms}ms outside accepted range [{min_ms}, {max_ms}]ms"
            ),
        }
    }
}

impl std::error::Error for ValidationError {}
