//! Pointer and touch input events.
//!
//! Positions are client-space logical pixels, the same space platform
//! bounding-box queries report in. Recordings are stored as JSONL, one
//! event per line, with `#`-prefixed lines treated as comments.

use serde::{Deserialize, Serialize};

use crate::geometry::Vec2;

/// Monotonic timestamp in milliseconds since the recording started.
pub type TimestampMs = u64;

/// Platform identifier of a pointer or touch contact.
pub type PointerId = u32;

/// A single input event with timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    #[serde(rename = "t", default)]
    pub timestamp_ms: TimestampMs,

    #[serde(flatten)]
    pub kind: EventKind,
}

/// Discriminated union of input sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Mouse or pen pointer.
    Mouse {
        #[serde(default)]
        pointer_id: PointerId,
        phase: PointerPhase,
        x: f64,
        y: f64,
    },

    /// Touch input. `touches` lists the contacts still active after this
    /// event, in the order the platform reports them; the first entry is
    /// the primary contact. On `up`/`cancel` the released contact is gone
    /// from the list.
    Touch {
        phase: PointerPhase,
        #[serde(default)]
        touches: Vec<TouchPoint>,
    },

    /// The pointer left the window while not captured.
    Leave {
        #[serde(default)]
        pointer_id: PointerId,
    },
}

/// One touch contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub id: PointerId,
    pub x: f64,
    pub y: f64,
}

impl TouchPoint {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Lifecycle phase of a pointer interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

impl InputEvent {
    /// Create a mouse event for the primary pointer.
    pub fn mouse(timestamp_ms: TimestampMs, phase: PointerPhase, x: f64, y: f64) -> Self {
        Self {
            timestamp_ms,
            kind: EventKind::Mouse {
                pointer_id: 0,
                phase,
                x,
                y,
            },
        }
    }

    /// Create a touch event.
    pub fn touch(timestamp_ms: TimestampMs, phase: PointerPhase, touches: Vec<TouchPoint>) -> Self {
        Self {
            timestamp_ms,
            kind: EventKind::Touch { phase, touches },
        }
    }

    /// Create a pointer-leave event for the primary pointer.
    pub fn leave(timestamp_ms: TimestampMs) -> Self {
        Self {
            timestamp_ms,
            kind: EventKind::Leave { pointer_id: 0 },
        }
    }

    /// Phase of this event; a leave counts as a cancel.
    pub fn phase(&self) -> PointerPhase {
        match &self.kind {
            EventKind::Mouse { phase, .. } | EventKind::Touch { phase, .. } => *phase,
            EventKind::Leave { .. } => PointerPhase::Cancel,
        }
    }
}

/// Errors from parsing an event recording.
#[derive(Debug, thiserror::Error)]
#[error("line {line}: {source}")]
pub struct EventParseError {
    pub line: usize,
    #[source]
    pub source: serde_json::Error,
}

/// Parse events from JSONL content (one JSON object per line).
pub fn parse_events(jsonl: &str) -> Result<Vec<InputEvent>, EventParseError> {
    jsonl
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, content)| {
            serde_json::from_str(content).map_err(|source| EventParseError { line, source })
        })
        .collect()
}

/// Serialize events to JSONL format.
pub fn serialize_events(events: &[InputEvent]) -> Result<String, serde_json::Error> {
    let mut output = String::new();
    for event in events {
        output.push_str(&serde_json::to_string(event)?);
        output.push('\n');
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_format() {
        let event = InputEvent::mouse(12, PointerPhase::Down, 40.0, 41.5);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"t\":12"));
        assert!(json.contains("\"type\":\"mouse\""));
        assert!(json.contains("\"phase\":\"down\""));
        assert!(json.contains("\"x\":40.0"));
    }

    #[test]
    fn test_parse_touch_without_id_defaults() {
        let jsonl = "# recorded on a tablet\n\
            {\"t\":0,\"type\":\"touch\",\"phase\":\"down\",\"touches\":[{\"id\":3,\"x\":10,\"y\":12}]}\n\
            \n\
            {\"t\":9,\"type\":\"touch\",\"phase\":\"up\"}\n\
            {\"type\":\"leave\"}\n";
        let events = parse_events(jsonl).unwrap();
        assert_eq!(events.len(), 3);
        match &events[0].kind {
            EventKind::Touch { phase, touches } => {
                assert_eq!(*phase, PointerPhase::Down);
                assert_eq!(touches[0].id, 3);
                assert_eq!(touches[0].position(), Vec2::new(10.0, 12.0));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(&events[1].kind, EventKind::Touch { touches, .. } if touches.is_empty()));
        assert_eq!(events[2].timestamp_ms, 0);
        assert_eq!(events[2].phase(), PointerPhase::Cancel);
    }

    #[test]
    fn test_parse_reports_line_number() {
        let jsonl = "{\"t\":0,\"type\":\"mouse\",\"phase\":\"down\",\"x\":1,\"y\":1}\n\
            {\"t\":1,\"type\":\"mouse\",\"phase\":\"hover\",\"x\":1,\"y\":1}\n";
        let err = parse_events(jsonl).unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_jsonl_roundtrip() {
        let events = vec![
            InputEvent::mouse(0, PointerPhase::Down, 5.0, 5.0),
            InputEvent::touch(
                4,
                PointerPhase::Move,
                vec![TouchPoint {
                    id: 1,
                    x: 6.0,
                    y: 7.0,
                }],
            ),
            InputEvent::leave(8),
        ];
        let jsonl = serialize_events(&events).unwrap();
        assert_eq!(parse_events(&jsonl).unwrap(), events);
    }
}
