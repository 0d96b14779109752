// Frames of an OpenAI-style chat-completion stream. Only `choices[].delta.content`
// is declared, everything else (`id`, `created`, `index`, `finish_reason`, ...) is
// skipped whatever its type.
use bytes::Bytes;
use log::error;
use serde::Deserialize;

use super::FrameParseError;

pub const MARKER: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Frame {
    pub choices: Option<Vec<Choice>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Choice {
    pub delta: Option<Delta>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Delta {
    pub content: Option<String>,
}

impl Frame {
    /// Non-empty content fragments, in choice order
    pub fn contents(&self) -> impl Iterator<Item = &str> {
        self.choices
            .iter()
            .flatten()
            .filter_map(|choice| choice.delta.as_ref()?.content.as_deref())
            .filter(|content| !content.is_empty())
    }
}

/// Result of decoding a complete response body
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    /// one entry per segment that could not be parsed
    pub failures: Vec<FrameParseError>,
}

enum Segment {
    Skip,
    Done,
    Frame(Frame),
    Failed(FrameParseError),
}

fn parse_segment(segment: &str) -> Segment {
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        return Segment::Skip;
    }
    if trimmed == DONE_SENTINEL {
        return Segment::Done;
    }

    match serde_json::from_str::<Frame>(trimmed) {
        Ok(frame) => Segment::Frame(frame),
        Err(e) => {
            let failure = FrameParseError {
                segment: trimmed.to_string(),
                message: e.to_string(),
            };
            error!("{failure}");
            Segment::Failed(failure)
        }
    }
}

/// Accumulates the content of every well-formed frame in `body`.
///
/// Malformed frames are logged and collected in [`Decoded::failures`], they never
/// stop the remaining frames from being processed.
pub fn decode(body: &str) -> Decoded {
    let mut decoded = Decoded::default();

    for segment in body.split(MARKER).filter(|s| !s.is_empty()) {
        match parse_segment(segment) {
            Segment::Skip | Segment::Done => {}
            Segment::Frame(frame) => decoded.text.extend(frame.contents()),
            Segment::Failed(failure) => decoded.failures.push(failure),
        }
    }

    decoded
}

#[derive(Debug, PartialEq, Eq)]
pub enum FrameEvent {
    Text(String),
    Done,
    Failed(FrameParseError),
}

/// Incremental counterpart of [`decode`] for bodies that arrive in chunks.
///
/// A segment is only complete once the next marker has been seen, so the last
/// one is held back until [`Parser::finish`].
#[derive(Default)]
pub struct Parser {
    bytes: Vec<u8>,
}

impl Parser {
    /// Feed a chunk into the parser, returning events for all complete segments
    pub fn process(&mut self, chunk: Bytes) -> Vec<FrameEvent> {
        self.bytes.extend_from_slice(&chunk);
        let mut events = vec![];

        let mut consumed = 0;
        while let Some(pos) = find_marker(&self.bytes[consumed..]) {
            let segment = &self.bytes[consumed..consumed + pos];
            Self::push_events(segment, &mut events);
            consumed += pos + MARKER.len();
        }
        self.bytes.drain(..consumed);

        events
    }

    /// Parse whatever is left in the buffer as the final segment
    pub fn finish(&mut self) -> Vec<FrameEvent> {
        let mut events = vec![];
        let remaining = std::mem::take(&mut self.bytes);
        Self::push_events(&remaining, &mut events);
        events
    }

    fn push_events(segment: &[u8], events: &mut Vec<FrameEvent>) {
        if segment.is_empty() {
            return;
        }

        let text = match std::str::from_utf8(segment) {
            Ok(text) => text,
            Err(e) => {
                let failure = FrameParseError {
                    segment: String::from_utf8_lossy(segment).trim().to_string(),
                    message: e.to_string(),
                };
                error!("{failure}");
                events.push(FrameEvent::Failed(failure));
                return;
            }
        };

        match parse_segment(text) {
            Segment::Skip => {}
            Segment::Done => events.push(FrameEvent::Done),
            Segment::Frame(frame) => {
                events.extend(frame.contents().map(|c| FrameEvent::Text(c.to_string())))
            }
            Segment::Failed(failure) => events.push(FrameEvent::Failed(failure)),
        }
    }
}

fn find_marker(buf: &[u8]) -> Option<usize> {
    buf.windows(MARKER.len())
        .position(|w| w == MARKER.as_bytes())
}
