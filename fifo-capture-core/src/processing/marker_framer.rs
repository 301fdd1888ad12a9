use crate::models::config::FrameMarkers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Seeking,
    InFrame,
    Complete,
}

/// Result of feeding one chunk through a [`MarkerFramer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framed<'a> {
    /// The start marker was found in this chunk; emit `markers.start` before `body`.
    pub start_marker: bool,
    /// Frame bytes from this chunk, excluding a start marker found here.
    pub body: &'a [u8],
    /// The end marker was found; `body` ends with it and nothing follows.
    pub complete: bool,
}

/// Cuts one marker-delimited frame out of a raw byte stream.
///
/// Bytes before the start marker are discarded, the stream ends right after
/// the end marker. Markers may straddle chunk boundaries.
#[derive(Debug, Clone)]
pub struct MarkerFramer {
    markers: FrameMarkers,
    state: FrameState,
    prev: Option<u8>,
}

impl MarkerFramer {
    pub fn new(markers: FrameMarkers) -> Self {
        Self {
            markers,
            state: FrameState::Seeking,
            prev: None,
        }
    }

    pub fn markers(&self) -> FrameMarkers {
        self.markers
    }

    pub fn is_complete(&self) -> bool {
        self.state == FrameState::Complete
    }

    /// The start marker has been seen.
    pub fn in_frame(&self) -> bool {
        self.state != FrameState::Seeking
    }

    pub fn feed<'a>(&mut self, input: &'a [u8]) -> Framed<'a> {
        let mut framed = Framed {
            start_marker: false,
            body: &input[..0],
            complete: self.is_complete(),
        };
        if framed.complete {
            return framed;
        }

        let mut idx = 0;
        let mut begin = 0;
        if self.state == FrameState::Seeking {
            let start = self.markers.start;
            while idx < input.len() {
                let byte = input[idx];
                let prev = self.prev.replace(byte);
                idx += 1;
                if prev == Some(start[0]) && byte == start[1] {
                    self.state = FrameState::InFrame;
                    framed.start_marker = true;
                    begin = idx;
                    break;
                }
            }
            if self.state == FrameState::Seeking {
                return framed;
            }
        }

        let end = self.markers.end;
        while idx < input.len() {
            let byte = input[idx];
            let prev = self.prev.replace(byte);
            idx += 1;
            if prev == Some(end[0]) && byte == end[1] {
                self.state = FrameState::Complete;
                framed.body = &input[begin..idx];
                framed.complete = true;
                return framed;
            }
        }

        framed.body = &input[begin..];
        framed
    }
}
