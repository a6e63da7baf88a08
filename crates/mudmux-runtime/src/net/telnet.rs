//! Telnet line framing.
//!
//! The shims split raw socket bytes into three frame kinds: complete
//! text lines (CRLF delimited, bare LF tolerated), prompts (text
//! flushed by IAC GA / IAC EOR without a line ending), and opaque IAC
//! command sequences. Option negotiation itself is external - command
//! frames pass through the pipeline unmodified.

/// Interpret As Command.
pub const IAC: u8 = 255;
/// Option negotiation verbs.
pub const WILL: u8 = 251;
/// See [`WILL`].
pub const WONT: u8 = 252;
/// See [`WILL`].
pub const DO: u8 = 253;
/// See [`WILL`].
pub const DONT: u8 = 254;
/// Subnegotiation begin.
pub const SB: u8 = 250;
/// Subnegotiation end.
pub const SE: u8 = 240;
/// Go ahead - ends a prompt.
pub const GA: u8 = 249;
/// End of record - ends a prompt (RFC 885, used by muds).
pub const EOR: u8 = 239;

/// One parsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetFrame {
    /// A complete text line, endings stripped.
    Line(String),
    /// Prompt text flushed by GA/EOR, no line ending.
    Prompt(String),
    /// An opaque IAC sequence, bytes preserved.
    Command(Vec<u8>),
}

/// Incremental frame splitter; owns the partial-data buffer between
/// socket reads.
#[derive(Debug, Default)]
pub struct LineFramer {
    text: Vec<u8>,
    pending: Vec<u8>,
}

impl LineFramer {
    /// Creates an empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds bytes, returning every complete frame.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<TelnetFrame> {
        self.pending.extend_from_slice(bytes);
        let mut frames = Vec::new();
        let mut i = 0;

        while i < self.pending.len() {
            let b = self.pending[i];
            if b == IAC {
                match self.parse_iac(i) {
                    IacParse::Escape => {
                        self.text.push(IAC);
                        i += 2;
                    }
                    IacParse::Frame(len, prompt) => {
                        if prompt {
                            if !self.text.is_empty() {
                                frames.push(TelnetFrame::Prompt(take_text(&mut self.text)));
                            }
                        } else {
                            frames.push(TelnetFrame::Command(
                                self.pending[i..i + len].to_vec(),
                            ));
                        }
                        i += len;
                    }
                    IacParse::Incomplete => break,
                }
                continue;
            }
            if b == b'\n' {
                frames.push(TelnetFrame::Line(take_text(&mut self.text)));
                i += 1;
                continue;
            }
            if b != b'\r' {
                self.text.push(b);
            }
            i += 1;
        }

        self.pending.drain(..i);
        frames
    }

    /// Flushes buffered text as a final line (connection close).
    pub fn finish(&mut self) -> Option<TelnetFrame> {
        if self.text.is_empty() {
            None
        } else {
            Some(TelnetFrame::Line(take_text(&mut self.text)))
        }
    }

    fn parse_iac(&self, at: usize) -> IacParse {
        let rest = &self.pending[at..];
        let Some(&verb) = rest.get(1) else {
            return IacParse::Incomplete;
        };
        match verb {
            IAC => IacParse::Escape,
            GA | EOR => IacParse::Frame(2, true),
            WILL | WONT | DO | DONT => {
                if rest.len() >= 3 {
                    IacParse::Frame(3, false)
                } else {
                    IacParse::Incomplete
                }
            }
            SB => {
                // Scan for IAC SE.
                let mut j = 2;
                while j + 1 < rest.len() {
                    if rest[j] == IAC && rest[j + 1] == SE {
                        return IacParse::Frame(j + 2, false);
                    }
                    j += 1;
                }
                IacParse::Incomplete
            }
            _ => IacParse::Frame(2, false),
        }
    }
}

enum IacParse {
    /// IAC IAC - a literal 0xFF data byte.
    Escape,
    /// A complete sequence of the given length; `true` = prompt flush.
    Frame(usize, bool),
    /// Need more bytes.
    Incomplete,
}

fn take_text(buf: &mut Vec<u8>) -> String {
    String::from_utf8_lossy(&std::mem::take(buf)).into_owned()
}
