//! Origin and kind classification for pipeline lines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a line of text was born.
///
/// The origin is fixed at record creation and never changes. Pipeline
/// stages select lines by origin (a mud→client stage only modifies
/// `Mud` lines), and the client filter drops `Internal` lines for
/// view-only clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextOrigin {
    /// Received from the upstream mud socket.
    Mud,
    /// Received from a downstream client socket.
    Client,
    /// Synthesized by the proxy or a plugin.
    Internal,
}

impl fmt::Display for TextOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mud => "mud",
            Self::Client => "client",
            Self::Internal => "internal",
        })
    }
}

/// What kind of payload a line carries.
///
/// Telnet option-negotiation frames flow through the pipeline as
/// opaque [`TelnetCommand`](Self::TelnetCommand) lines: they skip
/// modification events and are written to the target socket verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// Normal text.
    Io,
    /// An IAC option-negotiation frame, carried through unmodified.
    TelnetCommand,
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Io => "io",
            Self::TelnetCommand => "telnet-command",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_display() {
        assert_eq!(TextOrigin::Mud.to_string(), "mud");
        assert_eq!(TextOrigin::Internal.to_string(), "internal");
    }

    #[test]
    fn kind_serde_names() {
        assert_eq!(
            serde_json::to_string(&LineKind::TelnetCommand).unwrap(),
            "\"telnet_command\""
        );
    }
}
