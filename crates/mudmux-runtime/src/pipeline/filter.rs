//! Per-recipient delivery filtering for client-bound lines.

use crate::net::ClientHandle;
use mudmux_record::LineRecord;
use mudmux_types::{ClientTarget, TextOrigin};

/// Decides whether a line reaches a client.
///
/// Returns `None` to deliver, or the drop reason recorded in the
/// line's update log. Rules, in order:
///
/// 1. The target addressing excludes the client.
/// 2. Internal lines never reach view-only clients.
/// 3. Clients that have not logged in only receive `prelogin` lines.
#[must_use]
pub fn filter_reason(
    line: &LineRecord,
    client: &ClientHandle,
    target: &ClientTarget,
) -> Option<&'static str> {
    if !target.includes(client.id) {
        return Some("recipient excluded by target");
    }
    if line.origin() == TextOrigin::Internal && client.view_only {
        return Some("internal line, view-only recipient");
    }
    if !client.logged_in && !line.prelogin() {
        return Some("recipient not logged in");
    }
    None
}
