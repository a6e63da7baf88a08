//! The line record - one line of network data and its audit trail.

use crate::update::{UpdateAction, UpdateContext, UpdateEntry};
use crate::RecordError;
use mudmux_types::{color, LineKind, RecordId, TextOrigin};
use parking_lot::Mutex;
use std::sync::Arc;

/// A line record shared between the pipeline, the event bus, and
/// plugin callbacks.
///
/// The mutex is uncontended by construction - all access happens on
/// the dispatcher task - and exists so records stay `Send` across the
/// dispatcher's await points.
pub type SharedLine = Arc<Mutex<LineRecord>>;

/// One line of network data.
///
/// The payload is mutable until [`lock`](Self::lock); the original
/// text and origin are frozen at creation. Every change appends to
/// the update log.
///
/// # Example
///
/// ```
/// use mudmux_record::{LineRecord, UpdateContext};
/// use mudmux_types::TextOrigin;
///
/// let ctx = UpdateContext::new("plugins.test");
/// let mut line = LineRecord::from_mud("You are hungry.\r\n");
/// line.set_text("You are starving.", &ctx).unwrap();
///
/// line.lock(&ctx);
/// assert!(line.set_text("too late", &ctx).is_err());
/// assert_eq!(line.text(), "You are starving.");
/// assert_eq!(line.original(), "You are hungry.");
/// ```
#[derive(Debug, Clone)]
pub struct LineRecord {
    id: RecordId,
    text: String,
    original: String,
    origin: TextOrigin,
    kind: LineKind,
    /// Raw frame bytes, present only for telnet-command lines.
    raw: Option<Vec<u8>>,

    send: bool,
    is_prompt: bool,
    preamble: bool,
    prelogin: bool,
    had_line_endings: bool,
    color: Option<String>,
    was_sent: bool,

    locked: bool,
    updates: Vec<UpdateEntry>,
}

impl LineRecord {
    /// Creates a record, stripping trailing line endings from the
    /// payload and remembering whether any were present.
    #[must_use]
    pub fn new(text: impl Into<String>, origin: TextOrigin, kind: LineKind) -> Self {
        let raw_text: String = text.into();
        let stripped = raw_text.trim_end_matches(['\r', '\n']);
        let had_line_endings = stripped.len() != raw_text.len();

        let mut record = Self {
            id: RecordId::new(),
            text: stripped.to_string(),
            original: stripped.to_string(),
            origin,
            kind,
            raw: None,
            send: true,
            is_prompt: false,
            preamble: origin == TextOrigin::Internal,
            prelogin: false,
            had_line_endings,
            color: None,
            was_sent: false,
            locked: false,
            updates: Vec::new(),
        };
        record.updates.push(UpdateEntry::new(
            UpdateAction::Create,
            format!("origin={origin} kind={kind}"),
            &UpdateContext::system("record"),
        ));
        record
    }

    /// A normal text line received from the mud.
    #[must_use]
    pub fn from_mud(text: impl Into<String>) -> Self {
        Self::new(text, TextOrigin::Mud, LineKind::Io)
    }

    /// A normal text line received from a client.
    #[must_use]
    pub fn from_client(text: impl Into<String>) -> Self {
        Self::new(text, TextOrigin::Client, LineKind::Io)
    }

    /// A proxy-generated line; carries the preamble flag by default.
    #[must_use]
    pub fn internal(text: impl Into<String>) -> Self {
        Self::new(text, TextOrigin::Internal, LineKind::Io)
    }

    /// An opaque telnet option-negotiation frame.
    #[must_use]
    pub fn telnet_command(bytes: Vec<u8>, origin: TextOrigin) -> Self {
        let mut record = Self::new(
            String::from_utf8_lossy(&bytes).into_owned(),
            origin,
            LineKind::TelnetCommand,
        );
        record.raw = Some(bytes);
        record
    }

    /// Wraps the record for shared access.
    #[must_use]
    pub fn shared(self) -> SharedLine {
        Arc::new(Mutex::new(self))
    }

    // ── Read accessors ───────────────────────────────────────

    /// Unique id, assigned at creation.
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Current payload text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The payload as it was at creation.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Where the line was born.
    #[must_use]
    pub fn origin(&self) -> TextOrigin {
        self.origin
    }

    /// Payload classification.
    #[must_use]
    pub fn kind(&self) -> LineKind {
        self.kind
    }

    /// Whether the line is still scheduled for delivery.
    #[must_use]
    pub fn send(&self) -> bool {
        self.send
    }

    /// Whether the line is a prompt.
    #[must_use]
    pub fn is_prompt(&self) -> bool {
        self.is_prompt
    }

    /// Whether the proxy marker is prepended at format time.
    #[must_use]
    pub fn preamble(&self) -> bool {
        self.preamble
    }

    /// Whether the line may be delivered before client login.
    #[must_use]
    pub fn prelogin(&self) -> bool {
        self.prelogin
    }

    /// Whether the received bytes carried their own line endings.
    #[must_use]
    pub fn had_line_endings(&self) -> bool {
        self.had_line_endings
    }

    /// Color-code prefix applied at format time, if any.
    #[must_use]
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Whether the line was handed to a socket queue.
    #[must_use]
    pub fn was_sent(&self) -> bool {
        self.was_sent
    }

    /// Whether the record is frozen.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The update log, oldest first.
    #[must_use]
    pub fn updates(&self) -> &[UpdateEntry] {
        &self.updates
    }

    // ── Derived views ────────────────────────────────────────

    /// The payload with ANSI escape sequences stripped.
    #[must_use]
    pub fn noansi(&self) -> String {
        color::strip_ansi(&self.text)
    }

    /// The payload with ANSI sequences converted to internal codes.
    #[must_use]
    pub fn colorcoded(&self) -> String {
        color::ansi_to_codes(&self.text)
    }

    // ── Mutation (logged, rejected when locked) ──────────────

    fn guard(&mut self, what: &str, ctx: &UpdateContext) -> Result<(), RecordError> {
        if self.locked {
            self.updates
                .push(UpdateEntry::new(UpdateAction::Rejected, what, ctx));
            tracing::warn!(record = %self.id, actor = %ctx.actor, what, "mutation of locked record rejected");
            return Err(RecordError::Locked(self.id));
        }
        Ok(())
    }

    /// Replaces the payload text.
    ///
    /// # Errors
    ///
    /// [`RecordError::Locked`] if the record is frozen; the attempt is
    /// still logged.
    pub fn set_text(
        &mut self,
        new: impl Into<String>,
        ctx: &UpdateContext,
    ) -> Result<(), RecordError> {
        let new: String = new.into();
        self.guard("set_text", ctx)?;
        let entry = UpdateEntry::new(UpdateAction::Modify, "text", ctx)
            .with_data(serde_json::json!({"from": self.text, "to": new}));
        self.updates.push(entry);
        self.text = new;
        Ok(())
    }

    /// Sets or clears the send flag; clearing suppresses delivery.
    pub fn set_send(&mut self, send: bool, ctx: &UpdateContext) -> Result<(), RecordError> {
        self.guard("set_send", ctx)?;
        self.updates.push(UpdateEntry::new(
            UpdateAction::Modify,
            format!("send={send}"),
            ctx,
        ));
        self.send = send;
        Ok(())
    }

    /// Marks the line as a prompt.
    pub fn set_prompt(&mut self, value: bool, ctx: &UpdateContext) -> Result<(), RecordError> {
        self.guard("set_prompt", ctx)?;
        self.updates.push(UpdateEntry::new(
            UpdateAction::Modify,
            format!("is_prompt={value}"),
            ctx,
        ));
        self.is_prompt = value;
        Ok(())
    }

    /// Controls the proxy-marker preamble.
    pub fn set_preamble(&mut self, value: bool, ctx: &UpdateContext) -> Result<(), RecordError> {
        self.guard("set_preamble", ctx)?;
        self.updates.push(UpdateEntry::new(
            UpdateAction::Modify,
            format!("preamble={value}"),
            ctx,
        ));
        self.preamble = value;
        Ok(())
    }

    /// Marks the line deliverable before client login.
    pub fn set_prelogin(&mut self, value: bool, ctx: &UpdateContext) -> Result<(), RecordError> {
        self.guard("set_prelogin", ctx)?;
        self.updates.push(UpdateEntry::new(
            UpdateAction::Modify,
            format!("prelogin={value}"),
            ctx,
        ));
        self.prelogin = value;
        Ok(())
    }

    /// Sets a color-code prefix applied at format time.
    pub fn set_color(
        &mut self,
        code: Option<String>,
        ctx: &UpdateContext,
    ) -> Result<(), RecordError> {
        self.guard("set_color", ctx)?;
        self.updates.push(UpdateEntry::new(
            UpdateAction::Modify,
            format!("color={code:?}"),
            ctx,
        ));
        self.color = code;
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────

    /// Freezes the record. Idempotent - repeated locks are no-ops and
    /// do not grow the log.
    pub fn lock(&mut self, ctx: &UpdateContext) {
        if self.locked {
            return;
        }
        self.locked = true;
        self.updates
            .push(UpdateEntry::new(UpdateAction::Lock, "", ctx));
    }

    /// Formats the line for socket output.
    ///
    /// Internal lines get the proxy preamble (when flagged) and have
    /// their color codes converted to ANSI; mud and client payloads
    /// pass through untouched apart from the color prefix. Line
    /// endings are always re-appended since they were stripped at
    /// creation; prompts are no exception - the send stage marks a
    /// prompt's end with a telnet go-ahead after these bytes.
    /// Telnet-command frames are returned verbatim.
    #[must_use]
    pub fn format_bytes(&self, preamble: &str) -> Vec<u8> {
        if self.kind == LineKind::TelnetCommand {
            return self.raw.clone().unwrap_or_else(|| self.text.clone().into_bytes());
        }

        let internal = self.origin == TextOrigin::Internal;
        let mut out = String::new();
        if self.preamble && internal {
            out.push_str(&color::to_ansi(preamble));
            out.push(' ');
        }
        if let Some(code) = &self.color {
            out.push_str(&color::to_ansi(code));
        }
        if internal {
            out.push_str(&color::to_ansi(&self.text));
        } else {
            out.push_str(&self.text);
        }
        if self.color.is_some() {
            out.push_str("\x1b[0m");
        }
        out.push_str("\r\n");
        out.into_bytes()
    }

    /// Records that the line was handed to a socket queue.
    ///
    /// Delivery bookkeeping is exempt from the lock freeze - the lock
    /// happens immediately before the send.
    pub fn mark_sent(&mut self, ctx: &UpdateContext) {
        self.was_sent = true;
        self.updates
            .push(UpdateEntry::new(UpdateAction::Sent, "", ctx));
    }

    /// Records that delivery was skipped for a recipient.
    pub fn mark_dropped(&mut self, reason: &str, ctx: &UpdateContext) {
        self.updates
            .push(UpdateEntry::new(UpdateAction::Dropped, reason, ctx));
    }

    /// Appends a format-step entry to the log.
    pub fn note_format(&mut self, ctx: &UpdateContext) {
        self.updates
            .push(UpdateEntry::new(UpdateAction::Format, "", ctx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> UpdateContext {
        UpdateContext::new("test")
    }

    #[test]
    fn creation_strips_and_remembers_endings() {
        let line = LineRecord::from_mud("hello\r\n");
        assert_eq!(line.text(), "hello");
        assert!(line.had_line_endings());

        let bare = LineRecord::from_mud("prompt>");
        assert!(!bare.had_line_endings());
    }

    #[test]
    fn original_is_frozen() {
        let mut line = LineRecord::from_mud("before");
        line.set_text("after", &ctx()).unwrap();
        assert_eq!(line.original(), "before");
        assert_eq!(line.text(), "after");
    }

    #[test]
    fn locked_mutation_is_rejected_but_logged() {
        let mut line = LineRecord::from_mud("data");
        line.lock(&ctx());
        let before = line.updates().len();

        assert!(matches!(
            line.set_text("nope", &ctx()),
            Err(RecordError::Locked(_))
        ));
        assert_eq!(line.text(), "data");
        assert_eq!(line.updates().len(), before + 1);
        assert_eq!(line.updates().last().unwrap().action, UpdateAction::Rejected);
    }

    #[test]
    fn lock_is_idempotent() {
        let mut line = LineRecord::from_mud("data");
        line.lock(&ctx());
        let first = line.format_bytes("#BP:");
        let log_len = line.updates().len();

        line.lock(&ctx());
        assert_eq!(line.format_bytes("#BP:"), first);
        assert_eq!(line.updates().len(), log_len);
    }

    #[test]
    fn format_appends_crlf() {
        let line = LineRecord::from_mud("hello\n");
        assert_eq!(line.format_bytes(""), b"hello\r\n");
    }

    #[test]
    fn format_appends_crlf_to_prompts_too() {
        let mut line = LineRecord::from_mud("Enter name>");
        line.set_prompt(true, &ctx()).unwrap();
        assert_eq!(line.format_bytes(""), b"Enter name>\r\n");
    }

    #[test]
    fn internal_line_gets_preamble_and_colors() {
        let line = LineRecord::internal("@Greloaded@.");
        let bytes = line.format_bytes("@R#BP:@.");
        let s = String::from_utf8(bytes).unwrap();
        assert!(s.starts_with("\x1b[1;31m#BP:\x1b[0m "));
        assert!(s.contains("\x1b[1;32mreloaded"));
        assert!(s.ends_with("\r\n"));
    }

    #[test]
    fn mud_line_is_not_color_converted() {
        let line = LineRecord::from_mud("mail @host");
        let s = String::from_utf8(line.format_bytes("#BP:")).unwrap();
        assert_eq!(s, "mail @host\r\n");
    }

    #[test]
    fn color_prefix_applies_and_resets() {
        let mut line = LineRecord::from_mud("alert");
        line.set_color(Some("@R".into()), &ctx()).unwrap();
        let s = String::from_utf8(line.format_bytes("")).unwrap();
        assert_eq!(s, "\x1b[1;31malert\x1b[0m\r\n");
    }

    #[test]
    fn telnet_command_round_trips_raw_bytes() {
        let frame = vec![255, 251, 201];
        let line = LineRecord::telnet_command(frame.clone(), TextOrigin::Mud);
        assert_eq!(line.kind(), LineKind::TelnetCommand);
        assert_eq!(line.format_bytes("#BP:"), frame);
    }

    #[test]
    fn noansi_view() {
        let line = LineRecord::from_mud("\x1b[0;31mred\x1b[0m text");
        assert_eq!(line.noansi(), "red text");
    }

    #[test]
    fn sent_bookkeeping_survives_lock() {
        let mut line = LineRecord::from_mud("x");
        line.lock(&ctx());
        line.mark_sent(&ctx());
        assert!(line.was_sent());
    }
}
