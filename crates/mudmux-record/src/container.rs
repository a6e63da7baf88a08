//! Ordered containers of line records.

use crate::line::{LineRecord, SharedLine};
use crate::update::{UpdateAction, UpdateContext, UpdateEntry};
use crate::RecordError;
use mudmux_types::{LineKind, TextOrigin};

/// An ordered sequence of [`LineRecord`]s with its own update log.
///
/// Raw strings appended to a container are coerced into records using
/// the container's default origin. Containers are owned by processing
/// records; plugins reach individual lines through the event data
/// record during dispatch.
#[derive(Debug, Clone)]
pub struct RecordContainer {
    origin: TextOrigin,
    lines: Vec<SharedLine>,
    updates: Vec<UpdateEntry>,
}

impl RecordContainer {
    /// Creates an empty container whose coerced strings take `origin`.
    #[must_use]
    pub fn new(origin: TextOrigin) -> Self {
        Self {
            origin,
            lines: Vec::new(),
            updates: Vec::new(),
        }
    }

    /// Builds a container from raw text lines.
    #[must_use]
    pub fn from_texts<I, S>(origin: TextOrigin, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut container = Self::new(origin);
        let ctx = UpdateContext::system("container");
        for text in texts {
            container.append_text(text, &ctx);
        }
        container
    }

    /// Default origin used for string coercion.
    #[must_use]
    pub fn origin(&self) -> TextOrigin {
        self.origin
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the container is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// All lines in order.
    #[must_use]
    pub fn lines(&self) -> &[SharedLine] {
        &self.lines
    }

    /// The container's own update log.
    #[must_use]
    pub fn updates(&self) -> &[UpdateEntry] {
        &self.updates
    }

    /// Appends an already-built record.
    pub fn append_record(&mut self, line: LineRecord, ctx: &UpdateContext) {
        self.updates.push(UpdateEntry::new(
            UpdateAction::Modify,
            format!("append {}", line.id()),
            ctx,
        ));
        self.lines.push(line.shared());
    }

    /// Appends a shared record without copying it.
    pub fn append_shared(&mut self, line: SharedLine, ctx: &UpdateContext) {
        let id = line.lock().id();
        self.updates.push(UpdateEntry::new(
            UpdateAction::Modify,
            format!("append {id}"),
            ctx,
        ));
        self.lines.push(line);
    }

    /// Coerces raw text into a record with the container's origin and
    /// appends it.
    pub fn append_text(&mut self, text: impl Into<String>, ctx: &UpdateContext) {
        self.append_record(
            LineRecord::new(text, self.origin, LineKind::Io),
            ctx,
        );
    }

    /// Inserts a record at `index`.
    ///
    /// # Errors
    ///
    /// [`RecordError::IndexOutOfRange`] if `index > len`.
    pub fn insert_record(
        &mut self,
        index: usize,
        line: LineRecord,
        ctx: &UpdateContext,
    ) -> Result<(), RecordError> {
        if index > self.lines.len() {
            return Err(RecordError::IndexOutOfRange {
                index,
                len: self.lines.len(),
            });
        }
        self.updates.push(UpdateEntry::new(
            UpdateAction::Modify,
            format!("insert {} at {index}", line.id()),
            ctx,
        ));
        self.lines.insert(index, line.shared());
        Ok(())
    }

    /// Replaces the record at `index`.
    ///
    /// # Errors
    ///
    /// [`RecordError::IndexOutOfRange`] if `index >= len`.
    pub fn replace_record(
        &mut self,
        index: usize,
        line: LineRecord,
        ctx: &UpdateContext,
    ) -> Result<(), RecordError> {
        if index >= self.lines.len() {
            return Err(RecordError::IndexOutOfRange {
                index,
                len: self.lines.len(),
            });
        }
        self.updates.push(UpdateEntry::new(
            UpdateAction::Modify,
            format!("replace index {index} with {}", line.id()),
            ctx,
        ));
        self.lines[index] = line.shared();
        Ok(())
    }

    /// The subset of lines matching `origin` with kind `Io` - the
    /// lines eligible for modification events.
    #[must_use]
    pub fn modifiable(&self, origin: TextOrigin) -> Vec<SharedLine> {
        self.lines
            .iter()
            .filter(|line| {
                let l = line.lock();
                l.origin() == origin && l.kind() == LineKind::Io
            })
            .cloned()
            .collect()
    }

    /// Locks every line; the send phase calls this before formatting.
    pub fn lock_all(&mut self, ctx: &UpdateContext) {
        self.updates
            .push(UpdateEntry::new(UpdateAction::Lock, "all lines", ctx));
        for line in &self.lines {
            line.lock().lock(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> UpdateContext {
        UpdateContext::new("test")
    }

    #[test]
    fn coerces_text_with_container_origin() {
        let mut c = RecordContainer::new(TextOrigin::Client);
        c.append_text("look", &ctx());
        assert_eq!(c.len(), 1);
        let line = c.lines()[0].lock();
        assert_eq!(line.origin(), TextOrigin::Client);
        assert_eq!(line.kind(), LineKind::Io);
    }

    #[test]
    fn modifiable_filters_origin_and_kind() {
        let mut c = RecordContainer::new(TextOrigin::Mud);
        c.append_text("normal", &ctx());
        c.append_record(
            LineRecord::telnet_command(vec![255, 251, 201], TextOrigin::Mud),
            &ctx(),
        );
        c.append_record(LineRecord::internal("note"), &ctx());

        let eligible = c.modifiable(TextOrigin::Mud);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].lock().text(), "normal");
    }

    #[test]
    fn lock_all_freezes_every_line() {
        let mut c = RecordContainer::from_texts(TextOrigin::Mud, ["a", "b"]);
        c.lock_all(&ctx());
        assert!(c.lines().iter().all(|l| l.lock().is_locked()));
    }

    #[test]
    fn insert_and_replace_bounds() {
        let mut c = RecordContainer::from_texts(TextOrigin::Mud, ["a"]);
        assert!(c
            .insert_record(5, LineRecord::from_mud("x"), &ctx())
            .is_err());
        assert!(c
            .replace_record(1, LineRecord::from_mud("x"), &ctx())
            .is_err());

        c.insert_record(0, LineRecord::from_mud("first"), &ctx())
            .unwrap();
        assert_eq!(c.lines()[0].lock().text(), "first");

        c.replace_record(1, LineRecord::from_mud("second"), &ctx())
            .unwrap();
        assert_eq!(c.lines()[1].lock().text(), "second");
    }

    #[test]
    fn container_log_grows_with_mutations() {
        let mut c = RecordContainer::new(TextOrigin::Mud);
        c.append_text("a", &ctx());
        c.lock_all(&ctx());
        assert_eq!(c.updates().len(), 2);
    }
}
