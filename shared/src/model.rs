use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::AppError;
use crate::event::{DialogId, RowId, TableId};
use crate::session::SessionRegistry;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum DialogKind {
    Add { table_id: TableId },
    Edit { table_id: TableId, row_id: RowId },
}

impl DialogKind {
    pub fn table_id(&self) -> &TableId {
        match self {
            DialogKind::Add { table_id } | DialogKind::Edit { table_id, .. } => table_id,
        }
    }

    pub fn row_id(&self) -> Option<&RowId> {
        match self {
            DialogKind::Add { .. } => None,
            DialogKind::Edit { row_id, .. } => Some(row_id),
        }
    }
}

#[derive(Default, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    #[default]
    Idle,
    Opening,
    Loading,
    Ready,
    Submitting,
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitControl {
    pub busy: bool,
    pub idle_label: String,
}

impl SubmitControl {
    pub fn new(idle_label: impl Into<String>) -> Self {
        Self {
            busy: false,
            idle_label: idle_label.into(),
        }
    }

    pub fn release(&mut self) {
        self.busy = false;
    }
}

/// The one modal dialog, from the first show request until it is fully hidden.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dialog {
    pub id: DialogId,
    pub kind: DialogKind,
    pub state: DialogState,
    pub content_html: Option<String>,
    pub submit: SubmitControl,
    pub shown: bool,
}

impl Dialog {
    pub fn new(kind: DialogKind, save_label: impl Into<String>) -> Self {
        Self {
            id: DialogId::generate(),
            kind,
            state: DialogState::Idle,
            content_html: None,
            submit: SubmitControl::new(save_label),
            shown: false,
        }
    }

    fn advance(&mut self, from: DialogState, to: DialogState) -> bool {
        if self.state != from {
            debug!(dialog = %self.id, state = ?self.state, wanted = ?to, "dialog step ignored");
            return false;
        }
        self.state = to;
        true
    }

    pub fn open(&mut self) -> bool {
        self.advance(DialogState::Idle, DialogState::Opening)
    }

    pub fn begin_loading(&mut self) -> bool {
        self.advance(DialogState::Opening, DialogState::Loading)
    }

    /// Returns `true` only for the first "fully shown" event.
    pub fn mark_shown(&mut self) -> bool {
        if self.shown || self.state == DialogState::Closed {
            return false;
        }
        self.shown = true;
        true
    }

    pub fn set_content(&mut self, html: String) -> bool {
        if !self.advance(DialogState::Loading, DialogState::Ready) {
            return false;
        }
        self.content_html = Some(html);
        true
    }

    /// Locks the submit control. `label` is the control's text at submit time.
    pub fn begin_submit(&mut self, label: Option<String>) -> bool {
        if !self.advance(DialogState::Ready, DialogState::Submitting) {
            return false;
        }
        if let Some(label) = label.filter(|l| !l.trim().is_empty()) {
            self.submit.idle_label = label;
        }
        self.submit.busy = true;
        true
    }

    pub fn finish_submit(&mut self) -> bool {
        self.submit.release();
        self.advance(DialogState::Submitting, DialogState::Ready)
    }

    /// Swaps the inner markup after a rejected submit; the dialog stays open.
    pub fn replace_content(&mut self, html: String) -> bool {
        if !self.finish_submit() {
            return false;
        }
        self.content_html = Some(html);
        true
    }

    pub fn close(&mut self) {
        self.submit.release();
        self.state = DialogState::Closed;
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self.state, DialogState::Idle | DialogState::Closed)
    }

    pub fn is_active(&self, id: &DialogId) -> bool {
        &self.id == id && self.state != DialogState::Closed
    }
}

#[derive(Default, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn new(message: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    pub fn from_error(error: &AppError, config: &Config) -> Self {
        Self::new(
            error.user_facing_message(config),
            error.kind.notification_kind(),
        )
    }
}

#[derive(Debug, Default)]
pub struct Model {
    pub config: Config,
    pub dialog: Option<Dialog>,
    pub sessions: SessionRegistry,
    pub notification: Option<Notification>,
    pub reload_requested: bool,
}

impl Model {
    pub fn notify(&mut self, message: impl Into<String>, kind: NotificationKind) {
        self.notification = Some(Notification::new(message, kind));
    }

    pub fn notify_error(&mut self, error: &AppError) {
        self.notification = Some(Notification::from_error(error, &self.config));
    }

    pub fn clear_notification(&mut self) {
        self.notification = None;
    }

    pub fn has_visible_dialog(&self) -> bool {
        self.dialog.as_ref().is_some_and(Dialog::is_visible)
    }

    /// The dialog `id` refers to, unless it has been replaced or closed.
    pub fn active_dialog_mut(&mut self, id: &DialogId) -> Option<&mut Dialog> {
        self.dialog.as_mut().filter(|d| d.is_active(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn edit_dialog() -> Dialog {
        Dialog::new(
            DialogKind::Edit {
                table_id: TableId::new("5"),
                row_id: RowId::new("42"),
            },
            "Save",
        )
    }

    fn ready_dialog() -> Dialog {
        let mut dialog = edit_dialog();
        assert!(dialog.open());
        assert!(dialog.begin_loading());
        assert!(dialog.set_content("<form></form>".into()));
        dialog
    }

    #[test]
    fn lifecycle_follows_the_happy_path() {
        let mut dialog = edit_dialog();
        assert_eq!(dialog.state, DialogState::Idle);
        assert!(!dialog.is_visible());
        assert!(dialog.open());
        assert!(dialog.is_visible());
        assert!(dialog.begin_loading());
        assert!(dialog.set_content("<form></form>".into()));
        assert_eq!(dialog.state, DialogState::Ready);
        dialog.close();
        assert!(!dialog.is_visible());
        assert!(!dialog.is_active(&dialog.id.clone()));
    }

    #[test]
    fn content_is_only_accepted_while_loading() {
        let mut dialog = edit_dialog();
        assert!(!dialog.set_content("<p>early</p>".into()));
        assert_eq!(dialog.content_html, None);
    }

    #[test]
    fn submit_locks_and_restores_the_control() {
        let mut dialog = ready_dialog();
        assert!(dialog.begin_submit(Some("Update row".into())));
        assert!(dialog.submit.busy);
        assert!(!dialog.begin_submit(None), "second submit while busy");

        assert!(dialog.finish_submit());
        assert!(!dialog.submit.busy);
        assert_eq!(dialog.submit.idle_label, "Update row");
        assert_eq!(dialog.state, DialogState::Ready);
    }

    #[test]
    fn blank_submit_label_keeps_the_configured_one() {
        let mut dialog = ready_dialog();
        dialog.begin_submit(Some("  ".into()));
        assert_eq!(dialog.submit.idle_label, "Save");
    }

    #[test]
    fn rejected_submit_replaces_only_the_content() {
        let mut dialog = ready_dialog();
        dialog.begin_submit(None);
        assert!(dialog.replace_content("<form class=\"errors\"></form>".into()));
        assert_eq!(dialog.state, DialogState::Ready);
        assert_eq!(
            dialog.content_html.as_deref(),
            Some("<form class=\"errors\"></form>")
        );
    }

    #[test]
    fn shown_is_reported_once() {
        let mut dialog = edit_dialog();
        dialog.open();
        assert!(dialog.mark_shown());
        assert!(!dialog.mark_shown());
    }

    #[test]
    fn active_dialog_lookup_ignores_other_ids() {
        let mut model = Model::default();
        let mut dialog = edit_dialog();
        dialog.open();
        let id = dialog.id.clone();
        model.dialog = Some(dialog);

        assert!(model.has_visible_dialog());
        assert!(model.active_dialog_mut(&id).is_some());
        assert!(model.active_dialog_mut(&DialogId::generate()).is_none());
    }

    #[test]
    fn error_notifications_use_configured_texts() {
        let mut model = Model::default();
        model.notify_error(&AppError::new(ErrorKind::Transport, ""));
        assert_eq!(
            model.notification,
            Some(Notification::new("Connection error", NotificationKind::Error))
        );
        model.clear_notification();
        assert_eq!(model.notification, None);
    }
}
