use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::event::DialogId;
use crate::model::{Dialog, DialogKind, DialogState, Model, Notification, NotificationKind};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SubmitControlView {
    pub enabled: bool,
    pub busy: bool,
    pub label: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DialogView {
    pub id: DialogId,
    pub kind: DialogKind,
    pub state: DialogState,
    /// Whether the shell should have the modal shown. Turning `false` asks it to hide.
    pub visible: bool,
    /// `None` until the form markup arrives; the shell shows a spinner meanwhile.
    pub content_html: Option<String>,
    pub submit: SubmitControlView,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NotificationView {
    pub message: String,
    pub kind: NotificationKind,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewModel {
    pub dialog: Option<DialogView>,
    pub notification: Option<NotificationView>,
    /// Set once a save succeeded and a reload was requested.
    pub reloading: bool,
}

impl DialogView {
    fn from_dialog(dialog: &Dialog, config: &Config) -> Self {
        let busy = dialog.submit.busy;
        Self {
            id: dialog.id.clone(),
            kind: dialog.kind.clone(),
            state: dialog.state,
            visible: dialog.is_visible(),
            content_html: dialog.content_html.clone(),
            submit: SubmitControlView {
                enabled: !busy && dialog.state == DialogState::Ready,
                busy,
                label: if busy {
                    config.busy_label.clone()
                } else {
                    dialog.submit.idle_label.clone()
                },
            },
        }
    }
}

impl From<&Notification> for NotificationView {
    fn from(n: &Notification) -> Self {
        Self {
            message: n.message.clone(),
            kind: n.kind,
        }
    }
}

impl ViewModel {
    pub fn from_model(model: &Model) -> Self {
        Self {
            dialog: model
                .dialog
                .as_ref()
                .map(|d| DialogView::from_dialog(d, &model.config)),
            notification: model.notification.as_ref().map(NotificationView::from),
            reloading: model.reload_requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TableId;

    #[test]
    fn empty_model_has_nothing_to_show() {
        assert_eq!(ViewModel::from_model(&Model::default()), ViewModel::default());
    }

    #[test]
    fn busy_submit_shows_the_busy_label_and_is_disabled() {
        let mut model = Model::default();
        let mut dialog = Dialog::new(
            DialogKind::Add {
                table_id: TableId::new("5"),
            },
            "Save",
        );
        dialog.open();
        dialog.begin_loading();
        dialog.set_content("<form></form>".into());
        model.dialog = Some(dialog.clone());

        let view = ViewModel::from_model(&model).dialog.unwrap();
        assert!(view.visible);
        assert_eq!(
            view.submit,
            SubmitControlView {
                enabled: true,
                busy: false,
                label: "Save".into()
            }
        );

        dialog.begin_submit(None);
        model.dialog = Some(dialog);
        let view = ViewModel::from_model(&model).dialog.unwrap();
        assert_eq!(
            view.submit,
            SubmitControlView {
                enabled: false,
                busy: true,
                label: "Saving...".into()
            }
        );
    }

    #[test]
    fn closed_dialog_is_not_visible() {
        let mut model = Model::default();
        let mut dialog = Dialog::new(
            DialogKind::Add {
                table_id: TableId::new("5"),
            },
            "Save",
        );
        dialog.open();
        dialog.close();
        model.dialog = Some(dialog);
        model.notify("Connection error", NotificationKind::Error);

        let view = ViewModel::from_model(&model);
        assert!(!view.dialog.unwrap().visible);
        assert_eq!(view.notification.unwrap().message, "Connection error");
    }
}
