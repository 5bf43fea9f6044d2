use tracing::{debug, info, warn};

use crate::capabilities::{find_cookie, is_header_value, Capabilities, HttpResult};
use crate::config::Config;
use crate::error::{AppError, ErrorKind};
use crate::event::{DialogId, Event, FormSubmission, RowId};
use crate::model::{Dialog, DialogKind, DialogState, Model};
use crate::protocol::{
    self, LoadOutcome, SubmitOutcome, REQUESTED_WITH_HEADER, REQUESTED_WITH_VALUE,
};
use crate::session::EditSession;
use crate::view::ViewModel;

#[derive(Default)]
pub struct App;

impl App {
    fn configure(config: Config, model: &mut Model) {
        match config.validate() {
            Ok(()) => {
                debug!(base_url = %config.base_url, "configuration applied");
                model.config = config;
            }
            Err(e) => warn!(error = %e, "configuration rejected, keeping the previous one"),
        }
    }

    fn open_dialog(kind: DialogKind, model: &mut Model, caps: &Capabilities) {
        if model.has_visible_dialog() {
            debug!(table = %kind.table_id(), "a dialog is already open, ignoring");
            return;
        }

        let url = match protocol::form_url(&model.config, &kind) {
            Ok(url) => url,
            Err(e) => {
                warn!(table = %kind.table_id(), error = %e, "cannot build form request");
                model.notify_error(
                    &AppError::new(ErrorKind::LoadFailed, "").with_internal(e.to_string()),
                );
                caps.render.render();
                return;
            }
        };

        let mut dialog = Dialog::new(kind, model.config.save_label.clone());
        dialog.open();
        let id = dialog.id.clone();

        if let Some(row_id) = dialog.kind.row_id() {
            model.sessions.insert(id.clone(), EditSession::new(row_id.clone()));
        }

        debug!(dialog = %id, url = url.as_str(), "loading form");
        let callback_id = id.clone();
        caps.http
            .get(url.as_str())
            .header(REQUESTED_WITH_HEADER, REQUESTED_WITH_VALUE)
            .send(move |result| Event::FormLoaded {
                dialog: callback_id,
                result: Box::new(result),
            });
        dialog.begin_loading();

        model.dialog = Some(dialog);
        caps.render.render();
    }

    fn dialog_shown(id: &DialogId, model: &mut Model) {
        if let Some(dialog) = model.dialog.as_mut().filter(|d| &d.id == id) {
            dialog.mark_shown();
        }

        if let Some(session) = model.sessions.get_mut(id) {
            if session.on_shown() {
                info!(dialog = %id, row = %session.row_id(), "row lock presumed");
            }
        }
    }

    fn form_loaded(id: &DialogId, result: &HttpResult, model: &mut Model, caps: &Capabilities) {
        let outcome = protocol::classify_load(protocol::raw_reply(result));

        if let Some(session) = model.sessions.get_mut(id) {
            match &outcome {
                LoadOutcome::Content { .. } => session.on_load_succeeded(),
                LoadOutcome::Locked { .. } => match session.on_lock_refused() {
                    Ok(()) => info!(dialog = %id, row = %session.row_id(), "row is locked elsewhere"),
                    Err(e) => warn!(dialog = %id, error = %e, "late lock conflict ignored"),
                },
                LoadOutcome::Failed { .. } => session.on_load_failed(),
            }
        }

        if let Some(dialog) = model.active_dialog_mut(id) {
            match outcome {
                LoadOutcome::Content { html } => {
                    dialog.set_content(html);
                }
                LoadOutcome::Locked { message } => {
                    dialog.close();
                    model.notify_error(&AppError::new(
                        ErrorKind::LockConflict,
                        message.unwrap_or_default(),
                    ));
                }
                LoadOutcome::Failed {
                    server_message,
                    reason,
                } => {
                    dialog.close();
                    warn!(dialog = %id, reason = %reason, "form load failed");
                    model.notify_error(
                        &AppError::new(ErrorKind::LoadFailed, server_message.unwrap_or_default())
                            .with_internal(reason),
                    );
                }
            }
        } else {
            debug!(dialog = %id, "stale form load not applied");
            // The lock holder's message is still worth telling the user.
            if let LoadOutcome::Locked { message } = outcome {
                model.notify_error(&AppError::new(
                    ErrorKind::LockConflict,
                    message.unwrap_or_default(),
                ));
            }
        }

        Self::settle_session(id, model, caps);
        caps.render.render();
    }

    fn submit_form(id: &DialogId, form: &FormSubmission, model: &mut Model, caps: &Capabilities) {
        let ready = model
            .dialog
            .as_ref()
            .is_some_and(|d| d.is_active(id) && d.state == DialogState::Ready);
        if !ready {
            debug!(dialog = %id, "submit ignored, dialog is not ready");
            return;
        }

        let post = match protocol::form_post(&model.config, form) {
            Ok(post) => post,
            Err(e) => {
                warn!(dialog = %id, action = %form.action, error = %e, "submit refused");
                model.notify_error(&e);
                caps.render.render();
                return;
            }
        };

        if let Some(session) = model.sessions.get_mut(id) {
            if !session.on_submit_started() {
                debug!(dialog = %id, "submit ignored, session cannot submit");
                return;
            }
        }

        if let Some(dialog) = model.active_dialog_mut(id) {
            dialog.begin_submit(form.submit_label.clone());
        }

        debug!(dialog = %id, url = post.url.as_str(), "submitting form");
        let content_type = post.multipart.content_type();
        let callback_id = id.clone();
        caps.http
            .post(post.url.as_str())
            .body_bytes(post.multipart.body)
            .header("Content-Type", content_type.as_str())
            .header(REQUESTED_WITH_HEADER, REQUESTED_WITH_VALUE)
            .send(move |result| Event::FormSubmitResponse {
                dialog: callback_id,
                result: Box::new(result),
            });
        caps.render.render();
    }

    fn submit_settled(id: &DialogId, result: &HttpResult, model: &mut Model, caps: &Capabilities) {
        let outcome = protocol::classify_submit(protocol::raw_reply(result));
        let saved = matches!(outcome, SubmitOutcome::Saved);

        // Recorded before the dialog is asked to hide.
        if let Some(session) = model.sessions.get_mut(id) {
            if saved {
                if let Err(e) = session.on_submit_saved() {
                    warn!(dialog = %id, error = %e, "save could not be recorded");
                }
            } else {
                session.on_submit_failed();
            }
        }

        if let Some(dialog) = model.active_dialog_mut(id) {
            dialog.submit.release();
            match outcome {
                SubmitOutcome::Saved => dialog.close(),
                SubmitOutcome::Rejected {
                    html: Some(html), ..
                } => {
                    dialog.replace_content(html);
                }
                SubmitOutcome::Rejected {
                    html: None,
                    message,
                } => {
                    dialog.finish_submit();
                    model.notify_error(&AppError::new(
                        ErrorKind::Validation,
                        message.unwrap_or_default(),
                    ));
                }
                SubmitOutcome::TransportFailed { reason } => {
                    dialog.finish_submit();
                    warn!(dialog = %id, reason = %reason, "submit failed in transport");
                    model.notify_error(
                        &AppError::new(ErrorKind::Transport, "").with_internal(reason),
                    );
                }
            }
        } else {
            debug!(dialog = %id, "stale submit response not applied");
        }

        if saved {
            info!(dialog = %id, "row saved, reloading");
            model.reload_requested = true;
            caps.navigation.reload();
        }

        Self::settle_session(id, model, caps);
        caps.render.render();
    }

    fn dialog_hidden(id: &DialogId, model: &mut Model, caps: &Capabilities) {
        if model.dialog.as_ref().is_some_and(|d| &d.id == id) {
            model.dialog = None;
        }

        if let Some(session) = model.sessions.get_mut(id) {
            if !session.on_hidden() {
                debug!(dialog = %id, "duplicate hidden event");
            }
        }

        Self::settle_session(id, model, caps);
        caps.render.render();
    }

    /// Sends a due unlock and forgets the session once nothing is pending.
    fn settle_session(id: &DialogId, model: &mut Model, caps: &Capabilities) {
        let Some(session) = model.sessions.get_mut(id) else {
            return;
        };

        if let Some(row_id) = session.take_release() {
            info!(dialog = %id, row = %row_id, "releasing row lock");
            Self::request_unlock(row_id, caps);
        }

        if session.is_finished() {
            debug!(dialog = %id, lock = %session.lock(), "edit session finished");
            model.sessions.remove(id);
        }
    }

    fn request_unlock(row_id: RowId, caps: &Capabilities) {
        caps.cookies.read_all(move |cookies| Event::UnlockCookiesRead { row_id, cookies });
    }

    /// Unlock failures are logged, never shown to the user.
    fn unlock_failed(row_id: &RowId, reason: String) {
        let error = AppError::new(ErrorKind::Unlock, "")
            .with_internal(reason)
            .with_context("row", row_id.as_str());
        warn!(row = %row_id, code = error.code(), error = %error, "unlock failed");
    }

    /// Best effort: a missing or unusable token only drops the header, the
    /// call itself always goes out.
    fn send_unlock(row_id: &RowId, cookies: &str, model: &Model, caps: &Capabilities) {
        let config = &model.config;

        let url = match protocol::unlock_url(config, row_id) {
            Ok(url) => url,
            Err(e) => {
                warn!(row = %row_id, error = %e, "cannot address unlock request");
                return;
            }
        };

        let mut builder = match caps.http.post(url.as_str()).body_json(&serde_json::json!({})) {
            Ok(builder) => builder,
            Err(e) => {
                warn!(row = %row_id, error = %e, "cannot encode unlock body");
                return;
            }
        };

        match find_cookie(cookies, &config.csrf_cookie_name) {
            Some(token) if is_header_value(&token) => {
                builder = builder.header(config.csrf_header.as_str(), token.as_str());
            }
            Some(_) => warn!(
                row = %row_id,
                cookie = %config.csrf_cookie_name,
                "anti-forgery cookie unusable as a header, unlocking without it"
            ),
            None => warn!(
                row = %row_id,
                cookie = %config.csrf_cookie_name,
                "anti-forgery cookie missing, unlocking without it"
            ),
        }

        let row = row_id.clone();
        builder.send(move |result| Event::UnlockResponse {
            row_id: row,
            result: Box::new(result),
        });
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(
            event = event.name(),
            user_initiated = event.is_user_initiated(),
            "update"
        );

        match event {
            Event::Configure(config) => {
                Self::configure(*config, model);
                caps.render.render();
            }

            Event::OpenAddDialog { table_id } => {
                Self::open_dialog(DialogKind::Add { table_id }, model, caps);
            }

            Event::OpenEditDialog { table_id, row_id } => {
                Self::open_dialog(DialogKind::Edit { table_id, row_id }, model, caps);
            }

            Event::DialogShown { dialog } => Self::dialog_shown(&dialog, model),

            Event::DialogHidden { dialog } => Self::dialog_hidden(&dialog, model, caps),

            Event::CloseDialogRequested { dialog } => {
                if let Some(active) = model.active_dialog_mut(&dialog) {
                    active.close();
                    caps.render.render();
                }
            }

            Event::FormSubmitted { dialog, form } => Self::submit_form(&dialog, &form, model, caps),

            Event::NotificationDismissed => {
                model.clear_notification();
                caps.render.render();
            }

            Event::PageUnloading => {
                for (id, session) in model.sessions.iter_mut() {
                    if let Some(row_id) = session.force_release() {
                        info!(dialog = %id, row = %row_id, "releasing row lock on unload");
                        Self::request_unlock(row_id, caps);
                    }
                }
            }

            Event::FormLoaded { dialog, result } => Self::form_loaded(&dialog, &result, model, caps),

            Event::FormSubmitResponse { dialog, result } => {
                Self::submit_settled(&dialog, &result, model, caps);
            }

            Event::UnlockCookiesRead { row_id, cookies } => {
                Self::send_unlock(&row_id, &cookies, model, caps);
            }

            Event::UnlockResponse { row_id, result } => match protocol::raw_reply(&result) {
                Ok(reply) if (200..300).contains(&reply.status) => {
                    debug!(row = %row_id, "row unlocked");
                }
                Ok(reply) => Self::unlock_failed(&row_id, format!("HTTP {}", reply.status)),
                Err(reason) => Self::unlock_failed(&row_id, reason),
            },
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        ViewModel::from_model(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TableId;
    use crate::Effect;
    use crux_core::testing::AppTester;
    use crux_http::testing::ResponseBuilder;

    fn ok(body: &str) -> HttpResult {
        Ok(ResponseBuilder::ok().body(body.as_bytes().to_vec()).build())
    }

    #[test]
    fn invalid_configuration_keeps_the_previous_one() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();

        let bad = Config {
            base_url: "not a url".into(),
            ..Config::default()
        };
        app.update(Event::Configure(Box::new(bad)), &mut model);
        assert_eq!(model.config, Config::default());

        let good = Config {
            base_url: "https://tables.example.com/".into(),
            ..Config::default()
        };
        app.update(Event::Configure(Box::new(good.clone())), &mut model);
        assert_eq!(model.config, good);
    }

    #[test]
    fn second_open_while_visible_is_ignored() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();

        app.update(
            Event::OpenAddDialog {
                table_id: TableId::new("5"),
            },
            &mut model,
        );
        let first = model.dialog.as_ref().map(|d| d.id.clone());

        let update = app.update(
            Event::OpenEditDialog {
                table_id: TableId::new("5"),
                row_id: RowId::new("42"),
            },
            &mut model,
        );
        assert!(update.effects.is_empty());
        assert_eq!(model.dialog.as_ref().map(|d| d.id.clone()), first);
        assert!(model.sessions.is_empty());
    }

    #[test]
    fn blank_table_id_notifies_instead_of_opening() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();

        app.update(
            Event::OpenAddDialog {
                table_id: TableId::new(""),
            },
            &mut model,
        );
        assert!(model.dialog.is_none());
        assert_eq!(
            model.notification.as_ref().map(|n| n.message.as_str()),
            Some("Failed to load the form")
        );
    }

    #[test]
    fn stale_load_for_a_replaced_dialog_is_not_applied() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();

        app.update(
            Event::OpenAddDialog {
                table_id: TableId::new("5"),
            },
            &mut model,
        );
        app.update(
            Event::FormLoaded {
                dialog: DialogId::generate(),
                result: Box::new(ok(r#"{"status":"success","html":"<form></form>"}"#)),
            },
            &mut model,
        );

        let dialog = model.dialog.as_ref().unwrap();
        assert_eq!(dialog.state, DialogState::Loading);
        assert_eq!(dialog.content_html, None);
    }

    #[test]
    fn submit_before_content_is_ignored() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();

        app.update(
            Event::OpenAddDialog {
                table_id: TableId::new("5"),
            },
            &mut model,
        );
        let id = model.dialog.as_ref().unwrap().id.clone();

        let update = app.update(
            Event::FormSubmitted {
                dialog: id,
                form: Box::new(FormSubmission::new("/5/add_row/")),
            },
            &mut model,
        );
        assert!(update.effects.is_empty());
        assert_eq!(model.dialog.as_ref().unwrap().state, DialogState::Loading);
    }

    #[test]
    fn dismissing_clears_the_notification() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();
        model.notify("Connection error", crate::model::NotificationKind::Error);

        app.update(Event::NotificationDismissed, &mut model);
        assert!(model.notification.is_none());
        assert!(app.view(&model).notification.is_none());
    }
}
