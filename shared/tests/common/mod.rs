#![allow(dead_code)]

use crux_core::testing::{AppTester, Update};
use crux_core::Request;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use row_edit_core::capabilities::CookieOperation;
use row_edit_core::{App, DialogId, Effect, Event, FormSubmission, Model, RowId, TableId, ViewModel};

pub const EDIT_FORM: &str =
    r#"{"status":"success","html":"<form id=\"rowEditForm\" action=\"/5/edit_row/42/\"></form>"}"#;
pub const ADD_FORM: &str =
    r#"{"status":"success","html":"<form id=\"addRowForm\" action=\"/5/add_row/\"></form>"}"#;
pub const SAVED: &str = r#"{"status":"success"}"#;
pub const COOKIES: &str = "sessionid=abc; csrftoken=tok123";

pub fn response(status: u16, body: &str) -> HttpResult {
    HttpResult::Ok(HttpResponse {
        status,
        headers: vec![],
        body: body.as_bytes().to_vec(),
    })
}

/// The shell gave up before any reply arrived.
pub fn timed_out() -> HttpResult {
    HttpResult::Err(crux_http::Error::Timeout)
}

/// Read access to what the core put on the wire.
pub trait SentRequest {
    fn path(&self) -> String;
    fn header(&self, name: &str) -> Option<&str>;
}

impl SentRequest for HttpRequest {
    fn path(&self) -> String {
        url::Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_default()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Drives the core the way a shell would: collects effects, lets the test
/// resolve them and feeds follow-up events back in.
pub struct Harness {
    app: AppTester<App, Effect>,
    pub model: Model,
    http: Vec<Request<HttpRequest>>,
    cookies: Vec<Request<CookieOperation>>,
    /// Every request the core asked the shell to send, in order.
    pub sent: Vec<HttpRequest>,
    pub reloads: usize,
    pub renders: usize,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            app: AppTester::default(),
            model: Model::default(),
            http: Vec::new(),
            cookies: Vec::new(),
            sent: Vec::new(),
            reloads: 0,
            renders: 0,
        }
    }

    pub fn send(&mut self, event: Event) {
        let update = self.app.update(event, &mut self.model);
        self.absorb(update);
    }

    fn absorb(&mut self, update: Update<Effect, Event>) {
        for effect in update.effects {
            match effect {
                Effect::Http(request) => {
                    self.sent.push(request.operation.clone());
                    self.http.push(request);
                }
                Effect::Cookies(request) => self.cookies.push(request),
                Effect::Navigation(_) => self.reloads += 1,
                Effect::Render(_) => self.renders += 1,
            }
        }
        for event in update.events {
            self.send(event);
        }
    }

    pub fn view(&self) -> ViewModel {
        self.app.view(&self.model)
    }

    pub fn dialog_id(&self) -> DialogId {
        self.model
            .dialog
            .as_ref()
            .map(|d| d.id.clone())
            .expect("no dialog open")
    }

    pub fn pending_paths(&self) -> Vec<String> {
        self.http.iter().map(|r| r.operation.path()).collect()
    }

    pub fn has_pending_cookie_read(&self) -> bool {
        !self.cookies.is_empty()
    }

    /// Resolves the oldest pending request for `path`.
    pub fn respond(&mut self, path: &str, result: HttpResult) {
        let index = self
            .http
            .iter()
            .position(|r| r.operation.path() == path)
            .unwrap_or_else(|| panic!("no pending request to {path}, have {:?}", self.pending_paths()));
        let mut request = self.http.remove(index);
        let update = self
            .app
            .resolve(&mut request, result)
            .expect("http request should be resolvable");
        self.absorb(update);
    }

    pub fn provide_cookies(&mut self, raw: &str) {
        for mut request in std::mem::take(&mut self.cookies) {
            let update = self
                .app
                .resolve(&mut request, raw.to_string())
                .expect("cookie request should be resolvable");
            self.absorb(update);
        }
    }

    pub fn unlocks(&self) -> Vec<&HttpRequest> {
        self.sent
            .iter()
            .filter(|r| r.path().starts_with("/api/unlock_row/"))
            .collect()
    }

    pub fn open_edit(&mut self, table: &str, row: &str) -> DialogId {
        self.send(Event::OpenEditDialog {
            table_id: TableId::new(table),
            row_id: RowId::new(row),
        });
        self.dialog_id()
    }

    pub fn open_add(&mut self, table: &str) -> DialogId {
        self.send(Event::OpenAddDialog {
            table_id: TableId::new(table),
        });
        self.dialog_id()
    }

    pub fn shown(&mut self, dialog: &DialogId) {
        self.send(Event::DialogShown {
            dialog: dialog.clone(),
        });
    }

    pub fn hidden(&mut self, dialog: &DialogId) {
        self.send(Event::DialogHidden {
            dialog: dialog.clone(),
        });
    }

    pub fn close(&mut self, dialog: &DialogId) {
        self.send(Event::CloseDialogRequested {
            dialog: dialog.clone(),
        });
    }

    pub fn submit(&mut self, dialog: &DialogId, form: FormSubmission) {
        self.send(Event::FormSubmitted {
            dialog: dialog.clone(),
            form: Box::new(form),
        });
    }

    pub fn notification_text(&self) -> Option<String> {
        self.model.notification.as_ref().map(|n| n.message.clone())
    }
}
