use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::HttpResult;
use crate::config::Config;
use crate::MAX_ID_LENGTH;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{kind} cannot be empty")]
    EmptyId { kind: &'static str },
    #[error("{kind} too long ({len} > {max})")]
    IdTooLong {
        kind: &'static str,
        len: usize,
        max: usize,
    },
    #[error("form has too many fields ({count} > {max})")]
    TooManyFields { count: usize, max: usize },
    #[error("form body too large ({size} > {max} bytes)")]
    FormTooLarge { size: usize, max: usize },
}

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident, $kind:literal) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn validate(&self) -> Result<(), ValidationError> {
                if self.0.trim().is_empty() {
                    return Err(ValidationError::EmptyId { kind: $kind });
                }
                if self.0.len() > MAX_ID_LENGTH {
                    return Err(ValidationError::IdTooLong {
                        kind: $kind,
                        len: self.0.len(),
                        max: MAX_ID_LENGTH,
                    });
                }
                Ok(())
            }

            /// Percent-encoded form for use as a single URL path segment.
            pub fn path_segment(&self) -> String {
                urlencoding::encode(&self.0).into_owned()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(TableId, "table id");
typed_id!(RowId, "row id");
typed_id!(DialogId, "dialog id");

impl DialogId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// A form the shell intercepted on submit.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FormSubmission {
    /// Raw `action` attribute; resolved against the configured base URL.
    pub action: String,
    /// Field name/value pairs in document order, as `FormData` would list them.
    pub fields: Vec<(String, String)>,
    /// Label of the submit control before it was swapped for the busy label.
    #[serde(default)]
    pub submit_label: Option<String>,
}

impl FormSubmission {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            fields: Vec::new(),
            submit_label: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn with_submit_label(mut self, label: impl Into<String>) -> Self {
        self.submit_label = Some(label.into());
        self
    }
}

// --- Event enum: shell-facing variants first, effect callbacks are skipped by serde ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    Configure(Box<Config>),

    OpenAddDialog {
        table_id: TableId,
    },
    OpenEditDialog {
        table_id: TableId,
        row_id: RowId,
    },
    /// Fired once the dialog's show transition has finished.
    DialogShown {
        dialog: DialogId,
    },
    /// Fired once the dialog's hide transition has finished.
    DialogHidden {
        dialog: DialogId,
    },
    CloseDialogRequested {
        dialog: DialogId,
    },
    FormSubmitted {
        dialog: DialogId,
        form: Box<FormSubmission>,
    },
    NotificationDismissed,
    PageUnloading,

    #[serde(skip)]
    FormLoaded {
        dialog: DialogId,
        result: Box<HttpResult>,
    },
    #[serde(skip)]
    FormSubmitResponse {
        dialog: DialogId,
        result: Box<HttpResult>,
    },
    #[serde(skip)]
    UnlockCookiesRead {
        row_id: RowId,
        cookies: String,
    },
    #[serde(skip)]
    UnlockResponse {
        row_id: RowId,
        result: Box<HttpResult>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Configure(_) => "configure",
            Event::OpenAddDialog { .. } => "open_add_dialog",
            Event::OpenEditDialog { .. } => "open_edit_dialog",
            Event::DialogShown { .. } => "dialog_shown",
            Event::DialogHidden { .. } => "dialog_hidden",
            Event::CloseDialogRequested { .. } => "close_dialog_requested",
            Event::FormSubmitted { .. } => "form_submitted",
            Event::NotificationDismissed => "notification_dismissed",
            Event::PageUnloading => "page_unloading",
            Event::FormLoaded { .. } => "form_loaded",
            Event::FormSubmitResponse { .. } => "form_submit_response",
            Event::UnlockCookiesRead { .. } => "unlock_cookies_read",
            Event::UnlockResponse { .. } => "unlock_response",
        }
    }

    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Event::OpenAddDialog { .. }
                | Event::OpenEditDialog { .. }
                | Event::CloseDialogRequested { .. }
                | Event::FormSubmitted { .. }
                | Event::NotificationDismissed
        )
    }
}
