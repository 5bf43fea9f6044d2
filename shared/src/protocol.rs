//! Wire contract with the table service: addresses and bodies for the three
//! calls the dialogs make, and classification of the JSON replies.

use serde::Deserialize;
use serde_json::Value;

use crate::capabilities::{HttpResult, ValidatedUrl};
use crate::config::Config;
use crate::error::AppResult;
use crate::event::{FormSubmission, RowId, ValidationError};
use crate::model::DialogKind;
use crate::{MAX_FORM_BYTES, MAX_FORM_FIELDS, MAX_MARKUP_BYTES};

pub const REQUESTED_WITH_HEADER: &str = "X-Requested-With";
pub const REQUESTED_WITH_VALUE: &str = "XMLHttpRequest";
pub const HTTP_LOCKED: u16 = 423;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

/// `{status, html?, message?, errors?}` as returned by every form endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerReply {
    pub status: ReplyStatus,
    pub html: Option<String>,
    pub message: Option<String>,
    pub errors: Option<Value>,
}

impl ServerReply {
    fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// The server's text as sent; blank counts as absent.
    fn message(&self) -> Option<String> {
        self.message
            .clone()
            .filter(|m| !m.trim().is_empty())
    }
}

/// Status and body of whatever the server answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReply<'a> {
    pub status: u16,
    pub body: &'a [u8],
}

/// Any reply counts, whatever its status; an error means nothing usable came
/// back from the server.
pub fn raw_reply(result: &HttpResult) -> Result<RawReply<'_>, String> {
    match result {
        Ok(response) => Ok(RawReply {
            status: response.status() as u16,
            body: response.body().map(Vec::as_slice).unwrap_or_default(),
        }),
        Err(e) => Err(e.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Content { html: String },
    Locked { message: Option<String> },
    Failed {
        server_message: Option<String>,
        reason: String,
    },
}

pub fn classify_load(reply: Result<RawReply<'_>, String>) -> LoadOutcome {
    let raw = match reply {
        Ok(raw) => raw,
        Err(reason) => {
            return LoadOutcome::Failed {
                server_message: None,
                reason,
            }
        }
    };

    let reply = ServerReply::parse(raw.body);

    if raw.status == HTTP_LOCKED {
        return LoadOutcome::Locked {
            message: reply.as_ref().and_then(ServerReply::message),
        };
    }

    match reply {
        Some(ServerReply {
            status: ReplyStatus::Success,
            html: Some(html),
            ..
        }) if html.len() <= MAX_MARKUP_BYTES => LoadOutcome::Content { html },
        Some(reply) => LoadOutcome::Failed {
            server_message: reply.message(),
            reason: format!("HTTP {} with status {:?}", raw.status, reply.status),
        },
        None => LoadOutcome::Failed {
            server_message: None,
            reason: format!("HTTP {} with an unreadable body", raw.status),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Saved,
    Rejected {
        html: Option<String>,
        message: Option<String>,
    },
    TransportFailed { reason: String },
}

pub fn classify_submit(reply: Result<RawReply<'_>, String>) -> SubmitOutcome {
    let raw = match reply {
        Ok(raw) => raw,
        Err(reason) => return SubmitOutcome::TransportFailed { reason },
    };

    let Some(reply) = ServerReply::parse(raw.body) else {
        return SubmitOutcome::TransportFailed {
            reason: format!("HTTP {} with an unreadable body", raw.status),
        };
    };

    if reply.status == ReplyStatus::Success {
        return SubmitOutcome::Saved;
    }

    let message = reply
        .message()
        .or_else(|| reply.errors.as_ref().and_then(summarize_field_errors));
    let html = reply.html.filter(|h| h.len() <= MAX_MARKUP_BYTES);
    SubmitOutcome::Rejected { html, message }
}

/// Flattens Django-style `{field: [msg, ..]}` errors into one line.
/// Non-field errors (`__all__`) are listed without a field name.
pub fn summarize_field_errors(errors: &Value) -> Option<String> {
    fn messages(value: &Value) -> Vec<String> {
        let found = match value {
            Value::String(s) => vec![s.trim().to_string()],
            Value::Array(items) => items.iter().flat_map(messages).collect(),
            Value::Object(map) => map.get("message").map(messages).unwrap_or_default(),
            _ => Vec::new(),
        };
        found.into_iter().filter(|m| !m.is_empty()).collect()
    }

    let parts: Vec<String> = match errors {
        Value::Object(fields) => fields
            .iter()
            .filter_map(|(field, value)| {
                let text = messages(value).join(" ");
                if text.is_empty() {
                    None
                } else if field == "__all__" {
                    Some(text)
                } else {
                    Some(format!("{field}: {text}"))
                }
            })
            .collect(),
        other => messages(other),
    };

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

pub struct MultipartBody {
    pub boundary: String,
    pub body: Vec<u8>,
}

impl MultipartBody {
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

fn escape_disposition_name(name: &str) -> String {
    name.replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Encodes fields as `multipart/form-data` the way a browser encodes a
/// text-only `FormData`.
pub fn encode_multipart(fields: &[(String, String)]) -> MultipartBody {
    let boundary = format!("----RowEditBoundary{}", uuid::Uuid::new_v4().simple());
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                escape_disposition_name(name)
            )
            .as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    MultipartBody { boundary, body }
}

/// Where a dialog's form markup is fetched from.
pub fn form_url(config: &Config, kind: &DialogKind) -> AppResult<ValidatedUrl> {
    let path = match kind {
        DialogKind::Add { table_id } => {
            table_id.validate()?;
            format!("{}/add_row/", table_id.path_segment())
        }
        DialogKind::Edit { table_id, row_id } => {
            table_id.validate()?;
            row_id.validate()?;
            format!(
                "{}/edit_row/{}/",
                table_id.path_segment(),
                row_id.path_segment()
            )
        }
    };

    Ok(config.resolve(&path)?)
}

/// A submitted form, checked and encoded, ready to be posted.
pub struct FormPost {
    pub url: ValidatedUrl,
    pub multipart: MultipartBody,
}

pub fn form_post(config: &Config, form: &FormSubmission) -> AppResult<FormPost> {
    if form.fields.len() > MAX_FORM_FIELDS {
        return Err(ValidationError::TooManyFields {
            count: form.fields.len(),
            max: MAX_FORM_FIELDS,
        }
        .into());
    }

    let url = config.resolve(&form.action)?;
    let multipart = encode_multipart(&form.fields);
    if multipart.body.len() > MAX_FORM_BYTES {
        return Err(ValidationError::FormTooLarge {
            size: multipart.body.len(),
            max: MAX_FORM_BYTES,
        }
        .into());
    }

    Ok(FormPost { url, multipart })
}

/// `POST /api/unlock_row/{row}/`.
pub fn unlock_url(config: &Config, row_id: &RowId) -> AppResult<ValidatedUrl> {
    row_id.validate()?;
    Ok(config.resolve(&format!("api/unlock_row/{}/", row_id.path_segment()))?)
}
