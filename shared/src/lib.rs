//! Headless core for the add-row and edit-row dialogs of the table service.
//!
//! The shell renders [`ViewModel`], forwards dialog and form events as
//! [`Event`]s and executes the [`Effect`]s the core asks for. Edit dialogs
//! carry an implicit row lock that is handed back exactly once when the user
//! leaves without saving (see [`session`]).

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod protocol;
pub mod session;
pub mod view;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::{Config, ConfigError};
pub use crux_core::{render::Render, App as CruxApp};
pub use error::{AppError, AppResult, ErrorKind};
pub use event::{DialogId, Event, FormSubmission, RowId, TableId};
pub use model::{DialogKind, DialogState, Model, NotificationKind};
pub use session::{EditSession, LockState, TransitionError};
pub use view::ViewModel;

pub const MAX_ID_LENGTH: usize = 128;
pub const MAX_FORM_FIELDS: usize = 512;
pub const MAX_FORM_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_MARKUP_BYTES: usize = 2 * 1024 * 1024;
