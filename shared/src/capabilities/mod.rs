mod cookies;
mod http;
mod navigation;

pub use self::cookies::{find_cookie, CookieOperation, Cookies};
pub use self::http::{
    is_header_name, is_header_value, Http, HttpResult, UrlError, ValidatedUrl,
};
pub use self::navigation::{Navigation, NavigationOperation};

// Crux's built-in Render capability is enough for asking the shell to
// re-read the view model.
pub use crux_core::render::{Render, RenderOperation};

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub cookies: Cookies<Event>,
    pub navigation: Navigation<Event>,
    pub render: Render<Event>,
}
