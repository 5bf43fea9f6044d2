use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Reads `document.cookie` from the shell. The raw string is parsed in the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CookieOperation {
    ReadAll,
}

impl Operation for CookieOperation {
    type Output = String;
}

pub struct Cookies<E> {
    context: CapabilityContext<CookieOperation, E>,
}

impl<Ev> Capability<Ev> for Cookies<Ev> {
    type Operation = CookieOperation;
    type MappedSelf<MappedEv> = Cookies<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Cookies::new(self.context.map_event(f))
    }
}

impl<E> Cookies<E> {
    pub fn new(context: CapabilityContext<CookieOperation, E>) -> Self {
        Self { context }
    }
}

impl<E> Cookies<E>
where
    E: Send + 'static,
{
    pub fn read_all<F>(&self, callback: F)
    where
        F: FnOnce(String) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let raw = ctx.request_from_shell(CookieOperation::ReadAll).await;
            ctx.update_app(callback(raw));
        });
    }
}

/// Looks up `name` in a `document.cookie` style string (`a=1; b=2`).
///
/// The first matching entry wins and its value is percent-decoded. A value
/// that does not decode to UTF-8 is treated as absent.
pub fn find_cookie(raw: &str, name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }

    let value = raw
        .split(';')
        .map(str::trim)
        .find_map(|entry| entry.strip_prefix(name)?.strip_prefix('='))?;

    match urlencoding::decode(value) {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(e) => {
            debug!(cookie = name, error = %e, "cookie value is not valid UTF-8");
            None
        }
    }
}
