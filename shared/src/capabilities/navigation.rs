use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum NavigationOperation {
    /// Full reload of the current page (the table view).
    Reload,
}

impl Operation for NavigationOperation {
    type Output = ();
}

pub struct Navigation<E> {
    context: CapabilityContext<NavigationOperation, E>,
}

impl<Ev> Capability<Ev> for Navigation<Ev> {
    type Operation = NavigationOperation;
    type MappedSelf<MappedEv> = Navigation<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Navigation::new(self.context.map_event(f))
    }
}

impl<E> Navigation<E> {
    pub fn new(context: CapabilityContext<NavigationOperation, E>) -> Self {
        Self { context }
    }
}

impl<E> Navigation<E>
where
    E: Send + 'static,
{
    pub fn reload(&self) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(NavigationOperation::Reload).await;
        });
    }
}
