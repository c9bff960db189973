pub mod channel;
pub mod error;
pub mod extractor;
pub mod initiator;
pub mod message;
pub mod router;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use kb_common::store::EntryStore;

use crate::extractor::{Extractor, PageContext};
use crate::router::{MessageRouter, TabHandle};

/// Wire an extractor for one page into a fresh router and start its event loop.
///
/// The initiator sends one `SAVE_HIGHLIGHT` message per gesture to the returned
/// handle. The extractor turns it into a [`kb_common::entry::CaptureRequest`],
/// saves it, and the router resolves the gesture's
/// [`channel::PendingResponse`] exactly once with the outcome.
pub fn connect_page<S, P>(store: Arc<S>, page: Arc<P>) -> TabHandle
where
    S: EntryStore + 'static,
    P: PageContext + 'static,
{
    let mut router = MessageRouter::new();
    Arc::new(Extractor::new(store, page)).install(&mut router);
    router.spawn()
}
