use std::sync::{Arc, PoisonError, RwLock};

use kb_common::entry::{CaptureRequest, SavedEntry};
use kb_common::store::EntryStore;
use tracing::{info, warn};

use crate::error::CaptureError;
use crate::message::{CaptureResponse, InvocationInfo, MediaType, MessageType};
use crate::router::MessageRouter;

/// Read access to the page the extractor lives in. Read at extraction time.
pub trait PageContext: Send + Sync {
    fn location(&self) -> String;
    fn title(&self) -> String;
}

/// A page whose location and title follow navigation.
#[derive(Debug, Default)]
pub struct PageState {
    inner: RwLock<(String, String)>,
}

impl PageState {
    pub fn new(location: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new((location.into(), title.into())),
        }
    }

    pub fn navigate(&self, location: impl Into<String>, title: impl Into<String>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) =
            (location.into(), title.into());
    }
}

impl PageContext for PageState {
    fn location(&self) -> String {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).0.clone()
    }

    fn title(&self) -> String {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).1.clone()
    }
}

/// Page-side handler for `SAVE_HIGHLIGHT`.
pub struct Extractor<S, P> {
    store: Arc<S>,
    page: Arc<P>,
}

impl<S, P> Extractor<S, P>
where
    S: EntryStore + 'static,
    P: PageContext + 'static,
{
    pub fn new(store: Arc<S>, page: Arc<P>) -> Self {
        Self { store, page }
    }

    /// Register this extractor as the router's `SAVE_HIGHLIGHT` handler.
    pub fn install(self: Arc<Self>, router: &mut MessageRouter) {
        router.on(MessageType::SaveHighlight, move |message| {
            let extractor = Arc::clone(&self);
            async move { extractor.handle_save_highlight(message.payload).await }
        });
    }

    /// Capture, save, and fold the outcome into a response. Always returns one.
    pub async fn handle_save_highlight(&self, info: InvocationInfo) -> CaptureResponse {
        match self.capture(&info).await {
            Ok(saved) => {
                info!(id = saved.id, "entry saved");
                CaptureResponse::success(saved)
            }
            Err(e) => {
                warn!(error = %e, "capture failed");
                CaptureResponse::failure(e)
            }
        }
    }

    /// Build the capture payload from the click data and the page as it is now.
    pub fn build_request(&self, info: &InvocationInfo) -> Result<CaptureRequest, CaptureError> {
        let content = extract_content(info)?;
        Ok(CaptureRequest::now(
            content,
            self.page.location(),
            self.page.title(),
        ))
    }

    async fn capture(&self, info: &InvocationInfo) -> Result<SavedEntry, CaptureError> {
        let request = self.build_request(info)?;
        Ok(self.store.save_entry(&request).await?)
    }
}

/// Selected text wins; an image click falls back to the image's source URL.
pub fn extract_content(info: &InvocationInfo) -> Result<String, CaptureError> {
    if let Some(text) = info.selection_text.as_deref() {
        if !text.trim().is_empty() {
            return Ok(text.to_string());
        }
    }
    if info.media_type == Some(MediaType::Image) {
        if let Some(src) = info.src_url.as_deref().filter(|s| !s.trim().is_empty()) {
            return Ok(src.to_string());
        }
        return Err(CaptureError::Extraction(
            "image has no source URL".to_string(),
        ));
    }
    Err(CaptureError::Extraction(
        "no text selection or image".to_string(),
    ))
}
