/// Background-side controller: owns the "Save to Knowledge Base" context-menu item
/// and forwards each click to the tab it happened in.
///
/// The initiator never retries. It logs the tab's answer and hands it back to the
/// caller; a missing answer is a `ChannelError`, which indicates a bug in the
/// receiving context rather than a user-facing failure.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::channel::ChannelError;
use crate::message::{CaptureResponse, InvocationInfo, Message, TabId};
use crate::router::TabHandle;

pub const SAVE_MENU_ITEM_ID: &str = "saveToKnowledgeBase";
pub const SAVE_MENU_ITEM_TITLE: &str = "Save to Knowledge Base";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuContext {
    Selection,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMenuItem {
    pub id: String,
    pub title: String,
    pub contexts: Vec<MenuContext>,
}

impl ContextMenuItem {
    pub fn save_to_knowledge_base() -> Self {
        Self {
            id: SAVE_MENU_ITEM_ID.to_string(),
            title: SAVE_MENU_ITEM_TITLE.to_string(),
            contexts: vec![MenuContext::Selection, MenuContext::Image],
        }
    }
}

#[derive(Default)]
pub struct Initiator {
    menu: Vec<ContextMenuItem>,
    tabs: RwLock<HashMap<TabId, TabHandle>>,
}

impl Initiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the context-menu item. Idempotent across repeated installs.
    pub fn on_installed(&mut self) -> &[ContextMenuItem] {
        let item = ContextMenuItem::save_to_knowledge_base();
        if !self.menu.contains(&item) {
            info!(id = %item.id, "context menu item created");
            self.menu.push(item);
        }
        &self.menu
    }

    /// Make a tab's page context reachable.
    pub async fn attach_tab(&self, tab: TabId, handle: TabHandle) {
        self.tabs.write().await.insert(tab, handle);
    }

    pub async fn detach_tab(&self, tab: TabId) {
        self.tabs.write().await.remove(&tab);
    }

    /// Handle a context-menu click. Returns `None` for menu items this
    /// initiator does not own.
    pub async fn on_clicked(
        &self,
        info: InvocationInfo,
        tab: TabId,
    ) -> Option<Result<CaptureResponse, ChannelError>> {
        if info.menu_item_id != SAVE_MENU_ITEM_ID {
            return None;
        }

        let handle = self.tabs.read().await.get(&tab).cloned();
        let result = match handle {
            Some(handle) => handle.send_message(Message::save_highlight(info)).await,
            None => Err(ChannelError::NoReceiver(tab)),
        };

        match &result {
            Ok(response) if response.success => {
                info!(tab, id = ?response.data.as_ref().map(|d| d.id), "capture saved");
            }
            Ok(response) => {
                warn!(tab, error = response.error.as_deref().unwrap_or("unknown"), "capture failed");
            }
            Err(e) => {
                error!(tab, error = %e, "no response from page context");
            }
        }
        Some(result)
    }
}
