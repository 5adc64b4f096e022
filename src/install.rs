use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MANUAL_INSTALL_INSTRUCTIONS: &str = "لتثبيت التطبيق على أندرويد:\n1. اضغط على النقاط الثلاث في المتصفح (⋮)\n2. اختر \"الإضافة إلى الشاشة الرئيسية\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallOutcome {
    Accepted,
    Dismissed,
}

/// A platform installation offer held back until the user asks for it.
#[async_trait]
pub trait DeferredInstall: Send + Sync {
    /// Shows the platform prompt and resolves with the user's choice.
    async fn prompt(&self) -> InstallOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstallResponse {
    Prompted { outcome: InstallOutcome },
    ManualInstructions { message: String },
}

/// Holds at most one captured offer; it is consumed once the user accepts.
#[derive(Default, Clone)]
pub struct InstallPromptSlot {
    captured: Option<Arc<dyn DeferredInstall>>,
}

impl InstallPromptSlot {
    pub fn capture(&mut self, prompt: Arc<dyn DeferredInstall>) {
        self.captured = Some(prompt);
    }

    pub fn is_available(&self) -> bool {
        self.captured.is_some()
    }

    pub fn current(&self) -> Option<Arc<dyn DeferredInstall>> {
        self.captured.clone()
    }

    /// Clears the slot only if it still holds `prompt`.
    pub fn consume(&mut self, prompt: &Arc<dyn DeferredInstall>) {
        if self
            .captured
            .as_ref()
            .is_some_and(|held| Arc::ptr_eq(held, prompt))
        {
            self.captured = None;
        }
    }
}

impl std::fmt::Debug for InstallPromptSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallPromptSlot")
            .field("available", &self.is_available())
            .finish()
    }
}
