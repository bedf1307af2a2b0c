use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

pub const SUCCESS_TITLE: &str = "¡Éxito!";
pub const ERROR_TITLE: &str = "Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastType {
    Error,
    Success,
    Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub toast_type: ToastType,
    pub duration: Option<u32>, // milliseconds, None for no auto-dismiss
}

impl Toast {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        toast_type: ToastType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            message: message.into(),
            toast_type,
            duration: Some(5000), // 5 seconds default
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ERROR_TITLE, message, ToastType::Error)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(SUCCESS_TITLE, message, ToastType::Success)
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(title, message, ToastType::Info)
    }

    pub fn duration(mut self, duration_ms: u32) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    pub fn no_auto_dismiss(mut self) -> Self {
        self.duration = None;
        self
    }
}

/// Notification queue shared by every part of the dashboard. The view layer
/// renders what's queued here. Toasts with a duration dismiss themselves when
/// pushed from within a tokio runtime; the rest stay until removed.
#[derive(Debug, Clone, Default)]
pub struct Toasts {
    toasts: Arc<Mutex<Vec<Toast>>>,
}

impl Toasts {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Toast>> {
        self.toasts.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, toast: Toast) -> Uuid {
        match toast.toast_type {
            ToastType::Error => tracing::warn!(title = %toast.title, "{}", toast.message),
            _ => tracing::info!(title = %toast.title, "{}", toast.message),
        }
        let id = toast.id;
        let duration = toast.duration;
        self.lock().push(toast);

        if let (Some(ms), Ok(runtime)) = (duration, tokio::runtime::Handle::try_current()) {
            let toasts = self.clone();
            runtime.spawn(async move {
                tokio::time::sleep(Duration::from_millis(u64::from(ms))).await;
                toasts.remove(id);
            });
        }
        id
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.push(Toast::success(message))
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.push(Toast::error(message))
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) -> Uuid {
        self.push(Toast::info(title, message))
    }

    pub fn remove(&self, id: Uuid) {
        self.lock().retain(|toast| toast.id != id);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Queued toasts, oldest first.
    pub fn all(&self) -> Vec<Toast> {
        self.lock().clone()
    }

    /// Take every queued toast, leaving the queue empty.
    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut *self.lock())
    }

    pub fn last(&self) -> Option<Toast> {
        self.lock().last().cloned()
    }
}
