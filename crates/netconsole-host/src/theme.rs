use netconsole_protocol::ThemeSnapshot;
use std::sync::RwLock;

/// Source of the appearance snapshot sent with INIT_HOST and on style
/// changes. The embedder knows what the surrounding editor looks like.
pub trait ThemeProvider: Send + Sync {
    fn snapshot(&self) -> ThemeSnapshot;
}

/// Holder the embedder updates in place; broadcasting the change to open
/// tabs is the view manager's job.
#[derive(Default)]
pub struct ThemeStore {
    inner: RwLock<ThemeSnapshot>,
}

impl ThemeStore {
    pub fn new(initial: ThemeSnapshot) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    pub fn set(&self, next: ThemeSnapshot) {
        *self.inner.write().expect("theme lock poisoned") = next;
    }
}

impl ThemeProvider for ThemeStore {
    fn snapshot(&self) -> ThemeSnapshot {
        self.inner.read().expect("theme lock poisoned").clone()
    }
}
