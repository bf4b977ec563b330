//! Change callbacks

use crate::EventKind;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A change callback; receives the root-relative path
///
/// Callbacks run on differ worker threads, hence `Send + Sync`.
pub type Callback = Arc<dyn Fn(&Path) + Send + Sync>;

/// The three optional change callbacks
///
/// An unset callback is a no-op.
#[derive(Clone, Default)]
pub struct Callbacks {
    on_add: Option<Callback>,
    on_delete: Option<Callback>,
    on_modify: Option<Callback>,
}

impl Callbacks {
    /// No callbacks set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the add callback
    pub fn on_add(mut self, f: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.on_add = Some(Arc::new(f));
        self
    }

    /// Set the delete callback
    pub fn on_delete(mut self, f: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.on_delete = Some(Arc::new(f));
        self
    }

    /// Set the modify callback
    pub fn on_modify(mut self, f: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.on_modify = Some(Arc::new(f));
        self
    }

    /// Route all three kinds to one handler
    pub fn from_fn(f: impl Fn(EventKind, &Path) + Send + Sync + 'static) -> Self {
        let f = Arc::new(f);
        let (add, delete, modify) = (f.clone(), f.clone(), f);
        Self::new()
            .on_add(move |p| add(EventKind::Add, p))
            .on_delete(move |p| delete(EventKind::Delete, p))
            .on_modify(move |p| modify(EventKind::Modify, p))
    }

    /// Callback registered for `kind`
    pub fn get(&self, kind: EventKind) -> Option<&Callback> {
        match kind {
            EventKind::Add => self.on_add.as_ref(),
            EventKind::Delete => self.on_delete.as_ref(),
            EventKind::Modify => self.on_modify.as_ref(),
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_add", &self.on_add.is_some())
            .field("on_delete", &self.on_delete.is_some())
            .field("on_modify", &self.on_modify.is_some())
            .finish()
    }
}
