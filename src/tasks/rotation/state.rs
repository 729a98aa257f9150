use crate::catalog::CatalogItem;
use crate::schedule::TimerHandle;

/// The rotation list, the cursor into it, and the single pending advance.
///
/// `index` always points at the item currently on screen.
#[derive(Debug, Default)]
pub struct RotationState {
    items: Vec<CatalogItem>,
    index: usize,
    pending: Option<TimerHandle>,
}

impl RotationState {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items,
            index: 0,
            pending: None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&CatalogItem> {
        self.items.get(self.index)
    }

    pub fn current_mut(&mut self) -> Option<&mut CatalogItem> {
        self.items.get_mut(self.index)
    }

    /// Step forward, wrapping to the first item.
    pub fn advance(&mut self) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        self.index = (self.index + 1) % self.items.len();
        Some(self.index)
    }

    /// Step back, wrapping to the last item.
    pub fn retreat(&mut self) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        let len = self.items.len();
        self.index = (self.index + len - 1) % len;
        Some(self.index)
    }

    /// Swap in a fresh list and restart from the top.
    pub fn replace(&mut self, items: Vec<CatalogItem>) {
        self.items = items;
        self.index = 0;
    }

    /// Record the newly armed advance; returns the one it supersedes.
    pub fn set_pending(&mut self, handle: TimerHandle) -> Option<TimerHandle> {
        self.pending.replace(handle)
    }

    pub fn take_pending(&mut self) -> Option<TimerHandle> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<TimerHandle> {
        self.pending
    }
}
