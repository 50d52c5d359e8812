//! Pointer-over-UI suppression.
//!
//! Menus, the result panel, the search box and alerts are drawn on top of
//! the map canvas. While the pointer is over any of them, clicks must not
//! reach the map.

use std::collections::HashSet;

use tracing::debug;

/// Interactive surfaces that sit above the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiElement {
    LayerMenu,
    ResultPanel,
    SearchBox,
    InfoPanel,
    Alert,
}

#[derive(Debug, Default)]
pub struct PointerGuard {
    over: HashSet<UiElement>,
}

impl PointerGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, element: UiElement) {
        self.over.insert(element);
    }

    pub fn leave(&mut self, element: UiElement) {
        self.over.remove(&element);
    }

    /// Forget every element, e.g. when the element under the pointer closes
    /// without a leave event.
    pub fn clear(&mut self) {
        if !self.over.is_empty() {
            debug!(elements = self.over.len(), "Clearing pointer-over-UI state");
        }
        self.over.clear();
    }

    pub fn is_over_ui(&self) -> bool {
        !self.over.is_empty()
    }
}
