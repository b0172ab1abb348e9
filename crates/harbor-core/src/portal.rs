//! Portals render content into a named mount point elsewhere in the tree
//! (overlays, toasts, dialogs). A missing mount point is not an error for
//! the caller: rendering degrades to a logged no-op.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};

use crate::Dispose;
use crate::error::{HarborError, Result};

pub const DEFAULT_PORTAL_TARGET: &str = "portal-root";

new_key_type! {
    pub struct PortalChild;
}

/// The set of mount points the host document provides.
pub struct PortalRoot<V: 'static> {
    targets: Rc<RefCell<HashMap<String, SlotMap<PortalChild, V>>>>,
}

impl<V: 'static> Clone for PortalRoot<V> {
    fn clone(&self) -> Self {
        Self {
            targets: self.targets.clone(),
        }
    }
}

impl<V: 'static> Default for PortalRoot<V> {
    fn default() -> Self {
        Self {
            targets: Rc::new(RefCell::new(HashMap::new())),
        }
    }
}

impl<V: Clone + 'static> PortalRoot<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&self, name: impl Into<String>) {
        self.targets.borrow_mut().entry(name.into()).or_default();
    }

    /// Remove a mount point, returning whatever was rendered into it.
    pub fn unmount(&self, name: &str) -> Vec<V> {
        self.targets
            .borrow_mut()
            .remove(name)
            .map(|children| children.into_iter().map(|(_, v)| v).collect())
            .unwrap_or_default()
    }

    pub fn is_mounted(&self, name: &str) -> bool {
        self.targets.borrow().contains_key(name)
    }

    /// Content currently rendered into `name`.
    pub fn children(&self, name: &str) -> Vec<V> {
        self.targets
            .borrow()
            .get(name)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }
}

pub struct Portal<V: 'static> {
    root: PortalRoot<V>,
    target: String,
}

impl<V: Clone + 'static> Portal<V> {
    /// Portal into `target`, or `"portal-root"` when `None`.
    pub fn new(root: &PortalRoot<V>, target: Option<&str>) -> Self {
        Self {
            root: root.clone(),
            target: target.unwrap_or(DEFAULT_PORTAL_TARGET).to_owned(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Render `content` into the target; the returned guard removes it.
    pub fn try_render(&self, content: V) -> Result<Dispose> {
        let key = {
            let mut targets = self.root.targets.borrow_mut();
            let Some(children) = targets.get_mut(&self.target) else {
                return Err(HarborError::MissingPortalTarget(self.target.clone()));
            };
            children.insert(content)
        };
        let targets = Rc::downgrade(&self.root.targets);
        let name = self.target.clone();
        Ok(Dispose::new(move || {
            if let Some(targets) = targets.upgrade()
                && let Some(children) = targets.borrow_mut().get_mut(&name)
            {
                children.remove(key);
            }
        }))
    }

    /// Like [`Portal::try_render`], but a missing target only logs a warning
    /// and renders nothing.
    pub fn render(&self, content: V) -> Dispose {
        match self.try_render(content) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("{e}; portal content dropped");
                Dispose::noop()
            }
        }
    }
}
