//! Plugins: named bundles of handler groups.
//!
//! A [`Plugin`] is consulted exactly once, when it is registered with the
//! orchestrator. Its groups are materialized into the group table at that
//! point, so a plugin holds no state the kernel depends on afterwards.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use teleroute::prelude::*;
//!
//! let greeter = plugin! {
//!     name: "greeter",
//!     groups: [
//!         on_command("start").handler(handler_fn(start)).build()?,
//!         on_message().priority(-1).handler(handler_fn(echo)).build()?,
//!     ],
//! };
//! handler.register_plugin(&greeter)?;
//! ```
//!
//! Types that compute their groups can implement [`Plugin`] directly.

mod macros;

#[cfg(feature = "builtin-plugins")]
pub mod builtin;

use std::fmt;
use std::sync::Arc;

use crate::group::HandlerGroup;

/// A named supplier of handler groups.
pub trait Plugin: Send + Sync {
    /// The plugin name, unique among the plugins of one orchestrator.
    fn name(&self) -> &str;

    /// The groups this plugin contributes, in registration order.
    fn handler_groups(&self) -> Vec<HandlerGroup>;
}

impl<P: Plugin + ?Sized> Plugin for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn handler_groups(&self) -> Vec<HandlerGroup> {
        (**self).handler_groups()
    }
}

impl<P: Plugin + ?Sized> Plugin for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn handler_groups(&self) -> Vec<HandlerGroup> {
        (**self).handler_groups()
    }
}

// =============================================================================
// PluginBundle
// =============================================================================

/// A plugin backed by a fixed list of groups.
///
/// Usually created with the [`plugin!`](crate::plugin!) macro.
#[derive(Clone)]
pub struct PluginBundle {
    name: String,
    groups: Vec<HandlerGroup>,
}

impl PluginBundle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
        }
    }

    pub fn group(mut self, group: HandlerGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_groups(mut self, groups: impl IntoIterator<Item = HandlerGroup>) -> Self {
        self.groups.extend(groups);
        self
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Plugin for PluginBundle {
    fn name(&self) -> &str {
        &self.name
    }

    fn handler_groups(&self) -> Vec<HandlerGroup> {
        self.groups.clone()
    }
}

impl fmt::Debug for PluginBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginBundle")
            .field("name", &self.name)
            .field("groups", &self.groups)
            .finish()
    }
}
