//! Checkers decide whether a handler group applies to an update.
//!
//! A [`Checker`] is a pure, total predicate over an [`Update`]. Checkers hold
//! only their match parameters, so a single instance can be shared by any
//! number of groups and dispatches.
//!
//! ```rust,ignore
//! let private_start = AndChecker::new()
//!     .and(CommandChecker::new("start"))
//!     .and(checker_fn(|u| u.message().is_some_and(|m| m.chat.chat_type == "private")));
//! ```

use std::fmt;
use std::sync::Arc;

use teleroute_core::{Update, UpdateType};

/// A predicate over updates.
pub trait Checker: Send + Sync + 'static {
    fn check(&self, update: &Update) -> bool;
}

/// A shared, type-erased checker.
pub type BoxedChecker = Arc<dyn Checker>;

impl<C: Checker + ?Sized> Checker for Arc<C> {
    fn check(&self, update: &Update) -> bool {
        (**self).check(update)
    }
}

// =============================================================================
// AnyChecker
// =============================================================================

/// Matches every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyChecker;

impl Checker for AnyChecker {
    fn check(&self, _update: &Update) -> bool {
        true
    }
}

// =============================================================================
// KindChecker
// =============================================================================

/// Matches updates of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindChecker {
    kind: UpdateType,
}

impl KindChecker {
    pub fn new(kind: UpdateType) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> UpdateType {
        self.kind
    }
}

impl Checker for KindChecker {
    fn check(&self, update: &Update) -> bool {
        update.update_type() == self.kind
    }
}

// =============================================================================
// CommandChecker
// =============================================================================

/// Matches `message` updates that invoke a bot command.
///
/// The text must be exactly `/{command}` or start with `/{command}` followed
/// by a space; `/startup` does not invoke `start`. Messages without text never
/// match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandChecker {
    command: String,
    trigger: String,
}

impl CommandChecker {
    /// Creates a checker for `command`, with or without its leading slash.
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        let command = command.trim_start_matches('/').to_string();
        let trigger = format!("/{command}");
        Self { command, trigger }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Checker for CommandChecker {
    fn check(&self, update: &Update) -> bool {
        let Some(text) = update.message().and_then(|m| m.text_str()) else {
            return false;
        };
        match text.strip_prefix(self.trigger.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with(' '),
            None => false,
        }
    }
}

// =============================================================================
// AndChecker
// =============================================================================

/// Matches when every child matches; stops at the first child that does not.
///
/// An empty `AndChecker` matches everything.
#[derive(Clone, Default)]
pub struct AndChecker {
    children: Vec<BoxedChecker>,
}

impl AndChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_checkers(children: Vec<BoxedChecker>) -> Self {
        Self { children }
    }

    /// Appends a child checker.
    pub fn and<C: Checker>(mut self, checker: C) -> Self {
        self.children.push(Arc::new(checker));
        self
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Checker for AndChecker {
    fn check(&self, update: &Update) -> bool {
        self.children.iter().all(|c| c.check(update))
    }
}

impl fmt::Debug for AndChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndChecker")
            .field("children", &self.children.len())
            .finish()
    }
}

// =============================================================================
// FnChecker
// =============================================================================

/// Adapts a closure into a [`Checker`].
#[derive(Clone)]
pub struct FnChecker<F>(F);

impl<F> Checker for FnChecker<F>
where
    F: Fn(&Update) -> bool + Send + Sync + 'static,
{
    fn check(&self, update: &Update) -> bool {
        (self.0)(update)
    }
}

/// Creates a checker from a closure.
pub fn checker_fn<F>(f: F) -> FnChecker<F>
where
    F: Fn(&Update) -> bool + Send + Sync + 'static,
{
    FnChecker(f)
}
