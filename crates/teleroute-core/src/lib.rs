//! # teleroute core
//!
//! The data model and collaborator contracts the dispatch kernel is built on:
//!
//! - **Updates**: [`Update`], its tagged payload [`UpdateKind`] and the routing
//!   discriminant [`UpdateType`]
//! - **Update sources**: the pull contract [`UpdateSource`] with an in-process
//!   queue and a webhook-body implementation
//! - **API client**: the opaque outbound capability [`ApiClient`] handed to
//!   every handler
//!
//! Nothing in this crate knows about handlers or middleware; see
//! `teleroute-framework` for the kernel itself.

pub mod api;
pub mod error;
pub mod source;
pub mod update;

pub use api::{ApiClient, BoxedApiClient, NoopApiClient, downcast_client};
pub use error::{ApiError, ApiResult, SourceError, SourceResult};
pub use source::{QueueUpdateSource, UpdateSender, UpdateSource, WebhookUpdateSource};
pub use update::{Chat, Message, Update, UpdateKind, UpdateType, User};
