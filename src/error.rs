use crate::render::{RootId, SchedulerId};

/// Failure reported by the render runtime while rendering or re-rendering a root.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RenderError {
    message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced by renderers and the scheduler registry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulerError {
    #[error("render of root {root} failed: {source}")]
    Render {
        root: RootId,
        #[source]
        source: RenderError,
    },

    /// A renderer stayed invalid for more sweeps than its loop limit allows.
    /// The renderer has already been destroyed when this is returned.
    #[error(
        "infinite rendering invalidation detected: renderer {scheduler} was still invalid after {retries} retries"
    )]
    InfiniteInvalidation { scheduler: SchedulerId, retries: u32 },

    #[error("renderer {scheduler} has been destroyed")]
    Destroyed { scheduler: SchedulerId },

    #[error("cannot render view `{view}`: it has no layout template")]
    MissingTemplate { view: String },

    #[error("accessing the element of view `{view}` is not allowed in non-interactive environments")]
    InertElementAccess { view: String },
}

/// Programmer errors raised while resolving definitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error(
        "you attempted to overwrite the built-in helper \"{name}\" which is not allowed; please rename the helper"
    )]
    ShadowedBuiltinHelper { name: String },

    #[cfg(feature = "partials")]
    #[error("unable to find partial with name \"{name}\"")]
    MissingPartial { name: String },
}

/// The settle signal was dropped before every renderer became valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("settle signal was discarded before rendering settled")]
pub struct SettleError;
