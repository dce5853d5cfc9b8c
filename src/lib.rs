//! Incremental render scheduling driven by a revision clock.
//!
//! A [`Renderer`](render::Renderer) owns the render roots of one surface. It
//! renders them inside runtime transactions and records the clock revision it
//! committed. Renderers holding roots join the scheduler
//! [`registry`](render::registry), which hooks into the host [`RunLoop`]: each
//! cycle every member revalidates, and the end-of-cycle sweep keeps cycling
//! until every renderer is valid, destroying any that never settle.
//!
//! Template names are resolved to definitions by a [`Resolver`], which caches
//! component definitions by the identity of the factory or template they were
//! built from.

pub mod clock;
pub mod config;
pub mod error;
pub mod instrument;
pub mod render;
pub mod resolver;
pub mod runloop;
pub mod stats;

pub use clock::{Revision, RevisionClock, Tracked};
pub use config::{RenderMode, RendererConfig, ResolverConfig};
pub use error::{RenderError, ResolveError, SchedulerError, SettleError};
pub use resolver::Resolver;
pub use runloop::{HostLoop, RunLoop};

pub mod prelude {
    pub use crate::clock::{Revision, RevisionClock, Tracked};
    pub use crate::config::{RenderMode, RendererConfig, ResolverConfig};
    pub use crate::error::{RenderError, ResolveError, SchedulerError, SettleError};
    pub use crate::instrument::{Instrumentation, LogInstrumentation, NoopInstrumentation};
    pub use crate::render::registry::settle;
    pub use crate::render::{
        AttachPoint, RenderIterator, RenderResult, RenderRoot, RenderRuntime, Renderer,
        RerenderOptions, RootFrame, RootOwner, Settled,
    };
    pub use crate::resolver::{
        ComponentClass, ComponentDefinition, Factory, HelperDefinition, MapOwner,
        ModifierDefinition, Owner, Resolver, Template,
    };
    pub use crate::runloop::{HostLoop, Queue, RunLoop};
}
