//! Name-to-definition resolution with an identity-keyed cache.
//!
//! A [`Resolver`] turns a symbolic name used in a template (a helper, a
//! modifier, a component, and with the `partials` feature a partial) into a
//! render-ready definition. Names are looked up through an [`Owner`], the
//! application's registry of factories and templates.
//!
//! Identity matters: two lookups for the same component must hand back the
//! same definition object, so component definitions are cached by the
//! [`IdentityToken`] of the factory (or template) they were built from.

mod builtins;
mod definitions;
mod lookup;
mod owner;

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use builtins::{BUILTIN_HELPERS, BUILTIN_MODIFIERS, PLATFORM_COMPONENTS};
#[cfg(feature = "partials")]
pub use definitions::PartialDefinition;
pub use definitions::{
    ClassicHelper, ComponentDefinition, ComponentState, HelperDefinition, Manager,
    ManagerCapabilities, ManagerKind, ModifierDefinition,
};
pub use lookup::Resolver;
pub use owner::MapOwner;

/// Stable identity of a factory or template, minted once at construction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct IdentityToken(u64);

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

impl IdentityToken {
    pub fn next() -> Self {
        IdentityToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// A compiled template.
#[derive(Debug)]
pub struct Template {
    token: IdentityToken,
    module_name: String,
}

impl Template {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            token: IdentityToken::next(),
            module_name: module_name.into(),
        }
    }

    pub fn token(&self) -> IdentityToken {
        self.token
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }
}

/// Capabilities a registered class exposes to the resolver.
pub trait ComponentClass {
    fn class_name(&self) -> &str;

    /// The manager registered for this class, if any.
    fn manager(&self) -> Option<Manager> {
        None
    }

    /// A template co-located with the class.
    fn attached_template(&self) -> Option<Rc<Template>> {
        None
    }

    /// Whether this is a classic callable-style helper.
    fn is_classic_helper(&self) -> bool {
        false
    }
}

/// A registered class together with the name it was registered under.
pub struct Factory {
    token: IdentityToken,
    full_name: String,
    class: Rc<dyn ComponentClass>,
}

impl Factory {
    pub fn new(full_name: impl Into<String>, class: Rc<dyn ComponentClass>) -> Self {
        Self {
            token: IdentityToken::next(),
            full_name: full_name.into(),
            class,
        }
    }

    pub fn token(&self) -> IdentityToken {
        self.token
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn class(&self) -> &Rc<dyn ComponentClass> {
        &self.class
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("token", &self.token)
            .field("full_name", &self.full_name)
            .field("class", &self.class.class_name())
            .finish()
    }
}

/// The application's registry, keyed by `type:name` strings such as
/// `component:x-foo` or `template:components/x-foo`.
pub trait Owner {
    /// Look up a registered value. Templates are stored as `Rc<Template>`.
    fn lookup(&self, full_name: &str) -> Option<Rc<dyn Any>>;

    fn factory_for(&self, full_name: &str) -> Option<Rc<Factory>>;

    /// Whether anything at all is registered under `full_name`.
    fn has_registration(&self, full_name: &str) -> bool;

    fn template(&self, full_name: &str) -> Option<Rc<Template>> {
        self.lookup(full_name)
            .and_then(|value| value.downcast::<Template>().ok())
    }
}
