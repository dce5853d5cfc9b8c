use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use super::{Factory, Template};

bitflags! {
    /// What a component manager needs from the runtime.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ManagerCapabilities: u16 {
        const DYNAMIC_LAYOUT  = 1 << 0;
        const DYNAMIC_TAG     = 1 << 1;
        const PREPARE_ARGS    = 1 << 2;
        const CREATE_ARGS     = 1 << 3;
        const ATTRIBUTE_HOOK  = 1 << 4;
        const ELEMENT_HOOK    = 1 << 5;
        const DYNAMIC_SCOPE   = 1 << 6;
        const CREATE_CALLER   = 1 << 7;
        const UPDATE_HOOK     = 1 << 8;
        const CREATE_INSTANCE = 1 << 9;
        const WILL_DESTROY    = 1 << 10;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ManagerKind {
    /// The classic class-based component manager.
    Curly,
    /// Components that are only a template.
    TemplateOnly,
    /// A manager registered by the application.
    Custom,
}

/// Governs how a component definition is instantiated and updated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Manager {
    pub kind: ManagerKind,
    pub capabilities: ManagerCapabilities,
}

impl Manager {
    pub const CURLY: Manager = Manager {
        kind: ManagerKind::Curly,
        capabilities: ManagerCapabilities::DYNAMIC_LAYOUT
            .union(ManagerCapabilities::DYNAMIC_TAG)
            .union(ManagerCapabilities::PREPARE_ARGS)
            .union(ManagerCapabilities::CREATE_ARGS)
            .union(ManagerCapabilities::ATTRIBUTE_HOOK)
            .union(ManagerCapabilities::ELEMENT_HOOK)
            .union(ManagerCapabilities::DYNAMIC_SCOPE)
            .union(ManagerCapabilities::CREATE_CALLER)
            .union(ManagerCapabilities::UPDATE_HOOK)
            .union(ManagerCapabilities::CREATE_INSTANCE)
            .union(ManagerCapabilities::WILL_DESTROY),
    };

    pub const TEMPLATE_ONLY: Manager = Manager {
        kind: ManagerKind::TemplateOnly,
        capabilities: ManagerCapabilities::empty(),
    };

    pub fn custom(capabilities: ManagerCapabilities) -> Self {
        Self {
            kind: ManagerKind::Custom,
            capabilities,
        }
    }

    pub fn has(&self, capability: ManagerCapabilities) -> bool {
        self.capabilities.contains(capability)
    }
}

/// The state a component manager is handed when instantiating a definition.
#[derive(Clone, Debug)]
pub enum ComponentState {
    /// Backed by a registered class.
    Class(Rc<Factory>),
    /// Template-only component with no backing class.
    TemplateOnly { name: String },
    /// Template with no class, rendered through the default curly component.
    DefaultCurly,
}

/// A render-ready component: a manager, its state and an optional template.
#[derive(Debug)]
pub struct ComponentDefinition {
    pub name: String,
    pub manager: Manager,
    pub state: ComponentState,
    pub template: Option<Rc<Template>>,
}

impl ComponentDefinition {
    pub fn factory(&self) -> Option<&Rc<Factory>> {
        match &self.state {
            ComponentState::Class(factory) => Some(factory),
            ComponentState::TemplateOnly { .. } | ComponentState::DefaultCurly => None,
        }
    }
}

/// Adapter giving a classic callable-style helper the simple helper shape.
#[derive(Debug)]
pub struct ClassicHelper {
    factory: Rc<Factory>,
}

impl ClassicHelper {
    pub(crate) fn new(factory: Rc<Factory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &Rc<Factory> {
        &self.factory
    }
}

#[derive(Clone)]
pub enum HelperDefinition {
    Builtin(&'static str),
    /// A class-based helper, wrapped once per factory.
    Classic(Rc<ClassicHelper>),
    /// A plain function helper.
    Simple(Rc<Factory>),
}

impl HelperDefinition {
    pub fn is_builtin(&self) -> bool {
        matches!(self, HelperDefinition::Builtin(_))
    }
}

impl fmt::Debug for HelperDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HelperDefinition::Builtin(name) => f.debug_tuple("Builtin").field(name).finish(),
            HelperDefinition::Classic(helper) => f
                .debug_tuple("Classic")
                .field(&helper.factory().full_name())
                .finish(),
            HelperDefinition::Simple(factory) => {
                f.debug_tuple("Simple").field(&factory.full_name()).finish()
            }
        }
    }
}

#[derive(Clone, Debug)]
pub enum ModifierDefinition {
    Builtin(&'static str),
    Registered(Rc<Factory>),
}

/// A partial template resolved by name.
#[cfg(feature = "partials")]
#[derive(Clone, Debug)]
pub struct PartialDefinition {
    pub name: String,
    pub template: Rc<Template>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_capabilities() {
        assert!(Manager::CURLY.has(ManagerCapabilities::DYNAMIC_LAYOUT));
        assert!(Manager::CURLY.has(ManagerCapabilities::WILL_DESTROY | ManagerCapabilities::DYNAMIC_SCOPE));
        assert!(Manager::TEMPLATE_ONLY.capabilities.is_empty());
        assert_eq!(
            Manager::custom(ManagerCapabilities::CREATE_ARGS).kind,
            ManagerKind::Custom
        );
    }
}
