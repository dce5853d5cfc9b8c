use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::instrument::{Instrumentation, NoopInstrumentation, Span, COMPONENT_DEFINITION};
use crate::stats;

use super::builtins::{builtin_helper, builtin_modifier, closest_platform_component};
#[cfg(feature = "partials")]
use super::definitions::PartialDefinition;
use super::definitions::{
    ClassicHelper, ComponentDefinition, ComponentState, HelperDefinition, Manager,
    ModifierDefinition,
};
use super::{Factory, IdentityToken, Owner, Template};

/// Resolves helpers, modifiers and components by name, caching component
/// definitions by the identity of the factory or template they came from.
pub struct Resolver {
    config: ResolverConfig,
    instrumentation: Rc<dyn Instrumentation>,
    components: RefCell<HashMap<IdentityToken, Rc<ComponentDefinition>>>,
    classic_helpers: RefCell<HashMap<IdentityToken, Rc<ClassicHelper>>>,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_instrumentation(config, Rc::new(NoopInstrumentation))
    }

    pub fn with_instrumentation(
        config: ResolverConfig,
        instrumentation: Rc<dyn Instrumentation>,
    ) -> Self {
        Self {
            config,
            instrumentation,
            components: RefCell::new(HashMap::new()),
            classic_helpers: RefCell::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a helper. Built-ins win; registering a helper under a
    /// built-in's name is an error.
    pub fn lookup_helper(
        &self,
        name: &str,
        owner: &dyn Owner,
    ) -> Result<Option<HelperDefinition>, ResolveError> {
        let full_name = format!("helper:{name}");

        if let Some(builtin) = builtin_helper(name) {
            if owner.has_registration(&full_name) {
                return Err(ResolveError::ShadowedBuiltinHelper {
                    name: name.to_string(),
                });
            }
            return Ok(Some(HelperDefinition::Builtin(builtin)));
        }

        let Some(factory) = owner.factory_for(&full_name) else {
            return Ok(None);
        };
        if factory.class().is_classic_helper() {
            return Ok(Some(HelperDefinition::Classic(self.classic_helper(factory))));
        }
        Ok(Some(HelperDefinition::Simple(factory)))
    }

    /// The adapter for a classic helper factory, created on first use.
    fn classic_helper(&self, factory: Rc<Factory>) -> Rc<ClassicHelper> {
        self.classic_helpers
            .borrow_mut()
            .entry(factory.token())
            .or_insert_with(|| {
                log::debug!("wrapping classic helper {}", factory.full_name());
                Rc::new(ClassicHelper::new(factory.clone()))
            })
            .clone()
    }

    pub fn lookup_modifier(&self, name: &str, owner: &dyn Owner) -> Option<ModifierDefinition> {
        if let Some(builtin) = builtin_modifier(name) {
            return Some(ModifierDefinition::Builtin(builtin));
        }
        owner
            .factory_for(&format!("modifier:{name}"))
            .map(ModifierDefinition::Registered)
    }

    /// Resolve a component from its class and template registrations.
    ///
    /// Returns the cached definition when the same factory (or, for
    /// class-less components, the same template) was resolved before.
    /// `None` means there is no such component.
    pub fn lookup_component(
        &self,
        name: &str,
        owner: &dyn Owner,
    ) -> Option<Rc<ComponentDefinition>> {
        let factory = owner.factory_for(&format!("component:{name}"));
        // An attached template shadows any separately registered one.
        let template = match factory.as_ref().and_then(|f| f.class().attached_template()) {
            Some(template) => Some(template),
            None => owner.template(&format!("template:components/{name}")),
        };

        let key = match (&factory, &template) {
            (Some(factory), _) => factory.token(),
            (None, Some(template)) => template.token(),
            (None, None) => {
                if let Some(hint) = self.missing_component_hint(name) {
                    log::warn!("{hint}");
                }
                return None;
            }
        };

        if let Some(definition) = self.components.borrow().get(&key).cloned() {
            stats::record_definition_cache_hit();
            return Some(definition);
        }
        stats::record_definition_cache_miss();

        let definition = {
            let _span = Span::enter(&*self.instrumentation, COMPONENT_DEFINITION, name);
            log::debug!("building component definition for `{name}`");
            Rc::new(self.build_component(name, factory, template))
        };

        Some(
            self.components
                .borrow_mut()
                .entry(key)
                .or_insert(definition)
                .clone(),
        )
    }

    fn build_component(
        &self,
        name: &str,
        factory: Option<Rc<Factory>>,
        template: Option<Rc<Template>>,
    ) -> ComponentDefinition {
        let (manager, state) = match factory {
            Some(factory) => (
                factory.class().manager().unwrap_or(Manager::CURLY),
                ComponentState::Class(factory),
            ),
            None if self.config.template_only_components => (
                Manager::TEMPLATE_ONLY,
                ComponentState::TemplateOnly {
                    name: name.to_string(),
                },
            ),
            None => (Manager::CURLY, ComponentState::DefaultCurly),
        };
        ComponentDefinition {
            name: name.to_string(),
            manager,
            state,
            template,
        }
    }

    /// A hint for names that look like a misspelled platform component.
    pub fn missing_component_hint(&self, name: &str) -> Option<String> {
        closest_platform_component(name).map(|suggestion| {
            format!(
                "could not find component named \"{name}\"; did you mean the built-in \"{suggestion}\" component?"
            )
        })
    }

    /// Number of cached component definitions.
    pub fn cached_components(&self) -> usize {
        self.components.borrow().len()
    }

    /// Resolve a partial template. `a/b/c` is tried as `a/b/_c` first.
    ///
    /// A non-empty name that matches no template is an error.
    #[cfg(feature = "partials")]
    pub fn lookup_partial(
        &self,
        name: &str,
        owner: &dyn Owner,
    ) -> Result<Option<PartialDefinition>, ResolveError> {
        if name.is_empty() {
            return Ok(None);
        }
        let template = owner
            .template(&format!("template:{}", underscored(name)))
            .or_else(|| owner.template(&format!("template:{name}")))
            .ok_or_else(|| ResolveError::MissingPartial {
                name: name.to_string(),
            })?;
        Ok(Some(PartialDefinition {
            name: name.to_string(),
            template,
        }))
    }

    #[cfg(feature = "partials")]
    pub fn has_partial(&self, name: &str, owner: &dyn Owner) -> bool {
        !name.is_empty()
            && (owner.has_registration(&format!("template:{}", underscored(name)))
                || owner.has_registration(&format!("template:{name}")))
    }
}

#[cfg(feature = "partials")]
fn underscored(name: &str) -> String {
    match name.rsplit_once('/') {
        Some((dir, base)) => format!("{dir}/_{base}"),
        None => format!("_{name}"),
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("components", &self.components.borrow().len())
            .field("classic_helpers", &self.classic_helpers.borrow().len())
            .finish_non_exhaustive()
    }
}
