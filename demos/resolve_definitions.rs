//! Resolves helpers, modifiers, components and partials against an in-memory
//! owner, logging cache misses through `LogInstrumentation`.
//!
//! To run: RUST_LOG=debug cargo run --example resolve_definitions --features partials

use std::rc::Rc;

use vellum::prelude::*;
use vellum::resolver::{Manager, ManagerCapabilities};

struct DatePicker;

impl ComponentClass for DatePicker {
    fn class_name(&self) -> &str {
        "DatePicker"
    }

    fn manager(&self) -> Option<Manager> {
        Some(Manager::custom(
            ManagerCapabilities::CREATE_ARGS | ManagerCapabilities::WILL_DESTROY,
        ))
    }
}

struct FormatCurrency;

impl ComponentClass for FormatCurrency {
    fn class_name(&self) -> &str {
        "FormatCurrency"
    }

    fn is_classic_helper(&self) -> bool {
        true
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let owner = MapOwner::new();
    owner.register_factory("component:date-picker", Rc::new(DatePicker));
    owner.register_template(
        "template:components/date-picker",
        Rc::new(Template::new("components/date-picker")),
    );
    owner.register_template(
        "template:components/user-card",
        Rc::new(Template::new("components/user-card")),
    );
    owner.register_factory("helper:format-currency", Rc::new(FormatCurrency));
    owner.register_template("template:shared/_nav", Rc::new(Template::new("shared/_nav")));

    let resolver = Resolver::with_instrumentation(
        ResolverConfig::new().template_only_components(true),
        Rc::new(LogInstrumentation::new()),
    );

    for name in ["date-picker", "user-card", "date-picker", "inptu"] {
        match resolver.lookup_component(name, &owner) {
            Some(definition) => println!(
                "component {name}: {:?} manager, template {:?}",
                definition.manager.kind,
                definition.template.as_ref().map(|t| t.module_name())
            ),
            None => println!("component {name}: not found"),
        }
    }
    println!("{} component definitions cached", resolver.cached_components());

    for name in ["concat", "format-currency", "missing"] {
        println!("helper {name}: {:?}", resolver.lookup_helper(name, &owner)?);
    }
    println!("modifier on: {:?}", resolver.lookup_modifier("on", &owner));

    let partial = resolver.lookup_partial("shared/nav", &owner)?;
    println!(
        "partial shared/nav: {:?}",
        partial.map(|partial| partial.template.module_name().to_string())
    );
    if let Err(err) = resolver.lookup_partial("shared/footer", &owner) {
        println!("partial shared/footer: {err}");
    }

    Ok(())
}
