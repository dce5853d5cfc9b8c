use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{ComponentClass, Factory, Owner, Template};

/// In-memory [`Owner`] backed by hash maps.
#[derive(Default)]
pub struct MapOwner {
    factories: RefCell<HashMap<String, Rc<Factory>>>,
    values: RefCell<HashMap<String, Rc<dyn Any>>>,
}

impl MapOwner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `class` under `full_name` and return the factory that wraps it.
    pub fn register_factory(
        &self,
        full_name: &str,
        class: Rc<dyn ComponentClass>,
    ) -> Rc<Factory> {
        let factory = Rc::new(Factory::new(full_name, class));
        self.factories
            .borrow_mut()
            .insert(full_name.to_string(), factory.clone());
        factory
    }

    /// Register a template under `full_name`, e.g. `template:components/x-foo`.
    pub fn register_template(&self, full_name: &str, template: Rc<Template>) {
        self.register_value(full_name, template);
    }

    pub fn register_value(&self, full_name: &str, value: Rc<dyn Any>) {
        self.values.borrow_mut().insert(full_name.to_string(), value);
    }

    pub fn unregister(&self, full_name: &str) {
        self.factories.borrow_mut().remove(full_name);
        self.values.borrow_mut().remove(full_name);
    }
}

impl Owner for MapOwner {
    fn lookup(&self, full_name: &str) -> Option<Rc<dyn Any>> {
        self.values.borrow().get(full_name).cloned()
    }

    fn factory_for(&self, full_name: &str) -> Option<Rc<Factory>> {
        self.factories.borrow().get(full_name).cloned()
    }

    fn has_registration(&self, full_name: &str) -> bool {
        self.factories.borrow().contains_key(full_name)
            || self.values.borrow().contains_key(full_name)
    }
}
