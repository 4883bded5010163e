//! Shared fixtures for module system tests.

#![allow(dead_code)]

use cjsbox_core::{ExecError, Executor, ModuleScope};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

type Body = Box<dyn Fn(&mut ModuleScope<'_>) -> Result<(), ExecError>>;

/// Executor whose "source language" is a body name: the trimmed module
/// source selects a registered Rust closure.
#[derive(Default)]
pub struct ScriptedExecutor {
    bodies: HashMap<String, Body>,
    runs: Rc<RefCell<HashMap<String, usize>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(
        mut self,
        name: &str,
        body: impl Fn(&mut ModuleScope<'_>) -> Result<(), ExecError> + 'static,
    ) -> Self {
        self.bodies.insert(name.to_string(), Box::new(body));
        self
    }

    /// Handle to the per-body run counters; survives moving the executor.
    pub fn runs(&self) -> Runs {
        Runs(Rc::clone(&self.runs))
    }
}

impl Executor for ScriptedExecutor {
    fn execute(&self, source: &str, scope: &mut ModuleScope<'_>) -> Result<(), ExecError> {
        let name = source.trim();
        *self.runs.borrow_mut().entry(name.to_string()).or_default() += 1;
        let body = self
            .bodies
            .get(name)
            .ok_or_else(|| ExecError::syntax(format!("unknown body '{name}'")))?;
        body(scope)
    }
}

#[derive(Clone)]
pub struct Runs(Rc<RefCell<HashMap<String, usize>>>);

impl Runs {
    pub fn count(&self, name: &str) -> usize {
        self.0.borrow().get(name).copied().unwrap_or(0)
    }
}

/// A switch a body can consult to fail on demand.
#[derive(Clone, Default)]
pub struct Toggle(Rc<Cell<bool>>);

impl Toggle {
    pub fn set(&self, on: bool) {
        self.0.set(on);
    }

    pub fn get(&self) -> bool {
        self.0.get()
    }
}
