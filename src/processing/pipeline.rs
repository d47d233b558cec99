use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Instant;

use crate::args::{ResolvedArgs, Scope, resolve};
use crate::error::{RecipeError, RecipeResult};
use crate::observability::{RecipeEvent, RecipeObserver};
use crate::types::DataSet;

use super::{OperationContext, OperationInvocation, OperationRegistry};

/// Named datasets kept between pipeline steps.
///
/// The base dataset is only ever borrowed; outputs of `keepState` steps are owned.
#[derive(Debug, Default)]
pub struct RetainedStates<'b> {
    states: HashMap<String, Cow<'b, DataSet>>,
}

impl<'b> RetainedStates<'b> {
    pub fn get(&self, name: &str) -> Option<&DataSet> {
        self.states.get(name).map(|s| s.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    /// State names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.states.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Take ownership of a state, cloning it if it is the borrowed base dataset.
    pub fn take(&mut self, name: &str) -> Option<DataSet> {
        self.states.remove(name).map(Cow::into_owned)
    }

    fn lookup(&self, name: &str) -> RecipeResult<&DataSet> {
        self.get(name).ok_or_else(|| RecipeError::StateNotFound {
            state: name.to_owned(),
        })
    }

    fn insert(&mut self, name: &str, state: Cow<'b, DataSet>) {
        self.states.insert(name.to_owned(), state);
    }
}

/// Runs operation invocations, in order, against a base dataset.
///
/// Every step reads the base dataset unless it names a `fromState`; outputs never chain
/// implicitly. The first step's name is an alias of the base dataset.
pub struct Pipeline<'r> {
    registry: &'r OperationRegistry,
    observer: Option<&'r dyn RecipeObserver>,
}

impl<'r> Pipeline<'r> {
    pub fn new(registry: &'r OperationRegistry) -> Self {
        Self {
            registry,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: &'r dyn RecipeObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Check every invocation before anything runs.
    pub fn validate(&self, invocations: &[OperationInvocation]) -> RecipeResult<()> {
        invocations
            .iter()
            .try_for_each(|inv| self.registry.validate(inv))
    }

    /// Run `invocations` against `base` and return the retained states.
    ///
    /// Stops at the first failing step.
    pub fn run<'b>(
        &self,
        base: &'b DataSet,
        invocations: &[OperationInvocation],
    ) -> RecipeResult<RetainedStates<'b>> {
        let mut states = RetainedStates::default();
        if let Some(first) = invocations.first() {
            states.insert(&first.name, Cow::Borrowed(base));
        }

        for invocation in invocations {
            self.step(base, invocation, &mut states)
                .map_err(|e| RecipeError::Operation {
                    name: invocation.name.clone(),
                    operation: invocation.operation.clone(),
                    source: Box::new(e),
                })?;
        }

        Ok(states)
    }

    fn step<'b>(
        &self,
        base: &'b DataSet,
        invocation: &OperationInvocation,
        states: &mut RetainedStates<'b>,
    ) -> RecipeResult<()> {
        let op = self.registry.lookup(invocation)?;

        let mut args = ResolvedArgs::new();
        for (name, node) in &invocation.args {
            args.insert(name, resolve(node, Scope::Operation)?);
        }

        let input = match invocation.source_state() {
            Some(state) => states.lookup(state)?,
            None => base,
        };

        self.emit(RecipeEvent::OperationStarted {
            name: invocation.name.clone(),
            operation: invocation.operation.clone(),
            from_state: invocation.source_state().map(str::to_owned),
            input_rows: input.row_count(),
        });

        let started = Instant::now();
        let ctx = OperationContext {
            observer: self.observer,
        };
        let output = op.execute(input, &args, ctx)?;

        self.emit(RecipeEvent::OperationFinished {
            name: invocation.name.clone(),
            output_rows: output.as_ref().map(DataSet::row_count),
            elapsed: started.elapsed(),
        });

        if let (true, Some(output)) = (invocation.keep_state, output) {
            self.emit(RecipeEvent::StateRetained {
                name: invocation.name.clone(),
                rows: output.row_count(),
            });
            states.insert(&invocation.name, Cow::Owned(output));
        }

        Ok(())
    }

    fn emit(&self, event: RecipeEvent) {
        if let Some(obs) = self.observer {
            obs.on_event(&event);
        }
    }
}
