//! Command methods declared by component types
//!
//! Component types list their command methods by implementing
//! [`CommandMethods`]. The table is assembled once with
//! [`MethodTableBuilder`] and is read-only from then on. When two methods
//! claim the same command name the first one wins and the collision is
//! reported at build time.

use crate::commands::coercion::{Argument, ParamSpec};
use crate::errors::CommandError;
use crate::host::entities::{Component, ComponentType};
use crate::runtime::resume::ResumeHandle;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

type ImmediateBody = Arc<dyn Fn(&dyn Component, &[Argument]) -> bool + Send + Sync>;
type SuspendingBody = Arc<dyn Fn(&dyn Component, &[Argument], ResumeHandle) -> bool + Send + Sync>;

#[derive(Clone)]
enum MethodBody {
    Immediate(ImmediateBody),
    Suspending(SuspendingBody),
}

/// A command method bound to a component type
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    declaring_type: ComponentType,
    params: Vec<ParamSpec>,
    body: MethodBody,
}

impl MethodDescriptor {
    /// A method that finishes before returning
    pub fn immediate<T, F>(name: &str, params: Vec<ParamSpec>, method: F) -> Self
    where
        T: Component,
        F: Fn(&T, &[Argument]) + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            declaring_type: ComponentType::of::<T>(),
            params,
            body: MethodBody::Immediate(Arc::new(move |target: &dyn Component, args: &[Argument]| {
                match target.as_any().downcast_ref::<T>() {
                    Some(target) => {
                        method(target, args);
                        true
                    }
                    None => false,
                }
            })),
        }
    }

    /// A method that keeps running after it returns and resumes the
    /// dialogue through the handle when done
    pub fn suspending<T, F>(name: &str, params: Vec<ParamSpec>, method: F) -> Self
    where
        T: Component,
        F: Fn(&T, &[Argument], ResumeHandle) + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            declaring_type: ComponentType::of::<T>(),
            params,
            body: MethodBody::Suspending(Arc::new(
                move |target: &dyn Component, args: &[Argument], resume: ResumeHandle| {
                    match target.as_any().downcast_ref::<T>() {
                        Some(target) => {
                            method(target, args, resume);
                            true
                        }
                        None => false,
                    }
                },
            )),
        }
    }

    /// A method returning a future; the dialogue resumes when it completes
    pub fn task<T, F, Fut>(name: &str, params: Vec<ParamSpec>, method: F) -> Self
    where
        T: Component,
        F: Fn(&T, &[Argument]) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::suspending::<T, _>(name, params, move |target, args, resume| {
            resume.resume_after(method(target, args));
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_type(&self) -> ComponentType {
        self.declaring_type
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn is_suspending(&self) -> bool {
        matches!(self.body, MethodBody::Suspending(_))
    }

    /// Run the method on `target`. Returns false if `target` is not of the
    /// declaring type, in which case nothing ran and `resume` was dropped.
    pub(crate) fn invoke(
        &self,
        target: &dyn Component,
        args: &[Argument],
        resume: Option<ResumeHandle>,
    ) -> bool {
        match (&self.body, resume) {
            (MethodBody::Immediate(body), _) => body(target, args),
            (MethodBody::Suspending(body), Some(resume)) => body(target, args, resume),
            (MethodBody::Suspending(_), None) => {
                log::error!("suspending method '{}' invoked without a resume handle", self.name);
                false
            }
        }
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("declaring_type", &self.declaring_type)
            .field("params", &self.params)
            .field("suspending", &self.is_suspending())
            .finish()
    }
}

/// Implemented by component types that expose command methods
pub trait CommandMethods: Component + Sized {
    fn command_methods() -> Vec<MethodDescriptor>;
}

/// Read-only table of command methods, keyed by command name
#[derive(Debug, Default)]
pub struct MethodTable {
    methods: HashMap<String, MethodDescriptor>,
    collisions: Vec<CommandError>,
}

impl MethodTable {
    pub fn builder() -> MethodTableBuilder {
        MethodTableBuilder::default()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Collisions found while the table was built
    pub fn collisions(&self) -> &[CommandError] {
        &self.collisions
    }
}

#[derive(Default)]
pub struct MethodTableBuilder {
    table: MethodTable,
}

impl MethodTableBuilder {
    /// Add every method `T` declares
    pub fn component<T: CommandMethods>(self) -> Self {
        T::command_methods()
            .into_iter()
            .fold(self, |builder, method| builder.method(method))
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        match self.table.methods.get(method.name()) {
            Some(existing) => {
                let err = CommandError::InitializationCollision {
                    name: method.name().to_string(),
                    kept: existing.declaring_type().to_string(),
                    dropped: method.declaring_type().to_string(),
                };
                log::error!("{err}");
                self.table.collisions.push(err);
            }
            None => {
                log::trace!("command method {method:?}");
                self.table.methods.insert(method.name().to_string(), method);
            }
        }
        self
    }

    pub fn build(self) -> Arc<MethodTable> {
        log::debug!("command method table built with {} method(s)", self.table.len());
        Arc::new(self.table)
    }
}
