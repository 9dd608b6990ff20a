//! Command handling: registration, method table, argument coercion and
//! dispatch

pub mod coercion;
pub mod dispatcher;
pub mod methods;
pub mod registry;

pub use coercion::{Argument, ParamKind, ParamSpec, ParameterCoercer};
pub use dispatcher::{CommandDispatcher, DispatchOutcome, UnhandledCommandListener};
pub use methods::{CommandMethods, MethodDescriptor, MethodTable, MethodTableBuilder};
pub use registry::{CommandHandler, CommandRegistry, NonPausingHandler, PausingHandler};
