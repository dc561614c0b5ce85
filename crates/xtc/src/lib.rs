//! XML template compiler.
//!
//! Templates are parsed into an immutable expression tree, rewritten by a
//! fixed sequence of passes and lowered to Java. See [`compiler::compile`].

pub mod alert;
pub mod ast;
pub mod callable;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod message;
pub mod report;
pub mod schema;
pub mod source;
pub mod types;
pub mod visit;

#[cfg(test)]
mod testing;

pub use alert::{Alert, AlertKind, AlertSet, Severity};
pub use codegen::JavaCodeGenerator;
pub use compiler::{CompileContext, CompiledUnit, compile};
pub use config::CompilerConfig;
