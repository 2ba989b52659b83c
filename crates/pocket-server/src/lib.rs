//! pocket-server: the demo application
//!
//! Route table for the `tarefa` and `usuario` collections, the CPF
//! validator and the calculator, plus CLI configuration and logging setup
//! for the `pocket` binary.

#![forbid(unsafe_code)]

pub mod app;
pub mod cli;
pub mod logging;

pub use app::build_dispatcher;
pub use cli::Cli;
pub use logging::setup_tracing;
