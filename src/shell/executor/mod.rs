mod builtins;
#[allow(clippy::module_inception)]
mod executor;
mod launcher;
mod pipeline;
mod redirect;
mod resolver;
mod wait;

pub use executor::{Executor, Flow};
