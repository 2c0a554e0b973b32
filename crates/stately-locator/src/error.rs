use stately_core::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("tried to read {type_name} from the locator, but nothing provides it")]
    DependencyNotFound { type_name: &'static str },

    /// The direct resolver was used inside `update`, where only the `watch`
    /// locator may be read.
    #[error("cannot read {type_name} through the resolver during `update`; read it from `watch`")]
    IllegalReadDuringUpdate { type_name: &'static str },

    #[error(transparent)]
    State(#[from] StateError),
}
