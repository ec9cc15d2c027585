//! Public types for the genpipe API.

mod request;
mod result;

pub use request::{GenerationRequest, Input, ModelSelector, ModelSize};
pub use result::{GenerationResult, Usage};
