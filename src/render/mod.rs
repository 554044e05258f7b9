// ABOUTME: Template rendering: the two-pass collect/resolve protocol.
// ABOUTME: Exposes the templater, its pass marker and error type.

mod error;
mod pass;
mod templater;

pub use error::RenderError;
pub use pass::RenderPass;
pub use templater::{Templater, UrlBuilder};
