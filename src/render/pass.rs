// ABOUTME: Render pass marker shared between the renderer and its callbacks.
// ABOUTME: Collecting registers jobs; Resolving substitutes completed results.

/// Which of the two render passes is currently executing.
///
/// During `Collecting`, template callbacks register jobs and return
/// deterministic placeholders. During `Resolving`, every registered job has
/// completed and callbacks return real values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPass {
    Collecting,
    Resolving,
}
