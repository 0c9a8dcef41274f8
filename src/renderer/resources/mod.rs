/// "Resources" refers to middle-level objects that are created by the contexts.
/// They are relatively intuitive and managed by the user.

pub mod descriptor;
pub mod draw_command;
pub mod shader;
