//! World-to-screen projection and overlay draw command generation.

mod projection;
mod render;

pub use projection::{CameraPose, look_at, project};
pub use render::{Color, DrawCommand, DrawSink, EspRenderer, EspStyle, Viewport};
