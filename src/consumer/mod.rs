//! UI consumer: display accumulation and rendering.

mod debounce;
mod display;
mod render;

pub use debounce::Debouncer;
pub use display::{DisplayPhase, DisplayState};
pub use render::render_markup;
