pub mod logging;
pub mod scribble;

pub use scribble::ScribbleOverlay;
