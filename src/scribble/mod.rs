pub mod canvas;
pub mod composite;
pub mod entities;
pub mod future;
pub mod gesture;
pub mod history;
pub mod jobs;
pub mod loader;
pub mod messages;
pub mod model;
pub mod overlay;
pub mod pipeline;
pub mod raster;
pub mod session;
pub mod settings;
pub mod settings_store;
pub mod state;
pub mod text;
pub mod transform;

pub use future::RenderFuture;
pub use gesture::{GestureEvent, GestureOutcome, PointerId};
pub use loader::{ImageLoader, ImageRef, MemoryPressure, TargetSize};
pub use model::{Color, EntityContent, EntityId, ImageContent, PaintMode, TextContent, TextStyle};
pub use overlay::{OverlayLayout, PointerOutcome, ScribbleOverlay, TextEditingHost};
pub use settings::OverlaySettings;
pub use transform::{Point, Size, Transform};
