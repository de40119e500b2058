pub mod layout;
pub mod marker_icon;
pub mod surface;

pub use layout::{LayoutOutcome, LayoutSynchronizer};
pub use marker_icon::{MarkerBitmap, MarkerIconError, MarkerIconSpec, MarkerIconSynthesizer};
pub use surface::{SurfaceError, SurfaceManager, SurfaceState};
