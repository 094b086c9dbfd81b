pub mod export;
pub mod render;

pub use export::Exporter;
pub use render::{Letterhead, LayoutRow, TextRenderer, TripSheetLayout, TripSheetRenderer};
