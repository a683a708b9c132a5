pub mod local;
pub mod traits;

pub use local::{content_type_for, is_image_file, is_safe_filename, LocalImageStorage};
pub use traits::ImageStorage;

/// Maximum number of entries returned by a gallery listing.
pub const LISTING_LIMIT: usize = 50;
