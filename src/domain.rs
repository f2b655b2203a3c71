//! Domain module - core types of the harvesting pipeline
//!
//! Everything in here is pure: identifiers, descriptors, canonical products
//! and the fetch seam. No I/O happens in this layer.

pub mod ean;
pub mod listing;
pub mod product;
pub mod services;
pub mod shop_descriptor;
pub mod value_objects;

// Re-export commonly used items for convenience
pub use listing::{DescriptorRef, ListingPage};
pub use product::{CanonicalField, CanonicalProduct};
pub use services::{FetchError, ResourceFetcher};
pub use shop_descriptor::{CategoryItem, ColumnMapping, ShopDescriptor};
pub use value_objects::{ShopId, ShopIdAllocator};
