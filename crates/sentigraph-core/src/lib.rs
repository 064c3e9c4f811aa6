//! Sentigraph Core Library
//!
//! Domain records, content-addressed identity and row normalization for the
//! market-data / social-post graph pipeline.

pub mod config;
pub mod error;
pub mod identity;
pub mod model;
pub mod normalize;
pub mod window;

pub use config::SourcePaths;
pub use error::{SentigraphError, SentigraphResult};
pub use identity::{derive_post_id, PostId};
pub use model::{PostRow, PriceRow, SentimentScore, SentimentUpdate};
pub use normalize::Fields;
pub use window::DateWindow;
