//! # Sentigraph Classifier
//!
//! Remote sentiment classification for posts.
//!
//! Defines the [`SentimentClassifier`] boundary, the binary label mapping and
//! a Hugging Face inference client.

pub mod classifier;
pub mod huggingface;

pub use classifier::{
    parse_classification_response, Classification, SentimentClassifier, SentimentLabel, POSITIVE_THRESHOLD,
};
pub use huggingface::{ClassifierConfig, HuggingFaceClient};
