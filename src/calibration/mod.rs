pub mod annotate;
pub mod scene;
