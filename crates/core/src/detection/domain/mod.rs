pub mod detection;
pub mod inference_engine;
pub mod roi_advisor;
pub mod roi_hint;
pub mod suppressor;
