#[cfg(feature = "batched-nms")]
pub mod batched_suppressor;
pub mod letterbox;
pub mod model_catalog;
pub mod model_sessions;
pub mod onnx_engine;
pub mod suppressor_factory;
pub mod yolo_decoder;
