/// Default minimum target-class confidence for a proposal to survive decoding.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
pub const NMS_IOU_THRESHOLD: f64 = 0.45;

/// Fallback model input resolution when the model's input shape is dynamic.
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Per-channel value of the letterbox border (YOLO convention).
pub const LETTERBOX_PAD_VALUE: u8 = 114;

/// Fraction of the enclosing box's own size added around a suggested ROI.
pub const ROI_EXPANSION: f64 = 0.15;

/// Box coordinates preceding the class scores in every proposal row.
pub const BOX_COORDS: usize = 4;

/// Column of the target (person) class among the class scores.
pub const TARGET_CLASS_INDEX: usize = 0;

/// Recognised model families, in the order filenames are matched against them.
pub const MODEL_FAMILIES: &[&str] = &["yolo11", "yolov8"];

/// Size tag reported for models whose filename matches no known family.
pub const UNKNOWN_SIZE_TAG: &str = "unknown";

/// Placeholder for missing identifiers in frame metadata.
pub const UNKNOWN_ID: &str = "unknown";
