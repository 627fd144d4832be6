pub mod detect_frame_use_case;
pub mod worker_logger;
