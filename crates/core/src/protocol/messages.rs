use rmpv::Value;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::roi_hint::RoiHint;
use crate::pipeline::detect_frame_use_case::{FrameOutcome, StageTiming};
use crate::shared::constants::UNKNOWN_ID;
use crate::shared::frame::Frame;
use crate::shared::geometry::NormalizedRect;

use super::ProtocolError;

const COMMAND_TYPE: &str = "command";
const SET_MODEL_SIZE: &str = "set_model_size";
const RESULT_TYPE: &str = "person_detection";

/// Any inbound message before classification. Every field is optional so
/// that classification and validation happen in one place.
#[derive(Debug, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    command: Option<String>,
    params: Option<CommandParams>,
    frame_data: Option<ByteBuf>,
    width: Option<u32>,
    height: Option<u32>,
    meta: Option<FrameMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct CommandParams {
    size: Option<String>,
}

/// Caller identifiers and the optional ROI processing block.
///
/// Every field is opaque and echoed back as sent, whatever its type.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FrameMeta {
    pub instance_id: Option<Value>,
    pub room_id: Option<Value>,
    pub seq: Option<Value>,
    /// Unknown keys included.
    pub roi_processing: Option<Value>,
}

impl FrameMeta {
    /// `seq` as sent, or `0` when absent.
    pub fn frame_seq(&self) -> Value {
        self.seq.clone().unwrap_or(Value::from(0))
    }

    /// Model-selection hint carried in `roi_processing`, if it is a map.
    pub fn roi_hint(&self) -> Option<RoiHint> {
        let entries = self.roi_processing.as_ref()?.as_map()?;
        let field = |name: &str| {
            entries
                .iter()
                .find(|(key, _)| key.as_str() == Some(name))
                .map(|(_, value)| value)
        };
        Some(RoiHint {
            target_size: field("target_size").and_then(as_u32),
            crop_applied: field("crop_applied")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            num_rois: field("num_rois").and_then(as_u32).unwrap_or(0),
        })
    }
}

/// Integers, or floats with no fractional part, that fit in a `u32`.
fn as_u32(value: &Value) -> Option<u32> {
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        })
        .and_then(|n| u32::try_from(n).ok())
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Raw size argument; validated by the handler.
    SetModelSize(Option<String>),
    Unknown(Option<String>),
}

#[derive(Debug)]
pub struct FrameRequest {
    pub frame: Frame,
    pub meta: FrameMeta,
}

#[derive(Debug)]
pub enum Request {
    Command(Command),
    Frame(FrameRequest),
}

impl InboundMessage {
    pub fn decode(body: &[u8]) -> Result<Self, ProtocolError> {
        Ok(rmp_serde::from_slice(body)?)
    }

    /// Classify by `type` (absent means `"frame"`) and validate frames.
    pub fn into_request(self) -> Result<Request, ProtocolError> {
        if self.kind.as_deref() == Some(COMMAND_TYPE) {
            let command = match self.command {
                Some(name) if name == SET_MODEL_SIZE => {
                    Command::SetModelSize(self.params.and_then(|p| p.size))
                }
                other => Command::Unknown(other),
            };
            return Ok(Request::Command(command));
        }

        let (data, width, height) = match (self.frame_data, self.width, self.height) {
            (Some(data), Some(width), Some(height)) if width > 0 && height > 0 => {
                (data, width, height)
            }
            _ => return Err(ProtocolError::MissingFrameFields),
        };
        let frame = Frame::from_rgb(data.into_vec(), width, height)?;
        Ok(Request::Frame(FrameRequest {
            frame,
            meta: self.meta.unwrap_or_default(),
        }))
    }
}

/// Outbound `person_detection` message.
#[derive(Debug, Serialize)]
pub struct DetectionResult<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    instance_id: Value,
    room_id: Value,
    timestamp: String,
    frame_seq: Value,
    data: ResultData<'a>,
    timing: StageTiming,
    suggested_roi: Option<NormalizedRect>,
}

#[derive(Debug, Serialize)]
struct ResultData<'a> {
    detections: &'a [Detection],
    count: usize,
    metadata: ResultMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct ResultMetadata<'a> {
    processing_time_ms: f64,
    frame_width: u32,
    frame_height: u32,
    img_size: String,
    model_size: String,
    imgsz: u32,
    model_selected: &'a str,
    roi_attention: bool,
    roi_processing: Option<&'a Value>,
}

impl<'a> DetectionResult<'a> {
    pub fn new(meta: &'a FrameMeta, frame: &Frame, outcome: &'a FrameOutcome) -> Self {
        let resolution = outcome.resolution;
        Self {
            kind: RESULT_TYPE,
            instance_id: echo_or_unknown(&meta.instance_id),
            room_id: echo_or_unknown(&meta.room_id),
            timestamp: utc_timestamp(),
            frame_seq: meta.frame_seq(),
            data: ResultData {
                detections: &outcome.detections,
                count: outcome.detections.len(),
                metadata: ResultMetadata {
                    processing_time_ms: outcome.timing.total_ms,
                    frame_width: frame.width(),
                    frame_height: frame.height(),
                    img_size: format!("{resolution}x{resolution}"),
                    model_size: outcome.model_size.to_string(),
                    imgsz: resolution,
                    model_selected: &outcome.label,
                    roi_attention: meta.roi_processing.is_some(),
                    roi_processing: meta.roi_processing.as_ref(),
                },
            },
            timing: outcome.timing,
            suggested_roi: outcome.suggested_roi,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }
}

fn echo_or_unknown(field: &Option<Value>) -> Value {
    field.clone().unwrap_or_else(|| Value::from(UNKNOWN_ID))
}

/// Current UTC time as ISO-8601 with microseconds and a trailing `Z`.
fn utc_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.6fZ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::infrastructure::model_catalog::{ModelSize, SizeTag};
    use crate::shared::geometry::BoundingBox;

    fn encode(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, value).unwrap();
        buf
    }

    fn map(entries: Vec<(&str, Value)>) -> Value {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::from(k), v))
                .collect(),
        )
    }

    fn lookup<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
        value
            .as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    fn request(value: Value) -> Result<Request, ProtocolError> {
        InboundMessage::decode(&encode(&value))?.into_request()
    }

    #[test]
    fn test_frame_without_type_is_frame_request() {
        let msg = map(vec![
            ("frame_data", Value::Binary(vec![0; 12])),
            ("width", Value::from(2)),
            ("height", Value::from(2)),
            (
                "meta",
                map(vec![
                    ("instance_id", Value::from("cam-1")),
                    ("seq", Value::from(7)),
                    ("timestamp", Value::from("2025-01-01T00:00:00Z")),
                ]),
            ),
        ]);
        let Request::Frame(req) = request(msg).unwrap() else {
            panic!("expected frame request");
        };
        assert_eq!(req.frame.width(), 2);
        assert_eq!(req.meta.instance_id, Some(Value::from("cam-1")));
        assert_eq!(req.meta.room_id, None);
        assert_eq!(req.meta.frame_seq(), Value::from(7));
        assert!(req.meta.roi_hint().is_none());
    }

    #[test]
    fn test_frame_missing_width_is_rejected() {
        let msg = map(vec![
            ("type", Value::from("frame")),
            ("frame_data", Value::Binary(vec![0; 12])),
            ("height", Value::from(2)),
        ]);
        assert!(matches!(
            request(msg),
            Err(ProtocolError::MissingFrameFields)
        ));
    }

    #[test]
    fn test_meta_identifiers_of_any_type_are_kept() {
        let msg = map(vec![
            ("frame_data", Value::Binary(vec![0; 12])),
            ("width", Value::from(2)),
            ("height", Value::from(2)),
            (
                "meta",
                map(vec![
                    ("instance_id", Value::from(7)),
                    ("seq", Value::from("12345")),
                ]),
            ),
        ]);
        let Request::Frame(req) = request(msg).unwrap() else {
            panic!("expected frame request");
        };
        assert_eq!(req.meta.instance_id, Some(Value::from(7)));
        assert_eq!(req.meta.frame_seq(), Value::from("12345"));
        assert_eq!(FrameMeta::default().frame_seq(), Value::from(0));
    }

    #[test]
    fn test_frame_length_mismatch_is_rejected() {
        let msg = map(vec![
            ("frame_data", Value::Binary(vec![0; 11])),
            ("width", Value::from(2)),
            ("height", Value::from(2)),
        ]);
        assert!(matches!(request(msg), Err(ProtocolError::Frame(_))));
    }

    #[test]
    fn test_non_map_body_is_malformed() {
        let err = InboundMessage::decode(&[0xc1]).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_set_model_size_command() {
        let msg = map(vec![
            ("type", Value::from("command")),
            ("command", Value::from("set_model_size")),
            ("params", map(vec![("size", Value::from("m"))])),
        ]);
        let Request::Command(command) = request(msg).unwrap() else {
            panic!("expected command");
        };
        assert_eq!(command, Command::SetModelSize(Some("m".into())));
    }

    #[test]
    fn test_unknown_command() {
        let msg = map(vec![
            ("type", Value::from("command")),
            ("command", Value::from("warm_up")),
        ]);
        let Request::Command(command) = request(msg).unwrap() else {
            panic!("expected command");
        };
        assert_eq!(command, Command::Unknown(Some("warm_up".into())));
    }

    #[test]
    fn test_roi_hint_parsing() {
        let meta = FrameMeta {
            roi_processing: Some(map(vec![
                ("target_size", Value::from(320.0)),
                ("crop_applied", Value::from(true)),
                ("num_rois", Value::from(2)),
            ])),
            ..FrameMeta::default()
        };
        let hint = meta.roi_hint().unwrap();
        assert_eq!(hint.target_size, Some(320));
        assert!(hint.crop_applied);
        assert_eq!(hint.num_rois, 2);
    }

    #[test]
    fn test_roi_hint_without_target_size() {
        let meta = FrameMeta {
            roi_processing: Some(map(vec![("crop_applied", Value::from(false))])),
            ..FrameMeta::default()
        };
        assert_eq!(meta.roi_hint(), Some(RoiHint::default()));
    }

    #[test]
    fn test_result_encoding() {
        let roi_processing = map(vec![
            ("target_size", Value::from(320)),
            ("extra", Value::from("kept")),
        ]);
        let meta = FrameMeta {
            instance_id: None,
            room_id: Some(Value::from("lobby")),
            seq: Some(Value::from(42)),
            roi_processing: Some(roi_processing.clone()),
        };
        let frame = Frame::from_rgb(vec![0; 4 * 2 * 3], 4, 2).unwrap();
        let outcome = FrameOutcome {
            detections: vec![Detection::new(BoundingBox::new(1, 0, 2, 2), 0.75)],
            suggested_roi: None,
            resolution: 320,
            label: "320".into(),
            model_size: SizeTag::Known(ModelSize::Nano),
            timing: StageTiming {
                total_ms: 3.5,
                ..StageTiming::default()
            },
        };

        let bytes = DetectionResult::new(&meta, &frame, &outcome).encode().unwrap();
        let value = rmpv::decode::read_value(&mut bytes.as_slice()).unwrap();

        assert_eq!(lookup(&value, "type").and_then(Value::as_str), Some("person_detection"));
        assert_eq!(lookup(&value, "instance_id").and_then(Value::as_str), Some("unknown"));
        assert_eq!(lookup(&value, "room_id").and_then(Value::as_str), Some("lobby"));
        assert_eq!(lookup(&value, "frame_seq").and_then(Value::as_u64), Some(42));
        assert!(lookup(&value, "suggested_roi").is_some_and(Value::is_nil));

        let timestamp = lookup(&value, "timestamp").and_then(Value::as_str).unwrap();
        assert!(timestamp.ends_with('Z'));
        assert!(chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.fZ").is_ok());

        let data = lookup(&value, "data").unwrap();
        assert_eq!(lookup(data, "count").and_then(Value::as_u64), Some(1));
        let detection = &lookup(data, "detections").and_then(Value::as_array).unwrap()[0];
        let bbox = lookup(detection, "bbox").unwrap();
        assert_eq!(lookup(bbox, "x").and_then(Value::as_i64), Some(1));
        assert_eq!(lookup(bbox, "width").and_then(Value::as_i64), Some(2));

        let metadata = lookup(data, "metadata").unwrap();
        assert_eq!(lookup(metadata, "img_size").and_then(Value::as_str), Some("320x320"));
        assert_eq!(lookup(metadata, "imgsz").and_then(Value::as_u64), Some(320));
        assert_eq!(lookup(metadata, "model_size").and_then(Value::as_str), Some("n"));
        assert_eq!(lookup(metadata, "model_selected").and_then(Value::as_str), Some("320"));
        assert_eq!(lookup(metadata, "roi_attention").and_then(Value::as_bool), Some(true));
        assert_eq!(lookup(metadata, "frame_width").and_then(Value::as_u64), Some(4));
        assert_eq!(lookup(metadata, "processing_time_ms").and_then(Value::as_f64), Some(3.5));
        assert_eq!(lookup(metadata, "roi_processing"), Some(&roi_processing));

        let timing = lookup(&value, "timing").unwrap();
        assert_eq!(lookup(timing, "total_ms").and_then(Value::as_f64), Some(3.5));
    }
}
