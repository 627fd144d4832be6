use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::detection::infrastructure::model_catalog::ModelSize;
use crate::pipeline::detect_frame_use_case::DetectFrameUseCase;

use super::messages::{Command, DetectionResult, FrameRequest, InboundMessage, Request};
use super::wire::{read_message, write_message};
use super::ProtocolError;

/// Why the serve loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shutdown {
    /// Input closed between messages.
    EndOfStream,
    /// The interrupt flag was raised.
    Interrupted,
    /// A message body was cut short or results could not be written.
    ChannelBroken,
}

/// What a signal handler should do when an interrupt arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptAction {
    /// No message is in flight; the process can exit immediately.
    ExitNow,
    /// A message is being handled; the loop stops once it is answered.
    FinishMessage,
}

/// Interrupt bookkeeping shared between the serve loop and a signal handler.
///
/// A blocked read is never woken by the signal, so an idle worker must exit
/// from the handler itself.
#[derive(Debug, Default)]
pub struct InterruptState {
    interrupted: AtomicBool,
    in_message: AtomicBool,
}

impl InterruptState {
    /// Record the interrupt and decide how to honour it.
    pub fn request(&self) -> InterruptAction {
        self.interrupted.store(true, Ordering::SeqCst);
        if self.in_message.load(Ordering::SeqCst) {
            InterruptAction::FinishMessage
        } else {
            InterruptAction::ExitNow
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    fn set_in_message(&self, busy: bool) {
        self.in_message.store(busy, Ordering::SeqCst);
    }
}

/// Strictly sequential request/response loop over one reader and writer.
///
/// Each message is read, handled and answered before the next one is read,
/// so results leave in the order their frames arrived.
pub struct WorkerChannel<R, W> {
    reader: R,
    writer: W,
    use_case: DetectFrameUseCase,
    interrupt: Arc<InterruptState>,
}

impl<R: Read, W: Write> WorkerChannel<R, W> {
    pub fn new(
        reader: R,
        writer: W,
        use_case: DetectFrameUseCase,
        interrupt: Arc<InterruptState>,
    ) -> Self {
        Self {
            reader,
            writer,
            use_case,
            interrupt,
        }
    }

    /// Serve until end of stream, interrupt, or a broken channel, then log
    /// the worker summary.
    ///
    /// Errors in a single message are logged and that message is skipped.
    pub fn serve(&mut self) -> Shutdown {
        let reason = self.serve_loop();
        self.use_case.finish();
        reason
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    fn serve_loop(&mut self) -> Shutdown {
        loop {
            if self.interrupt.is_interrupted() {
                log::info!("Worker interrupted");
                return Shutdown::Interrupted;
            }

            let body = match read_message(&mut self.reader) {
                Ok(Some(body)) => body,
                Ok(None) => {
                    log::info!("Input closed (EOF)");
                    return Shutdown::EndOfStream;
                }
                Err(e) => {
                    log::error!("{e}");
                    return Shutdown::ChannelBroken;
                }
            };

            self.interrupt.set_in_message(true);
            let written = match self.handle(&body) {
                Ok(Some(response)) => write_message(&mut self.writer, &response),
                Ok(None) => Ok(()),
                Err(e) => {
                    log::error!("Skipping message: {e}");
                    Ok(())
                }
            };
            self.interrupt.set_in_message(false);

            if let Err(e) = written {
                log::error!("Cannot write result: {e}");
                return Shutdown::ChannelBroken;
            }
        }
    }

    fn handle(&mut self, body: &[u8]) -> Result<Option<Vec<u8>>, ProtocolError> {
        match InboundMessage::decode(body)?.into_request()? {
            Request::Command(command) => {
                self.handle_command(command);
                Ok(None)
            }
            Request::Frame(request) => self.handle_frame(request).map(Some),
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetModelSize(raw) => {
                let size = match raw.as_deref().map(str::parse::<ModelSize>) {
                    Some(Ok(size)) => size,
                    _ => {
                        log::error!("Invalid model size: {raw:?}");
                        return;
                    }
                };
                log::info!("Hot-reloading model with size: {size}");
                match self.use_case.reload(size) {
                    Ok(reloaded) => log::info!(
                        "Model reloaded: {} -> {}",
                        file_name(&reloaded.previous),
                        file_name(&reloaded.current)
                    ),
                    Err(e) => log::error!("Failed to reload model: {e}"),
                }
            }
            Command::Unknown(name) => {
                log::warn!("Unknown command: {}", name.as_deref().unwrap_or("<none>"))
            }
        }
    }

    fn handle_frame(&mut self, request: FrameRequest) -> Result<Vec<u8>, ProtocolError> {
        let hint = request.meta.roi_hint();
        let outcome = self.use_case.execute(&request.frame, hint.as_ref())?;
        log::debug!(
            "Frame {}: {} person(s) detected in {:.1}ms (model: {}, suggested_roi: {:?})",
            request.meta.frame_seq(),
            outcome.detections.len(),
            outcome.timing.total_ms,
            outcome.label,
            outcome.suggested_roi
        );
        DetectionResult::new(&request.meta, &request.frame, &outcome).encode()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
