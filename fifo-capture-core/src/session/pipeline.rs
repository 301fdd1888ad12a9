use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::models::capture_report::CaptureReport;
use crate::models::config::{CaptureConfig, MAX_CHUNK_SIZE};
use crate::models::error::CaptureError;
use crate::models::outcome::TransferOutcome;
use crate::models::state::PipelineState;
use crate::processing::double_buffer::DoubleBuffer;
use crate::processing::marker_framer::MarkerFramer;
use crate::storage::atomic_writer::{AtomicFileSink, AtomicFileWriter};
use crate::storage::medium::StorageMedium;
use crate::storage::metadata;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::chunk_sink::{CallbackSink, ChunkSink, SinkControl};
use crate::traits::chunked_source::ChunkedSource;
use crate::traits::config_provider::ConfigProvider;
use crate::traits::scheduler::{Scheduler, ThreadScheduler};

/// One in-flight capture. Lives from trigger to the terminal state.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    pub total_length: u32,
    pub bytes_transferred: u32,
    pub chunk_size: usize,
    pub deadline: Instant,
    started: Instant,
}

impl CaptureSession {
    fn new(chunk_size: usize, timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            total_length: 0,
            bytes_transferred: 0,
            chunk_size,
            deadline: started + timeout,
            started,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.total_length.saturating_sub(self.bytes_transferred)
    }

    pub fn is_past_deadline(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn next_chunk_len(&self) -> usize {
        self.chunk_size.min(self.remaining() as usize)
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Internal mutable pipeline state, protected by `parking_lot::Mutex`.
struct SessionState {
    state: PipelineState,
    last_report: Option<CaptureReport>,
}

/// Transfer buffers owned for the pipeline's lifetime.
struct TransferBuffers {
    double: DoubleBuffer,
    scratch: Box<[u8]>,
}

impl TransferBuffers {
    fn new(capacity: usize) -> Self {
        Self {
            double: DoubleBuffer::new(capacity),
            scratch: vec![0u8; MAX_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// Reallocates only when the configured capacity changed since last capture.
    fn prepare(&mut self, capacity: usize) {
        if self.double.capacity() != capacity {
            log::debug!(
                "resizing transfer buffers {} -> {} bytes",
                self.double.capacity(),
                capacity
            );
            self.double = DoubleBuffer::new(capacity);
        }
        self.double.reset();
    }
}

/// Running tally of bytes the sink accepted.
struct Delivery {
    bytes_written: u32,
    stopped_early: bool,
    hasher: Sha256,
}

impl Delivery {
    fn new() -> Self {
        Self {
            bytes_written: 0,
            stopped_early: false,
            hasher: Sha256::new(),
        }
    }

    fn record(&mut self, chunk: &[u8]) {
        self.bytes_written += chunk.len() as u32;
        self.hasher.update(chunk);
    }
}

/// Clears the in-flight flag when a capture returns, even by unwinding.
struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Capture-to-storage orchestrator.
///
/// Generic over the hardware source via `ChunkedSource` and the storage
/// medium via `StorageMedium`. Data flow:
/// ```text
/// [ChunkedSource] → scratch → [MarkerFramer?] → [DoubleBuffer] → [ChunkSink]
///                                                                  ├ AtomicFileSink
///                                                                  ├ WireStreamSink
///                                                                  └ CallbackSink
/// ```
///
/// A capture runs to completion on the calling thread. The pipeline takes
/// `&self` so it can be shared, but only one capture is in flight at a time:
/// a second call while one is active returns [`TransferOutcome::Reentrant`].
pub struct CapturePipeline<S: ChunkedSource, M: StorageMedium> {
    source: Mutex<S>,
    writer: Mutex<AtomicFileWriter<M>>,
    buffers: Mutex<TransferBuffers>,
    config: Arc<dyn ConfigProvider>,
    scheduler: Arc<dyn Scheduler>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
    session_state: Mutex<SessionState>,
    active: AtomicBool,
}

impl<S: ChunkedSource, M: StorageMedium> CapturePipeline<S, M> {
    pub fn new(source: S, medium: M, config: impl ConfigProvider + 'static) -> Self {
        let config: Arc<dyn ConfigProvider> = Arc::new(config);
        let capacity = config.capture_config().normalized().buffer_capacity();
        Self {
            source: Mutex::new(source),
            writer: Mutex::new(AtomicFileWriter::new(medium)),
            buffers: Mutex::new(TransferBuffers::new(capacity)),
            config,
            scheduler: Arc::new(ThreadScheduler),
            delegate: None,
            session_state: Mutex::new(SessionState {
                state: PipelineState::Idle,
                last_report: None,
            }),
            active: AtomicBool::new(false),
        }
    }

    /// Replace the yield hook used between readiness polls.
    pub fn with_scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Arc::new(scheduler);
        self
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> PipelineState {
        self.session_state.lock().state.clone()
    }

    /// Report of the most recent successful capture.
    pub fn last_report(&self) -> Option<CaptureReport> {
        self.session_state.lock().last_report.clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn into_source(self) -> S {
        self.source.into_inner()
    }

    /// Capture into `final_path` so that it is either fully written or untouched.
    ///
    /// `timeout` overrides the configured timeout for this call only.
    pub fn capture_to_file(
        &self,
        final_path: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> TransferOutcome {
        let final_path = final_path.as_ref();
        self.exclusive(|config| {
            let mut writer = self.writer.lock();
            let (outcome, report) = {
                let mut sink = AtomicFileSink::new(&mut writer, final_path);
                self.run_session(&config, &mut sink, Some(final_path), timeout)
            };

            if let Some(report) = report.filter(|_| config.write_metadata) {
                match metadata::write_metadata(&mut writer, &report, final_path) {
                    Ok(path) => self.status(&format!("metadata written to {}", path.display())),
                    Err(e) => {
                        log::warn!("capture stored but metadata sidecar failed: {}", e);
                        self.status(&format!("metadata not written: {}", e));
                    }
                }
            }
            outcome
        })
    }

    /// Capture into a callback; returning [`SinkControl::Stop`] ends the
    /// transfer successfully with the bytes accepted so far.
    pub fn capture_with<F>(&self, callback: F, timeout: Option<Duration>) -> TransferOutcome
    where
        F: FnMut(&[u8]) -> SinkControl,
    {
        let mut sink = CallbackSink::new(callback);
        self.capture_into(&mut sink, timeout)
    }

    /// Capture into any [`ChunkSink`].
    pub fn capture_into(&self, sink: &mut dyn ChunkSink, timeout: Option<Duration>) -> TransferOutcome {
        self.exclusive(|config| self.run_session(&config, sink, None, timeout).0)
    }

    // --- Internal helpers ---

    fn exclusive(&self, f: impl FnOnce(CaptureConfig) -> TransferOutcome) -> TransferOutcome {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("capture requested while another capture is in flight");
            self.status("capture rejected: another capture is in progress");
            return TransferOutcome::Reentrant;
        }
        let _active = ActiveGuard(&self.active);
        f(self.config.capture_config().normalized())
    }

    fn run_session(
        &self,
        config: &CaptureConfig,
        sink: &mut dyn ChunkSink,
        file_path: Option<&Path>,
        timeout: Option<Duration>,
    ) -> (TransferOutcome, Option<CaptureReport>) {
        let timeout = timeout.unwrap_or_else(|| config.timeout());
        let mut session = CaptureSession::new(config.chunk_size, timeout);
        self.set_state(PipelineState::Triggered);
        self.status(&format!("capture triggered, deadline in {} ms", timeout.as_millis()));

        let result = {
            let mut source = self.source.lock();
            let mut buffers = self.buffers.lock();
            buffers.prepare(config.buffer_capacity());

            let result = self.drive(config, &mut session, &mut *source, &mut buffers, sink);
            if result.is_err() {
                sink.abort();
            }
            source.release();
            result
        };

        let (outcome, report) = match result {
            Ok(delivery) => {
                let bytes_written = delivery.bytes_written;
                let checksum = hex_encode(&delivery.hasher.finalize());
                let report = CaptureReport::new(
                    file_path.map(Path::to_path_buf),
                    session.total_length,
                    bytes_written,
                    delivery.stopped_early,
                    checksum,
                    session.elapsed_ms(),
                );
                self.session_state.lock().last_report = Some(report.clone());
                self.set_state(PipelineState::Succeeded { bytes_written });
                self.status(&format!(
                    "capture complete: {} of {} bytes in {} ms",
                    bytes_written, session.total_length, report.elapsed_ms
                ));
                (TransferOutcome::Success { bytes_written }, Some(report))
            }
            Err(error) => {
                log::warn!(
                    "capture failed after {} of {} bytes: {}",
                    session.bytes_transferred,
                    session.total_length,
                    error
                );
                self.set_state(PipelineState::Failed(error.clone()));
                self.status(&format!("capture failed: {}", error));
                (TransferOutcome::from(error), None)
            }
        };

        if let Some(delegate) = &self.delegate {
            delegate.on_finished(&outcome);
        }
        self.set_state(PipelineState::Idle);
        (outcome, report)
    }

    /// Trigger → wait → prepare → drain → finalize. Any error is terminal;
    /// the caller rolls the sink back.
    fn drive(
        &self,
        config: &CaptureConfig,
        session: &mut CaptureSession,
        source: &mut S,
        buffers: &mut TransferBuffers,
        sink: &mut dyn ChunkSink,
    ) -> Result<Delivery, CaptureError> {
        source.trigger()?;

        self.set_state(PipelineState::WaitingReady);
        source.wait_until_ready(session.deadline, config.poll_interval(), self.scheduler.as_ref())?;

        session.total_length = source.prepare(config.max_length)?;
        sink.begin(session.total_length)?;
        self.set_state(PipelineState::Draining {
            transferred: 0,
            total: session.total_length,
        });
        log::debug!(
            "draining {} bytes in chunks of {}",
            session.total_length,
            session.chunk_size
        );

        let TransferBuffers { double, scratch } = buffers;
        let mut framer = config.framing.map(MarkerFramer::new);
        let mut delivery = Delivery::new();

        while session.remaining() > 0 {
            if session.is_past_deadline() {
                return Err(CaptureError::SourceTimeout);
            }

            let want = session.next_chunk_len();
            let read = source.read_chunk(&mut scratch[..want])?;
            if read == 0 {
                return Err(CaptureError::SourceReadError(format!(
                    "source ended after {} of {} bytes",
                    session.bytes_transferred, session.total_length
                )));
            }
            let read = read.min(want);
            session.bytes_transferred += read as u32;
            self.progress(session);
            let chunk = &scratch[..read];

            let (control, frame_done) = match framer.as_mut() {
                None => (Self::deliver(double, sink, &mut delivery, chunk)?, false),
                Some(framer) => {
                    let start = framer.markers().start;
                    let framed = framer.feed(chunk);
                    let mut control = SinkControl::Continue;
                    if framed.start_marker {
                        control = Self::deliver(double, sink, &mut delivery, &start)?;
                    }
                    if control == SinkControl::Continue {
                        control = Self::deliver(double, sink, &mut delivery, framed.body)?;
                    }
                    (control, framed.complete)
                }
            };

            if control == SinkControl::Stop {
                log::debug!("sink stopped the transfer after {} bytes", delivery.bytes_written);
                delivery.stopped_early = true;
                break;
            }
            if frame_done {
                log::debug!("end marker after {} bytes", session.bytes_transferred);
                break;
            }
        }

        if let Some(framer) = &framer {
            if !framer.is_complete() && !delivery.stopped_early {
                let missing = if framer.in_frame() { "end" } else { "start" };
                return Err(CaptureError::SourceReadError(format!(
                    "{} marker not found in {} bytes",
                    missing, session.total_length
                )));
            }
        }

        self.set_state(PipelineState::Finalizing);
        if !delivery.stopped_early {
            if let Some(tail) = double.flush() {
                sink.write_chunk(tail)?;
                delivery.record(tail);
            }
        }
        sink.finalize()?;
        Ok(delivery)
    }

    /// Push `data` through the double buffer, handing every full buffer to the sink.
    fn deliver(
        double: &mut DoubleBuffer,
        sink: &mut dyn ChunkSink,
        delivery: &mut Delivery,
        mut data: &[u8],
    ) -> Result<SinkControl, CaptureError> {
        while !data.is_empty() {
            let (consumed, full) = double.push(data);
            data = &data[consumed..];
            if let Some(full) = full {
                let control = sink.write_chunk(full)?;
                delivery.record(full);
                if control == SinkControl::Stop {
                    return Ok(SinkControl::Stop);
                }
            }
        }
        Ok(SinkControl::Continue)
    }

    fn set_state(&self, new_state: PipelineState) {
        log::debug!("pipeline state: {}", new_state.name());
        self.session_state.lock().state = new_state.clone();
        if let Some(delegate) = &self.delegate {
            delegate.on_state_changed(&new_state);
        }
    }

    /// Updates the draining counters without a state-change notification.
    fn progress(&self, session: &CaptureSession) {
        self.session_state.lock().state = PipelineState::Draining {
            transferred: session.bytes_transferred,
            total: session.total_length,
        };
        if let Some(delegate) = &self.delegate {
            delegate.on_progress(session.bytes_transferred, session.total_length);
        }
    }

    fn status(&self, line: &str) {
        log::debug!("{}", line);
        if let Some(delegate) = &self.delegate {
            delegate.on_status(line);
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
