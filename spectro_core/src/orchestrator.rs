//! Acquisition loop: line → frame → sample → classification → reply.
//!
//! One orchestrator owns one transport and one aggregation buffer. The
//! pipeline is shared read-only, so several links can each run their own
//! orchestrator against the same loaded bundles.
//!
//! The per-cycle boundary is [`Orchestrator::finish_cycle`]: every failure
//! after the N-th frame is accepted (feature build, classifier, decode,
//! reply write) is turned into an `ERROR=` reply there, the buffer is
//! cleared, and the loop carries on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use spectro_traits::{Clock, MonotonicClock, Transport};

use crate::aggregator::{Accept, Aggregator, Sample};
use crate::error::{Result, SpectroError};
use crate::frame::{self, FramePolicy};
use crate::pipeline::Pipeline;
use crate::reply;

/// Pause after a failed read so a vanished device does not spin the loop.
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Longest line excerpt written to debug logs.
const LOG_EXCERPT: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorCfg {
    pub policy: FramePolicy,
    pub reads_per_sample: usize,
    pub read_timeout: Duration,
    /// Abandon a partial cycle after this long without an accepted frame.
    pub idle_reset: Option<Duration>,
    pub reply_confidence: bool,
}

impl Default for OrchestratorCfg {
    fn default() -> Self {
        Self {
            policy: FramePolicy::Untagged,
            reads_per_sample: 5,
            read_timeout: Duration::from_secs(1),
            idle_reset: None,
            reply_confidence: true,
        }
    }
}

/// Cycle state between steps. A completed sample is classified and answered
/// within the step that accepted its N-th frame, so a finished step always
/// leaves the orchestrator `Idle` or `Accumulating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Accumulating(usize),
}

/// What one [`Orchestrator::step`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Read timed out with no line.
    Timeout,
    /// Line did not parse into a frame.
    Dropped,
    /// Frame width differs from the cycle's first frame.
    Rejected,
    /// Frame buffered; `count` frames now held.
    Buffered(usize),
    /// Cycle completed and this reply was written.
    Replied(String),
    /// Cycle failed; an `ERROR=` reply was attempted.
    Failed(SpectroError),
    /// Transport read failed; the partial cycle was discarded.
    ReadFailed(SpectroError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub lines_read: u64,
    pub frames_accepted: u64,
    pub lines_dropped: u64,
    pub frames_rejected: u64,
    pub cycles_ok: u64,
    pub cycles_failed: u64,
    pub idle_resets: u64,
    pub timeouts: u64,
    pub read_errors: u64,
}

impl RunStats {
    /// Completed cycles, successful or not.
    pub fn cycles(&self) -> u64 {
        self.cycles_ok + self.cycles_failed
    }
}

pub struct Orchestrator<T: Transport, C: Clock = MonotonicClock> {
    transport: T,
    pipeline: Arc<Pipeline>,
    cfg: OrchestratorCfg,
    aggregator: Aggregator,
    clock: C,
    last_frame_at: Option<Instant>,
    stats: RunStats,
    closed: bool,
}

impl<T: Transport> Orchestrator<T, MonotonicClock> {
    pub fn new(transport: T, pipeline: Arc<Pipeline>, cfg: OrchestratorCfg) -> Self {
        Self::with_clock(transport, pipeline, cfg, MonotonicClock::new())
    }
}

impl<T: Transport, C: Clock> Orchestrator<T, C> {
    pub fn with_clock(transport: T, pipeline: Arc<Pipeline>, cfg: OrchestratorCfg, clock: C) -> Self {
        let aggregator = Aggregator::new(cfg.reads_per_sample);
        Self {
            transport,
            pipeline,
            cfg,
            aggregator,
            clock,
            last_frame_at: None,
            stats: RunStats::default(),
            closed: false,
        }
    }

    pub fn state(&self) -> CycleState {
        match self.aggregator.len() {
            0 => CycleState::Idle,
            k => CycleState::Accumulating(k),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Drop the partial cycle.
    pub fn reset(&mut self) {
        self.aggregator.reset();
        self.last_frame_at = None;
    }

    /// Process at most one inbound line.
    pub fn step(&mut self) -> StepOutcome {
        self.expire_idle_cycle();

        let line = match self.transport.read_line(self.cfg.read_timeout) {
            Ok(Some(line)) => line,
            Ok(None) => {
                self.stats.timeouts += 1;
                return StepOutcome::Timeout;
            }
            Err(e) => {
                self.stats.read_errors += 1;
                tracing::warn!(error = %e, "transport read failed");
                self.reset();
                return StepOutcome::ReadFailed(SpectroError::Transport(e.to_string()));
            }
        };
        self.stats.lines_read += 1;

        let Some(frame) = frame::parse_line(&line, &self.cfg.policy) else {
            self.stats.lines_dropped += 1;
            tracing::debug!(line = excerpt(&line), "dropped unparseable line");
            return StepOutcome::Dropped;
        };

        match self.aggregator.accept(frame) {
            Accept::Buffered { count } => {
                self.stats.frames_accepted += 1;
                self.last_frame_at = Some(self.clock.now());
                tracing::trace!(count, "frame buffered");
                StepOutcome::Buffered(count)
            }
            Accept::Rejected { expected, got } => {
                self.stats.frames_rejected += 1;
                tracing::debug!(expected, got, "dropped frame with mismatched width");
                StepOutcome::Rejected
            }
            Accept::Complete(sample) => {
                self.stats.frames_accepted += 1;
                self.last_frame_at = None;
                self.finish_cycle(&sample)
            }
        }
    }

    /// Ready → Idle. Never propagates a failure.
    pub fn finish_cycle(&mut self, sample: &Sample) -> StepOutcome {
        match self.run_cycle(sample) {
            Ok(line) => {
                self.stats.cycles_ok += 1;
                tracing::info!(reply = %line, "cycle complete");
                StepOutcome::Replied(line)
            }
            Err(e) => {
                self.stats.cycles_failed += 1;
                tracing::warn!(kind = e.kind(), error = %e, "cycle failed");
                if let Err(we) = self.transport.write_line(&reply::format_error(&e)) {
                    tracing::warn!(error = %we, "could not send error reply");
                }
                self.reset();
                StepOutcome::Failed(e)
            }
        }
    }

    fn run_cycle(&mut self, sample: &Sample) -> Result<String> {
        let classification = self.pipeline.classify(sample)?;
        let line = reply::format_reply(&classification, self.cfg.reply_confidence);
        self.transport
            .write_line(&line)
            .map_err(|e| SpectroError::Transport(format!("reply write failed: {e}")))?;
        Ok(line)
    }

    fn expire_idle_cycle(&mut self) {
        if let Some(limit) = self.cfg.idle_reset
            && let Some(at) = self.last_frame_at
            && self.clock.elapsed_since(at) >= limit
        {
            tracing::debug!(
                buffered = self.aggregator.len(),
                "partial cycle abandoned after inactivity"
            );
            self.stats.idle_resets += 1;
            self.reset();
        }
    }

    /// Step until `shutdown` is set or `max_cycles` cycles completed, then close
    /// the transport.
    pub fn run(&mut self, shutdown: &AtomicBool, max_cycles: Option<u64>) -> RunStats {
        tracing::info!(
            reads_per_sample = self.aggregator.reads_per_sample(),
            ?max_cycles,
            "acquisition loop started"
        );
        while !shutdown.load(Ordering::Relaxed) {
            if let Some(max) = max_cycles
                && self.stats.cycles() >= max
            {
                break;
            }
            if let StepOutcome::ReadFailed(_) = self.step() {
                std::thread::sleep(READ_ERROR_BACKOFF);
            }
        }
        if !self.aggregator.is_empty() {
            tracing::debug!(
                buffered = self.aggregator.len(),
                "partial cycle abandoned at shutdown"
            );
            self.reset();
        }
        self.close();
        tracing::info!(
            cycles_ok = self.stats.cycles_ok,
            cycles_failed = self.stats.cycles_failed,
            lines_dropped = self.stats.lines_dropped,
            "acquisition loop stopped"
        );
        self.stats.clone()
    }

    /// Close the transport once. Further calls are no-ops.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.transport.close() {
            tracing::warn!(error = %e, "transport close failed");
        }
    }
}

impl<T: Transport, C: Clock> Drop for Orchestrator<T, C> {
    fn drop(&mut self) {
        self.close();
    }
}

fn excerpt(line: &str) -> &str {
    match line.char_indices().nth(LOG_EXCERPT) {
        Some((i, _)) => &line[..i],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{ScriptedTransport, test_pipeline};
    use spectro_traits::clock::ManualClock;

    const FRAME: &str = "10,20,30,40,50,60,70,80,90,100,110,120";

    fn cfg(n: usize) -> OrchestratorCfg {
        OrchestratorCfg {
            reads_per_sample: n,
            ..OrchestratorCfg::default()
        }
    }

    #[test]
    fn state_walks_idle_accumulating_idle() {
        let t = ScriptedTransport::new([FRAME, FRAME]);
        let mut o = Orchestrator::new(t, Arc::new(test_pipeline()), cfg(2));
        assert_eq!(o.state(), CycleState::Idle);
        assert_eq!(o.step(), StepOutcome::Buffered(1));
        assert_eq!(o.state(), CycleState::Accumulating(1));
        assert!(matches!(o.step(), StepOutcome::Replied(_)));
        assert_eq!(o.state(), CycleState::Idle);
    }

    #[test]
    fn failed_cycle_also_returns_to_idle() {
        let t = ScriptedTransport::new([FRAME, FRAME]).with_failing_writes();
        let mut o = Orchestrator::new(t, Arc::new(test_pipeline()), cfg(2));
        o.step();
        assert_eq!(o.state(), CycleState::Accumulating(1));
        assert!(matches!(o.step(), StepOutcome::Failed(_)));
        assert_eq!(o.state(), CycleState::Idle);
    }

    #[test]
    fn timeout_is_an_empty_read() {
        let mut t = ScriptedTransport::new([FRAME]);
        t.push_timeout();
        t.push_line(FRAME);
        let mut o = Orchestrator::new(t, Arc::new(test_pipeline()), cfg(2));
        o.step();
        assert_eq!(o.step(), StepOutcome::Timeout);
        assert_eq!(o.state(), CycleState::Accumulating(1));
        assert!(matches!(o.step(), StepOutcome::Replied(_)));
        assert_eq!(o.stats().timeouts, 1);
    }

    #[test]
    fn idle_reset_abandons_stale_partial_cycle() {
        let clock = ManualClock::new();
        let t = ScriptedTransport::new([FRAME, FRAME, FRAME]);
        let mut o = Orchestrator::with_clock(
            t,
            Arc::new(test_pipeline()),
            OrchestratorCfg {
                idle_reset: Some(Duration::from_millis(500)),
                ..cfg(2)
            },
            clock.clone(),
        );
        o.step();
        clock.advance(Duration::from_millis(600));
        // Stale frame is discarded before the next read.
        assert_eq!(o.step(), StepOutcome::Buffered(1));
        assert_eq!(o.stats().idle_resets, 1);
        assert!(matches!(o.step(), StepOutcome::Replied(_)));
    }

    #[test]
    fn read_failure_discards_partial_cycle() {
        let mut t = ScriptedTransport::new([FRAME]);
        t.push_read_error("device unplugged");
        let mut o = Orchestrator::new(t, Arc::new(test_pipeline()), cfg(3));
        o.step();
        assert!(matches!(o.step(), StepOutcome::ReadFailed(_)));
        assert_eq!(o.state(), CycleState::Idle);
    }

    #[test]
    fn write_failure_is_a_cycle_failure() {
        let t = ScriptedTransport::new([FRAME]).with_failing_writes();
        let handle = t.handle();
        let mut o = Orchestrator::new(t, Arc::new(test_pipeline()), cfg(1));
        match o.step() {
            StepOutcome::Failed(e) => assert_eq!(e.kind(), "TransportError"),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(o.stats().cycles_failed, 1);
        assert!(handle.replies().is_empty());
    }

    #[test]
    fn run_stops_at_max_cycles_and_closes() {
        let t = ScriptedTransport::new([FRAME; 6]);
        let handle = t.handle();
        let mut o = Orchestrator::new(t, Arc::new(test_pipeline()), cfg(2));
        let stats = o.run(&AtomicBool::new(false), Some(2));
        assert_eq!(stats.cycles_ok, 2);
        assert_eq!(handle.replies().len(), 2);
        assert!(handle.is_closed());
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let s = "é".repeat(200);
        assert_eq!(excerpt(&s).chars().count(), LOG_EXCERPT);
        assert_eq!(excerpt("short"), "short");
    }
}
