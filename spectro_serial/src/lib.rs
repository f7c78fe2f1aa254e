//! Transport adapters for the spectro host.
//!
//! - `SimulatedTransport`: deterministic synthetic sensor, always available.
//! - `SerialTransport`: real serial port, behind the `hardware` feature.

pub mod error;
#[cfg(feature = "hardware")]
pub mod serial;
pub mod util;

use std::time::Duration;

use spectro_traits::{Transport, TransportError};

use crate::error::SerialError;
#[cfg(feature = "hardware")]
pub use serial::SerialTransport;
pub use util::LineAssembler;

/// Reference spectrum the simulator jitters around (405–855 nm order).
pub const DEFAULT_PROFILE: [f64; 12] = [
    914.0, 4652.0, 6628.0, 7001.0, 7123.0, 6999.0, 6400.0, 5300.0, 4100.0, 3000.0, 2000.0, 1033.0,
];

/// Boot banner the simulator interleaves as line noise.
const NOISE_LINE: &str = "AS7343 ready";

/// Simulated sensor link.
///
/// Emits one frame per read with ±1% xorshift jitter. Replies are echoed to
/// stdout as `OUT: <reply>` and kept for inspection.
#[derive(Debug)]
pub struct SimulatedTransport {
    state: u32,
    profile: [f64; 12],
    tag: Option<String>,
    noise_every: u64,
    period: Duration,
    reads: u64,
    sent: Vec<String>,
    echo: bool,
    closed: bool,
}

impl SimulatedTransport {
    pub fn new(seed: u32) -> Self {
        Self {
            state: seed.max(1),
            profile: DEFAULT_PROFILE,
            tag: None,
            noise_every: 0,
            period: Duration::ZERO,
            reads: 0,
            sent: Vec::new(),
            echo: true,
            closed: false,
        }
    }

    /// Prefix frames with `tag` and emit integers, like the firmware's sorted dump.
    #[must_use]
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Replace every `n`-th line with a non-frame line (0 disables).
    #[must_use]
    pub fn with_noise_every(mut self, n: u64) -> Self {
        self.noise_every = n;
        self
    }

    /// Delay per read, capped by the read timeout.
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile: [f64; 12]) -> Self {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Replies written so far.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn next_unit(&mut self) -> f64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        f64::from(x) / (f64::from(u32::MAX) + 1.0)
    }

    fn next_frame(&mut self) -> String {
        let mut values = Vec::with_capacity(self.profile.len());
        for i in 0..self.profile.len() {
            let jitter = (self.next_unit() * 2.0 - 1.0) * 0.01;
            values.push(self.profile[i] * (1.0 + jitter));
        }
        match &self.tag {
            Some(tag) => {
                let ints: Vec<String> = values.iter().map(|v| format!("{}", v.round() as i64)).collect();
                format!("{tag} {}", ints.join(","))
            }
            None => {
                let floats: Vec<String> = values.iter().map(|v| format!("{v:.2}")).collect();
                floats.join(",")
            }
        }
    }
}

impl Transport for SimulatedTransport {
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, TransportError> {
        if self.closed {
            return Err(Box::new(SerialError::Closed));
        }
        if !self.period.is_zero() {
            std::thread::sleep(self.period.min(timeout));
        }
        self.reads += 1;
        if self.noise_every > 0 && self.reads % self.noise_every == 0 {
            return Ok(Some(NOISE_LINE.to_string()));
        }
        Ok(Some(self.next_frame()))
    }

    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(Box::new(SerialError::Closed));
        }
        if self.echo {
            println!("OUT: {line}");
        }
        self.sent.push(line.to_string());
        Ok(())
    }

    fn reset_input(&mut self) -> Result<(), TransportError> {
        tracing::debug!("simulated input reset");
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(10);

    #[test]
    fn frames_are_deterministic_per_seed() {
        let mut a = SimulatedTransport::new(42).quiet();
        let mut b = SimulatedTransport::new(42).quiet();
        for _ in 0..5 {
            assert_eq!(a.read_line(T).unwrap(), b.read_line(T).unwrap());
        }
    }

    #[test]
    fn tagged_frames_carry_prefix_and_integers() {
        let mut s = SimulatedTransport::new(1).tagged("SORTED(405-855nm):").quiet();
        let line = s.read_line(T).unwrap().unwrap();
        let payload = line.strip_prefix("SORTED(405-855nm): ").unwrap();
        assert_eq!(payload.split(',').count(), 12);
        assert!(payload.split(',').all(|t| t.parse::<i64>().is_ok()));
    }

    #[test]
    fn closed_transport_refuses_io() {
        let mut s = SimulatedTransport::new(1).quiet();
        s.close().unwrap();
        assert!(s.read_line(T).is_err());
        assert!(s.write_line("JUICE=x;CONC=y").is_err());
    }
}
