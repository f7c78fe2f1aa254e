//! Reduces N accepted frames into one averaged sample.

use crate::frame::RawFrame;

/// Element-wise mean of exactly N frames of one width.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample(Vec<f64>);

impl Sample {
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<f64>> for Sample {
    fn from(v: Vec<f64>) -> Self {
        Sample(v)
    }
}

/// Outcome of offering a frame to the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum Accept {
    /// Frame appended; `count` frames are now buffered.
    Buffered { count: usize },
    /// Width differs from the cycle's first frame; buffer untouched.
    Rejected { expected: usize, got: usize },
    /// N-th frame accepted; buffer has been cleared.
    Complete(Sample),
}

#[derive(Debug)]
pub struct Aggregator {
    reads_per_sample: usize,
    buf: Vec<RawFrame>,
}

impl Aggregator {
    /// `reads_per_sample` is clamped to at least 1.
    pub fn new(reads_per_sample: usize) -> Self {
        let n = reads_per_sample.max(1);
        Self {
            reads_per_sample: n,
            buf: Vec::with_capacity(n),
        }
    }

    pub fn reads_per_sample(&self) -> usize {
        self.reads_per_sample
    }

    /// Frames buffered in the current cycle.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Width established by the first frame of the current cycle, if any.
    pub fn width(&self) -> Option<usize> {
        self.buf.first().map(RawFrame::width)
    }

    pub fn accept(&mut self, frame: RawFrame) -> Accept {
        if let Some(expected) = self.width()
            && frame.width() != expected
        {
            return Accept::Rejected {
                expected,
                got: frame.width(),
            };
        }

        self.buf.push(frame);
        if self.buf.len() < self.reads_per_sample {
            return Accept::Buffered {
                count: self.buf.len(),
            };
        }

        let sample = mean_of(&self.buf);
        self.buf.clear();
        Accept::Complete(sample)
    }

    /// Abandon the current cycle.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

fn mean_of(frames: &[RawFrame]) -> Sample {
    let width = frames.first().map_or(0, RawFrame::width);
    let mut sums = vec![0.0f64; width];
    for f in frames {
        for (acc, v) in sums.iter_mut().zip(f.values()) {
            *acc += *v;
        }
    }
    let n = frames.len().max(1) as f64;
    Sample(sums.into_iter().map(|s| s / n).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(v: f64, width: usize) -> RawFrame {
        RawFrame::from(vec![v; width])
    }

    #[test]
    fn completes_on_nth_frame_and_clears() {
        let mut agg = Aggregator::new(3);
        assert_eq!(agg.accept(frame(1.0, 12)), Accept::Buffered { count: 1 });
        assert_eq!(agg.accept(frame(2.0, 12)), Accept::Buffered { count: 2 });
        match agg.accept(frame(6.0, 12)) {
            Accept::Complete(s) => assert_eq!(s.values(), vec![3.0; 12].as_slice()),
            other => panic!("expected sample, got {other:?}"),
        }
        assert!(agg.is_empty());
        assert_eq!(agg.width(), None);
    }

    #[test]
    fn width_mismatch_keeps_count() {
        let mut agg = Aggregator::new(5);
        agg.accept(frame(1.0, 12));
        agg.accept(frame(1.0, 12));
        assert_eq!(
            agg.accept(frame(1.0, 11)),
            Accept::Rejected {
                expected: 12,
                got: 11
            }
        );
        assert_eq!(agg.len(), 2);
    }

    #[test]
    fn reset_clears_established_width() {
        let mut agg = Aggregator::new(2);
        agg.accept(frame(1.0, 12));
        agg.reset();
        assert!(agg.is_empty());
        assert_eq!(agg.accept(frame(1.0, 8)), Accept::Buffered { count: 1 });
        assert_eq!(agg.width(), Some(8));
    }

    #[test]
    fn zero_reads_per_sample_clamps_to_one() {
        let mut agg = Aggregator::new(0);
        assert_eq!(agg.reads_per_sample(), 1);
        assert!(matches!(agg.accept(frame(4.0, 12)), Accept::Complete(_)));
    }
}
