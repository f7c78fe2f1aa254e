//! Test and helper mocks for spectro_core

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use spectro_traits::{Transport, TransportError};

use crate::bundle::{ConcentrationBundle, JuiceBundle, LabelDecoder};
use crate::error::{Result, SpectroError};
use crate::features::{ConcentrationPreprocess, JuicePreprocess, OneHotEncoder};
use crate::model::{Classifier, ClassifierSpec, LinearModel};
use crate::pipeline::Pipeline;

#[derive(Debug, Clone)]
enum Scripted {
    Line(String),
    Timeout,
    ReadError(String),
}

/// Shared view of a [`ScriptedTransport`] that survives moving the transport
/// into an orchestrator.
#[derive(Debug, Clone, Default)]
pub struct ScriptHandle {
    replies: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    input_resets: Arc<Mutex<usize>>,
}

impl ScriptHandle {
    pub fn replies(&self) -> Vec<String> {
        self.replies.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    pub fn input_resets(&self) -> usize {
        self.input_resets.lock().map(|n| *n).unwrap_or(0)
    }
}

/// In-memory transport: replays scripted lines, records replies.
///
/// Once the script is exhausted reads time out; if a shutdown flag was
/// attached it is raised at that point so `Orchestrator::run` returns.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: VecDeque<Scripted>,
    handle: ScriptHandle,
    fail_writes: bool,
    shutdown_on_exhaust: Option<Arc<AtomicBool>>,
}

impl ScriptedTransport {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: lines.into_iter().map(|l| Scripted::Line(l.into())).collect(),
            ..Self::default()
        }
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.script.push_back(Scripted::Line(line.into()));
    }

    pub fn push_timeout(&mut self) {
        self.script.push_back(Scripted::Timeout);
    }

    pub fn push_read_error(&mut self, msg: impl Into<String>) {
        self.script.push_back(Scripted::ReadError(msg.into()));
    }

    #[must_use]
    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    #[must_use]
    pub fn with_shutdown_on_exhaust(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_on_exhaust = Some(flag);
        self
    }

    pub fn handle(&self) -> ScriptHandle {
        self.handle.clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Transport for ScriptedTransport {
    fn read_line(&mut self, _timeout: Duration) -> std::result::Result<Option<String>, TransportError> {
        match self.script.pop_front() {
            Some(Scripted::Line(l)) => Ok(Some(l)),
            Some(Scripted::Timeout) => Ok(None),
            Some(Scripted::ReadError(m)) => Err(Box::new(std::io::Error::other(m))),
            None => {
                if let Some(flag) = &self.shutdown_on_exhaust {
                    flag.store(true, Ordering::Relaxed);
                }
                Ok(None)
            }
        }
    }

    fn write_line(&mut self, line: &str) -> std::result::Result<(), TransportError> {
        if self.fail_writes {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }
        if let Ok(mut r) = self.handle.replies.lock() {
            r.push(line.to_string());
        }
        Ok(())
    }

    fn reset_input(&mut self) -> std::result::Result<(), TransportError> {
        if let Ok(mut n) = self.handle.input_resets.lock() {
            *n += 1;
        }
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), TransportError> {
        self.handle.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Classifier that records every input, predicts class 0, and fails on one
/// configured feature vector.
#[derive(Debug, Clone)]
pub struct ProbeClassifier {
    n_features: usize,
    n_classes: usize,
    fail_on: Option<Vec<f64>>,
    seen: Arc<Mutex<Vec<Vec<f64>>>>,
}

impl ProbeClassifier {
    pub fn new(n_features: usize, n_classes: usize) -> Self {
        Self {
            n_features,
            n_classes,
            fail_on: None,
            seen: Arc::default(),
        }
    }

    #[must_use]
    pub fn failing_on(mut self, x: Vec<f64>) -> Self {
        self.fail_on = Some(x);
        self
    }

    /// Inputs passed to `predict`, in call order.
    pub fn seen(&self) -> Vec<Vec<f64>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Classifier for ProbeClassifier {
    fn kind(&self) -> &'static str {
        "probe"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, x: &[f64]) -> Result<usize> {
        if let Ok(mut s) = self.seen.lock() {
            s.push(x.to_vec());
        }
        if let Some(bad) = &self.fail_on
            && bad.len() == x.len()
            && bad.iter().zip(x).all(|(a, b)| (a - b).abs() < 1e-9)
        {
            return Err(SpectroError::Classifier("probe rejects this vector".into()));
        }
        Ok(0)
    }
}

fn labels(v: &[&str]) -> Result<LabelDecoder> {
    LabelDecoder::new(v.iter().map(|s| (*s).to_string()).collect()).map_err(SpectroError::Config)
}

fn built(spec: ClassifierSpec) -> Result<Box<dyn Classifier>> {
    spec.build().map_err(SpectroError::Config)
}

/// Juice stage over L1 features: apple leans blue, orange mid, grape red.
pub fn demo_juice_bundle() -> Result<JuiceBundle> {
    let band = |lo: usize, hi: usize| -> Vec<f64> {
        (0..12).map(|i| if (lo..hi).contains(&i) { 8.0 } else { 0.0 }).collect()
    };
    let clf = built(ClassifierSpec::LogisticRegression(LinearModel {
        coef: vec![band(0, 4), band(8, 12), band(4, 8)],
        intercept: vec![0.0, 0.0, 0.0],
    }))?;
    JuiceBundle::new(clf, labels(&["apple", "grape", "orange"])?, JuicePreprocess::L1)
        .map_err(|e| SpectroError::Config(e.to_string()))
}

/// Concentration stage over `[mean] + one-hot(apple, grape, orange)`.
pub fn demo_concentration_bundle() -> Result<ConcentrationBundle> {
    let clf = built(ClassifierSpec::LogisticRegression(LinearModel {
        coef: vec![
            vec![0.01, 0.0, 0.0, 0.0],
            vec![-0.01, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 0.0],
        ],
        intercept: vec![-20.0, 10.0, 0.0],
    }))?;
    let encoder = OneHotEncoder::new(vec!["apple".into(), "grape".into(), "orange".into()])?;
    ConcentrationBundle::new(
        clf,
        labels(&["high", "low", "medium"])?,
        ConcentrationPreprocess::Mean,
        encoder,
    )
    .map_err(|e| SpectroError::Config(e.to_string()))
}

/// Small deterministic pipeline for tests and benches. Panics only if the
/// fixture itself is inconsistent.
#[allow(clippy::expect_used)]
pub fn test_pipeline() -> Pipeline {
    Pipeline::new(
        demo_juice_bundle().expect("demo juice bundle"),
        demo_concentration_bundle().expect("demo concentration bundle"),
    )
}
