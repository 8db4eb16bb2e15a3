use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetdag::engine::{BuildSession, CancelSignal, ExecutionResult, SkipReason};
use assetdag::errors::TransformError;
use assetdag::exec::{Transform, TransformInput, TransformOptions};
use assetdag::types::TaskId;
use assetdag::watch::DispatchTarget;

/// A transform that:
/// - records the input it was given (as lossy UTF-8)
/// - returns it unchanged, or fails when it contains a marker.
#[derive(Clone, Default)]
pub struct RecordingTransform {
    calls: Arc<Mutex<Vec<String>>>,
    fail_marker: Option<String>,
    delay: Option<Duration>,
}

impl RecordingTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call whose input contains `marker`.
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// Sleep before returning.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Inputs seen so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transform for RecordingTransform {
    fn name(&self) -> &str {
        "recording"
    }

    fn apply<'a>(
        &'a self,
        input: TransformInput,
        _options: &'a TransformOptions,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransformError>> + Send + 'a>> {
        Box::pin(async move {
            let text = String::from_utf8_lossy(&input.bytes).into_owned();
            self.calls.lock().unwrap().push(text.clone());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            match &self.fail_marker {
                Some(marker) if text.contains(marker.as_str()) => {
                    Err(TransformError::new("recording", format!("refusing '{text}'")))
                }
                _ => Ok(input.bytes),
            }
        })
    }
}

/// A dispatch target that records every task set it receives and reports
/// each task as succeeded (or cancelled, if the signal fired meanwhile).
#[derive(Clone, Default)]
pub struct RecordingDispatch {
    dispatched: Arc<Mutex<Vec<BTreeSet<TaskId>>>>,
    delay: Option<Duration>,
    ignore_cancel: bool,
}

impl RecordingDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep each dispatch "running" for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sit out the whole delay even when cancelled, like a pass whose
    /// transforms never check their signal.
    pub fn ignoring_cancel(mut self) -> Self {
        self.ignore_cancel = true;
        self
    }

    pub fn dispatches(&self) -> Vec<BTreeSet<TaskId>> {
        self.dispatched.lock().unwrap().clone()
    }

    /// Poll until at least `n` dispatches were recorded.
    pub async fn wait_for(&self, n: usize) {
        while self.dispatched.lock().unwrap().len() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl DispatchTarget for RecordingDispatch {
    fn dispatch(
        &self,
        tasks: BTreeSet<TaskId>,
        cancel: CancelSignal,
    ) -> Pin<Box<dyn Future<Output = BuildSession> + Send + '_>> {
        Box::pin(async move {
            self.dispatched.lock().unwrap().push(tasks.clone());

            if let Some(delay) = self.delay {
                let mut signal = cancel.clone();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = signal.cancelled(), if !self.ignore_cancel => {}
                }
            }

            let cancelled = !self.ignore_cancel && cancel.is_cancelled();
            let results = tasks
                .into_iter()
                .map(|t| {
                    if cancelled {
                        ExecutionResult::skipped(t, SkipReason::Cancelled)
                    } else {
                        ExecutionResult::succeeded(t, Duration::ZERO, 0)
                    }
                })
                .collect();
            BuildSession::new(results, cancelled)
        })
    }
}
