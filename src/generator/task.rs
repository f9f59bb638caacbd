use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::{GenerationState, Generator};
use crate::sink::ResultSink;

// Derivations recurse once per expanded non-terminal
const WORKER_STACK_SIZE: usize = 64 * 1024 * 1024;

// Clones share one flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum GenerationOutcome {
    Completed(Vec<String>),
    Canceled,
    // The search panicked; holds the panic message
    Failed(String),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "generation panicked".to_string()
    }
}

// Runs `search`, turning a panic into a failed outcome
fn guarded(search: impl FnOnce() -> GenerationOutcome) -> GenerationOutcome {
    panic::catch_unwind(AssertUnwindSafe(search)).unwrap_or_else(|payload| {
        let message = panic_message(&*payload);
        warn!("generation worker panicked: {}", message);
        GenerationOutcome::Failed(message)
    })
}

// A generator running on its own thread
#[derive(Debug)]
pub struct GenerationTask {
    token: CancelToken,
    handle: JoinHandle<GenerationOutcome>,
}

impl GenerationTask {
    // The outcome reaches `sink` exactly once, from the worker
    pub fn spawn(
        mut generator: Generator,
        mut sink: impl ResultSink<GenerationOutcome> + Send + 'static,
    ) -> io::Result<Self> {
        let token = CancelToken::new();
        let worker_token = token.clone();

        let handle = thread::Builder::new()
            .name("generator".to_string())
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                let outcome = guarded(|| match generator.generate(&worker_token) {
                    GenerationState::Canceled => GenerationOutcome::Canceled,
                    _ => GenerationOutcome::Completed(generator.into_chains()),
                });
                sink.publish(outcome.clone());
                outcome
            })?;

        debug!("generation task started");
        Ok(GenerationTask { token, handle })
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    // Waits for the worker. Only a panicking sink can still bring it down
    pub fn join(self) -> GenerationOutcome {
        self.handle
            .join()
            .unwrap_or_else(|payload| GenerationOutcome::Failed(panic_message(&*payload)))
    }
}

#[cfg(test)]
mod tests {
    use std::iter::zip;
    use std::sync::mpsc::{self, RecvTimeoutError};
    use std::time::Duration;

    use super::*;
    use crate::generator::{Derivation, GenerationSettings};
    use crate::grammar::tests::grammar;

    fn generator(max: usize) -> Generator {
        let source = grammar("ab", "S", "S", &["S→aSb", "S→SS", "S→λ"]);
        let settings = GenerationSettings::new(0, max, Derivation::Leftmost).unwrap();
        Generator::from_grammar(&source, settings).unwrap()
    }

    #[test]
    fn outcome_is_published_once() {
        let (sender, receiver) = mpsc::channel();
        let task = GenerationTask::spawn(generator(2), move |outcome: GenerationOutcome| sender.send(outcome).unwrap()).unwrap();

        let joined = task.join();
        let published: Vec<GenerationOutcome> = receiver.iter().collect();
        assert_eq!(published, vec![joined.clone()]);
        assert_eq!(joined, GenerationOutcome::Completed(vec!["".to_string(), "ab".to_string()]));
    }

    #[test]
    fn panics_become_failures() {
        let searches: Vec<Box<dyn FnOnce() -> GenerationOutcome>> = vec![
            Box::new(|| GenerationOutcome::Canceled),
            Box::new(|| panic!("rule table changed")),
            Box::new(|| panic!("{} rules", 3)),
        ];
        let answers = vec![
            GenerationOutcome::Canceled,
            GenerationOutcome::Failed("rule table changed".to_string()),
            GenerationOutcome::Failed("3 rules".to_string())
        ];

        for (search, answer) in zip(searches, answers) {
            assert_eq!(guarded(search), answer);
        }
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_canceled());
        token.cancel();
        assert!(clone.is_canceled());
    }

    #[test]
    fn timed_out_task_is_canceled() {
        let (sender, receiver) = mpsc::channel();
        let task = GenerationTask::spawn(generator(40), move |outcome: GenerationOutcome| sender.send(outcome).unwrap()).unwrap();

        assert_eq!(receiver.recv_timeout(Duration::from_millis(10)), Err(RecvTimeoutError::Timeout));
        task.cancel();
        assert_eq!(receiver.recv(), Ok(GenerationOutcome::Canceled));
        assert_eq!(task.join(), GenerationOutcome::Canceled);
    }

    #[test]
    fn canceled_task_publishes_nothing_partial() {
        let (sender, receiver) = mpsc::channel();
        let task = GenerationTask::spawn(generator(40), move |outcome: GenerationOutcome| sender.send(outcome).unwrap()).unwrap();
        task.cancel();

        assert_eq!(task.join(), GenerationOutcome::Canceled);
        assert_eq!(receiver.iter().collect::<Vec<_>>(), vec![GenerationOutcome::Canceled]);
    }
}
