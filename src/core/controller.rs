// src/core/controller.rs - Iteration controller
//
// Fixed cycle plan -> code_gen -> execute -> review, with a single decision
// point after review. Steps run one at a time; nothing runs concurrently.

use tracing::Instrument;

use super::state::AgentState;
use super::steps::Steps;
use super::types::{Phase, ProgressEvent, Transition};
use crate::infra::errors::DataPilotError;

/// `End` once review has set `stop`, otherwise `Continue`.
pub fn should_continue(state: &AgentState) -> Transition {
    if state.stopped() {
        Transition::End
    } else {
        Transition::Continue
    }
}

impl Phase {
    /// The phase that follows `self` given the current state.
    pub fn next(self, state: &AgentState) -> Phase {
        match self {
            Phase::Plan => Phase::CodeGen,
            Phase::CodeGen => Phase::Execute,
            Phase::Execute => Phase::Review,
            Phase::Review => match should_continue(state) {
                Transition::Continue => Phase::Plan,
                Transition::End => Phase::End,
            },
            Phase::End => Phase::End,
        }
    }
}

/// Drives the step functions until review decides to stop.
pub struct Controller {
    steps: Steps,
    on_progress: Option<Box<dyn Fn(ProgressEvent) + Send + Sync>>,
}

impl Controller {
    pub fn new(steps: Steps) -> Self {
        Self {
            steps,
            on_progress: None,
        }
    }

    /// Set a callback for real-time progress events.
    pub fn with_progress(mut self, cb: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    /// Run cycles until stop. Any step error aborts the run and is returned.
    pub async fn run(&self, mut state: AgentState) -> Result<AgentState, DataPilotError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("run", run_id = %run_id);

        async move {
            tracing::info!(
                input_file = %state.input_file,
                max_iters = state.max_iters,
                "Starting agent run"
            );

            let mut phase = Phase::Plan;
            while phase != Phase::End {
                let cycle = state.iter_count + 1;
                if phase == Phase::Plan {
                    self.emit(ProgressEvent::CycleStart {
                        cycle,
                        max_iters: state.max_iters,
                    });
                }

                self.steps.run(phase, &mut state).await?;
                self.emit(ProgressEvent::StepDone { cycle, phase });

                phase = phase.next(&state);
            }

            tracing::info!(
                iterations = state.iter_count,
                history = state.history().len(),
                "Agent run finished"
            );
            self.emit(ProgressEvent::Complete {
                iterations: state.iter_count,
                stop: state.stopped(),
            });
            Ok::<AgentState, DataPilotError>(state)
        }
        .instrument(span)
        .await
    }
}
