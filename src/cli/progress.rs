// src/cli/progress.rs - Terminal progress renderer

use crate::core::types::{Phase, ProgressEvent};

fn render(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::CycleStart { cycle, max_iters } => {
            format!("[iter {}/{}] starting cycle", cycle, max_iters)
        }
        ProgressEvent::StepDone { cycle, phase } => {
            let label = match phase {
                Phase::Plan => "plan ready",
                Phase::CodeGen => "code generated",
                Phase::Execute => "executed",
                Phase::Review => "reviewed",
                Phase::End => "end",
            };
            format!("[iter {}]   {}", cycle, label)
        }
        ProgressEvent::Complete { iterations, stop } => {
            format!("[done] iterations={} stop={}", iterations, stop)
        }
    }
}

/// Build a progress callback that writes formatted lines to stderr.
///
/// stdout stays clean for the final summary.
pub fn terminal_progress() -> impl Fn(ProgressEvent) + Send + Sync + 'static {
    move |event| eprintln!("{}", render(&event))
}
