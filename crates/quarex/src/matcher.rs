//! Bridge to the matching engine.
//!
//! Runs one operation against one pattern/subject pair and normalizes the
//! result to the plain-data wire representation. The engine is
//! `fancy-regex`, a backtracking engine: pathological patterns genuinely
//! run unbounded here, which is the entire reason this work happens in a
//! killable worker process.

use fancy_regex::RegexBuilder;

use crate::ipc::protocol::{ErrorDescriptor, ExecutionResponse, FailureKind, MatchOutcome, Operation};

/// The engine's default backtrack limit aborts pathological matches after
/// a fixed number of steps. Deadlines are enforced by killing the worker,
/// so the limit is raised out of the way: an adversarial pattern should
/// hit the wall clock, not an engine heuristic.
const BACKTRACK_LIMIT: usize = usize::MAX;

/// Evaluate one match operation.
///
/// Never panics and never escapes an engine error: every failure mode is
/// folded into `ExecutionResponse::Failure` so one bad request cannot
/// take the worker down.
pub fn evaluate(pattern: &str, operation: Operation, subject: &str) -> ExecutionResponse {
    match std::panic::catch_unwind(|| run(pattern, operation, subject)) {
        Ok(response) => response,
        Err(panic) => failure(FailureKind::Engine, panic_message(&panic)),
    }
}

fn run(pattern: &str, operation: Operation, subject: &str) -> ExecutionResponse {
    let regex = match RegexBuilder::new(pattern)
        .backtrack_limit(BACKTRACK_LIMIT)
        .build()
    {
        Ok(regex) => regex,
        Err(e) => return failure(FailureKind::Syntax, e.to_string()),
    };

    let result = match operation {
        Operation::IsMatch => regex.is_match(subject).map(MatchOutcome::Bool),
        Operation::Find => regex
            .find(subject)
            .map(|m| MatchOutcome::Position(m.map(|m| m.start() as u64))),
        Operation::Captures => regex.captures(subject).map(|captures| {
            // MatchData-style objects hold borrows into the subject and
            // cannot cross the process boundary; flatten to owned strings.
            MatchOutcome::Groups(captures.map(|caps| {
                (0..caps.len())
                    .map(|i| caps.get(i).map(|group| group.as_str().to_string()))
                    .collect()
            }))
        }),
    };

    match result {
        Ok(outcome) => ExecutionResponse::Success(outcome),
        Err(e) => failure(FailureKind::Engine, e.to_string()),
    }
}

fn failure(kind: FailureKind, message: String) -> ExecutionResponse {
    ExecutionResponse::Failure(ErrorDescriptor { kind, message })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "engine panicked".to_string()
    }
}
