use super::primitives::{RESERVED_JUMPS, is_primitive};
use super::{Program, StepKind};
use crate::error::ProgramError;
use ahash::AHashSet;

/// Checks the structural invariants every compiled program must hold:
/// a `main` routine exists, every routine call resolves within the program,
/// step names are unique per routine, and every `next` jump lands on a step
/// of the same routine.
pub fn verify(program: &Program) -> Result<(), ProgramError> {
    if program.main().is_none() {
        return Err(ProgramError::MissingMain);
    }

    for (name, routine) in program.routines() {
        let mut step_names = AHashSet::new();
        let mut jumps = Vec::new();
        let mut failure = None;

        routine.visit(&mut |step| {
            if failure.is_some() {
                return;
            }
            if !step_names.insert(step.name.as_str()) {
                failure = Some(ProgramError::DuplicateStepName {
                    routine: name.to_string(),
                    step: step.name.clone(),
                });
                return;
            }
            match &step.kind {
                StepKind::Call(call) if !is_primitive(&call.target) => {
                    if !program.contains(&call.target) {
                        failure = Some(ProgramError::DanglingCall {
                            routine: name.to_string(),
                            target: call.target.clone(),
                        });
                    }
                }
                StepKind::Switch(cases) => {
                    jumps.extend(cases.iter().filter_map(|c| c.next.as_deref()));
                }
                _ => {}
            }
        });

        if let Some(error) = failure {
            return Err(error);
        }

        if let Some(target) = jumps
            .into_iter()
            .find(|t| !RESERVED_JUMPS.contains(t) && !step_names.contains(t))
        {
            return Err(ProgramError::UnknownJumpTarget {
                routine: name.to_string(),
                target: target.to_string(),
            });
        }
    }
    Ok(())
}
