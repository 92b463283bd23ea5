use super::expr::expression_body;
use super::{ForSource, Program, Step, StepKind};
use std::fmt;

/// Renders a program as an indented tree, one line per step.
/// Meant for debugging compiler output, not for the engine.
pub struct DisplayProgram<'a> {
    pub program: &'a Program,
}

impl fmt::Display for DisplayProgram<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, routine) in self.program.routines() {
            writeln!(f, "{}({})", name, routine.params.join(", "))?;
            let count = routine.steps.len();
            for (i, step) in routine.steps.iter().enumerate() {
                self.fmt_as_tree(step, f, "", i + 1 == count)?;
            }
        }
        Ok(())
    }
}

impl DisplayProgram<'_> {
    fn fmt_as_tree(
        &self,
        step: &Step,
        f: &mut fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
    ) -> fmt::Result {
        let node_marker = if is_last { "└── " } else { "├── " };
        write!(f, "{}{}{}: ", prefix, node_marker, step.name)?;

        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });

        match &step.kind {
            StepKind::Call(call) => match &call.result {
                Some(result) => writeln!(f, "call {} -> {}", call.target, result)?,
                None => writeln!(f, "call {}", call.target)?,
            },
            StepKind::Assign(bindings) => {
                let names: Vec<&str> = bindings.iter().map(|(n, _)| n.as_str()).collect();
                writeln!(f, "assign {}", names.join(", "))?;
            }
            StepKind::Return(value) => writeln!(f, "return {}", short(value))?,
            StepKind::Raise(value) => writeln!(f, "raise {}", short(value))?,
            StepKind::Block(steps) => {
                writeln!(f, "block")?;
                self.fmt_children(steps, f, &child_prefix)?;
            }
            StepKind::For(body) => {
                match &body.source {
                    ForSource::In(list) => writeln!(f, "for {} in {}", body.value, short(list))?,
                    ForSource::Range(from, to) => {
                        writeln!(f, "for {} in [{}..={}]", body.value, from, to)?
                    }
                }
                self.fmt_children(&body.steps, f, &child_prefix)?;
            }
            StepKind::Switch(cases) => {
                writeln!(f, "switch")?;
                for (i, case) in cases.iter().enumerate() {
                    let last_case = i + 1 == cases.len();
                    let marker = if last_case { "└── " } else { "├── " };
                    let condition = case
                        .condition
                        .as_ref()
                        .map(short)
                        .unwrap_or_else(|| "otherwise".to_string());
                    match &case.next {
                        Some(next) => writeln!(
                            f,
                            "{}{}when {} => next {}",
                            child_prefix, marker, condition, next
                        )?,
                        None => writeln!(f, "{}{}when {}", child_prefix, marker, condition)?,
                    }
                    let case_prefix =
                        format!("{}{}", child_prefix, if last_case { "    " } else { "│   " });
                    self.fmt_children(&case.steps, f, &case_prefix)?;
                }
            }
        }
        Ok(())
    }

    fn fmt_children(
        &self,
        steps: &[Step],
        f: &mut fmt::Formatter<'_>,
        prefix: &str,
    ) -> fmt::Result {
        for (i, step) in steps.iter().enumerate() {
            self.fmt_as_tree(step, f, prefix, i + 1 == steps.len())?;
        }
        Ok(())
    }
}

fn short(value: &serde_json::Value) -> String {
    match expression_body(value) {
        Some(body) => body.to_string(),
        None => value.to_string(),
    }
}
