use indexmap::IndexMap;
use serde::Serialize;

mod display;
pub mod expr;
pub mod primitives;
mod step;
pub mod verify;

pub use display::DisplayProgram;
pub use step::*;

/// A named, parametrized step sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Routine {
    pub params: Vec<String>,
    pub steps: Vec<Step>,
}

impl Routine {
    pub fn new(params: Vec<String>, steps: Vec<Step>) -> Self {
        Self { params, steps }
    }

    /// Visits every step of the routine, depth-first in program order.
    pub fn visit<'s>(&'s self, f: &mut impl FnMut(&'s Step)) {
        for step in &self.steps {
            step.visit(f);
        }
    }

    /// Number of steps including nested ones.
    pub fn step_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |_| count += 1);
        count
    }
}

/// The compiled artifact: `main` followed by every generated routine, in
/// registration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Program {
    routines: IndexMap<String, Routine>,
}

/// The structure of a program with names erased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramShape {
    /// Per routine: parameter count and step kinds in depth-first order.
    pub routines: Vec<(usize, Vec<&'static str>)>,
}

impl Program {
    pub const MAIN: &'static str = "main";

    pub fn from_routines(routines: IndexMap<String, Routine>) -> Self {
        Self { routines }
    }

    pub fn main(&self) -> Option<&Routine> {
        self.routines.get(Self::MAIN)
    }

    pub fn routine(&self, name: &str) -> Option<&Routine> {
        self.routines.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routines.contains_key(name)
    }

    pub fn routines(&self) -> impl Iterator<Item = (&str, &Routine)> {
        self.routines.iter().map(|(name, r)| (name.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.routines.values().map(Routine::step_count).sum()
    }

    pub fn shape(&self) -> ProgramShape {
        let routines = self
            .routines
            .values()
            .map(|routine| {
                let mut kinds = Vec::new();
                routine.visit(&mut |step| kinds.push(step.kind_name()));
                (routine.params.len(), kinds)
            })
            .collect();
        ProgramShape { routines }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
