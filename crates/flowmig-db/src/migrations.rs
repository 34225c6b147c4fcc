/// A single schema change, identified by an ID that is applied at most once.
///
/// The engine treats equal IDs as equal content: once an ID is recorded in the
/// tracking table it is never applied again, so a shipped step must never have
/// its `up` SQL changed under the same ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub id: String,
    pub up: String,
    /// Reverses `up`. Stored for operators, never executed by the engine.
    pub down: String,
}

impl Step {
    pub fn new(id: impl Into<String>, up: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            up: up.into(),
            down: String::new(),
        }
    }

    pub fn with_down(mut self, down: impl Into<String>) -> Self {
        self.down = down.into();
        self
    }
}

/// An ordered bundle of related steps, usually one per source file.
///
/// Step order is preserved exactly as registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flow {
    steps: Vec<Step>,
}

impl Flow {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

impl FromIterator<Step> for Flow {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl IntoIterator for Flow {
    type Item = Step;
    type IntoIter = std::vec::IntoIter<Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}
