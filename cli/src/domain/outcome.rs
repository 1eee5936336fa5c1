//! Result of a best-effort step.

/// Outcome of a step whose individual failures are tolerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    /// The step finished, but some sub-operations failed.
    Warned(Vec<String>),
}

impl StepOutcome {
    /// Build an outcome from collected warnings.
    #[must_use]
    pub fn from_warnings(warnings: Vec<String>) -> Self {
        if warnings.is_empty() {
            Self::Completed
        } else {
            Self::Warned(warnings)
        }
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        match self {
            Self::Completed => &[],
            Self::Warned(w) => w,
        }
    }

    /// Append the warnings of `other`.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        let mut all = self.warnings().to_vec();
        all.extend_from_slice(other.warnings());
        Self::from_warnings(all)
    }
}
