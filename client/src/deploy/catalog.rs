//! Canonical step catalog
//!
//! Configuration data, not protocol traffic: the fixed list of steps the
//! orchestrator walks through for a full deployment. The progress view
//! divides by this catalog so the bar reflects true completion even while
//! early steps have not reported yet.

/// Steps of a full deployment, in the order the orchestrator runs them
pub const CANONICAL_STEPS: [&str; 12] = [
    "Validation",
    "EC2 Creation",
    "Docker Installation",
    "NGINX Installation",
    "Repository Clone",
    "Project Validation",
    "Docker Build",
    "Container Deployment",
    "NGINX Configuration",
    "Health Check",
    "Deployment Complete",
    "Cleanup",
];

/// Read-only catalog of expected deployment steps
#[derive(Debug, Clone)]
pub struct StepCatalog {
    steps: Vec<String>,
}

impl StepCatalog {
    pub fn new(steps: Vec<String>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, step: &str) -> bool {
        self.steps.iter().any(|s| s == step)
    }
}

impl Default for StepCatalog {
    fn default() -> Self {
        Self::new(CANONICAL_STEPS.iter().map(|s| s.to_string()).collect())
    }
}
