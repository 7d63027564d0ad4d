use std::fmt;
use std::sync::Arc;

use super::{BoundaryValue, ScalarFn};
use crate::error::{Result, SkError};

/// Boundary condition kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Dirichlet,
    Neumann,
    Periodic,
}

/// Condition on one edge of a dimension.
///
/// `value` is the prescribed (separable) value; `None` means homogeneous.
#[derive(Clone)]
pub struct Boundary {
    pub kind: BoundaryKind,
    pub value: Option<BoundaryValue>,
}

impl Boundary {
    pub fn dirichlet() -> Self {
        Self { kind: BoundaryKind::Dirichlet, value: None }
    }

    pub fn neumann() -> Self {
        Self { kind: BoundaryKind::Neumann, value: None }
    }

    pub fn periodic() -> Self {
        Self { kind: BoundaryKind::Periodic, value: None }
    }

    pub fn with_value(mut self, value: BoundaryValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn is_periodic(&self) -> bool {
        self.kind == BoundaryKind::Periodic
    }
}

impl fmt::Debug for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Boundary")
            .field("kind", &self.kind)
            .field("prescribed", &self.value.is_some())
            .finish()
    }
}

/// One coordinate direction of the domain.
#[derive(Clone)]
pub struct Dimension {
    pub name: String,
    pub domain_min: f64,
    pub domain_max: f64,
    /// Initial hierarchical level.
    pub level: usize,
    /// Basis functions per element along this dimension.
    pub degree: usize,
    pub left: Boundary,
    pub right: Boundary,
    pub initial_condition: ScalarFn,
}

impl Dimension {
    /// A dimension with homogeneous dirichlet conditions on both edges.
    pub fn new(
        name: impl Into<String>,
        domain_min: f64,
        domain_max: f64,
        level: usize,
        degree: usize,
        initial_condition: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            domain_min,
            domain_max,
            level,
            degree,
            left: Boundary::dirichlet(),
            right: Boundary::dirichlet(),
            initial_condition: Arc::new(initial_condition),
        }
    }

    pub fn with_boundaries(mut self, left: Boundary, right: Boundary) -> Self {
        self.left = left;
        self.right = right;
        self
    }

    pub fn with_level(mut self, level: usize) -> Self {
        self.level = level;
        self
    }

    pub fn with_degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    pub fn length(&self) -> f64 {
        self.domain_max - self.domain_min
    }

    /// Width of one cell when the dimension is resolved to `level`.
    pub fn cell_width(&self, level: usize) -> f64 {
        self.length() / (1usize << level) as f64
    }

    pub fn is_periodic(&self) -> bool {
        self.left.is_periodic()
    }

    pub(crate) fn validate(&self, num_dims: usize) -> Result<()> {
        if !(self.domain_min.is_finite() && self.domain_max.is_finite())
            || self.domain_min >= self.domain_max
        {
            return Err(SkError::Config(format!(
                "dimension '{}': invalid domain [{}, {}]",
                self.name, self.domain_min, self.domain_max
            )));
        }
        if self.degree == 0 {
            return Err(SkError::Config(format!(
                "dimension '{}': degree must be at least 1",
                self.name
            )));
        }
        if self.left.is_periodic() != self.right.is_periodic() {
            return Err(SkError::Config(format!(
                "dimension '{}': periodic conditions must be set on both edges",
                self.name
            )));
        }
        for side in [&self.left, &self.right] {
            if let Some(value) = &side.value {
                if side.is_periodic() {
                    return Err(SkError::Config(format!(
                        "dimension '{}': periodic edges take no prescribed value",
                        self.name
                    )));
                }
                if value.num_dims() != num_dims {
                    return Err(SkError::Config(format!(
                        "dimension '{}': boundary value has {} spatial factors, expected {}",
                        self.name,
                        value.num_dims(),
                        num_dims
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dimension")
            .field("name", &self.name)
            .field("domain", &(self.domain_min, self.domain_max))
            .field("level", &self.level)
            .field("degree", &self.degree)
            .field("left", &self.left)
            .field("right", &self.right)
            .finish()
    }
}
