use std::fmt::Display;

/// Why a component was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentSelectionCause {
    Root,
    Requested,
    SelectedByRule,
    Forced,
    ConflictResolution,
    CompositeSubstitution,
    Rejection,
    Constraint,
    ByAncestor,
}

impl ComponentSelectionCause {
    pub fn default_reason(&self) -> &'static str {
        match self {
            ComponentSelectionCause::Root => "root",
            ComponentSelectionCause::Requested => "requested",
            ComponentSelectionCause::SelectedByRule => "selected by rule",
            ComponentSelectionCause::Forced => "forced",
            ComponentSelectionCause::ConflictResolution => "conflict resolution",
            ComponentSelectionCause::CompositeSubstitution => "composite build substitution",
            ComponentSelectionCause::Rejection => "rejection",
            ComponentSelectionCause::Constraint => "constraint",
            ComponentSelectionCause::ByAncestor => "by ancestor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentSelectionDescriptor {
    pub cause: ComponentSelectionCause,
    pub description: Option<String>,
}

impl ComponentSelectionDescriptor {
    pub fn new(cause: ComponentSelectionCause) -> Self {
        ComponentSelectionDescriptor {
            cause,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Display for ComponentSelectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.description {
            Some(description) => f.write_str(description),
            None => f.write_str(self.cause.default_reason()),
        }
    }
}

/// The accumulated causes for a selection, in the order they were recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ComponentSelectionReason {
    descriptors: Vec<ComponentSelectionDescriptor>,
}

impl ComponentSelectionReason {
    pub fn of(descriptor: ComponentSelectionDescriptor) -> Self {
        ComponentSelectionReason {
            descriptors: vec![descriptor],
        }
    }

    pub fn requested() -> Self {
        Self::of(ComponentSelectionDescriptor::new(
            ComponentSelectionCause::Requested,
        ))
    }

    pub fn root() -> Self {
        Self::of(ComponentSelectionDescriptor::new(ComponentSelectionCause::Root))
    }

    /// Identical descriptors are only recorded once.
    pub fn add_cause(&mut self, descriptor: ComponentSelectionDescriptor) {
        if !self.descriptors.contains(&descriptor) {
            self.descriptors.push(descriptor);
        }
    }

    pub fn merge(&mut self, other: &ComponentSelectionReason) {
        for descriptor in &other.descriptors {
            self.add_cause(descriptor.clone());
        }
    }

    pub fn descriptors(&self) -> &[ComponentSelectionDescriptor] {
        &self.descriptors
    }

    pub fn has_cause(&self, cause: ComponentSelectionCause) -> bool {
        self.descriptors.iter().any(|d| d.cause == cause)
    }

    pub fn is_forced(&self) -> bool {
        self.has_cause(ComponentSelectionCause::Forced)
    }

    pub fn is_conflict_resolution(&self) -> bool {
        self.has_cause(ComponentSelectionCause::ConflictResolution)
    }

    /// A selection is expected when nothing beyond the plain request influenced it.
    pub fn is_expected(&self) -> bool {
        self.descriptors.iter().all(|d| {
            matches!(
                d.cause,
                ComponentSelectionCause::Root | ComponentSelectionCause::Requested
            )
        })
    }
}

impl Display for ComponentSelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, descriptor) in self.descriptors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{descriptor}")?;
        }
        Ok(())
    }
}
