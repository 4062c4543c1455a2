//! Optional external collaborators.

/// An external collaborator that may be absent.
///
/// Built once at startup from configuration. `Unavailable` is a normal state:
/// callers take their degraded path and log at `debug`, whereas a failing
/// `Available` handle is logged at `warn` before degrading the same way.
#[derive(Debug, Clone, Default)]
pub enum Capability<T> {
    #[default]
    Unavailable,
    Available(T),
}

impl<T> Capability<T> {
    #[must_use]
    pub fn as_available(&self) -> Option<&T> {
        match self {
            Self::Available(inner) => Some(inner),
            Self::Unavailable => None,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

impl<T> From<Option<T>> for Capability<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unavailable, Self::Available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_option() {
        assert!(Capability::from(Some(1)).is_available());
        assert!(!Capability::<u8>::from(None).is_available());
        assert_eq!(Capability::Available(3).as_available(), Some(&3));
    }
}
