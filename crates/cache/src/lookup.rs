/// Outcome of reading a cached artifact for a [`FileIdentity`](crate::FileIdentity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// A record exists and was created from the same modification time.
    Hit(T),
    /// Nothing is cached for the path.
    Miss,
    /// A record exists but was created from a different modification time.
    Stale,
}
impl<T> Lookup<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// The cached value, if it is usable.
    pub fn hit(self) -> Option<T> {
        match self {
            Self::Hit(value) => Some(value),
            Self::Miss | Self::Stale => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Hit(value) => Lookup::Hit(f(value)),
            Self::Miss => Lookup::Miss,
            Self::Stale => Lookup::Stale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit() {
        assert_eq!(Lookup::Hit(3).map(|n| n * 2).hit(), Some(6));
        assert_eq!(Lookup::<u8>::Stale.hit(), None);
        assert!(!Lookup::<u8>::Miss.is_hit());
    }
}
