//! Named event tags with optional parents

use std::fmt;
use std::sync::Arc;

/// A named tag attached to an event.
///
/// Markers form a DAG: each marker may have any number of parents, and
/// [`Marker::is_instance_of`] matches the marker itself or any ancestor.
/// Clones are cheap (`Arc`-shared).
#[derive(Clone, PartialEq, Eq)]
pub struct Marker {
    inner: Arc<MarkerInner>,
}

#[derive(PartialEq, Eq)]
struct MarkerInner {
    name: String,
    parents: Vec<Marker>,
}

impl Marker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MarkerInner {
                name: name.into(),
                parents: Vec::new(),
            }),
        }
    }

    /// Create a marker that has the given parents
    pub fn with_parents(name: impl Into<String>, parents: impl IntoIterator<Item = Marker>) -> Self {
        Self {
            inner: Arc::new(MarkerInner {
                name: name.into(),
                parents: parents.into_iter().collect(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn parents(&self) -> &[Marker] {
        &self.inner.parents
    }

    pub fn has_parents(&self) -> bool {
        !self.inner.parents.is_empty()
    }

    /// True if this marker or any of its ancestors is named `name`
    pub fn is_instance_of(&self, name: &str) -> bool {
        if self.inner.name == name {
            return true;
        }
        self.inner.parents.iter().any(|p| p.is_instance_of(name))
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)?;
        if self.has_parents() {
            f.write_str("[ ")?;
            for (i, parent) in self.inner.parents.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", parent)?;
            }
            f.write_str(" ]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Marker({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_of_parent_chain() {
        let db = Marker::new("DB");
        let sql = Marker::with_parents("SQL", [db.clone()]);
        let update = Marker::with_parents("UPDATE", [sql.clone()]);

        assert!(update.is_instance_of("UPDATE"));
        assert!(update.is_instance_of("SQL"));
        assert!(update.is_instance_of("DB"));
        assert!(!db.is_instance_of("SQL"));
    }

    #[test]
    fn test_display() {
        let audit = Marker::new("AUDIT");
        let security = Marker::new("SECURITY");
        let login = Marker::with_parents("LOGIN", [audit, security]);

        assert_eq!(login.to_string(), "LOGIN[ AUDIT, SECURITY ]");
        assert_eq!(Marker::new("PLAIN").to_string(), "PLAIN");
    }
}
