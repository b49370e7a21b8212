use lasso::{Key, Rodeo, Spur};

/// An opaque handle to a caller-supplied guard predicate or callback.
///
/// The table never inspects what a handle refers to; resolving a handle to
/// an actual host routine (and validating its signature) is an external
/// collaborator's job. Handles only need equality, hashing, and a total
/// order so that guard lists have a canonical sorted form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(Spur);

impl HandleId {
    fn key(self) -> usize {
        self.0.into_usize()
    }
}

impl PartialOrd for HandleId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HandleId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

/// Interner for guard/callback handle names.
///
/// Guarantees:
/// - Same name always produces the same HandleId
/// - Different names always produce different HandleIds
/// - A HandleId can be resolved back to its name (needed when the table
///   is serialized, since raw handles are not stable across processes)
///
/// Interning takes `&mut self`; this matches the table's build lifecycle,
/// where all registration happens before the table freezes.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    rodeo: Rodeo,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            rodeo: Rodeo::new(),
        }
    }

    /// Intern a handle name, returning its unique HandleId.
    pub fn intern(&mut self, name: &str) -> HandleId {
        HandleId(self.rodeo.get_or_intern(name))
    }

    /// Resolve a HandleId back to its name.
    /// Returns None if the handle was not created by this registry.
    pub fn resolve(&self, handle: HandleId) -> Option<&str> {
        self.rodeo.try_resolve(&handle.0)
    }

    /// Get the HandleId for a name if it exists, without interning.
    pub fn get(&self, name: &str) -> Option<HandleId> {
        self.rodeo.get(name).map(HandleId)
    }

    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}
