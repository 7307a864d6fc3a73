//! Process-wide configuration.
//!
//! Holds the identifier generator used when an aggregate tracks its first
//! event without an explicit id. The default produces random UUID v4 strings.
//!
//! The generator is read on every call to [`generate_id`]; replacing it
//! affects every aggregate created afterwards in the whole process. Tests that
//! need deterministic ids should use [`override_id_generator`], which restores
//! the previous generator when the guard is dropped.
//!
//! ```
//! use eventide_core::config;
//!
//! let _guard = config::override_id_generator(config::IdGenerator::from_fn(|| "fixed".into()));
//! assert_eq!(config::generate_id(), "fixed");
//! ```

use std::{
    fmt,
    sync::{Arc, LazyLock},
};

use parking_lot::RwLock;

/// A pluggable `() -> String` identifier source.
///
/// Returning an empty string signals failure; aggregates then refuse to track
/// the event with [`Error::EmptyId`](crate::error::Error::EmptyId).
#[derive(Clone)]
pub struct IdGenerator(Arc<dyn Fn() -> String + Send + Sync>);

impl IdGenerator {
    /// Random, collision-resistant identifiers (UUID v4).
    #[must_use]
    pub fn random() -> Self {
        Self::from_fn(|| uuid::Uuid::new_v4().to_string())
    }

    pub fn from_fn(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    #[must_use]
    pub fn generate(&self) -> String {
        (self.0)()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::random()
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IdGenerator").finish_non_exhaustive()
    }
}

static ID_GENERATOR: LazyLock<RwLock<IdGenerator>> =
    LazyLock::new(|| RwLock::new(IdGenerator::random()));

/// Produce an identifier from the configured generator.
#[must_use]
pub fn generate_id() -> String {
    let generator = ID_GENERATOR.read().clone();
    generator.generate()
}

/// The generator currently in use.
#[must_use]
pub fn id_generator() -> IdGenerator {
    ID_GENERATOR.read().clone()
}

/// Replace the process-wide generator, returning the previous one.
pub fn set_id_generator(generator: IdGenerator) -> IdGenerator {
    tracing::debug!("replacing process-wide id generator");
    std::mem::replace(&mut *ID_GENERATOR.write(), generator)
}

/// Restore the default random generator.
pub fn reset_id_generator() {
    set_id_generator(IdGenerator::random());
}

/// Replace the generator until the returned guard is dropped.
#[must_use = "the previous generator is restored when the guard is dropped"]
pub fn override_id_generator(generator: IdGenerator) -> IdGeneratorGuard {
    IdGeneratorGuard {
        previous: Some(set_id_generator(generator)),
    }
}

/// Restores the previous identifier generator on drop.
#[derive(Debug)]
pub struct IdGeneratorGuard {
    previous: Option<IdGenerator>,
}

impl Drop for IdGeneratorGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            set_id_generator(previous);
        }
    }
}
