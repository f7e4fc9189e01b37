//! Template capability seam and the compile-once cache.
//!
//! Template syntax and merging belong to the embedding application; the
//! engine only requires that a template can be compiled once and injected
//! many times. The cache around the seam is what makes a 20k-target run
//! compile each template exactly once instead of 20k times.

use std::sync::Arc;

use ahash::AHashMap;
use dashmap::DashMap;

use crate::error::TemplateError;

/// Placeholder tags available to a template, keyed by tag name.
pub type TagMap = AHashMap<String, String>;

/// Compiles template source into a reusable form.
pub trait TemplateEngine: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the source does not compile.
    fn compile(&self, source: &str) -> Result<Arc<dyn CompiledTemplate>, TemplateError>;
}

/// A compiled template, injectable with different tag sets across thousands
/// of targets.
pub trait CompiledTemplate: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if injection fails.
    fn inject(&self, tags: &TagMap) -> Result<String, TemplateError>;
}

/// Process-lifetime cache of compiled templates, keyed by template source
/// identity.
///
/// Unbounded on purpose: template variety per run is small and bounded by
/// operator input. The first compile for a given source runs inside the
/// map's entry lock, so concurrent first use compiles exactly once;
/// steady-state lookups take no write lock.
pub struct TemplateCache {
    engine: Arc<dyn TemplateEngine>,
    compiled: DashMap<String, Arc<dyn CompiledTemplate>, ahash::RandomState>,
}

impl TemplateCache {
    #[must_use]
    pub fn new(engine: Arc<dyn TemplateEngine>) -> Self {
        Self {
            engine,
            compiled: DashMap::default(),
        }
    }

    /// Inject `tags` into `source`, compiling the source on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if compilation or injection fails. A failed
    /// compilation is not cached; the next use retries it.
    pub fn inject(&self, source: &str, tags: &TagMap) -> Result<String, TemplateError> {
        if let Some(compiled) = self.compiled.get(source) {
            return compiled.inject(tags);
        }

        let entry = self
            .compiled
            .entry(source.to_owned())
            .or_try_insert_with(|| self.engine.compile(source))?;
        let compiled = Arc::clone(&entry);
        drop(entry);

        compiled.inject(tags)
    }

    /// Number of distinct templates compiled so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Engine that substitutes `{{tag}}` markers and counts compilations.
    struct CountingEngine {
        compiles: Arc<AtomicUsize>,
    }

    struct Substitution {
        source: String,
    }

    impl TemplateEngine for CountingEngine {
        fn compile(&self, source: &str) -> Result<Arc<dyn CompiledTemplate>, TemplateError> {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Substitution {
                source: source.to_owned(),
            }))
        }
    }

    impl CompiledTemplate for Substitution {
        fn inject(&self, tags: &TagMap) -> Result<String, TemplateError> {
            let mut rendered = self.source.clone();
            for (key, value) in tags {
                rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
            }
            Ok(rendered)
        }
    }

    fn cache() -> (TemplateCache, Arc<AtomicUsize>) {
        let compiles = Arc::new(AtomicUsize::new(0));
        let engine = CountingEngine {
            compiles: Arc::clone(&compiles),
        };
        (TemplateCache::new(Arc::new(engine)), compiles)
    }

    #[test]
    fn repeated_use_compiles_once() {
        let (cache, compiles) = cache();
        let mut tags = TagMap::default();
        tags.insert("name".to_string(), "Ada".to_string());

        let first = cache.inject("Hello {{name}}", &tags).unwrap();
        let second = cache.inject("Hello {{name}}", &tags).unwrap();

        assert_eq!(first, "Hello Ada");
        assert_eq!(first, second);
        assert_eq!(compiles.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_sources_compile_separately() {
        let (cache, compiles) = cache();
        let tags = TagMap::default();

        cache.inject("one", &tags).unwrap();
        cache.inject("two", &tags).unwrap();
        cache.inject("one", &tags).unwrap();

        assert_eq!(compiles.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn identical_injections_are_identical() {
        let (cache, _) = cache();
        let mut tags = TagMap::default();
        tags.insert("invoice".to_string(), "INV-1".to_string());

        let first = cache.inject("Invoice {{invoice}}", &tags).unwrap();
        let second = cache.inject("Invoice {{invoice}}", &tags).unwrap();
        assert_eq!(first, second);
    }
}
