//! Command execution engine

use crate::{Command, EditContext, EditError, EngineConfig, History, Result};
use scene_model::{BezGeometryProvider, Document, GeometryProvider, LayerId, SceneCache, SharedDocument};
use std::collections::HashSet;
use std::sync::Arc;

/// Owns the shared document, its geometry cache and the undo history.
///
/// Every operation takes the document's write lock for its whole duration and
/// flushes the scene's change notifications before releasing it, so readers
/// holding the read lock never see a half-applied command or a stale cache.
pub struct EditingEngine {
    document: SharedDocument,
    history: History,
    cache: Arc<SceneCache>,
    geometry: Arc<dyn GeometryProvider>,
    config: EngineConfig,
}

impl EditingEngine {
    /// Create a new editing engine with an empty document
    pub fn new() -> Self {
        Self::with_document(Document::new())
    }

    /// Create an editing engine around an existing document
    pub fn with_document(document: Document) -> Self {
        Self::build(document, EngineConfig::default(), Arc::new(BezGeometryProvider::new()))
    }

    pub fn with_config(document: Document, config: EngineConfig) -> Result<Self> {
        Self::with_provider(document, config, Arc::new(BezGeometryProvider::new()))
    }

    /// Use a different geometry backend
    pub fn with_provider(
        document: Document,
        config: EngineConfig,
        geometry: Arc<dyn GeometryProvider>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(document, config, geometry))
    }

    fn build(mut document: Document, config: EngineConfig, geometry: Arc<dyn GeometryProvider>) -> Self {
        let cache = Arc::new(SceneCache::new(geometry.clone()));
        document.scene.subscribe(cache.clone());
        // Changes queued before the cache existed are already reflected
        document.scene.flush_changes();

        Self {
            document: document.into_shared(),
            history: History::with_limit(config.max_history),
            cache,
            geometry,
            config,
        }
    }

    /// Execute a command and record it as a new history entry
    pub fn execute(&mut self, command: Box<dyn Command>) -> Result<()> {
        let history = &mut self.history;
        with_context(&self.document, &self.cache, self.geometry.as_ref(), |ctx| {
            history.execute(command, ctx)
        })
    }

    /// Execute a command, folding it into the previous entry when it
    /// continues the same gesture within the configured window
    pub fn execute_merged(&mut self, command: Box<dyn Command>) -> Result<bool> {
        let history = &mut self.history;
        let window = self.config.merge_window();
        with_context(&self.document, &self.cache, self.geometry.as_ref(), |ctx| {
            history.merge(command, ctx, window)
        })
    }

    /// Record a command whose effect is already in the document, delivering
    /// any changes the caller left queued
    pub fn push_applied(&mut self, command: Box<dyn Command>) -> Result<()> {
        let mut guard = self.document.write().map_err(|_| EditError::LockPoisoned)?;
        guard.scene.flush_changes();
        drop(guard);
        self.history.push(command);
        Ok(())
    }

    /// Undo the last command
    pub fn undo(&mut self) -> Result<()> {
        let history = &mut self.history;
        with_context(&self.document, &self.cache, self.geometry.as_ref(), |ctx| history.undo(ctx))
    }

    /// Redo the last undone command
    pub fn redo(&mut self) -> Result<()> {
        let history = &mut self.history;
        with_context(&self.document, &self.cache, self.geometry.as_ref(), |ctx| history.redo(ctx))
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// End the current gesture so the next merged command starts a new entry
    pub fn seal(&mut self) {
        self.history.seal();
    }

    /// Shared handle for readers on other threads
    pub fn document(&self) -> SharedDocument {
        self.document.clone()
    }

    /// Run `f` under the document's read lock
    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> Result<R> {
        let guard = self.document.read().map_err(|_| EditError::LockPoisoned)?;
        Ok(f(&guard))
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn cache(&self) -> &Arc<SceneCache> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drop detached layers no history entry can bring back. Returns the
    /// number of layers removed.
    pub fn compact(&mut self) -> Result<usize> {
        let keep: HashSet<LayerId> = self.history.iter().flat_map(|c| c.retained_layers()).collect();
        let mut guard = self.document.write().map_err(|_| EditError::LockPoisoned)?;
        let purged = guard.scene.purge_detached(&keep);
        if purged > 0 {
            self.cache.clear();
            tracing::debug!(purged, "compacted scene");
        }
        Ok(purged)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

impl Default for EditingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EditingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditingEngine")
            .field("history", &self.history)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Run `f` with the document write-locked, then deliver the changes it queued
fn with_context<R>(
    document: &SharedDocument,
    cache: &SceneCache,
    geometry: &dyn GeometryProvider,
    f: impl FnOnce(&mut EditContext<'_>) -> Result<R>,
) -> Result<R> {
    let mut guard = document.write().map_err(|_| EditError::LockPoisoned)?;
    let result = {
        let mut ctx = EditContext::new(&mut guard, cache, geometry);
        f(&mut ctx)
    };
    guard.scene.flush_changes();
    result
}
