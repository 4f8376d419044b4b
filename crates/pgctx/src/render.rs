//! Rendering seams: templates, compiled-template caching and document engines.
//!
//! The template engine and the document engine are external. This module only
//! fixes their interfaces, feeds them shaped [`Value`]s and owns their
//! lifecycle.

use crate::cache::TtlCache;
use crate::client::GenericClient;
use crate::error::{CtxError, CtxResult};
use crate::fetcher::ContextDataFetcher;
use crate::value::{EntityId, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Lifetime of a compiled template.
pub const DEFAULT_TEMPLATE_TTL: Duration = Duration::from_secs(3600);

/// Number of compiled templates kept.
pub const DEFAULT_TEMPLATE_CAPACITY: usize = 64;

/// Turns template markup plus a shaped value into markup.
pub trait TemplateRenderer: Send + Sync {
    type Compiled: Send + Sync;

    fn compile(&self, markup: &str) -> CtxResult<Self::Compiled>;

    fn render(&self, compiled: &Self::Compiled, data: &Value) -> CtxResult<String>;
}

/// Turns final markup into document bytes.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render_document(&self, markup: &str) -> CtxResult<Vec<u8>>;

    /// Release engine resources. Called once by [`SharedEngine::shutdown`].
    async fn shutdown(&self) -> CtxResult<()> {
        Ok(())
    }
}

/// A stored template bound to a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub context: String,
    pub html_content: String,
    #[serde(default)]
    pub default_sample_entity_id: Option<Uuid>,
}

impl Template {
    pub fn new(
        name: impl Into<String>,
        context: impl Into<String>,
        html_content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            context: context.into(),
            html_content: html_content.into(),
            default_sample_entity_id: None,
        }
    }

    fn markup_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.html_content.hash(&mut hasher);
        hasher.finish()
    }
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> CtxResult<Option<Template>>;

    /// First template of `context`, optionally restricted to `name`.
    async fn find_for_context(
        &self,
        context: &str,
        name: Option<&str>,
    ) -> CtxResult<Option<Template>>;
}

/// Templates kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryTemplateStore {
    templates: RwLock<Vec<Template>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(self, template: Template) -> Self {
        self.insert(template);
        self
    }

    /// Add a template, replacing one with the same id.
    pub fn insert(&self, template: Template) {
        let mut templates = self
            .templates
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => templates.push(template),
        }
    }

    pub fn remove(&self, id: Uuid) -> Option<Template> {
        let mut templates = self
            .templates
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let pos = templates.iter().position(|t| t.id == id)?;
        Some(templates.remove(pos))
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn find_by_id(&self, id: Uuid) -> CtxResult<Option<Template>> {
        let templates = self.templates.read().unwrap_or_else(PoisonError::into_inner);
        Ok(templates.iter().find(|t| t.id == id).cloned())
    }

    async fn find_for_context(
        &self,
        context: &str,
        name: Option<&str>,
    ) -> CtxResult<Option<Template>> {
        let templates = self.templates.read().unwrap_or_else(PoisonError::into_inner);
        Ok(templates
            .iter()
            .find(|t| t.context == context && name.is_none_or(|n| t.name == n))
            .cloned())
    }
}

/// Compiled-template key: an edited template gets a new key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CompiledKey {
    template: Uuid,
    markup: u64,
}

/// Renders contexts through a [`TemplateRenderer`].
pub struct RenderService<R: TemplateRenderer> {
    renderer: R,
    templates: Arc<dyn TemplateStore>,
    fetcher: Arc<ContextDataFetcher>,
    compiled: TtlCache<CompiledKey, Arc<R::Compiled>>,
}

impl<R: TemplateRenderer> RenderService<R> {
    pub fn new(
        renderer: R,
        templates: Arc<dyn TemplateStore>,
        fetcher: Arc<ContextDataFetcher>,
    ) -> Self {
        Self {
            renderer,
            templates,
            fetcher,
            compiled: TtlCache::new(DEFAULT_TEMPLATE_CAPACITY, DEFAULT_TEMPLATE_TTL),
        }
    }

    /// Replace the compiled-template cache bounds.
    pub fn with_compiled_cache(mut self, capacity: usize, ttl: Duration) -> Self {
        self.compiled = TtlCache::new(capacity, ttl);
        self
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn fetcher(&self) -> &ContextDataFetcher {
        &self.fetcher
    }

    /// Render the stored template `template_id` with caller-supplied data.
    pub async fn render_template(&self, template_id: Uuid, data: &Value) -> CtxResult<String> {
        let template = self
            .templates
            .find_by_id(template_id)
            .await?
            .ok_or_else(|| CtxError::TemplateNotFound(template_id.to_string()))?;
        let compiled = self.compiled(&template)?;
        self.renderer.render(&compiled, data)
    }

    /// Fetch the shaped data of `context` for `id` and render it.
    ///
    /// `template_name` picks among several templates of one context; without
    /// it the first registered template is used.
    pub async fn render_context<C: GenericClient>(
        &self,
        conn: &C,
        context: &str,
        id: &EntityId,
        template_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> CtxResult<String> {
        let profile = self.fetcher.profile(context).await?;
        let template = self
            .templates
            .find_for_context(context, template_name)
            .await?
            .ok_or_else(|| match template_name {
                Some(name) => CtxError::TemplateNotFound(format!("{context}/{name}")),
                None => CtxError::TemplateNotFound(context.to_string()),
            })?;

        let data = self
            .fetcher
            .fetch_with_profile(conn, &profile, id, cancel)
            .await?
            .ok_or_else(|| CtxError::NotFound(format!("{} with Id '{id}'", profile.root_entity)))?;

        let compiled = self.compiled(&template)?;
        tracing::debug!(target: "pgctx", context, template = %template.name, "rendering template");
        self.renderer.render(&compiled, &data)
    }

    fn compiled(&self, template: &Template) -> CtxResult<Arc<R::Compiled>> {
        let key = CompiledKey {
            template: template.id,
            markup: template.markup_hash(),
        };
        if let Some(hit) = self.compiled.get(&key) {
            return Ok(hit);
        }
        let compiled = Arc::new(self.renderer.compile(&template.html_content)?);
        self.compiled.insert(key, Arc::clone(&compiled));
        Ok(compiled)
    }
}

/// One shared document engine, started on first use.
///
/// Concurrent first callers run a single initializer; the others wait for it
/// and reuse its engine. After [`shutdown`](Self::shutdown) the next
/// [`get_or_start`](Self::get_or_start) starts a fresh engine.
pub struct SharedEngine<D> {
    cell: Mutex<Arc<OnceCell<Arc<D>>>>,
}

impl<D> Default for SharedEngine<D> {
    fn default() -> Self {
        Self {
            cell: Mutex::new(Arc::new(OnceCell::new())),
        }
    }
}

impl<D: DocumentRenderer> SharedEngine<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The running engine, starting it with `start` if there is none.
    pub async fn get_or_start<F, Fut>(&self, start: F) -> CtxResult<Arc<D>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CtxResult<D>>,
    {
        let cell = self.current();
        let engine = cell
            .get_or_try_init(|| async move {
                tracing::info!(target: "pgctx", "starting document engine");
                start().await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(engine))
    }

    pub fn is_running(&self) -> bool {
        self.current().initialized()
    }

    /// Detach the running engine and shut it down.
    ///
    /// Handles obtained earlier stay valid until dropped.
    pub async fn shutdown(&self) -> CtxResult<()> {
        let previous = {
            let mut cell = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *cell, Arc::new(OnceCell::new()))
        };
        match previous.get() {
            Some(engine) => {
                tracing::info!(target: "pgctx", "shutting down document engine");
                engine.shutdown().await
            }
            None => Ok(()),
        }
    }

    fn current(&self) -> Arc<OnceCell<Arc<D>>> {
        Arc::clone(&self.cell.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
