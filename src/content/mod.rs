//! Content resolution: from an event's primary subject to a display-ready
//! [`ContentObject`].
//!
//! [`ContentResolver`] walks an ordered chain of [`ContentHandler`]s and
//! uses the first one that accepts the subject. When none does, `file://`
//! subjects go to [`FileHandler`] and everything else to
//! [`GenericHandler`]. Building runs on Tokio's blocking pool because
//! file-backed handlers touch the filesystem. Results are cached per
//! subject URI for the lifetime of the resolver.

pub mod handlers;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Event, Subject};

pub use handlers::{
    ApplicationHandler, ConversationHandler, FileHandler, GenericHandler, WebHandler,
};

/// Broad family of a resolved subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// A local file.
    File,
    /// A web page.
    Web,
    /// An application launcher.
    Application,
    /// A chat conversation.
    Conversation,
    /// Anything else.
    Generic,
}

impl ContentKind {
    /// Returns the kind as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Web => "web",
            Self::Application => "application",
            Self::Conversation => "conversation",
            Self::Generic => "generic",
        }
    }
}

/// Whether a preview can be produced for the subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Preview {
    /// The backing file exists and can be thumbnailed.
    Available {
        /// Local path of the file.
        path: PathBuf,
        /// Size in bytes.
        size: u64,
        /// Last modification time, when the filesystem reports one.
        modified: Option<DateTime<Utc>>,
    },
    /// No preview: the resource is remote, virtual, or gone.
    Unavailable,
}

impl Preview {
    /// Returns `true` if a preview can be produced.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

/// Display-ready description of an event subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentObject {
    /// Subject URI the object was built from.
    pub uri: String,
    /// Broad family.
    pub kind: ContentKind,
    /// Human-readable title.
    pub title: String,
    /// Freedesktop icon name.
    pub icon_name: String,
    /// MIME type, empty when unknown.
    pub mimetype: String,
    /// Preview capability.
    pub preview: Preview,
    /// Name of the handler that built the object.
    pub handler: &'static str,
}

/// A candidate in the resolution chain.
pub trait ContentHandler: Send + Sync + fmt::Debug {
    /// Short name used in logs and in [`ContentObject::handler`].
    fn name(&self) -> &'static str;

    /// Returns `true` if this handler knows how to present the subject.
    fn can_handle(&self, event: &Event, subject: &Subject) -> bool;

    /// Builds the content object. Must not fail: resources that no longer
    /// exist produce an object without preview.
    fn build(&self, event: &Event, subject: &Subject) -> ContentObject;
}

/// Resolves event subjects to content objects, caching by URI.
#[derive(Debug)]
pub struct ContentResolver {
    handlers: Vec<Arc<dyn ContentHandler>>,
    file: Arc<dyn ContentHandler>,
    generic: Arc<dyn ContentHandler>,
    cache: Mutex<HashMap<String, Arc<ContentObject>>>,
}

impl ContentResolver {
    /// Creates a resolver with the built-in handler chain:
    /// web pages, application launchers, then conversations.
    #[must_use]
    pub fn new() -> Self {
        Self::with_handlers(vec![
            Arc::new(WebHandler),
            Arc::new(ApplicationHandler),
            Arc::new(ConversationHandler),
        ])
    }

    /// Creates a resolver with a custom handler chain, tried in order
    /// before the file and generic fallbacks.
    #[must_use]
    pub fn with_handlers(handlers: Vec<Arc<dyn ContentHandler>>) -> Self {
        Self {
            handlers,
            file: Arc::new(FileHandler),
            generic: Arc::new(GenericHandler),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Picks the handler for a subject: the first accepting candidate,
    /// else the file fallback for `file://` URIs, else the generic one.
    #[must_use]
    pub fn select(&self, event: &Event, subject: &Subject) -> Arc<dyn ContentHandler> {
        self.handlers
            .iter()
            .find(|h| h.can_handle(event, subject))
            .map(Arc::clone)
            .unwrap_or_else(|| {
                if self.file.can_handle(event, subject) {
                    Arc::clone(&self.file)
                } else {
                    Arc::clone(&self.generic)
                }
            })
    }

    /// Resolves the event's primary subject.
    ///
    /// Returns `None` only for events without subjects. Cached objects are
    /// shared between all events with the same subject URI.
    pub async fn resolve(&self, event: &Event) -> Option<Arc<ContentObject>> {
        let subject = event.primary_subject()?;
        if let Some(hit) = self.cached(&subject.uri) {
            return Some(hit);
        }

        let handler = self.select(event, subject);
        let name = handler.name();
        let owned_event = event.clone();
        let owned_subject = subject.clone();
        let built = tokio::task::spawn_blocking(move || handler.build(&owned_event, &owned_subject))
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(uri = %subject.uri, handler = name, %err, "content build failed; using generic object");
                self.generic.build(event, subject)
            });

        tracing::trace!(uri = %subject.uri, handler = built.handler, "content resolved");
        Some(self.remember(built))
    }

    /// Number of cached content objects.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Drops every cached object.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn cached(&self, uri: &str) -> Option<Arc<ContentObject>> {
        let cache = self.cache.lock().ok()?;
        cache.get(uri).map(Arc::clone)
    }

    /// Caches a freshly built object unless a concurrent resolution got
    /// there first, in which case the earlier object is kept and returned.
    fn remember(&self, object: ContentObject) -> Arc<ContentObject> {
        let object = Arc::new(object);
        match self.cache.lock() {
            Ok(mut cache) => Arc::clone(
                cache
                    .entry(object.uri.clone())
                    .or_insert_with(|| Arc::clone(&object)),
            ),
            Err(_) => object,
        }
    }
}

impl Default for ContentResolver {
    fn default() -> Self {
        Self::new()
    }
}
