//! File-backed HTML views with layouts, rendered through `handlebars`.
//!
//! A view `users/show` lives at `<views_path>/users/show.html`; a layout
//! `main` lives at `<views_path>/layouts/main.html`. Both are rendered as
//! handlebars templates against the carried data merged with the call's
//! parameters, so `{{user.name}}` reads nested values and output is
//! HTML-escaped. The layout's `{{content}}` is then replaced with the
//! rendered view.
//!
//! Page tags are applied last and replace only the first occurrence of their
//! placeholder, which suits one-off slots such as `{{title}}` in a layout head.

use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
};

use handlebars::Handlebars;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Renders named views, optionally inside a layout.
pub trait Renderer: Send + Sync {
    /// The rendered page, or `None` when the view cannot be found or rendered.
    fn render(&self, view: &str, params: &Map<String, Value>, layout: Option<&str>)
    -> Option<String>;

    /// The layout error pages are rendered inside.
    fn error_layout(&self) -> Option<&str>;
}

/// A [`Renderer`] reading handlebars templates from a directory.
///
/// File existence is checked once per path and cached for the life of the
/// `View`; files added or removed afterwards are not noticed.
///
/// # Examples
///
/// ```rust,no_run
/// use routekit::view::{Renderer, View};
/// use serde_json::{Map, json};
///
/// let view = View::new("resources/views")
///     .with_error_layout("main")
///     .carry("app", "Routekit")
///     .page_tag("title", "Home");
///
/// let mut params = Map::new();
/// params.insert("user".into(), json!({"name": "Ada"}));
/// let html = view.render("home", &params, Some("main"));
/// ```
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct View {
    views_path: PathBuf,
    extension: String,
    error_layout: Option<String>,
    carry: Map<String, Value>,
    page_tags: Map<String, Value>,
    #[serde(skip)]
    registry: Handlebars<'static>,
    #[serde(skip)]
    exists: RwLock<HashMap<PathBuf, bool>>,
}

impl View {
    pub fn new(views_path: impl Into<PathBuf>) -> Self {
        Self {
            views_path: views_path.into(),
            extension: "html".to_owned(),
            ..Self::default()
        }
    }

    /// Parses view settings from a JSON document.
    ///
    /// # Errors
    ///
    /// Propagates the `serde_json` error for malformed documents or mistyped keys.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut view: Self = serde_json::from_str(json)?;
        if view.extension.is_empty() {
            view.extension = "html".to_owned();
        }
        Ok(view)
    }

    /// Template file extension, without the dot.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    #[must_use]
    pub fn with_error_layout(mut self, layout: impl Into<String>) -> Self {
        self.error_layout = Some(layout.into());
        self
    }

    /// Makes `key` available to every render. Per-call parameters take precedence.
    #[must_use]
    pub fn carry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.carry.insert(key.into(), value.into());
        self
    }

    /// Sets a page tag, replacing the first `{{key}}` left after rendering.
    #[must_use]
    pub fn page_tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.page_tags.insert(key.into(), value.into());
        self
    }

    pub fn views_path(&self) -> &Path {
        &self.views_path
    }

    pub fn carried(&self) -> &Map<String, Value> {
        &self.carry
    }

    pub fn page_tags(&self) -> &Map<String, Value> {
        &self.page_tags
    }

    pub fn has_view(&self, view: &str) -> bool {
        self.view_path(view).is_file()
    }

    pub fn has_layout(&self, layout: &str) -> bool {
        self.layout_path(layout).is_file()
    }

    fn view_path(&self, view: &str) -> PathBuf {
        self.views_path.join(format!("{view}.{}", self.extension))
    }

    fn layout_path(&self, layout: &str) -> PathBuf {
        self.views_path
            .join("layouts")
            .join(format!("{layout}.{}", self.extension))
    }

    fn exists(&self, path: &Path) -> bool {
        if let Some(&known) = self.exists.read().get(path) {
            return known;
        }
        let found = path.is_file();
        self.exists.write().insert(path.to_path_buf(), found);
        found
    }

    fn read(&self, path: &Path) -> Option<String> {
        if !self.exists(path) {
            warn!(path = %path.display(), "view file does not exist");
            return None;
        }
        match fs::read_to_string(path) {
            Ok(source) => Some(source),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "view file could not be read");
                None
            }
        }
    }

    fn render_file(&self, path: &Path, data: &Map<String, Value>) -> Option<String> {
        let source = self.read(path)?;
        match self.registry.render_template(&source, data) {
            Ok(html) => Some(html),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "view failed to render");
                None
            }
        }
    }
}

impl Renderer for View {
    fn render(
        &self,
        view: &str,
        params: &Map<String, Value>,
        layout: Option<&str>,
    ) -> Option<String> {
        let mut data = self.carry.clone();
        data.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        // Slots filled after rendering resolve to their own placeholder.
        for tag in self.page_tags.keys() {
            if !data.contains_key(tag) {
                data.insert(tag.clone(), Value::String(placeholder(tag)));
            }
        }

        let content = self.render_file(&self.view_path(view), &data)?;

        let mut page = match layout.filter(|l| self.exists(&self.layout_path(l))) {
            Some(layout) => {
                data.insert("content".to_owned(), Value::String(placeholder("content")));
                self.render_file(&self.layout_path(layout), &data)?
                    .replace(&placeholder("content"), &content)
            }
            None => {
                if let Some(layout) = layout {
                    warn!(layout = %layout, "layout does not exist, rendering bare view");
                }
                content
            }
        };

        for (tag, value) in &self.page_tags {
            let text = match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            page = page.replacen(&placeholder(tag), &text, 1);
        }
        Some(page)
    }

    fn error_layout(&self) -> Option<&str> {
        self.error_layout.as_deref()
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("views_path", &self.views_path)
            .field("extension", &self.extension)
            .field("error_layout", &self.error_layout)
            .field("carry", &self.carry)
            .field("page_tags", &self.page_tags)
            .finish_non_exhaustive()
    }
}

fn placeholder(key: &str) -> String {
    format!("{{{{{key}}}}}")
}
