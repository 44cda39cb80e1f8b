//! Embeddable component registry.
//!
//! Components extracted from articles (see [`crate::render`]) are written to
//! the components directory as `<Name>.<ext>`, together with a plugin file
//! that registers each of them with the client-side framework:
//!
//! ```text
//! import Vue from 'vue'
//! exports.install = function() { Vue.component('Counter', require('./Counter.vue')); };
//! ```
//!
//! The directory is rebuilt from scratch every build: stale component files
//! are removed before articles are processed, and the set of names written
//! afterwards is held in memory and used verbatim for the plugin file. The
//! plugin file is rewritten on every build.

use crate::render::Component;
use crate::write::{WriteError, write_always, write_if_changed};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    dir: PathBuf,
    extension: String,
    plugin_file: String,
}

impl ComponentRegistry {
    pub fn new(dir: impl Into<PathBuf>, extension: &str, plugin_file: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.to_string(),
            plugin_file: plugin_file.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn plugin_path(&self) -> PathBuf {
        self.dir.join(&self.plugin_file)
    }

    /// Remove every component file left by a previous build.
    ///
    /// Creates the directory if needed. Returns how many files were removed.
    pub fn clear(&self) -> io::Result<usize> {
        fs::create_dir_all(&self.dir)?;
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && self.is_component_file(&path) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        debug!(dir = %self.dir.display(), removed, "cleared stale components");
        Ok(removed)
    }

    fn is_component_file(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|e| e.to_string_lossy() == self.extension.as_str())
    }

    /// Write components collected from articles, keyed by owning article.
    ///
    /// Articles are visited in path order; when two articles define the same
    /// component name the first one wins and the other is reported. Returns
    /// the name → owning article map of what was written.
    pub fn write_components(
        &self,
        collected: impl IntoIterator<Item = (PathBuf, Component)>,
    ) -> Result<BTreeMap<String, PathBuf>, WriteError> {
        let mut collected: Vec<(PathBuf, Component)> = collected.into_iter().collect();
        collected.sort_by(|a, b| a.0.cmp(&b.0));

        let mut owners: BTreeMap<String, PathBuf> = BTreeMap::new();
        for (article, component) in collected {
            if let Some(owner) = owners.get(&component.name) {
                warn!(
                    component = %component.name,
                    kept = %owner.display(),
                    ignored = %article.display(),
                    "component defined by more than one article"
                );
                continue;
            }
            let path = self.dir.join(format!("{}.{}", component.name, self.extension));
            write_if_changed(&path, &component.source)?;
            owners.insert(component.name, article);
        }
        Ok(owners)
    }

    /// Rewrite the plugin file registering `names`.
    pub fn write_plugin<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), WriteError> {
        let source = plugin_source(names, &self.extension);
        write_always(&self.plugin_path(), source)
    }
}

/// Plugin file body registering each component, in the given order.
pub fn plugin_source<'a>(names: impl IntoIterator<Item = &'a str>, extension: &str) -> String {
    let registrations: Vec<String> = names
        .into_iter()
        .map(|name| format!("Vue.component('{name}', require('./{name}.{extension}'));"))
        .collect();
    format!(
        "import Vue from 'vue'\nexports.install = function() {{ {} }};",
        registrations.join("\n")
    )
}
