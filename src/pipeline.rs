//! Build orchestration.
//!
//! A build moves through these stages:
//!
//! ```text
//! Discovering → LocalizingAndRendering → Aggregating → RenderingIndex → Done
//! ```
//!
//! Any stage can fail the build with a [`BuildError`]. Inside
//! `LocalizingAndRendering` every article runs its own sub-pipeline on the
//! rayon pool:
//!
//! ```text
//! Localizing → Analyzing → Rendering → Writing → Done
//! ```
//!
//! A failing sub-pipeline is recorded as an [`ArticleFailure`] (path, stage,
//! cause) and never affects its siblings. Build-wide artifacts (index page,
//! components, plugin file, asset mirror) are not isolated: failing to write
//! them fails the build.
//!
//! ## Ownership
//!
//! Each discovered path is handled by exactly one task, which is the only
//! writer of that article's source file. Output paths are claimed explicitly
//! before writing: if two articles analyze to the same output path, the
//! second claimant fails with [`ArticleError::DuplicateOutput`] instead of
//! racing the first. The asset store is the only other shared resource and is
//! safe by content addressing (see [`crate::localize`]).

use crate::analyze::{AnalyzeError, Article, analyze};
use crate::components::ComponentRegistry;
use crate::config::{ASSET_DIR, ConfigError, SiteConfig};
use crate::discover::{DiscoveryError, discover};
use crate::fetch::{FetchError, Fetcher};
use crate::index::{index_view, order_summaries};
use crate::localize::{AssetStore, LocalizeError, localize_in_place};
use crate::render::{Component, render_markdown};
use crate::template::{Slot, View, load_template, render_template};
use crate::types::{ArticleSource, ArticleSummary, url_path};
use crate::write::{WriteError, WriteOutcome, write_if_changed, write_new};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, info_span};

/// Name of the generated index page in the output root.
pub const INDEX_PAGE: &str = "index.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Discovering,
    LocalizingAndRendering,
    Aggregating,
    RenderingIndex,
    Done,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildStage::Discovering => "discovering",
            BuildStage::LocalizingAndRendering => "localizing and rendering",
            BuildStage::Aggregating => "aggregating",
            BuildStage::RenderingIndex => "rendering index",
            BuildStage::Done => "done",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleStage {
    Localizing,
    Analyzing,
    Rendering,
    Writing,
}

impl fmt::Display for ArticleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArticleStage::Localizing => "localizing",
            ArticleStage::Analyzing => "analyzing",
            ArticleStage::Rendering => "rendering",
            ArticleStage::Writing => "writing",
        })
    }
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] FetchError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("could not prepare {}: {source}", .path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not load template {}: {source}", .path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not write index page: {0}")]
    Index(#[source] WriteError),
    #[error("could not write components: {0}")]
    Components(#[source] WriteError),
    #[error("could not mirror assets: {0}")]
    Assets(#[source] WriteError),
}

impl BuildError {
    /// Stage in which the build failed.
    pub fn stage(&self) -> BuildStage {
        match self {
            BuildError::Config(_)
            | BuildError::Client(_)
            | BuildError::Discovery(_)
            | BuildError::Prepare { .. }
            | BuildError::Template { .. } => BuildStage::Discovering,
            BuildError::Index(_) | BuildError::Components(_) | BuildError::Assets(_) => {
                BuildStage::RenderingIndex
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ArticleError {
    #[error("could not read source: {0}")]
    Read(#[source] io::Error),
    #[error(transparent)]
    Localize(#[from] LocalizeError),
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
    #[error("output {} is already produced by {}", .path.display(), .owner.display())]
    DuplicateOutput { path: PathBuf, owner: PathBuf },
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// A sub-pipeline that did not reach `Done`.
#[derive(Error, Debug)]
#[error("{} [{stage}]: {error}", .path.display())]
pub struct ArticleFailure {
    /// Article path relative to the posts root.
    pub path: PathBuf,
    pub stage: ArticleStage,
    #[source]
    pub error: ArticleError,
}

impl ArticleFailure {
    fn new(path: &Path, stage: ArticleStage, error: impl Into<ArticleError>) -> Self {
        Self {
            path: path.to_path_buf(),
            stage,
            error: error.into(),
        }
    }
}

/// A sub-pipeline that reached `Done`.
#[derive(Debug, Clone)]
pub struct ArticleReport {
    /// Article path relative to the posts root.
    pub path: PathBuf,
    pub summary: ArticleSummary,
    pub outcome: WriteOutcome,
    /// Whether remote images were localized into the source file.
    pub source_rewritten: bool,
    /// Remote images referenced by the article.
    pub assets: usize,
    /// Assets this article added to the store.
    pub assets_created: usize,
    pub components: Vec<Component>,
}

/// Everything a finished build did.
#[derive(Debug)]
pub struct BuildReport {
    /// Successful articles, by path.
    pub articles: Vec<ArticleReport>,
    /// Failed articles, by path.
    pub failures: Vec<ArticleFailure>,
    /// Subdirectories discovery could not read.
    pub skipped_dirs: Vec<(PathBuf, String)>,
    /// Number of articles listed on the index page.
    pub indexed: usize,
    pub index_outcome: WriteOutcome,
    /// Component name → article that defined it.
    pub components: BTreeMap<String, PathBuf>,
    /// Assets copied into the output tree by this build.
    pub mirrored_assets: usize,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn written(&self) -> usize {
        self.articles
            .iter()
            .filter(|a| a.outcome == WriteOutcome::Written)
            .count()
    }

    pub fn unchanged(&self) -> usize {
        self.articles.len() - self.written()
    }
}

/// Run a full build with `config`, downloading through `fetcher`.
pub fn build(config: &SiteConfig, fetcher: &impl Fetcher) -> Result<BuildReport, BuildError> {
    Builder::new(config, fetcher)?.run()
}

struct Builder<'a, F: Fetcher> {
    config: &'a SiteConfig,
    fetcher: &'a F,
    template: String,
    store: AssetStore,
    registry: ComponentRegistry,
    /// Output path → article that owns it.
    claimed: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl<'a, F: Fetcher> Builder<'a, F> {
    fn new(config: &'a SiteConfig, fetcher: &'a F) -> Result<Self, BuildError> {
        let template =
            load_template(&config.template_path).map_err(|source| BuildError::Template {
                path: config.template_path.clone(),
                source,
            })?;
        Ok(Self {
            config,
            fetcher,
            template,
            store: AssetStore::new(config.asset_store_path()),
            registry: ComponentRegistry::new(
                &config.components_path,
                &config.component_extension,
                &config.plugin_file,
            ),
            claimed: Mutex::new(HashMap::new()),
        })
    }

    fn run(self) -> Result<BuildReport, BuildError> {
        enter(BuildStage::Discovering);
        let discovery = discover(&self.config.posts_path, &self.config.article_extension)?;
        info!(
            articles = discovery.articles.len(),
            dirs = discovery.dirs.len(),
            "discovered articles"
        );
        self.prepare(&discovery.dirs)?;

        enter(BuildStage::LocalizingAndRendering);
        let (mut articles, mut failures): (Vec<_>, Vec<_>) = discovery
            .articles
            .par_iter()
            .map(|path| self.process_article(path))
            .partition_map(|result| match result {
                Ok(report) => rayon::iter::Either::Left(report),
                Err(failure) => rayon::iter::Either::Right(failure),
            });
        articles.sort_by(|a, b| a.path.cmp(&b.path));
        failures.sort_by(|a, b| a.path.cmp(&b.path));

        enter(BuildStage::Aggregating);
        let ordered = order_summaries(articles.iter().map(|a| a.summary.clone()));
        let collected: Vec<(PathBuf, Component)> = articles
            .iter_mut()
            .flat_map(|a| {
                let path = a.path.clone();
                std::mem::take(&mut a.components)
                    .into_iter()
                    .map(move |c| (path.clone(), c))
            })
            .collect();

        enter(BuildStage::RenderingIndex);
        let index_html =
            render_template(&self.template, &index_view(&self.config.site_name, &ordered));
        let index_outcome =
            write_if_changed(&self.config.output_path.join(INDEX_PAGE), index_html)
                .map_err(BuildError::Index)?;
        let components = self
            .registry
            .write_components(collected)
            .map_err(BuildError::Components)?;
        self.registry
            .write_plugin(components.keys().map(String::as_str))
            .map_err(BuildError::Components)?;
        let mirrored_assets = self.mirror_assets()?;

        enter(BuildStage::Done);
        Ok(BuildReport {
            articles,
            failures,
            skipped_dirs: discovery.skipped,
            indexed: ordered.len(),
            index_outcome,
            components,
            mirrored_assets,
        })
    }

    /// Create the output tree and asset store, and clear stale components.
    fn prepare(&self, dirs: &[PathBuf]) -> Result<(), BuildError> {
        let output = &self.config.output_path;
        fs::create_dir_all(output).map_err(prepare_err(output))?;
        for dir in dirs {
            let path = output.join(dir);
            fs::create_dir_all(&path).map_err(prepare_err(&path))?;
        }
        self.store
            .ensure_exists()
            .map_err(prepare_err(self.store.dir()))?;
        self.registry
            .clear()
            .map_err(prepare_err(self.registry.dir()))?;
        Ok(())
    }

    fn process_article(&self, rel: &Path) -> Result<ArticleReport, ArticleFailure> {
        let _span = info_span!("article", path = %rel.display()).entered();
        let posts = &self.config.posts_path;

        debug!(stage = %ArticleStage::Localizing);
        let raw_text = fs::read_to_string(posts.join(rel)).map_err(|e| {
            ArticleFailure::new(rel, ArticleStage::Localizing, ArticleError::Read(e))
        })?;
        let mut source = ArticleSource {
            relative_path: rel.to_path_buf(),
            raw_text,
        };
        let localized = localize_in_place(posts, &mut source, &self.store, self.fetcher)
            .map_err(|e| ArticleFailure::new(rel, ArticleStage::Localizing, e))?;

        debug!(stage = %ArticleStage::Analyzing);
        let article = analyze(&source.raw_text, &source.stem())
            .map_err(|e| ArticleFailure::new(rel, ArticleStage::Analyzing, e))?;

        debug!(stage = %ArticleStage::Rendering);
        let rendered = render_markdown(&article.markdown, &self.config.component_extension);
        let page = render_template(&self.template, &article_view(&article, &rendered.html));

        debug!(stage = %ArticleStage::Writing);
        let output_rel = source.dir().join(format!("{}.html", article.filename));
        self.claim(&output_rel, rel)
            .map_err(|e| ArticleFailure::new(rel, ArticleStage::Writing, e))?;
        let outcome = write_if_changed(&self.config.output_path.join(&output_rel), page)
            .map_err(|e| ArticleFailure::new(rel, ArticleStage::Writing, e))?;
        debug!(output = %output_rel.display(), ?outcome, "done");

        Ok(ArticleReport {
            path: rel.to_path_buf(),
            summary: ArticleSummary {
                url_path: url_path(source.dir(), &article.filename),
                title: article.title,
                date: article.date,
                author: article.author,
                tags: article.tags,
                filename: article.filename,
            },
            outcome,
            source_rewritten: !localized.assets.is_empty(),
            assets: localized.assets.len(),
            assets_created: localized.created,
            components: rendered.components,
        })
    }

    fn claim(&self, output: &Path, article: &Path) -> Result<(), ArticleError> {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(owner) = claimed.get(output) {
            return Err(ArticleError::DuplicateOutput {
                path: output.to_path_buf(),
                owner: owner.clone(),
            });
        }
        claimed.insert(output.to_path_buf(), article.to_path_buf());
        Ok(())
    }

    /// Copy store entries missing from `<output>/images` so rewritten
    /// references resolve from generated pages too.
    fn mirror_assets(&self) -> Result<usize, BuildError> {
        if self.config.output_path == self.config.posts_path {
            return Ok(0);
        }
        let mirror = self.config.output_path.join(ASSET_DIR);
        fs::create_dir_all(&mirror).map_err(prepare_err(&mirror))?;

        let mut copied = 0;
        let entries = fs::read_dir(self.store.dir()).map_err(prepare_err(self.store.dir()))?;
        for entry in entries {
            let entry = entry.map_err(prepare_err(self.store.dir()))?;
            let src = entry.path();
            let dest = mirror.join(entry.file_name());
            if !src.is_file() || dest.exists() {
                continue;
            }
            let bytes = fs::read(&src).map_err(prepare_err(&src))?;
            if write_new(&dest, bytes).map_err(BuildError::Assets)? {
                copied += 1;
            }
        }
        debug!(copied, "mirrored assets");
        Ok(copied)
    }
}

/// View for an article page. `index` is undefined, as are `date` and
/// `author` when the article doesn't set them.
pub fn article_view(article: &Article, html: &str) -> View {
    View {
        index: Slot::Undefined,
        title: Slot::json(article.title.as_str()),
        title_string: Slot::Text(article.title.clone()),
        date: article
            .date
            .as_ref()
            .map_or(Slot::Undefined, |d| Slot::json(d.as_str())),
        author: article
            .author
            .as_deref()
            .map_or(Slot::Undefined, Slot::json),
        tags: Slot::json(article.tags.clone()),
        article: Slot::Text(html.to_string()),
    }
}

fn prepare_err(path: &Path) -> impl FnOnce(io::Error) -> BuildError + use<> {
    let path = path.to_path_buf();
    move |source| BuildError::Prepare { path, source }
}

fn enter(stage: BuildStage) {
    info!(%stage, "build stage");
}
