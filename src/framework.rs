//! # Framework Loader
//!
//! A framework is a bundle of ontology data, inference rules, derivation
//! queries, and in-place updates, loaded from a directory. Directories
//! carrying a `framework.toml` manifest are loaded from it; anything else
//! is inferred from the directory layout (trust tier from the path, file
//! kind from the suffix).
//!
//! Frameworks are immutable once loaded. Execution order is decided by
//! trust tier (Internal → Core → Privacy → Custom) and, within a tier, by
//! load order; declared dependencies are validated but do not reorder.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::compiler::{CompileError, CompiledRule, RuleCompiler};

/// Longest display path before truncation kicks in.
const DISPLAY_PATH_MAX: usize = 60;

/// Framework loading errors. All of these abort the run.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("framework manifest error at {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("externally loaded framework '{name}' cannot claim the {tier} trust tier")]
    IllegalTrustTier { name: String, tier: TrustTier },

    #[error("framework '{name}' depends on '{dependency}', which is not loaded")]
    MissingDependency { name: String, dependency: String },

    #[error("metamodel directory not found: {path}")]
    MetamodelMissing { path: PathBuf },

    #[error("file {path} is not valid UTF-8")]
    Encoding { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Result type for framework loading
pub type LoadResult<T> = Result<T, LoadError>;

/// Trust tier of a framework: decides loading privilege and execution
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    Internal,
    Core,
    Privacy,
    Custom,
}

impl TrustTier {
    /// All tiers in execution order.
    pub const ALL: [TrustTier; 4] = [
        TrustTier::Internal,
        TrustTier::Core,
        TrustTier::Privacy,
        TrustTier::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustTier::Internal => "internal",
            TrustTier::Core => "core",
            TrustTier::Privacy => "privacy",
            TrustTier::Custom => "custom",
        }
    }

    /// Whether a framework of this tier may be loaded from outside the
    /// system metamodel.
    pub fn loadable_externally(&self) -> bool {
        matches!(self, TrustTier::Privacy | TrustTier::Custom)
    }
}

impl std::fmt::Display for TrustTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a bundled file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Ontology / instance data (Turtle)
    Data,
    /// Inference rules, compiled to CONSTRUCT queries at load
    Rules,
    /// Ad-hoc derivation query, applied once per round
    Construct,
    /// In-place update, applied once per round
    Update,
}

impl FileKind {
    /// All kinds, ordered by kind name (the cache-key iteration order).
    pub const ALL_BY_NAME: [FileKind; 4] = [
        FileKind::Construct,
        FileKind::Data,
        FileKind::Rules,
        FileKind::Update,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Data => "data",
            FileKind::Rules => "rules",
            FileKind::Construct => "construct",
            FileKind::Update => "update",
        }
    }
}

/// The load-time compiled form of a bundled file.
#[derive(Debug, Clone)]
pub enum CompiledContent {
    /// Data files are loaded into the store as-is.
    Data,
    /// One CONSTRUCT query per rule, in source order.
    Rules(Vec<CompiledRule>),
    /// Query files carry their text verbatim.
    Query(String),
}

/// One file bundled into a framework.
#[derive(Debug, Clone)]
pub struct BundledFile {
    pub path: PathBuf,
    pub kind: FileKind,
    /// Bare file name
    pub name: String,
    /// `<framework>:<relative path>`, truncated for reporting
    pub display_path: String,
    /// Raw bytes as read from disk
    pub content: Vec<u8>,
    pub compiled: CompiledContent,
}

/// An immutable framework package.
#[derive(Debug, Clone)]
pub struct Framework {
    pub name: String,
    pub path: PathBuf,
    pub tier: TrustTier,
    pub version: String,
    pub description: String,
    pub depends_on: Vec<String>,
    files: Vec<BundledFile>,
}

// Manifest schema for framework.toml. `files` values accept either a bare
// path list or a `{ files = [...] }` sub-table.

#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
    #[serde(rename = "type")]
    tier: Option<TrustTier>,
    version: Option<String>,
    description: Option<String>,
    #[serde(default)]
    depends_on: Vec<String>,
    files: Option<ManifestFiles>,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestFiles {
    model: Option<FileList>,
    rules: Option<FileList>,
    constructs: Option<FileList>,
    updates: Option<FileList>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileList {
    Plain(Vec<String>),
    Table { files: Vec<String> },
}

impl FileList {
    fn paths(&self) -> &[String] {
        match self {
            FileList::Plain(paths) | FileList::Table { files: paths } => paths,
        }
    }
}

impl Framework {
    /// Load a framework from `dir`, via its manifest when one exists and by
    /// directory inference otherwise. `working_dir` anchors display paths
    /// for files that live outside the framework directory.
    pub fn load(dir: &Path, compiler: &RuleCompiler, working_dir: &Path) -> LoadResult<Framework> {
        let manifest_path = dir.join("framework.toml");
        if manifest_path.exists() {
            Self::from_manifest(dir, &manifest_path, compiler, working_dir)
        } else {
            Self::from_directory(dir, compiler, working_dir)
        }
    }

    fn from_manifest(
        dir: &Path,
        manifest_path: &Path,
        compiler: &RuleCompiler,
        working_dir: &Path,
    ) -> LoadResult<Framework> {
        let raw = fs::read_to_string(manifest_path).map_err(|source| LoadError::Io {
            path: manifest_path.to_path_buf(),
            source,
        })?;
        let manifest: Manifest = toml::from_str(&raw).map_err(|e| LoadError::Manifest {
            path: manifest_path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut framework = Framework {
            name: manifest.name,
            path: dir.to_path_buf(),
            tier: manifest.tier.unwrap_or(TrustTier::Custom),
            version: manifest.version.unwrap_or_else(|| "1.0.0".to_string()),
            description: manifest.description.unwrap_or_default(),
            depends_on: manifest.depends_on,
            files: Vec::new(),
        };

        let files = manifest.files.unwrap_or_default();
        let categories: [(Option<&FileList>, FileKind); 4] = [
            (files.model.as_ref(), FileKind::Data),
            (files.rules.as_ref(), FileKind::Rules),
            (files.constructs.as_ref(), FileKind::Construct),
            (files.updates.as_ref(), FileKind::Update),
        ];

        for (list, kind) in categories {
            let Some(list) = list else { continue };
            for rel in list.paths() {
                let full = dir.join(rel);
                if !full.exists() {
                    warn!(framework = %framework.name, path = %full.display(),
                        "manifest lists a missing file; skipping");
                    continue;
                }
                let file =
                    load_bundled_file(&full, kind, compiler, dir, &framework.name, working_dir)?;
                framework.files.push(file);
            }
        }

        Ok(framework)
    }

    fn from_directory(
        dir: &Path,
        compiler: &RuleCompiler,
        working_dir: &Path,
    ) -> LoadResult<Framework> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        let tier = infer_tier(dir, &name);

        let mut framework = Framework {
            name: name.clone(),
            path: dir.to_path_buf(),
            tier,
            version: "1.0.0".to_string(),
            description: format!("auto-loaded framework from {}", dir.display()),
            depends_on: Vec::new(),
            files: Vec::new(),
        };

        for path in walk_sorted(dir)? {
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            let kind = match ext {
                "ttl" => FileKind::Data,
                "rules" => FileKind::Rules,
                "rq" => {
                    let text = read_utf8(&path)?;
                    if text.contains("UPDATE") || text.contains("DELETE") {
                        FileKind::Update
                    } else {
                        FileKind::Construct
                    }
                }
                _ => continue,
            };
            let file = load_bundled_file(&path, kind, compiler, dir, &name, working_dir)?;
            framework.files.push(file);
        }

        Ok(framework)
    }

    /// All bundled files, in load order.
    pub fn files(&self) -> &[BundledFile] {
        &self.files
    }

    /// Bundled files of one kind, in load order.
    pub fn files_of(&self, kind: FileKind) -> impl Iterator<Item = &BundledFile> {
        self.files.iter().filter(move |f| f.kind == kind)
    }
}

/// Trust tier inferred from a manifest-less directory's location:
/// the metamodel's `inference` directory is Internal, its siblings are
/// Core, anything under `examples/frameworks` is Privacy, the rest is
/// Custom.
fn infer_tier(dir: &Path, name: &str) -> TrustTier {
    let components: Vec<String> = dir
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if components.iter().any(|c| c == "metamodel") {
        if name == "inference" {
            return TrustTier::Internal;
        }
        return TrustTier::Core;
    }

    let under_example_frameworks = components
        .windows(2)
        .any(|w| w[0] == "examples" && w[1] == "frameworks");
    if under_example_frameworks {
        return TrustTier::Privacy;
    }

    TrustTier::Custom
}

/// Recursively collect regular files under `dir`, sorted by path so load
/// order is stable across platforms.
fn walk_sorted(dir: &Path) -> LoadResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = fs::read_dir(&current).map_err(|source| LoadError::Io {
            path: current.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| LoadError::Io {
                path: current.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn read_utf8(path: &Path) -> LoadResult<String> {
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| LoadError::Encoding {
        path: path.to_path_buf(),
    })
}

/// Read one bundled file and compile it according to its kind.
fn load_bundled_file(
    path: &Path,
    kind: FileKind,
    compiler: &RuleCompiler,
    framework_dir: &Path,
    framework_name: &str,
    working_dir: &Path,
) -> LoadResult<BundledFile> {
    let content = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let display_path = match path.strip_prefix(framework_dir) {
        Ok(rel) => truncate_display_path(&format!(
            "{framework_name}:{}",
            rel.display()
        )),
        Err(_) => truncate_display_path(&display_relative(path, working_dir)),
    };

    let compiled = match kind {
        FileKind::Data => CompiledContent::Data,
        FileKind::Rules => {
            let text = std::str::from_utf8(&content).map_err(|_| LoadError::Encoding {
                path: path.to_path_buf(),
            })?;
            CompiledContent::Rules(compiler.compile(text)?)
        }
        FileKind::Construct | FileKind::Update => {
            let text = std::str::from_utf8(&content).map_err(|_| LoadError::Encoding {
                path: path.to_path_buf(),
            })?;
            CompiledContent::Query(text.to_string())
        }
    };

    debug!(framework = framework_name, path = %path.display(), kind = kind.as_str(), "loaded file");

    Ok(BundledFile {
        path: path.to_path_buf(),
        kind,
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        display_path,
        content,
        compiled,
    })
}

/// Path shown for a file with no framework context, relative to the
/// caller's working directory when possible.
pub fn display_relative(path: &Path, working_dir: &Path) -> String {
    path.strip_prefix(working_dir)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Shorten long display paths, keeping the framework prefix and the most
/// relevant trailing components.
fn truncate_display_path(display_path: &str) -> String {
    if display_path.len() <= DISPLAY_PATH_MAX {
        return display_path.to_string();
    }

    if let Some((framework, rest)) = display_path.split_once(':') {
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() > 2 {
            return format!("{framework}:.../{}", parts[parts.len() - 2..].join("/"));
        }
    } else {
        let parts: Vec<&str> = display_path.split('/').collect();
        if parts.len() > 3 {
            return format!(".../{}", parts[parts.len() - 3..].join("/"));
        }
    }

    display_path.to_string()
}
