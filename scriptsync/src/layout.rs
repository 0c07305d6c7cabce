//! Where a tracked folder keeps its working files, snapshots and index

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::hasher::HashAlgorithm;

const INDEX_FILE: &str = "index.json";
const SNAPSHOT_DIR: &str = "snapshots";
const SNAPSHOT_SUFFIX: &str = "snapshot";

/// Options shared by every tracked folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceOptions {
    /// Script file extension, without the leading dot
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Name of the hidden directory holding the index and snapshots
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// Digest used to compare working files with snapshots
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            state_dir: default_state_dir(),
            hash_algorithm: HashAlgorithm::default(),
        }
    }
}

fn default_extension() -> String { "ts".to_string() }
fn default_state_dir() -> String { ".scriptsync".to_string() }

/// Path arithmetic for one tracked folder
#[derive(Debug, Clone)]
pub struct FolderLayout {
    root: PathBuf,
    options: WorkspaceOptions,
    matcher: GlobMatcher,
}

impl FolderLayout {
    pub fn new(root: impl Into<PathBuf>, options: WorkspaceOptions) -> Result<Self> {
        let extension = options.extension.trim_start_matches('.');
        if extension.is_empty() {
            return Err(SyncError::path_error(
                PathBuf::from(&options.state_dir),
                "Script extension must not be empty",
            ));
        }

        let matcher = GlobBuilder::new(&format!("*.{}", extension))
            .literal_separator(true)
            .build()?
            .compile_matcher();

        let options = WorkspaceOptions {
            extension: extension.to_string(),
            ..options
        };

        Ok(Self {
            root: root.into(),
            options,
            matcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &WorkspaceOptions {
        &self.options
    }

    pub fn extension(&self) -> &str {
        &self.options.extension
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(&self.options.state_dir)
    }

    pub fn index_path(&self) -> PathBuf {
        self.state_dir().join(INDEX_FILE)
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.state_dir().join(SNAPSHOT_DIR)
    }

    /// `<name>.<ext>`
    pub fn file_name(&self, name: &str) -> String {
        format!("{}.{}", name, self.options.extension)
    }

    /// `<name>.<ext>.snapshot`
    pub fn snapshot_file_name(&self, name: &str) -> String {
        format!("{}.{}", self.file_name(name), SNAPSHOT_SUFFIX)
    }

    /// Reject names whose working file would not be a plain file directly
    /// inside the tracked folder.
    pub fn check_name(&self, name: &str) -> Result<()> {
        let escapes = || SyncError::NameEscape {
            name: name.to_string(),
        };

        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(escapes());
        }

        let file_name = self.file_name(name);
        let mut components = Path::new(&file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == file_name.as_str() => Ok(()),
            _ => Err(escapes()),
        }
    }

    /// Working file path for a script name, refusing names that escape the folder
    pub fn working_path(&self, name: &str) -> Result<PathBuf> {
        self.check_name(name)?;
        Ok(self.root.join(self.file_name(name)))
    }

    /// Snapshot path for a script name inside `dir`
    pub fn snapshot_path_in(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        self.check_name(name)?;
        Ok(dir.join(self.snapshot_file_name(name)))
    }

    /// Script name of a working file, if the path is one.
    ///
    /// Files whose name would be refused for a remote script (for example a
    /// backslash in the stem) are not working files.
    pub fn script_name(&self, path: &Path) -> Option<String> {
        self.candidate_name(path)
            .filter(|name| self.check_name(name).is_ok())
    }

    fn candidate_name(&self, path: &Path) -> Option<String> {
        if path.parent() != Some(self.root.as_path()) {
            return None;
        }

        let file_name = path.file_name()?.to_str()?;
        if !self.matcher.is_match(file_name) {
            return None;
        }

        let name = file_name.strip_suffix(&format!(".{}", self.options.extension))?;
        (!name.is_empty()).then(|| name.to_string())
    }

    /// Script name of a snapshot file name
    pub fn snapshot_name(&self, file_name: &str) -> Option<String> {
        let suffix = format!(".{}.{}", self.options.extension, SNAPSHOT_SUFFIX);
        file_name
            .strip_suffix(&suffix)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    /// Names of every working file currently in the folder.
    ///
    /// Symlinks count as working files whether or not their target exists,
    /// so a linked script is never mistaken for a missing one.
    pub fn list_working_names(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();

        if !self.root.is_dir() {
            return Err(SyncError::path_error(&self.root, "Tracked folder does not exist"));
        }

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                SyncError::path_error(&self.root, format!("Walk error: {}", e))
            })?;

            let file_type = entry.file_type();
            if !(file_type.is_file() || file_type.is_symlink()) {
                continue;
            }

            let Some(name) = self.candidate_name(entry.path()) else {
                continue;
            };

            match self.check_name(&name) {
                Ok(()) => {
                    names.insert(name);
                }
                Err(e) => warn!(path = %entry.path().display(), "Ignoring working file: {}", e),
            }
        }

        Ok(names)
    }
}
