use crate::areas::database::Database;
use crate::areas::refs::Refs;
use anyhow::Context;
use std::path::{Path, PathBuf};

const DOT_GIT: &str = ".git";
const GITDIR_PREFIX: &str = "gitdir:";
const COMMONDIR_FILE: &str = "commondir";

/// A repository opened for reading
///
/// Holds the git directory (the `.git` of a work tree, or a bare repository)
/// and read-only handles to its object database and references.
#[derive(Debug)]
pub struct Repository {
    git_dir: Box<Path>,
    database: Database,
    refs: Refs,
}

impl Repository {
    /// Open the repository at `path`, which may be a work tree, a bare
    /// repository or a git directory
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let path = path
            .canonicalize()
            .with_context(|| format!("repository path {} does not exist", path.display()))?;

        let git_dir = Self::find_git_dir(&path)?
            .with_context(|| format!("{} is not a git repository", path.display()))?;

        Self::from_git_dir(git_dir)
    }

    /// Find the repository enclosing `start`, walking up its ancestors
    pub fn discover(start: &Path) -> anyhow::Result<Self> {
        let start = start
            .canonicalize()
            .with_context(|| format!("cannot discover a repository from {}", start.display()))?;

        for candidate in start.ancestors() {
            if let Some(git_dir) = Self::find_git_dir(candidate)? {
                return Self::from_git_dir(git_dir);
            }
        }

        anyhow::bail!(
            "not a git repository (or any of the parent directories): {}",
            start.display()
        )
    }

    fn from_git_dir(git_dir: PathBuf) -> anyhow::Result<Self> {
        // linked worktrees keep objects and refs in a shared directory
        let common_dir = match std::fs::read_to_string(git_dir.join(COMMONDIR_FILE)) {
            Ok(content) => git_dir
                .join(content.trim())
                .canonicalize()
                .with_context(|| format!("invalid commondir in {}", git_dir.display()))?,
            Err(_) => git_dir.clone(),
        };

        let database = Database::new(common_dir.join("objects").into_boxed_path());
        let refs = Refs::new(
            common_dir.into_boxed_path(),
            git_dir.clone().into_boxed_path(),
        );

        Ok(Repository {
            git_dir: git_dir.into_boxed_path(),
            database,
            refs,
        })
    }

    /// The git directory `path` designates, if any
    fn find_git_dir(path: &Path) -> anyhow::Result<Option<PathBuf>> {
        let dot_git = path.join(DOT_GIT);

        if dot_git.is_dir() && Self::is_git_dir(&dot_git) {
            return Ok(Some(dot_git));
        }

        if dot_git.is_file() {
            let content = std::fs::read_to_string(&dot_git)
                .with_context(|| format!("failed to read gitfile {}", dot_git.display()))?;
            let target = content
                .trim()
                .strip_prefix(GITDIR_PREFIX)
                .with_context(|| format!("invalid gitfile format: {}", dot_git.display()))?
                .trim();
            let git_dir = path
                .join(target)
                .canonicalize()
                .with_context(|| format!("gitfile {} points nowhere", dot_git.display()))?;

            return Ok(Some(git_dir));
        }

        if Self::is_git_dir(path) {
            return Ok(Some(path.to_path_buf()));
        }

        Ok(None)
    }

    fn is_git_dir(path: &Path) -> bool {
        path.join("HEAD").is_file()
            && (path.join("objects").is_dir() || path.join(COMMONDIR_FILE).is_file())
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn into_parts(self) -> (Database, Refs) {
        (self.database, self.refs)
    }
}
