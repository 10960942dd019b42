use std::{io, path::Path};

use analyser_core::{
    config::{GitConfig, HostAlias},
    models::{JobDescriptor, WorkingCopy},
    process::{CommandError, CommandSpec, run_checked},
};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("failed to create working directory: {0}")]
    Workspace(#[source] io::Error),
    #[error("failed to clone {uri}: {message}")]
    Transport { uri: String, message: String },
    #[error("`{reference}` not found in {uri}: {message}")]
    RefNotFound { uri: String, reference: String, message: String },
    #[error("git {step} failed: {message}")]
    Git { step: &'static str, message: String },
    #[error(transparent)]
    Command(CommandError),
}

/// Produces a private working copy for a job.
#[async_trait]
pub trait Materializer: Send + Sync {
    async fn materialize(&self, job: &JobDescriptor) -> Result<WorkingCopy, MaterializeError>;
}

pub struct GitMaterializer {
    config: GitConfig,
}

impl GitMaterializer {
    pub fn new(config: GitConfig) -> Self { Self { config } }

    fn git(&self, cwd: &Path) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.config.binary, cwd, self.config.timeout())
            .env("GIT_TERMINAL_PROMPT", "0");
        // Job-local credentials: only the child process sees this.
        if let Some(ssh_command) = ssh_command(&self.config) {
            spec = spec.env("GIT_SSH_COMMAND", ssh_command);
        }
        spec
    }

    async fn checkout(
        &self,
        dir: &Path,
        uri: &str,
        reference: &str,
    ) -> Result<(), MaterializeError> {
        let spec = self.git(dir).args(["checkout", "--quiet", reference]);
        match run_checked(&spec).await {
            Ok(_) => Ok(()),
            Err(CommandError::Failed { stderr, .. }) if is_missing_ref(&stderr) => {
                Err(MaterializeError::RefNotFound {
                    uri: uri.to_string(),
                    reference: reference.to_string(),
                    message: stderr.trim().to_string(),
                })
            }
            Err(CommandError::Failed { stderr, .. }) => {
                Err(MaterializeError::Git { step: "checkout", message: stderr.trim().to_string() })
            }
            Err(e) => Err(MaterializeError::Command(e)),
        }
    }

    async fn rev_parse(&self, dir: &Path, args: &[&str]) -> Result<String, MaterializeError> {
        let spec = self.git(dir).arg("rev-parse").args(args.iter().copied());
        match run_checked(&spec).await {
            Ok(output) => Ok(output.stdout.trim().to_string()),
            Err(CommandError::Failed { stderr, .. }) => {
                Err(MaterializeError::Git { step: "rev-parse", message: stderr.trim().to_string() })
            }
            Err(e) => Err(MaterializeError::Command(e)),
        }
    }
}

#[async_trait]
impl Materializer for GitMaterializer {
    async fn materialize(&self, job: &JobDescriptor) -> Result<WorkingCopy, MaterializeError> {
        let uri = rewrite_uri(&job.repository_uri, &self.config.host_aliases);
        let parent = self.config.work_dir.clone().unwrap_or_else(std::env::temp_dir);
        // Removed on drop, so a failure below never leaves a partial checkout behind.
        let dir = tempfile::Builder::new()
            .prefix(&format!("repo_clone_{}_", sanitize(&job.client_id)))
            .tempdir_in(&parent)
            .map_err(MaterializeError::Workspace)?;
        tracing::info!("Cloning {} into {}", uri, dir.path().display());

        let clone = self
            .git(&parent)
            .args(["clone", "--quiet", "--", uri.as_str()])
            .arg(dir.path().to_string_lossy());
        match run_checked(&clone).await {
            Ok(_) => {}
            Err(CommandError::Failed { stderr, .. }) => {
                return Err(MaterializeError::Transport {
                    uri,
                    message: stderr.trim().to_string(),
                });
            }
            Err(e) => return Err(MaterializeError::Command(e)),
        }

        // A pinned revision may only exist on the requested branch.
        if let Some(branch) = &job.branch {
            self.checkout(dir.path(), &uri, branch).await?;
            tracing::info!("Checked out branch {branch}");
        }
        if let Some(revision) = &job.revision {
            self.checkout(dir.path(), &uri, revision).await?;
            tracing::info!("Checked out revision {revision}");
        }

        let branch = self.rev_parse(dir.path(), &["--abbrev-ref", "HEAD"]).await?;
        let revision = self.rev_parse(dir.path(), &["HEAD"]).await?;
        let path = dir.keep();
        tracing::info!("Repository ready at {} ({branch} @ {revision})", path.display());
        Ok(WorkingCopy { path, repository_uri: uri, branch, revision })
    }
}

/// Apply the first matching host alias to a repository URI.
pub fn rewrite_uri(uri: &str, aliases: &[HostAlias]) -> String {
    aliases
        .iter()
        .find_map(|alias| {
            uri.strip_prefix(alias.from.as_str()).map(|rest| format!("{}{rest}", alias.to))
        })
        .unwrap_or_else(|| uri.to_string())
}

fn ssh_command(config: &GitConfig) -> Option<String> {
    let mut command = String::from("ssh");
    if let Some(key) = &config.ssh_key {
        command.push_str(&format!(" -i {} -o IdentitiesOnly=yes", key.display()));
    }
    if !config.strict_host_key_checking {
        command.push_str(" -o StrictHostKeyChecking=no");
    }
    (command != "ssh").then_some(command)
}

fn is_missing_ref(stderr: &str) -> bool {
    const MARKERS: &[&str] = &[
        "did not match any file(s) known to git",
        "reference is not a tree",
        "unknown revision",
        "invalid reference",
    ];
    MARKERS.iter().any(|m| stderr.contains(m))
}

fn sanitize(client: &str) -> String {
    client
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use analyser_core::models::Scope;

    use super::*;

    #[test]
    fn rewrites_aliased_hosts() {
        let aliases = GitConfig::default().host_aliases;
        let cases: &[(&str, &str)] = &[
            ("git@github.com:hknio/vault.git", "git@github.com-hacken:hknio/vault.git"),
            ("git@github.com:other/vault.git", "git@github.com:other/vault.git"),
            ("https://github.com/hknio/vault", "https://github.com/hknio/vault"),
        ];
        for &(uri, expected) in cases {
            assert_eq!(rewrite_uri(uri, &aliases), expected);
        }
    }

    #[test]
    fn ssh_command_is_job_local_config() {
        let mut config = GitConfig::default();
        assert_eq!(ssh_command(&config).as_deref(), Some("ssh -o StrictHostKeyChecking=no"));
        config.ssh_key = Some(PathBuf::from("/keys/id_rsa"));
        config.strict_host_key_checking = true;
        assert_eq!(
            ssh_command(&config).as_deref(),
            Some("ssh -i /keys/id_rsa -o IdentitiesOnly=yes")
        );
        config.ssh_key = None;
        assert_eq!(ssh_command(&config), None);
    }

    #[test]
    fn classifies_missing_refs() {
        assert!(is_missing_ref("error: pathspec 'nope' did not match any file(s) known to git"));
        assert!(is_missing_ref("fatal: reference is not a tree: deadbeef"));
        assert!(!is_missing_ref("fatal: Could not read from remote repository."));
    }

    #[test]
    fn sanitizes_client_for_directory_names() {
        assert_eq!(sanitize("acme/../x y"), "acme____x_y");
    }

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|output| output.status.success())
    }

    fn git(dir: &Path, args: &[&str]) -> String {
        let output = std::process::Command::new("git")
            .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
            .args(["-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }

    /// A local repository with two commits on the default branch and one on `feature`.
    fn fixture_repo(root: &Path) -> (PathBuf, String) {
        let repo = root.join("origin");
        std::fs::create_dir(&repo).unwrap();
        git(&repo, &["init", "--quiet"]);
        std::fs::write(repo.join("A.sol"), "contract A {}\n").unwrap();
        git(&repo, &["add", "."]);
        git(&repo, &["commit", "--quiet", "-m", "first"]);
        let first = git(&repo, &["rev-parse", "HEAD"]);
        std::fs::write(repo.join("B.sol"), "contract B {}\n").unwrap();
        git(&repo, &["add", "."]);
        git(&repo, &["commit", "--quiet", "-m", "second"]);
        git(&repo, &["checkout", "--quiet", "-b", "feature"]);
        std::fs::write(repo.join("C.sol"), "contract C {}\n").unwrap();
        git(&repo, &["add", "."]);
        git(&repo, &["commit", "--quiet", "-m", "feature"]);
        git(&repo, &["checkout", "--quiet", "-"]);
        (repo, first)
    }

    fn job(uri: &Path, branch: Option<&str>, revision: Option<&str>) -> JobDescriptor {
        JobDescriptor {
            repository_uri: uri.display().to_string(),
            client_id: "acme".to_string(),
            language: "solidity".to_string(),
            branch: branch.map(str::to_string),
            revision: revision.map(str::to_string),
            scope: Scope::All,
            extra: Default::default(),
        }
    }

    fn materializer(work_dir: &Path) -> GitMaterializer {
        GitMaterializer::new(GitConfig {
            work_dir: Some(work_dir.to_path_buf()),
            host_aliases: vec![],
            ..GitConfig::default()
        })
    }

    #[tokio::test]
    async fn clones_branch_then_revision() {
        if !git_available() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let (origin, first) = fixture_repo(root.path());
        let work = root.path().join("work");
        std::fs::create_dir(&work).unwrap();
        let materializer = materializer(&work);

        let copy = materializer.materialize(&job(&origin, None, None)).await.unwrap();
        assert!(copy.path.starts_with(&work));
        assert!(copy.path.join("B.sol").exists());
        assert!(!copy.path.join("C.sol").exists());

        let copy = materializer.materialize(&job(&origin, Some("feature"), None)).await.unwrap();
        assert_eq!(copy.branch, "feature");
        assert!(copy.path.join("C.sol").exists());

        let copy = materializer.materialize(&job(&origin, None, Some(&first))).await.unwrap();
        assert_eq!(copy.revision, first);
        assert_eq!(copy.branch, "HEAD");
        assert!(!copy.path.join("B.sol").exists());
    }

    #[tokio::test]
    async fn missing_ref_fails_without_leaving_a_checkout() {
        if !git_available() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let (origin, _) = fixture_repo(root.path());
        let work = root.path().join("work");
        std::fs::create_dir(&work).unwrap();

        let err = materializer(&work)
            .materialize(&job(&origin, Some("no-such-branch"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, MaterializeError::RefNotFound { .. }), "{err:?}");
        assert_eq!(std::fs::read_dir(&work).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unreachable_remote_is_a_transport_error() {
        if !git_available() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let err = materializer(root.path())
            .materialize(&job(&root.path().join("missing"), None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, MaterializeError::Transport { .. }), "{err:?}");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
