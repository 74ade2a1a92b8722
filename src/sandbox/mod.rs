//! Capability-scoped host surface for plugin scripts
//!
//! Install and uninstall hooks named in a plugin manifest are scripts. The
//! script engine itself is not part of this crate; `ScriptHost` is the set of
//! host operations such an engine is allowed to bind:
//!
//! - file operations: copy, delete, exists, create, mkdir, read, write, append
//! - `exec`: launch one external program
//!
//! Each operation requires its `Capability` to be granted by the
//! `SandboxPolicy`, every path is confined to the host root, and `exec` only
//! runs programs on the policy's allow-list.

mod path;

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{PlugmanError, Result};

pub use path::{resolve_in_root, SafePath};

/// A host operation a script may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Copy,
    Delete,
    Exists,
    Create,
    Mkdir,
    Read,
    Write,
    Append,
    Exec,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Capability::Copy,
        Capability::Delete,
        Capability::Exists,
        Capability::Create,
        Capability::Mkdir,
        Capability::Read,
        Capability::Write,
        Capability::Append,
        Capability::Exec,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Copy => "copy",
            Capability::Delete => "delete",
            Capability::Exists => "exists",
            Capability::Create => "create",
            Capability::Mkdir => "mkdir",
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Append => "append",
            Capability::Exec => "exec",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which operations a script host permits.
///
/// The default grants only `exists` and `read`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    granted: HashSet<Capability>,
    allowed_programs: Vec<String>,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self::read_only()
    }
}

impl SandboxPolicy {
    /// No capabilities at all.
    pub fn deny_all() -> Self {
        Self {
            granted: HashSet::new(),
            allowed_programs: Vec::new(),
        }
    }

    pub fn read_only() -> Self {
        Self::deny_all()
            .grant(Capability::Exists)
            .grant(Capability::Read)
    }

    /// Every file capability; `exec` still has to be granted separately.
    pub fn filesystem() -> Self {
        Capability::ALL
            .into_iter()
            .filter(|c| *c != Capability::Exec)
            .fold(Self::deny_all(), Self::grant)
    }

    pub fn grant(mut self, capability: Capability) -> Self {
        self.granted.insert(capability);
        self
    }

    /// Allow `exec` of `program` (matched by exact name). Grants `exec`.
    pub fn allow_program(mut self, program: impl Into<String>) -> Self {
        self.granted.insert(Capability::Exec);
        self.allowed_programs.push(program.into());
        self
    }

    pub fn is_granted(&self, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }

    pub fn is_program_allowed(&self, program: &str) -> bool {
        self.is_granted(Capability::Exec) && self.allowed_programs.iter().any(|p| p == program)
    }
}

/// Host operations for scripts, confined to `root` and gated by a policy.
#[derive(Debug, Clone)]
pub struct ScriptHost {
    root: PathBuf,
    policy: SandboxPolicy,
}

impl ScriptHost {
    pub fn new(root: impl Into<PathBuf>, policy: SandboxPolicy) -> Self {
        Self {
            root: root.into(),
            policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    /// Copy a regular file, returning the number of bytes copied.
    pub fn copy(&self, src: &str, dst: &str) -> Result<u64> {
        self.require(Capability::Copy)?;
        let src = self.resolve(src)?;
        let dst = self.resolve(dst)?;
        if !fs::metadata(&src)?.is_file() {
            return Err(PlugmanError::ScriptFailed(format!(
                "{} is not a regular file",
                src.as_path().display()
            )));
        }
        Ok(fs::copy(&src, &dst)?)
    }

    /// Delete a file or an empty directory.
    ///
    /// A symlink is removed itself; its target is left alone.
    pub fn delete(&self, target: &str) -> Result<()> {
        self.require(Capability::Delete)?;
        let target = self.resolve_entry(target)?;
        if fs::symlink_metadata(&target)?.is_dir() {
            fs::remove_dir(&target)?;
        } else {
            fs::remove_file(&target)?;
        }
        Ok(())
    }

    pub fn exists(&self, target: &str) -> Result<bool> {
        self.require(Capability::Exists)?;
        Ok(self.resolve(target)?.as_path().exists())
    }

    /// Create (or truncate) an empty file.
    pub fn create(&self, target: &str) -> Result<()> {
        self.require(Capability::Create)?;
        File::create(self.resolve(target)?)?;
        Ok(())
    }

    /// Create a single directory; the parent must exist.
    pub fn mkdir(&self, target: &str) -> Result<()> {
        self.require(Capability::Mkdir)?;
        fs::create_dir(self.resolve(target)?)?;
        Ok(())
    }

    pub fn read(&self, target: &str) -> Result<String> {
        self.require(Capability::Read)?;
        Ok(fs::read_to_string(self.resolve(target)?)?)
    }

    /// Replace a file's contents, creating it if needed.
    pub fn write(&self, target: &str, content: &str) -> Result<()> {
        self.require(Capability::Write)?;
        fs::write(self.resolve(target)?, content)?;
        Ok(())
    }

    /// Append to an existing file.
    pub fn append(&self, target: &str, content: &str) -> Result<()> {
        self.require(Capability::Append)?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(self.resolve(target)?)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Run an allow-listed program with the root as working directory.
    pub fn exec(&self, program: &str, args: &[&str]) -> Result<()> {
        self.require(Capability::Exec)?;
        if !self.policy.is_program_allowed(program) {
            return Err(PlugmanError::CapabilityDenied(format!(
                "program '{}' is not on the allow-list",
                program
            )));
        }

        info!(program = %program, args = ?args, "Running script command");
        let status = Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .status()
            .map_err(|e| PlugmanError::ScriptFailed(format!("{}: {}", program, e)))?;

        if !status.success() {
            return Err(PlugmanError::ScriptFailed(format!(
                "{} exited with {}",
                program, status
            )));
        }
        Ok(())
    }

    fn require(&self, capability: Capability) -> Result<()> {
        if self.policy.is_granted(capability) {
            return Ok(());
        }
        debug!(capability = %capability, "Denied script host operation");
        Err(PlugmanError::CapabilityDenied(format!(
            "'{}' is not granted to this script",
            capability
        )))
    }

    fn resolve(&self, target: &str) -> Result<SafePath> {
        resolve_in_root(target, &self.root)
    }

    /// Resolve the parent of `target` and keep its last component as given,
    /// so a symlink names the link rather than what it points at.
    fn resolve_entry(&self, target: &str) -> Result<PathBuf> {
        let path = Path::new(target);
        let name = path.file_name().ok_or_else(|| {
            PlugmanError::SecurityViolation(format!(
                "Refusing to operate on the sandbox root: {:?}",
                target
            ))
        })?;
        let parent = path.parent().and_then(Path::to_str).unwrap_or("");
        Ok(self.resolve(parent)?.into_path_buf().join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn host(policy: SandboxPolicy) -> (TempDir, ScriptHost) {
        let tmp = TempDir::new().unwrap();
        let host = ScriptHost::new(tmp.path(), policy);
        (tmp, host)
    }

    #[test]
    fn test_default_policy_is_read_only() {
        let policy = SandboxPolicy::default();
        assert!(policy.is_granted(Capability::Read));
        assert!(policy.is_granted(Capability::Exists));
        assert!(!policy.is_granted(Capability::Write));
        assert!(!policy.is_granted(Capability::Exec));
    }

    #[test]
    fn test_filesystem_policy_excludes_exec() {
        let policy = SandboxPolicy::filesystem();
        for cap in Capability::ALL {
            assert_eq!(policy.is_granted(cap), cap != Capability::Exec, "{cap}");
        }
    }

    #[test]
    fn test_file_lifecycle() {
        let (tmp, host) = host(SandboxPolicy::filesystem());

        host.mkdir("test").unwrap();
        host.write("test/test.txt", "test").unwrap();
        assert!(host.exists("test/test.txt").unwrap());
        assert_eq!(host.read("test/test.txt").unwrap(), "test");

        host.append("test/test.txt", "test2").unwrap();
        assert_eq!(host.read("test/test.txt").unwrap(), "testtest2");

        assert_eq!(host.copy("test/test.txt", "test/copy.txt").unwrap(), 9);
        assert_eq!(
            fs::read_to_string(tmp.path().join("test/copy.txt")).unwrap(),
            "testtest2"
        );

        host.create("empty.txt").unwrap();
        assert_eq!(host.read("empty.txt").unwrap(), "");

        host.delete("test/test.txt").unwrap();
        host.delete("test/copy.txt").unwrap();
        host.delete("test").unwrap();
        assert!(!host.exists("test").unwrap());
    }

    #[test]
    fn test_append_requires_existing_file() {
        let (_tmp, host) = host(SandboxPolicy::filesystem());
        assert!(host.append("missing.txt", "x").is_err());
    }

    #[test]
    fn test_copy_rejects_directories() {
        let (_tmp, host) = host(SandboxPolicy::filesystem());
        host.mkdir("dir").unwrap();
        let err = host.copy("dir", "dir2").unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[test]
    fn test_ungranted_capability_denied() {
        let (tmp, host) = host(SandboxPolicy::read_only());
        let err = host.write("file.txt", "data").unwrap_err();
        assert!(matches!(err, PlugmanError::CapabilityDenied(_)));
        assert!(!tmp.path().join("file.txt").exists());
    }

    #[test]
    fn test_paths_confined_to_root() {
        let (_tmp, host) = host(SandboxPolicy::filesystem());
        let err = host.read("../../etc/passwd").unwrap_err();
        assert!(matches!(err, PlugmanError::SecurityViolation(_)));
        let err = host.write("/etc/plugman-test", "x").unwrap_err();
        assert!(matches!(err, PlugmanError::SecurityViolation(_)));
    }

    #[test]
    fn test_cannot_delete_root() {
        let (tmp, host) = host(SandboxPolicy::filesystem());
        assert!(host.delete("").is_err());
        assert!(tmp.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_delete_symlink_keeps_target() {
        let (tmp, host) = host(SandboxPolicy::filesystem());
        host.write("real.txt", "keep me").unwrap();
        host.mkdir("data").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real.txt"), tmp.path().join("link.txt"))
            .unwrap();
        std::os::unix::fs::symlink(tmp.path().join("data"), tmp.path().join("data-link"))
            .unwrap();

        host.delete("link.txt").unwrap();
        host.delete("data-link").unwrap();

        assert!(fs::symlink_metadata(tmp.path().join("link.txt")).is_err());
        assert!(fs::symlink_metadata(tmp.path().join("data-link")).is_err());
        assert_eq!(host.read("real.txt").unwrap(), "keep me");
        assert!(tmp.path().join("data").is_dir());
    }

    #[test]
    fn test_exec_requires_allow_list() {
        let (_tmp, host) = host(SandboxPolicy::filesystem().grant(Capability::Exec));
        let err = host.exec("sh", &["-c", "true"]).unwrap_err();
        assert!(matches!(err, PlugmanError::CapabilityDenied(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_allowed_program() {
        let (tmp, host) = host(SandboxPolicy::read_only().allow_program("sh"));
        host.exec("sh", &["-c", "echo hi > out.txt"]).unwrap();
        assert_eq!(
            fs::read_to_string(tmp.path().join("out.txt")).unwrap(),
            "hi\n"
        );

        let err = host.exec("sh", &["-c", "exit 3"]).unwrap_err();
        assert!(matches!(err, PlugmanError::ScriptFailed(_)));
    }
}
