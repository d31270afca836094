//! Filesystem tools: directory listing, file read and file write.
//!
//! Every function returns the text shown to the model. Failures are reported
//! in that text and never escape as errors.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::core::secrets::is_dotenv_name;
use crate::io::config::ToolsConfig;

/// How deep below the project root dotenv files are looked for.
const DOTENV_SCAN_DEPTH: usize = 4;

/// Resolve a model-supplied path. Relative paths are taken from `root`.
pub fn resolve_path(root: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// List entries under `path`, one `DIR `/`FILE` line each, sorted by path.
///
/// Entries named in `skip_dirs` and hidden entries outside `dotfile_allow`
/// are neither listed nor descended into, whatever their file type. Files
/// with a skipped extension are omitted.
pub fn list_directory(path: &Path, recursive: bool, config: &ToolsConfig) -> String {
    if !path.exists() {
        return format!("ERROR: Path does not exist: {}", path.display());
    }
    if !path.is_dir() {
        return format!("ERROR: Not a directory: {}", path.display());
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(path)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || keep_entry(entry, config));

    let mut entries: Vec<(PathBuf, bool)> = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(err = %err, "skipping unreadable entry");
                continue;
            }
        };
        let rel = match entry.path().strip_prefix(path) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => continue,
        };
        entries.push((rel, entry.path().is_dir()));
    }
    entries.sort();
    debug!(path = %path.display(), recursive, entries = entries.len(), "listed directory");

    if entries.is_empty() {
        return "(empty)".to_string();
    }
    entries
        .iter()
        .map(|(rel, is_dir)| {
            let kind = if *is_dir { "DIR " } else { "FILE" };
            format!("{kind}  {}", rel.display())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn keep_entry(entry: &DirEntry, config: &ToolsConfig) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') && !config.dotfile_allow.contains(name.as_ref()) {
        return false;
    }
    if config.skip_dirs.contains(name.as_ref()) {
        return false;
    }
    entry.file_type().is_dir() || !has_skipped_extension(entry.path(), config)
}

/// Dotenv-style secrets files under `root`, skipping `skip_dirs`.
pub fn find_dotenv_files(
    root: &Path,
    config: &ToolsConfig,
    templates: &BTreeSet<String>,
) -> Vec<PathBuf> {
    WalkDir::new(root)
        .max_depth(DOTENV_SCAN_DEPTH)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !config
                    .skip_dirs
                    .contains(entry.file_name().to_string_lossy().as_ref())
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_dotenv_name(&entry.file_name().to_string_lossy(), templates))
        .map(|entry| entry.into_path())
        .collect()
}

fn skipped_extension(path: &Path, config: &ToolsConfig) -> Option<String> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    config.skip_extensions.contains(&ext).then_some(ext)
}

fn has_skipped_extension(path: &Path, config: &ToolsConfig) -> bool {
    skipped_extension(path, config).is_some()
}

/// Read a text file, truncated to `max_file_bytes`.
pub fn read_file(path: &Path, config: &ToolsConfig) -> String {
    if !path.exists() {
        return format!("ERROR: File does not exist: {}", path.display());
    }
    if !path.is_file() {
        return format!("ERROR: Not a file: {}", path.display());
    }
    if let Some(ext) = skipped_extension(path, config) {
        return format!("SKIPPED: Binary/media file (.{ext})");
    }

    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(err) => return format!("ERROR reading file: {err}"),
    };
    let limit = config.max_file_bytes;
    if size <= limit {
        return match fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => format!("ERROR reading file: {err}"),
        };
    }

    let mut head = Vec::new();
    let read = File::open(path).and_then(|file| file.take(limit).read_to_end(&mut head));
    if let Err(err) = read {
        return format!("ERROR reading file: {err}");
    }
    debug!(path = %path.display(), size, limit, "truncating large file");
    let mut text = String::from_utf8_lossy(&head).into_owned();
    truncate_at_char_boundary(&mut text, usize::try_from(limit).unwrap_or(usize::MAX));
    format!("TRUNCATED: File too large ({size} bytes), showing first {limit} bytes.\n\n{text}")
}

/// Lossy decoding can grow the text; cut back to at most `max` bytes.
fn truncate_at_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

/// Result of a `write_file` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub text: String,
    pub written: bool,
}

/// Write `content` to `path`, creating parent directories.
///
/// Files whose name is in `executable_names` get execute bits added on Unix.
pub fn write_file(path: &Path, content: &str, config: &ToolsConfig) -> WriteOutcome {
    match try_write(path, content, config) {
        Ok(()) => WriteOutcome {
            text: format!("OK: Written {} ({} bytes)", path.display(), content.len()),
            written: true,
        },
        Err(err) => {
            warn!(path = %path.display(), err = %err, "write failed");
            WriteOutcome {
                text: format!("ERROR writing file: {err}"),
                written: false,
            }
        }
    }
}

fn try_write(path: &Path, content: &str, config: &ToolsConfig) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    let executable = path
        .file_name()
        .map(|name| config.executable_names.contains(name.to_string_lossy().as_ref()))
        .unwrap_or(false);
    if executable {
        make_executable(path)?;
    }
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, "x").expect("write");
    }

    fn project() -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(root, "app.py");
        touch(root, "requirements.txt");
        touch(root, ".env.example");
        touch(root, ".secret");
        touch(root, "logo.png");
        touch(root, "src/main.py");
        touch(root, "node_modules/pkg/index.js");
        touch(root, ".git/HEAD");
        touch(root, ".github/workflows/ci.yml");
        touch(root, "build/out.txt");
        temp
    }

    #[test]
    fn non_recursive_lists_immediate_children_only() {
        let temp = project();
        let listing = list_directory(temp.path(), false, &ToolsConfig::default());
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(
            lines,
            vec![
                "FILE  .env.example",
                "DIR   .github",
                "FILE  app.py",
                "FILE  requirements.txt",
                "DIR   src",
            ]
        );
    }

    #[test]
    fn recursive_prunes_skipped_and_hidden_directories() {
        let temp = project();
        let listing = list_directory(temp.path(), true, &ToolsConfig::default());
        assert!(listing.contains("FILE  src/main.py"));
        assert!(listing.contains("FILE  .github/workflows/ci.yml"));
        for excluded in ["node_modules", ".git/", "build", "logo.png", ".secret"] {
            assert!(!listing.contains(excluded), "{excluded} leaked:\n{listing}");
        }
    }

    #[test]
    fn skip_names_apply_to_files_too() {
        let temp = tempfile::tempdir().expect("tempdir");
        touch(temp.path(), "app.py");
        touch(temp.path(), "build");
        touch(temp.path(), "src/env");
        touch(temp.path(), "src/vendor");

        for recursive in [false, true] {
            let listing = list_directory(temp.path(), recursive, &ToolsConfig::default());
            assert!(listing.contains("FILE  app.py"), "{listing}");
            for excluded in ["build", "env", "vendor"] {
                assert!(!listing.contains(excluded), "{excluded} leaked:\n{listing}");
            }
        }
    }

    #[test]
    fn finds_dotenv_files_outside_skipped_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        for rel in [
            ".env",
            ".env.example",
            "api/.env.production",
            "node_modules/pkg/.env",
            "settings.env",
        ] {
            touch(temp.path(), rel);
        }
        let templates: BTreeSet<String> = [".env.example".to_string()].into();

        let mut found = find_dotenv_files(temp.path(), &ToolsConfig::default(), &templates);
        found.sort();

        assert_eq!(
            found,
            vec![temp.path().join(".env"), temp.path().join("api/.env.production")]
        );
    }

    #[test]
    fn listing_reports_missing_and_non_directories() {
        let temp = project();
        let config = ToolsConfig::default();
        let missing = list_directory(&temp.path().join("nope"), false, &config);
        assert!(missing.starts_with("ERROR: Path does not exist: "));
        let file = list_directory(&temp.path().join("app.py"), false, &config);
        assert!(file.starts_with("ERROR: Not a directory: "));
    }

    #[test]
    fn empty_directory_lists_as_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert_eq!(
            list_directory(temp.path(), true, &ToolsConfig::default()),
            "(empty)"
        );
    }

    #[test]
    fn read_file_truncates_large_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("big.txt");
        fs::write(&path, "a".repeat(100)).expect("write");
        let config = ToolsConfig {
            max_file_bytes: 10,
            ..ToolsConfig::default()
        };
        let text = read_file(&path, &config);
        let (header, body) = text.split_once("\n\n").expect("header");
        assert_eq!(
            header,
            "TRUNCATED: File too large (100 bytes), showing first 10 bytes."
        );
        assert_eq!(body, "a".repeat(10));
    }

    #[test]
    fn truncated_multibyte_content_stays_within_limit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("utf8.txt");
        fs::write(&path, "é".repeat(20)).expect("write");
        let config = ToolsConfig {
            max_file_bytes: 5,
            ..ToolsConfig::default()
        };
        let text = read_file(&path, &config);
        let body = text.split_once("\n\n").expect("header").1;
        assert!(body.len() <= 5);
    }

    #[test]
    fn read_file_reports_errors_and_skips_binaries() {
        let temp = project();
        let config = ToolsConfig::default();
        assert!(
            read_file(&temp.path().join("missing.txt"), &config)
                .starts_with("ERROR: File does not exist: ")
        );
        assert!(read_file(&temp.path().join("src"), &config).starts_with("ERROR: Not a file: "));
        assert_eq!(
            read_file(&temp.path().join("logo.png"), &config),
            "SKIPPED: Binary/media file (.png)"
        );
        assert_eq!(read_file(&temp.path().join("app.py"), &config), "x");
    }

    #[test]
    fn write_file_creates_parents_and_reports_bytes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".github/workflows/deploy.yml");
        let outcome = write_file(&path, "name: deploy\n", &ToolsConfig::default());
        assert!(outcome.written);
        assert!(outcome.text.starts_with("OK: Written "));
        assert!(outcome.text.ends_with("(13 bytes)"));
        assert_eq!(fs::read_to_string(&path).expect("read"), "name: deploy\n");
    }

    #[cfg(unix)]
    #[test]
    fn deploy_script_becomes_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("deploy.sh");
        let outcome = write_file(&path, "#!/bin/sh\n", &ToolsConfig::default());
        assert!(outcome.written);
        let mode = fs::metadata(&path).expect("meta").permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn write_into_a_file_path_fails_with_error_text() {
        let temp = tempfile::tempdir().expect("tempdir");
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "x").expect("write");
        let outcome = write_file(&blocker.join("child.txt"), "y", &ToolsConfig::default());
        assert!(!outcome.written);
        assert!(outcome.text.starts_with("ERROR writing file: "));
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        let root = Path::new("/work/app");
        assert_eq!(resolve_path(root, "Dockerfile"), root.join("Dockerfile"));
        assert_eq!(resolve_path(root, "/etc/hosts"), PathBuf::from("/etc/hosts"));
    }
}
