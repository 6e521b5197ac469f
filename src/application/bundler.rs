//! Webview bundling.
//!
//! Collects the webview source tree into `webview.js`, `webview.css` and a set
//! of content-addressed files under `assets/`. The output directory is only
//! ever added to: files from earlier builds or from other tools stay put.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::domain::{
    AppError, AssetEntry, BuildArtifactSet, Result, ASSETS_DIR, SCRIPT_FILE_NAME,
    STYLESHEET_FILE_NAME,
};

const SCRIPT_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "ts", "tsx"];
const STYLESHEET_EXTENSIONS: &[&str] = &["css"];
const SKIPPED_DIRS: &[&str] = &["node_modules"];

/// Hex chars of the content digest embedded in asset names.
const ASSET_HASH_LEN: usize = 8;

/// Something that produces the webview bundle.
pub trait ArtifactBuilder: Send + Sync + 'static {
    /// Run one build.
    ///
    /// # Errors
    /// Returns a `Build` error if the bundle cannot be produced.
    fn build(&self) -> Result<BuildArtifactSet>;
}

/// Bundles a webview source tree into a fixed output layout.
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    entry: PathBuf,
    out_dir: PathBuf,
}

#[derive(Debug)]
struct SourceFile {
    path: PathBuf,
    relative: String,
}

impl BundleBuilder {
    /// Create a builder for the given entry point and output directory.
    #[must_use]
    pub fn new(entry: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            entry: entry.into(),
            out_dir: out_dir.into(),
        }
    }

    /// Webview entry point.
    #[must_use]
    pub fn entry(&self) -> &Path {
        &self.entry
    }

    /// Output directory.
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Directory holding the entry point; everything below it is bundled.
    #[must_use]
    pub fn source_root(&self) -> PathBuf {
        match self.entry.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Whether a change to `path` can affect the bundle.
    #[must_use]
    pub fn is_source(&self, path: &Path) -> bool {
        let root = self.source_root();
        let Ok(relative) = path.strip_prefix(&root) else {
            return false;
        };
        if path.starts_with(&self.out_dir) {
            return false;
        }
        relative.components().all(|c| {
            let name = c.as_os_str().to_string_lossy();
            !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref())
        })
    }

    /// Bundle the source tree.
    ///
    /// # Errors
    /// Returns a `Build` error if the entry is missing or not a script, or if
    /// reading sources or writing output fails.
    pub fn run(&self) -> Result<BuildArtifactSet> {
        if !self.entry.is_file() {
            return Err(AppError::build(format!(
                "entry point not found: {}",
                self.entry.display()
            )));
        }
        if !has_extension(&self.entry, SCRIPT_EXTENSIONS) {
            return Err(AppError::build(format!(
                "entry point is not a script: {}",
                self.entry.display()
            )));
        }

        let source_root = self.source_root();
        let start = std::time::Instant::now();

        let mut scripts = Vec::new();
        let mut stylesheets = Vec::new();
        let mut others = Vec::new();

        let entry = SourceFile {
            relative: relative_name(&source_root, &self.entry),
            path: self.entry.clone(),
        };

        for file in self.collect_sources(&source_root)? {
            if file.relative == entry.relative {
                continue;
            } else if has_extension(&file.path, SCRIPT_EXTENSIONS) {
                scripts.push(file);
            } else if has_extension(&file.path, STYLESHEET_EXTENSIONS) {
                stylesheets.push(file);
            } else {
                others.push(file);
            }
        }

        scripts.insert(0, entry);

        fs::create_dir_all(&self.out_dir)
            .map_err(|e| build_io("failed to create output directory", &self.out_dir, &e))?;

        write_if_changed(&self.out_dir.join(SCRIPT_FILE_NAME), &concatenate(&scripts)?)?;
        write_if_changed(
            &self.out_dir.join(STYLESHEET_FILE_NAME),
            &concatenate(&stylesheets)?,
        )?;

        let mut assets = Vec::with_capacity(others.len());
        for file in &others {
            assets.push(self.emit_asset(file)?);
        }
        assets.sort_by(|a, b| a.logical_name.cmp(&b.logical_name));

        let set = BuildArtifactSet {
            out_dir: self.out_dir.clone(),
            script: SCRIPT_FILE_NAME.to_string(),
            stylesheet: STYLESHEET_FILE_NAME.to_string(),
            assets,
        };

        tracing::info!(
            scripts = scripts.len(),
            stylesheets = stylesheets.len(),
            assets = set.assets.len(),
            duration_ms = start.elapsed().as_millis(),
            "Webview bundle written"
        );

        Ok(set)
    }

    /// All bundleable files under `root`, sorted by relative name.
    fn collect_sources(&self, root: &Path) -> Result<Vec<SourceFile>> {
        let out_dir = fs::canonicalize(&self.out_dir).ok();
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()) {
                    return false;
                }
                out_dir
                    .as_ref()
                    .is_none_or(|out| fs::canonicalize(entry.path()).ok().as_ref() != Some(out))
            });

        for entry in walker {
            let entry = entry.map_err(|e| AppError::build(format!("failed to scan sources: {e}")))?;
            if entry.file_type().is_file() {
                files.push(SourceFile {
                    relative: relative_name(root, entry.path()),
                    path: entry.into_path(),
                });
            }
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(files)
    }

    fn emit_asset(&self, file: &SourceFile) -> Result<AssetEntry> {
        let bytes = fs::read(&file.path).map_err(|e| build_io("failed to read", &file.path, &e))?;
        let digest = hex::encode(Sha256::digest(&bytes));
        let file_name = hashed_name(&file.path, &digest[..ASSET_HASH_LEN]);

        write_if_changed(&self.out_dir.join(&file_name), &bytes)?;
        tracing::debug!(asset = %file.relative, emitted = %file_name, "Asset emitted");

        Ok(AssetEntry {
            logical_name: file.relative.clone(),
            file_name,
            digest,
            size_bytes: bytes.len() as u64,
        })
    }
}

impl ArtifactBuilder for BundleBuilder {
    fn build(&self) -> Result<BuildArtifactSet> {
        self.run()
    }
}

/// `assets/<stem>-<hash>.<ext>`.
fn hashed_name(path: &Path, hash: &str) -> String {
    let stem = path
        .file_stem()
        .map_or_else(|| "asset".into(), |s| s.to_string_lossy());
    match path.extension() {
        Some(ext) => format!("{ASSETS_DIR}/{stem}-{hash}.{}", ext.to_string_lossy()),
        None => format!("{ASSETS_DIR}/{stem}-{hash}"),
    }
}

fn concatenate(files: &[SourceFile]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for file in files {
        let content =
            fs::read(&file.path).map_err(|e| build_io("failed to read", &file.path, &e))?;
        let banner = if has_extension(&file.path, STYLESHEET_EXTENSIONS) {
            format!("/* {} */\n", file.relative)
        } else {
            format!("// {}\n", file.relative)
        };
        out.extend_from_slice(banner.as_bytes());
        out.extend_from_slice(&content);
        if !content.ends_with(b"\n") {
            out.push(b'\n');
        }
    }
    Ok(out)
}

/// Atomically replace `path` with `bytes` unless it already holds them.
fn write_if_changed(path: &Path, bytes: &[u8]) -> Result<()> {
    if fs::read(path).is_ok_and(|existing| existing == bytes) {
        return Ok(());
    }

    let dir = path
        .parent()
        .ok_or_else(|| AppError::build(format!("no parent directory for {}", path.display())))?;
    fs::create_dir_all(dir).map_err(|e| build_io("failed to create", dir, &e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| build_io("failed to stage", path, &e))?;
    tmp.write_all(bytes)
        .map_err(|e| build_io("failed to write", path, &e))?;
    tmp.persist(path)
        .map_err(|e| build_io("failed to persist", path, &e.error))?;
    Ok(())
}

fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.contains(&e.to_ascii_lowercase().as_str()))
}

fn build_io(action: &str, path: &Path, err: &std::io::Error) -> AppError {
    AppError::build(format!("{action} {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct Fixture {
        _dir: tempfile::TempDir,
        src: PathBuf,
        out: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let src = dir.path().join("src/webview");
            let out = dir.path().join("dist");
            fs::create_dir_all(src.join("images")).unwrap();
            fs::write(src.join("index.jsx"), "import App from './App';\n").unwrap();
            fs::write(src.join("App.jsx"), "export default function App() {}").unwrap();
            fs::write(src.join("theme.css"), "body { margin: 0; }\n").unwrap();
            fs::write(src.join("images/logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
            Self {
                _dir: dir,
                src,
                out,
            }
        }

        fn builder(&self) -> BundleBuilder {
            BundleBuilder::new(self.src.join("index.jsx"), &self.out)
        }
    }

    #[test]
    fn test_build_emits_fixed_entry_names() {
        let fx = Fixture::new();
        let set = fx.builder().run().unwrap();

        assert_eq!(set.script, "webview.js");
        assert_eq!(set.stylesheet, "webview.css");
        assert!(set.script_path().is_file());
        assert!(set.stylesheet_path().is_file());

        let script = fs::read_to_string(set.script_path()).unwrap();
        let entry_at = script.find("// index.jsx").unwrap();
        let app_at = script.find("// App.jsx").unwrap();
        assert!(entry_at < app_at, "entry must come first");

        let css = fs::read_to_string(set.stylesheet_path()).unwrap();
        assert!(css.contains("margin: 0"));
    }

    #[test]
    fn test_assets_are_content_addressed() {
        let fx = Fixture::new();
        let set = fx.builder().run().unwrap();

        let logo = set.asset("images/logo.png").unwrap();
        assert!(logo.file_name.starts_with("assets/logo-"));
        assert!(logo.file_name.ends_with(".png"));
        assert_eq!(logo.file_name.len(), "assets/logo-".len() + 8 + ".png".len());
        assert_eq!(&logo.digest[..8], &logo.file_name[12..20]);
        assert_eq!(fs::read(fx.out.join(&logo.file_name)).unwrap().len(), 4);
    }

    #[test]
    fn test_identical_sources_give_identical_names() {
        let fx = Fixture::new();
        let first = fx.builder().run().unwrap();
        let second = fx.builder().run().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_changed_asset_gets_new_name_and_old_one_stays() {
        let fx = Fixture::new();
        let first = fx.builder().run().unwrap();
        fs::write(fx.src.join("images/logo.png"), b"new pixels").unwrap();
        let second = fx.builder().run().unwrap();

        let old = &first.asset("images/logo.png").unwrap().file_name;
        let new = &second.asset("images/logo.png").unwrap().file_name;
        assert_ne!(old, new);
        assert!(fx.out.join(old).exists());
        assert!(fx.out.join(new).exists());
        assert_eq!(first.script, second.script);
    }

    #[test]
    fn test_unrelated_output_files_survive() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.out.join("ios-build")).unwrap();
        fs::write(fx.out.join("ios-build/App.app"), "binary").unwrap();
        fs::write(fx.out.join("notes.txt"), "keep me").unwrap();

        fx.builder().run().unwrap();
        fx.builder().run().unwrap();

        assert_eq!(fs::read_to_string(fx.out.join("notes.txt")).unwrap(), "keep me");
        assert!(fx.out.join("ios-build/App.app").exists());
    }

    #[test]
    fn test_hidden_dirs_and_output_inside_source_are_skipped() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("web");
        fs::create_dir_all(src.join(".cache")).unwrap();
        fs::create_dir_all(src.join("node_modules/react")).unwrap();
        fs::write(src.join("main.js"), "main();").unwrap();
        fs::write(src.join(".cache/junk.bin"), "junk").unwrap();
        fs::write(src.join("node_modules/react/index.js"), "react").unwrap();

        let out = src.join("dist");
        let builder = BundleBuilder::new(src.join("main.js"), &out);
        builder.run().unwrap();
        let set = builder.run().unwrap();

        assert!(set.assets.is_empty());
        let script = fs::read_to_string(set.script_path()).unwrap();
        assert!(!script.contains("react"));
        assert!(!script.contains("webview.js"));
    }

    #[test]
    fn test_missing_entry_is_a_build_failure() {
        let dir = tempdir().unwrap();
        let builder = BundleBuilder::new(dir.path().join("nope.jsx"), dir.path().join("dist"));
        let err = builder.run().unwrap_err();
        assert!(matches!(err, AppError::Build { .. }));
        assert!(!dir.path().join("dist").exists());
    }

    #[test]
    fn test_non_script_entry_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html/>").unwrap();
        let builder = BundleBuilder::new(dir.path().join("index.html"), dir.path().join("dist"));
        assert!(matches!(builder.run(), Err(AppError::Build { .. })));
    }

    #[test]
    fn test_bare_entry_bundles_current_directory() {
        let builder = BundleBuilder::new("index.jsx", "dist");
        assert_eq!(builder.source_root(), PathBuf::from("."));
        assert_eq!(relative_name(&builder.source_root(), Path::new("./index.jsx")), "index.jsx");
        assert_eq!(relative_name(&builder.source_root(), builder.entry()), "index.jsx");
    }

    #[test]
    fn test_is_source_ignores_output_and_hidden_paths() {
        let fx = Fixture::new();
        let builder = fx.builder();
        assert!(builder.is_source(&fx.src.join("App.jsx")));
        assert!(builder.is_source(&fx.src.join("images/logo.png")));
        assert!(!builder.is_source(&fx.src.join(".cache/x.js")));
        assert!(!builder.is_source(&fx.src.join("node_modules/react/index.js")));
        assert!(!builder.is_source(&fx.out.join("webview.js")));

        let nested = BundleBuilder::new(fx.src.join("index.jsx"), fx.src.join("dist"));
        assert!(!nested.is_source(&fx.src.join("dist/webview.js")));
    }

    #[test]
    fn test_hashed_name_without_extension() {
        assert_eq!(
            hashed_name(Path::new("fonts/LICENSE"), "deadbeef"),
            "assets/LICENSE-deadbeef"
        );
    }
}
