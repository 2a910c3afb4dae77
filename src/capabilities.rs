//! # Optional backend detection
//!
//! Works out once per process which of the optional compression backends can
//! be used:
//! - libimagequant palette quantization (compiled in via the `imagequant` feature)
//! - a `jpegtran` binary for lossless JPEG re-optimization
//! - an `oxipng` binary, or the embedded oxipng library, for lossless PNG passes
//!
//! Nothing here fails: a backend that cannot be found is simply absent.

use crate::command::BoundedCommand;
use crate::constants::{
    BUNDLED_TOOLS_DIR, DITHERING_METHOD, JPEGTRAN_BINARY, JPEGTRAN_ENV_VAR, OXIPNG_BINARY,
    OXIPNG_ENV_VAR, VERSION_CHECK_TIMEOUT,
};
use serde::Serialize;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

static DETECTED: OnceLock<Capabilities> = OnceLock::new();

/// How the lossless PNG pass is carried out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum LosslessPngTool {
    /// An external oxipng executable
    Binary(PathBuf),
    /// The oxipng library linked into this binary
    Embedded,
}

/// Immutable description of the backends available to the encoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub quantizer_available: bool,
    pub jpeg_optimizer: Option<PathBuf>,
    pub lossless_png_tool: Option<LosslessPngTool>,
    pub dithering_method: String,
}

impl Capabilities {
    /// Inspects the environment on first call; later calls return the same descriptor.
    pub fn detect() -> &'static Capabilities {
        DETECTED.get_or_init(Self::inspect)
    }

    /// A descriptor with every optional backend switched off.
    pub fn none() -> Self {
        Self {
            quantizer_available: false,
            jpeg_optimizer: None,
            lossless_png_tool: None,
            dithering_method: DITHERING_METHOD.to_string(),
        }
    }

    fn inspect() -> Self {
        let capabilities = Self {
            quantizer_available: cfg!(feature = "imagequant"),
            jpeg_optimizer: resolve_tool(JPEGTRAN_ENV_VAR, JPEGTRAN_BINARY, "-version"),
            lossless_png_tool: resolve_lossless_png_tool(),
            dithering_method: DITHERING_METHOD.to_string(),
        };
        debug!("Detected capabilities: {:?}", capabilities);
        capabilities
    }

    pub fn jpeg_optimizer_available(&self) -> bool {
        self.jpeg_optimizer.is_some()
    }

    pub fn lossless_png_tool_available(&self) -> bool {
        self.lossless_png_tool.is_some()
    }

    pub fn quantizer_label(&self) -> &'static str {
        if self.quantizer_available {
            "libimagequant"
        } else {
            "built-in fallback"
        }
    }

    pub fn jpeg_optimizer_label(&self) -> &'static str {
        if self.jpeg_optimizer_available() {
            "jpegtran"
        } else {
            "disabled"
        }
    }

    pub fn lossless_label(&self) -> &'static str {
        match self.lossless_png_tool {
            Some(LosslessPngTool::Binary(_)) => "oxipng",
            Some(LosslessPngTool::Embedded) => "oxipng (embedded)",
            None => "disabled",
        }
    }
}

fn resolve_lossless_png_tool() -> Option<LosslessPngTool> {
    if let Some(path) = resolve_tool(OXIPNG_ENV_VAR, OXIPNG_BINARY, "--version") {
        return Some(LosslessPngTool::Binary(path));
    }

    if cfg!(feature = "embedded-oxipng") {
        debug!("No oxipng binary found, using the embedded library");
        return Some(LosslessPngTool::Embedded);
    }

    None
}

/// Resolve an optional tool binary
///
/// Order: the environment override (if the path exists), a binary bundled
/// next to the executable, then `PATH`. Only the `PATH` candidate is
/// verified by running it with `version_arg`.
pub fn resolve_tool(env_var: &str, tool_name: &str, version_arg: &str) -> Option<PathBuf> {
    let lookup = ToolLookup {
        override_path: env::var_os(env_var).map(PathBuf::from),
        search_path: env::var_os("PATH"),
    };
    debug!("Resolving {} (override variable {})", tool_name, env_var);
    lookup.resolve(tool_name, version_arg)
}

/// Inputs of a tool lookup, captured from the environment once
#[derive(Debug, Clone, Default)]
struct ToolLookup {
    override_path: Option<PathBuf>,
    search_path: Option<OsString>,
}

impl ToolLookup {
    fn resolve(&self, tool_name: &str, version_arg: &str) -> Option<PathBuf> {
        if let Some(path) = &self.override_path {
            if path.exists() {
                debug!("Using {} override: {:?}", tool_name, path);
                return Some(path.clone());
            }
            debug!("{} override points to a missing file: {:?}", tool_name, path);
        }

        if let Some(path) = find_bundled_tool(tool_name) {
            debug!("Using bundled {}: {:?}", tool_name, path);
            return Some(path);
        }

        let path = self.find_in_search_path(tool_name)?;
        let outcome = BoundedCommand::new(&path, VERSION_CHECK_TIMEOUT)
            .arg(version_arg)
            .run();
        if outcome.is_success() {
            debug!("Using system {}: {:?}", tool_name, path);
            Some(path)
        } else {
            debug!("{:?} failed its version check: {:?}", path, outcome);
            None
        }
    }

    fn find_in_search_path(&self, tool_name: &str) -> Option<PathBuf> {
        let file_name = executable_name(tool_name);
        env::split_paths(self.search_path.as_ref()?)
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file())
    }
}

fn executable_name(tool_name: &str) -> String {
    format!("{}{}", tool_name, env::consts::EXE_SUFFIX)
}

fn find_bundled_tool(tool_name: &str) -> Option<PathBuf> {
    let exe_path = env::current_exe().ok()?;
    let app_dir = exe_path.parent()?;
    bundled_candidates(app_dir, tool_name)
        .into_iter()
        .find(|path| path.is_file())
}

fn bundled_candidates(app_dir: &Path, tool_name: &str) -> Vec<PathBuf> {
    let file_name = executable_name(tool_name);
    vec![
        app_dir.join(BUNDLED_TOOLS_DIR).join(&file_name),
        app_dir.join(&file_name),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_disables_everything() {
        let caps = Capabilities::none();
        assert!(!caps.quantizer_available);
        assert!(!caps.jpeg_optimizer_available());
        assert!(!caps.lossless_png_tool_available());
        assert_eq!(caps.dithering_method, "Floyd-Steinberg");
        assert_eq!(caps.quantizer_label(), "built-in fallback");
        assert_eq!(caps.lossless_label(), "disabled");
    }

    #[test]
    fn test_detect_is_memoized() {
        let first = Capabilities::detect();
        let second = Capabilities::detect();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.quantizer_available, cfg!(feature = "imagequant"));
    }

    #[cfg(feature = "embedded-oxipng")]
    #[test]
    fn test_embedded_oxipng_is_last_resort() {
        assert!(Capabilities::detect().lossless_png_tool_available());
    }

    #[test]
    fn test_bundled_candidates_order() {
        let candidates = bundled_candidates(Path::new("/opt/app"), "oxipng");
        let name = executable_name("oxipng");
        assert_eq!(candidates[0], Path::new("/opt/app").join("bin").join(&name));
        assert_eq!(candidates[1], Path::new("/opt/app").join(&name));
    }

    #[test]
    fn test_resolve_tool_missing_everywhere() {
        assert_eq!(
            resolve_tool(
                "IMG_YASUO_TEST_UNSET_OVERRIDE",
                "img-yasuo-no-such-tool",
                "--version"
            ),
            None
        );
    }

    fn lookup_in(dir: &Path) -> ToolLookup {
        ToolLookup {
            override_path: None,
            search_path: Some(dir.as_os_str().to_os_string()),
        }
    }

    #[test]
    fn test_override_must_exist() {
        let dir = tempfile::TempDir::new().unwrap();
        let fake = dir.path().join("fake-tool");
        std::fs::write(&fake, b"#!/bin/sh\n").unwrap();

        let present = ToolLookup {
            override_path: Some(fake.clone()),
            search_path: None,
        };
        assert_eq!(
            present.resolve("img-yasuo-no-such-tool", "--version"),
            Some(fake)
        );

        let missing = ToolLookup {
            override_path: Some(dir.path().join("missing")),
            search_path: None,
        };
        assert_eq!(missing.resolve("img-yasuo-no-such-tool", "--version"), None);
    }

    #[test]
    fn test_empty_search_path_finds_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(
            lookup_in(dir.path()).resolve("img-yasuo-no-such-tool", "--version"),
            None
        );
        assert_eq!(
            ToolLookup::default().resolve("img-yasuo-no-such-tool", "--version"),
            None
        );
    }

    #[cfg(unix)]
    fn fake_tool(dir: &Path, name: &str, exit_code: i32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\nexit {}\n", exit_code)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_search_path_tool_passing_version_check() {
        let dir = tempfile::TempDir::new().unwrap();
        let tool = fake_tool(dir.path(), "img-yasuo-good-tool", 0);
        assert_eq!(
            lookup_in(dir.path()).resolve("img-yasuo-good-tool", "--version"),
            Some(tool)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_search_path_tool_failing_version_check() {
        let dir = tempfile::TempDir::new().unwrap();
        fake_tool(dir.path(), "img-yasuo-broken-tool", 1);
        assert_eq!(
            lookup_in(dir.path()).resolve("img-yasuo-broken-tool", "-version"),
            None
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_override_skips_version_check() {
        let dir = tempfile::TempDir::new().unwrap();
        let broken = fake_tool(dir.path(), "img-yasuo-broken-tool", 1);
        let lookup = ToolLookup {
            override_path: Some(broken.clone()),
            search_path: None,
        };
        assert_eq!(lookup.resolve("img-yasuo-broken-tool", "--version"), Some(broken));
    }
}
