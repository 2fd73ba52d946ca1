//! External compiler collaborators
//!
//! The compilers never reimplement bundling, Sass or POT extraction; they call
//! out through these traits. The provided implementations spawn the usual
//! command line tools.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, IoResultExt, Result};

use super::umd::MODULE_SYMBOL;
use super::{AssetKind, CompilationTarget, OutputFormat, OutputLocation};

/// Bundles a script entry and its dependency graph to disk.
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn bundle(&self, target: &CompilationTarget) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    Expanded,
    Compressed,
}

impl OutputStyle {
    pub fn for_build(is_dev: bool) -> Self {
        if is_dev {
            OutputStyle::Expanded
        } else {
            OutputStyle::Compressed
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            OutputStyle::Expanded => "expanded",
            OutputStyle::Compressed => "compressed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleRequest {
    pub entry: PathBuf,
    pub style: OutputStyle,
    pub source_map: bool,
    pub load_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleOutput {
    pub css: String,
    pub source_map: Option<String>,
}

/// Compiles one stylesheet entry to CSS.
#[async_trait]
pub trait StyleEngine: Send + Sync {
    async fn compile(&self, request: &StyleRequest) -> Result<StyleOutput>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRequest {
    pub source_dir: PathBuf,
    pub dest_file: PathBuf,
    pub domain: String,
    /// Globs relative to `source_dir` to scan
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub project: String,
}

/// Writes a translation catalog (POT) for a source tree.
#[async_trait]
pub trait CatalogGenerator: Send + Sync {
    async fn generate(&self, request: &CatalogRequest) -> Result<()>;
}

#[async_trait]
impl<T: Bundler + ?Sized> Bundler for Arc<T> {
    async fn bundle(&self, target: &CompilationTarget) -> Result<()> {
        (**self).bundle(target).await
    }
}

#[async_trait]
impl<T: StyleEngine + ?Sized> StyleEngine for Arc<T> {
    async fn compile(&self, request: &StyleRequest) -> Result<StyleOutput> {
        (**self).compile(request).await
    }
}

#[async_trait]
impl<T: CatalogGenerator + ?Sized> CatalogGenerator for Arc<T> {
    async fn generate(&self, request: &CatalogRequest) -> Result<()> {
        (**self).generate(request).await
    }
}

/// A command line tool invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn to_shell_command(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|arg| {
                if arg.contains(' ') {
                    format!("'{arg}'")
                } else {
                    arg.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion. A non-zero exit becomes a compile error for `kind`
    /// carrying the tool's diagnostics.
    pub async fn run(&self, kind: AssetKind) -> Result<Output> {
        debug!("Running: {}", self.to_shell_command());

        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .await
            .map_err(|e| Error::ToolNotFound(self.program.clone(), e))?;

        if output.status.success() {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let diagnostics = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };
        Err(Error::compile(
            kind,
            format!(
                "{} exited with {}: {}",
                self.program,
                output.status.code().map_or("signal".to_string(), |c| c.to_string()),
                diagnostics
            ),
        ))
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// esbuild
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    program: String,
    working_dir: PathBuf,
}

impl EsbuildBundler {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: working_dir.into(),
        }
    }

    pub fn command(&self, target: &CompilationTarget) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.program)
            .with_working_dir(&self.working_dir)
            .arg(path_arg(&target.entry))
            .arg("--bundle")
            .arg(format!("--format={}", target.format.esbuild_format()))
            .arg(format!("--target={}", target.target))
            .arg("--log-level=warning");

        if target.minify {
            cmd = cmd.arg("--minify");
        }
        if target.sourcemap {
            cmd = cmd.arg("--sourcemap");
        }
        if target.format == OutputFormat::SelfExecuting {
            cmd = cmd.arg(format!("--global-name={MODULE_SYMBOL}"));
        }
        for id in target.externals.keys() {
            cmd = cmd.arg(format!("--external:{id}"));
        }
        for (ext, loader) in &target.loaders {
            let ext = ext.trim_start_matches('.');
            cmd = cmd.arg(format!("--loader:.{ext}={loader}"));
        }
        if let Some(tsconfig) = &target.tsconfig {
            cmd = cmd.arg(format!("--tsconfig={}", path_arg(tsconfig)));
        }

        match &target.output {
            OutputLocation::File(path) => cmd.arg(format!("--outfile={}", path_arg(path))),
            OutputLocation::Directory {
                dir,
                entry_name,
                chunk_dir,
            } => cmd
                .arg("--splitting")
                .arg(format!("--outdir={}", path_arg(dir)))
                .arg(format!("--entry-names={entry_name}"))
                .arg(format!("--chunk-names={chunk_dir}/chunk-[hash]")),
        }
    }
}

#[async_trait]
impl Bundler for EsbuildBundler {
    async fn bundle(&self, target: &CompilationTarget) -> Result<()> {
        self.command(target).run(AssetKind::Script).await?;
        Ok(())
    }
}

/// dart-sass
#[derive(Debug, Clone)]
pub struct SassEngine {
    program: String,
}

impl SassEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn command(&self, request: &StyleRequest, out_file: &Path) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.program)
            .arg(path_arg(&request.entry))
            .arg(path_arg(out_file))
            .arg(format!("--style={}", request.style.as_str()));

        cmd = if request.source_map {
            cmd.arg("--source-map").arg("--embed-sources")
        } else {
            cmd.arg("--no-source-map")
        };
        for load_path in &request.load_paths {
            cmd = cmd.arg(format!("--load-path={}", path_arg(load_path)));
        }
        cmd
    }
}

#[async_trait]
impl StyleEngine for SassEngine {
    async fn compile(&self, request: &StyleRequest) -> Result<StyleOutput> {
        let scratch = tempfile::tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let out_file = scratch.path().join("out.css");

        self.command(request, &out_file).run(AssetKind::Style).await?;

        let css = tokio::fs::read_to_string(&out_file).await.at(&out_file)?;
        let map_file = scratch.path().join("out.css.map");
        let source_map = if request.source_map {
            tokio::fs::read_to_string(&map_file).await.ok()
        } else {
            None
        };

        // The caller appends its own reference to the final map location
        let css = css
            .lines()
            .filter(|line| !line.trim_start().starts_with("/*# sourceMappingURL="))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(StyleOutput { css, source_map })
    }
}

/// `wp i18n make-pot`
#[derive(Debug, Clone)]
pub struct WpCliCatalogGenerator {
    program: String,
    working_dir: PathBuf,
}

impl WpCliCatalogGenerator {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: working_dir.into(),
        }
    }

    pub fn command(&self, request: &CatalogRequest) -> ToolCommand {
        let headers = serde_json::json!({ "Project-Id-Version": request.project }).to_string();

        let mut cmd = ToolCommand::new(&self.program)
            .with_working_dir(&self.working_dir)
            .arg("i18n")
            .arg("make-pot")
            .arg(path_arg(&request.source_dir))
            .arg(path_arg(&request.dest_file))
            .arg(format!("--domain={}", request.domain))
            .arg(format!("--headers={headers}"));

        if !request.include.is_empty() {
            cmd = cmd.arg(format!("--include={}", request.include.join(",")));
        }
        if !request.exclude.is_empty() {
            cmd = cmd.arg(format!("--exclude={}", request.exclude.join(",")));
        }
        cmd
    }
}

#[async_trait]
impl CatalogGenerator for WpCliCatalogGenerator {
    async fn generate(&self, request: &CatalogRequest) -> Result<()> {
        self.command(request).run(AssetKind::Translations).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_config;

    #[test]
    fn test_esbuild_self_executing_args() {
        let mut config = sample_config("/project");
        config
            .build
            .externals
            .insert("react".to_string(), "React".to_string());
        config
            .build
            .loaders
            .insert(".svg".to_string(), "text".to_string());
        let target = CompilationTarget::derive(&config, false, OutputFormat::SelfExecuting).unwrap();

        let cmd = EsbuildBundler::new("esbuild", "/project").command(&target);

        assert_eq!(cmd.working_dir, Some(PathBuf::from("/project")));
        assert_eq!(cmd.args[0], "/project/src/index.js");
        for expected in [
            "--bundle",
            "--format=iife",
            "--target=es2017",
            "--minify",
            "--global-name=__wpbuild_module",
            "--external:react",
            "--loader:.svg=text",
            "--outfile=/project/wordpress-plugin/assets/lib/demo.js",
        ] {
            assert!(cmd.args.iter().any(|a| a == expected), "missing {expected}");
        }
        assert!(!cmd.args.iter().any(|a| a == "--sourcemap"));
    }

    #[test]
    fn test_esbuild_splitting_args() {
        let config = sample_config("/project");
        let target = CompilationTarget::derive(&config, true, OutputFormat::NativeModule).unwrap();

        let cmd = EsbuildBundler::new("esbuild", "/project").command(&target);

        for expected in [
            "--format=esm",
            "--sourcemap",
            "--splitting",
            "--outdir=/project/wordpress-plugin/assets/lib",
            "--entry-names=demo.esm",
            "--chunk-names=chunks/chunk-[hash]",
        ] {
            assert!(cmd.args.iter().any(|a| a == expected), "missing {expected}");
        }
        assert!(!cmd.args.iter().any(|a| a.starts_with("--global-name")));
    }

    #[test]
    fn test_sass_args() {
        let request = StyleRequest {
            entry: PathBuf::from("/project/src/styles/main.scss"),
            style: OutputStyle::for_build(false),
            source_map: false,
            load_paths: vec![PathBuf::from("/project/node_modules")],
        };

        let cmd = SassEngine::new("sass").command(&request, Path::new("/tmp/out.css"));
        assert_eq!(
            cmd.to_shell_command(),
            "sass /project/src/styles/main.scss /tmp/out.css --style=compressed --no-source-map --load-path=/project/node_modules"
        );
    }

    #[test]
    fn test_make_pot_args() {
        let request = CatalogRequest {
            source_dir: PathBuf::from("/project/wordpress-plugin"),
            dest_file: PathBuf::from("/project/wordpress-plugin/languages/.demo.pot.tmp"),
            domain: "demo-plugin".to_string(),
            include: vec!["**/*.php".to_string()],
            exclude: vec!["vendor".to_string(), "node_modules".to_string()],
            project: "demo 1.2.3".to_string(),
        };

        let cmd = WpCliCatalogGenerator::new("wp", "/project").command(&request);
        assert_eq!(&cmd.args[..2], &["i18n".to_string(), "make-pot".to_string()]);
        assert!(cmd.args.contains(&"--domain=demo-plugin".to_string()));
        assert!(cmd.args.contains(&"--include=**/*.php".to_string()));
        assert!(cmd.args.contains(&"--exclude=vendor,node_modules".to_string()));
        assert!(cmd
            .args
            .contains(&r#"--headers={"Project-Id-Version":"demo 1.2.3"}"#.to_string()));
    }

    #[tokio::test]
    async fn test_missing_tool_is_reported() {
        let err = ToolCommand::new("wpbuild-definitely-not-installed")
            .run(AssetKind::Script)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(..)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tool_becomes_compile_error() {
        let err = ToolCommand::new("sh")
            .arg("-c")
            .arg("echo 'Expected \";\" but found \"}\"' >&2; exit 1")
            .run(AssetKind::Script)
            .await
            .unwrap_err();

        match err {
            Error::Compile { kind, message } => {
                assert_eq!(kind, AssetKind::Script);
                assert!(message.contains("exited with 1"));
                assert!(message.contains("Expected"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
