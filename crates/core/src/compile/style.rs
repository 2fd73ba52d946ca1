use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::ResolvedConfig;
use crate::error::Result;
use crate::fsutil::{copy_if_changed, write_atomic};
use crate::paths::Paths;

use super::banner::{banner, line_count};
use super::sourcemap::shift_source_map;
use super::{OutputStyle, StyleEngine, StyleRequest};

const BOM: char = '\u{feff}';

pub struct StyleCompiler<S> {
    engine: S,
}

impl<S: StyleEngine> StyleCompiler<S> {
    pub fn new(engine: S) -> Self {
        Self { engine }
    }

    /// Compile the stylesheet entry. The direct library CSS is written first
    /// and every other copy is taken from it. Returns the direct path.
    pub async fn compile(&self, config: &ResolvedConfig, is_dev: bool) -> Result<PathBuf> {
        let paths = Paths::new(config, is_dev);
        let node_modules = config.root.join("node_modules");
        let request = StyleRequest {
            entry: config.paths.styles.clone(),
            style: OutputStyle::for_build(is_dev),
            source_map: is_dev,
            load_paths: node_modules
                .is_dir()
                .then_some(node_modules)
                .into_iter()
                .collect(),
        };

        let output = self.engine.compile(&request).await?;

        let header = banner(config);
        let body = output.css.strip_prefix(BOM).unwrap_or(&output.css);
        let mut css = format!("{header}{}\n", body.trim_end());

        let direct = paths.css_path();
        let direct_map = direct.with_extension("css.map");
        if let (true, Some(map)) = (is_dev, output.source_map.as_deref()) {
            write_atomic(&direct_map, shift_source_map(map, line_count(&header))?.as_bytes())?;
            css.push_str(&format!("/*# sourceMappingURL={}.css.map */\n", config.file_name));
        }
        write_atomic(&direct, css.as_bytes())?;
        debug!("Wrote {:?}", direct);

        for copy in paths.css_copies() {
            if copy_if_changed(&direct, &copy)? {
                debug!("Copied stylesheet to {:?}", copy);
            }
        }

        info!("Compiled styles: {}", direct.display());
        Ok(direct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::AssetKind;
    use crate::error::Error;
    use crate::testing::{FakeStyleEngine, sample_config};
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_bom_stripped_and_banner_prepended() {
        let temp = TempDir::new().unwrap();
        let config = sample_config(temp.path());
        let compiler = StyleCompiler::new(FakeStyleEngine::producing("\u{feff}body{color:red}"));

        let direct = compiler.compile(&config, false).await.unwrap();

        let css = fs::read_to_string(&direct).unwrap();
        assert!(css.starts_with("/*!\n * demo v1.2.3\n"));
        assert!(!css.contains('\u{feff}'));
        assert!(css.contains("body{color:red}"));
        assert!(!css.contains("sourceMappingURL"));
    }

    #[tokio::test]
    async fn test_production_copies_are_byte_identical() {
        let temp = TempDir::new().unwrap();
        let config = sample_config(temp.path());
        let compiler = StyleCompiler::new(FakeStyleEngine::producing("a{b:c}"));

        let direct = compiler.compile(&config, false).await.unwrap();

        let dist_copy = config.paths.dist.join("demo.css");
        assert_eq!(fs::read(&direct).unwrap(), fs::read(&dist_copy).unwrap());
    }

    #[tokio::test]
    async fn test_development_writes_map_without_dist_copy() {
        let temp = TempDir::new().unwrap();
        let config = sample_config(temp.path());
        let compiler = StyleCompiler::new(
            FakeStyleEngine::producing("a{b:c}").with_map(r#"{"version":3,"mappings":"AAAA"}"#),
        );

        let direct = compiler.compile(&config, true).await.unwrap();

        let css = fs::read_to_string(&direct).unwrap();
        assert!(css.trim_end().ends_with("/*# sourceMappingURL=demo.css.map */"));
        let map = fs::read_to_string(direct.with_extension("css.map")).unwrap();
        assert!(map.contains(r#""mappings":";;;;AAAA""#));
        assert!(!config.paths.dist.join("demo.css").exists());
    }

    #[tokio::test]
    async fn test_failure_leaves_previous_css() {
        let temp = TempDir::new().unwrap();
        let config = sample_config(temp.path());
        let direct = StyleCompiler::new(FakeStyleEngine::producing("a{b:c}"))
            .compile(&config, false)
            .await
            .unwrap();
        let before = fs::read_to_string(&direct).unwrap();

        let err = StyleCompiler::new(FakeStyleEngine::failing("Undefined variable $brand"))
            .compile(&config, false)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Compile { kind: AssetKind::Style, .. }));
        assert_eq!(fs::read_to_string(&direct).unwrap(), before);
    }
}
