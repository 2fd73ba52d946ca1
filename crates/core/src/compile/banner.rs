use crate::config::ResolvedConfig;

/// Comment banner prepended to bundles and stylesheets.
///
/// `/*!` keeps the comment through minification in both esbuild and sass.
pub fn banner(config: &ResolvedConfig) -> String {
    let mut lines = vec![format!("{} v{}", config.name, config.version)];
    lines.extend(config.description.iter().cloned());
    lines.extend(config.homepage.iter().cloned());
    lines.push(config.copyright.clone());
    if let Some(license) = &config.license {
        lines.push(format!("Licensed under {license}"));
    }

    let mut out = String::from("/*!\n");
    for line in lines.iter().filter(|l| !l.trim().is_empty()) {
        out.push_str(" * ");
        out.push_str(line.trim());
        out.push('\n');
    }
    out.push_str(" */\n");
    out
}

/// Number of lines [`banner`] occupies
pub(crate) fn line_count(banner: &str) -> usize {
    banner.lines().count()
}
