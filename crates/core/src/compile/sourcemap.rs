use serde_json::Value;

use crate::error::Result;

/// Offset a source map by `lines` generated lines, for code prepended to the
/// mapped output (banner, module wrapper).
pub(crate) fn shift_source_map(map: &str, lines: usize) -> Result<String> {
    let mut value: Value = serde_json::from_str(map)?;
    if let Some(Value::String(mappings)) = value.get_mut("mappings") {
        *mappings = format!("{}{}", ";".repeat(lines), mappings);
    }
    Ok(serde_json::to_string(&value)?)
}

/// Drop `sourceMappingURL` comments (`//# ...` and `/*# ... */`).
pub(crate) fn strip_source_mapping_url(code: &str) -> String {
    code.lines()
        .filter(|line| {
            let line = line.trim_start();
            !(line.starts_with("//# sourceMappingURL=") || line.starts_with("/*# sourceMappingURL="))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_prepends_empty_lines() {
        let map = r#"{"version":3,"sources":["src/index.ts"],"mappings":"AAAA,IAAM"}"#;
        let shifted: Value = serde_json::from_str(&shift_source_map(map, 3).unwrap()).unwrap();
        assert_eq!(shifted["mappings"], ";;;AAAA,IAAM");
        assert_eq!(shifted["sources"][0], "src/index.ts");
    }

    #[test]
    fn test_strip_mapping_comments() {
        let code = "var a = 1;\n//# sourceMappingURL=demo.js.map\n";
        assert_eq!(strip_source_mapping_url(code), "var a = 1;");
    }
}
