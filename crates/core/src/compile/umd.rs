//! Universal module wrapper for the self-executing bundle
//!
//! The bundler emits an IIFE assigning the module to [`MODULE_SYMBOL`]; the
//! wrapper hands it to an AMD loader, a CommonJS `module.exports`, or a global,
//! whichever the host provides. External dependencies are threaded through all
//! three branches and exposed to the bundle through a local `require`.

use indexmap::IndexMap;

/// Global name the bundler is told to assign the module to
pub(crate) const MODULE_SYMBOL: &str = "__wpbuild_module";

pub(crate) struct Wrapped {
    pub code: String,
    /// Lines inserted before the bundle body
    pub prefix_lines: usize,
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

/// `wp.element` -> `root["wp"]["element"]`
fn global_access(path: &str) -> String {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .fold(String::from("root"), |acc, segment| {
            format!("{acc}[{}]", js_string(segment))
        })
}

pub(crate) fn wrap(body: &str, global_name: &str, externals: &IndexMap<String, String>) -> Wrapped {
    let ids: Vec<String> = externals.keys().map(|id| js_string(id)).collect();
    let params: Vec<String> = (0..externals.len())
        .map(|i| format!("__wpbuild_dep{i}"))
        .collect();

    let amd_deps = ids.join(", ");
    let cjs_args = ids
        .iter()
        .map(|id| format!("require({id})"))
        .collect::<Vec<_>>()
        .join(", ");
    let global_args = externals
        .values()
        .map(|global| global_access(global))
        .collect::<Vec<_>>()
        .join(", ");

    let mut prefix = String::new();
    prefix.push_str(&format!(
        "(function (root, factory) {{ if (typeof define === 'function' && define.amd) {{ define([{amd_deps}], factory); }}\n"
    ));
    prefix.push_str(&format!(
        "  else if (typeof module === 'object' && module.exports) {{ module.exports = factory({cjs_args}); }}\n"
    ));
    prefix.push_str(&format!(
        "  else {{ root[{}] = factory({global_args}); }}\n",
        js_string(global_name)
    ));
    prefix.push_str(&format!(
        "}}(typeof globalThis !== 'undefined' ? globalThis : typeof self !== 'undefined' ? self : this, function ({}) {{\n",
        params.join(", ")
    ));
    if !externals.is_empty() {
        let table = ids
            .iter()
            .zip(&params)
            .map(|(id, param)| format!("{id}: {param}"))
            .collect::<Vec<_>>()
            .join(", ");
        prefix.push_str(&format!(
            "var require = function (id) {{ return ({{ {table} }})[id]; }};\n"
        ));
    }

    let prefix_lines = prefix.matches('\n').count();

    let mut code = prefix;
    code.push_str(body.trim_end());
    code.push('\n');
    code.push_str(&format!(
        "return {m} && {m}.__esModule && Object.keys({m}).length === 1 && \"default\" in {m} ? {m}[\"default\"] : {m};\n",
        m = MODULE_SYMBOL
    ));
    code.push_str("}));\n");

    Wrapped { code, prefix_lines }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapper_without_externals() {
        let body = "var __wpbuild_module=(()=>{return {default:\"hello\"}})();";
        let wrapped = wrap(body, "MyLib", &IndexMap::new());

        let first = wrapped.code.lines().next().unwrap();
        assert!(first.contains("typeof define === 'function' && define.amd"));
        assert!(wrapped.code.contains("define([], factory)"));
        assert!(wrapped.code.contains("root[\"MyLib\"] = factory()"));
        assert!(!wrapped.code.contains("var require"));
        assert_eq!(wrapped.prefix_lines, 4);
        assert_eq!(wrapped.code.lines().nth(4), Some(body));
    }

    #[test]
    fn test_externals_threaded_through_every_branch() {
        let mut externals = IndexMap::new();
        externals.insert("react".to_string(), "React".to_string());
        externals.insert("@wordpress/element".to_string(), "wp.element".to_string());

        let wrapped = wrap("var __wpbuild_module = {};", "Demo", &externals);

        assert!(wrapped.code.contains("define([\"react\", \"@wordpress/element\"], factory)"));
        assert!(wrapped.code.contains(
            "module.exports = factory(require(\"react\"), require(\"@wordpress/element\"))"
        ));
        assert!(wrapped.code.contains("factory(root[\"React\"], root[\"wp\"][\"element\"])"));
        assert!(wrapped.code.contains("function (__wpbuild_dep0, __wpbuild_dep1) {"));
        assert!(wrapped.code.contains(
            "({ \"react\": __wpbuild_dep0, \"@wordpress/element\": __wpbuild_dep1 })[id]"
        ));
        assert_eq!(wrapped.prefix_lines, 5);
    }
}
