//! Shared project fixture for the end-to-end tests
#![allow(dead_code)]

use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use wpbuild_core::Toolchain;
use wpbuild_core::testing::{FakeBundler, FakeCatalogGenerator, FakeStyleEngine};

pub const POT: &str = "msgid \"\"\nmsgstr \"\"\n\"Content-Type: text/plain; charset=UTF-8\\n\"\n\n#: includes/admin.php:4\nmsgid \"Settings\"\nmsgstr \"\"\n";

pub fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

/// A plugin project with a base definition and both canonical overlays
pub fn create_project(root: &Path) {
    write_json(
        &root.join("wpbuild.json"),
        &json!({
            "name": "github-downloads",
            "entry": "./src/index.js",
            "paths": {
                "dist": "./dist",
                "php": "./wordpress-plugin/includes",
                "styles": "./src/styles/main.scss",
                "wordpressPlugin": "./wordpress-plugin",
                "libraryAssets": "./wordpress-plugin/assets/lib"
            },
            "plugin": {
                "packageName": "github-downloads",
                "headers": { "Description": "Downloads for {{name}}" }
            },
            "build": { "formats": ["iife", "cjs"] },
            "sync": { "exclude": ["*.log"] }
        }),
    );
    write_json(
        &root.join("wpbuild.production.json"),
        &json!({ "build": { "minify": true } }),
    );
    write_json(
        &root.join("wpbuild.development.json"),
        &json!({ "build": { "sourcemap": true }, "features": { "liveReload": false } }),
    );
    write_json(
        &root.join("package.json"),
        &json!({ "version": "2.4.0", "author": { "name": "Jane Doe" } }),
    );

    let plugin = root.join("wordpress-plugin");
    fs::create_dir_all(plugin.join("includes")).unwrap();
    fs::create_dir_all(root.join("src/styles")).unwrap();
    fs::write(root.join("src/index.js"), "export default 'hi';").unwrap();
    fs::write(root.join("src/styles/main.scss"), "body { margin: 0 }").unwrap();
    fs::write(
        plugin.join("github-downloads.php"),
        "<?php\n/**\n * Plugin Name: GitHub Downloads\n * Version: 0.0.1\n */\n",
    )
    .unwrap();
    fs::write(plugin.join("includes/admin.php"), "<?php // admin").unwrap();
    fs::write(plugin.join("includes/debug.log"), "noise").unwrap();
}

pub fn fake_toolchain(bundler: FakeBundler) -> Toolchain {
    Toolchain {
        bundler: Arc::new(bundler),
        styles: Arc::new(FakeStyleEngine::producing("body{margin:0}")),
        catalogs: Arc::new(FakeCatalogGenerator::writing(POT)),
    }
}
