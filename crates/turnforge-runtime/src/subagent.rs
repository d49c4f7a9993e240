// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Subagent discovery (§4.3): `*.md` files with YAML front-matter, scanned
//! across an ordered list of base paths. A subagent found under a later
//! path replaces one of the same name found under an earlier path, so
//! project-local subagents shadow global ones.
use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::RuntimeError;
use crate::frontmatter;

fn default_model() -> String {
    "inherit".to_string()
}

fn default_permission_mode() -> String {
    "default".to_string()
}

#[derive(Debug, Clone)]
pub struct SubagentSpec {
    pub name: String,
    pub prompt: String,
    pub model: String,
    pub mcp_servers: Vec<String>,
    pub memory: Option<String>,
    pub permission_mode: String,
    pub max_turns: Option<u32>,
    pub hooks: HashMap<String, Vec<serde_json::Value>>,
    pub source_path: PathBuf,
}

#[derive(Debug, Deserialize, Default)]
struct RawFrontMatter {
    name: Option<String>,
    model: Option<String>,
    #[serde(default)]
    mcp_servers: Vec<serde_yaml::Value>,
    memory: Option<String>,
    permission_mode: Option<String>,
    #[serde(default)]
    max_turns: serde_yaml::Value,
    #[serde(default)]
    hooks: HashMap<String, Vec<serde_yaml::Value>>,
}

fn normalize_mcp_servers(raw: Vec<serde_yaml::Value>) -> Vec<String> {
    raw.into_iter()
        .filter_map(|v| match v {
            serde_yaml::Value::String(s) => Some(s),
            serde_yaml::Value::Mapping(m) => m
                .into_iter()
                .next()
                .and_then(|(k, _)| k.as_str().map(str::to_string)),
            _ => None,
        })
        .collect()
}

fn normalize_max_turns(raw: &serde_yaml::Value) -> Result<Option<u32>, RuntimeError> {
    match raw {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::Number(n) => {
            let Some(i) = n.as_i64() else {
                return Err(RuntimeError::Validation(
                    "max_turns must be a positive integer or null".into(),
                ));
            };
            if i <= 0 {
                return Err(RuntimeError::Validation(
                    "max_turns must be a positive integer or null".into(),
                ));
            }
            Ok(Some(i as u32))
        }
        _ => Err(RuntimeError::Validation(
            "max_turns must be a positive integer or null".into(),
        )),
    }
}

fn normalize_hooks(
    raw: HashMap<String, Vec<serde_yaml::Value>>,
) -> HashMap<String, Vec<serde_json::Value>> {
    raw.into_iter()
        .map(|(event, entries)| {
            let entries = entries
                .into_iter()
                .filter_map(|v| serde_json::to_value(v).ok())
                .collect();
            (event, entries)
        })
        .collect()
}

fn parse_one(path: &std::path::Path) -> Result<SubagentSpec, RuntimeError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| RuntimeError::Validation(format!("cannot read {}: {e}", path.display())))?;
    let (yaml, body) = frontmatter::split(&text);
    let front: RawFrontMatter = match yaml {
        Some(y) => serde_yaml::from_str(y).map_err(|e| {
            RuntimeError::Validation(format!("invalid front matter in {}: {e}", path.display()))
        })?,
        None => RawFrontMatter::default(),
    };

    let name = front.name.unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("subagent")
            .to_string()
    });

    Ok(SubagentSpec {
        name,
        prompt: body.to_string(),
        model: front.model.unwrap_or_else(default_model),
        mcp_servers: normalize_mcp_servers(front.mcp_servers),
        memory: front.memory,
        permission_mode: front.permission_mode.unwrap_or_else(default_permission_mode),
        max_turns: normalize_max_turns(&front.max_turns)?,
        hooks: normalize_hooks(front.hooks),
        source_path: path.to_path_buf(),
    })
}

/// Scans each base path (in order) for `*.md` files and returns the
/// discovered subagents keyed by name, with later paths winning collisions.
pub fn discover_subagents(
    base_paths: &[PathBuf],
) -> Result<HashMap<String, SubagentSpec>, RuntimeError> {
    let mut found = HashMap::new();
    for base in base_paths {
        let Ok(entries) = std::fs::read_dir(base) else {
            continue;
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
            .collect();
        paths.sort();

        for path in paths {
            let spec = parse_one(&path)?;
            found.insert(spec.name.clone(), spec);
        }
    }
    Ok(found)
}
