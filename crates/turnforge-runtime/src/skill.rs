// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Skill discovery: `*.md` files with a `name:` front-matter field, scanned
//! across an ordered list of base paths with later paths overriding earlier
//! ones on name collision (project skills shadow global ones).
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::frontmatter;

#[derive(Debug, Clone)]
pub struct SkillDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub content: String,
    pub source_path: PathBuf,
}

#[derive(Debug, Deserialize, Default)]
struct SkillFrontMatter {
    name: Option<String>,
    description: Option<String>,
}

/// Scans each base path (in order) for `*.md` files and returns the
/// discovered skills keyed by name. A later base path's skill of the same
/// name replaces an earlier one.
pub fn discover_skills(base_paths: &[PathBuf]) -> HashMap<String, SkillDescriptor> {
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
            let Ok(text) = std::fs::read_to_string(&path) else {
                continue;
            };
            let (yaml, body) = frontmatter::split(&text);
            let front: SkillFrontMatter = yaml
                .and_then(|y| serde_yaml::from_str(y).ok())
                .unwrap_or_default();
            let name = front.name.unwrap_or_else(|| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("skill")
                    .to_string()
            });
            found.insert(
                name.clone(),
                SkillDescriptor {
                    name,
                    description: front.description,
                    content: body.to_string(),
                    source_path: path,
                },
            );
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn discovers_named_skill_from_front_matter() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.md",
            "---\nname: review\ndescription: code review\n---\nDo a review.\n",
        );
        let skills = discover_skills(&[dir.path().to_path_buf()]);
        let s = skills.get("review").expect("skill present");
        assert_eq!(s.description.as_deref(), Some("code review"));
        assert_eq!(s.content, "Do a review.\n");
    }

    #[test]
    fn falls_back_to_file_stem_when_name_absent() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "triage.md", "No front matter here.\n");
        let skills = discover_skills(&[dir.path().to_path_buf()]);
        assert!(skills.contains_key("triage"));
    }

    #[test]
    fn later_base_path_overrides_earlier_same_name() {
        let global = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        write(global.path(), "review.md", "---\nname: review\n---\nglobal version\n");
        write(project.path(), "review.md", "---\nname: review\n---\nproject version\n");
        let skills = discover_skills(&[
            global.path().to_path_buf(),
            project.path().to_path_buf(),
        ]);
        assert_eq!(skills.get("review").unwrap().content, "project version\n");
    }

    #[test]
    fn missing_base_path_is_skipped_not_an_error() {
        let skills = discover_skills(&[PathBuf::from("/no/such/path/anywhere")]);
        assert!(skills.is_empty());
    }
}
