// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Policy loading and enforcement: the rules/agents markdown pair plus the
//! skill directory that together gate which provider, model and skills a
//! turn may use.
use std::collections::HashSet;
use std::path::Path;

use crate::error::RuntimeError;
use crate::skill;

/// Shown in place of a summary when the underlying source file is missing or
/// empty.
const NO_SOURCE_SUMMARY: &str = "파일이 없어요.";

/// A loaded, read-only view of the workspace's policy sources.
#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    pub rules_text: String,
    pub rules_summary: String,
    pub agents_text: String,
    pub agents_summary: String,
    pub skills_summary: String,
    pub available_skills: Vec<String>,
    /// Memory summary before any subagent overlay appends to it (§4.9 step 4).
    pub system_memory_summary: String,
}

pub struct PolicyLoader;

impl PolicyLoader {
    /// Reads `rules_path` and `agents_path` (either may be absent) and
    /// discovers skills under `skills_dir`. Never fails: missing or
    /// unreadable sources simply yield an empty summary.
    pub fn load(rules_path: &Path, agents_path: &Path, skills_dir: &Path) -> PolicySnapshot {
        let rules_text = std::fs::read_to_string(rules_path).unwrap_or_default();
        let agents_text = std::fs::read_to_string(agents_path).unwrap_or_default();

        let mut available_skills: Vec<String> = skill::discover_skills(&[skills_dir.to_path_buf()])
            .into_values()
            .map(|s| s.name)
            .collect();
        available_skills.sort();
        available_skills.dedup();

        let skills_summary = if available_skills.is_empty() {
            NO_SOURCE_SUMMARY.to_string()
        } else {
            available_skills.join(", ")
        };

        PolicySnapshot {
            rules_summary: first_nonempty_line(&rules_text),
            rules_text,
            agents_summary: first_nonempty_line(&agents_text),
            agents_text,
            skills_summary,
            available_skills,
            system_memory_summary: NO_SOURCE_SUMMARY.to_string(),
        }
    }
}

pub fn first_nonempty_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| NO_SOURCE_SUMMARY.to_string())
}

/// Allow/deny sets and required skills scraped out of `rules_text`'s
/// `key: value, value` lines.
#[derive(Debug, Clone, Default)]
pub struct PolicyConstraints {
    pub allow_providers: HashSet<String>,
    pub deny_providers: HashSet<String>,
    pub allow_models: HashSet<String>,
    pub deny_models: HashSet<String>,
    pub required_skills: HashSet<String>,
}

pub fn parse_policy_constraints(text: &str) -> PolicyConstraints {
    let mut constraints = PolicyConstraints::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let values: HashSet<String> = value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        if values.is_empty() {
            continue;
        }
        match key.trim() {
            "allow_providers" => constraints.allow_providers.extend(values),
            "deny_providers" => constraints.deny_providers.extend(values),
            "allow_models" => constraints.allow_models.extend(values),
            "deny_models" => constraints.deny_models.extend(values),
            "required_skills" => constraints.required_skills.extend(values),
            _ => {}
        }
    }
    constraints
}

/// Enforces `constraints` against a chosen `provider`/`model` and the
/// skills available in this session. Returns a `Validation` error naming
/// the first violation found.
pub fn enforce(
    provider: &str,
    model: &str,
    constraints: &PolicyConstraints,
    available_skills: &[String],
) -> Result<(), RuntimeError> {
    if !constraints.allow_providers.is_empty() && !constraints.allow_providers.contains(provider) {
        return Err(RuntimeError::Validation(format!(
            "provider '{provider}' is not in the allowed set"
        )));
    }
    if constraints.deny_providers.contains(provider) {
        return Err(RuntimeError::Validation(format!(
            "provider '{provider}' is denied by policy"
        )));
    }
    if !constraints.allow_models.is_empty() && !constraints.allow_models.contains(model) {
        return Err(RuntimeError::Validation(format!(
            "model '{model}' is not in the allowed set"
        )));
    }
    if constraints.deny_models.contains(model) {
        return Err(RuntimeError::Validation(format!(
            "model '{model}' is denied by policy"
        )));
    }
    let available: HashSet<&str> = available_skills.iter().map(String::as_str).collect();
    let missing: Vec<&str> = constraints
        .required_skills
        .iter()
        .map(String::as_str)
        .filter(|s| !available.contains(s))
        .collect();
    if !missing.is_empty() {
        return Err(RuntimeError::Validation(format!(
            "required skill(s) not available: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

/// Defaults parsed out of the agents markdown source's `key: value` lines.
#[derive(Debug, Clone, Default)]
pub struct AgentDefaults {
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
    pub default_mcp_enabled: Option<bool>,
    pub default_mcp_profile: Option<String>,
}

pub fn extract_agent_defaults(agents_text: &str) -> AgentDefaults {
    let mut defaults = AgentDefaults::default();
    for line in agents_text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "default_provider" => defaults.default_provider = Some(value.to_string()),
            "default_model" => defaults.default_model = Some(value.to_string()),
            "default_mcp_enabled" => {
                defaults.default_mcp_enabled = parse_bool(value);
            }
            "default_mcp_profile" => defaults.default_mcp_profile = Some(value.to_string()),
            _ => {}
        }
    }
    defaults
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
