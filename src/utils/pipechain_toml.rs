//! Load `pipechain.toml` for the demo CLI. The library never reads it; callers build stages in code.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::utils::config::{DemoDefaults, PackagePaths};
use crate::engine::opts::{RunOpts, StageOpts};

#[derive(Debug, Default, Deserialize)]
pub struct PipechainToml {
    #[serde(default)]
    settings: RunSection,
    #[serde(default)]
    stages: Vec<StageSection>,
}

#[derive(Debug, Default, Deserialize)]
struct RunSection {
    items: Option<u64>,
    json: Option<bool>,
    verbose: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct StageSection {
    name: Option<String>,
    workers: Option<usize>,
    retries: Option<u32>,
    fail_every: Option<u64>,
    delay_ms: Option<u64>,
}

impl PipechainToml {
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// Parse a config file given explicitly (`--config` or env var). Missing or invalid file is an error.
pub fn load_pipechain_toml(path: &Path) -> Result<PipechainToml> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    parse_pipechain_toml(&s).with_context(|| format!("parse config file {}", path.display()))
}

pub fn parse_pipechain_toml(s: &str) -> Result<PipechainToml> {
    Ok(toml::from_str(s)?)
}

/// Load `pipechain.toml` from `dir` if present. Returns `Ok(None)` if missing; an invalid file is an error.
pub fn find_pipechain_toml(dir: &Path) -> Result<Option<PipechainToml>> {
    let path = dir.join(PackagePaths::get().config_filename());
    if !path.is_file() {
        return Ok(None);
    }
    load_pipechain_toml(&path).map(Some)
}

/// `[settings] verbose` from the file, if set. Read before logging is initialized.
pub fn file_verbose(file: &PipechainToml) -> Option<bool> {
    file.settings.verbose
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($section:expr, $opts:expr, $field:ident => $opts_field:ident) => {
        if let Some(v) = $section.$field {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI flags.
/// A non-empty `[[stages]]` list replaces the default stages.
pub fn apply_file_to_opts(file: &PipechainToml, opts: &mut RunOpts) {
    let run = &file.settings;
    apply_file_opt!(run, opts, items => items);
    apply_file_opt!(run, opts, json => json);
    apply_file_opt!(run, opts, verbose => verbose);

    if file.stages.is_empty() {
        return;
    }
    opts.stages = file
        .stages
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mut stage = StageOpts::numbered(i, DemoDefaults::WORKERS);
            if let Some(ref name) = s.name {
                stage.name = name.clone();
            }
            apply_file_opt!(s, stage, workers => workers);
            apply_file_opt!(s, stage, retries => retries);
            stage.fail_every = s.fail_every.or(stage.fail_every);
            apply_file_opt!(s, stage, delay_ms => delay_ms);
            stage
        })
        .collect();
}
