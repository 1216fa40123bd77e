//! Ambient system concerns that don't belong in any pure or
//! stateful-core crate: configuration, logging setup, and loading a
//! standing rule set from a KIF rules file at startup.

use std::fs;
use std::path::Path;

use reasoner_context::Context;
use serde::Deserialize;

fn default_port() -> u16 {
    8787
}

fn default_kb_size() -> usize {
    10_000
}

/// Everything the binary needs to stand up a reasoner instance.
/// Deserialized from TOML; every field but `rules_file`/`llm_url`/
/// `llm_model` has a sensible default, so a near-empty config file is
/// valid.
#[derive(Debug, Clone, Deserialize)]
pub struct ReasonerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_kb_size")]
    pub max_kb_size: usize,
    pub rules_file: Option<String>,
    pub llm_url: Option<String>,
    pub llm_model: Option<String>,
    /// If true, every accepted `ExternalInput` is also broadcast back out
    /// over the pattern-subscription surface, for UIs that want a live
    /// feed of everything entering the system.
    #[serde(default)]
    pub broadcast_input: bool,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        ReasonerConfig {
            port: default_port(),
            max_kb_size: default_kb_size(),
            rules_file: None,
            llm_url: None,
            llm_model: None,
            broadcast_input: false,
        }
    }
}

impl ReasonerConfig {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Installs an `env_logger` subscriber, defaulting to `info` when
/// `RUST_LOG` isn't set.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Parses `(=> antecedent consequent)` / `(<=> antecedent consequent)`
/// forms out of `text` and installs one rule per form into `ctx`. Any
/// other top-level form, or a rule form with the wrong arity, is logged
/// and skipped rather than aborting the whole load.
pub fn load_rules(ctx: &Context, text: &str) -> anyhow::Result<usize> {
    let terms = reasoner_parser::parse(text)?;
    let mut installed = 0;
    for term in terms {
        match term.operator() {
            Some("=>") | Some("<=>") => {
                let children = term.children().unwrap();
                if children.len() == 3 {
                    ctx.add_rule(children[1].clone(), children[2].clone(), 1.0);
                    installed += 1;
                } else {
                    log::warn!("ignoring malformed rule form: {term}");
                }
            }
            _ => log::warn!("ignoring non-rule form in rules file: {term}"),
        }
    }
    Ok(installed)
}
