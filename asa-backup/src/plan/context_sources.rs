//! Where each security context keeps its startup configuration.

use crate::transport::Session;
use crate::utils::TransportError;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

static CONFIG_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*config-url\s+(\S+)").unwrap());

/// A context together with the file its `config-url` points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSource {
    pub context: String,
    pub source: String,
}

pub fn config_url_query(context: &str) -> String {
    format!("show run context {} | include config-url", context)
}

pub fn parse_config_url(output: &str) -> Option<String> {
    CONFIG_URL.captures(output).map(|caps| caps[1].to_string())
}

/// Look up the config-url of every context, in order.
///
/// Contexts whose lookup does not match are left out; their config copy is
/// skipped for this run.
pub fn resolve_context_sources<S: Session + ?Sized>(
    session: &mut S,
    contexts: &[String],
) -> Result<Vec<ContextSource>, TransportError> {
    let mut sources = Vec::with_capacity(contexts.len());

    for context in contexts {
        let output = session.send(&config_url_query(context))?;
        match parse_config_url(&output) {
            Some(source) => sources.push(ContextSource {
                context: context.clone(),
                source,
            }),
            None => {
                warn!(context = %context, "No config-url found, skipping context config copy");
            }
        }
    }

    Ok(sources)
}
