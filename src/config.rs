use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::collector::DEFAULT_MAX_CONCURRENCY;
use crate::parsing::parse_bool_flag;
use crate::types::Config;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;
pub const DEFAULT_OUTPUT_PATH: &str = "./results.csv";

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Production implementation using std::env
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    let aws_profile = non_empty(env.get_var("AWS_PROFILE"));
    let aws_region = non_empty(env.get_var("AWS_REGION"));

    let max_concurrency: usize = match env.get_var("MAX_CONCURRENCY") {
        Some(v) => v.trim().parse().context("Invalid MAX_CONCURRENCY")?,
        None => DEFAULT_MAX_CONCURRENCY,
    };
    if max_concurrency == 0 {
        return Err(anyhow!("MAX_CONCURRENCY must be at least 1"));
    }

    let max_attempts: u32 = env
        .get_var("AWS_MAX_ATTEMPTS")
        .and_then(|v| v.trim().parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_ATTEMPTS);

    let output_path = non_empty(env.get_var("OUTPUT_PATH"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH));

    let collect_elasticache = env
        .get_var("COLLECT_ELASTICACHE")
        .map(|v| parse_bool_flag(&v))
        .unwrap_or(true);
    let collect_dynamodb = env
        .get_var("COLLECT_DYNAMODB")
        .map(|v| parse_bool_flag(&v))
        .unwrap_or(true);
    if !collect_elasticache && !collect_dynamodb {
        return Err(anyhow!(
            "COLLECT_ELASTICACHE and COLLECT_DYNAMODB are both disabled, nothing to collect"
        ));
    }

    Ok(Config {
        aws_profile,
        aws_region,
        max_concurrency,
        max_attempts,
        output_path,
        collect_elasticache,
        collect_dynamodb,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
