// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static CONFIG: OnceLock<NovaRocksConfig> = OnceLock::new();

fn default_log_level() -> String {
    "info".to_string()
}

pub fn init_from_path(path: impl AsRef<Path>) -> Result<&'static NovaRocksConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let cfg = NovaRocksConfig::load_from_file(path.as_ref())?;
    Ok(CONFIG.get_or_init(|| cfg))
}

pub fn init_from_env_or_default() -> Result<&'static NovaRocksConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let path = config_path_from_env_or_default()?;
    let cfg = NovaRocksConfig::load_from_file(&path)?;
    Ok(CONFIG.get_or_init(|| cfg))
}

pub fn config() -> Result<&'static NovaRocksConfig> {
    init_from_env_or_default()
}

fn config_path_from_env_or_default() -> Result<PathBuf> {
    if let Ok(p) = std::env::var("NOVAROCKS_CONFIG")
        && !p.trim().is_empty()
    {
        return Ok(PathBuf::from(p));
    }

    let candidate = PathBuf::from("novarocks.toml");
    if candidate.exists() {
        return Ok(candidate);
    }

    Err(anyhow!(
        "missing config file: set $NOVAROCKS_CONFIG or create ./novarocks.toml"
    ))
}

#[derive(Clone, Debug, Deserialize)]
pub struct NovaRocksConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional full tracing EnvFilter expression.
    /// If set, this takes precedence over `log_level`.
    /// Example: "novarocks_setop=debug"
    #[serde(default)]
    pub log_filter: Option<String>,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub setop: SetOpConfig,
}

impl NovaRocksConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        let cfg: NovaRocksConfig =
            toml::from_str(&s).with_context(|| format!("parse toml: {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("validate config: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.runtime.chunk_size == 0 {
            return Err(anyhow!("runtime.chunk_size must be positive"));
        }
        if self.setop.mem_pool_initial_chunk_bytes == 0 {
            return Err(anyhow!("setop.mem_pool_initial_chunk_bytes must be positive"));
        }
        if self.setop.mem_pool_max_chunk_bytes < self.setop.mem_pool_initial_chunk_bytes {
            return Err(anyhow!(
                "setop.mem_pool_max_chunk_bytes ({}) is smaller than mem_pool_initial_chunk_bytes ({})",
                self.setop.mem_pool_max_chunk_bytes,
                self.setop.mem_pool_initial_chunk_bytes
            ));
        }
        Ok(())
    }

    /// EnvFilter expression used to initialize logging.
    pub fn effective_log_filter(&self) -> &str {
        match self.log_filter.as_deref() {
            Some(filter) if !filter.trim().is_empty() => filter,
            _ => &self.log_level,
        }
    }
}

impl Default for NovaRocksConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_filter: None,
            runtime: RuntimeConfig::default(),
            setop: SetOpConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    /// Rows per chunk, aligned with StarRocks `vector_chunk_size`.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    4096
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SetOpConfig {
    #[serde(default = "default_hash_set_initial_capacity")]
    pub hash_set_initial_capacity: usize,
    #[serde(default = "default_mem_pool_initial_chunk_bytes")]
    pub mem_pool_initial_chunk_bytes: usize,
    #[serde(default = "default_mem_pool_max_chunk_bytes")]
    pub mem_pool_max_chunk_bytes: usize,
}

fn default_hash_set_initial_capacity() -> usize {
    1024
}

fn default_mem_pool_initial_chunk_bytes() -> usize {
    4 * 1024
}

fn default_mem_pool_max_chunk_bytes() -> usize {
    512 * 1024
}

impl Default for SetOpConfig {
    fn default() -> Self {
        Self {
            hash_set_initial_capacity: default_hash_set_initial_capacity(),
            mem_pool_initial_chunk_bytes: default_mem_pool_initial_chunk_bytes(),
            mem_pool_max_chunk_bytes: default_mem_pool_max_chunk_bytes(),
        }
    }
}
