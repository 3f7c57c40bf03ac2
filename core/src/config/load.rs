use std::path::Path;

use super::types::ExecutorConfig;

pub const CONFIG_ENV: &str = "FETCHGATE_CONFIG";
pub const LOCAL_CONFIG_FILE: &str = "fetchgate.toml";

/// Parse and validate a TOML config file.
pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<ExecutorConfig> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path)?;
    let cfg = toml::from_str::<ExecutorConfig>(&s)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_default() -> anyhow::Result<ExecutorConfig> {
    // Priority 1: file named by FETCHGATE_CONFIG
    // Priority 2: ./fetchgate.toml
    let mut cfg = match std::env::var(CONFIG_ENV) {
        Ok(p) if !p.trim().is_empty() => load_from_path(p.trim())?,
        _ if Path::new(LOCAL_CONFIG_FILE).exists() => load_from_path(LOCAL_CONFIG_FILE)?,
        _ => ExecutorConfig::default(),
    };

    // Environment variable overrides (Priority 0: highest)
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    cfg.validate()?;

    Ok(cfg)
}

fn apply_env_overrides<F>(cfg: &mut ExecutorConfig, get: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("FETCHGATE_MAX_CONCURRENCY") {
        cfg.async_exec.max_concurrency = v.trim().parse()?;
    }
    if let Some(v) = get("FETCHGATE_DEFAULT_TIMEOUT_MS") {
        cfg.timeout.default_timeout_ms = v.trim().parse()?;
    }
    if let Some(v) = get("FETCHGATE_CACHE_ENABLED") {
        cfg.cache.enabled = v.trim().eq_ignore_ascii_case("true") || v.trim() == "1";
    }
    Ok(())
}
