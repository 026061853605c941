//! Engine settings from the environment (`MDE_*`), with defaults for everything.

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Settings {
    /// Prefix of the metadata tables managed by `SysTableStore` (e.g. `_sys_md_models`).
    pub sys_prefix: String,
    /// Pool size for every datasource opened by the registry.
    pub max_connections: u32,
    /// Statements slower than this are logged at warn level.
    pub slow_query: Duration,
    /// Ceiling on rows fetched by `TreeService::get_tree`. Not a pagination boundary.
    pub tree_page_size: u64,
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            sys_prefix: "_sys_md".into(),
            max_connections: 5,
            slow_query: Duration::from_millis(1000),
            tree_page_size: 10_000,
            default_page_size: 20,
            max_page_size: 10_000,
        }
    }
}

impl Settings {
    /// Read `MDE_*` variables; unset or unparsable values keep their default.
    pub fn from_env() -> Self {
        let d = Settings::default();
        Settings {
            sys_prefix: std::env::var("MDE_SYS_PREFIX").unwrap_or(d.sys_prefix),
            max_connections: env_parse("MDE_MAX_CONNECTIONS").unwrap_or(d.max_connections),
            slow_query: env_parse("MDE_SLOW_QUERY_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.slow_query),
            tree_page_size: env_parse("MDE_TREE_PAGE_SIZE").unwrap_or(d.tree_page_size),
            default_page_size: env_parse("MDE_DEFAULT_PAGE_SIZE").unwrap_or(d.default_page_size),
            max_page_size: env_parse("MDE_MAX_PAGE_SIZE").unwrap_or(d.max_page_size),
        }
    }

    /// Qualified metadata table name for one record kind.
    pub fn sys_table(&self, kind: &str) -> String {
        format!("{}_{}", self.sys_prefix, kind)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("{}: cannot parse '{}', using default", key, raw);
                None
            }
        },
        Err(_) => None,
    }
}
