use color_eyre::Result;

pub fn get_env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|e| e.into())
}

pub fn get_env_var_or_panic(key: &str) -> String {
    get_env_var(key).unwrap_or_else(|e| panic!("Failed to get env var {}: {}", key, e))
}

pub fn get_env_var_or_default(key: &str, default: &str) -> String {
    get_env_var(key).unwrap_or(default.to_string())
}

/// Reads an env var holding a whole number of seconds.
pub fn get_env_var_secs_or_default(key: &str, default: u64) -> std::time::Duration {
    let secs = get_env_var_or_default(key, &default.to_string())
        .parse::<u64>()
        .unwrap_or_else(|e| panic!("Failed to parse env var {} as seconds: {}", key, e));
    std::time::Duration::from_secs(secs)
}
