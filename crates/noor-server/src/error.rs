use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// Map a missing config field path to the environment variable that sets it.
pub fn to_env_var(field: &str) -> String {
    let path = field.replace('.', "__").to_uppercase();
    if path.contains("__") {
        format!("NOOR_{path}")
    } else {
        // Bare field names come from the untagged provider section
        format!("NOOR_PROVIDER__{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_paths_map_to_env_vars() {
        assert_eq!(to_env_var("server.port"), "NOOR_SERVER__PORT");
        assert_eq!(to_env_var("api_key"), "NOOR_PROVIDER__API_KEY");
        assert_eq!(to_env_var("type"), "NOOR_PROVIDER__TYPE");
    }
}
