use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::infra::{
    config::{file_config::FileConfig, AppConfig},
    error::AppError,
};

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const APP_DIR: &str = "clubsync";

/// Loads config from `path`, else `./config.toml`, else the user config dir.
/// A missing file yields defaults.
pub fn load(path: Option<&Path>) -> Result<AppConfig, AppError> {
    let user_config = dirs::config_dir().map(|dir| dir.join(APP_DIR).join(DEFAULT_CONFIG_PATH));
    let config_path = resolve_path(path, Path::new(DEFAULT_CONFIG_PATH), user_config.as_deref());

    let mut config = AppConfig::default();

    let Some(config_path) = config_path.filter(|candidate| candidate.exists()) else {
        return Ok(config);
    };

    let raw = fs::read_to_string(&config_path).map_err(|source| AppError::ConfigRead {
        path: config_path.clone(),
        source,
    })?;

    let file_config: FileConfig = toml::from_str(&raw).map_err(|source| AppError::ConfigParse {
        path: config_path,
        source,
    })?;

    file_config.merge_into(&mut config);
    Ok(config)
}

fn resolve_path(
    explicit: Option<&Path>,
    working_dir_default: &Path,
    user_default: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if working_dir_default.exists() {
        return Some(working_dir_default.to_path_buf());
    }

    user_default.map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_defaults_when_file_is_missing() {
        let config = load(Some(Path::new("./missing-config.toml"))).expect("config must load");

        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn merges_file_values_over_defaults() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let config_path = temp_dir.path().join("config.toml");

        fs::write(
            &config_path,
            r#"[logging]
level = "debug"

[backend]
api_base_url = "https://club.example"
request_timeout_ms = 2500
"#,
        )
        .expect("must write test config");

        let config = load(Some(&config_path)).expect("config must load");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.backend.api_base_url, "https://club.example");
        assert_eq!(config.backend.request_timeout_ms, 2500);
        assert_eq!(config.backend.api_prefix, "/api/messages");
        assert_eq!(config.session, AppConfig::default().session);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[backend]\nrequest_timeout_ms = \"soon\"\n")
            .expect("must write test config");

        let err = load(Some(&config_path)).expect_err("must fail");

        assert!(matches!(err, AppError::ConfigParse { .. }));
    }

    #[test]
    fn explicit_path_wins_over_defaults() {
        let resolved = resolve_path(
            Some(Path::new("custom.toml")),
            Path::new("config.toml"),
            Some(Path::new("/home/u/.config/clubsync/config.toml")),
        );

        assert_eq!(resolved, Some(PathBuf::from("custom.toml")));
    }

    #[test]
    fn falls_back_to_user_config_dir() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let missing = temp_dir.path().join("config.toml");
        let user = temp_dir.path().join("clubsync").join("config.toml");

        let resolved = resolve_path(None, &missing, Some(&user));

        assert_eq!(resolved, Some(user));
    }
}
