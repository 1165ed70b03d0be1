use std::path::PathBuf;

/// Returns the user's home directory using common environment variables.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("GEOINTEL_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME")
                .or_else(|| std::env::var_os("USERPROFILE"))
                .map(PathBuf::from)
        })
}

/// Returns the default path to ~/.env (or $GEOINTEL_HOME/.env if set).
pub fn home_env_path() -> Option<PathBuf> {
    home_dir().map(|dir| dir.join(".env"))
}

/// Directory for logs and other local state.
pub fn data_dir() -> PathBuf {
    match home_dir() {
        Some(dir) => dir.join(".geointel"),
        None => PathBuf::from(".geointel"),
    }
}

/// Where `--log-file` writes.
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}
