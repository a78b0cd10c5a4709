use directories::ProjectDirs;
use std::{
    env,
    path::PathBuf,
};

lazy_static::lazy_static! {
    static ref CONFIG_FOLDER: Option<PathBuf> = env::var("BINDSTATS_CONFIG_DIR")
        .ok()
        .map(PathBuf::from);
}

/// Directory searched for `config.yaml`.
///
/// `BINDSTATS_CONFIG_DIR` overrides the platform default.
pub fn get_config_dir() -> PathBuf {
    if let Some(s) = CONFIG_FOLDER.clone() {
        s
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.config_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".config")
    }
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "bindstats", env!("CARGO_PKG_NAME"))
}
