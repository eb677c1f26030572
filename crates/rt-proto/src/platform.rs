//! Filesystem locations and the mpv endpoint.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "rt";
const MPV_IPC_NAME: &str = "rt-mpv";

/// Where the shared mpv instance listens.  A socket path on Unix, a pipe
/// name on Windows.
pub fn mpv_socket_name() -> String {
    if cfg!(windows) {
        MPV_IPC_NAME.to_string()
    } else {
        std::env::temp_dir()
            .join(format!("{}.sock", MPV_IPC_NAME))
            .display()
            .to_string()
    }
}

/// `--input-ipc-server` argument matching `mpv_socket_name`.
pub fn mpv_socket_arg() -> String {
    if cfg!(windows) {
        format!(r"--input-ipc-server=\\.\pipe\{}", mpv_socket_name())
    } else {
        format!("--input-ipc-server={}", mpv_socket_name())
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(std::env::temp_dir)
}

/// `~/.local/share/rt` on Unix (also on macOS, not Application Support).
pub fn data_dir() -> PathBuf {
    if cfg!(windows) {
        dirs::data_local_dir().unwrap_or_else(home).join(APP_DIR)
    } else {
        home().join(".local").join("share").join(APP_DIR)
    }
}

/// `~/.config/rt` on Unix.
pub fn config_dir() -> PathBuf {
    if cfg!(windows) {
        dirs::config_dir().unwrap_or_else(home).join(APP_DIR)
    } else {
        home().join(".config").join(APP_DIR)
    }
}

pub fn mpv_binary_name() -> &'static str {
    if cfg!(windows) {
        "mpv.exe"
    } else {
        "mpv"
    }
}

/// Locate mpv: `MPV_PATH`, then next to the `rt` executable, then `PATH`.
pub fn find_mpv_binary() -> Option<PathBuf> {
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    find_binary_in(
        std::env::var_os("MPV_PATH"),
        beside_exe,
        std::env::var_os("PATH"),
        mpv_binary_name(),
    )
}

fn find_binary_in(
    explicit: Option<OsString>,
    exe_dir: Option<PathBuf>,
    search_path: Option<OsString>,
    name: &str,
) -> Option<PathBuf> {
    let explicit = explicit.map(PathBuf::from);
    let beside = exe_dir.map(|dir| dir.join(name));
    let on_path = search_path
        .into_iter()
        .flat_map(|p| std::env::split_paths(&p).collect::<Vec<_>>())
        .map(|dir| dir.join(name));

    explicit
        .into_iter()
        .chain(beside)
        .chain(on_path)
        .find(|candidate| candidate.is_file())
}
