pub mod backends;

use anyhow::{anyhow, Result};
use tracing::warn;

use crate::sink::KeystrokeSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackBackend {
    Auto,
    X11,
}

fn env_is_set(name: &str) -> bool {
    std::env::var_os(name)
        .map(|v| !v.is_empty())
        .unwrap_or(false)
}

fn wayland_env() -> bool {
    env_is_set("WAYLAND_DISPLAY") || env_is_set("WAYLAND_SOCKET")
}

fn session_description() -> String {
    let xdg_session_type = std::env::var("XDG_SESSION_TYPE").unwrap_or_default();

    let mut parts = Vec::new();
    for name in ["WAYLAND_DISPLAY", "WAYLAND_SOCKET", "DISPLAY"] {
        if env_is_set(name) {
            parts.push(format!("{name} is set"));
        }
    }
    if !xdg_session_type.is_empty() {
        parts.push(format!("XDG_SESSION_TYPE={xdg_session_type}"));
    }

    if parts.is_empty() {
        "No display session detected (expected X11 environment variables).".to_string()
    } else {
        format!("Detected environment: {}", parts.join(", "))
    }
}

pub fn resolve_backend(requested: PlaybackBackend) -> Result<PlaybackBackend> {
    let resolved = match requested {
        PlaybackBackend::X11 => PlaybackBackend::X11,
        PlaybackBackend::Auto if env_is_set("DISPLAY") => PlaybackBackend::X11,
        PlaybackBackend::Auto => {
            let hint = if wayland_env() {
                "Native Wayland input is not supported; run the target app under Xwayland."
            } else {
                "Try passing --backend x11 to force it."
            };
            return Err(anyhow!(
                "No supported output backend detected. {}\n{hint}",
                session_description()
            ));
        }
    };

    if cfg!(not(feature = "x11")) {
        let how = match requested {
            PlaybackBackend::Auto => "detected",
            PlaybackBackend::X11 => "requested",
        };
        return Err(anyhow!(
            "X11 backend {how} but is disabled in this build. (Rebuild with `--features x11`.) {}",
            session_description()
        ));
    }

    Ok(resolved)
}

/// Open a keystroke sink on the resolved backend.
pub fn open_sink(requested: PlaybackBackend) -> Result<Box<dyn KeystrokeSink>> {
    match resolve_backend(requested)? {
        PlaybackBackend::X11 => {
            if wayland_env() {
                warn!("Wayland session detected; keystrokes only reach Xwayland windows");
            }

            #[cfg(feature = "x11")]
            {
                Ok(Box::new(backends::x11::X11Sink::connect()?))
            }

            #[cfg(not(feature = "x11"))]
            {
                Err(anyhow!(
                    "X11 backend is disabled in this build (rebuild with `--features x11`)."
                ))
            }
        }
        PlaybackBackend::Auto => Err(anyhow!("no backend resolved")),
    }
}
