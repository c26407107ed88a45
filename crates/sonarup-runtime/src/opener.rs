use std::process::{Command, Stdio};

/// Opens a URL for the user. Best-effort: failures are logged, never returned.
pub trait UrlOpener {
    fn open(&self, url: &str);
}

/// Uses the platform's default handler.
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) {
        let mut command = if cfg!(target_os = "macos") {
            Command::new("open")
        } else if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]);
            cmd
        } else {
            Command::new("xdg-open")
        };

        let spawned = command
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        if let Err(err) = spawned {
            tracing::warn!(url, error = %err, "could not open browser");
        }
    }
}

/// Does nothing; used with `--no-browser`.
pub struct NoopOpener;

impl UrlOpener for NoopOpener {
    fn open(&self, url: &str) {
        tracing::debug!(url, "browser opening disabled");
    }
}
