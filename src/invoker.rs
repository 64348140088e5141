use crate::clipboard::{ClipboardBackend, ClipboardBridge};
use crate::plugins::{PluginError, PluginHost, Review};
use log::warn;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Focus changes are asynchronous; wait this long before touching the clipboard.
pub const FOCUS_SETTLE: Duration = Duration::from_millis(250);

pub trait ForegroundApps: Send + Sync {
    fn frontmost(&self) -> Option<String>;
    fn activate(&self, app: &str);
    fn activate_self(&self);
}

/// Active window via active-win-pos-rs; activation through AppleScript on macOS.
#[derive(Debug, Default)]
pub struct SystemForeground;

impl ForegroundApps for SystemForeground {
    fn frontmost(&self) -> Option<String> {
        match active_win_pos_rs::get_active_window() {
            Ok(window) => Some(window.app_name),
            Err(_) => None,
        }
    }

    fn activate(&self, app: &str) {
        let name = app.replace('\\', "\\\\").replace('"', "\\\"");
        run_script(&format!("tell application \"{name}\" to activate"));
    }

    fn activate_self(&self) {
        let pid = std::process::id();
        run_script(&format!(
            "tell application \"System Events\" to set frontmost of (first process whose unix id is {pid}) to true"
        ));
    }
}

#[cfg(target_os = "macos")]
fn run_script(script: &str) {
    match std::process::Command::new("/usr/bin/osascript")
        .args(["-e", script])
        .output()
    {
        Ok(output) if output.status.success() => {}
        Ok(output) => warn!(
            "osascript failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ),
        Err(err) => warn!("failed to run osascript: {err}"),
    }
}

#[cfg(not(target_os = "macos"))]
fn run_script(script: &str) {
    log::debug!("focus switching unsupported here, skipped: {script}");
}

/// Used when the focus workaround is switched off.
#[derive(Debug, Default)]
pub struct NoFocus;

impl ForegroundApps for NoFocus {
    fn frontmost(&self) -> Option<String> {
        None
    }

    fn activate(&self, _app: &str) {}

    fn activate_self(&self) {}
}

#[derive(Debug)]
pub struct PluginOutcome {
    pub command: String,
    pub previous_app: Option<String>,
    pub result: Result<String, PluginError>,
    /// Set when the user sees the text before anything is written.
    pub review: Option<Review>,
}

pub struct PluginInvoker {
    plugins: Arc<dyn PluginHost>,
    foreground: Arc<dyn ForegroundApps>,
    settle: Duration,
}

impl PluginInvoker {
    pub fn new(plugins: Arc<dyn PluginHost>, foreground: Arc<dyn ForegroundApps>) -> Self {
        Self {
            plugins,
            foreground,
            settle: FOCUS_SETTLE,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Capture focus, come forward, let focus settle, read the clipboard and transform it.
    pub fn prepare(&self, command: &str, read_clipboard: impl FnOnce() -> String) -> PluginOutcome {
        let previous_app = self.foreground.frontmost();
        self.foreground.activate_self();
        thread::sleep(self.settle);
        let input = read_clipboard();
        let result = self.plugins.invoke(command, &input);
        PluginOutcome {
            command: command.to_string(),
            previous_app,
            result,
            review: self.plugins.review(command),
        }
    }

    /// Runs [`prepare`](Self::prepare) on a background thread and hands the outcome to `done`.
    pub fn spawn<R, D>(&self, command: String, read_clipboard: R, done: D) -> std::io::Result<()>
    where
        R: FnOnce() -> String + Send + 'static,
        D: FnOnce(PluginOutcome) + Send + 'static,
    {
        let invoker = PluginInvoker {
            plugins: Arc::clone(&self.plugins),
            foreground: Arc::clone(&self.foreground),
            settle: self.settle,
        };
        thread::Builder::new()
            .name(format!("plugin-{command}"))
            .spawn(move || done(invoker.prepare(&command, read_clipboard)))?;
        Ok(())
    }
}

/// Publishes the transformed text and restores the previous foreground application.
/// Runs on the coordinating context. A failed plugin leaves the clipboard untouched.
pub fn complete<B: ClipboardBackend>(
    outcome: PluginOutcome,
    clipboard: &mut ClipboardBridge<B>,
    foreground: &dyn ForegroundApps,
) -> Result<(), PluginError> {
    let result = match outcome.result {
        Ok(text) => {
            clipboard.write(&text);
            Ok(())
        }
        Err(err) => {
            warn!("plugin '{}' failed: {err}", outcome.command);
            Err(err)
        }
    };
    restore_focus(outcome.previous_app.as_deref(), foreground);
    result
}

pub fn restore_focus(previous_app: Option<&str>, foreground: &dyn ForegroundApps) {
    if let Some(app) = previous_app {
        foreground.activate(app);
    }
}
