//! Hot reload of the `[mock]` section.
//!
//! Only settings that are live without a restart are forwarded. Changes to
//! the listener, shutdown or built-in shape are logged and ignored until the
//! process is restarted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::{MockConfig, MockSettings};

/// What a freshly loaded file means for the running server.
#[derive(Debug, Default, PartialEq)]
pub struct ReloadPlan {
    /// New `[mock]` settings to apply, if they differ.
    pub settings: Option<MockSettings>,
    /// Changed fields that only take effect on a process restart.
    pub ignored: Vec<&'static str>,
}

/// Compare the applied configuration against a reloaded one.
pub fn plan_reload(current: &MockConfig, reloaded: &MockConfig) -> ReloadPlan {
    let mut ignored = Vec::new();
    if current.listener != reloaded.listener {
        ignored.push("listener");
    }
    if current.shutdown != reloaded.shutdown {
        ignored.push("shutdown");
    }
    if current.mock.update_method != reloaded.mock.update_method {
        ignored.push("mock.update_method");
    }
    if current.mock.max_body_bytes != reloaded.mock.max_body_bytes {
        ignored.push("mock.max_body_bytes");
    }

    let settings = (current.mock != reloaded.mock).then(|| reloaded.mock.clone());
    ReloadPlan { settings, ignored }
}

/// Hand settings to the consumer. Returns `false` once the receiver is gone.
fn forward(tx: &mpsc::UnboundedSender<MockSettings>, settings: MockSettings) -> bool {
    match tx.send(settings) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "Reload consumer gone, settings dropped");
            false
        }
    }
}

/// Watches the configuration file and emits changed `[mock]` settings.
pub struct ConfigWatcher {
    path: PathBuf,
    current: MockConfig,
    update_tx: mpsc::UnboundedSender<MockSettings>,
}

impl ConfigWatcher {
    /// `current` is the configuration the server was built from.
    pub fn new(path: &Path, current: MockConfig) -> (Self, mpsc::UnboundedReceiver<MockSettings>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            current,
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let ConfigWatcher {
            path,
            mut current,
            update_tx,
        } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = ?e, "Watch error");
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }

                let reloaded = match load_config(&path) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to reload config, keeping current settings");
                        return;
                    }
                };

                let plan = plan_reload(&current, &reloaded);
                if !plan.ignored.is_empty() {
                    tracing::warn!(fields = ?plan.ignored, "Changed settings need a process restart");
                }
                match plan.settings {
                    Some(settings) => {
                        tracing::info!(path = ?path, messages = settings.messages.len(), "Mock settings changed");
                        forward(&update_tx, settings);
                    }
                    None => tracing::debug!(path = ?path, "Config touched, mock settings unchanged"),
                }
                current = reloaded;
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watched, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?watched, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{MessageConfig, UpdateMethod};

    #[test]
    fn identical_files_need_nothing() {
        let config = MockConfig::default();
        assert_eq!(plan_reload(&config, &config.clone()), ReloadPlan::default());
    }

    #[test]
    fn mock_changes_are_forwarded() {
        let current = MockConfig::default();
        let mut reloaded = current.clone();
        reloaded.mock.mutation_enabled = false;
        reloaded.mock.messages.push(MessageConfig {
            path: "hello".into(),
            body: "world".into(),
            status: 200,
        });

        let plan = plan_reload(&current, &reloaded);
        assert_eq!(plan.settings, Some(reloaded.mock));
        assert!(plan.ignored.is_empty());
    }

    #[test]
    fn restart_only_fields_are_reported() {
        let current = MockConfig::default();
        let mut reloaded = current.clone();
        reloaded.listener.bind_address = ":9000".into();
        reloaded.shutdown.grace_period_ms = 1;
        reloaded.mock.update_method = UpdateMethod::Post;

        let plan = plan_reload(&current, &reloaded);
        assert_eq!(plan.ignored, vec!["listener", "shutdown", "mock.update_method"]);
        // the [mock] section still differs, the live part gets re-applied
        assert!(plan.settings.is_some());
    }

    #[test]
    fn forwarding_reports_closed_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(forward(&tx, MockSettings::default()));
        assert_eq!(rx.try_recv().unwrap(), MockSettings::default());

        drop(rx);
        assert!(!forward(&tx, MockSettings::default()));
    }
}
