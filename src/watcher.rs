use log::{debug, error};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    #[error("failed to watch snippets directory: {0}")]
    Notify(#[from] notify::Error),
    #[error("index path {0} has no parent directory")]
    NoParent(String),
    #[error("failed to start watcher thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// Keeps the directory registration alive; dropping it ends the watch loop.
pub struct IndexWatch {
    _watcher: RecommendedWatcher,
}

/// Calls `on_change` once per batch of create/modify/remove events that touch the
/// index file. Runs on its own thread.
pub fn watch_index<F>(index_path: &Path, on_change: F) -> Result<IndexWatch, WatchError>
where
    F: Fn() + Send + 'static,
{
    let display = index_path.display().to_string();
    let dir = index_path
        .parent()
        .ok_or_else(|| WatchError::NoParent(display.clone()))?;
    let name = index_path
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| WatchError::NoParent(display.clone()))?;

    let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        NotifyConfig::default(),
    )?;
    // The directory, not the file, so replace-by-rename saves are seen too.
    watcher.watch(dir, RecursiveMode::NonRecursive)?;

    thread::Builder::new()
        .name("index-watcher".into())
        .spawn(move || {
            while let Ok(first) = rx.recv() {
                let batch: Vec<_> = std::iter::once(first).chain(rx.try_iter()).collect();
                let mut touched = false;
                for res in batch {
                    match res {
                        Ok(event) => touched |= is_index_event(&event, &name),
                        Err(err) => error!("watch error on {display}: {err}"),
                    }
                }
                if touched {
                    debug!("{display} changed on disk");
                    on_change();
                }
            }
            debug!("stopped watching {display}");
        })?;

    Ok(IndexWatch { _watcher: watcher })
}

pub fn is_index_event(event: &Event, name: &OsStr) -> bool {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    relevant
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(name))
}
