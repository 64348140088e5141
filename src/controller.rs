use crate::clipboard::{ClipboardBackend, ClipboardBridge};
use crate::invoker::{self, ForegroundApps, PluginInvoker, PluginOutcome};
use crate::launch::{self, Launcher};
use crate::menu::{self, MenuNode, MenuTree};
use crate::plugins::{self, PluginError, PluginHost, Review};
use crate::store::{self, Entry, SnippetStore, StoreError};
use log::{debug, error, info};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// Control ids contain ':' so they can never collide with a snippet id.
pub const CMD_READ_CLIPBOARD: &str = "menu:read_clipboard";
pub const CMD_EDIT_LIST: &str = "menu:edit_list";
pub const CMD_ABOUT: &str = "menu:about";
pub const CMD_SETTINGS: &str = "menu:settings";
pub const CMD_QUIT: &str = "menu:quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ReadClipboard,
    About,
    Settings,
    Quit,
    EditList,
    Paste(String),
}

impl Action {
    /// Anything that is not a control command names a snippet to paste.
    pub fn from_command(command: &str) -> Self {
        match command {
            CMD_READ_CLIPBOARD => Action::ReadClipboard,
            CMD_ABOUT => Action::About,
            CMD_SETTINGS => Action::Settings,
            CMD_QUIT => Action::Quit,
            CMD_EDIT_LIST => Action::EditList,
            other => Action::Paste(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// What the shell has to show after an action was dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Done,
    Quit,
    ShowSnippetForm(SnippetForm),
    ShowList,
    ShowSettings,
    ShowAbout,
    /// Clipboard text to look at; nothing is written back.
    ShowContents(String),
    /// Clipboard text waiting for a find/replace.
    ShowReplace(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnippetForm {
    pub title: String,
    pub body: String,
    /// Id of the entry being edited; `None` creates a new one.
    pub editing: Option<String>,
}

/// Plugin text held while the user reviews it; the menu stays disabled meanwhile.
#[derive(Debug)]
struct PendingReview {
    previous_app: Option<String>,
    text: String,
}

/// Owns the snippet list, the launch menu and the clipboard.
///
/// Lives on the event loop thread; background work reports back through user
/// events, so every mutation and every menu rebuild is serialized here.
pub struct Controller<B> {
    store: SnippetStore,
    entries: Vec<Entry>,
    launch_menu: MenuTree,
    clipboard: ClipboardBridge<B>,
    plugins: Arc<dyn PluginHost>,
    foreground: Arc<dyn ForegroundApps>,
    launcher: Box<dyn Launcher>,
    settle: Duration,
    busy: bool,
    previous_app: Option<String>,
    review: Option<PendingReview>,
}

impl<B: ClipboardBackend> Controller<B> {
    pub fn new(
        store: SnippetStore,
        backend: B,
        plugins: Arc<dyn PluginHost>,
        foreground: Arc<dyn ForegroundApps>,
        launcher: Box<dyn Launcher>,
    ) -> Self {
        let mut controller = Self {
            store,
            entries: Vec::new(),
            launch_menu: MenuTree::new(launch::LAUNCH_MENU_LABEL),
            clipboard: ClipboardBridge::new(backend),
            plugins,
            foreground,
            launcher,
            settle: invoker::FOCUS_SETTLE,
            busy: false,
            previous_app: None,
            review: None,
        };
        controller.reload();
        controller
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn store(&self) -> &SnippetStore {
        &self.store
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Re-reads the index from disk. An unreadable index leaves an empty list.
    pub fn reload(&mut self) {
        self.entries = match self.store.load() {
            Ok(entries) => entries,
            Err(err) => {
                error!("failed to load snippet index: {err}");
                Vec::new()
            }
        };
        debug!("loaded {} snippets", self.entries.len());
    }

    pub fn reload_launch_menu(&mut self, path: &Path) {
        self.launch_menu = launch::load_launch_menu(path);
    }

    pub fn snippet_menu(&self) -> MenuTree {
        menu::snippet_menu(&self.entries)
    }

    pub fn launch_menu(&self) -> &MenuTree {
        &self.launch_menu
    }

    pub fn plugin_items(&self) -> Vec<(String, String)> {
        self.plugins.menu_items()
    }

    pub fn plugin_review(&self, command: &str) -> Option<Review> {
        self.plugins.review(command)
    }

    pub fn item_enabled(&self, command: &str) -> bool {
        !self.busy || command == CMD_QUIT
    }

    /// Swaps in a store and focus handling after the settings changed.
    pub fn apply_settings(&mut self, store: SnippetStore, foreground: Arc<dyn ForegroundApps>) {
        info!("snippets directory is now {}", store.dir().display());
        self.store = store;
        self.foreground = foreground;
        self.reload();
    }

    pub fn dispatch(&mut self, action: Action) -> Step {
        if self.busy && action != Action::Quit {
            debug!("ignoring {action:?} while busy");
            return Step::Done;
        }
        match action {
            Action::Quit => Step::Quit,
            Action::Paste(value) => {
                self.paste(&value);
                Step::Done
            }
            Action::ReadClipboard => {
                self.begin_interaction();
                Step::ShowSnippetForm(SnippetForm {
                    body: self.clipboard.read(),
                    ..SnippetForm::default()
                })
            }
            Action::EditList => {
                self.begin_interaction();
                Step::ShowList
            }
            Action::Settings => {
                self.begin_interaction();
                Step::ShowSettings
            }
            Action::About => {
                self.begin_interaction();
                Step::ShowAbout
            }
        }
    }

    /// Disables the menu and brings us to the front for a dialog.
    pub fn begin_interaction(&mut self) {
        self.busy = true;
        self.previous_app = self.foreground.frontmost();
        self.foreground.activate_self();
    }

    pub fn end_interaction(&mut self) {
        self.busy = false;
        if let Some(app) = self.previous_app.take() {
            self.foreground.activate(&app);
        }
    }

    pub fn paste(&mut self, value: &str) {
        let text = self.store.load_content(value);
        self.clipboard.write(&text);
    }

    pub fn snippet_form(&self, value: &str) -> Option<SnippetForm> {
        let entry = self.find(value)?;
        Some(SnippetForm {
            title: entry.key().to_string(),
            body: self.store.load_content(value),
            editing: Some(value.to_string()),
        })
    }

    /// Writes the content file first; the entry is only listed if that worked.
    pub fn add_entry(&mut self, title: &str, body: &str) -> Result<String, StoreError> {
        let value = self.store.next_id();
        let entry = Entry::new(title, value.as_str())?;
        self.store.create_content(&value, body)?;
        self.entries.push(entry);
        self.persist();
        Ok(value)
    }

    pub fn edit_entry(&mut self, value: &str, title: &str, body: &str) -> Result<bool, StoreError> {
        if self.find(value).is_none() {
            return Ok(false);
        }
        if !store::is_valid_key(title) {
            return Err(StoreError::InvalidTitle(title.to_string()));
        }
        self.store.create_content(value, body)?;
        self.rename_entry(value, title)
    }

    /// A title that would not survive the index format leaves the entry as it was.
    pub fn rename_entry(&mut self, value: &str, title: &str) -> Result<bool, StoreError> {
        let Some(entry) = self.entries.iter_mut().find(|e| e.value() == value) else {
            return Ok(false);
        };
        entry.set_key(title)?;
        self.persist();
        Ok(true)
    }

    pub fn delete_entry(&mut self, value: &str) -> bool {
        let Some(pos) = self.position(value) else {
            return false;
        };
        self.store.delete_content(value);
        self.entries.remove(pos);
        self.persist();
        true
    }

    pub fn move_entry(&mut self, value: &str, direction: Direction) -> bool {
        let Some(pos) = self.position(value) else {
            return false;
        };
        let target = match direction {
            Direction::Up => pos.checked_sub(1),
            Direction::Down => Some(pos + 1).filter(|&next| next < self.entries.len()),
        };
        let Some(target) = target else {
            return false;
        };
        self.entries.swap(pos, target);
        self.persist();
        true
    }

    pub fn copy_entry(&mut self, value: &str) {
        self.paste(value);
    }

    /// Runs the launch leaf stored at `index` in the launch menu arena.
    pub fn launch(&self, index: usize) -> bool {
        if self.busy {
            debug!("ignoring launch item {index} while busy");
            return false;
        }
        let Some(MenuNode::Leaf { label, action }) = self.launch_menu.get(index) else {
            return false;
        };
        match launch::run_command_line(self.launcher.as_ref(), action) {
            Ok(()) => {
                info!("launched '{label}'");
                true
            }
            Err(err) => {
                error!("launching '{label}' failed: {err}");
                false
            }
        }
    }

    /// Starts a plugin round trip off the event loop. The menu stays disabled
    /// until [`complete_plugin`](Self::complete_plugin) runs.
    pub fn start_plugin<R, D>(&mut self, command: &str, read_clipboard: R, done: D) -> bool
    where
        R: FnOnce() -> String + Send + 'static,
        D: FnOnce(PluginOutcome) + Send + 'static,
    {
        if self.busy {
            debug!("ignoring plugin '{command}' while busy");
            return false;
        }
        let invoker = PluginInvoker::new(Arc::clone(&self.plugins), Arc::clone(&self.foreground))
            .with_settle(self.settle);
        self.busy = true;
        match invoker.spawn(command.to_string(), read_clipboard, done) {
            Ok(()) => true,
            Err(err) => {
                error!("failed to start plugin '{command}': {err}");
                self.busy = false;
                false
            }
        }
    }

    /// Publishes a plugin result. Reviewed commands keep the menu disabled and
    /// hand their text to the shell instead; see [`finish_replace`](Self::finish_replace)
    /// and [`cancel_review`](Self::cancel_review).
    pub fn complete_plugin(&mut self, outcome: PluginOutcome) -> Result<Step, PluginError> {
        if let (Some(review), Ok(text)) = (outcome.review, &outcome.result) {
            let step = match review {
                Review::Show => Step::ShowContents(text.clone()),
                Review::Replace => Step::ShowReplace(text.clone()),
            };
            self.review = Some(PendingReview {
                previous_app: outcome.previous_app,
                text: text.clone(),
            });
            return Ok(step);
        }
        let result = invoker::complete(outcome, &mut self.clipboard, self.foreground.as_ref());
        self.busy = false;
        result.map(|()| Step::Done)
    }

    /// Applies a find/replace to the text under review and publishes it.
    /// A bad pattern keeps the review open so the user can correct it.
    pub fn finish_replace(&mut self, pattern: &str, replacement: &str) -> Result<bool, PluginError> {
        let Some(pending) = &self.review else {
            return Ok(false);
        };
        let replaced = plugins::replace_all(&pending.text, pattern, replacement)?;
        self.clipboard.write(&replaced);
        self.cancel_review();
        Ok(true)
    }

    /// Ends a review without touching the clipboard.
    pub fn cancel_review(&mut self) -> bool {
        let Some(pending) = self.review.take() else {
            return false;
        };
        invoker::restore_focus(pending.previous_app.as_deref(), self.foreground.as_ref());
        self.busy = false;
        true
    }

    pub fn in_review(&self) -> bool {
        self.review.is_some()
    }

    fn find(&self, value: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.value() == value)
    }

    fn position(&self, value: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.value() == value)
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(&self.entries) {
            error!("failed to save snippet index: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::ClipboardPayload;
    use crate::clipboard::testing::MemoryClipboard;
    use crate::invoker::testing::RecordingForeground;
    use crate::launch::LaunchError;
    use crate::plugins::BuiltinPlugins;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;
    use std::sync::mpsc;
    use tempfile::TempDir;

    #[derive(Default, Clone)]
    struct SharedLauncher {
        calls: Rc<RefCell<Vec<Vec<String>>>>,
    }

    impl Launcher for SharedLauncher {
        fn execute(&self, argv: &[String]) -> Result<(), LaunchError> {
            self.calls.borrow_mut().push(argv.to_vec());
            Ok(())
        }
    }

    struct Fixture {
        dir: TempDir,
        clipboard: MemoryClipboard,
        foreground: Arc<RecordingForeground>,
        launcher: SharedLauncher,
        controller: Controller<MemoryClipboard>,
    }

    fn fixture(index: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = SnippetStore::new(dir.path());
        if !index.is_empty() {
            fs::write(store.index_path(), index).unwrap();
        }
        let clipboard = MemoryClipboard::with_text("from clipboard");
        let foreground = Arc::new(RecordingForeground::with_front("Mail"));
        let launcher = SharedLauncher::default();
        let controller = Controller::new(
            store,
            clipboard.clone(),
            Arc::new(BuiltinPlugins),
            foreground.clone(),
            Box::new(launcher.clone()),
        )
        .with_settle(Duration::ZERO);
        Fixture {
            dir,
            clipboard,
            foreground,
            launcher,
            controller,
        }
    }

    fn keys(controller: &Controller<MemoryClipboard>) -> Vec<String> {
        controller.entries().iter().map(|e| e.key().to_string()).collect()
    }

    #[test]
    fn commands_map_to_actions() {
        assert_eq!(Action::from_command(CMD_QUIT), Action::Quit);
        assert_eq!(Action::from_command(CMD_ABOUT), Action::About);
        assert_eq!(Action::from_command(CMD_SETTINGS), Action::Settings);
        assert_eq!(Action::from_command(CMD_EDIT_LIST), Action::EditList);
        assert_eq!(
            Action::from_command(CMD_READ_CLIPBOARD),
            Action::ReadClipboard
        );
        assert_eq!(
            Action::from_command("1700000000000"),
            Action::Paste("1700000000000".into())
        );
    }

    #[test]
    fn selecting_a_snippet_pastes_its_content() {
        let mut fx = fixture("Signature=1700000000000");
        fx.controller
            .store()
            .create_content("1700000000000", "Best regards")
            .unwrap();
        let step = fx
            .controller
            .dispatch(Action::from_command("1700000000000"));
        assert_eq!(step, Step::Done);
        assert_eq!(
            fx.clipboard.last(),
            Some(ClipboardPayload::PlainText("Best regards".into()))
        );
    }

    #[test]
    fn read_clipboard_prefills_new_snippet_form() {
        let mut fx = fixture("");
        let step = fx.controller.dispatch(Action::ReadClipboard);
        assert_eq!(
            step,
            Step::ShowSnippetForm(SnippetForm {
                title: String::new(),
                body: "from clipboard".into(),
                editing: None,
            })
        );
        assert!(fx.controller.is_busy());
    }

    #[test]
    fn busy_disables_everything_but_quit() {
        let mut fx = fixture("");
        assert!(fx.controller.item_enabled(CMD_ABOUT));
        assert_eq!(fx.controller.dispatch(Action::About), Step::ShowAbout);
        assert!(!fx.controller.item_enabled(CMD_ABOUT));
        assert!(!fx.controller.item_enabled("1700000000000"));
        assert!(fx.controller.item_enabled(CMD_QUIT));
        assert_eq!(fx.controller.dispatch(Action::Settings), Step::Done);
        assert_eq!(fx.controller.dispatch(Action::Quit), Step::Quit);

        fx.controller.end_interaction();
        assert!(fx.controller.item_enabled(CMD_ABOUT));
        assert_eq!(
            fx.foreground.calls(),
            ["frontmost", "activate self", "activate Mail"]
        );
    }

    #[test]
    fn added_entry_is_persisted_with_content() {
        let mut fx = fixture("");
        let value = fx.controller.add_entry("Greeting", "Hello there").unwrap();
        assert_eq!(keys(&fx.controller), ["Greeting"]);

        let reopened = SnippetStore::new(fx.dir.path());
        let entries = reopened.load().unwrap();
        assert_eq!(entries[0].value(), value);
        assert_eq!(reopened.load_content(&value), "Hello there");
    }

    #[test]
    fn entry_is_not_added_when_content_cannot_be_written() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();
        let mut controller = Controller::new(
            SnippetStore::new(&blocker),
            MemoryClipboard::default(),
            Arc::new(BuiltinPlugins),
            Arc::new(RecordingForeground::default()),
            Box::new(SharedLauncher::default()),
        );
        assert!(controller.add_entry("Greeting", "Hello").is_err());
        assert!(controller.entries().is_empty());
    }

    #[test]
    fn edit_and_rename_keep_the_id() {
        let mut fx = fixture("Signature=1700000000000");
        assert!(
            fx.controller
                .edit_entry("1700000000000", "Sig", "New body")
                .unwrap()
        );
        let form = fx.controller.snippet_form("1700000000000").unwrap();
        assert_eq!(form.title, "Sig");
        assert_eq!(form.body, "New body");

        assert!(fx.controller.rename_entry("1700000000000", "Footer").unwrap());
        let saved = fs::read_to_string(fx.controller.store().index_path()).unwrap();
        assert_eq!(saved, "Footer=1700000000000");
        assert!(!fx.controller.rename_entry("missing", "x").unwrap());
    }

    #[test]
    fn titles_that_break_the_index_are_refused() {
        let mut fx = fixture("Signature=1700000000000");
        assert!(matches!(
            fx.controller.add_entry("a=b", "body"),
            Err(StoreError::InvalidTitle(_))
        ));
        assert_eq!(keys(&fx.controller), ["Signature"]);
        let files = fs::read_dir(fx.dir.path()).unwrap().count();
        assert_eq!(files, 1, "no content file is written for a refused title");

        assert!(fx.controller.rename_entry("1700000000000", "x=y").is_err());
        assert!(fx.controller.rename_entry("1700000000000", "two\nlines").is_err());
        assert!(
            fx.controller
                .edit_entry("1700000000000", "a\r\nb", "changed")
                .is_err()
        );
        assert_eq!(fx.controller.snippet_form("1700000000000").unwrap().body, "");

        fx.controller.reload();
        assert_eq!(keys(&fx.controller), ["Signature"]);
        assert_eq!(fx.controller.entries()[0].value(), "1700000000000");
    }

    #[test]
    fn deleted_entry_stays_deleted_without_content_file() {
        let mut fx = fixture("Signature=1700000000000\nGreeting=1700000000001");
        assert!(fx.controller.delete_entry("1700000000000"));
        let saved = fs::read_to_string(fx.controller.store().index_path()).unwrap();
        assert_eq!(saved, "Greeting=1700000000001");
        fx.controller.reload();
        assert_eq!(keys(&fx.controller), ["Greeting"]);
    }

    #[test]
    fn moves_past_either_end_are_ignored() {
        let mut fx = fixture("A=1\nB=2\nC=3");
        assert!(!fx.controller.move_entry("1", Direction::Up));
        assert!(!fx.controller.move_entry("3", Direction::Down));
        assert!(fx.controller.move_entry("3", Direction::Up));
        assert_eq!(keys(&fx.controller), ["A", "C", "B"]);
        assert!(fx.controller.move_entry("1", Direction::Down));
        assert_eq!(keys(&fx.controller), ["C", "A", "B"]);
    }

    #[test]
    fn reload_picks_up_external_edits() {
        let mut fx = fixture("A=1");
        fs::write(fx.controller.store().index_path(), "A=1\nB=2").unwrap();
        fx.controller.reload();
        let menu = fx.controller.snippet_menu();
        assert_eq!(menu.children(menu.root()).len(), 3);
    }

    #[test]
    fn launch_leaf_runs_tokenized_command() {
        let mut fx = fixture("");
        let path = fx.dir.path().join("LaunchList.txt");
        fs::write(&path, ">> Tools\nEdit=\"/usr/bin/my editor\" -n\n..").unwrap();
        fx.controller.reload_launch_menu(&path);

        let tree = fx.controller.launch_menu();
        let group = tree.children(tree.root())[0];
        let leaf = tree.children(group)[0].index();
        assert!(fx.controller.launch(leaf));
        assert!(!fx.controller.launch(group.index()));
        assert_eq!(
            fx.launcher.calls.borrow().as_slice(),
            [vec!["/usr/bin/my editor".to_string(), "-n".to_string()]]
        );
    }

    #[test]
    fn launch_is_ignored_while_busy() {
        let mut fx = fixture("");
        let path = fx.dir.path().join("LaunchList.txt");
        fs::write(&path, "Term=/usr/bin/xterm").unwrap();
        fx.controller.reload_launch_menu(&path);
        let tree = fx.controller.launch_menu();
        let leaf = tree.children(tree.root())[0].index();

        fx.controller.dispatch(Action::Settings);
        assert!(!fx.controller.launch(leaf));
        assert!(fx.launcher.calls.borrow().is_empty());

        fx.controller.end_interaction();
        assert!(fx.controller.launch(leaf));
        assert_eq!(fx.launcher.calls.borrow().len(), 1);
    }

    #[test]
    fn plugin_round_trip_transforms_clipboard() {
        let mut fx = fixture("");
        let (tx, rx) = mpsc::channel();
        let started = fx.controller.start_plugin(
            "uppercase",
            || "shout".to_string(),
            move |outcome| {
                let _ = tx.send(outcome);
            },
        );
        assert!(started);
        assert!(fx.controller.is_busy());
        assert!(!fx.controller.start_plugin("quote", String::new, |_| {}));

        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(fx.controller.complete_plugin(outcome).unwrap(), Step::Done);
        assert!(!fx.controller.is_busy());
        assert_eq!(
            fx.clipboard.last(),
            Some(ClipboardPayload::PlainText("SHOUT".into()))
        );
        assert_eq!(fx.foreground.calls().last().unwrap(), "activate Mail");
    }

    fn run_plugin(fx: &mut Fixture, command: &str, input: &str) -> Step {
        let (tx, rx) = mpsc::channel();
        let input = input.to_string();
        assert!(fx.controller.start_plugin(
            command,
            move || input,
            move |outcome| {
                let _ = tx.send(outcome);
            },
        ));
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        fx.controller.complete_plugin(outcome).unwrap()
    }

    #[test]
    fn replace_waits_for_pattern_then_writes() {
        let mut fx = fixture("");
        let step = run_plugin(&mut fx, "replace", "one, two, three");
        assert_eq!(step, Step::ShowReplace("one, two, three".into()));
        assert!(fx.controller.is_busy());
        assert!(fx.controller.in_review());
        assert!(fx.clipboard.last().is_none());

        assert!(fx.controller.finish_replace("(", "x").is_err());
        assert!(fx.controller.in_review());

        assert!(fx.controller.finish_replace(r",\s*", ";").unwrap());
        assert_eq!(
            fx.clipboard.last(),
            Some(ClipboardPayload::PlainText("one;two;three".into()))
        );
        assert!(!fx.controller.is_busy());
        assert_eq!(fx.foreground.calls().last().unwrap(), "activate Mail");
        assert!(!fx.controller.finish_replace("a", "b").unwrap());
    }

    #[test]
    fn show_contents_leaves_clipboard_alone() {
        let mut fx = fixture("");
        assert_eq!(fx.controller.plugin_review("show_contents"), Some(Review::Show));
        assert_eq!(fx.controller.plugin_review("quote"), None);
        let step = run_plugin(&mut fx, "show_contents", "peek");
        assert_eq!(step, Step::ShowContents("peek".into()));
        assert!(fx.controller.is_busy());

        assert!(fx.controller.cancel_review());
        assert!(!fx.controller.is_busy());
        assert!(fx.clipboard.last().is_none());
        assert_eq!(fx.foreground.calls().last().unwrap(), "activate Mail");
        assert!(!fx.controller.cancel_review());
    }

    #[test]
    fn settings_change_switches_directory() {
        let mut fx = fixture("A=1");
        let other = tempfile::tempdir().unwrap();
        fs::write(other.path().join(crate::store::INDEX_FILE_NAME), "B=2\nC=3").unwrap();
        fx.controller.apply_settings(
            SnippetStore::new(other.path()),
            Arc::new(crate::invoker::NoFocus),
        );
        assert_eq!(keys(&fx.controller), ["B", "C"]);
        fx.controller.dispatch(Action::About);
        fx.controller.end_interaction();
        assert!(fx.foreground.calls().is_empty());
    }
}
