use crate::clipboard::{ClipboardBridge, SystemClipboard};
use crate::config::{self, Settings, Theme};
use crate::controller::{
    Action, CMD_ABOUT, CMD_EDIT_LIST, CMD_QUIT, CMD_READ_CLIPBOARD, CMD_SETTINGS, Controller,
    Direction, SnippetForm, Step,
};
use crate::invoker::{ForegroundApps, NoFocus, PluginOutcome, SystemForeground};
use crate::launch::{LAUNCH_MENU_LABEL, ProcessLauncher};
use crate::menu::{MenuNode, MenuTree, NodeId};
use crate::plugins::BuiltinPlugins;
use crate::store::SnippetStore;
use crate::watcher::{self, IndexWatch};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tray_icon::menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem, Submenu};
use tray_icon::{TrayIcon, TrayIconBuilder};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy};
use winit::window::{Window, WindowId};
use wry::http::Request;
use wry::{WebView, WebViewBuilder};

const PLUGIN_PREFIX: &str = "plugin:";
const LAUNCH_PREFIX: &str = "launch:";
const PANEL_WIDTH: f64 = 560.0;
const PANEL_HEIGHT: f64 = 480.0;

type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcMessage {
    SaveSnippet {
        title: String,
        body: String,
        editing: Option<String>,
    },
    NewEntry,
    OpenEntry {
        value: String,
    },
    RenameEntry {
        value: String,
        title: String,
    },
    DeleteEntry {
        value: String,
    },
    MoveEntry {
        value: String,
        up: bool,
    },
    CopyEntry {
        value: String,
    },
    ApplyReplace {
        pattern: String,
        replacement: String,
    },
    SaveSettings {
        snippets_dir: String,
        theme: Theme,
        focus_workaround: bool,
    },
    Close,
}

#[derive(Debug)]
enum UserEvent {
    Menu(MenuEvent),
    Ipc(IpcMessage),
    IndexChanged,
    PluginDone(PluginOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PanelView {
    Hidden,
    Form(SnippetForm),
    List,
    Settings,
    About,
    Contents(String),
    Replace(String),
}

impl PanelView {
    fn name(&self) -> &'static str {
        match self {
            PanelView::Hidden => "hidden",
            PanelView::Form(_) => "form",
            PanelView::List => "list",
            PanelView::Settings => "settings",
            PanelView::About => "about",
            PanelView::Contents(_) => "contents",
            PanelView::Replace(_) => "replace",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            PanelView::Form(form) if form.editing.is_some() => "Edit snippet",
            PanelView::Form(_) => "New snippet",
            PanelView::List => "Edit list",
            PanelView::Settings => "Settings",
            PanelView::Contents(_) => "Clipboard contents",
            PanelView::Replace(_) => "Replace",
            PanelView::About | PanelView::Hidden => "About",
        }
    }
}

#[derive(Serialize)]
struct UiState {
    view: &'static str,
    form: Option<UiForm>,
    /// Clipboard text for the contents and replace views.
    contents: Option<String>,
    entries: Vec<UiEntry>,
    settings: UiSettings,
    about: UiAbout,
    error: Option<String>,
}

#[derive(Serialize)]
struct UiForm {
    title: String,
    body: String,
    editing: Option<String>,
}

#[derive(Serialize)]
struct UiEntry {
    key: String,
    value: String,
}

#[derive(Serialize)]
struct UiSettings {
    snippets_dir: String,
    theme: Theme,
    focus_workaround: bool,
}

#[derive(Serialize)]
struct UiAbout {
    name: &'static str,
    version: &'static str,
    description: &'static str,
    snippets_dir: String,
    launch_list: String,
}

struct Panel {
    window: Arc<Window>,
    webview: WebView,
}

struct TrayHandle {
    tray: TrayIcon,
    busy_shown: bool,
}

struct Snipmenu {
    settings: Settings,
    controller: Controller<SystemClipboard>,
    proxy: EventLoopProxy<UserEvent>,
    panel: Option<Panel>,
    tray: Option<TrayHandle>,
    view: PanelView,
    form_from_list: bool,
    error: Option<String>,
    watch: Option<IndexWatch>,
    fatal: Option<Box<dyn Error + Send + Sync>>,
}

impl Snipmenu {
    fn new(proxy: EventLoopProxy<UserEvent>) -> Self {
        let settings = match config::load_or_init() {
            Ok(settings) => settings,
            Err(err) => {
                error!("{err}; using default settings");
                Settings::default()
            }
        };
        let mut controller = Controller::new(
            open_store(&settings),
            SystemClipboard::default(),
            Arc::new(BuiltinPlugins),
            foreground_for(&settings),
            Box::new(ProcessLauncher),
        );
        controller.reload_launch_menu(&config::launch_list_path());
        let watch = start_watch(controller.store(), &proxy);

        Self {
            settings,
            controller,
            proxy,
            panel: None,
            tray: None,
            view: PanelView::Hidden,
            form_from_list: false,
            error: None,
            watch,
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: Box<dyn Error + Send + Sync>) {
        self.fatal = Some(err);
        event_loop.exit();
    }

    fn handle_menu(&mut self, event_loop: &ActiveEventLoop, event: MenuEvent) {
        let id = event.id.0.as_str();
        if let Some(command) = id.strip_prefix(PLUGIN_PREFIX) {
            self.run_plugin(command);
        } else if let Some(index) = id.strip_prefix(LAUNCH_PREFIX) {
            match index.parse::<usize>() {
                Ok(index) => {
                    self.controller.launch(index);
                }
                Err(_) => warn!("bad launch menu id '{id}'"),
            }
        } else {
            let step = self.controller.dispatch(Action::from_command(id));
            self.show_step(event_loop, step);
        }
    }

    fn run_plugin(&mut self, command: &str) {
        let proxy = self.proxy.clone();
        self.controller.start_plugin(
            command,
            || ClipboardBridge::new(SystemClipboard::default()).read(),
            move |outcome| {
                let _ = proxy.send_event(UserEvent::PluginDone(outcome));
            },
        );
    }

    fn show_step(&mut self, event_loop: &ActiveEventLoop, step: Step) {
        match step {
            Step::Done => {}
            Step::Quit => event_loop.exit(),
            Step::ShowSnippetForm(form) => {
                self.form_from_list = false;
                self.show_view(PanelView::Form(form));
            }
            Step::ShowList => self.show_view(PanelView::List),
            Step::ShowSettings => self.show_view(PanelView::Settings),
            Step::ShowAbout => self.show_view(PanelView::About),
            Step::ShowContents(text) => self.show_view(PanelView::Contents(text)),
            Step::ShowReplace(text) => self.show_view(PanelView::Replace(text)),
        }
    }

    fn show_view(&mut self, view: PanelView) {
        self.view = view;
        self.error = None;
        self.send_state();
        let Some(panel) = &self.panel else { return };
        panel.window.set_title(self.view.title());
        panel.window.set_visible(true);
        panel
            .window
            .request_user_attention(Some(winit::window::UserAttentionType::Informational));
        panel.window.focus_window();
    }

    fn close_panel(&mut self) {
        if let Some(panel) = &self.panel {
            panel.window.set_visible(false);
        }
        if self.view != PanelView::Hidden {
            self.view = PanelView::Hidden;
            self.form_from_list = false;
            if !self.controller.cancel_review() {
                self.controller.end_interaction();
            }
            self.send_state();
        }
    }

    fn handle_ipc(&mut self, msg: IpcMessage) {
        match msg {
            IpcMessage::SaveSnippet {
                title,
                body,
                editing,
            } => {
                let saved = match editing {
                    Some(value) => self.controller.edit_entry(&value, &title, &body).map(|_| ()),
                    None => self.controller.add_entry(&title, &body).map(|_| ()),
                };
                match saved {
                    Ok(()) if self.form_from_list => self.show_view(PanelView::List),
                    Ok(()) => self.close_panel(),
                    Err(err) => {
                        error!("failed to save snippet '{title}': {err}");
                        self.error = Some(err.to_string());
                        self.send_state();
                    }
                }
            }
            IpcMessage::NewEntry => {
                self.form_from_list = true;
                self.show_view(PanelView::Form(SnippetForm::default()));
            }
            IpcMessage::OpenEntry { value } => {
                if let Some(form) = self.controller.snippet_form(&value) {
                    self.form_from_list = true;
                    self.show_view(PanelView::Form(form));
                }
            }
            IpcMessage::RenameEntry { value, title } => {
                self.error = match self.controller.rename_entry(&value, &title) {
                    Ok(_) => None,
                    Err(err) => {
                        warn!("failed to rename {value}: {err}");
                        Some(err.to_string())
                    }
                };
                self.send_state();
            }
            IpcMessage::DeleteEntry { value } => {
                self.controller.delete_entry(&value);
                self.send_state();
            }
            IpcMessage::MoveEntry { value, up } => {
                let direction = if up { Direction::Up } else { Direction::Down };
                self.controller.move_entry(&value, direction);
                self.send_state();
            }
            IpcMessage::CopyEntry { value } => self.controller.copy_entry(&value),
            IpcMessage::ApplyReplace {
                pattern,
                replacement,
            } => match self.controller.finish_replace(&pattern, &replacement) {
                Ok(_) => self.close_panel(),
                Err(err) => {
                    self.error = Some(err.to_string());
                    self.send_state();
                }
            },
            IpcMessage::SaveSettings {
                snippets_dir,
                theme,
                focus_workaround,
            } => {
                self.apply_settings(Settings {
                    snippets_dir: PathBuf::from(snippets_dir.trim()),
                    theme,
                    focus_workaround,
                });
                self.close_panel();
            }
            IpcMessage::Close => {
                if matches!(self.view, PanelView::Form(_)) && self.form_from_list {
                    self.show_view(PanelView::List);
                } else {
                    self.close_panel();
                }
            }
        }
    }

    fn apply_settings(&mut self, settings: Settings) {
        if let Err(err) = config::save(&settings) {
            error!("{err}");
        }
        let moved = settings.snippets_dir != self.settings.snippets_dir;
        self.controller
            .apply_settings(open_store(&settings), foreground_for(&settings));
        if moved {
            self.watch = start_watch(self.controller.store(), &self.proxy);
        }
        if let Some(panel) = &self.panel {
            panel.window.set_theme(window_theme(settings.theme));
        }
        self.settings = settings;
    }

    fn send_state(&self) {
        let Some(panel) = &self.panel else { return };
        let form = match &self.view {
            PanelView::Form(form) => Some(UiForm {
                title: form.title.clone(),
                body: form.body.clone(),
                editing: form.editing.clone(),
            }),
            _ => None,
        };
        let contents = match &self.view {
            PanelView::Contents(text) | PanelView::Replace(text) => Some(text.clone()),
            _ => None,
        };
        let ui_state = UiState {
            view: self.view.name(),
            form,
            contents,
            entries: self
                .controller
                .entries()
                .iter()
                .map(|entry| UiEntry {
                    key: entry.key().to_string(),
                    value: entry.value().to_string(),
                })
                .collect(),
            settings: UiSettings {
                snippets_dir: self.settings.snippets_dir.display().to_string(),
                theme: self.settings.theme,
                focus_workaround: self.settings.focus_workaround,
            },
            about: UiAbout {
                name: env!("CARGO_PKG_NAME"),
                version: env!("CARGO_PKG_VERSION"),
                description: env!("CARGO_PKG_DESCRIPTION"),
                snippets_dir: self.controller.store().dir().display().to_string(),
                launch_list: config::launch_list_path().display().to_string(),
            },
            error: self.error.clone(),
        };

        if let Ok(payload) = serde_json::to_string(&ui_state) {
            let script = format!("window.__SET_STATE__({});", payload);
            let _ = panel.webview.evaluate_script(&script);
        }
    }

    /// Rebuilds the popup from current state and swaps the busy icon when needed.
    fn refresh_tray(&mut self) {
        let busy = self.controller.is_busy();
        let Some(handle) = &mut self.tray else { return };
        match build_menu(&self.controller) {
            Ok(menu) => handle.tray.set_menu(Some(Box::new(menu))),
            Err(err) => error!("failed to rebuild menu: {err}"),
        }
        if handle.busy_shown != busy {
            match load_icon(busy) {
                Ok(icon) => {
                    if let Err(err) = handle.tray.set_icon(Some(icon)) {
                        warn!("failed to swap tray icon: {err}");
                    }
                    handle.busy_shown = busy;
                }
                Err(err) => warn!("{err}"),
            }
        }
    }
}

impl ApplicationHandler<UserEvent> for Snipmenu {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.tray.is_some() {
            return;
        }

        // The tray is the only way in; without it there is nothing to run.
        let menu = match build_menu(&self.controller) {
            Ok(menu) => menu,
            Err(err) => return self.fail(event_loop, err),
        };
        let tray = match build_tray(menu) {
            Ok(t) => t,
            Err(e) => return self.fail(event_loop, format!("Failed to create tray: {e}").into()),
        };

        let window_attrs = Window::default_attributes()
            .with_title(env!("CARGO_PKG_NAME"))
            .with_visible(false)
            .with_theme(window_theme(self.settings.theme))
            .with_inner_size(LogicalSize::new(PANEL_WIDTH, PANEL_HEIGHT));

        let window = match event_loop.create_window(window_attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => return self.fail(event_loop, format!("Failed to create window: {e}").into()),
        };

        // Create webview as child to avoid winit contentView replacement panic
        // See: https://github.com/tauri-apps/wry/issues/1477
        let html = include_str!("../assets/panel.html");
        let proxy = self.proxy.clone();
        let webview = match WebViewBuilder::new()
            .with_html(html)
            .with_ipc_handler(move |req: Request<String>| {
                match serde_json::from_str::<IpcMessage>(req.body()) {
                    Ok(msg) => {
                        let _ = proxy.send_event(UserEvent::Ipc(msg));
                    }
                    Err(err) => warn!("ignoring panel message: {err}"),
                }
            })
            .with_bounds(wry::Rect {
                position: wry::dpi::Position::Logical(wry::dpi::LogicalPosition::new(0.0, 0.0)),
                size: wry::dpi::Size::Logical(wry::dpi::LogicalSize::new(
                    PANEL_WIDTH,
                    PANEL_HEIGHT,
                )),
            })
            .build_as_child(&window)
        {
            Ok(wv) => wv,
            Err(e) => {
                return self.fail(event_loop, format!("Failed to create webview: {e}").into());
            }
        };

        let menu_proxy = self.proxy.clone();
        std::thread::spawn(move || {
            let rx = MenuEvent::receiver();
            while let Ok(event) = rx.recv() {
                let _ = menu_proxy.send_event(UserEvent::Menu(event));
            }
        });

        self.panel = Some(Panel { window, webview });
        self.tray = Some(TrayHandle {
            tray,
            busy_shown: false,
        });
        info!(
            "{} ready with {} snippets",
            env!("CARGO_PKG_NAME"),
            self.controller.entries().len()
        );
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.close_panel();
                self.refresh_tray();
            }
            WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(panel) = &self.panel {
                    let _ = panel.webview.set_bounds(wry::Rect {
                        position: wry::dpi::Position::Logical(wry::dpi::LogicalPosition::new(
                            0.0, 0.0,
                        )),
                        size: wry::dpi::Size::Physical(wry::dpi::PhysicalSize::new(
                            size.width,
                            size.height,
                        )),
                    });
                }
            }
            _ => {}
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::Menu(event) => self.handle_menu(event_loop, event),
            UserEvent::Ipc(msg) => self.handle_ipc(msg),
            UserEvent::IndexChanged => {
                debug!("reloading snippets after external change");
                self.controller.reload();
                if self.view == PanelView::List {
                    self.send_state();
                }
            }
            UserEvent::PluginDone(outcome) => match self.controller.complete_plugin(outcome) {
                Ok(step) => self.show_step(event_loop, step),
                Err(err) => debug!("plugin finished with an error: {err}"),
            },
        }
        self.refresh_tray();
    }
}

pub fn run() -> AppResult<()> {
    // On macOS, set activation policy to accessory (no dock icon)
    #[cfg(target_os = "macos")]
    {
        use objc2_app_kit::{NSApplication, NSApplicationActivationPolicy};
        use objc2_foundation::MainThreadMarker;

        if let Some(mtm) = MainThreadMarker::new() {
            let app = NSApplication::sharedApplication(mtm);
            app.setActivationPolicy(NSApplicationActivationPolicy::Accessory);
        }
    }

    let event_loop = EventLoop::<UserEvent>::with_user_event()
        .build()
        .map_err(|e| format!("Failed to create event loop: {}", e))?;

    let proxy = event_loop.create_proxy();
    let mut app = Snipmenu::new(proxy);

    event_loop
        .run_app(&mut app)
        .map_err(|e| format!("Event loop error: {}", e))?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn open_store(settings: &Settings) -> SnippetStore {
    let store = SnippetStore::new(&settings.snippets_dir);
    if let Err(err) = std::fs::create_dir_all(store.dir()) {
        warn!(
            "failed to create snippets directory {}: {err}",
            store.dir().display()
        );
    }
    store
}

fn foreground_for(settings: &Settings) -> Arc<dyn ForegroundApps> {
    if settings.focus_workaround {
        Arc::new(SystemForeground)
    } else {
        Arc::new(NoFocus)
    }
}

/// Registers the index watch; failure leaves the menu static.
fn start_watch(store: &SnippetStore, proxy: &EventLoopProxy<UserEvent>) -> Option<IndexWatch> {
    let proxy = proxy.clone();
    match watcher::watch_index(&store.index_path(), move || {
        let _ = proxy.send_event(UserEvent::IndexChanged);
    }) {
        Ok(watch) => Some(watch),
        Err(err) => {
            error!("{err}; external edits will not be picked up");
            None
        }
    }
}

fn window_theme(theme: Theme) -> Option<winit::window::Theme> {
    match theme {
        Theme::System => None,
        Theme::Light => Some(winit::window::Theme::Light),
        Theme::Dark => Some(winit::window::Theme::Dark),
    }
}

fn build_menu(controller: &Controller<SystemClipboard>) -> AppResult<Menu> {
    let menu = Menu::new();

    let snippets = controller.snippet_menu();
    for &child in snippets.children(snippets.root()) {
        match snippets.node(child) {
            MenuNode::Leaf { label, action } => {
                let enabled = controller.item_enabled(action);
                menu.append(&MenuItem::with_id(action.as_str(), label, enabled, None))
                    .map_err(boxed)?;
            }
            MenuNode::Separator => menu.append(&PredefinedMenuItem::separator()).map_err(boxed)?,
            MenuNode::Group { .. } => {}
        }
    }

    let plugin_enabled = controller.item_enabled(PLUGIN_PREFIX);
    let plugins = Submenu::new("Clipboard", plugin_enabled);
    let mut reviewed = false;
    for (label, command) in controller.plugin_items() {
        let review = controller.plugin_review(&command).is_some();
        if reviewed && !review {
            plugins
                .append(&PredefinedMenuItem::separator())
                .map_err(boxed)?;
        }
        reviewed = review;
        let id = format!("{PLUGIN_PREFIX}{command}");
        plugins
            .append(&MenuItem::with_id(id, label, plugin_enabled, None))
            .map_err(boxed)?;
    }
    menu.append(&plugins).map_err(boxed)?;
    menu.append(&PredefinedMenuItem::separator()).map_err(boxed)?;

    for (id, label) in [
        (CMD_READ_CLIPBOARD, "Get from clipboard"),
        (CMD_EDIT_LIST, "Edit list"),
    ] {
        let item = MenuItem::with_id(id, label, controller.item_enabled(id), None);
        menu.append(&item).map_err(boxed)?;
    }
    menu.append(&PredefinedMenuItem::separator()).map_err(boxed)?;

    for (id, label) in [(CMD_ABOUT, "About"), (CMD_SETTINGS, "Settings")] {
        let item = MenuItem::with_id(id, label, controller.item_enabled(id), None);
        menu.append(&item).map_err(boxed)?;
    }

    let launch = controller.launch_menu();
    if !launch.is_empty() {
        let enabled = controller.item_enabled(LAUNCH_PREFIX);
        let submenu = Submenu::new(LAUNCH_MENU_LABEL, enabled);
        append_launch_nodes(launch, launch.root(), &submenu, enabled)?;
        menu.append(&submenu).map_err(boxed)?;
    }

    menu.append(&PredefinedMenuItem::separator()).map_err(boxed)?;
    menu.append(&MenuItem::with_id(CMD_QUIT, "Quit", true, None))
        .map_err(boxed)?;
    Ok(menu)
}

fn append_launch_nodes(
    tree: &MenuTree,
    group: NodeId,
    parent: &Submenu,
    enabled: bool,
) -> AppResult<()> {
    for &child in tree.children(group) {
        match tree.node(child) {
            MenuNode::Group { label, .. } => {
                let submenu = Submenu::new(label, enabled);
                append_launch_nodes(tree, child, &submenu, enabled)?;
                parent.append(&submenu).map_err(boxed)?;
            }
            MenuNode::Leaf { label, .. } => {
                let id = format!("{LAUNCH_PREFIX}{}", child.index());
                parent
                    .append(&MenuItem::with_id(id, label, enabled, None))
                    .map_err(boxed)?;
            }
            MenuNode::Separator => parent
                .append(&PredefinedMenuItem::separator())
                .map_err(boxed)?,
        }
    }
    Ok(())
}

fn build_tray(menu: Menu) -> AppResult<TrayIcon> {
    let icon = load_icon(false)?;
    let tray = TrayIconBuilder::new()
        .with_menu(Box::new(menu))
        .with_tooltip(env!("CARGO_PKG_NAME"))
        .with_icon(icon)
        .build()
        .map_err(boxed)?;
    Ok(tray)
}

fn boxed<E: Error + Send + Sync + 'static>(err: E) -> Box<dyn Error + Send + Sync> {
    Box::new(err)
}

fn load_icon(busy: bool) -> Result<tray_icon::Icon, Box<dyn Error + Send + Sync>> {
    let bytes: &[u8] = if busy {
        include_bytes!("../assets/icon-busy.png")
    } else {
        include_bytes!("../assets/icon.png")
    };
    let image =
        image::load_from_memory(bytes).map_err(|e| format!("Failed to decode icon: {}", e))?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    tray_icon::Icon::from_rgba(rgba.into_raw(), width, height)
        .map_err(|e| format!("Failed to create icon: {}", e).into())
}
