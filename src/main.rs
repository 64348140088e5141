mod app;
mod clipboard;
mod config;
mod controller;
mod invoker;
mod launch;
mod menu;
mod plugins;
mod store;
mod watcher;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = app::run() {
        log::error!("snipmenu failed: {err}");
        std::process::exit(1);
    }
}
