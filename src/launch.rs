use crate::menu::{self, MenuTree};
use log::{debug, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};

pub const LAUNCH_MENU_LABEL: &str = "Launch";

#[derive(thiserror::Error, Debug)]
pub enum LaunchError {
    #[error("empty command line")]
    Empty,
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait Launcher {
    fn execute(&self, argv: &[String]) -> Result<(), LaunchError>;
}

/// Starts commands detached from our stdio.
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn execute(&self, argv: &[String]) -> Result<(), LaunchError> {
        let (program, args) = argv.split_first().ok_or(LaunchError::Empty)?;
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: program.clone(),
                source,
            })?;
        debug!("launched {argv:?}");
        Ok(())
    }
}

/// Tokenizes a launch item's command line and runs it.
pub fn run_command_line(launcher: &dyn Launcher, line: &str) -> Result<(), LaunchError> {
    launcher.execute(&menu::tokenize_command_line(line))
}

/// Parses the launch list; an unreadable or missing file yields an empty menu.
pub fn load_launch_menu(path: &Path) -> MenuTree {
    match fs::read(path) {
        Ok(bytes) => menu::parse_launch_list(&String::from_utf8_lossy(&bytes), LAUNCH_MENU_LABEL),
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                warn!("failed to read {}: {err}", path.display());
            }
            MenuTree::new(LAUNCH_MENU_LABEL)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LAUNCH_LIST_FILE_NAME;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingLauncher {
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl Launcher for RecordingLauncher {
        fn execute(&self, argv: &[String]) -> Result<(), LaunchError> {
            if argv.is_empty() {
                return Err(LaunchError::Empty);
            }
            self.calls.borrow_mut().push(argv.to_vec());
            Ok(())
        }
    }

    #[test]
    fn command_line_is_tokenized_before_launch() {
        let launcher = RecordingLauncher::default();
        run_command_line(&launcher, "\"/opt/My App/run\" --fast").unwrap();
        assert_eq!(launcher.calls.borrow()[0], ["/opt/My App/run", "--fast"]);
    }

    #[test]
    fn blank_command_line_fails() {
        assert!(matches!(
            run_command_line(&ProcessLauncher, "   "),
            Err(LaunchError::Empty)
        ));
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let result = run_command_line(&ProcessLauncher, "/definitely/not/a/program-xyz");
        assert!(matches!(result, Err(LaunchError::Spawn { .. })));
    }

    #[test]
    fn missing_launch_list_is_an_empty_menu() {
        let dir = tempfile::tempdir().unwrap();
        let tree = load_launch_menu(&dir.path().join(LAUNCH_LIST_FILE_NAME));
        assert!(tree.is_empty());
    }

    #[test]
    fn launch_list_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LAUNCH_LIST_FILE_NAME);
        fs::write(&path, ">> Tools\nTop=top\n..\nShell=sh").unwrap();
        let tree = load_launch_menu(&path);
        assert_eq!(tree.children(tree.root()).len(), 2);
        assert_eq!(tree.depth(), 1);
    }
}
