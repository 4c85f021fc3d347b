use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use chrono::{DateTime, Local};
use log::{debug, warn};

use crate::filesystem::{FileSystem, FsError, Result};
use crate::item::SIZE_UNAVAILABLE;

const HELP_TEXT: &str = "\
Commands:
  ls | dir              list the current directory
  cd <path>             change the current directory
  pwd                   print the current directory
  mkdir <name>          create a directory (parents included)
  touch <name>          create or truncate an empty file
  del | rm <path>       delete a file or directory tree
  cp <src> <dst> [-f]   copy a file or directory tree (-f overwrites files)
  mv <src> <dst>        move a file or directory
  du [path]             total size of a directory tree
  edit <name>           open a file in its associated program
  clear                 clear the screen
  help                  show this summary
  exit                  leave the shell";

enum LoopAction {
    Continue,
    Exit,
}

/// Read-execute-print loop over a [`FileSystem`].
///
/// Generic over the filesystem and the output sink so tests can drive it
/// against the in-memory mock and a byte buffer.
pub struct Shell<FS: FileSystem, W: Write> {
    filesystem: FS,
    out: W,
}

impl<FS: FileSystem, W: Write> Shell<FS, W> {
    pub fn new(filesystem: FS, out: W) -> Self {
        Self { filesystem, out }
    }

    /// Runs the loop until `exit`, end of input, or an output failure.
    /// Command failures are reported and never end the loop.
    pub fn run(&mut self, input: impl BufRead) -> Result<()> {
        let mut lines = input.lines();

        loop {
            let cwd = self.filesystem.current_directory()?;
            write!(self.out, "{}> ", cwd.display())?;
            self.out.flush()?;

            let line = match lines.next() {
                Some(line) => line?,
                None => break,
            };

            match self.dispatch(&line)? {
                LoopAction::Exit => break,
                LoopAction::Continue => {}
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, line: &str) -> Result<LoopAction> {
        let mut tokens = line.split_whitespace();
        let command = match tokens.next() {
            Some(token) => token.to_lowercase(),
            None => return Ok(LoopAction::Continue),
        };
        let args: Vec<&str> = tokens.collect();

        debug!("dispatching {:?} with {} arg(s)", command, args.len());

        let outcome = match command.as_str() {
            "ls" | "dir" => self.list(),
            "cd" => self.change_directory(&args),
            "pwd" => self.print_working_directory(),
            "mkdir" => self.make_directory(&args),
            "touch" => self.create_file(&args),
            "del" | "rm" => self.delete(&args),
            "cp" => self.copy(&args),
            "mv" => self.move_path(&args),
            "du" => self.disk_usage(&args),
            "edit" => self.edit(&args),
            "clear" => self.clear(),
            "help" => self.help(),
            "exit" => return Ok(LoopAction::Exit),
            other => {
                writeln!(self.out, "unknown command: {} (try 'help')", other)?;
                Ok(())
            }
        };

        // Sole top-level handler: report and keep the loop alive
        if let Err(err) = outcome {
            warn!("{} failed: {}", command, err);
            writeln!(self.out, "error: {}", err)?;
        }
        Ok(LoopAction::Continue)
    }

    /// Resolves a user-typed path against the working directory, with `~`
    /// expanding to the home directory.
    fn resolve(&self, raw: &str) -> Result<PathBuf> {
        if raw == "~" {
            if let Some(home) = dirs::home_dir() {
                return Ok(home);
            }
        } else if let Some(rest) = raw.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return Ok(home.join(rest));
            }
        }

        let path = Path::new(raw);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.filesystem.current_directory()?.join(path))
        }
    }

    fn list(&mut self) -> Result<()> {
        let cwd = self.filesystem.current_directory()?;
        let items = self.filesystem.list_items(&cwd)?;

        if items.is_empty() {
            writeln!(self.out, "(empty)")?;
            return Ok(());
        }

        writeln!(
            self.out,
            "{:<5} {:<32} {:>16} {}",
            "TYPE", "NAME", "SIZE", "CREATED"
        )?;
        writeln!(self.out, "{}", "-".repeat(72))?;

        for item in items {
            let kind = if item.is_directory() { "DIR" } else { "FILE" };
            let size = if item.is_directory() {
                "<DIR>".to_string()
            } else {
                format!("{} bytes", item.size(&self.filesystem)?)
            };
            let created: DateTime<Local> = item.created().into();

            writeln!(
                self.out,
                "{:<5} {:<32} {:>16} {}",
                kind,
                item.name(),
                size,
                created.format("%Y-%m-%d %H:%M")
            )?;
        }
        Ok(())
    }

    fn change_directory(&mut self, args: &[&str]) -> Result<()> {
        let [raw] = args else {
            writeln!(self.out, "usage: cd <path>")?;
            return Ok(());
        };
        let path = self.resolve(raw)?;
        self.filesystem.set_current_directory(&path)
    }

    fn print_working_directory(&mut self) -> Result<()> {
        let cwd = self.filesystem.current_directory()?;
        writeln!(self.out, "{}", cwd.display())?;
        Ok(())
    }

    fn make_directory(&mut self, args: &[&str]) -> Result<()> {
        let Some(raw) = args.first() else {
            writeln!(self.out, "usage: mkdir <name>")?;
            return Ok(());
        };
        let path = self.resolve(raw)?;
        self.filesystem.create_directory(&path)
    }

    fn create_file(&mut self, args: &[&str]) -> Result<()> {
        let Some(raw) = args.first() else {
            writeln!(self.out, "usage: touch <name>")?;
            return Ok(());
        };
        let path = self.resolve(raw)?;
        self.filesystem.create_file(&path)
    }

    fn delete(&mut self, args: &[&str]) -> Result<()> {
        let Some(raw) = args.first() else {
            writeln!(self.out, "usage: del <path>")?;
            return Ok(());
        };
        let path = self.resolve(raw)?;
        if !self.filesystem.exists(&path)? {
            return Err(FsError::NotFound(path));
        }
        self.filesystem.delete(&path)
    }

    fn copy(&mut self, args: &[&str]) -> Result<()> {
        let overwrite = args.contains(&"-f");
        let paths: Vec<&str> = args.iter().filter(|a| **a != "-f").copied().collect();
        let [source, destination] = paths.as_slice() else {
            writeln!(self.out, "usage: cp <source> <destination> [-f]")?;
            return Ok(());
        };

        let source = self.resolve(source)?;
        let destination = self.resolve(destination)?;
        self.filesystem.copy(&source, &destination, overwrite)
    }

    fn move_path(&mut self, args: &[&str]) -> Result<()> {
        let [source, destination] = args else {
            writeln!(self.out, "usage: mv <source> <destination>")?;
            return Ok(());
        };

        let source = self.resolve(source)?;
        let destination = self.resolve(destination)?;
        self.filesystem.rename(&source, &destination)
    }

    fn disk_usage(&mut self, args: &[&str]) -> Result<()> {
        let path = match args.first() {
            Some(raw) => self.resolve(raw)?,
            None => self.filesystem.current_directory()?,
        };

        let item = self.filesystem.item(&path)?;
        match item.size(&self.filesystem)? {
            SIZE_UNAVAILABLE => {
                writeln!(
                    self.out,
                    "{}: size unavailable (permission denied)",
                    path.display()
                )?;
            }
            size => writeln!(self.out, "{}: {} bytes", path.display(), size)?,
        }
        Ok(())
    }

    fn edit(&mut self, args: &[&str]) -> Result<()> {
        let [raw] = args else {
            writeln!(self.out, "usage: edit <name>")?;
            return Ok(());
        };
        let path = self.resolve(raw)?;
        if !self.filesystem.exists(&path)? {
            return Err(FsError::NotFound(path));
        }
        spawn_editor(&path)
    }

    fn clear(&mut self) -> Result<()> {
        // ANSI erase display + cursor home
        write!(self.out, "\x1b[2J\x1b[1;1H")?;
        Ok(())
    }

    fn help(&mut self) -> Result<()> {
        writeln!(self.out, "{}", HELP_TEXT)?;
        Ok(())
    }
}

/// Fire and forget: the child's exit status is never observed.
fn spawn_editor(path: &Path) -> Result<()> {
    let mut command = opener_command(path);
    debug!("spawning {:?}", command);
    command.spawn()?;
    Ok(())
}

#[cfg(target_os = "windows")]
fn opener_command(path: &Path) -> process::Command {
    let mut command = process::Command::new("cmd");
    command.args(["/C", "start", ""]).arg(path);
    command
}

#[cfg(target_os = "macos")]
fn opener_command(path: &Path) -> process::Command {
    let mut command = process::Command::new("open");
    command.arg(path);
    command
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn opener_command(path: &Path) -> process::Command {
    let mut command = process::Command::new("xdg-open");
    command.arg(path);
    command
}
