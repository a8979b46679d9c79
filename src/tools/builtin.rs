//! Built-in local tool packs
//!
//! - `files` - basic file management (`ls`, `cat`, `mkdir`, `mv`, `cp`,
//!   `rm`, `write_to_file`, `find_lines_in_file`)
//! - `system` - host information (`get_system_info`, `current_time`)
//! - `network` - `read_page`, `download_document` (see [`super::network`])
//!
//! Paths are resolved against the process working directory.

use std::fs;
use std::io::Write;
use std::path::Path;

use super::{LocalProvider, ParamSpec, ParamType, ToolArgs, ToolOutput};

/// Names accepted in `tools.builtin`
pub const PACKS: &[&str] = &["files", "system", "network"];

/// Look up a pack by name
pub fn pack(name: &str) -> Option<LocalProvider> {
    match name {
        "files" => Some(files()),
        "system" => Some(system()),
        "network" => Some(super::network::pack()),
        _ => None,
    }
}

pub fn files() -> LocalProvider {
    use ParamType::String as Str;

    LocalProvider::new("builtin:files")
        .function(
            "ls",
            "List the entries of a directory, directories first with a trailing '/'.",
            vec![ParamSpec::optional("directory", Str).describe("Directory to list, defaults to '.'")],
            ls,
        )
        .function(
            "cat",
            "Read a UTF-8 text file and return its contents.",
            vec![ParamSpec::required("filepath", Str)],
            cat,
        )
        .function(
            "mkdir",
            "Create a directory, including missing parents.",
            vec![ParamSpec::required("directory", Str)],
            mkdir,
        )
        .function(
            "mv",
            "Move or rename a file or directory.",
            vec![
                ParamSpec::required("source", Str),
                ParamSpec::required("destination", Str),
            ],
            mv,
        )
        .function(
            "cp",
            "Copy a file, or a directory recursively.",
            vec![
                ParamSpec::required("source", Str),
                ParamSpec::required("destination", Str),
            ],
            cp,
        )
        .function(
            "rm",
            "Delete a file, or a directory with everything in it.",
            vec![ParamSpec::required("path", Str)],
            rm,
        )
        .function(
            "write_to_file",
            "Write text to a file. mode 'w' overwrites (default), 'a' appends. \
             Escapes such as \\n and \\t in text are expanded.",
            vec![
                ParamSpec::required("text", Str),
                ParamSpec::required("filepath", Str),
                ParamSpec::optional("mode", Str).describe("'w' or 'a'"),
            ],
            write_to_file,
        )
        .function(
            "find_lines_in_file",
            "Return the numbered lines of a text file that contain a keyword.",
            vec![
                ParamSpec::required("filepath", Str),
                ParamSpec::required("keyword", Str),
            ],
            find_lines_in_file,
        )
}

pub fn system() -> LocalProvider {
    LocalProvider::new("builtin:system")
        .function(
            "get_system_info",
            "Describe the host: operating system, architecture, CPU count and working directory.",
            vec![],
            get_system_info,
        )
        .function(
            "current_time",
            "Current local date and time in RFC 3339 format.",
            vec![],
            |_| Ok(chrono::Local::now().to_rfc3339()),
        )
}

fn ls(args: ToolArgs) -> ToolOutput {
    let directory = args.str_or("directory", ".");
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            dirs.push(format!("{}/", name));
        } else {
            files.push(name);
        }
    }
    dirs.sort();
    files.sort();

    if dirs.is_empty() && files.is_empty() {
        return Ok(format!("{} is empty", directory));
    }
    dirs.extend(files);
    Ok(dirs.join("\n"))
}

fn cat(args: ToolArgs) -> ToolOutput {
    Ok(fs::read_to_string(args.str("filepath")?)?)
}

fn mkdir(args: ToolArgs) -> ToolOutput {
    let directory = args.str("directory")?;
    fs::create_dir_all(directory)?;
    Ok(format!("Created directory {}", directory))
}

fn mv(args: ToolArgs) -> ToolOutput {
    let source = args.str("source")?;
    let destination = args.str("destination")?;
    if !Path::new(source).exists() {
        return Err(format!("source does not exist: {}", source).into());
    }
    fs::rename(source, destination)?;
    Ok(format!("Moved {} to {}", source, destination))
}

fn cp(args: ToolArgs) -> ToolOutput {
    let source = Path::new(args.str("source")?);
    let destination = Path::new(args.str("destination")?);
    if !source.exists() {
        return Err(format!("source does not exist: {}", source.display()).into());
    }
    if source.is_dir() {
        copy_dir(source, destination)?;
    } else {
        fs::copy(source, destination)?;
    }
    Ok(format!("Copied {} to {}", source.display(), destination.display()))
}

fn copy_dir(source: &Path, destination: &Path) -> std::io::Result<()> {
    fs::create_dir_all(destination)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = destination.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

fn rm(args: ToolArgs) -> ToolOutput {
    let path = Path::new(args.str("path")?);
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    } else if path.exists() {
        fs::remove_file(path)?;
    } else {
        return Err(format!("path does not exist: {}", path.display()).into());
    }
    Ok(format!("Deleted {}", path.display()))
}

fn write_to_file(args: ToolArgs) -> ToolOutput {
    let text = unescape(args.str("text")?);
    let filepath = args.str("filepath")?;
    let mode = args.str_or("mode", "w");

    let mut options = fs::OpenOptions::new();
    match mode {
        "w" => options.write(true).create(true).truncate(true),
        "a" => options.append(true).create(true),
        other => return Err(format!("mode must be 'w' or 'a', got '{}'", other).into()),
    };

    if let Some(parent) = Path::new(filepath).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = options.open(filepath)?;
    file.write_all(text.as_bytes())?;
    Ok(format!("Wrote {} bytes to {}", text.len(), filepath))
}

fn find_lines_in_file(args: ToolArgs) -> ToolOutput {
    let filepath = args.str("filepath")?;
    let keyword = args.str("keyword")?;
    let content = fs::read_to_string(filepath)?;

    let hits: Vec<String> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| line.contains(keyword))
        .map(|(i, line)| format!("{}: {}", i + 1, line))
        .collect();

    if hits.is_empty() {
        Ok(format!("No lines containing '{}' in {}", keyword, filepath))
    } else {
        Ok(hits.join("\n"))
    }
}

fn get_system_info(_: ToolArgs) -> ToolOutput {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let cwd = std::env::current_dir()?;
    Ok(format!(
        "os: {}\nfamily: {}\narch: {}\ncpus: {}\ncwd: {}",
        std::env::consts::OS,
        std::env::consts::FAMILY,
        std::env::consts::ARCH,
        cpus,
        cwd.display()
    ))
}

/// Expand the escapes models write literally inside a single command line
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
