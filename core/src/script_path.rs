//! Script and interpreter path resolution.
//!
//! Resolution is pure: it computes the working directory the interpreter
//! should be started in instead of changing the current process directory.

use std::path::{Component, Path, PathBuf};

use crate::config::InterpreterConfig;
use crate::error::SpawnError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptTarget {
    /// Run the file directly (`python script.py`).
    File(PathBuf),
    /// Run as a module (`python -m pkg.sub.main`).
    Module(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScript {
    pub working_dir: PathBuf,
    pub target: ScriptTarget,
    pub interpreter: PathBuf,
}

pub fn resolve_script(
    script: &Path,
    cwd: &Path,
    interpreter: &InterpreterConfig,
) -> Result<ResolvedScript, SpawnError> {
    if script.as_os_str().is_empty() {
        return Err(SpawnError::InvalidScript("script path is empty".into()));
    }
    // The child is started inside `cwd`, so every path handed to it must
    // already be absolute or it would be resolved a second time.
    let cwd = std::path::absolute(cwd).map_err(|source| SpawnError::WorkingDir {
        path: cwd.display().to_string(),
        source,
    })?;
    let cwd = cwd.as_path();
    let interpreter_path = rewrite_interpreter_path(&interpreter.path, cwd);

    if !interpreter.module_mode {
        return Ok(ResolvedScript {
            working_dir: cwd.to_path_buf(),
            target: ScriptTarget::File(script.to_path_buf()),
            interpreter: interpreter_path,
        });
    }

    let relative = if script.is_absolute() {
        script.strip_prefix(cwd).ok()
    } else {
        Some(script)
    };

    if let Some(rel) = relative {
        if let Some(module) = module_name(rel) {
            return Ok(ResolvedScript {
                working_dir: cwd.to_path_buf(),
                target: ScriptTarget::Module(module),
                interpreter: interpreter_path,
            });
        }
    }

    // Outside the caller's tree (or climbing with `..`): run the bare module
    // from the directory that contains it.
    let absolute = if script.is_absolute() {
        script.to_path_buf()
    } else {
        cwd.join(script)
    };
    let parent = absolute
        .parent()
        .ok_or_else(|| SpawnError::InvalidScript(script.display().to_string()))?;
    let stem = absolute
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SpawnError::InvalidScript(script.display().to_string()))?;

    Ok(ResolvedScript {
        working_dir: parent.to_path_buf(),
        target: ScriptTarget::Module(stem.to_string()),
        interpreter: interpreter_path,
    })
}

/// A relative interpreter path with a directory part was written against the
/// caller's directory; anchor it there so a different child cwd does not
/// break it. Bare names are left for `PATH` lookup.
pub fn rewrite_interpreter_path(raw: &str, cwd: &Path) -> PathBuf {
    let p = Path::new(raw);
    if p.is_relative() && p.components().count() > 1 {
        cwd.join(p)
    } else {
        p.to_path_buf()
    }
}

fn module_name(rel: &Path) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut components = rel.components().peekable();
    while let Some(component) = components.next() {
        match component {
            Component::CurDir => continue,
            Component::Normal(os) => {
                let is_last = components.peek().is_none();
                let part = if is_last {
                    Path::new(os).file_stem()?.to_str()?
                } else {
                    os.to_str()?
                };
                if part.is_empty() {
                    return None;
                }
                parts.push(part.to_string());
            }
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(module_mode: bool, path: &str) -> InterpreterConfig {
        InterpreterConfig {
            module_mode,
            path: path.to_string(),
            ..InterpreterConfig::default()
        }
    }

    #[test]
    fn file_mode_keeps_script_and_cwd() {
        let r = resolve_script(Path::new("logic/main.py"), Path::new("/app"), &cfg(false, "python3"))
            .unwrap();
        assert_eq!(r.working_dir, PathBuf::from("/app"));
        assert_eq!(r.target, ScriptTarget::File(PathBuf::from("logic/main.py")));
        assert_eq!(r.interpreter, PathBuf::from("python3"));
    }

    #[test]
    fn nested_script_becomes_dotted_module() {
        let r = resolve_script(
            Path::new("./logic/steps/main.py"),
            Path::new("/app"),
            &cfg(true, "python3"),
        )
        .unwrap();
        assert_eq!(r.working_dir, PathBuf::from("/app"));
        assert_eq!(r.target, ScriptTarget::Module("logic.steps.main".into()));
    }

    #[test]
    fn absolute_script_inside_cwd_is_made_relative() {
        let r = resolve_script(
            Path::new("/app/logic/main.py"),
            Path::new("/app"),
            &cfg(true, "python3"),
        )
        .unwrap();
        assert_eq!(r.target, ScriptTarget::Module("logic.main".into()));
        assert_eq!(r.working_dir, PathBuf::from("/app"));
    }

    #[test]
    fn script_outside_cwd_runs_from_its_parent() {
        let r = resolve_script(
            Path::new("/opt/tools/runner.py"),
            Path::new("/app"),
            &cfg(true, "python3"),
        )
        .unwrap();
        assert_eq!(r.working_dir, PathBuf::from("/opt/tools"));
        assert_eq!(r.target, ScriptTarget::Module("runner".into()));
    }

    #[test]
    fn parent_dir_component_falls_back_to_parent() {
        let r = resolve_script(
            Path::new("../shared/job.py"),
            Path::new("/app/sub"),
            &cfg(true, "python3"),
        )
        .unwrap();
        assert_eq!(r.working_dir, PathBuf::from("/app/sub/../shared"));
        assert_eq!(r.target, ScriptTarget::Module("job".into()));
    }

    #[test]
    fn relative_interpreter_path_is_anchored_to_cwd() {
        let r = resolve_script(
            Path::new("main.py"),
            Path::new("/app"),
            &cfg(true, "venv/bin/python"),
        )
        .unwrap();
        assert_eq!(r.interpreter, PathBuf::from("/app/venv/bin/python"));
        assert_eq!(r.target, ScriptTarget::Module("main".into()));
    }

    #[test]
    fn relative_cwd_is_made_absolute() {
        let here = std::env::current_dir().unwrap();
        let r = resolve_script(
            Path::new("main.py"),
            Path::new("rel/dir"),
            &cfg(false, "venv/bin/python"),
        )
        .unwrap();
        assert_eq!(r.working_dir, here.join("rel/dir"));
        assert_eq!(r.interpreter, here.join("rel/dir/venv/bin/python"));
        assert_eq!(r.target, ScriptTarget::File(PathBuf::from("main.py")));

        let r = resolve_script(Path::new("pkg/job.py"), Path::new("rel"), &cfg(true, "python3"))
            .unwrap();
        assert_eq!(r.working_dir, here.join("rel"));
        assert_eq!(r.target, ScriptTarget::Module("pkg.job".into()));
        assert_eq!(r.interpreter, PathBuf::from("python3"));
    }

    #[test]
    fn empty_script_is_rejected() {
        let err = resolve_script(Path::new(""), Path::new("/app"), &cfg(true, "python3")).unwrap_err();
        assert!(matches!(err, SpawnError::InvalidScript(_)));
    }
}
