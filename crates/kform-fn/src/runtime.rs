//! Process backends that run a function over a `ResourceList`
//!
//! Every backend builds a [`Command`] that reads a `ResourceList` on stdin and
//! writes one on stdout. [`run`] feeds the input from a helper thread while the
//! output is drained, so neither pipe can fill up and block the other.

use std::fmt;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::thread;

use crate::error::{FnError, Result};

/// Container CLI used when none is configured
pub const DEFAULT_CONTAINER_BINARY: &str = "docker";
/// Interpreter used for script functions when none is configured
pub const DEFAULT_SCRIPT_INTERPRETER: &str = "starlark";
/// Environment variable holding the script function's name
pub const FUNCTION_NAME_ENV: &str = "KFORM_FUNCTION_NAME";

/// A way to start a function process
pub trait Runtime: fmt::Debug {
    fn command(&self) -> Command;

    /// Name used in logs and errors
    fn name(&self) -> &str;
}

/// A host path mounted into a container, parsed from
/// `type=bind,src=/host,dst=/container`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageMount {
    pub mount_type: String,
    pub src: String,
    pub dst: String,
}

impl StorageMount {
    /// `--mount` argument; mounts are always read-only
    pub fn to_arg(&self) -> String {
        format!(
            "type={},source={},target={},readonly",
            self.mount_type, self.src, self.dst
        )
    }
}

impl FromStr for StorageMount {
    type Err = FnError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |message: &str| FnError::InvalidMount {
            mount: s.to_string(),
            message: message.to_string(),
        };

        let (mut mount_type, mut src, mut dst) = (None, None, None);
        for field in s.split(',') {
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| invalid("expected comma separated key=value pairs"))?;
            match key.trim() {
                "type" => mount_type = Some(value.trim()),
                "src" | "source" => src = Some(value.trim()),
                "dst" | "target" | "destination" => dst = Some(value.trim()),
                other => return Err(invalid(&format!("unknown key '{}'", other))),
            }
        }

        match (mount_type, src, dst) {
            (Some(mount_type), Some(src), Some(dst))
                if !mount_type.is_empty() && !src.is_empty() && !dst.is_empty() =>
            {
                Ok(Self {
                    mount_type: mount_type.to_string(),
                    src: src.to_string(),
                    dst: dst.to_string(),
                })
            }
            _ => Err(invalid("type, src and dst are all required")),
        }
    }
}

/// Runs a function image with the container CLI
#[derive(Debug, Clone)]
pub struct ContainerRuntime {
    pub binary: String,
    pub image: String,
    /// Network to attach; `None` runs without network
    pub network: Option<String>,
    pub mounts: Vec<StorageMount>,
}

impl ContainerRuntime {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            binary: DEFAULT_CONTAINER_BINARY.to_string(),
            image: image.into(),
            network: None,
            mounts: Vec::new(),
        }
    }

    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["run", "--rm", "-i", "--network"]
            .into_iter()
            .map(String::from)
            .collect();
        args.push(self.network.clone().unwrap_or_else(|| "none".to_string()));
        args.extend(
            ["--user", "nobody", "--security-opt=no-new-privileges"]
                .into_iter()
                .map(String::from),
        );
        for mount in &self.mounts {
            args.push("--mount".to_string());
            args.push(mount.to_arg());
        }
        args.push(self.image.clone());
        args
    }
}

impl Runtime for ContainerRuntime {
    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(self.args());
        command
    }

    fn name(&self) -> &str {
        &self.image
    }
}

/// Runs a script with a local interpreter
#[derive(Debug, Clone)]
pub struct ScriptRuntime {
    pub interpreter: String,
    pub path: PathBuf,
    pub name: String,
}

impl ScriptRuntime {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            interpreter: DEFAULT_SCRIPT_INTERPRETER.to_string(),
            path: path.into(),
            name: name.into(),
        }
    }
}

impl Runtime for ScriptRuntime {
    fn command(&self) -> Command {
        let mut command = Command::new(&self.interpreter);
        command.arg(&self.path).env(FUNCTION_NAME_ENV, &self.name);
        command
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Run a function to completion and return what it wrote on stdout
pub fn run(runtime: &dyn Runtime, input: String) -> Result<String> {
    let function = runtime.name().to_string();
    let mut command = runtime.command();
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    tracing::debug!(function = %function, command = ?command, "starting function");
    let mut child = command.spawn().map_err(|e| FnError::ExecutionFailed {
        function: function.clone(),
        status: -1,
        stderr: format!("failed to start {:?}: {}", command.get_program(), e),
    })?;

    let writer = child.stdin.take().map(|mut stdin| {
        thread::spawn(move || stdin.write_all(input.as_bytes()))
    });
    let output = child.wait_with_output()?;

    if let Some(writer) = writer {
        match writer.join() {
            Ok(Err(e)) if e.kind() != ErrorKind::BrokenPipe => return Err(e.into()),
            Err(_) => {
                return Err(std::io::Error::other("stdin writer thread panicked").into());
            }
            _ => {}
        }
    }

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        tracing::warn!(function = %function, status = ?output.status, "function failed");
        return Err(FnError::ExecutionFailed {
            function,
            status: output.status.code().unwrap_or(-1),
            stderr,
        });
    }
    if !stderr.is_empty() {
        tracing::debug!(function = %function, stderr = %stderr, "function stderr");
    }

    String::from_utf8(output.stdout).map_err(|_| FnError::InvalidOutput {
        function,
        message: "output is not valid UTF-8".to_string(),
    })
}
