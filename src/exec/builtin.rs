// src/exec/builtin.rs

//! Built-in transforms: `copy`, `scss` and `command`.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::TransformError;
use crate::exec::transform::{Transform, TransformInput, TransformOptions};

type TransformFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<u8>, TransformError>> + Send + 'a>>;

/// Passes bytes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyTransform;

impl Transform for CopyTransform {
    fn name(&self) -> &str {
        "copy"
    }

    fn apply<'a>(
        &'a self,
        input: TransformInput,
        _options: &'a TransformOptions,
    ) -> TransformFuture<'a> {
        Box::pin(async move { Ok(input.bytes) })
    }
}

/// Compiles SCSS with `grass`.
///
/// Options:
/// - `style = "expanded" | "compressed"` (default `expanded`)
/// - `load_paths = [...]`, relative to the project root. The directories of
///   the source files are always searched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScssTransform;

impl ScssTransform {
    fn output_style(options: &TransformOptions) -> Result<grass::OutputStyle, TransformError> {
        match options.get_str("style") {
            None | Some("expanded") => Ok(grass::OutputStyle::Expanded),
            Some("compressed") => Ok(grass::OutputStyle::Compressed),
            Some(other) => Err(TransformError::new(
                "scss",
                format!("unknown style '{other}' (expected 'expanded' or 'compressed')"),
            )),
        }
    }

    /// Source directories first, then configured paths, each once.
    fn load_paths(input: &TransformInput, options: &TransformOptions) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = input
            .sources
            .iter()
            .filter_map(|p| p.parent().map(|d| d.to_path_buf()))
            .collect();
        paths.extend(
            options
                .get_str_list("load_paths")
                .into_iter()
                .map(|p| input.root.join(p)),
        );
        let mut seen = HashSet::new();
        paths.retain(|p| seen.insert(p.clone()));
        paths
    }
}

impl Transform for ScssTransform {
    fn name(&self) -> &str {
        "scss"
    }

    fn apply<'a>(
        &'a self,
        input: TransformInput,
        options: &'a TransformOptions,
    ) -> TransformFuture<'a> {
        Box::pin(async move {
            let style = Self::output_style(options)?;

            let load_paths = Self::load_paths(&input, options);

            let source = String::from_utf8(input.bytes)
                .map_err(|e| TransformError::new("scss", format!("input is not UTF-8: {e}")))?;

            // grass is synchronous and may touch the filesystem for @use.
            tokio::task::spawn_blocking(move || {
                let mut opts = grass::Options::default().style(style);
                for path in &load_paths {
                    opts = opts.load_path(path);
                }
                grass::from_string(source, &opts)
                    .map(String::into_bytes)
                    .map_err(|e| TransformError::new("scss", e.to_string()))
            })
            .await
            .map_err(|e| TransformError::new("scss", format!("compiler task failed: {e}")))?
        })
    }
}

/// Pipes bytes through an external command.
///
/// Options:
/// - `cmd`: shell command line. Input bytes go to stdin, stdout becomes the
///   output. A non-zero exit status is a failure.
///
/// The command runs in the project root with `ASSETDAG_SOURCES` set to the
/// newline-separated list of source files.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandTransform;

/// How much of stderr ends up in an error message.
const STDERR_TAIL: usize = 2048;

impl Transform for CommandTransform {
    fn name(&self) -> &str {
        "command"
    }

    fn apply<'a>(
        &'a self,
        input: TransformInput,
        options: &'a TransformOptions,
    ) -> TransformFuture<'a> {
        Box::pin(async move {
            let line = options
                .get_str("cmd")
                .ok_or_else(|| TransformError::new("command", "missing 'cmd' option"))?;

            let mut cmd = if cfg!(windows) {
                let mut c = Command::new("cmd");
                c.arg("/C").arg(line);
                c
            } else {
                let mut c = Command::new("sh");
                c.arg("-c").arg(line);
                c
            };

            let sources = input
                .sources
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("\n");

            cmd.current_dir(&input.root)
                .env("ASSETDAG_SOURCES", sources)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            debug!(cmd = %line, "spawning transform command");
            let mut child = cmd.spawn().map_err(|e| {
                TransformError::new("command", format!("failed to spawn '{line}': {e}"))
            })?;

            // Feed stdin concurrently so a command that writes before it has
            // read everything cannot deadlock on a full pipe.
            if let Some(mut stdin) = child.stdin.take() {
                let bytes = input.bytes;
                tokio::spawn(async move {
                    if let Err(e) = stdin.write_all(&bytes).await {
                        warn!(error = %e, "failed to write transform stdin");
                    }
                });
            }

            let output = child.wait_with_output().await.map_err(|e| {
                TransformError::new("command", format!("waiting for '{line}': {e}"))
            })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let tail_start = stderr.len().saturating_sub(STDERR_TAIL);
                let tail = stderr
                    .get(tail_start..)
                    .unwrap_or(stderr.as_ref())
                    .trim();
                let code = output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                return Err(TransformError::new(
                    "command",
                    format!("'{line}' exited with {code}: {tail}"),
                ));
            }

            Ok(output.stdout)
        })
    }
}
