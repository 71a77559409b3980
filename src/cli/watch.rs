//! `instaview watch`: keep a preview file painted while a project changes.
//!
//! ```text
//! notify ──► bridge thread ──► read_project ──► EngineMsg::FilesChanged
//! stdin  ──► command thread ──► Refresh / Retry / SetHotReload / ...
//! Ctrl+C ──► shutdown listener ──────────► EngineMsg::Shutdown
//!                                              │
//!                         Engine::run ◄────────┘──► FileFrame (preview.html)
//! ```
//!
//! The engine owns debouncing, so the bridge forwards every relevant event
//! with the full tree it reads at that moment.

use std::io::{self, BufRead};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::{EventKind, RecursiveMode, Watcher};
use url::Url;

use super::WatchArgs;
use crate::cache::{PreviewCache, persist_cache, restore_cache};
use crate::config::{PreviewConfig, is_valid_id};
use crate::engine::{Engine, EngineHandle, EngineMsg, ExternalTarget, FileFrame, TransportStrategy};
use crate::sync::{ChannelRegistry, HttpAuthority, SyncChannel};
use crate::tree::{EditorInput, FileNode, flatten, read_tree_skipping};
use crate::{debug, log};

/// Working directory inside the project.
const WORK_DIR: &str = ".instaview";
const PREVIEW_FILE: &str = "preview.html";
const EXPORT_FILE: &str = "export.html";

pub fn watch(args: &WatchArgs, config: &PreviewConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run(args, config))
}

async fn run(args: &WatchArgs, config: &PreviewConfig) -> Result<()> {
    let dir = args
        .dir
        .canonicalize()
        .with_context(|| format!("Project directory not found: {}", args.dir.display()))?;
    let output = resolve_output(&preview_path(&dir, args.output.as_deref()))?;

    let files = flatten(&read_project(&dir, &output)?);
    let project_id = if args.remote {
        config.sync.project_id.clone()
    } else {
        local_project_id(&dir)
    };

    let cache = PreviewCache::new();
    if !args.no_cache {
        match restore_cache(&cache, &dir) {
            Ok(0) => {}
            Ok(n) => debug!("watch"; "restored {} cached preview(s)", n),
            Err(e) => log!("watch"; "ignoring unreadable cache: {}", e),
        }
    }

    let mut channel_key = None;
    let transport = if args.remote {
        let channel = config.channel_config()?;
        channel_key = Some((channel.project_id.clone(), channel.user_id.clone()));
        let link = SyncChannel::open(channel);
        let authority = HttpAuthority::new(
            config.sync.server_url()?,
            config.sync.token.clone(),
            config.engine.remote_timeout(),
        )?;
        log!("watch"; "compiling via {}", config.sync.server);
        TransportStrategy::remote(link, Arc::new(authority))
    } else {
        TransportStrategy::local()
    };

    let frame = FileFrame::new(&output).with_status();
    let (engine, handle) = Engine::new(config.engine_config(&project_id), Box::new(frame), transport, cache.clone());
    let engine = engine.with_files(files);

    // Watcher must outlive the engine loop.
    let _watcher = spawn_watcher(&dir, &output, handle.clone())?;
    spawn_shutdown_bridge(handle.clone());
    spawn_commands(handle, dir.join(WORK_DIR).join(EXPORT_FILE));

    log!("watch"; "previewing {} at {}", dir.display(), output.display());
    let session = engine.run().await;
    if let Some((project_id, user_id)) = &channel_key {
        ChannelRegistry::global().close(project_id, user_id);
    }

    let stats = &session.stats;
    log!("watch"; "{} paint(s), {} skipped, {} failed, {} stale",
        stats.paints, stats.skips, stats.failures, stats.stale_discards);

    if !args.no_cache
        && let Err(e) = persist_cache(&cache, &dir)
    {
        log!("watch"; "failed to persist cache: {}", e);
    }
    Ok(())
}

/// `--output`, or `<dir>/.instaview/preview.html`.
fn preview_path(dir: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        Some(path) => path.to_path_buf(),
        None => dir.join(WORK_DIR).join(PREVIEW_FILE),
    }
}

/// Absolute `path`, its parent resolved the way the project directory is so
/// the two compare by prefix.
fn resolve_output(path: &Path) -> io::Result<PathBuf> {
    let path = std::path::absolute(path)?;
    match (path.parent().map(Path::canonicalize), path.file_name()) {
        (Some(Ok(parent)), Some(name)) => Ok(parent.join(name)),
        _ => Ok(path),
    }
}

/// The project as the preview sees it: never its own output.
fn read_project(dir: &Path, output: &Path) -> io::Result<Vec<FileNode>> {
    read_tree_skipping(dir, Some(output))
}

/// Directory name when it is a usable id, otherwise `local`.
fn local_project_id(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|name| is_valid_id(name))
        .unwrap_or_else(|| "local".to_string())
}

// =============================================================================
// File watching
// =============================================================================

fn spawn_watcher(dir: &Path, output: &Path, handle: EngineHandle) -> Result<notify::RecommendedWatcher> {
    let (notify_tx, notify_rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = notify_tx.send(res);
    })?;
    watcher
        .watch(dir, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", dir.display()))?;

    let dir = dir.to_path_buf();
    let output = output.to_path_buf();
    std::thread::spawn(move || {
        while let Ok(result) = notify_rx.recv() {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    log!("watch"; "notify error: {}", e);
                    continue;
                }
            };
            if !is_relevant(&event, &dir, &output) {
                continue;
            }
            debug!("watch"; "{:?} {:?}", event.kind, event.paths);

            let tree = match read_project(&dir, &output) {
                Ok(tree) => tree,
                Err(e) => {
                    log!("watch"; "failed to read {}: {}", dir.display(), e);
                    continue;
                }
            };
            if handle.blocking_send(EngineMsg::FilesChanged(EditorInput::new(tree))).is_err() {
                break;
            }
        }
    });
    Ok(watcher)
}

/// Content changes to files the preview could read.
fn is_relevant(event: &notify::Event, dir: &Path, output: &Path) -> bool {
    let content_change = match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(modify) => !matches!(modify, notify::event::ModifyKind::Metadata(_)),
        _ => false,
    };
    content_change && event.paths.iter().any(|path| is_project_path(path, dir, output))
}

/// Inside `dir`, not the preview itself, not under a dot-entry.
fn is_project_path(path: &Path, dir: &Path, output: &Path) -> bool {
    if path == output || path.starts_with(output) {
        return false;
    }
    let Ok(relative) = path.strip_prefix(dir) else {
        return false;
    };
    !relative.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

// =============================================================================
// Shutdown and commands
// =============================================================================

fn spawn_shutdown_bridge(handle: EngineHandle) {
    let (tx, rx) = crossbeam::channel::bounded(1);
    crate::core::register_shutdown_listener(tx);
    std::thread::spawn(move || {
        if rx.recv().is_ok() {
            let _ = handle.blocking_send(EngineMsg::Shutdown);
        }
    });
}

/// One line typed on stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Refresh,
    Retry,
    HotReload(bool),
    DevServer(Option<Url>),
    StopDevServer,
    Open,
    Quit,
}

const HELP: &str = "commands: r(efresh) | e (retry) | hot on|off | dev [url] | nodev | o(pen) | q(uit)";

fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let command = match (words.next()?, words.next()) {
        ("r" | "refresh", None) => Command::Refresh,
        ("e" | "retry", None) => Command::Retry,
        ("hot", Some("on")) => Command::HotReload(true),
        ("hot", Some("off")) => Command::HotReload(false),
        ("dev", None) => Command::DevServer(None),
        ("dev", Some(url)) => Command::DevServer(Some(Url::parse(url).ok()?)),
        ("nodev", None) => Command::StopDevServer,
        ("o" | "open", None) => Command::Open,
        ("q" | "quit", None) => Command::Quit,
        _ => return None,
    };
    words.next().is_none().then_some(command)
}

fn spawn_commands(handle: EngineHandle, export: PathBuf) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            let Some(command) = parse_command(&line) else {
                log!("watch"; "{}", HELP);
                continue;
            };
            let sent = match command {
                Command::Refresh => handle.blocking_send(EngineMsg::Refresh),
                Command::Retry => handle.blocking_send(EngineMsg::Retry),
                Command::HotReload(on) => handle.blocking_send(EngineMsg::SetHotReload(on)),
                Command::DevServer(Some(url)) => handle.blocking_send(EngineMsg::EnableDevServer(url)),
                Command::DevServer(None) => handle.blocking_send(EngineMsg::StartDevServer),
                Command::StopDevServer => handle.blocking_send(EngineMsg::DisableDevServer),
                Command::Open => open_external(&handle, &export),
                Command::Quit => handle.blocking_send(EngineMsg::Shutdown),
            };
            if sent.is_err() {
                break;
            }
        }
    });
}

fn open_external(handle: &EngineHandle, export: &Path) -> Result<(), crate::engine::EngineStopped> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    handle.blocking_send(EngineMsg::OpenExternal(tx))?;
    match rx.blocking_recv().map_err(|_| crate::engine::EngineStopped)? {
        ExternalTarget::DevServer(url) => log!("open"; "{}", url),
        ExternalTarget::Document(html) => {
            let written = export
                .parent()
                .map_or(Ok(()), std::fs::create_dir_all)
                .and_then(|()| std::fs::write(export, html));
            match written {
                Ok(()) => log!("open"; "{}", export.display()),
                Err(e) => log!("open"; "failed to export document: {}", e),
            }
        }
    }
    Ok(())
}
