use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::catalog;
use crate::config::{Config, FilesystemEntry, HookSet, RetentionConfig, TransferConfig};
use crate::error::{HardsnapError, Result};
use crate::transfer::{Transfer, TransferRequest};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub source: String,
    pub dest: PathBuf,
    pub link_dest: Option<PathBuf>,
    pub preserve_hard_links: bool,
}

type Behavior = Box<dyn Fn(&TransferRequest<'_>) -> Result<()> + Send + Sync>;

/// Scriptable stand-in for the transfer tool. Records every request and
/// tracks how many invocations run concurrently.
pub struct FakeTransfer {
    pub requests: Mutex<Vec<RecordedRequest>>,
    running: AtomicUsize,
    peak_running: AtomicUsize,
    delay: Option<Duration>,
    behavior: Behavior,
}

impl FakeTransfer {
    pub fn with_behavior(
        behavior: impl Fn(&TransferRequest<'_>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            peak_running: AtomicUsize::new(0),
            delay: None,
            behavior: Box::new(behavior),
        }
    }

    /// Writes a single `payload` file into the destination.
    pub fn succeeding() -> Self {
        Self::with_behavior(|req| {
            std::fs::write(req.dest.join("payload"), b"data")?;
            Ok(())
        })
    }

    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::with_behavior(move |_| Err(HardsnapError::Transfer(message.clone())))
    }

    /// Local recursive copy, hardlinking files identical to the link base.
    pub fn hardlinking() -> Self {
        Self::with_behavior(|req| {
            copy_tree(Path::new(req.source), req.dest, req.link_dest)?;
            Ok(())
        })
    }

    /// Hold each invocation open long enough to observe overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak_running.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transfer for FakeTransfer {
    fn run(&self, req: &TransferRequest<'_>) -> Result<()> {
        self.requests.lock().unwrap().push(RecordedRequest {
            source: req.source.to_string(),
            dest: req.dest.to_path_buf(),
            link_dest: req.link_dest.map(|p| p.to_path_buf()),
            preserve_hard_links: req.preserve_hard_links,
        });

        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(now_running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let result = (self.behavior)(req);
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Recursive local copy with hardlink sharing against `base`, mirroring
/// what `rsync --link-dest` produces.
pub fn copy_tree(src: &Path, dst: &Path, base: Option<&Path>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        let src_path = entry.path();
        let dst_path = dst.join(&name);
        if entry.file_type()?.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_tree(&src_path, &dst_path, base.map(|b| b.join(&name)).as_deref())?;
        } else {
            let unchanged = base
                .map(|b| b.join(&name))
                .filter(|b| b.is_file())
                .is_some_and(|b| {
                    std::fs::read(&b).ok() == std::fs::read(&src_path).ok()
                });
            if let (true, Some(b)) = (unchanged, base.map(|b| b.join(&name))) {
                std::fs::hard_link(&b, &dst_path)?;
            } else {
                std::fs::copy(&src_path, &dst_path)?;
            }
        }
    }
    Ok(())
}

pub fn make_config(destination: &Path, filesystems: &[(&str, &str)]) -> Config {
    Config {
        destination: destination.to_string_lossy().to_string(),
        jobs: 1,
        transfer: TransferConfig::default(),
        retention: RetentionConfig {
            keep_last: Some(1),
            ..Default::default()
        },
        hooks: HookSet::default(),
        filesystems: filesystems
            .iter()
            .map(|(name, source)| FilesystemEntry {
                name: name.to_string(),
                source: source.to_string(),
                hooks: HookSet::default(),
                retention: None,
            })
            .collect(),
    }
}

/// Create a complete snapshot directory named for `time`, containing one
/// marker file. Returns the snapshot name.
pub fn make_snapshot(fs_dir: &Path, time: DateTime<Utc>) -> String {
    let name = catalog::timestamp_name(time);
    let dir = fs_dir.join(&name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("marker"), name.as_bytes()).unwrap();
    name
}
