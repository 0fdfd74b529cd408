use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::barcode;
use crate::config::{ScannerBackend, ScannerConfig};

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no scanner device selected")]
    NoDevice,
    #[error("scanner {0} is not available")]
    Unavailable(String),
    #[error("permission denied opening scanner {0}")]
    PermissionDenied(String),
    #[error("scanner connection lost: {0}")]
    Lost(String),
    #[error("scanner I/O error: {0}")]
    Io(#[from] io::Error),
}

/// What the decoder saw in one frame.
#[derive(Debug)]
pub enum DecodeEvent {
    Detected(String),
    /// Frame held no code. Normal while the scanner is idle.
    NotFound,
    Failed(DeviceError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub label: String,
}

/// A way of getting barcodes out of some device. Events are delivered on the
/// returned channel, one at a time, until `stop` is called or the device
/// fails.
pub trait Decoder {
    fn devices(&self) -> Vec<DeviceInfo>;
    fn start(&mut self, device: &str) -> Result<Receiver<DecodeEvent>, DeviceError>;
    fn stop(&mut self);
}

pub fn from_config(cfg: &ScannerConfig) -> Box<dyn Decoder> {
    match cfg.backend {
        ScannerBackend::Serial => Box::new(SerialDecoder::new(PathBuf::from("/dev"))),
        ScannerBackend::Replay => Box::new(ReplayDecoder::new(
            cfg.replay_files.clone(),
            cfg.frame_interval(),
        )),
    }
}

fn open_error(path: &Path, e: io::Error) -> DeviceError {
    match e.kind() {
        io::ErrorKind::NotFound => DeviceError::Unavailable(path.display().to_string()),
        io::ErrorKind::PermissionDenied => {
            DeviceError::PermissionDenied(path.display().to_string())
        }
        _ => DeviceError::Io(e),
    }
}

fn open_device(path: &Path) -> Result<File, DeviceError> {
    File::open(path).map_err(|e| open_error(path, e))
}

/// Opens a tty without blocking reads, so the reader can notice `stop`.
fn open_serial(path: &Path) -> Result<File, DeviceError> {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|e| open_error(path, e))
}

/// Background thread plus the flag that asks it to finish.
struct Worker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn<F>(name: &str, body: F) -> Result<Self, DeviceError>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(flag))?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Raises the stop flag and waits for the thread, which drops the
    /// device handle on its way out.
    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Decoder thread panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Serial scanners (CDC-ACM / USB-serial). Each CR or LF ends a frame.

const SERIAL_PREFIXES: [&str; 2] = ["ttyACM", "ttyUSB"];

pub struct SerialDecoder {
    dev_root: PathBuf,
    worker: Option<Worker>,
}

impl SerialDecoder {
    pub fn new(dev_root: PathBuf) -> Self {
        Self {
            dev_root,
            worker: None,
        }
    }
}

/// Lists serial scanners under `dev_root`, stable ids from `serial/by-id`
/// first, then the raw `ttyACM*` / `ttyUSB*` nodes.
pub fn enumerate_serial_devices(dev_root: &Path) -> Vec<DeviceInfo> {
    let mut out = Vec::new();

    if let Ok(entries) = fs::read_dir(dev_root.join("serial").join("by-id")) {
        let mut by_id: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        by_id.sort();
        for path in by_id {
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            out.push(DeviceInfo {
                id: path.display().to_string(),
                label,
            });
        }
    }

    if let Ok(entries) = fs::read_dir(dev_root) {
        let mut nodes: Vec<(String, PathBuf)> = entries
            .flatten()
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                SERIAL_PREFIXES
                    .iter()
                    .any(|p| name.starts_with(p))
                    .then(|| (name, e.path()))
            })
            .collect();
        nodes.sort();
        for (name, path) in nodes {
            out.push(DeviceInfo {
                id: path.display().to_string(),
                label: name,
            });
        }
    }

    out
}

const READ_IDLE: Duration = Duration::from_millis(10);

fn read_frames(mut file: File, tx: Sender<DecodeEvent>, stop: Arc<AtomicBool>) {
    let mut frame = Vec::new();
    let mut buf = [0u8; 256];
    while !stop.load(Ordering::Acquire) {
        let n = match file.read(&mut buf) {
            Ok(0) => {
                let _ = tx.send(DecodeEvent::Failed(DeviceError::Lost(
                    "device closed".to_string(),
                )));
                return;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(READ_IDLE);
                continue;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.send(DecodeEvent::Failed(DeviceError::Lost(e.to_string())));
                return;
            }
        };
        for &b in &buf[..n] {
            if b != b'\r' && b != b'\n' {
                frame.push(b);
                continue;
            }
            let text = barcode::normalize(&String::from_utf8_lossy(&frame));
            frame.clear();
            let event = if text.is_empty() {
                DecodeEvent::NotFound
            } else {
                DecodeEvent::Detected(text)
            };
            if tx.send(event).is_err() {
                return;
            }
        }
    }
}

impl Decoder for SerialDecoder {
    fn devices(&self) -> Vec<DeviceInfo> {
        enumerate_serial_devices(&self.dev_root)
    }

    fn start(&mut self, device: &str) -> Result<Receiver<DecodeEvent>, DeviceError> {
        self.stop();
        if device.is_empty() {
            return Err(DeviceError::NoDevice);
        }
        let file = open_serial(Path::new(device))?;
        let (tx, rx) = mpsc::channel();
        log::info!("Reading barcodes from {}", device);
        self.worker = Some(Worker::spawn("serial-decoder", move |stop| {
            read_frames(file, tx, stop)
        })?);
        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

impl Drop for SerialDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Replay: plays codes back from text files, one line per frame.

pub struct ReplayDecoder {
    files: Vec<PathBuf>,
    frame_interval: Duration,
    worker: Option<Worker>,
}

impl ReplayDecoder {
    pub fn new(files: Vec<PathBuf>, frame_interval: Duration) -> Self {
        Self {
            files,
            frame_interval,
            worker: None,
        }
    }
}

/// Sleeps for `total` in short slices; false if asked to stop meanwhile.
fn wait_frame(total: Duration, stop: &AtomicBool) -> bool {
    let slice = Duration::from_millis(10);
    let mut left = total;
    while !left.is_zero() {
        if stop.load(Ordering::Acquire) {
            return false;
        }
        let step = left.min(slice);
        thread::sleep(step);
        left -= step;
    }
    !stop.load(Ordering::Acquire)
}

fn replay_frames(lines: Vec<String>, interval: Duration, tx: Sender<DecodeEvent>, stop: Arc<AtomicBool>) {
    let mut lines = lines.into_iter();
    loop {
        if !wait_frame(interval, &stop) {
            return;
        }
        // Once the script runs out the camera keeps looking at nothing.
        let event = match lines.next().map(|l| barcode::normalize(&l)) {
            Some(text) if !text.is_empty() => DecodeEvent::Detected(text),
            _ => DecodeEvent::NotFound,
        };
        if tx.send(event).is_err() {
            return;
        }
        if interval.is_zero() {
            thread::yield_now();
        }
    }
}

impl Decoder for ReplayDecoder {
    fn devices(&self) -> Vec<DeviceInfo> {
        self.files
            .iter()
            .filter(|p| p.is_file())
            .map(|p| DeviceInfo {
                id: p.display().to_string(),
                label: p
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| p.display().to_string()),
            })
            .collect()
    }

    fn start(&mut self, device: &str) -> Result<Receiver<DecodeEvent>, DeviceError> {
        self.stop();
        if device.is_empty() {
            return Err(DeviceError::NoDevice);
        }
        let mut text = String::new();
        open_device(Path::new(device))?.read_to_string(&mut text)?;
        let lines: Vec<String> = text.lines().map(str::to_string).collect();

        let (tx, rx) = mpsc::channel();
        let interval = self.frame_interval;
        log::info!("Replaying {} frames from {}", lines.len(), device);
        self.worker = Some(Worker::spawn("replay-decoder", move |stop| {
            replay_frames(lines, interval, tx, stop)
        })?);
        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

impl Drop for ReplayDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}
