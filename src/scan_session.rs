use std::sync::mpsc::{Receiver, TryRecvError};

use crate::decoder::{DecodeEvent, Decoder, DeviceError, DeviceInfo};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Starting,
    Active,
    Stopping,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("a scan is already running")]
    AlreadyActive,
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// What a poll of an active session produced.
#[derive(Debug)]
pub enum SessionEvent {
    /// A code was read. The session has already stopped.
    Detected(String),
    /// The device failed. The session has already stopped.
    Ended(DeviceError),
}

pub struct ScanSession {
    decoder: Box<dyn Decoder>,
    state: ScanState,
    events: Option<Receiver<DecodeEvent>>,
    device: Option<String>,
}

impl ScanSession {
    pub fn new(decoder: Box<dyn Decoder>) -> Self {
        Self {
            decoder,
            state: ScanState::Idle,
            events: None,
            device: None,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ScanState::Active
    }

    /// Device the running session was started on.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.decoder.devices()
    }

    /// Opens `device` and starts decoding. The caller names the device; the
    /// session never falls back to another one.
    pub fn start(&mut self, device: &str) -> Result<(), ScanError> {
        if self.state != ScanState::Idle {
            return Err(ScanError::AlreadyActive);
        }
        self.state = ScanState::Starting;
        log::debug!("Scan session starting on {:?}", device);

        match self.decoder.start(device) {
            Ok(events) => {
                self.events = Some(events);
                self.device = Some(device.to_string());
                self.state = ScanState::Active;
                log::debug!("Scan session active");
                Ok(())
            }
            Err(e) => {
                self.decoder.stop();
                self.state = ScanState::Idle;
                log::warn!("Could not start scanner {:?}: {}", device, e);
                Err(e.into())
            }
        }
    }

    /// Drains pending decoder events. Frames without a code are skipped;
    /// the first code or device failure stops the session and is returned.
    pub fn poll(&mut self) -> Option<SessionEvent> {
        if self.state != ScanState::Active {
            return None;
        }

        loop {
            let next = self.events.as_ref()?.try_recv();
            match next {
                Ok(DecodeEvent::NotFound) => {
                    log::trace!("No code in frame");
                }
                Ok(DecodeEvent::Detected(text)) => {
                    self.stop();
                    log::info!("Scanned {:?}", text);
                    return Some(SessionEvent::Detected(text));
                }
                Ok(DecodeEvent::Failed(err)) => {
                    self.teardown();
                    log::error!("Scanner failed: {}", err);
                    return Some(SessionEvent::Ended(err));
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    self.teardown();
                    let err = DeviceError::Lost("decoder stopped unexpectedly".to_string());
                    log::error!("Scanner failed: {}", err);
                    return Some(SessionEvent::Ended(err));
                }
            }
        }
    }

    /// Releases the device. Calling it while idle does nothing.
    pub fn stop(&mut self) {
        if self.state == ScanState::Idle {
            return;
        }
        self.state = ScanState::Stopping;
        log::debug!("Scan session stopping");
        self.release();
        self.state = ScanState::Idle;
    }

    // Device failure goes straight from Active to Idle.
    fn teardown(&mut self) {
        self.release();
        self.state = ScanState::Idle;
    }

    fn release(&mut self) {
        self.decoder.stop();
        self.events = None;
        self.device = None;
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc::{self, Sender};

    #[derive(Default)]
    struct Probe {
        sender: Option<Sender<DecodeEvent>>,
        starts: usize,
        stops: usize,
        fail_with: Option<fn() -> DeviceError>,
    }

    /// Decoder whose event stream the test feeds by hand.
    struct FakeDecoder(Rc<RefCell<Probe>>);

    impl Decoder for FakeDecoder {
        fn devices(&self) -> Vec<DeviceInfo> {
            vec![DeviceInfo {
                id: "cam0".into(),
                label: "Front".into(),
            }]
        }

        fn start(&mut self, _device: &str) -> Result<Receiver<DecodeEvent>, DeviceError> {
            let mut probe = self.0.borrow_mut();
            probe.starts += 1;
            if let Some(make) = probe.fail_with {
                return Err(make());
            }
            let (tx, rx) = mpsc::channel();
            probe.sender = Some(tx);
            Ok(rx)
        }

        fn stop(&mut self) {
            let mut probe = self.0.borrow_mut();
            probe.stops += 1;
            probe.sender = None;
        }
    }

    fn session() -> (ScanSession, Rc<RefCell<Probe>>) {
        let probe = Rc::new(RefCell::new(Probe::default()));
        (ScanSession::new(Box::new(FakeDecoder(probe.clone()))), probe)
    }

    fn send(probe: &Rc<RefCell<Probe>>, event: DecodeEvent) {
        probe
            .borrow()
            .sender
            .as_ref()
            .expect("decoder not running")
            .send(event)
            .unwrap();
    }

    #[test]
    fn noise_frames_keep_session_active() {
        let (mut s, probe) = session();
        s.start("cam0").unwrap();
        assert_eq!(s.state(), ScanState::Active);
        assert_eq!(s.device(), Some("cam0"));

        send(&probe, DecodeEvent::NotFound);
        send(&probe, DecodeEvent::NotFound);
        assert!(s.poll().is_none());
        assert_eq!(s.state(), ScanState::Active);
        assert_eq!(probe.borrow().stops, 0);
    }

    #[test]
    fn detection_stops_before_reporting_once() {
        let (mut s, probe) = session();
        s.start("cam0").unwrap();
        send(&probe, DecodeEvent::NotFound);
        send(&probe, DecodeEvent::Detected("6009880123456".into()));
        send(&probe, DecodeEvent::Detected("6009880123456".into()));

        match s.poll() {
            Some(SessionEvent::Detected(code)) => assert_eq!(code, "6009880123456"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(s.state(), ScanState::Idle);
        assert_eq!(probe.borrow().stops, 1);
        assert!(probe.borrow().sender.is_none());
        // the duplicate frame never surfaces
        assert!(s.poll().is_none());
    }

    #[test]
    fn permission_error_ends_session() {
        let (mut s, probe) = session();
        s.start("cam0").unwrap();
        send(
            &probe,
            DecodeEvent::Failed(DeviceError::PermissionDenied("cam0".into())),
        );
        match s.poll() {
            Some(SessionEvent::Ended(DeviceError::PermissionDenied(dev))) => {
                assert_eq!(dev, "cam0")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(s.state(), ScanState::Idle);
        assert!(probe.borrow().sender.is_none());
    }

    #[test]
    fn vanished_decoder_ends_session() {
        let (mut s, probe) = session();
        s.start("cam0").unwrap();
        probe.borrow_mut().sender = None;
        assert!(matches!(
            s.poll(),
            Some(SessionEvent::Ended(DeviceError::Lost(_)))
        ));
        assert_eq!(s.state(), ScanState::Idle);
    }

    #[test]
    fn stop_twice_is_harmless() {
        let (mut s, probe) = session();
        s.stop();
        assert_eq!(probe.borrow().stops, 0);

        s.start("cam0").unwrap();
        s.stop();
        s.stop();
        assert_eq!(s.state(), ScanState::Idle);
        assert_eq!(probe.borrow().stops, 1);
        assert!(s.poll().is_none());
    }

    #[test]
    fn failed_start_returns_to_idle() {
        let (mut s, probe) = session();
        probe.borrow_mut().fail_with = Some(|| DeviceError::Unavailable("cam9".into()));
        let err = s.start("cam9").unwrap_err();
        assert!(matches!(
            err,
            ScanError::Device(DeviceError::Unavailable(_))
        ));
        assert_eq!(s.state(), ScanState::Idle);
        assert_eq!(s.device(), None);

        probe.borrow_mut().fail_with = None;
        s.start("cam0").unwrap();
        assert!(s.is_active());
    }

    #[test]
    fn second_start_is_rejected() {
        let (mut s, probe) = session();
        s.start("cam0").unwrap();
        assert!(matches!(s.start("cam0"), Err(ScanError::AlreadyActive)));
        assert_eq!(probe.borrow().starts, 1);
        assert!(s.is_active());
    }
}
