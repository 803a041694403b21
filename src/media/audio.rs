//! Audio I/O - Mikrofon und Lautsprecher
//!
//! Verwendet cpal für Cross-Platform Audio. Ein cpal Stream ist nicht Send
//! und lebt deshalb auf einem eigenen Thread, der ihn beim Stoppen (oder
//! wenn niemand mehr auf ihn wartet) sofort freigibt.

use super::{AudioConstraints, MediaError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig, SupportedStreamConfigRange};
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;
use tokio::sync::oneshot;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Sample Rate (48kHz ist der Standard für beste Qualität)
pub const SAMPLE_RATE: u32 = 48000;

/// Frame Size in Samples (20ms @ 48kHz = 960 samples)
pub const FRAME_SIZE: usize = 960;

/// Buffer Size für Audio-Ring-Buffer
const RING_BUFFER_SIZE: usize = FRAME_SIZE * 10;

/// RMS-Schwelle unterhalb der ein Block als Rauschen gilt
const NOISE_GATE_THRESHOLD: f32 = 0.01;

// ============================================================================
// CAPTURE TRACK
// ============================================================================

/// Ein lokaler Audio-Track. Wird zwischen Aufnahme-Thread, ausgehendem
/// WebRTC-Track und dem `AudioHandle` geteilt.
pub struct CaptureTrack {
    id: String,
    constraints: AudioConstraints,
    enabled: AtomicBool,
    stopped: AtomicBool,
    buffer: Mutex<HeapRb<f32>>,
}

impl CaptureTrack {
    pub fn new(constraints: AudioConstraints) -> Arc<Self> {
        Arc::new(Self {
            id: format!("audio-{}", uuid::Uuid::new_v4()),
            constraints,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            buffer: Mutex::new(HeapRb::new(RING_BUFFER_SIZE)),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Beendet den Track endgültig und verwirft gepufferte Samples
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.buffer.lock().clear();
    }

    /// Schreibt aufgenommene Mono-Samples (48kHz) in den Ring-Buffer
    pub fn push_samples(&self, data: &[f32]) {
        if self.is_stopped() || !self.is_enabled() || data.is_empty() {
            return;
        }

        if self.constraints.noise_suppression {
            let rms = (data.iter().map(|s| s * s).sum::<f32>() / data.len() as f32).sqrt();
            if rms < NOISE_GATE_THRESHOLD {
                return;
            }
        }

        let mut buffer = self.buffer.lock();
        for sample in data {
            let _ = buffer.try_push(*sample);
        }
    }

    /// Liest einen Frame (20ms) von aufgenommenem Audio
    pub fn read_frame(&self) -> Option<Vec<f32>> {
        let mut buffer = self.buffer.lock();
        if buffer.occupied_len() >= FRAME_SIZE {
            let mut frame = Vec::with_capacity(FRAME_SIZE);
            for _ in 0..FRAME_SIZE {
                if let Some(sample) = buffer.try_pop() {
                    frame.push(sample);
                }
            }
            Some(frame)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for CaptureTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureTrack")
            .field("id", &self.id)
            .field("enabled", &self.is_enabled())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

// ============================================================================
// AUDIO HANDLE
// ============================================================================

/// Hardware-Ressource hinter einem `AudioHandle`
pub trait CaptureDevice: Send + Sync {
    fn name(&self) -> &str;

    /// Gibt das Gerät frei. Wird höchstens einmal aufgerufen.
    fn release(&mut self);
}

/// Exklusiv besessener Zugriff auf die lokale Audio-Aufnahme.
///
/// Das lokale Monitoring ist immer stumm (kein Loopback); `set_muted`
/// betrifft ausschließlich die ausgehenden Tracks. Beim Drop wird das
/// Gerät freigegeben.
pub struct AudioHandle {
    constraints: AudioConstraints,
    tracks: Vec<Arc<CaptureTrack>>,
    device: Option<Box<dyn CaptureDevice>>,
}

impl AudioHandle {
    pub fn new(
        constraints: AudioConstraints,
        tracks: Vec<Arc<CaptureTrack>>,
        device: Box<dyn CaptureDevice>,
    ) -> Self {
        Self {
            constraints,
            tracks,
            device: Some(device),
        }
    }

    pub fn constraints(&self) -> AudioConstraints {
        self.constraints
    }

    pub fn tracks(&self) -> &[Arc<CaptureTrack>] {
        &self.tracks
    }

    /// Der lokale Monitor spielt die eigene Stimme nie ab
    pub fn is_monitor_muted(&self) -> bool {
        true
    }

    /// Aktiviert/deaktiviert alle ausgehenden Tracks
    pub fn set_muted(&self, muted: bool) {
        for track in &self.tracks {
            track.set_enabled(!muted);
        }
    }

    pub fn is_muted(&self) -> bool {
        !self.tracks.is_empty() && self.tracks.iter().all(|t| !t.is_enabled())
    }

    pub fn is_live(&self) -> bool {
        self.device.is_some()
    }

    /// Stoppt alle Tracks und gibt das Gerät frei
    pub fn stop(&mut self) {
        if let Some(mut device) = self.device.take() {
            for track in &self.tracks {
                track.stop();
            }
            device.release();
            tracing::info!("Local audio released ({})", device.name());
        }
    }
}

impl Drop for AudioHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for AudioHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioHandle")
            .field("device", &self.device.as_ref().map(|d| d.name()))
            .field("tracks", &self.tracks)
            .finish()
    }
}

// ============================================================================
// STREAM THREAD
// ============================================================================

/// Hält einen cpal Stream auf einem eigenen Thread bis zum Stop-Signal
struct StreamThread {
    device_name: String,
    stop_tx: Option<std_mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl StreamThread {
    /// Startet den Thread und wartet bis `build` den Stream geöffnet hat
    async fn spawn<R, F>(thread_name: &str, build: F) -> Result<Self, MediaError>
    where
        R: 'static,
        F: FnOnce() -> Result<(String, R), MediaError> + Send + 'static,
    {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();

        let worker = std::thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || run_stream(build, ready_tx, stop_rx))
            .map_err(|e| MediaError::DeviceUnavailable(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(device_name)) => Ok(Self {
                device_name,
                stop_tx: Some(stop_tx),
                worker: Some(worker),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(MediaError::DeviceUnavailable(
                "Audio thread exited unexpectedly".to_string(),
            )),
        }
    }

    /// Sendet das Stop-Signal. Innerhalb einer Tokio Runtime wird der Thread
    /// im Blocking-Pool gejoint, damit der aufrufende Task nicht blockiert.
    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        let Some(worker) = self.worker.take() else {
            return;
        };

        let device_name = self.device_name.clone();
        let join = move || {
            if worker.join().is_err() {
                tracing::error!("Audio thread for {} panicked", device_name);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(join);
            }
            Err(_) => join(),
        }
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Thread-Hauptfunktion: hält den Stream bis zum Stop-Signal
fn run_stream<R, F>(
    build: F,
    ready_tx: oneshot::Sender<Result<String, MediaError>>,
    stop_rx: std_mpsc::Receiver<()>,
) where
    F: FnOnce() -> Result<(String, R), MediaError>,
{
    let (device_name, stream) = match build() {
        Ok(opened) => opened,
        Err(e) => {
            tracing::warn!("Audio stream failed: {}", e);
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if ready_tx.send(Ok(device_name.clone())).is_err() {
        tracing::debug!("Audio stream no longer requested, releasing {}", device_name);
        return;
    }

    // Blockiert bis Stop-Signal oder Sender gedroppt
    let _ = stop_rx.recv();
    drop(stream);
    tracing::info!("Audio stream stopped ({})", device_name);
}

// ============================================================================
// CPAL CAPTURE
// ============================================================================

/// Mikrofon-Aufnahme über cpal
pub struct CpalCapture {
    thread: StreamThread,
}

impl CpalCapture {
    /// Öffnet das Standard-Eingabegerät und startet die Aufnahme in `track`
    pub async fn open(track: Arc<CaptureTrack>) -> Result<Self, MediaError> {
        let thread =
            StreamThread::spawn("softphone-capture", move || build_capture_stream(track)).await?;
        Ok(Self { thread })
    }
}

impl CaptureDevice for CpalCapture {
    fn name(&self) -> &str {
        &self.thread.device_name
    }

    fn release(&mut self) {
        self.thread.stop();
    }
}

// ============================================================================
// REMOTE AUDIO
// ============================================================================

/// Dekodiertes Audio der Gegenseite (48kHz mono) auf dem Weg zum Lautsprecher
pub struct RemoteAudioBuffer {
    buffer: Mutex<HeapRb<f32>>,
    stopped: AtomicBool,
}

impl RemoteAudioBuffer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            buffer: Mutex::new(HeapRb::new(RING_BUFFER_SIZE)),
            stopped: AtomicBool::new(false),
        })
    }

    /// Schreibt Audio-Samples in den Playback-Buffer
    pub fn write_samples(&self, samples: &[f32]) {
        if self.is_stopped() {
            return;
        }
        let mut buffer = self.buffer.lock();
        for sample in samples {
            let _ = buffer.try_push(*sample);
        }
    }

    /// Füllt `out` aus dem Buffer, fehlende Samples werden Stille.
    /// Gibt die Anzahl echter Samples zurück.
    pub fn read_samples(&self, out: &mut [f32]) -> usize {
        let mut buffer = self.buffer.lock();
        let mut read = 0;
        for slot in out.iter_mut() {
            match buffer.try_pop() {
                Some(sample) => {
                    *slot = sample;
                    read += 1;
                }
                None => *slot = 0.0,
            }
        }
        read
    }

    pub fn buffered(&self) -> usize {
        self.buffer.lock().occupied_len()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Verwirft gepuffertes Audio und nimmt nichts mehr an
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.buffer.lock().clear();
    }
}

/// Lautsprecher-Ausgabe über cpal
pub struct CpalPlayback {
    thread: StreamThread,
}

impl CpalPlayback {
    /// Öffnet das Standard-Ausgabegerät und spielt `source` ab
    pub async fn open(source: Arc<RemoteAudioBuffer>) -> Result<Self, MediaError> {
        let thread =
            StreamThread::spawn("softphone-playback", move || build_playback_stream(source))
                .await?;
        Ok(Self { thread })
    }

    pub fn device_name(&self) -> &str {
        &self.thread.device_name
    }

    pub fn stop(&mut self) {
        self.thread.stop();
    }
}

fn build_capture_stream(track: Arc<CaptureTrack>) -> Result<(String, Stream), MediaError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or_else(|| {
        MediaError::DeviceUnavailable("No audio input device found".to_string())
    })?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let config = find_best_input_config(&device)?;
    let constraints = track.constraints;

    tracing::info!(
        "Starting audio capture on {}: {} Hz, {} channels (echo cancellation: {}, noise suppression: {}, auto gain: {})",
        device_name,
        config.sample_rate.0,
        config.channels,
        constraints.echo_cancellation,
        constraints.noise_suppression,
        constraints.auto_gain_control
    );
    if constraints.echo_cancellation || constraints.auto_gain_control {
        tracing::debug!("Echo cancellation and gain control are left to the host audio stack");
    }

    let source_sample_rate = config.sample_rate.0;
    let channels = config.channels.max(1) as usize;

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = downmix(data, channels);
                let samples = resample(&mono, source_sample_rate, SAMPLE_RATE);
                track.push_samples(&samples);
            },
            |err| {
                tracing::error!("Audio capture error: {}", err);
            },
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                MediaError::DeviceUnavailable(e.to_string())
            }
            other => classify_backend_error(&other.to_string()),
        })?;

    stream
        .play()
        .map_err(|e| classify_backend_error(&e.to_string()))?;

    Ok((device_name, stream))
}

fn build_playback_stream(source: Arc<RemoteAudioBuffer>) -> Result<(String, Stream), MediaError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or_else(|| {
        MediaError::DeviceUnavailable("No audio output device found".to_string())
    })?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let configs = device
        .supported_output_configs()
        .map_err(|e| classify_backend_error(&e.to_string()))?;
    let config = select_best_config(configs.collect())?;

    tracing::info!(
        "Starting audio playback on {}: {} Hz, {} channels",
        device_name,
        config.sample_rate.0,
        config.channels
    );

    let target_sample_rate = config.sample_rate.0;
    let channels = config.channels.max(1) as usize;

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                let needed =
                    (frames as u64 * SAMPLE_RATE as u64 / target_sample_rate as u64) as usize;
                let mut mono = vec![0.0; needed];
                source.read_samples(&mut mono);
                let samples = resample(&mono, SAMPLE_RATE, target_sample_rate);

                // Auf alle Kanäle verteilen
                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    frame.fill(samples.get(i).copied().unwrap_or(0.0));
                }
            },
            |err| {
                tracing::error!("Audio playback error: {}", err);
            },
            None,
        )
        .map_err(|e| classify_backend_error(&e.to_string()))?;

    stream
        .play()
        .map_err(|e| classify_backend_error(&e.to_string()))?;

    Ok((device_name, stream))
}

/// Ordnet Plattform-Fehlermeldungen den Media-Fehlerarten zu
pub(crate) fn classify_backend_error(description: &str) -> MediaError {
    let lower = description.to_lowercase();
    if lower.contains("permission")
        || lower.contains("denied")
        || lower.contains("not authorized")
        || lower.contains("unauthorized")
    {
        MediaError::PermissionDenied(description.to_string())
    } else {
        MediaError::DeviceUnavailable(description.to_string())
    }
}

/// Interleaved Multi-Channel zu Mono
fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Einfaches Linear-Resampling
fn resample(data: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return data.to_vec();
    }
    let ratio = target_rate as f32 / source_rate as f32;
    let new_len = (data.len() as f32 * ratio) as usize;
    (0..new_len)
        .map(|i| {
            let src_idx = i as f32 / ratio;
            let idx = src_idx as usize;
            let frac = src_idx - idx as f32;
            let s1 = data.get(idx).copied().unwrap_or(0.0);
            let s2 = data.get(idx + 1).copied().unwrap_or(s1);
            s1 + (s2 - s1) * frac
        })
        .collect()
}

fn find_best_input_config(device: &Device) -> Result<StreamConfig, MediaError> {
    let configs = device
        .supported_input_configs()
        .map_err(|e| classify_backend_error(&e.to_string()))?;

    select_best_config(configs.collect())
}

/// Priorität: 48kHz > andere, F32 > andere
fn select_best_config(configs: Vec<SupportedStreamConfigRange>) -> Result<StreamConfig, MediaError> {
    let target_rate = cpal::SampleRate(SAMPLE_RATE);

    for config in &configs {
        if config.min_sample_rate() <= target_rate
            && config.max_sample_rate() >= target_rate
            && config.sample_format() == SampleFormat::F32
        {
            return Ok(config.with_sample_rate(target_rate).into());
        }
    }

    for config in &configs {
        if config.sample_format() == SampleFormat::F32 {
            return Ok(config.with_max_sample_rate().into());
        }
    }

    Err(MediaError::DeviceUnavailable(
        "No suitable audio configuration found".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullDevice {
        released: Arc<AtomicBool>,
    }

    impl CaptureDevice for NullDevice {
        fn name(&self) -> &str {
            "null"
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn handle_with_flag() -> (AudioHandle, Arc<CaptureTrack>, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        let track = CaptureTrack::new(AudioConstraints::default());
        let handle = AudioHandle::new(
            AudioConstraints::default(),
            vec![Arc::clone(&track)],
            Box::new(NullDevice {
                released: Arc::clone(&released),
            }),
        );
        (handle, track, released)
    }

    #[test]
    fn test_new_handle_is_monitor_muted_but_not_outbound_muted() {
        let (handle, track, _) = handle_with_flag();
        assert!(handle.is_monitor_muted());
        assert!(!handle.is_muted());
        assert!(track.is_enabled());
    }

    #[test]
    fn test_set_muted_is_idempotent() {
        let (handle, track, _) = handle_with_flag();
        handle.set_muted(true);
        handle.set_muted(true);
        assert!(handle.is_muted());
        assert!(!track.is_enabled());

        handle.set_muted(false);
        assert!(!handle.is_muted());
        assert!(track.is_enabled());
    }

    #[test]
    fn test_stop_releases_device_once() {
        let (mut handle, track, released) = handle_with_flag();
        handle.stop();
        assert!(released.load(Ordering::SeqCst));
        assert!(track.is_stopped());
        assert!(!handle.is_live());

        // Zweiter Aufruf ist ein No-op
        handle.stop();
        assert!(!handle.is_live());
    }

    #[test]
    fn test_drop_releases_device() {
        let (handle, _, released) = handle_with_flag();
        drop(handle);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_muted_track_does_not_buffer() {
        let track = CaptureTrack::new(AudioConstraints::default());
        track.set_enabled(false);
        track.push_samples(&vec![0.5; FRAME_SIZE]);
        assert!(track.read_frame().is_none());

        track.set_enabled(true);
        track.push_samples(&vec![0.5; FRAME_SIZE]);
        assert_eq!(track.read_frame().map(|f| f.len()), Some(FRAME_SIZE));
    }

    #[test]
    fn test_noise_gate_drops_quiet_blocks() {
        let track = CaptureTrack::new(AudioConstraints::default());
        track.push_samples(&vec![0.001; FRAME_SIZE]);
        assert!(track.read_frame().is_none());

        let raw = CaptureTrack::new(AudioConstraints {
            noise_suppression: false,
            ..AudioConstraints::default()
        });
        raw.push_samples(&vec![0.001; FRAME_SIZE]);
        assert!(raw.read_frame().is_some());
    }

    #[test]
    fn test_classify_backend_error() {
        assert!(matches!(
            classify_backend_error("Access denied by the system"),
            MediaError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_backend_error("The requested device is no longer available"),
            MediaError::DeviceUnavailable(_)
        ));
    }

    #[test]
    fn test_remote_audio_buffer_pads_with_silence() {
        let remote = RemoteAudioBuffer::new();
        remote.write_samples(&[0.1, 0.2, 0.3]);
        assert_eq!(remote.buffered(), 3);

        let mut out = [1.0; 5];
        assert_eq!(remote.read_samples(&mut out), 3);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.0, 0.0]);
    }

    #[test]
    fn test_stopped_remote_audio_buffer_discards() {
        let remote = RemoteAudioBuffer::new();
        remote.write_samples(&[0.5; 10]);
        remote.stop();
        assert_eq!(remote.buffered(), 0);

        remote.write_samples(&[0.5; 10]);
        assert_eq!(remote.buffered(), 0);
    }

    /// Gibt den "Stream" verzögert frei, wie cpal beim Schließen des Geräts
    struct SlowStream {
        released: Arc<AtomicBool>,
    }

    impl Drop for SlowStream {
        fn drop(&mut self) {
            std::thread::sleep(std::time::Duration::from_millis(200));
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn slow_stream(
        released: &Arc<AtomicBool>,
    ) -> impl FnOnce() -> Result<(String, SlowStream), MediaError> + Send + 'static {
        let released = Arc::clone(released);
        move || Ok(("test device".to_string(), SlowStream { released }))
    }

    #[tokio::test]
    async fn test_stream_thread_stop_does_not_block_runtime() {
        let released = Arc::new(AtomicBool::new(false));
        let mut thread = StreamThread::spawn("test-stream", slow_stream(&released))
            .await
            .unwrap();
        assert_eq!(thread.device_name, "test device");

        let started = std::time::Instant::now();
        thread.stop();
        assert!(started.elapsed() < std::time::Duration::from_millis(150));

        for _ in 0..100 {
            if released.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stream_thread_stop_joins_without_runtime() {
        let released = Arc::new(AtomicBool::new(false));
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut thread = runtime
            .block_on(StreamThread::spawn("test-stream", slow_stream(&released)))
            .unwrap();
        drop(runtime);

        // Ohne Runtime wird synchron gejoint
        thread.stop();
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stream_thread_reports_open_failure() {
        let result = StreamThread::spawn::<(), _>("test-stream", || {
            Err(MediaError::DeviceUnavailable("none".into()))
        })
        .await;
        assert!(matches!(result, Err(MediaError::DeviceUnavailable(_))));
    }

    #[test]
    fn test_downmix_and_resample() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(resample(&[0.0; 10], 24000, 48000).len(), 20);
        assert_eq!(resample(&[0.25; 10], 48000, 48000), vec![0.25; 10]);
    }
}
