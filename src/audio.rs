//! Siren asset and playback sinks.
//!
//! The clip is loaded once at startup. Playback goes through `AlertSink` so
//! the alarm controller never touches an audio device directly.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

/// A pre-recorded alert clip held in memory.
#[derive(Clone, Debug)]
pub struct AlertSound {
    bytes: Arc<[u8]>,
    path: PathBuf,
}

impl AlertSound {
    /// Read a WAV clip. Fails when the file is missing or is not RIFF/WAVE.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("siren sound file {} not found", path.display()))?;
        if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(anyhow!(
                "siren sound file {} is not a RIFF/WAVE clip",
                path.display()
            ));
        }
        Ok(Self {
            bytes: bytes.into(),
            path: path.to_path_buf(),
        })
    }

    pub fn bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Playback engine used by the escalation loop.
pub trait AlertSink: Send + Sync {
    /// Trigger one playback of the clip at `volume` (0.0..=1.0).
    fn play(&self, volume: f32) -> Result<()>;

    /// Cut any in-flight playback.
    fn silence(&self);
}

/// Terminal bell fallback for hosts without an audio device.
#[derive(Debug, Default)]
pub struct BellSink;

impl AlertSink for BellSink {
    fn play(&self, volume: f32) -> Result<()> {
        log::debug!("siren: bell at volume {:.2}", volume);
        let mut err = std::io::stderr().lock();
        err.write_all(b"\x07")?;
        err.flush()?;
        Ok(())
    }

    fn silence(&self) {}
}

#[cfg(feature = "audio-rodio")]
pub use rodio_sink::RodioSink;

#[cfg(feature = "audio-rodio")]
mod rodio_sink {
    use std::io::Cursor;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::thread::{self, JoinHandle};

    use anyhow::{anyhow, Result};

    use super::{AlertSink, AlertSound};

    enum AudioCommand {
        Play(f32),
        Silence,
        Shutdown,
    }

    /// Speaker output via rodio.
    ///
    /// The output stream is not `Send`, so a dedicated thread owns it and
    /// receives commands over a channel.
    pub struct RodioSink {
        tx: Mutex<mpsc::Sender<AudioCommand>>,
        handle: Mutex<Option<JoinHandle<()>>>,
    }

    impl RodioSink {
        pub fn new(sound: &AlertSound) -> Result<Self> {
            let clip = sound.bytes();
            let (tx, rx) = mpsc::channel::<AudioCommand>();
            let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);

            let handle = thread::Builder::new()
                .name("siren-audio".to_string())
                .spawn(move || {
                    let (_stream, stream_handle) = match rodio::OutputStream::try_default() {
                        Ok(pair) => {
                            let _ = ready_tx.send(Ok(()));
                            pair
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e.to_string()));
                            return;
                        }
                    };
                    let mut active: Vec<rodio::Sink> = Vec::new();
                    while let Ok(cmd) = rx.recv() {
                        match cmd {
                            AudioCommand::Play(volume) => {
                                active.retain(|sink| !sink.empty());
                                let source = match rodio::Decoder::new(Cursor::new(Arc::clone(&clip))) {
                                    Ok(source) => source,
                                    Err(e) => {
                                        log::warn!("siren: failed to decode clip: {}", e);
                                        continue;
                                    }
                                };
                                match rodio::Sink::try_new(&stream_handle) {
                                    Ok(sink) => {
                                        sink.set_volume(volume);
                                        sink.append(source);
                                        active.push(sink);
                                    }
                                    Err(e) => log::warn!("siren: playback failed: {}", e),
                                }
                            }
                            AudioCommand::Silence => {
                                for sink in active.drain(..) {
                                    sink.stop();
                                }
                            }
                            AudioCommand::Shutdown => break,
                        }
                    }
                })
                .map_err(|e| anyhow!("failed to spawn audio thread: {}", e))?;

            match ready_rx.recv() {
                Ok(Ok(())) => Ok(Self {
                    tx: Mutex::new(tx),
                    handle: Mutex::new(Some(handle)),
                }),
                Ok(Err(e)) => Err(anyhow!("no audio output device: {}", e)),
                Err(_) => Err(anyhow!("audio thread exited during startup")),
            }
        }

        fn send(&self, cmd: AudioCommand) -> Result<()> {
            let tx = self
                .tx
                .lock()
                .map_err(|_| anyhow!("audio channel lock poisoned"))?;
            tx.send(cmd).map_err(|_| anyhow!("audio thread is gone"))
        }
    }

    impl AlertSink for RodioSink {
        fn play(&self, volume: f32) -> Result<()> {
            self.send(AudioCommand::Play(volume))
        }

        fn silence(&self) {
            let _ = self.send(AudioCommand::Silence);
        }
    }

    impl Drop for RodioSink {
        fn drop(&mut self) {
            let _ = self.send(AudioCommand::Shutdown);
            if let Ok(mut handle) = self.handle.lock() {
                if let Some(handle) = handle.take() {
                    let _ = handle.join();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_wav() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&36u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes
    }

    #[test]
    fn loads_wave_clip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("siren.wav");
        std::fs::write(&path, minimal_wav())?;
        let sound = AlertSound::load(&path)?;
        assert_eq!(sound.path(), path.as_path());
        assert_eq!(&sound.bytes()[0..4], b"RIFF");
        Ok(())
    }

    #[test]
    fn missing_or_foreign_clip_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("siren.wav");
        let err = AlertSound::load(&missing).unwrap_err();
        assert!(err.to_string().contains("not found"));

        let mp3 = dir.path().join("siren.mp3");
        std::fs::write(&mp3, b"ID3\x03\x00\x00\x00\x00\x00\x00\x00\x00")?;
        assert!(AlertSound::load(&mp3).is_err());
        Ok(())
    }
}
