//! ffmpeg PCM tap: decodes the selected stream to mono f32 and broadcasts it
//! for the analyser.  Runs alongside mpv against the same `{base}{id}` URL.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::broadcast;
use tracing::debug;

use crate::BroadcastMessage;

/// Samples per broadcast chunk.
pub const CHUNK_SAMPLES: usize = 1024;

const RESTART_DELAY: Duration = Duration::from_secs(2);

/// Accumulates little-endian s16 bytes into fixed-size f32 chunks.
///
/// Reads from a pipe can end on an odd byte; the stray byte is carried over.
pub struct PcmDecoder {
    carry: Option<u8>,
    chunk: Vec<f32>,
    chunk_len: usize,
}

impl PcmDecoder {
    pub fn new(chunk_len: usize) -> Self {
        Self {
            carry: None,
            chunk: Vec::with_capacity(chunk_len),
            chunk_len: chunk_len.max(1),
        }
    }

    /// Feed raw bytes; `emit` is called once per completed chunk.
    pub fn feed(&mut self, bytes: &[u8], mut emit: impl FnMut(Vec<f32>)) {
        let mut rest = bytes;
        if let Some(lo) = self.carry.take() {
            match rest.split_first() {
                Some((&hi, tail)) => {
                    self.push(i16::from_le_bytes([lo, hi]), &mut emit);
                    rest = tail;
                }
                None => {
                    self.carry = Some(lo);
                    return;
                }
            }
        }
        let mut pairs = rest.chunks_exact(2);
        for pair in &mut pairs {
            self.push(i16::from_le_bytes([pair[0], pair[1]]), &mut emit);
        }
        if let [odd] = pairs.remainder() {
            self.carry = Some(*odd);
        }
    }

    fn push(&mut self, sample: i16, emit: &mut impl FnMut(Vec<f32>)) {
        self.chunk.push(sample as f32 / 32768.0);
        if self.chunk.len() >= self.chunk_len {
            let full = std::mem::replace(&mut self.chunk, Vec::with_capacity(self.chunk_len));
            emit(full);
        }
    }
}

/// Spawn the tap and keep restarting it until aborted.
pub fn spawn_pcm_tap(
    url: String,
    sample_rate: u32,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
) -> tokio::task::AbortHandle {
    let handle = tokio::spawn(async move {
        loop {
            if let Err(e) = run_pcm_tap(&url, sample_rate, &broadcast_tx).await {
                debug!("pcm tap: ffmpeg exited: {}", e);
            }
            tokio::time::sleep(RESTART_DELAY).await;
        }
    });
    handle.abort_handle()
}

async fn run_pcm_tap(
    url: &str,
    sample_rate: u32,
    broadcast_tx: &broadcast::Sender<BroadcastMessage>,
) -> anyhow::Result<()> {
    let rate = sample_rate.to_string();
    let ffmpeg_bin =
        tuner_proto::platform::find_ffmpeg_binary().unwrap_or_else(|| PathBuf::from("ffmpeg"));
    let mut child = Command::new(ffmpeg_bin)
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostdin",
            "-fflags",
            "nobuffer",
            "-flags",
            "low_delay",
            "-probesize",
            "64k",
            "-analyzeduration",
            "200000",
            "-i",
            url,
            "-vn",
            "-ac",
            "1",
            "-ar",
            &rate,
            "-f",
            "s16le",
            "pipe:1",
        ])
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .spawn()?;
    debug!("pcm tap: ffmpeg started for {}", url);

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("ffmpeg stdout not captured"))?;
    let mut buf = vec![0u8; CHUNK_SAMPLES * 2];
    let mut decoder = PcmDecoder::new(CHUNK_SAMPLES);

    loop {
        let n = stdout.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        decoder.feed(&buf[..n], |chunk| {
            let _ = broadcast_tx.send(BroadcastMessage::PcmChunk(Arc::new(chunk)));
        });
    }

    let status = child.wait().await?;
    if !status.success() {
        anyhow::bail!("ffmpeg exited: {}", status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_decoder_emits_full_chunks_only() {
        let mut dec = PcmDecoder::new(4);
        let mut out = Vec::new();
        dec.feed(&le_bytes(&[0, 16384, -16384, -32768, 100]), |c| out.push(c));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], vec![0.0, 0.5, -0.5, -1.0]);

        dec.feed(&le_bytes(&[1, 2, 3]), |c| out.push(c));
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].len(), 4);
    }

    #[test]
    fn test_decoder_carries_odd_byte_across_reads() {
        let bytes = le_bytes(&[16384, -16384]);
        let mut dec = PcmDecoder::new(2);
        let mut out = Vec::new();
        dec.feed(&bytes[..1], |c| out.push(c));
        dec.feed(&bytes[1..3], |c| out.push(c));
        assert!(out.is_empty());
        dec.feed(&bytes[3..], |c| out.push(c));
        assert_eq!(out, vec![vec![0.5, -0.5]]);
    }
}
