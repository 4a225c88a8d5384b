use crossbeam_channel::{Sender, TrySendError};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Downmix interleaved input to mono PCM16LE bytes, averaging each frame's
/// channels after `convert` maps a sample to `[-1.0, 1.0]`.
pub(super) fn append_downmixed_pcm16<T, F>(
    buf: &mut Vec<u8>,
    data: &[T],
    channels: usize,
    mut convert: F,
) where
    T: Copy,
    F: FnMut(T) -> f32,
{
    let channels = channels.max(1);
    for frame in data.chunks(channels) {
        let sum: f32 = frame.iter().copied().map(&mut convert).sum();
        let mono = sum / frame.len() as f32;
        buf.extend_from_slice(&to_pcm16(mono).to_le_bytes());
    }
}

pub(super) fn to_pcm16(sample: f32) -> i16 {
    let scaled = (sample.clamp(-1.0, 1.0) * 32_767.0).round();
    scaled as i16
}

/// Re-chunks callback-sized audio into fixed frames and hands them to the
/// reader without ever blocking the device callback.
pub(super) struct FrameDispatcher {
    frame_bytes: usize,
    pending: Vec<u8>,
    sender: Sender<Vec<u8>>,
    dropped: Arc<AtomicUsize>,
}

impl FrameDispatcher {
    pub(super) fn new(frame_bytes: usize, sender: Sender<Vec<u8>>, dropped: Arc<AtomicUsize>) -> Self {
        let frame_bytes = frame_bytes.max(2);
        Self {
            frame_bytes,
            pending: Vec::with_capacity(frame_bytes * 2),
            sender,
            dropped,
        }
    }

    pub(super) fn push<T, F>(&mut self, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        append_downmixed_pcm16(&mut self.pending, data, channels, convert);

        while self.pending.len() >= self.frame_bytes {
            let frame: Vec<u8> = self.pending.drain(..self.frame_bytes).collect();
            if let Err(err) = self.sender.try_send(frame) {
                match err {
                    TrySendError::Full(_) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    TrySendError::Disconnected(_) => {
                        self.pending.clear();
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn downmix_averages_channels() {
        let mut buf = Vec::new();
        append_downmixed_pcm16(&mut buf, &[1.0f32, 0.0, -1.0, -1.0], 2, |s| s);
        let samples: Vec<i16> = buf
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        assert_eq!(samples, vec![16_384, -32_767]);
    }

    #[test]
    fn pcm16_conversion_clamps() {
        assert_eq!(to_pcm16(2.0), 32_767);
        assert_eq!(to_pcm16(-2.0), -32_767);
        assert_eq!(to_pcm16(0.0), 0);
    }

    #[test]
    fn dispatcher_emits_fixed_frames_and_counts_drops() {
        let (tx, rx) = bounded(1);
        let dropped = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = FrameDispatcher::new(8, tx, dropped.clone());
        let convert = |s: i16| f32::from(s) / 32_768.0;

        dispatcher.push(&[0i16; 3], 1, convert);
        assert!(rx.try_recv().is_err(), "partial frame stays pending");

        dispatcher.push(&[0i16; 3], 1, convert);
        dispatcher.push(&[0i16; 3], 1, convert);
        assert_eq!(dropped.load(Ordering::Relaxed), 1);
        assert_eq!(rx.try_recv().map(|f| f.len()), Ok(8));
    }
}
