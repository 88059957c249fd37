use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use rtrb::{Consumer, Producer, RingBuffer};

use super::AudioSource;
use crate::{config::AudioConfig, JawSyncError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// State shared between the device callback and the reading side.
#[derive(Debug, Default)]
struct CaptureShared {
    failure: Mutex<Option<String>>,
    dropped: AtomicU64,
}

impl CaptureShared {
    fn fail(&self, reason: String) {
        if let Ok(mut slot) = self.failure.lock() {
            slot.get_or_insert(reason);
        }
    }

    fn failure(&self) -> Option<String> {
        match self.failure.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => Some("capture state has been poisoned".to_string()),
        }
    }
}

/// Default microphone exposed as a blocking, mono i16 [`AudioSource`].
///
/// The device callback down-mixes to mono and pushes into a lock-free ring.
/// When the ring is full new samples are dropped rather than reported. Each
/// read returns the newest block and discards anything older, so a frame
/// never draws audio captured during an earlier tick.
pub struct MicrophoneSource {
    stream: Option<Stream>,
    consumer: Consumer<i16>,
    shared: Arc<CaptureShared>,
    timeout: Duration,
    sample_rate: u32,
    device_name: String,
}

impl MicrophoneSource {
    /// Opens and starts the default input device.
    pub fn open(config: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| JawSyncError::AudioDevice("no default input device".to_string()))?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let (stream_config, format) = select_config(&device, config.sample_rate)?;
        tracing::info!(
            device = %device_name,
            sample_rate = stream_config.sample_rate.0,
            channels = stream_config.channels,
            ?format,
            "opening audio input"
        );

        let capacity = config.block_size * config.ring_blocks;
        let (producer, consumer) = RingBuffer::new(capacity);
        let shared = Arc::new(CaptureShared::default());

        let stream = match format {
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, producer, &shared)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, producer, &shared)?,
            SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, producer, &shared)?,
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, producer, &shared)?,
            other => {
                return Err(JawSyncError::AudioDevice(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        };

        stream
            .play()
            .map_err(|err| JawSyncError::AudioDevice(format!("failed to start stream: {err}")))?;

        Ok(Self {
            stream: Some(stream),
            consumer,
            shared,
            timeout: config.read_timeout(),
            sample_rate: stream_config.sample_rate.0,
            device_name,
        })
    }

}

impl AudioSource for MicrophoneSource {
    fn read_block(&mut self, block: &mut [i16]) -> Result<()> {
        if self.stream.is_none() {
            return Err(JawSyncError::AudioStream("input stream is closed".to_string()));
        }

        drain_latest_block(&mut self.consumer, &self.shared, block, self.timeout)?;

        let dropped = self.shared.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            tracing::trace!(dropped, "discarded stale or overflowing capture samples");
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                tracing::warn!(%err, "failed to pause audio input");
            }
            drop(stream);
            tracing::info!(device = %self.device_name, "audio input closed");
        }
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MicrophoneSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrophoneSource")
            .field("device_name", &self.device_name)
            .field("sample_rate", &self.sample_rate)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

/// Fills `block` with the most recent samples in the ring.
///
/// Anything buffered beyond one block is older than the current tick and is
/// discarded (counted as dropped). If less than a block is buffered, waits up
/// to `timeout` for the rest. A latched device failure wins over data.
fn drain_latest_block(
    consumer: &mut Consumer<i16>,
    shared: &CaptureShared,
    block: &mut [i16],
    timeout: Duration,
) -> Result<()> {
    let stale = consumer.slots().saturating_sub(block.len());
    if stale > 0 {
        consumer
            .read_chunk(stale)
            .map_err(|err| JawSyncError::AudioStream(err.to_string()))?
            .commit_all();
        shared.dropped.fetch_add(stale as u64, Ordering::Relaxed);
    }

    let deadline = Instant::now() + timeout;
    let mut filled = 0;

    while filled < block.len() {
        if let Some(reason) = shared.failure() {
            return Err(JawSyncError::AudioStream(reason));
        }

        let available = consumer.slots().min(block.len() - filled);
        if available > 0 {
            let chunk = consumer
                .read_chunk(available)
                .map_err(|err| JawSyncError::AudioStream(err.to_string()))?;
            let (first, second) = chunk.as_slices();
            let split = filled + first.len();
            block[filled..split].copy_from_slice(first);
            block[split..split + second.len()].copy_from_slice(second);
            chunk.commit_all();
            filled += available;
            continue;
        }

        if Instant::now() >= deadline {
            return Err(JawSyncError::AudioStream(format!(
                "no audio within {} ms",
                timeout.as_millis()
            )));
        }
        thread::sleep(POLL_INTERVAL);
    }

    Ok(())
}

/// Picks a supported config at `sample_rate`, preferring mono and native
/// i16, and falls back to the device default.
fn select_config(device: &Device, sample_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
    let ranges = device
        .supported_input_configs()
        .map_err(|err| JawSyncError::AudioDevice(err.to_string()))?;

    let best = ranges
        .filter(|range| {
            range.min_sample_rate().0 <= sample_rate && sample_rate <= range.max_sample_rate().0
        })
        .min_by_key(|range| (range.channels(), range.sample_format() != SampleFormat::I16));

    if let Some(range) = best {
        let supported = range.with_sample_rate(cpal::SampleRate(sample_rate));
        return Ok((supported.config(), supported.sample_format()));
    }

    let fallback = device
        .default_input_config()
        .map_err(|err| JawSyncError::AudioDevice(err.to_string()))?;
    tracing::warn!(
        requested = sample_rate,
        actual = fallback.sample_rate().0,
        "requested sample rate unsupported, using device default"
    );
    Ok((fallback.config(), fallback.sample_format()))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut producer: Producer<i16>,
    shared: &Arc<CaptureShared>,
) -> Result<Stream>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    let data_shared = Arc::clone(shared);
    let error_shared = Arc::clone(shared);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for frame in data.chunks(channels) {
                    if producer.push(downmix(frame)).is_err() {
                        data_shared.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            },
            move |err| {
                tracing::error!(%err, "audio input stream error");
                error_shared.fail(err.to_string());
            },
            None,
        )
        .map_err(|err| JawSyncError::AudioDevice(format!("failed to build stream: {err}")))
}

fn downmix<T>(frame: &[T]) -> i16
where
    T: Sample,
    i16: FromSample<T>,
{
    if frame.is_empty() {
        return 0;
    }
    let sum: i32 = frame
        .iter()
        .copied()
        .map(|sample| i32::from(sample.to_sample::<i16>()))
        .sum();
    (sum / frame.len() as i32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        assert_eq!(downmix(&[100_i16, 300]), 200);
        assert_eq!(downmix(&[i16::MIN, i16::MIN]), i16::MIN);
        assert_eq!(downmix::<i16>(&[]), 0);
    }

    #[test]
    fn downmix_converts_float_samples() {
        let mixed = downmix(&[1.0_f32]);
        assert!(mixed > 32_000);
    }

    const WAIT: Duration = Duration::from_millis(10);
    const SHORT_WAIT: Duration = Duration::from_millis(5);

    fn ring(capacity: usize) -> (Producer<i16>, Consumer<i16>) {
        RingBuffer::new(capacity)
    }

    fn push_all(producer: &mut Producer<i16>, samples: impl IntoIterator<Item = i16>) {
        for sample in samples {
            producer.push(sample).unwrap();
        }
    }

    #[test]
    fn reads_only_the_most_recent_block() {
        let (mut producer, mut consumer) = ring(32);
        let shared = CaptureShared::default();
        push_all(&mut producer, 0..20);

        let mut block = [0_i16; 4];
        drain_latest_block(&mut consumer, &shared, &mut block, WAIT).unwrap();

        assert_eq!(block, [16, 17, 18, 19]);
        assert_eq!(shared.dropped.load(Ordering::Relaxed), 16);
        assert_eq!(consumer.slots(), 0);
    }

    #[test]
    fn stays_current_when_capture_outpaces_reads() {
        // Three blocks arrive between reads; each read must see the newest one.
        let (mut producer, mut consumer) = ring(64);
        let shared = CaptureShared::default();
        let mut block = [0_i16; 8];

        for tick in 0..10_i16 {
            push_all(&mut producer, (0..24).map(|i| tick * 100 + i));
            drain_latest_block(&mut consumer, &shared, &mut block, WAIT).unwrap();
            assert_eq!(block[0], tick * 100 + 16);
            assert_eq!(block[7], tick * 100 + 23);
        }
    }

    #[test]
    fn copies_across_ring_wraparound() {
        let (mut producer, mut consumer) = ring(8);
        let shared = CaptureShared::default();
        let mut block = [0_i16; 6];

        push_all(&mut producer, 0..6);
        drain_latest_block(&mut consumer, &shared, &mut block, WAIT).unwrap();

        // Write position is now 6 of 8, so the next block wraps.
        push_all(&mut producer, 10..16);
        drain_latest_block(&mut consumer, &shared, &mut block, WAIT).unwrap();

        assert_eq!(block, [10, 11, 12, 13, 14, 15]);
        assert_eq!(shared.dropped.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn waits_for_samples_from_another_thread() {
        let (mut producer, mut consumer) = ring(16);
        let shared = CaptureShared::default();

        let writer = thread::spawn(move || {
            for sample in 1..=4 {
                thread::sleep(Duration::from_millis(2));
                producer.push(sample).unwrap();
            }
        });

        let mut block = [0_i16; 4];
        drain_latest_block(&mut consumer, &shared, &mut block, Duration::from_secs(2)).unwrap();
        writer.join().unwrap();

        assert_eq!(block, [1, 2, 3, 4]);
    }

    #[test]
    fn times_out_without_audio() {
        let (mut producer, mut consumer) = ring(16);
        let shared = CaptureShared::default();
        push_all(&mut producer, [7, 7]);

        let mut block = [0_i16; 4];
        let err = drain_latest_block(&mut consumer, &shared, &mut block, SHORT_WAIT).unwrap_err();

        assert!(matches!(err, JawSyncError::AudioStream(_)));
        assert!(format!("{err}").contains("no audio within 5 ms"));
    }

    #[test]
    fn device_failure_surfaces_on_next_read() {
        let (mut producer, mut consumer) = ring(16);
        let shared = CaptureShared::default();
        push_all(&mut producer, 0..4);
        shared.fail("device unplugged".to_string());

        let mut block = [0_i16; 4];
        let err = drain_latest_block(&mut consumer, &shared, &mut block, SHORT_WAIT).unwrap_err();

        match err {
            JawSyncError::AudioStream(reason) => assert_eq!(reason, "device unplugged"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn first_failure_is_latched() {
        let shared = CaptureShared::default();
        assert!(shared.failure().is_none());
        shared.fail("device unplugged".to_string());
        shared.fail("second".to_string());
        assert_eq!(shared.failure().as_deref(), Some("device unplugged"));
    }
}
