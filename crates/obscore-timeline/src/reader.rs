use obscore_blob::BlobStore;
use obscore_types::{MediaSegment, MediaTrack, TrackFormat};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Byte-level reader over a [`MediaTrack`]'s segments.
///
/// Segment bytes are loaded lazily: nothing is fetched from the blob store
/// until the first `read` touches a given segment. Construction borrows no
/// state from the track beyond what's needed to walk it, so a reader can
/// outlive the timeline that produced its track by cloning it in.
pub struct TrackReader {
    track: MediaTrack,
    blob_store: Option<BlobStore>,
    segment_index: usize,
    position_in_segment: u64,
    cached: Option<Vec<u8>>,
}

impl TrackReader {
    pub fn new(track: MediaTrack, blob_store: Option<BlobStore>) -> Self {
        Self {
            track,
            blob_store,
            segment_index: 0,
            position_in_segment: 0,
            cached: None,
        }
    }

    pub fn track_format(&self) -> Option<&TrackFormat> {
        self.track.format.as_ref()
    }

    fn current_segment(&self) -> Option<&MediaSegment> {
        self.track.segments.get(self.segment_index)
    }

    async fn load_current(&mut self) -> Result<()> {
        if self.cached.is_some() {
            return Ok(());
        }
        let segment = self
            .current_segment()
            .ok_or_else(|| Error::NotFound("no current segment".to_string()))?;
        if let Some(bytes) = &segment.payload.inline {
            self.cached = Some(bytes.clone());
            return Ok(());
        }
        let Some(reference) = &segment.payload.storage_ref else {
            return Err(Error::InvalidArgument(
                "segment payload has neither inline bytes nor a storage reference".to_string(),
            ));
        };
        let Some(store) = &self.blob_store else {
            return Err(Error::InvalidArgument(
                "segment payload requires a blob store but none was attached".to_string(),
            ));
        };
        let bytes = store.load(&CancellationToken::new(), reference).await?;
        self.cached = Some(bytes);
        Ok(())
    }

    /// Copy bytes from the current position into `buf`, returning the
    /// number of bytes written. Zero means end of track.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            if self.segment_index >= self.track.segments.len() {
                return Ok(0);
            }
            self.load_current().await?;
            let cached = self.cached.as_ref().expect("just loaded");
            let remaining = cached.len().saturating_sub(self.position_in_segment as usize);
            if remaining == 0 {
                self.segment_index += 1;
                self.position_in_segment = 0;
                self.cached = None;
                continue;
            }
            let n = remaining.min(buf.len());
            let start = self.position_in_segment as usize;
            buf[..n].copy_from_slice(&cached[start..start + n]);
            self.position_in_segment += n as u64;
            return Ok(n);
        }
    }

    /// Seek to `offset_ms` from the track's start. Uses linear
    /// interpolation (`fraction * payload.size`) to estimate the intra-
    /// segment byte offset under a constant-bitrate assumption.
    pub fn seek(&mut self, offset_ms: u64) {
        self.cached = None;
        let located = self.track.offset_in_segment(offset_ms).map(|(segment, into_segment_ms)| {
            let byte_offset = if segment.duration_ms == 0 {
                0
            } else {
                let fraction = into_segment_ms as f64 / segment.duration_ms as f64;
                (fraction * segment.payload.size as f64) as u64
            };
            (segment.sequence, byte_offset)
        });

        match located {
            Some((sequence, byte_offset)) => {
                self.segment_index = self
                    .track
                    .segments
                    .iter()
                    .position(|s| s.sequence == sequence)
                    .unwrap_or(0);
                self.position_in_segment = byte_offset;
            }
            None => {
                self.segment_index = self.track.segments.len();
                self.position_in_segment = 0;
            }
        }
    }

    pub fn close(&mut self) {
        self.cached = None;
    }
}

/// Composes readers over the audio-input and audio-output tracks so a
/// caller can drive a single combined playback cursor. At least one of the
/// two tracks must be non-empty.
pub struct MixedAudioReader {
    input: Option<TrackReader>,
    output: Option<TrackReader>,
}

impl MixedAudioReader {
    pub fn new(input: Option<TrackReader>, output: Option<TrackReader>) -> Result<Self> {
        let input = input.filter(|r| !r.track.is_empty());
        let output = output.filter(|r| !r.track.is_empty());
        if input.is_none() && output.is_none() {
            return Err(Error::InvalidArgument(
                "mixed audio reader requires at least one non-empty track".to_string(),
            ));
        }
        Ok(Self { input, output })
    }

    pub fn format(&self) -> Option<&TrackFormat> {
        self.input
            .as_ref()
            .or(self.output.as_ref())
            .and_then(|r| r.track_format())
    }

    pub fn seek(&mut self, offset_ms: u64) {
        if let Some(input) = &mut self.input {
            input.seek(offset_ms);
        }
        if let Some(output) = &mut self.output {
            output.seek(offset_ms);
        }
    }

    /// Read from whichever track still has bytes available, preferring
    /// input over output when both do.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if let Some(input) = &mut self.input {
            let n = input.read(buf).await?;
            if n > 0 {
                return Ok(n);
            }
        }
        if let Some(output) = &mut self.output {
            return output.read(buf).await;
        }
        Ok(0)
    }

    pub fn close(&mut self) {
        if let Some(input) = &mut self.input {
            input.close();
        }
        if let Some(output) = &mut self.output {
            output.close();
        }
    }
}
