use obscore_blob::BlobStore;
use obscore_types::{MediaTrack, TrackFormat};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

const DEFAULT_BITS_PER_SAMPLE: u16 = 16;

/// Concatenate an audio track's segment bytes into a standard RIFF/WAVE
/// file with a 44-byte header. Rejects non-audio and empty tracks.
pub async fn export_wav(track: &MediaTrack, blob_store: Option<&BlobStore>) -> Result<Vec<u8>> {
    if track.is_empty() {
        return Err(Error::InvalidArgument("cannot export an empty track to WAV".to_string()));
    }
    let format = match &track.format {
        Some(TrackFormat::Audio(format)) => format.clone(),
        _ => return Err(Error::InvalidArgument("cannot export a non-audio track to WAV".to_string())),
    };

    let mut pcm = Vec::new();
    for segment in &track.segments {
        if let Some(bytes) = &segment.payload.inline {
            pcm.extend_from_slice(bytes);
            continue;
        }
        let Some(reference) = &segment.payload.storage_ref else {
            return Err(Error::InvalidArgument(
                "segment payload has neither inline bytes nor a storage reference".to_string(),
            ));
        };
        let Some(store) = blob_store else {
            return Err(Error::InvalidArgument(
                "segment payload requires a blob store but none was attached".to_string(),
            ));
        };
        let bytes = store.load(&CancellationToken::new(), reference).await?;
        pcm.extend_from_slice(&bytes);
    }

    Ok(encode_wav(
        &pcm,
        format.sample_rate,
        format.channels,
        if format.bits_per_sample == 0 {
            DEFAULT_BITS_PER_SAMPLE
        } else {
            format.bits_per_sample
        },
    ))
}

fn encode_wav(pcm: &[u8], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let block_align = channels * (bits_per_sample / 8);
    let byte_rate = sample_rate * block_align as u32;
    let data_size = pcm.len() as u32;

    let mut out = Vec::with_capacity(44 + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_size).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscore_types::event::AudioFormat;
    use obscore_types::{BinaryPayload, MediaSegment, TrackType};

    fn audio_track(chunks: &[&[u8]]) -> MediaTrack {
        let format = AudioFormat::default();
        let segments = chunks
            .iter()
            .enumerate()
            .map(|(i, bytes)| MediaSegment {
                start_time_ms: i as i64 * 10,
                duration_ms: 10,
                payload: BinaryPayload::inline(bytes.to_vec(), "audio/pcm"),
                format: TrackFormat::Audio(format.clone()),
                origin_event_index: i,
                sequence: i as u64,
            })
            .collect::<Vec<_>>();
        MediaTrack {
            track_type: TrackType::AudioInput,
            total_duration_ms: segments.iter().map(|s| s.duration_ms).sum(),
            format: Some(TrackFormat::Audio(format)),
            segments,
        }
    }

    #[tokio::test]
    async fn exports_header_and_concatenated_pcm() {
        let track = audio_track(&[&[1, 2, 3, 4], &[5, 6, 7, 8]]);
        let wav = export_wav(&track, None).await.unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 8);
        assert_eq!(&wav[44..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn rejects_empty_track() {
        let track = MediaTrack::empty(TrackType::AudioInput);
        let err = export_wav(&track, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn rejects_non_audio_track() {
        let mut track = audio_track(&[&[1, 2]]);
        track.format = Some(TrackFormat::Video {
            width: 640,
            height: 480,
            encoding: "h264".into(),
        });
        let err = export_wav(&track, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
