//! WAV clip playback.
//!
//! Clips are PCM RIFF/WAVE files, 8 or 16 bit, mono or stereo. Samples are
//! streamed to the sink as unsigned 8 bit values (16 bit samples keep their
//! high byte, stereo keeps the left channel).

use crate::clip::Clip;
use crate::playback::{ClipError, ClipPlayer, DecodeError};

const BUF_LEN: usize = 128;
const PCM: u16 = 1;

/// Storage holding the clip files.
pub trait ClipSource {
    type File;

    /// `Err(ClipError::NotFound)` when there is no such file.
    fn open(&mut self, name: &str) -> Result<Self::File, ClipError>;

    /// Returns 0 at end of file.
    fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, ClipError>;

    fn close(&mut self, file: Self::File);
}

/// Audio output.
pub trait SampleSink {
    fn start(&mut self, sample_rate: u32);

    /// Blocks until the previous sample period has elapsed.
    fn write(&mut self, sample: u8);

    fn stop(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WavFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavFormat {
    fn parse(raw: &[u8; 16]) -> Result<Self, DecodeError> {
        let audio_format = u16::from_le_bytes([raw[0], raw[1]]);
        let format = WavFormat {
            channels: u16::from_le_bytes([raw[2], raw[3]]),
            sample_rate: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
            bits_per_sample: u16::from_le_bytes([raw[14], raw[15]]),
        };

        if audio_format != PCM
            || !matches!(format.channels, 1 | 2)
            || !matches!(format.bits_per_sample, 8 | 16)
            || format.sample_rate == 0
        {
            return Err(DecodeError::UnsupportedFormat);
        }
        Ok(format)
    }

    pub fn frame_len(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bits_per_sample / 8)
    }

    fn sample(&self, frame: &[u8]) -> u8 {
        match self.bits_per_sample {
            8 => frame[0],
            // little endian, signed: keep the high byte and re-bias
            _ => frame[1] ^ 0x80,
        }
    }
}

struct Reader<'a, S: ClipSource> {
    source: &'a mut S,
    file: &'a mut S::File,
    buf: [u8; BUF_LEN],
    pos: usize,
    len: usize,
}

impl<'a, S: ClipSource> Reader<'a, S> {
    fn new(source: &'a mut S, file: &'a mut S::File) -> Self {
        Self {
            source,
            file,
            buf: [0; BUF_LEN],
            pos: 0,
            len: 0,
        }
    }

    fn byte(&mut self) -> Result<Option<u8>, ClipError> {
        if self.pos == self.len {
            self.len = self.source.read(self.file, &mut self.buf)?;
            self.pos = 0;
            if self.len == 0 {
                return Ok(None);
            }
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(b))
    }

    fn read_exact(&mut self, out: &mut [u8]) -> Result<(), ClipError> {
        for b in out.iter_mut() {
            *b = self.byte()?.ok_or(DecodeError::Truncated)?;
        }
        Ok(())
    }

    fn skip(&mut self, n: u32) -> Result<(), ClipError> {
        for _ in 0..n {
            self.byte()?.ok_or(DecodeError::Truncated)?;
        }
        Ok(())
    }

    /// Walks the chunks up to `data`, returns the format and data length.
    fn header(&mut self) -> Result<(WavFormat, u32), ClipError> {
        let mut riff = [0u8; 12];
        self.read_exact(&mut riff)?;
        if &riff[0..4] != b"RIFF" {
            return Err(DecodeError::NotRiff.into());
        }
        if &riff[8..12] != b"WAVE" {
            return Err(DecodeError::NotWave.into());
        }

        let mut format = None;
        loop {
            let mut chunk = [0u8; 8];
            if let Err(e) = self.read_exact(&mut chunk) {
                return Err(match (e, format) {
                    (ClipError::Decode(DecodeError::Truncated), None) => {
                        DecodeError::MissingFormat.into()
                    }
                    (ClipError::Decode(DecodeError::Truncated), Some(_)) => {
                        DecodeError::MissingData.into()
                    }
                    (e, _) => e,
                });
            }
            let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
            // chunks are word aligned
            let pad = size & 1;

            match &chunk[0..4] {
                b"fmt " => {
                    if size < 16 {
                        return Err(DecodeError::UnsupportedFormat.into());
                    }
                    let mut raw = [0u8; 16];
                    self.read_exact(&mut raw)?;
                    format = Some(WavFormat::parse(&raw)?);
                    self.skip(size - 16 + pad)?;
                }
                b"data" => {
                    let format = format.ok_or(DecodeError::MissingFormat)?;
                    return Ok((format, size));
                }
                _ => self.skip(size.checked_add(pad).ok_or(DecodeError::Truncated)?)?,
            }
        }
    }
}

fn stream<S: ClipSource, K: SampleSink>(
    source: &mut S,
    file: &mut S::File,
    sink: &mut K,
) -> Result<(), ClipError> {
    let mut reader = Reader::new(source, file);
    let (format, data_len) = reader.header()?;
    trace!("wav {}", format);

    let frame_len = format.frame_len();
    let frames = data_len as usize / frame_len;
    let mut frame = [0u8; 4];

    sink.start(format.sample_rate);
    let mut result = Ok(());
    for _ in 0..frames {
        match reader.read_exact(&mut frame[..frame_len]) {
            Ok(()) => sink.write(format.sample(&frame)),
            // data chunk shorter than declared, play what is there
            Err(ClipError::Decode(DecodeError::Truncated)) => break,
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }
    sink.stop();
    result
}

/// Plays clips from a [`ClipSource`] to a [`SampleSink`].
pub struct WavPlayer<S, K> {
    source: S,
    sink: K,
}

impl<S: ClipSource, K: SampleSink> WavPlayer<S, K> {
    pub fn new(source: S, sink: K) -> Self {
        Self { source, sink }
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_parts(self) -> (S, K) {
        (self.source, self.sink)
    }
}

impl<S: ClipSource, K: SampleSink> ClipPlayer for WavPlayer<S, K> {
    fn play(&mut self, clip: &Clip) -> Result<(), ClipError> {
        let name = clip.file_name();
        let mut file = self.source.open(&name)?;
        let result = stream(&mut self.source, &mut file, &mut self.sink);
        self.source.close(file);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav(channels: u16, rate: u32, bits: u16, data: &[u8], extra: &[u8]) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(b"RIFF");
        v.extend_from_slice(&0u32.to_le_bytes());
        v.extend_from_slice(b"WAVE");
        v.extend_from_slice(extra);
        v.extend_from_slice(b"fmt ");
        v.extend_from_slice(&16u32.to_le_bytes());
        v.extend_from_slice(&PCM.to_le_bytes());
        v.extend_from_slice(&channels.to_le_bytes());
        v.extend_from_slice(&rate.to_le_bytes());
        let block = channels * bits / 8;
        v.extend_from_slice(&(rate * u32::from(block)).to_le_bytes());
        v.extend_from_slice(&block.to_le_bytes());
        v.extend_from_slice(&bits.to_le_bytes());
        v.extend_from_slice(b"data");
        v.extend_from_slice(&(data.len() as u32).to_le_bytes());
        v.extend_from_slice(data);
        v
    }

    struct Card {
        files: Vec<(&'static str, Vec<u8>)>,
        open: usize,
        fail_reads: bool,
    }

    impl Card {
        fn new(files: Vec<(&'static str, Vec<u8>)>) -> Self {
            Self {
                files,
                open: 0,
                fail_reads: false,
            }
        }
    }

    impl ClipSource for Card {
        type File = (usize, usize);

        fn open(&mut self, name: &str) -> Result<Self::File, ClipError> {
            let i = self
                .files
                .iter()
                .position(|(n, _)| *n == name)
                .ok_or(ClipError::NotFound)?;
            self.open += 1;
            Ok((i, 0))
        }

        fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, ClipError> {
            if self.fail_reads {
                return Err(DecodeError::ReadFailed.into());
            }
            let data = &self.files[file.0].1;
            // short reads on purpose
            let n = buf.len().min(data.len() - file.1).min(7);
            buf[..n].copy_from_slice(&data[file.1..file.1 + n]);
            file.1 += n;
            Ok(n)
        }

        fn close(&mut self, _file: Self::File) {
            self.open -= 1;
        }
    }

    #[derive(Default)]
    struct Speaker {
        rate: Option<u32>,
        samples: Vec<u8>,
        running: bool,
    }

    impl SampleSink for Speaker {
        fn start(&mut self, sample_rate: u32) {
            self.rate = Some(sample_rate);
            self.running = true;
        }

        fn write(&mut self, sample: u8) {
            assert!(self.running);
            self.samples.push(sample);
        }

        fn stop(&mut self) {
            self.running = false;
        }
    }

    type Files = Vec<(&'static str, Vec<u8>)>;

    fn play(files: Files, clip: Clip) -> (Result<(), ClipError>, Card, Speaker) {
        let mut player = WavPlayer::new(Card::new(files), Speaker::default());
        let r = player.play(&clip);
        let (card, speaker) = player.into_parts();
        (r, card, speaker)
    }

    #[test]
    fn plays_8bit_mono() {
        let data: Vec<u8> = (0..=200).collect();
        let (r, card, speaker) = play(vec![("5.WAV", wav(1, 8000, 8, &data, &[]))], Clip::Numeral(5));
        assert_eq!(r, Ok(()));
        assert_eq!(speaker.rate, Some(8000));
        assert_eq!(speaker.samples, data);
        assert!(!speaker.running);
        assert_eq!(card.open, 0);
    }

    #[test]
    fn converts_16bit_stereo() {
        let mut data = Vec::new();
        for (l, r) in [(0i16, 1000i16), (i16::MIN, 0), (i16::MAX, 0), (-256, 0)] {
            data.extend_from_slice(&l.to_le_bytes());
            data.extend_from_slice(&r.to_le_bytes());
        }
        let (r, _, speaker) = play(vec![("CHIME.WAV", wav(2, 11025, 16, &data, &[]))], Clip::Chime);
        assert_eq!(r, Ok(()));
        assert_eq!(speaker.rate, Some(11025));
        assert_eq!(speaker.samples, [0x80, 0x00, 0xff, 0x7f]);
    }

    #[test]
    fn skips_unknown_chunks() {
        let mut list = Vec::new();
        list.extend_from_slice(b"LIST");
        list.extend_from_slice(&3u32.to_le_bytes());
        list.extend_from_slice(&[1, 2, 3, 0]);
        let (r, _, speaker) = play(
            vec![("CUCKOO.WAV", wav(1, 8000, 8, &[9, 8, 7], &list))],
            Clip::Cuckoo,
        );
        assert_eq!(r, Ok(()));
        assert_eq!(speaker.samples, [9, 8, 7]);
    }

    #[test]
    fn short_data_chunk_plays_what_is_there() {
        let mut file = wav(1, 8000, 8, &[1, 2, 3, 4], &[]);
        file.truncate(file.len() - 2);
        let (r, card, speaker) = play(vec![("1.WAV", file)], Clip::Numeral(1));
        assert_eq!(r, Ok(()));
        assert_eq!(speaker.samples, [1, 2]);
        assert_eq!(card.open, 0);
    }

    #[test]
    fn missing_file() {
        let (r, card, speaker) = play(vec![], Clip::Numeral(7));
        assert_eq!(r, Err(ClipError::NotFound));
        assert_eq!(card.open, 0);
        assert!(speaker.rate.is_none());
    }

    #[test]
    fn rejects_malformed_headers() {
        let mut not_riff = wav(1, 8000, 8, &[1], &[]);
        not_riff[0] = b'X';
        let (r, card, _) = play(vec![("1.WAV", not_riff)], Clip::Numeral(1));
        assert_eq!(r, Err(ClipError::Decode(DecodeError::NotRiff)));
        assert_eq!(card.open, 0);

        let mut not_wave = wav(1, 8000, 8, &[1], &[]);
        not_wave[8] = b'X';
        let (r, _, _) = play(vec![("1.WAV", not_wave)], Clip::Numeral(1));
        assert_eq!(r, Err(ClipError::Decode(DecodeError::NotWave)));

        let (r, _, _) = play(vec![("1.WAV", wav(1, 8000, 24, &[1, 2, 3], &[]))], Clip::Numeral(1));
        assert_eq!(r, Err(ClipError::Decode(DecodeError::UnsupportedFormat)));

        let header_only = wav(1, 8000, 8, &[], &[])[..12].to_vec();
        let (r, _, _) = play(vec![("1.WAV", header_only)], Clip::Numeral(1));
        assert_eq!(r, Err(ClipError::Decode(DecodeError::MissingFormat)));

        let mut no_data = wav(1, 8000, 8, &[], &[]);
        no_data.truncate(no_data.len() - 8);
        let (r, _, _) = play(vec![("1.WAV", no_data)], Clip::Numeral(1));
        assert_eq!(r, Err(ClipError::Decode(DecodeError::MissingData)));
    }

    #[test]
    fn huge_chunk_size_is_a_decode_error() {
        for size in [u32::MAX, u32::MAX - 1] {
            let mut bytes = b"RIFF\x00\x00\x00\x00WAVELIST".to_vec();
            bytes.extend_from_slice(&size.to_le_bytes());
            bytes.extend_from_slice(b"INFO");
            let (r, card, speaker) = play(vec![("1.WAV", bytes)], Clip::Numeral(1));
            assert!(matches!(r, Err(ClipError::Decode(_))), "{:#x}", size);
            assert_eq!(card.open, 0);
            assert!(speaker.samples.is_empty());
        }
    }

    #[test]
    fn read_failure_closes_file() {
        let mut player = WavPlayer::new(
            Card::new(vec![("2.WAV", wav(1, 8000, 8, &[1], &[]))]),
            Speaker::default(),
        );
        player.source_mut().fail_reads = true;
        assert_eq!(
            player.play(&Clip::Numeral(2)),
            Err(ClipError::Decode(DecodeError::ReadFailed))
        );
        assert_eq!(player.source_mut().open, 0);
    }
}
