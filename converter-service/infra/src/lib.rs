pub mod audio;
pub mod clock;
pub mod decoder;
pub mod ffmpeg;
pub mod native;
pub mod object_storage;
pub mod storage;
pub mod synthetic;
pub mod wav;

pub use audio::{transform_buffer, AudioTransformerAdapter};
pub use clock::SystemClock;
pub use decoder::Mp3Decoder;
pub use ffmpeg::{probe_ffmpeg_binary, FfmpegConversionEngine};
pub use native::NativeConversionEngine;
pub use object_storage::{HttpObjectStorage, RetryPolicy};
pub use storage::{FsFileStore, FsShareStore};
pub use synthetic::{ChordProgressionGenerator, SineToneGenerator};
pub use wav::{encode_wav, read_wav_header, read_wav_header_prefix};
