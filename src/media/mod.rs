pub mod engine;
pub mod formats;
pub mod probe;
pub mod resolve;
pub mod validate;

pub use engine::{EngineFailure, FfmpegEngine, MediaEngine, ProbeFormat, ProbeReport};
pub use formats::{
    audio_files_in, batch_output_path, is_audio_file, normalize_path, same_location,
    scan_directory, ScannedFile, SUPPORTED_EXTENSIONS,
};
pub use probe::{probe_duration, ProbePolicy, ProbeResult};
pub use resolve::{BinaryResolver, Candidate, CandidateResolver};
pub use validate::validate_audio_file;
