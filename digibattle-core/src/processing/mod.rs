pub mod capture_decoder;
pub mod partition_tracker;
pub mod wav_format;
pub mod waveform;
