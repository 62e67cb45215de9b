pub mod audio_engine;
pub mod exchange_delegate;
