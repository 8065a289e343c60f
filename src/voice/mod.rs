// Voice bridge: hosted speech-to-text and text-to-speech

pub mod speech;
pub mod transcription;


pub use speech::{
    AudioArtifact, GoogleTtsSynthesizer, MAX_PIECE_CHARS, SpeechSynthesizer, split_for_speech,
};
pub use transcription::{AssemblyAiTranscriber, Transcriber};
