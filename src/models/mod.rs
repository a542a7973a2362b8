// Data models for frames, face tracking, emotion signals, quality control, and events

pub mod emotion;
pub mod events;
pub mod frame;
pub mod quality;
pub mod tracking;
