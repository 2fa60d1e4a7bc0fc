/// Flat binary tensor dumps (raw and count-prefixed).
pub mod dump;
