// crates/core/src/stage.rs
//! Pipeline stage markers parsed from generator stdout.
//!
//! The generator reports progress as free-text lines; each pipeline stage is
//! recognized by a fixed marker substring. Matching a chunk yields the
//! highest stage whose marker appears in it. Applying the match is the
//! tracker's job, and the tracker only ever moves the stage forward.

/// Stage index reached when a job completes successfully.
pub const FINAL_STAGE: u8 = 5;

/// Marker substring and progress message per stage, in pipeline order.
/// Index 0 is stage 1.
const STAGES: [(&str, &str); 5] = [
    ("Generating script", "Generating script"),
    ("Generating narration", "Generating narration audio"),
    ("Rendering slides", "Rendering slides"),
    ("Encoding video", "Encoding video"),
    ("Video generation complete", "Video generation complete"),
];

/// Scan a stdout chunk for stage markers.
///
/// Returns the highest matching stage (1-5), or `None` when no marker
/// appears. Two markers landing in the same chunk therefore resolve to the
/// later stage instead of replaying the earlier one.
pub fn match_marker(chunk: &str) -> Option<u8> {
    STAGES
        .iter()
        .enumerate()
        .rev()
        .find(|(_, (marker, _))| chunk.contains(marker))
        .map(|(i, _)| (i + 1) as u8)
}

/// Human-readable message for a stage index. Stage 0 is the queued state.
pub fn stage_message(stage: u8) -> &'static str {
    match stage {
        0 => "Queued",
        n if (n as usize) <= STAGES.len() => STAGES[n as usize - 1].1,
        _ => "Unknown stage",
    }
}
