//! FFmpeg video filter definitions.

/// Fit the source inside `width`x`height` keeping its aspect ratio, then
/// pad to the exact frame with centered bars.
pub fn scale_pad_filter(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
        w = width,
        h = height
    )
}
