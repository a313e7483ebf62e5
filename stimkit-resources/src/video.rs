use image::RgbaImage;

#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: RgbaImage,
    pub start_ms: f64,
    pub duration_ms: f64,
}

/// A decoded clip: full-canvas frames with their presentation times.
#[derive(Debug, Clone)]
pub struct VideoClip {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<VideoFrame>,
}

impl VideoClip {
    pub fn duration_ms(&self) -> f64 {
        self.frames
            .last()
            .map(|f| f.start_ms + f.duration_ms)
            .unwrap_or(0.0)
    }

    /// Frame shown `playback_ms` after playback started. Past the end a
    /// looping clip wraps and a non-looping one holds its last frame.
    pub fn frame_index_at(&self, playback_ms: f64, looping: bool) -> usize {
        let total = self.duration_ms();
        if self.frames.is_empty() || total <= 0.0 {
            return 0;
        }
        let t = if looping {
            playback_ms.max(0.0) % total
        } else if playback_ms >= total {
            return self.frames.len() - 1;
        } else {
            playback_ms.max(0.0)
        };
        self.frames
            .partition_point(|f| f.start_ms + f.duration_ms <= t)
            .min(self.frames.len() - 1)
    }

    pub fn frame_at(&self, playback_ms: f64, looping: bool) -> Option<&VideoFrame> {
        self.frames.get(self.frame_index_at(playback_ms, looping))
    }

    /// True once a non-looping clip has played through.
    pub fn has_ended(&self, playback_ms: f64, looping: bool) -> bool {
        !looping && playback_ms >= self.duration_ms()
    }
}
