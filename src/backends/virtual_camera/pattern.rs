// SPDX-License-Identifier: MPL-2.0

//! Animated test pattern for the synthetic camera

/// SMPTE-style color bars (RGB)
const BARS: [(u8, u8, u8); 7] = [
    (192, 192, 192),
    (192, 192, 0),
    (0, 192, 192),
    (0, 192, 0),
    (192, 0, 192),
    (192, 0, 0),
    (0, 0, 192),
];

/// Render one RGBA frame
///
/// Bars scroll horizontally with `tick` and a white square bounces across
/// the lower third so motion is visible in preview and recordings.
pub fn render_frame(width: u32, height: u32, tick: u64) -> Vec<u8> {
    let mut data = vec![0u8; (width * height * 4) as usize];
    if width == 0 || height == 0 {
        return data;
    }

    let bar_width = (width / BARS.len() as u32).max(1);
    let shift = (tick as u32 * 4) % width;
    let bars_height = height * 2 / 3;

    let box_size = (height / 8).max(2);
    let travel = width.saturating_sub(box_size).max(1);
    let phase = (tick as u32 * 6) % (travel * 2);
    let box_x = if phase < travel { phase } else { travel * 2 - phase };
    let box_y = bars_height + (height - bars_height).saturating_sub(box_size) / 2;

    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 4) as usize;
            let (r, g, b) = if y < bars_height {
                let bar = (((x + shift) % width) / bar_width) as usize;
                BARS[bar.min(BARS.len() - 1)]
            } else if (box_x..box_x + box_size).contains(&x) && (box_y..box_y + box_size).contains(&y)
            {
                (255, 255, 255)
            } else {
                // Luma ramp
                let v = (x * 255 / width) as u8;
                (v / 4, v / 4, v / 4)
            };
            data[idx] = r;
            data[idx + 1] = g;
            data[idx + 2] = b;
            data[idx + 3] = 255;
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_and_alpha() {
        let frame = render_frame(32, 24, 0);
        assert_eq!(frame.len(), 32 * 24 * 4);
        assert!(frame.chunks(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_pattern_moves() {
        assert_ne!(render_frame(64, 48, 0), render_frame(64, 48, 5));
    }
}
