use serde::{Deserialize, Serialize};

/// A single RGB value as the LED strip understands it. There is no alpha
/// channel; brightness is carried separately by pattern steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Named colours offered as one-tap choices.
pub const PRESETS: [(&str, Color); 7] = [
    ("red", Color::new(255, 0, 0)),
    ("green", Color::new(0, 255, 0)),
    ("blue", Color::new(0, 0, 255)),
    ("yellow", Color::new(255, 255, 0)),
    ("cyan", Color::new(0, 255, 255)),
    ("magenta", Color::new(255, 0, 255)),
    ("white", Color::new(255, 255, 255)),
];

impl Color {
    /// All channels dark. Sent to the device to switch it off.
    pub const OFF: Color = Color::new(0, 0, 0);

    /// The colour the remote starts with (a soft red).
    pub const DEFAULT: Color = Color::new(239, 68, 68);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a colour from wider integers, pinning each channel into 0..=255.
    pub fn clamped(r: i64, g: i64, b: i64) -> Self {
        let clamp = |v: i64| v.clamp(0, u8::MAX as i64) as u8;
        Self::new(clamp(r), clamp(g), clamp(b))
    }

    /// Look up one of the [`PRESETS`] by name, ignoring case.
    pub fn preset(name: &str) -> Option<Self> {
        PRESETS
            .iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
            .map(|(_, color)| *color)
    }

    /// Convert hue/saturation/lightness (each in `0.0..=1.0`) to RGB.
    pub fn from_hsl(h: f64, s: f64, l: f64) -> Self {
        if s == 0.0 {
            let v = unit_to_channel(l);
            return Self::new(v, v, v);
        }

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;

        Self::new(
            unit_to_channel(hue_to_channel(p, q, h + 1.0 / 3.0)),
            unit_to_channel(hue_to_channel(p, q, h)),
            unit_to_channel(hue_to_channel(p, q, h - 1.0 / 3.0)),
        )
    }

    /// The colour as it looks at the given brightness percentage.
    pub fn dimmed(self, brightness: u8) -> Self {
        let brightness = brightness.min(100) as u16;
        let scale = |v: u8| ((v as u16 * brightness + 50) / 100) as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

fn hue_to_channel(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }

    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

// Rounds half up. Float to int casts saturate, so slightly out of range input
// still lands on 0 or 255.
fn unit_to_channel(v: f64) -> u8 {
    (v * 255.0 + 0.5) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsl_primaries() {
        assert_eq!(Color::from_hsl(0.0, 1.0, 0.5), Color::new(255, 0, 0));
        assert_eq!(Color::from_hsl(1.0 / 3.0, 1.0, 0.5), Color::new(0, 255, 0));
        assert_eq!(Color::from_hsl(2.0 / 3.0, 1.0, 0.5), Color::new(0, 0, 255));
    }

    #[test]
    fn test_hsl_greys() {
        assert_eq!(Color::from_hsl(0.3, 0.0, 0.0), Color::OFF);
        assert_eq!(Color::from_hsl(0.3, 0.0, 1.0), Color::new(255, 255, 255));
        assert_eq!(Color::from_hsl(0.0, 0.0, 0.5), Color::new(128, 128, 128));
    }

    #[test]
    fn test_hsl_secondaries() {
        assert_eq!(Color::from_hsl(1.0 / 6.0, 1.0, 0.5), Color::new(255, 255, 0));
        assert_eq!(Color::from_hsl(0.5, 1.0, 0.5), Color::new(0, 255, 255));
    }

    #[test]
    fn test_clamped() {
        assert_eq!(Color::clamped(-20, 300, 128), Color::new(0, 255, 128));
    }

    #[test]
    fn test_presets() {
        assert_eq!(Color::preset("Red"), Some(Color::new(255, 0, 0)));
        assert_eq!(Color::preset("white"), Some(Color::new(255, 255, 255)));
        assert_eq!(Color::preset("mauve"), None);
    }

    #[test]
    fn test_dimmed() {
        let color = Color::new(200, 100, 0);
        assert_eq!(color.dimmed(100), color);
        assert_eq!(color.dimmed(50), Color::new(100, 50, 0));
        assert_eq!(color.dimmed(0), Color::OFF);
    }
}
