//! Annotation color parsing and blending
//!
//! Colors are persisted as CSS strings picked in the UI. Hex forms
//! (`#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`) and `rgb()`/`rgba()` are accepted.

use image::Rgba;

/// Parse a stored color string into RGBA
pub fn parse_color(value: &str) -> Option<Rgba<u8>> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = value.to_ascii_lowercase();
    if let Some(args) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_functional(args);
    }
    None
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.is_ascii() {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|n| n * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
        4 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?])),
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

fn parse_functional(args: &str) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |s: &str| s.parse::<f32>().ok().map(|v| v.round().clamp(0.0, 255.0) as u8);
    let alpha = match parts.get(3) {
        Some(a) => {
            let a = a.parse::<f32>().ok()?;
            (a.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        None => 255,
    };
    Some(Rgba([
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ]))
}

/// Composite `src` over `dst` (source-over), the way a canvas fill does
pub fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = src.0[3] as f32 / 255.0;
    if sa >= 1.0 {
        *dst = src;
        return;
    }
    if sa <= 0.0 {
        return;
    }

    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for i in 0..3 {
        let sc = src.0[i] as f32;
        let dc = dst.0[i] as f32;
        let out = (sc * sa + dc * da * (1.0 - sa)) / out_a;
        dst.0[i] = out.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round() as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(parse_color("#ffff0066"), Some(Rgba([255, 255, 0, 0x66])));
        assert_eq!(parse_color("#000000"), Some(Rgba([0, 0, 0, 255])));
        assert_eq!(parse_color("#f00"), Some(Rgba([255, 0, 0, 255])));
        assert_eq!(parse_color("#f008"), Some(Rgba([255, 0, 0, 0x88])));
        assert_eq!(parse_color("  #FFEB3B "), Some(Rgba([255, 0xeb, 0x3b, 255])));
    }

    #[test]
    fn test_parse_functional_forms() {
        assert_eq!(parse_color("rgb(255, 0, 0)"), Some(Rgba([255, 0, 0, 255])));
        assert_eq!(
            parse_color("rgba(0, 128, 255, 0.5)"),
            Some(Rgba([0, 128, 255, 128]))
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_color(""), None);
        assert_eq!(parse_color("yellow"), None);
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("#gggggg"), None);
        assert_eq!(parse_color("#ééé"), None);
        assert_eq!(parse_color("rgb(1,2)"), None);
    }

    #[test]
    fn test_blend_translucent_over_white() {
        let mut pixel = Rgba([255, 255, 255, 255]);
        blend_pixel(&mut pixel, Rgba([255, 255, 0, 0x66]));
        assert_eq!(pixel.0[0], 255);
        assert_eq!(pixel.0[1], 255);
        assert_eq!(pixel.0[2], 153);
        assert_eq!(pixel.0[3], 255);
    }

    #[test]
    fn test_blend_opaque_replaces() {
        let mut pixel = Rgba([10, 20, 30, 255]);
        blend_pixel(&mut pixel, Rgba([0, 0, 0, 255]));
        assert_eq!(pixel, Rgba([0, 0, 0, 255]));
    }
}
