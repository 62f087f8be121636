//! Inline CSS values the renderer understands.

use eframe::egui::Color32;

pub fn parse_css_color(raw: &str) -> Option<Color32> {
    let value = raw.trim().to_ascii_lowercase();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(args) = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_args(args);
    }
    named_color(&value)
}

fn parse_hex(hex: &str) -> Option<Color32> {
    let digit = |index: usize| u8::from_str_radix(hex.get(index..=index)?, 16).ok();
    let pair = |index: usize| u8::from_str_radix(hex.get(index..index + 2)?, 16).ok();
    match hex.len() {
        3 => Some(Color32::from_rgb(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17)),
        4 => Some(Color32::from_rgba_unmultiplied(
            digit(0)? * 17,
            digit(1)? * 17,
            digit(2)? * 17,
            digit(3)? * 17,
        )),
        6 => Some(Color32::from_rgb(pair(0)?, pair(2)?, pair(4)?)),
        8 => Some(Color32::from_rgba_unmultiplied(
            pair(0)?,
            pair(2)?,
            pair(4)?,
            pair(6)?,
        )),
        _ => None,
    }
}

fn parse_rgb_args(args: &str) -> Option<Color32> {
    let parts: Vec<&str> = args
        .split(|ch: char| ch == ',' || ch == '/' || ch.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect();
    let channel = |part: &str| -> Option<u8> {
        if let Some(percent) = part.strip_suffix('%') {
            let value: f32 = percent.parse().ok()?;
            Some((value.clamp(0.0, 100.0) * 2.55).round() as u8)
        } else {
            let value: f32 = part.parse().ok()?;
            Some(value.clamp(0.0, 255.0).round() as u8)
        }
    };
    let alpha = |part: &str| -> Option<u8> {
        let value: f32 = match part.strip_suffix('%') {
            Some(percent) => percent.parse::<f32>().ok()? / 100.0,
            None => part.parse().ok()?,
        };
        Some((value.clamp(0.0, 1.0) * 255.0).round() as u8)
    };
    match parts.as_slice() {
        [r, g, b] => Some(Color32::from_rgb(channel(r)?, channel(g)?, channel(b)?)),
        [r, g, b, a] => Some(Color32::from_rgba_unmultiplied(
            channel(r)?,
            channel(g)?,
            channel(b)?,
            alpha(a)?,
        )),
        _ => None,
    }
}

fn named_color(name: &str) -> Option<Color32> {
    let rgb = match name {
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "lime" => (0, 255, 0),
        "blue" => (0, 0, 255),
        "yellow" => (255, 255, 0),
        "orange" => (255, 165, 0),
        "purple" => (128, 0, 128),
        "pink" => (255, 192, 203),
        "gray" | "grey" => (128, 128, 128),
        "lightgray" | "lightgrey" => (211, 211, 211),
        "darkgray" | "darkgrey" => (169, 169, 169),
        "silver" => (192, 192, 192),
        "navy" => (0, 0, 128),
        "teal" => (0, 128, 128),
        "cyan" | "aqua" => (0, 255, 255),
        "magenta" | "fuchsia" => (255, 0, 255),
        "maroon" => (128, 0, 0),
        "olive" => (128, 128, 0),
        "gold" => (255, 215, 0),
        "crimson" => (220, 20, 60),
        "tomato" => (255, 99, 71),
        "skyblue" => (135, 206, 235),
        "transparent" => return Some(Color32::TRANSPARENT),
        _ => return None,
    };
    Some(Color32::from_rgb(rgb.0, rgb.1, rgb.2))
}

/// First length in a CSS value, in px. `em`/`rem` assume a 16px root.
pub fn parse_length(raw: &str) -> Option<f32> {
    let first = raw.split_whitespace().next()?;
    let (number, scale) = if let Some(number) = first.strip_suffix("px") {
        (number, 1.0)
    } else if let Some(number) = first.strip_suffix("rem") {
        (number, 16.0)
    } else if let Some(number) = first.strip_suffix("em") {
        (number, 16.0)
    } else {
        (first, 1.0)
    };
    number.parse::<f32>().ok().map(|value| value * scale)
}

/// `padding` shorthand as (vertical, horizontal).
pub fn parse_padding(raw: &str) -> Option<(f32, f32)> {
    let lengths: Vec<f32> = raw.split_whitespace().filter_map(parse_length).collect();
    match lengths.as_slice() {
        [all] => Some((*all, *all)),
        [vertical, horizontal, ..] => Some((*vertical, *horizontal)),
        _ => None,
    }
}

pub fn is_bold(weight: &str) -> bool {
    match weight.trim() {
        "bold" | "bolder" => true,
        other => other.parse::<u16>().is_ok_and(|value| value >= 600),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_in_all_lengths() {
        assert_eq!(parse_css_color("#fff"), Some(Color32::WHITE));
        assert_eq!(
            parse_css_color("#38BDF8"),
            Some(Color32::from_rgb(0x38, 0xBD, 0xF8))
        );
        assert_eq!(
            parse_css_color("#00000080"),
            Some(Color32::from_rgba_unmultiplied(0, 0, 0, 0x80))
        );
        assert_eq!(parse_css_color("#12345"), None);
    }

    #[test]
    fn rgb_functions_and_names() {
        assert_eq!(
            parse_css_color("rgb(10, 20, 30)"),
            Some(Color32::from_rgb(10, 20, 30))
        );
        assert_eq!(
            parse_css_color("rgba(255, 0, 0, 0.5)"),
            Some(Color32::from_rgba_unmultiplied(255, 0, 0, 128))
        );
        assert_eq!(parse_css_color(" Tomato "), Some(Color32::from_rgb(255, 99, 71)));
        assert_eq!(parse_css_color("var(--accent)"), None);
    }

    #[test]
    fn lengths_and_padding() {
        assert_eq!(parse_length("14px"), Some(14.0));
        assert_eq!(parse_length("1.5rem"), Some(24.0));
        assert_eq!(parse_length("auto"), None);
        assert_eq!(parse_padding("8px 12px"), Some((8.0, 12.0)));
        assert_eq!(parse_padding("16px"), Some((16.0, 16.0)));
        assert_eq!(parse_padding("0 4px"), Some((0.0, 4.0)));
    }

    #[test]
    fn font_weights() {
        assert!(is_bold("bold"));
        assert!(is_bold("700"));
        assert!(!is_bold("normal"));
        assert!(!is_bold("400"));
    }
}
