//! Text contrast for custom link colours.
//!
//! Uses the HSP perceived-brightness model: a colour is dark when
//! `sqrt(0.299 r² + 0.587 g² + 0.114 b²) <= 127.5`.

/// Text colour that stays readable on a `background`.
pub fn text_color_for(background: &str) -> &'static str {
    if is_dark(background) {
        "#fff"
    } else {
        "#000"
    }
}

/// Returns true for dark colours. Unparseable input counts as light.
pub fn is_dark(color: &str) -> bool {
    match parse_rgb(color) {
        Some((r, g, b)) => {
            let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
            let hsp = (0.299 * r * r + 0.587 * g * g + 0.114 * b * b).sqrt();
            hsp <= 127.5
        }
        None => false,
    }
}

fn parse_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let color = color.trim();

    if let Some(hex) = color.strip_prefix('#') {
        if !hex.is_ascii() {
            return None;
        }
        return match hex.len() {
            3 => {
                let mut channels = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
                Some((channels.next()??, channels.next()??, channels.next()??))
            }
            6 => Some((
                u8::from_str_radix(&hex[0..2], 16).ok()?,
                u8::from_str_radix(&hex[2..4], 16).ok()?,
                u8::from_str_radix(&hex[4..6], 16).ok()?,
            )),
            _ => None,
        };
    }

    let inner = color
        .strip_prefix("rgba(")
        .or_else(|| color.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let mut channels = inner.split(',').map(|part| part.trim().parse::<u8>().ok());
    Some((channels.next()??, channels.next()??, channels.next()??))
}
