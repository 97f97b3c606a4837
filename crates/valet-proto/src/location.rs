//! App-facing location codes.
//!
//! `starting_point` for sector 0, otherwise three letters:
//! sector (`1`→`a`), side (`L`, `R`, or `M` for the rotate-in-place
//! midpoint) and subzone (`0`→`M`, `1`→`a`).

pub const STARTING_POINT: &str = "starting_point";

pub fn location_code(sector: u32, side: &str, subzone: u32) -> String {
    if sector == 0 {
        return STARTING_POINT.to_string();
    }
    let side = match side {
        "left" => 'L',
        "right" => 'R',
        _ => 'M',
    };
    let subzone = if subzone == 0 { 'M' } else { letter(subzone) };
    format!("{}{}{}", letter(sector), side, subzone)
}

// `?` outside 1..=26.
fn letter(n: u32) -> char {
    u8::try_from(n)
        .ok()
        .filter(|n| (1..=26).contains(n))
        .map(|n| (b'a' + n - 1) as char)
        .unwrap_or('?')
}
