//! LC2 code → phone number derivation.
//!
//! Operators encode a lead's phone number into the LC2 code under one of two
//! schemes: `IV` followed by the number in base 36, or ten letters from the
//! `M..V` alphabet standing for the digits `0..9` (optionally behind a `CG`
//! prefix). Anything else carries no phone number.

/// Letter alphabet of the positional scheme. Index = digit.
const LETTER_DIGITS: [char; 10] = ['M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V'];

const LETTER_CODE_LEN: usize = 10;

/// Where a derived phone number came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Base36,
    Letters,
}

/// Derive a phone number from an LC2 code. `None` when no scheme applies.
pub fn derive_phone(code: &str) -> Option<String> {
    derive_phone_with_scheme(code).map(|(phone, _)| phone)
}

/// Same as [`derive_phone`], also reporting which scheme decoded it.
pub fn derive_phone_with_scheme(code: &str) -> Option<(String, Scheme)> {
    let upper = code.trim().to_uppercase();
    if upper.is_empty() {
        return None;
    }

    if let Some(rest) = upper.strip_prefix("IV") {
        if !rest.is_empty() {
            if let Some(n) = base36_to_decimal(rest) {
                return Some((n, Scheme::Base36));
            }
        }
    }

    let without_cg = upper.strip_prefix("CG").unwrap_or(&upper);
    if let Some(digits) = translate_letters(without_cg) {
        return Some((digits, Scheme::Letters));
    }
    translate_letters(&upper).map(|digits| (digits, Scheme::Letters))
}

/// Join key used when no phone can be derived: upper-cased, `CG` removed.
pub fn fallback_key(code: &str) -> String {
    let upper = code.trim().to_uppercase();
    upper.strip_prefix("CG").unwrap_or(&upper).trim().to_string()
}

/// Decimal limbs are kept little-endian in this base.
const LIMB: u64 = 1_000_000_000;

/// A base-36 integer literal rendered in decimal, at any length. Accepts
/// surrounding whitespace, a leading sign and single underscores between
/// digits; anything else is `None`.
fn base36_to_decimal(s: &str) -> Option<String> {
    let s = s.trim();
    let (negative, body) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if body.is_empty() || body.starts_with('_') || body.ends_with('_') || body.contains("__") {
        return None;
    }

    let mut limbs: Vec<u32> = vec![0];
    for c in body.chars().filter(|&c| c != '_') {
        let mut carry = u64::from(c.to_digit(36)?);
        for limb in limbs.iter_mut() {
            let v = u64::from(*limb) * 36 + carry;
            *limb = (v % LIMB) as u32;
            carry = v / LIMB;
        }
        if carry > 0 {
            limbs.push(carry as u32);
        }
    }

    let mut out = String::new();
    let is_zero = limbs.len() == 1 && limbs[0] == 0;
    if negative && !is_zero {
        out.push('-');
    }
    let mut high_first = limbs.iter().rev();
    if let Some(top) = high_first.next() {
        out.push_str(&top.to_string());
    }
    for limb in high_first {
        out.push_str(&format!("{limb:09}"));
    }
    Some(out)
}

fn translate_letters(s: &str) -> Option<String> {
    if s.chars().count() != LETTER_CODE_LEN {
        return None;
    }
    s.chars()
        .map(|c| {
            LETTER_DIGITS
                .iter()
                .position(|&l| l == c)
                .and_then(|d| char::from_digit(d as u32, 10))
        })
        .collect()
}
