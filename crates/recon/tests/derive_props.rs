// Property-based tests for LC2 code derivation.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use cardops_recon::derive::{derive_phone, derive_phone_with_scheme, fallback_key, Scheme};

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

const LETTERS: &str = "MNOPQRSTUV";

fn encode(digits: &str) -> String {
    digits
        .chars()
        .map(|d| LETTERS.as_bytes()[d.to_digit(10).unwrap() as usize] as char)
        .collect()
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn never_panics(code in "\\PC{0,24}") {
        let _ = derive_phone(&code);
        let _ = fallback_key(&code);
    }

    #[test]
    fn letter_codes_translate_digit_by_digit(digits in "[0-9]{10}", cg in any::<bool>()) {
        let code = if cg { format!("CG{}", encode(&digits)) } else { encode(&digits) };
        prop_assert_eq!(derive_phone_with_scheme(&code), Some((digits, Scheme::Letters)));
    }

    #[test]
    fn base36_matches_std_radix(n in 0u64..u64::MAX) {
        let encoded = radix36(n);
        prop_assert_eq!(derive_phone(&format!("IV{encoded}")), Some(n.to_string()));
    }

    #[test]
    fn long_base36_literals_decode(body in "[1-9A-Z][0-9A-Z]{25,60}", zeros in 0usize..4) {
        let padded = format!("IV{}{body}", "0".repeat(zeros));
        let phone = derive_phone(&padded).unwrap();
        prop_assert_eq!(derive_phone(&format!("IV{body}")), Some(phone.clone()));
        prop_assert!(phone.chars().all(|c| c.is_ascii_digit()));
        prop_assert!(!phone.starts_with('0'));

        // n base-36 digits lie in [36^(n-1), 36^n).
        let n = body.len() as f64;
        let low = ((n - 1.0) * 36f64.log10()).floor() as usize + 1;
        let high = (n * 36f64.log10()).ceil() as usize;
        prop_assert!((low..=high).contains(&phone.len()), "{} digits for {}", phone.len(), body);
    }

    #[test]
    fn base36_sign_negates(n in 1u64..u64::MAX) {
        let encoded = radix36(n);
        prop_assert_eq!(derive_phone(&format!("IV-{encoded}")), Some(format!("-{n}")));
    }

    #[test]
    fn output_is_all_digits(code in "[A-Z0-9]{0,14}") {
        if let Some(phone) = derive_phone(&code) {
            prop_assert!(!phone.is_empty());
            prop_assert!(phone.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn fallback_key_has_no_cg_prefix_or_padding(code in "(CG|cg)?[A-Z0-9 ]{0,12}") {
        let key = fallback_key(&code);
        prop_assert_eq!(key.trim(), key.as_str());
        prop_assert_eq!(key.to_uppercase(), key.clone());
    }
}

fn radix36(mut n: u64) -> String {
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(std::char::from_digit((n % 36) as u32, 36).unwrap().to_ascii_uppercase());
        n /= 36;
    }
    out.iter().rev().collect()
}
