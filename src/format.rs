// src/format.rs
//! pt-BR number rendering for report text: `.` groups thousands, `,` marks
//! decimals.

/// `1234567` → `"1.234.567"`.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

/// Two-decimal rate with a comma: `2.5` → `"2,50"`.
pub fn rate(x: f64) -> String {
    let rounded = (x * 100.0).round() / 100.0;
    let x = if rounded == 0.0 { 0.0 } else { x };
    format!("{x:.2}").replace('.', ",")
}

/// Signed percentage for variation lines: `12.3` → `"+12,30%"`.
pub fn signed_percent(x: f64) -> String {
    let sign = if x > 0.0 { "+" } else { "" };
    format!("{sign}{}%", rate(x))
}
