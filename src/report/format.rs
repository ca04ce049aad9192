//! Human-readable number formatting and HTML escaping helpers.

/// Format a byte count in decimal units with one decimal place, e.g.
/// `2.0 kB`, `4.1 MB`. Values below 1 kB render as plain bytes.
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: &[&str] = &["kB", "MB", "GB", "TB", "PB"];

    if bytes < 0 {
        return format!("-{}", format_bytes(-bytes));
    }
    if bytes == 1 {
        return "1 Byte".to_string();
    }
    if bytes < 1000 {
        return format!("{bytes} Bytes");
    }

    let mut value = bytes as f64;
    let mut unit = "";
    for candidate in UNITS {
        value /= 1000.0;
        unit = candidate;
        if value < 1000.0 {
            break;
        }
    }
    format!("{value:.1} {unit}")
}

/// Insert thousands separators: `1234567` -> `1,234,567`.
pub fn intcomma(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Escape a string for interpolation into HTML text or attribute values.
/// Object keys and referrers are user-controlled, so everything that lands
/// in markup goes through here.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Turn a snake_case metric field name into a title-case label.
pub fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_below_one_kb_are_plain() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(1), "1 Byte");
        assert_eq!(format_bytes(999), "999 Bytes");
    }

    #[test]
    fn bytes_use_decimal_units() {
        assert_eq!(format_bytes(2048), "2.0 kB");
        assert_eq!(format_bytes(4096), "4.1 kB");
        assert_eq!(format_bytes(1_500_000), "1.5 MB");
        assert_eq!(format_bytes(3_000_000_000), "3.0 GB");
    }

    #[test]
    fn intcomma_groups_thousands() {
        assert_eq!(intcomma(0), "0");
        assert_eq!(intcomma(999), "999");
        assert_eq!(intcomma(1000), "1,000");
        assert_eq!(intcomma(1234567), "1,234,567");
    }

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("a&b\"c"), "a&amp;b&quot;c");
    }

    #[test]
    fn title_case_from_snake_case() {
        assert_eq!(
            title_case("total_files_downloads_count"),
            "Total Files Downloads Count"
        );
    }
}
