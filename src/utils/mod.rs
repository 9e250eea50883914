pub fn format_decimal(value: f64) -> String {
    format!("{:.2}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_decimal_keeps_two_places() {
        assert_eq!(format_decimal(1234.5), "1234.50");
        assert_eq!(format_decimal(500.0), "500.00");
        assert_eq!(format_decimal(99999.99), "99999.99");
    }
}
