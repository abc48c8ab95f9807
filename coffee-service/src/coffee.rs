/// Price returned for a coffee that is not on the menu.
pub const NOT_FOUND: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coffee {
    pub name: String,
    // minor currency units
    pub price: i64,
}

impl Coffee {
    pub fn new(name: &str, price: i64) -> Self {
        Self {
            name: name.to_string(),
            price,
        }
    }

    pub fn default_menu() -> Vec<Coffee> {
        vec![
            Coffee::new("latte", 1100),
            Coffee::new("mocha", 1300),
            Coffee::new("americano", 900),
        ]
    }
}

/// Ten percent off, rounded down. A missing price stays missing.
pub fn discount(price: i64) -> i64 {
    if price == NOT_FOUND {
        return NOT_FOUND;
    }
    // never larger than `price` in magnitude, so it always fits back
    (i128::from(price) * 9 / 10) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_rounds_down() {
        assert_eq!(discount(1100), 990);
        assert_eq!(discount(1300), 1170);
        assert_eq!(discount(905), 814);
        assert_eq!(discount(0), 0);
    }

    #[test]
    fn test_discount_of_extreme_prices_does_not_overflow() {
        assert_eq!(discount(i64::MAX), 8_301_034_833_169_298_226);
        assert_eq!(discount(i64::MIN), -8_301_034_833_169_298_227);
    }

    #[test]
    fn test_discount_keeps_not_found() {
        assert_eq!(discount(NOT_FOUND), NOT_FOUND);
    }

    #[test]
    fn test_default_menu() {
        let menu = Coffee::default_menu();
        assert_eq!(menu.len(), 3);
        assert!(menu.contains(&Coffee::new("americano", 900)));
    }
}
