use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use num_format::{Locale, ToFormattedString};

static WARNED_MESSAGES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

/// Print a warning to stderr at most once per distinct message.
pub fn warn_once(message: impl Into<String>) {
    let message = message.into();
    let cache = WARNED_MESSAGES.get_or_init(|| Mutex::new(HashSet::new()));

    if let Ok(mut warned) = cache.lock()
        && warned.insert(message.clone())
    {
        eprintln!("{message}");
    }
}

/// Drop every non-ASCII character and trim surrounding whitespace. Display
/// names in exports are full of emoji and variation selectors; canonical
/// member names keep only the ASCII part.
pub fn strip_non_ascii(s: &str) -> String {
    s.chars().filter(char::is_ascii).collect::<String>().trim().to_string()
}

#[derive(Clone)]
pub struct NumberFormatOptions {
    pub use_comma: bool,
    pub use_human: bool,
    pub locale: String,
    pub decimal_places: usize,
}

impl Default for NumberFormatOptions {
    fn default() -> Self {
        Self {
            use_comma: false,
            use_human: false,
            locale: "en".to_string(),
            decimal_places: 2,
        }
    }
}

/// Format a count for display per the configured options.
pub fn format_number(n: u64, options: &NumberFormatOptions) -> String {
    if options.use_human {
        let prec = options.decimal_places;
        return match n {
            1_000_000_000.. => format!("{:.prec$}b", n as f64 / 1_000_000_000.0),
            1_000_000.. => format!("{:.prec$}m", n as f64 / 1_000_000.0),
            1_000.. => format!("{:.prec$}k", n as f64 / 1_000.0),
            _ => n.to_string(),
        };
    }

    if options.use_comma {
        let locale = match options.locale.as_str() {
            "de" => Locale::de,
            "fr" => Locale::fr,
            "es" => Locale::es,
            "it" => Locale::it,
            "ja" => Locale::ja,
            _ => Locale::en,
        };
        return n.to_formatted_string(&locale);
    }

    n.to_string()
}
