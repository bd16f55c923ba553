//! Airport registry and mention extraction.
//!
//! Known airports are matched by a stem pattern derived from their display
//! name, so inflected forms («во Внукове», «из Пулкова») still resolve.
//! Posts may also introduce airports inline as `Name (ICAO)`; those are
//! learned for the rest of the run, after which bare-name mentions resolve.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use skywatch_shared::{ExtractConfig, Icao, Result, SkywatchError};

/// Built-in registry: display name → ICAO code.
const BUILTIN_AIRPORTS: &[(&str, &str)] = &[
    ("Внуково", "UUWW"),
    ("Домодедово", "UUDD"),
    ("Шереметьево", "UUEE"),
    ("Жуковский", "UUBW"),
    ("Пулково", "ULLI"),
    ("Казань", "UWKD"),
    ("Нижний Новгород", "UWGG"),
    ("Тамбов", "UUOT"),
    ("Ижевск", "USII"),
    ("Нижнекамск", "UWKE"),
    ("Саратов", "UWSG"),
    ("Владимир", "UUBY"),
    ("Ярославль", "UUDL"),
];

/// Inline `Name (ICAO)` mention. The code is four uppercase Latin letters;
/// arbitrary text may precede it inside the parentheses.
static CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<name>[А-Яа-яЁёA-Za-z\s\-–—]+?)\s*\([^)]*?(?P<icao>[A-Z]{4})\)").unwrap()
});

/// Registry of known airports with per-name match patterns.
pub struct AirportRegistry {
    names: BTreeMap<Icao, String>,
    patterns: BTreeMap<Icao, Regex>,
}

impl Default for AirportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AirportRegistry {
    /// Registry with only the built-in airports.
    pub fn new() -> Self {
        let mut registry = Self {
            names: BTreeMap::new(),
            patterns: BTreeMap::new(),
        };
        for (name, code) in BUILTIN_AIRPORTS {
            let icao: Icao = code.parse().unwrap();
            registry.names.insert(icao.clone(), (*name).to_string());
            registry.patterns.insert(icao, name_pattern(name).unwrap());
        }
        registry
    }

    /// Registry extended with user-configured airports.
    pub fn with_extra(config: &ExtractConfig) -> Result<Self> {
        let mut registry = Self::new();
        for (name, code) in &config.airports {
            let icao: Icao = code.parse()?;
            registry.learn(icao, name.clone())?;
        }
        Ok(registry)
    }

    /// Number of known airports.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Register an airport unless its code is already known.
    /// The first learned name for a code is kept.
    pub fn learn(&mut self, icao: Icao, name: String) -> Result<()> {
        if self.names.contains_key(&icao) {
            return Ok(());
        }
        let pattern = name_pattern(&name)?;
        debug!(%icao, name, "learned airport");
        self.names.insert(icao.clone(), name);
        self.patterns.insert(icao, pattern);
        Ok(())
    }

    /// Extract all airports mentioned in `text`, each at most once.
    ///
    /// Inline `Name (ICAO)` mentions are resolved first and learned; known
    /// names then match by stem pattern, overriding the inline display name
    /// with the registered one.
    pub fn extract(&mut self, text: &str) -> Vec<(Icao, String)> {
        let mut found: BTreeMap<Icao, String> = BTreeMap::new();

        for caps in CODE_RE.captures_iter(text) {
            let Ok(icao) = caps["icao"].parse::<Icao>() else {
                continue;
            };
            let name = clean_display_name(&caps["name"]);
            if name.is_empty() {
                continue;
            }
            found.insert(icao.clone(), name.clone());
            if let Err(e) = self.learn(icao, name) {
                warn!(error = %e, "could not learn airport from inline mention");
            }
        }

        for (icao, pattern) in &self.patterns {
            if pattern.is_match(text) {
                found.insert(icao.clone(), self.names[icao].clone());
            }
        }

        found.into_iter().collect()
    }
}

/// Build the stem pattern for a display name.
///
/// The final Cyrillic vowel is dropped so case endings match («Внуково» →
/// «Внуков» → matches «Внукове»); very short stems keep the full name.
fn name_pattern(name: &str) -> Result<Regex> {
    let stem = name_stem(name);
    Regex::new(&format!(r"(?i)\b{}\w*", regex::escape(stem)))
        .map_err(|e| SkywatchError::extract(format!("bad name pattern for '{name}': {e}")))
}

/// Strip one trailing Cyrillic vowel, keeping the name if the stem gets short.
fn name_stem(name: &str) -> &str {
    let is_final_vowel = |c: char| "АОУЫЭЕЁИЮЯаоуыэеёиюя".contains(c);
    let stem = name.strip_suffix(is_final_vowel).unwrap_or(name);
    if stem.chars().count() < 4 { name } else { stem }
}

/// Trim an inline name capture, dropping leading non-capitalized words and
/// the generic «аэропорт» («аэропорт Калуга» → «Калуга»).
fn clean_display_name(raw: &str) -> String {
    let words: Vec<&str> = raw
        .split_whitespace()
        .skip_while(|w| {
            w.to_lowercase() == "аэропорт" || w.chars().next().is_some_and(char::is_lowercase)
        })
        .collect();
    if words.is_empty() {
        raw.trim().to_string()
    } else {
        words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn icao(code: &str) -> Icao {
        code.parse().unwrap()
    }

    #[test]
    fn builtin_names_resolve() {
        let mut registry = AirportRegistry::new();
        let found = registry.extract("Ограничения сняты в аэропортах Внуково и Пулково.");
        let codes: Vec<&str> = found.iter().map(|(i, _)| i.as_str()).collect();
        assert_eq!(codes, vec!["ULLI", "UUWW"]);
    }

    #[test]
    fn inflected_and_uppercase_forms_match() {
        let mut registry = AirportRegistry::new();
        assert_eq!(
            registry.extract("Во Внукове задержаны рейсы, ограничения сняты."),
            vec![(icao("UUWW"), "Внуково".to_string())]
        );
        assert_eq!(
            registry.extract("ПУЛКОВО возобновил приём."),
            vec![(icao("ULLI"), "Пулково".to_string())]
        );
    }

    #[test]
    fn multiword_name_resolves() {
        let mut registry = AirportRegistry::new();
        let found = registry.extract("Аэропорт Нижний Новгород временно закрыт.");
        assert_eq!(found, vec![(icao("UWGG"), "Нижний Новгород".to_string())]);
    }

    #[test]
    fn each_airport_reported_once() {
        let mut registry = AirportRegistry::new();
        let found = registry.extract("Внуково (UUWW): во Внуково ограничения сняты.");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, icao("UUWW"));
    }

    #[test]
    fn inline_code_learns_new_airport() {
        let mut registry = AirportRegistry::new();
        let before = registry.len();

        let found = registry.extract("Аэропорт Калуга (UUBC) приостановил работу.");
        assert_eq!(found, vec![(icao("UUBC"), "Калуга".to_string())]);
        assert_eq!(registry.len(), before + 1);

        // A later bare-name mention now resolves.
        let found = registry.extract("Калуга возобновила приём.");
        assert_eq!(found, vec![(icao("UUBC"), "Калуга".to_string())]);
    }

    #[test]
    fn inline_mention_of_known_airport_keeps_registered_name() {
        let mut registry = AirportRegistry::new();
        let found = registry.extract("Шереметьево-Центральный (UUEE) закрыт.");
        assert_eq!(found, vec![(icao("UUEE"), "Шереметьево".to_string())]);
    }

    #[test]
    fn code_in_parens_with_leading_junk() {
        let mut registry = AirportRegistry::new();
        let found = registry.extract("Калуга (код ИКАО: UUBC) не принимает рейсы.");
        assert_eq!(found, vec![(icao("UUBC"), "Калуга".to_string())]);
    }

    #[test]
    fn no_mentions_yields_nothing() {
        let mut registry = AirportRegistry::new();
        assert!(registry.extract("Погода в Москве ясная.").is_empty());
        assert!(registry.extract("").is_empty());
    }

    #[test]
    fn config_airports_are_registered() {
        let mut airports = BTreeMap::new();
        airports.insert("Калуга".to_string(), "UUBC".to_string());
        let config = ExtractConfig {
            airports,
            ..Default::default()
        };

        let mut registry = AirportRegistry::with_extra(&config).expect("registry");
        let found = registry.extract("Калуга закрыта, ограничения сняты позже.");
        assert_eq!(found, vec![(icao("UUBC"), "Калуга".to_string())]);
    }

    #[test]
    fn config_rejects_bad_icao() {
        let mut airports = BTreeMap::new();
        airports.insert("Калуга".to_string(), "нет".to_string());
        let config = ExtractConfig {
            airports,
            ..Default::default()
        };
        assert!(AirportRegistry::with_extra(&config).is_err());
    }

    #[test]
    fn name_stem_drops_final_vowel() {
        assert_eq!(name_stem("Внуково"), "Внуков");
        assert_eq!(name_stem("Казань"), "Казань");
        // Short names keep the full form.
        assert_eq!(name_stem("Уфа"), "Уфа");
    }

    #[test]
    fn clean_display_name_drops_leading_lowercase_words() {
        assert_eq!(clean_display_name("аэропорт Калуга"), "Калуга");
        assert_eq!(clean_display_name(" Нижний Новгород "), "Нижний Новгород");
        assert_eq!(clean_display_name("калуга"), "калуга");
    }
}
