//! Keyword-list rules and the built-in categories.

use super::traits::EthicsRule;

/// Case-insensitive substring rule over a fixed keyword list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    category: String,
    keywords: Vec<String>,
    warning: String,
}

impl KeywordRule {
    /// Keywords are lower-cased here; empty ones are dropped so they never match everything.
    /// The warning is prefixed with the `[ETHICS]` marker and a blank line.
    pub fn new<I, S>(category: impl Into<String>, keywords: I, warning: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            category: category.into(),
            keywords,
            warning: format!("\n\n[ETHICS] {}", warning.trim()),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl EthicsRule for KeywordRule {
    fn category(&self) -> &str {
        &self.category
    }

    fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    fn warning(&self) -> &str {
        &self.warning
    }
}

pub const CRYPTO: &str = "crypto";
pub const GAMBLING: &str = "gambling";
pub const DEBT: &str = "debt";
pub const MENTAL_HEALTH: &str = "mental_health";
pub const PRIVACY: &str = "privacy";
pub const DISCRIMINATION: &str = "discrimination";

/// Built-in category names in application order.
pub const BUILTIN_CATEGORIES: [&str; 6] =
    [CRYPTO, GAMBLING, DEBT, MENTAL_HEALTH, PRIVACY, DISCRIMINATION];

const CRYPTO_WORDS: &[&str] = &["crypto", "cryptocurrency", "bitcoin", "altcoin"];

const GAMBLING_WORDS: &[&str] = &["casino", "bet", "betting", "gokken", "roulette", "slots"];

const DEBT_WORDS: &[&str] = &["lening", "loan", "krediet", "buy now pay later", "bkr"];

const MENTAL_WORDS: &[&str] = &[
    "suicide",
    "zelfmoord",
    "ik wil niet meer leven",
    "depressie",
    "depressed",
    "self harm",
    "zelfbeschadiging",
];

const PRIVACY_WORDS: &[&str] = &[
    "bsn",
    "burgerservicenummer",
    "paspoortnummer",
    "id-kaart",
    "wachtwoord",
    "password",
    "iban",
    "bankrekening",
    "creditcard",
    "cvv",
    "pincode",
    "pin code",
    "adres",
    "rijbewijsnummer",
];

const DISCRIMINATION_WORDS: &[&str] = &[
    "alleen maar",
    "uitsluiten",
    "geen buitenlanders",
    "geen vrouwen",
    "geen mannen",
    "geen lhbti",
    "geen homo",
    "geen moslim",
    "geen jood",
];

const CRYPTO_WARNING: &str = "Let op: investeren in crypto en vergelijkbare producten \
kan zeer risicovol zijn. Investeer geen geld dat je nodig hebt voor \
basisuitgaven (huur, eten, zorg) en bouw eerst een noodbuffer of \
laag-risico beleggingen op.";

const GAMBLING_WARNING: &str = "Gokken kan verslavend zijn en tot ernstige financiële en \
persoonlijke problemen leiden. Speel nooit met geleend geld of geld \
dat je nodig hebt voor je vaste lasten, stel grenzen in en overweeg \
hulp te zoeken als je merkt dat stoppen lastig wordt.";

const DEBT_WARNING: &str = "Wees voorzichtig met leningen en krediet. Zorg dat je \
volledig begrijpt wat de kosten, rente en gevolgen zijn, en maak een \
realistisch aflossingsplan. Leen geen geld om andere schulden of \
gokverliezen te dekken zonder onafhankelijk financieel advies.";

const MENTAL_WARNING: &str = "Het klinkt alsof je het erg zwaar hebt. Een AI kan geen \
professionele hulp of noodhulp vervangen. Praat zo snel mogelijk met \
je huisarts of een andere zorgverlener. In Nederland kun je bij \
levensbedreigende situaties direct 112 bellen.";

const PRIVACY_WARNING: &str = "Deel geen gevoelige persoonlijke gegevens zoals BSN, \
wachtwoorden, volledige bank- of creditcardgegevens, pincodes of \
volledig adres in chats met AI-systemen. Beperk je tot informatie \
die nodig is voor het onderwerp en gebruik veilige kanalen voor \
identiteits- of betalingszaken.";

const DISCRIMINATION_WARNING: &str = "Beslissingen die mensen uitsluiten op basis van afkomst, \
geslacht, geaardheid, geloof of andere persoonskenmerken kunnen in \
strijd zijn met mensenrechten en gelijkheidswetgeving. Probeer keuzes \
te maken die iedereen eerlijk en respectvol behandelen, tenzij er een \
objectieve en rechtmatige reden is om te differentiëren.";

/// The six built-in rules in fixed order.
pub fn builtin_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new(CRYPTO, CRYPTO_WORDS, CRYPTO_WARNING),
        KeywordRule::new(GAMBLING, GAMBLING_WORDS, GAMBLING_WARNING),
        KeywordRule::new(DEBT, DEBT_WORDS, DEBT_WARNING),
        KeywordRule::new(MENTAL_HEALTH, MENTAL_WORDS, MENTAL_WARNING),
        KeywordRule::new(PRIVACY, PRIVACY_WORDS, PRIVACY_WARNING),
        KeywordRule::new(DISCRIMINATION, DISCRIMINATION_WORDS, DISCRIMINATION_WARNING),
    ]
}
