//! Read-only reference tables consulted while walking pages.
//!
//! The compiled-in defaults cover English Wiktionary. A YAML document can
//! extend or override any table; fields missing from the document keep their
//! default contents.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open vocabulary file {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read vocabulary file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse vocabulary YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("vocabulary table `{table}` has an empty key")]
    EmptyKey { table: &'static str },
}

/// On-disk shape of a vocabulary document. Every table is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct VocabularyFile {
    /// Language code -> English language name
    languages: HashMap<String, String>,
    relation_headings: HashMap<String, String>,
    pos_headings: HashMap<String, String>,
    ignored_sections: Vec<String>,
    tag_headings: HashMap<String, Vec<String>>,
    sense_prefix: Option<String>,
    pronunciation_heading: Option<String>,
    translations_heading: Option<String>,
    qualifier_tags: HashMap<String, Vec<String>>,
    qualifier_topics: HashMap<String, Vec<String>>,
    thesaurus_namespace: Option<String>,
    thesaurus_namespace_id: Option<u32>,
    thesaurus_aliases: Vec<String>,
    requested_entries_prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Vocabulary {
    name_to_code: HashMap<String, String>,
    code_to_name: HashMap<String, String>,
    relations: HashMap<String, String>,
    parts_of_speech: HashMap<String, String>,
    ignored_sections: HashSet<String>,
    tag_headings: HashMap<String, Vec<String>>,
    sense_prefix: String,
    pronunciation_heading: String,
    translations_heading: String,
    qualifier_tags: HashMap<String, Vec<String>>,
    qualifier_topics: HashMap<String, Vec<String>>,
    thesaurus_namespace: String,
    thesaurus_namespace_id: u32,
    thesaurus_aliases: Vec<String>,
    requested_entries_prefix: String,
}

/// Lookup key used by every table: NFC, trimmed, lowercased.
pub fn normalize_key(s: &str) -> String {
    s.trim().nfc().collect::<String>().to_lowercase()
}

static BUILTIN: Lazy<Vocabulary> = Lazy::new(Vocabulary::defaults);

impl Vocabulary {
    /// The compiled-in English Wiktionary tables.
    pub fn builtin() -> &'static Vocabulary {
        &BUILTIN
    }

    /// Tables with nothing in them except namespace settings.
    pub fn empty() -> Self {
        Vocabulary {
            name_to_code: HashMap::new(),
            code_to_name: HashMap::new(),
            relations: HashMap::new(),
            parts_of_speech: HashMap::new(),
            ignored_sections: HashSet::new(),
            tag_headings: HashMap::new(),
            sense_prefix: "Sense:".to_string(),
            pronunciation_heading: normalize_key("Pronunciation"),
            translations_heading: normalize_key("Translations"),
            qualifier_tags: HashMap::new(),
            qualifier_topics: HashMap::new(),
            thesaurus_namespace: "Thesaurus".to_string(),
            thesaurus_namespace_id: 110,
            thesaurus_aliases: vec!["WS".to_string()],
            requested_entries_prefix: "Requested entries ".to_string(),
        }
    }

    fn defaults() -> Self {
        let mut vocab = Vocabulary::empty();
        match serde_yaml::from_str::<BTreeMap<String, String>>(LANGUAGES_YAML) {
            Ok(languages) => {
                for (code, name) in &languages {
                    vocab.add_language(code, name);
                }
            }
            Err(err) => warn!(%err, "built-in language table unreadable"),
        }
        for (heading, relation) in DEFAULT_RELATIONS {
            vocab.relations.insert(normalize_key(heading), relation.to_string());
        }
        for (heading, pos) in DEFAULT_POS {
            vocab.parts_of_speech.insert(normalize_key(heading), pos.to_string());
        }
        vocab
            .ignored_sections
            .extend(DEFAULT_IGNORED.iter().map(|s| normalize_key(s)));
        for (heading, tags) in DEFAULT_TAG_HEADINGS {
            vocab.tag_headings.insert(
                normalize_key(heading),
                tags.iter().map(|t| t.to_string()).collect(),
            );
        }
        for (label, tags) in DEFAULT_QUALIFIER_TAGS {
            vocab.qualifier_tags.insert(
                normalize_key(label),
                tags.iter().map(|t| t.to_string()).collect(),
            );
        }
        for (label, topics) in DEFAULT_QUALIFIER_TOPICS {
            vocab.qualifier_topics.insert(
                normalize_key(label),
                topics.iter().map(|t| t.to_string()).collect(),
            );
        }
        vocab
    }

    fn add_language(&mut self, code: &str, name: &str) {
        self.name_to_code
            .insert(normalize_key(name), code.trim().to_string());
        self.code_to_name
            .insert(code.trim().to_lowercase(), name.trim().to_string());
    }

    /// Parse a YAML document and merge it over the compiled-in defaults.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: VocabularyFile = serde_yaml::from_str(contents)?;
        let mut vocab = Vocabulary::defaults();
        vocab.merge(file)?;
        Ok(vocab)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut file = File::open(path).map_err(|source| ConfigError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_yaml_str(&contents)
    }

    fn merge(&mut self, file: VocabularyFile) -> Result<(), ConfigError> {
        for (code, name) in &file.languages {
            if code.trim().is_empty() || name.trim().is_empty() {
                return Err(ConfigError::EmptyKey { table: "languages" });
            }
            self.add_language(code, name);
        }
        merge_table(&mut self.relations, file.relation_headings, "relation_headings")?;
        merge_table(&mut self.parts_of_speech, file.pos_headings, "pos_headings")?;
        merge_table(&mut self.tag_headings, file.tag_headings, "tag_headings")?;
        merge_table(&mut self.qualifier_tags, file.qualifier_tags, "qualifier_tags")?;
        merge_table(&mut self.qualifier_topics, file.qualifier_topics, "qualifier_topics")?;
        for section in file.ignored_sections {
            if section.trim().is_empty() {
                return Err(ConfigError::EmptyKey { table: "ignored_sections" });
            }
            self.ignored_sections.insert(normalize_key(&section));
        }
        if let Some(prefix) = file.sense_prefix {
            self.sense_prefix = prefix;
        }
        if let Some(heading) = file.pronunciation_heading {
            self.pronunciation_heading = normalize_key(&heading);
        }
        if let Some(heading) = file.translations_heading {
            self.translations_heading = normalize_key(&heading);
        }
        if let Some(ns) = file.thesaurus_namespace {
            self.thesaurus_namespace = ns;
        }
        if let Some(id) = file.thesaurus_namespace_id {
            self.thesaurus_namespace_id = id;
        }
        self.thesaurus_aliases.extend(file.thesaurus_aliases);
        if let Some(prefix) = file.requested_entries_prefix {
            self.requested_entries_prefix = prefix;
        }
        Ok(())
    }

    pub fn language_code(&self, name: &str) -> Option<&str> {
        self.name_to_code.get(&normalize_key(name)).map(String::as_str)
    }

    pub fn language_name(&self, code: &str) -> Option<&str> {
        self.code_to_name
            .get(&code.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn relation(&self, heading: &str) -> Option<&str> {
        self.relations.get(&normalize_key(heading)).map(String::as_str)
    }

    pub fn part_of_speech(&self, heading: &str) -> Option<&str> {
        self.parts_of_speech
            .get(&normalize_key(heading))
            .map(String::as_str)
    }

    pub fn is_ignored_section(&self, heading: &str) -> bool {
        self.ignored_sections.contains(&normalize_key(heading))
    }

    pub fn heading_tags(&self, heading: &str) -> Option<&[String]> {
        self.tag_headings
            .get(&normalize_key(heading))
            .map(Vec::as_slice)
    }

    pub fn sense_prefix(&self) -> &str {
        &self.sense_prefix
    }

    /// Section whose lists carry pronunciations, read in entries mode only.
    pub fn is_pronunciation_heading(&self, heading: &str) -> bool {
        normalize_key(heading) == self.pronunciation_heading
    }

    /// Section whose lists carry translations, read in entries mode only.
    pub fn is_translations_heading(&self, heading: &str) -> bool {
        normalize_key(heading) == self.translations_heading
    }

    pub fn qualifier_tags(&self, label: &str) -> Option<&[String]> {
        self.qualifier_tags
            .get(&normalize_key(label))
            .map(Vec::as_slice)
    }

    pub fn qualifier_topics(&self, label: &str) -> Option<&[String]> {
        self.qualifier_topics
            .get(&normalize_key(label))
            .map(Vec::as_slice)
    }

    pub fn thesaurus_namespace(&self) -> &str {
        &self.thesaurus_namespace
    }

    pub fn thesaurus_namespace_id(&self) -> u32 {
        self.thesaurus_namespace_id
    }

    /// Title prefixes that point into the thesaurus namespace, e.g. `Thesaurus:`.
    pub fn thesaurus_prefixes(&self) -> Vec<String> {
        std::iter::once(&self.thesaurus_namespace)
            .chain(self.thesaurus_aliases.iter())
            .map(|ns| format!("{}:", ns))
            .collect()
    }

    pub fn requested_entries_prefix(&self) -> &str {
        &self.requested_entries_prefix
    }
}

fn merge_table<V>(
    target: &mut HashMap<String, V>,
    source: HashMap<String, V>,
    table: &'static str,
) -> Result<(), ConfigError> {
    for (key, value) in source {
        if key.trim().is_empty() {
            return Err(ConfigError::EmptyKey { table });
        }
        target.insert(normalize_key(&key), value);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Compiled-in defaults (English Wiktionary)
// ─────────────────────────────────────────────────────────────────────────────

/// Code -> name for every language heading the walkers recognise by default.
const LANGUAGES_YAML: &str = include_str!("../schema/languages.yaml");

const DEFAULT_RELATIONS: &[(&str, &str)] = &[
    ("synonyms", "synonyms"),
    ("near synonyms", "synonyms"),
    ("near-synonyms", "synonyms"),
    ("antonyms", "antonyms"),
    ("hypernyms", "hypernyms"),
    ("hyponyms", "hyponyms"),
    ("meronyms", "meronyms"),
    ("holonyms", "holonyms"),
    ("troponyms", "troponyms"),
    ("coordinate terms", "coordinate_terms"),
    ("related terms", "related"),
    ("various", "related"),
    ("see also", "related"),
    ("derived terms", "derived"),
    ("compounds", "derived"),
    ("abbreviations", "abbreviations"),
    ("instances", "instances"),
];

const DEFAULT_POS: &[(&str, &str)] = &[
    ("noun", "noun"),
    ("proper noun", "name"),
    ("verb", "verb"),
    ("adjective", "adj"),
    ("adverb", "adv"),
    ("pronoun", "pron"),
    ("preposition", "prep"),
    ("postposition", "postp"),
    ("conjunction", "conj"),
    ("interjection", "intj"),
    ("determiner", "det"),
    ("article", "article"),
    ("numeral", "num"),
    ("number", "num"),
    ("particle", "particle"),
    ("phrase", "phrase"),
    ("prepositional phrase", "prep_phrase"),
    ("idiom", "phrase"),
    ("proverb", "proverb"),
    ("prefix", "prefix"),
    ("suffix", "suffix"),
    ("contraction", "contraction"),
    ("participle", "verb"),
    ("letter", "character"),
];

const DEFAULT_IGNORED: &[&str] = &[
    "further reading",
    "external links",
    "references",
    "translations",
    "notes",
    "usage",
    "usage notes",
    "work to be done",
    "quantification",
    "abbreviation",
    "symbol",
    "anagrams",
];

const DEFAULT_TAG_HEADINGS: &[(&str, &[&str])] = &[
    ("by reason", &[]),
    ("by period of time", &[]),
    ("by degree", &[]),
    ("by type", &[]),
    ("other", &[]),
    ("opaque slang terms", &["slang"]),
    ("slang", &["slang"]),
    ("colloquial, archaic, slang", &["colloquial", "archaic", "slang"]),
    ("euphemisms", &["euphemism"]),
    ("colloquialisms", &["colloquial"]),
    ("colloquialisms or slang", &["colloquial"]),
    ("technical terms misused", &["colloquial"]),
    ("people", &[]),
    ("proper names", &["proper-noun"]),
    ("race-based (warning- offensive)", &["offensive"]),
    ("substance addicts", &[]),
    ("non-substance addicts", &[]),
    ("echoing sounds", &[]),
    ("movement sounds", &[]),
    ("impacting sounds", &[]),
    ("destructive sounds", &[]),
    ("noisy sounds", &[]),
    ("vocal sounds", &[]),
    ("miscellaneous sounds", &[]),
    ("age and gender", &[]),
    ("breeds and types", &[]),
    ("by function", &[]),
    ("wild horses", &[]),
    ("body parts", &[]),
    ("colors, patterns and markings", &[]),
    ("diseases", &[]),
    ("equipment and gear", &[]),
    ("groups", &[]),
    ("horse-drawn vehicles", &[]),
    ("places", &[]),
    ("sports", &[]),
    ("sounds and behavior", &[]),
    ("obscure derivations", &[]),
    ("plants", &[]),
    ("animals", &[]),
    ("common", &[]),
    ("rare", &["rare"]),
];

const DEFAULT_QUALIFIER_TAGS: &[(&str, &[&str])] = &[
    ("slang", &["slang"]),
    ("internet slang", &["Internet", "slang"]),
    ("colloquial", &["colloquial"]),
    ("informal", &["informal"]),
    ("formal", &["formal"]),
    ("archaic", &["archaic"]),
    ("obsolete", &["obsolete"]),
    ("dated", &["dated"]),
    ("rare", &["rare"]),
    ("uncommon", &["uncommon"]),
    ("vulgar", &["vulgar"]),
    ("offensive", &["offensive"]),
    ("derogatory", &["derogatory"]),
    ("pejorative", &["pejorative"]),
    ("euphemistic", &["euphemistic"]),
    ("euphemism", &["euphemistic"]),
    ("figurative", &["figuratively"]),
    ("figuratively", &["figuratively"]),
    ("literary", &["literary"]),
    ("poetic", &["poetic"]),
    ("humorous", &["humorous"]),
    ("jocular", &["humorous"]),
    ("childish", &["childish"]),
    ("dialectal", &["dialectal"]),
    ("regional", &["regional"]),
    ("nonstandard", &["nonstandard"]),
    ("proscribed", &["proscribed"]),
    ("british", &["British"]),
    ("uk", &["UK"]),
    ("us", &["US"]),
    ("american", &["US"]),
    ("australia", &["Australia"]),
    ("australian", &["Australia"]),
    ("canada", &["Canada"]),
    ("ireland", &["Ireland"]),
    ("scotland", &["Scotland"]),
    ("new zealand", &["New-Zealand"]),
    ("south africa", &["South-Africa"]),
    ("india", &["India"]),
];

const DEFAULT_QUALIFIER_TOPICS: &[(&str, &[&str])] = &[
    ("medicine", &["medicine"]),
    ("medical", &["medicine"]),
    ("law", &["law"]),
    ("legal", &["law"]),
    ("computing", &["computing"]),
    ("biology", &["biology"]),
    ("chemistry", &["chemistry"]),
    ("botany", &["botany"]),
    ("zoology", &["zoology"]),
    ("music", &["music"]),
    ("sports", &["sports"]),
    ("nautical", &["nautical"]),
    ("military", &["military"]),
    ("religion", &["religion"]),
    ("mathematics", &["mathematics"]),
    ("math", &["mathematics"]),
    ("physics", &["physics"]),
    ("anatomy", &["anatomy"]),
    ("cooking", &["cooking"]),
    ("finance", &["finance"]),
    ("linguistics", &["linguistics"]),
    ("grammar", &["grammar"]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heading::{classify, Heading};
    use std::io::Write;

    #[test]
    fn builtin_languages_resolve_both_ways() {
        let vocab = Vocabulary::builtin();
        assert_eq!(vocab.language_code("English"), Some("en"));
        assert_eq!(vocab.language_code("  english "), Some("en"));
        assert_eq!(vocab.language_name("EN"), Some("English"));
        assert_eq!(vocab.language_code("Klingon"), None);
    }

    #[test]
    fn builtin_language_table_is_complete_enough() {
        let vocab = Vocabulary::builtin();
        assert_eq!(vocab.language_code("Yoruba"), Some("yo"));
        assert_eq!(vocab.language_code("Old Norse"), Some("non"));
        assert_eq!(vocab.language_code("Toki Pona"), Some("tok"));
        assert_eq!(vocab.language_name("no"), Some("Norwegian"));
        assert_eq!(vocab.language_name("mul"), Some("Translingual"));
    }

    #[test]
    fn language_table_parses_with_unique_names() {
        let table: BTreeMap<String, String> = serde_yaml::from_str(LANGUAGES_YAML).unwrap();
        assert!(table.len() > 400);
        let names: HashSet<String> = table.values().map(|n| normalize_key(n)).collect();
        assert_eq!(names.len(), table.len());
        let vocab = Vocabulary::builtin();
        for name in table.values() {
            assert_eq!(classify(name, vocab), Heading::Language(name.clone()));
            assert_eq!(vocab.relation(name), None, "{name}");
            assert_eq!(vocab.part_of_speech(name), None, "{name}");
            assert!(vocab.heading_tags(name).is_none(), "{name}");
            assert!(!vocab.is_ignored_section(name), "{name}");
        }
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let vocab = Vocabulary::builtin();
        assert_eq!(vocab.relation("Synonyms"), Some("synonyms"));
        assert_eq!(vocab.part_of_speech("Proper noun"), Some("name"));
        assert!(vocab.is_ignored_section("Further Reading"));
        assert_eq!(
            vocab.heading_tags("Slang").map(|t| t.to_vec()),
            Some(vec!["slang".to_string()])
        );
    }

    #[test]
    fn yaml_merges_over_defaults() {
        let vocab = Vocabulary::from_yaml_str(
            r#"
languages:
  tlh: Klingon
relation_headings:
  Paronyms: paronyms
sense_prefix: "Sinn:"
"#,
        )
        .unwrap();
        assert_eq!(vocab.language_code("Klingon"), Some("tlh"));
        assert_eq!(vocab.language_code("English"), Some("en"));
        assert_eq!(vocab.relation("paronyms"), Some("paronyms"));
        assert_eq!(vocab.sense_prefix(), "Sinn:");
        assert!(vocab.is_translations_heading("translations"));
    }

    #[test]
    fn entry_section_headings_can_be_renamed() {
        let vocab = Vocabulary::from_yaml_str(
            "pronunciation_heading: Aussprache\ntranslations_heading: Übersetzungen\n",
        )
        .unwrap();
        assert!(vocab.is_pronunciation_heading("AUSSPRACHE"));
        assert!(!vocab.is_pronunciation_heading("Pronunciation"));
        assert!(vocab.is_translations_heading(" Übersetzungen "));
    }

    #[test]
    fn yaml_rejects_unknown_fields() {
        let err = Vocabulary::from_yaml_str("colours: [red]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn yaml_rejects_empty_keys() {
        let err = Vocabulary::from_yaml_str("pos_headings:\n  '': noun\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyKey { table: "pos_headings" }));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ignored_sections: [Trivia]").unwrap();
        let vocab = Vocabulary::load(file.path()).unwrap();
        assert!(vocab.is_ignored_section("trivia"));
        assert!(vocab.is_ignored_section("references"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Vocabulary::load(Path::new("/nonexistent/vocab.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Open { .. }));
    }

    #[test]
    fn shipped_schema_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("schema/thesaurus.yaml");
        let vocab = Vocabulary::load(&path).unwrap();
        assert_eq!(vocab.language_code("Old English"), Some("ang"));
        assert!(vocab.is_ignored_section("Declension"));
        assert_eq!(vocab.relation("Synonyms"), Some("synonyms"));
    }

    #[test]
    fn thesaurus_prefixes_include_aliases() {
        let prefixes = Vocabulary::builtin().thesaurus_prefixes();
        assert_eq!(prefixes, vec!["Thesaurus:".to_string(), "WS:".to_string()]);
    }
}
