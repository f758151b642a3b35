//! Heading classification.
//!
//! [`classify`] is a pure function of the label and the vocabulary; the seven
//! outcomes are checked in a fixed priority order. [`classify_at`] adds the
//! heading level: a level-2 heading is always a language section, named in the
//! table or not. [`Heading::apply`] turns an outcome into the context seen by
//! the heading's subtree.

use crate::model::WalkContext;
use crate::vocab::Vocabulary;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heading {
    /// Known language name, as written in the heading
    Language(String),
    /// Remainder after the localized "Sense:" prefix
    Sense(String),
    /// Non-lexical section; nothing below it is read
    Ignored,
    Relation(String),
    PartOfSpeech(String),
    /// Decorative grouping heading that contributes tags
    Tags(Vec<String>),
    Unknown,
}

pub fn classify(label: &str, vocab: &Vocabulary) -> Heading {
    let label: String = label.trim().nfc().collect();

    if vocab.language_code(&label).is_some() {
        return Heading::Language(label);
    }
    if let Some(sense) = strip_prefix_ignore_case(&label, vocab.sense_prefix()) {
        return Heading::Sense(sense.trim().to_string());
    }
    if vocab.is_ignored_section(&label) {
        return Heading::Ignored;
    }
    if let Some(relation) = vocab.relation(&label) {
        return Heading::Relation(relation.to_string());
    }
    if let Some(pos) = vocab.part_of_speech(&label) {
        return Heading::PartOfSpeech(pos.to_string());
    }
    if let Some(tags) = vocab.heading_tags(&label) {
        return Heading::Tags(tags.to_vec());
    }
    Heading::Unknown
}

/// Level at which a page opens one section per language.
pub const LANGUAGE_LEVEL: u8 = 2;

/// [`classify`], except that an otherwise unknown level-2 heading is taken as
/// a language the table does not list.
pub fn classify_at(level: u8, label: &str, vocab: &Vocabulary) -> Heading {
    match classify(label, vocab) {
        Heading::Unknown if level == LANGUAGE_LEVEL => {
            Heading::Language(label.trim().nfc().collect())
        }
        heading => heading,
    }
}

fn strip_prefix_ignore_case<'a>(label: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let mut label_chars = label.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = label_chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    let rest = label_chars.next().map_or(label.len(), |(idx, _)| idx);
    Some(&label[rest..])
}

impl Heading {
    /// Context for the heading's subtree, or `None` when the subtree is skipped.
    pub fn apply(&self, ctx: &WalkContext) -> Option<WalkContext> {
        let mut next = ctx.clone();
        match self {
            Heading::Language(language) => {
                next.language = Some(language.clone());
                next.part_of_speech = None;
                next.sense = None;
                next.relation_type = None;
                next.inherited_tags.clear();
            }
            Heading::Sense(sense) => {
                next.sense = Some(sense.clone());
                next.relation_type = None;
            }
            Heading::Ignored => return None,
            Heading::Relation(relation) => {
                next.relation_type = Some(relation.clone());
            }
            Heading::PartOfSpeech(pos) => {
                next.part_of_speech = Some(pos.clone());
                next.sense = None;
                next.relation_type = None;
            }
            Heading::Tags(tags) => next.merge_tags(tags),
            Heading::Unknown => {}
        }
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn builtin(label: &str) -> Heading {
        classify(label, Vocabulary::builtin())
    }

    #[rstest]
    #[case("English", Heading::Language("English".to_string()))]
    #[case("Sense: dwelling", Heading::Sense("dwelling".to_string()))]
    #[case("sense: dwelling", Heading::Sense("dwelling".to_string()))]
    #[case("References", Heading::Ignored)]
    #[case("Antonyms", Heading::Relation("antonyms".to_string()))]
    #[case("Noun", Heading::PartOfSpeech("noun".to_string()))]
    #[case("Slang", Heading::Tags(vec!["slang".to_string()]))]
    #[case("By type", Heading::Tags(vec![]))]
    #[case("Etymology 1", Heading::Unknown)]
    fn builtin_dispositions(#[case] label: &str, #[case] expected: Heading) {
        assert_eq!(builtin(label), expected);
    }

    fn colliding_vocab() -> Vocabulary {
        // "alpha" matches every table, "beta" every table but languages, etc.
        Vocabulary::from_yaml_str(
            r#"
languages:
  xa: Alpha
sense_prefix: "Sense:"
ignored_sections: [alpha, beta, "sense: gamma"]
relation_headings: { alpha: r, beta: r, gamma: r }
pos_headings: { alpha: p, beta: p, gamma: p, delta: p }
tag_headings: { alpha: [t], beta: [t], gamma: [t], delta: [t], epsilon: [t] }
"#,
        )
        .unwrap()
    }

    #[rstest]
    #[case("Alpha", Heading::Language("Alpha".to_string()))]
    #[case("Sense: gamma", Heading::Sense("gamma".to_string()))]
    #[case("Beta", Heading::Ignored)]
    #[case("Gamma", Heading::Relation("r".to_string()))]
    #[case("Delta", Heading::PartOfSpeech("p".to_string()))]
    #[case("Epsilon", Heading::Tags(vec!["t".to_string()]))]
    #[case("Zeta", Heading::Unknown)]
    fn priority_order_on_collisions(#[case] label: &str, #[case] expected: Heading) {
        assert_eq!(classify(label, &colliding_vocab()), expected);
    }

    #[test]
    fn classification_is_deterministic() {
        let vocab = colliding_vocab();
        for label in ["Alpha", "Beta", "Gamma", "Delta", "Epsilon", "Zeta"] {
            assert_eq!(classify(label, &vocab), classify(label, &vocab));
        }
    }

    fn full_context() -> WalkContext {
        WalkContext {
            language: Some("English".to_string()),
            part_of_speech: Some("noun".to_string()),
            sense: Some("building".to_string()),
            relation_type: Some("antonyms".to_string()),
            inherited_tags: vec!["rare".to_string()],
        }
    }

    #[test]
    fn language_resets_everything_below_it() {
        let next = Heading::Language("French".to_string())
            .apply(&full_context())
            .unwrap();
        assert_eq!(next.language.as_deref(), Some("French"));
        assert_eq!(next.part_of_speech, None);
        assert_eq!(next.sense, None);
        assert_eq!(next.relation_type, None);
        assert!(next.inherited_tags.is_empty());
    }

    #[rstest]
    #[case(2, "Yoruba", Heading::Language("Yoruba".to_string()))]
    #[case(2, "Lingua Ignota", Heading::Language("Lingua Ignota".to_string()))]
    #[case(2, "Synonyms", Heading::Relation("synonyms".to_string()))]
    #[case(3, "Lingua Ignota", Heading::Unknown)]
    #[case(4, "Etymology 1", Heading::Unknown)]
    fn level_two_headings_are_languages(
        #[case] level: u8,
        #[case] label: &str,
        #[case] expected: Heading,
    ) {
        assert_eq!(classify_at(level, label, Vocabulary::builtin()), expected);
    }

    #[test]
    fn pos_resets_sense_and_relation_but_keeps_language() {
        let next = Heading::PartOfSpeech("verb".to_string())
            .apply(&full_context())
            .unwrap();
        assert_eq!(next.language.as_deref(), Some("English"));
        assert_eq!(next.part_of_speech.as_deref(), Some("verb"));
        assert_eq!(next.sense, None);
        assert_eq!(next.relation_type, None);
    }

    #[test]
    fn sense_resets_relation_only() {
        let next = Heading::Sense("home".to_string())
            .apply(&full_context())
            .unwrap();
        assert_eq!(next.part_of_speech.as_deref(), Some("noun"));
        assert_eq!(next.sense.as_deref(), Some("home"));
        assert_eq!(next.relation_type, None);
    }

    #[test]
    fn tags_merge_without_touching_other_fields() {
        let next = Heading::Tags(vec!["slang".to_string(), "rare".to_string()])
            .apply(&full_context())
            .unwrap();
        assert_eq!(next.inherited_tags, vec!["rare", "slang"]);
        assert_eq!(next.relation_type.as_deref(), Some("antonyms"));
    }

    #[test]
    fn ignored_stops_and_unknown_keeps_context() {
        assert_eq!(Heading::Ignored.apply(&full_context()), None);
        assert_eq!(Heading::Unknown.apply(&full_context()), Some(full_context()));
    }

    #[test]
    fn prefix_match_is_case_insensitive_and_unicode_safe() {
        assert_eq!(strip_prefix_ignore_case("SENSE: x", "Sense:"), Some(" x"));
        assert_eq!(strip_prefix_ignore_case("Sens", "Sense:"), None);
        assert_eq!(strip_prefix_ignore_case("Sinn: Haus", "Sinn:"), Some(" Haus"));
        assert_eq!(strip_prefix_ignore_case("Ärger", "är"), Some("ger"));
    }
}
