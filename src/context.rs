//! Conversation context: follow-up detection and topic carry-over.
//!
//! Intent detection is a priority-ordered table of regex rules evaluated
//! against the normalized query. The first rule that fires wins, so
//! follow-up rules are listed before continuity rules.

use crate::matcher::normalize_text;
use crate::types::{ChatMessage, HelpEntry, HelpStep, Role};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Number of user messages considered when picking the previous topic
const WINDOW_SIZE: usize = 5;

/// Window weights, oldest first
const WEIGHTS: [f64; WINDOW_SIZE] = [0.10, 0.15, 0.20, 0.25, 0.30];

/// Max entries returned by topic boosting
const MAX_BOOSTED: usize = 5;

const TOPIC_KEYWORD_BOOST: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentTag {
    /// Leading connective or pronoun referring back ("y…", "eso cómo…")
    FollowUp,
    /// Asks to keep going ("siguiente paso", "qué más")
    Continuity,
}

/// One pattern in the intent table
#[derive(Debug, Clone)]
pub struct MatcherRule {
    pub pattern: Regex,
    pub tag: IntentTag,
    /// Only applies to queries shorter than this many characters
    pub max_len: Option<usize>,
}

/// Priority-ordered intent rules
#[derive(Debug, Clone)]
pub struct IntentRules {
    rules: Vec<MatcherRule>,
}

static FOLLOW_UP_PATTERNS: &[&str] = &[
    r"^(y|pero|entonces|luego|despues|y\s+luego|y\s+despues|y\s+entonces)\s+",
    r"^(eso|esto|lo)\s+(como|donde|cuando|por\s+que)",
    r"^como\s+(lo|la|los|las|eso|esto)\b",
    r"^donde\s+(esta|encuentro|veo|lo\s+veo)",
    r"^que\s+(es|significa|quiere\s+decir|pasa\s+si)\b",
    r"^(y\s+si|y\s+que\s+pasa|que\s+pasa\s+si)",
    r"^(cual|cuales)\s+(de|es|son)\b",
    r"^(tambien|ademas)",
];

static CONTINUITY_PATTERNS: &[&str] = &[
    r"^(siguiente|proximo|despues|luego)\s+(paso|opcion)",
    r"^(y\s+ahora|ahora)\s+(que|como)\b",
    r"^(ya\s+)?hice\s+eso",
    r"^que\s+mas",
];

/// Bare connective in a very short query
const SHORT_CONNECTIVE: &str = r"^(y|pero|entonces)\s";
const SHORT_QUERY_LEN: usize = 15;

/// Connectives and pronouns that point back at an earlier question
const LEADING_REFERENCE: &str = r"^((y|pero|entonces|luego|despues|tambien|ademas|eso|esto)\s+)+";
const OBJECT_PRONOUNS: &str = r"^((lo|la|los|las|le|les|eso|esto)\s+)+";

/// Bare verbs left over once a follow-up is stripped ("y eso como lo hago")
static PLACEHOLDER_VERBS: &[&str] = &["hago", "hace", "hacer", "sigo", "seguir", "continuo"];

static INTERROGATIVE_PREFIX: OnceLock<Regex> = OnceLock::new();
static REFERENCE_PREFIX: OnceLock<Regex> = OnceLock::new();
static PRONOUN_PREFIX: OnceLock<Regex> = OnceLock::new();
static DEFAULT_RULES: OnceLock<IntentRules> = OnceLock::new();

fn interrogative_prefix() -> &'static Regex {
    INTERROGATIVE_PREFIX.get_or_init(|| {
        Regex::new(r"^(como|donde|cuando|por\s+que|que|cual)\s+").expect("valid interrogative pattern")
    })
}

fn reference_prefix() -> &'static Regex {
    REFERENCE_PREFIX.get_or_init(|| Regex::new(LEADING_REFERENCE).expect("valid reference pattern"))
}

fn pronoun_prefix() -> &'static Regex {
    PRONOUN_PREFIX.get_or_init(|| Regex::new(OBJECT_PRONOUNS).expect("valid pronoun pattern"))
}

impl IntentRules {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Built-in Spanish rules
    pub fn spanish() -> Self {
        let mut rules = Self::empty();
        for pattern in FOLLOW_UP_PATTERNS {
            rules.push(pattern, IntentTag::FollowUp).expect("valid follow-up pattern");
        }
        for pattern in CONTINUITY_PATTERNS {
            rules.push(pattern, IntentTag::Continuity).expect("valid continuity pattern");
        }
        rules
            .push_short(SHORT_CONNECTIVE, IntentTag::FollowUp, SHORT_QUERY_LEN)
            .expect("valid short connective pattern");
        rules
    }

    /// Append a rule at the lowest priority
    pub fn push(&mut self, pattern: &str, tag: IntentTag) -> Result<(), regex::Error> {
        self.rules.push(MatcherRule {
            pattern: Regex::new(&format!("(?i){}", pattern))?,
            tag,
            max_len: None,
        });
        Ok(())
    }

    /// Append a rule that only fires on short queries
    pub fn push_short(&mut self, pattern: &str, tag: IntentTag, max_len: usize) -> Result<(), regex::Error> {
        self.rules.push(MatcherRule {
            pattern: Regex::new(&format!("(?i){}", pattern))?,
            tag,
            max_len: Some(max_len),
        });
        Ok(())
    }

    /// First matching rule's tag
    pub fn classify(&self, query: &str) -> Option<IntentTag> {
        let normalized = normalize_text(query);
        let length = normalized.chars().count();

        self.rules
            .iter()
            .filter(|rule| rule.max_len.map_or(true, |max| length < max))
            .find(|rule| rule.pattern.is_match(&normalized))
            .map(|rule| rule.tag)
    }
}

impl Default for IntentRules {
    fn default() -> Self {
        Self::spanish()
    }
}

/// Follow-up verdict using the built-in rules
pub fn is_follow_up_question(query: &str) -> bool {
    DEFAULT_RULES
        .get_or_init(IntentRules::spanish)
        .classify(query)
        .is_some()
}

/// Strip leading connectives and the interrogative to get the core topic.
/// Empty when the question only points back at an earlier one.
pub fn extract_topic(question: &str) -> String {
    let normalized = normalize_text(question);
    let unlinked = reference_prefix().replace(&normalized, "");
    let topic = interrogative_prefix().replace(&unlinked, "");
    // pronouns only go when a connective or interrogative was stripped
    let topic = if topic.len() < normalized.len() {
        pronoun_prefix().replace(&topic, "").into_owned()
    } else {
        topic.into_owned()
    };
    let topic = topic.trim();

    if topic.split_whitespace().all(|w| PLACEHOLDER_VERBS.contains(&w)) {
        return String::new();
    }
    topic.to_string()
}

/// Derived per query, never persisted
#[derive(Debug, Clone, Default)]
pub struct ContextMatch {
    pub is_follow_up: bool,
    pub previous_topic: Option<String>,
    pub previous_entry: Option<HelpEntry>,
    pub related_entries: Vec<HelpEntry>,
    pub context_prefix: Option<String>,
}

impl ContextMatch {
    fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    FollowUp,
    ContextAware,
    /// Caller should run the plain match engine
    Standard,
}

#[derive(Debug, Clone)]
pub struct ContextSearch {
    pub entries: Vec<HelpEntry>,
    pub context: ContextMatch,
    pub strategy: SearchStrategy,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationSummary {
    pub total_questions: usize,
    pub topics_discussed: Vec<String>,
    pub last_topic: Option<String>,
}

fn word_covered(word: &str, haystack: &[&str]) -> bool {
    haystack.iter().any(|h| {
        *h == word || (word.len() >= 4 && h.len() >= 4 && (h.starts_with(word) || word.starts_with(h)))
    })
}

/// Share of the topic's content words found in the entry's question or aliases
fn topic_coverage(topic: &str, entry: &HelpEntry) -> f64 {
    let topic_words: Vec<&str> = topic.split_whitespace().filter(|w| w.len() > 3).collect();
    if topic_words.is_empty() {
        return 0.0;
    }

    let text = normalize_text(&format!("{} {}", entry.question, entry.aliases.join(" ")));
    let words: Vec<&str> = text.split_whitespace().collect();
    let covered = topic_words.iter().filter(|w| word_covered(w, &words)).count();
    covered as f64 / topic_words.len() as f64
}

fn entry_text(entry: &HelpEntry) -> String {
    normalize_text(&format!("{} {}", entry.question, entry.aliases.join(" ")))
}

/// Entry whose question or aliases best contain the topic
fn locate_topic_entry<'a>(topic: &str, entries: &'a [HelpEntry]) -> Option<&'a HelpEntry> {
    let direct = entries.iter().find(|entry| {
        normalize_text(&entry.question).contains(topic)
            || entry.aliases.iter().any(|a| normalize_text(a).contains(topic))
    });
    if direct.is_some() {
        return direct;
    }

    let mut best: Option<(&HelpEntry, f64)> = None;
    for entry in entries {
        let coverage = topic_coverage(topic, entry);
        if coverage >= 0.5 && best.map_or(true, |(_, b)| coverage > b) {
            best = Some((entry, coverage));
        }
    }
    best.map(|(entry, _)| entry)
}

/// Stateless analyzer holding the intent rule table
#[derive(Debug, Clone, Default)]
pub struct ContextAnalyzer {
    rules: IntentRules,
}

impl ContextAnalyzer {
    pub fn new(rules: IntentRules) -> Self {
        Self { rules }
    }

    pub fn rules_mut(&mut self) -> &mut IntentRules {
        &mut self.rules
    }

    pub fn is_follow_up(&self, query: &str) -> bool {
        self.rules.classify(query).is_some()
    }

    /// Detect a follow-up and carry over the previous topic. Never fails;
    /// no match just leaves `related_entries` empty.
    pub fn analyze(&self, query: &str, history: &[ChatMessage], entries: &[HelpEntry]) -> ContextMatch {
        if !self.is_follow_up(query) || !history.iter().any(|m| m.role == Role::Assistant) {
            return ContextMatch::none();
        }

        // the current query may already be in the transcript
        let history = match history.last() {
            Some(last) if last.role == Role::User && last.content == query => &history[..history.len() - 1],
            _ => history,
        };

        let user_messages: Vec<&ChatMessage> = history.iter().filter(|m| m.role == Role::User).collect();
        let window = &user_messages[user_messages.len().saturating_sub(WINDOW_SIZE)..];

        if window.is_empty() {
            return ContextMatch {
                is_follow_up: true,
                ..ContextMatch::none()
            };
        }

        // newest message gets the heaviest weight
        let offset = WINDOW_SIZE - window.len();
        let mut topic_scores: Vec<(String, f64)> = Vec::new();
        for (idx, message) in window.iter().enumerate() {
            let topic = extract_topic(&message.content);
            if topic.chars().count() <= 3 {
                continue;
            }
            let weight = WEIGHTS[offset + idx];
            match topic_scores.iter_mut().find(|(t, _)| *t == topic) {
                Some((_, score)) => *score += weight,
                None => topic_scores.push((topic, weight)),
            }
        }

        let mut best: Option<&(String, f64)> = None;
        for candidate in &topic_scores {
            if best.map_or(true, |(_, score)| candidate.1 >= *score) {
                best = Some(candidate);
            }
        }

        let Some((previous_topic, confidence)) = best.cloned() else {
            return ContextMatch {
                is_follow_up: true,
                ..ContextMatch::none()
            };
        };

        let previous_entry = locate_topic_entry(&previous_topic, entries).cloned();

        let mut related_entries: Vec<HelpEntry> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        if let Some(prev) = &previous_entry {
            for entry in entries.iter().filter(|e| prev.related_actions.contains(&e.id)) {
                if seen.insert(entry.id.clone()) {
                    related_entries.push(entry.clone());
                }
            }
        }

        for entry in entries {
            let text = entry_text(entry);
            if topic_scores.iter().any(|(topic, _)| text.contains(topic.as_str())) && seen.insert(entry.id.clone()) {
                related_entries.push(entry.clone());
            }
        }

        log::debug!(
            "Follow-up on '{}' ({} related entries)",
            previous_topic,
            related_entries.len()
        );

        let context_prefix = Some(format!(
            "Relacionado con \"{}\" (confianza: {}%)\n\n",
            previous_topic,
            (confidence * 100.0).round() as i64
        ));

        ContextMatch {
            is_follow_up: true,
            previous_topic: Some(previous_topic),
            previous_entry,
            related_entries,
            context_prefix,
        }
    }

    /// Pick entries using conversation context before falling back to plain search
    pub fn context_aware_search(
        &self,
        query: &str,
        entries: &[HelpEntry],
        history: &[ChatMessage],
    ) -> ContextSearch {
        let context = self.analyze(query, history, entries);

        if context.is_follow_up && !context.related_entries.is_empty() {
            return ContextSearch {
                entries: context.related_entries.clone(),
                context,
                strategy: SearchStrategy::FollowUp,
            };
        }

        if let Some(topic) = &context.previous_topic {
            let keywords: Vec<&str> = topic.split_whitespace().filter(|w| w.len() > 3).collect();

            let mut boosted: Vec<(&HelpEntry, f64)> = entries
                .iter()
                .map(|entry| {
                    let text = normalize_text(&format!("{} {}", entry.question, entry.answer));
                    let boost = keywords
                        .iter()
                        .filter(|k| text.contains(*k))
                        .count() as f64
                        * TOPIC_KEYWORD_BOOST;
                    (entry, boost)
                })
                .filter(|(_, boost)| *boost > 0.0)
                .collect();
            boosted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            if !boosted.is_empty() {
                return ContextSearch {
                    entries: boosted.into_iter().take(MAX_BOOSTED).map(|(e, _)| e.clone()).collect(),
                    context,
                    strategy: SearchStrategy::ContextAware,
                };
            }
        }

        ContextSearch {
            entries: Vec::new(),
            context,
            strategy: SearchStrategy::Standard,
        }
    }
}

/// Questions asked so far and the topics they covered
pub fn conversation_summary(history: &[ChatMessage]) -> ConversationSummary {
    let user_messages: Vec<&ChatMessage> = history.iter().filter(|m| m.role == Role::User).collect();
    let topics: Vec<String> = user_messages
        .iter()
        .map(|m| extract_topic(&m.content))
        .filter(|t| t.chars().count() > 3)
        .collect();

    let mut unique: Vec<String> = Vec::new();
    for topic in &topics {
        if !unique.contains(topic) {
            unique.push(topic.clone());
        }
    }
    let skip = unique.len().saturating_sub(5);

    ConversationSummary {
        total_questions: user_messages.len(),
        topics_discussed: unique.into_iter().skip(skip).collect(),
        last_topic: topics.last().cloned(),
    }
}

/// Prefix the answer with context and list other related questions
pub fn format_context_aware_response(
    answer: &str,
    steps: &[HelpStep],
    context: &ContextMatch,
) -> (String, Vec<HelpStep>) {
    let mut final_answer = match &context.context_prefix {
        Some(prefix) => format!("{}{}", prefix, answer),
        None => answer.to_string(),
    };

    if context.is_follow_up && context.related_entries.len() > 1 {
        let others: Vec<String> = context
            .related_entries
            .iter()
            .take(3)
            .map(|e| format!("- {}", e.question))
            .collect();
        final_answer.push_str(&format!("\n\nTambién podrías necesitar:\n{}", others.join("\n")));
    }

    (final_answer, steps.to_vec())
}
