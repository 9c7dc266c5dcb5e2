use serde::{Deserialize, Serialize};

/// A single instruction in a guided entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpStep {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl HelpStep {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            image: None,
        }
    }
}

/// One question/answer unit of the knowledge store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpEntry {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub steps: Vec<HelpStep>,
    #[serde(default)]
    pub related_actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// Advisory only; filtering by role is the host's job
    #[serde(default)]
    pub roles: Vec<String>,
    /// Owning section id, stamped when the store is assembled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl HelpEntry {
    pub fn new(id: &str, question: &str, answer: &str) -> Self {
        Self {
            id: id.to_string(),
            question: question.to_string(),
            aliases: Vec::new(),
            keywords: Vec::new(),
            answer: answer.to_string(),
            steps: Vec::new(),
            related_actions: Vec::new(),
            route: None,
            roles: Vec::new(),
            section: None,
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_steps(mut self, steps: &[&str]) -> Self {
        self.steps = steps.iter().map(|s| HelpStep::new(s)).collect();
        self
    }

    pub fn with_related(mut self, related: &[&str]) -> Self {
        self.related_actions = related.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_route(mut self, route: &str) -> Self {
        self.route = Some(route.to_string());
        self
    }

    pub fn has_steps(&self) -> bool {
        !self.steps.is_empty()
    }
}

/// A group of entries shown together in one area of the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpSection {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub welcome_message: String,
    #[serde(default)]
    pub quick_actions: Vec<String>,
    #[serde(default)]
    pub entries: Vec<HelpEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Where an assistant answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Static,
}

/// A message in the in-memory conversation transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Unix milliseconds
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<MessageSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<HelpStep>,
    #[serde(default)]
    pub is_contextual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<bool>,
}

impl ChatMessage {
    pub fn user(id: &str, content: &str, timestamp: i64) -> Self {
        Self::new(id, Role::User, content, timestamp)
    }

    pub fn assistant(id: &str, content: &str, timestamp: i64) -> Self {
        Self::new(id, Role::Assistant, content, timestamp)
    }

    fn new(id: &str, role: Role, content: &str, timestamp: i64) -> Self {
        Self {
            id: id.to_string(),
            role,
            content: content.to_string(),
            timestamp,
            source: None,
            steps: Vec::new(),
            is_contextual: false,
            previous_topic: None,
            feedback: None,
        }
    }
}

/// How a search result was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Alias,
    Keyword,
    Fuzzy,
    Fallback,
}

/// Search result with confidence score
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub entry: HelpEntry,
    pub score: f64,
    pub match_type: MatchType,
}

/// Statistics about the offline cache
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries_count: usize,
    pub sections_count: usize,
    pub last_sync: Option<i64>,
    pub is_online: bool,
}

/// Current wall-clock time in Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
