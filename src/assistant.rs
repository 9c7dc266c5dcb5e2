use crate::behavior::{BehaviorTracker, UserBehaviorData};
use crate::config::{find_help_path, HelpConfig, HELP_DIR};
use crate::context::{format_context_aware_response, ContextAnalyzer, SearchStrategy};
use crate::error::{HelpError, Result};
use crate::guide::{suggest_next_action, GuideProgress, NextAction};
use crate::knowledge::{KnowledgeSource, KnowledgeStore};
use crate::matcher::{search, search_in_section, suggest_related_queries};
use crate::offline::{ConnectivityEvent, OfflineCacheManager};
use crate::proactive::{ProactiveSuggester, ProactiveSuggestion};
use crate::storage::{FileScalarStore, ScalarStore};
use crate::types::{now_ms, ChatMessage, HelpEntry, HelpStep, MatchType, MessageSource, Role};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Score reported for answers picked from the previous turn's related entries
const FOLLOW_UP_SCORE: f64 = 0.9;

/// Score reported for answers picked by topic boosting
const CONTEXT_AWARE_SCORE: f64 = 0.75;

const MAX_ALTERNATIVES: usize = 3;

const NO_MATCH_MESSAGE: &str =
    "No encontré una respuesta para eso. ¿Puedes reformular la pregunta o darme más detalles?";

/// Everything the host needs to render one reply
#[derive(Debug, Clone)]
pub struct Answer {
    pub message_id: String,
    pub content: String,
    pub entry: Option<HelpEntry>,
    pub steps: Vec<HelpStep>,
    pub score: f64,
    pub match_type: Option<MatchType>,
    pub strategy: SearchStrategy,
    pub is_contextual: bool,
    pub previous_topic: Option<String>,
    pub alternatives: Vec<HelpEntry>,
    /// "Did you mean" phrasings when nothing matched
    pub suggestions: Vec<String>,
    pub proactive: Option<ProactiveSuggestion>,
    pub people_also_asked: Vec<HelpEntry>,
    pub next_steps: Vec<HelpEntry>,
    /// Answered from the offline cache
    pub offline: bool,
}

/// The main help interface: one chat session over the engine parts
pub struct Assistant {
    knowledge: Option<KnowledgeStore>,
    offline: OfflineCacheManager,
    behavior: BehaviorTracker,
    suggester: ProactiveSuggester,
    analyzer: ContextAnalyzer,
    threshold: f64,
    history: Vec<ChatMessage>,
    guide: Option<GuideProgress>,
    next_message: u64,
}

impl Assistant {
    pub fn new(offline: OfflineCacheManager, behavior: BehaviorTracker, suggester: ProactiveSuggester) -> Self {
        Self {
            knowledge: None,
            offline,
            behavior,
            suggester,
            analyzer: ContextAnalyzer::default(),
            threshold: crate::matcher::STATIC_CONFIDENCE_THRESHOLD,
            history: Vec::new(),
            guide: None,
            next_message: 0,
        }
    }

    pub fn with_knowledge(mut self, knowledge: KnowledgeStore) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Open the assistant for the nearest .helpdesk directory
    pub fn open() -> Result<Self> {
        let help_path = find_help_path()
            .ok_or_else(|| HelpError::NotFound("No .helpdesk directory found. Run 'helpdesk init' first.".to_string()))?;
        Self::open_at(help_path)
    }

    /// Open the assistant at a specific .helpdesk directory
    pub fn open_at(help_path: PathBuf) -> Result<Self> {
        if !help_path.exists() {
            return Err(HelpError::NotFound(format!("Path does not exist: {}", help_path.display())));
        }

        let config = HelpConfig::new(help_path.clone());
        let settings = config.settings().clone();

        let scalar: Arc<dyn ScalarStore> = Arc::new(FileScalarStore::new(help_path.join("state")));
        let offline = OfflineCacheManager::new(help_path.join("cache.db"), scalar.clone());
        let behavior = BehaviorTracker::with_settings(scalar, config.behavior_settings());
        let suggester = ProactiveSuggester::new(
            config.behavior_settings(),
            settings.complex_sections.clone(),
            settings.workflows.clone(),
        );

        let mut assistant = Self::new(offline, behavior, suggester).with_threshold(settings.confidence_threshold);

        match config.knowledge_path() {
            Some(path) => match KnowledgeStore::load(&path) {
                Ok(knowledge) => assistant.knowledge = Some(knowledge),
                Err(e) => warn!("Knowledge unavailable, using offline cache: {}", e),
            },
            None => debug!("No knowledge_path configured"),
        }

        Ok(assistant)
    }

    /// Create a new .helpdesk directory
    pub fn init(path: &Path) -> Result<Self> {
        let help_path = path.join(HELP_DIR);
        fs::create_dir_all(&help_path)?;
        Self::open_at(help_path)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn knowledge(&self) -> Option<&KnowledgeStore> {
        self.knowledge.as_ref()
    }

    pub fn offline(&mut self) -> &mut OfflineCacheManager {
        &mut self.offline
    }

    pub fn behavior(&self) -> &BehaviorTracker {
        &self.behavior
    }

    pub fn suggester(&self) -> &ProactiveSuggester {
        &self.suggester
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn guide(&self) -> Option<&GuideProgress> {
        self.guide.as_ref()
    }

    pub fn guide_mut(&mut self) -> Option<&mut GuideProgress> {
        self.guide.as_mut()
    }

    /// Entries to answer from: the live store when online, else the cache.
    /// The flag tells whether the cache was used.
    pub fn entries(&mut self) -> (Vec<HelpEntry>, bool) {
        match &self.knowledge {
            Some(knowledge) if self.offline.is_online() => (knowledge.entries().to_vec(), false),
            _ => (self.offline.get_entries(), true),
        }
    }

    // =========================================================================
    // Offline cache
    // =========================================================================

    /// Cache the live knowledge store for offline use
    pub fn preload(&mut self) -> Result<()> {
        let knowledge = self
            .knowledge
            .as_ref()
            .ok_or_else(|| HelpError::NotFound("No knowledge loaded".to_string()))?;
        self.offline.preload(knowledge);
        Ok(())
    }

    pub fn set_connectivity(&mut self, event: ConnectivityEvent) {
        let source = self.knowledge.as_ref().map(|k| k as &dyn KnowledgeSource);
        self.offline.handle_connectivity(event, source);
    }

    // =========================================================================
    // Conversation
    // =========================================================================

    fn push_message(&mut self, role: Role, content: &str) -> String {
        self.next_message += 1;
        let id = format!("msg-{}", self.next_message);
        let message = match role {
            Role::User => ChatMessage::user(&id, content, now_ms()),
            Role::Assistant => ChatMessage::assistant(&id, content, now_ms()),
        };
        self.history.push(message);
        id
    }

    /// Answer a question asked from `section`
    pub fn ask(&mut self, query: &str, section: Option<&str>) -> Answer {
        let (entries, offline) = self.entries();
        self.push_message(Role::User, query);

        let context_search = self.analyzer.context_aware_search(query, &entries, &self.history);
        let context = context_search.context;

        let mut alternatives = Vec::new();
        let (entry, score, match_type) = match context_search.strategy {
            SearchStrategy::FollowUp | SearchStrategy::ContextAware => {
                let score = if context_search.strategy == SearchStrategy::FollowUp {
                    FOLLOW_UP_SCORE
                } else {
                    CONTEXT_AWARE_SCORE
                };
                let mut picked = context_search.entries.into_iter();
                let entry = picked.next();
                alternatives.extend(picked.take(MAX_ALTERNATIVES));
                (entry, score, None)
            }
            SearchStrategy::Standard => {
                let results = match section {
                    Some(section) => search_in_section(query, &entries, self.threshold, section),
                    None => search(query, &entries, self.threshold),
                };
                let mut results = results.into_iter();
                match results.next() {
                    Some(top) => {
                        alternatives.extend(results.take(MAX_ALTERNATIVES).map(|r| r.entry));
                        (Some(top.entry), top.score, Some(top.match_type))
                    }
                    None => (None, 0.0, None),
                }
            }
        };
        debug!(
            "ask '{}': {:?} -> {:?} ({:.2})",
            query,
            context_search.strategy,
            entry.as_ref().map(|e| e.id.as_str()),
            score
        );

        if let Err(e) = self.behavior.track_question_asked(query) {
            warn!("Could not record question: {}", e);
        }
        let behavior = self.behavior.load();

        let (content, steps, suggestions) = match &entry {
            Some(entry) => {
                let (content, steps) = format_context_aware_response(&entry.answer, &entry.steps, &context);
                (content, steps, Vec::new())
            }
            None => (NO_MATCH_MESSAGE.to_string(), Vec::new(), suggest_related_queries(query, &entries)),
        };

        let (proactive, next_steps) = match section {
            Some(section) => (
                self.suggester.get_proactive_suggestion(&behavior, section, &entries),
                self.suggester
                    .get_suggested_next_steps(section, entry.as_ref().map(|e| e.id.as_str()), &entries),
            ),
            None => (None, Vec::new()),
        };

        let answered_id = entry.as_ref().map(|e| e.id.clone());
        let people_also_asked: Vec<HelpEntry> = self
            .suggester
            .get_people_also_asked(&behavior, query, &entries)
            .into_iter()
            .filter(|e| Some(&e.id) != answered_id.as_ref())
            .collect();

        if let Some(entry) = entry.as_ref().filter(|e| e.has_steps()) {
            let mut progress = GuideProgress::for_entry(entry);
            progress.start();
            self.guide = Some(progress);
        }

        let message_id = self.push_message(Role::Assistant, &content);
        if let Some(message) = self.history.last_mut() {
            message.source = entry.as_ref().map(|_| MessageSource::Static);
            message.steps = steps.clone();
            message.is_contextual = context.is_follow_up;
            message.previous_topic = context.previous_topic.clone();
        }

        Answer {
            message_id,
            content,
            entry,
            steps,
            score,
            match_type,
            strategy: context_search.strategy,
            is_contextual: context.is_follow_up,
            previous_topic: context.previous_topic,
            alternatives,
            suggestions,
            proactive,
            people_also_asked,
            next_steps,
            offline,
        }
    }

    /// Record whether an assistant message helped. The only mutation a
    /// message ever receives after creation.
    pub fn attach_feedback(&mut self, message_id: &str, helpful: bool) -> bool {
        match self
            .history
            .iter_mut()
            .find(|m| m.id == message_id && m.role == Role::Assistant)
        {
            Some(message) => {
                message.feedback = Some(helpful);
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Behavior
    // =========================================================================

    /// Record entering a section and return any proactive help for it
    pub fn visit_section(&mut self, section: &str) -> Option<ProactiveSuggestion> {
        if let Err(e) = self.behavior.track_section_visit(section) {
            warn!("Could not record visit to '{}': {}", section, e);
        }
        let behavior: UserBehaviorData = self.behavior.load();
        let (entries, _) = self.entries();
        self.suggester.get_proactive_suggestion(&behavior, section, &entries)
    }

    // =========================================================================
    // Guides
    // =========================================================================

    pub fn open_guide(&mut self, entry_id: &str) -> Result<&GuideProgress> {
        let (entries, _) = self.entries();
        let entry = entries
            .iter()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| HelpError::NotFound(format!("entry '{}'", entry_id)))?;

        if !entry.has_steps() {
            return Err(HelpError::NotFound(format!("entry '{}' has no steps", entry_id)));
        }

        let mut progress = GuideProgress::for_entry(entry);
        progress.start();
        Ok(self.guide.insert(progress))
    }

    pub fn close_guide(&mut self) -> Option<GuideProgress> {
        self.guide.take()
    }

    pub fn guide_entry(&mut self) -> Option<HelpEntry> {
        let id = self.guide.as_ref()?.entry_id.clone();
        let (entries, _) = self.entries();
        entries.into_iter().find(|e| e.id == id)
    }

    pub fn guide_next_action(&mut self) -> Option<NextAction> {
        let progress = self.guide.clone()?;
        let (entries, _) = self.entries();
        Some(suggest_next_action(&progress, &entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorSettings;
    use crate::guide::NextActionKind;
    use crate::proactive::Workflows;
    use crate::types::HelpSection;
    use crate::knowledge::tests::sample_store;
    use crate::storage::MemoryScalarStore;

    fn assistant() -> Assistant {
        let scalar: Arc<dyn ScalarStore> = Arc::new(MemoryScalarStore::new());
        Assistant::new(
            OfflineCacheManager::in_memory(scalar.clone()),
            BehaviorTracker::new(scalar),
            ProactiveSuggester::default(),
        )
        .with_knowledge(sample_store())
    }

    #[test]
    fn test_standard_answer_opens_guide() {
        let mut assistant = assistant();
        let answer = assistant.ask("como creo un producto", Some("products"));

        assert_eq!(answer.entry.as_ref().unwrap().id, "products-create");
        assert!(answer.score >= 0.6);
        assert_eq!(answer.strategy, SearchStrategy::Standard);
        assert_eq!(answer.steps.len(), 3);
        assert!(!answer.offline);
        assert_eq!(answer.next_steps[0].id, "products-images");

        assert_eq!(assistant.history().len(), 2);
        assert_eq!(assistant.history()[1].source, Some(MessageSource::Static));
        assert_eq!(assistant.guide().unwrap().entry_id, "products-create");
        assert_eq!(assistant.behavior().load().questions_asked.len(), 1);
    }

    #[test]
    fn test_next_steps_follow_answered_entry() {
        let section = HelpSection {
            id: "products".to_string(),
            label: "Productos".to_string(),
            description: String::new(),
            welcome_message: String::new(),
            quick_actions: Vec::new(),
            entries: vec![
                HelpEntry::new("products-composite", "Como creo un producto compuesto?", "x"),
                HelpEntry::new("products-create", "Como creo un producto?", "x"),
                HelpEntry::new("products-images", "Como subo imagenes?", "x"),
                HelpEntry::new("products-kits", "Como armo un kit?", "x"),
            ],
        };
        let mut workflows = Workflows::default();
        workflows.insert(
            "products",
            &["products-create", "products-images", "products-composite", "products-kits"],
        );
        let scalar: Arc<dyn ScalarStore> = Arc::new(MemoryScalarStore::new());
        let mut assistant = Assistant::new(
            OfflineCacheManager::in_memory(scalar.clone()),
            BehaviorTracker::new(scalar),
            ProactiveSuggester::new(BehaviorSettings::default(), Vec::new(), workflows),
        )
        .with_knowledge(KnowledgeStore::from_sections(vec![section]).unwrap());

        let answer = assistant.ask("Como creo un producto?", Some("products"));
        assert_eq!(answer.entry.as_ref().unwrap().id, "products-create");
        let ids: Vec<&str> = answer.next_steps.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["products-images", "products-composite"]);

        let answer = assistant.ask("Como creo un producto compuesto?", Some("products"));
        assert_eq!(answer.entry.as_ref().unwrap().id, "products-composite");
        let ids: Vec<&str> = answer.next_steps.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["products-kits"]);
    }

    #[test]
    fn test_follow_up_uses_previous_topic() {
        let mut assistant = assistant();
        assistant.ask("como creo un producto", None);
        let answer = assistant.ask("y eso cómo lo hago?", None);

        assert!(answer.is_contextual);
        assert_eq!(answer.strategy, SearchStrategy::FollowUp);
        assert_eq!(answer.entry.unwrap().id, "products-images");
        assert!(answer.content.starts_with("Relacionado con"));
        assert!(assistant.history()[3].is_contextual);
    }

    #[test]
    fn test_answers_from_cache_when_offline() {
        let mut assistant = assistant();
        assistant.preload().unwrap();
        assistant.set_connectivity(ConnectivityEvent::Offline);

        let answer = assistant.ask("como creo un producto", None);
        assert!(answer.offline);
        assert_eq!(answer.entry.unwrap().id, "products-create");
    }

    #[test]
    fn test_offline_without_cache_degrades() {
        let mut assistant = assistant();
        assistant.set_connectivity(ConnectivityEvent::Offline);

        let answer = assistant.ask("como creo un producto", None);
        assert!(answer.entry.is_none());
        assert_eq!(answer.content, NO_MATCH_MESSAGE);
    }

    #[test]
    fn test_no_match_offers_suggestions() {
        let mut assistant = assistant();
        let answer = assistant.ask("xyzzy plugh", None);

        assert!(answer.entry.is_none());
        assert!(answer.message_id.starts_with("msg-"));
        assert_eq!(assistant.history()[1].source, None);
    }

    #[test]
    fn test_feedback_only_on_assistant_messages() {
        let mut assistant = assistant();
        let answer = assistant.ask("como creo un producto", None);

        assert!(assistant.attach_feedback(&answer.message_id, true));
        assert_eq!(assistant.history()[1].feedback, Some(true));
        assert!(!assistant.attach_feedback("msg-1", false));
        assert!(!assistant.attach_feedback("missing", false));
    }

    #[test]
    fn test_visit_section_reports_struggle() {
        let mut assistant = assistant();
        for _ in 0..3 {
            assistant.visit_section("accounting");
        }
        let suggestion = assistant.visit_section("accounting").unwrap();
        assert!(suggestion.suggestion.contains("4 veces"));
        assert!(assistant.behavior().is_user_struggling("accounting"));
    }

    #[test]
    fn test_guide_flow() {
        let mut assistant = assistant();
        assert!(assistant.open_guide("products-price").is_err());
        assert!(assistant.open_guide("missing").is_err());

        assistant.open_guide("products-create").unwrap();
        for n in 1..=3 {
            assistant.guide_mut().unwrap().complete_step(n);
        }

        let action = assistant.guide_next_action().unwrap();
        assert_eq!(action.kind, NextActionKind::Related);
        assert_eq!(assistant.guide_entry().unwrap().id, "products-create");
        assert!(assistant.close_guide().is_some());
        assert!(assistant.guide_next_action().is_none());
    }
}
