//! Behavior telemetry: section visits, dwell time and asked questions

use crate::error::{HelpError, Result};
use crate::matcher::normalize_text;
use crate::storage::{load_json, save_json, ScalarStore};
use crate::types::now_ms;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

pub const BEHAVIOR_STORAGE_KEY: &str = "help-user-behavior";

/// Visits to one section that count as struggling
pub const STRUGGLE_THRESHOLD: u32 = 3;

/// Dwell time in one section that counts as struggling
pub const TIME_THRESHOLD_MS: i64 = 120_000;

pub const MAX_QUESTIONS: usize = 50;

const MAX_WRITE_ATTEMPTS: usize = 3;

/// Where elapsed time goes when the user enters a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DwellAccounting {
    /// Only the section being left
    #[default]
    Previous,
    /// Every other section ever entered (legacy stored data)
    All,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BehaviorSettings {
    pub struggle_visits: u32,
    pub struggle_time_ms: i64,
    pub dwell_accounting: DwellAccounting,
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            struggle_visits: STRUGGLE_THRESHOLD,
            struggle_time_ms: TIME_THRESHOLD_MS,
            dwell_accounting: DwellAccounting::Previous,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBehaviorData {
    #[serde(default)]
    pub section_visits: HashMap<String, u32>,
    /// Milliseconds
    #[serde(default)]
    pub section_time_spent: HashMap<String, i64>,
    /// Unix milliseconds of the last entry into each section
    #[serde(default)]
    pub last_section_entry: HashMap<String, i64>,
    #[serde(default)]
    pub questions_asked: VecDeque<String>,
    #[serde(default)]
    pub struggling_indicators: u32,
    /// Bumped on every write, checked before the next one
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_section: Option<String>,
}

impl UserBehaviorData {
    pub fn visits(&self, section: &str) -> u32 {
        self.section_visits.get(section).copied().unwrap_or(0)
    }

    pub fn time_spent(&self, section: &str) -> i64 {
        self.section_time_spent.get(section).copied().unwrap_or(0)
    }

    /// Section the user is currently in. Records written before
    /// `activeSection` existed fall back to the most recent entry.
    fn current_section(&self) -> Option<String> {
        self.active_section.clone().or_else(|| {
            self.last_section_entry
                .iter()
                .max_by_key(|(_, at)| **at)
                .map(|(section, _)| section.clone())
        })
    }

    fn accrue(&mut self, section: &str, now: i64) {
        if let Some(entered) = self.last_section_entry.get(section) {
            let elapsed = (now - entered).max(0);
            *self.section_time_spent.entry(section.to_string()).or_insert(0) += elapsed;
        }
    }

    pub fn record_visit(&mut self, section: &str, now: i64, settings: &BehaviorSettings) {
        *self.section_visits.entry(section.to_string()).or_insert(0) += 1;

        match settings.dwell_accounting {
            DwellAccounting::Previous => {
                if let Some(previous) = self.current_section() {
                    if previous != section {
                        self.accrue(&previous, now);
                    }
                }
            }
            DwellAccounting::All => {
                let others: Vec<String> = self
                    .last_section_entry
                    .keys()
                    .filter(|s| s.as_str() != section)
                    .cloned()
                    .collect();
                for other in others {
                    self.accrue(&other, now);
                }
            }
        }

        self.last_section_entry.insert(section.to_string(), now);
        self.active_section = Some(section.to_string());

        if self.visits(section) >= settings.struggle_visits {
            self.struggling_indicators += 1;
        }
    }

    pub fn record_question(&mut self, question: &str) {
        self.questions_asked.push_back(question.to_string());
        while self.questions_asked.len() > MAX_QUESTIONS {
            self.questions_asked.pop_front();
        }
    }

    pub fn is_struggling(&self, section: &str, settings: &BehaviorSettings) -> bool {
        self.visits(section) >= settings.struggle_visits
            || self.time_spent(section) > settings.struggle_time_ms
    }

    pub fn last_question(&self) -> Option<&str> {
        self.questions_asked.back().map(|q| q.as_str())
    }
}

/// Tracks behavior through the scalar store
pub struct BehaviorTracker {
    scalar: Arc<dyn ScalarStore>,
    settings: BehaviorSettings,
}

impl BehaviorTracker {
    pub fn new(scalar: Arc<dyn ScalarStore>) -> Self {
        Self::with_settings(scalar, BehaviorSettings::default())
    }

    pub fn with_settings(scalar: Arc<dyn ScalarStore>, settings: BehaviorSettings) -> Self {
        Self { scalar, settings }
    }

    pub fn settings(&self) -> &BehaviorSettings {
        &self.settings
    }

    /// Stored behavior, or defaults when absent or unreadable
    pub fn load(&self) -> UserBehaviorData {
        load_json(self.scalar.as_ref(), BEHAVIOR_STORAGE_KEY).unwrap_or_default()
    }

    /// Load, mutate and write back, retrying when another writer bumped
    /// the version in between
    fn update(&self, mut mutate: impl FnMut(&mut UserBehaviorData)) -> Result<UserBehaviorData> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut data = self.load();
            let base = data.version;

            mutate(&mut data);
            data.version = base + 1;

            let current = self.load().version;
            if current != base {
                debug!(
                    "Behavior record changed underneath (v{} -> v{}), attempt {}",
                    base, current, attempt
                );
                continue;
            }

            save_json(self.scalar.as_ref(), BEHAVIOR_STORAGE_KEY, &data)?;
            return Ok(data);
        }

        Err(HelpError::WriteConflict(format!(
            "behavior record still changing after {} attempts",
            MAX_WRITE_ATTEMPTS
        )))
    }

    pub fn track_section_visit(&self, section: &str) -> Result<UserBehaviorData> {
        self.track_section_visit_at(section, now_ms())
    }

    pub fn track_section_visit_at(&self, section: &str, now: i64) -> Result<UserBehaviorData> {
        let settings = self.settings;
        let data = self.update(|data| data.record_visit(section, now, &settings))?;
        if data.is_struggling(section, &settings) {
            debug!("User looks stuck in '{}' ({} visits)", section, data.visits(section));
        }
        Ok(data)
    }

    pub fn track_question_asked(&self, question: &str) -> Result<UserBehaviorData> {
        self.update(|data| data.record_question(question))
    }

    pub fn is_user_struggling(&self, section: &str) -> bool {
        self.load().is_struggling(section, &self.settings)
    }

    /// Normalized questions by frequency, most asked first
    pub fn most_common_questions(&self, limit: usize) -> Vec<(String, usize)> {
        let data = self.load();
        let mut counts: Vec<(String, usize)> = Vec::new();

        for question in &data.questions_asked {
            let normalized = normalize_text(question);
            match counts.iter_mut().find(|(q, _)| *q == normalized) {
                Some((_, count)) => *count += 1,
                None => counts.push((normalized, 1)),
            }
        }

        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(limit);
        counts
    }

    pub fn clear(&self) -> Result<()> {
        self.scalar.remove(BEHAVIOR_STORAGE_KEY)?;
        info!("Behavior data cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryScalarStore;
    use std::cell::Cell;

    fn tracker() -> (BehaviorTracker, MemoryScalarStore) {
        let scalar = MemoryScalarStore::new();
        (BehaviorTracker::new(Arc::new(scalar.clone())), scalar)
    }

    #[test]
    fn test_repeated_visits_signal_struggle() {
        let (tracker, _) = tracker();

        for i in 0..4 {
            tracker.track_section_visit_at("accounting", 1_000 * i).unwrap();
        }

        let data = tracker.load();
        assert_eq!(data.visits("accounting"), 4);
        assert!(data.struggling_indicators >= 1);
        assert!(tracker.is_user_struggling("accounting"));
    }

    #[test]
    fn test_struggle_not_before_threshold() {
        let (tracker, _) = tracker();
        tracker.track_section_visit_at("sales", 0).unwrap();
        tracker.track_section_visit_at("sales", 10).unwrap();
        assert!(!tracker.is_user_struggling("sales"));
        assert_eq!(tracker.load().struggling_indicators, 0);

        tracker.track_section_visit_at("sales", 20).unwrap();
        assert!(tracker.is_user_struggling("sales"));
        assert_eq!(tracker.load().struggling_indicators, 1);
    }

    #[test]
    fn test_dwell_time_threshold_is_exclusive() {
        let (tracker, _) = tracker();
        tracker.track_section_visit_at("inventory", 0).unwrap();
        tracker.track_section_visit_at("products", TIME_THRESHOLD_MS).unwrap();
        assert_eq!(tracker.load().time_spent("inventory"), TIME_THRESHOLD_MS);
        assert!(!tracker.is_user_struggling("inventory"));

        tracker.track_section_visit_at("inventory", TIME_THRESHOLD_MS + 10).unwrap();
        tracker.track_section_visit_at("products", TIME_THRESHOLD_MS + 11).unwrap();
        assert!(tracker.is_user_struggling("inventory"));
    }

    #[test]
    fn test_previous_accounting_only_charges_section_left() {
        let (tracker, _) = tracker();
        tracker.track_section_visit_at("a", 0).unwrap();
        tracker.track_section_visit_at("b", 1_000).unwrap();
        tracker.track_section_visit_at("c", 3_000).unwrap();

        let data = tracker.load();
        assert_eq!(data.time_spent("a"), 1_000);
        assert_eq!(data.time_spent("b"), 2_000);
        assert_eq!(data.time_spent("c"), 0);
        assert_eq!(data.active_section.as_deref(), Some("c"));
    }

    #[test]
    fn test_all_accounting_charges_every_other_section() {
        let scalar = MemoryScalarStore::new();
        let settings = BehaviorSettings {
            dwell_accounting: DwellAccounting::All,
            ..Default::default()
        };
        let tracker = BehaviorTracker::with_settings(Arc::new(scalar), settings);

        tracker.track_section_visit_at("a", 0).unwrap();
        tracker.track_section_visit_at("b", 1_000).unwrap();
        tracker.track_section_visit_at("c", 3_000).unwrap();

        let data = tracker.load();
        // "a" is charged on both later visits
        assert_eq!(data.time_spent("a"), 1_000 + 3_000);
        assert_eq!(data.time_spent("b"), 2_000);
    }

    #[test]
    fn test_legacy_record_without_active_section() {
        let (tracker, scalar) = tracker();
        scalar
            .set(
                BEHAVIOR_STORAGE_KEY,
                r#"{"sectionVisits":{"a":1,"b":1},"sectionTimeSpent":{},
                    "lastSectionEntry":{"a":0,"b":500},"questionsAsked":[],
                    "strugglingIndicators":0}"#,
            )
            .unwrap();

        tracker.track_section_visit_at("c", 1_500).unwrap();
        let data = tracker.load();
        assert_eq!(data.time_spent("b"), 1_000);
        assert_eq!(data.time_spent("a"), 0);
        assert_eq!(data.version, 1);
    }

    #[test]
    fn test_question_ring_buffer() {
        let (tracker, _) = tracker();
        for i in 0..(MAX_QUESTIONS + 5) {
            tracker.track_question_asked(&format!("pregunta {}", i)).unwrap();
        }

        let data = tracker.load();
        assert_eq!(data.questions_asked.len(), MAX_QUESTIONS);
        assert_eq!(data.questions_asked.front().unwrap(), "pregunta 5");
        assert_eq!(data.last_question(), Some("pregunta 54"));
    }

    #[test]
    fn test_roundtrip_through_store() {
        let (tracker, _) = tracker();
        tracker.track_section_visit_at("a", 0).unwrap();
        tracker.track_section_visit_at("b", 250).unwrap();
        tracker.track_section_visit_at("b", 300).unwrap();
        tracker.track_section_visit_at("b", 400).unwrap();
        let written = tracker.track_question_asked("como vendo").unwrap();

        let reloaded = tracker.load();
        assert_eq!(reloaded.section_visits, written.section_visits);
        assert_eq!(reloaded.section_time_spent, written.section_time_spent);
        assert_eq!(reloaded.last_section_entry, written.last_section_entry);
        assert_eq!(reloaded.questions_asked, written.questions_asked);
        assert_eq!(reloaded.struggling_indicators, written.struggling_indicators);
    }

    #[test]
    fn test_malformed_record_falls_back_to_defaults() {
        let (tracker, scalar) = tracker();
        scalar.set(BEHAVIOR_STORAGE_KEY, "[1, 2").unwrap();
        assert_eq!(tracker.load(), UserBehaviorData::default());

        tracker.track_question_asked("hola").unwrap();
        assert_eq!(tracker.load().questions_asked.len(), 1);
    }

    #[test]
    fn test_concurrent_write_is_retried() {
        let (tracker, scalar) = tracker();
        let other = BehaviorTracker::new(Arc::new(scalar));
        let interfered = Cell::new(false);

        let data = tracker
            .update(|data| {
                if !interfered.get() {
                    interfered.set(true);
                    other.track_question_asked("desde otra pestaña").unwrap();
                }
                data.record_question("mia");
            })
            .unwrap();

        assert_eq!(data.version, 2);
        assert_eq!(
            data.questions_asked,
            VecDeque::from(vec!["desde otra pestaña".to_string(), "mia".to_string()])
        );
    }

    #[test]
    fn test_write_conflict_after_retries() {
        let (tracker, scalar) = tracker();
        let other = BehaviorTracker::new(Arc::new(scalar));

        let err = tracker
            .update(|_| {
                other.track_question_asked("ruido").unwrap();
            })
            .unwrap_err();

        assert!(matches!(err, HelpError::WriteConflict(_)));
        assert_eq!(tracker.load().questions_asked.len(), MAX_WRITE_ATTEMPTS);
    }

    #[test]
    fn test_most_common_questions() {
        let (tracker, _) = tracker();
        for q in ["Como vendo?", "como vendo", "¿Cómo facturo?", "como vendo", "como facturo"] {
            tracker.track_question_asked(q).unwrap();
        }
        tracker.track_question_asked("stock").unwrap();

        let top = tracker.most_common_questions(2);
        assert_eq!(
            top,
            vec![("como vendo".to_string(), 3), ("como facturo".to_string(), 2)]
        );
    }

    #[test]
    fn test_clear() {
        let (tracker, _) = tracker();
        tracker.track_section_visit_at("a", 0).unwrap();
        tracker.clear().unwrap();
        assert_eq!(tracker.load(), UserBehaviorData::default());
    }
}
