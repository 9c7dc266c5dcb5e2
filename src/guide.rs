//! Progressive step-by-step guides

use crate::types::{HelpEntry, HelpStep};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// Average seconds per completed step above which a guide counts as stalled
pub const STUCK_SECONDS_PER_STEP: u64 = 300;

const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideState {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Completed,
    Skipped,
}

/// Progress through one guided entry. Steps are numbered from 1.
/// Lives in memory only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideProgress {
    pub entry_id: String,
    pub current_step: usize,
    pub total_steps: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_steps: BTreeSet<usize>,
    pub skipped_steps: BTreeSet<usize>,
    /// Seconds
    pub time_spent: u64,
}

impl GuideProgress {
    pub fn new(entry_id: &str, total_steps: usize) -> Self {
        Self {
            entry_id: entry_id.to_string(),
            current_step: 0,
            total_steps,
            started_at: None,
            completed_steps: BTreeSet::new(),
            skipped_steps: BTreeSet::new(),
            time_spent: 0,
        }
    }

    pub fn for_entry(entry: &HelpEntry) -> Self {
        Self::new(&entry.id, entry.steps.len())
    }

    pub fn start(&mut self) {
        self.start_at(Utc::now());
    }

    pub fn start_at(&mut self, now: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
            self.current_step = if self.total_steps > 0 { 1 } else { 0 };
        }
    }

    fn in_range(&self, step: usize) -> bool {
        (1..=self.total_steps).contains(&step)
    }

    /// First unresolved step after `step`, else the last step
    fn advance_from(&mut self, step: usize) {
        let next = (step + 1..=self.total_steps)
            .find(|n| self.step_status(*n) == StepStatus::Pending);
        self.current_step = next.unwrap_or(self.total_steps);
    }

    pub fn complete_step(&mut self, step: usize) -> bool {
        if !self.in_range(step) {
            return false;
        }
        self.start();
        self.skipped_steps.remove(&step);
        self.completed_steps.insert(step);
        self.advance_from(step);
        true
    }

    /// Completed steps cannot be skipped
    pub fn skip_step(&mut self, step: usize) -> bool {
        if !self.in_range(step) || self.completed_steps.contains(&step) {
            return false;
        }
        self.start();
        self.skipped_steps.insert(step);
        self.advance_from(step);
        true
    }

    pub fn go_to(&mut self, step: usize) -> bool {
        if !self.in_range(step) {
            return false;
        }
        self.start();
        self.current_step = step;
        true
    }

    pub fn add_time(&mut self, seconds: u64) {
        self.time_spent += seconds;
    }

    pub fn state(&self) -> GuideState {
        if self.started_at.is_none() {
            GuideState::NotStarted
        } else if self.is_complete() {
            GuideState::Completed
        } else {
            GuideState::InProgress
        }
    }

    pub fn step_status(&self, step: usize) -> StepStatus {
        if self.completed_steps.contains(&step) {
            StepStatus::Completed
        } else if self.skipped_steps.contains(&step) {
            StepStatus::Skipped
        } else {
            StepStatus::Pending
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_steps.len() == self.total_steps
    }

    pub fn remaining(&self) -> usize {
        self.total_steps.saturating_sub(self.completed_steps.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A raw step decorated for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressiveStep {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub step_number: usize,
    pub total_steps: usize,
    pub completed: bool,
    pub is_current_step: bool,
    pub estimated_time: &'static str,
    pub difficulty: Difficulty,
    pub tips: Vec<String>,
    pub common_errors: Vec<String>,
    pub next_step_preview: Option<String>,
}

fn estimate_time(text: &str) -> &'static str {
    match text.chars().count() {
        0..=99 => "30 seg",
        100..=199 => "1 min",
        _ => "2 min",
    }
}

fn difficulty(text: &str) -> Difficulty {
    let lower = text.to_lowercase();
    if text.contains("API") || lower.contains("código") || lower.contains("comando") {
        Difficulty::Hard
    } else if lower.contains("configura") || lower.contains("ajusta") {
        Difficulty::Medium
    } else {
        Difficulty::Easy
    }
}

fn preview(text: &str) -> String {
    let head: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("Siguiente: {}...", head)
}

pub fn enrich_steps(entry: &HelpEntry, progress: Option<&GuideProgress>) -> Vec<ProgressiveStep> {
    let total = entry.steps.len();

    entry
        .steps
        .iter()
        .enumerate()
        .map(|(idx, step)| {
            let number = idx + 1;
            let lower = step.text.to_lowercase();

            let mut tips = Vec::new();
            if lower.contains("busca") {
                tips.push("Puedes usar el buscador con Ctrl+F".to_string());
            }
            if lower.contains("haz clic") {
                tips.push("También puedes usar atajos de teclado".to_string());
            }
            if lower.contains("selecciona") {
                tips.push("Usa las flechas del teclado para navegar".to_string());
            }

            let mut common_errors = Vec::new();
            if lower.contains("guardar") {
                common_errors.push("No olvides guardar antes de salir".to_string());
            }
            if lower.contains("confirma") {
                common_errors.push("Revisa todos los datos antes de confirmar".to_string());
            }

            ProgressiveStep {
                text: step.text.clone(),
                image: step.image.clone(),
                step_number: number,
                total_steps: total,
                completed: progress.is_some_and(|p| p.completed_steps.contains(&number)),
                is_current_step: progress.is_some_and(|p| p.current_step == number),
                estimated_time: estimate_time(&step.text),
                difficulty: difficulty(&step.text),
                tips,
                common_errors,
                next_step_preview: entry.steps.get(idx + 1).map(|next| preview(&next.text)),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepContext {
    pub title: String,
    pub motivation: String,
    pub related_questions: Vec<String>,
}

fn motivation(current: usize, total: usize) -> &'static str {
    let progress = current as f64 / total.max(1) as f64;

    if current == 1 {
        "¡Excelente! Comencemos paso a paso."
    } else if progress < 0.3 {
        "Vas muy bien, sigue así."
    } else if progress < 0.6 {
        "Ya estás a mitad de camino, ¡ánimo!"
    } else if progress < 0.9 {
        "Casi terminas, solo quedan algunos pasos."
    } else if current == total {
        "¡Último paso! Ya casi lo logras."
    } else {
        "Continúa con el siguiente paso."
    }
}

pub fn step_context(step: &ProgressiveStep) -> StepContext {
    let related: &[&str] = if step.step_number == 1 {
        &["¿Qué hago si no encuentro el botón?", "¿Puedo hacer esto más rápido?"]
    } else if step.step_number == step.total_steps {
        &["¿Cómo verifico que funcionó?", "¿Qué hago si algo salió mal?"]
    } else {
        &["¿Puedo saltar este paso?", "¿Qué pasa si cometo un error?"]
    };

    StepContext {
        title: format!("Paso {} de {}", step.step_number, step.total_steps),
        motivation: motivation(step.step_number, step.total_steps).to_string(),
        related_questions: related.iter().map(|q| q.to_string()).collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckCause {
    SlowProgress,
    TooManySkipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stuckness {
    pub cause: StuckCause,
    pub reason: &'static str,
    pub suggestion: &'static str,
}

/// `None` unless the guide looks stalled
pub fn detect_stuckness(progress: &GuideProgress) -> Option<Stuckness> {
    let per_step = progress.time_spent as f64 / progress.completed_steps.len().max(1) as f64;

    if per_step > STUCK_SECONDS_PER_STEP as f64 {
        return Some(Stuckness {
            cause: StuckCause::SlowProgress,
            reason: "Estás tardando más de lo esperado en este paso",
            suggestion: "¿Necesitas ayuda adicional? Puedo mostrarte un video o conectarte con soporte.",
        });
    }

    // strictly more than half
    if progress.skipped_steps.len() * 2 > progress.total_steps {
        return Some(Stuckness {
            cause: StuckCause::TooManySkipped,
            reason: "Has saltado varios pasos",
            suggestion: "Algunos pasos son opcionales, pero otros son necesarios. ¿Quieres revisar cuáles son importantes?",
        });
    }

    None
}

pub fn progress_summary(progress: &GuideProgress) -> String {
    let completed = progress.completed_steps.len();
    let total = progress.total_steps;
    let percentage = if total == 0 {
        0
    } else {
        ((completed as f64 / total as f64) * 100.0).round() as u32
    };
    let minutes = (progress.time_spent as f64 / 60.0).round() as u64;

    let mut summary = format!("Has completado {} de {} pasos ({}%).", completed, total, percentage);

    if minutes > 0 {
        let unit = if minutes == 1 { "minuto" } else { "minutos" };
        summary.push_str(&format!(" Llevas {} {}.", minutes, unit));
    }

    if percentage >= 100 {
        summary.push_str(" ¡Felicidades, has terminado!");
    } else if percentage >= 75 {
        summary.push_str(" ¡Ya casi terminas!");
    } else if percentage >= 50 {
        summary.push_str(" Vas por la mitad.");
    }

    summary
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NextActionKind {
    Continue,
    Restart,
    Related,
    Support,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextAction {
    pub kind: NextActionKind,
    pub message: String,
    pub related_entry: Option<HelpEntry>,
}

impl NextAction {
    fn new(kind: NextActionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            related_entry: None,
        }
    }
}

pub fn suggest_next_action(progress: &GuideProgress, entries: &[HelpEntry]) -> NextAction {
    if progress.is_complete() {
        let related = entries
            .iter()
            .find(|e| e.id == progress.entry_id)
            .and_then(|current| current.related_actions.first())
            .and_then(|related_id| entries.iter().find(|e| e.id == *related_id));

        return match related {
            Some(entry) => NextAction {
                kind: NextActionKind::Related,
                message: format!("¡Excelente trabajo! ¿Quieres aprender: \"{}\"?", entry.question),
                related_entry: Some(entry.clone()),
            },
            None => NextAction::new(
                NextActionKind::Continue,
                "¡Perfecto! ¿Hay algo más en lo que pueda ayudarte?",
            ),
        };
    }

    if let Some(stuck) = detect_stuckness(progress) {
        let kind = match stuck.cause {
            StuckCause::SlowProgress => NextActionKind::Support,
            StuckCause::TooManySkipped => NextActionKind::Restart,
        };
        return NextAction::new(kind, stuck.suggestion);
    }

    let remaining = progress.remaining();
    let message = if remaining == 1 {
        "Te queda 1 paso. ¿Continuamos?".to_string()
    } else {
        format!("Te quedan {} pasos. ¿Continuamos?", remaining)
    };
    NextAction::new(NextActionKind::Continue, message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

pub fn adapt_explanation(step: &HelpStep, level: UserLevel) -> String {
    match level {
        UserLevel::Beginner => format!(
            "{}\n\nTip: tómate tu tiempo y lee cada paso cuidadosamente.",
            step.text
        ),
        UserLevel::Intermediate => step.text.clone(),
        UserLevel::Advanced => {
            let first_sentence = step.text.split('.').next().unwrap_or_default();
            format!("{}. (Atajo disponible)", first_sentence)
        }
    }
}

pub fn generate_reminders(step: &ProgressiveStep) -> Vec<String> {
    let lower = step.text.to_lowercase();
    let mut reminders = Vec::new();

    if step.step_number == 1 {
        reminders.push("Asegúrate de tener los datos necesarios antes de comenzar".to_string());
    }
    if lower.contains("guardar") {
        reminders.push("No olvides guardar tus cambios".to_string());
    }
    if lower.contains("confirmar") {
        reminders.push("Revisa que toda la información sea correcta".to_string());
    }
    if lower.contains("eliminar") || lower.contains("borrar") {
        reminders.push("Esta acción no se puede deshacer".to_string());
    }

    reminders
}
