//! Proactive help driven by behavior data

use crate::behavior::{BehaviorSettings, UserBehaviorData};
use crate::matcher::normalize_text;
use crate::types::{now_ms, HelpEntry};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sections that get a welcome tip on the first visit
pub const DEFAULT_COMPLEX_SECTIONS: &[&str] = &["accounting", "entries", "tenancy", "sales", "inventory"];

const RECENT_QUESTIONS: usize = 10;
const MAX_ALSO_ASKED: usize = 3;
const MAX_NEXT_STEPS: usize = 2;

/// Ordered entry ids describing the ideal path through a section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workflows(pub BTreeMap<String, Vec<String>>);

impl Workflows {
    pub fn get(&self, section: &str) -> Option<&[String]> {
        self.0.get(section).map(|w| w.as_slice())
    }

    pub fn insert(&mut self, section: &str, ids: &[&str]) {
        self.0
            .insert(section.to_string(), ids.iter().map(|id| id.to_string()).collect());
    }
}

impl Default for Workflows {
    fn default() -> Self {
        let mut workflows = Workflows(BTreeMap::new());
        workflows.insert(
            "products",
            &["products-create", "products-images", "products-specs", "products-price"],
        );
        workflows.insert(
            "sales",
            &["sales-create", "sales-payment", "sales-invoice", "sales-print"],
        );
        workflows.insert(
            "entries",
            &["entries-create", "entries-pdf", "entries-provider", "entries-draft"],
        );
        workflows.insert(
            "inventory",
            &["inventory-view", "inventory-filter", "inventory-alert", "inventory-transfer"],
        );
        workflows.insert(
            "accounting",
            &[
                "accounting-create-entry",
                "accounting-journal",
                "accounting-ledger",
                "accounting-trial-balance",
            ],
        );
        workflows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionReason {
    Struggle,
    Time,
    Common,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProactiveSuggestion {
    pub suggestion: String,
    pub entry: Option<HelpEntry>,
    pub reason: SuggestionReason,
}

pub struct ProactiveSuggester {
    settings: BehaviorSettings,
    complex_sections: Vec<String>,
    workflows: Workflows,
}

impl Default for ProactiveSuggester {
    fn default() -> Self {
        Self::new(
            BehaviorSettings::default(),
            DEFAULT_COMPLEX_SECTIONS.iter().map(|s| s.to_string()).collect(),
            Workflows::default(),
        )
    }
}

/// Entries that belong to a section by stamp, route or keyword
fn section_entries<'a>(section: &str, entries: &'a [HelpEntry]) -> Vec<&'a HelpEntry> {
    entries
        .iter()
        .filter(|entry| {
            entry.section.as_deref() == Some(section)
                || entry.route.as_deref().is_some_and(|r| r.contains(section))
                || entry.keywords.iter().any(|k| k == section)
        })
        .collect()
}

impl ProactiveSuggester {
    pub fn new(settings: BehaviorSettings, complex_sections: Vec<String>, workflows: Workflows) -> Self {
        Self {
            settings,
            complex_sections,
            workflows,
        }
    }

    pub fn get_proactive_suggestion(
        &self,
        behavior: &UserBehaviorData,
        section: &str,
        entries: &[HelpEntry],
    ) -> Option<ProactiveSuggestion> {
        self.get_proactive_suggestion_at(behavior, section, entries, now_ms())
    }

    /// At most one suggestion: repeated visits, then long dwell, then a
    /// first visit to a complex section
    pub fn get_proactive_suggestion_at(
        &self,
        behavior: &UserBehaviorData,
        section: &str,
        entries: &[HelpEntry],
        now: i64,
    ) -> Option<ProactiveSuggestion> {
        let top_entry = section_entries(section, entries).first().map(|e| (*e).clone());
        let visits = behavior.visits(section);

        if visits >= self.settings.struggle_visits {
            if let Some(entry) = &top_entry {
                debug!("Proactive: struggle in '{}' after {} visits", section, visits);
                return Some(ProactiveSuggestion {
                    suggestion: format!(
                        "Veo que has visitado esta sección {} veces. ¿Necesitas ayuda con algo en particular?",
                        visits
                    ),
                    entry: Some(entry.clone()),
                    reason: SuggestionReason::Struggle,
                });
            }
        }

        let ongoing = match behavior.last_section_entry.get(section) {
            Some(entered) if behavior.active_section.as_deref().map_or(true, |a| a == section) => {
                now - entered
            }
            _ => 0,
        };
        let dwell = ongoing.max(behavior.time_spent(section));

        if dwell > self.settings.struggle_time_ms {
            if let Some(entry) = &top_entry {
                let minutes = dwell / 60_000;
                debug!("Proactive: {} min in '{}'", minutes, section);
                return Some(ProactiveSuggestion {
                    suggestion: format!(
                        "¿Necesitas ayuda? Llevas {} minutos en esta sección. Puedo ayudarte con lo que necesites.",
                        minutes
                    ),
                    entry: Some(entry.clone()),
                    reason: SuggestionReason::Time,
                });
            }
        }

        if visits <= 1 && self.complex_sections.iter().any(|s| s == section) {
            if let Some(entry) = &top_entry {
                return Some(ProactiveSuggestion {
                    suggestion: format!(
                        "¡Bienvenido a {}! Esta es una sección con varias funcionalidades. ¿Quieres que te muestre por dónde empezar?",
                        section_display_name(section)
                    ),
                    entry: Some(entry.clone()),
                    reason: SuggestionReason::Common,
                });
            }
        }

        None
    }

    /// Entries for questions that followed ones similar to the current
    /// question in the recent history
    pub fn get_people_also_asked(
        &self,
        behavior: &UserBehaviorData,
        current_question: &str,
        entries: &[HelpEntry],
    ) -> Vec<HelpEntry> {
        let current = normalize_text(current_question);
        if current.is_empty() {
            return Vec::new();
        }

        let recent: Vec<String> = behavior
            .questions_asked
            .iter()
            .skip(behavior.questions_asked.len().saturating_sub(RECENT_QUESTIONS))
            .map(|q| normalize_text(q))
            .collect();

        let followers = recent
            .windows(2)
            .filter(|pair| pair[0].contains(&current) || current.contains(&pair[0]))
            .map(|pair| &pair[1])
            .filter(|next| !next.is_empty() && **next != current);

        let mut related: Vec<HelpEntry> = Vec::new();
        for next in followers {
            let found = entries.iter().find(|entry| {
                normalize_text(&entry.question).contains(next.as_str())
                    || entry.aliases.iter().any(|a| normalize_text(a).contains(next.as_str()))
            });

            if let Some(entry) = found {
                if !related.iter().any(|r| r.id == entry.id) {
                    related.push(entry.clone());
                }
            }
            if related.len() == MAX_ALSO_ASKED {
                break;
            }
        }

        related
    }

    /// The next one or two workflow entries after the last answered
    /// entry, or the start of the workflow
    pub fn get_suggested_next_steps(
        &self,
        section: &str,
        last_entry_id: Option<&str>,
        entries: &[HelpEntry],
    ) -> Vec<HelpEntry> {
        let Some(workflow) = self.workflows.get(section) else {
            return Vec::new();
        };

        let position = last_entry_id.and_then(|last| workflow.iter().position(|id| id == last));

        let next_ids = match position {
            Some(idx) => workflow.iter().skip(idx + 1).take(MAX_NEXT_STEPS),
            None => workflow.iter().skip(0).take(MAX_NEXT_STEPS),
        };

        next_ids
            .filter_map(|id| entries.iter().find(|e| e.id == *id).cloned())
            .collect()
    }
}

pub fn proactive_tip_message(section: &str) -> &'static str {
    match section {
        "accounting" => "Tip: puedes importar asientos contables desde Excel. Pregúntame cómo.",
        "sales" => "Tip: usa F2 para agregar productos rápidamente en una venta.",
        "products" => "Tip: sube varias imágenes de producto para que tus clientes vean más detalles.",
        "inventory" => "Tip: configura alertas de stock bajo para que te avisen automáticamente.",
        "entries" => "Tip: puedes importar facturas PDF para crear ingresos automáticamente.",
        "quotes" => "Tip: las cotizaciones se pueden convertir en ventas con un solo clic.",
        "tenancy" => "Tip: cada organización puede tener su propio esquema de productos.",
        _ => "¿Necesitas ayuda con algo? Estoy aquí para asistirte.",
    }
}

/// Spanish display name, or the id itself when unknown
pub fn section_display_name(section: &str) -> &str {
    match section {
        "accounting" => "Contabilidad",
        "entries" => "Ingresos de Mercadería",
        "tenancy" => "Organizaciones",
        "sales" => "Ventas",
        "inventory" => "Inventario",
        "products" => "Productos",
        "users" => "Usuarios",
        "providers" => "Proveedores",
        "categories" => "Categorías",
        "stores" => "Tiendas",
        "quotes" => "Cotizaciones",
        "cashregister" => "Caja",
        "messages" => "Mensajes",
        "orders" => "Pedidos",
        "catalog" => "Catálogo",
        other => other,
    }
}
