//! The knowledge store: sections and entries supplied by the host.
//!
//! Immutable once assembled. Entries are stamped with their owning section
//! and exposed as one flattened list in declaration order, which is the
//! order the matcher uses to break score ties.

use crate::error::{HelpError, Result};
use crate::types::{HelpEntry, HelpSection};
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Route prefixes mapped to section ids. More specific prefixes first.
static ROUTE_SECTION_MAP: &[(&str, &str)] = &[
    ("/dashboard/accounting", "accounting"),
    ("/dashboard/inventory", "inventory"),
    ("/dashboard/products", "products"),
    ("/dashboard/brands", "brands"),
    ("/dashboard/sales", "sales"),
    ("/dashboard/entries", "entries"),
    ("/dashboard/categories", "categories"),
    ("/dashboard/providers", "providers"),
    ("/dashboard/users", "users"),
    ("/dashboard/super-users", "users"),
    ("/dashboard/history", "history"),
    ("/dashboard/tenancy", "tenancy"),
    ("/dashboard/companies", "tenancy"),
    ("/dashboard/stores", "stores"),
    ("/dashboard/exchange", "exchange"),
    ("/dashboard/catalog", "catalog"),
    ("/dashboard/cashregister", "cashregister"),
    ("/dashboard/quotes", "quotes"),
    ("/dashboard/messages", "messages"),
    ("/dashboard/orders", "orders"),
    ("/dashboard/options", "settings"),
    ("/store", "public-store"),
    ("/barcode", "barcode"),
    ("/dashboard", "overviews"),
];

pub const DEFAULT_SECTION: &str = "general";

/// Resolve an in-app path to the help section that covers it
pub fn resolve_section(pathname: &str) -> &'static str {
    ROUTE_SECTION_MAP
        .iter()
        .find(|(route, _)| pathname.starts_with(route))
        .map(|(_, section)| *section)
        .unwrap_or(DEFAULT_SECTION)
}

#[derive(Debug, Clone, Default)]
pub struct KnowledgeStore {
    sections: Vec<HelpSection>,
    entries: Vec<HelpEntry>,
    by_id: HashMap<String, usize>,
}

impl KnowledgeStore {
    /// Assemble a store, stamping section ids and rejecting duplicate entry ids
    pub fn from_sections(mut sections: Vec<HelpSection>) -> Result<Self> {
        let mut entries = Vec::new();
        let mut by_id = HashMap::new();

        for section in &mut sections {
            for entry in &mut section.entries {
                entry.section = Some(section.id.clone());

                if by_id.insert(entry.id.clone(), entries.len()).is_some() {
                    return Err(HelpError::InvalidKnowledge(format!(
                        "duplicate entry id: {}",
                        entry.id
                    )));
                }
                entries.push(entry.clone());
            }
        }

        let dangling: Vec<&str> = entries
            .iter()
            .flat_map(|e| e.related_actions.iter())
            .filter(|id| !by_id.contains_key(id.as_str()))
            .map(|id| id.as_str())
            .collect();
        if !dangling.is_empty() {
            log::debug!("{} dangling related action(s): {}", dangling.len(), dangling.join(", "));
        }

        Ok(Self {
            sections,
            entries,
            by_id,
        })
    }

    /// Load from a file holding a list of sections, or a directory with one
    /// section per file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HelpError::NotFound(format!(
                "knowledge path does not exist: {}",
                path.display()
            )));
        }

        let sections = if path.is_dir() {
            load_section_dir(path)?
        } else {
            load_section_file(path)?
        };

        log::info!(
            "Loaded {} help sections from {}",
            sections.len(),
            path.display()
        );
        Self::from_sections(sections)
    }

    pub fn sections(&self) -> &[HelpSection] {
        &self.sections
    }

    /// All entries in declaration order
    pub fn entries(&self) -> &[HelpEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &str) -> Option<&HelpEntry> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }

    pub fn section(&self, id: &str) -> Option<&HelpSection> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn entries_in_section(&self, section: &str) -> Vec<&HelpEntry> {
        self.entries
            .iter()
            .filter(|e| e.section.as_deref() == Some(section))
            .collect()
    }

    /// Quick-action entries of a section, skipping ids that don't resolve
    pub fn quick_actions(&self, section: &str) -> Vec<&HelpEntry> {
        self.section(section)
            .map(|s| {
                s.quick_actions
                    .iter()
                    .filter_map(|id| self.entry(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Content hash used to skip re-caching unchanged data
    pub fn fingerprint(&self) -> String {
        let content = serde_json::to_vec(&self.sections).unwrap_or_default();
        let mut hasher = Md5::new();
        hasher.update(&content);
        let digest = hasher.finalize();
        format!("{:032x}", u128::from_be_bytes(digest.into()))
    }
}

/// Something that can produce a fresh knowledge store for resyncing
pub trait KnowledgeSource {
    fn fetch(&self) -> Result<KnowledgeStore>;
}

/// Knowledge read from a file or directory on disk
pub struct FileKnowledgeSource {
    path: PathBuf,
}

impl FileKnowledgeSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl KnowledgeSource for FileKnowledgeSource {
    fn fetch(&self) -> Result<KnowledgeStore> {
        KnowledgeStore::load(&self.path)
    }
}

impl KnowledgeSource for KnowledgeStore {
    fn fetch(&self) -> Result<KnowledgeStore> {
        Ok(self.clone())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().map_or(false, |e| e == "json")
}

fn is_section_file(path: &Path) -> bool {
    path.extension()
        .map_or(false, |e| e == "json" || e == "yaml" || e == "yml")
}

fn load_section_file(path: &Path) -> Result<Vec<HelpSection>> {
    let content = fs::read_to_string(path)?;

    if is_json(path) {
        if let Ok(sections) = serde_json::from_str::<Vec<HelpSection>>(&content) {
            return Ok(sections);
        }
        let section: HelpSection = serde_json::from_str(&content)?;
        Ok(vec![section])
    } else {
        if let Ok(sections) = serde_yaml::from_str::<Vec<HelpSection>>(&content) {
            return Ok(sections);
        }
        let section: HelpSection = serde_yaml::from_str(&content)?;
        Ok(vec![section])
    }
}

fn load_section_dir(dir: &Path) -> Result<Vec<HelpSection>> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_section_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();

    let mut sections = Vec::new();
    for file in files {
        sections.extend(load_section_file(&file)?);
    }
    Ok(sections)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_sections() -> Vec<HelpSection> {
        vec![
            HelpSection {
                id: "products".to_string(),
                label: "Productos".to_string(),
                description: "Gestion de productos".to_string(),
                welcome_message: "Estas en Productos.".to_string(),
                quick_actions: vec!["products-create".to_string(), "missing".to_string()],
                entries: vec![
                    HelpEntry::new(
                        "products-create",
                        "Como creo un nuevo producto?",
                        "Ve a Productos y pulsa Nuevo.",
                    )
                    .with_aliases(&["agregar producto", "nuevo producto", "ayudame"])
                    .with_keywords(&["producto", "crear", "nuevo"])
                    .with_steps(&[
                        "Haz clic en Nuevo producto",
                        "Completa el nombre y el precio",
                        "Pulsa guardar",
                    ])
                    .with_related(&["products-images", "products-price"])
                    .with_route("/dashboard/products/new"),
                    HelpEntry::new(
                        "products-images",
                        "Como subo imagenes de un producto?",
                        "Abre el producto y arrastra las imagenes.",
                    )
                    .with_aliases(&["fotos del producto"])
                    .with_keywords(&["imagen", "foto", "producto"])
                    .with_route("/dashboard/products"),
                    HelpEntry::new(
                        "products-price",
                        "Como cambio el precio de un producto?",
                        "Edita el producto y ajusta el precio.",
                    )
                    .with_keywords(&["precio", "producto"]),
                ],
            },
            HelpSection {
                id: "accounting".to_string(),
                label: "Contabilidad".to_string(),
                description: String::new(),
                welcome_message: String::new(),
                quick_actions: vec![],
                entries: vec![HelpEntry::new(
                    "accounting-create-entry",
                    "Como registro un asiento contable?",
                    "Usa el boton Nuevo asiento.",
                )
                .with_keywords(&["asiento", "contabilidad", "accounting"])
                .with_route("/dashboard/accounting/entries")],
            },
        ]
    }

    pub(crate) fn sample_store() -> KnowledgeStore {
        KnowledgeStore::from_sections(sample_sections()).unwrap()
    }

    #[test]
    fn test_entries_are_stamped_with_section() {
        let store = sample_store();
        assert_eq!(store.entries().len(), 4);
        assert_eq!(
            store.entry("products-images").unwrap().section.as_deref(),
            Some("products")
        );
        assert_eq!(store.entries_in_section("accounting").len(), 1);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut sections = sample_sections();
        let dup = sections[0].entries[0].clone();
        sections[1].entries.push(dup);

        let err = KnowledgeStore::from_sections(sections).unwrap_err();
        assert!(matches!(err, HelpError::InvalidKnowledge(_)));
    }

    #[test]
    fn test_quick_actions_skip_unknown_ids() {
        let store = sample_store();
        let actions = store.quick_actions("products");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].id, "products-create");
    }

    #[test]
    fn test_resolve_section() {
        assert_eq!(resolve_section("/dashboard/accounting/entries"), "accounting");
        assert_eq!(resolve_section("/dashboard/sales/new"), "sales");
        assert_eq!(resolve_section("/dashboard"), "overviews");
        assert_eq!(resolve_section("/somewhere"), "general");
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = sample_store();
        let b = sample_store();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 32);

        let mut sections = sample_sections();
        sections[0].entries[0].answer = "Otra respuesta".to_string();
        let c = KnowledgeStore::from_sections(sections).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_load_directory_of_sections() {
        let dir = tempfile::tempdir().unwrap();
        let sections = sample_sections();

        fs::write(
            dir.path().join("b_accounting.yaml"),
            serde_yaml::to_string(&sections[1]).unwrap(),
        )
        .unwrap();
        fs::write(
            dir.path().join("a_products.json"),
            serde_json::to_string(&sections[0]).unwrap(),
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = KnowledgeStore::load(dir.path()).unwrap();
        assert_eq!(store.sections().len(), 2);
        assert_eq!(store.sections()[0].id, "products");
        assert_eq!(store.entries()[0].id, "products-create");
    }

    #[test]
    fn test_load_single_file_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("help.json");
        fs::write(&path, serde_json::to_string(&sample_sections()).unwrap()).unwrap();

        let store = FileKnowledgeSource::new(path).fetch().unwrap();
        assert_eq!(store.entries().len(), 4);
    }
}
