use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub portal_url: String,
    pub roster_path: String,
    pub first_name_column: String,
    pub last_name_column: String,
    pub download_root: String,
    /// Upper bound for every element wait, in milliseconds.
    pub timeout_ms: u64,
    pub log_level: String,
    pub headless: bool,
    pub documents: DocumentToggles,
    pub timing: TimingConfig,
    pub selectors: PortalSelectors,
    pub conversion: ConversionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portal_url: "https://upitt-gradcas.admissionsbyliaison.com/".to_string(),
            roster_path: "applicants.csv".to_string(),
            first_name_column: "First Name".to_string(),
            last_name_column: "Last Name".to_string(),
            download_root: "gradcas_downloads".to_string(),
            timeout_ms: 20_000,
            log_level: "info".to_string(),
            headless: false,
            documents: DocumentToggles::default(),
            timing: TimingConfig::default(),
            selectors: PortalSelectors::default(),
            conversion: ConversionConfig::default(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timeout_ms == 0 {
            anyhow::bail!("timeout_ms must be greater than zero");
        }
        if self.timing.poll_interval_ms == 0 {
            anyhow::bail!("timing.poll_interval_ms must be greater than zero");
        }
        if self.first_name_column.trim().is_empty() || self.last_name_column.trim().is_empty() {
            anyhow::bail!("first_name_column and last_name_column must be set");
        }
        if self.documents.recommendations && self.selectors.recommender_containers.is_empty() {
            anyhow::bail!(
                "selectors.recommender_containers is empty but recommendations are enabled"
            );
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn download_root(&self) -> PathBuf {
        PathBuf::from(&self.download_root)
    }
}

/// Independent on/off switches for each document kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DocumentToggles {
    pub application: bool,
    pub cv: bool,
    pub personal_statement: bool,
    pub recommendations: bool,
}

impl Default for DocumentToggles {
    fn default() -> Self {
        Self {
            application: true,
            cv: true,
            personal_statement: true,
            recommendations: true,
        }
    }
}

impl DocumentToggles {
    pub fn is_enabled(&self, kind: DocumentKind) -> bool {
        match kind {
            DocumentKind::Application => self.application,
            DocumentKind::Cv => self.cv,
            DocumentKind::PersonalStatement => self.personal_statement,
            DocumentKind::LetterOfRecommendation => self.recommendations,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_ms: u64,
    pub settle_ms: u64,
    pub row_click_timeout_ms: u64,
    pub search_reveal_ms: u64,
    pub results_settle_ms: u64,
    pub tab_settle_ms: u64,
    pub viewer_settle_ms: u64,
    pub download_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            settle_ms: 1_500,
            row_click_timeout_ms: 8_000,
            search_reveal_ms: 800,
            results_settle_ms: 2_500,
            tab_settle_ms: 2_000,
            viewer_settle_ms: 3_000,
            download_timeout_secs: 60,
        }
    }
}

/// A collapsible attachment panel: the label that toggles it and the
/// container the embedded viewer renders into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionSelector {
    pub label: String,
    pub container: String,
}

/// Vendor DOM details. These track the portal's markup and are expected to
/// need edits whenever the vendor ships a UI change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSelectors {
    pub people_icon: String,
    pub cancel_search: String,
    pub search_button: String,
    pub search_input: String,
    pub result_rows: String,
    pub row_cell: String,
    pub application_link: String,
    pub applications_label: String,
    pub attachments_tab: String,
    pub recommendations_tab: String,
    pub viewer: String,
    pub viewer_source_attribute: String,
    pub application_section: SectionSelector,
    pub cv_section: SectionSelector,
    pub personal_statement_section: SectionSelector,
    pub recommender_containers: Vec<String>,
    pub recommender_entry: String,
    pub recommender_name: String,
    pub recommender_toggle: String,
}

impl Default for PortalSelectors {
    fn default() -> Self {
        Self {
            people_icon: "i[data-name='people']".to_string(),
            cancel_search: "i.search-cancel, button[aria-label='Cancel search']".to_string(),
            search_button: "i.search-button".to_string(),
            search_input: "input[type='text'], input[type='search']".to_string(),
            result_rows: "tbody tr".to_string(),
            row_cell: "td".to_string(),
            application_link: "td a, tbody tr a".to_string(),
            applications_label: "Applications".to_string(),
            attachments_tab: "ATTACHMENTS".to_string(),
            recommendations_tab: "RECOMMENDATIONS".to_string(),
            viewer: "iframe".to_string(),
            viewer_source_attribute: "src".to_string(),
            application_section: SectionSelector {
                label: "APPLICATION PDF".to_string(),
                container: "[data-section='application-pdf']".to_string(),
            },
            cv_section: SectionSelector {
                label: "CV/RESUME".to_string(),
                container: "[data-section='cv-resume']".to_string(),
            },
            personal_statement_section: SectionSelector {
                label: "PERSONAL STATEMENT".to_string(),
                container: "[data-section='personal-statement']".to_string(),
            },
            recommender_containers: vec![
                "#recommendations-list".to_string(),
                "#evaluations-list".to_string(),
            ],
            recommender_entry: ".recommendation-item".to_string(),
            recommender_name: ".recommender-name".to_string(),
            recommender_toggle: ".recommendation-header".to_string(),
        }
    }
}

impl PortalSelectors {
    pub fn section(&self, kind: DocumentKind) -> Option<&SectionSelector> {
        match kind {
            DocumentKind::Application => Some(&self.application_section),
            DocumentKind::Cv => Some(&self.cv_section),
            DocumentKind::PersonalStatement => Some(&self.personal_statement_section),
            DocumentKind::LetterOfRecommendation => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Pages with fewer extracted characters than this are treated as scanned.
    pub ocr_threshold: usize,
    pub ocr_dpi: u32,
    pub ocr_language: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            ocr_threshold: 50,
            ocr_dpi: 144,
            ocr_language: "eng".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicantRecord {
    pub first: String,
    pub last: String,
}

impl ApplicantRecord {
    pub fn new(first: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            last: last.into(),
        }
    }

    /// Display identifier used in progress lines and the outcome report.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first, self.last)
    }

    pub fn folder_name(&self) -> String {
        format!("{}_{}", safe_name(&self.last), safe_name(&self.first))
    }
}

impl fmt::Display for ApplicantRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first, self.last)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Application,
    Cv,
    PersonalStatement,
    LetterOfRecommendation,
}

impl DocumentKind {
    /// Kinds fetched from the Attachments tab, in fetch order.
    pub const ATTACHMENTS: [DocumentKind; 3] = [
        DocumentKind::Application,
        DocumentKind::Cv,
        DocumentKind::PersonalStatement,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Application => "application",
            DocumentKind::Cv => "cv",
            DocumentKind::PersonalStatement => "personal_statement",
            DocumentKind::LetterOfRecommendation => "lor",
        }
    }
}

/// One file to produce for one applicant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTarget {
    pub kind: DocumentKind,
    /// File stem; for letters this carries the recommender's name.
    pub label: String,
    pub destination: PathBuf,
}

impl DocumentTarget {
    pub fn attachment(kind: DocumentKind, folder: &Path) -> Self {
        let label = kind.label().to_string();
        let destination = folder.join(format!("{label}.pdf"));
        Self {
            kind,
            label,
            destination,
        }
    }

    pub fn recommendation(recommender: &str, folder: &Path) -> Self {
        let label = format!("lor_{}", safe_name(recommender));
        let destination = folder.join(format!("{label}.pdf"));
        Self {
            kind: DocumentKind::LetterOfRecommendation,
            label,
            destination,
        }
    }

    /// A nonzero-size file at the destination counts as already fetched.
    pub fn is_complete(&self) -> bool {
        std::fs::metadata(&self.destination)
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false)
    }
}

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-]").expect("static pattern compiles"));

/// Replace every character outside word characters and hyphen with `_`.
pub fn safe_name(value: &str) -> String {
    UNSAFE_CHARS.replace_all(value, "_").into_owned()
}
