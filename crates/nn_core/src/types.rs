use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::text::normalized;

/// Group id used by the backend for "no group".
pub const UNGROUPED: i64 = -1;

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A raw news item as fetched from one outlet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default = "new_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub link: String,
    #[serde(default, with = "pub_date")]
    pub pub_date: Option<DateTime<Utc>>,
    pub source_medium: Media,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub neutral_score: Option<i32>,
    #[serde(default)]
    pub group: Option<i64>,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category: Category,
        link: impl Into<String>,
        source_medium: Media,
    ) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            description: description.into(),
            category,
            image_url: None,
            link: link.into(),
            pub_date: None,
            source_medium,
            created_at: Utc::now(),
            neutral_score: None,
            group: None,
        }
    }

    /// The assigned group, if any. Negative ids are the ungrouped sentinel.
    pub fn group_id(&self) -> Option<i64> {
        self.group.filter(|g| *g >= 0)
    }

    pub fn is_grouped(&self) -> bool {
        self.group_id().is_some()
    }
}

/// Canonical summary of one cluster, written by the summarization step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeutralArticle {
    #[serde(default = "new_id")]
    pub id: String,
    pub neutral_title: String,
    pub neutral_description: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default, deserialize_with = "lenient_relevance")]
    pub relevance: Option<Relevance>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_media")]
    pub image_medium: Option<Media>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    pub group: i64,
}

impl NeutralArticle {
    pub fn new(
        neutral_title: impl Into<String>,
        neutral_description: impl Into<String>,
        category: Category,
        group: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            neutral_title: neutral_title.into(),
            neutral_description: neutral_description.into(),
            category,
            relevance: None,
            image_url: None,
            image_medium: None,
            date: None,
            created_at: now,
            updated_at: now,
            group,
        }
    }
}

/// One entry of the grouping service response, also used to persist local
/// clustering results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAssignment {
    pub id: String,
    pub group_number: Option<i64>,
}

/// Writes group numbers onto the articles with a matching id. Ids absent from
/// the assignments are left untouched. Returns how many articles changed.
pub fn merge_assignments(articles: &mut [Article], assignments: &[GroupAssignment]) -> usize {
    let by_id: HashMap<&str, Option<i64>> = assignments
        .iter()
        .map(|a| (a.id.as_str(), a.group_number))
        .collect();

    let mut changed = 0;
    for article in articles.iter_mut() {
        match by_id.get(article.id.as_str()) {
            Some(group) if article.group != *group => {
                article.group = *group;
                changed += 1;
            }
            _ => {}
        }
    }
    changed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    #[default]
    SinCategoria,
    Economia,
    Politica,
    Ciencia,
    Tecnologia,
    Cultura,
    Sociedad,
    Deportes,
    Internacional,
    Entretenimiento,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::SinCategoria,
        Category::Economia,
        Category::Politica,
        Category::Ciencia,
        Category::Tecnologia,
        Category::Cultura,
        Category::Sociedad,
        Category::Deportes,
        Category::Internacional,
        Category::Entretenimiento,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::SinCategoria => "Sin categoría",
            Category::Economia => "Economía",
            Category::Politica => "Política",
            Category::Ciencia => "Ciencia",
            Category::Tecnologia => "Tecnología",
            Category::Cultura => "Cultura",
            Category::Sociedad => "Sociedad",
            Category::Deportes => "Deportes",
            Category::Internacional => "Internacional",
            Category::Entretenimiento => "Entretenimiento",
        }
    }

    /// Resolves a free-text label, ignoring case, accents and punctuation.
    pub fn from_label(label: &str) -> Option<Category> {
        let wanted = normalized(label);
        Category::ALL
            .into_iter()
            .find(|category| normalized(category.label()) == wanted)
    }

    /// The first label that names a known category, or "Sin categoría".
    pub fn resolve<'a>(labels: impl IntoIterator<Item = &'a str>) -> Category {
        labels
            .into_iter()
            .find_map(Category::from_label)
            .unwrap_or_default()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Category::from_label(s)
            .ok_or_else(|| crate::Error::InvalidInput(format!("Unknown category: {}", s)))
    }
}

impl From<String> for Category {
    fn from(label: String) -> Self {
        Category::from_label(&label).unwrap_or_default()
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.label().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Relevance {
    VeryLow = 1,
    Low = 2,
    Medium = 3,
    High = 4,
    VeryHigh = 5,
}

impl Relevance {
    pub const ALL: [Relevance; 5] = [
        Relevance::VeryLow,
        Relevance::Low,
        Relevance::Medium,
        Relevance::High,
        Relevance::VeryHigh,
    ];

    pub fn from_score(score: i64) -> Option<Relevance> {
        match score {
            1 => Some(Relevance::VeryLow),
            2 => Some(Relevance::Low),
            3 => Some(Relevance::Medium),
            4 => Some(Relevance::High),
            5 => Some(Relevance::VeryHigh),
            _ => None,
        }
    }

    pub fn score(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            Relevance::VeryLow => "Muy baja",
            Relevance::Low => "Baja",
            Relevance::Medium => "Media",
            Relevance::High => "Alta",
            Relevance::VeryHigh => "Muy alta",
        }
    }
}

impl TryFrom<u8> for Relevance {
    type Error = String;

    fn try_from(score: u8) -> std::result::Result<Self, Self::Error> {
        Relevance::from_score(score as i64).ok_or_else(|| format!("Relevance out of range: {}", score))
    }
}

impl From<Relevance> for u8 {
    fn from(relevance: Relevance) -> Self {
        relevance.score()
    }
}

impl FromStr for Relevance {
    type Err = crate::Error;

    /// Accepts the numeric score or the label.
    fn from_str(s: &str) -> crate::Result<Self> {
        if let Ok(score) = s.trim().parse::<i64>() {
            return Relevance::from_score(score)
                .ok_or_else(|| crate::Error::InvalidInput(format!("Relevance out of range: {}", s)));
        }
        let wanted = normalized(s);
        Relevance::ALL
            .into_iter()
            .find(|r| normalized(r.label()) == wanted)
            .ok_or_else(|| crate::Error::InvalidInput(format!("Unknown relevance: {}", s)))
    }
}

/// Outlets with a known RSS feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Media {
    Abc,
    Antena3,
    Cope,
    DiarioRed,
    ElDiario,
    ElEconomista,
    ElMundo,
    ElPais,
    ElPeriodico,
    ElSalto,
    EsDiario,
    Expansion,
    LaSexta,
    LaVanguardia,
    LibertadDigital,
    Rtve,
}

impl Media {
    pub const ALL: [Media; 16] = [
        Media::Abc,
        Media::Antena3,
        Media::Cope,
        Media::DiarioRed,
        Media::ElDiario,
        Media::ElEconomista,
        Media::ElMundo,
        Media::ElPais,
        Media::ElPeriodico,
        Media::ElSalto,
        Media::EsDiario,
        Media::Expansion,
        Media::LaSexta,
        Media::LaVanguardia,
        Media::LibertadDigital,
        Media::Rtve,
    ];

    /// Identifier used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Media::Abc => "abc",
            Media::Antena3 => "antena3",
            Media::Cope => "cope",
            Media::DiarioRed => "diarioRed",
            Media::ElDiario => "elDiario",
            Media::ElEconomista => "elEconomista",
            Media::ElMundo => "elMundo",
            Media::ElPais => "elPais",
            Media::ElPeriodico => "elPeriodico",
            Media::ElSalto => "elSalto",
            Media::EsDiario => "esDiario",
            Media::Expansion => "expansion",
            Media::LaSexta => "laSexta",
            Media::LaVanguardia => "laVanguardia",
            Media::LibertadDigital => "libertadDigital",
            Media::Rtve => "rtve",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Media::Abc => "ABC",
            Media::Antena3 => "Antena 3",
            Media::Cope => "COPE",
            Media::DiarioRed => "Diario Red",
            Media::ElDiario => "El Diario",
            Media::ElEconomista => "El Economista",
            Media::ElMundo => "El Mundo",
            Media::ElPais => "El País",
            Media::ElPeriodico => "El Periódico",
            Media::ElSalto => "El Salto",
            Media::EsDiario => "ES Diario",
            Media::Expansion => "Expansión",
            Media::LaSexta => "La Sexta",
            Media::LaVanguardia => "La Vanguardia",
            Media::LibertadDigital => "Libertad Digital",
            Media::Rtve => "RTVE",
        }
    }

    pub fn feed_url(&self) -> &'static str {
        match self {
            Media::Abc => "https://www.abc.es/rss/2.0/portada/",
            Media::Antena3 => "https://www.antena3.com/noticias/rss/4013050.xml",
            Media::Cope => "https://www.cope.es/api/es/news/rss.xml",
            Media::DiarioRed => "https://www.diario-red.com/rss/",
            Media::ElDiario => "https://www.eldiario.es/rss/",
            Media::ElEconomista => "https://www.eleconomista.es/rss/rss-seleccion-ee.php",
            Media::ElMundo => "https://e00-elmundo.uecdn.es/elmundo/rss/portada.xml",
            Media::ElPais => "https://feeds.elpais.com/mrss-s/pages/ep/site/elpais.com/portada",
            Media::ElPeriodico => "https://www.elperiodico.com/es/cds/rss/?id=board.xml",
            Media::ElSalto => "https://www.elsaltodiario.com/general/feed",
            Media::EsDiario => "https://www.esdiario.com/rss/home.xml",
            Media::Expansion => "https://e00-expansion.uecdn.es/rss/portada.xml",
            Media::LaSexta => "https://www.lasexta.com/rss/351410.xml",
            Media::LaVanguardia => "https://www.lavanguardia.com/rss/home.xml",
            Media::LibertadDigital => "https://feeds2.feedburner.com/libertaddigital/portada",
            Media::Rtve => "https://api2.rtve.es/rss/temas_noticias.xml",
        }
    }
}

impl fmt::Display for Media {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Media {
    type Err = crate::Error;

    /// Accepts the wire identifier (`elPais`) or the display name (`El País`).
    fn from_str(s: &str) -> crate::Result<Self> {
        let wanted = normalized(s).replace('-', "");
        Media::ALL
            .into_iter()
            .find(|m| {
                normalized(m.as_str()) == wanted || normalized(m.name()).replace('-', "") == wanted
            })
            .ok_or_else(|| crate::Error::InvalidInput(format!("Unknown medium: {}", s)))
    }
}

fn lenient_relevance<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<Relevance>, D::Error> {
    let score = Option::<i64>::deserialize(d)?;
    Ok(score.and_then(Relevance::from_score))
}

fn lenient_media<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<Media>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// RSS `pubDate` values: RFC 2822 on the wire, RFC 3339 also accepted.
/// Empty or unparseable dates decode as `None`.
pub mod pub_date {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        DateTime::parse_from_rfc2822(raw)
            .or_else(|_| DateTime::parse_from_rfc3339(raw))
            .map(|d| d.with_timezone(&Utc))
            .ok()
    }

    pub fn serialize<S: Serializer>(date: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => s.serialize_str(&date.to_rfc2822()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.as_deref().and_then(parse))
    }
}
