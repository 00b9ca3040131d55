use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Weekday};
use nn_core::NeutralArticle;
use serde::Serialize;
use tracing::info;

/// Number of days kept on the timeline, today included.
pub const DAYS: usize = 7;

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Lunes",
        Weekday::Tue => "Martes",
        Weekday::Wed => "Miércoles",
        Weekday::Thu => "Jueves",
        Weekday::Fri => "Viernes",
        Weekday::Sat => "Sábado",
        Weekday::Sun => "Domingo",
    }
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "enero",
        2 => "febrero",
        3 => "marzo",
        4 => "abril",
        5 => "mayo",
        6 => "junio",
        7 => "julio",
        8 => "agosto",
        9 => "septiembre",
        10 => "octubre",
        11 => "noviembre",
        _ => "diciembre",
    }
}

/// A calendar day as shown on the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayInfo {
    pub date: NaiveDate,
    pub day_name: String,
    pub day_number: u32,
    pub month_name: String,
}

impl DayInfo {
    /// Labels `date` relative to `today`: "Hoy", "Ayer" or the weekday.
    pub fn new(date: NaiveDate, today: NaiveDate) -> Self {
        let day_name = match (today - date).num_days() {
            0 => "Hoy",
            1 => "Ayer",
            _ => weekday_name(date.weekday()),
        };
        Self {
            date,
            day_name: day_name.to_string(),
            day_number: date.day(),
            month_name: month_name(date.month()).to_string(),
        }
    }

    /// "Lunes, 5 de mayo"
    pub fn formatted(&self) -> String {
        format!("{}, {} de {}", self.day_name, self.day_number, self.month_name)
    }

    /// "Hoy", "Ayer" or "Lunes 5".
    pub fn short_format(&self) -> String {
        match self.day_name.as_str() {
            "Hoy" | "Ayer" => self.day_name.clone(),
            _ => format!("{} {}", self.day_name, self.day_number),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBucket {
    pub day: DayInfo,
    pub articles: Vec<NeutralArticle>,
}

/// The seven most recent days, today first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBuckets {
    buckets: Vec<DayBucket>,
}

impl DayBuckets {
    /// Seven empty days ending at `today`.
    pub fn empty(today: NaiveDate) -> Self {
        let buckets = (0..DAYS as u64)
            .filter_map(|offset| today.checked_sub_days(Days::new(offset)))
            .map(|date| DayBucket {
                day: DayInfo::new(date, today),
                articles: Vec::new(),
            })
            .collect();
        Self { buckets }
    }

    pub fn today(&self) -> Option<NaiveDate> {
        self.buckets.first().map(|b| b.day.date)
    }

    pub fn get(&self, index: usize) -> Option<&DayBucket> {
        self.buckets.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DayBucket> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn days(&self) -> Vec<DayInfo> {
        self.buckets.iter().map(|b| b.day.clone()).collect()
    }

    /// Shifts the timeline so that `today` is the first day. Every step
    /// drops the oldest day and opens a new one in front; labels are then
    /// recomputed. Articles are cleared and must be repopulated.
    pub fn rotate_to(&mut self, today: NaiveDate) {
        let steps = self.today().map_or(DAYS as i64, |current| (today - current).num_days());
        if !(0..DAYS as i64).contains(&steps) {
            *self = Self::empty(today);
            return;
        }

        for step in (0..steps).rev() {
            let Some(date) = today.checked_sub_days(Days::new(step as u64)) else {
                continue;
            };
            self.buckets.pop();
            self.buckets.insert(
                0,
                DayBucket {
                    day: DayInfo::new(date, today),
                    articles: Vec::new(),
                },
            );
        }
        for bucket in self.buckets.iter_mut() {
            bucket.day = DayInfo::new(bucket.day.date, today);
            bucket.articles.clear();
        }
    }

    /// Places every dated article in the bucket of its calendar day as seen
    /// from `now`'s timezone. Later hours of today still count as today; days
    /// after today fall outside every bucket. Buckets end up newest first.
    fn populate<Tz: TimeZone>(&mut self, articles: &[NeutralArticle], now: &DateTime<Tz>) {
        let today = now.date_naive();

        for article in articles {
            let Some(date) = article.date else { continue };
            let day = date.with_timezone(&now.timezone()).date_naive();
            let offset = (today - day).num_days();
            if let Some(bucket) = usize::try_from(offset).ok().and_then(|i| self.buckets.get_mut(i)) {
                bucket.articles.push(article.clone());
            }
        }

        for bucket in self.buckets.iter_mut() {
            bucket.articles.sort_by(|a, b| b.date.cmp(&a.date));
        }
    }
}

/// Sorts summaries into the seven days ending at `now`.
pub fn classify<Tz: TimeZone>(articles: &[NeutralArticle], now: &DateTime<Tz>) -> DayBuckets {
    let mut buckets = DayBuckets::empty(now.date_naive());
    buckets.populate(articles, now);
    buckets
}

/// Keeps the day buckets across runs and rolls them over when the calendar
/// day changes.
#[derive(Debug, Clone)]
pub struct TemporalClassifier {
    buckets: DayBuckets,
    last_run: Option<NaiveDate>,
}

impl TemporalClassifier {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            buckets: DayBuckets::empty(today),
            last_run: None,
        }
    }

    pub fn buckets(&self) -> &DayBuckets {
        &self.buckets
    }

    pub fn is_stale(&self, today: NaiveDate) -> bool {
        self.last_run.map_or(false, |last| last != today)
    }

    /// Reclassifies `articles`. Returns true when the day rolled over since
    /// the previous run.
    pub fn refresh<Tz: TimeZone>(&mut self, articles: &[NeutralArticle], now: &DateTime<Tz>) -> bool {
        let today = now.date_naive();
        let rolled = self.is_stale(today) || self.buckets.today() != Some(today);
        if rolled {
            info!("🌅 New day {}, rotating timeline", today);
        }
        self.buckets.rotate_to(today);
        self.buckets.populate(articles, now);
        self.last_run = Some(today);
        rolled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, Utc};
    use nn_core::Category;

    fn madrid() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        madrid().with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn neutral(group: i64, date: Option<DateTime<FixedOffset>>) -> NeutralArticle {
        let mut article = NeutralArticle::new(format!("g{}", group), "", Category::Politica, group);
        article.date = date.map(|d| d.with_timezone(&Utc));
        article
    }

    fn groups(bucket: &DayBucket) -> Vec<i64> {
        bucket.articles.iter().map(|a| a.group).collect()
    }

    #[test]
    fn test_day_labels() {
        let today = NaiveDate::from_ymd_opt(2025, 5, 7).unwrap();
        let days = DayBuckets::empty(today).days();
        let labels: Vec<_> = days.iter().map(|d| d.day_name.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Hoy", "Ayer", "Lunes", "Domingo", "Sábado", "Viernes", "Jueves"]
        );
        assert_eq!(days[2].formatted(), "Lunes, 5 de mayo");
        assert_eq!(days[2].short_format(), "Lunes 5");
        assert_eq!(days[0].short_format(), "Hoy");
        assert_eq!(days[1].formatted(), "Ayer, 6 de mayo");
    }

    #[test]
    fn test_bucket_boundaries() {
        let now = at(2025, 5, 7, 10, 0);
        let articles = vec![
            neutral(1, Some(now)),
            neutral(2, Some(now - Duration::days(6))),
            neutral(3, Some(now - Duration::days(8))),
            neutral(4, None),
            neutral(5, Some(now + Duration::days(1))),
        ];
        let buckets = classify(&articles, &now);
        assert_eq!(buckets.len(), DAYS);
        assert_eq!(groups(buckets.get(0).unwrap()), vec![1]);
        assert_eq!(groups(buckets.get(6).unwrap()), vec![2]);
        let placed: usize = buckets.iter().map(|b| b.articles.len()).sum();
        assert_eq!(placed, 2);
    }

    #[test]
    fn test_later_today_is_still_today() {
        let now = at(2025, 5, 7, 10, 0);
        let articles = vec![
            neutral(1, Some(now)),
            neutral(2, Some(now + Duration::hours(3))),
        ];
        let buckets = classify(&articles, &now);
        assert_eq!(groups(buckets.get(0).unwrap()), vec![2, 1]);
    }

    #[test]
    fn test_calendar_days_not_elapsed_hours() {
        // 23:30 yesterday is one calendar day back even if only an hour ago.
        let now = at(2025, 5, 7, 0, 30);
        let articles = vec![neutral(1, Some(at(2025, 5, 6, 23, 30)))];
        let buckets = classify(&articles, &now);
        assert_eq!(groups(buckets.get(1).unwrap()), vec![1]);
    }

    #[test]
    fn test_dates_are_read_in_the_local_timezone() {
        // 22:30 UTC on the 6th is already the 7th in Madrid.
        let now = at(2025, 5, 7, 9, 0);
        let mut article = neutral(1, None);
        article.date = Some(Utc.with_ymd_and_hms(2025, 5, 6, 22, 30, 0).unwrap());
        let buckets = classify(&[article], &now);
        assert_eq!(groups(buckets.get(0).unwrap()), vec![1]);
    }

    #[test]
    fn test_buckets_are_newest_first() {
        let now = at(2025, 5, 7, 20, 0);
        let articles = vec![
            neutral(1, Some(at(2025, 5, 7, 8, 0))),
            neutral(2, Some(at(2025, 5, 7, 18, 0))),
            neutral(3, Some(at(2025, 5, 7, 12, 0))),
        ];
        let buckets = classify(&articles, &now);
        assert_eq!(groups(buckets.get(0).unwrap()), vec![2, 3, 1]);
    }

    #[test]
    fn test_rollover_rotates_days() {
        let articles = vec![neutral(1, Some(at(2025, 5, 7, 12, 0)))];
        let mut classifier = TemporalClassifier::new(NaiveDate::from_ymd_opt(2025, 5, 7).unwrap());

        assert!(!classifier.refresh(&articles, &at(2025, 5, 7, 23, 59)));
        assert_eq!(groups(classifier.buckets().get(0).unwrap()), vec![1]);
        assert!(!classifier.is_stale(NaiveDate::from_ymd_opt(2025, 5, 7).unwrap()));
        assert!(classifier.is_stale(NaiveDate::from_ymd_opt(2025, 5, 8).unwrap()));

        assert!(classifier.refresh(&articles, &at(2025, 5, 8, 0, 0)));
        let buckets = classifier.buckets();
        assert_eq!(buckets.today(), NaiveDate::from_ymd_opt(2025, 5, 8));
        assert_eq!(buckets.get(1).unwrap().day.day_name, "Ayer");
        assert_eq!(buckets.get(2).unwrap().day.day_name, "Martes");
        assert_eq!(groups(buckets.get(1).unwrap()), vec![1]);
        assert!(buckets.get(0).unwrap().articles.is_empty());
        assert_eq!(
            buckets.get(6).unwrap().day.date,
            NaiveDate::from_ymd_opt(2025, 5, 2).unwrap()
        );
    }

    #[test]
    fn test_long_gap_rebuilds_timeline() {
        let mut classifier = TemporalClassifier::new(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
        classifier.refresh(&[], &at(2025, 5, 1, 9, 0));
        assert!(classifier.refresh(&[], &at(2025, 5, 20, 9, 0)));
        let days = classifier.buckets().days();
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2025, 5, 20).unwrap());
        assert_eq!(days[6].date, NaiveDate::from_ymd_opt(2025, 5, 14).unwrap());
    }
}
