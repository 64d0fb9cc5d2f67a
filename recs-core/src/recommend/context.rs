//! Request context resolution.

use chrono::{DateTime, Datelike, Local, Timelike};

use crate::constants::LINUCB_DIM;
use crate::patterns::PatternContext;
use crate::types::{
    Audience, ContentFilter, ContentTypePreference, Platform, RecommendationRequest, TimeOfDay,
    UserPreference, UserSegment,
};

/// Fully resolved request context.
#[derive(Debug, Clone)]
pub struct ResolvedContext {
    pub segment: UserSegment,
    pub time_of_day: TimeOfDay,
    pub day_of_week: String,
    pub platform: Platform,
    pub audience: Option<Audience>,
    pub mood: Option<String>,
    pub top_genres: Vec<String>,
    pub content_preference: ContentTypePreference,
}

/// Resolve a request against the preference profile and clock.
///
/// Missing context fields come from the local clock; the platform
/// defaults to web. Top genres are the preference profile's three
/// heaviest.
pub fn resolve_context(
    request: &RecommendationRequest,
    preference: &UserPreference,
    now: DateTime<Local>,
) -> ResolvedContext {
    let time_of_day = request
        .context
        .time_of_day
        .unwrap_or_else(|| TimeOfDay::from_hour(now.hour()));
    let day_of_week = request
        .context
        .day_of_week
        .clone()
        .unwrap_or_else(|| weekday_name(now).to_string());
    let platform = request.context.platform.unwrap_or(Platform::Web);
    let content_preference = match request.content_type {
        ContentFilter::Series => ContentTypePreference::Series,
        ContentFilter::Movie => ContentTypePreference::Movie,
        ContentFilter::All => ContentTypePreference::Both,
    };

    ResolvedContext {
        segment: UserSegment::from_history_len(preference.watch_history.len()),
        time_of_day,
        day_of_week,
        platform,
        audience: request.context.audience,
        mood: request.context.mood.clone(),
        top_genres: preference.top_genres(3),
        content_preference,
    }
}

impl ResolvedContext {
    /// Pattern-registry context for this request.
    #[must_use]
    pub fn pattern_context(&self) -> PatternContext {
        PatternContext {
            user_segment: Some(self.segment),
            time_of_day: self.time_of_day,
            day_of_week: self.day_of_week.clone(),
            platform: self.platform,
            content_type_preference: self.content_preference,
            top_genres: self.top_genres.clone(),
        }
    }

    /// 10-dim feature vector for the LinUCB selector.
    #[must_use]
    pub fn linucb_features(&self) -> [f64; LINUCB_DIM] {
        let mut features = [0.0; LINUCB_DIM];
        features[match self.segment {
            UserSegment::New => 0,
            UserSegment::Casual => 1,
            UserSegment::Regular => 2,
            UserSegment::Power => 3,
        }] = 1.0;
        features[4] = match self.time_of_day {
            TimeOfDay::Morning => 0.2,
            TimeOfDay::Afternoon => 0.4,
            TimeOfDay::Evening => 0.6,
            TimeOfDay::Night => 0.8,
            TimeOfDay::Any => 0.5,
        };
        features[5] = f64::from(u8::from(matches!(
            self.day_of_week.as_str(),
            "saturday" | "sunday"
        )));
        features[6] = f64::from(u8::from(self.platform == Platform::Tv));
        features[7] = f64::from(u8::from(self.platform == Platform::Mobile));
        features[8] = self.top_genres.len() as f64 / 3.0;
        features[9] = f64::from(u8::from(self.mood.is_some()));
        features
    }
}

fn weekday_name(now: DateTime<Local>) -> &'static str {
    match now.weekday() {
        chrono::Weekday::Mon => "monday",
        chrono::Weekday::Tue => "tuesday",
        chrono::Weekday::Wed => "wednesday",
        chrono::Weekday::Thu => "thursday",
        chrono::Weekday::Fri => "friday",
        chrono::Weekday::Sat => "saturday",
        chrono::Weekday::Sun => "sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn request_at_hour() -> RecommendationRequest {
        RecommendationRequest::new("user-1", 10)
    }

    #[test]
    fn defaults_come_from_clock_and_web() {
        let request = request_at_hour();
        let preference = UserPreference::cold_start(Uuid::new_v4());
        // 2026-03-06 is a Friday, 20:00 is evening.
        let now = Local.with_ymd_and_hms(2026, 3, 6, 20, 0, 0).unwrap();
        let resolved = resolve_context(&request, &preference, now);
        assert_eq!(resolved.time_of_day, TimeOfDay::Evening);
        assert_eq!(resolved.day_of_week, "friday");
        assert_eq!(resolved.platform, Platform::Web);
        assert_eq!(resolved.segment, UserSegment::New);
    }

    #[test]
    fn explicit_context_wins() {
        let mut request = request_at_hour();
        request.context.time_of_day = Some(TimeOfDay::Night);
        request.context.platform = Some(Platform::Tv);
        let preference = UserPreference::cold_start(Uuid::new_v4());
        let now = Local.with_ymd_and_hms(2026, 3, 6, 9, 0, 0).unwrap();
        let resolved = resolve_context(&request, &preference, now);
        assert_eq!(resolved.time_of_day, TimeOfDay::Night);
        assert_eq!(resolved.platform, Platform::Tv);
    }

    #[test]
    fn features_are_ten_dims_in_unit_range() {
        let request = request_at_hour();
        let mut preference = UserPreference::cold_start(Uuid::new_v4());
        preference.genre_weights.insert("Drama".into(), 0.9);
        let now = Local.with_ymd_and_hms(2026, 3, 7, 22, 0, 0).unwrap();
        let resolved = resolve_context(&request, &preference, now);
        let features = resolved.linucb_features();
        assert_eq!(features.len(), LINUCB_DIM);
        assert!(features.iter().all(|f| (0.0..=1.0).contains(f)));
        assert!((features[5] - 1.0).abs() < f64::EPSILON, "saturday is weekend");
    }
}
