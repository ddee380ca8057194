use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::models::{ActivitySection, ScheduledActivity};

/// The calendar-day instants classification is anchored on, resolved in the
/// caller's timezone and held as UTC instants.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DayBoundaries {
    pub start_of_today: DateTime<Utc>,
    pub start_of_tomorrow: DateTime<Utc>,
    pub start_of_day_after: DateTime<Utc>,
}

impl DayBoundaries {
    pub fn containing<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let timezone = now.timezone();
        let today = now.date_naive();
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        let day_after = today.checked_add_days(Days::new(2)).unwrap_or(tomorrow);
        Self {
            start_of_today: start_of_day(&timezone, today, now),
            start_of_tomorrow: start_of_day(&timezone, tomorrow, now),
            start_of_day_after: start_of_day(&timezone, day_after, now),
        }
    }
}

fn start_of_day<Tz: TimeZone>(
    timezone: &Tz,
    date: NaiveDate,
    fallback: &DateTime<Tz>,
) -> DateTime<Utc> {
    // Some zones skip local midnight on DST transition days; walk forward to
    // the first hour that exists.
    for hour in 0..4 {
        let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0) else {
            continue;
        };
        if let Some(instant) = timezone.from_local_datetime(&date.and_time(time)).earliest() {
            return instant.with_timezone(&Utc);
        }
    }
    fallback.with_timezone(&Utc)
}

/// How an optional activity whose expiration has already lapsed is shown.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ExpiredOptionalPolicy {
    /// Stays in the keep-going section indefinitely.
    #[default]
    KeepGoing,
    /// Drops out of every rendered section.
    Hidden,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SectionPolicy {
    pub expired_optional: ExpiredOptionalPolicy,
}

/// Maps an activity to exactly one section. Pure in
/// `(timestamps, optional flag, boundaries, policy)`, so repeated evaluation
/// at the same moment is idempotent.
pub fn section_for_activity(
    activity: &ScheduledActivity,
    boundaries: &DayBoundaries,
    policy: SectionPolicy,
) -> ActivitySection {
    let finished = activity.is_finished();
    let optional = activity.optional;

    // Required work that expired before today's boundary and was never done.
    // Optional activities never land here: the expired list is a nudge for
    // required work only.
    if !finished
        && !optional
        && activity
            .expires_on
            .is_some_and(|expires| expires < boundaries.start_of_today)
    {
        return ActivitySection::ExpiredYesterday;
    }

    let scheduled_today = in_range(
        activity.scheduled_on,
        boundaries.start_of_today,
        boundaries.start_of_tomorrow,
    );
    if scheduled_today {
        // A finished optional activity is done for good and never rendered.
        if optional && finished {
            return ActivitySection::None;
        }
        return ActivitySection::Today;
    }

    // Still outstanding from an earlier day and not yet expired as of today.
    if !finished
        && !optional
        && activity.scheduled_on < boundaries.start_of_tomorrow
        && activity
            .expires_on
            .is_none_or(|expires| expires >= boundaries.start_of_today)
    {
        return ActivitySection::Today;
    }

    // Finished today counts as today's work even when scheduled earlier.
    if finished
        && !optional
        && activity
            .finished_on
            .is_some_and(|at| in_range(at, boundaries.start_of_today, boundaries.start_of_tomorrow))
    {
        return ActivitySection::Today;
    }

    if !finished
        && in_range(
            activity.scheduled_on,
            boundaries.start_of_tomorrow,
            boundaries.start_of_day_after,
        )
    {
        return ActivitySection::Tomorrow;
    }

    if optional && !finished && activity.scheduled_on < boundaries.start_of_today {
        match activity.expires_on {
            None => return ActivitySection::KeepGoing,
            Some(expires)
                if expires < boundaries.start_of_today
                    && policy.expired_optional == ExpiredOptionalPolicy::KeepGoing =>
            {
                return ActivitySection::KeepGoing;
            }
            Some(_) => {}
        }
    }

    ActivitySection::None
}

/// Activities belonging to a section, preserving input relative order.
pub fn scheduled_activities_for_section<'a>(
    activities: &'a [ScheduledActivity],
    section: ActivitySection,
    boundaries: &DayBoundaries,
    policy: SectionPolicy,
) -> Vec<&'a ScheduledActivity> {
    activities
        .iter()
        .filter(|activity| section_for_activity(activity, boundaries, policy) == section)
        .collect()
}

fn in_range(instant: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    instant >= start && instant < end
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::models::{ActivitySection, ScheduledActivity};

    use super::{
        DayBoundaries, ExpiredOptionalPolicy, SectionPolicy, section_for_activity,
    };

    fn boundaries() -> (chrono::DateTime<Utc>, DayBoundaries) {
        let now = Utc.with_ymd_and_hms(2024, 9, 17, 14, 30, 0).unwrap();
        (now, DayBoundaries::containing(&now))
    }

    fn activity(scheduled_offset: Duration) -> ScheduledActivity {
        let (now, _) = boundaries();
        ScheduledActivity::new("Tapping Task", now + scheduled_offset)
    }

    #[test]
    fn boundaries_are_midnight_aligned() {
        let (_, b) = boundaries();
        assert_eq!(b.start_of_today, Utc.with_ymd_and_hms(2024, 9, 17, 0, 0, 0).unwrap());
        assert_eq!(b.start_of_tomorrow - b.start_of_today, Duration::days(1));
        assert_eq!(b.start_of_day_after - b.start_of_tomorrow, Duration::days(1));
    }

    #[test]
    fn expiring_earlier_today_is_still_today() {
        let (now, b) = boundaries();
        let mut subject = activity(Duration::minutes(-15));
        subject.expires_on = Some(now - Duration::minutes(10));

        assert_eq!(
            section_for_activity(&subject, &b, SectionPolicy::default()),
            ActivitySection::Today
        );
    }

    #[test]
    fn expired_before_today_is_expired_yesterday() {
        let (now, b) = boundaries();
        let mut subject = activity(Duration::days(-2));
        subject.expires_on = Some(now - Duration::days(1));

        assert_eq!(
            section_for_activity(&subject, &b, SectionPolicy::default()),
            ActivitySection::ExpiredYesterday
        );
    }

    #[test]
    fn finished_yesterday_is_not_rendered() {
        let (now, b) = boundaries();
        let mut subject = activity(Duration::days(-2));
        subject.finished_on = Some(now - Duration::days(1));

        assert_eq!(
            section_for_activity(&subject, &b, SectionPolicy::default()),
            ActivitySection::None
        );
    }

    #[test]
    fn optional_finished_today_is_not_rendered() {
        let (now, b) = boundaries();
        let mut subject = activity(Duration::days(-2));
        subject.optional = true;
        subject.finished_on = Some(now);

        assert_eq!(
            section_for_activity(&subject, &b, SectionPolicy::default()),
            ActivitySection::None
        );
    }

    #[test]
    fn optional_overdue_without_expiration_keeps_going() {
        let (_, b) = boundaries();
        let mut subject = activity(Duration::days(-2));
        subject.optional = true;

        assert_eq!(
            section_for_activity(&subject, &b, SectionPolicy::default()),
            ActivitySection::KeepGoing
        );
    }

    #[test]
    fn expired_optional_follows_the_configured_policy() {
        let (now, b) = boundaries();
        let mut subject = activity(Duration::days(-2));
        subject.optional = true;
        subject.expires_on = Some(now - Duration::days(1));

        assert_eq!(
            section_for_activity(&subject, &b, SectionPolicy::default()),
            ActivitySection::KeepGoing
        );
        assert_eq!(
            section_for_activity(
                &subject,
                &b,
                SectionPolicy {
                    expired_optional: ExpiredOptionalPolicy::Hidden
                }
            ),
            ActivitySection::None
        );
    }

    #[test]
    fn scheduled_beyond_tomorrow_is_not_rendered() {
        let (_, b) = boundaries();
        let subject = activity(Duration::days(2));

        assert_eq!(
            section_for_activity(&subject, &b, SectionPolicy::default()),
            ActivitySection::None
        );
    }

    #[test]
    fn classification_is_idempotent() {
        let (now, b) = boundaries();
        let mut subject = activity(Duration::days(-1));
        subject.expires_on = Some(now + Duration::hours(2));

        let first = section_for_activity(&subject, &b, SectionPolicy::default());
        let second = section_for_activity(&subject, &b, SectionPolicy::default());
        assert_eq!(first, second);
    }
}
