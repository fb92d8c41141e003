//! Session segmentation.
//!
//! Each user's interactions are sorted by time and bucketed by UTC calendar
//! day. Days with fewer than `min_events_per_day` events are dropped. A day
//! with more events than `window_size` is cut into overlapping windows with
//! stride 1; any other kept day becomes a single session.

use chrono::NaiveDate;
use session_types::{Interaction, Session, utc_day};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::{DEFAULT_WINDOW_SIZE, MIN_EVENTS_PER_DAY};
use crate::error::PipelineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentConfig {
    pub window_size: usize,
    pub min_events_per_day: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            min_events_per_day: MIN_EVENTS_PER_DAY,
        }
    }
}

/// One user's interactions, sorted ascending by timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTimeline {
    pub user_id: String,
    pub item_ids: Vec<String>,
    pub timestamps: Vec<i64>,
}

impl UserTimeline {
    /// Build a timeline from `(item_id, timestamp)` pairs in log order.
    /// Equal timestamps keep their log order.
    pub fn new(user_id: String, mut events: Vec<(String, i64)>) -> Self {
        events.sort_by_key(|(_, ts)| *ts);
        let (item_ids, timestamps) = events.into_iter().unzip();
        Self {
            user_id,
            item_ids,
            timestamps,
        }
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SegmentStats {
    pub users: usize,
    pub users_skipped: usize,
    pub day_groups: usize,
    pub single_event_days: usize,
    pub windowed_days: usize,
    pub sessions: usize,
    pub empty_sessions: usize,
}

/// Group interactions per user, ordered by user id. Users with a single
/// interaction are left out.
pub fn build_timelines(interactions: Vec<Interaction>) -> (Vec<UserTimeline>, usize) {
    let mut per_user: BTreeMap<String, Vec<(String, i64)>> = BTreeMap::new();
    for interaction in interactions {
        per_user
            .entry(interaction.user_id)
            .or_default()
            .push((interaction.item_id, interaction.timestamp));
    }

    let mut skipped = 0;
    let timelines = per_user
        .into_iter()
        .filter_map(|(user_id, events)| {
            if events.len() <= 1 {
                skipped += 1;
                return None;
            }
            Some(UserTimeline::new(user_id, events))
        })
        .collect();
    (timelines, skipped)
}

/// Split sorted timestamps into contiguous UTC-day groups, in day order.
///
/// Groups with fewer than `min_events` timestamps are counted and discarded.
pub fn day_groups(
    timestamps: &[i64],
    min_events: usize,
) -> Result<(Vec<&[i64]>, usize), PipelineError> {
    let mut groups = Vec::new();
    let mut dropped = 0;
    let mut start = 0;
    let mut current: Option<NaiveDate> = None;

    for (idx, &ts) in timestamps.iter().enumerate() {
        let day = utc_day(ts).ok_or(PipelineError::TimestampOutOfRange(ts))?;
        match current {
            Some(prev) if prev == day => {}
            Some(_) => {
                keep_group(&timestamps[start..idx], min_events, &mut groups, &mut dropped);
                start = idx;
                current = Some(day);
            }
            None => current = Some(day),
        }
    }
    if current.is_some() {
        keep_group(&timestamps[start..], min_events, &mut groups, &mut dropped);
    }

    Ok((groups, dropped))
}

fn keep_group<'a>(
    group: &'a [i64],
    min_events: usize,
    groups: &mut Vec<&'a [i64]>,
    dropped: &mut usize,
) {
    if group.len() >= min_events {
        groups.push(group);
    } else {
        *dropped += 1;
    }
}

/// Segment one user's timeline into sessions, in day then window order.
pub fn segment_user(
    timeline: &UserTimeline,
    config: SegmentConfig,
    stats: &mut SegmentStats,
) -> Result<Vec<Session>, PipelineError> {
    let window = config.window_size;
    let (groups, dropped) = day_groups(&timeline.timestamps, config.min_events_per_day)?;
    stats.day_groups += groups.len();
    stats.single_event_days += dropped;

    let mut sessions = Vec::new();
    for group in groups {
        let (Some(&first), Some(&last)) = (group.first(), group.last()) else {
            continue;
        };
        // First occurrence of the first timestamp, last occurrence of the last one.
        let Some(start) = timeline.timestamps.iter().position(|&t| t == first) else {
            continue;
        };
        let Some(end) = timeline.timestamps.iter().rposition(|&t| t == last) else {
            continue;
        };
        let items = &timeline.item_ids[start..=end];

        if items.len() > window {
            stats.windowed_days += 1;
            for i in 0..=(items.len() - window) {
                let time = group
                    .get(i + window - 1)
                    .copied()
                    .unwrap_or(last);
                sessions.push(Session {
                    session: items[i..i + window].to_vec(),
                    time,
                });
            }
        } else {
            sessions.push(Session {
                session: items.to_vec(),
                time: last,
            });
        }
    }

    debug!(
        user = %timeline.user_id,
        events = timeline.len(),
        sessions = sessions.len(),
        "segmented user"
    );
    Ok(sessions)
}

/// Segment every timeline and return sessions in global time order.
///
/// Sessions are numbered in user-then-window order; the position in that
/// sequence is the tie-breaker for equal `time` values. Empty sessions are
/// dropped.
pub fn segment_all(
    timelines: &[UserTimeline],
    config: SegmentConfig,
) -> Result<(Vec<Session>, SegmentStats), PipelineError> {
    let mut stats = SegmentStats {
        users: timelines.len(),
        ..SegmentStats::default()
    };

    let mut numbered: Vec<(usize, Session)> = Vec::new();
    for timeline in timelines {
        for session in segment_user(timeline, config, &mut stats)? {
            numbered.push((numbered.len(), session));
        }
    }

    numbered.sort_by_key(|(id, session)| (session.time, *id));

    let before = numbered.len();
    let sessions: Vec<Session> = numbered
        .into_iter()
        .map(|(_, session)| session)
        .filter(|session| !session.is_empty())
        .collect();
    stats.empty_sessions = before - sessions.len();
    stats.sessions = sessions.len();

    info!(
        users = stats.users,
        day_groups = stats.day_groups,
        single_event_days = stats.single_event_days,
        windowed_days = stats.windowed_days,
        sessions = stats.sessions,
        "segmented sessions"
    );
    Ok((sessions, stats))
}
