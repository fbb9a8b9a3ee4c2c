//! Post-close feedback.
//!
//! Ratings live in the user document, keyed by nothing but arrival order, so
//! they survive the ticket record and the channel both. The history is
//! append-only; a user rating the same ticket twice leaves two entries.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use guichet_shared::{ChannelId, UserId};
use guichet_store::{FeedbackEntry, GuildStore};

use crate::error::{Result, TicketError};

pub struct FeedbackCollector {
    store: Arc<GuildStore>,
}

impl FeedbackCollector {
    pub fn new(store: Arc<GuildStore>) -> Self {
        Self { store }
    }

    /// Record a rating between 1 and 5 for a closed ticket's channel.
    pub async fn record(
        &self,
        user: UserId,
        ticket: ChannelId,
        rating: u8,
        comment: Option<String>,
    ) -> Result<FeedbackEntry> {
        if !(1..=5).contains(&rating) {
            return Err(TicketError::InvalidRating { rating });
        }
        let entry = FeedbackEntry {
            ticket,
            rating,
            comment,
            created_at: Utc::now(),
        };
        let stored = entry.clone();
        self.store
            .mutate_user(user, move |doc| {
                doc.feedback.push(stored);
                Ok::<_, TicketError>(())
            })
            .await?;
        debug!(user_id = %user, channel_id = %ticket, rating, "feedback recorded");
        Ok(entry)
    }

    /// Everything a user ever submitted, oldest first.
    pub fn entries(&self, user: UserId) -> Result<Vec<FeedbackEntry>> {
        Ok(self.store.read_user(user)?.feedback)
    }

    /// Mean rating across a user's submissions.
    pub fn average(&self, user: UserId) -> Result<Option<f64>> {
        let feedback = self.store.read_user(user)?.feedback;
        if feedback.is_empty() {
            return Ok(None);
        }
        let sum: f64 = feedback.iter().map(|f| f.rating as f64).sum();
        Ok(Some(sum / feedback.len() as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: UserId = UserId(10);

    fn collector() -> FeedbackCollector {
        FeedbackCollector::new(Arc::new(GuildStore::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_ratings_outside_the_scale_are_rejected() {
        let collector = collector();
        for rating in [0u8, 6, 200] {
            let err = collector.record(USER, ChannelId(1), rating, None).await;
            assert!(matches!(err, Err(TicketError::InvalidRating { rating: r }) if r == rating));
        }
        assert!(collector.entries(USER).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_appends_and_averages() {
        let collector = collector();
        collector
            .record(USER, ChannelId(1), 4, Some("quick and friendly".to_string()))
            .await
            .unwrap();
        collector.record(USER, ChannelId(2), 5, None).await.unwrap();

        let entries = collector.entries(USER).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rating, 4);
        assert_eq!(entries[0].comment.as_deref(), Some("quick and friendly"));
        assert_eq!(collector.average(USER).unwrap(), Some(4.5));
    }

    #[tokio::test]
    async fn test_same_ticket_can_be_rated_twice() {
        let collector = collector();
        collector.record(USER, ChannelId(1), 2, None).await.unwrap();
        collector.record(USER, ChannelId(1), 5, None).await.unwrap();

        assert_eq!(collector.entries(USER).unwrap().len(), 2);
        assert_eq!(collector.average(USER).unwrap(), Some(3.5));
    }

    #[tokio::test]
    async fn test_users_do_not_share_history() {
        let collector = collector();
        collector.record(USER, ChannelId(1), 1, None).await.unwrap();

        assert!(collector.entries(UserId(99)).unwrap().is_empty());
        assert_eq!(collector.average(UserId(99)).unwrap(), None);
    }
}
