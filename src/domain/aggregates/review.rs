//! Review Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::events::{DomainEvent, ReviewEvent};
use crate::domain::value_objects::Rating;

pub const MAX_COMMENT_LEN: usize = 2000;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Review {
    pub(crate) id: Uuid,
    pub(crate) book_id: Uuid,
    pub(crate) user_id: String,
    pub(crate) rating: Rating,
    pub(crate) comment: Option<String>,
    pub(crate) status: ReviewStatus,
    pub(crate) moderation_note: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) moderated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus { #[default] Pending, Approved, Rejected }

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Approved => "approved", Self::Rejected => "rejected" }
    }
    pub fn parse(s: &str) -> Option<Self> {
        match s { "pending" => Some(Self::Pending), "approved" => Some(Self::Approved), "rejected" => Some(Self::Rejected), _ => None }
    }
}

impl Review {
    /// New reviews wait for moderation before they are shown.
    pub fn submit(book_id: Uuid, user_id: impl Into<String>, rating: Rating, comment: Option<String>) -> Result<Self, ReviewError> {
        let comment = comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
        if comment.as_ref().map_or(false, |c| c.chars().count() > MAX_COMMENT_LEN) {
            return Err(ReviewError::CommentTooLong);
        }
        let id = Uuid::now_v7();
        let mut review = Self {
            id, book_id, user_id: user_id.into(), rating, comment, status: ReviewStatus::Pending,
            moderation_note: None, created_at: Utc::now(), moderated_at: None, events: vec![],
        };
        review.events.push(DomainEvent::Review(ReviewEvent::Submitted { review_id: id, book_id }));
        Ok(review)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn book_id(&self) -> Uuid { self.book_id }
    pub fn user_id(&self) -> &str { &self.user_id }
    pub fn rating(&self) -> Rating { self.rating }
    pub fn comment(&self) -> Option<&str> { self.comment.as_deref() }
    pub fn status(&self) -> ReviewStatus { self.status }
    pub fn moderation_note(&self) -> Option<&str> { self.moderation_note.as_deref() }

    pub fn approve(&mut self) -> Result<(), ReviewError> {
        self.moderate(ReviewStatus::Approved, None)?;
        self.events.push(DomainEvent::Review(ReviewEvent::Approved { review_id: self.id, book_id: self.book_id }));
        Ok(())
    }

    pub fn reject(&mut self, note: Option<String>) -> Result<(), ReviewError> {
        self.moderate(ReviewStatus::Rejected, note)?;
        self.events.push(DomainEvent::Review(ReviewEvent::Rejected { review_id: self.id, book_id: self.book_id }));
        Ok(())
    }

    fn moderate(&mut self, status: ReviewStatus, note: Option<String>) -> Result<(), ReviewError> {
        if self.status != ReviewStatus::Pending { return Err(ReviewError::AlreadyModerated(self.status)); }
        self.status = status;
        self.moderation_note = note;
        self.moderated_at = Some(Utc::now());
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
}

/// Mean rating of the approved reviews, to one decimal place.
pub fn average_rating(reviews: &[Review]) -> Option<Decimal> {
    let approved: Vec<_> = reviews.iter().filter(|r| r.status == ReviewStatus::Approved).collect();
    if approved.is_empty() { return None; }
    let sum: u32 = approved.iter().map(|r| u32::from(r.rating.value())).sum();
    Some((Decimal::from(sum) / Decimal::from(approved.len() as u32)).round_dp(1))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("Comment exceeds 2000 characters")]
    CommentTooLong,
    #[error("Review was already moderated ({0:?})")]
    AlreadyModerated(ReviewStatus),
    #[error("You have already reviewed this book")]
    Duplicate,
}
