use tracing::info;

use super::domain::{
    validate_rating, Actor, ApplicationStatus, JobId, Rating, RatingCategory, UserId, UNRATED,
};
use super::error::PortalError;
use super::store::{ApplicationFilter, StatusSet, StoreTransaction};

/// Keeps one rating per (category, sender, receiver) and the receiver's average in sync.
#[derive(Debug, Clone, Copy, Default)]
pub struct RatingAggregator;

impl RatingAggregator {
    pub fn submit(
        &self,
        tx: &mut dyn StoreTransaction,
        actor: Actor,
        receiver_id: i64,
        value: f64,
    ) -> Result<Rating, PortalError> {
        let value = validate_rating(value)?;
        let category = RatingCategory::rated_by(actor.role);

        let eligibility = match category {
            RatingCategory::Applicant => {
                let applicant = UserId(receiver_id);
                if tx.find_applicant_profile(applicant)?.is_none() {
                    return Err(PortalError::not_found("applicant", receiver_id));
                }
                ApplicationFilter::default()
                    .recruiter(actor.id)
                    .applicant(applicant)
            }
            RatingCategory::Job => {
                let job = JobId(receiver_id);
                if tx.find_job(job)?.is_none() {
                    return Err(PortalError::not_found("job", receiver_id));
                }
                ApplicationFilter::default().applicant(actor.id).job(job)
            }
        };
        let eligibility =
            eligibility.statuses(StatusSet::Only(ApplicationStatus::EMPLOYED.to_vec()));
        if tx.count_applications(&eligibility)? == 0 {
            return Err(PortalError::NotEligibleToRate);
        }

        let rating = Rating {
            category,
            sender_id: actor.id,
            receiver_id,
            value,
        };
        tx.upsert_rating(&rating)?;

        let average = tx
            .average_rating(category, receiver_id)?
            .unwrap_or(UNRATED);
        match category {
            RatingCategory::Applicant => tx.set_applicant_rating(UserId(receiver_id), average)?,
            RatingCategory::Job => {
                let job_id = JobId(receiver_id);
                let mut job = tx
                    .find_job(job_id)?
                    .ok_or_else(|| PortalError::not_found("job", receiver_id))?;
                job.rating = average;
                tx.update_job(&job)?;
            }
        }

        let ratings = tx.count_ratings(category, receiver_id)?;
        info!(%category, receiver_id, average, ratings, "rating recomputed");
        Ok(rating)
    }

    /// The value `sender` gave `receiver`, or the unrated sentinel.
    pub fn lookup(
        &self,
        tx: &mut dyn StoreTransaction,
        sender: UserId,
        receiver_id: i64,
        category: RatingCategory,
    ) -> Result<f64, PortalError> {
        Ok(tx
            .find_rating(category, sender, receiver_id)?
            .map_or(UNRATED, |rating| rating.value))
    }
}
