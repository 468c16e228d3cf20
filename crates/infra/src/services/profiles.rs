use chrono::Utc;
use tracing::{info, instrument, warn};

use sextant_core::{AggregateRoot, PageRequest, ProfileId};
use sextant_profiles::{Candidate, Profile, ProfileSort, RequirementOutcome};

use super::{on_key, ServiceError, ServiceResult};
use crate::repository::ProfileRepository;

const ENTITY: &str = "profile";

/// Use cases over the profile aggregate.
#[derive(Debug, Clone)]
pub struct ProfileService<R> {
    repo: R,
}

impl<R> ProfileService<R>
where
    R: ProfileRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    #[instrument(skip(self), fields(profile_id = %id))]
    pub async fn get_by_id(&self, id: ProfileId) -> ServiceResult<Profile> {
        if id.is_nil() {
            return Err(ServiceError::not_found(ENTITY, id));
        }
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))
    }

    /// One page of profiles. An invalid page yields an empty list.
    #[instrument(skip(self))]
    pub async fn list(&self, sort_by: &str, page: PageRequest) -> ServiceResult<Vec<Profile>> {
        if !page.is_valid() {
            warn!(
                page_number = page.page_number,
                page_size = page.page_size,
                "invalid page request, returning no profiles"
            );
            return Ok(Vec::new());
        }
        Ok(self.repo.list(ProfileSort::parse(sort_by), page).await?)
    }

    #[instrument(skip(self, profile), fields(profile_name = %profile.name))]
    pub async fn add(&self, mut profile: Profile) -> ServiceResult<Profile> {
        profile.prepare_for_insert(Utc::now());
        profile.validate()?;

        self.repo.insert(&profile).await?;
        info!(profile_id = %profile.id, requirements = profile.data_requirements.len(), "profile created");
        Ok(profile)
    }

    /// Replace a stored profile. Owner and creation time are never taken
    /// from `incoming`.
    #[instrument(skip(self, incoming), fields(profile_id = %incoming.id))]
    pub async fn update(&self, incoming: Profile) -> ServiceResult<Profile> {
        let id = incoming.id;
        if id.is_nil() {
            return Err(ServiceError::invalid_argument("profile id must not be nil"));
        }

        let mut stored = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))?;

        stored.apply_update(incoming, Utc::now());
        stored.validate()?;

        self.repo.replace(&stored).await.map_err(on_key(ENTITY, id))?;
        info!(requirements = stored.data_requirements.len(), "profile updated");
        Ok(stored)
    }

    #[instrument(skip(self), fields(profile_id = %id))]
    pub async fn delete(&self, id: ProfileId) -> ServiceResult<()> {
        if id.is_nil() {
            return Err(ServiceError::invalid_argument("profile id must not be nil"));
        }
        self.repo.delete(id).await.map_err(on_key(ENTITY, id))?;
        info!("profile deleted");
        Ok(())
    }

    /// Match a stored profile's requirements against `candidates`.
    #[instrument(skip(self, candidates), fields(profile_id = %id, candidates = candidates.len()))]
    pub async fn evaluate(&self, id: ProfileId, candidates: &[Candidate]) -> ServiceResult<Vec<RequirementOutcome>> {
        let profile = self.get_by_id(id).await?;
        Ok(profile.evaluate(candidates)?)
    }
}
