use super::analytics::{compute_analytics, SurveyAnalytics};
use super::model::{
    NewQuestion, NewSurvey, QuestionAnswer, SubmissionOrigin, SubmitResponse, Survey,
    SurveyListing, SurveyPermissions, SurveyQuestion, SurveyResponse, SurveySettings, SurveyStatus,
};
use super::validation::{sanitize_answers, validate_answers, validate_new_survey};
use crate::access::AccessContext;
use crate::units::UnitMembership;
use chrono::Utc;
use ecclesia_auth::UserRole;
use ecclesia_core::{new_id, AppError, AppResult};
use ecclesia_store::{Direction, DocumentStore, Query, Repository};
use std::sync::Arc;

/// Roles that author surveys and read their results
pub const SURVEY_AUTHORS: [UserRole; 5] = [
    UserRole::Admin,
    UserRole::SuperAdmin,
    UserRole::Pastor,
    UserRole::BranchAdmin,
    UserRole::Leader,
];

pub fn survey_permissions(role: UserRole) -> SurveyPermissions {
    let author = SURVEY_AUTHORS.contains(&role);
    SurveyPermissions {
        can_create: author,
        can_edit: author,
        can_delete: author,
        can_view_results: author,
        can_export_results: author,
        can_manage_templates: UserRole::CHURCH_ADMINS.contains(&role),
    }
}

fn clean_ids(ids: Vec<String>) -> Vec<String> {
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

fn build_question(index: usize, input: NewQuestion) -> AppResult<SurveyQuestion> {
    let question_type = input
        .question_type
        .ok_or_else(|| AppError::bad_request("Invalid question type"))?;
    Ok(SurveyQuestion {
        id: new_id(),
        question_type,
        title: input.title.trim().to_string(),
        description: input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        required: input.required,
        order: index as u32,
        options: input.options.into_iter().map(|o| o.trim().to_string()).collect(),
        allow_multiple: input.allow_multiple,
        min_rating: input.min_rating,
        max_rating: input.max_rating,
        text_type: input.text_type,
        character_limit: input.character_limit,
    })
}

#[derive(Clone)]
pub struct SurveyService {
    surveys: Repository<Survey>,
    responses: Repository<SurveyResponse>,
    memberships: Repository<UnitMembership>,
}

impl SurveyService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            surveys: Repository::new(Arc::clone(&store)),
            responses: Repository::new(Arc::clone(&store)),
            memberships: Repository::new(store),
        }
    }

    /// New DRAFT survey owned by the caller
    pub async fn create(&self, ctx: &AccessContext, input: NewSurvey) -> AppResult<Survey> {
        ctx.require_role(&SURVEY_AUTHORS)?;
        let church_id = ctx.church_id()?;

        let errors = validate_new_survey(&input, Utc::now());
        if !errors.is_empty() {
            return Err(AppError::validation(errors));
        }

        let NewSurvey {
            title,
            description,
            questions,
            settings,
        } = input;
        let SurveySettings {
            is_anonymous,
            allow_multiple_responses,
            deadline,
            target_audience_type,
            target_branch_ids,
            target_group_ids,
            target_user_ids,
            send_on_publish,
            send_reminders,
            reminder_days,
        } = settings;

        let questions = questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| build_question(i, q))
            .collect::<AppResult<Vec<_>>>()?;

        let now = Utc::now();
        let survey = Survey {
            id: new_id(),
            church_id: church_id.to_string(),
            branch_id: ctx.user.branch_id.clone(),
            created_by: ctx.user_id().to_string(),
            title: title.trim().to_string(),
            description: description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            status: SurveyStatus::Draft,
            is_anonymous,
            allow_multiple_responses,
            deadline,
            target_audience_type,
            target_branch_ids: clean_ids(target_branch_ids),
            target_group_ids: clean_ids(target_group_ids),
            target_user_ids: clean_ids(target_user_ids),
            send_on_publish,
            send_reminders,
            reminder_days,
            questions,
            created_at: now,
            updated_at: now,
            published_at: None,
            closed_at: None,
        };
        self.surveys.save(&survey).await?;
        tracing::info!(church_id = %church_id, survey_id = %survey.id, questions = survey.questions.len(), "survey created");
        Ok(survey)
    }

    pub async fn get(&self, ctx: &AccessContext, survey_id: &str) -> AppResult<Survey> {
        let church_id = ctx.church_id()?;
        self.surveys
            .find_by_id(survey_id)
            .await?
            .filter(|s| s.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Survey"))
    }

    async fn get_own(&self, ctx: &AccessContext, survey_id: &str, action: &str) -> AppResult<Survey> {
        let survey = self.get(ctx, survey_id).await?;
        if survey.created_by != ctx.user_id() {
            return Err(AppError::forbidden(format!("Unauthorized to {} this survey", action)));
        }
        Ok(survey)
    }

    /// Surveys the caller created, newest first
    pub async fn list_managed(&self, ctx: &AccessContext) -> AppResult<Vec<Survey>> {
        let query = Query::church(ctx.church_id()?)
            .filter("createdBy", ctx.user_id())
            .newest_first();
        Ok(self.surveys.find_many(query).await?)
    }

    async fn unit_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .memberships
            .find_many(Query::new().filter("userId", user_id))
            .await?
            .into_iter()
            .map(|m| m.unit_id)
            .collect())
    }

    async fn has_responded(&self, survey_id: &str, user_id: &str) -> AppResult<bool> {
        let count = self
            .responses
            .count(
                Query::new()
                    .filter("surveyId", survey_id)
                    .filter("userId", user_id),
            )
            .await?;
        Ok(count > 0)
    }

    /// Active surveys addressed to the caller
    pub async fn list_for_user(&self, ctx: &AccessContext) -> AppResult<Vec<SurveyListing>> {
        let church_id = ctx.church_id()?;
        let units = self.unit_ids(ctx.user_id()).await?;
        let active = self
            .surveys
            .find_many(
                Query::church(church_id)
                    .filter("status", SurveyStatus::Active.as_str())
                    .newest_first(),
            )
            .await?;

        let mut listings = Vec::new();
        for survey in active {
            if !survey.targets(ctx.user_id(), ctx.user.branch_id.as_deref(), &units) {
                continue;
            }
            let has_responded = !survey.is_anonymous && self.has_responded(&survey.id, ctx.user_id()).await?;
            listings.push(SurveyListing {
                survey,
                has_responded,
            });
        }
        Ok(listings)
    }

    pub async fn publish(&self, ctx: &AccessContext, survey_id: &str) -> AppResult<Survey> {
        let mut survey = self.get_own(ctx, survey_id, "publish").await?;
        if survey.status != SurveyStatus::Draft {
            return Err(AppError::bad_request("Only draft surveys can be published"));
        }
        let now = Utc::now();
        survey.status = SurveyStatus::Active;
        survey.published_at = Some(now);
        survey.updated_at = now;
        self.surveys.save(&survey).await?;
        tracing::info!(survey_id = %survey.id, "survey published");
        Ok(survey)
    }

    pub async fn close(&self, ctx: &AccessContext, survey_id: &str) -> AppResult<Survey> {
        let mut survey = self.get_own(ctx, survey_id, "close").await?;
        if survey.status != SurveyStatus::Active {
            return Err(AppError::bad_request("Only active surveys can be closed"));
        }
        let now = Utc::now();
        survey.status = SurveyStatus::Closed;
        survey.closed_at = Some(now);
        survey.updated_at = now;
        self.surveys.save(&survey).await?;
        tracing::info!(survey_id = %survey.id, "survey closed");
        Ok(survey)
    }

    pub async fn delete(&self, ctx: &AccessContext, survey_id: &str) -> AppResult<()> {
        let survey = self.get_own(ctx, survey_id, "delete").await?;
        if survey.status == SurveyStatus::Active {
            return Err(AppError::bad_request(
                "Cannot delete active survey. Close it first.",
            ));
        }
        self.surveys.delete(&survey.id).await?;
        tracing::info!(survey_id = %survey.id, "survey deleted");
        Ok(())
    }

    /// Copy as a new DRAFT owned by the caller
    pub async fn duplicate(&self, ctx: &AccessContext, survey_id: &str) -> AppResult<Survey> {
        ctx.require_role(&SURVEY_AUTHORS)?;
        let original = self.get(ctx, survey_id).await?;
        let now = Utc::now();
        let copy = Survey {
            id: new_id(),
            created_by: ctx.user_id().to_string(),
            title: format!("{} (Copy)", original.title),
            status: SurveyStatus::Draft,
            deadline: None,
            questions: original
                .questions
                .iter()
                .map(|q| SurveyQuestion {
                    id: new_id(),
                    ..q.clone()
                })
                .collect(),
            created_at: now,
            updated_at: now,
            published_at: None,
            closed_at: None,
            ..original
        };
        self.surveys.save(&copy).await?;
        tracing::info!(survey_id = %copy.id, source = %survey_id, "survey duplicated");
        Ok(copy)
    }

    pub async fn submit_response(
        &self,
        ctx: &AccessContext,
        survey_id: &str,
        mut input: SubmitResponse,
        origin: SubmissionOrigin,
    ) -> AppResult<SurveyResponse> {
        let survey = self.get(ctx, survey_id).await?;
        if survey.status != SurveyStatus::Active {
            return Err(AppError::bad_request("Survey is not active"));
        }
        let now = Utc::now();
        if survey.is_past_deadline(now) {
            return Err(AppError::bad_request("Survey deadline has passed"));
        }
        let units = self.unit_ids(ctx.user_id()).await?;
        if !survey.targets(ctx.user_id(), ctx.user.branch_id.as_deref(), &units) {
            return Err(AppError::forbidden("You are not in this survey's audience"));
        }

        if !survey.allow_multiple_responses {
            let duplicate = if survey.is_anonymous {
                match origin.ip_address.as_deref() {
                    Some(ip) => {
                        self.responses
                            .count(
                                Query::new()
                                    .filter("surveyId", survey.id.as_str())
                                    .filter("ipAddress", ip),
                            )
                            .await?
                            > 0
                    }
                    None => false,
                }
            } else {
                self.has_responded(&survey.id, ctx.user_id()).await?
            };
            if duplicate {
                return Err(AppError::conflict("You have already responded to this survey"));
            }
        }

        sanitize_answers(&mut input.responses);
        let errors = validate_answers(&survey.questions, &input.responses);
        if !errors.is_empty() {
            return Err(AppError::validation(errors));
        }

        let answers = input
            .responses
            .into_iter()
            .filter(|a| survey.questions.iter().any(|q| q.id == a.question_id))
            .filter(|a| !a.value.is_null())
            .map(|a| QuestionAnswer {
                question_id: a.question_id,
                value: a.value,
                text_value: a.text_value.filter(|t| !t.is_empty()),
            })
            .collect();

        let response = SurveyResponse {
            id: new_id(),
            survey_id: survey.id.clone(),
            church_id: survey.church_id.clone(),
            user_id: (!survey.is_anonymous).then(|| ctx.user_id().to_string()),
            ip_address: origin.ip_address,
            user_agent: origin.user_agent,
            submitted_at: now,
            answers,
        };
        self.responses.save(&response).await?;
        tracing::info!(survey_id = %survey.id, response_id = %response.id, "survey response recorded");
        Ok(response)
    }

    /// Creator or CHURCH_ADMIN roles
    async fn get_for_results(&self, ctx: &AccessContext, survey_id: &str) -> AppResult<Survey> {
        let survey = self.get(ctx, survey_id).await?;
        if survey.created_by != ctx.user_id() && !ctx.role().is_church_admin() {
            return Err(AppError::forbidden("Unauthorized to view survey responses"));
        }
        Ok(survey)
    }

    pub async fn responses(&self, ctx: &AccessContext, survey_id: &str) -> AppResult<Vec<SurveyResponse>> {
        let survey = self.get_for_results(ctx, survey_id).await?;
        Ok(self
            .responses
            .find_many(
                Query::new()
                    .filter("surveyId", survey.id.as_str())
                    .order_by("submittedAt", Direction::Desc),
            )
            .await?)
    }

    pub async fn analytics(&self, ctx: &AccessContext, survey_id: &str) -> AppResult<SurveyAnalytics> {
        let survey = self.get_for_results(ctx, survey_id).await?;
        let responses = self
            .responses
            .find_many(Query::new().filter("surveyId", survey.id.as_str()))
            .await?;
        Ok(compute_analytics(&survey, &responses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_by_role() {
        let leader = survey_permissions(UserRole::Leader);
        assert!(leader.can_create && leader.can_view_results);
        assert!(!leader.can_manage_templates);

        assert!(survey_permissions(UserRole::Pastor).can_manage_templates);
        assert!(!survey_permissions(UserRole::Member).can_create);
        assert!(!survey_permissions(UserRole::Volunteer).can_delete);
    }
}
