use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurveyStatus {
    #[default]
    Draft,
    Active,
    Closed,
    Archived,
}

impl SurveyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyStatus::Draft => "DRAFT",
            SurveyStatus::Active => "ACTIVE",
            SurveyStatus::Closed => "CLOSED",
            SurveyStatus::Archived => "ARCHIVED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    MultipleChoice,
    Text,
    Rating,
    YesNo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetAudienceType {
    #[default]
    All,
    Branch,
    Group,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextType {
    #[default]
    Short,
    Long,
    Email,
    Number,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub allow_multiple: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rating: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_type: Option<TextType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_limit: Option<usize>,
}

impl SurveyQuestion {
    /// Rating bounds, 1..=5 unless configured
    pub fn rating_range(&self) -> (i64, i64) {
        (self.min_rating.unwrap_or(1), self.max_rating.unwrap_or(5))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub id: String,
    pub church_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    pub created_by: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: SurveyStatus,
    pub is_anonymous: bool,
    pub allow_multiple_responses: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub target_audience_type: TargetAudienceType,
    #[serde(default)]
    pub target_branch_ids: Vec<String>,
    #[serde(default)]
    pub target_group_ids: Vec<String>,
    #[serde(default)]
    pub target_user_ids: Vec<String>,
    #[serde(default)]
    pub send_on_publish: bool,
    #[serde(default)]
    pub send_reminders: bool,
    #[serde(default)]
    pub reminder_days: Vec<i64>,
    pub questions: Vec<SurveyQuestion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

document!(Survey, "surveys");

impl Survey {
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| now > d)
    }

    /// Whether a user with the given branch and unit memberships is targeted
    pub fn targets(&self, user_id: &str, branch_id: Option<&str>, unit_ids: &[String]) -> bool {
        match self.target_audience_type {
            TargetAudienceType::All => true,
            TargetAudienceType::Branch => {
                branch_id.is_some_and(|b| self.target_branch_ids.iter().any(|t| t == b))
            }
            TargetAudienceType::Group => self.target_group_ids.iter().any(|g| unit_ids.contains(g)),
            TargetAudienceType::Custom => self.target_user_ids.iter().any(|u| u == user_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnswer {
    pub question_id: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    pub id: String,
    pub survey_id: String,
    pub church_id: String,
    /// Absent on anonymous surveys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub answers: Vec<QuestionAnswer>,
}

document!(SurveyResponse, "surveyResponses");

/// What a role may do with surveys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyPermissions {
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_view_results: bool,
    pub can_export_results: bool,
    pub can_manage_templates: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub allow_multiple: bool,
    pub min_rating: Option<i64>,
    pub max_rating: Option<i64>,
    pub text_type: Option<TextType>,
    pub character_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveySettings {
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub allow_multiple_responses: bool,
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub target_audience_type: TargetAudienceType,
    #[serde(default)]
    pub target_branch_ids: Vec<String>,
    #[serde(default)]
    pub target_group_ids: Vec<String>,
    #[serde(default)]
    pub target_user_ids: Vec<String>,
    #[serde(default)]
    pub send_on_publish: bool,
    #[serde(default)]
    pub send_reminders: bool,
    #[serde(default)]
    pub reminder_days: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSurvey {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<NewQuestion>,
    #[serde(default)]
    pub settings: SurveySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    #[serde(default)]
    pub question_id: String,
    #[serde(default)]
    pub value: Value,
    pub text_value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub responses: Vec<AnswerInput>,
}

/// Where a submission came from
#[derive(Debug, Clone, Default)]
pub struct SubmissionOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// An active survey as listed to a respondent
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyListing {
    #[serde(flatten)]
    pub survey: Survey,
    pub has_responded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey(kind: TargetAudienceType) -> Survey {
        let now = Utc::now();
        Survey {
            id: "s1".into(),
            church_id: "c1".into(),
            branch_id: None,
            created_by: "u1".into(),
            title: "Feedback".into(),
            description: None,
            status: SurveyStatus::Active,
            is_anonymous: false,
            allow_multiple_responses: false,
            deadline: None,
            target_audience_type: kind,
            target_branch_ids: vec!["b1".into()],
            target_group_ids: vec!["g1".into()],
            target_user_ids: vec!["u9".into()],
            send_on_publish: false,
            send_reminders: false,
            reminder_days: vec![],
            questions: vec![],
            created_at: now,
            updated_at: now,
            published_at: None,
            closed_at: None,
        }
    }

    #[test]
    fn test_audience_targeting() {
        assert!(survey(TargetAudienceType::All).targets("u1", None, &[]));

        let by_branch = survey(TargetAudienceType::Branch);
        assert!(by_branch.targets("u1", Some("b1"), &[]));
        assert!(!by_branch.targets("u1", Some("b2"), &[]));
        assert!(!by_branch.targets("u1", None, &[]));

        let by_group = survey(TargetAudienceType::Group);
        assert!(by_group.targets("u1", None, &["g0".into(), "g1".into()]));
        assert!(!by_group.targets("u1", None, &["g0".into()]));

        let custom = survey(TargetAudienceType::Custom);
        assert!(custom.targets("u9", None, &[]));
        assert!(!custom.targets("u1", None, &[]));
    }

    #[test]
    fn test_question_wire_format() {
        let q: SurveyQuestion = serde_json::from_value(serde_json::json!({
            "id": "q1",
            "type": "YES_NO",
            "title": "Attending?",
            "order": 0
        }))
        .unwrap();
        assert_eq!(q.question_type, QuestionType::YesNo);
        assert!(!q.required);
        assert_eq!(q.rating_range(), (1, 5));
    }
}
