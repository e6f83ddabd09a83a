//! Surveys: authoring, targeting, responses and analytics

pub mod analytics;
pub mod model;
pub mod service;
pub mod validation;

pub use analytics::{compute_analytics, QuestionAnalytics, ResponseBreakdown, SurveyAnalytics, TrendPoint};
pub use model::{
    AnswerInput, NewQuestion, NewSurvey, QuestionAnswer, QuestionType, SubmissionOrigin,
    SubmitResponse, Survey, SurveyListing, SurveyPermissions, SurveyQuestion, SurveyResponse,
    SurveySettings, SurveyStatus, TargetAudienceType, TextType,
};
pub use service::{survey_permissions, SurveyService, SURVEY_AUTHORS};
