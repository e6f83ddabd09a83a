//! Survey definition and response checks
//!
//! Both passes collect every problem instead of stopping at the first one.

use super::model::{
    AnswerInput, NewQuestion, NewSurvey, QuestionType, SurveyQuestion, SurveySettings,
    TargetAudienceType, TextType,
};
use chrono::{DateTime, Utc};
use ecclesia_core::FieldError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_QUESTIONS: usize = 50;
pub const MAX_QUESTION_TITLE_LEN: usize = 300;
pub const MAX_QUESTION_DESCRIPTION_LEN: usize = 500;
pub const MAX_OPTION_LEN: usize = 200;
pub const MAX_CUSTOM_AUDIENCE: usize = 1000;

static EMAIL: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

fn is_email(text: &str) -> bool {
    EMAIL.as_ref().is_some_and(|re| re.is_match(text))
}

fn too_long(len: usize, max: usize) -> bool {
    len >= max
}

pub fn validate_new_survey(input: &NewSurvey, now: DateTime<Utc>) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let title = input.title.trim();
    if title.is_empty() {
        errors.push(FieldError::new("title", "Survey title is required", "required"));
    } else if too_long(input.title.chars().count(), MAX_TITLE_LEN) {
        errors.push(FieldError::new(
            "title",
            "Survey title must be less than 200 characters",
            "too_long",
        ));
    }
    if let Some(description) = &input.description {
        if too_long(description.chars().count(), MAX_DESCRIPTION_LEN) {
            errors.push(FieldError::new(
                "description",
                "Survey description must be less than 1000 characters",
                "too_long",
            ));
        }
    }

    if input.questions.is_empty() {
        errors.push(FieldError::new(
            "questions",
            "Survey must have at least one question",
            "required",
        ));
    } else if input.questions.len() > MAX_QUESTIONS {
        errors.push(FieldError::new(
            "questions",
            "Survey cannot have more than 50 questions",
            "too_many",
        ));
    } else {
        for (index, question) in input.questions.iter().enumerate() {
            validate_question(question, index, &mut errors);
        }
    }

    validate_settings(&input.settings, now, &mut errors);
    errors
}

fn validate_question(question: &NewQuestion, index: usize, errors: &mut Vec<FieldError>) {
    let field = |name: &str| format!("questions[{}].{}", index, name);
    let prefix = format!("Question {}:", index + 1);

    if question.title.trim().is_empty() {
        errors.push(FieldError::new(field("title"), format!("{} Title is required", prefix), "required"));
    } else if too_long(question.title.chars().count(), MAX_QUESTION_TITLE_LEN) {
        errors.push(FieldError::new(
            field("title"),
            format!("{} Title must be less than 300 characters", prefix),
            "too_long",
        ));
    }
    if let Some(description) = &question.description {
        if too_long(description.chars().count(), MAX_QUESTION_DESCRIPTION_LEN) {
            errors.push(FieldError::new(
                field("description"),
                format!("{} Description must be less than 500 characters", prefix),
                "too_long",
            ));
        }
    }

    let Some(kind) = question.question_type else {
        errors.push(FieldError::new(field("type"), format!("{} Invalid question type", prefix), "invalid"));
        return;
    };

    match kind {
        QuestionType::MultipleChoice => {
            if question.options.len() < 2 {
                errors.push(FieldError::new(
                    field("options"),
                    format!("{} Multiple choice questions must have at least 2 options", prefix),
                    "too_few",
                ));
            } else if question.options.len() > 10 {
                errors.push(FieldError::new(
                    field("options"),
                    format!("{} Multiple choice questions cannot have more than 10 options", prefix),
                    "too_many",
                ));
            } else {
                for (i, option) in question.options.iter().enumerate() {
                    if option.trim().is_empty() {
                        errors.push(FieldError::new(
                            format!("questions[{}].options[{}]", index, i),
                            format!("{} Option {} text is required", prefix, i + 1),
                            "required",
                        ));
                    } else if too_long(option.chars().count(), MAX_OPTION_LEN) {
                        errors.push(FieldError::new(
                            format!("questions[{}].options[{}]", index, i),
                            format!("{} Option {} text must be less than 200 characters", prefix, i + 1),
                            "too_long",
                        ));
                    }
                }
            }
        }
        QuestionType::Rating => match (question.min_rating, question.max_rating) {
            (Some(min), Some(max)) if min != 0 && max != 0 => {
                if min >= max {
                    errors.push(FieldError::new(
                        field("minRating"),
                        format!("{} Min rating must be less than max rating", prefix),
                        "out_of_range",
                    ));
                } else if min < 1 || max > 10 {
                    errors.push(FieldError::new(
                        field("maxRating"),
                        format!("{} Rating scale must be between 1 and 10", prefix),
                        "out_of_range",
                    ));
                }
            }
            _ => errors.push(FieldError::new(
                field("minRating"),
                format!("{} Rating questions must have min and max rating values", prefix),
                "required",
            )),
        },
        QuestionType::Text | QuestionType::YesNo => {}
    }
}

fn validate_settings(settings: &SurveySettings, now: DateTime<Utc>, errors: &mut Vec<FieldError>) {
    if settings.deadline.is_some_and(|d| d <= now) {
        errors.push(FieldError::new(
            "settings.deadline",
            "Survey deadline must be in the future",
            "out_of_range",
        ));
    }

    let non_empty = |ids: &[String]| ids.iter().any(|id| !id.trim().is_empty());
    match settings.target_audience_type {
        TargetAudienceType::All => {}
        TargetAudienceType::Branch if !non_empty(&settings.target_branch_ids) => {
            errors.push(FieldError::new(
                "settings.targetBranchIds",
                "Branch target audience requires at least one branch",
                "required",
            ));
        }
        TargetAudienceType::Group if !non_empty(&settings.target_group_ids) => {
            errors.push(FieldError::new(
                "settings.targetGroupIds",
                "Group target audience requires at least one group",
                "required",
            ));
        }
        TargetAudienceType::Custom if !non_empty(&settings.target_user_ids) => {
            errors.push(FieldError::new(
                "settings.targetUserIds",
                "Custom target audience requires at least one user",
                "required",
            ));
        }
        TargetAudienceType::Custom if settings.target_user_ids.len() > MAX_CUSTOM_AUDIENCE => {
            errors.push(FieldError::new(
                "settings.targetUserIds",
                "Custom target audience cannot have more than 1000 users",
                "too_many",
            ));
        }
        _ => {}
    }

    if settings.send_reminders && settings.reminder_days.iter().any(|d| !(1..=30).contains(d)) {
        errors.push(FieldError::new(
            "settings.reminderDays",
            "Reminder days must be numbers between 1 and 30",
            "out_of_range",
        ));
    }
}

/// Trim string values in place
pub fn sanitize_answers(answers: &mut [AnswerInput]) {
    for answer in answers {
        answer.question_id = answer.question_id.trim().to_string();
        if let Value::String(s) = &mut answer.value {
            *s = s.trim().to_string();
        }
        if let Some(text) = answer.text_value.as_mut() {
            *text = text.trim().to_string();
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Check submitted answers against the survey's questions
///
/// Each error's `field` is the question id and `code` the failure kind
/// (`required`, `invalid_option`, `invalid_type`, `invalid_format`,
/// `character_limit_exceeded`, `out_of_range`).
pub fn validate_answers(questions: &[SurveyQuestion], answers: &[AnswerInput]) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for question in questions {
        let answer = answers.iter().find(|a| a.question_id == question.id);
        let value = answer.map(|a| &a.value).filter(|v| !is_blank(v));
        match value {
            None if question.required => errors.push(FieldError::new(
                question.id.as_str(),
                format!("Response required for question: {}", question.title),
                "required",
            )),
            None => {}
            Some(value) => {
                if let Some((code, message)) = check_value(question, value) {
                    errors.push(FieldError::new(question.id.as_str(), message, code));
                }
            }
        }
    }
    errors
}

fn check_value(question: &SurveyQuestion, value: &Value) -> Option<(&'static str, String)> {
    match question.question_type {
        QuestionType::MultipleChoice => {
            let chosen: Vec<&str> = match value {
                Value::String(s) => vec![s.as_str()],
                Value::Array(items) => {
                    let strings: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
                    match strings {
                        Some(s) => s,
                        None => {
                            return Some((
                                "invalid_type",
                                "Multiple choice response must be string or array".to_string(),
                            ))
                        }
                    }
                }
                _ => {
                    return Some((
                        "invalid_type",
                        "Multiple choice response must be string or array".to_string(),
                    ))
                }
            };
            let invalid: Vec<&str> = chosen
                .into_iter()
                .filter(|c| !question.options.iter().any(|o| o == c))
                .collect();
            if invalid.is_empty() {
                None
            } else {
                Some((
                    "invalid_option",
                    format!("Invalid options selected: {}", invalid.join(", ")),
                ))
            }
        }
        QuestionType::Text => {
            let Some(text) = value.as_str() else {
                return Some(("invalid_type", "Text response must be a string".to_string()));
            };
            if question.text_type == Some(TextType::Email) && !is_email(text) {
                return Some(("invalid_format", "Invalid email format".to_string()));
            }
            match question.character_limit {
                Some(limit) if limit > 0 && text.chars().count() > limit => Some((
                    "character_limit_exceeded",
                    format!("Response exceeds character limit of {}", limit),
                )),
                _ => None,
            }
        }
        QuestionType::Rating => {
            let Some(rating) = value.as_f64() else {
                return Some(("invalid_type", "Rating response must be a number".to_string()));
            };
            let (min, max) = question.rating_range();
            if rating < min as f64 || rating > max as f64 {
                Some(("out_of_range", format!("Rating must be between {} and {}", min, max)))
            } else {
                None
            }
        }
        QuestionType::YesNo => {
            if value.is_boolean() {
                None
            } else {
                Some(("invalid_type", "Yes/No response must be true or false".to_string()))
            }
        }
    }
}
