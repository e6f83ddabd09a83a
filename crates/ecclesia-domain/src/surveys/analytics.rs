//! Aggregates over a survey's responses

use super::model::{QuestionType, Survey, SurveyResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// `YYYY-MM-DD`
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBreakdown {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_counts: Option<BTreeMap<String, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_distribution: Option<BTreeMap<String, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_response_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yes_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnalytics {
    pub question_id: String,
    pub question_title: String,
    pub question_type: QuestionType,
    pub total_responses: u64,
    pub response_breakdown: ResponseBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyAnalytics {
    pub survey_id: String,
    pub total_responses: u64,
    pub unique_respondents: u64,
    pub first_response_at: Option<DateTime<Utc>>,
    pub last_response_at: Option<DateTime<Utc>>,
    pub response_trend: Vec<TrendPoint>,
    pub question_analytics: Vec<QuestionAnalytics>,
}

/// Respondent identity: user id, else IP address, else the response itself
fn respondent_key(response: &SurveyResponse) -> String {
    response
        .user_id
        .as_ref()
        .map(|u| format!("user:{}", u))
        .or_else(|| response.ip_address.as_ref().map(|ip| format!("ip:{}", ip)))
        .unwrap_or_else(|| format!("response:{}", response.id))
}

pub fn compute_analytics(survey: &Survey, responses: &[SurveyResponse]) -> SurveyAnalytics {
    let unique: HashSet<String> = responses.iter().map(respondent_key).collect();

    let mut per_day: BTreeMap<String, u64> = BTreeMap::new();
    for response in responses {
        *per_day
            .entry(response.submitted_at.format("%Y-%m-%d").to_string())
            .or_default() += 1;
    }

    let mut questions: Vec<_> = survey.questions.iter().collect();
    questions.sort_by_key(|q| q.order);

    let question_analytics = questions
        .into_iter()
        .map(|question| {
            let values: Vec<&Value> = responses
                .iter()
                .filter_map(|r| r.answers.iter().find(|a| a.question_id == question.id))
                .map(|a| &a.value)
                .filter(|v| !v.is_null())
                .collect();
            QuestionAnalytics {
                question_id: question.id.clone(),
                question_title: question.title.clone(),
                question_type: question.question_type,
                total_responses: values.len() as u64,
                response_breakdown: breakdown(question.question_type, &question.options, &values),
            }
        })
        .collect();

    SurveyAnalytics {
        survey_id: survey.id.clone(),
        total_responses: responses.len() as u64,
        unique_respondents: unique.len() as u64,
        first_response_at: responses.iter().map(|r| r.submitted_at).min(),
        last_response_at: responses.iter().map(|r| r.submitted_at).max(),
        response_trend: per_day
            .into_iter()
            .map(|(date, count)| TrendPoint { date, count })
            .collect(),
        question_analytics,
    }
}

fn breakdown(kind: QuestionType, options: &[String], values: &[&Value]) -> ResponseBreakdown {
    match kind {
        QuestionType::MultipleChoice => {
            let mut counts: BTreeMap<String, u64> =
                options.iter().map(|o| (o.clone(), 0)).collect();
            for value in values {
                let chosen: Vec<&str> = match value {
                    Value::String(s) => vec![s.as_str()],
                    Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                    _ => Vec::new(),
                };
                for option in chosen {
                    *counts.entry(option.to_string()).or_default() += 1;
                }
            }
            ResponseBreakdown {
                option_counts: Some(counts),
                ..Default::default()
            }
        }
        QuestionType::Rating => {
            let ratings: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
            let mut distribution: BTreeMap<String, u64> = BTreeMap::new();
            for rating in &ratings {
                *distribution.entry(rating.to_string()).or_default() += 1;
            }
            let average = if ratings.is_empty() {
                None
            } else {
                Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
            };
            ResponseBreakdown {
                average_rating: average,
                rating_distribution: Some(distribution),
                ..Default::default()
            }
        }
        QuestionType::Text => ResponseBreakdown {
            text_response_count: Some(
                values
                    .iter()
                    .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
                    .count() as u64,
            ),
            ..Default::default()
        },
        QuestionType::YesNo => ResponseBreakdown {
            yes_count: Some(values.iter().filter(|v| v.as_bool() == Some(true)).count() as u64),
            no_count: Some(values.iter().filter(|v| v.as_bool() == Some(false)).count() as u64),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surveys::model::{QuestionAnswer, SurveyQuestion, SurveyStatus, TargetAudienceType};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn question(id: &str, kind: QuestionType, order: u32) -> SurveyQuestion {
        SurveyQuestion {
            id: id.into(),
            question_type: kind,
            title: id.into(),
            description: None,
            required: false,
            order,
            options: vec!["A".into(), "B".into()],
            allow_multiple: true,
            min_rating: Some(1),
            max_rating: Some(5),
            text_type: None,
            character_limit: None,
        }
    }

    fn response(id: &str, user: Option<&str>, at: DateTime<Utc>, answers: Vec<(&str, Value)>) -> SurveyResponse {
        SurveyResponse {
            id: id.into(),
            survey_id: "s1".into(),
            church_id: "c1".into(),
            user_id: user.map(str::to_string),
            ip_address: None,
            user_agent: None,
            submitted_at: at,
            answers: answers
                .into_iter()
                .map(|(q, value)| QuestionAnswer {
                    question_id: q.into(),
                    value,
                    text_value: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_compute_analytics() {
        let now = Utc.with_ymd_and_hms(2025, 3, 2, 10, 0, 0).unwrap();
        let survey = Survey {
            id: "s1".into(),
            church_id: "c1".into(),
            branch_id: None,
            created_by: "u1".into(),
            title: "Feedback".into(),
            description: None,
            status: SurveyStatus::Active,
            is_anonymous: false,
            allow_multiple_responses: true,
            deadline: None,
            target_audience_type: TargetAudienceType::All,
            target_branch_ids: vec![],
            target_group_ids: vec![],
            target_user_ids: vec![],
            send_on_publish: false,
            send_reminders: false,
            reminder_days: vec![],
            questions: vec![
                question("yn", QuestionType::YesNo, 3),
                question("mc", QuestionType::MultipleChoice, 0),
                question("rate", QuestionType::Rating, 1),
                question("text", QuestionType::Text, 2),
            ],
            created_at: now,
            updated_at: now,
            published_at: None,
            closed_at: None,
        };
        let responses = vec![
            response(
                "r1",
                Some("u2"),
                now - Duration::days(1),
                vec![("mc", json!(["A", "B"])), ("rate", json!(4)), ("yn", json!(true))],
            ),
            response(
                "r2",
                Some("u2"),
                now,
                vec![("mc", json!("A")), ("rate", json!(2)), ("text", json!("great")), ("yn", json!(false))],
            ),
            response("r3", None, now, vec![("yn", json!(true))]),
        ];

        let analytics = compute_analytics(&survey, &responses);
        assert_eq!(analytics.total_responses, 3);
        assert_eq!(analytics.unique_respondents, 2);
        assert_eq!(analytics.first_response_at, Some(now - Duration::days(1)));
        assert_eq!(analytics.last_response_at, Some(now));
        assert_eq!(
            analytics.response_trend,
            vec![
                TrendPoint { date: "2025-03-01".into(), count: 1 },
                TrendPoint { date: "2025-03-02".into(), count: 2 },
            ]
        );

        let ids: Vec<&str> = analytics
            .question_analytics
            .iter()
            .map(|q| q.question_id.as_str())
            .collect();
        assert_eq!(ids, vec!["mc", "rate", "text", "yn"]);

        let mc = &analytics.question_analytics[0].response_breakdown;
        let counts = mc.option_counts.as_ref().unwrap();
        assert_eq!(counts["A"], 2);
        assert_eq!(counts["B"], 1);

        let rating = &analytics.question_analytics[1].response_breakdown;
        assert_eq!(rating.average_rating, Some(3.0));

        assert_eq!(analytics.question_analytics[2].response_breakdown.text_response_count, Some(1));

        let yn = &analytics.question_analytics[3];
        assert_eq!(yn.total_responses, 3);
        assert_eq!(yn.response_breakdown.yes_count, Some(2));
        assert_eq!(yn.response_breakdown.no_count, Some(1));
    }
}
