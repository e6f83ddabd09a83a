use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseAccess {
    #[default]
    Open,
    Request,
    Invite,
}

/// Lifecycle shared by courses and exams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub church_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub access_type: CourseAccess,
    #[serde(default)]
    pub mentors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: PublishStatus,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(Course, "digitalCourses");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseModule {
    pub id: String,
    pub church_id: String,
    pub course_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(CourseModule, "digitalCourseModules");

pub const DEFAULT_PASSING_SCORE: u32 = 70;

fn default_passing_score() -> u32 {
    DEFAULT_PASSING_SCORE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    pub church_id: String,
    pub course_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_minutes: Option<u32>,
    #[serde(default)]
    pub question_count: u32,
    pub status: PublishStatus,
    #[serde(default = "default_passing_score")]
    pub passing_score: u32,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(Exam, "digitalCourseExams");

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestion {
    pub id: String,
    pub church_id: String,
    pub exam_id: String,
    pub course_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    pub question: String,
    pub options: Vec<String>,
    pub correct_option: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(ExamQuestion, "digitalExamQuestions");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    #[default]
    Active,
    Completed,
    Withdrawn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub certificate_number: String,
    pub issued_at: DateTime<Utc>,
    pub student_name: String,
    pub course_title: String,
    pub church_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub church_id: String,
    pub course_id: String,
    pub user_id: String,
    pub status: EnrollmentStatus,
    pub progress_percent: u32,
    #[serde(default)]
    pub module_progress: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(Enrollment, "digitalCourseEnrollments");

impl Enrollment {
    /// Set overall progress; reaching 100 completes the enrollment once
    pub fn set_progress(&mut self, percent: i64, now: DateTime<Utc>) {
        let percent = percent.clamp(0, 100) as u32;
        self.progress_percent = percent;
        if percent == 100 && self.status != EnrollmentStatus::Completed {
            self.status = EnrollmentStatus::Completed;
            self.badge_issued_at.get_or_insert(now);
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRequestStatus {
    #[default]
    Pending,
    Approved,
    Declined,
    MoreInfo,
}

impl AccessRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRequestStatus::Pending => "pending",
            AccessRequestStatus::Approved => "approved",
            AccessRequestStatus::Declined => "declined",
            AccessRequestStatus::MoreInfo => "more_info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub id: String,
    pub church_id: String,
    pub course_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub status: AccessRequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(AccessRequest, "digitalCourseAccessRequests");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    #[default]
    InProgress,
    Submitted,
    Graded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedResponse {
    pub question_id: String,
    pub answer_index: i64,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamAttempt {
    pub id: String,
    pub church_id: String,
    pub exam_id: String,
    pub course_id: String,
    pub user_id: String,
    pub status: AttemptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub responses: Vec<GradedResponse>,
}

document!(ExamAttempt, "digitalExamAttempts");

/// `ECC-<YYYYMMDD>-<first 8 chars of the enrollment id, uppercased>`
pub fn certificate_number(enrollment_id: &str, issued_at: DateTime<Utc>) -> String {
    let suffix: String = enrollment_id.chars().take(8).collect();
    format!("ECC-{}-{}", issued_at.format("%Y%m%d"), suffix.to_uppercase())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    #[serde(default)]
    pub question_id: String,
    pub answer_index: i64,
}

/// Grade answers against the exam's questions
///
/// The score is the rounded share of questions answered correctly;
/// unanswered questions count as wrong.
pub fn grade(questions: &[ExamQuestion], answers: &[AnswerSubmission]) -> (Vec<GradedResponse>, u32, u32) {
    let graded: Vec<GradedResponse> = answers
        .iter()
        .map(|answer| {
            let correct = questions
                .iter()
                .find(|q| q.id == answer.question_id)
                .is_some_and(|q| q.correct_option as i64 == answer.answer_index);
            GradedResponse {
                question_id: answer.question_id.clone(),
                answer_index: answer.answer_index,
                correct,
            }
        })
        .collect();
    let total = questions.len() as u32;
    let correct = graded.iter().filter(|r| r.correct).count() as f64;
    let score = if total > 0 {
        (correct / total as f64 * 100.0).round() as u32
    } else {
        0
    };
    (graded, score, total)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    #[serde(default)]
    pub title: String,
    pub summary: Option<String>,
    pub access_type: Option<CourseAccess>,
    #[serde(default)]
    pub mentors: Vec<String>,
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: Option<PublishStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewModule {
    #[serde(default)]
    pub course_id: String,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub order: Option<u32>,
    pub estimated_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExam {
    #[serde(default)]
    pub course_id: String,
    pub module_id: Option<String>,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: Option<u32>,
    pub passing_score: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExamQuestion {
    #[serde(default)]
    pub exam_id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_option: Option<i64>,
    pub explanation: Option<String>,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollInput {
    #[serde(default)]
    pub course_id: String,
    /// Managers may enroll someone else
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub progress_percent: Option<i64>,
    #[serde(default)]
    pub module_progress: BTreeMap<String, i64>,
    pub status: Option<EnrollmentStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccessRequest {
    #[serde(default)]
    pub course_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub status: AccessRequestStatus,
    pub reviewer_note: Option<String>,
}
