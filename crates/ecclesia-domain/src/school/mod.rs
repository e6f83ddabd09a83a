//! Digital school: courses, exams, enrollment and certificates

pub mod model;
pub mod service;

pub use model::{
    certificate_number, grade, AccessDecision, AccessRequest, AccessRequestStatus, AnswerSubmission,
    AttemptStatus, Certificate, Course, CourseAccess, CourseModule, EnrollInput, Enrollment,
    EnrollmentStatus, Exam, ExamAttempt, ExamQuestion, GradedResponse, NewAccessRequest, NewCourse,
    NewExam, NewExamQuestion, NewModule, ProgressUpdate, PublishStatus, DEFAULT_PASSING_SCORE,
};
pub use service::SchoolService;
