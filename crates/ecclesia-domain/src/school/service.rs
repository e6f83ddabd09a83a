use super::model::{
    certificate_number, grade, AccessDecision, AccessRequest, AccessRequestStatus, AnswerSubmission,
    AttemptStatus, Certificate, Course, CourseAccess, CourseModule, EnrollInput, Enrollment,
    EnrollmentStatus, Exam, ExamAttempt, ExamQuestion, NewAccessRequest, NewCourse, NewExam,
    NewExamQuestion, NewModule, ProgressUpdate, PublishStatus, DEFAULT_PASSING_SCORE,
};
use crate::access::AccessContext;
use crate::tenancy::User;
use chrono::Utc;
use ecclesia_core::{new_id, AppError, AppResult};
use ecclesia_store::{Direction, DocumentStore, Query, Repository};
use std::collections::BTreeMap;
use std::sync::Arc;

const COURSE_LIST_LIMIT: usize = 50;

#[derive(Clone)]
pub struct SchoolService {
    courses: Repository<Course>,
    modules: Repository<CourseModule>,
    exams: Repository<Exam>,
    questions: Repository<ExamQuestion>,
    enrollments: Repository<Enrollment>,
    requests: Repository<AccessRequest>,
    attempts: Repository<ExamAttempt>,
    users: Repository<User>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Managers run every course; mentors run their own
fn can_manage(ctx: &AccessContext, course: &Course) -> bool {
    ctx.role().is_manager() || course.mentors.iter().any(|m| m == ctx.user_id())
}

fn require_manage(ctx: &AccessContext, course: &Course) -> AppResult<()> {
    if can_manage(ctx, course) {
        Ok(())
    } else {
        Err(AppError::insufficient_permissions())
    }
}

impl SchoolService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            courses: Repository::new(Arc::clone(&store)),
            modules: Repository::new(Arc::clone(&store)),
            exams: Repository::new(Arc::clone(&store)),
            questions: Repository::new(Arc::clone(&store)),
            enrollments: Repository::new(Arc::clone(&store)),
            requests: Repository::new(Arc::clone(&store)),
            attempts: Repository::new(Arc::clone(&store)),
            users: Repository::new(store),
        }
    }

    pub async fn get_course(&self, ctx: &AccessContext, course_id: &str) -> AppResult<Course> {
        let church_id = ctx.church_id()?;
        self.courses
            .find_by_id(course_id)
            .await?
            .filter(|c| c.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Course"))
    }

    /// Newest first; members only see published courses
    pub async fn list_courses(&self, ctx: &AccessContext) -> AppResult<Vec<Course>> {
        let mut query = Query::church(ctx.church_id()?).newest_first();
        if !ctx.role().is_manager() {
            query = query.filter("status", "published");
        }
        Ok(self.courses.find_many(query.limit(COURSE_LIST_LIMIT)).await?)
    }

    pub async fn create_course(&self, ctx: &AccessContext, input: NewCourse) -> AppResult<Course> {
        if !ctx.role().is_manager() {
            return Err(AppError::insufficient_permissions());
        }
        let church_id = ctx.church_id()?;
        let title = input.title.trim();
        if title.is_empty() {
            return Err(AppError::invalid_field("title", "Title is required"));
        }
        let now = Utc::now();
        let course = Course {
            id: new_id(),
            church_id: church_id.to_string(),
            title: title.to_string(),
            summary: non_empty(input.summary),
            access_type: input.access_type.unwrap_or_default(),
            mentors: input.mentors.into_iter().filter(|m| !m.is_empty()).collect(),
            estimated_hours: input.estimated_hours,
            tags: input.tags,
            status: input.status.unwrap_or_default(),
            created_by: ctx.user_id().to_string(),
            updated_by: ctx.user_id().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.courses.save(&course).await?;
        tracing::info!(church_id = %church_id, course_id = %course.id, "course created");
        Ok(course)
    }

    pub async fn list_modules(&self, ctx: &AccessContext, course_id: &str) -> AppResult<Vec<CourseModule>> {
        let course = self.get_course(ctx, course_id).await?;
        Ok(self
            .modules
            .find_many(
                Query::new()
                    .filter("courseId", course.id.as_str())
                    .order_by("order", Direction::Asc),
            )
            .await?)
    }

    pub async fn create_module(&self, ctx: &AccessContext, input: NewModule) -> AppResult<CourseModule> {
        let course = self.get_course(ctx, &input.course_id).await?;
        require_manage(ctx, &course)?;
        let title = input.title.trim();
        if title.is_empty() {
            return Err(AppError::invalid_field("title", "Title is required"));
        }
        let order = match input.order {
            Some(order) => order,
            None => {
                self.modules
                    .count(Query::new().filter("courseId", course.id.as_str()))
                    .await? as u32
                    + 1
            }
        };
        let now = Utc::now();
        let module = CourseModule {
            id: new_id(),
            church_id: course.church_id.clone(),
            course_id: course.id.clone(),
            title: title.to_string(),
            description: non_empty(input.description),
            order,
            estimated_minutes: input.estimated_minutes,
            created_at: now,
            updated_at: now,
        };
        self.modules.save(&module).await?;
        Ok(module)
    }

    async fn tenant_exam(&self, ctx: &AccessContext, exam_id: &str) -> AppResult<(Exam, Course)> {
        let church_id = ctx.church_id()?;
        let exam = self
            .exams
            .find_by_id(exam_id)
            .await?
            .filter(|e| e.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Exam"))?;
        let course = self.get_course(ctx, &exam.course_id).await?;
        Ok((exam, course))
    }

    pub async fn create_exam(&self, ctx: &AccessContext, input: NewExam) -> AppResult<Exam> {
        let course = self.get_course(ctx, &input.course_id).await?;
        require_manage(ctx, &course)?;
        let title = input.title.trim();
        if title.is_empty() {
            return Err(AppError::invalid_field("title", "Title is required"));
        }
        let passing_score = input.passing_score.unwrap_or(DEFAULT_PASSING_SCORE);
        if passing_score > 100 {
            return Err(AppError::invalid_field("passingScore", "Passing score must be between 0 and 100"));
        }
        let module_id = non_empty(input.module_id);
        if let Some(module_id) = module_id.as_deref() {
            let belongs = self
                .modules
                .find_by_id(module_id)
                .await?
                .is_some_and(|m| m.course_id == course.id);
            if !belongs {
                return Err(AppError::invalid_field("moduleId", "Invalid module"));
            }
        }

        let now = Utc::now();
        let exam = Exam {
            id: new_id(),
            church_id: course.church_id.clone(),
            course_id: course.id.clone(),
            module_id,
            title: title.to_string(),
            description: non_empty(input.description),
            time_limit_minutes: input.time_limit_minutes,
            question_count: 0,
            status: PublishStatus::Draft,
            passing_score,
            created_by: ctx.user_id().to_string(),
            updated_by: ctx.user_id().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.exams.save(&exam).await?;
        tracing::info!(course_id = %course.id, exam_id = %exam.id, "exam created");
        Ok(exam)
    }

    pub async fn publish_exam(&self, ctx: &AccessContext, exam_id: &str) -> AppResult<Exam> {
        let (mut exam, course) = self.tenant_exam(ctx, exam_id).await?;
        require_manage(ctx, &course)?;
        if exam.question_count == 0 {
            return Err(AppError::bad_request("Exam has no questions"));
        }
        exam.status = PublishStatus::Published;
        exam.updated_by = ctx.user_id().to_string();
        exam.updated_at = Utc::now();
        self.exams.save(&exam).await?;
        Ok(exam)
    }

    pub async fn add_question(&self, ctx: &AccessContext, input: NewExamQuestion) -> AppResult<ExamQuestion> {
        let (exam, course) = self.tenant_exam(ctx, &input.exam_id).await?;
        require_manage(ctx, &course)?;
        let text = input.question.trim();
        if text.is_empty() {
            return Err(AppError::invalid_field("question", "Question is required"));
        }
        let options: Vec<String> = input
            .options
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if options.len() < 2 {
            return Err(AppError::invalid_field("options", "At least two options are required"));
        }
        let correct_option = input
            .correct_option
            .filter(|i| *i >= 0 && (*i as usize) < options.len())
            .ok_or_else(|| AppError::invalid_field("correctOption", "correctOption must index into options"))?
            as usize;

        let now = Utc::now();
        let question = ExamQuestion {
            id: new_id(),
            church_id: exam.church_id.clone(),
            exam_id: exam.id.clone(),
            course_id: exam.course_id.clone(),
            module_id: exam.module_id.clone(),
            question: text.to_string(),
            options,
            correct_option,
            explanation: non_empty(input.explanation),
            weight: input.weight.filter(|w| *w > 0.0).unwrap_or(1.0),
            created_at: now,
            updated_at: now,
        };
        self.questions.save(&question).await?;
        self.exams.increment(&exam.id, "questionCount", 1.0).await?;
        Ok(question)
    }

    pub async fn delete_question(&self, ctx: &AccessContext, question_id: &str) -> AppResult<()> {
        let church_id = ctx.church_id()?;
        let question = self
            .questions
            .find_by_id(question_id)
            .await?
            .filter(|q| q.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Question"))?;
        let (exam, course) = self.tenant_exam(ctx, &question.exam_id).await?;
        require_manage(ctx, &course)?;
        if self.questions.delete(&question.id).await? && exam.question_count > 0 {
            self.exams.increment(&exam.id, "questionCount", -1.0).await?;
        }
        Ok(())
    }

    async fn find_enrollment(&self, course_id: &str, user_id: &str) -> AppResult<Option<Enrollment>> {
        Ok(self
            .enrollments
            .find_one(
                Query::new()
                    .filter("courseId", course_id)
                    .filter("userId", user_id),
            )
            .await?)
    }

    async fn insert_enrollment(&self, course: &Course, user_id: &str) -> AppResult<Enrollment> {
        if self.find_enrollment(&course.id, user_id).await?.is_some() {
            return Err(AppError::conflict("Already enrolled in this course"));
        }
        let now = Utc::now();
        let enrollment = Enrollment {
            id: new_id(),
            church_id: course.church_id.clone(),
            course_id: course.id.clone(),
            user_id: user_id.to_string(),
            status: EnrollmentStatus::Active,
            progress_percent: 0,
            module_progress: BTreeMap::new(),
            badge_issued_at: None,
            certificate: None,
            created_at: now,
            updated_at: now,
        };
        self.enrollments.save(&enrollment).await?;
        tracing::info!(course_id = %course.id, user_id = %user_id, "enrolled");
        Ok(enrollment)
    }

    pub async fn enroll(&self, ctx: &AccessContext, input: EnrollInput) -> AppResult<Enrollment> {
        let course = self.get_course(ctx, &input.course_id).await?;
        let manager = ctx.role().is_manager();
        let target = non_empty(input.user_id).unwrap_or_else(|| ctx.user_id().to_string());
        if target != ctx.user_id() {
            if !manager {
                return Err(AppError::forbidden("Insufficient permissions to enroll another user"));
            }
            let member = self
                .users
                .find_by_id(&target)
                .await?
                .is_some_and(|u| u.belongs_to(&course.church_id));
            if !member {
                return Err(AppError::not_found("User"));
            }
        }
        if course.status != PublishStatus::Published {
            return Err(AppError::bad_request("Course is not open for enrollment"));
        }
        if !manager {
            match course.access_type {
                CourseAccess::Open => {}
                CourseAccess::Request => {
                    let approved = self
                        .requests
                        .find_one(
                            Query::new()
                                .filter("courseId", course.id.as_str())
                                .filter("userId", target.as_str())
                                .filter("status", AccessRequestStatus::Approved.as_str()),
                        )
                        .await?;
                    if approved.is_none() {
                        return Err(AppError::forbidden("Access request approval required"));
                    }
                }
                CourseAccess::Invite => {
                    return Err(AppError::forbidden("This course is invite only"));
                }
            }
        }
        self.insert_enrollment(&course, &target).await
    }

    /// The caller's enrollments, or a course roster for its managers
    pub async fn list_enrollments(&self, ctx: &AccessContext, course_id: Option<&str>) -> AppResult<Vec<Enrollment>> {
        let church_id = ctx.church_id()?;
        let query = match course_id.filter(|c| !c.is_empty()) {
            Some(course_id) => {
                let course = self.get_course(ctx, course_id).await?;
                require_manage(ctx, &course)?;
                Query::new().filter("courseId", course.id.as_str())
            }
            None => Query::church(church_id).filter("userId", ctx.user_id()),
        };
        Ok(self.enrollments.find_many(query.newest_first()).await?)
    }

    async fn tenant_enrollment(&self, ctx: &AccessContext, enrollment_id: &str) -> AppResult<Enrollment> {
        let church_id = ctx.church_id()?;
        self.enrollments
            .find_by_id(enrollment_id)
            .await?
            .filter(|e| e.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Enrollment"))
    }

    pub async fn update_progress(
        &self,
        ctx: &AccessContext,
        enrollment_id: &str,
        update: ProgressUpdate,
    ) -> AppResult<Enrollment> {
        let mut enrollment = self.tenant_enrollment(ctx, enrollment_id).await?;
        if enrollment.user_id != ctx.user_id() {
            let course = self.get_course(ctx, &enrollment.course_id).await?;
            require_manage(ctx, &course)?;
        }
        let now = Utc::now();
        for (module_id, percent) in update.module_progress {
            enrollment
                .module_progress
                .insert(module_id, percent.clamp(0, 100) as u32);
        }
        if let Some(percent) = update.progress_percent {
            enrollment.set_progress(percent, now);
        }
        if update.status == Some(EnrollmentStatus::Withdrawn) {
            enrollment.status = EnrollmentStatus::Withdrawn;
        }
        enrollment.updated_at = now;
        self.enrollments.save(&enrollment).await?;
        Ok(enrollment)
    }

    /// Issue (or return the already issued) completion certificate
    pub async fn issue_certificate(&self, ctx: &AccessContext, enrollment_id: &str) -> AppResult<Certificate> {
        let mut enrollment = self.tenant_enrollment(ctx, enrollment_id).await?;
        let course = self.get_course(ctx, &enrollment.course_id).await?;
        if enrollment.user_id != ctx.user_id() && !can_manage(ctx, &course) {
            return Err(AppError::insufficient_permissions());
        }
        if enrollment.status != EnrollmentStatus::Completed {
            return Err(AppError::bad_request("Certificate available only after completion"));
        }
        if let Some(certificate) = enrollment.certificate.clone() {
            return Ok(certificate);
        }

        let student_name = self
            .users
            .find_by_id(&enrollment.user_id)
            .await?
            .map(|u| u.full_name())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Participant".to_string());
        let issued_at = Utc::now();
        let certificate = Certificate {
            certificate_number: certificate_number(&enrollment.id, issued_at),
            issued_at,
            student_name,
            course_title: course.title.clone(),
            church_name: ctx.church()?.name.clone(),
        };
        enrollment.certificate = Some(certificate.clone());
        enrollment.updated_at = issued_at;
        self.enrollments.save(&enrollment).await?;
        tracing::info!(
            enrollment_id = %enrollment.id,
            certificate_number = %certificate.certificate_number,
            "certificate issued"
        );
        Ok(certificate)
    }

    pub async fn request_access(&self, ctx: &AccessContext, input: NewAccessRequest) -> AppResult<AccessRequest> {
        let course = self.get_course(ctx, &input.course_id).await?;
        if course.access_type != CourseAccess::Request {
            return Err(AppError::bad_request("Course does not require access requests"));
        }
        if self.find_enrollment(&course.id, ctx.user_id()).await?.is_some() {
            return Err(AppError::conflict("Already enrolled in this course"));
        }
        let pending = self
            .requests
            .find_one(
                Query::new()
                    .filter("courseId", course.id.as_str())
                    .filter("userId", ctx.user_id())
                    .filter("status", AccessRequestStatus::Pending.as_str()),
            )
            .await?;
        if pending.is_some() {
            return Err(AppError::conflict("Access request already pending"));
        }

        let now = Utc::now();
        let request = AccessRequest {
            id: new_id(),
            church_id: course.church_id.clone(),
            course_id: course.id.clone(),
            user_id: ctx.user_id().to_string(),
            reason: non_empty(input.reason),
            status: AccessRequestStatus::Pending,
            reviewer_id: None,
            reviewer_note: None,
            created_at: now,
            updated_at: now,
        };
        self.requests.save(&request).await?;
        Ok(request)
    }

    /// The caller's requests, or a course's requests for its managers
    pub async fn list_access_requests(
        &self,
        ctx: &AccessContext,
        course_id: Option<&str>,
        status: Option<AccessRequestStatus>,
    ) -> AppResult<Vec<AccessRequest>> {
        let church_id = ctx.church_id()?;
        let mut query = match course_id.filter(|c| !c.is_empty()) {
            Some(course_id) => {
                let course = self.get_course(ctx, course_id).await?;
                require_manage(ctx, &course)?;
                Query::new().filter("courseId", course.id.as_str())
            }
            None => Query::church(church_id).filter("userId", ctx.user_id()),
        };
        if let Some(status) = status {
            query = query.filter("status", status.as_str());
        }
        Ok(self.requests.find_many(query.newest_first()).await?)
    }

    /// Approving enrolls the requester
    pub async fn review_access_request(
        &self,
        ctx: &AccessContext,
        request_id: &str,
        decision: AccessDecision,
    ) -> AppResult<AccessRequest> {
        let church_id = ctx.church_id()?;
        let mut request = self
            .requests
            .find_by_id(request_id)
            .await?
            .filter(|r| r.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Access request"))?;
        let course = self.get_course(ctx, &request.course_id).await?;
        require_manage(ctx, &course)?;
        if decision.status == AccessRequestStatus::Pending {
            return Err(AppError::invalid_field("status", "Invalid status"));
        }

        request.status = decision.status;
        request.reviewer_id = Some(ctx.user_id().to_string());
        request.reviewer_note = non_empty(decision.reviewer_note);
        request.updated_at = Utc::now();
        self.requests.save(&request).await?;

        if request.status == AccessRequestStatus::Approved
            && self.find_enrollment(&course.id, &request.user_id).await?.is_none()
        {
            self.insert_enrollment(&course, &request.user_id).await?;
        }
        tracing::info!(
            request_id = %request.id,
            status = request.status.as_str(),
            "access request reviewed"
        );
        Ok(request)
    }

    pub async fn start_attempt(&self, ctx: &AccessContext, exam_id: &str) -> AppResult<ExamAttempt> {
        if exam_id.trim().is_empty() {
            return Err(AppError::invalid_field("examId", "examId is required"));
        }
        let (exam, course) = self.tenant_exam(ctx, exam_id).await?;
        if exam.status != PublishStatus::Published {
            return Err(AppError::bad_request("Exam is not published"));
        }
        if self.find_enrollment(&course.id, ctx.user_id()).await?.is_none() {
            return Err(AppError::forbidden("Not enrolled in this course"));
        }
        let open = self
            .attempts
            .find_one(
                Query::new()
                    .filter("examId", exam.id.as_str())
                    .filter("userId", ctx.user_id())
                    .filter("status", "in_progress"),
            )
            .await?;
        if open.is_some() {
            return Err(AppError::conflict(
                "You already have an in-progress attempt. Please submit it before starting a new one.",
            ));
        }

        let attempt = ExamAttempt {
            id: new_id(),
            church_id: exam.church_id.clone(),
            exam_id: exam.id.clone(),
            course_id: exam.course_id.clone(),
            user_id: ctx.user_id().to_string(),
            status: AttemptStatus::InProgress,
            score: None,
            total_questions: None,
            passed: None,
            started_at: Utc::now(),
            submitted_at: None,
            responses: Vec::new(),
        };
        self.attempts.save(&attempt).await?;
        Ok(attempt)
    }

    pub async fn submit_attempt(
        &self,
        ctx: &AccessContext,
        attempt_id: &str,
        answers: Vec<AnswerSubmission>,
    ) -> AppResult<ExamAttempt> {
        let church_id = ctx.church_id()?;
        let mut attempt = self
            .attempts
            .find_by_id(attempt_id)
            .await?
            .filter(|a| a.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Attempt"))?;
        if attempt.user_id != ctx.user_id() {
            return Err(AppError::insufficient_permissions());
        }
        if attempt.status != AttemptStatus::InProgress {
            return Err(AppError::bad_request("Attempt already submitted"));
        }
        if answers.is_empty() {
            return Err(AppError::invalid_field("responses", "responses array is required"));
        }
        let (exam, _) = self.tenant_exam(ctx, &attempt.exam_id).await?;
        let questions = self
            .questions
            .find_many(Query::new().filter("examId", exam.id.as_str()))
            .await?;

        let (responses, score, total) = grade(&questions, &answers);
        let passed = total > 0 && score >= exam.passing_score;
        let now = Utc::now();
        attempt.status = AttemptStatus::Submitted;
        attempt.responses = responses;
        attempt.score = Some(score);
        attempt.total_questions = Some(total);
        attempt.passed = Some(passed);
        attempt.submitted_at = Some(now);
        self.attempts.save(&attempt).await?;

        if passed && exam.course_id == attempt.course_id {
            self.record_pass(&exam, &attempt.user_id).await?;
        }
        tracing::info!(attempt_id = %attempt.id, score, passed, "exam attempt submitted");
        Ok(attempt)
    }

    /// A passed module exam completes that module; a course-level exam
    /// completes the course
    async fn record_pass(&self, exam: &Exam, user_id: &str) -> AppResult<()> {
        let Some(mut enrollment) = self.find_enrollment(&exam.course_id, user_id).await? else {
            return Ok(());
        };
        let now = Utc::now();
        match exam.module_id.as_deref() {
            Some(module_id) => {
                enrollment.module_progress.insert(module_id.to_string(), 100);
                let total = self
                    .modules
                    .count(Query::new().filter("courseId", exam.course_id.as_str()))
                    .await?;
                let done = enrollment.module_progress.values().filter(|p| **p >= 100).count() as u64;
                if total > 0 {
                    let percent = (done.min(total) as f64 / total as f64 * 100.0).round() as i64;
                    if percent > enrollment.progress_percent as i64 {
                        enrollment.set_progress(percent, now);
                    }
                }
            }
            None => enrollment.set_progress(100, now),
        }
        enrollment.updated_at = now;
        self.enrollments.save(&enrollment).await?;
        Ok(())
    }
}
