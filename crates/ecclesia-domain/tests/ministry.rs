mod common;

use chrono::{TimeZone, Utc};
use common::tenant;
use ecclesia_auth::UserRole;
use ecclesia_domain::attendance::{AttendanceMode, CheckIn, Headcount, NewSession, SessionType};
use ecclesia_domain::giving::{webhook_giving_id, NewGiving, NewProject, WebhookOutcome};
use ecclesia_domain::payroll::{
    NewPeriod, NewPosition, NewSalary, NewWageScale, PayInputs, PeriodStatus, RecordStatus, WageType,
};
use ecclesia_domain::prayer::{NewPrayerRequest, PrayerStatus};
use ecclesia_domain::school::{
    AccessDecision, AccessRequestStatus, AnswerSubmission, CourseAccess, EnrollInput, EnrollmentStatus,
    NewAccessRequest, NewCourse, NewExam, NewExamQuestion, PublishStatus,
};
use serde_json::json;
use std::collections::HashMap;

const WEBHOOK_HASH: &str = "test-flutterwave-hash";

fn tithe(amount: f64) -> NewGiving {
    NewGiving {
        amount,
        giving_type: "TITHE".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_giving_updates_project_and_history() {
    let tenant = tenant().await;
    let giving = &tenant.services.giving;
    let project = giving
        .create_project(
            &tenant.admin,
            NewProject {
                name: "New Sanctuary".to_string(),
                goal_amount: 1000.0,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    giving.record_giving(&tenant.admin, tithe(50.0)).await.unwrap();
    giving
        .record_giving(
            &tenant.admin,
            NewGiving {
                amount: 250.0,
                giving_type: "BUILDING".to_string(),
                project_id: Some(project.id.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = giving.record_giving(&tenant.admin, tithe(0.0)).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    let err = giving
        .record_giving(
            &tenant.admin,
            NewGiving {
                project_id: Some("missing".to_string()),
                ..tithe(10.0)
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);

    let projects = giving.list_projects(&tenant.admin).await.unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].project.current_amount, 250.0);
    assert_eq!(projects[0].progress, 25.0);
    assert_eq!(projects[0].remaining_amount, 750.0);

    let history = giving.history(&tenant.admin, None, 10).await.unwrap();
    assert_eq!(history.summary.total_donations, 2);
    assert_eq!(history.summary.total_amount, 300.0);
    assert_eq!(history.summary.by_type.get("TITHE"), Some(&50.0));
    assert_eq!(history.summary.streak, 1);

    let tithes = giving.history(&tenant.admin, Some("TITHE"), 10).await.unwrap();
    assert_eq!(tithes.giving.len(), 1);
}

#[tokio::test]
async fn test_members_cannot_create_projects() {
    let tenant = tenant().await;
    let (_, member) = tenant.join("m@grace.org", UserRole::Member).await;
    let err = tenant
        .services
        .giving
        .create_project(
            &member,
            NewProject {
                name: "Roof".to_string(),
                goal_amount: 500.0,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn test_flutterwave_webhook_is_idempotent() {
    let tenant = tenant().await;
    let giving = &tenant.services.giving;
    let payload = json!({
        "event": "charge.completed",
        "data": {
            "id": 4_410_023,
            "amount": 75.5,
            "status": "successful",
            "meta": { "userId": tenant.admin.user_id(), "type": "OFFERING" }
        }
    });

    let err = giving.handle_flutterwave(None, payload.clone()).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    let err = giving
        .handle_flutterwave(Some("wrong-hash"), payload.clone())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 401);

    let first = giving
        .handle_flutterwave(Some(WEBHOOK_HASH), payload.clone())
        .await
        .unwrap();
    let WebhookOutcome::Recorded(recorded) = first else {
        panic!("expected a recorded gift, got {:?}", first);
    };
    assert_eq!(recorded.church_id, tenant.church_id);
    assert_eq!(recorded.transaction_id.as_deref(), Some("4410023"));
    assert_eq!(recorded.payment_method.as_deref(), Some("Card"));
    assert_eq!(recorded.id, webhook_giving_id("4410023"));

    let replay = giving.handle_flutterwave(Some(WEBHOOK_HASH), payload).await.unwrap();
    assert!(matches!(replay, WebhookOutcome::Duplicate(ref g) if g.id == recorded.id));
    assert_eq!(giving.church_giving(&tenant.admin).await.unwrap().len(), 1);

    let failed = json!({
        "event": "charge.completed",
        "data": { "id": 1, "amount": 10.0, "status": "failed", "meta": {} }
    });
    let outcome = giving.handle_flutterwave(Some(WEBHOOK_HASH), failed).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_webhook_deliveries_credit_project_once() {
    let tenant = tenant().await;
    let giving = tenant.services.giving.clone();
    let project = giving
        .create_project(
            &tenant.admin,
            NewProject {
                name: "Roof Repair".to_string(),
                goal_amount: 500.0,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let payload = json!({
        "event": "charge.completed",
        "data": {
            "id": "FLW-9001",
            "amount": 40.0,
            "status": "successful",
            "meta": {
                "userId": tenant.admin.user_id(),
                "type": "BUILDING",
                "projectId": project.id
            }
        }
    });

    let deliveries: Vec<_> = (0..8)
        .map(|_| {
            let giving = giving.clone();
            let payload = payload.clone();
            tokio::spawn(async move { giving.handle_flutterwave(Some(WEBHOOK_HASH), payload).await })
        })
        .collect();
    let mut recorded = 0;
    for delivery in deliveries {
        match delivery.await.unwrap().unwrap() {
            WebhookOutcome::Recorded(g) => {
                assert_eq!(g.id, webhook_giving_id("FLW-9001"));
                recorded += 1;
            }
            WebhookOutcome::Duplicate(g) => assert_eq!(g.id, webhook_giving_id("FLW-9001")),
            WebhookOutcome::Ignored => panic!("successful charge was ignored"),
        }
    }
    assert_eq!(recorded, 1);

    let projects = giving.list_projects(&tenant.admin).await.unwrap();
    assert_eq!(projects[0].project.current_amount, 40.0);
    assert_eq!(giving.church_giving(&tenant.admin).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_school_enrollment_exam_and_certificate() {
    let tenant = tenant().await;
    let school = &tenant.services.school;
    let course = school
        .create_course(
            &tenant.admin,
            NewCourse {
                title: "Foundations of Faith".to_string(),
                status: Some(PublishStatus::Published),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let exam = school
        .create_exam(
            &tenant.admin,
            NewExam {
                course_id: course.id.clone(),
                title: "Final".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = school.publish_exam(&tenant.admin, &exam.id).await.unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = school
        .add_question(
            &tenant.admin,
            NewExamQuestion {
                exam_id: exam.id.clone(),
                question: "How many gospels?".to_string(),
                options: vec!["Three".to_string(), "Four".to_string()],
                correct_option: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let question = school
        .add_question(
            &tenant.admin,
            NewExamQuestion {
                exam_id: exam.id.clone(),
                question: "How many gospels?".to_string(),
                options: vec!["Three".to_string(), "Four".to_string()],
                correct_option: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    school.publish_exam(&tenant.admin, &exam.id).await.unwrap();

    let (student, student_ctx) = tenant.join("student@grace.org", UserRole::Member).await;
    let err = school.start_attempt(&student_ctx, &exam.id).await.unwrap_err();
    assert_eq!(err.status_code(), 403);

    let enrollment = school
        .enroll(
            &student_ctx,
            EnrollInput {
                course_id: course.id.clone(),
                user_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(enrollment.user_id, student.id);
    let err = school
        .enroll(
            &student_ctx,
            EnrollInput {
                course_id: course.id.clone(),
                user_id: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);

    let err = school.issue_certificate(&student_ctx, &enrollment.id).await.unwrap_err();
    assert_eq!(err.status_code(), 400);

    let attempt = school.start_attempt(&student_ctx, &exam.id).await.unwrap();
    let err = school.start_attempt(&student_ctx, &exam.id).await.unwrap_err();
    assert_eq!(err.status_code(), 409);

    let graded = school
        .submit_attempt(
            &student_ctx,
            &attempt.id,
            vec![AnswerSubmission {
                question_id: question.id.clone(),
                answer_index: 1,
            }],
        )
        .await
        .unwrap();
    assert_eq!(graded.score, Some(100));
    assert_eq!(graded.passed, Some(true));

    let enrollments = school.list_enrollments(&student_ctx, None).await.unwrap();
    assert_eq!(enrollments[0].status, EnrollmentStatus::Completed);
    assert_eq!(enrollments[0].progress_percent, 100);

    let certificate = school.issue_certificate(&student_ctx, &enrollment.id).await.unwrap();
    assert!(certificate.certificate_number.starts_with("ECC-"));
    assert_eq!(certificate.student_name, "Tunde Bello");
    assert_eq!(certificate.course_title, "Foundations of Faith");
    let again = school.issue_certificate(&student_ctx, &enrollment.id).await.unwrap();
    assert_eq!(again.certificate_number, certificate.certificate_number);
}

#[tokio::test]
async fn test_request_access_course_needs_approval() {
    let tenant = tenant().await;
    let school = &tenant.services.school;
    let course = school
        .create_course(
            &tenant.admin,
            NewCourse {
                title: "Leadership Track".to_string(),
                access_type: Some(CourseAccess::Request),
                status: Some(PublishStatus::Published),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let (_, member) = tenant.join("m@grace.org", UserRole::Member).await;
    let enroll = || EnrollInput {
        course_id: course.id.clone(),
        user_id: None,
    };

    let err = school.enroll(&member, enroll()).await.unwrap_err();
    assert_eq!(err.status_code(), 403);

    let request = school
        .request_access(
            &member,
            NewAccessRequest {
                course_id: course.id.clone(),
                reason: Some("Serving as a cell leader".to_string()),
            },
        )
        .await
        .unwrap();
    let err = school
        .request_access(
            &member,
            NewAccessRequest {
                course_id: course.id.clone(),
                reason: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);

    let reviewed = school
        .review_access_request(
            &tenant.admin,
            &request.id,
            AccessDecision {
                status: AccessRequestStatus::Approved,
                reviewer_note: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(reviewed.status, AccessRequestStatus::Approved);
    assert_eq!(school.list_enrollments(&member, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_payroll_generation_and_payment() {
    let tenant = tenant().await;
    let payroll = &tenant.services.payroll;
    let (staff, _) = tenant.join("staff@grace.org", UserRole::Volunteer).await;
    let (hourly, _) = tenant.join("hourly@grace.org", UserRole::Volunteer).await;

    let position = payroll
        .create_position(
            &tenant.admin,
            NewPosition {
                name: "Administrator".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let monthly = payroll
        .create_wage_scale(
            &tenant.admin,
            NewWageScale {
                name: "Monthly".to_string(),
                wage_type: WageType::Salary,
                amount: 3000.0,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(monthly.currency, "NGN");
    let per_hour = payroll
        .create_wage_scale(
            &tenant.admin,
            NewWageScale {
                name: "Hourly".to_string(),
                wage_type: WageType::Hourly,
                amount: 20.0,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let start = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2026, 4, 16, 0, 0, 0).unwrap();
    for (user, scale) in [(&staff, &monthly), (&hourly, &per_hour)] {
        payroll
            .assign_salary(
                &tenant.admin,
                NewSalary {
                    user_id: user.id.clone(),
                    position_id: position.id.clone(),
                    wage_scale_id: scale.id.clone(),
                    start_date: start,
                    end_date: None,
                },
            )
            .await
            .unwrap();
    }
    let period = payroll
        .create_period(
            &tenant.admin,
            NewPeriod {
                name: String::new(),
                start_date: start,
                end_date: end,
                pay_date: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(period.pay_date, end);

    let report = payroll
        .generate_records(&tenant.admin, &period.id, HashMap::new())
        .await
        .unwrap();
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].user_id, staff.id);
    assert_eq!(report.created[0].gross_amount, 1500.0);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].user_id, hourly.id);

    let inputs = HashMap::from([(
        hourly.id.clone(),
        PayInputs {
            hours_worked: Some(10.0),
            ..Default::default()
        },
    )]);
    let report = payroll
        .generate_records(&tenant.admin, &period.id, inputs)
        .await
        .unwrap();
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].net_amount, 200.0);
    assert!(report.skipped.is_empty());

    let records = payroll.list_records(&tenant.admin, Some(&period.id)).await.unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        let paid = payroll
            .mark_paid(&tenant.admin, &record.id, Some("Bank transfer".to_string()))
            .await
            .unwrap();
        assert_eq!(paid.status, RecordStatus::Paid);
    }
    let err = payroll.mark_paid(&tenant.admin, &records[0].id, None).await.unwrap_err();
    assert_eq!(err.status_code(), 409);

    let periods = payroll.list_periods(&tenant.admin).await.unwrap();
    assert_eq!(periods[0].status, PeriodStatus::Paid);

    let summary = payroll.summary(&tenant.admin, None, None).await.unwrap();
    assert_eq!(summary.total_records, 2);
    assert_eq!(summary.paid_records, 2);
    assert_eq!(summary.total_paid, 1700.0);
}

#[tokio::test]
async fn test_payroll_requires_permission() {
    let tenant = tenant().await;
    let (_, leader) = tenant.join("leader@grace.org", UserRole::Leader).await;
    let err = tenant.services.payroll.list_positions(&leader).await.unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn test_prayer_counted_once_per_user() {
    let tenant = tenant().await;
    let prayer = &tenant.services.prayer;
    let request = prayer
        .create(
            &tenant.admin,
            NewPrayerRequest {
                title: "Healing".to_string(),
                content: "Please pray for my mother".to_string(),
                is_anonymous: true,
            },
        )
        .await
        .unwrap();
    let (_, member) = tenant.join("m@grace.org", UserRole::Member).await;

    let first = prayer.pray(&member, &request.id).await.unwrap();
    assert!(first.counted);
    assert_eq!(first.prayer_count, 1);
    let second = prayer.pray(&member, &request.id).await.unwrap();
    assert!(!second.counted);
    assert_eq!(second.prayer_count, 1);
    assert_eq!(prayer.pray(&tenant.admin, &request.id).await.unwrap().prayer_count, 2);

    let listings = prayer.list(&member, None).await.unwrap();
    assert_eq!(listings.len(), 1);
    assert!(listings[0].has_prayed);
    assert!(listings[0].user.is_none());

    let err = prayer
        .set_status(&member, &request.id, PrayerStatus::Answered)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
    let answered = prayer
        .set_status(&tenant.admin, &request.id, PrayerStatus::Answered)
        .await
        .unwrap();
    assert_eq!(answered.status, PrayerStatus::Answered);
    assert!(prayer.list(&member, Some(PrayerStatus::Active)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_attendance_check_in_rules() {
    let tenant = tenant().await;
    let attendance = &tenant.services.attendance;
    let session = attendance
        .create_session(
            &tenant.admin,
            NewSession {
                title: "Sunday First Service".to_string(),
                session_type: SessionType::Service,
                mode: AttendanceMode::Hybrid,
                start_at: Utc::now(),
                end_at: None,
                branch_id: None,
                location: Some("Main auditorium".to_string()),
                notes: None,
            },
        )
        .await
        .unwrap();
    let (member, member_ctx) = tenant.join("m@grace.org", UserRole::Member).await;

    attendance
        .check_in(&member_ctx, &session.id, CheckIn::default())
        .await
        .unwrap();
    let err = attendance
        .check_in(&member_ctx, &session.id, CheckIn::default())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = attendance
        .check_in(
            &member_ctx,
            &session.id,
            CheckIn {
                guest_name: Some("Visitor".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    attendance
        .check_in(
            &tenant.admin,
            &session.id,
            CheckIn {
                guest_name: Some("First-timer".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let err = attendance
        .check_in(
            &tenant.admin,
            &session.id,
            CheckIn {
                user_id: Some(member.id.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    attendance
        .set_headcount(
            &tenant.admin,
            &session.id,
            Headcount {
                total: Some(120),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let report = attendance.session_report(&tenant.admin, &session.id).await.unwrap();
    assert_eq!(report.total_records, 2);
    assert_eq!(report.members, 1);
    assert_eq!(report.guests, 1);
    assert_eq!(report.by_channel.get("OFFLINE"), Some(&2));
    assert_eq!(report.session.headcount.and_then(|h| h.total), Some(120));
}
